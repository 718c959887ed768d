//! Process-wide entry points.
//!
//! The runtime library is loaded at most once per process and shared by every
//! session created afterwards. Sessions hold their own reference, so
//! [`unload`] never invalidates a live session: the library is closed when the
//! last holder goes away.

use crate::backend::RuntimeBackend;
use crate::error::{RuntimeError, RuntimeResult};
use crate::lifecycle::VmSession;
use crate::loader::{IreeLibrary, LoaderConfig};
use lib_types::{HostTensor, OwnedTensor};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

static RUNTIME: Mutex<Option<Arc<IreeLibrary>>> = Mutex::new(None);

/// Helper trait to recover from poisoned mutexes.
///
/// The guarded slot only ever holds a fully loaded library or nothing, so
/// the data is consistent even if a holder panicked.
trait RecoverMutex<T> {
    fn lock_recover(&self) -> MutexGuard<'_, T>;
}

impl<T> RecoverMutex<T> for Mutex<T> {
    fn lock_recover(&self) -> MutexGuard<'_, T> {
        self.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Mutex was poisoned, recovering data");
            poisoned.into_inner()
        })
    }
}

/// Load the runtime, trying `path` before the environment and platform defaults.
///
/// Once a library is loaded, further calls succeed without doing anything.
pub fn load(path: Option<&Path>) -> RuntimeResult<()> {
    load_with(&LoaderConfig::from_env().with_explicit_path(path)).map(|_| ())
}

/// Load the runtime using an explicit configuration and return it.
///
/// Concurrent first calls are serialized; only one of them opens the library.
pub fn load_with(config: &LoaderConfig) -> RuntimeResult<Arc<IreeLibrary>> {
    let mut slot = RUNTIME.lock_recover();
    if let Some(library) = slot.as_ref() {
        tracing::debug!(path = %library.path, "Runtime already loaded");
        return Ok(Arc::clone(library));
    }
    let library = Arc::new(IreeLibrary::discover(config)?);
    *slot = Some(Arc::clone(&library));
    Ok(library)
}

/// The loaded runtime, loading it from the default locations if needed.
pub fn runtime() -> RuntimeResult<Arc<IreeLibrary>> {
    load_with(&LoaderConfig::from_env())
}

/// Drop the process-wide reference to the runtime.
///
/// Returns `false` if nothing was loaded. Sessions that are still alive keep
/// the library open until they are destroyed.
pub fn unload() -> bool {
    let Some(library) = RUNTIME.lock_recover().take() else {
        return false;
    };
    let holders = Arc::strong_count(&library) - 1;
    if holders > 0 {
        tracing::warn!(
            path = %library.path,
            sessions = holders,
            "Unloading runtime with live sessions; it stays open until they are destroyed"
        );
    }
    true
}

/// Whether a runtime library is currently loaded.
pub fn is_loaded() -> bool {
    RUNTIME.lock_recover().is_some()
}

/// Whether the runtime can be used, loading it if necessary.
pub fn is_available() -> bool {
    runtime().is_ok()
}

/// One-line probe summary, for example
/// `runtime=true disabled=false feature=true path=libiree_runtime.so`.
pub fn availability_detail() -> String {
    let config = LoaderConfig::from_env();
    let (available, path) = match load_with(&config) {
        Ok(library) => (true, library.path.clone()),
        Err(err) => {
            tracing::debug!(error = %err, "Runtime probe failed");
            (false, "-".to_string())
        }
    };
    format!(
        "runtime={} disabled={} feature={} path={}",
        available,
        config.disabled,
        cfg!(feature = "runtime"),
        path
    )
}

/// Create a session with `module` loaded, using the process-wide runtime.
pub fn create_session_from_module(module: &[u8]) -> RuntimeResult<VmSession> {
    if module.is_empty() {
        return Err(RuntimeError::invalid_argument(
            "module",
            "module image is empty",
        ));
    }
    VmSession::create(runtime()?, module)
}

/// Release a session and everything it owns.
pub fn destroy_session<B: RuntimeBackend>(session: VmSession<B>) {
    drop(session);
}

/// Invoke `entry` on `session`. See [`VmSession::invoke`].
pub fn invoke<B: RuntimeBackend>(
    session: &mut VmSession<B>,
    entry: &str,
    inputs: &[HostTensor<'_>],
) -> RuntimeResult<Vec<OwnedTensor>> {
    session.invoke(entry, inputs)
}

/// Release tensors returned by [`invoke`].
pub fn free_results(results: Vec<OwnedTensor>) {
    drop(results);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeRuntime;
    use std::path::PathBuf;

    /// Serializes tests that touch the process-wide runtime slot.
    static GLOBAL_SLOT: Mutex<()> = Mutex::new(());

    #[test]
    fn test_disabled_load_leaves_nothing_loaded() {
        let _guard = GLOBAL_SLOT.lock_recover();
        unload();

        let config = LoaderConfig {
            explicit_path: Some(PathBuf::from("/nonexistent/libiree_runtime.so")),
            disabled: true,
            ..LoaderConfig::default()
        };
        let err = load_with(&config).unwrap_err();
        assert!(err.is_unavailable());
        assert!(!is_loaded());
        assert!(!unload());
    }

    #[test]
    fn test_empty_module_is_rejected_before_loading() {
        let err = create_session_from_module(&[]).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_availability_detail_is_descriptive() {
        let _guard = GLOBAL_SLOT.lock_recover();
        let detail = availability_detail();
        assert!(detail.starts_with(&format!("runtime={} ", is_available())));
        assert!(detail.contains(&format!("feature={}", cfg!(feature = "runtime"))));

        // Whatever the probe loaded is dropped again for the next test.
        assert_eq!(unload(), detail.starts_with("runtime=true"));
        assert!(!is_loaded());
    }

    #[test]
    fn test_free_functions_work_on_any_backend() {
        let runtime = Arc::new(FakeRuntime::new());
        let mut session = VmSession::create(Arc::clone(&runtime), b"fake-vmfb").unwrap();
        let values = [1i32, 2, 3];
        let shape = [3i64];
        let results = invoke(
            &mut session,
            "module.identity",
            &[HostTensor::from_slice(&shape, &values)],
        )
        .unwrap();
        assert_eq!(results[0].to_values::<i32>().unwrap(), values.to_vec());
        free_results(results);
        destroy_session(session);
        assert_eq!(runtime.live_handles(), 0);
    }
}
