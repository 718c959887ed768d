//! Staged construction and teardown of runtime sessions.
//!
//! A [`VmSession`] is built in four steps: instance, device, session, and
//! module. Each acquired resource is owned by a guard that releases it on
//! drop, so a failure at any step unwinds exactly the resources acquired so
//! far, newest first. A fully built session releases them in the same
//! order: session, then device, then instance.

use crate::backend::{DeviceHandle, InstanceHandle, RuntimeBackend, SessionHandle};
use crate::error::{RuntimeError, RuntimeResult};
use crate::invoke;
use crate::loader::IreeLibrary;
use lib_types::{HostTensor, OwnedTensor, SessionState};
use std::sync::Arc;

/// Drivers tried, in order, when creating the device.
pub const DEVICE_DRIVERS: [&str; 2] = ["local-task", "local-sync"];

struct InstanceGuard<B: RuntimeBackend> {
    backend: Arc<B>,
    handle: InstanceHandle,
}

impl<B: RuntimeBackend> InstanceGuard<B> {
    fn create(backend: &Arc<B>) -> RuntimeResult<Self> {
        let handle = backend.create_instance()?;
        Ok(Self {
            backend: Arc::clone(backend),
            handle,
        })
    }
}

impl<B: RuntimeBackend> Drop for InstanceGuard<B> {
    fn drop(&mut self) {
        self.backend.release_instance(self.handle);
    }
}

struct DeviceGuard<B: RuntimeBackend> {
    backend: Arc<B>,
    handle: DeviceHandle,
    driver: &'static str,
}

impl<B: RuntimeBackend> DeviceGuard<B> {
    /// Create a device from the first driver in `drivers` that succeeds.
    /// If none does, the last driver's error is returned.
    fn select(
        backend: &Arc<B>,
        instance: &InstanceGuard<B>,
        drivers: &[&'static str],
    ) -> RuntimeResult<Self> {
        let mut last_error = None;
        for (position, &driver) in drivers.iter().enumerate() {
            match backend.create_device(instance.handle, driver) {
                Ok(handle) => {
                    return Ok(Self {
                        backend: Arc::clone(backend),
                        handle,
                        driver,
                    })
                }
                Err(err) => {
                    if let Some(next) = drivers.get(position + 1) {
                        tracing::warn!(
                            driver,
                            next = *next,
                            error = %err,
                            "Driver unavailable, falling back"
                        );
                    } else {
                        tracing::debug!(driver, error = %err, "Driver unavailable");
                    }
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| RuntimeError::unavailable("no device drivers configured")))
    }
}

impl<B: RuntimeBackend> Drop for DeviceGuard<B> {
    fn drop(&mut self) {
        self.backend.release_device(self.handle);
    }
}

struct SessionGuard<B: RuntimeBackend> {
    backend: Arc<B>,
    handle: SessionHandle,
}

impl<B: RuntimeBackend> SessionGuard<B> {
    fn create(
        backend: &Arc<B>,
        instance: &InstanceGuard<B>,
        device: &DeviceGuard<B>,
    ) -> RuntimeResult<Self> {
        let handle = backend.create_session(instance.handle, device.handle)?;
        Ok(Self {
            backend: Arc::clone(backend),
            handle,
        })
    }
}

impl<B: RuntimeBackend> Drop for SessionGuard<B> {
    fn drop(&mut self) {
        self.backend.release_session(self.handle);
    }
}

/// A runtime session with one module loaded, ready for invocation.
///
/// Dropping the session releases the session, device, and instance, in that
/// order. Holding a session keeps its runtime library loaded.
pub struct VmSession<B: RuntimeBackend = IreeLibrary> {
    // Fields drop top to bottom.
    session: SessionGuard<B>,
    device: DeviceGuard<B>,
    instance: InstanceGuard<B>,
    backend: Arc<B>,
    state: SessionState,
    invocations: u64,
}

impl<B: RuntimeBackend> VmSession<B> {
    /// Build a session and load `module` into it.
    ///
    /// An empty module is rejected before any runtime resource is created.
    pub fn create(backend: Arc<B>, module: &[u8]) -> RuntimeResult<Self> {
        Self::create_with_drivers(backend, module, &DEVICE_DRIVERS)
    }

    /// Like [`VmSession::create`], trying `drivers` in order.
    pub fn create_with_drivers(
        backend: Arc<B>,
        module: &[u8],
        drivers: &[&'static str],
    ) -> RuntimeResult<Self> {
        if module.is_empty() {
            return Err(RuntimeError::invalid_argument(
                "module",
                "module image is empty",
            ));
        }

        let mut state = SessionState::Uninitialized;

        let instance = InstanceGuard::create(&backend)?;
        state = advance(state);
        tracing::debug!(%state, "Created runtime instance");

        let device = DeviceGuard::select(&backend, &instance, drivers)?;
        state = advance(state);
        tracing::debug!(%state, driver = device.driver, "Created device");

        let session = SessionGuard::create(&backend, &instance, &device)?;
        state = advance(state);
        tracing::debug!(%state, "Created runtime session");

        backend.append_module(session.handle, module)?;
        state = advance(state);
        tracing::info!(
            backend = %backend.describe(),
            driver = device.driver,
            module_bytes = module.len(),
            "Loaded module"
        );

        Ok(Self {
            session,
            device,
            instance,
            backend,
            state,
            invocations: 0,
        })
    }

    /// Call a fully qualified entry point such as `module.main`.
    ///
    /// Inputs are validated before anything is allocated. Outputs are copied
    /// to host memory in the order the entry point returns them.
    pub fn invoke(
        &mut self,
        entry: &str,
        inputs: &[HostTensor<'_>],
    ) -> RuntimeResult<Vec<OwnedTensor>> {
        debug_assert!(self.state.is_ready());
        let results = invoke::invoke_entry(&*self.backend, self.session.handle, entry, inputs)?;
        self.invocations += 1;
        Ok(results)
    }

    /// Construction state. Always [`SessionState::ModuleLoaded`] for a live session.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Driver the device was created from.
    pub fn driver(&self) -> &'static str {
        self.device.driver
    }

    /// Number of successful invocations.
    pub fn invocation_count(&self) -> u64 {
        self.invocations
    }

    /// The backend this session runs on.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    #[cfg(test)]
    pub(crate) fn instance_handle(&self) -> InstanceHandle {
        self.instance.handle
    }
}

fn advance(state: SessionState) -> SessionState {
    state.next().unwrap_or(state)
}

impl<B: RuntimeBackend> Drop for VmSession<B> {
    fn drop(&mut self) {
        tracing::debug!(
            driver = self.device.driver,
            invocations = self.invocations,
            "Releasing runtime session"
        );
    }
}

impl<B: RuntimeBackend> std::fmt::Debug for VmSession<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VmSession")
            .field("backend", &self.backend.describe())
            .field("instance", &self.instance.handle)
            .field("driver", &self.device.driver)
            .field("state", &self.state)
            .field("invocations", &self.invocations)
            .finish()
    }
}
