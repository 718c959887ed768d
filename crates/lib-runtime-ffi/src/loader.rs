//! Dynamic loading of the IREE runtime library.
//!
//! The runtime is never linked at build time. [`IreeLibrary::discover`] walks
//! an ordered list of candidate paths, opens the first one that exports every
//! required entry point, and keeps the resolved function pointers alongside
//! the library handle. A candidate that opens but lacks a required symbol is
//! closed again and treated like a missing file.

use crate::error::{RuntimeError, RuntimeResult};
use crate::status::StatusRenderer;
use crate::sys;
use libloading::Library;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit runtime library path.
pub const RUNTIME_LIB_ENV: &str = "IREE_BRIDGE_RUNTIME_LIB";

/// Environment variable that forces the runtime to report unavailable.
pub const DISABLE_ENV: &str = "IREE_BRIDGE_DISABLE";

unsafe fn resolve_symbol<T: Copy>(library: &Library, path: &str, name: &str) -> RuntimeResult<T> {
    library
        .get::<T>(name.as_bytes())
        .map(|symbol| *symbol)
        .map_err(|_| RuntimeError::symbol_not_found(path, name))
}

macro_rules! symbol_table {
    ($($field:ident: $ty:ty),* $(,)?) => {
        /// Required entry points, named after the exported symbols.
        pub(crate) struct IreeSymbols {
            $(pub(crate) $field: $ty,)*
        }

        impl IreeSymbols {
            /// Every symbol a candidate library must export.
            pub(crate) const REQUIRED: &'static [&'static str] = &[$(stringify!($field)),*];

            /// Resolve all required symbols, failing on the first missing one.
            unsafe fn resolve(library: &Library, path: &str) -> RuntimeResult<Self> {
                Ok(Self {
                    $($field: resolve_symbol::<$ty>(library, path, stringify!($field))?,)*
                })
            }
        }
    };
}

symbol_table! {
    iree_allocator_system_ctl: sys::iree_allocator_ctl_fn_t,
    iree_allocator_malloc: sys::AllocatorMallocFn,
    iree_allocator_free: sys::AllocatorFreeFn,
    iree_status_free: sys::StatusFreeFn,

    iree_runtime_instance_options_initialize: sys::InstanceOptionsInitializeFn,
    iree_runtime_instance_options_use_all_available_drivers: sys::InstanceOptionsUseAllAvailableDriversFn,
    iree_runtime_instance_create: sys::InstanceCreateFn,
    iree_runtime_instance_release: sys::InstanceReleaseFn,
    iree_runtime_instance_host_allocator: sys::InstanceHostAllocatorFn,
    iree_runtime_instance_vm_instance: sys::InstanceVmInstanceFn,
    iree_runtime_instance_try_create_default_device: sys::InstanceTryCreateDefaultDeviceFn,
    iree_hal_module_register_all_types: sys::HalModuleRegisterAllTypesFn,
    iree_hal_module_resolve_all_types: sys::HalModuleResolveAllTypesFn,

    iree_runtime_session_options_initialize: sys::SessionOptionsInitializeFn,
    iree_runtime_session_create_with_device: sys::SessionCreateWithDeviceFn,
    iree_runtime_session_release: sys::SessionReleaseFn,
    iree_runtime_session_device: sys::SessionDeviceFn,
    iree_runtime_session_device_allocator: sys::SessionDeviceAllocatorFn,
    iree_runtime_session_append_bytecode_module_from_memory: sys::SessionAppendBytecodeModuleFromMemoryFn,
    iree_runtime_session_call_by_name: sys::SessionCallByNameFn,

    iree_vm_list_create: sys::VmListCreateFn,
    iree_vm_list_release: sys::VmListReleaseFn,
    iree_vm_list_push_ref_move: sys::VmListPushRefMoveFn,
    iree_vm_list_size: sys::VmListSizeFn,
    iree_vm_list_get_buffer_view_assign: sys::VmListGetBufferViewAssignFn,
    iree_vm_ref_release: sys::VmRefReleaseFn,

    iree_hal_buffer_view_allocate_buffer_copy: sys::BufferViewAllocateBufferCopyFn,
    iree_hal_buffer_view_shape_rank: sys::BufferViewShapeRankFn,
    iree_hal_buffer_view_shape_dims: sys::BufferViewShapeDimsFn,
    iree_hal_buffer_view_element_type: sys::BufferViewElementTypeFn,
    iree_hal_buffer_view_byte_length: sys::BufferViewByteLengthFn,
    iree_hal_buffer_view_buffer: sys::BufferViewBufferFn,
    iree_hal_buffer_view_move_ref: sys::BufferViewMoveRefFn,
    iree_hal_buffer_map_read: sys::BufferMapReadFn,
    iree_hal_device_release: sys::DeviceReleaseFn,
}

/// A loaded IREE runtime with its resolved entry points.
pub struct IreeLibrary {
    /// Path the library was opened from.
    pub path: String,

    pub(crate) symbols: IreeSymbols,

    pub(crate) renderer: StatusRenderer,

    /// Declared last so the library is closed after everything that points into it.
    #[allow(dead_code)]
    library: Library,
}

impl IreeLibrary {
    /// Open a runtime library and resolve its entry points.
    ///
    /// If any required symbol is missing the library is closed again and no
    /// partial table is kept. `iree_status_to_string` is optional; without it
    /// failures carry a fixed message.
    pub fn open<P: AsRef<Path>>(path: P) -> RuntimeResult<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        // SAFETY: loading runs the library's initializers. The caller chose the path.
        let library =
            unsafe { Library::new(path) }.map_err(|e| RuntimeError::load_error(&path_str, e))?;

        // SAFETY: the declared signatures match the runtime's C API.
        let symbols = unsafe { IreeSymbols::resolve(&library, &path_str)? };
        let to_string: Option<sys::StatusToStringFn> =
            unsafe { resolve_symbol(&library, &path_str, "iree_status_to_string").ok() };

        let renderer = StatusRenderer {
            to_string,
            free: symbols.iree_status_free,
            allocator_free: symbols.iree_allocator_free,
            allocator: sys::iree_allocator_t {
                self_: std::ptr::null_mut(),
                ctl: Some(symbols.iree_allocator_system_ctl),
            },
        };

        tracing::info!(
            path = %path_str,
            format = ?LibraryFormat::from_path(path),
            has_status_to_string = to_string.is_some(),
            "Loaded IREE runtime library"
        );

        Ok(Self {
            path: path_str,
            symbols,
            renderer,
            library,
        })
    }

    /// Open the first candidate from `config` that loads cleanly.
    pub fn discover(config: &LoaderConfig) -> RuntimeResult<Self> {
        if !cfg!(feature = "runtime") {
            return Err(RuntimeError::unavailable("built without runtime support"));
        }
        if config.disabled {
            return Err(RuntimeError::unavailable(format!(
                "disabled by {DISABLE_ENV}"
            )));
        }

        let candidates = config.search_paths();
        for candidate in &candidates {
            match Self::open(candidate) {
                Ok(library) => return Ok(library),
                Err(err) => {
                    tracing::warn!(path = %candidate.display(), error = %err, "Rejected runtime candidate");
                }
            }
        }

        Err(RuntimeError::LibraryNotFound {
            tried: candidates,
            env_var: RUNTIME_LIB_ENV,
        })
    }

    /// Whether failure statuses can be rendered to text.
    pub fn renders_status_messages(&self) -> bool {
        self.renderer.to_string.is_some()
    }

    /// The runtime's system host allocator.
    pub(crate) fn host_allocator(&self) -> sys::iree_allocator_t {
        self.renderer.allocator
    }

    /// Consume a status returned by this library.
    pub(crate) fn check(&self, status: sys::iree_status_t, call: &'static str) -> RuntimeResult<()> {
        // SAFETY: every status passed here comes straight from one of our symbols.
        unsafe { self.renderer.check(status, call) }
    }
}

impl Drop for IreeLibrary {
    fn drop(&mut self) {
        tracing::info!(path = %self.path, "Unloading IREE runtime library");
    }
}

impl std::fmt::Debug for IreeLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IreeLibrary")
            .field("path", &self.path)
            .field("renders_status_messages", &self.renders_status_messages())
            .finish()
    }
}

// IreeLibrary is Send + Sync because it only stores function pointers,
// the system allocator descriptor, and the Library handle.
unsafe impl Send for IreeLibrary {}
unsafe impl Sync for IreeLibrary {}

/// Where to look for the runtime library.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Path supplied by the caller. Tried first.
    pub explicit_path: Option<PathBuf>,

    /// Path from [`RUNTIME_LIB_ENV`]. Tried second.
    pub env_path: Option<PathBuf>,

    /// Conventional library names, tried last through the platform search path.
    pub candidates: Vec<PathBuf>,

    /// Report unavailable without touching the filesystem.
    pub disabled: bool,
}

impl LoaderConfig {
    /// Configuration from the process environment and platform conventions.
    pub fn from_env() -> Self {
        let env_path = std::env::var_os(RUNTIME_LIB_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        let disabled = std::env::var(DISABLE_ENV)
            .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            explicit_path: None,
            env_path,
            candidates: LibraryFormat::native()
                .conventional_names()
                .iter()
                .map(PathBuf::from)
                .collect(),
            disabled,
        }
    }

    /// Set the caller-supplied path.
    pub fn with_explicit_path(mut self, path: Option<&Path>) -> Self {
        self.explicit_path = path.map(Path::to_path_buf);
        self
    }

    /// Candidate paths in the order they are tried.
    pub fn search_paths(&self) -> Vec<PathBuf> {
        self.explicit_path
            .iter()
            .chain(self.env_path.iter())
            .chain(self.candidates.iter())
            .filter(|path| !path.as_os_str().is_empty())
            .cloned()
            .collect()
    }
}

/// Platform-specific library format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LibraryFormat {
    /// Windows DLL.
    Dll,
    /// Linux/Unix shared object.
    So,
    /// macOS dynamic library.
    Dylib,
    /// Unknown format.
    Unknown,
}

impl LibraryFormat {
    /// Detect format from file extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some("dll") | Some("DLL") => Self::Dll,
            Some("so") => Self::So,
            Some("dylib") => Self::Dylib,
            _ => Self::Unknown,
        }
    }

    /// Conventional file names of the runtime library in this format.
    pub fn conventional_names(self) -> &'static [&'static str] {
        match self {
            Self::Dll => &["iree_runtime.dll"],
            Self::So => &["libiree_runtime.so"],
            Self::Dylib => &["libiree_runtime.dylib"],
            Self::Unknown => &[
                "libiree_runtime.dylib",
                "libiree_runtime.so",
                "iree_runtime.dll",
            ],
        }
    }

    /// Get the format for the current platform.
    #[cfg(target_os = "windows")]
    pub fn native() -> Self {
        Self::Dll
    }

    #[cfg(target_os = "linux")]
    pub fn native() -> Self {
        Self::So
    }

    #[cfg(target_os = "macos")]
    pub fn native() -> Self {
        Self::Dylib
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    pub fn native() -> Self {
        Self::Unknown
    }
}
