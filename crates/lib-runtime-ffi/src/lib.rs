//! # lib-runtime-ffi
//!
//! Safe bridge to the IREE runtime for invoking compiled modules.
//!
//! The runtime is loaded at run time from a shared library, never linked.
//! This crate handles:
//!
//! - Locating and loading the runtime library with `libloading`
//! - Translating runtime status values into typed errors
//! - Staged session construction with ordered teardown
//! - Copying host tensors to device buffers and back
//! - Synchronous invocation of module entry points
//!
//! # Example
//!
//! ```no_run
//! use lib_runtime_ffi::{create_session_from_module, is_available};
//! use lib_types::HostTensor;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! if !is_available() {
//!     return Ok(());
//! }
//! let module = std::fs::read("model.vmfb")?;
//! let mut session = create_session_from_module(&module)?;
//! let shape = [2i64, 3];
//! let values = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
//! let outputs = session.invoke("module.main", &[HostTensor::from_slice(&shape, &values)])?;
//! println!("{:?}", outputs[0].to_values::<f32>()?);
//! # Ok(())
//! # }
//! ```
//!
//! # Safety
//!
//! The runtime library is trusted native code. Every handle it returns is
//! owned by exactly one RAII wrapper, and nothing created by one session is
//! ever passed to another.

pub mod backend;
pub mod bridge;
pub mod error;
mod iree;
pub mod invoke;
pub mod lifecycle;
pub mod loader;
pub mod marshal;
pub mod status;
pub mod sys;

#[cfg(test)]
mod fake;

pub use backend::RuntimeBackend;
pub use bridge::{
    availability_detail, create_session_from_module, destroy_session, free_results, invoke,
    is_available, is_loaded, load, load_with, runtime, unload,
};
pub use error::{RuntimeError, RuntimeResult};
pub use lifecycle::{VmSession, DEVICE_DRIVERS};
pub use loader::{IreeLibrary, LibraryFormat, LoaderConfig, DISABLE_ENV, RUNTIME_LIB_ENV};
pub use status::StatusCode;
