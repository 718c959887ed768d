//! The capability interface every native runtime implements.
//!
//! The lifecycle manager, marshaller, and invocation driver only talk to a
//! [`RuntimeBackend`]. The production implementation is
//! [`IreeLibrary`](crate::loader::IreeLibrary), which forwards each method to
//! a symbol resolved from the dynamically loaded IREE runtime.

use crate::error::RuntimeResult;
use std::ffi::c_void;
use std::ptr::NonNull;

macro_rules! runtime_handles {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
            pub struct $name(NonNull<c_void>);

            impl $name {
                /// Wrap a raw pointer produced by the backend. Returns `None` for null.
                pub fn from_raw(ptr: *mut c_void) -> Option<Self> {
                    NonNull::new(ptr).map(Self)
                }

                /// The raw pointer, for passing back to the backend.
                pub fn as_ptr(self) -> *mut c_void {
                    self.0.as_ptr()
                }
            }
        )*
    };
}

runtime_handles! {
    /// A runtime instance.
    InstanceHandle,
    /// A device created from one driver.
    DeviceHandle,
    /// A runtime session bound to a device.
    SessionHandle,
    /// A type-erased VM argument list.
    ListHandle,
    /// A device-resident buffer view.
    BufferViewHandle,
}

/// Operations the bridge needs from a native runtime.
///
/// Handles passed to a backend must have been produced by that same backend
/// and not yet released. The RAII wrappers in [`crate::lifecycle`] and
/// [`crate::invoke`] uphold this; nothing else in the crate creates handles.
pub trait RuntimeBackend {
    /// Short description for logs.
    fn describe(&self) -> String;

    /// Create an instance that discovers all available drivers.
    fn create_instance(&self) -> RuntimeResult<InstanceHandle>;

    /// Release an instance.
    fn release_instance(&self, instance: InstanceHandle);

    /// Create the default device of the named driver.
    fn create_device(&self, instance: InstanceHandle, driver: &str) -> RuntimeResult<DeviceHandle>;

    /// Release a device.
    fn release_device(&self, device: DeviceHandle);

    /// Create a session bound to `device` using the instance's host allocator.
    fn create_session(
        &self,
        instance: InstanceHandle,
        device: DeviceHandle,
    ) -> RuntimeResult<SessionHandle>;

    /// Release a session.
    fn release_session(&self, session: SessionHandle);

    /// Copy `module` into runtime-owned memory and append it as a bytecode module.
    fn append_module(&self, session: SessionHandle, module: &[u8]) -> RuntimeResult<()>;

    /// Create an empty variant list with the given initial capacity.
    fn create_list(&self, capacity: usize) -> RuntimeResult<ListHandle>;

    /// Release a list and every reference it holds.
    fn release_list(&self, list: ListHandle);

    /// Number of entries in a list.
    fn list_len(&self, list: ListHandle) -> usize;

    /// Allocate a device buffer view holding a copy of `data`.
    fn allocate_buffer_copy(
        &self,
        session: SessionHandle,
        dims: &[u64],
        element_type: u32,
        data: &[u8],
    ) -> RuntimeResult<BufferViewHandle>;

    /// Move `view` into `list`. The reference is consumed whether or not
    /// the push succeeds.
    fn push_buffer_view(&self, list: ListHandle, view: BufferViewHandle) -> RuntimeResult<()>;

    /// Synchronously call a fully qualified entry point.
    fn call(
        &self,
        session: SessionHandle,
        entry: &str,
        inputs: ListHandle,
        outputs: ListHandle,
    ) -> RuntimeResult<()>;

    /// Borrow the buffer view at `index`, or `None` if the entry is not one.
    /// The view stays valid for as long as the list holds it.
    fn list_buffer_view(&self, list: ListHandle, index: usize) -> Option<BufferViewHandle>;

    /// Shape dimensions of a buffer view, outermost first.
    fn buffer_view_dims(&self, view: BufferViewHandle) -> Vec<u64>;

    /// Native element type code of a buffer view.
    fn buffer_view_element_type(&self, view: BufferViewHandle) -> u32;

    /// Size of the buffer view's contents in bytes.
    fn buffer_view_byte_length(&self, view: BufferViewHandle) -> u64;

    /// Synchronously read the buffer view's contents into `target`.
    fn read_buffer_view(&self, view: BufferViewHandle, target: &mut [u8]) -> RuntimeResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_handles_are_rejected() {
        assert!(SessionHandle::from_raw(std::ptr::null_mut()).is_none());
        let handle = ListHandle::from_raw(0x40 as *mut c_void).unwrap();
        assert_eq!(handle.as_ptr() as usize, 0x40);
    }
}
