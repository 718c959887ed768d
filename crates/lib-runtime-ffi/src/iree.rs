//! [`RuntimeBackend`] implementation over the dynamically loaded IREE runtime.

use crate::backend::{
    BufferViewHandle, DeviceHandle, InstanceHandle, ListHandle, RuntimeBackend, SessionHandle,
};
use crate::error::{RuntimeError, RuntimeResult};
use crate::loader::IreeLibrary;
use crate::status::StatusCode;
use crate::sys;
use std::ffi::c_void;
use std::ptr;

fn null_handle(call: &'static str) -> RuntimeError {
    RuntimeError::status(call, StatusCode::Internal, "runtime returned a null handle")
}

fn instance_ptr(handle: InstanceHandle) -> *mut sys::iree_runtime_instance_t {
    handle.as_ptr().cast()
}

fn device_ptr(handle: DeviceHandle) -> *mut sys::iree_hal_device_t {
    handle.as_ptr().cast()
}

fn session_ptr(handle: SessionHandle) -> *mut sys::iree_runtime_session_t {
    handle.as_ptr().cast()
}

fn list_ptr(handle: ListHandle) -> *mut sys::iree_vm_list_t {
    handle.as_ptr().cast()
}

fn view_ptr(handle: BufferViewHandle) -> *mut sys::iree_hal_buffer_view_t {
    handle.as_ptr().cast()
}

impl IreeLibrary {
    fn register_hal_types(&self, instance: InstanceHandle) -> RuntimeResult<()> {
        let s = &self.symbols;
        // SAFETY: `instance` is live and was created by this library.
        unsafe {
            let vm_instance = (s.iree_runtime_instance_vm_instance)(instance_ptr(instance));
            if vm_instance.is_null() {
                return Err(null_handle("iree_runtime_instance_vm_instance"));
            }
            self.check(
                (s.iree_hal_module_register_all_types)(vm_instance),
                "iree_hal_module_register_all_types",
            )?;
            self.check(
                (s.iree_hal_module_resolve_all_types)(vm_instance),
                "iree_hal_module_resolve_all_types",
            )
        }
    }
}

// SAFETY (whole impl): handles are only ever produced by this backend and are
// released exactly once by the RAII wrappers that own them.
impl RuntimeBackend for IreeLibrary {
    fn describe(&self) -> String {
        format!("IREE runtime at {}", self.path)
    }

    fn create_instance(&self) -> RuntimeResult<InstanceHandle> {
        let s = &self.symbols;
        let mut options = sys::iree_runtime_instance_options_t::default();
        let mut instance: *mut sys::iree_runtime_instance_t = ptr::null_mut();
        unsafe {
            (s.iree_runtime_instance_options_initialize)(&mut options);
            (s.iree_runtime_instance_options_use_all_available_drivers)(&mut options);
            self.check(
                (s.iree_runtime_instance_create)(&options, self.host_allocator(), &mut instance),
                "iree_runtime_instance_create",
            )?;
        }
        let handle = InstanceHandle::from_raw(instance.cast())
            .ok_or_else(|| null_handle("iree_runtime_instance_create"))?;

        if let Err(err) = self.register_hal_types(handle) {
            self.release_instance(handle);
            return Err(err);
        }
        Ok(handle)
    }

    fn release_instance(&self, instance: InstanceHandle) {
        unsafe { (self.symbols.iree_runtime_instance_release)(instance_ptr(instance)) }
    }

    fn create_device(&self, instance: InstanceHandle, driver: &str) -> RuntimeResult<DeviceHandle> {
        const CALL: &str = "iree_runtime_instance_try_create_default_device";
        let mut device: *mut sys::iree_hal_device_t = ptr::null_mut();
        unsafe {
            self.check(
                (self.symbols.iree_runtime_instance_try_create_default_device)(
                    instance_ptr(instance),
                    sys::iree_string_view_t::from_str(driver),
                    &mut device,
                ),
                CALL,
            )?;
        }
        DeviceHandle::from_raw(device.cast()).ok_or_else(|| {
            RuntimeError::status(
                CALL,
                StatusCode::NotFound,
                format!("driver '{driver}' produced no device"),
            )
        })
    }

    fn release_device(&self, device: DeviceHandle) {
        unsafe { (self.symbols.iree_hal_device_release)(device_ptr(device)) }
    }

    fn create_session(
        &self,
        instance: InstanceHandle,
        device: DeviceHandle,
    ) -> RuntimeResult<SessionHandle> {
        let s = &self.symbols;
        let mut options = sys::iree_runtime_session_options_t::default();
        let mut session: *mut sys::iree_runtime_session_t = ptr::null_mut();
        unsafe {
            (s.iree_runtime_session_options_initialize)(&mut options);
            let host_allocator = (s.iree_runtime_instance_host_allocator)(instance_ptr(instance));
            self.check(
                (s.iree_runtime_session_create_with_device)(
                    instance_ptr(instance),
                    &options,
                    device_ptr(device),
                    host_allocator,
                    &mut session,
                ),
                "iree_runtime_session_create_with_device",
            )?;
        }
        SessionHandle::from_raw(session.cast())
            .ok_or_else(|| null_handle("iree_runtime_session_create_with_device"))
    }

    fn release_session(&self, session: SessionHandle) {
        unsafe { (self.symbols.iree_runtime_session_release)(session_ptr(session)) }
    }

    fn append_module(&self, session: SessionHandle, module: &[u8]) -> RuntimeResult<()> {
        let s = &self.symbols;
        let allocator = self.host_allocator();
        let mut copy: *mut c_void = ptr::null_mut();
        unsafe {
            self.check(
                (s.iree_allocator_malloc)(allocator, module.len(), &mut copy),
                "iree_allocator_malloc",
            )
            .map_err(|err| {
                RuntimeError::ResourceExhausted(format!(
                    "copying {} module bytes: {err}",
                    module.len()
                ))
            })?;
            if copy.is_null() {
                return Err(RuntimeError::ResourceExhausted(format!(
                    "copying {} module bytes",
                    module.len()
                )));
            }
            ptr::copy_nonoverlapping(module.as_ptr(), copy.cast::<u8>(), module.len());

            // The session takes ownership of the copy through `allocator`.
            // A module rejected before ownership transfers (bad header or
            // failed verification) leaks the copy; freeing it here could
            // double free when the rejection comes after the transfer.
            let span = sys::iree_const_byte_span_t {
                data: copy.cast_const().cast(),
                data_length: module.len(),
            };
            self.check(
                (s.iree_runtime_session_append_bytecode_module_from_memory)(
                    session_ptr(session),
                    span,
                    allocator,
                ),
                "iree_runtime_session_append_bytecode_module_from_memory",
            )
        }
    }

    fn create_list(&self, capacity: usize) -> RuntimeResult<ListHandle> {
        let mut list: *mut sys::iree_vm_list_t = ptr::null_mut();
        unsafe {
            self.check(
                (self.symbols.iree_vm_list_create)(
                    sys::iree_vm_type_def_t::undefined(),
                    capacity,
                    self.host_allocator(),
                    &mut list,
                ),
                "iree_vm_list_create",
            )?;
        }
        ListHandle::from_raw(list.cast()).ok_or_else(|| null_handle("iree_vm_list_create"))
    }

    fn release_list(&self, list: ListHandle) {
        unsafe { (self.symbols.iree_vm_list_release)(list_ptr(list)) }
    }

    fn list_len(&self, list: ListHandle) -> usize {
        unsafe { (self.symbols.iree_vm_list_size)(list_ptr(list)) }
    }

    fn allocate_buffer_copy(
        &self,
        session: SessionHandle,
        dims: &[u64],
        element_type: u32,
        data: &[u8],
    ) -> RuntimeResult<BufferViewHandle> {
        let s = &self.symbols;
        let mut view: *mut sys::iree_hal_buffer_view_t = ptr::null_mut();
        unsafe {
            let device = (s.iree_runtime_session_device)(session_ptr(session));
            let device_allocator = (s.iree_runtime_session_device_allocator)(session_ptr(session));
            self.check(
                (s.iree_hal_buffer_view_allocate_buffer_copy)(
                    device,
                    device_allocator,
                    dims.len(),
                    dims.as_ptr(),
                    element_type,
                    sys::IREE_HAL_ENCODING_TYPE_DENSE_ROW_MAJOR,
                    sys::iree_hal_buffer_params_t::device_local(),
                    sys::iree_const_byte_span_t::from_slice(data),
                    &mut view,
                ),
                "iree_hal_buffer_view_allocate_buffer_copy",
            )?;
        }
        BufferViewHandle::from_raw(view.cast())
            .ok_or_else(|| null_handle("iree_hal_buffer_view_allocate_buffer_copy"))
    }

    fn push_buffer_view(&self, list: ListHandle, view: BufferViewHandle) -> RuntimeResult<()> {
        let s = &self.symbols;
        unsafe {
            let mut value = (s.iree_hal_buffer_view_move_ref)(view_ptr(view));
            let status = (s.iree_vm_list_push_ref_move)(list_ptr(list), &mut value);
            // A successful push clears `value`; a failed one leaves the reference with us.
            if !status.is_null() && !value.ptr.is_null() {
                (s.iree_vm_ref_release)(&mut value);
            }
            self.check(status, "iree_vm_list_push_ref_move")
        }
    }

    fn call(
        &self,
        session: SessionHandle,
        entry: &str,
        inputs: ListHandle,
        outputs: ListHandle,
    ) -> RuntimeResult<()> {
        unsafe {
            self.check(
                (self.symbols.iree_runtime_session_call_by_name)(
                    session_ptr(session),
                    sys::iree_string_view_t::from_str(entry),
                    list_ptr(inputs),
                    list_ptr(outputs),
                ),
                "iree_runtime_session_call_by_name",
            )
        }
    }

    fn list_buffer_view(&self, list: ListHandle, index: usize) -> Option<BufferViewHandle> {
        let view = unsafe {
            (self.symbols.iree_vm_list_get_buffer_view_assign)(list_ptr(list), index)
        };
        BufferViewHandle::from_raw(view.cast())
    }

    fn buffer_view_dims(&self, view: BufferViewHandle) -> Vec<u64> {
        let s = &self.symbols;
        unsafe {
            let rank = (s.iree_hal_buffer_view_shape_rank)(view_ptr(view));
            let dims = (s.iree_hal_buffer_view_shape_dims)(view_ptr(view));
            if rank == 0 || dims.is_null() {
                return Vec::new();
            }
            std::slice::from_raw_parts(dims, rank).to_vec()
        }
    }

    fn buffer_view_element_type(&self, view: BufferViewHandle) -> u32 {
        unsafe { (self.symbols.iree_hal_buffer_view_element_type)(view_ptr(view)) }
    }

    fn buffer_view_byte_length(&self, view: BufferViewHandle) -> u64 {
        unsafe { (self.symbols.iree_hal_buffer_view_byte_length)(view_ptr(view)) }
    }

    fn read_buffer_view(&self, view: BufferViewHandle, target: &mut [u8]) -> RuntimeResult<()> {
        if target.is_empty() {
            return Ok(());
        }
        let s = &self.symbols;
        unsafe {
            let buffer = (s.iree_hal_buffer_view_buffer)(view_ptr(view));
            if buffer.is_null() {
                return Err(null_handle("iree_hal_buffer_view_buffer"));
            }
            self.check(
                (s.iree_hal_buffer_map_read)(
                    buffer,
                    0,
                    target.as_mut_ptr().cast(),
                    target.len() as u64,
                ),
                "iree_hal_buffer_map_read",
            )
        }
    }
}
