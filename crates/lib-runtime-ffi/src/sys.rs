//! Raw C declarations for the subset of the IREE runtime API the bridge uses.
//!
//! Nothing here is linked at build time. Every function is resolved by name
//! from the dynamically loaded library (see [`crate::loader`]), so these
//! declarations only describe layouts and signatures.

#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_int, c_void};
use std::marker::PhantomData;

/// `iree_status_t`. Null means OK; otherwise the low bits carry the code.
pub type iree_status_t = *mut c_void;

/// Mask selecting the status code bits of a non-OK `iree_status_t`.
pub const IREE_STATUS_CODE_MASK: usize = 0x1F;

pub type iree_host_size_t = usize;
pub type iree_device_size_t = u64;
pub type iree_hal_dim_t = iree_device_size_t;
pub type iree_hal_element_type_t = u32;
pub type iree_hal_encoding_type_t = u32;

macro_rules! opaque_types {
    ($($name:ident),* $(,)?) => {
        $(
            #[repr(C)]
            pub struct $name {
                _data: [u8; 0],
                _marker: PhantomData<(*mut u8, std::marker::PhantomPinned)>,
            }
        )*
    };
}

opaque_types! {
    iree_runtime_instance_t,
    iree_runtime_session_t,
    iree_vm_instance_t,
    iree_vm_list_t,
    iree_hal_device_t,
    iree_hal_allocator_t,
    iree_hal_buffer_t,
    iree_hal_buffer_view_t,
}

/// `iree_allocator_ctl_fn_t`.
pub type iree_allocator_ctl_fn_t = unsafe extern "C" fn(
    self_: *mut c_void,
    command: c_int,
    params: *const c_void,
    inout_ptr: *mut *mut c_void,
) -> iree_status_t;

/// `iree_allocator_t`: a self pointer plus a control function.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct iree_allocator_t {
    pub self_: *mut c_void,
    pub ctl: Option<iree_allocator_ctl_fn_t>,
}

/// `iree_string_view_t`. Not NUL terminated.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct iree_string_view_t {
    pub data: *const c_char,
    pub size: iree_host_size_t,
}

impl iree_string_view_t {
    /// Borrow a Rust string. The view must not outlive `s`.
    pub fn from_str(s: &str) -> Self {
        Self {
            data: s.as_ptr().cast(),
            size: s.len(),
        }
    }
}

/// `iree_const_byte_span_t`.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct iree_const_byte_span_t {
    pub data: *const u8,
    pub data_length: iree_host_size_t,
}

impl iree_const_byte_span_t {
    /// Borrow a byte slice. The span must not outlive `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            data: bytes.as_ptr(),
            data_length: bytes.len(),
        }
    }
}

/// `iree_vm_ref_t`: a retained pointer plus its registered type.
#[repr(C)]
pub struct iree_vm_ref_t {
    pub ptr: *mut c_void,
    pub type_: usize,
}

/// `iree_vm_type_def_t`, packed into one word.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct iree_vm_type_def_t {
    pub bits: usize,
}

impl iree_vm_type_def_t {
    /// Equivalent of `iree_vm_make_undefined_type_def()` (a variant list).
    pub const fn undefined() -> Self {
        Self { bits: 0 }
    }
}

/// `iree_hal_buffer_params_t`.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct iree_hal_buffer_params_t {
    pub usage: u32,
    pub access: u16,
    pub type_: u32,
    pub queue_affinity: u64,
    pub min_alignment: iree_device_size_t,
}

impl iree_hal_buffer_params_t {
    /// Device-local storage usable by transfers and dispatches.
    pub const fn device_local() -> Self {
        Self {
            usage: IREE_HAL_BUFFER_USAGE_DEFAULT,
            access: IREE_HAL_MEMORY_ACCESS_ALL,
            type_: IREE_HAL_MEMORY_TYPE_DEVICE_LOCAL,
            queue_affinity: 0,
            min_alignment: 0,
        }
    }
}

/// Storage for `iree_runtime_instance_options_t`.
///
/// The struct is only ever filled in by the runtime's own initializer, so
/// the bridge reserves generously sized, aligned storage instead of
/// mirroring every field.
#[repr(C, align(16))]
pub struct iree_runtime_instance_options_t {
    _storage: [u8; 128],
}

/// Storage for `iree_runtime_session_options_t`. See the instance options.
#[repr(C, align(16))]
pub struct iree_runtime_session_options_t {
    _storage: [u8; 128],
}

impl Default for iree_runtime_instance_options_t {
    fn default() -> Self {
        Self { _storage: [0; 128] }
    }
}

impl Default for iree_runtime_session_options_t {
    fn default() -> Self {
        Self { _storage: [0; 128] }
    }
}

// Element type encoding: (numerical_type << 24) | bit_count.
const fn element_type_value(numerical_type: u32, bit_count: u32) -> iree_hal_element_type_t {
    (numerical_type << 24) | bit_count
}

const IREE_HAL_NUMERICAL_TYPE_INTEGER_SIGNED: u32 = 0x11;
const IREE_HAL_NUMERICAL_TYPE_FLOAT_IEEE: u32 = 0x21;
const IREE_HAL_NUMERICAL_TYPE_FLOAT_BRAIN: u32 = 0x22;

pub const IREE_HAL_ELEMENT_TYPE_NONE: iree_hal_element_type_t = 0;
pub const IREE_HAL_ELEMENT_TYPE_FLOAT_16: iree_hal_element_type_t =
    element_type_value(IREE_HAL_NUMERICAL_TYPE_FLOAT_IEEE, 16);
pub const IREE_HAL_ELEMENT_TYPE_BFLOAT_16: iree_hal_element_type_t =
    element_type_value(IREE_HAL_NUMERICAL_TYPE_FLOAT_BRAIN, 16);
pub const IREE_HAL_ELEMENT_TYPE_FLOAT_32: iree_hal_element_type_t =
    element_type_value(IREE_HAL_NUMERICAL_TYPE_FLOAT_IEEE, 32);
pub const IREE_HAL_ELEMENT_TYPE_FLOAT_64: iree_hal_element_type_t =
    element_type_value(IREE_HAL_NUMERICAL_TYPE_FLOAT_IEEE, 64);
pub const IREE_HAL_ELEMENT_TYPE_SINT_32: iree_hal_element_type_t =
    element_type_value(IREE_HAL_NUMERICAL_TYPE_INTEGER_SIGNED, 32);
pub const IREE_HAL_ELEMENT_TYPE_SINT_64: iree_hal_element_type_t =
    element_type_value(IREE_HAL_NUMERICAL_TYPE_INTEGER_SIGNED, 64);

pub const IREE_HAL_ENCODING_TYPE_DENSE_ROW_MAJOR: iree_hal_encoding_type_t = 1;

pub const IREE_HAL_MEMORY_TYPE_DEVICE_LOCAL: u32 = (1 << 5) | (1 << 4);
pub const IREE_HAL_MEMORY_ACCESS_ALL: u16 = 0x7;
pub const IREE_HAL_BUFFER_USAGE_DEFAULT: u32 = 0x3 | (0x3 << 10);

// Runtime instance

pub type InstanceOptionsInitializeFn =
    unsafe extern "C" fn(out_options: *mut iree_runtime_instance_options_t);
pub type InstanceOptionsUseAllAvailableDriversFn =
    unsafe extern "C" fn(options: *mut iree_runtime_instance_options_t);
/// Function signature for iree_runtime_instance_create.
///
/// ```c
/// iree_status_t iree_runtime_instance_create(
///     const iree_runtime_instance_options_t *options,
///     iree_allocator_t                       host_allocator,
///     iree_runtime_instance_t              **out_instance
/// );
/// ```
pub type InstanceCreateFn = unsafe extern "C" fn(
    options: *const iree_runtime_instance_options_t,
    host_allocator: iree_allocator_t,
    out_instance: *mut *mut iree_runtime_instance_t,
) -> iree_status_t;
pub type InstanceReleaseFn = unsafe extern "C" fn(instance: *mut iree_runtime_instance_t);
pub type InstanceHostAllocatorFn =
    unsafe extern "C" fn(instance: *const iree_runtime_instance_t) -> iree_allocator_t;
pub type InstanceVmInstanceFn =
    unsafe extern "C" fn(instance: *const iree_runtime_instance_t) -> *mut iree_vm_instance_t;
/// Function signature for iree_runtime_instance_try_create_default_device.
///
/// ```c
/// iree_status_t iree_runtime_instance_try_create_default_device(
///     iree_runtime_instance_t *instance,
///     iree_string_view_t       driver_name,
///     iree_hal_device_t      **out_device
/// );
/// ```
pub type InstanceTryCreateDefaultDeviceFn = unsafe extern "C" fn(
    instance: *const iree_runtime_instance_t,
    driver_name: iree_string_view_t,
    out_device: *mut *mut iree_hal_device_t,
) -> iree_status_t;

// Runtime session

pub type SessionOptionsInitializeFn =
    unsafe extern "C" fn(out_options: *mut iree_runtime_session_options_t);
/// Function signature for iree_runtime_session_create_with_device.
///
/// ```c
/// iree_status_t iree_runtime_session_create_with_device(
///     iree_runtime_instance_t              *instance,
///     const iree_runtime_session_options_t *options,
///     iree_hal_device_t                    *device,
///     iree_allocator_t                      host_allocator,
///     iree_runtime_session_t              **out_session
/// );
/// ```
pub type SessionCreateWithDeviceFn = unsafe extern "C" fn(
    instance: *const iree_runtime_instance_t,
    options: *const iree_runtime_session_options_t,
    device: *mut iree_hal_device_t,
    host_allocator: iree_allocator_t,
    out_session: *mut *mut iree_runtime_session_t,
) -> iree_status_t;
pub type SessionReleaseFn = unsafe extern "C" fn(session: *mut iree_runtime_session_t);
pub type SessionDeviceFn =
    unsafe extern "C" fn(session: *const iree_runtime_session_t) -> *mut iree_hal_device_t;
pub type SessionDeviceAllocatorFn =
    unsafe extern "C" fn(session: *const iree_runtime_session_t) -> *mut iree_hal_allocator_t;
/// Function signature for iree_runtime_session_append_bytecode_module_from_memory.
///
/// ```c
/// iree_status_t iree_runtime_session_append_bytecode_module_from_memory(
///     iree_runtime_session_t *session,
///     iree_const_byte_span_t  flatbuffer_data,
///     iree_allocator_t        flatbuffer_allocator
/// );
/// ```
///
/// `flatbuffer_allocator` frees `flatbuffer_data` once the module is unloaded.
pub type SessionAppendBytecodeModuleFromMemoryFn = unsafe extern "C" fn(
    session: *mut iree_runtime_session_t,
    flatbuffer_data: iree_const_byte_span_t,
    flatbuffer_allocator: iree_allocator_t,
) -> iree_status_t;
/// Function signature for iree_runtime_session_call_by_name.
///
/// ```c
/// iree_status_t iree_runtime_session_call_by_name(
///     iree_runtime_session_t *session,
///     iree_string_view_t      full_name,
///     iree_vm_list_t         *input_list,
///     iree_vm_list_t         *output_list
/// );
/// ```
pub type SessionCallByNameFn = unsafe extern "C" fn(
    session: *mut iree_runtime_session_t,
    full_name: iree_string_view_t,
    inputs: *mut iree_vm_list_t,
    outputs: *mut iree_vm_list_t,
) -> iree_status_t;

// VM lists and refs

/// Function signature for iree_vm_list_create.
///
/// ```c
/// iree_status_t iree_vm_list_create(
///     iree_vm_type_def_t element_type,
///     iree_host_size_t   initial_capacity,
///     iree_allocator_t   allocator,
///     iree_vm_list_t   **out_list
/// );
/// ```
pub type VmListCreateFn = unsafe extern "C" fn(
    element_type: iree_vm_type_def_t,
    initial_capacity: iree_host_size_t,
    allocator: iree_allocator_t,
    out_list: *mut *mut iree_vm_list_t,
) -> iree_status_t;
pub type VmListReleaseFn = unsafe extern "C" fn(list: *mut iree_vm_list_t);
pub type VmListPushRefMoveFn =
    unsafe extern "C" fn(list: *mut iree_vm_list_t, value: *mut iree_vm_ref_t) -> iree_status_t;
pub type VmListSizeFn = unsafe extern "C" fn(list: *const iree_vm_list_t) -> iree_host_size_t;
pub type VmListGetBufferViewAssignFn = unsafe extern "C" fn(
    list: *const iree_vm_list_t,
    i: iree_host_size_t,
) -> *mut iree_hal_buffer_view_t;
pub type VmRefReleaseFn = unsafe extern "C" fn(r#ref: *mut iree_vm_ref_t);

// HAL buffers

/// Function signature for iree_hal_buffer_view_allocate_buffer_copy.
///
/// ```c
/// iree_status_t iree_hal_buffer_view_allocate_buffer_copy(
///     iree_hal_device_t         *device,
///     iree_hal_allocator_t      *device_allocator,
///     iree_host_size_t           shape_rank,
///     const iree_hal_dim_t      *shape,
///     iree_hal_element_type_t    element_type,
///     iree_hal_encoding_type_t   encoding_type,
///     iree_hal_buffer_params_t   buffer_params,
///     iree_const_byte_span_t     initial_data,
///     iree_hal_buffer_view_t   **out_buffer_view
/// );
/// ```
pub type BufferViewAllocateBufferCopyFn = unsafe extern "C" fn(
    device: *mut iree_hal_device_t,
    device_allocator: *mut iree_hal_allocator_t,
    shape_rank: iree_host_size_t,
    shape: *const iree_hal_dim_t,
    element_type: iree_hal_element_type_t,
    encoding_type: iree_hal_encoding_type_t,
    buffer_params: iree_hal_buffer_params_t,
    initial_data: iree_const_byte_span_t,
    out_buffer_view: *mut *mut iree_hal_buffer_view_t,
) -> iree_status_t;
pub type BufferViewShapeRankFn =
    unsafe extern "C" fn(buffer_view: *const iree_hal_buffer_view_t) -> iree_host_size_t;
pub type BufferViewShapeDimsFn =
    unsafe extern "C" fn(buffer_view: *const iree_hal_buffer_view_t) -> *const iree_hal_dim_t;
pub type BufferViewElementTypeFn =
    unsafe extern "C" fn(buffer_view: *const iree_hal_buffer_view_t) -> iree_hal_element_type_t;
pub type BufferViewByteLengthFn =
    unsafe extern "C" fn(buffer_view: *const iree_hal_buffer_view_t) -> iree_device_size_t;
pub type BufferViewBufferFn =
    unsafe extern "C" fn(buffer_view: *const iree_hal_buffer_view_t) -> *mut iree_hal_buffer_t;
pub type BufferViewMoveRefFn =
    unsafe extern "C" fn(buffer_view: *mut iree_hal_buffer_view_t) -> iree_vm_ref_t;
/// Function signature for iree_hal_buffer_map_read.
///
/// ```c
/// iree_status_t iree_hal_buffer_map_read(
///     iree_hal_buffer_t  *source_buffer,
///     iree_device_size_t  source_offset,
///     void               *target_buffer,
///     iree_device_size_t  data_length
/// );
/// ```
pub type BufferMapReadFn = unsafe extern "C" fn(
    buffer: *mut iree_hal_buffer_t,
    source_offset: iree_device_size_t,
    target_buffer: *mut c_void,
    data_length: iree_device_size_t,
) -> iree_status_t;
pub type DeviceReleaseFn = unsafe extern "C" fn(device: *mut iree_hal_device_t);

// HAL module type registration

pub type HalModuleRegisterAllTypesFn =
    unsafe extern "C" fn(instance: *mut iree_vm_instance_t) -> iree_status_t;
pub type HalModuleResolveAllTypesFn =
    unsafe extern "C" fn(instance: *mut iree_vm_instance_t) -> iree_status_t;

// Allocation and status

/// Function signature for iree_allocator_malloc.
///
/// ```c
/// iree_status_t iree_allocator_malloc(
///     iree_allocator_t allocator,
///     iree_host_size_t byte_length,
///     void           **out_ptr
/// );
/// ```
pub type AllocatorMallocFn = unsafe extern "C" fn(
    allocator: iree_allocator_t,
    byte_length: iree_host_size_t,
    out_ptr: *mut *mut c_void,
) -> iree_status_t;
pub type AllocatorFreeFn = unsafe extern "C" fn(allocator: iree_allocator_t, ptr: *mut c_void);
/// Function signature for iree_status_to_string.
///
/// ```c
/// bool iree_status_to_string(
///     iree_status_t           status,
///     const iree_allocator_t *allocator,
///     char                  **out_buffer,
///     iree_host_size_t       *out_buffer_length
/// );
/// ```
///
/// The buffer is allocated from `allocator` and must be freed with it.
pub type StatusToStringFn = unsafe extern "C" fn(
    status: iree_status_t,
    allocator: *const iree_allocator_t,
    out_buffer: *mut *mut c_char,
    out_buffer_length: *mut iree_host_size_t,
) -> bool;
pub type StatusFreeFn = unsafe extern "C" fn(status: iree_status_t);
