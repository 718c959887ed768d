//! Translation of runtime status values into [`RuntimeError`]s.
//!
//! A non-OK `iree_status_t` owns heap storage inside the runtime. The
//! translator renders it through the runtime's own `iree_status_to_string`
//! (when the library exports it), copies at most
//! [`MAX_STATUS_MESSAGE_LEN`] bytes, and then frees both the rendered string
//! and the status through the runtime's deallocation entry points.

use crate::error::RuntimeError;
use crate::sys;
use std::ffi::c_char;
use std::fmt;
use std::ptr;

/// Maximum number of message bytes kept from a rendered status.
pub const MAX_STATUS_MESSAGE_LEN: usize = 511;

/// Message used when the runtime cannot render a status.
pub const FALLBACK_STATUS_MESSAGE: &str = "IREE status error";

/// Canonical runtime status codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok,
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
    Deferred,
}

impl StatusCode {
    /// Decode a raw code value. Unrecognized values map to `Unknown`.
    pub fn from_raw(code: usize) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::Cancelled,
            3 => Self::InvalidArgument,
            4 => Self::DeadlineExceeded,
            5 => Self::NotFound,
            6 => Self::AlreadyExists,
            7 => Self::PermissionDenied,
            8 => Self::ResourceExhausted,
            9 => Self::FailedPrecondition,
            10 => Self::Aborted,
            11 => Self::OutOfRange,
            12 => Self::Unimplemented,
            13 => Self::Internal,
            14 => Self::Unavailable,
            15 => Self::DataLoss,
            16 => Self::Unauthenticated,
            17 => Self::Deferred,
            _ => Self::Unknown,
        }
    }

    /// Extract the code from a status handle.
    pub fn of(status: sys::iree_status_t) -> Self {
        Self::from_raw(status as usize & sys::IREE_STATUS_CODE_MASK)
    }

    /// Upper snake case name, matching the runtime's own rendering.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Cancelled => "CANCELLED",
            Self::Unknown => "UNKNOWN",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Self::FailedPrecondition => "FAILED_PRECONDITION",
            Self::Aborted => "ABORTED",
            Self::OutOfRange => "OUT_OF_RANGE",
            Self::Unimplemented => "UNIMPLEMENTED",
            Self::Internal => "INTERNAL",
            Self::Unavailable => "UNAVAILABLE",
            Self::DataLoss => "DATA_LOSS",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Deferred => "DEFERRED",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Truncate to at most `max` bytes without splitting a UTF-8 sequence.
pub fn truncate_message(message: &str, max: usize) -> &str {
    if message.len() <= max {
        return message;
    }
    let mut end = max;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    &message[..end]
}

/// The runtime entry points used to render and free statuses.
#[derive(Clone, Copy)]
pub struct StatusRenderer {
    pub(crate) to_string: Option<sys::StatusToStringFn>,
    pub(crate) free: sys::StatusFreeFn,
    pub(crate) allocator_free: sys::AllocatorFreeFn,
    pub(crate) allocator: sys::iree_allocator_t,
}

impl StatusRenderer {
    /// Convert `status` into a result, consuming it.
    ///
    /// # Safety
    ///
    /// `status` must be a status returned by the runtime this renderer was
    /// resolved from, and must not be used again afterwards.
    pub unsafe fn check(&self, status: sys::iree_status_t, call: &'static str) -> Result<(), RuntimeError> {
        if status.is_null() {
            return Ok(());
        }
        let code = StatusCode::of(status);
        let message = self
            .render(status)
            .unwrap_or_else(|| FALLBACK_STATUS_MESSAGE.to_string());
        (self.free)(status);
        tracing::debug!(call, %code, %message, "Runtime call failed");
        Err(RuntimeError::status(call, code, message))
    }

    unsafe fn render(&self, status: sys::iree_status_t) -> Option<String> {
        let to_string = self.to_string?;
        let mut buffer: *mut c_char = ptr::null_mut();
        let mut length: sys::iree_host_size_t = 0;
        if !to_string(status, &self.allocator, &mut buffer, &mut length) {
            return None;
        }
        if buffer.is_null() {
            return None;
        }
        let bytes = std::slice::from_raw_parts(buffer as *const u8, length);
        let text = String::from_utf8_lossy(bytes);
        let message = truncate_message(&text, MAX_STATUS_MESSAGE_LEN).to_string();
        // The runtime allocated the string, so the runtime frees it.
        (self.allocator_free)(self.allocator, buffer.cast());
        Some(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_decoding_from_handle_bits() {
        let status = (0x1000usize | 3) as sys::iree_status_t;
        assert_eq!(StatusCode::of(status), StatusCode::InvalidArgument);
        assert_eq!(StatusCode::from_raw(8), StatusCode::ResourceExhausted);
        assert_eq!(StatusCode::from_raw(2), StatusCode::Unknown);
        assert_eq!(StatusCode::from_raw(31), StatusCode::Unknown);
        assert_eq!(StatusCode::Internal.to_string(), "INTERNAL");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_message("short", 511), "short");
        let long = "x".repeat(600);
        assert_eq!(truncate_message(&long, MAX_STATUS_MESSAGE_LEN).len(), 511);
        // 'é' is two bytes; cutting at 3 would split it.
        assert_eq!(truncate_message("aéé", 4), "aé");
    }

    unsafe extern "C" fn render_ok(
        _status: sys::iree_status_t,
        _allocator: *const sys::iree_allocator_t,
        out_buffer: *mut *mut c_char,
        out_length: *mut sys::iree_host_size_t,
    ) -> bool {
        let text = Box::leak(b"INVALID_ARGUMENT; bad input".to_vec().into_boxed_slice());
        *out_buffer = text.as_mut_ptr().cast();
        *out_length = text.len();
        true
    }

    unsafe extern "C" fn render_fail(
        _status: sys::iree_status_t,
        _allocator: *const sys::iree_allocator_t,
        _out_buffer: *mut *mut c_char,
        _out_length: *mut sys::iree_host_size_t,
    ) -> bool {
        false
    }

    unsafe extern "C" fn free_status(_status: sys::iree_status_t) {}

    unsafe extern "C" fn free_string(_allocator: sys::iree_allocator_t, ptr: *mut std::ffi::c_void) {
        assert!(!ptr.is_null());
    }

    fn renderer(to_string: Option<sys::StatusToStringFn>) -> StatusRenderer {
        StatusRenderer {
            to_string,
            free: free_status,
            allocator_free: free_string,
            allocator: sys::iree_allocator_t {
                self_: ptr::null_mut(),
                ctl: None,
            },
        }
    }

    #[test]
    fn test_ok_status_passes() {
        let r = renderer(Some(render_ok));
        assert!(unsafe { r.check(ptr::null_mut(), "iree_vm_list_create") }.is_ok());
    }

    #[test]
    fn test_rendered_message_is_used() {
        let r = renderer(Some(render_ok));
        let status = 3usize as sys::iree_status_t;
        let err = unsafe { r.check(status, "iree_runtime_session_call_by_name") }.unwrap_err();
        match err {
            RuntimeError::Status { call, code, message } => {
                assert_eq!(call, "iree_runtime_session_call_by_name");
                assert_eq!(code, StatusCode::InvalidArgument);
                assert_eq!(message, "INVALID_ARGUMENT; bad input");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fallback_message_without_renderer() {
        for r in [renderer(None), renderer(Some(render_fail))] {
            let err = unsafe { r.check(13usize as sys::iree_status_t, "iree_hal_buffer_map_read") }
                .unwrap_err();
            assert!(err.to_string().contains(FALLBACK_STATUS_MESSAGE));
            assert_eq!(err.status_code(), Some(StatusCode::Internal));
        }
    }
}
