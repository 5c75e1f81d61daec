//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Requests and responses cross the boundary as opaque handles; C code only
//! ever holds pointers to them. Everything else is plain data: tagged enums
//! with explicit discriminants, `*mut c_char` for strings, and a result
//! envelope whose `data` pointer is interpreted through `FfiDataTag`.
//! Constructors live here to keep `lib.rs` focused on the `extern "C"`
//! surface.

use std::ffi::{c_void, CString};
use std::os::raw::c_char;

use webcall_core::{Request, Response};

/// Opaque handle to a request under construction.
///
/// `inner` becomes `None` once the request has been executed; later setters
/// and a second execute are rejected.
pub struct FfiRequest {
    pub(crate) inner: Option<Request>,
}

/// Opaque handle to a parsed response.
pub struct FfiResponse {
    pub(crate) inner: Response,
}

impl FfiResponse {
    pub(crate) fn into_raw(response: Response) -> *mut Self {
        Box::into_raw(Box::new(FfiResponse { inner: response }))
    }
}

/// Error codes returned in `FfiResult`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    NullArg = 1,
    InvalidArg = 2,
    Transport = 3,
    Decode = 4,
    NotMultipart = 5,
    AlreadyExecuted = 6,
    Panic = 7,
}

/// Tag that tells `webcall_free_result` what `FfiResult::data` points to.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiDataTag {
    None = 0,
    /// `*mut FfiResponse`
    Response = 1,
    /// `*mut FfiResponseList`
    ResponseList = 2,
    /// NUL-terminated `*mut c_char`
    Text = 3,
}

/// Responses produced by splitting a multipart body.
#[repr(C)]
pub struct FfiResponseList {
    pub items: *mut *mut FfiResponse,
    pub len: u32,
}

/// Result envelope for operations that can fail.
///
/// On success `error_code` is `Ok`, `error_message` is null, and `data`
/// points to the payload described by `data_tag`. On failure `error_message`
/// is a human-readable C string and `data` is null. The envelope owns its
/// payload: `webcall_free_result` releases both.
#[repr(C)]
pub struct FfiResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub data_tag: FfiDataTag,
    pub data: *mut c_void,
}

/// Convert to a C string, cutting at the first interior NUL.
pub(crate) fn into_c_string(s: impl Into<Vec<u8>>) -> *mut c_char {
    let mut bytes = s.into();
    if let Some(nul) = bytes.iter().position(|&b| b == 0) {
        bytes.truncate(nul);
    }
    CString::new(bytes).unwrap_or_default().into_raw()
}

impl FfiResult {
    fn boxed(error_code: FfiErrorCode, error_message: *mut c_char, data_tag: FfiDataTag, data: *mut c_void) -> *mut Self {
        Box::into_raw(Box::new(FfiResult {
            error_code,
            error_message,
            data_tag,
            data,
        }))
    }

    pub(crate) fn ok_response(response: Response) -> *mut Self {
        let data = FfiResponse::into_raw(response) as *mut c_void;
        Self::boxed(FfiErrorCode::Ok, std::ptr::null_mut(), FfiDataTag::Response, data)
    }

    pub(crate) fn ok_response_list(responses: Vec<Response>) -> *mut Self {
        let len = responses.len() as u32;
        let items = if responses.is_empty() {
            std::ptr::null_mut()
        } else {
            let handles: Box<[*mut FfiResponse]> = responses.into_iter().map(FfiResponse::into_raw).collect();
            Box::into_raw(handles) as *mut *mut FfiResponse
        };
        let list = Box::into_raw(Box::new(FfiResponseList { items, len })) as *mut c_void;
        Self::boxed(FfiErrorCode::Ok, std::ptr::null_mut(), FfiDataTag::ResponseList, list)
    }

    pub(crate) fn ok_text(text: impl Into<Vec<u8>>) -> *mut Self {
        let data = into_c_string(text) as *mut c_void;
        Self::boxed(FfiErrorCode::Ok, std::ptr::null_mut(), FfiDataTag::Text, data)
    }

    pub(crate) fn error(code: FfiErrorCode, message: &str) -> *mut Self {
        Self::boxed(code, into_c_string(message), FfiDataTag::None, std::ptr::null_mut())
    }

    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::error(FfiErrorCode::NullArg, &format!("null argument: {name}"))
    }

    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::error(FfiErrorCode::Panic, msg)
    }
}

/// Release an `FfiResponseList` and every response in it.
///
/// # Safety
/// `list` must come from `FfiResult::ok_response_list` and not be freed twice.
pub(crate) unsafe fn free_response_list(list: *mut FfiResponseList) {
    let list = unsafe { Box::from_raw(list) };
    if list.items.is_null() {
        return;
    }
    let slice = std::ptr::slice_from_raw_parts_mut(list.items, list.len as usize);
    let handles = unsafe { Box::from_raw(slice) };
    for handle in handles.iter().copied().filter(|h| !h.is_null()) {
        drop(unsafe { Box::from_raw(handle) });
    }
}
