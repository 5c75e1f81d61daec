//! C-ABI wrapper around `webcall-core`.
//!
//! # Overview
//! Exposes request configuration, execution and response inspection through
//! `extern "C"` functions, so any language with a C FFI can issue a request
//! and read its status, headers, body and multipart parts.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Setters return `bool`: `false` for a null or non-UTF-8 argument, a
//!   rejected value, or a request that was already executed.
//! - Operations that can fail return an `FfiResult` envelope with
//!   `FfiDataTag` + `void* data`.
//! - The C caller owns every returned pointer and releases it with the
//!   matching `webcall_*_free` function. Pointers inside an `FfiResult`
//!   belong to the result and die with `webcall_free_result`.

pub mod types;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;

use webcall_core::{Body, Data, Method, Request, Response};

use types::*;

/// Borrow a C string argument. Null or non-UTF-8 input yields `None`.
fn str_arg<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(s) }.to_str().ok()
}

/// Run `f` against a live request. Executed requests reject configuration.
fn configure(req: *mut FfiRequest, f: impl FnOnce(&mut Request) -> bool) -> bool {
    if req.is_null() {
        return false;
    }
    catch_unwind(AssertUnwindSafe(|| {
        let handle = unsafe { &mut *req };
        match handle.inner.as_mut() {
            Some(request) => f(request),
            None => {
                log::warn!("request already executed; configuration ignored");
                false
            }
        }
    }))
    .unwrap_or(false)
}

/// Run `f` against a response handle, or return `default` for null.
fn inspect<T>(resp: *const FfiResponse, default: T, f: impl FnOnce(&Response) -> T) -> T {
    if resp.is_null() {
        return default;
    }
    let handle = unsafe { &*resp };
    match catch_unwind(AssertUnwindSafe(|| f(&handle.inner))) {
        Ok(value) => value,
        Err(_) => default,
    }
}

// ---------------------------------------------------------------------------
// Request lifecycle
// ---------------------------------------------------------------------------

/// Create a GET request for `url`.
///
/// Returns null if `url` is null or not UTF-8.
/// The caller must free the returned pointer with `webcall_request_free`.
#[unsafe(no_mangle)]
pub extern "C" fn webcall_request_new(url: *const c_char) -> *mut FfiRequest {
    catch_unwind(|| match str_arg(url) {
        Some(url) => Box::into_raw(Box::new(FfiRequest {
            inner: Some(Request::new(url)),
        })),
        None => std::ptr::null_mut(),
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a request created by `webcall_request_new`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn webcall_request_free(req: *mut FfiRequest) {
    if !req.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(req) });
        });
    }
}

// ---------------------------------------------------------------------------
// Request configuration
// ---------------------------------------------------------------------------

/// Set the method. Only `GET`, `POST`, `PUT`, `DELETE` and `HEAD` are
/// accepted; anything else leaves the method unchanged and returns false.
#[unsafe(no_mangle)]
pub extern "C" fn webcall_request_set_method(req: *mut FfiRequest, method: *const c_char) -> bool {
    configure(req, |r| {
        let Some(method) = str_arg(method) else {
            return false;
        };
        let accepted = method.parse::<Method>().is_ok();
        r.set_method(method);
        accepted
    })
}

/// Append a request header. Repeated names are all sent.
#[unsafe(no_mangle)]
pub extern "C" fn webcall_request_set_header_field(
    req: *mut FfiRequest,
    name: *const c_char,
    value: *const c_char,
) -> bool {
    configure(req, |r| match (str_arg(name), str_arg(value)) {
        (Some(name), Some(value)) => {
            r.set_header_field(name, value);
            true
        }
        _ => false,
    })
}

/// Set a raw body of `len` bytes. `body` may be null only when `len` is 0.
#[unsafe(no_mangle)]
pub extern "C" fn webcall_request_set_body(req: *mut FfiRequest, body: *const u8, len: usize) -> bool {
    configure(req, |r| {
        let bytes = if len == 0 {
            Vec::new()
        } else if body.is_null() {
            return false;
        } else {
            unsafe { std::slice::from_raw_parts(body, len) }.to_vec()
        };
        r.set_body(bytes);
        true
    })
}

/// Add a key/value pair to a form body, sent as `multipart/form-data`.
/// A previously set raw body is replaced.
#[unsafe(no_mangle)]
pub extern "C" fn webcall_request_add_form_field(
    req: *mut FfiRequest,
    name: *const c_char,
    value: *const c_char,
) -> bool {
    configure(req, |r| {
        let (Some(name), Some(value)) = (str_arg(name), str_arg(value)) else {
            return false;
        };
        let mut fields = match &r.config().body {
            Some(Body::Form(fields)) => fields.clone(),
            _ => Vec::new(),
        };
        fields.push((name.to_string(), value.to_string()));
        r.set_body(Body::Form(fields));
        true
    })
}

/// Append one query parameter.
#[unsafe(no_mangle)]
pub extern "C" fn webcall_request_set_url_parameter(
    req: *mut FfiRequest,
    name: *const c_char,
    value: *const c_char,
) -> bool {
    configure(req, |r| {
        let (Some(name), Some(value)) = (str_arg(name), str_arg(value)) else {
            return false;
        };
        let mut params = r.config().query.clone().unwrap_or_default();
        params.push((name.to_string(), value.to_string()));
        r.set_url_parameters(params);
        true
    })
}

/// Set server credentials. `scheme` is one of BASIC, DIGEST, GSSNEGOTIATE,
/// NTLM, ANY or ANYSAFE in any case; an unknown scheme returns false.
#[unsafe(no_mangle)]
pub extern "C" fn webcall_request_set_http_authentication(
    req: *mut FfiRequest,
    username: *const c_char,
    password: *const c_char,
    scheme: *const c_char,
) -> bool {
    configure(req, |r| {
        let (Some(user), Some(pass), Some(scheme)) = (str_arg(username), str_arg(password), str_arg(scheme)) else {
            return false;
        };
        let accepted = scheme.parse::<webcall_core::AuthScheme>().is_ok();
        r.set_http_authentication(user, pass, scheme);
        accepted
    })
}

/// Route the request through the proxy at `url`.
#[unsafe(no_mangle)]
pub extern "C" fn webcall_request_set_proxy(req: *mut FfiRequest, url: *const c_char) -> bool {
    configure(req, |r| match str_arg(url) {
        Some(url) => {
            r.set_proxy(url);
            true
        }
        None => false,
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn webcall_request_set_proxy_authentication(
    req: *mut FfiRequest,
    username: *const c_char,
    password: *const c_char,
) -> bool {
    configure(req, |r| match (str_arg(username), str_arg(password)) {
        (Some(user), Some(pass)) => {
            r.set_proxy_authentication(user, pass);
            true
        }
        _ => false,
    })
}

/// Whole-request timeout in seconds.
#[unsafe(no_mangle)]
pub extern "C" fn webcall_request_set_timeout(req: *mut FfiRequest, seconds: u64) -> bool {
    configure(req, |r| {
        r.set_timeout(seconds);
        true
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn webcall_request_set_connect_timeout(req: *mut FfiRequest, seconds: u64) -> bool {
    configure(req, |r| {
        r.set_connect_timeout(seconds);
        true
    })
}

/// 0 disables redirect following.
#[unsafe(no_mangle)]
pub extern "C" fn webcall_request_set_max_redirects(req: *mut FfiRequest, max: u32) -> bool {
    configure(req, |r| {
        r.set_max_redirects(max);
        true
    })
}

/// TLS verification. `ca_bundle` may be null to keep the default roots.
#[unsafe(no_mangle)]
pub extern "C" fn webcall_request_set_ssl(
    req: *mut FfiRequest,
    verify_peer: bool,
    verify_host: u8,
    ca_bundle: *const c_char,
) -> bool {
    configure(req, |r| {
        if !ca_bundle.is_null() && str_arg(ca_bundle).is_none() {
            return false;
        }
        r.set_ssl(verify_peer, verify_host, str_arg(ca_bundle).map(PathBuf::from));
        true
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn webcall_request_set_option_bool(req: *mut FfiRequest, key: *const c_char, value: bool) -> bool {
    configure(req, |r| match str_arg(key) {
        Some(key) => {
            r.set_option(key, value);
            true
        }
        None => false,
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn webcall_request_set_option_int(req: *mut FfiRequest, key: *const c_char, value: i64) -> bool {
    configure(req, |r| match str_arg(key) {
        Some(key) => {
            r.set_option(key, value);
            true
        }
        None => false,
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn webcall_request_set_option_text(
    req: *mut FfiRequest,
    key: *const c_char,
    value: *const c_char,
) -> bool {
    configure(req, |r| match (str_arg(key), str_arg(value)) {
        (Some(key), Some(value)) => {
            r.set_option(key, value);
            true
        }
        _ => false,
    })
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Perform the request. A request runs at most once; a second call fails
/// with `AlreadyExecuted`.
///
/// On success `data_tag = Response`. HTTP error statuses are successes; only
/// network-level failures produce `Transport`.
#[unsafe(no_mangle)]
pub extern "C" fn webcall_request_execute(req: *mut FfiRequest) -> *mut FfiResult {
    catch_unwind(AssertUnwindSafe(|| {
        if req.is_null() {
            return FfiResult::null_arg("request");
        }
        let handle = unsafe { &mut *req };
        let Some(request) = handle.inner.take() else {
            return FfiResult::error(FfiErrorCode::AlreadyExecuted, "request already executed");
        };
        match request.execute() {
            Ok(response) => FfiResult::ok_response(response),
            Err(e) => FfiResult::error(FfiErrorCode::Transport, &e.to_string()),
        }
    }))
    .unwrap_or_else(|_| FfiResult::panic("panic in webcall_request_execute"))
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Build a response from data the caller obtained itself.
///
/// `header_text` may be null (no headers); `body` may be null only when
/// `body_len` is 0. Free with `webcall_response_free`.
#[unsafe(no_mangle)]
pub extern "C" fn webcall_response_parse(
    status: u16,
    header_text: *const c_char,
    body: *const u8,
    body_len: usize,
) -> *mut FfiResponse {
    catch_unwind(|| {
        let header_text = if header_text.is_null() {
            String::new()
        } else {
            unsafe { CStr::from_ptr(header_text) }.to_string_lossy().into_owned()
        };
        let body = if body_len == 0 {
            Vec::new()
        } else if body.is_null() {
            return std::ptr::null_mut();
        } else {
            unsafe { std::slice::from_raw_parts(body, body_len) }.to_vec()
        };
        FfiResponse::into_raw(Response::new(status, &header_text, body))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a response from `webcall_response_parse`. Responses owned by an
/// `FfiResult` are freed with the result instead. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn webcall_response_free(resp: *mut FfiResponse) {
    if !resp.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(resp) });
        });
    }
}

/// HTTP status, or 0 for null.
#[unsafe(no_mangle)]
pub extern "C" fn webcall_response_status(resp: *const FfiResponse) -> u16 {
    inspect(resp, 0, Response::status)
}

/// Header value looked up case-insensitively. Repeated fields come back
/// joined with ", ". Returns null when absent; free with
/// `webcall_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn webcall_response_header_field(resp: *const FfiResponse, name: *const c_char) -> *mut c_char {
    let Some(name) = str_arg(name) else {
        return std::ptr::null_mut();
    };
    inspect(resp, std::ptr::null_mut(), |r| match r.header_field(name) {
        Some(value) => into_c_string(value.joined()),
        None => std::ptr::null_mut(),
    })
}

/// Borrow the raw body. The pointer stays valid while the response lives;
/// its length is written to `out_len`.
#[unsafe(no_mangle)]
pub extern "C" fn webcall_response_raw_data(resp: *const FfiResponse, out_len: *mut usize) -> *const u8 {
    let (ptr, len) = inspect(resp, (std::ptr::null(), 0), |r| (r.raw_data().as_ptr(), r.raw_data().len()));
    if !out_len.is_null() {
        unsafe { *out_len = len };
    }
    ptr
}

#[unsafe(no_mangle)]
pub extern "C" fn webcall_response_is_multipart(resp: *const FfiResponse) -> bool {
    inspect(resp, false, Response::is_multipart)
}

/// Decoded body as text: JSON bodies are re-serialized compactly, anything
/// else is the raw body. Invalid JSON fails with `Decode`, and so does a raw
/// body containing a NUL byte, which a C string cannot carry; read binary
/// bodies with `webcall_response_raw_data`.
#[unsafe(no_mangle)]
pub extern "C" fn webcall_response_data(resp: *const FfiResponse) -> *mut FfiResult {
    if resp.is_null() {
        return FfiResult::null_arg("response");
    }
    let response = unsafe { &(*resp).inner };
    catch_unwind(AssertUnwindSafe(|| match response.data() {
        Ok(Data::Json(value)) => FfiResult::ok_text(value.to_string()),
        Ok(Data::Raw(bytes)) if bytes.contains(&0) => FfiResult::error(
            FfiErrorCode::Decode,
            "body contains NUL bytes; use webcall_response_raw_data",
        ),
        Ok(Data::Raw(bytes)) => FfiResult::ok_text(bytes.to_vec()),
        Err(e) => FfiResult::error(FfiErrorCode::Decode, &e.to_string()),
    }))
    .unwrap_or_else(|_| FfiResult::panic("panic in webcall_response_data"))
}

/// Transport info value for `key` as JSON text, or null when absent.
#[unsafe(no_mangle)]
pub extern "C" fn webcall_response_info(resp: *const FfiResponse, key: *const c_char) -> *mut c_char {
    let Some(key) = str_arg(key) else {
        return std::ptr::null_mut();
    };
    inspect(resp, std::ptr::null_mut(), |r| match r.info(key) {
        Some(value) => into_c_string(value.to_string()),
        None => std::ptr::null_mut(),
    })
}

/// Split a multipart body into responses, nested multiparts flattened.
///
/// On success `data_tag = ResponseList`. A non-multipart response or one
/// without a usable boundary fails with `NotMultipart`.
#[unsafe(no_mangle)]
pub extern "C" fn webcall_response_extract_multipart(resp: *const FfiResponse) -> *mut FfiResult {
    if resp.is_null() {
        return FfiResult::null_arg("response");
    }
    let response = unsafe { &(*resp).inner };
    catch_unwind(AssertUnwindSafe(|| match response.extract_multipart() {
        Some(parts) => FfiResult::ok_response_list(parts),
        None => FfiResult::error(FfiErrorCode::NotMultipart, "response is not multipart"),
    }))
    .unwrap_or_else(|_| FfiResult::panic("panic in webcall_response_extract_multipart"))
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiResult` and the payload it owns. Safe to call with null.
/// Uses `data_tag` to determine what `data` points to.
#[unsafe(no_mangle)]
pub extern "C" fn webcall_free_result(result: *mut FfiResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let result = unsafe { Box::from_raw(result) };
        if !result.error_message.is_null() {
            drop(unsafe { CString::from_raw(result.error_message) });
        }
        if result.data.is_null() {
            return;
        }
        match result.data_tag {
            FfiDataTag::Response => drop(unsafe { Box::from_raw(result.data as *mut FfiResponse) }),
            FfiDataTag::ResponseList => unsafe { free_response_list(result.data as *mut FfiResponseList) },
            FfiDataTag::Text => drop(unsafe { CString::from_raw(result.data as *mut c_char) }),
            FfiDataTag::None => {}
        }
    });
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn webcall_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { CString::from_raw(s) });
        });
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
