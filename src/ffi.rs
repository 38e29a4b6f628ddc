//! FFI bindings for Mien
//!
//! This module provides C-compatible functions for calling Mien from other
//! languages. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using `mien_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::engine::AnalysisEngine;
use crate::pipeline::analyze_json;
use crate::types::BatchPolicy;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Analyze a JSON frame batch in one shot and return the outcome JSON.
///
/// The input is the submission payload shape:
/// `{"session_id": "...", "frames": [...]}` (session id optional).
///
/// # Safety
/// - `batch_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `mien_free_string`.
/// - Returns NULL on error; call `mien_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn mien_analyze_session(batch_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(batch_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    match analyze_json(&json_str) {
        Ok(outcome) => string_to_cstr(&outcome),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Session Engine API
// ============================================================================

/// Opaque handle to an AnalysisEngine
pub struct MienEngineHandle {
    engine: AnalysisEngine,
}

/// Create a new AnalysisEngine.
///
/// `skip_invalid` selects the batch policy: 0 rejects a whole batch on the
/// first invalid frame, non-zero drops invalid frames and keeps the rest.
///
/// # Safety
/// - Returns a pointer to a newly allocated engine.
/// - Must be freed with `mien_engine_free`.
#[no_mangle]
pub unsafe extern "C" fn mien_engine_new(skip_invalid: i32) -> *mut MienEngineHandle {
    clear_last_error();

    let policy = if skip_invalid == 0 {
        BatchPolicy::AbortOnError
    } else {
        BatchPolicy::SkipInvalid
    };

    let engine = AnalysisEngine::with_policy(policy);
    let handle = Box::new(MienEngineHandle { engine });
    Box::into_raw(handle)
}

/// Free an AnalysisEngine.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `mien_engine_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn mien_engine_free(engine: *mut MienEngineHandle) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

/// Open a new session and return its generated identifier.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `mien_engine_new`.
/// - Returns a newly allocated string that must be freed with `mien_free_string`.
/// - Returns NULL on error.
#[no_mangle]
pub unsafe extern "C" fn mien_engine_open_session(engine: *mut MienEngineHandle) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }

    let handle = &*engine;
    let session_id = handle.engine.open_session();
    string_to_cstr(&session_id)
}

/// Submit a JSON array of landmark frames to the named session.
///
/// The session is created on first submission.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `mien_engine_new`.
/// - `session_id` and `frames_json` must be valid null-terminated C strings.
/// - Returns the number of frames appended, or -1 on error; call
///   `mien_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn mien_engine_submit(
    engine: *mut MienEngineHandle,
    session_id: *const c_char,
    frames_json: *const c_char,
) -> i32 {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }

    let handle = &*engine;

    let session_str = match cstr_to_string(session_id) {
        Some(s) => s,
        None => {
            set_last_error("Invalid session_id string pointer");
            return -1;
        }
    };

    let frames_str = match cstr_to_string(frames_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid frames JSON string pointer");
            return -1;
        }
    };

    match handle.engine.submit_frames_json(&session_str, &frames_str) {
        Ok(processed) => processed as i32,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Finalize the named session and return the outcome JSON.
///
/// Tears the session down; a subsequent submission to the same id starts a
/// fresh session.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `mien_engine_new`.
/// - `session_id` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `mien_free_string`.
/// - Returns NULL on error; call `mien_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn mien_engine_finalize(
    engine: *mut MienEngineHandle,
    session_id: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }

    let handle = &*engine;

    let session_str = match cstr_to_string(session_id) {
        Some(s) => s,
        None => {
            set_last_error("Invalid session_id string pointer");
            return ptr::null_mut();
        }
    };

    match handle.engine.finalize_session_json(&session_str) {
        Ok(outcome) => string_to_cstr(&outcome),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Mien functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Mien function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn mien_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Mien function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn mien_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Mien library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn mien_version() -> *const c_char {
    // Use a static CString to avoid allocation
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
