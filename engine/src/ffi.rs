//! FFI layer for non-Rust clients.
//!
//! This module provides C-compatible functions so a client written in another
//! language (Dart, Swift, Kotlin, ...) can reuse the exact merge semantics.
//! All data crosses the boundary as JSON strings.
//!
//! # Memory Management
//!
//! - Strings returned by `tether_*` functions are allocated by Rust
//! - Caller must free them with `tether_string_free`
//! - Schema pointers must be freed with `tether_schema_free`
//!
//! # Error Handling
//!
//! Functions return JSON with either:
//! - `{"ok": <result>}` on success
//! - `{"error": "<message>"}` on failure

use crate::{group_by_identity, Document, MergeEngine, MergeSchema, PendingQueue};
use std::ffi::{c_char, CStr, CString};
use std::ptr;

/// Result wrapper for FFI responses.
#[derive(serde::Serialize)]
#[serde(untagged)]
enum FfiResult<T: serde::Serialize> {
    Ok { ok: T },
    Err { error: String },
}

impl<T: serde::Serialize> FfiResult<T> {
    fn ok(value: T) -> Self {
        FfiResult::Ok { ok: value }
    }

    fn err(message: impl Into<String>) -> Self {
        FfiResult::Err {
            error: message.into(),
        }
    }

    fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error":"serialization failed: {}"}}"#, e))
    }
}

/// Convert a Rust string to a C string pointer.
/// Caller must free with `tether_string_free`.
fn to_c_string(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(cs) => cs.into_raw(),
        Err(_) => CString::new(r#"{"error":"string contained null bytes"}"#)
            .unwrap_or_default()
            .into_raw(),
    }
}

/// Convert a C string pointer to a Rust string.
/// Returns None if pointer is null or invalid UTF-8.
unsafe fn from_c_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Parse a JSON object argument into a document.
unsafe fn document_arg(ptr: *const c_char, name: &str) -> Result<Document, String> {
    let raw = from_c_string(ptr).ok_or_else(|| format!("invalid {} JSON", name))?;
    serde_json::from_str(&raw).map_err(|e| format!("{} parse error: {}", name, e))
}

fn error_string(message: impl Into<String>) -> *mut c_char {
    to_c_string(FfiResult::<()>::err(message).to_json())
}

// ============================================================================
// Schema Lifecycle
// ============================================================================

/// Create a merge schema from JSON.
///
/// # Returns
/// Pointer to MergeSchema, or null on failure.
///
/// # Safety
/// - `schema_json` must be a valid null-terminated C string or null
/// - Caller must free the returned pointer with `tether_schema_free`
#[no_mangle]
pub unsafe extern "C" fn tether_schema_new(schema_json: *const c_char) -> *mut MergeSchema {
    let schema_str = match from_c_string(schema_json) {
        Some(s) => s,
        None => return ptr::null_mut(),
    };

    match MergeSchema::from_json(&schema_str) {
        Ok(schema) => Box::into_raw(Box::new(schema)),
        Err(_) => ptr::null_mut(),
    }
}

/// Free a schema.
///
/// # Safety
/// - `schema` must be a valid pointer from `tether_schema_new`
/// - Must not be called twice on the same pointer
#[no_mangle]
pub unsafe extern "C" fn tether_schema_free(schema: *mut MergeSchema) {
    if !schema.is_null() {
        drop(Box::from_raw(schema));
    }
}

/// Free a string allocated by the engine.
///
/// # Safety
/// - `s` must be a valid pointer from a `tether_*` function
/// - Must not be called twice on the same pointer
#[no_mangle]
pub unsafe extern "C" fn tether_string_free(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

// ============================================================================
// Merge Operations
// ============================================================================

/// Merge `overlay` into `base`.
///
/// # Returns
/// JSON string: `{"ok": Document}` or `{"error": "message"}`
///
/// # Safety
/// - `schema` must be a valid pointer from `tether_schema_new` or null
/// - `base_json` and `overlay_json` must be valid null-terminated C strings or null
/// - Caller must free the returned string with `tether_string_free`
#[no_mangle]
pub unsafe extern "C" fn tether_merge(
    schema: *const MergeSchema,
    base_json: *const c_char,
    overlay_json: *const c_char,
) -> *mut c_char {
    let schema = match schema.as_ref() {
        Some(s) => s,
        None => return error_string("null schema pointer"),
    };

    let base = match document_arg(base_json, "base") {
        Ok(d) => d,
        Err(e) => return error_string(e),
    };

    let overlay = match document_arg(overlay_json, "overlay") {
        Ok(d) => d,
        Err(e) => return error_string(e),
    };

    let merged = MergeEngine::new(schema).merge(&base, &overlay);
    to_c_string(FfiResult::ok(merged).to_json())
}

/// Validate a patch against the schema.
///
/// # Returns
/// JSON string: `{"ok": null}` or `{"error": "message"}`
///
/// # Safety
/// - `schema` must be a valid pointer from `tether_schema_new` or null
/// - `patch_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `tether_string_free`
#[no_mangle]
pub unsafe extern "C" fn tether_validate_patch(
    schema: *const MergeSchema,
    patch_json: *const c_char,
) -> *mut c_char {
    let schema = match schema.as_ref() {
        Some(s) => s,
        None => return error_string("null schema pointer"),
    };

    let patch = match document_arg(patch_json, "patch") {
        Ok(d) => d,
        Err(e) => return error_string(e),
    };

    match schema.validate_patch(&patch) {
        Ok(()) => to_c_string(FfiResult::ok(()).to_json()),
        Err(e) => error_string(e.to_string()),
    }
}

/// Fold a serialized queue into one patch per identity.
///
/// # Returns
/// JSON string: `{"ok": [[identity, Document], ...]}` or `{"error": "message"}`
///
/// # Safety
/// - `schema` must be a valid pointer from `tether_schema_new` or null
/// - `queue_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `tether_string_free`
#[no_mangle]
pub unsafe extern "C" fn tether_group_by_identity(
    schema: *const MergeSchema,
    queue_json: *const c_char,
) -> *mut c_char {
    let schema = match schema.as_ref() {
        Some(s) => s,
        None => return error_string("null schema pointer"),
    };

    let queue_str = match from_c_string(queue_json) {
        Some(s) => s,
        None => return error_string("invalid queue JSON"),
    };

    let queue = match PendingQueue::from_json(&queue_str) {
        Ok(q) => q,
        Err(e) => return error_string(e.to_string()),
    };

    let grouped = group_by_identity(&MergeEngine::new(schema), queue.entries());
    to_c_string(FfiResult::ok(grouped).to_json())
}

/// Get the engine version.
///
/// # Returns
/// Static string pointer (do not free)
#[no_mangle]
pub extern "C" fn tether_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn test_schema_json() -> CString {
        CString::new(r#"{"fields": {"dailyStats": "sum", "favorites": "union"}}"#).unwrap()
    }

    unsafe fn take_json(result: *mut c_char) -> serde_json::Value {
        let text = CStr::from_ptr(result).to_str().unwrap().to_string();
        tether_string_free(result);
        serde_json::from_str(&text).unwrap()
    }

    #[test]
    fn ffi_schema_lifecycle() {
        unsafe {
            let json = test_schema_json();
            let schema = tether_schema_new(json.as_ptr());
            assert!(!schema.is_null());
            tether_schema_free(schema);

            let bad = CString::new("not json").unwrap();
            assert!(tether_schema_new(bad.as_ptr()).is_null());
            assert!(tether_schema_new(ptr::null()).is_null());
        }
    }

    #[test]
    fn ffi_merge() {
        unsafe {
            let json = test_schema_json();
            let schema = tether_schema_new(json.as_ptr());

            let base = CString::new(
                r#"{"favorites": ["km"], "dailyStats": {"2024-07-01": {"c": 2}}, "name": "X"}"#,
            )
            .unwrap();
            let overlay = CString::new(
                r#"{"favorites": ["mi"], "dailyStats": {"2024-07-01": {"c": 3}}, "name": "Y"}"#,
            )
            .unwrap();

            let result = take_json(tether_merge(schema, base.as_ptr(), overlay.as_ptr()));
            assert_eq!(
                result,
                serde_json::json!({"ok": {
                    "favorites": ["km", "mi"],
                    "dailyStats": {"2024-07-01": {"c": 5}},
                    "name": "Y",
                }})
            );

            tether_schema_free(schema);
        }
    }

    #[test]
    fn ffi_validate_patch() {
        unsafe {
            let json = test_schema_json();
            let schema = tether_schema_new(json.as_ptr());

            let good = CString::new(r#"{"favorites": ["km"]}"#).unwrap();
            let result = take_json(tether_validate_patch(schema, good.as_ptr()));
            assert_eq!(result, serde_json::json!({"ok": null}));

            let bad = CString::new(r#"{"favorites": "km"}"#).unwrap();
            let result = take_json(tether_validate_patch(schema, bad.as_ptr()));
            assert!(result["error"].as_str().unwrap().contains("favorites"));

            tether_schema_free(schema);
        }
    }

    #[test]
    fn ffi_group_by_identity() {
        unsafe {
            let json = test_schema_json();
            let schema = tether_schema_new(json.as_ptr());

            let queue = CString::new(
                r#"[
                    {"id": "e1", "identity": "u1", "patch": {"dailyStats": {"d": {"c": 1}}}, "enqueuedAt": 1},
                    {"id": "e2", "identity": "u1", "patch": {"dailyStats": {"d": {"c": 1}}}, "enqueuedAt": 2}
                ]"#,
            )
            .unwrap();

            let result = take_json(tether_group_by_identity(schema, queue.as_ptr()));
            assert_eq!(
                result,
                serde_json::json!({"ok": [["u1", {"dailyStats": {"d": {"c": 2}}}]]})
            );

            tether_schema_free(schema);
        }
    }

    #[test]
    fn ffi_version() {
        unsafe {
            let version = tether_version();
            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert_eq!(version_str, env!("CARGO_PKG_VERSION"));
        }
    }

    #[test]
    fn ffi_error_handling() {
        unsafe {
            // Null schema pointer
            let doc = CString::new("{}").unwrap();
            let result = take_json(tether_merge(ptr::null(), doc.as_ptr(), doc.as_ptr()));
            assert!(result.get("error").is_some());

            // Invalid JSON
            let json = test_schema_json();
            let schema = tether_schema_new(json.as_ptr());
            let invalid = CString::new("not valid json").unwrap();
            let result = take_json(tether_merge(schema, invalid.as_ptr(), doc.as_ptr()));
            assert!(result["error"].as_str().unwrap().contains("base"));

            // Non-object document
            let array = CString::new("[1, 2]").unwrap();
            let result = take_json(tether_merge(schema, doc.as_ptr(), array.as_ptr()));
            assert!(result.get("error").is_some());

            tether_schema_free(schema);
        }
    }
}
