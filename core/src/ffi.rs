//! C FFI exports for cross-platform integration
//!
//! This module provides a C-compatible API that can be called from:
//! - Android via JNI
//! - iOS via Swift/Objective-C FFI
//!
//! A store is opened into an opaque [`LexiconHandle`] owned by the caller.
//! The handle is not thread-safe: every call for one handle must come from
//! the thread that opened it. Entities cross the boundary as JSON strings.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::path::Path;

use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, InternalError, StorageError, ValidationError};
use crate::provider::WordsProvider;
use crate::{Lexicon, NewWord, StoreConfig};

/// Error codes returned by FFI functions
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiError {
    /// Operation succeeded
    Success = 0,
    /// Null pointer passed as argument
    NullPointer = 1,
    /// Invalid UTF-8 string
    InvalidUtf8 = 2,
    /// Store could not be opened
    InitFailed = 3,
    /// Malformed argument, e.g. an id that is not a UUID
    InvalidArgument = 4,
    /// Required text was empty
    EmptyInput = 5,
    /// No entity with the given id
    NotFound = 6,
    /// Reading or writing the store failed
    StorageFailed = 7,
    /// Reading or writing a file failed
    IoFailed = 8,
    /// JSON serialization failed
    JsonFailed = 9,
    /// Any other failure
    Failed = 10,
}

impl From<Error> for FfiError {
    fn from(err: Error) -> Self {
        log::error!("{}: {}", err.title(), err);
        match err {
            Error::Storage(StorageError::InitFailed(_)) => FfiError::InitFailed,
            Error::Storage(_) => FfiError::StorageFailed,
            Error::Validation(_) => FfiError::InvalidArgument,
            Error::Internal(InternalError::InputCannotBeEmpty) => FfiError::EmptyInput,
            Error::Internal(InternalError::EntryNotFound(_)) => FfiError::NotFound,
            Error::Internal(InternalError::ImportFailed(_))
            | Error::Internal(InternalError::ExportFailed(_)) => FfiError::IoFailed,
            Error::Internal(_) | Error::Network(_) => FfiError::Failed,
        }
    }
}

/// An open store plus the word list the platform UI observes
pub struct LexiconHandle {
    lexicon: Lexicon,
    words: WordsProvider,
}

impl LexiconHandle {
    /// `":memory:"` opens an in-memory store
    fn open(db_path: &str) -> Result<Self, FfiError> {
        let config = if db_path == ":memory:" {
            StoreConfig::default()
        } else {
            StoreConfig::with_path(db_path)
        };
        Self::from_config(config)
    }

    fn from_config(config: StoreConfig) -> Result<Self, FfiError> {
        let lexicon = Lexicon::open(config)?;
        let words = lexicon.words_provider();
        Ok(Self { lexicon, words })
    }

    fn add_word(&mut self, text: &str, definition: &str) -> Result<String, FfiError> {
        let word = self.lexicon.words().add_new(NewWord::new(text, definition))?;
        self.lexicon.save()?;
        to_json(&word)
    }

    fn delete_word(&mut self, word_id: &str) -> Result<(), FfiError> {
        let id = parse_id(word_id)?;
        self.lexicon.words().delete(id)?;
        self.lexicon.save()?;
        Ok(())
    }

    fn list_words(&mut self) -> Result<String, FfiError> {
        self.words.fetch();
        to_json(self.words.items())
    }

    fn export_csv(&self, path: &str) -> Result<usize, FfiError> {
        Ok(self.lexicon.words().export_csv(Path::new(path))?)
    }

    fn import_csv(&mut self, path: &str) -> Result<String, FfiError> {
        let stats = self.lexicon.words().import_csv(Path::new(path), |_, _| {})?;
        self.lexicon.save()?;
        to_json(&stats)
    }
}

fn parse_id(id: &str) -> Result<Uuid, FfiError> {
    Uuid::parse_str(id).map_err(|e| {
        FfiError::from(Error::from(ValidationError::InvalidField {
            field: "id".to_string(),
            reason: e.to_string(),
        }))
    })
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, FfiError> {
    serde_json::to_string(value).map_err(|e| {
        log::error!("JSON serialization failed: {}", e);
        FfiError::JsonFailed
    })
}

unsafe fn c_str<'a>(ptr: *const c_char) -> Result<&'a str, FfiError> {
    if ptr.is_null() {
        return Err(FfiError::NullPointer);
    }
    CStr::from_ptr(ptr).to_str().map_err(|_| FfiError::InvalidUtf8)
}

unsafe fn handle_mut<'a>(handle: *mut LexiconHandle) -> Result<&'a mut LexiconHandle, FfiError> {
    handle.as_mut().ok_or(FfiError::NullPointer)
}

unsafe fn write_string(value: String, out: *mut *mut c_char) -> c_int {
    match CString::new(value) {
        Ok(s) => {
            *out = s.into_raw();
            FfiError::Success as c_int
        }
        Err(_) => FfiError::JsonFailed as c_int,
    }
}

fn code(result: Result<(), FfiError>) -> c_int {
    match result {
        Ok(()) => FfiError::Success as c_int,
        Err(e) => e as c_int,
    }
}

/// Open (or create) a store
///
/// # Safety
///
/// - `db_path` must be a valid null-terminated C string
/// - `out_handle` must be a valid pointer; on success it receives a handle
///   the caller must release with `lexicon_close`
///
/// # Returns
///
/// 0 on success, non-zero error code on failure.
#[no_mangle]
pub unsafe extern "C" fn lexicon_open(
    db_path: *const c_char,
    out_handle: *mut *mut LexiconHandle,
) -> c_int {
    if out_handle.is_null() {
        return FfiError::NullPointer as c_int;
    }
    let path = match c_str(db_path) {
        Ok(p) => p,
        Err(e) => return e as c_int,
    };

    match LexiconHandle::open(path) {
        Ok(handle) => {
            *out_handle = Box::into_raw(Box::new(handle));
            FfiError::Success as c_int
        }
        Err(e) => e as c_int,
    }
}

/// Close a store and free the handle
///
/// Unsaved changes are discarded.
///
/// # Safety
///
/// `handle` must come from `lexicon_open` and not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn lexicon_close(handle: *mut LexiconHandle) -> c_int {
    if handle.is_null() {
        return FfiError::NullPointer as c_int;
    }
    drop(Box::from_raw(handle));
    FfiError::Success as c_int
}

/// Add a word and save
///
/// # Safety
///
/// - `handle` must come from `lexicon_open`
/// - `text` and `definition` must be valid null-terminated C strings
/// - On success `*out_json` receives the new word as JSON; free it with
///   `lexicon_free_string`
#[no_mangle]
pub unsafe extern "C" fn lexicon_add_word(
    handle: *mut LexiconHandle,
    text: *const c_char,
    definition: *const c_char,
    out_json: *mut *mut c_char,
) -> c_int {
    if out_json.is_null() {
        return FfiError::NullPointer as c_int;
    }
    let result = handle_mut(handle).and_then(|h| {
        let text = c_str(text)?;
        let definition = c_str(definition)?;
        h.add_word(text, definition)
    });
    match result {
        Ok(json) => write_string(json, out_json),
        Err(e) => e as c_int,
    }
}

/// Delete a word by id and save
///
/// # Safety
///
/// `handle` must come from `lexicon_open`; `word_id` must be a valid
/// null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn lexicon_delete_word(
    handle: *mut LexiconHandle,
    word_id: *const c_char,
) -> c_int {
    code(handle_mut(handle).and_then(|h| h.delete_word(c_str(word_id)?)))
}

/// List all words, newest first, as a JSON array
///
/// # Safety
///
/// `handle` must come from `lexicon_open`; `out_json` must be valid and
/// the returned string freed with `lexicon_free_string`.
#[no_mangle]
pub unsafe extern "C" fn lexicon_list_words(
    handle: *mut LexiconHandle,
    out_json: *mut *mut c_char,
) -> c_int {
    if out_json.is_null() {
        return FfiError::NullPointer as c_int;
    }
    match handle_mut(handle).and_then(|h| h.list_words()) {
        Ok(json) => write_string(json, out_json),
        Err(e) => e as c_int,
    }
}

/// Re-fetch the word list if the store changed since the last poll
///
/// # Safety
///
/// `handle` must come from `lexicon_open`; `out_changed` must be valid.
/// It receives 1 if the list was re-fetched, 0 otherwise.
#[no_mangle]
pub unsafe extern "C" fn lexicon_poll_changes(
    handle: *mut LexiconHandle,
    out_changed: *mut c_int,
) -> c_int {
    if out_changed.is_null() {
        return FfiError::NullPointer as c_int;
    }
    match handle_mut(handle) {
        Ok(h) => {
            *out_changed = h.words.process_notifications() as c_int;
            FfiError::Success as c_int
        }
        Err(e) => e as c_int,
    }
}

/// Write every word to a CSV file (gzip if the path ends in `.gz`)
///
/// # Safety
///
/// `handle` must come from `lexicon_open`; `path` must be a valid
/// null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn lexicon_export_csv(
    handle: *mut LexiconHandle,
    path: *const c_char,
) -> c_int {
    code(handle_mut(handle).and_then(|h| h.export_csv(c_str(path)?).map(|_| ())))
}

/// Import a CSV file and save; `*out_json` receives the import statistics
///
/// # Safety
///
/// Same rules as `lexicon_add_word`.
#[no_mangle]
pub unsafe extern "C" fn lexicon_import_csv(
    handle: *mut LexiconHandle,
    path: *const c_char,
    out_json: *mut *mut c_char,
) -> c_int {
    if out_json.is_null() {
        return FfiError::NullPointer as c_int;
    }
    match handle_mut(handle).and_then(|h| h.import_csv(c_str(path)?)) {
        Ok(json) => write_string(json, out_json),
        Err(e) => e as c_int,
    }
}

/// Free a string returned by a lexicon_* function
///
/// # Safety
///
/// `ptr` must be a pointer returned by a lexicon_* function, or null.
#[no_mangle]
pub unsafe extern "C" fn lexicon_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

/// Get the library version
///
/// # Safety
///
/// Returns a pointer to a static string. Do not free this pointer.
#[no_mangle]
pub extern "C" fn lexicon_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

// ============================================================================
// JNI bindings for Android
// ============================================================================

#[cfg(target_os = "android")]
mod android {
    use std::ptr;

    use jni::objects::{JClass, JString};
    use jni::sys::{jint, jlong, jstring};
    use jni::JNIEnv;

    use super::*;

    fn get_string(env: &mut JNIEnv, value: &JString) -> Result<String, FfiError> {
        env.get_string(value)
            .map(|s| s.into())
            .map_err(|_| FfiError::InvalidUtf8)
    }

    unsafe fn from_jlong<'a>(handle: jlong) -> Result<&'a mut LexiconHandle, FfiError> {
        handle_mut(handle as *mut LexiconHandle)
    }

    fn to_jstring(env: &JNIEnv, result: Result<String, FfiError>) -> jstring {
        match result.and_then(|json| env.new_string(json).map_err(|_| FfiError::JsonFailed)) {
            Ok(s) => s.into_raw(),
            Err(_) => ptr::null_mut(),
        }
    }

    /// JNI: Open a store
    ///
    /// Kotlin signature: external fun open(dbPath: String): Long
    /// Returns 0 on failure.
    #[no_mangle]
    pub extern "system" fn Java_org_example_lexicon_LexiconCore_open(
        mut env: JNIEnv,
        _class: JClass,
        db_path: JString,
    ) -> jlong {
        let handle = get_string(&mut env, &db_path).and_then(|path| LexiconHandle::open(&path));
        match handle {
            Ok(handle) => Box::into_raw(Box::new(handle)) as jlong,
            Err(_) => 0,
        }
    }

    /// JNI: Close a store
    ///
    /// Kotlin signature: external fun close(handle: Long)
    #[no_mangle]
    pub extern "system" fn Java_org_example_lexicon_LexiconCore_close(
        _env: JNIEnv,
        _class: JClass,
        handle: jlong,
    ) {
        unsafe {
            lexicon_close(handle as *mut LexiconHandle);
        }
    }

    /// JNI: Add a word and save
    ///
    /// Kotlin signature: external fun addWord(handle: Long, text: String, definition: String): String?
    #[no_mangle]
    pub extern "system" fn Java_org_example_lexicon_LexiconCore_addWord(
        mut env: JNIEnv,
        _class: JClass,
        handle: jlong,
        text: JString,
        definition: JString,
    ) -> jstring {
        let result = (|| {
            let text = get_string(&mut env, &text)?;
            let definition = get_string(&mut env, &definition)?;
            unsafe { from_jlong(handle)? }.add_word(&text, &definition)
        })();
        to_jstring(&env, result)
    }

    /// JNI: Delete a word and save
    ///
    /// Kotlin signature: external fun deleteWord(handle: Long, id: String): Int
    #[no_mangle]
    pub extern "system" fn Java_org_example_lexicon_LexiconCore_deleteWord(
        mut env: JNIEnv,
        _class: JClass,
        handle: jlong,
        word_id: JString,
    ) -> jint {
        let result = get_string(&mut env, &word_id)
            .and_then(|id| unsafe { from_jlong(handle)? }.delete_word(&id));
        code(result) as jint
    }

    /// JNI: List words as JSON
    ///
    /// Kotlin signature: external fun listWords(handle: Long): String?
    #[no_mangle]
    pub extern "system" fn Java_org_example_lexicon_LexiconCore_listWords(
        env: JNIEnv,
        _class: JClass,
        handle: jlong,
    ) -> jstring {
        let result = unsafe { from_jlong(handle) }.and_then(|h| h.list_words());
        to_jstring(&env, result)
    }

    /// JNI: Export words to CSV
    ///
    /// Kotlin signature: external fun exportCsv(handle: Long, path: String): Int
    #[no_mangle]
    pub extern "system" fn Java_org_example_lexicon_LexiconCore_exportCsv(
        mut env: JNIEnv,
        _class: JClass,
        handle: jlong,
        path: JString,
    ) -> jint {
        let result = get_string(&mut env, &path)
            .and_then(|path| unsafe { from_jlong(handle)? }.export_csv(&path).map(|_| ()));
        code(result) as jint
    }

    /// Called when the native library is loaded by System.loadLibrary()
    ///
    /// This sets up:
    /// - Android logging (so log::* macros appear in logcat)
    /// - Panic hook (to log panics before they crash the app)
    #[no_mangle]
    pub extern "system" fn JNI_OnLoad(_vm: jni::JavaVM, _reserved: *mut std::ffi::c_void) -> jint {
        android_logger::init_once(
            android_logger::Config::default()
                .with_max_level(log::LevelFilter::Debug)
                .with_tag("LexiconCore"),
        );

        std::panic::set_hook(Box::new(|info| {
            let msg = if let Some(s) = info.payload().downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = info.payload().downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };

            let location = info
                .location()
                .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
                .unwrap_or_else(|| "unknown".to_string());

            log::error!("PANIC at {}: {}", location, msg);
        }));

        log::info!("LexiconCore native library loaded");

        jni::sys::JNI_VERSION_1_6
    }
}
