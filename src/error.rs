use std::cell::RefCell;
use std::ffi::{c_char, CString};

/// Errors surfaced by the pose/configuration engine.
///
/// None of these are fatal: a failed profile operation leaves the live
/// parameters untouched and the device keeps running.
#[derive(Debug, thiserror::Error)]
pub enum StereoHmdError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No profile found for {0}")]
    ProfileNotFound(String),

    #[error("Profile corrupt or missing fields for {app}: {reason}")]
    ProfileSchema { app: String, reason: String },

    #[error("No application profile selected")]
    NoApplication,

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Device already active")]
    AlreadyActive,

    #[error("Device not active")]
    NotActive,

    #[error("Failed to spawn worker thread: {0}")]
    ThreadSpawn(String),
}

thread_local! {
    static LAST_MESSAGE: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Per-thread last-error storage for the C FFI layer.
///
/// Each thread sees only the errors its own calls produced, and a pointer
/// from [`as_ptr`](Self::as_ptr) stays valid until that thread's next
/// `set` or `clear`.
pub(crate) struct LastError;

impl LastError {
    pub const fn new() -> Self {
        Self
    }

    pub fn set(&self, err: &StereoHmdError) {
        let message = CString::new(err.to_string().replace('\0', "")).unwrap_or_default();
        LAST_MESSAGE.with(|slot| *slot.borrow_mut() = Some(message));
    }

    pub fn clear(&self) {
        LAST_MESSAGE.with(|slot| *slot.borrow_mut() = None);
    }

    pub fn as_ptr(&self) -> *const c_char {
        LAST_MESSAGE.with(|slot| {
            slot.borrow()
                .as_ref()
                .map_or(std::ptr::null(), |message| message.as_ptr())
        })
    }
}
