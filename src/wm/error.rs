//! Error types and the stale-handle whitelist
//!
//! Requests on a window that its owner destroyed a moment ago fail with a
//! small, known set of protocol errors. Those are routine; anything else is
//! a state the window manager cannot reason about and ends the process.

use thiserror::Error;
use x11rb::protocol::ErrorKind;
use x11rb::protocol::xproto::{
    CONFIGURE_WINDOW_REQUEST, COPY_AREA_REQUEST, GRAB_BUTTON_REQUEST, GRAB_KEY_REQUEST,
    POLY_FILL_RECTANGLE_REQUEST, POLY_SEGMENT_REQUEST, POLY_TEXT8_REQUEST,
    SET_INPUT_FOCUS_REQUEST,
};

#[derive(Debug, Error)]
pub enum WmError {
    #[error("another window manager is already running")]
    AnotherWmRunning,

    #[error("unexpected X error: request code={request}, error code={code} ({kind:?})")]
    Protocol { request: u8, code: u8, kind: ErrorKind },

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Protocol error reported asynchronously by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerError {
    /// Major opcode of the failed request
    pub request: u8,
    pub code: u8,
    pub kind: ErrorKind,
}

impl ServerError {
    pub fn is_stale_handle(&self) -> bool {
        is_stale_handle(self.request, self.kind)
    }
}

impl From<ServerError> for WmError {
    fn from(err: ServerError) -> Self {
        WmError::Protocol { request: err.request, code: err.code, kind: err.kind }
    }
}

/// Errors a request may legitimately hit when its target window is gone
pub fn is_stale_handle(request: u8, kind: ErrorKind) -> bool {
    if kind == ErrorKind::Window {
        return true;
    }
    matches!(
        (request, kind),
        (SET_INPUT_FOCUS_REQUEST, ErrorKind::Match)
            | (POLY_TEXT8_REQUEST, ErrorKind::Drawable)
            | (POLY_FILL_RECTANGLE_REQUEST, ErrorKind::Drawable)
            | (POLY_SEGMENT_REQUEST, ErrorKind::Drawable)
            | (CONFIGURE_WINDOW_REQUEST, ErrorKind::Match)
            | (GRAB_BUTTON_REQUEST, ErrorKind::Access)
            | (GRAB_KEY_REQUEST, ErrorKind::Access)
            | (COPY_AREA_REQUEST, ErrorKind::Drawable)
    )
}
