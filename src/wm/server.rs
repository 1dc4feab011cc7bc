//! Window server seam
//!
//! Everything the manager asks of the display server goes through
//! [`WindowServer`]. The X11 implementation lives in `wm::x11`.
//!
//! Queries about a window that no longer exists answer `Ok(None)` (or the
//! documented default), never an error: destruction races are routine.

use anyhow::Result;
use x11rb::protocol::xproto::{StackMode, Window};

use crate::shared::Geometry;
use crate::wm::events::Event;
use crate::wm::hints::{SizeHints, WmHints};
use crate::wm::keyboard::Keysym;

/// Attributes of a window, as reported when it asks to be mapped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowAttributes {
    pub geometry: Geometry,
    pub border_width: i32,
    pub override_redirect: bool,
    /// Map state is IsViewable
    pub viewable: bool,
}

/// WM_CLASS, split into its two strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassHint {
    pub instance: String,
    pub class: String,
}

/// ICCCM WM_STATE values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WmState {
    Withdrawn = 0,
    Normal = 1,
    Iconic = 3,
}

impl WmState {
    pub fn from_raw(value: u32) -> Option<Self> {
        match value {
            0 => Some(WmState::Withdrawn),
            1 => Some(WmState::Normal),
            3 => Some(WmState::Iconic),
            _ => None,
        }
    }
}

/// WM_PROTOCOLS entries we may deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    DeleteWindow,
    TakeFocus,
}

/// Subset of a ConfigureWindow request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowChanges {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub border_width: Option<i32>,
    pub sibling: Option<Window>,
    pub stack_mode: Option<StackMode>,
}

impl WindowChanges {
    /// Position, size and border in one request
    pub fn geometry(geometry: Geometry, border_width: i32) -> Self {
        Self {
            x: Some(geometry.x),
            y: Some(geometry.y),
            width: Some(geometry.width),
            height: Some(geometry.height),
            border_width: Some(border_width),
            ..Self::default()
        }
    }

    pub fn position(x: i32, y: i32) -> Self {
        Self { x: Some(x), y: Some(y), ..Self::default() }
    }

    pub fn move_resize(geometry: Geometry) -> Self {
        Self {
            x: Some(geometry.x),
            y: Some(geometry.y),
            width: Some(geometry.width),
            height: Some(geometry.height),
            ..Self::default()
        }
    }

    pub fn border(border_width: i32) -> Self {
        Self { border_width: Some(border_width), ..Self::default() }
    }
}

/// Display server operations used by the window manager core
pub trait WindowServer {
    // Screen and window queries

    /// Full screen size in pixels
    fn screen_size(&self) -> (i32, i32);
    fn window_attributes(&mut self, window: Window) -> Result<Option<WindowAttributes>>;
    /// Children of the root window, bottom to top
    fn query_tree(&mut self) -> Result<Vec<Window>>;
    fn transient_for(&mut self, window: Window) -> Result<Option<Window>>;
    fn class_hint(&mut self, window: Window) -> Result<Option<ClassHint>>;
    fn title(&mut self, window: Window) -> Result<Option<String>>;
    fn size_hints(&mut self, window: Window) -> Result<Option<SizeHints>>;
    fn wm_hints(&mut self, window: Window) -> Result<Option<WmHints>>;
    fn wm_state(&mut self, window: Window) -> Result<Option<WmState>>;
    /// _NET_WM_STATE holds _NET_WM_STATE_FULLSCREEN
    fn requests_fullscreen(&mut self, window: Window) -> Result<bool>;
    /// Pointer position relative to the root window
    fn query_pointer(&mut self) -> Result<Option<(i32, i32)>>;
    /// First keysym of a keycode in the cached keyboard mapping
    fn keysym(&self, keycode: u8) -> Option<Keysym>;
    /// Modifier bit currently carrying Num_Lock
    fn numlock_mask(&self) -> u16;

    // Client window requests

    fn configure(&mut self, window: Window, changes: &WindowChanges) -> Result<()>;
    fn set_border_color(&mut self, window: Window, pixel: u32) -> Result<()>;
    fn raise(&mut self, window: Window) -> Result<()>;
    fn map(&mut self, window: Window) -> Result<()>;
    /// Listen for focus and property changes on a client
    fn select_client_events(&mut self, window: Window) -> Result<()>;
    /// Replace button grabs: click-to-focus when unfocused, plus `bindings`
    fn grab_buttons(&mut self, window: Window, focused: bool, bindings: &[(u16, u8)]) -> Result<()>;
    /// Give a still-existing window back: restore its border, drop grabs, mark it Withdrawn.
    /// Runs under a server grab with errors ignored.
    fn release_window(&mut self, window: Window, border_width: i32) -> Result<()>;
    fn set_wm_state(&mut self, window: Window, state: WmState) -> Result<()>;
    fn set_fullscreen_state(&mut self, window: Window, fullscreen: bool) -> Result<()>;
    /// Synthetic ConfigureNotify describing the current geometry
    fn send_configure_notify(&mut self, window: Window, geometry: Geometry, border_width: i32) -> Result<()>;
    /// Deliver a WM_PROTOCOLS message if the window lists `protocol`.
    /// Returns whether it was sent.
    fn send_protocol(&mut self, window: Window, protocol: Protocol) -> Result<bool>;
    /// Forcibly disconnect the window's client
    fn kill_client(&mut self, window: Window) -> Result<()>;

    // Root window, focus and input

    /// Give input focus to `window`, or to the root when `None`
    fn set_input_focus(&mut self, window: Option<Window>) -> Result<()>;
    /// Set or delete _NET_ACTIVE_WINDOW
    fn set_active_window(&mut self, window: Option<Window>) -> Result<()>;
    fn append_client_list(&mut self, window: Window) -> Result<()>;
    fn set_client_list(&mut self, windows: &[Window]) -> Result<()>;
    /// Release a click frozen by a synchronous button grab
    fn allow_replay_pointer(&mut self) -> Result<()>;
    fn grab_keys(&mut self, keys: &[(u16, Keysym)]) -> Result<()>;
    fn refresh_keyboard_mapping(&mut self) -> Result<()>;
    /// Exclusive pointer grab on the root; false when another client holds it
    fn grab_pointer(&mut self) -> Result<bool>;
    fn ungrab_pointer(&mut self) -> Result<()>;
    fn warp_pointer(&mut self, window: Window, x: i32, y: i32) -> Result<()>;

    // Event queue

    fn poll_event(&mut self) -> Result<Option<Event>>;
    fn wait_event(&mut self) -> Result<Event>;
    fn flush(&mut self) -> Result<()>;
    /// Round trip: every request sent so far has been processed
    fn sync(&mut self) -> Result<()>;
    /// Undo the manager's root window setup before exit
    fn shutdown(&mut self) -> Result<()>;
}
