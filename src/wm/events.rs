//! Event dispatch
//!
//! Server events are translated by the backend into [`Event`] and routed
//! through a single match in [`WindowManager::handle_event`]. Each handler
//! runs to completion before the next event is fetched.

use anyhow::Result;
use bitflags::bitflags;
use tracing::{debug, error, trace};
use x11rb::protocol::xproto::{StackMode, Window};

use crate::config::Click;
use crate::wm::error::{ServerError, WmError};
use crate::wm::registry::ClientId;
use crate::wm::server::{WindowChanges, WindowServer, WmState};
use crate::wm::WindowManager;

bitflags! {
    /// ConfigureRequest value-mask bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ConfigMask: u16 {
        const X            = 1 << 0;
        const Y            = 1 << 1;
        const WIDTH        = 1 << 2;
        const HEIGHT       = 1 << 3;
        const BORDER_WIDTH = 1 << 4;
        const SIBLING      = 1 << 5;
        const STACK_MODE   = 1 << 6;
    }
}

/// A window asking to change its geometry, border or stacking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigureRequest {
    pub window: Window,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub border_width: i32,
    pub sibling: Window,
    pub stack_mode: StackMode,
    pub mask: ConfigMask,
}

impl ConfigureRequest {
    /// Only the fields named by the mask
    pub fn changes(&self) -> WindowChanges {
        let pick = |flag: ConfigMask, v: i32| self.mask.contains(flag).then_some(v);
        WindowChanges {
            x: pick(ConfigMask::X, self.x),
            y: pick(ConfigMask::Y, self.y),
            width: pick(ConfigMask::WIDTH, self.width),
            height: pick(ConfigMask::HEIGHT, self.height),
            border_width: pick(ConfigMask::BORDER_WIDTH, self.border_width),
            sibling: self.mask.contains(ConfigMask::SIBLING).then_some(self.sibling),
            stack_mode: self.mask.contains(ConfigMask::STACK_MODE).then_some(self.stack_mode),
        }
    }
}

/// Properties whose changes we act on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    NormalHints,
    Hints,
    WindowType,
    Other,
}

/// _NET_WM_STATE client message action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateAction {
    Remove,
    Add,
    Toggle,
}

impl StateAction {
    pub fn from_raw(value: u32) -> Self {
        match value {
            1 => StateAction::Add,
            2 => StateAction::Toggle,
            _ => StateAction::Remove,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ButtonPress { window: Window, state: u16, button: u8 },
    ButtonRelease,
    /// Pointer motion with root-relative coordinates
    MotionNotify { root_x: i32, root_y: i32, time: u32 },
    KeyPress { keycode: u8, state: u16 },
    ConfigureRequest(ConfigureRequest),
    /// The root window changed size
    RootConfigured { width: i32, height: i32 },
    MapRequest { window: Window },
    DestroyNotify { window: Window },
    UnmapNotify { window: Window, synthetic: bool },
    PropertyNotify { window: Window, property: PropertyKind, deleted: bool },
    /// _NET_WM_STATE message naming _NET_WM_STATE_FULLSCREEN
    FullscreenRequest { window: Window, action: StateAction },
    FocusIn { window: Window },
    MappingNotify { keyboard: bool },
    Error(ServerError),
    Other,
}

impl<S: WindowServer> WindowManager<S> {
    /// Route one event to its handler
    pub fn handle_event(&mut self, event: Event) -> Result<()> {
        match event {
            Event::ButtonPress { window, state, button } => self.on_button_press(window, state, button),
            Event::KeyPress { keycode, state } => self.on_key_press(keycode, state),
            Event::ConfigureRequest(request) => self.on_configure_request(&request),
            Event::RootConfigured { width, height } => self.on_root_configured(width, height),
            Event::MapRequest { window } => self.on_map_request(window),
            Event::DestroyNotify { window } => self.on_destroy_notify(window),
            Event::UnmapNotify { window, synthetic } => self.on_unmap_notify(window, synthetic),
            Event::PropertyNotify { window, property, deleted } => {
                self.on_property_notify(window, property, deleted)
            }
            Event::FullscreenRequest { window, action } => self.on_fullscreen_request(window, action),
            Event::FocusIn { window } => self.on_focus_in(window),
            Event::MappingNotify { keyboard } => self.on_mapping_notify(keyboard),
            Event::Error(err) => self.on_error(err),
            Event::ButtonRelease | Event::MotionNotify { .. } | Event::Other => Ok(()),
        }
    }

    fn on_button_press(&mut self, window: Window, state: u16, button: u8) -> Result<()> {
        let mut click = Click::RootWindow;
        if let Some(id) = self.clients.lookup(window) {
            self.focus(Some(id))?;
            self.restack()?;
            self.server.allow_replay_pointer()?;
            click = Click::ClientWindow;
        }
        let numlock = self.server.numlock_mask();
        for action in self.bindings.button_actions(click, button, state, numlock) {
            self.run_action(action)?;
        }
        Ok(())
    }

    fn on_key_press(&mut self, keycode: u8, state: u16) -> Result<()> {
        let Some(keysym) = self.server.keysym(keycode) else {
            return Ok(());
        };
        let numlock = self.server.numlock_mask();
        for action in self.bindings.key_actions(keysym, state, numlock) {
            self.run_action(action)?;
        }
        Ok(())
    }

    pub(crate) fn on_configure_request(&mut self, request: &ConfigureRequest) -> Result<()> {
        let Some(id) = self.clients.lookup(request.window) else {
            trace!("Passing through configure request for unmanaged window {}", request.window);
            self.server.configure(request.window, &request.changes())?;
            return self.server.sync();
        };
        let (mw, mh) = self.monitor.area();
        let visible = self.is_visible(id);
        let Some(c) = self.clients.get_mut(id) else {
            return Ok(());
        };
        let mask = request.mask;

        if mask.contains(ConfigMask::BORDER_WIDTH) {
            c.border_width = request.border_width;
            return self.server.sync();
        }

        if mask.contains(ConfigMask::X) {
            c.old_geometry.x = c.geometry.x;
            c.geometry.x = request.x;
        }
        if mask.contains(ConfigMask::Y) {
            c.old_geometry.y = c.geometry.y;
            c.geometry.y = request.y;
        }
        if mask.contains(ConfigMask::WIDTH) {
            c.old_geometry.width = c.geometry.width;
            c.geometry.width = request.width;
        }
        if mask.contains(ConfigMask::HEIGHT) {
            c.old_geometry.height = c.geometry.height;
            c.geometry.height = request.height;
        }
        if c.geometry.x + c.geometry.width > mw {
            c.geometry.x = mw / 2 - c.outer_width() / 2;
        }
        if c.geometry.y + c.geometry.height > mh {
            c.geometry.y = mh / 2 - c.outer_height() / 2;
        }
        let (window, geometry) = (c.window, c.geometry);
        debug!("Client {} configure request -> {:?}", window, geometry);

        let moved = mask.intersects(ConfigMask::X | ConfigMask::Y);
        let resized = mask.intersects(ConfigMask::WIDTH | ConfigMask::HEIGHT);
        if moved && !resized {
            self.send_configure(id)?;
        }
        if visible {
            self.server.configure(window, &WindowChanges::move_resize(geometry))?;
        }
        self.server.sync()
    }

    fn on_root_configured(&mut self, width: i32, height: i32) -> Result<()> {
        let reserve = &self.config.reserve;
        self.monitor.width = width - reserve.x as i32;
        self.monitor.height = height - reserve.y as i32;
        self.monitor.screen_width = width;
        self.focus(None)?;
        self.arrange(false)
    }

    pub(crate) fn on_map_request(&mut self, window: Window) -> Result<()> {
        let Some(attributes) = self.server.window_attributes(window)? else {
            return Ok(());
        };
        if attributes.override_redirect || self.clients.lookup(window).is_some() {
            return Ok(());
        }
        self.manage(window, &attributes)
    }

    fn on_destroy_notify(&mut self, window: Window) -> Result<()> {
        match self.clients.lookup(window) {
            Some(id) => self.unmanage(id, true),
            None => Ok(()),
        }
    }

    fn on_unmap_notify(&mut self, window: Window, synthetic: bool) -> Result<()> {
        let Some(id) = self.clients.lookup(window) else {
            return Ok(());
        };
        if synthetic {
            debug!("Client {} withdrew itself", window);
            self.server.set_wm_state(window, WmState::Withdrawn)
        } else {
            self.unmanage(id, false)
        }
    }

    fn on_property_notify(&mut self, window: Window, property: PropertyKind, deleted: bool) -> Result<()> {
        if deleted {
            return Ok(());
        }
        let Some(id) = self.clients.lookup(window) else {
            return Ok(());
        };
        match property {
            PropertyKind::NormalHints => {
                if let Some(c) = self.clients.get_mut(id) {
                    c.hints.valid = false;
                }
                Ok(())
            }
            PropertyKind::Hints => self.update_wm_hints(id),
            PropertyKind::WindowType => self.update_window_type(id),
            PropertyKind::Other => Ok(()),
        }
    }

    fn on_fullscreen_request(&mut self, window: Window, action: StateAction) -> Result<()> {
        let Some(id) = self.clients.lookup(window) else {
            return Ok(());
        };
        let is_fullscreen = self.clients.get(id).is_some_and(|c| c.is_fullscreen());
        let fullscreen = match action {
            StateAction::Add => true,
            StateAction::Toggle => !is_fullscreen,
            StateAction::Remove => false,
        };
        self.set_fullscreen(id, fullscreen)
    }

    /// Some clients take focus on their own; hand it back to the focused client
    fn on_focus_in(&mut self, window: Window) -> Result<()> {
        let sel: Option<ClientId> = self.monitor.sel;
        match sel.and_then(|id| self.clients.get(id).map(|c| (id, c.window))) {
            Some((id, sel_window)) if sel_window != window => self.set_focus(id),
            _ => Ok(()),
        }
    }

    fn on_mapping_notify(&mut self, keyboard: bool) -> Result<()> {
        self.server.refresh_keyboard_mapping()?;
        if keyboard {
            self.grab_keys()?;
        }
        Ok(())
    }

    fn on_error(&mut self, err: ServerError) -> Result<()> {
        if err.is_stale_handle() {
            trace!("Ignoring X error on a vanished window: {:?}", err);
            return Ok(());
        }
        error!(
            "X error: request code={}, error code={} ({:?})",
            err.request, err.code, err.kind
        );
        Err(WmError::from(err).into())
    }
}
