//! X11 backend
//!
//! [`X11Server`] implements [`WindowServer`] over an x11rb connection and
//! translates protocol events into the manager's [`Event`] type.

use anyhow::{Context, Result};
use tracing::{debug, info, trace};
use x11rb::connection::Connection;
use x11rb::errors::ReplyError;
use x11rb::protocol::ErrorKind;
use x11rb::protocol::Event as XEvent;
use x11rb::protocol::xproto::{
    Allow, AtomEnum, ButtonIndex, ChangeWindowAttributesAux, ConfigureNotifyEvent,
    ConfigureWindowAux, ConnectionExt as _, EventMask, Grab, GrabMode, GrabStatus, InputFocus,
    MapState, Mapping, ModMask, PropMode, Property, StackMode, Window, CONFIGURE_NOTIFY_EVENT,
};
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

use crate::shared::Geometry;
use crate::wm::error::{ServerError, WmError};
use crate::wm::events::{ConfigMask, ConfigureRequest, Event, PropertyKind, StateAction};
use crate::wm::ewmh::Atoms;
use crate::wm::hints::{SizeHints, WmHints};
use crate::wm::keyboard::{KeyMap, Keysym, modifier_variants};
use crate::wm::server::{
    ClassHint, Protocol, WindowAttributes, WindowChanges, WindowServer, WmState,
};

/// Events selected on the root window
fn root_event_mask() -> EventMask {
    EventMask::SUBSTRUCTURE_REDIRECT
        | EventMask::SUBSTRUCTURE_NOTIFY
        | EventMask::STRUCTURE_NOTIFY
        | EventMask::BUTTON_PRESS
}

fn button_mask() -> EventMask {
    EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE
}

fn mouse_mask() -> EventMask {
    button_mask() | EventMask::POINTER_MOTION
}

/// A reply, or `None` when the server rejected the request (usually a vanished window)
pub(crate) fn tolerate<T>(result: Result<T, ReplyError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ReplyError::X11Error(e)) => {
            trace!("Request failed: {:?}", e.error_kind);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

pub struct X11Server {
    conn: RustConnection,
    root: Window,
    screen_width: i32,
    screen_height: i32,
    atoms: Atoms,
    check_window: Window,
    keymap: KeyMap,
    numlock: u16,
}

impl X11Server {
    /// Connect, claim window management on the root window and advertise EWMH support
    pub fn connect(display: Option<&str>) -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(display).context("Failed to connect to X server")?;
        let screen = conn
            .setup()
            .roots
            .get(screen_num)
            .context("X server reported no such screen")?;
        let root = screen.root;
        let (screen_width, screen_height) = (
            screen.width_in_pixels as i32,
            screen.height_in_pixels as i32,
        );
        info!("Connected to screen {} ({}x{})", screen_num, screen_width, screen_height);

        check_other_wm(&conn, root)?;

        let atoms = Atoms::new(&conn)?;
        let check_window = atoms.setup_supported(&conn, root)?;
        conn.change_window_attributes(
            root,
            &ChangeWindowAttributesAux::new().event_mask(root_event_mask()),
        )?;

        let mut server = Self {
            conn,
            root,
            screen_width,
            screen_height,
            atoms,
            check_window,
            keymap: KeyMap::default(),
            numlock: 0,
        };
        server.refresh_keyboard_mapping()?;
        server.sync()?;
        Ok(server)
    }

    pub fn connection(&self) -> &RustConnection {
        &self.conn
    }

    fn string_property(&self, window: Window, property: u32, type_: u32) -> Result<Option<String>> {
        let Some(reply) = tolerate(
            self.conn
                .get_property(false, window, property, type_, 0, 1024)?
                .reply(),
        )?
        else {
            return Ok(None);
        };
        if reply.value.is_empty() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&reply.value).into_owned()))
    }

    fn property32(&self, window: Window, property: u32, type_: u32, length: u32) -> Result<Option<Vec<u32>>> {
        let Some(reply) = tolerate(
            self.conn
                .get_property(false, window, property, type_, 0, length)?
                .reply(),
        )?
        else {
            return Ok(None);
        };
        Ok(reply.value32().map(|values| values.collect()))
    }
}

/// Selecting SubstructureRedirect fails with BadAccess when another manager holds it
fn check_other_wm(conn: &RustConnection, root: Window) -> Result<()> {
    let result = conn
        .change_window_attributes(
            root,
            &ChangeWindowAttributesAux::new().event_mask(EventMask::SUBSTRUCTURE_REDIRECT),
        )?
        .check();
    match result {
        Ok(()) => Ok(()),
        Err(ReplyError::X11Error(e)) if e.error_kind == ErrorKind::Access => {
            Err(WmError::AnotherWmRunning.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Translate a protocol event; anything the manager ignores becomes [`Event::Other`]
pub fn translate(event: XEvent, atoms: &Atoms, root: Window) -> Event {
    match event {
        XEvent::ButtonPress(e) => Event::ButtonPress {
            window: e.event,
            state: u16::from(e.state),
            button: e.detail,
        },
        XEvent::ButtonRelease(_) => Event::ButtonRelease,
        XEvent::MotionNotify(e) => Event::MotionNotify {
            root_x: e.root_x as i32,
            root_y: e.root_y as i32,
            time: e.time,
        },
        XEvent::KeyPress(e) => Event::KeyPress { keycode: e.detail, state: u16::from(e.state) },
        XEvent::ConfigureRequest(e) => Event::ConfigureRequest(ConfigureRequest {
            window: e.window,
            x: e.x as i32,
            y: e.y as i32,
            width: e.width as i32,
            height: e.height as i32,
            border_width: e.border_width as i32,
            sibling: e.sibling,
            stack_mode: e.stack_mode,
            mask: ConfigMask::from_bits_truncate(u16::from(e.value_mask)),
        }),
        XEvent::ConfigureNotify(e) if e.window == root => Event::RootConfigured {
            width: e.width as i32,
            height: e.height as i32,
        },
        XEvent::MapRequest(e) => Event::MapRequest { window: e.window },
        XEvent::DestroyNotify(e) => Event::DestroyNotify { window: e.window },
        XEvent::UnmapNotify(e) => Event::UnmapNotify {
            window: e.window,
            synthetic: e.response_type & 0x80 != 0,
        },
        XEvent::PropertyNotify(e) => {
            let property = if e.atom == u32::from(AtomEnum::WM_NORMAL_HINTS) {
                PropertyKind::NormalHints
            } else if e.atom == u32::from(AtomEnum::WM_HINTS) {
                PropertyKind::Hints
            } else if e.atom == atoms.net_wm_window_type {
                PropertyKind::WindowType
            } else {
                PropertyKind::Other
            };
            Event::PropertyNotify {
                window: e.window,
                property,
                deleted: e.state == Property::DELETE,
            }
        }
        XEvent::ClientMessage(e) if e.type_ == atoms.net_wm_state => {
            let data = e.data.as_data32();
            let fullscreen = atoms.net_wm_state_fullscreen;
            if data[1] == fullscreen || data[2] == fullscreen {
                Event::FullscreenRequest { window: e.window, action: StateAction::from_raw(data[0]) }
            } else {
                Event::Other
            }
        }
        XEvent::FocusIn(e) => Event::FocusIn { window: e.event },
        XEvent::MappingNotify(e) => Event::MappingNotify { keyboard: e.request == Mapping::KEYBOARD },
        XEvent::Error(e) => Event::Error(ServerError {
            request: e.major_opcode,
            code: e.error_code,
            kind: e.error_kind,
        }),
        _ => Event::Other,
    }
}

impl WindowServer for X11Server {
    fn screen_size(&self) -> (i32, i32) {
        (self.screen_width, self.screen_height)
    }

    fn window_attributes(&mut self, window: Window) -> Result<Option<WindowAttributes>> {
        let attrs_cookie = self.conn.get_window_attributes(window)?;
        let geometry_cookie = self.conn.get_geometry(window)?;
        let (Some(attrs), Some(geom)) = (tolerate(attrs_cookie.reply())?, tolerate(geometry_cookie.reply())?)
        else {
            return Ok(None);
        };
        Ok(Some(WindowAttributes {
            geometry: Geometry::new(geom.x as i32, geom.y as i32, geom.width as i32, geom.height as i32),
            border_width: geom.border_width as i32,
            override_redirect: attrs.override_redirect,
            viewable: attrs.map_state == MapState::VIEWABLE,
        }))
    }

    fn query_tree(&mut self) -> Result<Vec<Window>> {
        Ok(self.conn.query_tree(self.root)?.reply()?.children)
    }

    fn transient_for(&mut self, window: Window) -> Result<Option<Window>> {
        let values = self.property32(
            window,
            AtomEnum::WM_TRANSIENT_FOR.into(),
            AtomEnum::WINDOW.into(),
            1,
        )?;
        Ok(values.and_then(|v| v.first().copied()).filter(|&w| w != x11rb::NONE))
    }

    fn class_hint(&mut self, window: Window) -> Result<Option<ClassHint>> {
        let Some(raw) = self.string_property(window, AtomEnum::WM_CLASS.into(), AtomEnum::STRING.into())?
        else {
            return Ok(None);
        };
        let mut parts = raw.split('\0');
        let instance = parts.next().unwrap_or_default().to_string();
        let class = parts.next().unwrap_or_default().to_string();
        Ok(Some(ClassHint { instance, class }))
    }

    fn title(&mut self, window: Window) -> Result<Option<String>> {
        if let Some(name) = self.string_property(window, self.atoms.net_wm_name, self.atoms.utf8_string)? {
            return Ok(Some(name));
        }
        self.string_property(window, AtomEnum::WM_NAME.into(), AtomEnum::ANY.into())
    }

    fn size_hints(&mut self, window: Window) -> Result<Option<SizeHints>> {
        let values = self.property32(
            window,
            AtomEnum::WM_NORMAL_HINTS.into(),
            AtomEnum::WM_SIZE_HINTS.into(),
            18,
        )?;
        Ok(values.and_then(|v| SizeHints::from_raw(&v)))
    }

    fn wm_hints(&mut self, window: Window) -> Result<Option<WmHints>> {
        let values = self.property32(window, AtomEnum::WM_HINTS.into(), AtomEnum::WM_HINTS.into(), 9)?;
        Ok(values.and_then(|v| WmHints::from_raw(&v)))
    }

    fn wm_state(&mut self, window: Window) -> Result<Option<WmState>> {
        self.atoms.get_wm_state(&self.conn, window)
    }

    fn requests_fullscreen(&mut self, window: Window) -> Result<bool> {
        self.atoms.requests_fullscreen(&self.conn, window)
    }

    fn query_pointer(&mut self) -> Result<Option<(i32, i32)>> {
        let reply = tolerate(self.conn.query_pointer(self.root)?.reply())?;
        Ok(reply.map(|r| (r.root_x as i32, r.root_y as i32)))
    }

    fn keysym(&self, keycode: u8) -> Option<Keysym> {
        self.keymap.keysym(keycode)
    }

    fn numlock_mask(&self) -> u16 {
        self.numlock
    }

    fn configure(&mut self, window: Window, changes: &WindowChanges) -> Result<()> {
        let aux = ConfigureWindowAux::new()
            .x(changes.x)
            .y(changes.y)
            .width(changes.width.map(|w| w as u32))
            .height(changes.height.map(|h| h as u32))
            .border_width(changes.border_width.map(|bw| bw as u32))
            .sibling(changes.sibling)
            .stack_mode(changes.stack_mode);
        self.conn.configure_window(window, &aux)?;
        Ok(())
    }

    fn set_border_color(&mut self, window: Window, pixel: u32) -> Result<()> {
        self.conn
            .change_window_attributes(window, &ChangeWindowAttributesAux::new().border_pixel(pixel))?;
        Ok(())
    }

    fn raise(&mut self, window: Window) -> Result<()> {
        self.conn
            .configure_window(window, &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE))?;
        Ok(())
    }

    fn map(&mut self, window: Window) -> Result<()> {
        self.conn.map_window(window)?;
        Ok(())
    }

    fn select_client_events(&mut self, window: Window) -> Result<()> {
        self.conn.change_window_attributes(
            window,
            &ChangeWindowAttributesAux::new()
                .event_mask(EventMask::FOCUS_CHANGE | EventMask::PROPERTY_CHANGE),
        )?;
        Ok(())
    }

    fn grab_buttons(&mut self, window: Window, focused: bool, bindings: &[(u16, u8)]) -> Result<()> {
        self.conn.ungrab_button(ButtonIndex::ANY, window, ModMask::ANY)?;
        if !focused {
            // click to focus
            self.conn.grab_button(
                false,
                window,
                button_mask(),
                GrabMode::SYNC,
                GrabMode::SYNC,
                x11rb::NONE,
                x11rb::NONE,
                ButtonIndex::ANY,
                ModMask::ANY,
            )?;
        }
        for &(mask, button) in bindings {
            for variant in modifier_variants(self.numlock) {
                self.conn.grab_button(
                    false,
                    window,
                    button_mask(),
                    GrabMode::ASYNC,
                    GrabMode::SYNC,
                    x11rb::NONE,
                    x11rb::NONE,
                    ButtonIndex::from(button),
                    ModMask::from(mask | variant),
                )?;
            }
        }
        Ok(())
    }

    fn release_window(&mut self, window: Window, border_width: i32) -> Result<()> {
        self.conn.grab_server()?;
        self.conn
            .configure_window(window, &ConfigureWindowAux::new().border_width(border_width as u32))?
            .ignore_error();
        self.conn
            .ungrab_button(ButtonIndex::ANY, window, ModMask::ANY)?
            .ignore_error();
        self.conn
            .change_property32(
                PropMode::REPLACE,
                window,
                self.atoms.wm_state,
                self.atoms.wm_state,
                &[WmState::Withdrawn as u32, x11rb::NONE],
            )?
            .ignore_error();
        self.sync()?;
        self.conn.ungrab_server()?;
        Ok(())
    }

    fn set_wm_state(&mut self, window: Window, state: WmState) -> Result<()> {
        self.atoms.set_wm_state(&self.conn, window, state)
    }

    fn set_fullscreen_state(&mut self, window: Window, fullscreen: bool) -> Result<()> {
        self.atoms.set_fullscreen_state(&self.conn, window, fullscreen)
    }

    fn send_configure_notify(&mut self, window: Window, geometry: Geometry, border_width: i32) -> Result<()> {
        let event = ConfigureNotifyEvent {
            response_type: CONFIGURE_NOTIFY_EVENT,
            sequence: 0,
            event: window,
            window,
            above_sibling: x11rb::NONE,
            x: geometry.x as i16,
            y: geometry.y as i16,
            width: geometry.width as u16,
            height: geometry.height as u16,
            border_width: border_width as u16,
            override_redirect: false,
        };
        self.conn
            .send_event(false, window, EventMask::STRUCTURE_NOTIFY, event)?;
        Ok(())
    }

    fn send_protocol(&mut self, window: Window, protocol: Protocol) -> Result<bool> {
        self.atoms.send_protocol(&self.conn, window, protocol)
    }

    fn kill_client(&mut self, window: Window) -> Result<()> {
        self.conn.grab_server()?;
        self.conn.kill_client(window)?.ignore_error();
        self.sync()?;
        self.conn.ungrab_server()?;
        Ok(())
    }

    fn set_input_focus(&mut self, window: Option<Window>) -> Result<()> {
        let target = window.unwrap_or(self.root);
        self.conn
            .set_input_focus(InputFocus::POINTER_ROOT, target, x11rb::CURRENT_TIME)?;
        Ok(())
    }

    fn set_active_window(&mut self, window: Option<Window>) -> Result<()> {
        self.atoms.update_active_window(&self.conn, self.root, window)
    }

    fn append_client_list(&mut self, window: Window) -> Result<()> {
        self.atoms.append_client_list(&self.conn, self.root, window)
    }

    fn set_client_list(&mut self, windows: &[Window]) -> Result<()> {
        self.atoms.update_client_list(&self.conn, self.root, windows)
    }

    fn allow_replay_pointer(&mut self) -> Result<()> {
        self.conn.allow_events(Allow::REPLAY_POINTER, x11rb::CURRENT_TIME)?;
        Ok(())
    }

    fn grab_keys(&mut self, keys: &[(u16, Keysym)]) -> Result<()> {
        self.conn.ungrab_key(Grab::ANY, self.root, ModMask::ANY)?;
        for &(mask, keysym) in keys {
            let Some(keycode) = self.keymap.keycode(keysym) else {
                debug!("No keycode for keysym {:#x}, binding skipped", keysym);
                continue;
            };
            for variant in modifier_variants(self.numlock) {
                self.conn.grab_key(
                    true,
                    self.root,
                    ModMask::from(mask | variant),
                    keycode,
                    GrabMode::ASYNC,
                    GrabMode::ASYNC,
                )?;
            }
        }
        Ok(())
    }

    fn refresh_keyboard_mapping(&mut self) -> Result<()> {
        let setup = self.conn.setup();
        let (min, max) = (setup.min_keycode, setup.max_keycode);
        let mapping = self
            .conn
            .get_keyboard_mapping(min, max - min + 1)?
            .reply()?;
        self.keymap = KeyMap {
            min_keycode: min,
            keysyms_per_keycode: mapping.keysyms_per_keycode,
            keysyms: mapping.keysyms,
        };
        let modifiers = self.conn.get_modifier_mapping()?.reply()?;
        self.numlock = self
            .keymap
            .numlock_mask(&modifiers.keycodes, modifiers.keycodes_per_modifier());
        debug!("Keyboard mapping refreshed, numlock mask {:#x}", self.numlock);
        Ok(())
    }

    fn grab_pointer(&mut self) -> Result<bool> {
        let reply = self
            .conn
            .grab_pointer(
                false,
                self.root,
                mouse_mask(),
                GrabMode::ASYNC,
                GrabMode::ASYNC,
                x11rb::NONE,
                x11rb::NONE,
                x11rb::CURRENT_TIME,
            )?
            .reply()?;
        Ok(reply.status == GrabStatus::SUCCESS)
    }

    fn ungrab_pointer(&mut self) -> Result<()> {
        self.conn.ungrab_pointer(x11rb::CURRENT_TIME)?;
        Ok(())
    }

    fn warp_pointer(&mut self, window: Window, x: i32, y: i32) -> Result<()> {
        self.conn
            .warp_pointer(x11rb::NONE, window, 0, 0, 0, 0, x as i16, y as i16)?;
        Ok(())
    }

    fn poll_event(&mut self) -> Result<Option<Event>> {
        Ok(self
            .conn
            .poll_for_event()?
            .map(|event| translate(event, &self.atoms, self.root)))
    }

    fn wait_event(&mut self) -> Result<Event> {
        let event = self.conn.wait_for_event()?;
        Ok(translate(event, &self.atoms, self.root))
    }

    fn flush(&mut self) -> Result<()> {
        self.conn.flush()?;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.conn.get_input_focus()?.reply()?;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.conn.ungrab_key(Grab::ANY, self.root, ModMask::ANY)?;
        self.conn.destroy_window(self.check_window)?;
        self.conn.set_input_focus(
            InputFocus::POINTER_ROOT,
            u32::from(InputFocus::POINTER_ROOT),
            x11rb::CURRENT_TIME,
        )?;
        self.atoms.update_active_window(&self.conn, self.root, None)?;
        self.sync()?;
        info!("Root window released");
        Ok(())
    }
}
