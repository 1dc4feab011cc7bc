//! EWMH and ICCCM properties
//!
//! The interned atoms and the root/client property writes the manager
//! performs: supported hints, the supporting-WM check window, the client
//! list, the active window, fullscreen state and WM_PROTOCOLS messages.

use anyhow::Result;
use tracing::debug;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    Atom, AtomEnum, ClientMessageEvent, ConnectionExt as _, CreateWindowAux, EventMask, PropMode,
    Window, WindowClass,
};
use x11rb::wrapper::ConnectionExt as _;

use crate::wm::server::{Protocol, WmState};
use crate::wm::x11::tolerate;

/// Name advertised on the check window
pub const WM_NAME: &str = "speck";

/// Holds all interned atoms
#[derive(Debug, Clone, Copy)]
pub struct Atoms {
    pub utf8_string: Atom,
    // ICCCM
    pub wm_protocols: Atom,
    pub wm_delete_window: Atom,
    pub wm_state: Atom,
    pub wm_take_focus: Atom,
    // EWMH
    pub net_active_window: Atom,
    pub net_supported: Atom,
    pub net_wm_name: Atom,
    pub net_wm_state: Atom,
    pub net_supporting_wm_check: Atom,
    pub net_wm_state_fullscreen: Atom,
    pub net_wm_window_type: Atom,
    pub net_wm_window_type_dialog: Atom,
    pub net_client_list: Atom,
}

impl Atoms {
    /// Intern all required atoms
    pub fn new<C: Connection>(conn: &C) -> Result<Self> {
        let intern = |name: &str| -> Result<Atom> {
            Ok(conn.intern_atom(false, name.as_bytes())?.reply()?.atom)
        };

        Ok(Self {
            utf8_string: intern("UTF8_STRING")?,
            wm_protocols: intern("WM_PROTOCOLS")?,
            wm_delete_window: intern("WM_DELETE_WINDOW")?,
            wm_state: intern("WM_STATE")?,
            wm_take_focus: intern("WM_TAKE_FOCUS")?,
            net_active_window: intern("_NET_ACTIVE_WINDOW")?,
            net_supported: intern("_NET_SUPPORTED")?,
            net_wm_name: intern("_NET_WM_NAME")?,
            net_wm_state: intern("_NET_WM_STATE")?,
            net_supporting_wm_check: intern("_NET_SUPPORTING_WM_CHECK")?,
            net_wm_state_fullscreen: intern("_NET_WM_STATE_FULLSCREEN")?,
            net_wm_window_type: intern("_NET_WM_WINDOW_TYPE")?,
            net_wm_window_type_dialog: intern("_NET_WM_WINDOW_TYPE_DIALOG")?,
            net_client_list: intern("_NET_CLIENT_LIST")?,
        })
    }

    /// Atoms listed in _NET_SUPPORTED
    pub fn supported(&self) -> [Atom; 9] {
        [
            self.net_active_window,
            self.net_supported,
            self.net_wm_name,
            self.net_wm_state,
            self.net_supporting_wm_check,
            self.net_wm_state_fullscreen,
            self.net_wm_window_type,
            self.net_wm_window_type_dialog,
            self.net_client_list,
        ]
    }

    pub fn protocol(&self, protocol: Protocol) -> Atom {
        match protocol {
            Protocol::DeleteWindow => self.wm_delete_window,
            Protocol::TakeFocus => self.wm_take_focus,
        }
    }

    /// Create the check window and advertise EWMH support on the root.
    ///
    /// Returns the check window.
    pub fn setup_supported<C: Connection>(&self, conn: &C, root: Window) -> Result<Window> {
        let check = conn.generate_id()?;
        conn.create_window(
            x11rb::COPY_DEPTH_FROM_PARENT,
            check,
            root,
            0,
            0,
            1,
            1,
            0,
            WindowClass::INPUT_OUTPUT,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new(),
        )?;
        conn.change_property32(
            PropMode::REPLACE,
            check,
            self.net_supporting_wm_check,
            AtomEnum::WINDOW,
            &[check],
        )?;
        conn.change_property8(
            PropMode::REPLACE,
            check,
            self.net_wm_name,
            self.utf8_string,
            WM_NAME.as_bytes(),
        )?;
        conn.change_property32(
            PropMode::REPLACE,
            root,
            self.net_supporting_wm_check,
            AtomEnum::WINDOW,
            &[check],
        )?;
        conn.change_property32(
            PropMode::REPLACE,
            root,
            self.net_supported,
            AtomEnum::ATOM,
            &self.supported(),
        )?;
        conn.delete_property(root, self.net_client_list)?;
        debug!("EWMH check window {} created", check);
        Ok(check)
    }

    /// Set or delete _NET_ACTIVE_WINDOW
    pub fn update_active_window<C: Connection>(
        &self,
        conn: &C,
        root: Window,
        window: Option<Window>,
    ) -> Result<()> {
        match window {
            Some(window) => {
                conn.change_property32(
                    PropMode::REPLACE,
                    root,
                    self.net_active_window,
                    AtomEnum::WINDOW,
                    &[window],
                )?;
            }
            None => {
                conn.delete_property(root, self.net_active_window)?;
            }
        }
        Ok(())
    }

    pub fn append_client_list<C: Connection>(&self, conn: &C, root: Window, window: Window) -> Result<()> {
        conn.change_property32(
            PropMode::APPEND,
            root,
            self.net_client_list,
            AtomEnum::WINDOW,
            &[window],
        )?;
        Ok(())
    }

    /// Rewrite _NET_CLIENT_LIST from scratch
    pub fn update_client_list<C: Connection>(
        &self,
        conn: &C,
        root: Window,
        windows: &[Window],
    ) -> Result<()> {
        conn.delete_property(root, self.net_client_list)?;
        if !windows.is_empty() {
            conn.change_property32(
                PropMode::APPEND,
                root,
                self.net_client_list,
                AtomEnum::WINDOW,
                windows,
            )?;
        }
        Ok(())
    }

    /// _NET_WM_STATE holds exactly the fullscreen atom, or nothing
    pub fn set_fullscreen_state<C: Connection>(
        &self,
        conn: &C,
        window: Window,
        fullscreen: bool,
    ) -> Result<()> {
        let state: &[Atom] = if fullscreen {
            &[self.net_wm_state_fullscreen]
        } else {
            &[]
        };
        conn.change_property32(
            PropMode::REPLACE,
            window,
            self.net_wm_state,
            AtomEnum::ATOM,
            state,
        )?;
        Ok(())
    }

    /// Whether the first atom of _NET_WM_STATE is the fullscreen atom
    pub fn requests_fullscreen<C: Connection>(&self, conn: &C, window: Window) -> Result<bool> {
        let Some(reply) = tolerate(
            conn.get_property(false, window, self.net_wm_state, AtomEnum::ATOM, 0, 1)?
                .reply(),
        )?
        else {
            return Ok(false);
        };
        Ok(reply
            .value32()
            .and_then(|mut atoms| atoms.next())
            .is_some_and(|atom| atom == self.net_wm_state_fullscreen))
    }

    pub fn set_wm_state<C: Connection>(&self, conn: &C, window: Window, state: WmState) -> Result<()> {
        conn.change_property32(
            PropMode::REPLACE,
            window,
            self.wm_state,
            self.wm_state,
            &[state as u32, x11rb::NONE],
        )?;
        Ok(())
    }

    pub fn get_wm_state<C: Connection>(&self, conn: &C, window: Window) -> Result<Option<WmState>> {
        let Some(reply) = tolerate(
            conn.get_property(false, window, self.wm_state, self.wm_state, 0, 2)?
                .reply(),
        )?
        else {
            return Ok(None);
        };
        Ok(reply
            .value32()
            .and_then(|mut values| values.next())
            .and_then(WmState::from_raw))
    }

    /// Whether WM_PROTOCOLS lists `protocol`
    pub fn supports_protocol<C: Connection>(
        &self,
        conn: &C,
        window: Window,
        protocol: Protocol,
    ) -> Result<bool> {
        let Some(reply) = tolerate(
            conn.get_property(false, window, self.wm_protocols, AtomEnum::ATOM, 0, 1024)?
                .reply(),
        )?
        else {
            return Ok(false);
        };
        let wanted = self.protocol(protocol);
        Ok(reply
            .value32()
            .is_some_and(|mut atoms| atoms.any(|atom| atom == wanted)))
    }

    /// Deliver a WM_PROTOCOLS client message if the window supports it
    pub fn send_protocol<C: Connection>(
        &self,
        conn: &C,
        window: Window,
        protocol: Protocol,
    ) -> Result<bool> {
        if !self.supports_protocol(conn, window, protocol)? {
            return Ok(false);
        }
        let event = ClientMessageEvent::new(
            32,
            window,
            self.wm_protocols,
            [self.protocol(protocol), x11rb::CURRENT_TIME, 0, 0, 0],
        );
        conn.send_event(false, window, EventMask::NO_EVENT, event)?;
        debug!("Sent {:?} to window {}", protocol, window);
        Ok(true)
    }
}
