//! Window Manager Module
//!
//! The decision core: client registry, focus and visibility, geometry
//! constraints, event handling and interactive move/resize. All server
//! traffic goes through a [`WindowServer`].

pub mod actions;
pub mod client;
pub mod client_flags;
pub mod error;
pub mod events;
pub mod ewmh;
pub mod focus;
pub mod hints;
pub mod keyboard;
pub mod lifecycle;
pub mod monitor;
pub mod moveresize;
pub mod registry;
pub mod rules;
pub mod server;
pub mod x11;

#[cfg(test)]
pub(crate) mod testing;

use anyhow::Result;
use std::collections::VecDeque;
use tracing::debug;

use crate::config::Config;
use crate::shared::Geometry;
use crate::wm::actions::Launcher;
use crate::wm::client_flags::ClientFlags;
use crate::wm::events::Event;
use crate::wm::hints::{SizeHintCache, apply_size_hints};
use crate::wm::keyboard::Bindings;
use crate::wm::monitor::Monitor;
use crate::wm::registry::{ClientId, ClientRegistry};
use crate::wm::server::{WindowChanges, WindowServer};

pub struct WindowManager<S: WindowServer> {
    pub server: S,
    pub config: Config,
    pub bindings: Bindings,
    pub monitor: Monitor,
    pub clients: ClientRegistry,
    /// Events fetched during a drag that the drag loop does not handle
    deferred: VecDeque<Event>,
    launcher: Launcher,
    running: bool,
}

impl<S: WindowServer> WindowManager<S> {
    pub fn new(server: S, config: Config) -> Result<Self> {
        config.validate()?;
        let bindings = Bindings::from_config(&config)?;
        let monitor = Monitor::new(
            server.screen_size(),
            (config.reserve.x as i32, config.reserve.y as i32),
            [config.tags.initial, config.tags.alternate],
        );
        Ok(Self {
            server,
            config,
            bindings,
            monitor,
            clients: ClientRegistry::new(),
            deferred: VecDeque::new(),
            launcher: Launcher::default(),
            running: true,
        })
    }

    /// Grab bound keys and settle initial focus
    pub fn setup(&mut self) -> Result<()> {
        self.grab_keys()?;
        self.focus(None)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn launcher_mut(&mut self) -> &mut Launcher {
        &mut self.launcher
    }

    /// Handle every event already queued, deferred ones first
    pub fn dispatch_pending(&mut self) -> Result<()> {
        while self.running {
            let event = match self.deferred.pop_front() {
                Some(event) => event,
                None => match self.server.poll_event()? {
                    Some(event) => event,
                    None => break,
                },
            };
            self.handle_event(event)?;
        }
        Ok(())
    }

    pub fn numtags(&self) -> u32 {
        self.config.numtags()
    }

    pub fn border_px(&self) -> i32 {
        self.config.appearance.border_px as i32
    }

    pub fn is_visible(&self, id: ClientId) -> bool {
        self.clients.get(id).is_some_and(|c| self.monitor.is_visible(c))
    }

    /// Top-most visible client
    pub fn first_visible(&self) -> Option<ClientId> {
        self.clients.stack().iter().copied().find(|&id| self.is_visible(id))
    }

    /// Recompute the size-hint cache if a property change invalidated it
    fn ensure_hints(&mut self, id: ClientId) -> Result<()> {
        let Some(window) = self.clients.get(id).filter(|c| !c.hints.valid).map(|c| c.window)
        else {
            return Ok(());
        };
        let raw = self.server.size_hints(window)?;
        let hints = SizeHintCache::from_hints(raw.as_ref());
        if let Some(c) = self.clients.get_mut(id) {
            c.hints = hints;
            c.flags.set(ClientFlags::FIXED, hints.is_fixed());
        }
        Ok(())
    }

    /// Constrain `proposed` by the client's size hints.
    ///
    /// Returns the rectangle and whether it differs from the current one.
    pub fn apply_size_hints(&mut self, id: ClientId, proposed: Geometry) -> Result<Option<(Geometry, bool)>> {
        self.ensure_hints(id)?;
        let area = self.monitor.area();
        Ok(self
            .clients
            .get(id)
            .map(|c| apply_size_hints(&c.hints, c.geometry, c.border_width, area, proposed)))
    }

    /// Resize through the size-hint constraint, skipping no-op requests
    pub fn resize(&mut self, id: ClientId, proposed: Geometry) -> Result<()> {
        if let Some((geometry, true)) = self.apply_size_hints(id, proposed)? {
            self.resize_client(id, geometry)?;
        }
        Ok(())
    }

    /// Apply a geometry as-is, remembering the previous one
    pub fn resize_client(&mut self, id: ClientId, geometry: Geometry) -> Result<()> {
        let Some(c) = self.clients.get_mut(id) else {
            return Ok(());
        };
        c.record_geometry(geometry);
        let (window, bw) = (c.window, c.border_width);
        self.server.configure(window, &WindowChanges::geometry(geometry, bw))?;
        self.server.send_configure_notify(window, geometry, bw)?;
        self.server.sync()
    }

    /// Tell the client its geometry without moving it
    pub fn send_configure(&mut self, id: ClientId) -> Result<()> {
        if let Some(c) = self.clients.get(id) {
            let (window, geometry, bw) = (c.window, c.geometry, c.border_width);
            self.server.send_configure_notify(window, geometry, bw)?;
        }
        Ok(())
    }

    /// Enter or leave fullscreen.
    ///
    /// Entering zeroes the border and covers the monitor; leaving restores
    /// the border and geometry saved on entry.
    pub fn set_fullscreen(&mut self, id: ClientId, fullscreen: bool) -> Result<()> {
        let Some(c) = self.clients.get_mut(id) else {
            return Ok(());
        };
        let window = c.window;
        if fullscreen && !c.is_fullscreen() {
            debug!("Client {} enters fullscreen", window);
            c.flags.insert(ClientFlags::FULLSCREEN);
            c.old_border_width = c.border_width;
            c.border_width = 0;
            self.server.set_fullscreen_state(window, true)?;
            let area = Geometry::new(0, 0, self.monitor.width, self.monitor.height);
            self.resize_client(id, area)?;
            self.server.raise(window)?;
        } else if !fullscreen && c.is_fullscreen() {
            debug!("Client {} leaves fullscreen", window);
            c.flags.remove(ClientFlags::FULLSCREEN);
            c.border_width = c.old_border_width;
            c.geometry = c.old_geometry;
            let restore = c.geometry;
            self.server.set_fullscreen_state(window, false)?;
            self.resize_client(id, restore)?;
            self.arrange(true)?;
        }
        Ok(())
    }
}
