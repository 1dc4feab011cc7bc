//! Client lifecycle
//!
//! Adopting windows (manage), giving them back (unmanage), adopting the
//! windows that already exist at startup (scan) and releasing everything on
//! exit (cleanup).

use anyhow::Result;
use tracing::{debug, info};
use x11rb::protocol::xproto::Window;

use crate::shared::Geometry;
use crate::wm::client::Client;
use crate::wm::client_flags::ClientFlags;
use crate::wm::registry::ClientId;
use crate::wm::rules::{BROKEN, apply_rules};
use crate::wm::server::{WindowAttributes, WindowChanges, WindowServer, WmState};
use crate::wm::WindowManager;

impl<S: WindowServer> WindowManager<S> {
    /// Take over a newly mapped top-level window and focus it
    pub fn manage(&mut self, window: Window, attributes: &WindowAttributes) -> Result<()> {
        let mut client = Client::new(window, attributes.geometry, attributes.border_width);
        client.name = self.server.title(window)?.unwrap_or_default();

        let parent_tag = self
            .server
            .transient_for(window)?
            .and_then(|parent| self.clients.lookup(parent))
            .and_then(|parent| self.clients.get(parent))
            .map(|parent| parent.tag);
        client.tag = match parent_tag {
            Some(tag) => tag,
            None => self.rule_tag(window, &client.name)?,
        };

        // keep the window inside the monitor; the border is not set yet
        let (mw, mh) = self.monitor.area();
        let g = &mut client.geometry;
        if g.x + g.width > mw {
            g.x = mw - g.width;
        }
        if g.y + g.height > mh {
            g.y = mh - g.height;
        }
        g.x = g.x.max(0);
        g.y = g.y.max(0);
        client.border_width = self.border_px();

        info!(
            "Managing window {} ({:?}) on tag {} at {:?}",
            window, client.name, client.tag, client.geometry
        );
        let id = self.clients.insert(client);

        self.server.configure(window, &WindowChanges::border(self.border_px()))?;
        self.server
            .set_border_color(window, self.config.appearance.border_normal)?;
        self.send_configure(id)?;
        self.update_window_type(id)?;
        self.update_wm_hints(id)?;
        self.server.select_client_events(window)?;
        self.grab_buttons(id, false)?;
        self.server.raise(window)?;

        self.clients.attach(id);
        self.server.append_client_list(window)?;
        // park off-screen until arrange places it; fullscreen may have resized it
        let Some(geometry) = self.clients.get(id).map(|c| c.geometry) else {
            return Ok(());
        };
        let parked = Geometry {
            x: geometry.x + 2 * self.monitor.screen_width,
            ..geometry
        };
        self.server.configure(window, &WindowChanges::move_resize(parked))?;
        self.server.set_wm_state(window, WmState::Normal)?;

        if let Some(sel) = self.monitor.sel {
            self.unfocus(sel, false)?;
        }
        self.monitor.sel = Some(id);
        self.arrange(true)?;
        self.server.map(window)?;
        self.focus(None)
    }

    /// Tag chosen by the rule table, falling back to the active tag
    fn rule_tag(&mut self, window: Window, title: &str) -> Result<u32> {
        let hint = self.server.class_hint(window)?;
        let (class, instance) = match &hint {
            Some(h) => (h.class.as_str(), h.instance.as_str()),
            None => (BROKEN, BROKEN),
        };
        let tag = apply_rules(&self.config.rules, class, instance, title);
        debug!("Rules for class={:?} instance={:?}: {:?}", class, instance, tag);
        Ok(tag.unwrap_or_else(|| self.monitor.active_tag()))
    }

    /// Stop managing a client.
    ///
    /// With `destroyed` the window is already gone and no request names it.
    pub fn unmanage(&mut self, id: ClientId, destroyed: bool) -> Result<()> {
        self.clients.detach(id);
        if self.monitor.sel == Some(id) {
            self.monitor.sel = self.first_visible();
        }
        let Some(client) = self.clients.remove(id) else {
            return Ok(());
        };
        info!("Unmanaging window {} (destroyed: {})", client.window, destroyed);
        if !destroyed {
            self.server
                .release_window(client.window, client.old_border_width)?;
        }
        self.focus(None)?;
        self.update_client_list()?;
        self.arrange(true)
    }

    /// Adopt windows that were mapped before we started; transients go last
    pub fn scan(&mut self) -> Result<()> {
        let windows = self.server.query_tree()?;
        let mut transients = Vec::new();

        for &window in &windows {
            let Some(attributes) = self.server.window_attributes(window)? else {
                continue;
            };
            if attributes.override_redirect {
                continue;
            }
            if self.server.transient_for(window)?.is_some() {
                transients.push((window, attributes));
                continue;
            }
            if self.should_adopt(window, &attributes)? {
                self.manage(window, &attributes)?;
            }
        }

        for (window, attributes) in transients {
            if self.should_adopt(window, &attributes)? {
                self.manage(window, &attributes)?;
            }
        }
        debug!("Scan adopted {} windows", self.clients.len());
        Ok(())
    }

    fn should_adopt(&mut self, window: Window, attributes: &WindowAttributes) -> Result<bool> {
        Ok(attributes.viewable || self.server.wm_state(window)? == Some(WmState::Iconic))
    }

    /// Publish _NET_CLIENT_LIST in stack order
    pub fn update_client_list(&mut self) -> Result<()> {
        let windows = self.clients.windows();
        self.server.set_client_list(&windows)
    }

    /// Enter fullscreen if the client already asks for it
    pub fn update_window_type(&mut self, id: ClientId) -> Result<()> {
        let Some(window) = self.clients.get(id).map(|c| c.window) else {
            return Ok(());
        };
        if self.server.requests_fullscreen(window)? {
            self.set_fullscreen(id, true)?;
        }
        Ok(())
    }

    /// Refresh the never-focus flag from WM_HINTS
    pub fn update_wm_hints(&mut self, id: ClientId) -> Result<()> {
        let Some(window) = self.clients.get(id).map(|c| c.window) else {
            return Ok(());
        };
        if let Some(hints) = self.server.wm_hints(window)? {
            if let Some(c) = self.clients.get_mut(id) {
                c.flags.set(ClientFlags::NEVER_FOCUS, hints.never_focus());
            }
        }
        Ok(())
    }

    /// Give every window back and undo root setup
    pub fn cleanup(&mut self) -> Result<()> {
        info!("Releasing {} clients", self.clients.len());
        // bring hidden windows back on screen before letting go
        let tag = self.monitor.active_tag();
        for id in self.clients.stack().to_vec() {
            if let Some(c) = self.clients.get_mut(id) {
                c.tag = tag;
            }
        }
        self.arrange(false)?;

        while let Some(&id) = self.clients.stack().first() {
            self.unmanage(id, false)?;
        }
        self.launcher_mut().reap();
        self.server.shutdown()
    }
}

#[cfg(test)]
mod tests {
    use crate::shared::Geometry;
    use crate::wm::server::{ClassHint, WmState};
    use crate::wm::testing::{Call, manager_with_windows, map_window};

    #[test]
    fn test_manage_focuses_new_window() {
        let mut wm = manager_with_windows(&[(10, 1)]);
        map_window(&mut wm, 11);
        let id = wm.clients.lookup(11).unwrap();
        assert_eq!(wm.monitor.sel, Some(id));
        assert_eq!(wm.clients.windows(), vec![11, 10]);
        assert_eq!(wm.server.focused, Some(11));
        let c = wm.clients.get(id).unwrap();
        assert_eq!(c.border_width, 4);
        assert_eq!(c.old_border_width, 1);
        assert_eq!(c.tag, 1);
    }

    #[test]
    fn test_manage_applies_rules() {
        let mut wm = manager_with_windows(&[]);
        wm.server.window_mut(20).class = Some(ClassHint {
            instance: "Navigator".into(),
            class: "Firefox".into(),
        });
        map_window(&mut wm, 20);
        let id = wm.clients.lookup(20).unwrap();
        assert_eq!(wm.clients.get(id).unwrap().tag, 3);
        // not on the active tag, so nothing is focused
        assert_eq!(wm.monitor.sel, None);
    }

    #[test]
    fn test_transient_inherits_parent_tag() {
        let mut wm = manager_with_windows(&[(10, 2)]);
        wm.server.window_mut(11).transient_for = Some(10);
        wm.server.window_mut(11).class = Some(ClassHint {
            instance: "Navigator".into(),
            class: "Firefox".into(),
        });
        map_window(&mut wm, 11);
        let id = wm.clients.lookup(11).unwrap();
        assert_eq!(wm.clients.get(id).unwrap().tag, 2);
    }

    #[test]
    fn test_manage_clamps_into_monitor() {
        let mut wm = manager_with_windows(&[]);
        wm.server.window_mut(20).attributes.geometry = Geometry::new(900, 700, 300, 200);
        map_window(&mut wm, 20);
        let id = wm.clients.lookup(20).unwrap();
        assert_eq!(wm.clients.get(id).unwrap().geometry, Geometry::new(700, 600, 300, 200));

        wm.server.window_mut(21).attributes.geometry = Geometry::new(-50, -20, 300, 200);
        map_window(&mut wm, 21);
        let id = wm.clients.lookup(21).unwrap();
        assert_eq!(wm.clients.get(id).unwrap().geometry, Geometry::new(0, 0, 300, 200));
    }

    #[test]
    fn test_manage_parks_window_off_screen_before_mapping() {
        let mut wm = manager_with_windows(&[]);
        map_window(&mut wm, 20);
        let parked = wm
            .server
            .calls
            .iter()
            .position(|call| matches!(call, Call::Configure(20, ch) if ch.x == Some(100 + 2000)))
            .unwrap();
        let mapped = wm.server.calls.iter().position(|call| *call == Call::Map(20)).unwrap();
        assert!(parked < mapped);
    }

    #[test]
    fn test_manage_honors_initial_fullscreen() {
        let mut wm = manager_with_windows(&[]);
        wm.server.window_mut(20).fullscreen = true;
        map_window(&mut wm, 20);
        let id = wm.clients.lookup(20).unwrap();
        let c = wm.clients.get(id).unwrap();
        assert!(c.is_fullscreen());
        assert_eq!(c.geometry, Geometry::new(0, 0, 1000, 800));
        assert_eq!(c.border_width, 0);

        // the server window got the full-screen size too
        let last_sized = wm
            .server
            .calls
            .iter()
            .rev()
            .find_map(|call| match call {
                Call::Configure(20, changes) if changes.width.is_some() => Some(*changes),
                _ => None,
            })
            .unwrap();
        assert_eq!((last_sized.width, last_sized.height), (Some(1000), Some(800)));
    }

    #[test]
    fn test_scan_adopts_viewable_and_iconic_then_transients() {
        let mut wm = manager_with_windows(&[]);
        wm.server.window_mut(30).transient_for = Some(31);
        wm.server.window_mut(30).attributes.viewable = true;
        wm.server.window_mut(31).attributes.viewable = true;
        wm.server.window_mut(32).wm_state = Some(WmState::Iconic);
        wm.server.window_mut(33);
        wm.server.window_mut(34).attributes.viewable = true;
        wm.server.window_mut(34).attributes.override_redirect = true;
        wm.scan().unwrap();

        // transient 30 managed last, so it sits on top
        assert_eq!(wm.clients.windows(), vec![30, 32, 31]);
        assert_eq!(wm.server.client_list, vec![31, 32, 30]);
    }

    #[test]
    fn test_cleanup_releases_every_client() {
        let mut wm = manager_with_windows(&[(10, 1), (11, 2)]);
        wm.server.calls.clear();
        wm.cleanup().unwrap();
        assert!(wm.clients.is_empty());
        assert!(wm.server.calls.contains(&Call::Release(10, 1)));
        assert!(wm.server.calls.contains(&Call::Release(11, 1)));
        // the hidden client is moved back on screen first
        let shown = wm
            .server
            .calls
            .iter()
            .position(|call| matches!(call, Call::Configure(11, ch) if ch.x == Some(100)))
            .unwrap();
        let released = wm.server.calls.iter().position(|c| *c == Call::Release(11, 1)).unwrap();
        assert!(shown < released);
        assert_eq!(wm.server.calls.last(), Some(&Call::Shutdown));
    }

    #[test]
    fn test_wm_hints_without_input_flag_keep_focusable() {
        let mut wm = manager_with_windows(&[(10, 1)]);
        let id = wm.clients.lookup(10).unwrap();
        assert!(!wm.clients.get(id).unwrap().never_focus());
        wm.update_wm_hints(id).unwrap();
        assert!(!wm.clients.get(id).unwrap().never_focus());
    }
}
