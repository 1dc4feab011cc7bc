//! Focus Module
//!
//! Focus assignment, stack cycling and tag visibility (show/hide).

use anyhow::Result;
use tracing::{debug, trace};

use crate::wm::registry::ClientId;
use crate::wm::server::{Protocol, WindowChanges, WindowServer};
use crate::wm::WindowManager;

impl<S: WindowServer> WindowManager<S> {
    /// Focus `target`, or the top-most visible client when it is absent or hidden
    pub fn focus(&mut self, target: Option<ClientId>) -> Result<()> {
        let target = target
            .filter(|&id| self.is_visible(id))
            .or_else(|| self.first_visible());

        if let Some(sel) = self.monitor.sel {
            if Some(sel) != target {
                self.unfocus(sel, false)?;
            }
        }

        match target {
            Some(id) => {
                self.clients.detach(id);
                self.clients.attach(id);
                self.grab_buttons(id, true)?;
                if let Some(c) = self.clients.get(id) {
                    let window = c.window;
                    self.server
                        .set_border_color(window, self.config.appearance.border_focus)?;
                }
                self.set_focus(id)?;
            }
            None => {
                debug!("No visible client, focus reverts to root");
                self.server.set_input_focus(None)?;
                self.server.set_active_window(None)?;
            }
        }
        self.monitor.sel = target;
        Ok(())
    }

    /// Drop the focused look of a client; with `revert` also hand input to the root
    pub fn unfocus(&mut self, id: ClientId, revert: bool) -> Result<()> {
        let Some(window) = self.clients.get(id).map(|c| c.window) else {
            return Ok(());
        };
        self.grab_buttons(id, false)?;
        self.server
            .set_border_color(window, self.config.appearance.border_normal)?;
        if revert {
            self.server.set_input_focus(None)?;
            self.server.set_active_window(None)?;
        }
        Ok(())
    }

    /// Grant server input focus, or only offer WM_TAKE_FOCUS to never-focus clients
    pub fn set_focus(&mut self, id: ClientId) -> Result<()> {
        let Some(c) = self.clients.get(id) else {
            return Ok(());
        };
        let (window, never_focus) = (c.window, c.never_focus());
        if !never_focus {
            self.server.set_input_focus(Some(window))?;
            self.server.set_active_window(Some(window))?;
        }
        self.server.send_protocol(window, Protocol::TakeFocus)?;
        Ok(())
    }

    /// Move focus to the next (+1) or previous (-1) visible client in the stack
    pub fn focus_stack(&mut self, direction: i32) -> Result<()> {
        let Some(sel) = self.monitor.sel else {
            return Ok(());
        };
        let stack = self.clients.stack().to_vec();
        let Some(pos) = stack.iter().position(|&id| id == sel) else {
            return Ok(());
        };
        let visible = |id: &&ClientId| self.is_visible(**id);

        let next = if direction > 0 {
            stack[pos + 1..]
                .iter()
                .find(visible)
                .or_else(|| stack.iter().find(visible))
        } else {
            stack[..pos]
                .iter()
                .filter(visible)
                .last()
                .or_else(|| stack[pos..].iter().filter(visible).last())
        };

        if let Some(&id) = next {
            trace!("focus_stack({}) -> {:?}", direction, id);
            self.focus(Some(id))?;
            self.restack()?;
        }
        Ok(())
    }

    /// Show clients on the active tag and move the rest off-screen
    pub fn arrange(&mut self, restack: bool) -> Result<()> {
        let stack = self.clients.stack().to_vec();

        // show top-down
        for &id in &stack {
            let Some(c) = self.clients.get(id).filter(|c| self.monitor.is_visible(c)) else {
                continue;
            };
            let (window, geometry, fullscreen) = (c.window, c.geometry, c.is_fullscreen());
            self.server
                .configure(window, &WindowChanges::position(geometry.x, geometry.y))?;
            if !fullscreen {
                self.resize(id, geometry)?;
            }
        }

        // hide bottom-up
        for &id in stack.iter().rev() {
            let Some(c) = self.clients.get(id).filter(|c| !self.monitor.is_visible(c)) else {
                continue;
            };
            let (window, x, y) = (c.window, -2 * c.outer_width(), c.geometry.y);
            self.server.configure(window, &WindowChanges::position(x, y))?;
        }

        if restack {
            self.restack()?;
        }
        Ok(())
    }

    /// Raise the focused client above its siblings
    pub fn restack(&mut self) -> Result<()> {
        let Some(window) = self.monitor.sel.and_then(|id| self.clients.get(id)).map(|c| c.window)
        else {
            return Ok(());
        };
        self.server.raise(window)?;
        self.server.sync()
    }

    /// Install the button grabs for a client's focus state
    pub fn grab_buttons(&mut self, id: ClientId, focused: bool) -> Result<()> {
        let Some(window) = self.clients.get(id).map(|c| c.window) else {
            return Ok(());
        };
        let grabs = self.bindings.client_button_grabs();
        self.server.grab_buttons(window, focused, &grabs)
    }

    /// Grab every bound key on the root window
    pub fn grab_keys(&mut self) -> Result<()> {
        let grabs = self.bindings.key_grabs();
        self.server.grab_keys(&grabs)
    }
}
