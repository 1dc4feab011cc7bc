//! Bound actions
//!
//! Everything a key or button binding can trigger, plus the launcher that
//! owns spawned programs until they exit.

use anyhow::Result;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use tracing::{debug, info, warn};

use crate::config::Action;
use crate::shared::Geometry;
use crate::wm::server::{Protocol, WindowServer};
use crate::wm::WindowManager;

/// Spawns programs detached from our process group and reaps them
#[derive(Debug, Default)]
pub struct Launcher {
    children: Vec<Child>,
}

impl Launcher {
    pub fn spawn(&mut self, argv: &[String]) -> std::io::Result<u32> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"))?;
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .process_group(0)
            .spawn()?;
        let pid = child.id();
        self.children.push(child);
        Ok(pid)
    }

    /// Collect exited children; returns how many were reaped
    pub fn reap(&mut self) -> usize {
        let before = self.children.len();
        self.children.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) => {
                debug!("Child {} exited: {}", child.id(), status);
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!("Failed to poll child {}: {}", child.id(), e);
                false
            }
        });
        before - self.children.len()
    }

    pub fn running(&self) -> usize {
        self.children.len()
    }
}

impl<S: WindowServer> WindowManager<S> {
    pub fn run_action(&mut self, action: Action) -> Result<()> {
        debug!("Running action {:?}", action);
        match action {
            Action::Spawn(argv) => {
                self.spawn(&argv);
                Ok(())
            }
            Action::View(tag) => self.view(tag),
            Action::ViewPrevious => self.view(0),
            Action::FocusStack(direction) => self.focus_stack(direction),
            Action::KillClient => self.kill_client(),
            Action::Tag(tag) => self.tag(tag),
            Action::Quit => {
                self.quit();
                Ok(())
            }
            Action::MoveMouse => self.move_mouse(),
            Action::ResizeMouse => self.resize_mouse(),
            Action::Maximize => self.maximize(),
            Action::Restore => self.restore(),
        }
    }

    /// Show `tag`; 0 or an out-of-range tag swaps back to the previous one
    pub fn view(&mut self, tag: u32) -> Result<()> {
        if !self.monitor.view(tag, self.numtags()) {
            return Ok(());
        }
        debug!("Viewing tag {}", self.monitor.active_tag());
        self.focus(None)?;
        self.arrange(true)
    }

    /// Move the focused client to `tag`
    pub fn tag(&mut self, tag: u32) -> Result<()> {
        if !(1..=self.numtags()).contains(&tag) {
            return Ok(());
        }
        let Some(c) = self.monitor.sel.and_then(|id| self.clients.get_mut(id)) else {
            return Ok(());
        };
        debug!("Client {} moves to tag {}", c.window, tag);
        c.tag = tag;
        self.focus(None)?;
        self.arrange(true)
    }

    /// Ask the focused client to close, or disconnect it if it cannot be asked
    pub fn kill_client(&mut self) -> Result<()> {
        let Some(window) = self.monitor.sel.and_then(|id| self.clients.get(id)).map(|c| c.window)
        else {
            return Ok(());
        };
        if !self.server.send_protocol(window, Protocol::DeleteWindow)? {
            info!("Window {} ignores WM_DELETE_WINDOW, killing its client", window);
            self.server.kill_client(window)?;
        }
        Ok(())
    }

    /// Fill the monitor with the focused client, borders included
    pub fn maximize(&mut self) -> Result<()> {
        let Some(id) = self.monitor.sel else {
            return Ok(());
        };
        self.ensure_hints(id)?;
        let Some(c) = self.clients.get(id).filter(|c| !c.is_fullscreen() && !c.is_fixed()) else {
            return Ok(());
        };
        let bw = c.border_width;
        let (mw, mh) = self.monitor.area();
        self.resize(id, Geometry::new(0, 0, mw - 2 * bw, mh - 2 * bw))
    }

    /// Return the focused client to its previous geometry
    pub fn restore(&mut self) -> Result<()> {
        let Some(id) = self.monitor.sel else {
            return Ok(());
        };
        self.ensure_hints(id)?;
        let Some(c) = self.clients.get(id).filter(|c| !c.is_fullscreen() && !c.is_fixed()) else {
            return Ok(());
        };
        let previous = c.old_geometry;
        self.resize(id, previous)
    }

    pub fn quit(&mut self) {
        info!("Quit requested");
        self.running = false;
    }

    /// Launch a program; failures are logged, never fatal
    pub fn spawn(&mut self, argv: &[String]) {
        match self.launcher.spawn(argv) {
            Ok(pid) => info!("Spawned {:?} (pid {})", argv, pid),
            Err(e) => warn!("Failed to spawn {:?}: {}", argv, e),
        }
    }
}
