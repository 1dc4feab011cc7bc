//! MoveResize Module
//!
//! Pointer-driven move and resize of the focused client. Each drag grabs the
//! pointer and runs a nested loop until the button is released: motion is
//! rate limited, configure and map requests are still served, and anything
//! else is queued for the main loop.

use anyhow::Result;
use tracing::{debug, trace};

use crate::shared::Geometry;
use crate::wm::events::Event;
use crate::wm::registry::ClientId;
use crate::wm::server::WindowServer;
use crate::wm::WindowManager;

/// Minimum spacing between handled motion events (~60 Hz)
const MOTION_INTERVAL_MS: u32 = 1000 / 60;

/// Snap a proposed position to the monitor edges.
///
/// Each axis snaps to the near edge first, then to the far edge.
pub fn snap_position(
    x: i32,
    y: i32,
    outer: (i32, i32),
    area: (i32, i32),
    snap: i32,
) -> (i32, i32) {
    let axis = |pos: i32, outer: i32, extent: i32| {
        if pos.abs() < snap {
            0
        } else if (extent - (pos + outer)).abs() < snap {
            extent - outer
        } else {
            pos
        }
    };
    (axis(x, outer.0, area.0), axis(y, outer.1, area.1))
}

/// Size that puts the bottom-right border corner under the pointer, at least 1
pub fn resize_extent(pointer: i32, origin: i32, border_width: i32) -> i32 {
    (pointer - origin - 2 * border_width + 1).max(1)
}

/// What a drag step does with the pointer position
#[derive(Debug, Clone, Copy)]
enum Drag {
    /// Pointer position when the drag started, and the client origin
    Move { pointer: (i32, i32), origin: (i32, i32) },
    Resize { origin: (i32, i32) },
}

impl<S: WindowServer> WindowManager<S> {
    /// Drag the focused client with the pointer
    pub fn move_mouse(&mut self) -> Result<()> {
        let Some((id, geometry)) = self.drag_target() else {
            return Ok(());
        };
        self.restack()?;
        if !self.server.grab_pointer()? {
            debug!("Pointer grab refused, not moving");
            return Ok(());
        }
        let Some(pointer) = self.server.query_pointer()? else {
            return self.server.ungrab_pointer();
        };
        let origin = (geometry.x, geometry.y);
        self.drag_loop(id, Drag::Move { pointer, origin })?;
        self.server.ungrab_pointer()
    }

    /// Resize the focused client from its bottom-right corner
    pub fn resize_mouse(&mut self) -> Result<()> {
        let Some((id, geometry)) = self.drag_target() else {
            return Ok(());
        };
        self.restack()?;
        if !self.server.grab_pointer()? {
            debug!("Pointer grab refused, not resizing");
            return Ok(());
        }
        self.warp_to_corner(id)?;
        let origin = (geometry.x, geometry.y);
        self.drag_loop(id, Drag::Resize { origin })?;
        self.warp_to_corner(id)?;
        self.server.ungrab_pointer()
    }

    /// Focused client, unless it is fullscreen
    fn drag_target(&self) -> Option<(ClientId, Geometry)> {
        let id = self.monitor.sel?;
        let c = self.clients.get(id).filter(|c| !c.is_fullscreen())?;
        Some((id, c.geometry))
    }

    fn warp_to_corner(&mut self, id: ClientId) -> Result<()> {
        let Some(c) = self.clients.get(id) else {
            return Ok(());
        };
        let (window, g, bw) = (c.window, c.geometry, c.border_width);
        self.server
            .warp_pointer(window, g.width + bw - 1, g.height + bw - 1)
    }

    fn drag_loop(&mut self, id: ClientId, drag: Drag) -> Result<()> {
        let mut last_time: u32 = 0;
        loop {
            match self.server.wait_event()? {
                Event::ButtonRelease => return Ok(()),
                Event::ConfigureRequest(request) => self.on_configure_request(&request)?,
                Event::MapRequest { window } => self.on_map_request(window)?,
                Event::MotionNotify { root_x, root_y, time } => {
                    if time.wrapping_sub(last_time) <= MOTION_INTERVAL_MS {
                        continue;
                    }
                    last_time = time;
                    self.drag_step(id, drag, root_x, root_y)?;
                }
                Event::ButtonPress { .. } => {}
                other => {
                    trace!("Deferring {:?} until the drag ends", other);
                    self.deferred.push_back(other);
                }
            }
        }
    }

    fn drag_step(&mut self, id: ClientId, drag: Drag, x: i32, y: i32) -> Result<()> {
        let Some(c) = self.clients.get(id) else {
            return Ok(());
        };
        let geometry = c.geometry;
        let (mw, mh) = self.monitor.area();
        match drag {
            Drag::Move { pointer, origin } => {
                let (nx, ny) = snap_position(
                    origin.0 + (x - pointer.0),
                    origin.1 + (y - pointer.1),
                    (c.outer_width(), c.outer_height()),
                    (mw, mh),
                    self.config.appearance.snap as i32,
                );
                self.resize(id, Geometry { x: nx, y: ny, ..geometry })
            }
            Drag::Resize { origin } => {
                let nw = resize_extent(x, origin.0, c.border_width);
                let nh = resize_extent(y, origin.1, c.border_width);
                if (0..=mw).contains(&nw) && (0..=mh).contains(&nh) {
                    self.resize(id, Geometry { width: nw, height: nh, ..geometry })?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wm::testing::{Call, manager_with_windows};

    fn motion(root_x: i32, root_y: i32, time: u32) -> Event {
        Event::MotionNotify { root_x, root_y, time }
    }

    #[test]
    fn test_snap_to_near_and_far_edges() {
        assert_eq!(snap_position(20, 300, (100, 100), (1000, 800), 32), (0, 300));
        assert_eq!(snap_position(885, 300, (100, 100), (1000, 800), 32), (900, 300));
        assert_eq!(snap_position(500, 690, (100, 100), (1000, 800), 32), (500, 700));
        assert_eq!(snap_position(-31, -10, (100, 100), (1000, 800), 32), (0, 0));
        assert_eq!(snap_position(500, 400, (100, 100), (1000, 800), 32), (500, 400));
    }

    #[test]
    fn test_resize_extent_never_below_one() {
        assert_eq!(resize_extent(500, 100, 4), 393);
        assert_eq!(resize_extent(50, 100, 4), 1);
    }

    #[test]
    fn test_move_follows_pointer_delta() {
        let mut wm = manager_with_windows(&[(10, 1)]);
        wm.server.pointer = Some((500, 500));
        wm.server.events.extend([motion(620, 510, 100), Event::ButtonRelease]);
        wm.move_mouse().unwrap();

        let id = wm.clients.lookup(10).unwrap();
        assert_eq!(wm.clients.get(id).unwrap().geometry, Geometry::new(220, 110, 300, 200));
        assert_eq!(wm.server.calls.last(), Some(&Call::UngrabPointer));
    }

    #[test]
    fn test_motion_is_rate_limited() {
        let mut wm = manager_with_windows(&[(10, 1)]);
        wm.server.pointer = Some((500, 500));
        wm.server.events.extend([
            motion(520, 500, 100),
            motion(560, 500, 110),
            motion(600, 500, 117),
            Event::ButtonRelease,
        ]);
        wm.move_mouse().unwrap();
        let id = wm.clients.lookup(10).unwrap();
        // the motion at 110 falls inside the interval after 100
        assert_eq!(wm.clients.get(id).unwrap().geometry.x, 200);
    }

    #[test]
    fn test_move_snaps_near_edge() {
        let mut wm = manager_with_windows(&[(10, 1)]);
        wm.server.pointer = Some((500, 500));
        wm.server.events.extend([motion(420, 500, 100), Event::ButtonRelease]);
        wm.move_mouse().unwrap();
        let id = wm.clients.lookup(10).unwrap();
        assert_eq!(wm.clients.get(id).unwrap().geometry.x, 0);
    }

    #[test]
    fn test_drag_defers_unrelated_events() {
        let mut wm = manager_with_windows(&[(10, 1), (11, 1)]);
        wm.server.pointer = Some((0, 0));
        wm.server.events.extend([Event::DestroyNotify { window: 10 }, Event::ButtonRelease]);
        wm.move_mouse().unwrap();
        assert!(wm.clients.lookup(10).is_some());

        wm.dispatch_pending().unwrap();
        assert!(wm.clients.lookup(10).is_none());
    }

    #[test]
    fn test_drag_serves_map_requests() {
        let mut wm = manager_with_windows(&[(10, 1)]);
        wm.server.pointer = Some((0, 0));
        wm.server.window_mut(12);
        wm.server.events.extend([Event::MapRequest { window: 12 }, Event::ButtonRelease]);
        wm.move_mouse().unwrap();
        assert!(wm.clients.lookup(12).is_some());
    }

    #[test]
    fn test_refused_grab_does_nothing() {
        let mut wm = manager_with_windows(&[(10, 1)]);
        wm.server.grab_ok = false;
        wm.server.events.push_back(motion(900, 900, 100));
        wm.resize_mouse().unwrap();
        assert_eq!(wm.server.events.len(), 1);
        assert!(!wm.server.calls.contains(&Call::UngrabPointer));
    }

    #[test]
    fn test_move_ungrabs_when_pointer_unknown() {
        let mut wm = manager_with_windows(&[(10, 1)]);
        wm.server.pointer = None;
        wm.move_mouse().unwrap();
        assert_eq!(wm.server.calls.last(), Some(&Call::UngrabPointer));
    }

    #[test]
    fn test_fullscreen_client_is_not_dragged() {
        let mut wm = manager_with_windows(&[(10, 1)]);
        let id = wm.clients.lookup(10).unwrap();
        wm.set_fullscreen(id, true).unwrap();
        wm.server.calls.clear();
        wm.move_mouse().unwrap();
        assert!(wm.server.calls.is_empty());
    }

    #[test]
    fn test_resize_tracks_corner_and_warps() {
        let mut wm = manager_with_windows(&[(10, 1)]);
        wm.server.events.extend([motion(500, 400, 100), Event::ButtonRelease]);
        wm.resize_mouse().unwrap();

        let id = wm.clients.lookup(10).unwrap();
        let g = wm.clients.get(id).unwrap().geometry;
        // origin (100, 100), border 4
        assert_eq!(g, Geometry::new(100, 100, 393, 293));
        assert!(wm.server.calls.contains(&Call::Warp(10, 300 + 3, 200 + 3)));
        assert!(wm.server.calls.contains(&Call::Warp(10, 393 + 3, 293 + 3)));
    }

    #[test]
    fn test_resize_ignores_oversized_request() {
        let mut wm = manager_with_windows(&[(10, 1)]);
        wm.server.events.extend([motion(5000, 400, 100), Event::ButtonRelease]);
        wm.resize_mouse().unwrap();
        let id = wm.clients.lookup(10).unwrap();
        assert_eq!(wm.clients.get(id).unwrap().geometry, Geometry::new(100, 100, 300, 200));
    }
}
