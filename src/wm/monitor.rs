//! Monitor
//!
//! The single managed screen area and its two-slot tag selection.

use crate::wm::client::Client;
use crate::wm::registry::ClientId;

#[derive(Debug, Clone)]
pub struct Monitor {
    /// Usable width (screen width minus reserved margin)
    pub width: i32,
    /// Usable height (screen height minus reserved margin)
    pub height: i32,
    /// Full screen width, used for the initial off-screen placement
    pub screen_width: i32,
    /// Index into `tagset` of the active slot
    pub seltag: usize,
    pub tagset: [u32; 2],
    /// Focused client
    pub sel: Option<ClientId>,
}

impl Monitor {
    pub fn new(screen: (i32, i32), reserve: (i32, i32), tagset: [u32; 2]) -> Self {
        Self {
            width: screen.0 - reserve.0,
            height: screen.1 - reserve.1,
            screen_width: screen.0,
            seltag: 0,
            tagset,
            sel: None,
        }
    }

    /// Tag currently on view
    pub fn active_tag(&self) -> u32 {
        self.tagset[self.seltag]
    }

    pub fn is_visible(&self, client: &Client) -> bool {
        client.tag == self.active_tag()
    }

    pub fn area(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    /// Switch to `tag`; 0 (or any out of range value) returns to the previous tag.
    ///
    /// Returns false when `tag` is already active.
    pub fn view(&mut self, tag: u32, numtags: u32) -> bool {
        if tag == self.active_tag() {
            return false;
        }
        self.seltag ^= 1;
        if (1..=numtags).contains(&tag) {
            self.tagset[self.seltag] = tag;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_area_subtracts_reserve() {
        let mon = Monitor::new((1920, 1080), (0, 24), [1, 2]);
        assert_eq!(mon.area(), (1920, 1056));
        assert_eq!(mon.screen_width, 1920);
    }

    #[test]
    fn test_view_zero_toggles_between_slots() {
        let mut mon = Monitor::new((100, 100), (0, 0), [1, 2]);
        assert_eq!(mon.active_tag(), 1);
        assert!(mon.view(0, 4));
        assert_eq!(mon.active_tag(), 2);
        assert!(mon.view(0, 4));
        assert_eq!(mon.active_tag(), 1);
    }

    #[test]
    fn test_view_keeps_previous_tag_in_other_slot() {
        let mut mon = Monitor::new((100, 100), (0, 0), [1, 2]);
        assert!(mon.view(4, 4));
        assert_eq!(mon.active_tag(), 4);
        assert_eq!(mon.tagset[mon.seltag ^ 1], 1);
        assert!(!mon.view(4, 4));
    }
}
