use x11rb::protocol::xproto::Window;

use crate::shared::Geometry;
use crate::wm::client_flags::ClientFlags;
use crate::wm::hints::SizeHintCache;

/// Window Manager client state
/// Represents a window being managed by the WM
#[derive(Debug, Clone)]
pub struct Client {
    /// X11 window ID
    pub window: Window,

    /// Best-effort title, only used for rule matching
    pub name: String,

    /// Current geometry
    pub geometry: Geometry,

    /// Geometry before the last change (restore target for un-maximize/un-fullscreen)
    pub old_geometry: Geometry,

    pub border_width: i32,

    /// Border width to give back on unmanage, or after leaving fullscreen
    pub old_border_width: i32,

    /// Size hints, recomputed when `hints.valid` is false
    pub hints: SizeHintCache,

    pub flags: ClientFlags,

    /// Single tag, `1..=numtags`
    pub tag: u32,
}

impl Client {
    pub fn new(window: Window, geometry: Geometry, border_width: i32) -> Self {
        Self {
            window,
            name: String::new(),
            geometry,
            old_geometry: geometry,
            border_width: 0,
            old_border_width: border_width,
            hints: SizeHintCache::default(),
            flags: ClientFlags::empty(),
            tag: 0,
        }
    }

    /// Width including both borders
    pub fn outer_width(&self) -> i32 {
        self.geometry.outer_width(self.border_width)
    }

    /// Height including both borders
    pub fn outer_height(&self) -> i32 {
        self.geometry.outer_height(self.border_width)
    }

    pub fn is_fullscreen(&self) -> bool {
        self.flags.contains(ClientFlags::FULLSCREEN)
    }

    pub fn is_fixed(&self) -> bool {
        self.flags.contains(ClientFlags::FIXED)
    }

    pub fn never_focus(&self) -> bool {
        self.flags.contains(ClientFlags::NEVER_FOCUS)
    }

    /// Store a new geometry, keeping the previous one as the restore target
    pub fn record_geometry(&mut self, geometry: Geometry) {
        self.old_geometry = self.geometry;
        self.geometry = geometry;
    }
}
