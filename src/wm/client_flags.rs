//! Client Flags
//!
//! Classification bits kept per managed client.

use bitflags::bitflags;

bitflags! {
    /// Client classification flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ClientFlags: u8 {
        /// Min and max size hints are equal, the window cannot be resized
        const FIXED       = 1 << 0;
        /// WM_HINTS input field is false
        const NEVER_FOCUS = 1 << 1;
        /// Covers the whole monitor with no border
        const FULLSCREEN  = 1 << 2;
    }
}
