//! Hints Module
//!
//! ICCCM hint decoding (WM_NORMAL_HINTS, WM_HINTS) and the size-hint
//! constraint applied to every geometry change of a managed client.

use bitflags::bitflags;

use crate::shared::Geometry;

bitflags! {
    /// WM_SIZE_HINTS.flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SizeHintsFlags: u32 {
        const US_POSITION = 1 << 0;
        const US_SIZE     = 1 << 1;
        const P_POSITION  = 1 << 2;
        const P_SIZE      = 1 << 3;
        const P_MIN_SIZE  = 1 << 4;
        const P_MAX_SIZE  = 1 << 5;
        const P_RESIZE_INC = 1 << 6;
        const P_ASPECT    = 1 << 7;
        const P_BASE_SIZE = 1 << 8;
        const P_WIN_GRAVITY = 1 << 9;
    }
}

/// Size hints (XSizeHints equivalent)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SizeHints {
    pub flags: SizeHintsFlags,
    pub min_width: i32,
    pub min_height: i32,
    pub max_width: i32,
    pub max_height: i32,
    pub width_inc: i32,
    pub height_inc: i32,
    /// (x, y) numerator/denominator pair
    pub min_aspect: (i32, i32),
    pub max_aspect: (i32, i32),
    pub base_width: i32,
    pub base_height: i32,
}

impl SizeHints {
    /// Decode the 32-bit words of a WM_NORMAL_HINTS property.
    ///
    /// Pre-ICCCM clients write 15 words with no base size or gravity.
    pub fn from_raw(values: &[u32]) -> Option<Self> {
        if values.len() < 15 {
            return None;
        }
        let v = |i: usize| values.get(i).copied().unwrap_or(0) as i32;
        Some(Self {
            flags: SizeHintsFlags::from_bits_truncate(values[0]),
            min_width: v(5),
            min_height: v(6),
            max_width: v(7),
            max_height: v(8),
            width_inc: v(9),
            height_inc: v(10),
            min_aspect: (v(11), v(12)),
            max_aspect: (v(13), v(14)),
            base_width: v(15),
            base_height: v(16),
        })
    }
}

/// WM_HINTS InputHint flag
const INPUT_HINT: u32 = 1 << 0;

/// WM hints (XWMHints equivalent, only the fields we act on)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WmHints {
    pub flags: u32,
    pub input: bool,
}

impl WmHints {
    pub fn from_raw(values: &[u32]) -> Option<Self> {
        let flags = *values.first()?;
        Some(Self {
            flags,
            input: values.get(1).copied().unwrap_or(0) != 0,
        })
    }

    /// Whether the client refuses keyboard focus from the window manager
    pub fn never_focus(&self) -> bool {
        self.flags & INPUT_HINT != 0 && !self.input
    }
}

/// Size constraints derived from WM_NORMAL_HINTS, recomputed lazily
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SizeHintCache {
    pub base_width: i32,
    pub base_height: i32,
    pub width_inc: i32,
    pub height_inc: i32,
    pub min_width: i32,
    pub min_height: i32,
    /// 0 means unbounded
    pub max_width: i32,
    pub max_height: i32,
    /// Minimum h/w ratio, 0.0 when unset
    pub min_aspect: f32,
    /// Maximum w/h ratio, 0.0 when unset
    pub max_aspect: f32,
    pub valid: bool,
}

impl SizeHintCache {
    /// Build the cache from decoded hints; `None` yields zeroed hints.
    ///
    /// Base size falls back to min size and min size falls back to base.
    pub fn from_hints(hints: Option<&SizeHints>) -> Self {
        let Some(h) = hints else {
            return Self { valid: true, ..Self::default() };
        };
        let flags = h.flags;
        let (base_width, base_height) = if flags.contains(SizeHintsFlags::P_BASE_SIZE) {
            (h.base_width, h.base_height)
        } else if flags.contains(SizeHintsFlags::P_MIN_SIZE) {
            (h.min_width, h.min_height)
        } else {
            (0, 0)
        };
        let (width_inc, height_inc) = if flags.contains(SizeHintsFlags::P_RESIZE_INC) {
            (h.width_inc, h.height_inc)
        } else {
            (0, 0)
        };
        let (max_width, max_height) = if flags.contains(SizeHintsFlags::P_MAX_SIZE) {
            (h.max_width, h.max_height)
        } else {
            (0, 0)
        };
        let (min_width, min_height) = if flags.contains(SizeHintsFlags::P_MIN_SIZE) {
            (h.min_width, h.min_height)
        } else if flags.contains(SizeHintsFlags::P_BASE_SIZE) {
            (h.base_width, h.base_height)
        } else {
            (0, 0)
        };
        let (min_aspect, max_aspect) = if flags.contains(SizeHintsFlags::P_ASPECT)
            && h.min_aspect.0 != 0
            && h.max_aspect.1 != 0
        {
            (
                h.min_aspect.1 as f32 / h.min_aspect.0 as f32,
                h.max_aspect.0 as f32 / h.max_aspect.1 as f32,
            )
        } else {
            (0.0, 0.0)
        };
        Self {
            base_width,
            base_height,
            width_inc,
            height_inc,
            min_width,
            min_height,
            max_width,
            max_height,
            min_aspect,
            max_aspect,
            valid: true,
        }
    }

    /// Min and max are set and equal
    pub fn is_fixed(&self) -> bool {
        self.max_width != 0
            && self.max_height != 0
            && self.max_width == self.min_width
            && self.max_height == self.min_height
    }
}

/// Constrain a proposed rectangle for a client.
///
/// `current` is the client's recorded geometry, `border_width` its border and
/// `area` the usable monitor size. The hint cache must already be valid.
/// Returns the constrained rectangle and whether it differs from `current`.
pub fn apply_size_hints(
    hints: &SizeHintCache,
    current: Geometry,
    border_width: i32,
    area: (i32, i32),
    proposed: Geometry,
) -> (Geometry, bool) {
    let (mw, mh) = area;
    let Geometry { mut x, mut y, mut width, mut height } = proposed;

    width = width.max(1);
    height = height.max(1);
    if x >= mw {
        x = mw - current.outer_width(border_width);
    }
    if y >= mh {
        y = mh - current.outer_height(border_width);
    }
    if x + width + 2 * border_width < 0 {
        x = 0;
    }
    if y + height + 2 * border_width < 0 {
        y = 0;
    }

    // ICCCM 4.1.2.3: base size only counts toward aspect when it is not the min size
    let base_is_min =
        hints.base_width == hints.min_width && hints.base_height == hints.min_height;
    if !base_is_min {
        width -= hints.base_width;
        height -= hints.base_height;
    }
    if hints.min_aspect > 0.0 && hints.max_aspect > 0.0 {
        if hints.max_aspect < width as f32 / height as f32 {
            width = (height as f32 * hints.max_aspect + 0.5) as i32;
        } else if hints.min_aspect < height as f32 / width as f32 {
            height = (width as f32 * hints.min_aspect + 0.5) as i32;
        }
    }
    if base_is_min {
        width -= hints.base_width;
        height -= hints.base_height;
    }
    if hints.width_inc > 0 {
        width -= width % hints.width_inc;
    }
    if hints.height_inc > 0 {
        height -= height % hints.height_inc;
    }
    width = (width + hints.base_width).max(hints.min_width);
    height = (height + hints.base_height).max(hints.min_height);
    if hints.max_width > 0 {
        width = width.min(hints.max_width);
    }
    if hints.max_height > 0 {
        height = height.min(hints.max_height);
    }
    width = width.max(1);
    height = height.max(1);

    let result = Geometry::new(x, y, width, height);
    (result, result != current)
}

#[cfg(test)]
mod tests {
    use super::*;

    const AREA: (i32, i32) = (1000, 800);

    fn raw_hints(flags: SizeHintsFlags, fill: impl Fn(&mut [u32; 18])) -> SizeHints {
        let mut raw = [0u32; 18];
        raw[0] = flags.bits();
        fill(&mut raw);
        SizeHints::from_raw(&raw).unwrap()
    }

    #[test]
    fn test_from_raw_rejects_short_property() {
        assert!(SizeHints::from_raw(&[0; 14]).is_none());
        let old_style = SizeHints::from_raw(&[0; 15]).unwrap();
        assert_eq!(old_style.base_width, 0);
    }

    #[test]
    fn test_base_and_min_fall_back_to_each_other() {
        let only_min = raw_hints(SizeHintsFlags::P_MIN_SIZE, |r| {
            r[5] = 40;
            r[6] = 30;
        });
        let cache = SizeHintCache::from_hints(Some(&only_min));
        assert_eq!((cache.base_width, cache.base_height), (40, 30));
        assert_eq!((cache.min_width, cache.min_height), (40, 30));

        let only_base = raw_hints(SizeHintsFlags::P_BASE_SIZE, |r| {
            r[15] = 12;
            r[16] = 7;
        });
        let cache = SizeHintCache::from_hints(Some(&only_base));
        assert_eq!((cache.min_width, cache.min_height), (12, 7));
    }

    #[test]
    fn test_missing_hints_are_zeroed_and_valid() {
        let cache = SizeHintCache::from_hints(None);
        assert!(cache.valid);
        assert_eq!(cache.max_width, 0);
        assert!(!cache.is_fixed());
    }

    #[test]
    fn test_zero_aspect_denominator_disables_aspect() {
        let hints = raw_hints(SizeHintsFlags::P_ASPECT, |r| {
            r[11] = 0;
            r[12] = 1;
            r[13] = 4;
            r[14] = 3;
        });
        let cache = SizeHintCache::from_hints(Some(&hints));
        assert_eq!(cache.min_aspect, 0.0);
        assert_eq!(cache.max_aspect, 0.0);
    }

    #[test]
    fn test_fixed_when_min_equals_max() {
        let hints = raw_hints(SizeHintsFlags::P_MIN_SIZE | SizeHintsFlags::P_MAX_SIZE, |r| {
            r[5] = 300;
            r[6] = 200;
            r[7] = 300;
            r[8] = 200;
        });
        assert!(SizeHintCache::from_hints(Some(&hints)).is_fixed());
    }

    #[test]
    fn test_never_focus_requires_input_flag() {
        assert!(WmHints::from_raw(&[INPUT_HINT, 0]).unwrap().never_focus());
        assert!(!WmHints::from_raw(&[INPUT_HINT, 1]).unwrap().never_focus());
        assert!(!WmHints::from_raw(&[0, 0]).unwrap().never_focus());
        assert!(WmHints::from_raw(&[]).is_none());
    }

    #[test]
    fn test_increments_round_down_after_base() {
        let hints = raw_hints(
            SizeHintsFlags::P_BASE_SIZE | SizeHintsFlags::P_RESIZE_INC,
            |r| {
                r[9] = 10;
                r[10] = 20;
                r[15] = 4;
                r[16] = 2;
            },
        );
        let cache = SizeHintCache::from_hints(Some(&hints));
        let current = Geometry::new(0, 0, 100, 100);
        let (g, changed) =
            apply_size_hints(&cache, current, 1, AREA, Geometry::new(0, 0, 137, 95));
        // (137 - 4) rounds to 130, (95 - 2) rounds to 80
        assert_eq!((g.width, g.height), (134, 82));
        assert!(changed);
    }

    #[test]
    fn test_never_below_one_and_never_above_max() {
        let hints = raw_hints(SizeHintsFlags::P_MAX_SIZE, |r| {
            r[7] = 500;
            r[8] = 400;
        });
        let cache = SizeHintCache::from_hints(Some(&hints));
        let current = Geometry::new(0, 0, 10, 10);
        for (w, h) in [(-50, 0), (0, -3), (900, 900), (1, 1), (500, 401)] {
            let (g, _) = apply_size_hints(&cache, current, 2, AREA, Geometry::new(5, 5, w, h));
            assert!(g.width >= 1 && g.height >= 1, "{w}x{h} gave {g:?}");
            assert!(g.width <= 500 && g.height <= 400, "{w}x{h} gave {g:?}");
        }
    }

    #[test]
    fn test_idempotent_on_own_output() {
        // max sizes sit on the increment grid
        let hints = raw_hints(
            SizeHintsFlags::P_MIN_SIZE
                | SizeHintsFlags::P_MAX_SIZE
                | SizeHintsFlags::P_RESIZE_INC
                | SizeHintsFlags::P_BASE_SIZE,
            |r| {
                r[5] = 50;
                r[6] = 40;
                r[7] = 898;
                r[8] = 692;
                r[9] = 8;
                r[10] = 16;
                r[15] = 2;
                r[16] = 4;
            },
        );
        let cache = SizeHintCache::from_hints(Some(&hints));
        let start = Geometry::new(30, 40, 100, 100);
        for proposed in [
            Geometry::new(30, 40, 333, 211),
            Geometry::new(-20, 900, 10, 10),
            Geometry::new(1200, 5, 999, 999),
            Geometry::new(0, 0, 641, 97),
        ] {
            let (once, _) = apply_size_hints(&cache, start, 3, AREA, proposed);
            let (twice, changed) = apply_size_hints(&cache, once, 3, AREA, once);
            assert_eq!(once, twice);
            assert!(!changed);
        }
    }

    #[test]
    fn test_aspect_limits_recompute_one_side() {
        let hints = raw_hints(SizeHintsFlags::P_ASPECT, |r| {
            r[11] = 1;
            r[12] = 1;
            r[13] = 2;
            r[14] = 1;
        });
        let cache = SizeHintCache::from_hints(Some(&hints));
        let current = Geometry::new(0, 0, 10, 10);
        let (wide, _) = apply_size_hints(&cache, current, 0, AREA, Geometry::new(0, 0, 500, 100));
        assert_eq!((wide.width, wide.height), (200, 100));
        let (tall, _) = apply_size_hints(&cache, current, 0, AREA, Geometry::new(0, 0, 100, 500));
        assert_eq!((tall.width, tall.height), (100, 100));
    }

    #[test]
    fn test_offscreen_position_pulled_back() {
        let cache = SizeHintCache::from_hints(None);
        let current = Geometry::new(0, 0, 200, 100);
        let (g, _) =
            apply_size_hints(&cache, current, 4, AREA, Geometry::new(1000, 800, 200, 100));
        assert_eq!((g.x, g.y), (1000 - 208, 800 - 108));
        let (g, _) =
            apply_size_hints(&cache, current, 4, AREA, Geometry::new(-300, -300, 200, 100));
        assert_eq!((g.x, g.y), (0, 0));
    }

    #[test]
    fn test_unchanged_geometry_reports_no_change() {
        let cache = SizeHintCache::from_hints(None);
        let current = Geometry::new(10, 10, 300, 200);
        let (g, changed) = apply_size_hints(&cache, current, 1, AREA, current);
        assert_eq!(g, current);
        assert!(!changed);
    }
}
