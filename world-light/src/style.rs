use crate::face::{MAX_LIGHT_STYLES, STYLE_UNUSED};

pub const DEFAULT_STYLE_EPSILON: f32 = 1e-4;

/// Dense per-frame intensity vector, one "white" scalar per style id.
/// Supplied by the caller every frame and never mutated here.
#[derive(Clone)]
pub struct StyleTable {
    pub white: [f32; MAX_LIGHT_STYLES],
}

impl StyleTable {
    pub fn filled(value: f32) -> Self {
        Self {
            white: [value; MAX_LIGHT_STYLES],
        }
    }

    /// Intensity for one style. The reserved unused marker always reads as
    /// zero so it never contributes light.
    pub fn white(&self, style: u8) -> f32 {
        if style == STYLE_UNUSED {
            0.0
        } else {
            self.white[style as usize]
        }
    }
}

impl Default for StyleTable {
    fn default() -> Self {
        Self::filled(1.0)
    }
}

/// 256-bit set of style ids.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StyleSet {
    words: [u64; MAX_LIGHT_STYLES / 64],
}

impl StyleSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            words: [u64::MAX; MAX_LIGHT_STYLES / 64],
        }
    }

    pub fn insert(&mut self, style: u8) {
        self.words[style as usize / 64] |= 1 << (style as usize % 64);
    }

    pub fn contains(&self, style: u8) -> bool {
        self.words[style as usize / 64] & (1 << (style as usize % 64)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&word| word == 0)
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }
}

/// Frame-to-frame style change detection: caches the previous intensity
/// vector and reports which styles moved more than `epsilon`.
pub struct StyleTracker {
    cache: [f32; MAX_LIGHT_STYLES],
    valid: bool,
    epsilon: f32,
}

impl StyleTracker {
    pub fn new() -> Self {
        Self::with_epsilon(DEFAULT_STYLE_EPSILON)
    }

    pub fn with_epsilon(epsilon: f32) -> Self {
        Self {
            cache: [0.0; MAX_LIGHT_STYLES],
            valid: false,
            epsilon,
        }
    }

    /// Forces the next `diff` to report every style as changed, e.g. after a
    /// level reload or a lost upload.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Compares against the cached vector, then unconditionally replaces the
    /// cache with `current`. The first call after construction or
    /// `invalidate` reports all styles changed.
    pub fn diff(&mut self, current: &StyleTable) -> StyleSet {
        let changed = if !self.valid {
            StyleSet::all()
        } else {
            let mut changed = StyleSet::empty();
            for (style, (&now, &cached)) in
                current.white.iter().zip(self.cache.iter()).enumerate()
            {
                if (now - cached).abs() > self.epsilon {
                    changed.insert(style as u8);
                }
            }
            changed
        };

        self.cache = current.white;
        self.valid = true;
        changed
    }
}

impl Default for StyleTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_diff_reports_every_style() {
        let mut tracker = StyleTracker::new();
        let changed = tracker.diff(&StyleTable::default());
        assert_eq!(changed.len(), MAX_LIGHT_STYLES);
    }

    #[test]
    fn unchanged_vector_diffs_empty() {
        let mut tracker = StyleTracker::new();
        let styles = StyleTable::default();
        tracker.diff(&styles);
        let changed = tracker.diff(&styles);
        assert!(changed.is_empty());
    }

    #[test]
    fn only_moved_styles_are_reported() {
        let mut tracker = StyleTracker::new();
        let mut styles = StyleTable::default();
        tracker.diff(&styles);

        styles.white[3] = 1.5;
        styles.white[200] = 0.0;
        let changed = tracker.diff(&styles);
        assert_eq!(changed.len(), 2);
        assert!(changed.contains(3));
        assert!(changed.contains(200));
        assert!(!changed.contains(4));
    }

    #[test]
    fn sub_epsilon_wiggle_is_ignored_but_still_cached() {
        let mut tracker = StyleTracker::with_epsilon(1e-3);
        let mut styles = StyleTable::default();
        tracker.diff(&styles);

        styles.white[9] += 5e-4;
        assert!(tracker.diff(&styles).is_empty());

        // The cache follows every call, so a second nudge of the same size
        // still compares against the latest vector.
        styles.white[9] += 5e-4;
        assert!(tracker.diff(&styles).is_empty());
    }

    #[test]
    fn invalidate_resets_to_first_call_behavior() {
        let mut tracker = StyleTracker::new();
        let styles = StyleTable::default();
        tracker.diff(&styles);
        tracker.invalidate();
        assert_eq!(tracker.diff(&styles).len(), MAX_LIGHT_STYLES);
    }

    #[test]
    fn unused_marker_always_reads_zero() {
        let styles = StyleTable::filled(2.0);
        assert_eq!(styles.white(STYLE_UNUSED), 0.0);
        assert_eq!(styles.white(0), 2.0);
    }
}
