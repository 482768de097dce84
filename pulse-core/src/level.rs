//! Contribution intensity levels
//!
//! Maps a raw daily count onto the five heatmap tiers:
//!
//! | count | level |
//! |-------|-------|
//! | 0     | 0     |
//! | 1     | 1     |
//! | 2–3   | 2     |
//! | 4–5   | 3     |
//! | ≥ 6   | 4     |

use serde::{Deserialize, Serialize};

/// Heatmap intensity tier in `0..=4`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContributionLevel(u8);

impl ContributionLevel {
    pub const NONE: ContributionLevel = ContributionLevel(0);
    pub const MAX: ContributionLevel = ContributionLevel(4);

    /// Classify a daily contribution count
    pub fn classify(count: u64) -> Self {
        let level = match count {
            0 => 0,
            1 => 1,
            2..=3 => 2,
            4..=5 => 3,
            _ => 4,
        };
        ContributionLevel(level)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Every level, lowest first (legend order)
    pub fn all() -> impl Iterator<Item = ContributionLevel> {
        (0..=Self::MAX.0).map(ContributionLevel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds() {
        let expected = [(0, 0), (1, 1), (2, 2), (3, 2), (4, 3), (5, 3), (6, 4), (7, 4)];
        for (count, level) in expected {
            assert_eq!(
                ContributionLevel::classify(count).value(),
                level,
                "count {}",
                count
            );
        }
        assert_eq!(ContributionLevel::classify(u64::MAX), ContributionLevel::MAX);
    }

    #[test]
    fn test_classify_is_monotonic() {
        let mut previous = ContributionLevel::NONE;
        for count in 0..100 {
            let level = ContributionLevel::classify(count);
            assert!(level >= previous);
            previous = level;
        }
    }

    #[test]
    fn test_all_levels_in_order() {
        let levels: Vec<u8> = ContributionLevel::all().map(|l| l.value()).collect();
        assert_eq!(levels, vec![0, 1, 2, 3, 4]);
    }
}
