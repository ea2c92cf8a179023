//! Cutting Patterns

use std::fmt;

use smallvec::{SmallVec, smallvec};

use crate::instance::Instance;

/// One way of cutting a stock roll: how many pieces of each item type a
/// single roll yields.
///
/// Counts are dense and index-aligned with the instance items.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    counts: SmallVec<[u64; 8]>,
}

impl Pattern {
    /// Create a pattern from per-item counts.
    pub fn new(counts: impl IntoIterator<Item = u64>) -> Self {
        Self {
            counts: counts.into_iter().collect(),
        }
    }

    /// Identity pattern for item `idx`: as many copies of that item as fit on
    /// one roll, and nothing else.
    pub fn single(instance: &Instance, idx: usize) -> Option<Self> {
        let copies = instance.max_copies(idx)?;
        let mut counts: SmallVec<[u64; 8]> = smallvec![0; instance.len()];

        *counts.get_mut(idx)? = copies;

        Some(Self { counts })
    }

    /// Number of pieces of item `idx` in this pattern (zero if out of range).
    pub fn count(&self, idx: usize) -> u64 {
        self.counts.get(idx).copied().unwrap_or(0)
    }

    /// Per-item counts in index order
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Number of item types this pattern is defined over
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// True if the pattern cuts no pieces at all.
    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|&count| count == 0)
    }

    /// Items with a strictly positive count, as `(item index, count)`.
    pub fn nonzero(&self) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.counts
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, count)| count > 0)
    }

    /// Width consumed on one roll, `Σ width[i] * count[i]`.
    ///
    /// Returns `None` on overflow or when the pattern length does not match
    /// the instance.
    pub fn used_width(&self, instance: &Instance) -> Option<u64> {
        if self.counts.len() != instance.len() {
            return None;
        }

        self.counts
            .iter()
            .zip(instance.widths())
            .try_fold(0u64, |acc, (&count, width)| {
                acc.checked_add(count.checked_mul(width)?)
            })
    }

    /// Whether the pattern fits on one roll of the instance.
    pub fn fits(&self, instance: &Instance) -> bool {
        self.used_width(instance)
            .is_some_and(|used| used <= instance.roll_width())
    }

    /// Trim loss left on one roll cut to this pattern.
    pub fn waste(&self, instance: &Instance) -> Option<u64> {
        instance.roll_width().checked_sub(self.used_width(instance)?)
    }

    /// Human-readable description, e.g. `2 × 45 + 1 × 14`.
    pub fn describe(&self, instance: &Instance) -> String {
        let parts: SmallVec<[String; 8]> = self
            .nonzero()
            .map(|(idx, count)| {
                let width = instance.item(idx).map_or(0, |item| item.width);

                format!("{count} × {width}")
            })
            .collect();

        if parts.is_empty() {
            return String::from("(empty)");
        }

        parts.join(" + ")
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: SmallVec<[String; 8]> =
            self.counts.iter().map(ToString::to_string).collect();

        write!(f, "[{}]", counts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn instance() -> Result<Instance, crate::instance::InstanceError> {
        Instance::from_widths_and_demands(100, &[45, 36, 31, 14], &[97, 610, 395, 211])
    }

    #[test]
    fn single_fills_roll_with_one_item_type() -> TestResult {
        let instance = instance()?;
        let pattern = Pattern::single(&instance, 3).ok_or("missing pattern")?;

        assert_eq!(pattern.counts(), &[0, 0, 0, 7]);
        assert_eq!(pattern.used_width(&instance), Some(98));
        assert_eq!(pattern.waste(&instance), Some(2));
        assert!(pattern.fits(&instance));

        Ok(())
    }

    #[test]
    fn single_out_of_range_is_none() -> TestResult {
        let instance = instance()?;

        assert!(Pattern::single(&instance, 4).is_none());

        Ok(())
    }

    #[test]
    fn fits_rejects_overfull_pattern() -> TestResult {
        let instance = instance()?;

        assert!(Pattern::new([1, 1, 0, 1]).fits(&instance));
        assert!(!Pattern::new([1, 1, 1, 0]).fits(&instance));

        Ok(())
    }

    #[test]
    fn fits_rejects_wrong_length() -> TestResult {
        let instance = instance()?;

        assert!(!Pattern::new([1, 1]).fits(&instance));

        Ok(())
    }

    #[test]
    fn used_width_detects_overflow() -> TestResult {
        let instance = instance()?;

        assert_eq!(Pattern::new([u64::MAX, 0, 0, 0]).used_width(&instance), None);

        Ok(())
    }

    #[test]
    fn nonzero_skips_empty_counts() {
        let pattern = Pattern::new([0, 2, 0, 1]);

        assert_eq!(pattern.nonzero().collect::<Vec<_>>(), vec![(1, 2), (3, 1)]);
        assert!(!pattern.is_empty());
        assert!(Pattern::new([0, 0]).is_empty());
    }

    #[test]
    fn describe_and_display() -> TestResult {
        let instance = instance()?;
        let pattern = Pattern::new([0, 2, 0, 2]);

        assert_eq!(pattern.describe(&instance), "2 × 36 + 2 × 14");
        assert_eq!(Pattern::new([0, 0, 0, 0]).describe(&instance), "(empty)");
        assert_eq!(pattern.to_string(), "[0, 2, 0, 2]");

        Ok(())
    }
}
