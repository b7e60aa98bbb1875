//! Sparse epoch-indexed step function.
//!
//! A [`TimeSeries`] records a value only at the epochs where it changes.
//! The value effective at epoch `E` is the value of the last slot whose
//! epoch is `<= E`, or `T::default()` when `E` precedes every slot.
//!
//! Only the two most recent slots are writable. They represent the
//! "current" and "pending next" values; anything older is history and is
//! never rewritten.

use serde::{Deserialize, Serialize};

use crate::error::SeriesError;
use crate::staking::types::Epoch;

/// Numeric value storable in a [`TimeSeries`].
pub trait SeriesValue: Copy + Default + PartialOrd {
    fn checked_add(self, rhs: Self) -> Option<Self>;
    fn saturating_sub(self, rhs: Self) -> Self;
}

macro_rules! impl_series_value {
    ($($t:ty),*) => {
        $(
            impl SeriesValue for $t {
                fn checked_add(self, rhs: Self) -> Option<Self> {
                    <$t>::checked_add(self, rhs)
                }

                fn saturating_sub(self, rhs: Self) -> Self {
                    <$t>::saturating_sub(self, rhs)
                }
            }
        )*
    };
}

impl_series_value!(u64, u128);

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeries<T> {
    epochs: Vec<Epoch>,
    values: Vec<T>,
}

impl<T: SeriesValue> TimeSeries<T> {
    pub fn new() -> Self {
        Self {
            epochs: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    /// Value effective at `epoch`.
    pub fn find(&self, epoch: Epoch) -> T {
        let len = self.epochs.len();
        if len == 0 || epoch < self.epochs[0] {
            return T::default();
        }
        // "current" and "next" lookups dominate
        if epoch >= self.epochs[len - 1] {
            return self.values[len - 1];
        }
        if len >= 2 && epoch >= self.epochs[len - 2] {
            return self.values[len - 2];
        }
        let idx = self.epochs.partition_point(|e| *e <= epoch);
        self.values[idx - 1]
    }

    /// Newest recorded value, or the default when empty.
    pub fn latest(&self) -> T {
        self.values.last().copied().unwrap_or_default()
    }

    /// Adds `delta` at `epoch` and to every later slot.
    pub fn add(&mut self, epoch: Epoch, delta: T) -> Result<(), SeriesError> {
        self.check_writable(epoch)?;
        let idx = self.extend(epoch);
        let updated = self.values[idx..]
            .iter()
            .map(|v| v.checked_add(delta).ok_or(SeriesError::Overflow(epoch)))
            .collect::<Result<Vec<T>, _>>()?;
        self.values.truncate(idx);
        self.values.extend(updated);
        Ok(())
    }

    /// Subtracts up to `delta` at `epoch` and from every later slot.
    ///
    /// The subtracted amount is clamped to the smallest affected slot, so
    /// every slot from `epoch` on drops by the same returned amount.
    pub fn sub(&mut self, epoch: Epoch, delta: T) -> Result<T, SeriesError> {
        self.check_writable(epoch)?;
        let idx = self.extend(epoch);
        let floor = self.values[idx..]
            .iter()
            .copied()
            .fold(delta, |low, v| if v < low { v } else { low });
        for value in self.values[idx..].iter_mut() {
            *value = value.saturating_sub(floor);
        }
        Ok(floor)
    }

    /// Overwrites the value from `epoch` onward.
    pub fn set(&mut self, epoch: Epoch, value: T) -> Result<(), SeriesError> {
        self.check_writable(epoch)?;
        let idx = self.extend(epoch);
        for slot in self.values[idx..].iter_mut() {
            *slot = value;
        }
        Ok(())
    }

    /// Returns the index of the slot that holds `epoch`, creating it if needed.
    ///
    /// Callers must have checked [`Self::check_writable`] first.
    fn extend(&mut self, epoch: Epoch) -> usize {
        let len = self.epochs.len();
        if len == 0 {
            self.epochs.push(epoch);
            self.values.push(T::default());
            return 0;
        }
        let last = len - 1;
        if epoch > self.epochs[last] {
            let carried = self.values[last];
            self.epochs.push(epoch);
            self.values.push(carried);
            return len;
        }
        if epoch == self.epochs[last] {
            return last;
        }
        // strictly older than the newest slot: fold into the older live slot
        last.saturating_sub(1)
    }

    /// Oldest epoch that may still be written, `None` when empty.
    pub fn oldest_writable(&self) -> Option<Epoch> {
        let len = self.epochs.len();
        match len {
            0 => None,
            1 => Some(self.epochs[0]),
            _ => Some(self.epochs[len - 2]),
        }
    }

    fn check_writable(&self, epoch: Epoch) -> Result<(), SeriesError> {
        match self.oldest_writable() {
            Some(oldest) if epoch < oldest => Err(SeriesError::PastEpoch { epoch, oldest }),
            _ => Ok(()),
        }
    }

    /// Iterates over `(epoch, value)` change points in order.
    pub fn iter(&self) -> impl Iterator<Item = (Epoch, T)> + '_ {
        self.epochs.iter().copied().zip(self.values.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_find_before_first_entry_is_zero() {
        let mut series: TimeSeries<u128> = TimeSeries::new();
        assert_eq!(series.find(0), 0);
        assert_eq!(series.find(100), 0);

        series.add(10, 500).unwrap();
        assert_eq!(series.find(9), 0);
        assert_eq!(series.find(10), 500);
        assert_eq!(series.find(1_000), 500);
    }

    #[test]
    fn test_add_carries_into_later_slots() {
        let mut series: TimeSeries<u128> = TimeSeries::new();
        series.add(5, 100).unwrap();
        series.add(6, 50).unwrap();
        assert_eq!(series.find(5), 100);
        assert_eq!(series.find(6), 150);

        // adding at the older live slot must also raise the pending one
        series.add(5, 10).unwrap();
        assert_eq!(series.find(5), 110);
        assert_eq!(series.find(6), 160);
    }

    #[test]
    fn test_past_epoch_rejected() {
        let mut series: TimeSeries<u128> = TimeSeries::new();
        series.add(3, 1).unwrap();
        series.add(5, 1).unwrap();
        series.add(8, 1).unwrap();

        assert_eq!(
            series.add(4, 1),
            Err(SeriesError::PastEpoch { epoch: 4, oldest: 5 })
        );
        assert_eq!(
            series.sub(2, 1),
            Err(SeriesError::PastEpoch { epoch: 2, oldest: 5 })
        );
        // history is untouched
        assert_eq!(series.find(3), 1);
        assert_eq!(series.find(5), 2);
        assert_eq!(series.find(8), 3);
    }

    #[test]
    fn test_between_last_two_slots_edits_older() {
        let mut series: TimeSeries<u128> = TimeSeries::new();
        series.add(5, 10).unwrap();
        series.add(8, 10).unwrap();
        series.add(6, 1).unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series.find(5), 11);
        assert_eq!(series.find(8), 21);
    }

    #[test]
    fn test_sub_clamps_to_slot_value() {
        let mut series: TimeSeries<u128> = TimeSeries::new();
        series.add(1, 300).unwrap();
        let actual = series.sub(2, 500).unwrap();
        assert_eq!(actual, 300);
        assert_eq!(series.find(1), 300);
        assert_eq!(series.find(2), 0);
    }

    #[test]
    fn test_sub_moves_every_later_slot_equally() {
        let mut series: TimeSeries<u128> = TimeSeries::new();
        series.add(1, 100).unwrap();
        series.sub(2, 80).unwrap();
        assert_eq!(series.find(2), 20);

        // the pending slot only holds 20, so the older one may drop by no more
        let actual = series.sub(1, 50).unwrap();
        assert_eq!(actual, 20);
        assert_eq!(series.find(1), 80);
        assert_eq!(series.find(2), 0);
    }

    #[test]
    fn test_set_overwrites_from_epoch() {
        let mut series: TimeSeries<u64> = TimeSeries::new();
        series.set(1, 500).unwrap();
        series.set(4, 1_000).unwrap();
        assert_eq!(series.find(3), 500);
        assert_eq!(series.find(4), 1_000);
        series.set(4, 700).unwrap();
        assert_eq!(series.find(10), 700);
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_overflow_leaves_series_unchanged() {
        let mut series: TimeSeries<u64> = TimeSeries::new();
        series.add(1, u64::MAX).unwrap();
        assert_eq!(series.add(1, 1), Err(SeriesError::Overflow(1)));
        assert_eq!(series.find(1), u64::MAX);
    }

    #[test]
    fn test_lookup_over_long_history() {
        let mut series: TimeSeries<u128> = TimeSeries::new();
        for epoch in 0..100u64 {
            series.add(epoch * 2, 1).unwrap();
        }
        assert_eq!(series.find(0), 1);
        assert_eq!(series.find(1), 1);
        assert_eq!(series.find(51), 26);
        assert_eq!(series.find(198), 100);
        assert_eq!(series.find(500), 100);
    }

    proptest! {
        #[test]
        fn prop_add_only_affects_epoch_and_later(
            deltas in proptest::collection::vec((0u64..4, 1u128..1_000), 1..40),
            extra in 1u128..1_000,
        ) {
            let mut series: TimeSeries<u128> = TimeSeries::new();
            let mut epoch = 0u64;
            for (step, delta) in deltas {
                epoch += step;
                series.add(epoch, delta).unwrap();
            }
            let target = epoch + 1;
            let before: Vec<u128> = (0..=target).map(|e| series.find(e)).collect();
            series.add(target, extra).unwrap();
            for e in 0..target {
                prop_assert_eq!(series.find(e), before[e as usize]);
            }
            prop_assert_eq!(series.find(target), before[target as usize] + extra);
        }

        #[test]
        fn prop_sub_never_negative(
            initial in 0u128..10_000,
            request in 0u128..20_000,
        ) {
            let mut series: TimeSeries<u128> = TimeSeries::new();
            series.add(1, initial).unwrap();
            let prior = series.find(2);
            let actual = series.sub(2, request).unwrap();
            prop_assert!(actual <= request);
            prop_assert!(actual <= prior);
            prop_assert_eq!(series.find(2), prior - actual);
            prop_assert_eq!(series.find(1), initial);
        }
    }
}
