//! Fractional ordering keys for sibling tasks.
//!
//! # Responsibility
//! - Assign sortable `f64` positions so that moving one task rewrites one row.
//! - Detect precision exhaustion before a bisection would collide.
//! - Rebuild evenly spaced positions for a whole sibling list on demand.
//!
//! # Invariants
//! - Sequences produced here are strictly increasing in list order.
//! - `between` never returns a value outside its open interval.
//! - `rebalance` keeps relative order and restores `POSITION_STEP` spacing.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Spacing between neighbours in a freshly assigned sequence (2^16).
pub const POSITION_STEP: f64 = 65536.0;

/// Smallest gap that may still be bisected.
pub const MIN_POSITION_GAP: f64 = 0.01;

/// Raised when the gap between two neighbours is too small to bisect.
///
/// Callers recover by rebalancing the sibling list; this never reaches the
/// public migration or reorder APIs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrecisionExhausted {
    pub prev: f64,
    pub next: f64,
}

impl Display for PrecisionExhausted {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "no representable position between {} and {}",
            self.prev, self.next
        )
    }
}

impl Error for PrecisionExhausted {}

/// Item carrying a mutable ordering key.
pub trait Positioned {
    fn position(&self) -> f64;
    fn set_position(&mut self, position: f64);
}

impl Positioned for f64 {
    fn position(&self) -> f64 {
        *self
    }

    fn set_position(&mut self, position: f64) {
        *self = position;
    }
}

/// Outcome of one insertion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Position assigned to the inserted item.
    pub position: f64,
    /// Whether siblings were renumbered before the insert.
    pub rebalanced: bool,
}

/// Position derived from a stable sequence number (`sequence * 2^16`).
///
/// Also used to upgrade legacy rows that were stored without a position.
pub fn default_position(sequence: i64) -> f64 {
    sequence as f64 * POSITION_STEP
}

/// Returns `count` evenly spaced positions starting at `POSITION_STEP`.
pub fn initial_sequence(count: usize) -> Vec<f64> {
    initial_sequence_from(1, count)
}

/// Returns `count` evenly spaced positions starting at `first_sequence`.
pub fn initial_sequence_from(first_sequence: i64, count: usize) -> Vec<f64> {
    (0..count)
        .map(|offset| default_position(first_sequence + offset as i64))
        .collect()
}

/// Returns true when `next - prev` is below `MIN_POSITION_GAP`.
///
/// Non-finite or inverted bounds also report true.
pub fn needs_rebalance(prev: f64, next: f64) -> bool {
    // NaN comparisons are false, so negate the healthy case.
    !(next - prev >= MIN_POSITION_GAP)
}

/// Computes a position strictly between `prev` and `next`.
///
/// A missing `prev` means "insert at the front", a missing `next` means
/// "append".
///
/// # Errors
/// - `PrecisionExhausted` when the neighbours are too close, non-finite, or
///   the midpoint rounds onto one of them.
pub fn between(prev: Option<f64>, next: Option<f64>) -> Result<f64, PrecisionExhausted> {
    match (prev, next) {
        (None, None) => Ok(POSITION_STEP),
        (Some(prev), None) => {
            let candidate = prev + POSITION_STEP;
            if prev.is_finite() && candidate.is_finite() && candidate > prev {
                Ok(candidate)
            } else {
                Err(PrecisionExhausted {
                    prev,
                    next: f64::INFINITY,
                })
            }
        }
        (None, Some(next)) => {
            let candidate = next - POSITION_STEP;
            if next.is_finite() && candidate.is_finite() && candidate < next {
                Ok(candidate)
            } else {
                Err(PrecisionExhausted {
                    prev: f64::NEG_INFINITY,
                    next,
                })
            }
        }
        (Some(prev), Some(next)) => {
            if !prev.is_finite() || !next.is_finite() || needs_rebalance(prev, next) {
                return Err(PrecisionExhausted { prev, next });
            }
            let midpoint = (prev + next) / 2.0;
            if midpoint > prev && midpoint < next {
                Ok(midpoint)
            } else {
                Err(PrecisionExhausted { prev, next })
            }
        }
    }
}

/// Reassigns `initial_sequence` to `items`, keeping slice order.
pub fn rebalance<T: Positioned>(items: &mut [T]) {
    let positions = initial_sequence(items.len());
    for (item, position) in items.iter_mut().zip(positions) {
        item.set_position(position);
    }
}

/// Inserts `item` at `index` of an ordered sibling list.
///
/// When the neighbour gap is exhausted the existing siblings are rebalanced
/// first, then the position is recomputed against the new neighbours.
pub fn insert_at<T: Positioned>(items: &mut Vec<T>, index: usize, mut item: T) -> Placement {
    let index = index.min(items.len());

    if let Ok(position) = position_for_slot(items, index) {
        item.set_position(position);
        items.insert(index, item);
        return Placement {
            position,
            rebalanced: false,
        };
    }

    rebalance(items);
    match position_for_slot(items, index) {
        Ok(position) => {
            item.set_position(position);
            items.insert(index, item);
            Placement {
                position,
                rebalanced: true,
            }
        }
        Err(_) => {
            items.insert(index, item);
            rebalance(items);
            Placement {
                position: items[index].position(),
                rebalanced: true,
            }
        }
    }
}

/// Computes the position for a new item at `index` without inserting it.
pub fn position_for_slot<T: Positioned>(
    items: &[T],
    index: usize,
) -> Result<f64, PrecisionExhausted> {
    let prev = index
        .checked_sub(1)
        .and_then(|prev_index| items.get(prev_index))
        .map(Positioned::position);
    let next = items.get(index).map(Positioned::position);
    between(prev, next)
}

/// Turns optional source-provided positions into a usable sequence.
///
/// `seeds` must already be in the intended order. A seed is kept verbatim
/// when it is finite and leaves at least `MIN_POSITION_GAP` to the previous
/// assignment. Other slots are bisected against the next usable seed; a
/// midpoint crowding the previous assignment is replaced by one step after
/// it. If the result still is not well spaced, the whole list falls back to
/// `initial_sequence`.
pub fn assign_seeded(seeds: &[Option<f64>]) -> Vec<f64> {
    let mut assigned: Vec<f64> = Vec::with_capacity(seeds.len());
    let mut prev: Option<f64> = None;

    for (index, seed) in seeds.iter().enumerate() {
        let usable = |value: &f64| {
            value.is_finite() && prev.map_or(true, |prev| !needs_rebalance(prev, *value))
        };

        let position = match seed.filter(|value| usable(value)) {
            Some(value) => value,
            None => {
                let next = seeds[index + 1..]
                    .iter()
                    .flatten()
                    .copied()
                    .find(|value| usable(value));
                let bisected = between(prev, next)
                    .ok()
                    .filter(|candidate| usable(candidate));
                match bisected.map_or_else(|| between(prev, None), Ok) {
                    Ok(position) => position,
                    Err(_) => return initial_sequence(seeds.len()),
                }
            }
        };

        prev = Some(position);
        assigned.push(position);
    }

    if is_well_spaced(&assigned) {
        assigned
    } else {
        initial_sequence(seeds.len())
    }
}

/// Returns true when every neighbour pair leaves at least `MIN_POSITION_GAP`.
pub fn is_well_spaced(positions: &[f64]) -> bool {
    positions
        .windows(2)
        .all(|pair| !needs_rebalance(pair[0], pair[1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn between_bisects_and_keeps_bisecting() {
        let first = between(Some(10.0), Some(20.0)).unwrap();
        assert_eq!(first, 15.0);
        let second = between(Some(10.0), Some(first)).unwrap();
        assert_eq!(second, 12.5);
    }

    #[test]
    fn between_open_ends_use_one_step() {
        assert_eq!(between(None, None).unwrap(), POSITION_STEP);
        assert_eq!(between(Some(100.0), None).unwrap(), 100.0 + POSITION_STEP);
        assert_eq!(between(None, Some(100.0)).unwrap(), 100.0 - POSITION_STEP);
    }

    #[test]
    fn between_rejects_gap_below_minimum() {
        let err = between(Some(1.0), Some(1.005)).unwrap_err();
        assert_eq!(err.prev, 1.0);
        assert_eq!(err.next, 1.005);
        assert!(between(Some(5.0), Some(5.0)).is_err());
        assert!(between(Some(6.0), Some(5.0)).is_err());
        assert!(between(Some(f64::NAN), Some(5.0)).is_err());
    }

    #[test]
    fn needs_rebalance_fires_below_minimum_gap() {
        assert!(!needs_rebalance(10.0, 20.0));
        assert!(!needs_rebalance(0.0, MIN_POSITION_GAP));
        assert!(needs_rebalance(0.0, MIN_POSITION_GAP / 2.0));
        assert!(needs_rebalance(f64::NAN, 1.0));
    }

    #[test]
    fn initial_sequence_is_spaced_by_step() {
        assert_eq!(
            initial_sequence(3),
            vec![POSITION_STEP, 2.0 * POSITION_STEP, 3.0 * POSITION_STEP]
        );
        assert_eq!(initial_sequence_from(4, 1), vec![4.0 * POSITION_STEP]);
        assert!(initial_sequence(0).is_empty());
        assert_eq!(default_position(7), 7.0 * POSITION_STEP);
    }

    #[test]
    fn repeated_front_insertion_eventually_rebalances() {
        let mut items = vec![10.0_f64, 20.0];
        let mut rebalanced_at = None;
        for round in 0..64 {
            let placement = insert_at(&mut items, 1, 0.0);
            if placement.rebalanced {
                rebalanced_at = Some(round);
                break;
            }
        }

        let round = rebalanced_at.expect("gap should exhaust within 64 bisections");
        assert!(round > 5);
        assert!(is_well_spaced(&items));
        assert_eq!(items[0], POSITION_STEP);
        assert!(items.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn insert_at_clamps_index_and_appends() {
        let mut items = vec![POSITION_STEP];
        let placement = insert_at(&mut items, 99, 0.0);
        assert_eq!(placement.position, 2.0 * POSITION_STEP);
        assert!(!placement.rebalanced);
        assert_eq!(items, vec![POSITION_STEP, 2.0 * POSITION_STEP]);
    }

    #[test]
    fn rebalance_keeps_order() {
        let mut items = vec![1.0_f64, 1.001, 1.002, 900.0];
        rebalance(&mut items);
        assert_eq!(items, initial_sequence(4));
    }

    #[test]
    fn assign_seeded_keeps_usable_seeds() {
        let positions = assign_seeded(&[Some(10.0), Some(20.0), Some(30.0)]);
        assert_eq!(positions, vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn assign_seeded_bisects_collisions() {
        let positions = assign_seeded(&[Some(10.0), Some(10.0), Some(20.0)]);
        assert_eq!(positions, vec![10.0, 15.0, 20.0]);
    }

    #[test]
    fn assign_seeded_appends_missing_seeds() {
        let positions = assign_seeded(&[Some(10.0), None, None]);
        assert_eq!(
            positions,
            vec![10.0, 10.0 + POSITION_STEP, 10.0 + 2.0 * POSITION_STEP]
        );
        assert_eq!(assign_seeded(&[None, None]), initial_sequence(2));
    }

    #[test]
    fn assign_seeded_keeps_seeds_after_long_collision_run() {
        let mut seeds = vec![Some(0.0); 500];
        seeds.push(Some(1.0));
        let positions = assign_seeded(&seeds);

        assert_eq!(positions.len(), 501);
        assert_eq!(positions[0], 0.0);
        assert_eq!(positions[1], 0.5);
        assert_eq!(positions[2], 0.75);
        assert!(is_well_spaced(&positions));
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn assign_seeded_falls_back_when_seeds_are_crowded() {
        let positions = assign_seeded(&[Some(1.0), Some(1.001), Some(1.002)]);
        assert!(is_well_spaced(&positions));
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
