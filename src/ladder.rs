//! Ladder-gap computation.
//!
//! Pure math, no I/O: given an instrument's geometry, the reference
//! prices pulled from the account, and the prices of the resting ladder
//! orders already in the book, compute the two anchors and the rungs that
//! are missing. Every value here is cycle-scoped: a plan is built fresh
//! each pass from the broker's live state and discarded afterwards.
//!
//! All prices are `Decimal` and rounded half-up to the instrument's
//! configured precision; rung membership is exact equality after rounding,
//! with no tolerance band.

use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashSet;

use crate::config::InstrumentConfig;

/// Round a price half-up to the given number of decimal places.
pub fn round_price(price: Decimal, decimals: u32) -> Decimal {
    price.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero)
}

/// Reference price set is empty; max/min are undefined and the ladder
/// cannot be anchored this pass.
#[derive(Debug, thiserror::Error)]
#[error("reference price set is empty")]
pub struct DegenerateLadder;

/// The per-instrument parameters the ladder math needs, with the pip
/// spacing already converted to a price step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LadderGeometry {
    pub decimals: u32,
    pub take_profit_distance: Decimal,
    /// Price distance between adjacent rungs.
    pub step: Decimal,
    pub rung_count: u32,
}

impl LadderGeometry {
    pub fn from_config(cfg: &InstrumentConfig) -> Self {
        Self {
            decimals: cfg.price_decimals,
            take_profit_distance: cfg.take_profit_distance,
            step: cfg.price_step(),
            rung_count: cfg.rung_count,
        }
    }
}

/// One missing rung: the resting-entry trigger price and its paired exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedOrder {
    pub entry: Decimal,
    pub take_profit: Decimal,
}

/// The desired ladder for one instrument on one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct LadderPlan {
    pub high_anchor: Decimal,
    pub low_anchor: Decimal,
    /// Missing rungs, deduplicated and sorted ascending by entry price.
    pub to_place: Vec<PlannedOrder>,
    /// Lowest desired rung price.
    pub floor: Decimal,
    /// Highest desired rung price.
    pub ceiling: Decimal,
}

impl LadderPlan {
    /// Compute the plan.
    ///
    /// `reference_prices` is the anchor set (take-profit or open-trade
    /// prices); `resting_prices` are the ladder orders already in the
    /// book. Both are rounded to the instrument precision before use.
    pub fn build(
        geometry: &LadderGeometry,
        reference_prices: &[Decimal],
        resting_prices: &[Decimal],
    ) -> Result<LadderPlan, DegenerateLadder> {
        let round = |p: Decimal| round_price(p, geometry.decimals);

        let mut refs = reference_prices.iter().map(|&p| round(p));
        let first = refs.next().ok_or(DegenerateLadder)?;
        let (max_ref, min_ref) = refs.fold((first, first), |(max, min), p| {
            (max.max(p), min.min(p))
        });

        let high_anchor = round(max_ref - geometry.take_profit_distance);
        let low_anchor = round(min_ref - geometry.take_profit_distance);

        let resting: HashSet<Decimal> = resting_prices.iter().map(|&p| round(p)).collect();

        let mut to_place = Vec::new();
        let mut ceiling = high_anchor;
        let mut floor = low_anchor;
        for k in 1..geometry.rung_count {
            let offset = Decimal::from(k) * geometry.step;
            let upper = round(high_anchor + offset);
            let lower = round(low_anchor - offset);
            ceiling = upper;
            floor = lower;

            if !resting.contains(&upper) {
                to_place.push(PlannedOrder {
                    entry: upper,
                    take_profit: round(upper + geometry.take_profit_distance),
                });
            }
            if !resting.contains(&lower) {
                to_place.push(PlannedOrder {
                    entry: lower,
                    take_profit: round(lower + geometry.take_profit_distance),
                });
            }
        }

        to_place.sort_by(|a, b| a.entry.cmp(&b.entry));
        to_place.dedup_by(|a, b| a.entry == b.entry);

        Ok(LadderPlan {
            high_anchor,
            low_anchor,
            to_place,
            floor,
            ceiling,
        })
    }

    /// Whether a (rounded) price lies inside the desired rung band.
    /// Resting ladder orders outside the band are stale.
    pub fn is_within_band(&self, price: Decimal) -> bool {
        self.floor <= price && price <= self.ceiling
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn geometry() -> LadderGeometry {
        // TRY_JPY-style: 2 decimals, 0.10 exit offset, 1 pip spacing.
        LadderGeometry {
            decimals: 2,
            take_profit_distance: dec!(0.10),
            step: dec!(0.01),
            rung_count: 3,
        }
    }

    // -- Rounding --

    #[test]
    fn test_round_price_half_up() {
        assert_eq!(round_price(dec!(1.005), 2), dec!(1.01));
        assert_eq!(round_price(dec!(0.125), 2), dec!(0.13));
        assert_eq!(round_price(dec!(101.004), 2), dec!(101.00));
        assert_eq!(round_price(dec!(0.91235), 4), dec!(0.9124));
    }

    #[test]
    fn test_round_price_exact_equality_after_rounding() {
        // 1.10 at scale 2 and 1.1 at scale 1 must compare and hash equal.
        let a = round_price(dec!(1.1), 2);
        let b = round_price(dec!(1.100), 2);
        assert_eq!(a, b);
        let set: HashSet<Decimal> = [a].into_iter().collect();
        assert!(set.contains(&b));
    }

    // -- Anchors --

    #[test]
    fn test_anchors_from_reference_extremes() {
        let plan = LadderPlan::build(&geometry(), &[dec!(101.10), dec!(100.90)], &[]).unwrap();
        assert_eq!(plan.high_anchor, dec!(101.00));
        assert_eq!(plan.low_anchor, dec!(100.80));
    }

    #[test]
    fn test_single_reference_price_collapses_anchors() {
        let plan = LadderPlan::build(&geometry(), &[dec!(101.10)], &[]).unwrap();
        assert_eq!(plan.high_anchor, dec!(101.00));
        assert_eq!(plan.low_anchor, dec!(101.00));
    }

    #[test]
    fn test_empty_reference_set_is_degenerate() {
        let result = LadderPlan::build(&geometry(), &[], &[dec!(101.01)]);
        assert!(result.is_err());
    }

    // -- Rung computation --

    #[test]
    fn test_full_plan_against_empty_book() {
        let plan = LadderPlan::build(&geometry(), &[dec!(101.10), dec!(100.90)], &[]).unwrap();

        let expected = [
            (dec!(100.78), dec!(100.88)),
            (dec!(100.79), dec!(100.89)),
            (dec!(101.01), dec!(101.11)),
            (dec!(101.02), dec!(101.12)),
        ];
        assert_eq!(plan.to_place.len(), expected.len());
        for (planned, (entry, tp)) in plan.to_place.iter().zip(expected) {
            assert_eq!(planned.entry, entry);
            assert_eq!(planned.take_profit, tp);
        }
    }

    #[test]
    fn test_resting_rungs_are_not_replaced() {
        let plan = LadderPlan::build(
            &geometry(),
            &[dec!(101.10), dec!(100.90)],
            &[dec!(101.01), dec!(100.79)],
        )
        .unwrap();

        let entries: Vec<Decimal> = plan.to_place.iter().map(|p| p.entry).collect();
        assert_eq!(entries, vec![dec!(100.78), dec!(101.02)]);
    }

    #[test]
    fn test_two_plans_in_a_row_are_idempotent() {
        let refs = [dec!(101.10), dec!(100.90)];
        let first = LadderPlan::build(&geometry(), &refs, &[]).unwrap();

        // Pretend every planned rung got placed and now rests in the book.
        let resting: Vec<Decimal> = first.to_place.iter().map(|p| p.entry).collect();
        let second = LadderPlan::build(&geometry(), &refs, &resting).unwrap();

        assert!(second.to_place.is_empty());
        assert_eq!(second.high_anchor, first.high_anchor);
        assert_eq!(second.low_anchor, first.low_anchor);
    }

    #[test]
    fn test_rungs_strictly_monotone() {
        let geometry = LadderGeometry {
            decimals: 2,
            take_profit_distance: dec!(0.10),
            step: dec!(0.01),
            rung_count: 10,
        };
        let plan = LadderPlan::build(&geometry, &[dec!(101.10), dec!(100.90)], &[]).unwrap();

        let entries: Vec<Decimal> = plan.to_place.iter().map(|p| p.entry).collect();
        for pair in entries.windows(2) {
            assert!(pair[0] < pair[1], "entries must strictly increase: {entries:?}");
        }
        // 9 rungs above, 9 below, no overlap.
        assert_eq!(entries.len(), 18);
    }

    #[test]
    fn test_resting_prices_with_different_scales_match() {
        // Broker reports 101.1 (scale 1); the desired rung is 101.10.
        let geometry = LadderGeometry {
            decimals: 2,
            take_profit_distance: dec!(0.10),
            step: dec!(0.10),
            rung_count: 2,
        };
        let plan =
            LadderPlan::build(&geometry, &[dec!(101.10)], &[dec!(101.1)]).unwrap();
        // Anchor 101.00; upper rung 101.10 rests (as 101.1), lower 100.90 missing.
        let entries: Vec<Decimal> = plan.to_place.iter().map(|p| p.entry).collect();
        assert_eq!(entries, vec![dec!(100.90)]);
    }

    #[test]
    fn test_four_decimal_instrument() {
        // USD_CHF-style: 4 decimals, 0.01 pip spacing, tiny exit offset.
        let geometry = LadderGeometry {
            decimals: 4,
            take_profit_distance: dec!(0.001),
            step: dec!(0.0001),
            rung_count: 3,
        };
        let plan = LadderPlan::build(&geometry, &[dec!(0.9132), dec!(0.9128)], &[]).unwrap();
        assert_eq!(plan.high_anchor, dec!(0.9122));
        assert_eq!(plan.low_anchor, dec!(0.9118));

        let entries: Vec<Decimal> = plan.to_place.iter().map(|p| p.entry).collect();
        assert_eq!(
            entries,
            vec![dec!(0.9116), dec!(0.9117), dec!(0.9123), dec!(0.9124)]
        );
        assert_eq!(plan.to_place[0].take_profit, dec!(0.9126));
    }

    #[test]
    fn test_negative_take_profit_distance() {
        // Sell-side flavour: exits sit below the entry.
        let geometry = LadderGeometry {
            decimals: 2,
            take_profit_distance: dec!(-0.10),
            step: dec!(0.01),
            rung_count: 2,
        };
        let plan = LadderPlan::build(&geometry, &[dec!(100.00)], &[]).unwrap();
        // Anchor = 100.00 - (-0.10) = 100.10.
        assert_eq!(plan.high_anchor, dec!(100.10));
        assert_eq!(plan.to_place[0].entry, dec!(100.09));
        assert_eq!(plan.to_place[0].take_profit, dec!(99.99));
    }

    #[test]
    fn test_entries_unique_with_near_coincident_anchors() {
        let geometry = LadderGeometry {
            decimals: 2,
            take_profit_distance: dec!(0.10),
            step: dec!(0.01),
            rung_count: 3,
        };
        let plan =
            LadderPlan::build(&geometry, &[dec!(101.10), dec!(101.09)], &[]).unwrap();
        let entries: Vec<Decimal> = plan.to_place.iter().map(|p| p.entry).collect();
        let unique: HashSet<Decimal> = entries.iter().copied().collect();
        assert_eq!(entries.len(), unique.len(), "no duplicate entries: {entries:?}");
        assert_eq!(entries.len(), 4);
    }

    // -- Band --

    #[test]
    fn test_band_bounds() {
        let plan = LadderPlan::build(&geometry(), &[dec!(101.10), dec!(100.90)], &[]).unwrap();
        assert_eq!(plan.ceiling, dec!(101.02));
        assert_eq!(plan.floor, dec!(100.78));

        assert!(plan.is_within_band(dec!(101.02)));
        assert!(plan.is_within_band(dec!(100.78)));
        assert!(plan.is_within_band(dec!(100.90)));
        assert!(!plan.is_within_band(dec!(101.03)));
        assert!(!plan.is_within_band(dec!(100.77)));
    }
}
