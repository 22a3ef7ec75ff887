/*!
 * Distribution planner for spreading stock across channel bindings.
 *
 * Both entry points share one rule set: only active bindings take part,
 * weights come from the channel distribution ratios (unset counts as 0),
 * and a zero weight sum falls back to an equal split. Every portion except
 * the last is rounded; the last active binding absorbs the rounding
 * remainder so the portions always add up to the requested amount exactly.
 */

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

/// One binding's weight in a distribution.
#[derive(Debug, Clone, Copy)]
pub struct BindingShare {
    pub binding_id: Uuid,
    pub ratio: Option<u32>,
    pub active: bool,
}

/// Absolute quantity assigned to a binding, 4 decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsolutePortion {
    pub binding_id: Uuid,
    pub quantity: Decimal,
}

/// Whole-unit stock delta assigned to a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaPortion {
    pub binding_id: Uuid,
    pub quantity: i64,
}

fn effective_weights(active: &[&BindingShare]) -> (Vec<u64>, u64) {
    let ratios: Vec<u64> = active
        .iter()
        .map(|s| u64::from(s.ratio.unwrap_or(0)))
        .collect();
    let ratio_sum: u64 = ratios.iter().sum();
    if ratio_sum == 0 {
        (vec![1; active.len()], active.len() as u64)
    } else {
        (ratios, ratio_sum)
    }
}

/// Splits an absolute quantity across the active shares.
pub fn split_absolute(total: Decimal, shares: &[BindingShare]) -> Vec<AbsolutePortion> {
    let active: Vec<&BindingShare> = shares.iter().filter(|s| s.active).collect();
    if active.is_empty() {
        return Vec::new();
    }
    let (weights, weight_sum) = effective_weights(&active);

    let mut portions = Vec::with_capacity(active.len());
    let mut assigned = Decimal::ZERO;
    for (i, share) in active.iter().enumerate() {
        let quantity = if i + 1 == active.len() {
            total - assigned
        } else {
            (total * Decimal::from(weights[i]) / Decimal::from(weight_sum))
                .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
        };
        assigned += quantity;
        portions.push(AbsolutePortion {
            binding_id: share.binding_id,
            quantity,
        });
    }
    portions
}

/// Splits a signed stock delta across the active shares in whole units.
pub fn split_delta(delta: i64, shares: &[BindingShare]) -> Vec<DeltaPortion> {
    let active: Vec<&BindingShare> = shares.iter().filter(|s| s.active).collect();
    if active.is_empty() {
        return Vec::new();
    }
    let (weights, weight_sum) = effective_weights(&active);

    let mut portions = Vec::with_capacity(active.len());
    let mut assigned: i64 = 0;
    for (i, share) in active.iter().enumerate() {
        let quantity = if i + 1 == active.len() {
            delta - assigned
        } else {
            (Decimal::from(delta) * Decimal::from(weights[i]) / Decimal::from(weight_sum))
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .to_i64()
                .unwrap_or(0)
        };
        assigned += quantity;
        portions.push(DeltaPortion {
            binding_id: share.binding_id,
            quantity,
        });
    }
    portions
}
