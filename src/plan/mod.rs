//! Recharge plans.
//!
//! A plan lists the top-ups that leave a card holding a whole number of
//! round trips, in amounts the payment provider accepts, below the balance
//! ceiling. Plans are derived data: they are recomputed from the card every
//! time they are shown and never stored.

use serde::Serialize;

use crate::cards::Card;
use crate::money::Money;

/// Balances at or above this are never offered (1000.00).
pub const CEILING: Money = Money::from_cents(100_000);

/// Top-ups must be a multiple of this many cents.
pub const GRANULARITY_CENTS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RechargeOption {
    /// Round trips covered by the balance after recharging
    pub outward_tickets: u64,
    pub return_tickets: u64,
    pub new_balance: Money,
    pub credit_recharge: Money,
}

/// Price of one outward plus one return trip.
pub fn daily_cost(outward_price: Money, return_price: Money) -> Money {
    Money::from_cents(outward_price.cents().saturating_add(return_price.cents()))
}

/// Enumerate every accepted recharge for a balance, ordered by trip count.
///
/// Returns an empty plan when a round trip costs nothing (or less), and when
/// no accepted top-up fits under [`CEILING`].
pub fn compute(balance: Money, outward_price: Money, return_price: Money) -> Vec<RechargeOption> {
    let daily = daily_cost(outward_price, return_price).cents();
    if daily <= 0 {
        return Vec::new();
    }

    let balance = balance.cents();
    let ceiling = CEILING.cents();

    // Never offer fewer trips than the current balance already pays for.
    let first_trips = div_ceil(balance, daily).max(0);

    (first_trips..)
        .map_while(|trips| {
            trips
                .checked_mul(daily)
                .filter(|&new_balance| new_balance < ceiling)
                .map(|new_balance| (trips, new_balance))
        })
        .filter_map(|(trips, new_balance)| {
            let credit = new_balance.checked_sub(balance)?;
            if credit.rem_euclid(GRANULARITY_CENTS) != 0 {
                return None;
            }
            Some(RechargeOption {
                outward_tickets: trips as u64,
                return_tickets: trips as u64,
                new_balance: Money::from_cents(new_balance),
                credit_recharge: Money::from_cents(credit),
            })
        })
        .collect()
}

pub fn plan_for(card: &Card) -> Vec<RechargeOption> {
    compute(card.balance, card.outward_price, card.return_price)
}

/// Ceiling division rounding toward positive infinity. `rhs` must be positive.
fn div_ceil(lhs: i64, rhs: i64) -> i64 {
    let quotient = lhs.div_euclid(rhs);
    if lhs.rem_euclid(rhs) == 0 {
        quotient
    } else {
        quotient + 1
    }
}
