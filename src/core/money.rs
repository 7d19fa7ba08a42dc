//! Currency helpers.
//!
//! Amounts are `Decimal` in memory and whole cents in storage, so sums never pick up
//! floating-point error.

use crate::errors::{Error, Result};
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};

/// Number of decimal places a stored amount may carry.
pub const CURRENCY_SCALE: u32 = 2;

/// Largest price a single item may carry.
pub const MAX_PRICE: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Converts a price into whole cents, rejecting negative, sub-cent or out-of-range
/// amounts.
pub fn to_cents(amount: Decimal) -> Result<i64> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(Error::InvalidAmount { amount });
    }
    if amount > MAX_PRICE {
        return Err(Error::InvalidAmount { amount });
    }
    if amount.normalize().scale() > CURRENCY_SCALE {
        return Err(Error::InvalidAmount { amount });
    }

    (amount * Decimal::ONE_HUNDRED)
        .to_i64()
        .ok_or(Error::InvalidAmount { amount })
}

/// Adds up stored cent amounts, failing with [`Error::InvalidAmount`] instead of
/// overflowing.
pub fn sum_cents<I>(cents: I) -> Result<i64>
where
    I: IntoIterator<Item = i64>,
{
    cents.into_iter().try_fold(0_i64, |total, next| {
        total.checked_add(next).ok_or_else(|| Error::InvalidAmount {
            amount: from_cents(total) + from_cents(next),
        })
    })
}

/// Converts stored cents back into a currency amount.
#[must_use]
pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, CURRENCY_SCALE)
}

/// Applies a tax rate (e.g. `0.08` for 8%) to a pre-tax amount, rounding half away
/// from zero to cents.
#[must_use]
pub fn apply_tax(amount: Decimal, rate: Decimal) -> Decimal {
    (amount * (Decimal::ONE + rate))
        .round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}
