//! Fixed-point monetary types.
//!
//! Prices and cash balances are stored as integers with 4 decimal places, so
//! `Price * Quantity = Cash` is exact and settlement never drifts. Strategy
//! math happens in `f64` and crosses into these types at the order boundary.

use crate::ids::PRICE_SCALE;
use derive_more::{Add, AddAssign, From, Into, Neg, Sub, SubAssign, Sum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Mul;

// =============================================================================
// Quantity
// =============================================================================

/// Number of units (always non-negative; positions are signed `i64`).
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default, Add, Sub, AddAssign, SubAssign,
    Sum, From, Into,
)]
pub struct Quantity(pub u64);

impl Quantity {
    pub const ZERO: Quantity = Quantity(0);

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn min(self, other: Self) -> Self {
        Quantity(self.0.min(other.0))
    }

    #[inline]
    pub fn saturating_sub(self, rhs: Self) -> Self {
        Quantity(self.0.saturating_sub(rhs.0))
    }

    /// Signed view, for position arithmetic.
    #[inline]
    pub fn signed(self) -> i64 {
        self.0 as i64
    }
}

impl fmt::Debug for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Qty({})", self.0)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq<u64> for Quantity {
    fn eq(&self, other: &u64) -> bool {
        self.0 == *other
    }
}

/// Shared surface of the 4-decimal fixed-point types: float conversion and
/// `$` formatting under a debug tag.
macro_rules! fixed_point {
    ($name:ident, $tag:literal) => {
        impl $name {
            pub const ZERO: $name = $name(0);

            #[inline]
            pub fn from_float(v: f64) -> Self {
                Self((v * PRICE_SCALE as f64).round() as i64)
            }

            #[inline]
            pub fn to_float(self) -> f64 {
                self.0 as f64 / PRICE_SCALE as f64
            }

            #[inline]
            pub fn raw(self) -> i64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($tag, "(${:.4})"), self.to_float())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "${:.4}", self.to_float())
            }
        }
    };
}

// =============================================================================
// Price
// =============================================================================

/// Per-unit price. `Price(1_000_000)` is $100.00, `Price(100)` one cent.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default, Add, Sub, Neg, AddAssign,
    SubAssign, From, Into,
)]
pub struct Price(pub i64);

fixed_point!(Price, "Price");

impl Price {
    /// Largest price the book admits, about $92 billion per unit. Keeps the
    /// raw value clear of saturated float conversions.
    pub const MAX: Price = Price(i64::MAX / PRICE_SCALE);

    /// Round a float price to whole cents, the tick size strategies quote in.
    #[inline]
    pub fn from_float_cents(v: f64) -> Self {
        Self::from_float((v * 100.0).round() / 100.0)
    }

    #[inline]
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Average of two prices. A half increment rounds to the even neighbour.
    pub fn midpoint(self, other: Price) -> Price {
        let sum = self.0 as i128 + other.0 as i128;
        let (half, odd) = (sum.div_euclid(2), sum.rem_euclid(2) == 1);
        let mid = if odd && half.rem_euclid(2) == 1 { half + 1 } else { half };
        // Lies between the two inputs, so it fits.
        Price(mid as i64)
    }

    /// Notional of `qty` units, `None` if it does not fit in `Cash`.
    pub fn checked_notional(self, qty: Quantity) -> Option<Cash> {
        let qty = i64::try_from(qty.0).ok()?;
        self.0.checked_mul(qty).map(Cash)
    }

    /// Arithmetic mean of a set of prices. `None` if empty.
    pub fn mean<I: IntoIterator<Item = Price>>(prices: I) -> Option<Price> {
        let (sum, n) = prices
            .into_iter()
            .fold((0i128, 0i128), |(s, n), p| (s + p.0 as i128, n + 1));
        (n > 0).then(|| Price((sum / n) as i64))
    }
}

// =============================================================================
// Cash
// =============================================================================

/// Account balance. May go negative only through valuation (equity of a
/// large short), never through settlement.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default, Add, Sub, Neg, AddAssign,
    SubAssign, Sum, From, Into,
)]
pub struct Cash(pub i64);

fixed_point!(Cash, "Cash");

impl Cash {
    #[inline]
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub fn checked_add(self, rhs: Cash) -> Option<Cash> {
        self.0.checked_add(rhs.0).map(Cash)
    }

    #[inline]
    pub fn saturating_add(self, rhs: Cash) -> Cash {
        Cash(self.0.saturating_add(rhs.0))
    }

    #[inline]
    pub fn saturating_sub(self, rhs: Cash) -> Cash {
        Cash(self.0.saturating_sub(rhs.0))
    }

    /// Whole units affordable at `price`. Zero for non-positive prices or balances.
    pub fn units_affordable(self, price: Price) -> u64 {
        if price.0 <= 0 || self.0 <= 0 {
            return 0;
        }
        (self.0 / price.0) as u64
    }
}

// =============================================================================
// Price-Quantity Operations
// =============================================================================

impl Mul<Quantity> for Price {
    type Output = Cash;

    /// Notional value of `qty` units.
    fn mul(self, qty: Quantity) -> Cash {
        Cash(self.0 * qty.0 as i64)
    }
}

impl Mul<Price> for Quantity {
    type Output = Cash;

    fn mul(self, price: Price) -> Cash {
        Cash(price.0 * self.0 as i64)
    }
}

impl Mul<i64> for Price {
    type Output = Cash;

    /// Mark-to-market value of a signed position, saturating at the `Cash` range.
    fn mul(self, position: i64) -> Cash {
        Cash(self.0.saturating_mul(position))
    }
}
