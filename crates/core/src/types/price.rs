//! Type-safe price representation using decimal arithmetic.
//!
//! The remote API serializes decimal fields either as JSON strings
//! (`"1500.00"`) or as plain numbers; both deserialize into [`Price`].

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Currency symbol used for display (Bangladeshi taka).
pub const CURRENCY_SYMBOL: &str = "৳";

/// Tax rate applied to order totals at display time.
const ORDER_TAX_RATE: Decimal = Decimal::from_parts(1, 0, 0, false, 1);

/// Flat delivery charge added to every order.
const ORDER_DELIVERY_CHARGE: Decimal = Decimal::from_parts(100, 0, 0, false, 0);

/// A price in the store currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Zero price.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from a whole number of currency units.
    #[must_use]
    pub fn from_units(units: i64) -> Self {
        Self(Decimal::from(units))
    }

    /// Create a price from a whole number of units; usable in constants.
    #[must_use]
    pub const fn whole(units: u32) -> Self {
        Self(Decimal::from_parts(units, 0, 0, false, 0))
    }

    /// The decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Multiply by a line quantity.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }
}

impl std::ops::Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl std::iter::Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, p| acc + p)
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{CURRENCY_SYMBOL}{:.2}", self.0)
    }
}

impl std::str::FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<Decimal>().map(Self)
    }
}

/// Inclusive price interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    /// Lower bound (inclusive).
    pub min: Price,
    /// Upper bound (inclusive).
    pub max: Price,
}

impl PriceRange {
    /// Create a range. Bounds are taken as given; an inverted range matches nothing.
    #[must_use]
    pub const fn new(min: Price, max: Price) -> Self {
        Self { min, max }
    }

    /// Whether `price` lies within the range (both ends inclusive).
    #[must_use]
    pub fn contains(&self, price: Price) -> bool {
        price >= self.min && price <= self.max
    }
}

/// Display totals for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    /// Order total as reported by the server.
    pub subtotal: Price,
    /// Tax charged on the subtotal.
    pub tax: Price,
    /// Flat delivery charge.
    pub delivery: Price,
    /// Rounded grand total.
    pub grand_total: Price,
}

impl OrderTotals {
    /// Compute display totals from the server-reported order total.
    #[must_use]
    pub fn from_subtotal(subtotal: Price) -> Self {
        let tax = subtotal.amount() * ORDER_TAX_RATE;
        let grand = (subtotal.amount() + tax + ORDER_DELIVERY_CHARGE)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        Self {
            subtotal,
            tax: Price(tax),
            delivery: Price(ORDER_DELIVERY_CHARGE),
            grand_total: Price(grand),
        }
    }
}
