//! # Money Module
//!
//! Provides the `Money` type for monetary values on sales documents.
//!
//! ## Integer Cents
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Requests arrive with decimal prices, the engine reports decimal        │
//! │  totals. Between the two, every amount is held as integer cents so     │
//! │  that line sums, discounts and tax never drift.                        │
//! │                                                                         │
//! │    50.00 × 2      = 10000 cents                                        │
//! │    10000 - 10%    =  9000 cents                                        │
//! │    9000 + 23% tax = 11070 cents                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Quantities on sales lines are fractional (kilograms, metres), so the one
//! place a float touches money is [`Money::multiply_quantity`], which rounds
//! back to whole cents immediately.
//!
//! ## Wire Format
//! On the wire an amount is a plain decimal number (`50`, `123.45`), never
//! cents. Incoming values are rounded to the nearest cent.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use crate::types::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// Currency-neutral: the currency a document is priced in travels next to
/// its amounts as a currency id, never inside `Money`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use salesgate_core::money::Money;
    ///
    /// let price = Money::from_cents(5000); // 50.00
    /// assert_eq!(price.cents(), 5000);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive.
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Calculates tax on a net amount, rounding half up.
    ///
    /// ## Implementation
    /// Integer math: `(amount * bps + 5000) / 10000`.
    ///
    /// ```rust
    /// use salesgate_core::money::Money;
    /// use salesgate_core::types::TaxRate;
    ///
    /// let net = Money::from_cents(1000);
    /// let tax = net.calculate_tax(TaxRate::from_bps(825));
    /// assert_eq!(tax.cents(), 83);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        let tax_cents = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_cents(tax_cents as i64)
    }

    /// Splits a tax-inclusive (gross) amount and returns its net part.
    ///
    /// ## Formula
    /// ```text
    /// net = gross × 10000 / (10000 + bps)      rounded half up
    ///
    /// 123.00 at 23%  →  100.00 net
    /// ```
    pub fn extract_tax_included(&self, rate: TaxRate) -> Money {
        let divisor = 10000i128 + rate.bps() as i128;
        let scaled = self.0 as i128 * 10000;
        let net = (scaled + divisor / 2).div_euclid(divisor);
        Money::from_cents(net as i64)
    }

    /// Multiplies a unit price by a (possibly fractional) quantity.
    ///
    /// ```rust
    /// use salesgate_core::money::Money;
    ///
    /// let unit = Money::from_cents(299);
    /// assert_eq!(unit.multiply_quantity(3.0).cents(), 897);
    /// assert_eq!(unit.multiply_quantity(0.5).cents(), 150);
    /// ```
    pub fn multiply_quantity(&self, quantity: f64) -> Money {
        Money::from_cents((self.0 as f64 * quantity).round() as i64)
    }

    /// Like [`Money::multiply_quantity`], but `None` when the product does
    /// not fit.
    ///
    /// ```rust
    /// use salesgate_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(5000).checked_multiply_quantity(2.0), Some(Money::from_cents(10000)));
    /// assert_eq!(Money::from_cents(i64::MAX).checked_multiply_quantity(2.0), None);
    /// ```
    pub fn checked_multiply_quantity(&self, quantity: f64) -> Option<Money> {
        let cents = (self.0 as f64 * quantity).round();
        // 2^63 itself does not fit
        (cents.is_finite() && cents.abs() < i64::MAX as f64).then(|| Money(cents as i64))
    }

    /// Checked addition. `None` on overflow.
    #[inline]
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Checked subtraction. `None` on overflow.
    #[inline]
    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    /// Applies a percentage discount and returns the discounted amount.
    ///
    /// `discount_bps` is in basis points (1000 = 10%).
    pub fn apply_percentage_discount(&self, discount_bps: u32) -> Money {
        let discount_amount = (self.0 as i128 * discount_bps as i128 + 5000) / 10000;
        Money::from_cents(self.0 - discount_amount as i64)
    }

    /// Returns the value as a decimal number, for engines that speak floats.
    pub fn to_decimal(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Builds a value from a decimal amount, rounding to the nearest cent.
    pub fn from_decimal(amount: f64) -> Money {
        Money::from_cents((amount * 100.0).round() as i64)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain decimal rendering: `100.00`, `-5.50`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_decimal())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = f64::deserialize(deserializer)?;
        let cents = (amount * 100.0).round();
        if !cents.is_finite() || cents.abs() >= i64::MAX as f64 {
            return Err(serde::de::Error::custom(format!(
                "amount {} is out of range",
                amount
            )));
        }
        Ok(Money::from_cents(cents as i64))
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

/// Unchecked; sums of untrusted amounts go through [`Money::checked_add`].
impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_major_minor() {
        assert_eq!(Money::from_major_minor(50, 0).cents(), 5000);
        assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(10000).to_string(), "100.00");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
    }

    #[test]
    fn test_tax_on_net() {
        let net = Money::from_cents(10000);
        assert_eq!(net.calculate_tax(TaxRate::from_bps(2300)).cents(), 2300);
        assert_eq!(net.calculate_tax(TaxRate::zero()).cents(), 0);
    }

    #[test]
    fn test_extract_tax_included() {
        let gross = Money::from_cents(12300);
        assert_eq!(gross.extract_tax_included(TaxRate::from_bps(2300)).cents(), 10000);

        // Zero rate leaves the amount untouched
        assert_eq!(gross.extract_tax_included(TaxRate::zero()).cents(), 12300);

        // 10.00 gross at 6% = 9.4339... → 9.43
        let gross = Money::from_cents(1000);
        assert_eq!(gross.extract_tax_included(TaxRate::from_bps(600)).cents(), 943);
    }

    #[test]
    fn test_fractional_quantity_rounds_to_cents() {
        let unit = Money::from_cents(333);
        assert_eq!(unit.multiply_quantity(1.5).cents(), 500); // 499.5 → 500
        assert_eq!(unit.multiply_quantity(-1.0).cents(), -333);
    }

    #[test]
    fn test_percentage_discount() {
        let subtotal = Money::from_cents(10000);
        assert_eq!(subtotal.apply_percentage_discount(1000).cents(), 9000);
        assert_eq!(subtotal.apply_percentage_discount(0).cents(), 10000);
    }

    #[test]
    fn test_decimal_conversion() {
        assert_eq!(Money::from_decimal(50.0).cents(), 5000);
        assert_eq!(Money::from_decimal(19.999).cents(), 2000);
        assert!((Money::from_cents(12345).to_decimal() - 123.45).abs() < f64::EPSILON);
    }

    #[test]
    fn test_sum() {
        let total: Money = [1000, 250, -50].iter().map(|c| Money::from_cents(*c)).sum();
        assert_eq!(total.cents(), 1200);
    }

    #[test]
    fn test_checked_arithmetic() {
        let max = Money::from_cents(i64::MAX);
        assert_eq!(max.checked_add(Money::from_cents(1)), None);
        assert_eq!(Money::from_cents(i64::MIN).checked_sub(Money::from_cents(1)), None);
        assert_eq!(
            Money::from_cents(100).checked_add(Money::from_cents(50)),
            Some(Money::from_cents(150))
        );
        assert_eq!(Money::from_cents(100).checked_multiply_quantity(f64::INFINITY), None);
        assert_eq!(Money::from_cents(333).checked_multiply_quantity(1.5), Some(Money::from_cents(500)));
    }

    #[test]
    fn test_serde_is_decimal() {
        assert_eq!(serde_json::to_string(&Money::from_cents(10000)).unwrap(), "100.0");
        assert_eq!(serde_json::to_string(&Money::from_cents(12345)).unwrap(), "123.45");

        let parsed: Money = serde_json::from_str("50").unwrap();
        assert_eq!(parsed.cents(), 5000);
        let parsed: Money = serde_json::from_str("19.999").unwrap();
        assert_eq!(parsed.cents(), 2000);

        assert!(serde_json::from_str::<Money>("1e300").is_err());
    }
}
