use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, Mul, Sub};
use std::str::FromStr;

/// monetary amount in rupiah, exact decimal arithmetic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// create from decimal
    pub fn from_decimal(d: Decimal) -> Self {
        Money(d.normalize())
    }

    /// create from string with exact parsing
    pub fn from_str_exact(s: &str) -> Result<Self, rust_decimal::Error> {
        Ok(Money::from_decimal(Decimal::from_str(s.trim())?))
    }

    /// create from a whole rupiah amount
    pub fn from_major(amount: i64) -> Self {
        Money(Decimal::from(amount))
    }

    /// get underlying decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// round up to the next whole rupiah
    pub fn ceil(&self) -> Self {
        Money(self.0.ceil())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// strictly greater than zero
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// no fractional rupiah
    pub fn is_whole(&self) -> bool {
        self.0.fract().is_zero()
    }

    /// product with a markup, `None` on overflow
    pub fn checked_mul_markup(self, markup: Markup) -> Option<Money> {
        self.0.checked_mul(markup.0).map(Money)
    }

    pub fn checked_mul_u32(self, times: u32) -> Option<Money> {
        self.0.checked_mul(Decimal::from(times)).map(Money)
    }

    /// `None` on a zero divisor or overflow
    pub fn checked_div_u32(self, divisor: u32) -> Option<Money> {
        self.0.checked_div(Decimal::from(divisor)).map(Money)
    }

    /// whole rupiah as integer, if representable
    pub fn to_whole(&self) -> Option<i64> {
        if !self.is_whole() {
            return None;
        }
        i64::try_from(self.0).ok()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::from_str_exact(s)
    }
}

impl From<Decimal> for Money {
    fn from(d: Decimal) -> Self {
        Money::from_decimal(d)
    }
}

impl From<i64> for Money {
    fn from(i: i64) -> Self {
        Money::from_major(i)
    }
}

impl From<u32> for Money {
    fn from(i: u32) -> Self {
        Money::from_major(i as i64)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Money) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, other: Money) -> Money {
        Money(self.0 - other.0)
    }
}

impl Mul<Decimal> for Money {
    type Output = Money;

    fn mul(self, other: Decimal) -> Money {
        Money(self.0 * other)
    }
}

impl Mul<Markup> for Money {
    type Output = Money;

    fn mul(self, markup: Markup) -> Money {
        Money(self.0 * markup.0)
    }
}

impl Mul<u32> for Money {
    type Output = Money;

    fn mul(self, times: u32) -> Money {
        Money(self.0 * Decimal::from(times))
    }
}

impl Div<u32> for Money {
    type Output = Money;

    fn div(self, divisor: u32) -> Money {
        Money(self.0 / Decimal::from(divisor))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

/// price multiplier applied to the principal for a tenor (e.g. 1.20)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Markup(Decimal);

impl Markup {
    pub const ONE: Markup = Markup(Decimal::ONE);

    /// create from decimal multiplier (e.g., 1.25)
    pub fn from_decimal(d: Decimal) -> Self {
        Markup(d)
    }

    /// create from the surcharge in percent (e.g., 20 for 1.20)
    pub fn from_percentage(p: u32) -> Self {
        Markup(Decimal::ONE + Decimal::from(p) / Decimal::from(100))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// surcharge over the principal in percent
    pub fn surcharge_percentage(&self) -> Decimal {
        (self.0 - Decimal::ONE) * Decimal::from(100)
    }
}

impl fmt::Display for Markup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

impl From<Decimal> for Markup {
    fn from(d: Decimal) -> Self {
        Markup::from_decimal(d)
    }
}
