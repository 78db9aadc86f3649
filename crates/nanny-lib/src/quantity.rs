//! Exact resource quantities
//!
//! Parses and prints the Kubernetes quantity syntax (`300m`, `30Mi`, `1.5`, `2e3`) and keeps
//! the amount as an exact decimal. Resource amounts feed straight into tolerance checks, so
//! nothing here goes through floating point.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

/// Binary SI suffixes, largest first
const BINARY_SUFFIXES: &[(&str, u32)] = &[
    ("Ei", 60),
    ("Pi", 50),
    ("Ti", 40),
    ("Gi", 30),
    ("Mi", 20),
    ("Ki", 10),
];

/// Decimal SI suffixes with their power of ten, largest first
const DECIMAL_SUFFIXES: &[(&str, i32)] = &[
    ("E", 18),
    ("P", 15),
    ("T", 12),
    ("G", 9),
    ("M", 6),
    ("k", 3),
    ("", 0),
    ("m", -3),
    ("u", -6),
    ("n", -9),
];

/// Largest exponent a `Decimal` can hold as a power of ten
const MAX_EXPONENT: i32 = 28;

/// Errors returned when parsing a quantity
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("quantity is empty")]
    Empty,

    #[error("quantity {0:?} is negative")]
    Negative(String),

    #[error("quantity {0:?} has an invalid number")]
    InvalidNumber(String),

    #[error("quantity {0:?} has an unknown suffix {1:?}")]
    UnknownSuffix(String, String),

    #[error("quantity {0:?} is too large")]
    Overflow(String),
}

/// How a quantity was written, which also decides how it is printed back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QuantityFormat {
    /// Decimal SI suffixes (`m`, `k`, `M`, ...), used for cpu and plain counts
    #[default]
    DecimalSI,
    /// Binary SI suffixes (`Ki`, `Mi`, `Gi`, ...), used for bytes
    BinarySI,
    /// Scientific notation (`1e3`)
    DecimalExponent,
}

/// An exact, non-negative resource amount
///
/// Equality, ordering and hashing look at the amount only, so `1Gi == 1073741824`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Quantity {
    value: Decimal,
    format: QuantityFormat,
}

impl Quantity {
    /// Zero in decimal format
    pub fn zero() -> Self {
        Self::default()
    }

    /// Build a quantity from an amount, clamping negative amounts to zero
    pub fn from_decimal(value: Decimal, format: QuantityFormat) -> Self {
        let value = if value.is_sign_negative() {
            Decimal::ZERO
        } else {
            value.normalize()
        };
        Self { value, format }
    }

    /// Plain integer count
    pub fn from_count(count: u64) -> Self {
        Self::from_decimal(Decimal::from(count), QuantityFormat::DecimalSI)
    }

    /// The exact amount
    pub fn amount(&self) -> Decimal {
        self.value
    }

    pub fn format(&self) -> QuantityFormat {
        self.format
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Sum of two quantities, keeping this quantity's format
    pub fn checked_add(&self, other: &Quantity) -> Option<Quantity> {
        self.value
            .checked_add(other.value)
            .map(|value| Self::from_decimal(value, self.format))
    }

    /// Product with a node count, keeping this quantity's format
    pub fn checked_mul(&self, factor: u64) -> Option<Quantity> {
        self.value
            .checked_mul(Decimal::from(factor))
            .map(|value| Self::from_decimal(value, self.format))
    }

    /// Sum that clamps at the largest representable amount
    pub fn saturating_add(&self, other: &Quantity) -> Quantity {
        self.checked_add(other)
            .unwrap_or_else(|| Self::from_decimal(Decimal::MAX, self.format))
    }

    /// Product that clamps at the largest representable amount
    pub fn saturating_mul(&self, factor: u64) -> Quantity {
        self.checked_mul(factor)
            .unwrap_or_else(|| Self::from_decimal(Decimal::MAX, self.format))
    }

    /// `self / other`, rounded down to two decimal places
    ///
    /// Returns `None` when `other` is zero.
    pub fn ratio(&self, other: &Quantity) -> Option<Decimal> {
        if other.is_zero() {
            return None;
        }
        self.value
            .checked_div(other.value)
            .map(|q| q.round_dp_with_strategy(2, RoundingStrategy::ToZero))
    }

    fn parse(input: &str) -> Result<Self, QuantityError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(QuantityError::Empty);
        }
        if trimmed.starts_with('-') {
            return Err(QuantityError::Negative(input.to_string()));
        }
        let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);

        let split = unsigned
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(unsigned.len());
        let (number, suffix) = unsigned.split_at(split);

        let mantissa =
            parse_number(number).ok_or_else(|| QuantityError::InvalidNumber(input.to_string()))?;
        let (multiplier, format) = parse_suffix(suffix)
            .ok_or_else(|| QuantityError::UnknownSuffix(input.to_string(), suffix.to_string()))?;

        let value = mantissa
            .checked_mul(multiplier)
            .ok_or_else(|| QuantityError::Overflow(input.to_string()))?;

        Ok(Self::from_decimal(value, format))
    }

    /// Largest binary suffix that divides the amount exactly
    fn binary_repr(&self) -> Option<String> {
        if !self.value.fract().is_zero() {
            return None;
        }
        for (suffix, shift) in BINARY_SUFFIXES {
            let unit = Decimal::from(1u64 << shift);
            if self.value >= unit && (self.value % unit).is_zero() {
                return Some(format!("{}{}", (self.value / unit).normalize(), suffix));
            }
        }
        Some(self.value.normalize().to_string())
    }

    /// Largest decimal suffix that leaves an integer mantissa
    fn decimal_repr(&self, exponent_style: bool) -> String {
        for (suffix, power) in DECIMAL_SUFFIXES {
            let Some(mantissa) = self.value.checked_div(pow10(*power)) else {
                continue;
            };
            if !mantissa.fract().is_zero() {
                continue;
            }
            let mantissa = mantissa.normalize();
            return match (exponent_style, *power) {
                (_, 0) => mantissa.to_string(),
                (true, p) => format!("{}e{}", mantissa, p),
                (false, _) => format!("{}{}", mantissa, suffix),
            };
        }
        // Finer than nano: print the exact decimal.
        self.value.normalize().to_string()
    }
}

fn parse_number(number: &str) -> Option<Decimal> {
    if number.is_empty() || number == "." || number.matches('.').count() > 1 {
        return None;
    }
    let mut normalized = number.to_string();
    if normalized.starts_with('.') {
        normalized.insert(0, '0');
    }
    if normalized.ends_with('.') {
        normalized.pop();
    }
    Decimal::from_str(&normalized).ok()
}

fn parse_suffix(suffix: &str) -> Option<(Decimal, QuantityFormat)> {
    if let Some((_, shift)) = BINARY_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
        return Some((Decimal::from(1u64 << shift), QuantityFormat::BinarySI));
    }
    if let Some((_, power)) = DECIMAL_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
        return Some((pow10(*power), QuantityFormat::DecimalSI));
    }
    let exponent = suffix.strip_prefix(['e', 'E'])?;
    let exponent: i32 = exponent.parse().ok()?;
    if exponent.abs() > MAX_EXPONENT {
        return None;
    }
    Some((pow10(exponent), QuantityFormat::DecimalExponent))
}

fn pow10(power: i32) -> Decimal {
    if power >= 0 {
        Decimal::from_i128_with_scale(10i128.pow(power as u32), 0)
    } else {
        Decimal::new(1, power.unsigned_abs())
    }
}

impl FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.is_zero() {
            return f.write_str("0");
        }
        let repr = match self.format {
            QuantityFormat::BinarySI => self
                .binary_repr()
                .unwrap_or_else(|| self.decimal_repr(false)),
            QuantityFormat::DecimalSI => self.decimal_repr(false),
            QuantityFormat::DecimalExponent => self.decimal_repr(true),
        };
        f.write_str(&repr)
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Quantity {}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quantity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl Hash for Quantity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.normalize().hash(state);
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(QuantityVisitor)
    }
}

struct QuantityVisitor;

impl<'de> Visitor<'de> for QuantityVisitor {
    type Value = Quantity;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a resource quantity such as \"300m\", \"30Mi\" or 2")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Quantity, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Quantity, E> {
        Ok(Quantity::from_count(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Quantity, E> {
        u64::try_from(v)
            .map(Quantity::from_count)
            .map_err(|_| E::custom(QuantityError::Negative(v.to_string())))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Quantity, E> {
        v.to_string().parse().map_err(E::custom)
    }
}
