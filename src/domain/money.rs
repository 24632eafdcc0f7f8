use crate::error::LedgerError;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Number of fractional digits carried by [`Points`].
pub const SCALE: u32 = 2;
const MINOR_PER_POINT: i64 = 100;

/// A loyalty-point quantity stored as a fixed-point integer of hundredths.
///
/// All balance arithmetic happens on the integer representation; `Decimal`
/// only appears at the edges (accrual responses, JSON, display). Serialized
/// as an exact decimal string (`"729.98"`); deserialization also accepts the
/// JSON number the accrual service sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Points(i64);

impl Points {
    pub const ZERO: Self = Self(0);

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub const fn whole(points: i64) -> Self {
        Self(points * MINOR_PER_POINT)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, SCALE)
    }
}

impl TryFrom<Decimal> for Points {
    type Error = LedgerError;

    /// Converts without rounding: values with more than two fractional
    /// digits are rejected.
    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        let scaled = value
            .checked_mul(Decimal::from(MINOR_PER_POINT))
            .ok_or_else(|| LedgerError::ValidationError(format!("{value} is out of range")))?;
        if scaled.fract() != Decimal::ZERO {
            return Err(LedgerError::ValidationError(format!(
                "{value} has more than {SCALE} fractional digits"
            )));
        }
        i64::try_from(scaled)
            .map(Self)
            .map_err(|_| LedgerError::ValidationError(format!("{value} is out of range")))
    }
}

impl From<Points> for Decimal {
    fn from(points: Points) -> Self {
        points.to_decimal()
    }
}

impl Add for Points {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Points {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Points {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Points {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl std::iter::Sum for Points {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Points {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal().normalize())
    }
}

impl Serialize for Points {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        <Decimal as Serialize>::serialize(&self.to_decimal(), serializer)
    }
}

impl<'de> Deserialize<'de> for Points {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = <Decimal as Deserialize>::deserialize(deserializer)?;
        Points::try_from(value).map_err(serde::de::Error::custom)
    }
}
