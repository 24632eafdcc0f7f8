//! Luhn check-digit validation for order numbers.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChecksumError {
    /// Input is empty or contains something other than ASCII digits.
    #[error("order number must be a non-empty string of digits")]
    Format,
    #[error("order number fails the check-digit test")]
    Checksum,
}

/// Validates `number` with the Luhn algorithm.
///
/// No trimming is performed: surrounding whitespace is a format error.
pub fn validate(number: &str) -> Result<(), ChecksumError> {
    let digits = number
        .bytes()
        .map(|b| match b {
            b'0'..=b'9' => Ok(u32::from(b - b'0')),
            _ => Err(ChecksumError::Format),
        })
        .collect::<Result<Vec<u32>, _>>()?;

    let Some((check, payload)) = digits.split_last() else {
        return Err(ChecksumError::Format);
    };

    let payload_sum: u32 = payload
        .iter()
        .rev()
        .enumerate()
        .map(|(offset, &digit)| {
            if offset % 2 == 0 {
                let doubled = digit * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                digit
            }
        })
        .sum();

    if (payload_sum + check) % 10 == 0 {
        Ok(())
    } else {
        Err(ChecksumError::Checksum)
    }
}

/// An order number that has passed [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNumber(String);

impl OrderNumber {
    pub fn parse(raw: impl Into<String>) -> Result<Self, ChecksumError> {
        let raw = raw.into();
        validate(&raw)?;
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for OrderNumber {
    type Error = ChecksumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<&str> for OrderNumber {
    type Error = ChecksumError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<OrderNumber> for String {
    fn from(number: OrderNumber) -> Self {
        number.0
    }
}

impl AsRef<str> for OrderNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
