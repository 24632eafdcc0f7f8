use super::account::UserId;
use super::checksum::OrderNumber;
use super::money::Points;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    New,
    Processing,
    Invalid,
    Processed,
}

impl OrderStatus {
    /// NEW and PROCESSING are still awaiting a verdict from the accrual service.
    pub fn is_temporary(self) -> bool {
        matches!(self, OrderStatus::New | OrderStatus::Processing)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_temporary()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Invalid => "INVALID",
            OrderStatus::Processed => "PROCESSED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(OrderStatus::New),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "INVALID" => Ok(OrderStatus::Invalid),
            "PROCESSED" => Ok(OrderStatus::Processed),
            other => Err(format!("unknown order status {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub number: OrderNumber,
    pub status: OrderStatus,
    /// Credited points; zero until the order is PROCESSED.
    pub amount: Points,
    pub uploaded_at: DateTime<Utc>,
    pub owner: UserId,
}

impl Order {
    pub fn new(number: OrderNumber, owner: UserId) -> Self {
        Self {
            number,
            status: OrderStatus::New,
            amount: Points::ZERO,
            uploaded_at: Utc::now(),
            owner,
        }
    }

    /// Points this transition credits to the owner, if any.
    pub fn credit_for(&self, update: &StatusUpdate) -> Points {
        if self.status != OrderStatus::Processed && update.status == OrderStatus::Processed {
            update.amount
        } else {
            Points::ZERO
        }
    }

    /// Applies a reconciliation result. Terminal orders never change.
    pub fn apply(&mut self, update: &StatusUpdate) -> Result<(), String> {
        if self.status.is_terminal() {
            return Err(format!("order {} is already {}", self.number, self.status));
        }
        if update.amount < Points::ZERO {
            return Err(format!("negative accrual {} for order {}", update.amount, self.number));
        }
        self.status = update.status;
        self.amount = if update.status == OrderStatus::Processed {
            update.amount
        } else {
            Points::ZERO
        };
        Ok(())
    }
}

/// One entry of a reconciliation batch: the verdict for a single order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub number: OrderNumber,
    pub status: OrderStatus,
    pub amount: Points,
}

/// Outcome of registering an order number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Created,
    /// The caller had already registered this number; nothing changed.
    AlreadyRegistered,
}
