use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{nullable, ParseStatusError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TicketTier {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub total_quantity: i32,
    pub available_quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TicketTier {
    /// Inventory bounds: `0 <= available_quantity <= total_quantity`.
    pub fn has_consistent_inventory(&self) -> bool {
        inventory_is_consistent(self.total_quantity, self.available_quantity)
    }
}

pub fn inventory_is_consistent(total_quantity: i32, available_quantity: i32) -> bool {
    total_quantity >= 0 && available_quantity >= 0 && available_quantity <= total_quantity
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTicketTier {
    pub event_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub total_quantity: i32,
    /// Defaults to `total_quantity` when omitted.
    pub available_quantity: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketTierChanges {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub price: Option<Decimal>,
    pub total_quantity: Option<i32>,
    pub available_quantity: Option<i32>,
}

impl TicketTierChanges {
    pub fn apply_to(self, tier: &mut TicketTier) {
        if let Some(name) = self.name {
            tier.name = name;
        }
        if let Some(description) = self.description {
            tier.description = description;
        }
        if let Some(price) = self.price {
            tier.price = price;
        }
        if let Some(total_quantity) = self.total_quantity {
            tier.total_quantity = total_quantity;
        }
        if let Some(available_quantity) = self.available_quantity {
            tier.available_quantity = available_quantity;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Active,
    Used,
    Cancelled,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Active => "active",
            TicketStatus::Used => "used",
            TicketStatus::Cancelled => "cancelled",
        }
    }

    /// Only an active ticket moves, and only once.
    pub fn can_transition_to(self, next: TicketStatus) -> bool {
        matches!(
            (self, next),
            (TicketStatus::Active, TicketStatus::Used)
                | (TicketStatus::Active, TicketStatus::Cancelled)
        )
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(TicketStatus::Active),
            "used" => Ok(TicketStatus::Used),
            "cancelled" => Ok(TicketStatus::Cancelled),
            other => Err(ParseStatusError::new("ticket", other)),
        }
    }
}

impl TryFrom<String> for TicketStatus {
    type Error = ParseStatusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub user_id: Uuid,
    pub ticket_tier_id: Uuid,
    #[sqlx(try_from = "String")]
    pub status: TicketStatus,
    pub qr_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
