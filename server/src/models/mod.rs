use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod event;
pub mod organizer;
pub mod ticket;
pub mod transaction;
pub mod user;

pub use event::{Event, EventChanges, EventFilter, NewEvent};
pub use organizer::{NewOrganizer, Organizer, OrganizerChanges};
pub use ticket::{NewTicketTier, Ticket, TicketStatus, TicketTier, TicketTierChanges};
pub use transaction::{Transaction, TransactionStatus, DEFAULT_CURRENCY};
pub use user::{NewUser, User, UserChanges};

/// A status column held text that is not one of the known variants.
#[derive(Debug, Clone, Error)]
#[error("unknown {kind} status '{value}'")]
pub struct ParseStatusError {
    kind: &'static str,
    value: String,
}

impl ParseStatusError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Nullable column in a partial update: a missing key leaves the column
/// alone, an explicit `null` clears it.
pub(crate) fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Input for issuing `quantity` tickets out of a tier to one buyer.
#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub user_id: Uuid,
    pub ticket_tier_id: Uuid,
    pub quantity: i32,
    pub currency: String,
    pub qr_code: Option<String>,
}

/// A ticket together with the payment record created for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub ticket: Ticket,
    pub transaction: Transaction,
}

/// Seats bought together: one ticket and one transaction per seat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseBatch {
    pub purchases: Vec<Purchase>,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketDetails {
    pub ticket: Ticket,
    pub transaction: Option<Transaction>,
}
