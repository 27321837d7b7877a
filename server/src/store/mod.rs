//! Persistence for the ticketing entities.
//!
//! [`Store`] is the repository seam: every backend offers the same CRUD
//! surface plus the inventory primitives (purchase, cancel, check-in,
//! transfer, settlement) that must execute atomically with respect to each
//! other.
//!
//! Backends that lock rows take the ticket before its transaction.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::event::schedule_is_valid;
use crate::models::ticket::inventory_is_consistent;
use crate::models::{
    Event, EventChanges, EventFilter, NewEvent, NewOrganizer, NewPurchase, NewTicketTier,
    NewUser, Organizer, OrganizerChanges, Purchase, Ticket, TicketStatus, TicketTier,
    TicketTierChanges, Transaction, User, UserChanges,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("foreign key violated: {0}")]
    ForeignKeyViolation(String),

    #[error("required column missing: {0}")]
    NotNullViolation(String),

    #[error("ticket tier '{0}' is sold out")]
    SoldOut(Uuid),

    #[error("ticket tier '{tier_id}' has {available} seats left, {requested} requested")]
    NotEnoughSeats {
        tier_id: Uuid,
        requested: i32,
        available: i32,
    },

    #[error("invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        StoreError::NotFound { entity, id }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

pub(crate) fn validate_inventory(total_quantity: i32, available_quantity: i32) -> StoreResult<()> {
    if !inventory_is_consistent(total_quantity, available_quantity) {
        return Err(StoreError::Validation(format!(
            "available_quantity ({available_quantity}) must be between 0 and \
             total_quantity ({total_quantity})"
        )));
    }
    Ok(())
}

pub(crate) fn validate_schedule(event: &Event) -> StoreResult<()> {
    if !schedule_is_valid(event.start_time, event.end_time) {
        return Err(StoreError::Validation("end_time cannot be before start_time".to_string()));
    }
    Ok(())
}

pub(crate) fn validate_quantity(quantity: i32) -> StoreResult<()> {
    if quantity < 1 {
        return Err(StoreError::Validation(format!(
            "quantity must be at least 1, got {quantity}"
        )));
    }
    Ok(())
}

/// The error for a tier that cannot cover `requested` seats.
pub(crate) fn seat_shortage(tier_id: Uuid, available: i32, requested: i32) -> StoreError {
    if available <= 0 {
        StoreError::SoldOut(tier_id)
    } else {
        StoreError::NotEnoughSeats {
            tier_id,
            requested,
            available,
        }
    }
}

pub(crate) fn require_paid(ticket_id: Uuid, paid: bool) -> StoreResult<()> {
    if !paid {
        return Err(StoreError::InvalidTransition(format!(
            "ticket '{ticket_id}' has no completed payment"
        )));
    }
    Ok(())
}

/// Only an active ticket changes hands, and never to its current holder.
pub(crate) fn validate_transfer(ticket: &Ticket, to_user_id: Uuid) -> StoreResult<()> {
    if ticket.user_id == to_user_id {
        return Err(StoreError::Validation(format!(
            "ticket '{}' is already held by user '{to_user_id}'",
            ticket.id
        )));
    }
    if ticket.status != TicketStatus::Active {
        return Err(StoreError::InvalidTransition(format!(
            "ticket '{}' is {} and cannot be transferred",
            ticket.id, ticket.status
        )));
    }
    Ok(())
}

#[async_trait]
pub trait Store: Send + Sync {
    fn backend_tag(&self) -> &'static str;

    async fn create_user(&self, new: NewUser) -> StoreResult<User>;
    async fn get_user(&self, id: Uuid) -> StoreResult<User>;
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<User>;
    async fn delete_user(&self, id: Uuid) -> StoreResult<()>;

    async fn create_organizer(&self, new: NewOrganizer) -> StoreResult<Organizer>;
    async fn get_organizer(&self, id: Uuid) -> StoreResult<Organizer>;
    async fn list_organizers(&self) -> StoreResult<Vec<Organizer>>;
    async fn update_organizer(&self, id: Uuid, changes: OrganizerChanges)
        -> StoreResult<Organizer>;
    /// Cascades to the organizer's events and everything below them.
    async fn delete_organizer(&self, id: Uuid) -> StoreResult<()>;

    async fn create_event(&self, new: NewEvent) -> StoreResult<Event>;
    async fn get_event(&self, id: Uuid) -> StoreResult<Event>;
    async fn list_events(&self, filter: EventFilter) -> StoreResult<Vec<Event>>;
    /// Rejects a result whose `end_time` precedes its `start_time`, checked
    /// against the row as it stands when the write happens.
    async fn update_event(&self, id: Uuid, changes: EventChanges) -> StoreResult<Event>;
    /// Cascades to tiers, tickets and transactions.
    async fn delete_event(&self, id: Uuid) -> StoreResult<()>;

    /// Inserts the row as given; inventory bounds are not checked here.
    async fn create_tier(&self, new: NewTicketTier) -> StoreResult<TicketTier>;
    async fn get_tier(&self, id: Uuid) -> StoreResult<TicketTier>;
    async fn list_tiers(&self, event_id: Uuid) -> StoreResult<Vec<TicketTier>>;
    /// Rejects a result outside `0 <= available_quantity <= total_quantity`,
    /// checked in the same critical section as the write, so a concurrent
    /// purchase or cancellation cannot slip in between.
    async fn update_tier(&self, id: Uuid, changes: TicketTierChanges) -> StoreResult<TicketTier>;
    async fn delete_tier(&self, id: Uuid) -> StoreResult<()>;

    async fn get_ticket(&self, id: Uuid) -> StoreResult<Ticket>;
    async fn list_tickets_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Ticket>>;
    async fn list_tickets_for_tier(&self, tier_id: Uuid) -> StoreResult<Vec<Ticket>>;

    async fn get_transaction(&self, id: Uuid) -> StoreResult<Transaction>;
    async fn transaction_for_ticket(&self, ticket_id: Uuid) -> StoreResult<Option<Transaction>>;

    /// Takes `purchase.quantity` seats from the tier if that many are left,
    /// then issues one active ticket and one pending transaction (priced at
    /// the tier's price) per seat. Either every write happens or none does.
    async fn purchase_tickets(&self, purchase: NewPurchase) -> StoreResult<Vec<Purchase>>;

    /// Single-seat [`Store::purchase_tickets`].
    async fn purchase_ticket(&self, purchase: NewPurchase) -> StoreResult<Purchase> {
        let tier_id = purchase.ticket_tier_id;
        let purchase = NewPurchase {
            quantity: 1,
            ..purchase
        };
        self.purchase_tickets(purchase)
            .await?
            .pop()
            .ok_or(StoreError::SoldOut(tier_id))
    }

    /// `active -> cancelled`, returning the seat to the tier.
    async fn cancel_ticket(&self, ticket_id: Uuid) -> StoreResult<Ticket>;

    /// `active -> used`; the ticket's transaction must be completed.
    async fn check_in_ticket(&self, ticket_id: Uuid) -> StoreResult<Ticket>;

    /// Hands an active, paid ticket to another user.
    async fn transfer_ticket(&self, ticket_id: Uuid, to_user_id: Uuid) -> StoreResult<Ticket>;

    /// `pending -> completed`, recording the settlement hash when given.
    async fn complete_transaction(
        &self,
        transaction_id: Uuid,
        transaction_hash: Option<String>,
    ) -> StoreResult<Transaction>;

    /// `pending -> failed`; an active ticket is cancelled and its seat released.
    async fn fail_transaction(&self, transaction_id: Uuid) -> StoreResult<Purchase>;
}
