//! In-process [`Store`] backend.
//!
//! Mirrors the Postgres schema's rules: unique user email, foreign keys on
//! insert, cascading deletes, and `updated_at` maintenance. The database does
//! the last one with `BEFORE UPDATE` triggers; here every write path touches
//! the row explicitly. All operations run under one lock, which is what makes
//! the inventory primitives atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    require_paid, seat_shortage, validate_inventory, validate_quantity, validate_schedule,
    validate_transfer, Store, StoreError, StoreResult,
};
use crate::models::{
    Event, EventChanges, EventFilter, NewEvent, NewOrganizer, NewPurchase, NewTicketTier,
    NewUser, Organizer, OrganizerChanges, Purchase, Ticket, TicketStatus, TicketTier,
    TicketTierChanges, Transaction, TransactionStatus, User, UserChanges,
};

trait Row {
    const ENTITY: &'static str;
    fn id(&self) -> Uuid;
    fn updated_at_mut(&mut self) -> &mut DateTime<Utc>;

    /// Never moves `updated_at` backwards, even if the wall clock does.
    fn touch(&mut self) {
        let updated_at = self.updated_at_mut();
        *updated_at = Utc::now().max(*updated_at);
    }
}

macro_rules! impl_row {
    ($ty:ty, $entity:literal) => {
        impl Row for $ty {
            const ENTITY: &'static str = $entity;

            fn id(&self) -> Uuid {
                self.id
            }

            fn updated_at_mut(&mut self) -> &mut DateTime<Utc> {
                &mut self.updated_at
            }
        }
    };
}

impl_row!(User, "user");
impl_row!(Organizer, "organizer");
impl_row!(Event, "event");
impl_row!(TicketTier, "ticket tier");
impl_row!(Ticket, "ticket");
impl_row!(Transaction, "transaction");

fn find<T: Row>(rows: &[T], id: Uuid) -> StoreResult<&T> {
    rows.iter()
        .find(|row| row.id() == id)
        .ok_or_else(|| StoreError::not_found(T::ENTITY, id))
}

fn find_mut<T: Row>(rows: &mut [T], id: Uuid) -> StoreResult<&mut T> {
    rows.iter_mut()
        .find(|row| row.id() == id)
        .ok_or_else(|| StoreError::not_found(T::ENTITY, id))
}

fn require_parent<T: Row>(rows: &[T], id: Uuid, column: &str) -> StoreResult<()> {
    if rows.iter().any(|row| row.id() == id) {
        Ok(())
    } else {
        Err(StoreError::ForeignKeyViolation(format!(
            "{column} references missing {} '{id}'",
            T::ENTITY
        )))
    }
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    organizers: Vec<Organizer>,
    events: Vec<Event>,
    tiers: Vec<TicketTier>,
    tickets: Vec<Ticket>,
    transactions: Vec<Transaction>,
}

impl Tables {
    fn ensure_email_free(&self, email: &str, except: Option<Uuid>) -> StoreResult<()> {
        let taken = self
            .users
            .iter()
            .any(|user| user.email == email && Some(user.id) != except);
        if taken {
            return Err(StoreError::UniqueViolation("users.email".to_string()));
        }
        Ok(())
    }

    fn delete_organizers(&mut self, ids: &[Uuid]) {
        let events: Vec<Uuid> = self
            .events
            .iter()
            .filter(|event| ids.contains(&event.organizer_id))
            .map(|event| event.id)
            .collect();
        self.organizers.retain(|organizer| !ids.contains(&organizer.id));
        self.delete_events(&events);
    }

    fn delete_events(&mut self, ids: &[Uuid]) {
        let tiers: Vec<Uuid> = self
            .tiers
            .iter()
            .filter(|tier| ids.contains(&tier.event_id))
            .map(|tier| tier.id)
            .collect();
        self.events.retain(|event| !ids.contains(&event.id));
        self.delete_tiers(&tiers);
    }

    fn delete_tiers(&mut self, ids: &[Uuid]) {
        let tickets: Vec<Uuid> = self
            .tickets
            .iter()
            .filter(|ticket| ids.contains(&ticket.ticket_tier_id))
            .map(|ticket| ticket.id)
            .collect();
        self.tiers.retain(|tier| !ids.contains(&tier.id));
        self.delete_tickets(&tickets);
    }

    fn delete_users(&mut self, ids: &[Uuid]) {
        let tickets: Vec<Uuid> = self
            .tickets
            .iter()
            .filter(|ticket| ids.contains(&ticket.user_id))
            .map(|ticket| ticket.id)
            .collect();
        self.users.retain(|user| !ids.contains(&user.id));
        self.delete_tickets(&tickets);
    }

    fn delete_tickets(&mut self, ids: &[Uuid]) {
        self.tickets.retain(|ticket| !ids.contains(&ticket.id));
        self.transactions
            .retain(|transaction| !ids.contains(&transaction.ticket_id));
    }

    /// Never lifts `available_quantity` above `total_quantity`.
    fn release_seat(&mut self, tier_id: Uuid) {
        if let Some(tier) = self.tiers.iter_mut().find(|tier| tier.id == tier_id) {
            if tier.available_quantity < tier.total_quantity {
                tier.available_quantity += 1;
                tier.touch();
            }
        }
    }

    fn is_paid(&self, ticket_id: Uuid) -> bool {
        self.transactions.iter().any(|transaction| {
            transaction.ticket_id == ticket_id
                && transaction.status == TransactionStatus::Completed
        })
    }

    fn transaction_for_ticket_mut(&mut self, ticket_id: Uuid) -> Option<&mut Transaction> {
        self.transactions
            .iter_mut()
            .find(|transaction| transaction.ticket_id == ticket_id)
    }

    fn transition_ticket(&mut self, ticket_id: Uuid, next: TicketStatus) -> StoreResult<Ticket> {
        let ticket = find_mut(&mut self.tickets, ticket_id)?;
        if !ticket.status.can_transition_to(next) {
            return Err(StoreError::InvalidTransition(format!(
                "ticket '{ticket_id}' is {} and cannot become {next}",
                ticket.status
            )));
        }
        ticket.status = next;
        ticket.touch();
        Ok(ticket.clone())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.lock().await;
        tables.ensure_email_free(&new.email, None)?;
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<User> {
        let tables = self.tables.lock().await;
        find(&tables.users, id).cloned()
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.tables.lock().await.users.clone())
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<User> {
        let mut tables = self.tables.lock().await;
        if let Some(email) = &changes.email {
            tables.ensure_email_free(email, Some(id))?;
        }
        let user = find_mut(&mut tables.users, id)?;
        changes.apply_to(user);
        user.touch();
        Ok(user.clone())
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        find(&tables.users, id)?;
        tables.delete_users(&[id]);
        Ok(())
    }

    async fn create_organizer(&self, new: NewOrganizer) -> StoreResult<Organizer> {
        let now = Utc::now();
        let organizer = Organizer {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            contact_email: new.contact_email,
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().await.organizers.push(organizer.clone());
        Ok(organizer)
    }

    async fn get_organizer(&self, id: Uuid) -> StoreResult<Organizer> {
        let tables = self.tables.lock().await;
        find(&tables.organizers, id).cloned()
    }

    async fn list_organizers(&self) -> StoreResult<Vec<Organizer>> {
        Ok(self.tables.lock().await.organizers.clone())
    }

    async fn update_organizer(
        &self,
        id: Uuid,
        changes: OrganizerChanges,
    ) -> StoreResult<Organizer> {
        let mut tables = self.tables.lock().await;
        let organizer = find_mut(&mut tables.organizers, id)?;
        changes.apply_to(organizer);
        organizer.touch();
        Ok(organizer.clone())
    }

    async fn delete_organizer(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        find(&tables.organizers, id)?;
        tables.delete_organizers(&[id]);
        Ok(())
    }

    async fn create_event(&self, new: NewEvent) -> StoreResult<Event> {
        let mut tables = self.tables.lock().await;
        require_parent(&tables.organizers, new.organizer_id, "events.organizer_id")?;
        let now = Utc::now();
        let event = Event {
            id: Uuid::new_v4(),
            organizer_id: new.organizer_id,
            title: new.title,
            description: new.description,
            location: new.location,
            start_time: new.start_time,
            end_time: new.end_time,
            created_at: now,
            updated_at: now,
        };
        tables.events.push(event.clone());
        Ok(event)
    }

    async fn get_event(&self, id: Uuid) -> StoreResult<Event> {
        let tables = self.tables.lock().await;
        find(&tables.events, id).cloned()
    }

    async fn list_events(&self, filter: EventFilter) -> StoreResult<Vec<Event>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .events
            .iter()
            .filter(|event| {
                filter
                    .organizer_id
                    .map_or(true, |organizer_id| event.organizer_id == organizer_id)
            })
            .cloned()
            .collect())
    }

    async fn update_event(&self, id: Uuid, changes: EventChanges) -> StoreResult<Event> {
        let mut tables = self.tables.lock().await;
        let event = find_mut(&mut tables.events, id)?;
        let mut updated = event.clone();
        changes.apply_to(&mut updated);
        validate_schedule(&updated)?;
        updated.touch();
        *event = updated.clone();
        Ok(updated)
    }

    async fn delete_event(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        find(&tables.events, id)?;
        tables.delete_events(&[id]);
        Ok(())
    }

    async fn create_tier(&self, new: NewTicketTier) -> StoreResult<TicketTier> {
        let mut tables = self.tables.lock().await;
        require_parent(&tables.events, new.event_id, "ticket_tiers.event_id")?;
        let now = Utc::now();
        let tier = TicketTier {
            id: Uuid::new_v4(),
            event_id: new.event_id,
            name: new.name,
            description: new.description,
            price: new.price,
            total_quantity: new.total_quantity,
            available_quantity: new.available_quantity.unwrap_or(new.total_quantity),
            created_at: now,
            updated_at: now,
        };
        tables.tiers.push(tier.clone());
        Ok(tier)
    }

    async fn get_tier(&self, id: Uuid) -> StoreResult<TicketTier> {
        let tables = self.tables.lock().await;
        find(&tables.tiers, id).cloned()
    }

    async fn list_tiers(&self, event_id: Uuid) -> StoreResult<Vec<TicketTier>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .tiers
            .iter()
            .filter(|tier| tier.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn update_tier(&self, id: Uuid, changes: TicketTierChanges) -> StoreResult<TicketTier> {
        let mut tables = self.tables.lock().await;
        let tier = find_mut(&mut tables.tiers, id)?;
        let mut updated = tier.clone();
        changes.apply_to(&mut updated);
        validate_inventory(updated.total_quantity, updated.available_quantity)?;
        updated.touch();
        *tier = updated.clone();
        Ok(updated)
    }

    async fn delete_tier(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        find(&tables.tiers, id)?;
        tables.delete_tiers(&[id]);
        Ok(())
    }

    async fn get_ticket(&self, id: Uuid) -> StoreResult<Ticket> {
        let tables = self.tables.lock().await;
        find(&tables.tickets, id).cloned()
    }

    async fn list_tickets_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Ticket>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .tickets
            .iter()
            .filter(|ticket| ticket.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_tickets_for_tier(&self, tier_id: Uuid) -> StoreResult<Vec<Ticket>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .tickets
            .iter()
            .filter(|ticket| ticket.ticket_tier_id == tier_id)
            .cloned()
            .collect())
    }

    async fn get_transaction(&self, id: Uuid) -> StoreResult<Transaction> {
        let tables = self.tables.lock().await;
        find(&tables.transactions, id).cloned()
    }

    async fn transaction_for_ticket(&self, ticket_id: Uuid) -> StoreResult<Option<Transaction>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .transactions
            .iter()
            .find(|transaction| transaction.ticket_id == ticket_id)
            .cloned())
    }

    async fn purchase_tickets(&self, purchase: NewPurchase) -> StoreResult<Vec<Purchase>> {
        validate_quantity(purchase.quantity)?;
        let mut tables = self.tables.lock().await;
        let tier = find(&tables.tiers, purchase.ticket_tier_id)?;
        if tier.available_quantity < purchase.quantity {
            return Err(seat_shortage(tier.id, tier.available_quantity, purchase.quantity));
        }
        let price = tier.price;
        require_parent(&tables.users, purchase.user_id, "tickets.user_id")?;

        let tier = find_mut(&mut tables.tiers, purchase.ticket_tier_id)?;
        tier.available_quantity -= purchase.quantity;
        tier.touch();

        let now = Utc::now();
        let mut purchases = Vec::new();
        for _ in 0..purchase.quantity {
            let ticket = Ticket {
                id: Uuid::new_v4(),
                user_id: purchase.user_id,
                ticket_tier_id: purchase.ticket_tier_id,
                status: TicketStatus::Active,
                qr_code: purchase.qr_code.clone(),
                created_at: now,
                updated_at: now,
            };
            let transaction = Transaction {
                id: Uuid::new_v4(),
                ticket_id: ticket.id,
                amount: price,
                currency: purchase.currency.clone(),
                status: TransactionStatus::Pending,
                stellar_transaction_hash: None,
                created_at: now,
                updated_at: now,
            };
            tables.tickets.push(ticket.clone());
            tables.transactions.push(transaction.clone());
            purchases.push(Purchase {
                ticket,
                transaction,
            });
        }
        Ok(purchases)
    }

    async fn cancel_ticket(&self, ticket_id: Uuid) -> StoreResult<Ticket> {
        let mut tables = self.tables.lock().await;
        let ticket = tables.transition_ticket(ticket_id, TicketStatus::Cancelled)?;
        if let Some(transaction) = tables.transaction_for_ticket_mut(ticket_id) {
            if transaction.status == TransactionStatus::Pending {
                transaction.status = TransactionStatus::Failed;
                transaction.touch();
            }
        }
        tables.release_seat(ticket.ticket_tier_id);
        Ok(ticket)
    }

    async fn check_in_ticket(&self, ticket_id: Uuid) -> StoreResult<Ticket> {
        let mut tables = self.tables.lock().await;
        find(&tables.tickets, ticket_id)?;
        require_paid(ticket_id, tables.is_paid(ticket_id))?;
        tables.transition_ticket(ticket_id, TicketStatus::Used)
    }

    async fn transfer_ticket(&self, ticket_id: Uuid, to_user_id: Uuid) -> StoreResult<Ticket> {
        let mut tables = self.tables.lock().await;
        validate_transfer(find(&tables.tickets, ticket_id)?, to_user_id)?;
        require_paid(ticket_id, tables.is_paid(ticket_id))?;
        require_parent(&tables.users, to_user_id, "tickets.user_id")?;

        let ticket = find_mut(&mut tables.tickets, ticket_id)?;
        ticket.user_id = to_user_id;
        ticket.touch();
        Ok(ticket.clone())
    }

    async fn complete_transaction(
        &self,
        transaction_id: Uuid,
        transaction_hash: Option<String>,
    ) -> StoreResult<Transaction> {
        let mut tables = self.tables.lock().await;
        let transaction = find_mut(&mut tables.transactions, transaction_id)?;
        if !transaction
            .status
            .can_transition_to(TransactionStatus::Completed)
        {
            return Err(StoreError::InvalidTransition(format!(
                "transaction '{transaction_id}' is already {}",
                transaction.status
            )));
        }
        transaction.status = TransactionStatus::Completed;
        if transaction_hash.is_some() {
            transaction.stellar_transaction_hash = transaction_hash;
        }
        transaction.touch();
        Ok(transaction.clone())
    }

    async fn fail_transaction(&self, transaction_id: Uuid) -> StoreResult<Purchase> {
        let mut tables = self.tables.lock().await;
        let transaction = find_mut(&mut tables.transactions, transaction_id)?;
        if !transaction.status.can_transition_to(TransactionStatus::Failed) {
            return Err(StoreError::InvalidTransition(format!(
                "transaction '{transaction_id}' is already {}",
                transaction.status
            )));
        }
        transaction.status = TransactionStatus::Failed;
        transaction.touch();
        let transaction = transaction.clone();

        let ticket = find_mut(&mut tables.tickets, transaction.ticket_id)?;
        if ticket.status == TicketStatus::Active {
            ticket.status = TicketStatus::Cancelled;
            ticket.touch();
            let (ticket, tier_id) = (ticket.clone(), ticket.ticket_tier_id);
            tables.release_seat(tier_id);
            return Ok(Purchase {
                ticket,
                transaction,
            });
        }

        Ok(Purchase {
            ticket: ticket.clone(),
            transaction,
        })
    }
}
