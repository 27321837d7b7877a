use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::event::schedule_is_valid;
use crate::models::{
    Event, EventChanges, EventFilter, NewEvent, NewOrganizer, NewPurchase, NewTicketTier,
    NewUser, Organizer, OrganizerChanges, Purchase, PurchaseBatch, Ticket, TicketDetails,
    TicketTier, TicketTierChanges, Transaction, User, UserChanges, DEFAULT_CURRENCY,
};
use crate::store::{validate_inventory, validate_quantity, Store, StoreError, StoreResult};

const MAX_TEXT_LEN: usize = 255;

fn validation(message: impl Into<String>) -> StoreError {
    StoreError::Validation(message.into())
}

fn require_text(field: &str, value: &str) -> StoreResult<()> {
    if value.trim().is_empty() {
        return Err(validation(format!("{field} cannot be empty")));
    }
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(validation(format!(
            "{field} cannot exceed {MAX_TEXT_LEN} characters"
        )));
    }
    Ok(())
}

/// Loose shape check only: one `@`, something on each side, a dot in the domain.
fn require_email(field: &str, value: &str) -> StoreResult<()> {
    require_text(field, value)?;
    let valid = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(validation(format!("{field} is not a valid email address")));
    }
    Ok(())
}

fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

fn require_price(price: Decimal) -> StoreResult<()> {
    if price < Decimal::ZERO {
        return Err(validation("price cannot be negative"));
    }
    Ok(())
}

/// Resolves the purchase currency: `USDC` unless a 3-10 character
/// uppercase alphanumeric code is supplied.
pub fn resolve_currency(currency: Option<&str>) -> StoreResult<String> {
    let Some(currency) = currency else {
        return Ok(DEFAULT_CURRENCY.to_string());
    };
    let currency = currency.trim();
    let valid = (3..=10).contains(&currency.len())
        && currency
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    if !valid {
        return Err(validation(format!("unsupported currency code '{currency}'")));
    }
    Ok(currency.to_string())
}

/// Business rules on top of a [`Store`]: input validation, inventory bounds
/// and the purchase/settlement lifecycle. Checks that depend on a row's
/// current state (schedule and inventory on update) run inside the store.
#[derive(Clone)]
pub struct TicketingService {
    store: Arc<dyn Store>,
}

impl TicketingService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn backend_tag(&self) -> &'static str {
        self.store.backend_tag()
    }

    pub async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        require_text("name", &new.name)?;
        require_email("email", new.email.trim())?;
        let user = self
            .store
            .create_user(NewUser {
                name: new.name.trim().to_string(),
                email: normalize_email(&new.email),
            })
            .await?;
        info!(user_id = %user.id, "user created");
        Ok(user)
    }

    pub async fn get_user(&self, id: Uuid) -> StoreResult<User> {
        self.store.get_user(id).await
    }

    pub async fn list_users(&self) -> StoreResult<Vec<User>> {
        self.store.list_users().await
    }

    pub async fn update_user(&self, id: Uuid, mut changes: UserChanges) -> StoreResult<User> {
        if let Some(name) = &changes.name {
            require_text("name", name)?;
        }
        if let Some(email) = changes.email.take() {
            require_email("email", email.trim())?;
            changes.email = Some(normalize_email(&email));
        }
        self.store.update_user(id, changes).await
    }

    pub async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        self.store.delete_user(id).await?;
        info!(user_id = %id, "user deleted");
        Ok(())
    }

    pub async fn list_user_tickets(&self, user_id: Uuid) -> StoreResult<Vec<Ticket>> {
        self.store.get_user(user_id).await?;
        self.store.list_tickets_for_user(user_id).await
    }

    pub async fn create_organizer(&self, new: NewOrganizer) -> StoreResult<Organizer> {
        require_text("name", &new.name)?;
        require_email("contact_email", new.contact_email.trim())?;
        let organizer = self
            .store
            .create_organizer(NewOrganizer {
                name: new.name.trim().to_string(),
                description: new.description,
                contact_email: normalize_email(&new.contact_email),
            })
            .await?;
        info!(organizer_id = %organizer.id, "organizer created");
        Ok(organizer)
    }

    pub async fn get_organizer(&self, id: Uuid) -> StoreResult<Organizer> {
        self.store.get_organizer(id).await
    }

    pub async fn list_organizers(&self) -> StoreResult<Vec<Organizer>> {
        self.store.list_organizers().await
    }

    pub async fn update_organizer(
        &self,
        id: Uuid,
        mut changes: OrganizerChanges,
    ) -> StoreResult<Organizer> {
        if let Some(name) = &changes.name {
            require_text("name", name)?;
        }
        if let Some(contact_email) = changes.contact_email.take() {
            require_email("contact_email", contact_email.trim())?;
            changes.contact_email = Some(normalize_email(&contact_email));
        }
        self.store.update_organizer(id, changes).await
    }

    pub async fn delete_organizer(&self, id: Uuid) -> StoreResult<()> {
        self.store.delete_organizer(id).await?;
        info!(organizer_id = %id, "organizer deleted with its events");
        Ok(())
    }

    pub async fn create_event(&self, new: NewEvent) -> StoreResult<Event> {
        require_text("title", &new.title)?;
        require_text("location", &new.location)?;
        if !schedule_is_valid(new.start_time, new.end_time) {
            return Err(validation("end_time cannot be before start_time"));
        }
        let event = self.store.create_event(new).await?;
        info!(event_id = %event.id, organizer_id = %event.organizer_id, "event created");
        Ok(event)
    }

    pub async fn get_event(&self, id: Uuid) -> StoreResult<Event> {
        self.store.get_event(id).await
    }

    pub async fn list_events(&self, filter: EventFilter) -> StoreResult<Vec<Event>> {
        self.store.list_events(filter).await
    }

    pub async fn update_event(&self, id: Uuid, changes: EventChanges) -> StoreResult<Event> {
        if let Some(title) = &changes.title {
            require_text("title", title)?;
        }
        if let Some(location) = &changes.location {
            require_text("location", location)?;
        }
        self.store.update_event(id, changes).await
    }

    pub async fn delete_event(&self, id: Uuid) -> StoreResult<()> {
        self.store.delete_event(id).await?;
        info!(event_id = %id, "event deleted with its tiers");
        Ok(())
    }

    /// Unlike the raw store, refuses tiers whose inventory is out of bounds.
    pub async fn create_tier(&self, new: NewTicketTier) -> StoreResult<TicketTier> {
        require_text("name", &new.name)?;
        require_price(new.price)?;
        let available_quantity = new.available_quantity.unwrap_or(new.total_quantity);
        validate_inventory(new.total_quantity, available_quantity)?;
        let tier = self
            .store
            .create_tier(NewTicketTier {
                available_quantity: Some(available_quantity),
                ..new
            })
            .await?;
        info!(
            tier_id = %tier.id,
            event_id = %tier.event_id,
            total_quantity = tier.total_quantity,
            "ticket tier created"
        );
        Ok(tier)
    }

    pub async fn get_tier(&self, id: Uuid) -> StoreResult<TicketTier> {
        self.store.get_tier(id).await
    }

    pub async fn list_tiers(&self, event_id: Uuid) -> StoreResult<Vec<TicketTier>> {
        self.store.get_event(event_id).await?;
        self.store.list_tiers(event_id).await
    }

    pub async fn update_tier(
        &self,
        id: Uuid,
        changes: TicketTierChanges,
    ) -> StoreResult<TicketTier> {
        if let Some(name) = &changes.name {
            require_text("name", name)?;
        }
        if let Some(price) = changes.price {
            require_price(price)?;
        }
        self.store.update_tier(id, changes).await
    }

    pub async fn delete_tier(&self, id: Uuid) -> StoreResult<()> {
        self.store.delete_tier(id).await
    }

    pub async fn purchase_ticket(
        &self,
        tier_id: Uuid,
        user_id: Uuid,
        currency: Option<&str>,
        qr_code: Option<String>,
    ) -> StoreResult<Purchase> {
        let currency = resolve_currency(currency)?;
        let result = self
            .store
            .purchase_ticket(NewPurchase {
                user_id,
                ticket_tier_id: tier_id,
                quantity: 1,
                currency,
                qr_code,
            })
            .await;

        match &result {
            Ok(purchase) => info!(
                ticket_id = %purchase.ticket.id,
                transaction_id = %purchase.transaction.id,
                tier_id = %tier_id,
                amount = %purchase.transaction.amount,
                "ticket issued"
            ),
            Err(StoreError::SoldOut(_)) => warn!(tier_id = %tier_id, "purchase rejected: sold out"),
            Err(_) => {}
        }
        result
    }

    /// Several seats of one tier for one buyer, all issued or none.
    pub async fn purchase_tickets(
        &self,
        tier_id: Uuid,
        user_id: Uuid,
        quantity: i32,
        currency: Option<&str>,
    ) -> StoreResult<PurchaseBatch> {
        validate_quantity(quantity)?;
        let currency = resolve_currency(currency)?;
        let result = self
            .store
            .purchase_tickets(NewPurchase {
                user_id,
                ticket_tier_id: tier_id,
                quantity,
                currency,
                qr_code: None,
            })
            .await;

        let purchases = match result {
            Ok(purchases) => purchases,
            Err(err) => {
                if matches!(err, StoreError::SoldOut(_) | StoreError::NotEnoughSeats { .. }) {
                    warn!(tier_id = %tier_id, quantity, error = %err, "batch purchase rejected");
                }
                return Err(err);
            }
        };
        let total_amount: Decimal = purchases
            .iter()
            .map(|purchase| purchase.transaction.amount)
            .sum();
        info!(
            tier_id = %tier_id,
            user_id = %user_id,
            quantity,
            total_amount = %total_amount,
            "tickets issued"
        );
        Ok(PurchaseBatch {
            purchases,
            total_amount,
        })
    }

    pub async fn get_ticket(&self, id: Uuid) -> StoreResult<TicketDetails> {
        let ticket = self.store.get_ticket(id).await?;
        let transaction = self.store.transaction_for_ticket(id).await?;
        Ok(TicketDetails {
            ticket,
            transaction,
        })
    }

    pub async fn cancel_ticket(&self, id: Uuid) -> StoreResult<Ticket> {
        let ticket = self.store.cancel_ticket(id).await?;
        info!(ticket_id = %id, tier_id = %ticket.ticket_tier_id, "ticket cancelled, seat released");
        Ok(ticket)
    }

    pub async fn check_in_ticket(&self, id: Uuid) -> StoreResult<Ticket> {
        let ticket = self.store.check_in_ticket(id).await?;
        info!(ticket_id = %id, "ticket checked in");
        Ok(ticket)
    }

    pub async fn transfer_ticket(&self, id: Uuid, to_user_id: Uuid) -> StoreResult<Ticket> {
        let ticket = self.store.transfer_ticket(id, to_user_id).await?;
        info!(ticket_id = %id, to_user_id = %to_user_id, "ticket transferred");
        Ok(ticket)
    }

    pub async fn get_transaction(&self, id: Uuid) -> StoreResult<Transaction> {
        self.store.get_transaction(id).await
    }

    pub async fn confirm_transaction(
        &self,
        id: Uuid,
        transaction_hash: Option<String>,
    ) -> StoreResult<Transaction> {
        let transaction_hash = transaction_hash
            .map(|hash| hash.trim().to_string())
            .filter(|hash| !hash.is_empty());
        if let Some(hash) = &transaction_hash {
            require_text("transaction_hash", hash)?;
        }
        let transaction = self.store.complete_transaction(id, transaction_hash).await?;
        info!(transaction_id = %id, "transaction completed");
        Ok(transaction)
    }

    pub async fn fail_transaction(&self, id: Uuid) -> StoreResult<Purchase> {
        let purchase = self.store.fail_transaction(id).await?;
        warn!(
            transaction_id = %id,
            ticket_id = %purchase.ticket.id,
            "transaction failed, ticket cancelled"
        );
        Ok(purchase)
    }
}
