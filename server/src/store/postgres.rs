//! Postgres [`Store`] backend.
//!
//! `updated_at` is maintained by the `update_updated_at_column` triggers from
//! the migrations. Inventory changes run inside a database transaction and
//! lock the rows they move (`FOR UPDATE`), or use a conditional `UPDATE` so
//! two buyers can never take the same last seat.
//!
//! Lock order is ticket, then transaction, in every operation that takes both.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{FromRow, PgConnection, Postgres};
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

const PG_UNIQUE_VIOLATION: &str = "23505";
const PG_FOREIGN_KEY_VIOLATION: &str = "23503";
const PG_NOT_NULL_VIOLATION: &str = "23502";

/// Translates constraint failures into their [`StoreError`] variants; anything
/// else stays an opaque database error.
fn map_db_error(error: sqlx::Error) -> StoreError {
    if let Some(db_error) = error.as_database_error() {
        let constraint = db_error
            .constraint()
            .map(str::to_string)
            .unwrap_or_else(|| db_error.message().to_string());
        match db_error.code().as_deref() {
            Some(PG_UNIQUE_VIOLATION) => return StoreError::UniqueViolation(constraint),
            Some(PG_FOREIGN_KEY_VIOLATION) => return StoreError::ForeignKeyViolation(constraint),
            Some(PG_NOT_NULL_VIOLATION) => return StoreError::NotNullViolation(constraint),
            _ => {}
        }
    }
    StoreError::Database(error)
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!().run(&self.pool).await
    }

    async fn delete_by_id(&self, table: &str, entity: &'static str, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query(&format!("DELETE FROM {table} WHERE id = $1"))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(entity, id));
        }
        Ok(())
    }
}

async fn lock_row<T>(
    conn: &mut PgConnection,
    table: &str,
    entity: &'static str,
    id: Uuid,
) -> StoreResult<T>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    sqlx::query_as::<_, T>(&format!("SELECT * FROM {table} WHERE id = $1 FOR UPDATE"))
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| StoreError::not_found(entity, id))
}

/// Locks a transaction together with its ticket, ticket first.
async fn lock_settlement(
    conn: &mut PgConnection,
    transaction_id: Uuid,
) -> StoreResult<(Ticket, Transaction)> {
    let ticket_id: Uuid = sqlx::query_scalar("SELECT ticket_id FROM transactions WHERE id = $1")
        .bind(transaction_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| StoreError::not_found("transaction", transaction_id))?;
    let ticket: Ticket = lock_row(&mut *conn, "tickets", "ticket", ticket_id).await?;
    let transaction: Transaction =
        lock_row(&mut *conn, "transactions", "transaction", transaction_id).await?;
    Ok((ticket, transaction))
}

async fn ticket_is_paid(conn: &mut PgConnection, ticket_id: Uuid) -> StoreResult<bool> {
    sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM transactions WHERE ticket_id = $1 AND status = $2)",
    )
    .bind(ticket_id)
    .bind(TransactionStatus::Completed.as_str())
    .fetch_one(conn)
    .await
    .map_err(map_db_error)
}

async fn set_ticket_status(
    conn: &mut PgConnection,
    ticket_id: Uuid,
    status: TicketStatus,
) -> StoreResult<Ticket> {
    sqlx::query_as::<_, Ticket>("UPDATE tickets SET status = $2 WHERE id = $1 RETURNING *")
        .bind(ticket_id)
        .bind(status.as_str())
        .fetch_one(conn)
        .await
        .map_err(map_db_error)
}

/// Never lifts `available_quantity` above `total_quantity`.
async fn release_seat(conn: &mut PgConnection, tier_id: Uuid) -> StoreResult<()> {
    sqlx::query(
        "UPDATE ticket_tiers SET available_quantity = available_quantity + 1 \
         WHERE id = $1 AND available_quantity < total_quantity",
    )
    .bind(tier_id)
    .execute(conn)
    .await
    .map_err(map_db_error)?;
    Ok(())
}

fn ensure_ticket_transition(ticket: &Ticket, next: TicketStatus) -> StoreResult<()> {
    if ticket.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(StoreError::InvalidTransition(format!(
            "ticket '{}' is {} and cannot become {next}",
            ticket.id, ticket.status
        )))
    }
}

fn ensure_transaction_transition(
    transaction: &Transaction,
    next: TransactionStatus,
) -> StoreResult<()> {
    if transaction.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(StoreError::InvalidTransition(format!(
            "transaction '{}' is already {}",
            transaction.id, transaction.status
        )))
    }
}

type PgTransaction<'c> = sqlx::Transaction<'c, Postgres>;

#[async_trait]
impl Store for PgStore {
    fn backend_tag(&self) -> &'static str {
        "postgres"
    }

    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        sqlx::query_as::<_, User>("INSERT INTO users (name, email) VALUES ($1, $2) RETURNING *")
            .bind(new.name)
            .bind(new.email)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?
            .ok_or_else(|| StoreError::not_found("user", id))
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<User> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET name = COALESCE($2, name), email = COALESCE($3, email) \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.email)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| StoreError::not_found("user", id))
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        self.delete_by_id("users", "user", id).await
    }

    async fn create_organizer(&self, new: NewOrganizer) -> StoreResult<Organizer> {
        sqlx::query_as::<_, Organizer>(
            "INSERT INTO organizers (name, description, contact_email) \
             VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(new.name)
        .bind(new.description)
        .bind(new.contact_email)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn get_organizer(&self, id: Uuid) -> StoreResult<Organizer> {
        sqlx::query_as::<_, Organizer>("SELECT * FROM organizers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?
            .ok_or_else(|| StoreError::not_found("organizer", id))
    }

    async fn list_organizers(&self) -> StoreResult<Vec<Organizer>> {
        sqlx::query_as::<_, Organizer>("SELECT * FROM organizers ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn update_organizer(
        &self,
        id: Uuid,
        changes: OrganizerChanges,
    ) -> StoreResult<Organizer> {
        let mut tx: PgTransaction<'_> = self.pool.begin().await.map_err(map_db_error)?;

        let mut organizer: Organizer = lock_row(&mut tx, "organizers", "organizer", id).await?;
        changes.apply_to(&mut organizer);
        let organizer = sqlx::query_as::<_, Organizer>(
            "UPDATE organizers SET name = $2, description = $3, contact_email = $4 \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(organizer.name)
        .bind(organizer.description)
        .bind(organizer.contact_email)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;
        Ok(organizer)
    }

    async fn delete_organizer(&self, id: Uuid) -> StoreResult<()> {
        self.delete_by_id("organizers", "organizer", id).await
    }

    async fn create_event(&self, new: NewEvent) -> StoreResult<Event> {
        sqlx::query_as::<_, Event>(
            "INSERT INTO events (organizer_id, title, description, location, start_time, end_time) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(new.organizer_id)
        .bind(new.title)
        .bind(new.description)
        .bind(new.location)
        .bind(new.start_time)
        .bind(new.end_time)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn get_event(&self, id: Uuid) -> StoreResult<Event> {
        sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?
            .ok_or_else(|| StoreError::not_found("event", id))
    }

    async fn list_events(&self, filter: EventFilter) -> StoreResult<Vec<Event>> {
        sqlx::query_as::<_, Event>(
            "SELECT * FROM events WHERE ($1::uuid IS NULL OR organizer_id = $1) \
             ORDER BY start_time, id",
        )
        .bind(filter.organizer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn update_event(&self, id: Uuid, changes: EventChanges) -> StoreResult<Event> {
        let mut tx: PgTransaction<'_> = self.pool.begin().await.map_err(map_db_error)?;

        let mut event: Event = lock_row(&mut tx, "events", "event", id).await?;
        changes.apply_to(&mut event);
        validate_schedule(&event)?;
        let event = sqlx::query_as::<_, Event>(
            "UPDATE events SET title = $2, description = $3, location = $4, \
             start_time = $5, end_time = $6 \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(event.title)
        .bind(event.description)
        .bind(event.location)
        .bind(event.start_time)
        .bind(event.end_time)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;
        Ok(event)
    }

    async fn delete_event(&self, id: Uuid) -> StoreResult<()> {
        self.delete_by_id("events", "event", id).await
    }

    async fn create_tier(&self, new: NewTicketTier) -> StoreResult<TicketTier> {
        let available_quantity = new.available_quantity.unwrap_or(new.total_quantity);
        sqlx::query_as::<_, TicketTier>(
            "INSERT INTO ticket_tiers \
             (event_id, name, description, price, total_quantity, available_quantity) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(new.event_id)
        .bind(new.name)
        .bind(new.description)
        .bind(new.price)
        .bind(new.total_quantity)
        .bind(available_quantity)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn get_tier(&self, id: Uuid) -> StoreResult<TicketTier> {
        sqlx::query_as::<_, TicketTier>("SELECT * FROM ticket_tiers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?
            .ok_or_else(|| StoreError::not_found("ticket tier", id))
    }

    async fn list_tiers(&self, event_id: Uuid) -> StoreResult<Vec<TicketTier>> {
        sqlx::query_as::<_, TicketTier>(
            "SELECT * FROM ticket_tiers WHERE event_id = $1 ORDER BY created_at, id",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn update_tier(&self, id: Uuid, changes: TicketTierChanges) -> StoreResult<TicketTier> {
        let mut tx: PgTransaction<'_> = self.pool.begin().await.map_err(map_db_error)?;

        let mut tier: TicketTier = lock_row(&mut tx, "ticket_tiers", "ticket tier", id).await?;
        changes.apply_to(&mut tier);
        validate_inventory(tier.total_quantity, tier.available_quantity)?;
        let tier = sqlx::query_as::<_, TicketTier>(
            "UPDATE ticket_tiers SET name = $2, description = $3, price = $4, \
             total_quantity = $5, available_quantity = $6 \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(tier.name)
        .bind(tier.description)
        .bind(tier.price)
        .bind(tier.total_quantity)
        .bind(tier.available_quantity)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;
        Ok(tier)
    }

    async fn delete_tier(&self, id: Uuid) -> StoreResult<()> {
        self.delete_by_id("ticket_tiers", "ticket tier", id).await
    }

    async fn get_ticket(&self, id: Uuid) -> StoreResult<Ticket> {
        sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?
            .ok_or_else(|| StoreError::not_found("ticket", id))
    }

    async fn list_tickets_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Ticket>> {
        sqlx::query_as::<_, Ticket>(
            "SELECT * FROM tickets WHERE user_id = $1 ORDER BY created_at, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn list_tickets_for_tier(&self, tier_id: Uuid) -> StoreResult<Vec<Ticket>> {
        sqlx::query_as::<_, Ticket>(
            "SELECT * FROM tickets WHERE ticket_tier_id = $1 ORDER BY created_at, id",
        )
        .bind(tier_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn get_transaction(&self, id: Uuid) -> StoreResult<Transaction> {
        sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?
            .ok_or_else(|| StoreError::not_found("transaction", id))
    }

    async fn transaction_for_ticket(&self, ticket_id: Uuid) -> StoreResult<Option<Transaction>> {
        sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE ticket_id = $1 ORDER BY created_at LIMIT 1",
        )
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn purchase_tickets(&self, purchase: NewPurchase) -> StoreResult<Vec<Purchase>> {
        validate_quantity(purchase.quantity)?;
        let mut tx: PgTransaction<'_> = self.pool.begin().await.map_err(map_db_error)?;

        let tier = sqlx::query_as::<_, TicketTier>(
            "UPDATE ticket_tiers SET available_quantity = available_quantity - $2 \
             WHERE id = $1 AND available_quantity >= $2 RETURNING *",
        )
        .bind(purchase.ticket_tier_id)
        .bind(purchase.quantity)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_error)?;

        let tier = match tier {
            Some(tier) => tier,
            None => {
                let available: Option<i32> =
                    sqlx::query_scalar("SELECT available_quantity FROM ticket_tiers WHERE id = $1")
                        .bind(purchase.ticket_tier_id)
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(map_db_error)?;
                return Err(match available {
                    Some(available) => {
                        seat_shortage(purchase.ticket_tier_id, available, purchase.quantity)
                    }
                    None => StoreError::not_found("ticket tier", purchase.ticket_tier_id),
                });
            }
        };

        let mut purchases = Vec::new();
        for _ in 0..purchase.quantity {
            let ticket = sqlx::query_as::<_, Ticket>(
                "INSERT INTO tickets (user_id, ticket_tier_id, status, qr_code) \
                 VALUES ($1, $2, $3, $4) RETURNING *",
            )
            .bind(purchase.user_id)
            .bind(tier.id)
            .bind(TicketStatus::Active.as_str())
            .bind(purchase.qr_code.clone())
            .fetch_one(&mut *tx)
            .await
            .map_err(map_db_error)?;

            let transaction = sqlx::query_as::<_, Transaction>(
                "INSERT INTO transactions (ticket_id, amount, currency, status) \
                 VALUES ($1, $2, $3, $4) RETURNING *",
            )
            .bind(ticket.id)
            .bind(tier.price)
            .bind(purchase.currency.clone())
            .bind(TransactionStatus::Pending.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(map_db_error)?;

            purchases.push(Purchase {
                ticket,
                transaction,
            });
        }

        tx.commit().await.map_err(map_db_error)?;
        Ok(purchases)
    }

    async fn cancel_ticket(&self, ticket_id: Uuid) -> StoreResult<Ticket> {
        let mut tx: PgTransaction<'_> = self.pool.begin().await.map_err(map_db_error)?;

        let ticket: Ticket = lock_row(&mut tx, "tickets", "ticket", ticket_id).await?;
        ensure_ticket_transition(&ticket, TicketStatus::Cancelled)?;
        let ticket = set_ticket_status(&mut tx, ticket_id, TicketStatus::Cancelled).await?;

        sqlx::query("UPDATE transactions SET status = $2 WHERE ticket_id = $1 AND status = $3")
            .bind(ticket_id)
            .bind(TransactionStatus::Failed.as_str())
            .bind(TransactionStatus::Pending.as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;
        release_seat(&mut tx, ticket.ticket_tier_id).await?;

        tx.commit().await.map_err(map_db_error)?;
        Ok(ticket)
    }

    async fn check_in_ticket(&self, ticket_id: Uuid) -> StoreResult<Ticket> {
        let mut tx: PgTransaction<'_> = self.pool.begin().await.map_err(map_db_error)?;

        let ticket: Ticket = lock_row(&mut tx, "tickets", "ticket", ticket_id).await?;
        require_paid(ticket_id, ticket_is_paid(&mut tx, ticket_id).await?)?;
        ensure_ticket_transition(&ticket, TicketStatus::Used)?;
        let ticket = set_ticket_status(&mut tx, ticket_id, TicketStatus::Used).await?;

        tx.commit().await.map_err(map_db_error)?;
        Ok(ticket)
    }

    async fn transfer_ticket(&self, ticket_id: Uuid, to_user_id: Uuid) -> StoreResult<Ticket> {
        let mut tx: PgTransaction<'_> = self.pool.begin().await.map_err(map_db_error)?;

        let ticket: Ticket = lock_row(&mut tx, "tickets", "ticket", ticket_id).await?;
        validate_transfer(&ticket, to_user_id)?;
        require_paid(ticket_id, ticket_is_paid(&mut tx, ticket_id).await?)?;
        let ticket =
            sqlx::query_as::<_, Ticket>("UPDATE tickets SET user_id = $2 WHERE id = $1 RETURNING *")
                .bind(ticket_id)
                .bind(to_user_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;
        Ok(ticket)
    }

    async fn complete_transaction(
        &self,
        transaction_id: Uuid,
        transaction_hash: Option<String>,
    ) -> StoreResult<Transaction> {
        let mut tx: PgTransaction<'_> = self.pool.begin().await.map_err(map_db_error)?;

        let (_, transaction) = lock_settlement(&mut tx, transaction_id).await?;
        ensure_transaction_transition(&transaction, TransactionStatus::Completed)?;
        let transaction = sqlx::query_as::<_, Transaction>(
            "UPDATE transactions SET status = $2, \
             stellar_transaction_hash = COALESCE($3, stellar_transaction_hash) \
             WHERE id = $1 RETURNING *",
        )
        .bind(transaction_id)
        .bind(TransactionStatus::Completed.as_str())
        .bind(transaction_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;
        Ok(transaction)
    }

    async fn fail_transaction(&self, transaction_id: Uuid) -> StoreResult<Purchase> {
        let mut tx: PgTransaction<'_> = self.pool.begin().await.map_err(map_db_error)?;

        let (mut ticket, transaction) = lock_settlement(&mut tx, transaction_id).await?;
        ensure_transaction_transition(&transaction, TransactionStatus::Failed)?;
        let transaction = sqlx::query_as::<_, Transaction>(
            "UPDATE transactions SET status = $2 WHERE id = $1 RETURNING *",
        )
        .bind(transaction_id)
        .bind(TransactionStatus::Failed.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_db_error)?;

        if ticket.status == TicketStatus::Active {
            ticket = set_ticket_status(&mut tx, ticket.id, TicketStatus::Cancelled).await?;
            release_seat(&mut tx, ticket.ticket_tier_id).await?;
        }

        tx.commit().await.map_err(map_db_error)?;
        Ok(Purchase {
            ticket,
            transaction,
        })
    }
}
