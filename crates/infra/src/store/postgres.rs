//! Postgres-backed receivable store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (foreign key violation) | `23503` | `Constraint` |
//! | Database (check constraint violation) | `23514` | `Constraint` |
//! | Database (unique violation) | `23505` | `Constraint` |
//! | Database (other) | Any other | `Query` |
//! | PoolClosed / PoolTimedOut / Io | N/A | `Unavailable` |
//! | Other | N/A | `Query` |
//!
//! ## Transitions
//!
//! Settlement and cancellation are single `UPDATE ... WHERE id = $1 AND status
//! IN ('ABERTO', 'VENCIDO') RETURNING ...` statements. When no row comes back a
//! follow-up lookup tells a missing receivable apart from one in a terminal
//! status; the write itself never races with a concurrent transition.

use std::time::Duration;

use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row};
use tracing::{info, instrument};

use gestao_core::{CustomerId, PaymentMethodId, ReceivableId, UserId};
use gestao_receivables::{
    AccountReceivable, Cancellation, DocumentKind, NewPaymentMethod, NewReceivable, PaymentMethod,
    ReceivableStatus, RemovalOutcome, Settlement,
};

use super::{ReceivableFilter, ReceivableStore, StoreError, Transition};

macro_rules! receivable_columns {
    () => {
        "id, customer_id, document_number, document_kind, issue_date, due_date, receipt_date, \
         original_amount, discount, interest, penalty, received_amount, balance, \
         payment_method_id, status, settled_by, notes, active, created_at, updated_at"
    };
}

macro_rules! payment_method_columns {
    () => {
        "id, name, active, created_at, updated_at"
    };
}

/// Receivable store on top of a SQLx connection pool.
///
/// `PgPool` is internally reference counted, so clones share connections.
#[derive(Debug, Clone)]
pub struct PostgresReceivableStore {
    pool: PgPool,
}

impl PostgresReceivableStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a new pool.
    #[instrument(skip(database_url), err)]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        info!(max_connections, "connecting to PostgreSQL");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(format!("failed to connect: {e}")))?;

        Ok(Self { pool })
    }

    /// Apply the bundled schema migrations.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("migration failed: {e}")))?;
        info!("database migrations applied");
        Ok(())
    }

    async fn status_of(&self, id: ReceivableId) -> Result<Option<ReceivableStatus>, StoreError> {
        let row = sqlx::query("SELECT status FROM accounts_receivable WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("status_of", e))?;

        row.map(|r| parse_status(&column::<String>(&r, "status")?))
            .transpose()
    }

    /// Turn the outcome of a conditional `UPDATE ... RETURNING` into a transition.
    async fn transition_from(
        &self,
        id: ReceivableId,
        row: Option<PgRow>,
    ) -> Result<Transition, StoreError> {
        if let Some(row) = row {
            return Ok(Transition::Applied(receivable_from_row(&row)?));
        }
        Ok(match self.status_of(id).await? {
            None => Transition::NotFound,
            Some(status) => Transition::Rejected(status),
        })
    }
}

#[async_trait::async_trait]
impl ReceivableStore for PostgresReceivableStore {
    #[instrument(skip(self, new), fields(customer_id = %new.customer_id), err)]
    async fn insert(&self, new: NewReceivable) -> Result<AccountReceivable, StoreError> {
        let row = sqlx::query(concat!(
            "INSERT INTO accounts_receivable (
                customer_id, document_number, document_kind, issue_date, due_date,
                original_amount, discount, interest, penalty, received_amount, balance,
                payment_method_id, status, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 0, $10, $11, 'ABERTO', $12)
            RETURNING ",
            receivable_columns!()
        ))
        .bind(new.customer_id.get())
        .bind(&new.document_number)
        .bind(new.document_kind.as_str())
        .bind(new.issue_date)
        .bind(new.due_date)
        .bind(new.original_amount)
        .bind(new.adjustments.discount)
        .bind(new.adjustments.interest)
        .bind(new.adjustments.penalty)
        .bind(new.balance)
        .bind(new.payment_method_id.map(PaymentMethodId::get))
        .bind(new.notes.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_receivable", e))?;

        receivable_from_row(&row)
    }

    #[instrument(skip(self), fields(receivable_id = %id), err)]
    async fn find_by_id(&self, id: ReceivableId) -> Result<Option<AccountReceivable>, StoreError> {
        let row = sqlx::query(concat!(
            "SELECT ",
            receivable_columns!(),
            " FROM accounts_receivable WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_receivable", e))?;

        row.as_ref().map(receivable_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list(&self, filter: &ReceivableFilter) -> Result<Vec<AccountReceivable>, StoreError> {
        let rows = sqlx::query(concat!(
            "SELECT ",
            receivable_columns!(),
            " FROM accounts_receivable
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::BIGINT IS NULL OR customer_id = $2)
            ORDER BY due_date ASC, id ASC"
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.customer_id.map(CustomerId::get))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_receivables", e))?;

        rows.iter().map(receivable_from_row).collect()
    }

    #[instrument(
        skip(self, settlement),
        fields(
            receivable_id = %id,
            payment_method_id = %settlement.payment_method_id,
            received_amount = %settlement.received_amount
        ),
        err
    )]
    async fn settle(&self, id: ReceivableId, settlement: &Settlement) -> Result<Transition, StoreError> {
        let row = sqlx::query(concat!(
            "UPDATE accounts_receivable
            SET discount = $2,
                interest = $3,
                penalty = $4,
                received_amount = $5,
                balance = original_amount - $2 + $3 + $4 - $5,
                receipt_date = $6,
                payment_method_id = $7,
                status = 'RECEBIDO',
                settled_by = COALESCE($8, settled_by),
                notes = COALESCE($9, notes),
                updated_at = NOW()
            WHERE id = $1
              AND status IN ('ABERTO', 'VENCIDO')
              AND EXISTS (SELECT 1 FROM payment_methods WHERE id = $7 AND active)
            RETURNING ",
            receivable_columns!()
        ))
        .bind(id.get())
        .bind(settlement.adjustments.discount)
        .bind(settlement.adjustments.interest)
        .bind(settlement.adjustments.penalty)
        .bind(settlement.received_amount)
        .bind(settlement.receipt_date)
        .bind(settlement.payment_method_id.get())
        .bind(settlement.settled_by.map(UserId::get))
        .bind(settlement.notes.as_deref())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("settle_receivable", e))?;

        if let Some(row) = row {
            return Ok(Transition::Applied(receivable_from_row(&row)?));
        }
        // Still pending means the payment-method guard blocked the update.
        match self.status_of(id).await? {
            None => Ok(Transition::NotFound),
            Some(status) if status.is_pending() => Err(StoreError::constraint(
                "settle_receivable",
                format!(
                    "payment method {} does not exist or is inactive",
                    settlement.payment_method_id
                ),
            )),
            Some(status) => Ok(Transition::Rejected(status)),
        }
    }

    #[instrument(skip(self, cancellation), fields(receivable_id = %id), err)]
    async fn cancel(&self, id: ReceivableId, cancellation: &Cancellation) -> Result<Transition, StoreError> {
        let row = sqlx::query(concat!(
            "UPDATE accounts_receivable
            SET status = 'CANCELADO',
                notes = $2,
                updated_at = NOW()
            WHERE id = $1 AND status IN ('ABERTO', 'VENCIDO')
            RETURNING ",
            receivable_columns!()
        ))
        .bind(id.get())
        .bind(cancellation.notes.as_deref())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("cancel_receivable", e))?;

        self.transition_from(id, row).await
    }

    #[instrument(skip(self, ids), fields(candidates = ids.len()), err)]
    async fn mark_overdue(&self, ids: &[ReceivableId]) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();

        let result = sqlx::query(
            r#"
            UPDATE accounts_receivable
            SET status = 'VENCIDO', updated_at = NOW()
            WHERE id = ANY($1) AND status = 'ABERTO'
            "#,
        )
        .bind(&ids[..])
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("mark_overdue", e))?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self), fields(receivable_id = %id), err)]
    async fn delete(&self, id: ReceivableId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM accounts_receivable WHERE id = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_receivable", e))?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, new), err)]
    async fn insert_payment_method(&self, new: NewPaymentMethod) -> Result<PaymentMethod, StoreError> {
        let row = sqlx::query(concat!(
            "INSERT INTO payment_methods (name, active) VALUES ($1, TRUE) RETURNING ",
            payment_method_columns!()
        ))
        .bind(&new.name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_payment_method", e))?;

        payment_method_from_row(&row)
    }

    #[instrument(skip(self), fields(payment_method_id = %id), err)]
    async fn payment_method(&self, id: PaymentMethodId) -> Result<Option<PaymentMethod>, StoreError> {
        let row = sqlx::query(concat!(
            "SELECT ",
            payment_method_columns!(),
            " FROM payment_methods WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_payment_method", e))?;

        row.as_ref().map(payment_method_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_payment_methods(&self, include_inactive: bool) -> Result<Vec<PaymentMethod>, StoreError> {
        let rows = sqlx::query(concat!(
            "SELECT ",
            payment_method_columns!(),
            " FROM payment_methods WHERE active OR $1 ORDER BY name ASC, id ASC"
        ))
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_payment_methods", e))?;

        rows.iter().map(payment_method_from_row).collect()
    }

    #[instrument(skip(self), fields(payment_method_id = %id), err)]
    async fn payment_method_is_active(&self, id: PaymentMethodId) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT active FROM payment_methods WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("payment_method_is_active", e))?;

        match row {
            Some(r) => column::<bool>(&r, "active"),
            None => Ok(false),
        }
    }

    #[instrument(skip(self), fields(payment_method_id = %id), err)]
    async fn remove_payment_method(&self, id: PaymentMethodId) -> Result<Option<RemovalOutcome>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("remove_payment_method", e))?;

        let exists = sqlx::query("SELECT id FROM payment_methods WHERE id = $1 FOR UPDATE")
            .bind(id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("remove_payment_method", e))?;
        if exists.is_none() {
            return Ok(None);
        }

        let references: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM accounts_receivable WHERE payment_method_id = $1",
        )
        .bind(id.get())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("remove_payment_method", e))?;

        let outcome = RemovalOutcome::for_references(references.max(0) as u64);
        let statement = match outcome {
            RemovalOutcome::Deactivated => {
                "UPDATE payment_methods SET active = FALSE, updated_at = NOW() WHERE id = $1"
            }
            RemovalOutcome::Deleted => "DELETE FROM payment_methods WHERE id = $1",
        };
        sqlx::query(statement)
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("remove_payment_method", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("remove_payment_method", e))?;

        Ok(Some(outcome))
    }
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Corrupt(format!("failed to read column {name}: {e}")))
}

fn parse_status(raw: &str) -> Result<ReceivableStatus, StoreError> {
    raw.parse().map_err(|e| StoreError::Corrupt(format!("{e}")))
}

fn receivable_from_row(row: &PgRow) -> Result<AccountReceivable, StoreError> {
    let document_kind: DocumentKind = column::<String>(row, "document_kind")?
        .parse()
        .map_err(|e| StoreError::Corrupt(format!("{e}")))?;

    Ok(AccountReceivable {
        id: ReceivableId::new(column(row, "id")?),
        customer_id: CustomerId::new(column(row, "customer_id")?),
        document_number: column(row, "document_number")?,
        document_kind,
        issue_date: column(row, "issue_date")?,
        due_date: column(row, "due_date")?,
        receipt_date: column(row, "receipt_date")?,
        original_amount: column(row, "original_amount")?,
        discount: column(row, "discount")?,
        interest: column(row, "interest")?,
        penalty: column(row, "penalty")?,
        received_amount: column(row, "received_amount")?,
        balance: column(row, "balance")?,
        payment_method_id: column::<Option<i64>>(row, "payment_method_id")?.map(PaymentMethodId::new),
        status: parse_status(&column::<String>(row, "status")?)?,
        settled_by: column::<Option<i64>>(row, "settled_by")?.map(UserId::new),
        notes: column(row, "notes")?,
        active: column(row, "active")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

fn payment_method_from_row(row: &PgRow) -> Result<PaymentMethod, StoreError> {
    Ok(PaymentMethod {
        id: PaymentMethodId::new(column(row, "id")?),
        name: column(row, "name")?,
        active: column(row, "active")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message().to_string();
            match db_err.code().as_deref() {
                // foreign key, check constraint, unique violation
                Some("23503") | Some("23514") | Some("23505") => {
                    StoreError::constraint(operation, message)
                }
                _ => StoreError::query(operation, message),
            }
        }
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool unavailable in {operation}"))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("io error in {operation}: {e}")),
        other => StoreError::query(operation, other.to_string()),
    }
}
