//! Vault service layer - hold/release/refund accounting
//!
//! Every mutation pairs its balance/hold change with the matching ledger
//! append inside one database transaction: both persist or neither does.
//! Balance checks and decrements are a single conditional UPDATE, so two
//! holds racing on the same vault cannot both pass one check.

use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::vault::model::{
    HistoryQuery, LedgerEntry, LedgerEntryKind, MonthlyStat, TransactionCategory,
    TransactionHistory, TransactionStats, TypeStat, Vault, VaultBalance,
};

/// Minimal ride view the ledger needs for descriptions and amounts
#[derive(sqlx::FromRow)]
struct RideRef {
    rider_id: Uuid,
    pickup: String,
    destination: String,
    fare_final: i64,
}

/// Vault service managing per-rider balances and the append-only ledger
pub struct VaultService {
    db_pool: PgPool,
}

impl VaultService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Get the rider's vault, creating it lazily on first touch
    pub async fn get_or_create_vault(&self, rider_id: Uuid) -> ApiResult<Vault> {
        sqlx::query(
            r#"
            INSERT INTO vaults (id, rider_id)
            VALUES ($1, $2)
            ON CONFLICT (rider_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(rider_id)
        .execute(&self.db_pool)
        .await?;

        let vault = sqlx::query_as::<_, Vault>("SELECT * FROM vaults WHERE rider_id = $1")
            .bind(rider_id)
            .fetch_one(&self.db_pool)
            .await?;

        Ok(vault)
    }

    /// Credit spendable balance
    pub async fn add_money(
        &self,
        rider_id: Uuid,
        amount: i64,
        description: Option<String>,
    ) -> ApiResult<Vault> {
        if amount <= 0 {
            return Err(ApiError::Validation(
                "Amount must be greater than 0".to_string(),
            ));
        }

        self.get_or_create_vault(rider_id).await?;

        let mut tx = self.db_pool.begin().await?;

        let vault = sqlx::query_as::<_, Vault>(
            r#"
            UPDATE vaults
            SET balance = balance + $2, updated_at = NOW()
            WHERE rider_id = $1
            RETURNING *
            "#,
        )
        .bind(rider_id)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await?;

        insert_entry(
            &mut tx,
            NewEntry {
                rider_id,
                entry: LedgerEntryKind::Credit,
                category: TransactionCategory::WalletRecharge,
                amount,
                ride_id: None,
                completed: true,
                description: description.unwrap_or_else(|| "Money added to vault".to_string()),
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(rider_id = %rider_id, amount, "Vault credited");

        Ok(vault)
    }

    /// Earmark funds for a ride
    pub async fn hold_for_ride(
        &self,
        rider_id: Uuid,
        ride_id: Uuid,
        amount: i64,
    ) -> ApiResult<Vault> {
        if amount <= 0 {
            return Err(ApiError::Validation(
                "Amount must be greater than 0".to_string(),
            ));
        }

        let ride = self.ride_ref(ride_id).await?;

        let vault = self.get_or_create_vault(rider_id).await?;

        let mut tx = self.db_pool.begin().await?;

        // Check-and-decrement in one statement; a racing hold that drained
        // the balance since our read makes this affect zero rows
        let updated = sqlx::query_as::<_, Vault>(
            r#"
            UPDATE vaults
            SET balance = balance - $2, hold_amount = hold_amount + $2, updated_at = NOW()
            WHERE rider_id = $1 AND balance >= $2
            RETURNING *
            "#,
        )
        .bind(rider_id)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(updated) = updated else {
            return Err(ApiError::InsufficientBalance {
                required: amount,
                available: vault.balance,
            });
        };

        insert_entry(
            &mut tx,
            NewEntry {
                rider_id,
                entry: LedgerEntryKind::Hold,
                category: TransactionCategory::RidePayment,
                amount,
                ride_id: Some(ride_id),
                completed: false,
                description: format!(
                    "Payment held for ride from {} to {}",
                    ride.pickup, ride.destination
                ),
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(rider_id = %rider_id, ride_id = %ride_id, amount, "Funds held for ride");

        Ok(updated)
    }

    /// Release the held fare to the captain after completion
    ///
    /// Funds exit the rider-side ledger entirely; captain payout happens
    /// outside the platform wallet.
    pub async fn release_to_captain(&self, ride_id: Uuid) -> ApiResult<Vault> {
        let ride = self.ride_ref(ride_id).await?;
        let held = self.unsettled_hold(ride_id).await?;

        let mut tx = self.db_pool.begin().await?;

        let vault = sqlx::query_as::<_, Vault>(
            r#"
            UPDATE vaults
            SET hold_amount = hold_amount - $2, updated_at = NOW()
            WHERE rider_id = $1 AND hold_amount >= $2
            RETURNING *
            "#,
        )
        .bind(ride.rider_id)
        .bind(held)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            ApiError::StateConflict("Held amount no longer covers this ride".to_string())
        })?;

        insert_entry(
            &mut tx,
            NewEntry {
                rider_id: ride.rider_id,
                entry: LedgerEntryKind::Release,
                category: TransactionCategory::DriverPayment,
                amount: held,
                ride_id: Some(ride_id),
                completed: true,
                description: format!(
                    "Payment released to driver for ride from {} to {}",
                    ride.pickup, ride.destination
                ),
            },
        )
        .await?;

        // Settle the ride's payment sub-record alongside the ledger
        sqlx::query(
            r#"
            UPDATE rides
            SET payment_status = 'completed', payment_date = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(ride_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(ride_id = %ride_id, amount = held, "Held funds released to driver");

        Ok(vault)
    }

    /// Return the held fare to spendable balance after cancellation
    pub async fn refund_cancelled(&self, ride_id: Uuid) -> ApiResult<Vault> {
        let ride = self.ride_ref(ride_id).await?;
        let held = self.unsettled_hold(ride_id).await?;

        let mut tx = self.db_pool.begin().await?;

        let vault = sqlx::query_as::<_, Vault>(
            r#"
            UPDATE vaults
            SET balance = balance + $2, hold_amount = hold_amount - $2, updated_at = NOW()
            WHERE rider_id = $1 AND hold_amount >= $2
            RETURNING *
            "#,
        )
        .bind(ride.rider_id)
        .bind(held)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            ApiError::StateConflict("Held amount no longer covers this ride".to_string())
        })?;

        insert_entry(
            &mut tx,
            NewEntry {
                rider_id: ride.rider_id,
                entry: LedgerEntryKind::Refund,
                category: TransactionCategory::CancellationRefund,
                amount: held,
                ride_id: Some(ride_id),
                completed: true,
                description: format!(
                    "Refund for cancelled ride from {} to {}",
                    ride.pickup, ride.destination
                ),
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(ride_id = %ride_id, amount = held, "Held funds refunded");

        Ok(vault)
    }

    /// Current balance figures
    pub async fn balance(&self, rider_id: Uuid) -> ApiResult<VaultBalance> {
        let vault = self.get_or_create_vault(rider_id).await?;
        Ok(VaultBalance {
            balance: vault.balance,
            hold_amount: vault.hold_amount,
            available_balance: vault.balance,
        })
    }

    /// Filtered, paginated transaction history, newest first
    pub async fn history(
        &self,
        rider_id: Uuid,
        query: HistoryQuery,
    ) -> ApiResult<TransactionHistory> {
        let limit = query.limit.unwrap_or(50).clamp(1, 200);
        let skip = query.skip.unwrap_or(0).max(0);

        let mut list: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM ledger_entries WHERE rider_id = ");
        list.push_bind(rider_id);
        let mut count: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM ledger_entries WHERE rider_id = ");
        count.push_bind(rider_id);

        for builder in [&mut list, &mut count] {
            if let Some(category) = query.category {
                builder.push(" AND category = ");
                builder.push_bind(category);
            }
            if let Some(status) = query.status {
                builder.push(" AND status = ");
                builder.push_bind(status);
            }
            if let Some(start) = query.start_date {
                builder.push(" AND created_at >= ");
                builder.push_bind(start);
            }
            if let Some(end) = query.end_date {
                builder.push(" AND created_at <= ");
                builder.push_bind(end);
            }
        }

        list.push(" ORDER BY created_at DESC LIMIT ");
        list.push_bind(limit);
        list.push(" OFFSET ");
        list.push_bind(skip);

        let transactions = list
            .build_query_as::<LedgerEntry>()
            .fetch_all(&self.db_pool)
            .await?;

        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.db_pool)
            .await?;

        let has_more = total > skip + transactions.len() as i64;

        Ok(TransactionHistory {
            transactions,
            total,
            has_more,
        })
    }

    /// Single ledger entry, scoped to its owner
    pub async fn transaction(&self, rider_id: Uuid, entry_id: Uuid) -> ApiResult<LedgerEntry> {
        sqlx::query_as::<_, LedgerEntry>(
            "SELECT * FROM ledger_entries WHERE id = $1 AND rider_id = $2",
        )
        .bind(entry_id)
        .bind(rider_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Transaction not found".to_string()))
    }

    /// Category totals plus the last twelve months of activity
    pub async fn stats(&self, rider_id: Uuid) -> ApiResult<TransactionStats> {
        let by_category = sqlx::query_as::<_, TypeStat>(
            r#"
            SELECT category, COALESCE(SUM(amount), 0)::BIGINT AS total, COUNT(*) AS count
            FROM ledger_entries
            WHERE rider_id = $1
            GROUP BY category
            "#,
        )
        .bind(rider_id)
        .fetch_all(&self.db_pool)
        .await?;

        let monthly = sqlx::query_as::<_, MonthlyStat>(
            r#"
            SELECT
                EXTRACT(YEAR FROM created_at)::INT AS year,
                EXTRACT(MONTH FROM created_at)::INT AS month,
                COALESCE(SUM(amount), 0)::BIGINT AS total,
                COUNT(*) AS count
            FROM ledger_entries
            WHERE rider_id = $1
            GROUP BY 1, 2
            ORDER BY 1 DESC, 2 DESC
            LIMIT 12
            "#,
        )
        .bind(rider_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(TransactionStats {
            by_category,
            monthly,
        })
    }

    // ===== Private helpers =====

    async fn ride_ref(&self, ride_id: Uuid) -> ApiResult<RideRef> {
        sqlx::query_as::<_, RideRef>(
            "SELECT rider_id, pickup, destination, fare_final FROM rides WHERE id = $1",
        )
        .bind(ride_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Ride not found".to_string()))
    }

    /// Amount of the ride's hold entry, requiring it to be unsettled
    async fn unsettled_hold(&self, ride_id: Uuid) -> ApiResult<i64> {
        let held = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT amount FROM ledger_entries
            WHERE ride_id = $1 AND entry = 'hold'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(ride_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("No held amount found for this ride".to_string()))?;

        let settled = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM ledger_entries
            WHERE ride_id = $1 AND entry IN ('release', 'refund')
            "#,
        )
        .bind(ride_id)
        .fetch_one(&self.db_pool)
        .await?;

        if settled > 0 {
            return Err(ApiError::StateConflict(
                "Hold for this ride was already settled".to_string(),
            ));
        }

        Ok(held)
    }
}

/// Name of the partial unique index allowing one settlement per ride
const SETTLEMENT_IDX: &str = "ledger_one_settlement_per_ride";

struct NewEntry {
    rider_id: Uuid,
    entry: LedgerEntryKind,
    category: TransactionCategory,
    amount: i64,
    ride_id: Option<Uuid>,
    completed: bool,
    description: String,
}

async fn insert_entry(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    entry: NewEntry,
) -> ApiResult<()> {
    let status = if entry.completed { "completed" } else { "pending" };

    sqlx::query(
        r#"
        INSERT INTO ledger_entries (id, rider_id, entry, category, amount, ride_id, status, description)
        VALUES ($1, $2, $3, $4, $5, $6, $7::ledger_status, $8)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(entry.rider_id)
    .bind(entry.entry)
    .bind(entry.category)
    .bind(entry.amount)
    .bind(entry.ride_id)
    .bind(status)
    .bind(&entry.description)
    .execute(&mut **tx)
    .await
    .map_err(|e| match e.as_database_error().and_then(|d| d.constraint()) {
        // A settlement that raced another release/refund for the same ride
        Some(SETTLEMENT_IDX) => {
            ApiError::StateConflict("Hold for this ride was already settled".to_string())
        }
        _ => ApiError::from(e),
    })?;

    Ok(())
}
