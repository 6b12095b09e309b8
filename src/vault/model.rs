//! Vault models and ledger data structures
//!
//! The ledger is one append-only table; the vault row carries only the
//! running balance and hold. Each entry records both the raw movement kind
//! (credit/hold/release/refund) and the reporting category the transaction
//! history exposes.

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// Per-rider wallet
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Vault {
    pub id: Uuid,
    pub rider_id: Uuid,
    /// Spendable funds
    pub balance: i64,
    /// Funds earmarked for rides, not spendable
    pub hold_amount: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw ledger movement kind
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "ledger_entry_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LedgerEntryKind {
    Credit,
    Hold,
    Release,
    Refund,
}

/// Reporting-level transaction category
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "transaction_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionCategory {
    WalletRecharge,
    RidePayment,
    DriverPayment,
    CancellationRefund,
}

/// Settlement status of a ledger entry
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "ledger_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LedgerStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

/// Immutable record of one ledger movement
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub rider_id: Uuid,
    pub entry: LedgerEntryKind,
    pub category: TransactionCategory,
    pub amount: i64,
    pub ride_id: Option<Uuid>,
    pub status: LedgerStatus,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Balance figures exposed to the rider
#[derive(Debug, Serialize)]
pub struct VaultBalance {
    pub balance: i64,
    pub hold_amount: i64,
    /// Spendable right now; holds are already excluded from `balance`
    pub available_balance: i64,
}

/// Request DTO for depositing money
#[derive(Debug, Deserialize)]
pub struct AddMoneyRequest {
    pub amount: i64,
    pub description: Option<String>,
}

impl AddMoneyRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.amount <= 0 {
            return Err("Amount must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Request DTO for holding funds against a ride
#[derive(Debug, Deserialize)]
pub struct HoldRequest {
    pub ride_id: Uuid,
    pub amount: i64,
}

impl HoldRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.amount <= 0 {
            return Err("Amount must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Query parameters for the transaction history
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub category: Option<TransactionCategory>,
    pub status: Option<LedgerStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

/// Paginated transaction history page, newest first
#[derive(Debug, Serialize)]
pub struct TransactionHistory {
    pub transactions: Vec<LedgerEntry>,
    pub total: i64,
    pub has_more: bool,
}

/// Aggregate totals for one category
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct TypeStat {
    pub category: TransactionCategory,
    pub total: i64,
    pub count: i64,
}

/// Aggregate totals for one calendar month
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct MonthlyStat {
    pub year: i32,
    pub month: i32,
    pub total: i64,
    pub count: i64,
}

/// Transaction aggregates for the rider dashboard
#[derive(Debug, Serialize)]
pub struct TransactionStats {
    pub by_category: Vec<TypeStat>,
    pub monthly: Vec<MonthlyStat>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_money_validation() {
        let request = AddMoneyRequest {
            amount: 500,
            description: None,
        };
        assert!(request.validate().is_ok());

        let request = AddMoneyRequest {
            amount: 0,
            description: None,
        };
        assert!(request.validate().is_err());

        let request = AddMoneyRequest {
            amount: -100,
            description: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_hold_request_validation() {
        let request = HoldRequest {
            ride_id: Uuid::new_v4(),
            amount: 80,
        };
        assert!(request.validate().is_ok());

        let request = HoldRequest {
            ride_id: Uuid::new_v4(),
            amount: -1,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_category_serialization() {
        let json = serde_json::to_string(&TransactionCategory::CancellationRefund).unwrap();
        assert_eq!(json, r#""cancellation_refund""#);
        let json = serde_json::to_string(&LedgerEntryKind::Hold).unwrap();
        assert_eq!(json, r#""hold""#);
    }
}
