//! Rider wallet ("vault") domain module

mod model;
mod service;

pub use model::{
    AddMoneyRequest, HistoryQuery, HoldRequest, LedgerEntry, LedgerEntryKind, LedgerStatus,
    MonthlyStat, TransactionCategory, TransactionHistory, TransactionStats, TypeStat, Vault,
    VaultBalance,
};
pub use service::VaultService;
