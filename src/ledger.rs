use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{AppError, Result};
use crate::types::{now_ms, LedgerEntry, LedgerReason};

/// Append-only per-user balance ledger. A balance is never stored as a lone
/// mutable field — it is the sum of the user's entries, with a cached running
/// total kept in lockstep by `credit`/`debit`. All writes are funneled
/// through the settlement engine, so entries for one user are appended in
/// command order.
pub struct Ledger {
    /// user_id → ordered ledger entries
    entries: DashMap<String, Vec<LedgerEntry>>,
    /// user_id → cached running balance
    balances: DashMap<String, f64>,
    next_seq: AtomicU64,
}

impl Ledger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: DashMap::new(),
            balances: DashMap::new(),
            next_seq: AtomicU64::new(1),
        })
    }

    /// Current balance for `user_id` (0.0 for unknown users).
    pub fn balance(&self, user_id: &str) -> f64 {
        self.balances.get(user_id).map(|b| *b).unwrap_or(0.0)
    }

    /// Ledger history for `user_id`, oldest first.
    pub fn entries_for(&self, user_id: &str) -> Vec<LedgerEntry> {
        self.entries
            .get(user_id)
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// Credit `amount` to the user. Returns the new balance.
    pub fn credit(
        &self,
        user_id: &str,
        amount: f64,
        reason: LedgerReason,
        ref_id: Option<u64>,
    ) -> f64 {
        self.append(user_id, amount, reason, ref_id)
    }

    /// Debit `amount` from the user, failing without any state change if the
    /// balance does not cover it. Returns the new balance.
    pub fn debit(
        &self,
        user_id: &str,
        amount: f64,
        reason: LedgerReason,
        ref_id: Option<u64>,
    ) -> Result<f64> {
        let balance = self.balance(user_id);
        if amount > balance {
            return Err(AppError::InsufficientFunds { balance, amount });
        }
        Ok(self.append(user_id, -amount, reason, ref_id))
    }

    fn append(&self, user_id: &str, amount: f64, reason: LedgerReason, ref_id: Option<u64>) -> f64 {
        let entry = LedgerEntry {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            amount,
            reason,
            ref_id,
            timestamp_ms: now_ms(),
        };
        self.entries
            .entry(user_id.to_string())
            .or_default()
            .push(entry);
        let mut balance = self.balances.entry(user_id.to_string()).or_insert(0.0);
        *balance += amount;
        *balance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_tracks_entry_sum() {
        let ledger = Ledger::new();
        ledger.credit("u", 1250.0, LedgerReason::Seed, None);
        ledger.debit("u", 100.0, LedgerReason::BetStake, Some(1)).unwrap();
        ledger.credit("u", 250.0, LedgerReason::BetPayout, Some(1));

        let sum: f64 = ledger.entries_for("u").iter().map(|e| e.amount).sum();
        assert!((ledger.balance("u") - sum).abs() < 1e-9);
        assert!((ledger.balance("u") - 1400.0).abs() < 1e-9);
    }

    #[test]
    fn debit_rejects_overdraft_without_appending() {
        let ledger = Ledger::new();
        ledger.credit("u", 50.0, LedgerReason::Seed, None);

        let err = ledger
            .debit("u", 100.0, LedgerReason::WithdrawHold, Some(2))
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientFunds { .. }));
        assert_eq!(ledger.entries_for("u").len(), 1);
        assert!((ledger.balance("u") - 50.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_user_has_zero_balance() {
        let ledger = Ledger::new();
        assert_eq!(ledger.balance("nobody"), 0.0);
        assert!(ledger.entries_for("nobody").is_empty());
    }
}
