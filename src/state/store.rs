use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use dashmap::DashMap;

use crate::error::{AppError, Result};
use crate::types::{
    Bet, BetStatus, BettingOption, CurrencySettings, LiveStream, Transaction, TxStatus,
};

// ---------------------------------------------------------------------------
// SiteStore
// ---------------------------------------------------------------------------

/// Process-wide site state: betting options, bets, transactions, live
/// streams, and the currency configuration. Injected by `Arc` into every
/// consumer. Status transitions go through the guarded `transition_*`
/// methods, which only accept records still in `pending`.
pub struct SiteStore {
    /// option_id → betting option
    options: DashMap<u64, BettingOption>,
    /// bet_id → bet
    bets: DashMap<u64, Bet>,
    /// transaction_id → transaction
    transactions: DashMap<u64, Transaction>,
    /// stream_id → live stream descriptor
    streams: DashMap<u64, LiveStream>,
    currency: RwLock<CurrencySettings>,
    /// Shared id allocator for all record kinds.
    next_id: AtomicU64,
}

impl SiteStore {
    pub fn new(currency: CurrencySettings) -> Arc<Self> {
        Arc::new(Self {
            options: DashMap::new(),
            bets: DashMap::new(),
            transactions: DashMap::new(),
            streams: DashMap::new(),
            currency: RwLock::new(currency),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn alloc_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    // -- betting options ----------------------------------------------------

    pub fn add_option(&self, option: BettingOption) {
        self.options.insert(option.id, option);
    }

    pub fn get_option(&self, id: u64) -> Option<BettingOption> {
        self.options.get(&id).map(|o| o.clone())
    }

    /// Active options only — what the public listing shows.
    pub fn active_options(&self) -> Vec<BettingOption> {
        let mut out: Vec<BettingOption> = self
            .options
            .iter()
            .filter(|e| e.value().active)
            .map(|e| e.value().clone())
            .collect();
        out.sort_by_key(|o| o.id);
        out
    }

    pub fn all_options(&self) -> Vec<BettingOption> {
        let mut out: Vec<BettingOption> = self.options.iter().map(|e| e.value().clone()).collect();
        out.sort_by_key(|o| o.id);
        out
    }

    pub fn update_option(&self, updated: BettingOption) -> Result<BettingOption> {
        let mut entry = self.options.get_mut(&updated.id).ok_or(AppError::NotFound {
            kind: "option",
            id: updated.id.to_string(),
        })?;
        *entry = updated.clone();
        Ok(updated)
    }

    // -- live streams -------------------------------------------------------

    pub fn add_stream(&self, stream: LiveStream) {
        self.streams.insert(stream.id, stream);
    }

    pub fn streams(&self) -> Vec<LiveStream> {
        let mut out: Vec<LiveStream> = self.streams.iter().map(|e| e.value().clone()).collect();
        out.sort_by_key(|s| s.id);
        out
    }

    pub fn update_stream(&self, updated: LiveStream) -> Result<LiveStream> {
        let mut entry = self.streams.get_mut(&updated.id).ok_or(AppError::NotFound {
            kind: "stream",
            id: updated.id.to_string(),
        })?;
        *entry = updated.clone();
        Ok(updated)
    }

    // -- bets ---------------------------------------------------------------

    pub fn add_bet(&self, bet: Bet) {
        self.bets.insert(bet.id, bet);
    }

    pub fn get_bet(&self, id: u64) -> Option<Bet> {
        self.bets.get(&id).map(|b| b.clone())
    }

    /// All bets for one user, newest first.
    pub fn bets_for_user(&self, user_id: &str) -> Vec<Bet> {
        let mut out: Vec<Bet> = self
            .bets
            .iter()
            .filter(|e| e.value().user_id == user_id)
            .map(|e| e.value().clone())
            .collect();
        out.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
        out
    }

    /// All bets, optionally filtered by status, newest first.
    pub fn bets(&self, status: Option<BetStatus>) -> Vec<Bet> {
        let mut out: Vec<Bet> = self
            .bets
            .iter()
            .filter(|e| status.map_or(true, |s| e.value().status == s))
            .map(|e| e.value().clone())
            .collect();
        out.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
        out
    }

    /// One-shot transition: `pending → {won, lost}`. Fails if the bet is
    /// missing or was already settled, leaving the record untouched.
    pub fn transition_bet(&self, id: u64, to: BetStatus) -> Result<Bet> {
        let mut entry = self.bets.get_mut(&id).ok_or(AppError::NotFound {
            kind: "bet",
            id: id.to_string(),
        })?;
        if entry.status != BetStatus::Pending {
            return Err(AppError::AlreadySettled {
                kind: "bet",
                id,
                status: entry.status.to_string(),
            });
        }
        entry.status = to;
        Ok(entry.clone())
    }

    // -- transactions -------------------------------------------------------

    pub fn add_transaction(&self, tx: Transaction) {
        self.transactions.insert(tx.id, tx);
    }

    pub fn get_transaction(&self, id: u64) -> Option<Transaction> {
        self.transactions.get(&id).map(|t| t.clone())
    }

    pub fn transactions_for_user(&self, user_id: &str) -> Vec<Transaction> {
        let mut out: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|e| e.value().user_id == user_id)
            .map(|e| e.value().clone())
            .collect();
        out.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
        out
    }

    pub fn transactions(&self, status: Option<TxStatus>) -> Vec<Transaction> {
        let mut out: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|e| status.map_or(true, |s| e.value().status == s))
            .map(|e| e.value().clone())
            .collect();
        out.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
        out
    }

    /// One-shot transition: `pending → {approved, rejected}`, recording the
    /// admin's notes. Fails if the transaction was already resolved.
    pub fn transition_transaction(
        &self,
        id: u64,
        to: TxStatus,
        notes: Option<String>,
    ) -> Result<Transaction> {
        let mut entry = self.transactions.get_mut(&id).ok_or(AppError::NotFound {
            kind: "transaction",
            id: id.to_string(),
        })?;
        if entry.status != TxStatus::Pending {
            return Err(AppError::AlreadySettled {
                kind: "transaction",
                id,
                status: entry.status.to_string(),
            });
        }
        entry.status = to;
        if notes.is_some() {
            entry.notes = notes;
        }
        Ok(entry.clone())
    }

    // -- currency -----------------------------------------------------------

    pub fn currency(&self) -> CurrencySettings {
        self.currency
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_currency(&self, settings: CurrencySettings) {
        *self.currency.write().unwrap_or_else(|e| e.into_inner()) = settings;
    }

    pub fn bet_count(&self) -> usize {
        self.bets.len()
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
