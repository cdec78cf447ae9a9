use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Betting options & live streams
// ---------------------------------------------------------------------------

/// A bettable event with exactly two selections, each carrying display odds.
/// Odds are kept as the strings the admin entered — they are parsed to f64
/// once, at bet placement, and the original text stays on the bet record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BettingOption {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub option1: String,
    pub option2: String,
    pub odds1: String,
    pub odds2: String,
    pub live_stream: bool,
    pub active: bool,
}

impl BettingOption {
    /// Returns the odds string for `selection`, or None if the selection
    /// matches neither label.
    pub fn odds_for(&self, selection: &str) -> Option<&str> {
        if selection == self.option1 {
            Some(&self.odds1)
        } else if selection == self.option2 {
            Some(&self.odds2)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Live,
    Offline,
}

impl std::fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StreamStatus::Live => "live",
            StreamStatus::Offline => "offline",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveStream {
    pub id: u64,
    /// Matches the title of the betting option the stream belongs to.
    pub name: String,
    pub status: StreamStatus,
    pub viewers: u32,
    pub quality: String,
}

// ---------------------------------------------------------------------------
// Bets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetStatus {
    Pending,
    Won,
    Lost,
}

impl std::fmt::Display for BetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BetStatus::Pending => "pending",
            BetStatus::Won => "won",
            BetStatus::Lost => "lost",
        };
        write!(f, "{s}")
    }
}

/// Terminal outcome an admin assigns to a pending bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetOutcome {
    Won,
    Lost,
}

impl From<BetOutcome> for BetStatus {
    fn from(outcome: BetOutcome) -> Self {
        match outcome {
            BetOutcome::Won => BetStatus::Won,
            BetOutcome::Lost => BetStatus::Lost,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
    pub id: u64,
    /// Account email of the bettor.
    pub user_id: String,
    pub user_name: String,
    pub event_id: u64,
    pub event_title: String,
    pub selection: String,
    /// Odds as displayed at placement time.
    pub odds: String,
    pub amount: f64,
    /// amount × parsed(odds), fixed at placement. Never recomputed.
    pub potential_win: f64,
    pub status: BetStatus,
    pub timestamp_ms: u64,
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Deposit,
    Withdraw,
}

impl std::fmt::Display for TxKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TxKind::Deposit => "deposit",
            TxKind::Withdraw => "withdraw",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TxStatus::Pending => "pending",
            TxStatus::Approved => "approved",
            TxStatus::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

/// Admin decision on a pending transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxDecision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    pub user_id: String,
    pub user_name: String,
    pub kind: TxKind,
    pub amount: f64,
    pub status: TxStatus,
    pub timestamp_ms: u64,
    /// Data-URL payload of the payment receipt screenshot. Deposits only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_image: Option<String>,
    /// Payout destination. Withdrawals only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    /// Admin notes recorded at resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Currency configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencySettings {
    pub currency: String,
    pub symbol: String,
    /// 1 unit of `currency` expressed in each listed currency.
    pub exchange_rates: BTreeMap<String, f64>,
    pub min_deposit: f64,
    pub max_deposit: f64,
    pub min_withdraw: f64,
    pub max_withdraw: f64,
    /// Collection number shown to users for deposits.
    pub gcash_number: String,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Why a ledger entry moved a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerReason {
    /// Starting balance granted at registration or demo seeding.
    Seed,
    /// Stake debited when a bet is placed.
    BetStake,
    /// Winnings credited when a bet is marked won.
    BetPayout,
    /// Deposit credited on admin approval.
    DepositCredit,
    /// Withdrawal amount held (debited) at request time.
    WithdrawHold,
    /// Held withdrawal refunded on admin rejection.
    WithdrawRefund,
}

impl std::fmt::Display for LedgerReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LedgerReason::Seed => "seed",
            LedgerReason::BetStake => "bet_stake",
            LedgerReason::BetPayout => "bet_payout",
            LedgerReason::DepositCredit => "deposit_credit",
            LedgerReason::WithdrawHold => "withdraw_hold",
            LedgerReason::WithdrawRefund => "withdraw_refund",
        };
        write!(f, "{s}")
    }
}

/// One balance movement. A user's balance is the sum of their entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub seq: u64,
    /// Signed: credits positive, debits negative.
    pub amount: f64,
    pub reason: LedgerReason,
    /// Bet or transaction id this entry settles, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<u64>,
    pub timestamp_ms: u64,
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Millisecond UTC epoch timestamp.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
