use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::api::health::HealthState;
use crate::config::{CHANNEL_CAPACITY, MIN_PHONE_LEN};
use crate::error::{AppError, Result};
use crate::ledger::Ledger;
use crate::state::SiteStore;
use crate::types::{
    now_ms, Bet, BetOutcome, BetStatus, LedgerReason, Transaction, TxDecision, TxKind, TxStatus,
};

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Balance-mutating operations, submitted over the command channel and
/// applied serially by the engine task. The serialization is what makes the
/// debit/credit read-modify-write sequences safe without per-user locks.
pub enum Command {
    PlaceBet {
        user_id: String,
        user_name: String,
        option_id: u64,
        selection: String,
        amount: f64,
        reply: oneshot::Sender<Result<Bet>>,
    },
    SettleBet {
        bet_id: u64,
        outcome: BetOutcome,
        reply: oneshot::Sender<Result<Bet>>,
    },
    RequestDeposit {
        user_id: String,
        user_name: String,
        amount: f64,
        receipt_image: Option<String>,
        reply: oneshot::Sender<Result<Transaction>>,
    },
    RequestWithdraw {
        user_id: String,
        user_name: String,
        amount: f64,
        phone_number: String,
        reply: oneshot::Sender<Result<Transaction>>,
    },
    ResolveTransaction {
        tx_id: u64,
        decision: TxDecision,
        notes: Option<String>,
        reply: oneshot::Sender<Result<Transaction>>,
    },
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cheap clonable front to the engine task. API handlers call these async
/// methods; each submits one command and awaits its oneshot reply.
#[derive(Clone)]
pub struct SettlementHandle {
    tx: mpsc::Sender<Command>,
}

impl SettlementHandle {
    pub async fn place_bet(
        &self,
        user_id: String,
        user_name: String,
        option_id: u64,
        selection: String,
        amount: f64,
    ) -> Result<Bet> {
        let (reply, rx) = oneshot::channel();
        self.submit(
            Command::PlaceBet { user_id, user_name, option_id, selection, amount, reply },
            rx,
        )
        .await
    }

    pub async fn settle_bet(&self, bet_id: u64, outcome: BetOutcome) -> Result<Bet> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::SettleBet { bet_id, outcome, reply }, rx).await
    }

    pub async fn request_deposit(
        &self,
        user_id: String,
        user_name: String,
        amount: f64,
        receipt_image: Option<String>,
    ) -> Result<Transaction> {
        let (reply, rx) = oneshot::channel();
        self.submit(
            Command::RequestDeposit { user_id, user_name, amount, receipt_image, reply },
            rx,
        )
        .await
    }

    pub async fn request_withdraw(
        &self,
        user_id: String,
        user_name: String,
        amount: f64,
        phone_number: String,
    ) -> Result<Transaction> {
        let (reply, rx) = oneshot::channel();
        self.submit(
            Command::RequestWithdraw { user_id, user_name, amount, phone_number, reply },
            rx,
        )
        .await
    }

    pub async fn resolve_transaction(
        &self,
        tx_id: u64,
        decision: TxDecision,
        notes: Option<String>,
    ) -> Result<Transaction> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::ResolveTransaction { tx_id, decision, notes, reply }, rx)
            .await
    }

    async fn submit<T>(&self, cmd: Command, rx: oneshot::Receiver<Result<T>>) -> Result<T> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| AppError::Engine("command channel closed".to_string()))?;
        rx.await
            .map_err(|_| AppError::Engine("engine dropped the reply".to_string()))?
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The single authoritative writer for bets, transactions, and the ledger.
/// Runs as a dedicated task consuming commands in order; status transitions
/// go through the store's pending-only guards, so a record can be settled at
/// most once no matter how many times a command for it arrives.
pub struct SettlementEngine {
    store: Arc<SiteStore>,
    ledger: Arc<Ledger>,
    health: Arc<HealthState>,
    rx: mpsc::Receiver<Command>,
}

impl SettlementEngine {
    pub fn new(
        store: Arc<SiteStore>,
        ledger: Arc<Ledger>,
        health: Arc<HealthState>,
    ) -> (Self, SettlementHandle) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        (Self { store, ledger, health, rx }, SettlementHandle { tx })
    }

    pub async fn run(mut self) {
        self.health.set_engine_running(true);
        while let Some(cmd) = self.rx.recv().await {
            self.apply(cmd);
            self.health.inc_commands_processed();
            self.health.set_last_command_at_ms(now_ms());
        }
        self.health.set_engine_running(false);
        warn!("settlement engine stopped: command channel closed");
    }

    fn apply(&self, cmd: Command) {
        match cmd {
            Command::PlaceBet { user_id, user_name, option_id, selection, amount, reply } => {
                let _ = reply.send(self.place_bet(user_id, user_name, option_id, selection, amount));
            }
            Command::SettleBet { bet_id, outcome, reply } => {
                let _ = reply.send(self.settle_bet(bet_id, outcome));
            }
            Command::RequestDeposit { user_id, user_name, amount, receipt_image, reply } => {
                let _ = reply.send(self.request_deposit(user_id, user_name, amount, receipt_image));
            }
            Command::RequestWithdraw { user_id, user_name, amount, phone_number, reply } => {
                let _ = reply.send(self.request_withdraw(user_id, user_name, amount, phone_number));
            }
            Command::ResolveTransaction { tx_id, decision, notes, reply } => {
                let _ = reply.send(self.resolve_transaction(tx_id, decision, notes));
            }
        }
    }

    // -- bet placement ------------------------------------------------------

    /// Appends a pending bet and debits the stake in the same command.
    /// The stake is gone immediately — a later `lost` settlement changes
    /// nothing, only `won` credits the precomputed potential win back.
    fn place_bet(
        &self,
        user_id: String,
        user_name: String,
        option_id: u64,
        selection: String,
        amount: f64,
    ) -> Result<Bet> {
        let option = self.store.get_option(option_id).ok_or(AppError::NotFound {
            kind: "option",
            id: option_id.to_string(),
        })?;
        if !option.active {
            return Err(AppError::Validation(format!(
                "betting option '{}' is no longer open",
                option.title
            )));
        }
        let odds_str = option.odds_for(&selection).ok_or_else(|| {
            AppError::Validation(format!(
                "selection '{selection}' does not match '{}' or '{}'",
                option.option1, option.option2
            ))
        })?;
        if !amount.is_finite() || amount <= 0.0 {
            return Err(AppError::Validation(
                "bet amount must be a positive number".to_string(),
            ));
        }
        let odds: f64 = odds_str.trim().parse().map_err(|_| {
            AppError::Validation(format!("odds '{odds_str}' are not numeric"))
        })?;

        let bet_id = self.store.alloc_id();
        // Debit first — if the balance doesn't cover the stake, no bet record
        // is ever created.
        let balance = self
            .ledger
            .debit(&user_id, amount, LedgerReason::BetStake, Some(bet_id))?;

        let bet = Bet {
            id: bet_id,
            user_id,
            user_name,
            event_id: option.id,
            event_title: option.title.clone(),
            selection,
            odds: odds_str.to_string(),
            amount,
            potential_win: amount * odds,
            status: BetStatus::Pending,
            timestamp_ms: now_ms(),
        };
        self.store.add_bet(bet.clone());

        info!(
            bet_id = bet.id,
            user = %bet.user_id,
            amount = bet.amount,
            potential_win = bet.potential_win,
            balance,
            "bet placed on '{}' ({})",
            bet.event_title,
            bet.selection,
        );
        Ok(bet)
    }

    // -- bet settlement -----------------------------------------------------

    fn settle_bet(&self, bet_id: u64, outcome: BetOutcome) -> Result<Bet> {
        let bet = self.store.transition_bet(bet_id, outcome.into())?;
        match outcome {
            BetOutcome::Won => {
                // Credit goes to the bet owner's ledger regardless of who is
                // logged in anywhere.
                let balance = self.ledger.credit(
                    &bet.user_id,
                    bet.potential_win,
                    LedgerReason::BetPayout,
                    Some(bet.id),
                );
                info!(
                    bet_id = bet.id,
                    user = %bet.user_id,
                    payout = bet.potential_win,
                    balance,
                    "bet settled as won"
                );
            }
            BetOutcome::Lost => {
                // Stake was debited at placement; nothing to move.
                info!(bet_id = bet.id, user = %bet.user_id, "bet settled as lost");
            }
        }
        Ok(bet)
    }

    // -- transaction requests -----------------------------------------------

    /// Deposits credit nothing at request time — funds arrive only when an
    /// admin approves the receipt.
    fn request_deposit(
        &self,
        user_id: String,
        user_name: String,
        amount: f64,
        receipt_image: Option<String>,
    ) -> Result<Transaction> {
        if receipt_image.as_deref().map_or(true, |r| r.is_empty()) {
            return Err(AppError::Validation(
                "a receipt image is required to verify the deposit".to_string(),
            ));
        }
        if !amount.is_finite() {
            return Err(AppError::Validation("deposit amount must be a number".to_string()));
        }
        let currency = self.store.currency();
        if amount < currency.min_deposit {
            return Err(AppError::Validation(format!(
                "minimum deposit is {}{}",
                currency.symbol, currency.min_deposit
            )));
        }
        if amount > currency.max_deposit {
            return Err(AppError::Validation(format!(
                "maximum deposit is {}{}",
                currency.symbol, currency.max_deposit
            )));
        }

        let tx = Transaction {
            id: self.store.alloc_id(),
            user_id,
            user_name,
            kind: TxKind::Deposit,
            amount,
            status: TxStatus::Pending,
            timestamp_ms: now_ms(),
            receipt_image,
            phone_number: None,
            notes: None,
        };
        self.store.add_transaction(tx.clone());
        info!(tx_id = tx.id, user = %tx.user_id, amount, "deposit requested");
        Ok(tx)
    }

    /// Withdrawals debit at request time (optimistic hold); rejection
    /// refunds the hold, approval moves nothing further.
    fn request_withdraw(
        &self,
        user_id: String,
        user_name: String,
        amount: f64,
        phone_number: String,
    ) -> Result<Transaction> {
        if phone_number.trim().len() < MIN_PHONE_LEN {
            return Err(AppError::Validation(
                "please enter a valid GCash phone number".to_string(),
            ));
        }
        if !amount.is_finite() {
            return Err(AppError::Validation("withdrawal amount must be a number".to_string()));
        }
        let balance = self.ledger.balance(&user_id);
        if amount > balance {
            return Err(AppError::InsufficientFunds { balance, amount });
        }
        let currency = self.store.currency();
        if amount < currency.min_withdraw {
            return Err(AppError::Validation(format!(
                "minimum withdrawal is {}{}",
                currency.symbol, currency.min_withdraw
            )));
        }
        if amount > currency.max_withdraw {
            return Err(AppError::Validation(format!(
                "maximum withdrawal is {}{}",
                currency.symbol, currency.max_withdraw
            )));
        }

        let tx_id = self.store.alloc_id();
        let balance = self
            .ledger
            .debit(&user_id, amount, LedgerReason::WithdrawHold, Some(tx_id))?;

        let tx = Transaction {
            id: tx_id,
            user_id,
            user_name,
            kind: TxKind::Withdraw,
            amount,
            status: TxStatus::Pending,
            timestamp_ms: now_ms(),
            receipt_image: None,
            phone_number: Some(phone_number),
            notes: None,
        };
        self.store.add_transaction(tx.clone());
        info!(tx_id = tx.id, user = %tx.user_id, amount, balance, "withdrawal requested, amount held");
        Ok(tx)
    }

    // -- transaction resolution ---------------------------------------------

    fn resolve_transaction(
        &self,
        tx_id: u64,
        decision: TxDecision,
        notes: Option<String>,
    ) -> Result<Transaction> {
        let status = match decision {
            TxDecision::Approve => TxStatus::Approved,
            TxDecision::Reject => TxStatus::Rejected,
        };
        let tx = self.store.transition_transaction(tx_id, status, notes)?;

        match (decision, tx.kind) {
            (TxDecision::Approve, TxKind::Deposit) => {
                let balance = self.ledger.credit(
                    &tx.user_id,
                    tx.amount,
                    LedgerReason::DepositCredit,
                    Some(tx.id),
                );
                info!(tx_id = tx.id, user = %tx.user_id, amount = tx.amount, balance, "deposit approved");
            }
            (TxDecision::Reject, TxKind::Withdraw) => {
                let balance = self.ledger.credit(
                    &tx.user_id,
                    tx.amount,
                    LedgerReason::WithdrawRefund,
                    Some(tx.id),
                );
                info!(tx_id = tx.id, user = %tx.user_id, amount = tx.amount, balance, "withdrawal rejected, hold refunded");
            }
            // Approved withdrawals were debited at request time; rejected
            // deposits never moved funds.
            (TxDecision::Approve, TxKind::Withdraw) => {
                info!(tx_id = tx.id, user = %tx.user_id, amount = tx.amount, "withdrawal approved");
            }
            (TxDecision::Reject, TxKind::Deposit) => {
                info!(tx_id = tx.id, user = %tx.user_id, "deposit rejected");
            }
        }
        Ok(tx)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BettingOption, CurrencySettings};

    const USER: &str = "user@example.com";

    struct Harness {
        store: Arc<SiteStore>,
        ledger: Arc<Ledger>,
        handle: SettlementHandle,
        option_id: u64,
    }

    fn harness() -> Harness {
        let store = SiteStore::new(CurrencySettings {
            currency: "PHP".to_string(),
            symbol: "₱".to_string(),
            exchange_rates: Default::default(),
            min_deposit: 100.0,
            max_deposit: 50_000.0,
            min_withdraw: 300.0,
            max_withdraw: 50_000.0,
            gcash_number: "09171234567".to_string(),
        });
        let option_id = store.alloc_id();
        store.add_option(BettingOption {
            id: option_id,
            title: "Team A vs Team B".to_string(),
            description: String::new(),
            option1: "Team A".to_string(),
            option2: "Team B".to_string(),
            odds1: "2.5".to_string(),
            odds2: "1.8".to_string(),
            live_stream: false,
            active: true,
        });

        let ledger = Ledger::new();
        ledger.credit(USER, 1250.0, LedgerReason::Seed, None);

        let health = Arc::new(HealthState::new());
        let (engine, handle) = SettlementEngine::new(Arc::clone(&store), Arc::clone(&ledger), health);
        tokio::spawn(engine.run());

        Harness { store, ledger, handle, option_id }
    }

    async fn place(h: &Harness, amount: f64) -> Result<Bet> {
        h.handle
            .place_bet(
                USER.to_string(),
                "Demo User".to_string(),
                h.option_id,
                "Team A".to_string(),
                amount,
            )
            .await
    }

    #[tokio::test]
    async fn placement_debits_stake_and_fixes_potential_win() {
        let h = harness();
        let bet = place(&h, 100.0).await.unwrap();

        assert_eq!(bet.status, BetStatus::Pending);
        assert_eq!(bet.odds, "2.5");
        assert!((bet.potential_win - 250.0).abs() < 1e-9);
        assert!((h.ledger.balance(USER) - 1150.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn placement_rejects_overdraft_without_state_change() {
        let h = harness();
        let err = place(&h, 5000.0).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientFunds { .. }));
        assert_eq!(h.store.bet_count(), 0);
        assert!((h.ledger.balance(USER) - 1250.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn placement_rejects_unknown_selection() {
        let h = harness();
        let err = h
            .handle
            .place_bet(
                USER.to_string(),
                "Demo User".to_string(),
                h.option_id,
                "Team C".to_string(),
                50.0,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(h.store.bet_count(), 0);
    }

    #[tokio::test]
    async fn won_bet_credits_once_and_only_once() {
        let h = harness();
        let bet = place(&h, 100.0).await.unwrap();

        let settled = h.handle.settle_bet(bet.id, BetOutcome::Won).await.unwrap();
        assert_eq!(settled.status, BetStatus::Won);
        assert!((h.ledger.balance(USER) - 1400.0).abs() < 1e-9);

        // Replaying the settlement must fail and not double-credit.
        let err = h.handle.settle_bet(bet.id, BetOutcome::Won).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadySettled { .. }));
        assert!((h.ledger.balance(USER) - 1400.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn lost_bet_keeps_balance() {
        let h = harness();
        let bet = place(&h, 100.0).await.unwrap();

        let settled = h.handle.settle_bet(bet.id, BetOutcome::Lost).await.unwrap();
        assert_eq!(settled.status, BetStatus::Lost);
        assert!((h.ledger.balance(USER) - 1150.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn deposit_credits_only_on_approval() {
        let h = harness();
        let tx = h
            .handle
            .request_deposit(
                USER.to_string(),
                "Demo User".to_string(),
                500.0,
                Some("data:image/png;base64,xxxx".to_string()),
            )
            .await
            .unwrap();
        // Pending deposit moves nothing.
        assert!((h.ledger.balance(USER) - 1250.0).abs() < 1e-9);

        let resolved = h
            .handle
            .resolve_transaction(tx.id, TxDecision::Approve, Some("verified".to_string()))
            .await
            .unwrap();
        assert_eq!(resolved.status, TxStatus::Approved);
        assert!((h.ledger.balance(USER) - 1750.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn deposit_without_receipt_is_rejected_up_front() {
        let h = harness();
        let err = h
            .handle
            .request_deposit(USER.to_string(), "Demo User".to_string(), 500.0, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(h.store.transaction_count(), 0);
    }

    #[tokio::test]
    async fn rejected_deposit_moves_nothing() {
        let h = harness();
        let tx = h
            .handle
            .request_deposit(
                USER.to_string(),
                "Demo User".to_string(),
                500.0,
                Some("data:image/png;base64,xxxx".to_string()),
            )
            .await
            .unwrap();
        h.handle
            .resolve_transaction(tx.id, TxDecision::Reject, Some("blurry receipt".to_string()))
            .await
            .unwrap();
        assert!((h.ledger.balance(USER) - 1250.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn withdrawal_holds_then_refunds_on_rejection() {
        let h = harness();
        let tx = h
            .handle
            .request_withdraw(
                USER.to_string(),
                "Demo User".to_string(),
                400.0,
                "09171234567".to_string(),
            )
            .await
            .unwrap();
        // Hold taken immediately.
        assert!((h.ledger.balance(USER) - 850.0).abs() < 1e-9);

        h.handle
            .resolve_transaction(tx.id, TxDecision::Reject, None)
            .await
            .unwrap();
        assert!((h.ledger.balance(USER) - 1250.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn approved_withdrawal_moves_nothing_further() {
        let h = harness();
        let tx = h
            .handle
            .request_withdraw(
                USER.to_string(),
                "Demo User".to_string(),
                400.0,
                "09171234567".to_string(),
            )
            .await
            .unwrap();
        h.handle
            .resolve_transaction(tx.id, TxDecision::Approve, None)
            .await
            .unwrap();
        assert!((h.ledger.balance(USER) - 850.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn withdrawal_below_minimum_is_rejected() {
        let h = harness();
        let err = h
            .handle
            .request_withdraw(
                USER.to_string(),
                "Demo User".to_string(),
                200.0,
                "09171234567".to_string(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(h.store.transaction_count(), 0);
        assert!((h.ledger.balance(USER) - 1250.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn deposit_outside_limits_is_rejected() {
        let h = harness();
        let receipt = Some("data:image/png;base64,xxxx".to_string());

        // Below min_deposit (100).
        let err = h
            .handle
            .request_deposit(USER.to_string(), "Demo User".to_string(), 50.0, receipt.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        // Above max_deposit (50_000).
        let err = h
            .handle
            .request_deposit(USER.to_string(), "Demo User".to_string(), 60_000.0, receipt)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        assert_eq!(h.store.transaction_count(), 0);
        assert!((h.ledger.balance(USER) - 1250.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn withdrawal_above_maximum_is_rejected() {
        let h = harness();
        // Top up past max_withdraw so the balance check doesn't fire first.
        h.ledger.credit(USER, 60_000.0, LedgerReason::DepositCredit, None);

        let err = h
            .handle
            .request_withdraw(
                USER.to_string(),
                "Demo User".to_string(),
                55_000.0,
                "09171234567".to_string(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(h.store.transaction_count(), 0);
        assert!((h.ledger.balance(USER) - 61_250.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn withdrawal_requires_plausible_phone_number() {
        let h = harness();
        let err = h
            .handle
            .request_withdraw(USER.to_string(), "Demo User".to_string(), 400.0, "0917".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(h.store.transaction_count(), 0);
    }

    #[tokio::test]
    async fn transaction_resolution_is_one_shot() {
        let h = harness();
        let tx = h
            .handle
            .request_withdraw(
                USER.to_string(),
                "Demo User".to_string(),
                400.0,
                "09171234567".to_string(),
            )
            .await
            .unwrap();
        h.handle
            .resolve_transaction(tx.id, TxDecision::Reject, None)
            .await
            .unwrap();

        // A second rejection must not refund twice.
        let err = h
            .handle
            .resolve_transaction(tx.id, TxDecision::Reject, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadySettled { .. }));
        assert!((h.ledger.balance(USER) - 1250.0).abs() < 1e-9);
    }
}
