//! Demo seed data: currency defaults, betting options, live streams, and the
//! demo user account. All of it is in-memory and rebuilt on every start.

use std::collections::BTreeMap;

use tracing::info;

use crate::config::{DEMO_USER_BALANCE, DEMO_USER_EMAIL, DEMO_USER_NAME, DEMO_USER_PASSWORD};
use crate::error::Result;
use crate::ledger::Ledger;
use crate::session::{Account, SessionStore};
use crate::state::SiteStore;
use crate::types::{now_ms, BettingOption, CurrencySettings, LedgerReason, LiveStream, StreamStatus};

pub fn default_currency() -> CurrencySettings {
    let mut exchange_rates = BTreeMap::new();
    exchange_rates.insert("USD".to_string(), 0.0179);
    exchange_rates.insert("EUR".to_string(), 0.0165);
    exchange_rates.insert("GBP".to_string(), 0.0141);
    exchange_rates.insert("JPY".to_string(), 2.65);

    CurrencySettings {
        currency: "PHP".to_string(),
        symbol: "₱".to_string(),
        exchange_rates,
        min_deposit: 100.0,
        max_deposit: 50_000.0,
        min_withdraw: 300.0,
        max_withdraw: 50_000.0,
        gcash_number: "09171234567".to_string(),
    }
}

/// Seeds the demo betting options and their live streams.
pub fn seed_site(store: &SiteStore) {
    let basketball = BettingOption {
        id: store.alloc_id(),
        title: "Manila Kings vs Cebu Sharks".to_string(),
        description: "Local league basketball — game 3 of the finals series.".to_string(),
        option1: "Manila Kings".to_string(),
        option2: "Cebu Sharks".to_string(),
        odds1: "1.85".to_string(),
        odds2: "2.10".to_string(),
        live_stream: true,
        active: true,
    };
    let boxing = BettingOption {
        id: store.alloc_id(),
        title: "Reyes vs Santos".to_string(),
        description: "Undercard bout, 10 rounds, lightweight.".to_string(),
        option1: "Reyes".to_string(),
        option2: "Santos".to_string(),
        odds1: "1.55".to_string(),
        odds2: "2.60".to_string(),
        live_stream: true,
        active: true,
    };
    let esports = BettingOption {
        id: store.alloc_id(),
        title: "Team Hydra vs Team Titan".to_string(),
        description: "Best of 5 — grand finals.".to_string(),
        option1: "Team Hydra".to_string(),
        option2: "Team Titan".to_string(),
        odds1: "2.25".to_string(),
        odds2: "1.70".to_string(),
        live_stream: false,
        active: false,
    };

    store.add_stream(LiveStream {
        id: store.alloc_id(),
        name: basketball.title.clone(),
        status: StreamStatus::Live,
        viewers: 1243,
        quality: "720p".to_string(),
    });
    store.add_stream(LiveStream {
        id: store.alloc_id(),
        name: boxing.title.clone(),
        status: StreamStatus::Offline,
        viewers: 0,
        quality: "480p".to_string(),
    });

    store.add_option(basketball);
    store.add_option(boxing);
    store.add_option(esports);
}

/// Seeds the demo user account with its starting balance.
pub fn seed_accounts(sessions: &SessionStore, ledger: &Ledger) -> Result<()> {
    sessions.add_account(Account {
        name: DEMO_USER_NAME.to_string(),
        email: DEMO_USER_EMAIL.to_string(),
        password: DEMO_USER_PASSWORD.to_string(),
        created_at_ms: now_ms(),
    })?;
    ledger.credit(DEMO_USER_EMAIL, DEMO_USER_BALANCE, LedgerReason::Seed, None);
    info!(
        email = DEMO_USER_EMAIL,
        balance = DEMO_USER_BALANCE,
        "demo account seeded"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_populates_options_and_streams() {
        let store = SiteStore::new(default_currency());
        seed_site(&store);
        // Inactive option is hidden from the public listing.
        assert_eq!(store.active_options().len(), 2);
        assert_eq!(store.all_options().len(), 3);
        assert_eq!(store.streams().len(), 2);
    }

    #[test]
    fn demo_account_gets_starting_balance() {
        let sessions = SessionStore::new("admin".to_string(), "admin123".to_string());
        let ledger = Ledger::new();
        seed_accounts(&sessions, &ledger).unwrap();
        assert!((ledger.balance(DEMO_USER_EMAIL) - DEMO_USER_BALANCE).abs() < 1e-9);
        assert!(sessions.get_account(DEMO_USER_EMAIL).is_some());
    }
}
