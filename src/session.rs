use std::sync::Arc;

use dashmap::{DashMap, Entry};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::types::now_ms;

/// A registered account. Demo system — passwords are stored as-is.
#[derive(Debug, Clone)]
pub struct Account {
    pub name: String,
    pub email: String,
    pub password: String,
    pub created_at_ms: u64,
}

/// Server-issued user session. The token is the only thing the client holds;
/// balances live in the ledger, not here.
#[derive(Debug, Clone, Serialize)]
pub struct UserSession {
    pub token: String,
    pub email: String,
    pub name: String,
    pub issued_at_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminSession {
    pub token: String,
    pub username: String,
    pub issued_at_ms: u64,
}

/// Accounts plus live user/admin sessions, keyed by opaque tokens.
pub struct SessionStore {
    /// email → account
    accounts: DashMap<String, Account>,
    /// token → user session
    user_sessions: DashMap<String, UserSession>,
    /// token → admin session
    admin_sessions: DashMap<String, AdminSession>,
    admin_username: String,
    admin_password: String,
}

impl SessionStore {
    pub fn new(admin_username: String, admin_password: String) -> Arc<Self> {
        Arc::new(Self {
            accounts: DashMap::new(),
            user_sessions: DashMap::new(),
            admin_sessions: DashMap::new(),
            admin_username,
            admin_password,
        })
    }

    // -- accounts -----------------------------------------------------------

    /// Inserts atomically via the entry API — two concurrent registrations
    /// for the same email cannot both succeed.
    pub fn add_account(&self, account: Account) -> Result<()> {
        match self.accounts.entry(account.email.clone()) {
            Entry::Occupied(_) => Err(AppError::AccountExists(account.email)),
            Entry::Vacant(slot) => {
                slot.insert(account);
                Ok(())
            }
        }
    }

    pub fn get_account(&self, email: &str) -> Option<Account> {
        self.accounts.get(email).map(|a| a.clone())
    }

    pub fn verify_credentials(&self, email: &str, password: &str) -> Result<Account> {
        let account = self.get_account(email).ok_or(AppError::InvalidCredentials)?;
        if account.password != password {
            return Err(AppError::InvalidCredentials);
        }
        Ok(account)
    }

    // -- user sessions ------------------------------------------------------

    pub fn issue_user_session(&self, account: &Account) -> UserSession {
        let session = UserSession {
            token: Uuid::new_v4().to_string(),
            email: account.email.clone(),
            name: account.name.clone(),
            issued_at_ms: now_ms(),
        };
        self.user_sessions
            .insert(session.token.clone(), session.clone());
        session
    }

    pub fn user_session(&self, token: &str) -> Option<UserSession> {
        self.user_sessions.get(token).map(|s| s.clone())
    }

    pub fn revoke_user_session(&self, token: &str) {
        self.user_sessions.remove(token);
    }

    // -- admin sessions -----------------------------------------------------

    pub fn admin_login(&self, username: &str, password: &str) -> Result<AdminSession> {
        if username != self.admin_username || password != self.admin_password {
            return Err(AppError::InvalidCredentials);
        }
        let session = AdminSession {
            token: Uuid::new_v4().to_string(),
            username: username.to_string(),
            issued_at_ms: now_ms(),
        };
        self.admin_sessions
            .insert(session.token.clone(), session.clone());
        Ok(session)
    }

    pub fn admin_session(&self, token: &str) -> Option<AdminSession> {
        self.admin_sessions.get(token).map(|s| s.clone())
    }

    pub fn revoke_admin_session(&self, token: &str) {
        self.admin_sessions.remove(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NEW_USER_BALANCE;
    use crate::ledger::Ledger;
    use crate::types::LedgerReason;

    fn test_account() -> Account {
        Account {
            name: "Demo User".to_string(),
            email: "user@example.com".to_string(),
            password: "password".to_string(),
            created_at_ms: now_ms(),
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let sessions = SessionStore::new("admin".to_string(), "admin123".to_string());
        sessions.add_account(test_account()).unwrap();
        let err = sessions.add_account(test_account()).unwrap_err();
        assert!(matches!(err, AppError::AccountExists(_)));
    }

    #[test]
    fn login_issues_and_revokes_tokens() {
        let sessions = SessionStore::new("admin".to_string(), "admin123".to_string());
        sessions.add_account(test_account()).unwrap();

        assert!(sessions.verify_credentials("user@example.com", "wrong").is_err());
        let account = sessions
            .verify_credentials("user@example.com", "password")
            .unwrap();

        let session = sessions.issue_user_session(&account);
        assert_eq!(
            sessions.user_session(&session.token).unwrap().email,
            "user@example.com"
        );

        sessions.revoke_user_session(&session.token);
        assert!(sessions.user_session(&session.token).is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_registration_admits_one_account() {
        let sessions = SessionStore::new("admin".to_string(), "admin123".to_string());
        let ledger = Ledger::new();

        // Race several registrations for the same email; exactly one may
        // win the slot and take the seed credit.
        let mut handles = Vec::new();
        for i in 0..8 {
            let sessions = Arc::clone(&sessions);
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                let mut account = test_account();
                account.name = format!("Racer {i}");
                if sessions.add_account(account).is_ok() {
                    ledger.credit("user@example.com", NEW_USER_BALANCE, LedgerReason::Seed, None);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!((ledger.balance("user@example.com") - NEW_USER_BALANCE).abs() < 1e-9);
        assert_eq!(ledger.entries_for("user@example.com").len(), 1);
        assert!(sessions.get_account("user@example.com").is_some());
    }

    #[test]
    fn admin_login_checks_configured_credentials() {
        let sessions = SessionStore::new("admin".to_string(), "admin123".to_string());
        assert!(sessions.admin_login("admin", "nope").is_err());
        let session = sessions.admin_login("admin", "admin123").unwrap();
        assert!(sessions.admin_session(&session.token).is_some());
    }
}
