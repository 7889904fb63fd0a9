//! Identity collaborator.
//!
//! Authentication is an external service; the shop only needs the signed-in
//! account's uid and email, and a way to hear about sign-in and sign-out.
//! [`MemoryIdentity`] keeps accounts in process with Argon2id password hashes.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use std::collections::BTreeMap;
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AccountConfig;
use crate::types::UserId;

/// authenticated account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: UserId,
    pub email: String,
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("email already registered: {email}")]
    EmailInUse { email: String },

    #[error("password must be at least {min_len} characters long")]
    WeakPassword { min_len: usize },

    #[error("invalid email address: {email}")]
    InvalidEmail { email: String },

    #[error("identity service unavailable: {message}")]
    Unavailable { message: String },
}

pub trait IdentityProvider: Send + Sync {
    fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    /// create the account and sign it in
    fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    fn sign_out(&self) -> Result<(), AuthError>;

    fn current(&self) -> Option<Identity>;

    /// receiver that observes every sign-in and sign-out
    fn on_identity_change(&self) -> watch::Receiver<Option<Identity>>;
}

struct Account {
    uid: UserId,
    email: String,
    password_hash: String,
}

pub struct MemoryIdentity {
    accounts: Mutex<BTreeMap<String, Account>>,
    current: watch::Sender<Option<Identity>>,
    min_password_len: usize,
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::Unavailable {
            message: err.to_string(),
        })
}

fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|err| AuthError::Unavailable {
        message: err.to_string(),
    })?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(err) => Err(AuthError::Unavailable {
            message: err.to_string(),
        }),
    }
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(AuthError::InvalidEmail { email })
    }
}

impl MemoryIdentity {
    pub fn new(config: &AccountConfig) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            accounts: Mutex::new(BTreeMap::new()),
            current,
            min_password_len: config.min_password_len,
        }
    }

    fn accounts(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Account>>, AuthError> {
        self.accounts.lock().map_err(|_| AuthError::Unavailable {
            message: "account table lock poisoned".to_string(),
        })
    }

    /// create an account without signing it in (provisioning staff accounts)
    pub fn create_account(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = normalize_email(email)?;
        if password.chars().count() < self.min_password_len {
            return Err(AuthError::WeakPassword {
                min_len: self.min_password_len,
            });
        }
        let mut accounts = self.accounts()?;
        if accounts.contains_key(&email) {
            return Err(AuthError::EmailInUse { email });
        }
        let account = Account {
            uid: UserId::new(format!("uid-{}", Uuid::new_v4().simple())),
            email: email.clone(),
            password_hash: hash_password(password)?,
        };
        let identity = Identity {
            uid: account.uid.clone(),
            email: account.email.clone(),
        };
        accounts.insert(email, account);
        info!(uid = %identity.uid, "account created");
        Ok(identity)
    }
}

impl IdentityProvider for MemoryIdentity {
    fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = normalize_email(email).map_err(|_| AuthError::InvalidCredentials)?;
        let identity = {
            let accounts = self.accounts()?;
            let account = accounts.get(&email).ok_or(AuthError::InvalidCredentials)?;
            if !verify_password(password, &account.password_hash)? {
                warn!(uid = %account.uid, "rejected sign-in");
                return Err(AuthError::InvalidCredentials);
            }
            Identity {
                uid: account.uid.clone(),
                email: account.email.clone(),
            }
        };
        self.current.send_replace(Some(identity.clone()));
        info!(uid = %identity.uid, "signed in");
        Ok(identity)
    }

    fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let identity = self.create_account(email, password)?;
        self.current.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    fn sign_out(&self) -> Result<(), AuthError> {
        if let Some(previous) = self.current.send_replace(None) {
            info!(uid = %previous.uid, "signed out");
        }
        Ok(())
    }

    fn current(&self) -> Option<Identity> {
        self.current.borrow().clone()
    }

    fn on_identity_change(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn provider() -> MemoryIdentity {
        MemoryIdentity::new(&AccountConfig { min_password_len: 6 })
    }

    #[test]
    fn test_sign_up_then_sign_in() {
        let identity = provider();
        let created = identity.sign_up("Siti@Example.com", "rahasia1").unwrap();
        assert_eq!(created.email, "siti@example.com");
        assert_eq!(identity.current(), Some(created.clone()));

        identity.sign_out().unwrap();
        assert_eq!(identity.current(), None);

        let again = identity.sign_in("siti@example.com", "rahasia1").unwrap();
        assert_eq!(again.uid, created.uid);
    }

    #[test]
    fn test_rejections() {
        let identity = provider();
        identity.create_account("budi@example.com", "rahasia1").unwrap();

        assert_matches!(
            identity.sign_in("budi@example.com", "salah123"),
            Err(AuthError::InvalidCredentials)
        );
        assert_matches!(
            identity.sign_in("nobody@example.com", "rahasia1"),
            Err(AuthError::InvalidCredentials)
        );
        assert_matches!(
            identity.sign_up("budi@example.com", "rahasia1"),
            Err(AuthError::EmailInUse { .. })
        );
        assert_matches!(
            identity.sign_up("new@example.com", "123"),
            Err(AuthError::WeakPassword { min_len: 6 })
        );
        assert_matches!(
            identity.sign_up("not-an-email", "rahasia1"),
            Err(AuthError::InvalidEmail { .. })
        );
        // provisioning never signs anyone in
        assert_eq!(identity.current(), None);
    }

    #[tokio::test]
    async fn test_identity_changes_are_observed() {
        let identity = provider();
        let mut changes = identity.on_identity_change();

        let created = identity.sign_up("rudi@example.com", "rahasia1").unwrap();
        changes.changed().await.unwrap();
        assert_eq!(*changes.borrow_and_update(), Some(created));

        identity.sign_out().unwrap();
        changes.changed().await.unwrap();
        assert_eq!(*changes.borrow_and_update(), None);
    }
}
