//! External collaborators: the staked token and the applications.
//!
//! The engine talks to both through async traits, so a deployment can back
//! them with anything (an RPC client, another ledger). In-memory versions
//! live in [`memory`] for tests and embedding.

use async_trait::async_trait;
use thiserror::Error;
use tstake_core::{Address, Amount};

/// Failure reported by an application callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplicationError {
    /// The application refused the change.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The application could not be reached.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Failure reported by the token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("account {account} holds {balance}, cannot transfer {requested}")]
    InsufficientBalance {
        account: Address,
        balance: Amount,
        requested: Amount,
    },

    #[error("transfer rejected: {0}")]
    Rejected(String),
}

/// An application that draws authorization from staking providers.
///
/// Every method receives the authorization before and after the change.
#[async_trait]
pub trait Application: Send + Sync {
    /// The authorizer raised the application's authorization.
    ///
    /// An error aborts the increase.
    async fn authorization_increased(
        &self,
        provider: &Address,
        from: Amount,
        to: Amount,
    ) -> Result<(), ApplicationError>;

    /// The authorizer asked to lower the authorization to `to`.
    ///
    /// Called before the request is recorded; an error aborts the request.
    /// The application later confirms with `approve_authorization_decrease`.
    async fn authorization_decrease_requested(
        &self,
        provider: &Address,
        from: Amount,
        to: Amount,
    ) -> Result<(), ApplicationError>;

    /// The authorization was lowered by slashing.
    ///
    /// Informational; errors are logged and ignored.
    async fn involuntary_authorization_decrease(
        &self,
        provider: &Address,
        from: Amount,
        to: Amount,
    ) -> Result<(), ApplicationError>;
}

/// The staked token. The engine holds tokens in custody.
#[async_trait]
pub trait Token: Send + Sync {
    /// Pull `amount` from `from` into custody.
    async fn transfer_from(&self, from: &Address, amount: Amount) -> Result<(), TokenError>;

    /// Pay `amount` out of custody to `to`.
    async fn transfer(&self, to: &Address, amount: Amount) -> Result<(), TokenError>;
}

/// In-memory collaborators for tests and embedding.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::RwLock;

    // ─────────────────────────────────────────────────────────────────────────
    // Token
    // ─────────────────────────────────────────────────────────────────────────

    #[derive(Default)]
    struct Ledger {
        balances: HashMap<Address, Amount>,
        custody: Amount,
    }

    /// Token with plain balances and a custody account.
    #[derive(Default)]
    pub struct MemoryToken {
        ledger: RwLock<Ledger>,
        frozen: AtomicBool,
    }

    impl MemoryToken {
        /// Create a token with no balances.
        pub fn new() -> Self {
            Self::default()
        }

        /// Credit `amount` to `account`.
        pub fn mint(&self, account: Address, amount: Amount) {
            if let Ok(mut ledger) = self.ledger.write() {
                *ledger.balances.entry(account).or_insert(0) += amount;
            }
        }

        /// Balance of `account`.
        pub fn balance_of(&self, account: &Address) -> Amount {
            self.ledger
                .read()
                .map(|l| l.balances.get(account).copied().unwrap_or(0))
                .unwrap_or(0)
        }

        /// Tokens held in custody by the engine.
        pub fn custody(&self) -> Amount {
            self.ledger.read().map(|l| l.custody).unwrap_or(0)
        }

        /// Make every transfer fail until unfrozen.
        pub fn set_frozen(&self, frozen: bool) {
            self.frozen.store(frozen, Ordering::SeqCst);
        }

        fn check_frozen(&self) -> Result<(), TokenError> {
            if self.frozen.load(Ordering::SeqCst) {
                return Err(TokenError::Rejected("token is frozen".into()));
            }
            Ok(())
        }

        fn poisoned() -> TokenError {
            TokenError::Rejected("token ledger lock poisoned".into())
        }
    }

    #[async_trait]
    impl Token for MemoryToken {
        async fn transfer_from(&self, from: &Address, amount: Amount) -> Result<(), TokenError> {
            self.check_frozen()?;
            let mut ledger = self.ledger.write().map_err(|_| Self::poisoned())?;
            let balance = ledger.balances.get(from).copied().unwrap_or(0);
            if balance < amount {
                return Err(TokenError::InsufficientBalance {
                    account: *from,
                    balance,
                    requested: amount,
                });
            }
            ledger.balances.insert(*from, balance - amount);
            ledger.custody += amount;
            Ok(())
        }

        async fn transfer(&self, to: &Address, amount: Amount) -> Result<(), TokenError> {
            self.check_frozen()?;
            let mut ledger = self.ledger.write().map_err(|_| Self::poisoned())?;
            if ledger.custody < amount {
                return Err(TokenError::InsufficientBalance {
                    account: Address::ZERO,
                    balance: ledger.custody,
                    requested: amount,
                });
            }
            ledger.custody -= amount;
            *ledger.balances.entry(*to).or_insert(0) += amount;
            Ok(())
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Application
    // ─────────────────────────────────────────────────────────────────────────

    /// A callback received by a [`ScriptedApplication`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ApplicationCall {
        Increased { provider: Address, from: Amount, to: Amount },
        DecreaseRequested { provider: Address, from: Amount, to: Amount },
        InvoluntaryDecrease { provider: Address, from: Amount, to: Amount },
    }

    /// Application that records every callback and can be told to fail.
    #[derive(Default)]
    pub struct ScriptedApplication {
        calls: RwLock<Vec<ApplicationCall>>,
        reject_increases: AtomicBool,
        reject_decrease_requests: AtomicBool,
        reject_involuntary: AtomicBool,
    }

    impl ScriptedApplication {
        /// Create an application that accepts everything.
        pub fn new() -> Self {
            Self::default()
        }

        /// Callbacks received so far, oldest first.
        pub fn calls(&self) -> Vec<ApplicationCall> {
            self.calls.read().map(|c| c.clone()).unwrap_or_default()
        }

        pub fn reject_increases(&self, reject: bool) {
            self.reject_increases.store(reject, Ordering::SeqCst);
        }

        pub fn reject_decrease_requests(&self, reject: bool) {
            self.reject_decrease_requests.store(reject, Ordering::SeqCst);
        }

        pub fn reject_involuntary(&self, reject: bool) {
            self.reject_involuntary.store(reject, Ordering::SeqCst);
        }

        fn record(&self, call: ApplicationCall, reject: &AtomicBool) -> Result<(), ApplicationError> {
            if let Ok(mut calls) = self.calls.write() {
                calls.push(call);
            }
            if reject.load(Ordering::SeqCst) {
                return Err(ApplicationError::Rejected(format!("{:?} refused", call)));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Application for ScriptedApplication {
        async fn authorization_increased(
            &self,
            provider: &Address,
            from: Amount,
            to: Amount,
        ) -> Result<(), ApplicationError> {
            let call = ApplicationCall::Increased { provider: *provider, from, to };
            self.record(call, &self.reject_increases)
        }

        async fn authorization_decrease_requested(
            &self,
            provider: &Address,
            from: Amount,
            to: Amount,
        ) -> Result<(), ApplicationError> {
            let call = ApplicationCall::DecreaseRequested { provider: *provider, from, to };
            self.record(call, &self.reject_decrease_requests)
        }

        async fn involuntary_authorization_decrease(
            &self,
            provider: &Address,
            from: Amount,
            to: Amount,
        ) -> Result<(), ApplicationError> {
            let call = ApplicationCall::InvoluntaryDecrease { provider: *provider, from, to };
            self.record(call, &self.reject_involuntary)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_memory_token_custody() {
            let token = MemoryToken::new();
            let alice = Address::derive("alice");
            token.mint(alice, 100);

            token.transfer_from(&alice, 60).await.unwrap();
            assert_eq!(token.balance_of(&alice), 40);
            assert_eq!(token.custody(), 60);

            assert!(matches!(
                token.transfer_from(&alice, 41).await,
                Err(TokenError::InsufficientBalance { balance: 40, .. })
            ));

            token.transfer(&alice, 10).await.unwrap();
            assert_eq!(token.balance_of(&alice), 50);
            assert_eq!(token.custody(), 50);
        }

        #[tokio::test]
        async fn test_frozen_token_rejects() {
            let token = MemoryToken::new();
            let alice = Address::derive("alice");
            token.mint(alice, 100);
            token.set_frozen(true);
            assert!(token.transfer_from(&alice, 1).await.is_err());
        }

        #[tokio::test]
        async fn test_scripted_application_records_rejected_calls() {
            let app = ScriptedApplication::new();
            let provider = Address::derive("provider");
            app.reject_increases(true);

            assert!(app.authorization_increased(&provider, 0, 5).await.is_err());
            app.involuntary_authorization_decrease(&provider, 5, 3).await.unwrap();
            assert_eq!(
                app.calls(),
                vec![
                    ApplicationCall::Increased { provider, from: 0, to: 5 },
                    ApplicationCall::InvoluntaryDecrease { provider, from: 5, to: 3 },
                ]
            );
        }
    }
}
