use crate::errors::EvalError;
use crate::storage::Store;

/// Balance seeded for a user on first touch.
pub const DEFAULT_STARTING_CREDITS: i64 = 5;

/// Per-user usage counter checked and decremented before a run may start.
#[derive(Clone)]
pub struct CreditGate {
    store: Store,
}

impl CreditGate {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Decrements by exactly one, or rejects with no state change.
    pub fn check_and_consume(&self, user: &str) -> Result<(), EvalError> {
        self.store
            .ensure_user(user, DEFAULT_STARTING_CREDITS)
            .map_err(EvalError::Other)?;
        if self.store.consume_credit(user).map_err(EvalError::Other)? {
            Ok(())
        } else {
            Err(EvalError::InsufficientCredits {
                user: user.to_string(),
            })
        }
    }

    pub fn balance(&self, user: &str) -> anyhow::Result<i64> {
        self.store.ensure_user(user, DEFAULT_STARTING_CREDITS)?;
        self.store.credit_balance(user)
    }

    pub fn grant(&self, user: &str, amount: i64) -> anyhow::Result<()> {
        self.store.grant_credits(user, amount)
    }
}
