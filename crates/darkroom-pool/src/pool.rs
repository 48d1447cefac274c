use time::{Duration, OffsetDateTime};

use crate::state::{ApiKey, Validity};

/// Quota back-off window applied when the remote service reports exhaustion
/// and gives no explicit retry hint.
pub const DEFAULT_COOLDOWN: Duration = Duration::seconds(60);

/// Outcome of one attempt with one key, as classified by the remote adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    Success,
    /// The key itself is bad. Terminal for this key.
    AuthFailure,
    /// Quota exhausted; the key self-heals after the cooldown window.
    QuotaFailure { retry_after: Option<Duration> },
    /// Not attributable to the key. The pool does not penalize it.
    OtherFailure,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("no such key in the pool")]
    UnknownKey,
    #[error("key is marked invalid; remove and re-add it to retry")]
    KeyInvalid,
}

/// In-memory key pool. Plain synchronous state with an explicit clock
/// parameter; persistence is the caller's job via [`crate::PoolStore`].
///
/// Invariants: secrets are unique; at most one key is preferred, and a
/// non-empty pool always has exactly one preferred key.
#[derive(Debug, Clone, Default)]
pub struct KeyPool {
    keys: Vec<ApiKey>,
}

impl KeyPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a pool from persisted entries, repairing anything a crash or
    /// hand-edited file may have left behind: `Checking` is resolved back to
    /// `Unknown`, duplicate secrets are dropped, and the preferred flag is
    /// reduced to exactly one key (or assigned if missing).
    pub fn from_persisted(entries: Vec<ApiKey>) -> Self {
        let mut pool = Self::new();
        for mut entry in entries {
            if pool.find(&entry.secret).is_some() {
                continue;
            }
            if entry.validity == Validity::Checking {
                entry.validity = Validity::Unknown;
            }
            entry.is_preferred = false;
            pool.keys.push(entry);
        }
        pool.ensure_preferred();
        pool
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Read-only view of every entry, in insertion order.
    pub fn snapshot(&self) -> &[ApiKey] {
        &self.keys
    }

    pub fn preferred(&self) -> Option<&ApiKey> {
        self.keys.iter().find(|key| key.is_preferred)
    }

    /// Adds new secrets, skipping any already present. New keys start
    /// `Unknown`; if nothing is preferred yet the first added key becomes
    /// preferred. Returns how many entries were actually inserted.
    pub fn add<I, S>(&mut self, secrets: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = 0;
        for secret in secrets {
            let secret = secret.into();
            if secret.is_empty() || self.find(&secret).is_some() {
                continue;
            }
            self.keys.push(ApiKey::new(secret));
            added += 1;
        }
        if added > 0 {
            self.ensure_preferred();
        }
        added
    }

    /// Removes a key. If it was preferred, the first remaining non-invalid
    /// key is promoted; failing that, the first remaining key of any
    /// validity, so a non-empty pool always keeps a preferred pointer.
    pub fn remove(&mut self, secret: &str) -> Result<(), PoolError> {
        let idx = self.index_of(secret).ok_or(PoolError::UnknownKey)?;
        let was_preferred = self.keys[idx].is_preferred;
        self.keys.remove(idx);
        if was_preferred {
            self.ensure_preferred();
        }
        Ok(())
    }

    /// Makes a key preferred. Rejected for invalid keys: an explicitly dead
    /// key may never be reactivated this way.
    pub fn set_preferred(&mut self, secret: &str) -> Result<(), PoolError> {
        let idx = self.index_of(secret).ok_or(PoolError::UnknownKey)?;
        if self.keys[idx].validity == Validity::Invalid {
            return Err(PoolError::KeyInvalid);
        }
        for key in &mut self.keys {
            key.is_preferred = false;
        }
        self.keys[idx].is_preferred = true;
        Ok(())
    }

    /// Applies one attempt outcome to the key that produced it.
    pub fn record_outcome(&mut self, secret: &str, outcome: &KeyOutcome, now: OffsetDateTime) {
        let Some(idx) = self.index_of(secret) else {
            return;
        };
        match outcome {
            KeyOutcome::Success => {
                let key = &mut self.keys[idx];
                // Lazy validation: a key proves itself by working.
                if matches!(key.validity, Validity::Unknown | Validity::Checking) {
                    key.validity = Validity::Valid;
                }
                key.cooldown_until = None;
            }
            KeyOutcome::AuthFailure => {
                let key = &mut self.keys[idx];
                key.validity = Validity::Invalid;
                if key.is_preferred {
                    key.is_preferred = false;
                    self.ensure_preferred();
                }
            }
            KeyOutcome::QuotaFailure { retry_after } => {
                let window = retry_after.unwrap_or(DEFAULT_COOLDOWN);
                self.keys[idx].cooldown_until = Some(now + window);
            }
            KeyOutcome::OtherFailure => {}
        }
    }

    /// Marks a key as having a validation probe in flight.
    pub fn mark_checking(&mut self, secret: &str) -> Result<(), PoolError> {
        let idx = self.index_of(secret).ok_or(PoolError::UnknownKey)?;
        if self.keys[idx].validity == Validity::Unknown {
            self.keys[idx].validity = Validity::Checking;
        }
        Ok(())
    }

    /// Reverts an in-flight probe that never got a verdict (for example the
    /// service was unreachable), so `Checking` cannot stick around.
    pub fn abort_check(&mut self, secret: &str) -> Result<(), PoolError> {
        let idx = self.index_of(secret).ok_or(PoolError::UnknownKey)?;
        if self.keys[idx].validity == Validity::Checking {
            self.keys[idx].validity = Validity::Unknown;
        }
        Ok(())
    }

    /// Resolves an in-flight probe to a stable validity.
    pub fn resolve_check(&mut self, secret: &str, valid: bool) -> Result<(), PoolError> {
        let idx = self.index_of(secret).ok_or(PoolError::UnknownKey)?;
        let key = &mut self.keys[idx];
        key.validity = if valid { Validity::Valid } else { Validity::Invalid };
        if !valid && key.is_preferred {
            key.is_preferred = false;
            self.ensure_preferred();
        }
        Ok(())
    }

    /// Candidate ordering for one generation pass: every non-invalid,
    /// non-cooling key, starting at the preferred key and wrapping around.
    pub fn usable(&self, now: OffsetDateTime) -> Vec<ApiKey> {
        if self.keys.is_empty() {
            return Vec::new();
        }
        let start = self
            .keys
            .iter()
            .position(|key| key.is_preferred)
            .unwrap_or(0);
        let n = self.keys.len();
        (0..n)
            .map(|offset| &self.keys[(start + offset) % n])
            .filter(|key| key.usable_at(now))
            .cloned()
            .collect()
    }

    pub fn find(&self, secret: &str) -> Option<&ApiKey> {
        self.keys.iter().find(|key| key.secret == secret)
    }

    fn index_of(&self, secret: &str) -> Option<usize> {
        self.keys.iter().position(|key| key.secret == secret)
    }

    /// Guarantees the preferred invariant after a mutation: exactly one
    /// preferred key whenever the pool is non-empty, never an invalid one
    /// while a usable alternative exists.
    fn ensure_preferred(&mut self) {
        if self.keys.is_empty() {
            return;
        }
        let mut seen = false;
        for key in &mut self.keys {
            if key.is_preferred {
                if seen {
                    key.is_preferred = false;
                } else {
                    seen = true;
                }
            }
        }
        if seen {
            return;
        }
        let idx = self
            .keys
            .iter()
            .position(|key| key.validity != Validity::Invalid)
            .unwrap_or(0);
        self.keys[idx].is_preferred = true;
    }
}
