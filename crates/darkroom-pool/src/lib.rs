//! The API key pool: per-key validity state, preferred-key selection,
//! quota cooldowns, and the persistence boundary.

pub mod pool;
pub mod state;
pub mod store;

pub use pool::{DEFAULT_COOLDOWN, KeyOutcome, KeyPool, PoolError};
pub use state::{ApiKey, Validity, redact_secret};
pub use store::{JsonFileStore, MemoryStore, PoolStore, StoreError};
