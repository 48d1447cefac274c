use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{info, warn};

use darkroom_pool::{ApiKey, KeyOutcome, KeyPool, PoolError, PoolStore, StoreError, redact_secret};
use darkroom_prompt::{Attachment, CompiledPrompt, compile};

use crate::adapter::{AttemptPayload, PayloadPart, RemoteAdapter};
use crate::outcome::{AttemptOutcome, GenerationFailure, GenerationSuccess, ProbeOutcome};
use crate::request::GenerationRequest;

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Owns the key pool and drives one generation pass at a time: compile the
/// prompt, walk the usable keys in rotation order, one remote attempt per
/// key, and settle pool state from the outcomes.
///
/// Attempts within a pass are strictly sequential; trying two keys at once
/// would double-charge quota and make outcome attribution ambiguous. A
/// single-flight guard rejects reentrant calls outright.
pub struct Orchestrator {
    pool: Mutex<KeyPool>,
    store: Arc<dyn PoolStore>,
    adapter: Arc<dyn RemoteAdapter>,
    flight: Mutex<()>,
}

impl Orchestrator {
    pub fn new(pool: KeyPool, store: Arc<dyn PoolStore>, adapter: Arc<dyn RemoteAdapter>) -> Self {
        Self {
            pool: Mutex::new(pool),
            store,
            adapter,
            flight: Mutex::new(()),
        }
    }

    /// Restores the pool from the store and wraps it in an orchestrator.
    pub async fn load(
        store: Arc<dyn PoolStore>,
        adapter: Arc<dyn RemoteAdapter>,
    ) -> Result<Self, StoreError> {
        let entries = store.load().await?;
        let pool = KeyPool::from_persisted(entries);
        Ok(Self::new(pool, store, adapter))
    }

    /// Runs one full generation pass. Auth and quota failures rotate to the
    /// next key silently; only exhaustion or a hard fault surfaces to the
    /// caller. Pool state is persisted once, after the pass settles.
    pub async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationSuccess, GenerationFailure> {
        let Ok(_flight) = self.flight.try_lock() else {
            return Err(GenerationFailure::InFlight);
        };

        let compiled = compile(
            &request.settings,
            &request.instruction,
            request.mask.is_some(),
            request.reference.is_some(),
            request.background.is_some(),
        );
        let candidates = {
            let pool = self.pool.lock().await;
            pool.usable(OffsetDateTime::now_utc())
        };
        if candidates.is_empty() {
            return Err(GenerationFailure::NoUsableCredential);
        }
        let payload = build_payload(&request, &compiled);
        info!(
            event = "generate_start",
            mode = request.settings.mode().as_str(),
            candidates = candidates.len(),
            parts = payload.parts.len()
        );

        let mut saw_quota = false;
        let mut settled: Option<Result<GenerationSuccess, GenerationFailure>> = None;
        for key in &candidates {
            let outcome = self.adapter.attempt(&key.secret, &payload).await;
            let now = OffsetDateTime::now_utc();
            let mut pool = self.pool.lock().await;
            match outcome {
                AttemptOutcome::Success(image) => {
                    pool.record_outcome(&key.secret, &KeyOutcome::Success, now);
                    // Reward the key that worked: it leads the next pass.
                    let _ = pool.set_preferred(&key.secret);
                    info!(event = "generate_success", key = %redact_secret(&key.secret));
                    settled = Some(Ok(GenerationSuccess {
                        image,
                        secret: key.secret.clone(),
                    }));
                }
                AttemptOutcome::AuthFailure => {
                    pool.record_outcome(&key.secret, &KeyOutcome::AuthFailure, now);
                    warn!(event = "key_rejected", key = %redact_secret(&key.secret));
                }
                AttemptOutcome::QuotaFailure { retry_after } => {
                    pool.record_outcome(
                        &key.secret,
                        &KeyOutcome::QuotaFailure { retry_after },
                        now,
                    );
                    saw_quota = true;
                    warn!(event = "key_over_quota", key = %redact_secret(&key.secret));
                }
                AttemptOutcome::OtherFailure(message) => {
                    // Not the key's fault; do not penalize it, do not keep
                    // burning the remaining keys on the same broken request.
                    warn!(event = "generate_hard_failure", error = %message);
                    settled = Some(Err(GenerationFailure::Hard(message)));
                }
            }
            drop(pool);
            if settled.is_some() {
                break;
            }
        }

        self.persist().await;
        settled.unwrap_or(Err(if saw_quota {
            GenerationFailure::AllQuotaExhausted
        } else {
            GenerationFailure::NoUsableCredential
        }))
    }

    /// Adds keys to the pool. With `eager` set, each new key is probed
    /// immediately; otherwise validity stays `Unknown` until first use.
    pub async fn add_keys(
        &self,
        secrets: Vec<String>,
        eager: bool,
    ) -> Result<usize, StoreError> {
        let fresh: Vec<String> = {
            let mut pool = self.pool.lock().await;
            let fresh = secrets
                .iter()
                .filter(|secret| !secret.is_empty() && pool.find(secret).is_none())
                .cloned()
                .collect();
            pool.add(secrets);
            fresh
        };
        if eager {
            for secret in &fresh {
                self.probe_key(secret).await;
            }
        }
        self.persist_strict().await?;
        Ok(fresh.len())
    }

    pub async fn remove_key(&self, secret: &str) -> Result<(), AdminError> {
        self.pool.lock().await.remove(secret)?;
        self.persist_strict().await?;
        Ok(())
    }

    pub async fn prefer_key(&self, secret: &str) -> Result<(), AdminError> {
        self.pool.lock().await.set_preferred(secret)?;
        self.persist_strict().await?;
        Ok(())
    }

    /// Probes every non-invalid key and resolves its validity.
    pub async fn check_keys(&self) -> Result<Vec<(String, ProbeOutcome)>, StoreError> {
        let secrets: Vec<String> = {
            let pool = self.pool.lock().await;
            pool.snapshot()
                .iter()
                .filter(|key| key.validity != darkroom_pool::Validity::Invalid)
                .map(|key| key.secret.clone())
                .collect()
        };
        let mut results = Vec::with_capacity(secrets.len());
        for secret in secrets {
            let outcome = self.probe_key(&secret).await;
            results.push((secret, outcome));
        }
        self.persist_strict().await?;
        Ok(results)
    }

    pub async fn snapshot(&self) -> Vec<ApiKey> {
        self.pool.lock().await.snapshot().to_vec()
    }

    async fn probe_key(&self, secret: &str) -> ProbeOutcome {
        {
            let mut pool = self.pool.lock().await;
            let _ = pool.mark_checking(secret);
        }
        let outcome = self.adapter.probe(secret).await;
        let mut pool = self.pool.lock().await;
        match &outcome {
            ProbeOutcome::Valid => {
                let _ = pool.resolve_check(secret, true);
            }
            ProbeOutcome::Invalid => {
                let _ = pool.resolve_check(secret, false);
                warn!(event = "key_probe_invalid", key = %redact_secret(secret));
            }
            ProbeOutcome::Unreachable(message) => {
                let _ = pool.abort_check(secret);
                warn!(event = "key_probe_unreachable", key = %redact_secret(secret), error = %message);
            }
        }
        outcome
    }

    /// Per-pass persistence: a failed save is logged, never turned into a
    /// generation failure after the image already exists.
    async fn persist(&self) {
        let snapshot = self.snapshot().await;
        if let Err(err) = self.store.save(&snapshot).await {
            warn!(event = "pool_persist_failed", error = %err);
        }
    }

    async fn persist_strict(&self) -> Result<(), StoreError> {
        let snapshot = self.snapshot().await;
        self.store.save(&snapshot).await
    }
}

/// Realizes the compiled attachment plan against the request's images and
/// appends the instruction text as the final part.
fn build_payload(request: &GenerationRequest, compiled: &CompiledPrompt) -> AttemptPayload {
    let mut parts: Vec<PayloadPart> = compiled
        .attachments
        .iter()
        .filter_map(|attachment| match attachment {
            Attachment::Source => Some(request.source.clone()),
            Attachment::Mask => request.mask.clone(),
            Attachment::Reference => request.reference.clone(),
            Attachment::Background => request.background.clone(),
        })
        .map(PayloadPart::Image)
        .collect();
    parts.push(PayloadPart::Text(compiled.text.clone()));
    AttemptPayload { parts }
}
