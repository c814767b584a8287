//! Self-healing peer directory cache.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::{DashMap, DashSet};
use futures::future::join_all;

use super::fetcher::DirectoryFetcher;
use super::types::{validate_peer_id, FetchFailure, PeerRecord, SweepReport};
use crate::config::DirectoryConfig;
use crate::crypto::PublicKeyMaterial;
use crate::error::{Error, Result};
use crate::scheduler::PeriodicTask;

/// Resolves peer ids to their public key and inbound address
///
/// Records are fetched on first lookup, kept forever, refreshed by the
/// periodic sweep and replaced whole. A failed refresh leaves the previous
/// record in place and is logged separately in the failure log.
pub struct PeerDirectoryCache {
    local_peer_id: String,
    fetcher: Arc<dyn DirectoryFetcher>,
    records: DashMap<String, Arc<PeerRecord>>,
    tracked: DashSet<String>,
    failures: DashMap<String, FetchFailure>,
    /// Per-peer gate so concurrent misses share one fetch
    in_flight: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    max_record_age: Option<Duration>,
    refresh_interval: Duration,
}

impl PeerDirectoryCache {
    /// Create an empty cache with the local peer pre-tracked
    pub fn new(config: &DirectoryConfig, fetcher: Arc<dyn DirectoryFetcher>) -> Self {
        let tracked = DashSet::new();
        tracked.insert(config.local_peer_id.clone());

        Self {
            local_peer_id: config.local_peer_id.clone(),
            fetcher,
            records: DashMap::new(),
            tracked,
            failures: DashMap::new(),
            in_flight: DashMap::new(),
            max_record_age: config.max_record_age,
            refresh_interval: config.refresh_interval,
        }
    }

    pub fn local_peer_id(&self) -> &str {
        &self.local_peer_id
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Resolve a peer, fetching on a miss or when the record is too old
    ///
    /// ## Errors
    ///
    /// - `Argument` if `peer_id` is not a valid peer id (nothing is fetched)
    /// - `Directory` if the fetch fails and nothing is cached
    ///
    /// A failed fetch with a cached record returns the cached record.
    pub async fn resolve_peer(&self, peer_id: &str) -> Result<Arc<PeerRecord>> {
        validate_peer_id(peer_id)?;

        if let Some(record) = self.fresh(peer_id) {
            return Ok(record);
        }

        let gate = self.gate(peer_id);
        let _guard = gate.lock().await;

        // Another caller may have fetched while we waited
        if let Some(record) = self.fresh(peer_id) {
            return Ok(record);
        }

        match self.fetch_and_store(peer_id).await {
            Ok(record) => Ok(record),
            Err(e) => match self.cached(peer_id) {
                Some(stale) => {
                    tracing::warn!(
                        peer_id = %peer_id,
                        error = %e,
                        fetched_at = %stale.fetched_at,
                        "Serving last-known-good peer record"
                    );
                    Ok(stale)
                }
                None => {
                    self.forget_if_unknown(peer_id, &gate);
                    Err(into_directory_error(peer_id, e))
                }
            },
        }
    }

    /// The peer's parsed public key, if its directory entry carried a usable one
    pub async fn peer_public_key(&self, peer_id: &str) -> Result<Option<PublicKeyMaterial>> {
        Ok(self.resolve_peer(peer_id).await?.public_key.clone())
    }

    /// The queue envelopes for this peer should be delivered to
    pub async fn peer_inbound_address(&self, peer_id: &str) -> Result<Option<String>> {
        Ok(self.resolve_peer(peer_id).await?.inbound_address.clone())
    }

    /// Force a fetch, replacing the cached record on success
    ///
    /// Unlike [`resolve_peer`](Self::resolve_peer), a failure is returned
    /// even when a stale record exists (the record itself is kept).
    pub async fn refresh_peer(&self, peer_id: &str) -> Result<Arc<PeerRecord>> {
        validate_peer_id(peer_id)?;

        let gate = self.gate(peer_id);
        let _guard = gate.lock().await;
        let result = self.fetch_and_store(peer_id).await;
        if result.is_err() {
            self.forget_if_unknown(peer_id, &gate);
        }
        result
    }

    /// Refresh every tracked peer concurrently
    ///
    /// Each fetch is independent: one failing peer never stops the others.
    pub async fn refresh_tracked(&self) -> SweepReport {
        let peers = self.tracked_peers();

        let results = join_all(peers.iter().map(|peer_id| async move {
            (peer_id.clone(), self.refresh_peer(peer_id).await)
        }))
        .await;

        let mut report = SweepReport::default();
        for (peer_id, result) in results {
            match result {
                Ok(_) => report.refreshed.push(peer_id),
                Err(e) => report.failed.push((peer_id, e.to_string())),
            }
        }
        report
    }

    /// Enroll a peer in the periodic sweep without fetching it
    pub fn track(&self, peer_id: &str) -> Result<()> {
        validate_peer_id(peer_id)?;
        if self.tracked.insert(peer_id.to_string()) {
            tracing::debug!(peer_id = %peer_id, "Tracking peer");
        }
        Ok(())
    }

    /// Tracked peer ids, sorted
    pub fn tracked_peers(&self) -> Vec<String> {
        let mut peers: Vec<String> = self.tracked.iter().map(|p| p.key().clone()).collect();
        peers.sort();
        peers
    }

    /// Cached record without any fetch
    pub fn cached(&self, peer_id: &str) -> Option<Arc<PeerRecord>> {
        self.records.get(peer_id).map(|r| Arc::clone(r.value()))
    }

    /// Most recent failed fetch since the last successful one
    pub fn last_failure(&self, peer_id: &str) -> Option<FetchFailure> {
        self.failures.get(peer_id).map(|f| f.value().clone())
    }

    fn fresh(&self, peer_id: &str) -> Option<Arc<PeerRecord>> {
        let record = self.cached(peer_id)?;
        match self.max_record_age {
            Some(max_age) if record.age() >= max_age => None,
            _ => Some(record),
        }
    }

    fn gate(&self, peer_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.in_flight
            .entry(peer_id.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// Drop bookkeeping for a peer that has no record and is not tracked
    ///
    /// The gate goes only when no other caller holds it (this caller's clone
    /// plus the map's own).
    fn forget_if_unknown(&self, peer_id: &str, gate: &Arc<tokio::sync::Mutex<()>>) {
        if self.records.contains_key(peer_id) || self.tracked.contains(peer_id) {
            return;
        }
        self.failures.remove(peer_id);
        self.in_flight.remove_if(peer_id, |_, held| {
            Arc::ptr_eq(held, gate) && Arc::strong_count(held) <= 2
        });
    }

    /// Callers hold the peer's gate
    async fn fetch_and_store(&self, peer_id: &str) -> Result<Arc<PeerRecord>> {
        match self.fetcher.fetch_participant(peer_id).await {
            Ok(participant) => {
                let record = Arc::new(PeerRecord::from_participant(peer_id, participant));
                self.records.insert(peer_id.to_string(), Arc::clone(&record));
                self.failures.remove(peer_id);
                self.tracked.insert(peer_id.to_string());

                tracing::info!(
                    peer_id = %peer_id,
                    inbound_address = ?record.inbound_address,
                    status = ?record.last_fetch_status,
                    "Peer record refreshed"
                );
                Ok(record)
            }
            Err(e) => {
                tracing::warn!(peer_id = %peer_id, error = %e, "Peer fetch failed");
                self.failures.insert(
                    peer_id.to_string(),
                    FetchFailure {
                        reason: e.to_string(),
                        at: Utc::now(),
                    },
                );
                Err(e)
            }
        }
    }
}

fn into_directory_error(peer_id: &str, err: Error) -> Error {
    match err {
        Error::Directory { .. } => err,
        other => Error::Directory {
            peer_id: peer_id.to_string(),
            reason: other.to_string(),
        },
    }
}

#[async_trait]
impl PeriodicTask for PeerDirectoryCache {
    fn name(&self) -> &'static str {
        "directory-sweep"
    }

    async fn run(&self) {
        let report = self.refresh_tracked().await;
        for (peer_id, reason) in &report.failed {
            tracing::warn!(peer_id = %peer_id, error = %reason, "Sweep could not refresh peer");
        }
        tracing::info!(
            refreshed = report.refreshed.len(),
            failed = report.failed.len(),
            "Directory sweep finished"
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================
