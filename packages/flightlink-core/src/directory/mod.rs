//! # Peer Directory
//!
//! Resolves counterpart services (peers, identified by IATA code) to the
//! public key and inbound queue an envelope needs.
//!
//! ## Lookup Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        PEER RESOLUTION                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  resolve_peer("C1")                                                    │
//! │        │                                                                │
//! │        ├── invalid id ────────────────────────────► Argument           │
//! │        │                                                                │
//! │        ├── cached and fresh ──────────────────────► record             │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  per-peer gate (one fetch in flight per peer)                          │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  GET /Participants?$filter=IataCode eq 'C1'                            │
//! │        │                                                                │
//! │        ├── ok ───► parse key once ───► replace record ──► record       │
//! │        │                                                                │
//! │        └── failed ─┬─ record cached ──────────────► stale record       │
//! │                    └─ nothing cached ─────────────► Directory          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Refresh
//!
//! Every peer resolved once (plus the local service id, from startup) is
//! tracked. The cache implements [`PeriodicTask`](crate::scheduler::PeriodicTask)
//! so the scheduler can sweep tracked peers, by default every 10 minutes.
//! Sweep fetches run concurrently and a failure for one peer is logged and
//! otherwise ignored. Records older than `max_record_age` are also
//! revalidated inline on lookup.

mod cache;
mod fetcher;
mod types;

pub use cache::PeerDirectoryCache;
pub use fetcher::{parse_participants, DirectoryFetcher, HttpDirectoryFetcher};
pub use types::{
    validate_peer_id, FetchFailure, FetchStatus, Participant, ParticipantsResponse, PeerRecord,
    SweepReport,
};

#[cfg(test)]
pub(crate) use cache::tests::{participant as test_participant, MockFetcher};
