//! Persistence seam for sock and match records.
//!
//! [`SockRepository`] is what a host backs with its database; the bundled
//! [`InMemoryRepository`] is the single-node reference implementation and
//! the one the test suites run against. Multi-record operations
//! (`create_match`, `remove_match`) are atomic: under the in-memory
//! implementation they execute inside one mutex-guarded critical section,
//! and a database-backed host is expected to give them one transaction.

use std::collections::HashMap;
use std::sync::Mutex;

use features::FeatureSet;

use crate::error::ServiceError;
use crate::types::{ImageRef, MatchId, MatchRecord, OwnerId, SockId, SockRecord};

pub trait SockRepository: Send + Sync {
    /// Store a freshly uploaded sock.
    fn insert_sock(&self, sock: SockRecord) -> Result<(), ServiceError>;

    /// Fetch one sock, enforcing ownership.
    fn sock(&self, owner: OwnerId, id: SockId) -> Result<SockRecord, ServiceError>;

    /// All of an owner's socks, ordered by sequence.
    fn socks(&self, owner: OwnerId, unmatched_only: bool) -> Vec<SockRecord>;

    /// Persist the background pipeline's output. `complete` marks the end of
    /// derivation; on a degraded run it stays false.
    fn apply_derived(
        &self,
        id: SockId,
        no_bg_image: Option<ImageRef>,
        features: FeatureSet,
        complete: bool,
    ) -> Result<(), ServiceError>;

    /// Next per-owner sock sequence number. Monotonic, never reused.
    fn next_sock_sequence(&self, owner: OwnerId) -> u64;

    /// Atomically pair two socks: both must exist, belong to `owner`, be
    /// distinct, and be unmatched. On success both records carry
    /// `is_matched = true` and point at each other.
    fn create_match(
        &self,
        owner: OwnerId,
        a: SockId,
        b: SockId,
    ) -> Result<MatchRecord, ServiceError>;

    /// Fetch one match, enforcing ownership.
    fn match_record(&self, owner: OwnerId, id: MatchId) -> Result<MatchRecord, ServiceError>;

    /// All of an owner's matches, ordered by sequence.
    fn matches(&self, owner: OwnerId) -> Vec<MatchRecord>;

    /// Atomically dissolve a match. With `decouple` the socks return to the
    /// unmatched pool; without it both sock rows are removed and returned so
    /// the caller can clean up their files and vector entries.
    fn remove_match(
        &self,
        owner: OwnerId,
        id: MatchId,
        decouple: bool,
    ) -> Result<(MatchRecord, Option<(SockRecord, SockRecord)>), ServiceError>;

    /// Remove a sock. Rejected with `AlreadyMatched` while the sock is part
    /// of an active match.
    fn remove_sock(&self, owner: OwnerId, id: SockId) -> Result<SockRecord, ServiceError>;
}

#[derive(Default)]
struct RepoState {
    socks: HashMap<SockId, SockRecord>,
    matches: HashMap<MatchId, MatchRecord>,
    sock_sequences: HashMap<OwnerId, u64>,
    match_sequences: HashMap<OwnerId, u64>,
}

/// Reference implementation backed by a single mutex, which is what makes
/// `create_match` / `remove_match` atomic across the records they touch.
#[derive(Default)]
pub struct InMemoryRepository {
    state: Mutex<RepoState>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RepoState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SockRepository for InMemoryRepository {
    fn insert_sock(&self, sock: SockRecord) -> Result<(), ServiceError> {
        self.lock().socks.insert(sock.id, sock);
        Ok(())
    }

    fn sock(&self, owner: OwnerId, id: SockId) -> Result<SockRecord, ServiceError> {
        let state = self.lock();
        let sock = state
            .socks
            .get(&id)
            .ok_or(ServiceError::SockNotFound(id))?;
        if sock.owner != owner {
            return Err(ServiceError::Ownership(id));
        }
        Ok(sock.clone())
    }

    fn socks(&self, owner: OwnerId, unmatched_only: bool) -> Vec<SockRecord> {
        let state = self.lock();
        let mut socks: Vec<SockRecord> = state
            .socks
            .values()
            .filter(|s| s.owner == owner && (!unmatched_only || !s.is_matched))
            .cloned()
            .collect();
        socks.sort_by_key(|s| s.sequence);
        socks
    }

    fn apply_derived(
        &self,
        id: SockId,
        no_bg_image: Option<ImageRef>,
        features: FeatureSet,
        complete: bool,
    ) -> Result<(), ServiceError> {
        let mut state = self.lock();
        let sock = state
            .socks
            .get_mut(&id)
            .ok_or(ServiceError::SockNotFound(id))?;
        sock.no_bg_image = no_bg_image;
        sock.features = features;
        sock.processing_complete = complete;
        Ok(())
    }

    fn next_sock_sequence(&self, owner: OwnerId) -> u64 {
        let mut state = self.lock();
        let counter = state.sock_sequences.entry(owner).or_insert(0);
        *counter += 1;
        *counter
    }

    fn create_match(
        &self,
        owner: OwnerId,
        a: SockId,
        b: SockId,
    ) -> Result<MatchRecord, ServiceError> {
        if a == b {
            return Err(ServiceError::SameSock);
        }

        let mut state = self.lock();
        for id in [a, b] {
            let sock = state
                .socks
                .get(&id)
                .ok_or(ServiceError::SockNotFound(id))?;
            if sock.owner != owner {
                return Err(ServiceError::Ownership(id));
            }
            if sock.is_matched {
                return Err(ServiceError::AlreadyMatched(id));
            }
        }

        let counter = state.match_sequences.entry(owner).or_insert(0);
        *counter += 1;
        let sequence = *counter;

        let (sock_a, sock_b) = MatchRecord::pair_key(a, b);
        let record = MatchRecord {
            id: uuid::Uuid::new_v4(),
            sock_a,
            sock_b,
            owner,
            sequence,
            matched_at: chrono::Utc::now(),
        };

        for (id, partner) in [(a, b), (b, a)] {
            // Presence was checked above under the same lock.
            if let Some(sock) = state.socks.get_mut(&id) {
                sock.is_matched = true;
                sock.matched_with = Some(partner);
            }
        }
        state.matches.insert(record.id, record.clone());
        Ok(record)
    }

    fn match_record(&self, owner: OwnerId, id: MatchId) -> Result<MatchRecord, ServiceError> {
        let state = self.lock();
        let record = state
            .matches
            .get(&id)
            .ok_or(ServiceError::MatchNotFound(id))?;
        if record.owner != owner {
            return Err(ServiceError::MatchNotFound(id));
        }
        Ok(record.clone())
    }

    fn matches(&self, owner: OwnerId) -> Vec<MatchRecord> {
        let state = self.lock();
        let mut matches: Vec<MatchRecord> = state
            .matches
            .values()
            .filter(|m| m.owner == owner)
            .cloned()
            .collect();
        matches.sort_by_key(|m| m.sequence);
        matches
    }

    fn remove_match(
        &self,
        owner: OwnerId,
        id: MatchId,
        decouple: bool,
    ) -> Result<(MatchRecord, Option<(SockRecord, SockRecord)>), ServiceError> {
        let mut state = self.lock();
        match state.matches.get(&id) {
            Some(record) if record.owner == owner => {}
            _ => return Err(ServiceError::MatchNotFound(id)),
        }
        // Checked above; remove inside the same critical section.
        let record = match state.matches.remove(&id) {
            Some(record) => record,
            None => return Err(ServiceError::MatchNotFound(id)),
        };

        if decouple {
            for sock_id in [record.sock_a, record.sock_b] {
                if let Some(sock) = state.socks.get_mut(&sock_id) {
                    sock.is_matched = false;
                    sock.matched_with = None;
                }
            }
            Ok((record, None))
        } else {
            let removed_a = state.socks.remove(&record.sock_a);
            let removed_b = state.socks.remove(&record.sock_b);
            match (removed_a, removed_b) {
                (Some(a), Some(b)) => Ok((record, Some((a, b)))),
                // A matched sock row missing means the invariant was broken
                // elsewhere; surface it as not-found.
                (Some(_), None) => Err(ServiceError::SockNotFound(record.sock_b)),
                _ => Err(ServiceError::SockNotFound(record.sock_a)),
            }
        }
    }

    fn remove_sock(&self, owner: OwnerId, id: SockId) -> Result<SockRecord, ServiceError> {
        let mut state = self.lock();
        let sock = state
            .socks
            .get(&id)
            .ok_or(ServiceError::SockNotFound(id))?;
        if sock.owner != owner {
            return Err(ServiceError::Ownership(id));
        }
        if sock.is_matched {
            return Err(ServiceError::AlreadyMatched(id));
        }
        state
            .socks
            .remove(&id)
            .ok_or(ServiceError::SockNotFound(id))
    }
}
