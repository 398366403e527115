//! Backend-agnostic vector store for sock embeddings.
//!
//! Two interchangeable backends sit behind the [`VectorStore`] capability
//! trait, selected once at startup from [`BackendConfig`] — callers never
//! branch on the backend:
//!
//! - [`AnnStore`]: HNSW-indexed approximate search with an exact linear
//!   fallback below a configurable dataset size; similarity is reported as
//!   `1 - cosine_distance` (i.e. the raw cosine).
//! - [`ScanStore`]: brute-force in-memory scan; similarity is the cosine
//!   remapped from [-1, 1] to [0, 1].
//!
//! The score scales differ (each matches its storage engine's native
//! convention) but both are strictly monotonic in the cosine, so the two
//! backends always agree on ranking — that cross-backend ordering contract is
//! covered by tests here.

#[cfg(feature = "backend-ann")]
mod ann;
mod scan;

#[cfg(feature = "backend-ann")]
pub use ann::{AnnConfig, AnnStore};
pub use scan::ScanStore;

use std::sync::Arc;

use embedding::EmbeddingVector;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Identifier of a sock record.
pub type SockId = Uuid;
/// Identifier of the owning user; all queries are scoped to one owner.
pub type OwnerId = Uuid;

/// One embedding entry in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub sock_id: SockId,
    pub owner: OwnerId,
    pub embedding: EmbeddingVector,
    /// Matched socks stay stored but are excluded from every search.
    pub is_matched: bool,
}

/// A similarity query against one owner's unmatched inventory.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub owner: OwnerId,
    pub query: EmbeddingVector,
    /// Socks to leave out of the results (typically the query sock itself).
    pub exclude: Vec<SockId>,
    pub limit: usize,
    /// Minimum similarity, interpreted in the backend's own score space.
    pub threshold: f32,
}

/// One ranked hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scored {
    pub sock_id: SockId,
    pub score: f32,
}

/// Errors produced by vector-store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("vector entry not found: {0}")]
    NotFound(SockId),
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend<E: std::fmt::Display>(err: E) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Capability interface over the two storage backends.
pub trait VectorStore: Send + Sync {
    /// Insert or replace the entry for `record.sock_id`.
    fn insert(&self, record: VectorRecord) -> Result<(), StoreError>;

    /// Remove an entry. Removing an absent id is a no-op.
    fn remove(&self, id: SockId) -> Result<(), StoreError>;

    /// Flip the matched flag; matched entries drop out of search results.
    fn set_matched(&self, id: SockId, matched: bool) -> Result<(), StoreError>;

    fn contains(&self, id: SockId) -> bool;

    /// Ranked similarity search over the owner's unmatched entries, ordered
    /// by descending score and capped at `limit`.
    fn search(&self, request: &SearchRequest) -> Result<Vec<Scored>, StoreError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Backend selection, resolved once at startup.
#[derive(Debug, Clone, Default)]
pub enum BackendConfig {
    /// Brute-force in-memory scan. Exact, no index maintenance.
    #[default]
    Scan,
    /// HNSW-indexed approximate search (requires the `backend-ann` feature).
    #[cfg(feature = "backend-ann")]
    Ann(AnnConfig),
}

impl BackendConfig {
    pub fn scan() -> Self {
        BackendConfig::Scan
    }

    #[cfg(feature = "backend-ann")]
    pub fn ann() -> Self {
        BackendConfig::Ann(AnnConfig::default())
    }

    /// Build the configured backend for vectors of the given dimension.
    pub fn build(&self, dimension: usize) -> Arc<dyn VectorStore> {
        match self {
            BackendConfig::Scan => Arc::new(ScanStore::new(dimension)),
            #[cfg(feature = "backend-ann")]
            BackendConfig::Ann(config) => Arc::new(AnnStore::new(dimension, config.clone())),
        }
    }
}

/// Deterministic descending-score ordering with the sock id as tie-breaker.
pub(crate) fn sort_hits(hits: &mut [Scored]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.sock_id.cmp(&b.sock_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn unit(values: Vec<f32>) -> EmbeddingVector {
        EmbeddingVector::unit(values).unwrap()
    }

    pub(crate) fn record(owner: OwnerId, values: Vec<f32>) -> VectorRecord {
        VectorRecord {
            sock_id: Uuid::new_v4(),
            owner,
            embedding: unit(values),
            is_matched: false,
        }
    }

    fn seeded_dataset(owner: OwnerId, count: usize) -> Vec<VectorRecord> {
        let mut rng = fastrand::Rng::with_seed(99);
        (0..count)
            .map(|_| {
                let values: Vec<f32> = (0..8).map(|_| rng.f32() * 2.0 - 1.0).collect();
                record(owner, values)
            })
            .collect()
    }

    #[cfg(feature = "backend-ann")]
    fn assert_backends_agree(dataset: &[VectorRecord], ann: &AnnStore) {
        let owner = dataset[0].owner;
        let scan = ScanStore::new(8);
        for rec in dataset {
            scan.insert(rec.clone()).unwrap();
            ann.insert(rec.clone()).unwrap();
        }

        let request = SearchRequest {
            owner,
            query: dataset[0].embedding.clone(),
            exclude: vec![dataset[0].sock_id],
            limit: 10,
            threshold: -1.0,
        };

        let scan_hits = scan.search(&request).unwrap();
        let ann_hits = ann.search(&request).unwrap();
        assert_eq!(scan_hits.len(), ann_hits.len());
        let scan_order: Vec<SockId> = scan_hits.iter().map(|h| h.sock_id).collect();
        let ann_order: Vec<SockId> = ann_hits.iter().map(|h| h.sock_id).collect();
        assert_eq!(scan_order, ann_order);
    }

    #[cfg(feature = "backend-ann")]
    #[test]
    fn both_backends_rank_identically_below_the_ann_cutoff() {
        let owner = Uuid::new_v4();
        let dataset = seeded_dataset(owner, 24);
        let ann = AnnStore::new(8, AnnConfig::default());
        assert_backends_agree(&dataset, &ann);
    }

    #[cfg(feature = "backend-ann")]
    #[test]
    fn both_backends_rank_identically_on_the_graph_path() {
        let owner = Uuid::new_v4();
        let dataset = seeded_dataset(owner, 200);
        // Lower the cutoff so the HNSW graph answers, not the linear pass.
        let ann = AnnStore::new(8, AnnConfig::default().with_min_vectors_for_ann(10));
        assert_backends_agree(&dataset, &ann);
    }

    #[cfg(feature = "backend-ann")]
    #[test]
    fn backend_config_builds_the_selected_backend() {
        let scan = BackendConfig::scan().build(4);
        let ann = BackendConfig::ann().build(4);
        assert!(scan.is_empty());
        assert!(ann.is_empty());
    }

    #[test]
    fn sort_hits_is_deterministic_under_ties() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let mut hits = vec![
            Scored {
                sock_id: hi,
                score: 0.5,
            },
            Scored {
                sock_id: lo,
                score: 0.5,
            },
        ];
        sort_hits(&mut hits);
        assert_eq!(hits[0].sock_id, lo);
    }
}
