//! Similarity and ranking engine over the sock vector store.
//!
//! [`MatchEngine`] turns "find partners for this sock" into a validated,
//! oversampled [`VectorStore`] query and a ranked candidate list. It is
//! backend-agnostic: ordering comes from the store's score, whatever scale
//! the selected backend reports in.
//!
//! [`color_similarity`] is a perceptual side-channel for presentation
//! (e.g. badging near-identical colors); it never participates in ranking.

mod color;

pub use color::{color_similarity, parse_hex, Rgb};

use std::sync::Arc;

use embedding::EmbeddingVector;
use serde::{Deserialize, Serialize};
use store::{OwnerId, Scored, SearchRequest, SockId, StoreError, VectorStore};
use thiserror::Error;

/// Errors produced while ranking candidates.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("invalid match config: {0}")]
    InvalidConfig(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Ranking parameters.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Minimum similarity, in the backend's score space.
    pub threshold: f32,
    /// Maximum candidates returned.
    pub limit: usize,
    /// Multiplier on `limit` when querying the store, so post-query
    /// filtering upstream still has headroom.
    pub oversample_factor: f32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            threshold: 0.75,
            limit: 10,
            oversample_factor: 2.0,
        }
    }
}

impl MatchConfig {
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_oversample_factor(mut self, factor: f32) -> Self {
        self.oversample_factor = factor;
        self
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        if self.limit == 0 {
            return Err(MatchError::InvalidConfig("limit must be positive".into()));
        }
        if !self.threshold.is_finite() {
            return Err(MatchError::InvalidConfig(
                "threshold must be finite".into(),
            ));
        }
        if self.oversample_factor < 1.0 {
            return Err(MatchError::InvalidConfig(
                "oversample_factor must be >= 1.0".into(),
            ));
        }
        Ok(())
    }
}

/// One ranked partner candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub sock_id: SockId,
    pub score: f32,
}

impl From<Scored> for MatchCandidate {
    fn from(hit: Scored) -> Self {
        Self {
            sock_id: hit.sock_id,
            score: hit.score,
        }
    }
}

/// Ranks an owner's unmatched socks against a query embedding.
pub struct MatchEngine {
    store: Arc<dyn VectorStore>,
    config: MatchConfig,
}

impl MatchEngine {
    pub fn new(store: Arc<dyn VectorStore>, config: MatchConfig) -> Result<Self, MatchError> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Find ranked partner candidates for `query` among the owner's
    /// unmatched socks, leaving out `exclude` (typically the query sock
    /// itself). Descending score, at most `config.limit` entries.
    pub fn find_candidates(
        &self,
        owner: OwnerId,
        query: &EmbeddingVector,
        exclude: &[SockId],
    ) -> Result<Vec<MatchCandidate>, MatchError> {
        let oversampled =
            ((self.config.limit as f32) * self.config.oversample_factor).ceil() as usize;
        let request = SearchRequest {
            owner,
            query: query.clone(),
            exclude: exclude.to_vec(),
            limit: oversampled,
            threshold: self.config.threshold,
        };

        let mut candidates: Vec<MatchCandidate> = self
            .store
            .search(&request)?
            .into_iter()
            .map(MatchCandidate::from)
            .collect();
        candidates.truncate(self.config.limit);
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::{BackendConfig, VectorRecord};
    use uuid::Uuid;

    fn engine(config: MatchConfig) -> (Arc<dyn VectorStore>, MatchEngine) {
        let store = BackendConfig::scan().build(4);
        let engine = MatchEngine::new(store.clone(), config).unwrap();
        (store, engine)
    }

    fn insert(store: &Arc<dyn VectorStore>, owner: OwnerId, values: Vec<f32>) -> SockId {
        let id = Uuid::new_v4();
        store
            .insert(VectorRecord {
                sock_id: id,
                owner,
                embedding: EmbeddingVector::unit(values).unwrap(),
                is_matched: false,
            })
            .unwrap();
        id
    }

    #[test]
    fn candidates_are_ranked_and_capped() {
        let owner = Uuid::new_v4();
        let (store, engine) = engine(MatchConfig::default().with_limit(2).with_threshold(0.0));
        let best = insert(&store, owner, vec![1.0, 0.0, 0.0, 0.0]);
        let second = insert(&store, owner, vec![0.9, 0.3, 0.0, 0.0]);
        insert(&store, owner, vec![0.1, 0.9, 0.0, 0.0]);

        let query = EmbeddingVector::unit(vec![1.0, 0.0, 0.0, 0.0]).unwrap();
        let candidates = engine.find_candidates(owner, &query, &[]).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].sock_id, best);
        assert_eq!(candidates[1].sock_id, second);
        assert!(candidates[0].score >= candidates[1].score);
    }

    #[test]
    fn query_sock_is_excluded_from_its_own_results() {
        let owner = Uuid::new_v4();
        let (store, engine) = engine(MatchConfig::default().with_threshold(0.0));
        let own = insert(&store, owner, vec![1.0, 0.0, 0.0, 0.0]);
        let partner = insert(&store, owner, vec![1.0, 0.0, 0.0, 0.0]);

        let query = EmbeddingVector::unit(vec![1.0, 0.0, 0.0, 0.0]).unwrap();
        let candidates = engine.find_candidates(owner, &query, &[own]).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].sock_id, partner);
    }

    #[test]
    fn threshold_drops_weak_candidates() {
        let owner = Uuid::new_v4();
        let (store, engine) = engine(MatchConfig::default().with_threshold(0.9));
        insert(&store, owner, vec![1.0, 0.0, 0.0, 0.0]);
        insert(&store, owner, vec![-1.0, 0.0, 0.0, 0.0]);

        let query = EmbeddingVector::unit(vec![1.0, 0.0, 0.0, 0.0]).unwrap();
        let candidates = engine.find_candidates(owner, &query, &[]).unwrap();
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].score >= 0.9);
    }

    #[test]
    fn empty_store_yields_no_candidates() {
        let (_, engine) = engine(MatchConfig::default());
        let query = EmbeddingVector::unit(vec![1.0, 0.0, 0.0, 0.0]).unwrap();
        let candidates = engine
            .find_candidates(Uuid::new_v4(), &query, &[])
            .unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let store = BackendConfig::scan().build(4);
        assert!(MatchEngine::new(store.clone(), MatchConfig::default().with_limit(0)).is_err());
        assert!(MatchEngine::new(
            store.clone(),
            MatchConfig::default().with_oversample_factor(0.5)
        )
        .is_err());
        assert!(
            MatchEngine::new(store, MatchConfig::default().with_threshold(f32::NAN)).is_err()
        );
    }
}
