use std::collections::HashMap;
use std::sync::RwLock;

use crate::{sort_hits, Scored, SearchRequest, SockId, StoreError, VectorRecord, VectorStore};

/// Brute-force in-memory backend.
///
/// Every eligible vector is scored on each query:
/// `similarity = (cos + 1) / 2`, mapping the cosine from [-1, 1] to [0, 1].
/// Exact and simple; the right choice for small inventories and for
/// cross-checking the ANN backend.
pub struct ScanStore {
    dimension: usize,
    records: RwLock<HashMap<SockId, VectorRecord>>,
}

impl ScanStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            records: RwLock::new(HashMap::new()),
        }
    }

    fn check_dimension(&self, got: usize) -> Result<(), StoreError> {
        if got != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                got,
            });
        }
        Ok(())
    }
}

impl VectorStore for ScanStore {
    fn insert(&self, record: VectorRecord) -> Result<(), StoreError> {
        self.check_dimension(record.embedding.dimension())?;
        self.records
            .write()
            .map_err(|_| StoreError::backend("poisoned lock"))?
            .insert(record.sock_id, record);
        Ok(())
    }

    fn remove(&self, id: SockId) -> Result<(), StoreError> {
        self.records
            .write()
            .map_err(|_| StoreError::backend("poisoned lock"))?
            .remove(&id);
        Ok(())
    }

    fn set_matched(&self, id: SockId, matched: bool) -> Result<(), StoreError> {
        let mut guard = self
            .records
            .write()
            .map_err(|_| StoreError::backend("poisoned lock"))?;
        let record = guard.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.is_matched = matched;
        Ok(())
    }

    fn contains(&self, id: SockId) -> bool {
        self.records
            .read()
            .map(|guard| guard.contains_key(&id))
            .unwrap_or(false)
    }

    fn search(&self, request: &SearchRequest) -> Result<Vec<Scored>, StoreError> {
        self.check_dimension(request.query.dimension())?;
        let guard = self
            .records
            .read()
            .map_err(|_| StoreError::backend("poisoned lock"))?;

        let mut hits: Vec<Scored> = guard
            .values()
            .filter(|r| r.owner == request.owner && !r.is_matched)
            .filter(|r| !request.exclude.contains(&r.sock_id))
            .map(|r| Scored {
                sock_id: r.sock_id,
                score: (request.query.cosine(&r.embedding) + 1.0) / 2.0,
            })
            .filter(|hit| hit.score >= request.threshold)
            .collect();

        sort_hits(&mut hits);
        hits.truncate(request.limit);
        Ok(hits)
    }

    fn len(&self) -> usize {
        self.records.read().map(|guard| guard.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedding::EmbeddingVector;
    use uuid::Uuid;

    fn unit(values: Vec<f32>) -> EmbeddingVector {
        EmbeddingVector::unit(values).unwrap()
    }

    fn insert(store: &ScanStore, owner: Uuid, values: Vec<f32>) -> SockId {
        let id = Uuid::new_v4();
        store
            .insert(VectorRecord {
                sock_id: id,
                owner,
                embedding: unit(values),
                is_matched: false,
            })
            .unwrap();
        id
    }

    fn request(owner: Uuid, query: Vec<f32>) -> SearchRequest {
        SearchRequest {
            owner,
            query: unit(query),
            exclude: Vec::new(),
            limit: 10,
            threshold: 0.0,
        }
    }

    #[test]
    fn scores_map_cosine_to_unit_interval() {
        let owner = Uuid::new_v4();
        let store = ScanStore::new(3);
        let same = insert(&store, owner, vec![1.0, 0.0, 0.0]);
        let opposite = insert(&store, owner, vec![-1.0, 0.0, 0.0]);

        let hits = store.search(&request(owner, vec![1.0, 0.0, 0.0])).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].sock_id, same);
        assert!((hits[0].score - 1.0).abs() < 1e-5);
        assert_eq!(hits[1].sock_id, opposite);
        assert!(hits[1].score.abs() < 1e-5);
    }

    #[test]
    fn search_is_owner_scoped() {
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let store = ScanStore::new(2);
        insert(&store, stranger, vec![1.0, 0.0]);
        let mine = insert(&store, owner, vec![1.0, 0.0]);

        let hits = store.search(&request(owner, vec![1.0, 0.0])).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].sock_id, mine);
    }

    #[test]
    fn matched_entries_are_excluded() {
        let owner = Uuid::new_v4();
        let store = ScanStore::new(2);
        let id = insert(&store, owner, vec![1.0, 0.0]);
        store.set_matched(id, true).unwrap();

        assert!(store.search(&request(owner, vec![1.0, 0.0])).unwrap().is_empty());

        store.set_matched(id, false).unwrap();
        assert_eq!(store.search(&request(owner, vec![1.0, 0.0])).unwrap().len(), 1);
    }

    #[test]
    fn exclude_list_and_limit_are_honored() {
        let owner = Uuid::new_v4();
        let store = ScanStore::new(2);
        let a = insert(&store, owner, vec![1.0, 0.0]);
        insert(&store, owner, vec![0.9, 0.1]);
        insert(&store, owner, vec![0.8, 0.2]);

        let mut req = request(owner, vec![1.0, 0.0]);
        req.exclude = vec![a];
        req.limit = 1;
        let hits = store.search(&req).unwrap();
        assert_eq!(hits.len(), 1);
        assert_ne!(hits[0].sock_id, a);
    }

    #[test]
    fn threshold_filters_low_scores() {
        let owner = Uuid::new_v4();
        let store = ScanStore::new(2);
        insert(&store, owner, vec![1.0, 0.0]);
        insert(&store, owner, vec![-1.0, 0.0]);

        let mut req = request(owner, vec![1.0, 0.0]);
        req.threshold = 0.75;
        let hits = store.search(&req).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].score >= 0.75);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let store = ScanStore::new(3);
        let err = store
            .insert(VectorRecord {
                sock_id: Uuid::new_v4(),
                owner: Uuid::new_v4(),
                embedding: unit(vec![1.0, 0.0]),
                is_matched: false,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::DimensionMismatch { expected: 3, got: 2 }));
    }

    #[test]
    fn set_matched_on_missing_entry_fails() {
        let store = ScanStore::new(2);
        let id = Uuid::new_v4();
        assert!(matches!(
            store.set_matched(id, true).unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[test]
    fn remove_is_idempotent() {
        let owner = Uuid::new_v4();
        let store = ScanStore::new(2);
        let id = insert(&store, owner, vec![1.0, 0.0]);
        store.remove(id).unwrap();
        store.remove(id).unwrap();
        assert!(!store.contains(id));
        assert!(store.is_empty());
    }
}
