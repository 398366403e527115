use std::collections::HashMap;
use std::sync::RwLock;

use hnsw_rs::prelude::{DistCosine, Hnsw, Neighbour};

use crate::{sort_hits, Scored, SearchRequest, SockId, StoreError, VectorRecord, VectorStore};

/// Tuning knobs for the HNSW backend.
#[derive(Debug, Clone)]
pub struct AnnConfig {
    /// Max connections per node per layer.
    pub m: usize,
    /// Candidate-list size during index construction.
    pub ef_construction: usize,
    /// Candidate-list size during search.
    pub ef_search: usize,
    /// Below this many vectors the backend answers with an exact linear pass
    /// instead of the graph; HNSW recall is poor on tiny datasets.
    pub min_vectors_for_ann: usize,
    /// Extra candidates requested from the graph per excluded / filtered-out
    /// entry, so post-filtering still fills `limit`.
    pub oversample: usize,
}

impl Default for AnnConfig {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 50,
            min_vectors_for_ann: 100,
            oversample: 4,
        }
    }
}

impl AnnConfig {
    pub fn with_m(mut self, m: usize) -> Self {
        self.m = m;
        self
    }

    pub fn with_ef_construction(mut self, ef: usize) -> Self {
        self.ef_construction = ef;
        self
    }

    pub fn with_ef_search(mut self, ef: usize) -> Self {
        self.ef_search = ef;
        self
    }

    pub fn with_min_vectors_for_ann(mut self, min: usize) -> Self {
        self.min_vectors_for_ann = min;
        self
    }

    pub fn with_oversample(mut self, oversample: usize) -> Self {
        self.oversample = oversample.max(1);
        self
    }
}

/// A built graph plus the slot -> sock id mapping it was built against.
struct BuiltIndex {
    hnsw: Hnsw<'static, f32, DistCosine>,
    ids: Vec<SockId>,
}

struct AnnInner {
    entries: HashMap<SockId, VectorRecord>,
    built: Option<BuiltIndex>,
    dirty: bool,
}

/// HNSW-indexed backend. Reports similarity as `1 - cosine_distance`, i.e.
/// the raw cosine in [-1, 1].
///
/// Mutations mark the index dirty; the graph is rebuilt lazily on the next
/// search. Owner scoping, the matched flag, exclusions and the threshold are
/// applied after the graph query, with oversampling to keep `limit` filled.
pub struct AnnStore {
    dimension: usize,
    config: AnnConfig,
    inner: RwLock<AnnInner>,
}

impl AnnStore {
    pub fn new(dimension: usize, config: AnnConfig) -> Self {
        Self {
            dimension,
            config,
            inner: RwLock::new(AnnInner {
                entries: HashMap::new(),
                built: None,
                dirty: false,
            }),
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

    /// Exact pass over the entry map; used below `min_vectors_for_ann` and
    /// whenever no graph is available.
    fn linear_search(inner: &AnnInner, request: &SearchRequest) -> Vec<Scored> {
        let mut hits: Vec<Scored> = inner
            .entries
            .values()
            .filter(|r| r.owner == request.owner && !r.is_matched)
            .filter(|r| !request.exclude.contains(&r.sock_id))
            .map(|r| Scored {
                sock_id: r.sock_id,
                score: request.query.cosine(&r.embedding),
            })
            .filter(|hit| hit.score >= request.threshold)
            .collect();
        sort_hits(&mut hits);
        hits.truncate(request.limit);
        hits
    }

    fn rebuild(inner: &mut AnnInner, config: &AnnConfig) {
        inner.built = None;
        inner.dirty = false;

        let nb_elem = inner.entries.len();
        if nb_elem == 0 {
            return;
        }

        // Stable insertion order so repeated rebuilds over the same entries
        // produce the same graph.
        let mut records: Vec<&VectorRecord> = inner.entries.values().collect();
        records.sort_by_key(|r| r.sock_id);

        let nb_layer = 16.min((nb_elem as f32).ln().trunc() as usize).max(1);
        let hnsw = Hnsw::<f32, DistCosine>::new(
            config.m,
            nb_elem,
            nb_layer,
            config.ef_construction,
            DistCosine {},
        );

        let vectors: Vec<Vec<f32>> = records
            .iter()
            .map(|r| r.embedding.as_slice().to_vec())
            .collect();
        let data_for_insertion: Vec<(&Vec<f32>, usize)> = vectors
            .iter()
            .enumerate()
            .map(|(slot, vec)| (vec, slot))
            .collect();
        hnsw.parallel_insert(&data_for_insertion);

        inner.built = Some(BuiltIndex {
            hnsw,
            ids: records.iter().map(|r| r.sock_id).collect(),
        });
    }

    fn graph_search(inner: &AnnInner, config: &AnnConfig, request: &SearchRequest) -> Vec<Scored> {
        let Some(built) = inner.built.as_ref() else {
            return Self::linear_search(inner, request);
        };

        // Over-fetch so owner/matched/exclude filtering can still fill the
        // requested limit.
        let k = ((request.limit + request.exclude.len()) * config.oversample)
            .max(config.ef_search)
            .min(inner.entries.len());
        let neighbours: Vec<Neighbour> =
            built
                .hnsw
                .search(request.query.as_slice(), k, config.ef_search);

        let mut hits: Vec<Scored> = neighbours
            .into_iter()
            .filter_map(|neighbour| {
                let sock_id = *built.ids.get(neighbour.get_origin_id())?;
                let record = inner.entries.get(&sock_id)?;
                if record.owner != request.owner
                    || record.is_matched
                    || request.exclude.contains(&sock_id)
                {
                    return None;
                }
                Some(Scored {
                    sock_id,
                    score: 1.0 - neighbour.distance,
                })
            })
            .filter(|hit| hit.score >= request.threshold)
            .collect();

        sort_hits(&mut hits);
        hits.truncate(request.limit);
        hits
    }
}

impl VectorStore for AnnStore {
    fn insert(&self, record: VectorRecord) -> Result<(), StoreError> {
        self.check_dimension(record.embedding.dimension())?;
        let mut inner = self
            .inner
            .write()
            .map_err(|_| StoreError::backend("poisoned lock"))?;
        inner.entries.insert(record.sock_id, record);
        inner.dirty = true;
        Ok(())
    }

    fn remove(&self, id: SockId) -> Result<(), StoreError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| StoreError::backend("poisoned lock"))?;
        if inner.entries.remove(&id).is_some() {
            inner.dirty = true;
        }
        Ok(())
    }

    fn set_matched(&self, id: SockId, matched: bool) -> Result<(), StoreError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| StoreError::backend("poisoned lock"))?;
        let record = inner.entries.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        // Matched state is applied as a post-filter, no rebuild needed.
        record.is_matched = matched;
        Ok(())
    }

    fn contains(&self, id: SockId) -> bool {
        self.inner
            .read()
            .map(|inner| inner.entries.contains_key(&id))
            .unwrap_or(false)
    }

    fn search(&self, request: &SearchRequest) -> Result<Vec<Scored>, StoreError> {
        self.check_dimension(request.query.dimension())?;

        {
            let inner = self
                .inner
                .read()
                .map_err(|_| StoreError::backend("poisoned lock"))?;
            if inner.entries.len() < self.config.min_vectors_for_ann {
                return Ok(Self::linear_search(&inner, request));
            }
            if !inner.dirty {
                return Ok(Self::graph_search(&inner, &self.config, request));
            }
        }

        let mut inner = self
            .inner
            .write()
            .map_err(|_| StoreError::backend("poisoned lock"))?;
        if inner.dirty {
            Self::rebuild(&mut inner, &self.config);
        }
        Ok(Self::graph_search(&inner, &self.config, request))
    }

    fn len(&self) -> usize {
        self.inner
            .read()
            .map(|inner| inner.entries.len())
            .unwrap_or(0)
    }
}
