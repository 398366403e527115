//! Public service API over the full stack: embedding, storage, matching,
//! media, and the post-upload pipeline.

use std::sync::{Arc, Mutex};

use embedding::{EmbeddingError, EmbeddingProvider, MosaicEmbedder};
use features::FeatureSet;
use matcher::{MatchCandidate, MatchConfig, MatchEngine};
use store::{VectorRecord, VectorStore};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::background::{BackgroundRemover, BorderKeyRemover};
use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::media::MediaStore;
use crate::pipeline::{self, PipelineContext};
use crate::repository::{InMemoryRepository, SockRepository};
use crate::types::{MatchId, MatchRecord, OwnerId, SockId, SockRecord};

/// Orchestrates the sock lifecycle. Construct once per process and share.
pub struct SockService {
    provider: Arc<dyn EmbeddingProvider>,
    repo: Arc<dyn SockRepository>,
    store: Arc<dyn VectorStore>,
    engine: MatchEngine,
    media: Arc<MediaStore>,
    remover: Arc<dyn BackgroundRemover>,
    pipelines: Mutex<Vec<JoinHandle<()>>>,
}

impl SockService {
    /// Build a service with the bundled provider, repository, and remover.
    pub fn new(config: ServiceConfig) -> Result<Self, ServiceError> {
        let provider = Arc::new(MosaicEmbedder::new(config.embedding.clone()));
        Self::with_parts(
            config,
            provider,
            Arc::new(InMemoryRepository::new()),
            Arc::new(BorderKeyRemover::default()),
        )
    }

    /// Build a service around host-provided seams; the vector store is built
    /// from the configured backend.
    pub fn with_parts(
        config: ServiceConfig,
        provider: Arc<dyn EmbeddingProvider>,
        repo: Arc<dyn SockRepository>,
        remover: Arc<dyn BackgroundRemover>,
    ) -> Result<Self, ServiceError> {
        let store = config.backend.build(provider.dimension());
        Self::with_store(config, provider, repo, store, remover)
    }

    /// Build a service around a host-provided vector store.
    pub fn with_store(
        config: ServiceConfig,
        provider: Arc<dyn EmbeddingProvider>,
        repo: Arc<dyn SockRepository>,
        store: Arc<dyn VectorStore>,
        remover: Arc<dyn BackgroundRemover>,
    ) -> Result<Self, ServiceError> {
        let engine = MatchEngine::new(
            store.clone(),
            MatchConfig::default()
                .with_threshold(config.match_threshold)
                .with_limit(config.match_limit)
                .with_oversample_factor(config.oversample_factor),
        )?;
        let media = Arc::new(MediaStore::new(&config.media_dir)?);
        Ok(Self {
            provider,
            repo,
            store,
            engine,
            media,
            remover,
            pipelines: Mutex::new(Vec::new()),
        })
    }

    pub fn media(&self) -> &MediaStore {
        &self.media
    }

    /// Ingest a sock photo. The embedding is computed before this returns,
    /// so the sock is immediately searchable; derived features arrive from a
    /// detached pipeline task. Decode or inference failure aborts the upload
    /// and leaves no record or file behind.
    pub async fn upload_sock(
        &self,
        owner: OwnerId,
        image_bytes: Vec<u8>,
        description: Option<String>,
    ) -> Result<SockRecord, ServiceError> {
        let id = Uuid::new_v4();
        let original = self
            .media
            .save(&format!("{id}-original.png"), image_bytes.clone())
            .await?;

        let provider = self.provider.clone();
        let embedded = tokio::task::spawn_blocking(move || provider.embed(&image_bytes))
            .await
            .map_err(|err| EmbeddingError::Inference(err.to_string()))?;
        let embedding = match embedded {
            Ok(embedding) => embedding,
            Err(err) => {
                if let Err(cleanup) = self.media.delete(&original).await {
                    warn!(sock_id = %id, error = %cleanup, "could not remove orphaned upload file");
                }
                return Err(err.into());
            }
        };

        let record = SockRecord {
            id,
            owner,
            sequence: self.repo.next_sock_sequence(owner),
            original_image: original,
            no_bg_image: None,
            embedding: embedding.clone(),
            features: FeatureSet::default(),
            is_matched: false,
            matched_with: None,
            processing_complete: false,
            created_at: chrono::Utc::now(),
            description,
        };
        if let Err(err) = self.repo.insert_sock(record.clone()) {
            self.discard_upload_file(&record).await;
            return Err(err);
        }
        if let Err(err) = self.store.insert(VectorRecord {
            sock_id: id,
            owner,
            embedding,
            is_matched: false,
        }) {
            // Undo the repository row so the failed upload leaves nothing.
            if let Err(rollback) = self.repo.remove_sock(owner, id) {
                warn!(sock_id = %id, error = %rollback, "could not roll back sock row after store failure");
            }
            self.discard_upload_file(&record).await;
            return Err(err.into());
        }

        let ctx = PipelineContext {
            repo: self.repo.clone(),
            media: self.media.clone(),
            remover: self.remover.clone(),
        };
        let handle = tokio::spawn(pipeline::derive_features(
            ctx,
            id,
            record.original_image.clone(),
        ));
        self.track(handle);

        info!(sock_id = %id, %owner, sequence = record.sequence, "sock uploaded");
        Ok(record)
    }

    /// Ranked partner candidates for one of the owner's socks, excluding the
    /// sock itself and every already-matched sock.
    pub async fn search_matches(
        &self,
        owner: OwnerId,
        sock_id: SockId,
    ) -> Result<Vec<MatchCandidate>, ServiceError> {
        let sock = self.repo.sock(owner, sock_id)?;
        Ok(self
            .engine
            .find_candidates(owner, &sock.embedding, &[sock_id])?)
    }

    /// Pair two socks. Atomic in the repository: a concurrent confirmation
    /// of an overlapping pair loses with `AlreadyMatched`, and no rejection
    /// mutates anything. The vector-store projection is flipped just after
    /// the repository commit, so a search racing a confirmation may still
    /// list the pair for that instant; if a flip fails, the match is rolled
    /// back and the error returned.
    pub async fn confirm_match(
        &self,
        owner: OwnerId,
        a: SockId,
        b: SockId,
    ) -> Result<MatchRecord, ServiceError> {
        let record = self.repo.create_match(owner, a, b)?;
        let flipped = self
            .store
            .set_matched(a, true)
            .and_then(|()| self.store.set_matched(b, true));
        if let Err(err) = flipped {
            // Only `a` can have flipped at this point; undo it and drop the
            // match so the repository and the store projection agree.
            if let Err(reset) = self.store.set_matched(a, false) {
                warn!(sock_id = %a, error = %reset, "could not reset matched flag");
            }
            if let Err(rollback) = self.repo.remove_match(owner, record.id, true) {
                warn!(match_id = %record.id, error = %rollback, "could not roll back match after store failure");
            }
            return Err(err.into());
        }
        info!(match_id = %record.id, %owner, sock_a = %record.sock_a, sock_b = %record.sock_b, "match confirmed");
        Ok(record)
    }

    /// Dissolve a match. `decouple = true` returns both socks to the
    /// unmatched pool; `false` deletes both sock records along with their
    /// vector entries and image files.
    pub async fn delete_match(
        &self,
        owner: OwnerId,
        match_id: MatchId,
        decouple: bool,
    ) -> Result<(), ServiceError> {
        let (record, removed) = self.repo.remove_match(owner, match_id, decouple)?;

        match removed {
            None => {
                self.store.set_matched(record.sock_a, false)?;
                self.store.set_matched(record.sock_b, false)?;
                info!(match_id = %record.id, %owner, "match dissolved; socks decoupled");
            }
            Some((sock_a, sock_b)) => {
                for sock in [&sock_a, &sock_b] {
                    self.store.remove(sock.id)?;
                    self.delete_images(sock).await;
                }
                info!(match_id = %record.id, %owner, "match and both socks deleted");
            }
        }
        Ok(())
    }

    /// Delete an unmatched sock, its vector entry, and its image files.
    /// Rejected while the sock is part of an active match.
    pub async fn delete_sock(&self, owner: OwnerId, sock_id: SockId) -> Result<(), ServiceError> {
        let sock = self.repo.remove_sock(owner, sock_id)?;
        self.store.remove(sock_id)?;
        self.delete_images(&sock).await;
        info!(%sock_id, %owner, "sock deleted");
        Ok(())
    }

    pub async fn get_sock(&self, owner: OwnerId, sock_id: SockId) -> Result<SockRecord, ServiceError> {
        self.repo.sock(owner, sock_id)
    }

    pub async fn list_socks(&self, owner: OwnerId, unmatched_only: bool) -> Vec<SockRecord> {
        self.repo.socks(owner, unmatched_only)
    }

    pub async fn get_match(&self, owner: OwnerId, match_id: MatchId) -> Result<MatchRecord, ServiceError> {
        self.repo.match_record(owner, match_id)
    }

    pub async fn list_matches(&self, owner: OwnerId) -> Vec<MatchRecord> {
        self.repo.matches(owner)
    }

    /// Wait for every spawned derivation task to settle. The service never
    /// needs this itself; tests and graceful shutdown do.
    pub async fn await_pipelines(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut guard = self
                .pipelines
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.drain(..).collect()
        };
        for handle in handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "derivation task panicked");
            }
        }
    }

    fn track(&self, handle: JoinHandle<()>) {
        self.pipelines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(handle);
    }

    async fn discard_upload_file(&self, record: &SockRecord) {
        if let Err(cleanup) = self.media.delete(&record.original_image).await {
            warn!(sock_id = %record.id, error = %cleanup, "could not remove orphaned upload file");
        }
    }

    async fn delete_images(&self, sock: &SockRecord) {
        if let Err(err) = self.media.delete(&sock.original_image).await {
            warn!(sock_id = %sock.id, error = %err, "could not delete original image");
        }
        if let Some(no_bg) = &sock.no_bg_image {
            if let Err(err) = self.media.delete(no_bg).await {
                warn!(sock_id = %sock.id, error = %err, "could not delete background-removed image");
            }
        }
    }
}
