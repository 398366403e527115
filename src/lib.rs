//! Sock feature and similarity matching engine.
//!
//! Turns sock photos into unit-normalized embeddings plus perceptual
//! features (color palette, pattern class, texture descriptor), stores them
//! behind a pluggable vector index, and runs the match lifecycle: upload,
//! ranked partner search, confirmation, and dissolution.
//!
//! The heavy lifting lives in the workspace crates and is re-exported here:
//!
//! - [`embedding`] — the provider trait and the deterministic default model,
//! - [`features`] — palette / pattern / texture extraction,
//! - [`store`] — the ANN-indexed and brute-force search backends,
//! - [`matcher`] — request validation and candidate ranking.
//!
//! This crate adds the lifecycle on top: [`SockService`] embeds
//! synchronously on upload so the sock is immediately searchable, then a
//! detached pipeline task removes the background and derives features.
//! Pipeline failures degrade silently; uploads only fail when the image
//! cannot be decoded or embedded.

pub mod background;
pub mod config;
pub mod error;
pub mod media;
mod pipeline;
pub mod repository;
pub mod service;
pub mod types;

pub use background::{BackgroundError, BackgroundRemover, BorderKeyRemover};
pub use config::ServiceConfig;
pub use error::ServiceError;
pub use media::MediaStore;
pub use repository::{InMemoryRepository, SockRepository};
pub use service::SockService;
pub use types::{ImageRef, MatchId, MatchRecord, OwnerId, SockId, SockRecord};

pub use embedding::{
    EmbeddingConfig, EmbeddingError, EmbeddingProvider, EmbeddingVector, MosaicEmbedder,
};
pub use features::{extract_features, FeatureSet, PatternLabel, TextureDescriptor};
pub use matcher::{color_similarity, MatchCandidate, MatchConfig, MatchEngine, MatchError};
pub use store::{BackendConfig, Scored, SearchRequest, StoreError, VectorRecord, VectorStore};
