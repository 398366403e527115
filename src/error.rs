use embedding::EmbeddingError;
use matcher::MatchError;
use store::StoreError;
use thiserror::Error;

use crate::types::{MatchId, SockId};

/// Errors surfaced by the sock service. Rejections (`NotFound`, `Ownership`,
/// `AlreadyMatched`, `SameSock`) happen before any mutation.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store failed: {0}")]
    Store(#[from] StoreError),

    #[error("match engine failed: {0}")]
    Match(#[from] MatchError),

    #[error("sock not found: {0}")]
    SockNotFound(SockId),

    #[error("match not found: {0}")]
    MatchNotFound(MatchId),

    #[error("sock {0} belongs to another owner")]
    Ownership(SockId),

    #[error("sock {0} is already part of a match")]
    AlreadyMatched(SockId),

    #[error("a sock cannot be matched with itself")]
    SameSock,

    #[error("media i/o failed: {0}")]
    Media(String),
}

impl ServiceError {
    pub(crate) fn media<E: std::fmt::Display>(err: E) -> Self {
        Self::Media(err.to_string())
    }
}
