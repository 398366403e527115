//! Core records for the sock lifecycle.

use chrono::{DateTime, Utc};
use embedding::EmbeddingVector;
use features::FeatureSet;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type SockId = Uuid;
pub type OwnerId = Uuid;
pub type MatchId = Uuid;

/// Reference to a stored image file, relative to the media root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self(file_name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One sock in an owner's inventory.
///
/// `embedding` is immutable once written. The derived `features` and the
/// `no_bg_image` reference arrive later from the background pipeline;
/// `processing_complete` tells the two states apart. `is_matched` and
/// `matched_with` move together and only under a match operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SockRecord {
    pub id: SockId,
    pub owner: OwnerId,
    /// Per-owner upload counter, monotonically increasing.
    pub sequence: u64,
    pub original_image: ImageRef,
    pub no_bg_image: Option<ImageRef>,
    pub embedding: EmbeddingVector,
    pub features: FeatureSet,
    pub is_matched: bool,
    pub matched_with: Option<SockId>,
    pub processing_complete: bool,
    pub created_at: DateTime<Utc>,
    pub description: Option<String>,
}

/// A confirmed pairing of two socks. The pair is unordered: the record is
/// normalized so `sock_a < sock_b`, and [`MatchRecord::pair_key`] gives the
/// identity-independent form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: MatchId,
    pub sock_a: SockId,
    pub sock_b: SockId,
    pub owner: OwnerId,
    /// Per-owner match counter, monotonically increasing.
    pub sequence: u64,
    pub matched_at: DateTime<Utc>,
}

impl MatchRecord {
    /// Normalized pair for order-independent identity.
    pub fn pair_key(a: SockId, b: SockId) -> (SockId, SockId) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    pub fn involves(&self, id: SockId) -> bool {
        self.sock_a == id || self.sock_b == id
    }

    pub fn partner_of(&self, id: SockId) -> Option<SockId> {
        if self.sock_a == id {
            Some(self.sock_b)
        } else if self.sock_b == id {
            Some(self.sock_a)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_key_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(MatchRecord::pair_key(a, b), MatchRecord::pair_key(b, a));
        let (lo, hi) = MatchRecord::pair_key(a, b);
        assert!(lo <= hi);
    }

    #[test]
    fn partner_lookup() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (sock_a, sock_b) = MatchRecord::pair_key(a, b);
        let record = MatchRecord {
            id: Uuid::new_v4(),
            sock_a,
            sock_b,
            owner: Uuid::new_v4(),
            sequence: 1,
            matched_at: Utc::now(),
        };
        assert_eq!(record.partner_of(a), Some(b));
        assert_eq!(record.partner_of(b), Some(a));
        assert_eq!(record.partner_of(Uuid::new_v4()), None);
        assert!(record.involves(a));
    }
}
