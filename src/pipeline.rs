//! Post-upload derivation pipeline.
//!
//! Runs detached from the upload call: background removal, feature
//! extraction, and the final repository write. The sock is already stored
//! and searchable before this starts, so every failure here degrades
//! silently (logged, never surfaced) and leaves the record in the state the
//! caller last saw, with `processing_complete` still false.

use std::sync::Arc;

use features::FeatureSet;
use tracing::{debug, info, warn};

use crate::background::BackgroundRemover;
use crate::media::MediaStore;
use crate::repository::SockRepository;
use crate::types::{ImageRef, SockId};

pub(crate) struct PipelineContext {
    pub repo: Arc<dyn SockRepository>,
    pub media: Arc<MediaStore>,
    pub remover: Arc<dyn BackgroundRemover>,
}

struct Derived {
    no_bg_png: Option<Vec<u8>>,
    features: FeatureSet,
    complete: bool,
}

/// Decode, remove the background, and extract features. CPU-bound; runs on
/// the blocking pool. Removal failure falls back to extracting features from
/// the original image, with the palette-bearing steps left degraded.
fn compute(remover: &dyn BackgroundRemover, bytes: &[u8], sock_id: SockId) -> Option<Derived> {
    let image = match image::load_from_memory(bytes) {
        Ok(image) => image,
        Err(err) => {
            warn!(%sock_id, error = %err, "pipeline could not decode stored image");
            return None;
        }
    };

    match remover.remove_background(&image) {
        Ok(no_bg) => {
            let features = features::extract_features(&no_bg);
            let mut png = Vec::new();
            match no_bg.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png) {
                Ok(()) => Some(Derived {
                    no_bg_png: Some(png),
                    features,
                    complete: true,
                }),
                Err(err) => {
                    warn!(%sock_id, error = %err, "could not encode background-removed image");
                    Some(Derived {
                        no_bg_png: None,
                        features,
                        complete: false,
                    })
                }
            }
        }
        Err(err) => {
            warn!(%sock_id, error = %err, "background removal failed; deriving from original");
            // Pattern and texture still work on the original; the palette is
            // only meaningful over foreground pixels, so it stays empty.
            Some(Derived {
                no_bg_png: None,
                features: FeatureSet {
                    dominant_color: None,
                    palette: Vec::new(),
                    pattern: features::classify_pattern(&image),
                    texture: features::texture_descriptor(&image),
                },
                complete: false,
            })
        }
    }
}

pub(crate) async fn derive_features(ctx: PipelineContext, sock_id: SockId, original: ImageRef) {
    let bytes = match ctx.media.load(&original).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(%sock_id, error = %err, "pipeline could not read original image");
            return;
        }
    };

    let remover = ctx.remover.clone();
    let derived = tokio::task::spawn_blocking(move || compute(remover.as_ref(), &bytes, sock_id));
    let Ok(Some(derived)) = derived.await else {
        return;
    };

    let mut complete = derived.complete;
    let no_bg_image = match derived.no_bg_png {
        Some(png) => match ctx.media.save(&format!("{sock_id}-nobg.png"), png).await {
            Ok(image) => Some(image),
            Err(err) => {
                warn!(%sock_id, error = %err, "could not persist background-removed image");
                complete = false;
                None
            }
        },
        None => None,
    };

    match ctx
        .repo
        .apply_derived(sock_id, no_bg_image, derived.features, complete)
    {
        Ok(()) => info!(%sock_id, complete, "derived features persisted"),
        // The sock can be deleted while derivation is in flight.
        Err(err) => debug!(%sock_id, error = %err, "skipping derived-feature write"),
    }
}
