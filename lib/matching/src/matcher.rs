//! Semantic field matcher: resolves arbitrary OCR keys to canonical fields
//! by cosine similarity against the fixed vocabulary.

use crate::index::EmbeddingIndex;
use labelscan_core::CanonicalField;
use std::sync::Arc;
use tracing::{debug, warn};

/// Minimum similarity for a match; a score equal to the threshold is accepted
pub const ACCEPTANCE_THRESHOLD: f32 = 0.70;

/// Raw key that always resolves to [`CanonicalField::Make`]
pub const BRAND_KEY: &str = "brand";

#[inline]
pub fn accepts(score: f32) -> bool {
    score >= ACCEPTANCE_THRESHOLD
}

/// Best candidate for a raw key, before the threshold is applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldMatch {
    pub field: CanonicalField,
    pub score: f32,
}

impl FieldMatch {
    #[inline]
    pub fn is_accepted(&self) -> bool {
        accepts(self.score)
    }
}

#[derive(Clone)]
pub struct FieldMatcher {
    index: Arc<EmbeddingIndex>,
}

impl FieldMatcher {
    pub fn new(index: Arc<EmbeddingIndex>) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &Arc<EmbeddingIndex> {
        &self.index
    }

    /// Highest-scoring vocabulary entry for `raw_key`.
    ///
    /// Vocabulary entries are scanned in [`CanonicalField::ALL`] order and a
    /// later entry must score strictly higher to replace the current best.
    /// Entries whose embedding is unavailable or whose score is not finite
    /// are skipped. Returns `None` when the key itself cannot be embedded.
    pub async fn best_match(&self, raw_key: &str) -> Option<FieldMatch> {
        let query = match self.index.get_embedding(raw_key).await {
            Ok(v) => v,
            Err(e) => {
                warn!("No embedding for key {:?}, treating as unmatched: {}", raw_key, e);
                return None;
            }
        };

        let mut best: Option<FieldMatch> = None;
        for field in CanonicalField::ALL {
            let candidate = match self.index.get_embedding(field.as_str()).await {
                Ok(v) => v,
                Err(e) => {
                    debug!("Skipping vocabulary term {}: {}", field, e);
                    continue;
                }
            };

            let score = query.cosine_similarity(&candidate);
            if !score.is_finite() {
                debug!("Skipping vocabulary term {}: non-finite score", field);
                continue;
            }
            if best.map_or(true, |b| score > b.score) {
                best = Some(FieldMatch { field, score });
            }
        }
        best
    }

    /// Canonical field for `raw_key`, or `None` when nothing clears the
    /// acceptance threshold.
    pub async fn match_key(&self, raw_key: &str) -> Option<CanonicalField> {
        if raw_key == BRAND_KEY {
            return Some(CanonicalField::Make);
        }
        if let Some(field) = CanonicalField::from_name(raw_key) {
            return Some(field);
        }

        let best = self.best_match(raw_key).await?;
        if best.is_accepted() {
            debug!("Matched {:?} -> {} ({:.4})", raw_key, best.field, best.score);
            Some(best.field)
        } else {
            debug!(
                "No match for {:?}: best {} scored {:.4}",
                raw_key, best.field, best.score
            );
            None
        }
    }
}
