//! # labelscan Matching
//!
//! Field-name disambiguation for OCR output.
//!
//! - [`EmbeddingProvider`] / [`OpenAiEmbedder`] - text to vector
//! - [`EmbeddingIndex`] - durable, append-only term to vector cache
//! - [`FieldMatcher`] - raw key to canonical field by cosine similarity
//! - [`Normalizer`] - raw OCR map to [`labelscan_core::CanonicalFieldMap`]

pub mod embedder;
pub mod index;
pub mod matcher;
pub mod normalizer;

pub use embedder::{
    EmbeddingProvider, OpenAiEmbedder, DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_EMBEDDING_MODEL,
};
pub use index::EmbeddingIndex;
pub use matcher::{accepts, FieldMatch, FieldMatcher, ACCEPTANCE_THRESHOLD, BRAND_KEY};
pub use normalizer::{split_capacity, Normalizer, SenderContext, AUTOMATED_SENDER};
