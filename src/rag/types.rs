//! Document and retrieval result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A document row from `kb_documents`.
///
/// The embedding is fixed-dimension (768, matching the embedding backend's
/// output) and backed by a Postgres `vector` column; a generated `tsvector`
/// column over `text` backs the BM25 half of hybrid search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub text: String,
    pub source: String,
    pub source_label: String,
    pub created_at: DateTime<Utc>,
}

/// One retrieved passage plus the per-candidate scoring trail, used to build
/// the `rag_debug` block attached to history records.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedPassage {
    pub id: Uuid,
    pub text: String,
    pub source_label: String,
    pub similarity: Option<f64>,
    pub bm25_rank: Option<f64>,
    pub rrf_score: f64,
}

/// Per-source debug trail: how many results were returned, the effective
/// topK/threshold, and a sample of scored results. Never sent to the model.
#[derive(Debug, Clone, Serialize, Default)]
pub struct SourceDebug {
    pub count: usize,
    pub top_k: u32,
    pub threshold: f64,
    pub sample: Vec<RetrievedPassage>,
}

/// Effective per-source retrieval limits after quota defaulting.
#[derive(Debug, Clone, Copy)]
pub struct EffectiveQuota {
    pub top_k: u32,
    pub threshold: f64,
}
