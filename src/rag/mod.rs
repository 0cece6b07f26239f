//! Hybrid Retrieval Engine (C2).
//!
//! Corresponds to `kb-service/agent_executor.py::_resolve_rag` and
//! `kb-service/tools/kb_search.py`, generalized into per-source quotas,
//! hybrid BM25+vector scoring with reciprocal rank fusion, Turkish synonym
//! expansion, and alias-based prompt injection.

pub mod core;
pub mod rrf;
pub mod synonyms;
pub mod types;

pub use core::{retrieve_and_inject, RagOutcome};
pub use types::{Document, RetrievedPassage, SourceDebug};
