mod assemble;
mod boost;
mod fusion;
mod rerank;

pub use assemble::{assemble, cmp_results};
pub use boost::{BoostContext, boost, days_since, filename_multiplier, recency_multiplier};
pub use fusion::{DEFAULT_RRF_K, fuse, rrf_contribution};
pub use rerank::{RerankSplit, apply_rerank_scores, rerank_document, split_for_rerank};
