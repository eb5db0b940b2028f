//! Concurrent fan-out to the semantic and keyword backends.

use std::{collections::HashSet, time::Duration};

use crate::{
	BoxFuture, Error, Providers, Result,
	search::{Backend, BackendFailure, CandidateResult, FailureKind},
};
use sift_config::Config;
use sift_providers::SearchHit;

const KEYWORD_SKIPPED: &str = "Skipped: no keyword terms after sanitizing.";

/// Ranked candidate lists that survived the fan-out, plus what failed.
#[derive(Clone, Debug, Default)]
pub struct Retrieval {
	pub semantic: Vec<CandidateResult>,
	pub keyword: Vec<CandidateResult>,
	pub failures: Vec<BackendFailure>,
	pub keyword_skipped: bool,
}
impl Retrieval {
	pub fn degraded(&self) -> bool {
		!self.failures.is_empty()
	}

	fn absorb(
		&mut self,
		backend: Backend,
		outcome: BackendOutcome,
		pool_size: u32,
	) -> Vec<CandidateResult> {
		match outcome {
			BackendOutcome::Hits(hits) => to_candidates(backend, hits, pool_size),
			BackendOutcome::Skipped => {
				self.keyword_skipped = true;

				Vec::new()
			},
			BackendOutcome::Failed(failure) => {
				self.failures.push(failure);

				Vec::new()
			},
		}
	}
}

enum BackendOutcome {
	Hits(Vec<SearchHit>),
	Skipped,
	Failed(BackendFailure),
}

/// Queries both backends at once, each bounded by its own timeout.
///
/// The semantic backend receives `expanded_query`; the keyword backend receives the OR-joined
/// `keyword_query` and is skipped when that is empty. Fails only when no backend produced a list.
pub async fn retrieve(
	cfg: &Config,
	providers: &Providers,
	expanded_query: &str,
	keyword_query: &str,
	pool_size: u32,
) -> Result<Retrieval> {
	let semantic_cfg = &cfg.providers.semantic;
	let keyword_cfg = &cfg.providers.keyword;
	let semantic = call_backend(
		Backend::Semantic,
		semantic_cfg.timeout_ms,
		providers.semantic.search(semantic_cfg, expanded_query, pool_size),
	);
	let keyword = async {
		if keyword_query.trim().is_empty() {
			return BackendOutcome::Skipped;
		}

		call_backend(
			Backend::Keyword,
			keyword_cfg.timeout_ms,
			providers.keyword.search(keyword_cfg, keyword_query, pool_size),
		)
		.await
	};
	let (semantic, keyword) = tokio::join!(semantic, keyword);
	let mut retrieval = Retrieval::default();

	match (semantic, keyword) {
		(BackendOutcome::Failed(semantic), BackendOutcome::Failed(keyword)) => {
			tracing::error!(
				semantic = %semantic.reason,
				keyword = %keyword.reason,
				"All retrieval backends failed."
			);

			return Err(Error::RetrievalUnavailable {
				semantic: semantic.reason,
				keyword: keyword.reason,
			});
		},
		(BackendOutcome::Failed(semantic), BackendOutcome::Skipped) => {
			tracing::error!(
				semantic = %semantic.reason,
				"Semantic backend failed and the keyword query is empty."
			);

			return Err(Error::RetrievalUnavailable {
				semantic: semantic.reason,
				keyword: KEYWORD_SKIPPED.to_string(),
			});
		},
		(semantic, keyword) => {
			retrieval.semantic = retrieval.absorb(Backend::Semantic, semantic, pool_size);
			retrieval.keyword = retrieval.absorb(Backend::Keyword, keyword, pool_size);
		},
	}

	if retrieval.degraded() {
		tracing::warn!(
			failed = ?retrieval.failures.iter().map(|failure| failure.backend.as_str()).collect::<Vec<_>>(),
			"Serving a degraded result from the surviving backend."
		);
	}

	Ok(retrieval)
}

async fn call_backend(
	backend: Backend,
	timeout_ms: u64,
	call: BoxFuture<'_, sift_providers::Result<Vec<SearchHit>>>,
) -> BackendOutcome {
	match tokio::time::timeout(Duration::from_millis(timeout_ms), call).await {
		Ok(Ok(hits)) => BackendOutcome::Hits(hits),
		Ok(Err(err)) => {
			tracing::warn!(backend = backend.as_str(), error = %err, "Backend search failed.");

			BackendOutcome::Failed(BackendFailure {
				backend,
				kind: FailureKind::Error,
				reason: err.to_string(),
			})
		},
		Err(_) => {
			tracing::warn!(backend = backend.as_str(), timeout_ms, "Backend search timed out.");

			BackendOutcome::Failed(BackendFailure {
				backend,
				kind: FailureKind::Timeout,
				reason: format!("Timed out after {timeout_ms} ms."),
			})
		},
	}
}

/// Drops repeated `(document_id, chunk_id)` pairs, keeps the first `pool_size`, and assigns
/// 1-based ranks by position.
pub fn to_candidates(backend: Backend, hits: Vec<SearchHit>, pool_size: u32) -> Vec<CandidateResult> {
	let mut seen = HashSet::new();

	hits.into_iter()
		.filter(|hit| seen.insert((hit.document_id.clone(), hit.chunk_id.clone())))
		.take(pool_size as usize)
		.enumerate()
		.map(|(idx, hit)| CandidateResult {
			document_id: hit.document_id,
			chunk_id: hit.chunk_id,
			backend,
			rank: idx as u32 + 1,
			raw_score: hit.score,
			file_name: hit.file_name,
			folder_path: hit.folder_path,
			last_modified_at: hit.last_modified_at,
			content_snippet: hit.content_snippet,
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use time::macros::datetime;

	use super::to_candidates;
	use crate::search::Backend;
	use sift_providers::SearchHit;

	fn hit(document_id: &str, chunk_id: &str) -> SearchHit {
		SearchHit {
			document_id: document_id.to_string(),
			chunk_id: chunk_id.to_string(),
			file_name: format!("{document_id}.md"),
			folder_path: String::new(),
			last_modified_at: datetime!(2026-01-01 00:00 UTC),
			content_snippet: String::new(),
			score: 1.0,
		}
	}

	#[test]
	fn candidates_are_deduplicated_truncated_and_ranked() {
		let hits = vec![hit("a", "a#0"), hit("a", "a#0"), hit("a", "a#1"), hit("b", "b#0"), hit("c", "c#0")];
		let candidates = to_candidates(Backend::Keyword, hits, 3);
		let keys: Vec<(&str, u32)> =
			candidates.iter().map(|candidate| (candidate.chunk_id.as_str(), candidate.rank)).collect();

		assert_eq!(keys, vec![("a#0", 1), ("a#1", 2), ("b#0", 3)]);
		assert!(candidates.iter().all(|candidate| candidate.backend == Backend::Keyword));
	}
}
