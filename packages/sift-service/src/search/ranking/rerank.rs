use sift_domain::QueryClass;

use crate::search::BoostedResult;

/// The rerank head split into results that keep their position and results the reranker may
/// reorder.
#[derive(Clone, Debug, Default)]
pub struct RerankSplit {
	pub pinned: Vec<BoostedResult>,
	pub pool: Vec<BoostedResult>,
}

/// Text sent to the reranker for one result.
pub fn rerank_document(result: &BoostedResult) -> String {
	let snippet = result.fused.content_snippet.trim();

	if snippet.is_empty() {
		return result.fused.file_name.clone();
	}

	format!("{}\n{}", result.fused.file_name, snippet)
}

/// Factual queries pin results whose keyword rank is within `protect_top_keyword`.
pub fn split_for_rerank(
	head: Vec<BoostedResult>,
	class: QueryClass,
	protect_top_keyword: u32,
) -> RerankSplit {
	if class != QueryClass::Factual || protect_top_keyword == 0 {
		return RerankSplit { pinned: Vec::new(), pool: head };
	}

	let (pinned, pool) = head.into_iter().partition(|result| {
		result.fused.keyword_rank.is_some_and(|rank| rank <= protect_top_keyword)
	});

	RerankSplit { pinned, pool }
}

/// Orders the pool by reranker score (ties keep the boosted order) behind the pinned results.
///
/// Returns `None` when the score list does not line up with the pool.
pub fn apply_rerank_scores(
	split: RerankSplit,
	scores: &[f32],
) -> Option<Vec<(BoostedResult, Option<f32>)>> {
	if scores.len() != split.pool.len() || scores.iter().any(|score| !score.is_finite()) {
		return None;
	}

	let mut scored: Vec<(BoostedResult, Option<f32>)> =
		split.pool.into_iter().zip(scores.iter().copied().map(Some)).collect();

	scored.sort_by(|left, right| {
		let left = left.1.unwrap_or(f32::NEG_INFINITY);
		let right = right.1.unwrap_or(f32::NEG_INFINITY);

		right.total_cmp(&left)
	});

	let mut ordered: Vec<(BoostedResult, Option<f32>)> =
		split.pinned.into_iter().map(|result| (result, None)).collect();

	ordered.extend(scored);

	Some(ordered)
}
