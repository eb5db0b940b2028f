use std::cmp::Ordering;

use crate::search::BoostedResult;

/// Total order used for the response: final score descending, then newer first, then ids.
pub fn cmp_results(left: &BoostedResult, right: &BoostedResult) -> Ordering {
	right
		.final_score
		.total_cmp(&left.final_score)
		.then_with(|| right.fused.last_modified_at.cmp(&left.fused.last_modified_at))
		.then_with(|| left.fused.document_id.cmp(&right.fused.document_id))
		.then_with(|| left.fused.chunk_id.cmp(&right.fused.chunk_id))
}

/// Sorts and truncates to `top_k`; a zero `top_k` is treated as one.
pub fn assemble(mut results: Vec<BoostedResult>, top_k: u32) -> Vec<BoostedResult> {
	results.sort_by(cmp_results);
	results.truncate(top_k.max(1) as usize);

	results
}
