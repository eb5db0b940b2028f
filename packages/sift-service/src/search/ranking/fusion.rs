//! Reciprocal rank fusion: `score = Σ 1 / (k + rank)` over the backends a result appears in.
//!
//! Only rank positions enter the score. Backend raw scores live on different scales and are
//! never read here.

use std::collections::{BTreeSet, HashMap};

use crate::search::{Backend, CandidateResult, FusedResult};

pub const DEFAULT_RRF_K: f64 = 60.0;

pub fn rrf_contribution(k: f64, rank: u32) -> f64 {
	1.0 / (k + rank as f64)
}

/// Merges the two ranked lists into one entry per `(document_id, chunk_id)`.
///
/// A result listed twice by the same backend counts once, at its best rank. Metadata comes from
/// the first occurrence, semantic list first. Output is sorted by fused score descending, then
/// by identifiers ascending.
pub fn fuse(
	semantic: Vec<CandidateResult>,
	keyword: Vec<CandidateResult>,
	k: f64,
) -> Vec<FusedResult> {
	let mut index: HashMap<(String, String), usize> = HashMap::new();
	let mut merged: Vec<FusedResult> = Vec::with_capacity(semantic.len() + keyword.len());

	for candidate in semantic.into_iter().chain(keyword) {
		let key = (candidate.document_id.clone(), candidate.chunk_id.clone());
		let slot = match index.get(&key) {
			Some(slot) => *slot,
			None => {
				index.insert(key, merged.len());
				merged.push(FusedResult {
					document_id: candidate.document_id.clone(),
					chunk_id: candidate.chunk_id.clone(),
					fused_score: 0.0,
					contributing_backends: BTreeSet::new(),
					semantic_rank: None,
					keyword_rank: None,
					file_name: candidate.file_name.clone(),
					folder_path: candidate.folder_path.clone(),
					last_modified_at: candidate.last_modified_at,
					content_snippet: candidate.content_snippet.clone(),
				});

				merged.len() - 1
			},
		};
		let entry = &mut merged[slot];
		let rank_slot = match candidate.backend {
			Backend::Semantic => &mut entry.semantic_rank,
			Backend::Keyword => &mut entry.keyword_rank,
		};

		*rank_slot = Some(rank_slot.map_or(candidate.rank, |rank| rank.min(candidate.rank)));

		entry.contributing_backends.insert(candidate.backend);
	}

	for entry in &mut merged {
		entry.fused_score = [entry.semantic_rank, entry.keyword_rank]
			.into_iter()
			.flatten()
			.map(|rank| rrf_contribution(k, rank))
			.sum();
	}

	merged.sort_by(|left, right| {
		right
			.fused_score
			.total_cmp(&left.fused_score)
			.then_with(|| left.document_id.cmp(&right.document_id))
			.then_with(|| left.chunk_id.cmp(&right.chunk_id))
	});

	merged
}

#[cfg(test)]
mod tests {
	use time::macros::datetime;

	use super::{DEFAULT_RRF_K, fuse, rrf_contribution};
	use crate::search::{Backend, CandidateResult};

	fn candidate(document_id: &str, backend: Backend, rank: u32) -> CandidateResult {
		CandidateResult {
			document_id: document_id.to_string(),
			chunk_id: format!("{document_id}#0"),
			backend,
			rank,
			raw_score: 100.0 / rank as f64,
			file_name: format!("{document_id}.md"),
			folder_path: "notes".to_string(),
			last_modified_at: datetime!(2026-01-01 00:00 UTC),
			content_snippet: String::new(),
		}
	}

	#[test]
	fn shared_result_sums_both_contributions() {
		let fused = fuse(
			vec![candidate("doc_b", Backend::Semantic, 1), candidate("doc_a", Backend::Semantic, 2)],
			vec![candidate("doc_a", Backend::Keyword, 1), candidate("doc_c", Backend::Keyword, 2)],
			DEFAULT_RRF_K,
		);
		let ids: Vec<&str> = fused.iter().map(|entry| entry.document_id.as_str()).collect();

		assert_eq!(ids, vec!["doc_a", "doc_b", "doc_c"]);
		assert!((fused[0].fused_score - (1.0 / 62.0 + 1.0 / 61.0)).abs() < 1e-12);
		assert!((fused[1].fused_score - 1.0 / 61.0).abs() < 1e-12);
		assert!((fused[2].fused_score - 1.0 / 62.0).abs() < 1e-12);
		assert_eq!(fused[0].contributing_backends.len(), 2);
		assert_eq!(fused[0].semantic_rank, Some(2));
		assert_eq!(fused[0].keyword_rank, Some(1));
	}

	#[test]
	fn both_lists_beat_either_single_list_at_same_rank() {
		for r1 in 1..=20_u32 {
			for r2 in 1..=20_u32 {
				let fused = fuse(
					vec![candidate("doc", Backend::Semantic, r1)],
					vec![candidate("doc", Backend::Keyword, r2)],
					DEFAULT_RRF_K,
				);
				let expected = 1.0 / (60.0 + r1 as f64) + 1.0 / (60.0 + r2 as f64);

				assert_eq!(fused.len(), 1);
				assert!((fused[0].fused_score - expected).abs() < 1e-12);
				assert!(fused[0].fused_score > rrf_contribution(DEFAULT_RRF_K, r1));
				assert!(fused[0].fused_score > rrf_contribution(DEFAULT_RRF_K, r2));
			}
		}
	}

	#[test]
	fn raw_scores_do_not_influence_fusion() {
		let mut loud = candidate("loud", Backend::Keyword, 2);
		let mut quiet = candidate("quiet", Backend::Keyword, 1);

		loud.raw_score = 1_000_000.0;
		quiet.raw_score = 0.000_1;

		let fused = fuse(Vec::new(), vec![loud, quiet], DEFAULT_RRF_K);

		assert_eq!(fused[0].document_id, "quiet");
	}

	#[test]
	fn duplicate_within_one_backend_counts_once_at_best_rank() {
		let fused = fuse(
			vec![candidate("doc", Backend::Semantic, 3), candidate("doc", Backend::Semantic, 1)],
			Vec::new(),
			DEFAULT_RRF_K,
		);

		assert_eq!(fused.len(), 1);
		assert!((fused[0].fused_score - 1.0 / 61.0).abs() < 1e-12);
	}

	#[test]
	fn chunks_of_one_document_stay_distinct() {
		let mut other_chunk = candidate("doc", Backend::Keyword, 1);

		other_chunk.chunk_id = "doc#7".to_string();

		let fused =
			fuse(vec![candidate("doc", Backend::Semantic, 1)], vec![other_chunk], DEFAULT_RRF_K);

		assert_eq!(fused.len(), 2);
		assert_eq!(fused[0].chunk_id, "doc#0");
		assert_eq!(fused[1].chunk_id, "doc#7");
	}

	#[test]
	fn empty_inputs_fuse_to_nothing() {
		assert!(fuse(Vec::new(), Vec::new(), DEFAULT_RRF_K).is_empty());
	}
}
