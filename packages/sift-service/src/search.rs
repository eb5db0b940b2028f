pub mod ranking;
pub mod retrieval;

use std::{collections::BTreeSet, future::Future, time::Duration};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, Result, SiftService};
use ranking::{BoostContext, RerankSplit};
use sift_config::ProviderConfig;
use sift_domain::QueryClass;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
	Semantic,
	Keyword,
}
impl Backend {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Semantic => "semantic",
			Self::Keyword => "keyword",
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
	Timeout,
	Error,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BackendFailure {
	pub backend: Backend,
	pub kind: FailureKind,
	pub reason: String,
}

/// One hit from one backend. `rank` is 1-based and is the only value fusion reads.
#[derive(Clone, Debug, PartialEq)]
pub struct CandidateResult {
	pub document_id: String,
	pub chunk_id: String,
	pub backend: Backend,
	pub rank: u32,
	pub raw_score: f64,
	pub file_name: String,
	pub folder_path: String,
	pub last_modified_at: OffsetDateTime,
	pub content_snippet: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FusedResult {
	pub document_id: String,
	pub chunk_id: String,
	pub fused_score: f64,
	pub contributing_backends: BTreeSet<Backend>,
	pub semantic_rank: Option<u32>,
	pub keyword_rank: Option<u32>,
	pub file_name: String,
	pub folder_path: String,
	pub last_modified_at: OffsetDateTime,
	pub content_snippet: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BoostedResult {
	pub fused: FusedResult,
	pub recency_multiplier: f64,
	pub filename_multiplier: f64,
	pub final_score: f64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SearchRequest {
	pub query: String,
	#[serde(default)]
	pub top_k: Option<u32>,
	#[serde(default)]
	pub options: SearchOptions,
}
impl SearchRequest {
	pub fn new(query: impl Into<String>) -> Self {
		Self { query: query.into(), ..Default::default() }
	}

	pub fn with_top_k(mut self, top_k: u32) -> Self {
		self.top_k = Some(top_k);

		self
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchOptions {
	/// Overrides `search.rrf_k`.
	#[serde(default)]
	pub rrf_k: Option<f64>,
	/// Per-backend candidate pool size.
	#[serde(default)]
	pub candidate_k: Option<u32>,
	#[serde(default = "default_allow_rerank")]
	pub allow_rerank: bool,
}
impl Default for SearchOptions {
	fn default() -> Self {
		Self { rrf_k: None, candidate_k: None, allow_rerank: true }
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryInfo {
	pub raw: String,
	pub expanded: String,
	pub sanitized: String,
	pub mentioned_people: BTreeSet<String>,
	pub class: QueryClass,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchExplain {
	pub fused_score: f64,
	pub semantic_rank: Option<u32>,
	pub keyword_rank: Option<u32>,
	pub contributing_backends: BTreeSet<Backend>,
	pub recency_multiplier: f64,
	pub filename_multiplier: f64,
	pub rerank_score: Option<f32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchItem {
	pub rank: u32,
	pub document_id: String,
	pub chunk_id: String,
	pub file_name: String,
	pub folder_path: String,
	#[serde(with = "crate::time_serde")]
	pub last_modified_at: OffsetDateTime,
	pub content_snippet: String,
	pub final_score: f64,
	pub explain: SearchExplain,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResponse {
	pub trace_id: Uuid,
	pub query: QueryInfo,
	pub items: Vec<SearchItem>,
	/// Set when one backend failed or timed out and the list comes from the other alone.
	pub degraded: bool,
	pub backend_failures: Vec<BackendFailure>,
	pub reranked: bool,
	pub rerank_fallback: bool,
	pub alias_version: u32,
}

#[derive(Clone, Copy, Debug)]
struct SearchPlan {
	top_k: u32,
	pool_size: u32,
	rrf_k: f64,
}

struct RerankOutcome {
	ordered: Vec<(BoostedResult, Option<f32>)>,
	reranked: bool,
	fallback: bool,
}

impl SiftService {
	pub async fn search(&self, req: SearchRequest) -> Result<SearchResponse> {
		self.search_at(req, OffsetDateTime::now_utc()).await
	}

	/// Races the search against `cancel`; in-flight backend calls are dropped when it resolves
	/// first.
	pub async fn search_with_cancel<F>(&self, req: SearchRequest, cancel: F) -> Result<SearchResponse>
	where
		F: Future<Output = ()>,
	{
		tokio::select! {
			biased;
			_ = cancel => {
				tracing::info!("Search cancelled.");

				Err(Error::Cancelled)
			},
			result = self.search(req) => result,
		}
	}

	/// Runs the pipeline with `now` as the reference time for recency boosting.
	pub async fn search_at(&self, req: SearchRequest, now: OffsetDateTime) -> Result<SearchResponse> {
		let plan = self.plan(&req)?;
		let trace_id = Uuid::new_v4();
		let aliases = self.aliases.snapshot();
		let raw = req.query.trim();
		let expansion = sift_domain::expand(raw, &aliases);
		let terms = sift_domain::keyword_terms(&expansion.expanded_text);
		let sanitized = terms.join(" ");
		let keyword_query = sift_domain::or_query(&terms);
		let class = sift_domain::classify(raw);
		let retrieval = retrieval::retrieve(
			&self.cfg,
			&self.providers,
			&expansion.expanded_text,
			&keyword_query,
			plan.pool_size,
		)
		.await?;

		tracing::debug!(
			trace_id = %trace_id,
			semantic_count = retrieval.semantic.len(),
			keyword_count = retrieval.keyword.len(),
			keyword_skipped = retrieval.keyword_skipped,
			"Retrieval joined."
		);

		let degraded = retrieval.degraded();
		let backend_failures = retrieval.failures;
		let fused = ranking::fuse(retrieval.semantic, retrieval.keyword, plan.rrf_k);
		let ctx = BoostContext {
			now,
			mentioned_people: &expansion.mentioned_people,
			policy: &self.cfg.boost,
		};
		let boosted = ranking::boost(fused, &ctx);
		let rerank_cfg = self.rerank_target(&req);
		let window = match rerank_cfg {
			Some(_) => plan.top_k.max(self.cfg.rerank.top_n),
			None => plan.top_k,
		};
		let assembled = ranking::assemble(boosted, window);
		let outcome = match rerank_cfg {
			Some(provider_cfg) if assembled.len() >= 2 =>
				self.rerank_stage(provider_cfg, &expansion.expanded_text, class, assembled).await,
			_ => RerankOutcome {
				ordered: assembled.into_iter().map(|result| (result, None)).collect(),
				reranked: false,
				fallback: false,
			},
		};
		let items: Vec<SearchItem> = outcome
			.ordered
			.into_iter()
			.take(plan.top_k as usize)
			.enumerate()
			.map(|(idx, (result, rerank_score))| to_item(idx as u32 + 1, result, rerank_score))
			.collect();

		tracing::info!(
			trace_id = %trace_id,
			class = class.as_str(),
			item_count = items.len(),
			degraded,
			reranked = outcome.reranked,
			rerank_fallback = outcome.fallback,
			alias_version = aliases.version(),
			"Search completed."
		);

		Ok(SearchResponse {
			trace_id,
			query: QueryInfo {
				raw: raw.to_string(),
				expanded: expansion.expanded_text,
				sanitized,
				mentioned_people: expansion.mentioned_people,
				class,
			},
			items,
			degraded,
			backend_failures,
			reranked: outcome.reranked,
			rerank_fallback: outcome.fallback,
			alias_version: aliases.version(),
		})
	}

	fn plan(&self, req: &SearchRequest) -> Result<SearchPlan> {
		let search = &self.cfg.search;
		let query = req.query.trim();

		if query.is_empty() {
			return Err(Error::InvalidRequest { message: "query must be non-empty.".to_string() });
		}
		if query.chars().count() > search.max_query_chars as usize {
			return Err(Error::InvalidRequest {
				message: format!("query must be at most {} characters.", search.max_query_chars),
			});
		}

		let top_k = req.top_k.unwrap_or(search.default_top_k);

		if top_k == 0 || top_k > search.max_top_k {
			return Err(Error::InvalidRequest {
				message: format!("top_k must be in the range 1-{}.", search.max_top_k),
			});
		}

		let rrf_k = req.options.rrf_k.unwrap_or(search.rrf_k);

		if !rrf_k.is_finite() || rrf_k <= 0.0 {
			return Err(Error::InvalidRequest {
				message: "options.rrf_k must be a finite number greater than zero.".to_string(),
			});
		}

		let pool_size = match req.options.candidate_k {
			Some(candidate_k) => {
				if candidate_k < top_k || candidate_k > search.max_candidate_k {
					return Err(Error::InvalidRequest {
						message: format!(
							"options.candidate_k must be in the range {top_k}-{}.",
							search.max_candidate_k
						),
					});
				}

				candidate_k
			},
			None => top_k
				.saturating_mul(search.candidate_multiplier)
				.clamp(top_k, search.max_candidate_k.max(top_k)),
		};

		Ok(SearchPlan { top_k, pool_size, rrf_k })
	}

	fn rerank_target(&self, req: &SearchRequest) -> Option<&ProviderConfig> {
		if !self.cfg.rerank.enabled || !req.options.allow_rerank {
			return None;
		}

		self.cfg.providers.rerank.as_ref()
	}

	async fn rerank_stage(
		&self,
		provider_cfg: &ProviderConfig,
		query: &str,
		class: QueryClass,
		mut assembled: Vec<BoostedResult>,
	) -> RerankOutcome {
		let head_len = assembled.len().min(self.cfg.rerank.top_n as usize);
		let tail = assembled.split_off(head_len);
		let split = ranking::split_for_rerank(assembled, class, self.cfg.rerank.protect_top_keyword);

		if split.pool.len() < 2 {
			return RerankOutcome {
				ordered: boosted_order(split, tail),
				reranked: false,
				fallback: false,
			};
		}

		let docs: Vec<String> = split.pool.iter().map(ranking::rerank_document).collect();
		let call = self.providers.rerank.rerank(provider_cfg, query, &docs);
		let scores =
			match tokio::time::timeout(Duration::from_millis(provider_cfg.timeout_ms), call).await {
				Ok(Ok(scores)) => scores,
				Ok(Err(err)) => {
					tracing::warn!(error = %err, "Rerank failed. Keeping boosted order.");

					return RerankOutcome {
						ordered: boosted_order(split, tail),
						reranked: false,
						fallback: true,
					};
				},
				Err(_) => {
					tracing::warn!(
						timeout_ms = provider_cfg.timeout_ms,
						"Rerank timed out. Keeping boosted order."
					);

					return RerankOutcome {
						ordered: boosted_order(split, tail),
						reranked: false,
						fallback: true,
					};
				},
			};

		match ranking::apply_rerank_scores(split.clone(), &scores) {
			Some(mut ordered) => {
				ordered.extend(tail.into_iter().map(|result| (result, None)));

				RerankOutcome { ordered, reranked: true, fallback: false }
			},
			None => {
				tracing::warn!(
					expected = split.pool.len(),
					got = scores.len(),
					"Rerank scores did not match candidates. Keeping boosted order."
				);

				RerankOutcome { ordered: boosted_order(split, tail), reranked: false, fallback: true }
			},
		}
	}
}

fn default_allow_rerank() -> bool {
	true
}

// Restores the assembled order after the head was split for reranking.
fn boosted_order(split: RerankSplit, tail: Vec<BoostedResult>) -> Vec<(BoostedResult, Option<f32>)> {
	let mut head: Vec<BoostedResult> = split.pinned.into_iter().chain(split.pool).collect();

	head.sort_by(ranking::cmp_results);

	head.into_iter().chain(tail).map(|result| (result, None)).collect()
}

fn to_item(rank: u32, result: BoostedResult, rerank_score: Option<f32>) -> SearchItem {
	let BoostedResult { fused, recency_multiplier, filename_multiplier, final_score } = result;

	SearchItem {
		rank,
		document_id: fused.document_id,
		chunk_id: fused.chunk_id,
		file_name: fused.file_name,
		folder_path: fused.folder_path,
		last_modified_at: fused.last_modified_at,
		content_snippet: fused.content_snippet,
		final_score,
		explain: SearchExplain {
			fused_score: fused.fused_score,
			semantic_rank: fused.semantic_rank,
			keyword_rank: fused.keyword_rank,
			contributing_backends: fused.contributing_backends,
			recency_multiplier,
			filename_multiplier,
			rerank_score,
		},
	}
}
