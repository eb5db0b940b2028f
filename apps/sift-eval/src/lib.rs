//! Offline relevance evaluation: replays recorded backend lists through the full search
//! pipeline and scores the ranked output against expected documents.

use std::{
	collections::HashSet,
	fs,
	path::{Path, PathBuf},
	sync::Arc,
	time::Instant,
};

use clap::Parser;
use color_eyre::eyre;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use sift_config::{BackendConfig, Config, ProviderConfig};
use sift_domain::{AliasMap, QueryClass};
use sift_providers::{BoxFuture, SearchHit};
use sift_service::{
	Backend, KeywordSearchProvider, Providers, RerankProvider, SearchRequest,
	SemanticSearchProvider, SiftService,
};

#[derive(Debug, Parser)]
#[command(
	version = sift_cli::VERSION,
	rename_all = "kebab",
	styles = sift_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[arg(long, short = 'd', value_name = "FILE")]
	pub dataset: PathBuf,
	/// Overrides `people.path` from the config.
	#[arg(long, short = 'p', value_name = "FILE")]
	pub people: Option<PathBuf>,
	/// Overrides every query's `top_k`.
	#[arg(long, value_name = "N")]
	pub top_k: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct EvalDataset {
	name: Option<String>,
	/// RFC 3339 reference time for recency boosting; defaults to the current time.
	now: Option<String>,
	queries: Vec<EvalQuery>,
}

#[derive(Debug, Deserialize)]
struct EvalQuery {
	id: Option<String>,
	query: String,
	top_k: Option<u32>,
	#[serde(default)]
	semantic: Vec<Value>,
	#[serde(default)]
	keyword: Vec<Value>,
	/// Backends that should fail for this query.
	#[serde(default)]
	unavailable: Vec<Backend>,
	expected_document_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct EvalOutput {
	pub dataset: EvalDatasetInfo,
	pub settings: EvalSettings,
	pub summary: EvalSummary,
	pub queries: Vec<QueryReport>,
}

#[derive(Debug, Serialize)]
pub struct EvalDatasetInfo {
	pub name: String,
	pub query_count: usize,
}

#[derive(Debug, Serialize)]
pub struct EvalSettings {
	pub config_path: String,
	pub people_path: Option<String>,
	pub alias_version: u32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub top_k: Option<u32>,
	#[serde(with = "sift_service::time_serde")]
	pub now: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct EvalSummary {
	pub avg_recall_at_k: f64,
	pub avg_precision_at_k: f64,
	pub mean_rr: f64,
	pub mean_ndcg: f64,
	pub latency_ms_p50: f64,
	pub latency_ms_p95: f64,
	pub degraded_count: usize,
	pub failed_count: usize,
}

#[derive(Debug, Serialize)]
pub struct QueryReport {
	pub id: String,
	pub query: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub trace_id: Option<Uuid>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub class: Option<QueryClass>,
	pub expected_count: usize,
	pub retrieved_count: usize,
	pub relevant_count: usize,
	pub recall_at_k: f64,
	pub precision_at_k: f64,
	pub rr: f64,
	pub ndcg: f64,
	pub latency_ms: f64,
	pub degraded: bool,
	pub reranked: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	pub expected_document_ids: Vec<String>,
	pub retrieved_document_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Metrics {
	recall_at_k: f64,
	precision_at_k: f64,
	rr: f64,
	ndcg: f64,
	relevant_count: usize,
}

/// Serves one query's recorded hit list, or fails when the dataset marks the backend down.
struct ReplayBackend {
	hits: Option<Vec<SearchHit>>,
}
impl ReplayBackend {
	fn respond(&self, limit: u32) -> BoxFuture<'_, sift_providers::Result<Vec<SearchHit>>> {
		let hits = self.hits.as_ref().map(|hits| hits.iter().take(limit as usize).cloned().collect());

		Box::pin(async move {
			hits.ok_or_else(|| sift_providers::Error::InvalidResponse {
				message: "Backend marked unavailable by the dataset.".to_string(),
			})
		})
	}
}
impl SemanticSearchProvider for ReplayBackend {
	fn search<'a>(
		&'a self,
		_cfg: &'a BackendConfig,
		_query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, sift_providers::Result<Vec<SearchHit>>> {
		self.respond(limit)
	}
}
impl KeywordSearchProvider for ReplayBackend {
	fn search<'a>(
		&'a self,
		_cfg: &'a BackendConfig,
		_query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, sift_providers::Result<Vec<SearchHit>>> {
		self.respond(limit)
	}
}

/// Stands in for the reranker during replay so no request leaves the process.
struct OfflineReranker;
impl RerankProvider for OfflineReranker {
	fn rerank<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		_query: &'a str,
		_docs: &'a [String],
	) -> BoxFuture<'a, sift_providers::Result<Vec<f32>>> {
		Box::pin(async move {
			Err(sift_providers::Error::InvalidConfig {
				message: "Reranking is not available during offline replay.".to_string(),
			})
		})
	}
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = sift_config::load(&args.config)?;

	init_tracing(&config)?;

	let output = evaluate(&args, config).await?;
	let json = serde_json::to_string_pretty(&output)?;

	println!("{json}");

	Ok(())
}

/// Replays the dataset named in `args` against `config`.
pub async fn evaluate(args: &Args, mut config: Config) -> color_eyre::Result<EvalOutput> {
	if let Some(people) = &args.people {
		config.people.path = Some(people.display().to_string());
	}
	if config.rerank.enabled {
		return Err(eyre::eyre!(
			"Offline replay has no recorded rerank scores. Set rerank.enabled = false in the eval config."
		));
	}

	let dataset = load_dataset(&args.dataset)?;
	let now = match dataset.now.as_deref() {
		Some(raw) => OffsetDateTime::parse(raw, &Rfc3339)
			.map_err(|err| eyre::eyre!("Dataset now must be RFC 3339: {err}."))?,
		None => OffsetDateTime::now_utc(),
	};
	let people_path = config.people.path.clone();
	let aliases = match people_path.as_deref() {
		Some(path) => AliasMap::build(&sift_config::load_people(Path::new(path))?)?,
		None => AliasMap::empty(),
	};
	let alias_version = aliases.version();
	let mut service = SiftService::with_providers(
		config,
		aliases,
		Providers::new(
			Arc::new(ReplayBackend { hits: Some(Vec::new()) }),
			Arc::new(ReplayBackend { hits: Some(Vec::new()) }),
			Arc::new(OfflineReranker),
		),
	);
	let mut reports = Vec::with_capacity(dataset.queries.len());
	let mut latencies_ms = Vec::with_capacity(dataset.queries.len());

	for (index, query) in dataset.queries.into_iter().enumerate() {
		let report = eval_query(&mut service, index, query, args.top_k, now).await?;

		latencies_ms.push(report.latency_ms);
		reports.push(report);
	}

	let summary = summarize(&reports, &latencies_ms);

	Ok(EvalOutput {
		dataset: EvalDatasetInfo {
			name: dataset.name.unwrap_or_else(|| "eval".to_string()),
			query_count: reports.len(),
		},
		settings: EvalSettings {
			config_path: args.config.display().to_string(),
			people_path,
			alias_version,
			top_k: args.top_k,
			now,
		},
		summary,
		queries: reports,
	})
}

fn init_tracing(config: &Config) -> color_eyre::Result<()> {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	Ok(())
}

fn load_dataset(path: &Path) -> color_eyre::Result<EvalDataset> {
	let raw = fs::read_to_string(path)?;
	let dataset: EvalDataset = serde_json::from_str(&raw)?;

	if dataset.queries.is_empty() {
		return Err(eyre::eyre!("Dataset must include at least one query."));
	}

	Ok(dataset)
}

async fn eval_query(
	service: &mut SiftService,
	index: usize,
	query: EvalQuery,
	top_k_override: Option<u32>,
	now: OffsetDateTime,
) -> color_eyre::Result<QueryReport> {
	let id = query.id.clone().unwrap_or_else(|| format!("q{}", index + 1));
	let semantic = replay_hits(&id, Backend::Semantic, &query)?;
	let keyword = replay_hits(&id, Backend::Keyword, &query)?;

	service.providers = Providers::new(
		Arc::new(ReplayBackend { hits: semantic }),
		Arc::new(ReplayBackend { hits: keyword }),
		service.providers.rerank.clone(),
	);

	let mut request = SearchRequest::new(query.query.clone());

	request.top_k = top_k_override.or(query.top_k);

	let expected: HashSet<&str> = query.expected_document_ids.iter().map(String::as_str).collect();
	let started = Instant::now();
	let result = service.search_at(request, now).await;
	let latency_ms = started.elapsed().as_secs_f64() * 1_000.0;
	let mut report = QueryReport {
		id,
		query: query.query.clone(),
		trace_id: None,
		class: None,
		expected_count: expected.len(),
		retrieved_count: 0,
		relevant_count: 0,
		recall_at_k: 0.0,
		precision_at_k: 0.0,
		rr: 0.0,
		ndcg: 0.0,
		latency_ms,
		degraded: false,
		reranked: false,
		error: None,
		expected_document_ids: query.expected_document_ids.clone(),
		retrieved_document_ids: Vec::new(),
	};

	match result {
		Ok(response) => {
			let retrieved = unique_ids(response.items.iter().map(|item| item.document_id.as_str()));
			let metrics = compute_metrics(&retrieved, &expected);

			report.trace_id = Some(response.trace_id);
			report.class = Some(response.query.class);
			report.retrieved_count = retrieved.len();
			report.relevant_count = metrics.relevant_count;
			report.recall_at_k = metrics.recall_at_k;
			report.precision_at_k = metrics.precision_at_k;
			report.rr = metrics.rr;
			report.ndcg = metrics.ndcg;
			report.degraded = response.degraded;
			report.reranked = response.reranked;
			report.retrieved_document_ids = retrieved;
		},
		Err(sift_service::Error::InvalidRequest { message }) => {
			return Err(eyre::eyre!("Query {} is invalid: {message}", report.id));
		},
		Err(err) => {
			tracing::warn!(query_id = %report.id, error = %err, "Query failed during replay.");

			report.error = Some(err.to_string());
		},
	}

	Ok(report)
}

fn replay_hits(
	id: &str,
	backend: Backend,
	query: &EvalQuery,
) -> color_eyre::Result<Option<Vec<SearchHit>>> {
	if query.unavailable.contains(&backend) {
		return Ok(None);
	}

	let raw = match backend {
		Backend::Semantic => &query.semantic,
		Backend::Keyword => &query.keyword,
	};
	let hits = sift_providers::hits::parse_hits(serde_json::json!({ "results": raw }))
		.map_err(|err| eyre::eyre!("Query {id} has invalid {} hits: {err}", backend.as_str()))?;

	Ok(Some(hits))
}

fn unique_ids<'a, I>(iter: I) -> Vec<String>
where
	I: IntoIterator<Item = &'a str>,
{
	let mut seen = HashSet::new();
	let mut out = Vec::new();

	for id in iter {
		if seen.insert(id) {
			out.push(id.to_string());
		}
	}

	out
}

fn compute_metrics(retrieved: &[String], expected: &HashSet<&str>) -> Metrics {
	let expected_count = expected.len();
	let mut relevant_count = 0_usize;
	let mut dcg = 0.0_f64;
	let mut first_hit: Option<usize> = None;

	for (idx, id) in retrieved.iter().enumerate() {
		if expected.contains(id.as_str()) {
			let rank = idx + 1;

			relevant_count += 1;
			dcg += 1.0 / (rank as f64 + 1.0).log2();

			if first_hit.is_none() {
				first_hit = Some(rank);
			}
		}
	}

	let rr = first_hit.map_or(0.0, |rank| 1.0 / rank as f64);
	let idcg: f64 = (1..=expected_count.min(retrieved.len()))
		.map(|rank| 1.0 / (rank as f64 + 1.0).log2())
		.sum();
	let ndcg = if idcg > 0.0 { dcg / idcg } else { 0.0 };
	let precision_at_k =
		if retrieved.is_empty() { 0.0 } else { relevant_count as f64 / retrieved.len() as f64 };
	let recall_at_k =
		if expected_count == 0 { 0.0 } else { relevant_count as f64 / expected_count as f64 };

	Metrics { recall_at_k, precision_at_k, rr, ndcg, relevant_count }
}

fn summarize(reports: &[QueryReport], latencies_ms: &[f64]) -> EvalSummary {
	let count = reports.len().max(1) as f64;
	let avg_recall_at_k = reports.iter().map(|r| r.recall_at_k).sum::<f64>() / count;
	let avg_precision_at_k = reports.iter().map(|r| r.precision_at_k).sum::<f64>() / count;
	let mean_rr = reports.iter().map(|r| r.rr).sum::<f64>() / count;
	let mean_ndcg = reports.iter().map(|r| r.ndcg).sum::<f64>() / count;
	let mut sorted = latencies_ms.to_vec();

	sorted.sort_by(|a, b| a.total_cmp(b));

	EvalSummary {
		avg_recall_at_k,
		avg_precision_at_k,
		mean_rr,
		mean_ndcg,
		latency_ms_p50: percentile(&sorted, 0.50),
		latency_ms_p95: percentile(&sorted, 0.95),
		degraded_count: reports.iter().filter(|r| r.degraded).count(),
		failed_count: reports.iter().filter(|r| r.error.is_some()).count(),
	}
}

fn percentile(values: &[f64], percentile: f64) -> f64 {
	if values.is_empty() {
		return 0.0;
	}

	let clamped = percentile.clamp(0.0, 1.0);
	let pos = clamped * (values.len() as f64 - 1.0);
	let lower = pos.floor() as usize;
	let upper = pos.ceil() as usize;

	if lower == upper {
		values[lower]
	} else {
		let weight = pos - lower as f64;

		values[lower] * (1.0 - weight) + values[upper] * weight
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashSet;

	use super::{compute_metrics, percentile, unique_ids};

	#[test]
	fn metrics_reward_early_relevant_results() {
		let retrieved = vec!["a".to_string(), "b".to_string(), "c".to_string()];
		let expected: HashSet<&str> = ["b", "z"].into_iter().collect();
		let metrics = compute_metrics(&retrieved, &expected);

		assert_eq!(metrics.relevant_count, 1);
		assert_eq!(metrics.rr, 0.5);
		assert_eq!(metrics.recall_at_k, 0.5);
		assert!((metrics.precision_at_k - 1.0 / 3.0).abs() < 1e-12);

		let ideal = 1.0 + 1.0 / 3_f64.log2();
		let actual = 1.0 / 3_f64.log2();

		assert!((metrics.ndcg - actual / ideal).abs() < 1e-12);
	}

	#[test]
	fn metrics_are_zero_without_results() {
		let expected: HashSet<&str> = ["a"].into_iter().collect();
		let metrics = compute_metrics(&[], &expected);

		assert_eq!(metrics.rr, 0.0);
		assert_eq!(metrics.ndcg, 0.0);
		assert_eq!(metrics.precision_at_k, 0.0);
	}

	#[test]
	fn percentile_interpolates() {
		let values = [10.0, 20.0, 30.0, 40.0];

		assert_eq!(percentile(&values, 0.0), 10.0);
		assert_eq!(percentile(&values, 1.0), 40.0);
		assert!((percentile(&values, 0.5) - 25.0).abs() < 1e-12);
		assert_eq!(percentile(&[], 0.5), 0.0);
	}

	#[test]
	fn unique_ids_keep_first_occurrence() {
		assert_eq!(unique_ids(["b", "a", "b"]), vec!["b".to_string(), "a".to_string()]);
	}
}
