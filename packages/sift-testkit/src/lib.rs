//! Fake collaborators and fixtures for exercising the search pipeline without live backends.

mod error;

pub use error::{Error, Result};

use std::{
	env, fs, future,
	path::{Path, PathBuf},
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use serde_json::Map;
use time::OffsetDateTime;
use uuid::Uuid;

use sift_config::{
	BackendConfig, Boost, Config, People, PeopleConfig, Person, ProviderConfig, Providers, Rerank,
	Search, Service,
};
use sift_providers::{
	BoxFuture, Error as ProviderError, KeywordSearchProvider, RerankProvider, SearchHit,
	SemanticSearchProvider,
};

type ProviderResult<T> = sift_providers::Result<T>;

/// Returns a fixed hit list and records every query it receives.
#[derive(Clone, Debug, Default)]
pub struct StaticBackend {
	hits: Vec<SearchHit>,
	queries: Arc<Mutex<Vec<(String, u32)>>>,
}
impl StaticBackend {
	pub fn new(hits: Vec<SearchHit>) -> Self {
		Self { hits, queries: Arc::default() }
	}

	/// `(query, limit)` pairs in call order.
	pub fn queries(&self) -> Vec<(String, u32)> {
		self.queries.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn call_count(&self) -> usize {
		self.queries().len()
	}

	fn respond<'a>(&'a self, query: &'a str, limit: u32) -> BoxFuture<'a, ProviderResult<Vec<SearchHit>>> {
		self.queries.lock().unwrap_or_else(|err| err.into_inner()).push((query.to_string(), limit));

		let hits: Vec<SearchHit> = self.hits.iter().take(limit as usize).cloned().collect();

		Box::pin(async move { Ok(hits) })
	}
}
impl SemanticSearchProvider for StaticBackend {
	fn search<'a>(
		&'a self,
		_cfg: &'a BackendConfig,
		query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, ProviderResult<Vec<SearchHit>>> {
		self.respond(query, limit)
	}
}
impl KeywordSearchProvider for StaticBackend {
	fn search<'a>(
		&'a self,
		_cfg: &'a BackendConfig,
		query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, ProviderResult<Vec<SearchHit>>> {
		self.respond(query, limit)
	}
}

/// Fails every call with an invalid-response error.
#[derive(Clone, Debug, Default)]
pub struct FailingBackend {
	calls: Arc<AtomicUsize>,
}
impl FailingBackend {
	pub fn call_count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	fn respond<'a>(&'a self) -> BoxFuture<'a, ProviderResult<Vec<SearchHit>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move {
			Err(ProviderError::InvalidResponse { message: "Backend unavailable.".to_string() })
		})
	}
}
impl SemanticSearchProvider for FailingBackend {
	fn search<'a>(
		&'a self,
		_cfg: &'a BackendConfig,
		_query: &'a str,
		_limit: u32,
	) -> BoxFuture<'a, ProviderResult<Vec<SearchHit>>> {
		self.respond()
	}
}
impl KeywordSearchProvider for FailingBackend {
	fn search<'a>(
		&'a self,
		_cfg: &'a BackendConfig,
		_query: &'a str,
		_limit: u32,
	) -> BoxFuture<'a, ProviderResult<Vec<SearchHit>>> {
		self.respond()
	}
}

/// Never completes. Tracks how many calls are currently parked so tests can observe that
/// timeouts and cancellation drop them.
#[derive(Clone, Debug, Default)]
pub struct StallingBackend {
	started: Arc<AtomicUsize>,
	in_flight: Arc<AtomicUsize>,
}
impl StallingBackend {
	pub fn started(&self) -> usize {
		self.started.load(Ordering::SeqCst)
	}

	pub fn in_flight(&self) -> usize {
		self.in_flight.load(Ordering::SeqCst)
	}

	fn respond<'a>(&'a self) -> BoxFuture<'a, ProviderResult<Vec<SearchHit>>> {
		let started = self.started.clone();
		let in_flight = self.in_flight.clone();

		Box::pin(async move {
			started.fetch_add(1, Ordering::SeqCst);

			let _guard = InFlight::enter(in_flight);

			future::pending::<()>().await;

			Ok(Vec::new())
		})
	}
}
impl SemanticSearchProvider for StallingBackend {
	fn search<'a>(
		&'a self,
		_cfg: &'a BackendConfig,
		_query: &'a str,
		_limit: u32,
	) -> BoxFuture<'a, ProviderResult<Vec<SearchHit>>> {
		self.respond()
	}
}
impl KeywordSearchProvider for StallingBackend {
	fn search<'a>(
		&'a self,
		_cfg: &'a BackendConfig,
		_query: &'a str,
		_limit: u32,
	) -> BoxFuture<'a, ProviderResult<Vec<SearchHit>>> {
		self.respond()
	}
}

struct InFlight(Arc<AtomicUsize>);
impl InFlight {
	fn enter(counter: Arc<AtomicUsize>) -> Self {
		counter.fetch_add(1, Ordering::SeqCst);

		Self(counter)
	}
}
impl Drop for InFlight {
	fn drop(&mut self) {
		self.0.fetch_sub(1, Ordering::SeqCst);
	}
}

/// Scores documents by looking up a keyword in each document text; unmatched documents get 0.
#[derive(Clone, Debug, Default)]
pub struct ScriptedReranker {
	scores: Vec<(String, f32)>,
	calls: Arc<Mutex<Vec<Vec<String>>>>,
}
impl ScriptedReranker {
	pub fn new<I, S>(scores: I) -> Self
	where
		I: IntoIterator<Item = (S, f32)>,
		S: Into<String>,
	{
		Self {
			scores: scores.into_iter().map(|(needle, score)| (needle.into(), score)).collect(),
			calls: Arc::default(),
		}
	}

	/// Documents sent on each call.
	pub fn calls(&self) -> Vec<Vec<String>> {
		self.calls.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl RerankProvider for ScriptedReranker {
	fn rerank<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		_query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, ProviderResult<Vec<f32>>> {
		self.calls.lock().unwrap_or_else(|err| err.into_inner()).push(docs.to_vec());

		let scores = docs
			.iter()
			.map(|doc| {
				self.scores
					.iter()
					.find(|(needle, _)| doc.contains(needle.as_str()))
					.map_or(0.0, |(_, score)| *score)
			})
			.collect();

		Box::pin(async move { Ok(scores) })
	}
}

/// Never answers. Tracks parked calls like [`StallingBackend`].
#[derive(Clone, Debug, Default)]
pub struct StallingReranker {
	started: Arc<AtomicUsize>,
	in_flight: Arc<AtomicUsize>,
}
impl StallingReranker {
	pub fn started(&self) -> usize {
		self.started.load(Ordering::SeqCst)
	}

	pub fn in_flight(&self) -> usize {
		self.in_flight.load(Ordering::SeqCst)
	}
}
impl RerankProvider for StallingReranker {
	fn rerank<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		_query: &'a str,
		_docs: &'a [String],
	) -> BoxFuture<'a, ProviderResult<Vec<f32>>> {
		let started = self.started.clone();
		let in_flight = self.in_flight.clone();

		Box::pin(async move {
			started.fetch_add(1, Ordering::SeqCst);

			let _guard = InFlight::enter(in_flight);

			future::pending::<()>().await;

			Ok(Vec::new())
		})
	}
}

#[derive(Clone, Debug, Default)]
pub struct FailingReranker {
	calls: Arc<AtomicUsize>,
}
impl FailingReranker {
	pub fn call_count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl RerankProvider for FailingReranker {
	fn rerank<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		_query: &'a str,
		_docs: &'a [String],
	) -> BoxFuture<'a, ProviderResult<Vec<f32>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move {
			Err(ProviderError::InvalidResponse { message: "Reranker unavailable.".to_string() })
		})
	}
}

/// A people file written to the temp directory and removed on drop.
pub struct TempPeopleFile {
	path: PathBuf,
}
impl TempPeopleFile {
	pub fn write(contents: &str) -> Result<Self> {
		let path = env::temp_dir().join(format!("sift_people_{}.toml", Uuid::new_v4().simple()));

		fs::write(&path, contents)?;

		Ok(Self { path })
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}
impl Drop for TempPeopleFile {
	fn drop(&mut self) {
		let _ = fs::remove_file(&self.path);
	}
}

pub fn hit(document_id: &str, file_name: &str, last_modified_at: OffsetDateTime) -> SearchHit {
	SearchHit {
		document_id: document_id.to_string(),
		chunk_id: format!("{document_id}#0"),
		file_name: file_name.to_string(),
		folder_path: "notes".to_string(),
		last_modified_at,
		content_snippet: format!("Snippet from {file_name}."),
		score: 0.0,
	}
}

pub fn people(version: u32, entries: &[(&str, &[&str])]) -> PeopleConfig {
	PeopleConfig {
		version,
		people: entries
			.iter()
			.map(|(name, aliases)| Person {
				canonical_name: name.to_string(),
				aliases: aliases.iter().map(|alias| alias.to_string()).collect(),
				category: "general".to_string(),
			})
			.collect(),
	}
}

pub fn backend_config(provider_id: &str, timeout: Duration) -> BackendConfig {
	BackendConfig {
		provider_id: provider_id.to_string(),
		api_base: "http://127.0.0.1:9".to_string(),
		api_key: String::new(),
		path: "/search".to_string(),
		timeout_ms: timeout.as_millis() as u64,
		default_headers: Map::new(),
	}
}

pub fn rerank_config(timeout: Duration) -> ProviderConfig {
	ProviderConfig {
		provider_id: "test-rerank".to_string(),
		api_base: "http://127.0.0.1:9".to_string(),
		api_key: String::new(),
		path: "/rerank".to_string(),
		model: "test-reranker".to_string(),
		timeout_ms: timeout.as_millis() as u64,
		default_headers: Map::new(),
	}
}

/// A valid config with short backend timeouts and reranking disabled.
pub fn test_config() -> Config {
	Config {
		service: Service { log_level: "debug".to_string() },
		people: People::default(),
		search: Search::default(),
		boost: Boost::default(),
		rerank: Rerank::default(),
		providers: Providers {
			semantic: backend_config("test-semantic", Duration::from_millis(200)),
			keyword: backend_config("test-keyword", Duration::from_millis(200)),
			rerank: None,
		},
	}
}

/// `test_config` with reranking enabled over the first `top_n` results.
pub fn test_config_with_rerank(top_n: u32, protect_top_keyword: u32) -> Config {
	let mut cfg = test_config();

	cfg.rerank = Rerank { enabled: true, top_n, protect_top_keyword };
	cfg.providers.rerank = Some(rerank_config(Duration::from_millis(200)));

	cfg
}

/// Routes pipeline logs to the test harness output. Safe to call from every test.
pub fn init_test_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
		.with_test_writer()
		.try_init();
}

