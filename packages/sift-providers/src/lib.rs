pub mod hits;
pub mod keyword;
pub mod rerank;
pub mod semantic;

mod error;

pub use error::{Error, Result};
pub use hits::SearchHit;

use std::{future::Future, pin::Pin};

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName};
use serde_json::{Map, Value};

use sift_config::{BackendConfig, ProviderConfig};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Nearest-neighbour search over the embedding index.
///
/// Returns hits best-first; the position in the returned list is the hit's rank.
pub trait SemanticSearchProvider
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		cfg: &'a BackendConfig,
		query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<SearchHit>>>;
}

/// Ranked full-text search. `query` is already sanitized and OR-joined.
pub trait KeywordSearchProvider
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		cfg: &'a BackendConfig,
		query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<SearchHit>>>;
}

/// Cross-encoder style relevance scoring. Returns one score per document, index-aligned.
pub trait RerankProvider
where
	Self: Send + Sync,
{
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<f32>>>;
}

/// Collaborators backed by the HTTP endpoints named in the provider config.
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpProviders;
impl SemanticSearchProvider for HttpProviders {
	fn search<'a>(
		&'a self,
		cfg: &'a BackendConfig,
		query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
		Box::pin(semantic::search(cfg, query, limit))
	}
}
impl KeywordSearchProvider for HttpProviders {
	fn search<'a>(
		&'a self,
		cfg: &'a BackendConfig,
		query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
		Box::pin(keyword::search(cfg, query, limit))
	}
}
impl RerankProvider for HttpProviders {
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(rerank::rerank(cfg, query, docs))
	}
}

pub fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	if !api_key.trim().is_empty() {
		headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);
	}

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: "Default header values must be strings.".to_string(),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}
