pub mod aliases;
pub mod search;
pub mod time_serde;

mod error;

pub use aliases::AliasStore;
pub use error::{Error, Result};
pub use search::{
	Backend, BackendFailure, FailureKind, QueryInfo, SearchExplain, SearchItem, SearchOptions,
	SearchRequest, SearchResponse,
};
pub use sift_providers::{BoxFuture, KeywordSearchProvider, RerankProvider, SemanticSearchProvider};

use std::{path::Path, sync::Arc};

use sift_config::{Config, PeopleConfig};
use sift_domain::AliasMap;
use sift_providers::HttpProviders;

#[derive(Clone)]
pub struct Providers {
	pub semantic: Arc<dyn SemanticSearchProvider>,
	pub keyword: Arc<dyn KeywordSearchProvider>,
	pub rerank: Arc<dyn RerankProvider>,
}
impl Providers {
	pub fn new(
		semantic: Arc<dyn SemanticSearchProvider>,
		keyword: Arc<dyn KeywordSearchProvider>,
		rerank: Arc<dyn RerankProvider>,
	) -> Self {
		Self { semantic, keyword, rerank }
	}
}
impl Default for Providers {
	fn default() -> Self {
		Self {
			semantic: Arc::new(HttpProviders),
			keyword: Arc::new(HttpProviders),
			rerank: Arc::new(HttpProviders),
		}
	}
}

pub struct SiftService {
	pub cfg: Config,
	pub aliases: AliasStore,
	pub providers: Providers,
}
impl SiftService {
	/// Builds the service with HTTP collaborators and the people file named in `cfg`.
	///
	/// A people file that fails to load or contains conflicting aliases is fatal.
	pub fn new(cfg: Config) -> Result<Self> {
		let map = match cfg.people.path.as_deref() {
			Some(path) => AliasMap::build(&sift_config::load_people(Path::new(path))?)?,
			None => {
				tracing::warn!("No people file configured. Alias expansion is disabled.");

				AliasMap::empty()
			},
		};

		Ok(Self::with_providers(cfg, map, Providers::default()))
	}

	pub fn with_providers(cfg: Config, aliases: AliasMap, providers: Providers) -> Self {
		tracing::info!(
			alias_version = aliases.version(),
			alias_fingerprint = aliases.fingerprint(),
			alias_count = aliases.alias_count(),
			"Alias map loaded."
		);

		Self { cfg, aliases: AliasStore::new(aliases), providers }
	}

	pub fn reload_aliases(&self, people: &PeopleConfig) -> Result<Arc<AliasMap>> {
		self.aliases.reload(people)
	}

	/// Re-reads the people file at `path` and swaps it in. The active map is kept on any error.
	pub fn reload_aliases_from(&self, path: &Path) -> Result<Arc<AliasMap>> {
		let people = match sift_config::load_people(path) {
			Ok(people) => people,
			Err(err) => {
				tracing::error!(error = %err, path = %path.display(), "Failed to read people file.");

				return Err(err.into());
			},
		};

		self.reload_aliases(&people)
	}
}
