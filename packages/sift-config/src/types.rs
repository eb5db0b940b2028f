use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	#[serde(default)]
	pub people: People,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub boost: Boost,
	#[serde(default)]
	pub rerank: Rerank,
	pub providers: Providers,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct People {
	/// Optional. Path to the people/alias file; relative paths resolve against the working
	/// directory.
	pub path: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Search {
	pub default_top_k: u32,
	pub max_top_k: u32,
	/// Candidate pool per backend is `top_k * candidate_multiplier`, capped by
	/// `max_candidate_k`.
	pub candidate_multiplier: u32,
	pub max_candidate_k: u32,
	pub rrf_k: f64,
	pub max_query_chars: u32,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			default_top_k: 10,
			max_top_k: 100,
			candidate_multiplier: 4,
			max_candidate_k: 200,
			rrf_k: 60.0,
			max_query_chars: 1_000,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Boost {
	pub recency_max_bonus: f64,
	pub recency_horizon_days: f64,
	pub filename_multiplier: f64,
}
impl Default for Boost {
	fn default() -> Self {
		Self { recency_max_bonus: 0.5, recency_horizon_days: 365.0, filename_multiplier: 2.0 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Rerank {
	pub enabled: bool,
	pub top_n: u32,
	pub protect_top_keyword: u32,
}
impl Default for Rerank {
	fn default() -> Self {
		Self { enabled: false, top_n: 20, protect_top_keyword: 3 }
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct Providers {
	pub semantic: BackendConfig,
	pub keyword: BackendConfig,
	pub rerank: Option<ProviderConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct BackendConfig {
	pub provider_id: String,
	pub api_base: String,
	#[serde(default)]
	pub api_key: String,
	pub path: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	#[serde(default)]
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

/// Canonical people and their aliases, as read from the people file.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PeopleConfig {
	#[serde(default)]
	pub version: u32,
	#[serde(default)]
	pub people: Vec<Person>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Person {
	pub canonical_name: String,
	#[serde(default)]
	pub aliases: Vec<String>,
	#[serde(default = "default_category")]
	pub category: String,
}

fn default_category() -> String {
	"general".to_string()
}
