use reqwest::header::AUTHORIZATION;
use serde_json::{Map, Value};

use sift_config::BackendConfig;
use sift_providers::{Error, HttpProviders, KeywordSearchProvider};

#[test]
fn builds_bearer_auth_header() {
	let headers =
		sift_providers::auth_headers("secret", &Map::new()).expect("Failed to build headers.");
	let value = headers.get(AUTHORIZATION).expect("Missing authorization header.");

	assert_eq!(value, "Bearer secret");
}

#[test]
fn blank_api_key_sends_no_auth_header() {
	let headers = sift_providers::auth_headers("  ", &Map::new()).expect("Failed to build headers.");

	assert!(headers.get(AUTHORIZATION).is_none());
}

#[test]
fn non_string_default_header_is_rejected() {
	let mut defaults = Map::new();

	defaults.insert("x-tenant".to_string(), Value::from(7));

	let err = sift_providers::auth_headers("secret", &defaults).expect_err("Expected error.");

	assert!(matches!(err, Error::InvalidConfig { .. }));
}

#[tokio::test]
async fn empty_keyword_query_skips_the_backend() {
	let cfg = BackendConfig {
		provider_id: "fts".to_string(),
		api_base: "http://127.0.0.1:9".to_string(),
		api_key: String::new(),
		path: "/search".to_string(),
		timeout_ms: 50,
		default_headers: Map::new(),
	};
	let hits = HttpProviders.search(&cfg, "   ", 10).await.expect("Empty query must succeed.");

	assert!(hits.is_empty());
}
