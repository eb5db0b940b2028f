use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Result, SearchHit, hits};

pub async fn search(
	cfg: &sift_config::BackendConfig,
	query: &str,
	limit: u32,
) -> Result<Vec<SearchHit>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({ "query": query, "limit": limit });
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;
	let mut parsed = hits::parse_hits(json)?;

	parsed.truncate(limit as usize);

	Ok(parsed)
}
