use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

pub async fn rerank(
	cfg: &sift_config::ProviderConfig,
	query: &str,
	docs: &[String],
) -> Result<Vec<f32>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({ "model": cfg.model, "query": query, "documents": docs });
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_rerank_response(json, docs.len())
}

/// Aligns scores to documents by `index`. Every document must be scored exactly once.
fn parse_rerank_response(json: Value, doc_count: usize) -> Result<Vec<f32>> {
	let mut scores: Vec<Option<f32>> = vec![None; doc_count];
	let results = json
		.get("results")
		.or_else(|| json.get("data"))
		.and_then(|v| v.as_array())
		.ok_or_else(|| invalid("Rerank response is missing results array."))?;

	for item in results {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.ok_or_else(|| invalid("Rerank result missing index."))? as usize;
		let score = item
			.get("relevance_score")
			.or_else(|| item.get("score"))
			.and_then(|v| v.as_f64())
			.ok_or_else(|| invalid("Rerank result missing score."))? as f32;
		let slot = scores.get_mut(index).ok_or_else(|| {
			invalid(&format!("Rerank result index {index} is out of range for {doc_count} documents."))
		})?;

		if slot.replace(score).is_some() {
			return Err(invalid(&format!("Rerank result index {index} is repeated.")));
		}
	}

	scores
		.into_iter()
		.enumerate()
		.map(|(index, score)| {
			score.ok_or_else(|| invalid(&format!("Rerank response has no score for index {index}.")))
		})
		.collect()
}

fn invalid(message: &str) -> Error {
	Error::InvalidResponse { message: message.to_string() }
}
