use serde_json::Value;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{Error, Result};

/// One retrieval hit as returned by a search backend, best match first.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchHit {
	pub document_id: String,
	pub chunk_id: String,
	pub file_name: String,
	pub folder_path: String,
	pub last_modified_at: OffsetDateTime,
	pub content_snippet: String,
	/// Backend-specific relevance. Informational only; never compared across backends.
	pub score: f64,
}

/// Parses `{"results": [...]}` (or `{"hits": [...]}`) preserving response order.
pub fn parse_hits(json: Value) -> Result<Vec<SearchHit>> {
	let items = json
		.get("results")
		.or_else(|| json.get("hits"))
		.and_then(|v| v.as_array())
		.ok_or_else(|| invalid("Search response is missing results array."))?;
	let mut out = Vec::with_capacity(items.len());

	for item in items {
		let document_id = required_str(item, "document_id")?;
		let chunk_id = optional_str(item, "chunk_id").unwrap_or_else(|| document_id.clone());
		let file_name = required_str(item, "file_name")?;
		let raw_ts = required_str(item, "last_modified_at")?;
		let last_modified_at = OffsetDateTime::parse(&raw_ts, &Rfc3339)
			.map_err(|_| invalid("Search hit last_modified_at must be RFC 3339."))?;

		out.push(SearchHit {
			document_id,
			chunk_id,
			file_name,
			folder_path: optional_str(item, "folder_path").unwrap_or_default(),
			last_modified_at,
			content_snippet: optional_str(item, "content_snippet")
				.or_else(|| optional_str(item, "snippet"))
				.unwrap_or_default(),
			score: item.get("score").and_then(|v| v.as_f64()).unwrap_or(0.0),
		});
	}

	Ok(out)
}

fn required_str(item: &Value, key: &str) -> Result<String> {
	optional_str(item, key)
		.filter(|value| !value.trim().is_empty())
		.ok_or_else(|| invalid(&format!("Search hit missing {key}.")))
}

fn optional_str(item: &Value, key: &str) -> Option<String> {
	item.get(key).and_then(|v| v.as_str()).map(|v| v.to_string())
}

fn invalid(message: &str) -> Error {
	Error::InvalidResponse { message: message.to_string() }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn keeps_response_order_and_defaults_optional_fields() {
		let json = serde_json::json!({
			"results": [
				{
					"document_id": "doc_b",
					"file_name": "b.md",
					"last_modified_at": "2026-01-02T03:04:05Z",
					"score": 0.91
				},
				{
					"document_id": "doc_a",
					"chunk_id": "doc_a#2",
					"file_name": "Alex.md",
					"folder_path": "people",
					"last_modified_at": "2025-12-31T00:00:00+01:00",
					"snippet": "Alex phone 555-0101"
				}
			]
		});
		let hits = parse_hits(json).expect("parse failed");

		assert_eq!(hits.len(), 2);
		assert_eq!(hits[0].document_id, "doc_b");
		assert_eq!(hits[0].chunk_id, "doc_b");
		assert_eq!(hits[0].folder_path, "");
		assert_eq!(hits[1].chunk_id, "doc_a#2");
		assert_eq!(hits[1].content_snippet, "Alex phone 555-0101");
		assert_eq!(hits[1].score, 0.0);
	}

	#[test]
	fn accepts_hits_key() {
		let json = serde_json::json!({ "hits": [] });

		assert!(parse_hits(json).expect("parse failed").is_empty());
	}

	#[test]
	fn rejects_bad_timestamp() {
		let json = serde_json::json!({
			"results": [
				{ "document_id": "d", "file_name": "f", "last_modified_at": "yesterday" }
			]
		});

		assert!(matches!(parse_hits(json), Err(Error::InvalidResponse { .. })));
	}

	#[test]
	fn rejects_missing_results() {
		assert!(parse_hits(serde_json::json!({ "data": [] })).is_err());
	}
}
