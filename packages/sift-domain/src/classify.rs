//! Heuristic query classification used to gate reranking.

use std::sync::LazyLock;

use regex::Regex;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryClass {
	/// Asks for a concrete datum. Exact keyword hits must not be displaced by reranking.
	Factual,
	/// Open-ended or conceptual. Eligible for full reranking.
	Semantic,
}
impl QueryClass {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Factual => "factual",
			Self::Semantic => "semantic",
		}
	}
}

static OPEN_ENDED: LazyLock<Option<Regex>> = LazyLock::new(|| {
	Regex::new(
		r"(?i)^\s*(why|how\s+(do|does|did|can|could|should|would|to)|explain|describe|compare|summari[sz]e|discuss|tell\s+me\s+about)\b",
	)
	.ok()
});
static FACT_REQUEST: LazyLock<Option<Regex>> = LazyLock::new(|| {
	Regex::new(
		r"(?i)^\s*(what(\s+is|\s+was|'s|\s+are)?|when|who|where|which|how\s+(many|much|old|long)|list)\b",
	)
	.ok()
});
static FACT_NOUN: LazyLock<Option<Regex>> = LazyLock::new(|| {
	Regex::new(
		r"(?i)\b(phone|number|email|e-mail|address|date|birthday|born|id|password|pin|code|price|cost|amount|account|serial|version|deadline|time|age)\b",
	)
	.ok()
});
static IDENTIFIER: LazyLock<Option<Regex>> = LazyLock::new(|| {
	Regex::new(r"\b([A-Za-z]+[0-9][A-Za-z0-9_-]*|[0-9]+[A-Za-z][A-Za-z0-9_-]*|\w+_\w+)\b").ok()
});

/// Labels a query as factual or semantic.
///
/// Only strong signals produce [`QueryClass::Factual`]: a fact-seeking opener paired with a fact
/// noun, or an identifier-like token. Anything else stays semantic.
pub fn classify(query: &str) -> QueryClass {
	let trimmed = query.trim();

	if trimmed.is_empty() || is_match(&OPEN_ENDED, trimmed) {
		return QueryClass::Semantic;
	}
	if is_match(&IDENTIFIER, trimmed) {
		return QueryClass::Factual;
	}
	if is_match(&FACT_REQUEST, trimmed) && is_match(&FACT_NOUN, trimmed) {
		return QueryClass::Factual;
	}

	QueryClass::Semantic
}

fn is_match(pattern: &Option<Regex>, text: &str) -> bool {
	pattern.as_ref().map(|re| re.is_match(text)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
	use super::{QueryClass, classify};

	#[test]
	fn phone_number_question_is_factual() {
		assert_eq!(classify("What is Alex's phone number?"), QueryClass::Factual);
	}

	#[test]
	fn quantity_question_is_factual() {
		assert_eq!(classify("how much did the roof repair cost"), QueryClass::Factual);
	}

	#[test]
	fn identifier_lookup_is_factual() {
		assert_eq!(classify("invoice INV2024 status"), QueryClass::Factual);
		assert_eq!(classify("notes on build_cache flag"), QueryClass::Factual);
	}

	#[test]
	fn open_ended_questions_are_semantic() {
		assert_eq!(classify("Why did we move to the new office?"), QueryClass::Semantic);
		assert_eq!(classify("explain the project phone strategy"), QueryClass::Semantic);
	}

	#[test]
	fn uncertain_queries_default_to_semantic() {
		assert_eq!(classify("ideas for the garden"), QueryClass::Semantic);
		assert_eq!(classify("what about the trip"), QueryClass::Semantic);
		assert_eq!(classify(""), QueryClass::Semantic);
	}
}
