use std::collections::HashSet;

const STOP_WORDS: &[&str] = &[
	"a", "about", "an", "and", "any", "are", "as", "at", "be", "by", "can", "could", "did", "do",
	"does", "for", "from", "had", "has", "have", "how", "i", "in", "is", "it", "its", "me", "my",
	"not", "of", "on", "or", "our", "s", "should", "t", "than", "that", "the", "their", "them",
	"there", "these", "this", "those", "to", "was", "we", "were", "what", "when", "where",
	"which", "who", "whom", "whose", "why", "will", "with", "would", "you", "your",
];
const POSSESSIVE_SUFFIXES: [&str; 2] = ["'s", "\u{2019}s"];

/// Terms suitable for a keyword backend, in query order.
///
/// Reserved punctuation is replaced by whitespace, stop words and boolean operators are dropped,
/// and duplicates (ignoring case) keep their first occurrence. Underscores and inner hyphens are
/// kept so identifiers survive.
pub fn keyword_terms(text: &str) -> Vec<String> {
	let mut out = Vec::new();
	let mut seen = HashSet::new();

	for raw in text.split_whitespace() {
		let cleaned: String = strip_possessive(raw)
			.chars()
			.map(|ch| if ch.is_alphanumeric() || ch == '_' || ch == '-' { ch } else { ' ' })
			.collect();

		for piece in cleaned.split_whitespace() {
			let term = piece.trim_matches('-');

			if term.is_empty() {
				continue;
			}

			let key = term.to_lowercase();

			if STOP_WORDS.contains(&key.as_str()) {
				continue;
			}
			if seen.insert(key) {
				out.push(term.to_string());
			}
		}
	}

	out
}

pub fn sanitize_for_keyword_search(text: &str) -> String {
	keyword_terms(text).join(" ")
}

/// Renders terms as a disjunction, so a chunk matching any single term is a candidate.
pub fn or_query(terms: &[String]) -> String {
	terms.join(" OR ")
}

fn strip_possessive(raw: &str) -> &str {
	let trimmed = raw.trim_end_matches(|ch: char| !ch.is_alphanumeric());

	for suffix in POSSESSIVE_SUFFIXES {
		if let Some(split) = trimmed.len().checked_sub(suffix.len())
			&& trimmed.is_char_boundary(split)
			&& trimmed[split..].eq_ignore_ascii_case(suffix)
		{
			return &trimmed[..split];
		}
	}

	raw
}

#[cfg(test)]
mod tests {
	use super::{keyword_terms, or_query, sanitize_for_keyword_search};

	#[test]
	fn strips_question_syntax_and_stop_words() {
		assert_eq!(sanitize_for_keyword_search("What is Alex's phone number?"), "Alex phone number");
	}

	#[test]
	fn removes_reserved_punctuation() {
		assert_eq!(
			sanitize_for_keyword_search("\"tax return\" (2023) *draft* + notes: v1.2 ^boost ~fuzzy"),
			"tax return 2023 draft notes v1 2 boost fuzzy"
		);
	}

	#[test]
	fn keeps_identifiers_with_underscores_and_hyphens() {
		assert_eq!(
			keyword_terms("find invoice INV-2024_003 for acme-corp"),
			vec!["find", "invoice", "INV-2024_003", "acme-corp"]
		);
	}

	#[test]
	fn drops_leading_negation_hyphens_and_operators() {
		assert_eq!(keyword_terms("-secret OR plans AND NOT budget"), vec!["secret", "plans", "budget"]);
	}

	#[test]
	fn deduplicates_case_insensitively() {
		assert_eq!(keyword_terms("Garden garden GARDEN shed"), vec!["Garden", "shed"]);
	}

	#[test]
	fn all_stop_words_yield_empty_query() {
		assert_eq!(sanitize_for_keyword_search("what is the?"), "");
	}

	#[test]
	fn or_query_joins_terms() {
		let terms = keyword_terms("Alex phone number");

		assert_eq!(or_query(&terms), "Alex OR phone OR number");
	}
}
