//! Person alias resolution.
//!
//! Nicknames and possessive forms in a query are rewritten to canonical person names before the
//! query is dispatched. The lookup table is built once from the people file and never mutated;
//! reloading produces a new [`AliasMap`].

use std::collections::{BTreeMap, BTreeSet, HashMap};

use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

use sift_config::PeopleConfig;

const POSSESSIVE_SUFFIXES: [&str; 2] = ["'s", "\u{2019}s"];
const MIN_BARE_STEM_CHARS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AliasError {
	#[error("Person canonical_name must be non-empty.")]
	EmptyCanonicalName,
	#[error("Person {canonical_name:?} has an empty alias.")]
	EmptyAlias { canonical_name: String },
	#[error("Person {canonical_name:?} is registered more than once.")]
	DuplicateCanonicalName { canonical_name: String },
	#[error("Alias {alias:?} is registered for both {existing:?} and {incoming:?}.")]
	Conflict { alias: String, existing: String, incoming: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonRecord {
	pub canonical_name: String,
	pub aliases: BTreeSet<String>,
	pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
	pub expanded_text: String,
	pub mentioned_people: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub struct AliasMap {
	version: u32,
	fingerprint: String,
	records: Vec<PersonRecord>,
	lookup: HashMap<String, usize>,
	/// Word-boundary segments in the longest key, so `expand` knows how far to look ahead.
	max_key_segments: usize,
}
impl AliasMap {
	pub fn empty() -> Self {
		Self::from_records(0, Vec::new(), HashMap::new())
	}

	/// Builds a lookup table from the people file.
	///
	/// Every alias and every canonical name becomes a lookup key after normalization. A key that
	/// resolves to two different people is rejected so that lookups never depend on registration
	/// order.
	pub fn build(people: &PeopleConfig) -> Result<Self, AliasError> {
		let mut records = Vec::with_capacity(people.people.len());
		let mut lookup: HashMap<String, usize> = HashMap::new();
		let mut canonical_keys = BTreeMap::new();

		for person in &people.people {
			let canonical_name = person.canonical_name.trim().to_string();
			let canonical_key = normalize_alias(&canonical_name);

			if canonical_key.is_empty() {
				return Err(AliasError::EmptyCanonicalName);
			}
			if canonical_keys.insert(canonical_key.clone(), records.len()).is_some() {
				return Err(AliasError::DuplicateCanonicalName { canonical_name });
			}

			let index = records.len();
			let mut aliases = BTreeSet::new();

			for raw in &person.aliases {
				let key = normalize_alias(raw);

				if key.is_empty() {
					return Err(AliasError::EmptyAlias { canonical_name });
				}

				aliases.insert(raw.trim().to_string());
				register(&mut lookup, &records, &canonical_name, key, index)?;
			}

			register(&mut lookup, &records, &canonical_name, canonical_key, index)?;
			records.push(PersonRecord {
				canonical_name,
				aliases,
				category: person.category.trim().to_string(),
			});
		}

		Ok(Self::from_records(people.version, records, lookup))
	}

	pub fn version(&self) -> u32 {
		self.version
	}

	/// Hex blake3 digest of the normalized table contents.
	pub fn fingerprint(&self) -> &str {
		&self.fingerprint
	}

	pub fn people(&self) -> &[PersonRecord] {
		&self.records
	}

	pub fn alias_count(&self) -> usize {
		self.lookup.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	/// Resolves a single token, ignoring case and any trailing `'s`.
	pub fn resolve(&self, token: &str) -> Option<&PersonRecord> {
		let key = normalize_alias(token);

		self.lookup.get(&key).map(|index| &self.records[*index])
	}

	fn lookup_folded(&self, token: &str) -> Option<&PersonRecord> {
		let key = fold(token);

		if key.is_empty() {
			return None;
		}

		self.lookup.get(&key).map(|index| &self.records[*index])
	}

	fn from_records(
		version: u32,
		records: Vec<PersonRecord>,
		lookup: HashMap<String, usize>,
	) -> Self {
		let fingerprint = fingerprint(version, &records, &lookup);
		let max_key_segments =
			lookup.keys().map(|key| key.split_word_bounds().count()).max().unwrap_or(1);

		Self { version, fingerprint, records, lookup, max_key_segments }
	}
}
impl Default for AliasMap {
	fn default() -> Self {
		Self::empty()
	}
}

/// Rewrites aliases in `query` to canonical names and reports which people were mentioned.
///
/// Text between words (spaces, punctuation) is copied through unchanged. Multi-word names and
/// aliases ("Big Al") match runs of adjacent words, longest run first. A possessive suffix on a
/// matched run is kept and reattached to the canonical name.
pub fn expand(query: &str, aliases: &AliasMap) -> Expansion {
	let mut expanded_text = String::with_capacity(query.len());
	let mut mentioned_people = BTreeSet::new();

	if aliases.is_empty() {
		return Expansion { expanded_text: query.to_string(), mentioned_people };
	}

	let segments: Vec<&str> = query.split_word_bounds().collect();
	let mut idx = 0;

	while idx < segments.len() {
		let segment = segments[idx];

		if !is_word(segment) {
			expanded_text.push_str(segment);

			idx += 1;

			continue;
		}

		match resolve_run(&segments, idx, aliases) {
			Some((person, suffix, len)) => {
				expanded_text.push_str(&person.canonical_name);
				expanded_text.push_str(suffix);
				mentioned_people.insert(person.canonical_name.clone());

				idx += len;
			},
			None => {
				expanded_text.push_str(segment);

				idx += 1;
			},
		}
	}

	Expansion { expanded_text, mentioned_people }
}

/// Normalized lookup key: NFKC, lowercased, trimmed, possessive removed.
pub fn normalize_alias(raw: &str) -> String {
	let folded = fold(raw);

	match strip_possessive(&folded) {
		Some((stem, _)) if !stem.is_empty() => stem.to_string(),
		_ => folded,
	}
}

fn is_word(segment: &str) -> bool {
	segment.chars().any(char::is_alphanumeric)
}

/// Tries runs of segments starting at `start`, longest first. A run must end on a word, and any
/// possessive suffix must sit inside that last word.
fn resolve_run<'w, 'm>(
	segments: &[&'w str],
	start: usize,
	aliases: &'m AliasMap,
) -> Option<(&'m PersonRecord, &'w str, usize)> {
	let longest = aliases.max_key_segments.min(segments.len() - start);

	for len in (1..=longest).rev() {
		let last = segments[start + len - 1];

		if !is_word(last) {
			continue;
		}

		let phrase = segments[start..start + len].concat();

		if let Some((person, suffix_len)) = resolve_phrase(&phrase, aliases)
			&& let Some(suffix) = last.len().checked_sub(suffix_len).and_then(|at| last.get(at..))
		{
			return Some((person, suffix, len));
		}
	}

	None
}

/// Looks up `phrase` as is, then without a possessive, then without a bare `s`. Returns the
/// person and the byte length of the stripped suffix.
fn resolve_phrase<'m>(phrase: &str, aliases: &'m AliasMap) -> Option<(&'m PersonRecord, usize)> {
	if let Some(person) = aliases.lookup_folded(phrase) {
		return Some((person, 0));
	}
	if let Some((stem, suffix)) = strip_possessive(phrase)
		&& !stem.ends_with(char::is_whitespace)
		&& let Some(person) = aliases.lookup_folded(stem)
	{
		return Some((person, suffix.len()));
	}

	let stem = phrase.strip_suffix('s').or_else(|| phrase.strip_suffix('S'))?;

	if stem.chars().count() < MIN_BARE_STEM_CHARS || stem.ends_with(char::is_whitespace) {
		return None;
	}

	aliases.lookup_folded(stem).map(|person| (person, 1))
}

fn strip_possessive(word: &str) -> Option<(&str, &str)> {
	for suffix in POSSESSIVE_SUFFIXES {
		let split = word.len().checked_sub(suffix.len())?;

		if !word.is_char_boundary(split) {
			continue;
		}

		let (stem, tail) = word.split_at(split);

		if tail.eq_ignore_ascii_case(suffix) {
			return Some((stem, tail));
		}
	}

	None
}

// NFKC, lowercase, and inner whitespace collapsed to single spaces.
fn fold(raw: &str) -> String {
	let normalized: String = raw.nfkc().collect();

	normalized.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn register(
	lookup: &mut HashMap<String, usize>,
	records: &[PersonRecord],
	incoming: &str,
	key: String,
	index: usize,
) -> Result<(), AliasError> {
	match lookup.get(&key) {
		Some(existing) if *existing != index => Err(AliasError::Conflict {
			alias: key,
			existing: records[*existing].canonical_name.clone(),
			incoming: incoming.to_string(),
		}),
		Some(_) => Ok(()),
		None => {
			lookup.insert(key, index);

			Ok(())
		},
	}
}

fn fingerprint(version: u32, records: &[PersonRecord], lookup: &HashMap<String, usize>) -> String {
	let mut hasher = blake3::Hasher::new();
	let mut keys: Vec<(&String, &usize)> = lookup.iter().collect();

	keys.sort();
	hasher.update(&version.to_le_bytes());

	for (key, index) in keys {
		let record = &records[*index];

		hasher.update(key.as_bytes());
		hasher.update(b"\0");
		hasher.update(record.canonical_name.as_bytes());
		hasher.update(b"\0");
		hasher.update(record.category.as_bytes());
		hasher.update(b"\n");
	}

	hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
	use sift_config::{PeopleConfig, Person};

	use super::{AliasError, AliasMap, expand, normalize_alias};

	fn person(canonical_name: &str, aliases: &[&str]) -> Person {
		Person {
			canonical_name: canonical_name.to_string(),
			aliases: aliases.iter().map(|alias| alias.to_string()).collect(),
			category: "family".to_string(),
		}
	}

	fn alex_map() -> AliasMap {
		AliasMap::build(&PeopleConfig { version: 1, people: vec![person("Alex", &["Al"])] })
			.expect("Alias map must build.")
	}

	#[test]
	fn expands_possessive_alias() {
		let expansion = expand("Al's phone", &alex_map());

		assert_eq!(expansion.expanded_text, "Alex's phone");
		assert_eq!(expansion.mentioned_people.into_iter().collect::<Vec<_>>(), vec!["Alex"]);
	}

	#[test]
	fn keeps_curly_apostrophe_possessive() {
		let expansion = expand("al\u{2019}s birthday?", &alex_map());

		assert_eq!(expansion.expanded_text, "Alex\u{2019}s birthday?");
	}

	#[test]
	fn bare_s_suffix_is_stripped_and_reattached() {
		let expansion = expand("Als notes", &alex_map());

		assert_eq!(expansion.expanded_text, "Alexs notes");
		assert!(expansion.mentioned_people.contains("Alex"));
	}

	#[test]
	fn canonical_name_counts_as_mention() {
		let expansion = expand("What is alex's email", &alex_map());

		assert_eq!(expansion.expanded_text, "What is Alex's email");
		assert!(expansion.mentioned_people.contains("Alex"));
	}

	#[test]
	fn leaves_unrelated_words_and_spacing_untouched() {
		let expansion = expand("  also  Alabama, alright? ", &alex_map());

		assert_eq!(expansion.expanded_text, "  also  Alabama, alright? ");
		assert!(expansion.mentioned_people.is_empty());
	}

	#[test]
	fn empty_map_is_identity() {
		let expansion = expand("Al's phone", &AliasMap::empty());

		assert_eq!(expansion.expanded_text, "Al's phone");
		assert!(expansion.mentioned_people.is_empty());
	}

	fn people_map(people: Vec<Person>) -> AliasMap {
		AliasMap::build(&PeopleConfig { version: 1, people }).expect("Alias map must build.")
	}

	#[test]
	fn multi_word_names_and_aliases_expand() {
		let map = people_map(vec![person("Alex Smith", &["Big Al"])]);
		let by_name = expand("Alex Smith phone", &map);
		let by_alias = expand("Big Al's phone", &map);

		assert_eq!(by_name.expanded_text, "Alex Smith phone");
		assert!(by_name.mentioned_people.contains("Alex Smith"));
		assert_eq!(by_alias.expanded_text, "Alex Smith's phone");
		assert!(by_alias.mentioned_people.contains("Alex Smith"));
		assert!(expand("Al's phone", &map).mentioned_people.is_empty());
	}

	#[test]
	fn multi_word_match_tolerates_spacing_and_case() {
		let map = people_map(vec![person("Alex Smith", &["Big Al"])]);
		let expansion = expand("call big  AL tomorrow", &map);

		assert_eq!(expansion.expanded_text, "call Alex Smith tomorrow");
		assert!(map.resolve("  ALEX   smith ").is_some());
	}

	#[test]
	fn longest_run_wins_over_single_word() {
		let map = people_map(vec![person("Alex", &["Al"]), person("Alex Smith", &[])]);
		let expansion = expand("Alex Smith and Al", &map);

		assert_eq!(expansion.expanded_text, "Alex Smith and Alex");
		assert_eq!(
			expansion.mentioned_people.into_iter().collect::<Vec<_>>(),
			vec!["Alex", "Alex Smith"]
		);
	}

	#[test]
	fn hyphenated_alias_matches_across_word_bounds() {
		let map = people_map(vec![person("Mary Jane Watson", &["Mary-Jane"])]);
		let expansion = expand("Mary-Jane's address", &map);

		assert_eq!(expansion.expanded_text, "Mary Jane Watson's address");
	}

	#[test]
	fn conflicting_alias_fails_to_build() {
		let people = PeopleConfig {
			version: 1,
			people: vec![person("Alex", &["Al"]), person("Alice", &["al"])],
		};
		let err = AliasMap::build(&people).expect_err("Expected alias conflict.");

		assert_eq!(
			err,
			AliasError::Conflict {
				alias: "al".to_string(),
				existing: "Alex".to_string(),
				incoming: "Alice".to_string(),
			}
		);
	}

	#[test]
	fn alias_equal_to_another_canonical_name_conflicts() {
		let people = PeopleConfig {
			version: 1,
			people: vec![person("Sam", &[]), person("Samantha", &["Sam"])],
		};

		assert!(matches!(AliasMap::build(&people), Err(AliasError::Conflict { .. })));
	}

	#[test]
	fn repeated_alias_for_same_person_is_allowed() {
		let people = PeopleConfig { version: 1, people: vec![person("Alex", &["Al", "AL", "Al's"])] };
		let map = AliasMap::build(&people).expect("Alias map must build.");

		assert_eq!(map.alias_count(), 2);
	}

	#[test]
	fn duplicate_canonical_name_fails_to_build() {
		let people =
			PeopleConfig { version: 1, people: vec![person("Alex", &[]), person("alex", &[])] };

		assert!(matches!(
			AliasMap::build(&people),
			Err(AliasError::DuplicateCanonicalName { .. })
		));
	}

	#[test]
	fn empty_alias_fails_to_build() {
		let people = PeopleConfig { version: 1, people: vec![person("Alex", &[" "])] };

		assert!(matches!(AliasMap::build(&people), Err(AliasError::EmptyAlias { .. })));
	}

	#[test]
	fn fingerprint_tracks_contents() {
		let a = alex_map();
		let b = AliasMap::build(&PeopleConfig { version: 1, people: vec![person("Alex", &["Lex"])] })
			.expect("Alias map must build.");

		assert_eq!(a.fingerprint(), alex_map().fingerprint());
		assert_ne!(a.fingerprint(), b.fingerprint());
	}

	#[test]
	fn normalizes_case_width_and_possessive() {
		assert_eq!(normalize_alias(" ＡＬ's "), "al");
		assert_eq!(normalize_alias("Chris"), "chris");
	}

	#[test]
	fn resolve_ignores_case_and_possessive() {
		let map = alex_map();

		assert_eq!(map.resolve("AL'S").map(|person| person.canonical_name.as_str()), Some("Alex"));
		assert!(map.resolve("Bob").is_none());
	}
}
