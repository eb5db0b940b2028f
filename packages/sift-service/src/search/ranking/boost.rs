use std::{collections::BTreeSet, path::Path};

use time::OffsetDateTime;

use crate::search::{BoostedResult, FusedResult};
use sift_config::Boost;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Per-request inputs for the boost stage.
#[derive(Clone, Debug)]
pub struct BoostContext<'a> {
	pub now: OffsetDateTime,
	pub mentioned_people: &'a BTreeSet<String>,
	pub policy: &'a Boost,
}

/// Fractional days between `last_modified_at` and `now`; future timestamps count as zero.
pub fn days_since(now: OffsetDateTime, last_modified_at: OffsetDateTime) -> f64 {
	let seconds = (now - last_modified_at).as_seconds_f64();

	if seconds.is_finite() && seconds > 0.0 { seconds / SECONDS_PER_DAY } else { 0.0 }
}

/// `1 + bonus * (1 - sqrt(days / horizon))`, bounded to `[1, 1 + bonus]`.
pub fn recency_multiplier(days_since_modified: f64, policy: &Boost) -> f64 {
	let bonus = policy.recency_max_bonus.max(0.0);

	if !days_since_modified.is_finite() || policy.recency_horizon_days <= 0.0 {
		return 1.0;
	}

	let ratio = (days_since_modified.max(0.0) / policy.recency_horizon_days).min(1.0);
	let multiplier = 1.0 + bonus * (1.0 - ratio.sqrt());

	multiplier.clamp(1.0, 1.0 + bonus)
}

/// Returns the configured multiplier when a mentioned canonical name occurs in the file stem.
pub fn filename_multiplier(file_name: &str, mentioned_people: &BTreeSet<String>, policy: &Boost) -> f64 {
	if mentioned_people.is_empty() {
		return 1.0;
	}

	let stem = Path::new(file_name)
		.file_stem()
		.and_then(|stem| stem.to_str())
		.unwrap_or(file_name)
		.to_lowercase();
	let matched = mentioned_people
		.iter()
		.map(|name| name.trim().to_lowercase())
		.any(|name| !name.is_empty() && stem.contains(name.as_str()));

	if matched { policy.filename_multiplier } else { 1.0 }
}

pub fn boost(fused: Vec<FusedResult>, ctx: &BoostContext<'_>) -> Vec<BoostedResult> {
	fused
		.into_iter()
		.map(|fused| {
			let recency =
				recency_multiplier(days_since(ctx.now, fused.last_modified_at), ctx.policy);
			let filename = filename_multiplier(&fused.file_name, ctx.mentioned_people, ctx.policy);
			let final_score = fused.fused_score * recency * filename;

			BoostedResult {
				fused,
				recency_multiplier: recency,
				filename_multiplier: filename,
				final_score,
			}
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeSet;

	use time::{Duration, macros::datetime};

	use super::{BoostContext, boost, days_since, filename_multiplier, recency_multiplier};
	use crate::search::{Backend, FusedResult};
	use sift_config::Boost;

	fn people(names: &[&str]) -> BTreeSet<String> {
		names.iter().map(|name| name.to_string()).collect()
	}

	#[test]
	fn recency_is_maximal_today_and_flat_after_horizon() {
		let policy = Boost::default();

		assert_eq!(recency_multiplier(0.0, &policy), 1.5);
		assert_eq!(recency_multiplier(365.0, &policy), 1.0);
		assert_eq!(recency_multiplier(4_000.0, &policy), 1.0);
		assert!((recency_multiplier(91.25, &policy) - 1.25).abs() < 1e-12);
	}

	#[test]
	fn recency_never_increases_with_age() {
		let policy = Boost::default();
		let mut previous = recency_multiplier(0.0, &policy);

		for day in 1..=800 {
			let current = recency_multiplier(day as f64 * 0.5, &policy);

			assert!(current <= previous);
			assert!((1.0..=1.5).contains(&current));

			previous = current;
		}
	}

	#[test]
	fn future_timestamps_count_as_today() {
		let now = datetime!(2026-03-01 12:00 UTC);

		assert_eq!(days_since(now, now + Duration::days(3)), 0.0);
		assert_eq!(days_since(now, now - Duration::days(2)), 2.0);
	}

	#[test]
	fn filename_multiplier_is_binary() {
		let policy = Boost::default();
		let alex = people(&["Alex"]);

		assert_eq!(filename_multiplier("Alex.md", &alex, &policy), 2.0);
		assert_eq!(filename_multiplier("notes-about-ALEX-2025.txt", &alex, &policy), 2.0);
		assert_eq!(filename_multiplier("Roadmap.md", &alex, &policy), 1.0);
		assert_eq!(filename_multiplier("Alex.md", &people(&[]), &policy), 1.0);
	}

	#[test]
	fn filename_match_ignores_extension() {
		let policy = Boost::default();

		assert_eq!(filename_multiplier("summary.md", &people(&["md"]), &policy), 1.0);
		assert_eq!(filename_multiplier("README", &people(&["readme"]), &policy), 2.0);
	}

	#[test]
	fn multipliers_compose_multiplicatively() {
		let policy = Boost::default();
		let now = datetime!(2026-03-01 12:00 UTC);
		let mentioned = people(&["Alex"]);
		let ctx = BoostContext { now, mentioned_people: &mentioned, policy: &policy };
		let fused = FusedResult {
			document_id: "doc".to_string(),
			chunk_id: "doc#0".to_string(),
			fused_score: 0.02,
			contributing_backends: BTreeSet::from([Backend::Semantic]),
			semantic_rank: Some(1),
			keyword_rank: None,
			file_name: "Alex.md".to_string(),
			folder_path: "people".to_string(),
			last_modified_at: now,
			content_snippet: String::new(),
		};
		let boosted = boost(vec![fused], &ctx);

		assert_eq!(boosted[0].recency_multiplier, 1.5);
		assert_eq!(boosted[0].filename_multiplier, 2.0);
		assert!((boosted[0].final_score - 0.06).abs() < 1e-12);
	}
}
