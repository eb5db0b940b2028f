use std::sync::{Arc, RwLock};

use sift_config::PeopleConfig;
use sift_domain::AliasMap;

use crate::Result;

/// Process-wide alias map with whole-map replacement.
///
/// Readers clone the current `Arc` and keep using it for the rest of their request, so a
/// concurrent reload never exposes a half-built map.
#[derive(Debug, Default)]
pub struct AliasStore {
	current: RwLock<Arc<AliasMap>>,
}
impl AliasStore {
	pub fn new(map: AliasMap) -> Self {
		Self { current: RwLock::new(Arc::new(map)) }
	}

	pub fn from_people(people: &PeopleConfig) -> Result<Self> {
		Ok(Self::new(AliasMap::build(people)?))
	}

	pub fn snapshot(&self) -> Arc<AliasMap> {
		match self.current.read() {
			Ok(guard) => guard.clone(),
			Err(poisoned) => poisoned.into_inner().clone(),
		}
	}

	pub fn replace(&self, map: AliasMap) -> Arc<AliasMap> {
		let next = Arc::new(map);
		let mut guard = match self.current.write() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		};

		*guard = next.clone();

		next
	}

	/// Builds a new map from `people` and swaps it in. On error the current map stays active.
	pub fn reload(&self, people: &PeopleConfig) -> Result<Arc<AliasMap>> {
		let map = match AliasMap::build(people) {
			Ok(map) => map,
			Err(err) => {
				tracing::error!(
					error = %err,
					active_version = self.snapshot().version(),
					"Alias map reload rejected. Keeping the active map."
				);

				return Err(err.into());
			},
		};
		let next = self.replace(map);

		tracing::info!(
			version = next.version(),
			fingerprint = next.fingerprint(),
			alias_count = next.alias_count(),
			"Alias map reloaded."
		);

		Ok(next)
	}
}
