mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	BackendConfig, Boost, Config, People, PeopleConfig, Person, ProviderConfig, Providers, Rerank,
	Search, Service,
};

use std::{fs, path::Path};

/// Upper bound for `search.max_top_k`; requests can never ask for more results than this.
pub const TOP_K_CEILING: u32 = 100;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn load_people(path: &Path) -> Result<PeopleConfig> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let people: PeopleConfig = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	for (idx, person) in people.people.iter().enumerate() {
		if person.canonical_name.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("people[{idx}].canonical_name must be non-empty."),
			});
		}
	}

	Ok(people)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}

	let search = &cfg.search;

	if search.max_top_k == 0 || search.max_top_k > TOP_K_CEILING {
		return Err(Error::Validation {
			message: format!("search.max_top_k must be in the range 1-{TOP_K_CEILING}."),
		});
	}
	if search.default_top_k == 0 || search.default_top_k > search.max_top_k {
		return Err(Error::Validation {
			message: "search.default_top_k must be in the range 1-search.max_top_k.".to_string(),
		});
	}
	if search.candidate_multiplier == 0 {
		return Err(Error::Validation {
			message: "search.candidate_multiplier must be greater than zero.".to_string(),
		});
	}
	if search.max_candidate_k < search.max_top_k {
		return Err(Error::Validation {
			message: "search.max_candidate_k must be at least search.max_top_k.".to_string(),
		});
	}
	if !search.rrf_k.is_finite() {
		return Err(Error::Validation {
			message: "search.rrf_k must be a finite number.".to_string(),
		});
	}
	if search.rrf_k <= 0.0 {
		return Err(Error::Validation {
			message: "search.rrf_k must be greater than zero.".to_string(),
		});
	}
	if search.max_query_chars == 0 {
		return Err(Error::Validation {
			message: "search.max_query_chars must be greater than zero.".to_string(),
		});
	}

	let boost = &cfg.boost;

	if !boost.recency_max_bonus.is_finite() || boost.recency_max_bonus < 0.0 {
		return Err(Error::Validation {
			message: "boost.recency_max_bonus must be a finite number, zero or greater."
				.to_string(),
		});
	}
	if !boost.recency_horizon_days.is_finite() || boost.recency_horizon_days <= 0.0 {
		return Err(Error::Validation {
			message: "boost.recency_horizon_days must be a finite number greater than zero."
				.to_string(),
		});
	}
	if !boost.filename_multiplier.is_finite() || boost.filename_multiplier < 1.0 {
		return Err(Error::Validation {
			message: "boost.filename_multiplier must be a finite number, 1.0 or greater."
				.to_string(),
		});
	}

	for (label, backend) in
		[("semantic", &cfg.providers.semantic), ("keyword", &cfg.providers.keyword)]
	{
		if backend.api_base.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("providers.{label}.api_base must be non-empty."),
			});
		}
		if backend.timeout_ms == 0 {
			return Err(Error::Validation {
				message: format!("providers.{label}.timeout_ms must be greater than zero."),
			});
		}
	}

	if let Some(rerank) = cfg.providers.rerank.as_ref() {
		if rerank.api_base.trim().is_empty() {
			return Err(Error::Validation {
				message: "providers.rerank.api_base must be non-empty.".to_string(),
			});
		}
		if rerank.timeout_ms == 0 {
			return Err(Error::Validation {
				message: "providers.rerank.timeout_ms must be greater than zero.".to_string(),
			});
		}
	}
	if cfg.rerank.enabled {
		if cfg.providers.rerank.is_none() {
			return Err(Error::Validation {
				message: "providers.rerank must be configured when rerank.enabled is true."
					.to_string(),
			});
		}
		if cfg.rerank.top_n == 0 {
			return Err(Error::Validation {
				message: "rerank.top_n must be greater than zero when enabled.".to_string(),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.people.path.as_deref().map(|path| path.trim().is_empty()).unwrap_or(false) {
		cfg.people.path = None;
	}
	if let Some(rerank) = cfg.providers.rerank.as_mut() {
		rerank.api_base = rerank.api_base.trim_end_matches('/').to_string();
	}

	cfg.providers.semantic.api_base =
		cfg.providers.semantic.api_base.trim_end_matches('/').to_string();
	cfg.providers.keyword.api_base =
		cfg.providers.keyword.api_base.trim_end_matches('/').to_string();
}
