pub mod alias;
pub mod classify;
pub mod sanitize;

pub use alias::{AliasError, AliasMap, Expansion, PersonRecord, expand};
pub use classify::{QueryClass, classify};
pub use sanitize::{keyword_terms, or_query, sanitize_for_keyword_search};
