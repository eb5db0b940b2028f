pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Retrieval unavailable: semantic: {semantic}; keyword: {keyword}")]
	RetrievalUnavailable { semantic: String, keyword: String },
	#[error("Alias map error: {message}")]
	AliasMap { message: String },
	#[error(transparent)]
	Config(#[from] sift_config::Error),
	#[error("Search cancelled.")]
	Cancelled,
}
impl From<sift_domain::AliasError> for Error {
	fn from(err: sift_domain::AliasError) -> Self {
		Self::AliasMap { message: err.to_string() }
	}
}
