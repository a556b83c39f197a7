pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Authentication failed: {message}")]
	Auth { message: String },
	#[error("Transport error: {message}")]
	Transport { message: String },
	#[error("Remote error: {message}")]
	Remote { message: String },
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("{message}")]
	InvalidConfig { message: String },
}
impl From<reqwest::Error> for Error {
	fn from(err: reqwest::Error) -> Self {
		let message = if err.is_timeout() {
			format!("request timed out: {err}")
		} else if err.is_connect() {
			format!("connection failed: {err}")
		} else {
			err.to_string()
		};

		Self::Transport { message }
	}
}
