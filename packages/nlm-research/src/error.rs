pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	Validation { message: String },
	#[error("Precondition failed: {message}")]
	Precondition { message: String },
	#[error("Authentication failed: {message}")]
	Auth { message: String },
	#[error("Transport error: {message}")]
	Transport { message: String },
	#[error("Remote error: {message}")]
	Remote { message: String },
}
impl Error {
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Validation { .. } => "validation",
			Self::Precondition { .. } => "precondition",
			Self::Auth { .. } => "auth",
			Self::Transport { .. } => "transport",
			Self::Remote { .. } => "remote",
		}
	}
}

impl From<nlm_rpc::Error> for Error {
	fn from(err: nlm_rpc::Error) -> Self {
		match err {
			nlm_rpc::Error::Auth { message } => Self::Auth { message },
			nlm_rpc::Error::Transport { message } => Self::Transport { message },
			nlm_rpc::Error::Remote { message } => Self::Remote { message },
			nlm_rpc::Error::InvalidHeaderValue(inner) =>
				Self::Validation { message: inner.to_string() },
			nlm_rpc::Error::InvalidConfig { message } => Self::Validation { message },
		}
	}
}
