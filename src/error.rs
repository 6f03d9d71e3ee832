//! Crate-wide error types and `Result` alias.

// crates.io
use http::StatusCode;
// self
use crate::{_prelude::Duration, oidc::validation::ClaimError, store::StoreError};

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the login engine.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Http(#[from] http::Error),
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	Serde(#[from] serde_json::Error),
	#[error(transparent)]
	Url(#[from] url::ParseError),

	#[error(transparent)]
	Claim(#[from] ClaimError),
	#[error(transparent)]
	Store(#[from] StoreError),

	#[error("Account is already linked to another user.")]
	AccountAlreadyLinked,
	#[error("Deadline of {0:?} elapsed before the operation completed.")]
	DeadlineExceeded(Duration),
	#[error("Upstream HTTP status {status} from {url}: {body:?}")]
	HttpStatus { status: StatusCode, url: url::Url, body: Option<String> },
	#[error("Malformed ID token: {0}")]
	MalformedIdToken(String),
	#[error("Metrics error: {0}")]
	Metrics(String),
	#[error("ID token is missing required claim '{0}'.")]
	MissingClaim(&'static str),
	#[error("Authorization code parameter is missing.")]
	MissingCode,
	#[error("Token response did not include an ID token.")]
	MissingIdToken,
	#[error("ID token does not carry a nonce.")]
	MissingNonce,
	#[error("State parameter is missing.")]
	MissingState,
	#[error("Nonce has already been used.")]
	NonceAlreadyUsed,
	#[error("Nonce does not match the state bound to this login.")]
	NonceMismatch,
	#[error("Security violation: {0}")]
	Security(String),
	#[error("Request is not authenticated.")]
	Unauthorized,
	#[error("Unexpected token type '{0}'.")]
	UnexpectedTokenType(String),
	#[error("State token was never issued.")]
	UnknownState,
	#[error("Validation failed for {field}: {reason}")]
	Validation { field: &'static str, reason: String },
}
impl Error {
	/// Classify the error for retry and response decisions.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Http(_) | Self::Url(_) | Self::Metrics(_) | Self::Security(_) =>
				ErrorKind::Configuration,
			Self::Validation { .. } => ErrorKind::Configuration,
			Self::Reqwest(_) | Self::Serde(_) | Self::Store(_) | Self::DeadlineExceeded(_) =>
				ErrorKind::TransientIo,
			Self::HttpStatus { status, .. } =>
				if status.is_server_error() {
					ErrorKind::TransientIo
				} else {
					ErrorKind::Upstream
				},
			Self::MissingState
			| Self::UnknownState
			| Self::MissingNonce
			| Self::NonceAlreadyUsed
			| Self::NonceMismatch => ErrorKind::Replay,
			Self::Claim(_) => ErrorKind::ClaimValidation,
			Self::AccountAlreadyLinked => ErrorKind::LinkingConflict,
			Self::MissingCode | Self::MissingClaim(_) => ErrorKind::InvalidRequest,
			Self::MalformedIdToken(_) => ErrorKind::MalformedToken,
			Self::MissingIdToken | Self::UnexpectedTokenType(_) => ErrorKind::Upstream,
			Self::Unauthorized => ErrorKind::Unauthorized,
		}
	}

	/// HTTP status the browser-facing layer should answer with.
	pub fn status_code(&self) -> StatusCode {
		self.kind().status_code()
	}
}

/// Failure taxonomy shared by every component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// Bad client credentials, URLs, or settings; fatal to the request.
	Configuration,
	/// Discovery, network, or storage failure; the whole flow may be retried from the redirect.
	TransientIo,
	/// Missing, unknown, or reused state/nonce; a client or attacker signal.
	Replay,
	/// Issuer, audience, or expiry mismatch in the ID token.
	ClaimValidation,
	/// External identity is bound to a different local user.
	LinkingConflict,
	/// Callback input or token payload lacks a required value.
	InvalidRequest,
	/// The provider returned an ID token that is not a decodable compact token.
	MalformedToken,
	/// The provider answered with an unusable token response.
	Upstream,
	/// No authenticated session is attached to the request.
	Unauthorized,
}
impl ErrorKind {
	/// Whether the orchestrating layer may retry the flow.
	pub fn is_retryable(self) -> bool {
		matches!(self, Self::TransientIo)
	}

	/// Status code for the callback endpoint.
	pub fn status_code(self) -> StatusCode {
		match self {
			Self::Replay | Self::ClaimValidation | Self::InvalidRequest => StatusCode::BAD_REQUEST,
			Self::Unauthorized => StatusCode::UNAUTHORIZED,
			Self::LinkingConflict => StatusCode::CONFLICT,
			Self::Configuration | Self::TransientIo | Self::MalformedToken | Self::Upstream =>
				StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Stable label used in logs and metrics.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Configuration => "configuration",
			Self::TransientIo => "transient_io",
			Self::Replay => "replay",
			Self::ClaimValidation => "claim_validation",
			Self::LinkingConflict => "linking_conflict",
			Self::InvalidRequest => "invalid_request",
			Self::MalformedToken => "malformed_token",
			Self::Upstream => "upstream",
			Self::Unauthorized => "unauthorized",
		}
	}
}
