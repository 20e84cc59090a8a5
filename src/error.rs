//! Crate-level error types shared by the client, the poll loop, and the refresh orchestrator.

// self
use crate::{
	_prelude::*,
	auth::{IdentifierError, RequestId},
	refresh::{RefreshOutput, RefreshRecord},
};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Path-aware JSON decoding failure.
pub type DecodeError = serde_path_to_error::Error<serde_json::Error>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Identity exchange failed or returned an unusable response.
	#[error(transparent)]
	Authentication(#[from] AuthenticationError),
	/// Network, I/O, or decoding failure while talking to the API.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// API answered with a non-success HTTP status.
	#[error(transparent)]
	Request(#[from] RequestError),
	/// API response violated the refresh protocol.
	#[error(transparent)]
	Protocol(#[from] ProtocolError),
	/// Wait deadline elapsed before a terminal refresh state was observed.
	#[error(transparent)]
	Timeout(#[from] TimeoutError),
	/// Refresh reached a terminal state other than `Completed`.
	#[error(transparent)]
	RefreshFailed(#[from] RefreshFailedError),
}
impl Error {
	/// Returns `true` when the remote refresh ran and finished unsuccessfully.
	///
	/// Every other variant means the interaction with the service itself broke down.
	pub fn is_refresh_failure(&self) -> bool {
		matches!(self, Self::RefreshFailed(_))
	}

	/// Returns the partial output attached to a failed refresh, if any.
	pub fn refresh_output(&self) -> Option<RefreshOutput> {
		match self {
			Self::RefreshFailed(failure) => Some(failure.output()),
			_ => None,
		}
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Identifier failed validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] IdentifierError),
	/// Client secret was empty.
	#[error("Client secret cannot be empty.")]
	EmptyClientSecret,
	/// Endpoint URL cannot be parsed.
	#[error("The {endpoint} endpoint URL is invalid.")]
	InvalidEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Endpoint does not use HTTPS and is not a loopback address.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Endpoint URL cannot carry path segments (e.g. `mailto:`).
	#[error("The {endpoint} endpoint cannot be used as a base URL: {url}.")]
	CannotBeBase {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Token audience was empty.
	#[error("Token resource audience cannot be empty.")]
	EmptyResource,
	/// Duration text is not a supported ISO-8601 duration.
	#[error("Duration `{value}` is not a valid ISO-8601 duration.")]
	InvalidDuration {
		/// Raw duration text.
		value: String,
	},
	/// Poll interval must be positive.
	#[error("Poll interval must be greater than zero.")]
	ZeroPollInterval,
}

/// Identity endpoint failures. None of them are retried.
#[derive(Debug, ThisError)]
pub enum AuthenticationError {
	/// Identity endpoint answered with a non-success status.
	#[error("Identity endpoint rejected the client credentials with HTTP {status}: {reason}.")]
	Rejected {
		/// HTTP status code.
		status: u16,
		/// OAuth `error` code, when the body carried one.
		error: Option<String>,
		/// OAuth `error_description`, or a body preview when the body was not an OAuth error.
		reason: String,
	},
	/// Success response without a usable `access_token`.
	#[error("Identity endpoint response is missing access_token{}.", error_suffix(.error))]
	MissingAccessToken {
		/// OAuth `error` code carried by the body, if any.
		error: Option<String>,
	},
	/// Identity endpoint responded with malformed JSON.
	#[error("Identity endpoint returned malformed JSON.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: DecodeError,
	},
	/// Identity endpoint could not be reached.
	#[error("Identity endpoint could not be reached.")]
	Transport {
		/// Underlying transport failure.
		#[source]
		source: TransportError,
	},
}

/// Transport-level failures (network, IO, decoding).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
	/// Transport could not assemble the HTTP request.
	#[error("HTTP request could not be assembled by the transport.")]
	Http(#[from] oauth2::http::Error),
	/// Success response body could not be decoded.
	#[error("API response could not be decoded.")]
	Decode {
		/// Structured parsing failure.
		#[source]
		source: DecodeError,
	},
	/// Transport failed without a structured error.
	#[error("HTTP client error occurred while calling the API: {message}.")]
	Other {
		/// Transport-supplied message.
		message: String,
	},
}

/// Non-success HTTP response from the resource API.
#[derive(Debug, ThisError)]
#[error("API request failed with HTTP {status}: {}.", preview(.body))]
pub struct RequestError {
	/// HTTP status code.
	pub status: u16,
	/// Full response body, lossily decoded as UTF-8.
	pub body: String,
}

/// Responses that break the refresh protocol contract.
#[derive(Debug, ThisError)]
pub enum ProtocolError {
	/// Submit response carried no `RequestId` header.
	#[error("Refresh submission response is missing the RequestId header (headers: [{}]; body: {body}).", join_names(.headers))]
	MissingRequestId {
		/// Header names present on the response.
		headers: Vec<String>,
		/// Body preview.
		body: String,
	},
	/// Submit response carried an unusable `RequestId` header.
	#[error("Refresh submission returned an invalid RequestId `{value}`.")]
	InvalidRequestId {
		/// Raw header value.
		value: String,
		/// Validation failure.
		#[source]
		source: IdentifierError,
	},
	/// Submitted refresh is absent from the refresh history.
	#[error("Refresh `{request_id}` is missing from the dataset refresh history.")]
	RefreshNotFound {
		/// Submitted request identifier.
		request_id: RequestId,
	},
}

/// Wait deadline elapsed before the refresh reached a terminal state.
#[derive(Debug, ThisError)]
#[error("Timed out after {waited:?} waiting for a terminal refresh state (last observed: {}).", observed_or_none(.last_observed))]
pub struct TimeoutError {
	/// Configured wait bound.
	pub waited: Duration,
	/// Last in-progress status observed before the deadline.
	pub last_observed: Option<String>,
}

/// Refresh finished with a status other than `Completed`.
#[derive(Debug, ThisError)]
#[error("Refresh `{request_id}` failed with status `{}`{}.", status_of(.record), extended_suffix(.record))]
pub struct RefreshFailedError {
	/// Submitted request identifier.
	pub request_id: RequestId,
	/// Terminal record returned by the service.
	pub record: Box<RefreshRecord>,
}
impl RefreshFailedError {
	/// Terminal status reported by the service.
	pub fn status(&self) -> &str {
		&self.record.status
	}

	/// Extended status reported by the service, if any.
	pub fn extended_status(&self) -> Option<&str> {
		self.record.extended_status.as_deref()
	}

	/// Output carrying the terminal record fields for diagnostics.
	pub fn output(&self) -> RefreshOutput {
		RefreshOutput::from_record(self.request_id.clone(), &self.record)
	}
}

fn error_suffix(error: &Option<String>) -> String {
	error.as_ref().map(|code| format!(" (error: {code})")).unwrap_or_default()
}

fn join_names(names: &[String]) -> String {
	names.join(", ")
}

fn observed_or_none(observed: &Option<String>) -> &str {
	observed.as_deref().unwrap_or("none observed")
}

fn preview(body: &str) -> String {
	crate::http::body_preview(body.as_bytes())
}

fn status_of(record: &RefreshRecord) -> &str {
	&record.status
}

fn extended_suffix(record: &RefreshRecord) -> String {
	record.extended_status.as_ref().map(|extended| format!(" ({extended})")).unwrap_or_default()
}
