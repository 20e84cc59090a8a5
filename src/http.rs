//! Transport seam for identity and API calls.
//!
//! [`HttpTransport`] is the crate's only dependency on an HTTP stack. Requests and responses use
//! the `oauth2` crate's [`HttpRequest`]/[`HttpResponse`] aliases so any client that can already
//! serve `oauth2` token exchanges plugs in with a thin adapter. [`ReqwestHttpClient`] is the
//! default implementation, available behind the `reqwest` feature.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use oauth2::{
	HttpClientError, HttpRequest, HttpResponse,
	http::{Method, Request},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, DecodeError, TransportError},
};

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a, E> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, HttpClientError<E>>> + 'a + Send>>;

/// Executes fully-formed HTTP requests.
///
/// Implementations must be `Send + Sync` so one transport can back a shared client, and the
/// returned future must be `Send` so callers can spawn the surrounding work. Transports never
/// interpret status codes; every response, successful or not, is returned as-is.
pub trait HttpTransport
where
	Self: Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Sends `request` and resolves with the raw response.
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_, Self::TransportError>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Identity endpoints return results directly, so configure any custom [`ReqwestClient`] with
/// the timeouts and proxies the host needs before wrapping it.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestHttpClient {
	type TransportError = ReqwestError;

	fn execute(&self, request: HttpRequest) -> TransportFuture<'_, Self::TransportError> {
		let client = self.0.clone();

		Box::pin(async move {
			let response =
				client.execute(request.try_into().map_err(Box::new)?).await.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

/// Maps a transport failure into [`TransportError`], keeping the source chain.
pub(crate) fn map_client_error<E>(err: HttpClientError<E>) -> TransportError
where
	E: 'static + Send + Sync + StdError,
{
	match err {
		HttpClientError::Reqwest(inner) => TransportError::Network { source: inner },
		HttpClientError::Http(inner) => TransportError::Http(inner),
		HttpClientError::Io(inner) => TransportError::Io(inner),
		HttpClientError::Other(message) => TransportError::Other { message },
		_ => TransportError::Other { message: "unclassified HTTP client failure".into() },
	}
}

/// Builds a request for `url` with the given body and no headers.
pub fn build_request(method: Method, url: &Url, body: Vec<u8>) -> Result<HttpRequest, ConfigError> {
	Ok(Request::builder().method(method).uri(url.as_str()).body(body)?)
}

/// Decodes a JSON body, reporting the path of the first offending field.
pub(crate) fn decode_json<T>(body: &[u8]) -> Result<T, DecodeError>
where
	T: DeserializeOwned,
{
	let mut de = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut de)
}

const BODY_PREVIEW_LIMIT: usize = 256;

/// Lossy UTF-8 preview of a response body, truncated for error messages.
pub(crate) fn body_preview(body: &[u8]) -> String {
	let text = String::from_utf8_lossy(body);
	let trimmed = text.trim();

	match trimmed.char_indices().nth(BODY_PREVIEW_LIMIT) {
		Some((cut, _)) => format!("{}…", &trimmed[..cut]),
		None => trimmed.to_owned(),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[derive(Debug, ThisError)]
	#[error("socket closed")]
	struct SocketClosed;

	#[test]
	fn network_failures_keep_their_source() {
		let err = map_client_error(HttpClientError::Reqwest(Box::new(SocketClosed)));

		assert!(matches!(err, TransportError::Network { .. }));
		assert_eq!(
			StdError::source(&err).map(ToString::to_string).as_deref(),
			Some("socket closed")
		);
	}

	#[test]
	fn other_failures_keep_their_message() {
		let err = map_client_error::<SocketClosed>(HttpClientError::Other("boom".into()));

		assert_eq!(err.to_string(), "HTTP client error occurred while calling the API: boom.");
	}

	#[test]
	fn build_request_keeps_method_and_url() {
		let url = Url::parse("https://api.test/v1.0/myorg/groups/g/datasets/d/refreshes")
			.expect("Fixture URL should parse.");
		let request =
			build_request(Method::POST, &url, Vec::new()).expect("Request should assemble.");

		assert_eq!(request.method(), Method::POST);
		assert_eq!(request.uri().path(), "/v1.0/myorg/groups/g/datasets/d/refreshes");
		assert!(request.headers().is_empty());
	}

	#[test]
	fn decode_json_names_failing_path() {
		#[derive(Debug, Deserialize)]
		struct Outer {
			#[allow(dead_code)]
			value: Vec<u8>,
		}

		let err = decode_json::<Outer>(br#"{"value":[1,"two"]}"#)
			.expect_err("Mistyped element should fail to decode.");

		assert_eq!(err.path().to_string(), "value[1]");
	}

	#[test]
	fn body_preview_truncates_long_bodies() {
		let long = "x".repeat(BODY_PREVIEW_LIMIT + 10);
		let preview = body_preview(long.as_bytes());

		assert_eq!(preview.chars().count(), BODY_PREVIEW_LIMIT + 1);
		assert!(preview.ends_with('…'));
		assert_eq!(body_preview(b"  {\"error\":\"x\"}\n"), "{\"error\":\"x\"}");
		assert_eq!(body_preview(&[0xff, b'o', b'k']), "\u{fffd}ok");
	}
}
