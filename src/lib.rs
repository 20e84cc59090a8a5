//! Power BI dataset refreshes from Rust: a client-credentials token cached per client, an
//! authenticated request layer over a pluggable transport, and a deadline-bounded polling state
//! machine that waits for the refresh to finish.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod obs;
pub mod poll;
pub mod refresh;
pub mod task;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and a scripted in-memory transport for tests; enabled via
	//! `cfg(test)` or the `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::collections::VecDeque;
	// crates.io
	use oauth2::{
		HttpClientError, HttpRequest, HttpResponse,
		http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
	};
	// self
	use crate::{
		auth::{ClientId, Credentials, DatasetId, GroupId, TenantId},
		client::AuthenticatedClient,
		endpoint::ServiceEndpoints,
		http::{HttpTransport, TransportFuture},
		refresh::DatasetTarget,
	};

	/// Tenant used by scripted fixtures.
	pub const TEST_TENANT: &str = "tenant-test";
	/// Group used by scripted fixtures.
	pub const TEST_GROUP: &str = "group-test";
	/// Dataset used by scripted fixtures.
	pub const TEST_DATASET: &str = "dataset-test";
	/// Identity endpoint path derived from [`TEST_TENANT`].
	pub const TOKEN_PATH: &str = "/tenant-test/oauth2/token";
	/// Refresh collection path derived from [`TEST_GROUP`] and [`TEST_DATASET`].
	pub const REFRESHES_PATH: &str = "/v1.0/myorg/groups/group-test/datasets/dataset-test/refreshes";

	/// Endpoints pointing at hosts that only the scripted transport answers.
	pub fn test_endpoints() -> ServiceEndpoints {
		ServiceEndpoints::new(
			Url::parse("https://login.test").expect("Failed to parse scripted login URL."),
			Url::parse("https://api.test/v1.0/myorg").expect("Failed to parse scripted API URL."),
		)
		.expect("Scripted endpoints should validate.")
	}

	/// Credentials fixture for [`TEST_TENANT`].
	pub fn test_credentials() -> Credentials {
		Credentials::new(
			TenantId::new(TEST_TENANT).expect("Failed to build tenant fixture."),
			ClientId::new("client-test").expect("Failed to build client fixture."),
			"secret-test",
		)
		.expect("Credentials fixture should validate.")
	}

	/// Refresh target fixture for [`TEST_GROUP`] / [`TEST_DATASET`].
	pub fn test_target() -> DatasetTarget {
		DatasetTarget::new(
			GroupId::new(TEST_GROUP).expect("Failed to build group fixture."),
			DatasetId::new(TEST_DATASET).expect("Failed to build dataset fixture."),
		)
	}

	/// Builds a client wired to the provided scripted transport.
	pub fn scripted_client(
		transport: Arc<ScriptedTransport>,
	) -> AuthenticatedClient<ScriptedTransport> {
		AuthenticatedClient::with_transport(test_credentials(), test_endpoints(), transport)
	}

	/// Canned identity endpoint reply carrying `token`.
	pub fn token_reply(token: &str) -> ScriptedReply {
		ScriptedReply::json(
			200,
			format!(
				"{{\"token_type\":\"Bearer\",\"expires_in\":\"3599\",\"access_token\":\"{token}\"}}"
			),
		)
	}

	/// Error returned by [`ScriptedTransport`] for [`ScriptedReply::NetworkFailure`].
	#[derive(Debug, ThisError)]
	#[error("Scripted network failure.")]
	pub struct ScriptedTransportError;

	/// Reply served by [`ScriptedTransport`] for a method + path route.
	#[derive(Clone, Debug)]
	pub enum ScriptedReply {
		/// Serves an HTTP response.
		Respond {
			/// HTTP status code.
			status: u16,
			/// Response headers.
			headers: Vec<(String, String)>,
			/// Response body.
			body: String,
		},
		/// Fails the call at the transport layer.
		NetworkFailure,
	}
	impl ScriptedReply {
		/// JSON response with the provided status.
		pub fn json(status: u16, body: impl Into<String>) -> Self {
			Self::Respond {
				status,
				headers: vec![("content-type".into(), "application/json".into())],
				body: body.into(),
			}
		}

		/// Adds a response header.
		pub fn with_header(mut self, name: &str, value: &str) -> Self {
			if let Self::Respond { headers, .. } = &mut self {
				headers.push((name.into(), value.into()));
			}

			self
		}

		fn into_response(self) -> Result<HttpResponse, HttpClientError<ScriptedTransportError>> {
			match self {
				Self::Respond { status, headers, body } => {
					let mut response = HttpResponse::new(body.into_bytes());

					*response.status_mut() =
						StatusCode::from_u16(status).expect("Scripted status should be valid.");

					for (name, value) in headers {
						response.headers_mut().append(
							HeaderName::try_from(name).expect("Scripted header should be valid."),
							HeaderValue::try_from(value).expect("Scripted header should be valid."),
						);
					}

					Ok(response)
				},
				Self::NetworkFailure => Err(HttpClientError::Reqwest(Box::new(ScriptedTransportError))),
			}
		}
	}

	/// Request captured by [`ScriptedTransport`].
	#[derive(Clone, Debug)]
	pub struct RecordedRequest {
		/// HTTP method.
		pub method: Method,
		/// URI path.
		pub path: String,
		/// Request headers.
		pub headers: HeaderMap,
		/// Raw request body.
		pub body: Vec<u8>,
	}
	impl RecordedRequest {
		/// Returns a header value as a string, if present.
		pub fn header(&self, name: &str) -> Option<&str> {
			self.headers.get(name).and_then(|value| value.to_str().ok())
		}
	}

	/// In-memory [`HttpTransport`] that replays queued replies per route and records requests.
	///
	/// Each route drains its queue in order; the last reply repeats once the queue is down to a
	/// single entry. Unscripted routes answer `404`.
	#[derive(Debug, Default)]
	pub struct ScriptedTransport {
		routes: Mutex<HashMap<(String, String), VecDeque<ScriptedReply>>>,
		requests: Mutex<Vec<RecordedRequest>>,
		latency: Duration,
	}
	impl ScriptedTransport {
		/// Delays every reply by `latency` on the tokio clock.
		pub fn with_latency(mut self, latency: Duration) -> Self {
			self.latency = latency;

			self
		}

		/// Queues a reply for `method` + `path`.
		pub fn on(self, method: Method, path: &str, reply: ScriptedReply) -> Self {
			self.routes
				.lock()
				.entry((method.as_str().to_owned(), path.to_owned()))
				.or_default()
				.push_back(reply);

			self
		}

		/// Returns every request observed so far.
		pub fn requests(&self) -> Vec<RecordedRequest> {
			self.requests.lock().clone()
		}

		/// Counts requests observed for `method` + `path`.
		pub fn calls(&self, method: &Method, path: &str) -> usize {
			self.requests
				.lock()
				.iter()
				.filter(|request| &request.method == method && request.path == path)
				.count()
		}

		fn next_reply(&self, method: &Method, path: &str) -> ScriptedReply {
			let mut routes = self.routes.lock();
			let queue = routes.get_mut(&(method.as_str().to_owned(), path.to_owned()));

			match queue {
				Some(queue) if queue.len() > 1 => queue.pop_front(),
				Some(queue) => queue.front().cloned(),
				None => None,
			}
			.unwrap_or_else(|| ScriptedReply::json(404, "{\"error\":\"unscripted route\"}"))
		}
	}
	impl HttpTransport for ScriptedTransport {
		type TransportError = ScriptedTransportError;

		fn execute(&self, request: HttpRequest) -> TransportFuture<'_, Self::TransportError> {
			let recorded = RecordedRequest {
				method: request.method().clone(),
				path: request.uri().path().to_owned(),
				headers: request.headers().clone(),
				body: request.body().clone(),
			};
			let reply = self.next_reply(&recorded.method, &recorded.path);
			let latency = self.latency;

			self.requests.lock().push(recorded);

			Box::pin(async move {
				if !latency.is_zero() {
					tokio::time::sleep(latency).await;
				}

				reply.into_response()
			})
		}
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use httpmock as _;
