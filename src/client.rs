//! Authenticated request layer with a lazily acquired, cached client-credentials token.

// crates.io
use oauth2::{
	AccessToken, HttpRequest, HttpResponse,
	http::{
		HeaderValue, Method, Request,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
	},
};
use serde::de::DeserializeOwned;
use serde_json::Value;
// self
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;
use crate::{
	_prelude::*,
	auth::Credentials,
	endpoint::ServiceEndpoints,
	error::{AuthenticationError, ConfigError, RequestError, TransportError},
	http::{self, HttpTransport},
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
};

/// Sends API requests on behalf of one service principal.
///
/// The first call to [`token`](Self::token) (directly or through [`send`](Self::send)) performs a
/// client-credentials exchange; the token is then cached for the lifetime of the client and
/// never refreshed. Concurrent first calls share a single exchange.
pub struct AuthenticatedClient<C>
where
	C: ?Sized + HttpTransport,
{
	/// Transport used for every outbound request.
	pub transport: Arc<C>,
	/// Identity/API bases and token audience.
	pub endpoints: ServiceEndpoints,
	credentials: Credentials,
	token: RwLock<Option<AccessToken>>,
	token_guard: AsyncMutex<()>,
}
impl<C> AuthenticatedClient<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a client backed by a caller-supplied transport.
	pub fn with_transport(
		credentials: Credentials,
		endpoints: ServiceEndpoints,
		transport: Arc<C>,
	) -> Self {
		Self {
			transport,
			endpoints,
			credentials,
			token: RwLock::new(None),
			token_guard: AsyncMutex::new(()),
		}
	}

	/// Returns `true` once a token has been cached.
	pub fn has_token(&self) -> bool {
		self.token.read().is_some()
	}

	/// Returns the cached bearer token, exchanging credentials for one on first use.
	pub async fn token(&self) -> Result<AccessToken> {
		if let Some(token) = self.cached_token() {
			return Ok(token);
		}

		let _singleflight = self.token_guard.lock().await;

		// Another caller may have finished the exchange while this one waited.
		if let Some(token) = self.cached_token() {
			return Ok(token);
		}

		let span = OperationSpan::new(OperationKind::TokenExchange, "token");

		obs::record_operation_outcome(OperationKind::TokenExchange, OperationOutcome::Attempt);

		let token = obs::record_result(
			OperationKind::TokenExchange,
			span.instrument(self.exchange_token()).await,
		)?;

		*self.token.write() = Some(token.clone());

		obs::token_acquired(&self.credentials.tenant);

		Ok(token)
	}

	/// Sends `request` with `Authorization: Bearer <token>` and `Content-Type: application/json`.
	///
	/// Both headers replace any caller-supplied value. Non-2xx responses become
	/// [`RequestError`]; network failures become [`TransportError`].
	pub async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
		let token = self.token().await?;
		let mut bearer = HeaderValue::try_from(format!("Bearer {}", token.secret()))
			.map_err(|e| ConfigError::from(oauth2::http::Error::from(e)))?;

		bearer.set_sensitive(true);

		let mut outbound = Request::builder()
			.method(request.method().clone())
			.uri(request.uri().clone())
			.version(request.version())
			.body(request.body().clone())
			.map_err(ConfigError::from)?;
		let headers = outbound.headers_mut();

		headers.clone_from(request.headers());
		headers.insert(AUTHORIZATION, bearer);
		headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		let response =
			self.transport.execute(outbound).await.map_err(http::map_client_error)?;

		if !response.status().is_success() {
			return Err(RequestError {
				status: response.status().as_u16(),
				body: String::from_utf8_lossy(response.body()).into_owned(),
			}
			.into());
		}

		Ok(response)
	}

	/// Sends `request` and decodes the 2xx JSON body into `T`.
	pub async fn send_json<T>(&self, request: &HttpRequest) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let response = self.send(request).await?;

		http::decode_json(response.body())
			.map_err(|source| TransportError::Decode { source }.into())
	}

	fn cached_token(&self) -> Option<AccessToken> {
		self.token.read().clone()
	}

	async fn exchange_token(&self) -> Result<AccessToken> {
		let url = self.endpoints.token_url(&self.credentials.tenant);
		let scope = self.endpoints.scope();
		let form = url::form_urlencoded::Serializer::new(String::new())
			.append_pair("grant_type", "client_credentials")
			.append_pair("client_id", &self.credentials.client_id)
			.append_pair("client_secret", self.credentials.client_secret().secret())
			.append_pair("resource", self.endpoints.resource())
			.append_pair("scope", &scope)
			.finish();
		let mut request = http::build_request(Method::POST, &url, form.into_bytes())?;

		request
			.headers_mut()
			.insert(CONTENT_TYPE, HeaderValue::from_static("application/x-www-form-urlencoded"));
		request.headers_mut().insert(ACCEPT, HeaderValue::from_static("application/json"));

		let response = self.transport.execute(request).await.map_err(|e| {
			AuthenticationError::Transport { source: http::map_client_error(e) }
		})?;

		if !response.status().is_success() {
			return Err(rejected(response.status().as_u16(), response.body()).into());
		}

		let fields = http::decode_json::<HashMap<String, Value>>(response.body())
			.map_err(|source| AuthenticationError::MalformedResponse { source })?;

		match fields.get("access_token").and_then(Value::as_str) {
			Some(token) if !token.is_empty() => Ok(AccessToken::new(token.to_owned())),
			_ => {
				let error = string_field(&fields, "error");

				Err(AuthenticationError::MissingAccessToken { error }.into())
			},
		}
	}
}
#[cfg(feature = "reqwest")]
impl AuthenticatedClient<ReqwestHttpClient> {
	/// Creates a client backed by a default reqwest transport.
	pub fn new(credentials: Credentials, endpoints: ServiceEndpoints) -> Self {
		Self::with_transport(credentials, endpoints, Arc::new(ReqwestHttpClient::default()))
	}
}
impl<C> Debug for AuthenticatedClient<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthenticatedClient")
			.field("endpoints", &self.endpoints)
			.field("credentials", &self.credentials)
			.field("has_token", &self.has_token())
			.finish()
	}
}

fn rejected(status: u16, body: &[u8]) -> AuthenticationError {
	let fields = serde_json::from_slice::<HashMap<String, Value>>(body).unwrap_or_default();
	let error = string_field(&fields, "error");
	let reason = string_field(&fields, "error_description")
		.or_else(|| error.clone())
		.unwrap_or_else(|| http::body_preview(body));

	AuthenticationError::Rejected { status, error, reason }
}

fn string_field(fields: &HashMap<String, Value>, key: &str) -> Option<String> {
	fields.get(key).and_then(Value::as_str).map(ToOwned::to_owned)
}
