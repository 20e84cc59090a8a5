//! Submit, poll, and terminal-state resolution for one dataset refresh.

// crates.io
use oauth2::{HttpResponse, http::Method};
// self
use crate::{
	_prelude::*,
	auth::RequestId,
	client::AuthenticatedClient,
	error::{ConfigError, ProtocolError, RefreshFailedError},
	http::{self, HttpTransport},
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
	poll::{self, PollOutcome},
	refresh::{DatasetTarget, RefreshOutput, RefreshRecord, RefreshState, Refreshes},
};

// Header lookups are case-insensitive, so this also matches `RequestId`.
const REQUEST_ID_HEADER: &str = "requestid";

/// Controls whether and how long [`RefreshOrchestrator::refresh`] waits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshOptions {
	/// Poll until a terminal state instead of returning right after submission.
	pub wait: bool,
	/// Delay between two polls.
	pub poll_interval: Duration,
	/// Upper bound on the whole polling phase.
	pub wait_timeout: Duration,
}
impl RefreshOptions {
	/// Default delay between polls.
	pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
	/// Default polling bound.
	pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(600);

	/// Toggles waiting for a terminal state.
	pub fn with_wait(mut self, wait: bool) -> Self {
		self.wait = wait;

		self
	}

	/// Overrides the delay between polls.
	pub fn with_poll_interval(mut self, interval: Duration) -> Self {
		self.poll_interval = interval;

		self
	}

	/// Overrides the polling bound.
	pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
		self.wait_timeout = timeout;

		self
	}

	/// Rejects a zero poll interval, which would spin against the API.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.poll_interval.is_zero() {
			return Err(ConfigError::ZeroPollInterval);
		}

		Ok(())
	}
}
impl Default for RefreshOptions {
	fn default() -> Self {
		Self {
			wait: false,
			poll_interval: Self::DEFAULT_POLL_INTERVAL,
			wait_timeout: Self::DEFAULT_WAIT_TIMEOUT,
		}
	}
}

/// Drives a refresh through `Submitted -> Polling -> {Completed | Failed | TimedOut}`.
pub struct RefreshOrchestrator<C>
where
	C: ?Sized + HttpTransport,
{
	client: Arc<AuthenticatedClient<C>>,
	options: RefreshOptions,
}
impl<C> RefreshOrchestrator<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates an orchestrator after validating `options`.
	pub fn new(client: Arc<AuthenticatedClient<C>>, options: RefreshOptions) -> Result<Self> {
		options.validate()?;

		Ok(Self { client, options })
	}

	/// Submits a refresh and, when [`RefreshOptions::wait`] is set, waits for its terminal state.
	///
	/// Without waiting the output only carries the request identifier. A terminal status other
	/// than `Completed` surfaces as [`Error::RefreshFailed`].
	pub async fn refresh(&self, target: &DatasetTarget) -> Result<RefreshOutput> {
		let request_id = self.submit(target).await?;

		if !self.options.wait {
			return Ok(RefreshOutput::submitted(request_id));
		}

		let record = self.await_completion(target, &request_id).await?;

		evaluate_terminal(request_id, record)
	}

	/// Posts a refresh request and returns the service-issued `RequestId`.
	pub async fn submit(&self, target: &DatasetTarget) -> Result<RequestId> {
		let span = OperationSpan::new(OperationKind::Submit, "submit");

		obs::record_operation_outcome(OperationKind::Submit, OperationOutcome::Attempt);

		obs::record_result(OperationKind::Submit, span.instrument(self.submit_inner(target)).await)
	}

	/// Fetches the dataset's refresh history.
	pub async fn list_refreshes(&self, target: &DatasetTarget) -> Result<Refreshes> {
		let url = self.client.endpoints.refreshes_url(target);
		let request = http::build_request(Method::GET, &url, Vec::new())?;

		self.client.send_json(&request).await
	}

	/// Polls the history until the submitted refresh leaves the `Unknown` state.
	///
	/// A history that no longer lists `request_id` fails immediately with
	/// [`ProtocolError::RefreshNotFound`].
	pub async fn await_completion(
		&self,
		target: &DatasetTarget,
		request_id: &RequestId,
	) -> Result<RefreshRecord> {
		poll::poll_until(self.options.poll_interval, self.options.wait_timeout, move || {
			self.probe(target, request_id)
		})
		.await
	}

	async fn submit_inner(&self, target: &DatasetTarget) -> Result<RequestId> {
		let url = self.client.endpoints.refreshes_url(target);
		let request = http::build_request(Method::POST, &url, Vec::new())?;
		let response = self.client.send(&request).await?;
		let request_id = request_id_from(&response)?;

		obs::refresh_submitted(&target.dataset, &request_id);

		Ok(request_id)
	}

	async fn probe(
		&self,
		target: &DatasetTarget,
		request_id: &RequestId,
	) -> Result<PollOutcome<RefreshRecord>> {
		let span = OperationSpan::new(OperationKind::Poll, "probe");

		obs::record_operation_outcome(OperationKind::Poll, OperationOutcome::Attempt);

		let refreshes = obs::record_result(
			OperationKind::Poll,
			span.instrument(self.list_refreshes(target)).await,
		)?;
		let record = refreshes
			.into_record(request_id)
			.ok_or_else(|| ProtocolError::RefreshNotFound { request_id: request_id.clone() })?;

		obs::refresh_observed(request_id, &record.status);

		match record.state() {
			RefreshState::InProgress => Ok(PollOutcome::Pending { observed: Some(record.status) }),
			RefreshState::Completed | RefreshState::Failed => Ok(PollOutcome::Ready(record)),
		}
	}
}
impl<C> Debug for RefreshOrchestrator<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshOrchestrator")
			.field("client", &self.client)
			.field("options", &self.options)
			.finish()
	}
}

/// Maps a terminal record to the published output or to [`RefreshFailedError`].
///
/// `completed` in any casing succeeds; every other status is a failure.
pub fn evaluate_terminal(request_id: RequestId, record: RefreshRecord) -> Result<RefreshOutput> {
	obs::refresh_finished(&request_id, &record.status, record.extended_status.as_deref());

	match record.state() {
		RefreshState::Completed => Ok(RefreshOutput::from_record(request_id, &record)),
		RefreshState::InProgress | RefreshState::Failed =>
			Err(RefreshFailedError { request_id, record: Box::new(record) }.into()),
	}
}

fn request_id_from(response: &HttpResponse) -> Result<RequestId, ProtocolError> {
	let Some(value) = response.headers().get(REQUEST_ID_HEADER) else {
		return Err(ProtocolError::MissingRequestId {
			headers: response.headers().keys().map(|name| name.as_str().to_owned()).collect(),
			body: http::body_preview(response.body()),
		});
	};
	let value = String::from_utf8_lossy(value.as_bytes()).trim().to_owned();

	RequestId::new(&value).map_err(|source| ProtocolError::InvalidRequestId { value, source })
}

#[cfg(test)]
mod tests {
	// crates.io
	use tokio::time::Instant;
	// self
	use super::*;
	use crate::_preludet::*;

	fn submit_reply(request_id: &str) -> ScriptedReply {
		ScriptedReply::json(202, "").with_header("RequestId", request_id)
	}

	fn history(status: &str) -> ScriptedReply {
		ScriptedReply::json(
			200,
			format!(
				"{{\"value\":[{{\"requestId\":\"other\",\"status\":\"Completed\"}},{{\"requestId\":\"abc-123\",\"status\":\"{status}\",\"refreshType\":\"ViaApi\",\"startTime\":\"2024-05-01T10:00:00Z\"}}]}}"
			),
		)
	}

	fn orchestrator(
		transport: &Arc<ScriptedTransport>,
		options: RefreshOptions,
	) -> RefreshOrchestrator<ScriptedTransport> {
		RefreshOrchestrator::new(Arc::new(scripted_client(transport.clone())), options)
			.expect("Options should validate.")
	}

	fn waiting() -> RefreshOptions {
		RefreshOptions::default().with_wait(true)
	}

	#[tokio::test(start_paused = true)]
	async fn waits_through_unknown_until_completed() {
		let transport = Arc::new(
			ScriptedTransport::default()
				.on(Method::POST, TOKEN_PATH, token_reply("tok-1"))
				.on(Method::POST, REFRESHES_PATH, submit_reply("abc-123"))
				.on(Method::GET, REFRESHES_PATH, history("Unknown"))
				.on(Method::GET, REFRESHES_PATH, history("Completed")),
		);
		let started = Instant::now();
		let output = orchestrator(&transport, waiting())
			.refresh(&test_target())
			.await
			.expect("Completed refresh should succeed.");

		assert_eq!(output.request_id.as_ref(), "abc-123");
		assert_eq!(output.status.as_deref(), Some("Completed"));
		assert_eq!(output.refresh_type.as_deref(), Some("ViaApi"));
		assert!(output.start_time.is_some());
		assert_eq!(transport.calls(&Method::GET, REFRESHES_PATH), 2);
		assert_eq!(transport.calls(&Method::POST, TOKEN_PATH), 1);
		assert_eq!(started.elapsed(), RefreshOptions::DEFAULT_POLL_INTERVAL);
	}

	#[tokio::test(start_paused = true)]
	async fn without_wait_returns_request_id_only() {
		let transport = Arc::new(
			ScriptedTransport::default()
				.on(Method::POST, TOKEN_PATH, token_reply("tok-1"))
				.on(Method::POST, REFRESHES_PATH, submit_reply("abc-123")),
		);
		let output = orchestrator(&transport, RefreshOptions::default())
			.refresh(&test_target())
			.await
			.expect("Submission should succeed.");

		assert_eq!(output, RefreshOutput::submitted(RequestId::new("abc-123").expect("Valid id.")));
		assert_eq!(transport.calls(&Method::GET, REFRESHES_PATH), 0);

		let requests = transport.requests();
		let submit = requests.last().expect("Submission should be recorded.");

		assert!(submit.body.is_empty());
		assert_eq!(submit.header("authorization"), Some("Bearer tok-1"));
	}

	#[tokio::test(start_paused = true)]
	async fn correlation_header_is_case_insensitive() {
		let transport = Arc::new(
			ScriptedTransport::default()
				.on(Method::POST, TOKEN_PATH, token_reply("tok-1"))
				.on(
					Method::POST,
					REFRESHES_PATH,
					ScriptedReply::json(202, "").with_header("REQUESTID", " abc-123 "),
				),
		);
		let request_id = orchestrator(&transport, RefreshOptions::default())
			.submit(&test_target())
			.await
			.expect("Submission should succeed.");

		assert_eq!(request_id.as_ref(), "abc-123");
	}

	#[tokio::test(start_paused = true)]
	async fn missing_correlation_header_fails_without_polling() {
		let transport = Arc::new(
			ScriptedTransport::default()
				.on(Method::POST, TOKEN_PATH, token_reply("tok-1"))
				.on(Method::POST, REFRESHES_PATH, ScriptedReply::json(202, "{\"accepted\":true}"))
				.on(Method::GET, REFRESHES_PATH, history("Completed")),
		);
		let err = orchestrator(&transport, waiting())
			.refresh(&test_target())
			.await
			.expect_err("Missing RequestId must fail.");

		match err {
			Error::Protocol(ProtocolError::MissingRequestId { headers, body }) => {
				assert_eq!(headers, vec!["content-type".to_owned()]);
				assert_eq!(body, "{\"accepted\":true}");
			},
			other => panic!("Unexpected error: {other:?}."),
		}

		assert_eq!(transport.calls(&Method::GET, REFRESHES_PATH), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn vanished_request_id_fails_in_that_cycle() {
		let transport = Arc::new(
			ScriptedTransport::default()
				.on(Method::POST, TOKEN_PATH, token_reply("tok-1"))
				.on(Method::POST, REFRESHES_PATH, submit_reply("abc-123"))
				.on(Method::GET, REFRESHES_PATH, history("Unknown"))
				.on(
					Method::GET,
					REFRESHES_PATH,
					ScriptedReply::json(200, "[{\"requestId\":\"other\",\"status\":\"Unknown\"}]"),
				),
		);
		let err = orchestrator(&transport, waiting())
			.refresh(&test_target())
			.await
			.expect_err("Vanished refresh must fail.");

		assert!(matches!(
			err,
			Error::Protocol(ProtocolError::RefreshNotFound { ref request_id })
				if request_id.as_ref() == "abc-123"
		));
		assert_eq!(transport.calls(&Method::GET, REFRESHES_PATH), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn completed_in_any_casing_succeeds() {
		for status in ["Completed", "completed", "COMPLETED"] {
			let transport = Arc::new(
				ScriptedTransport::default()
					.on(Method::POST, TOKEN_PATH, token_reply("tok-1"))
					.on(Method::POST, REFRESHES_PATH, submit_reply("abc-123"))
					.on(Method::GET, REFRESHES_PATH, history(status)),
			);
			let output = orchestrator(&transport, waiting())
				.refresh(&test_target())
				.await
				.expect("Completed refresh should succeed.");

			assert_eq!(output.status.as_deref(), Some(status));
		}
	}

	#[tokio::test(start_paused = true)]
	async fn other_terminal_statuses_are_refresh_failures() {
		for status in ["Failed", "Disabled", "Cancelled"] {
			let transport = Arc::new(
				ScriptedTransport::default()
					.on(Method::POST, TOKEN_PATH, token_reply("tok-1"))
					.on(Method::POST, REFRESHES_PATH, submit_reply("abc-123"))
					.on(Method::GET, REFRESHES_PATH, history(status)),
			);
			let err = orchestrator(&transport, waiting())
				.refresh(&test_target())
				.await
				.expect_err("Non-completed terminal status must fail.");

			assert!(err.is_refresh_failure(), "{status}");

			let output = err.refresh_output().expect("Failure should carry the record.");

			assert_eq!(output.status.as_deref(), Some(status));
			assert_eq!(output.refresh_type.as_deref(), Some("ViaApi"));
		}
	}

	#[tokio::test(start_paused = true)]
	async fn wait_expiry_times_out_without_further_polls() {
		let transport = Arc::new(
			ScriptedTransport::default()
				.on(Method::POST, TOKEN_PATH, token_reply("tok-1"))
				.on(Method::POST, REFRESHES_PATH, submit_reply("abc-123"))
				.on(Method::GET, REFRESHES_PATH, history("Unknown")),
		);
		let options = waiting()
			.with_poll_interval(Duration::from_secs(5))
			.with_wait_timeout(Duration::from_secs(12));
		let err = orchestrator(&transport, options)
			.refresh(&test_target())
			.await
			.expect_err("Never-ending refresh must time out.");

		match err {
			Error::Timeout(timeout) => {
				assert_eq!(timeout.waited, Duration::from_secs(12));
				assert_eq!(timeout.last_observed.as_deref(), Some("Unknown"));
			},
			other => panic!("Unexpected error: {other:?}."),
		}

		assert_eq!(transport.calls(&Method::GET, REFRESHES_PATH), 3);

		// Nothing keeps polling once the call has returned.
		tokio::time::sleep(Duration::from_secs(60)).await;

		assert_eq!(transport.calls(&Method::GET, REFRESHES_PATH), 3);
	}

	#[tokio::test(start_paused = true)]
	async fn authentication_failure_precedes_any_resource_call() {
		let transport = Arc::new(
			ScriptedTransport::default()
				.on(Method::POST, TOKEN_PATH, ScriptedReply::json(401, "{\"error\":\"invalid_client\"}"))
				.on(Method::POST, REFRESHES_PATH, submit_reply("abc-123")),
		);
		let err = orchestrator(&transport, waiting())
			.refresh(&test_target())
			.await
			.expect_err("Rejected credentials must fail.");

		assert!(matches!(err, Error::Authentication(_)));
		assert!(!err.is_refresh_failure());
		assert_eq!(transport.calls(&Method::POST, REFRESHES_PATH), 0);
	}

	#[test]
	fn zero_poll_interval_is_rejected() {
		let options = RefreshOptions::default().with_poll_interval(Duration::ZERO);
		let result = RefreshOrchestrator::new(
			Arc::new(scripted_client(Arc::new(ScriptedTransport::default()))),
			options,
		);

		assert!(matches!(result, Err(Error::Config(ConfigError::ZeroPollInterval))));
	}

	#[test]
	fn evaluate_terminal_maps_status() {
		let request_id = RequestId::new("abc-123").expect("Request identifier should be valid.");
		let mut record = RefreshRecord {
			request_id: "abc-123".into(),
			status: "Failed".into(),
			extended_status: Some("ModelRefreshFailed".into()),
			refresh_type: None,
			start_time: None,
			end_time: None,
			service_exception_json: None,
		};
		let err = evaluate_terminal(request_id.clone(), record.clone())
			.expect_err("Failed status must be a refresh failure.");

		match err {
			Error::RefreshFailed(failure) => {
				assert_eq!(failure.status(), "Failed");
				assert_eq!(failure.extended_status(), Some("ModelRefreshFailed"));
			},
			other => panic!("Unexpected error: {other:?}."),
		}

		record.status = "completed".into();

		let output = evaluate_terminal(request_id, record).expect("Completed status must succeed.");

		assert_eq!(output.extended_status.as_deref(), Some("ModelRefreshFailed"));
	}
}
