// self
use crate::{_prelude::*, obs::OperationKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOperation<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOperation<F> = F;

/// A span builder used around remote operations.
#[derive(Clone, Debug)]
pub struct OperationSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OperationSpan {
	/// Creates a new span tagged with the provided operation kind + stage.
	pub fn new(kind: OperationKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("powerbi_refresh.operation", op = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOperation<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits the token-acquired event. Never logs the token itself.
pub fn token_acquired(tenant: &str) {
	#[cfg(feature = "tracing")]
	tracing::info!(tenant, "Acquired access token.");
	#[cfg(not(feature = "tracing"))]
	let _ = tenant;
}

/// Emits the refresh-submitted event.
pub fn refresh_submitted(dataset: &str, request_id: &str) {
	#[cfg(feature = "tracing")]
	tracing::info!(dataset, request_id, "Submitted dataset refresh.");
	#[cfg(not(feature = "tracing"))]
	let _ = (dataset, request_id);
}

/// Emits a per-poll status observation.
pub fn refresh_observed(request_id: &str, status: &str) {
	#[cfg(feature = "tracing")]
	tracing::trace!(request_id, status, "Observed refresh status.");
	#[cfg(not(feature = "tracing"))]
	let _ = (request_id, status);
}

/// Emits the terminal-state event.
pub fn refresh_finished(request_id: &str, status: &str, extended_status: Option<&str>) {
	#[cfg(feature = "tracing")]
	tracing::info!(request_id, status, extended_status, "Refresh reached a terminal state.");
	#[cfg(not(feature = "tracing"))]
	let _ = (request_id, status, extended_status);
}
