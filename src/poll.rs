//! Deadline-bounded polling for remote asynchronous operations.

// crates.io
use tokio::time::{self, Instant};
// self
use crate::{_prelude::*, error::TimeoutError};

/// Result of a single probe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome<T> {
	/// The operation reached a state the caller can act on.
	Ready(T),
	/// The operation is still running.
	Pending {
		/// Status text observed by this probe, reported if the wait times out.
		observed: Option<String>,
	},
}

/// Runs `probe` every `interval` until it returns [`PollOutcome::Ready`], fails, or `wait` elapses.
///
/// `wait` is an absolute deadline measured from the call. A probe still in flight when the
/// deadline passes is dropped, sleeps never extend past the deadline, and no probe starts at or
/// after it, so a zero `wait` times out without probing. Durations too large to add to the
/// clock (e.g. [`Duration::MAX`]) mean "no practical bound". Probe errors propagate immediately.
pub async fn poll_until<T, F, Fut>(interval: Duration, wait: Duration, mut probe: F) -> Result<T>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<PollOutcome<T>>>,
{
	let deadline = deadline_after(wait);
	let mut last_observed = None;

	loop {
		if Instant::now() >= deadline {
			break;
		}

		let outcome = match time::timeout_at(deadline, probe()).await {
			Ok(outcome) => outcome?,
			Err(_) => break,
		};

		match outcome {
			PollOutcome::Ready(value) => return Ok(value),
			PollOutcome::Pending { observed } => last_observed = observed.or(last_observed),
		}

		let now = Instant::now();

		if now >= deadline {
			break;
		}
		if now.checked_add(interval).is_none_or(|next| next >= deadline) {
			time::sleep_until(deadline).await;

			break;
		}

		time::sleep(interval).await;
	}

	Err(TimeoutError { waited: wait, last_observed }.into())
}

// Roughly 30 years.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn deadline_after(wait: Duration) -> Instant {
	let now = Instant::now();

	now.checked_add(wait).unwrap_or_else(|| now + FAR_FUTURE)
}
