//! Host-facing task parameters and ISO-8601 duration parsing.

// crates.io
use serde::{Deserializer, de::Error as _};
// self
use crate::{_prelude::*, error::ConfigError, refresh::RefreshOptions};

const DATE_UNITS: &[(char, u64)] = &[('D', 86_400)];
const TIME_UNITS: &[(char, u64)] = &[('H', 3_600), ('M', 60), ('S', 1)];

/// Resolved parameters handed over by the host task runner.
///
/// Field names follow the host's camelCase convention; durations are ISO-8601 strings such as
/// `PT5S` or `PT10M`.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshParameters {
	/// Azure AD tenant.
	pub tenant_id: String,
	/// Service principal application id.
	pub client_id: String,
	/// Service principal secret.
	pub client_secret: String,
	/// Workspace id.
	pub group_id: String,
	/// Dataset id.
	pub dataset_id: String,
	/// Wait for a terminal refresh state.
	#[serde(default)]
	pub wait: bool,
	/// Delay between polls.
	#[serde(default = "default_poll_duration", deserialize_with = "iso8601_duration")]
	pub poll_duration: Duration,
	/// Upper bound on the polling phase.
	#[serde(default = "default_wait_duration", deserialize_with = "iso8601_duration")]
	pub wait_duration: Duration,
	/// Identity endpoint base override.
	#[serde(default)]
	pub login_url: Option<String>,
	/// REST API base override.
	#[serde(default)]
	pub api_url: Option<String>,
	/// Token audience override.
	#[serde(default)]
	pub resource: Option<String>,
}
impl RefreshParameters {
	/// Polling options derived from `wait`, `pollDuration`, and `waitDuration`.
	pub fn options(&self) -> RefreshOptions {
		RefreshOptions::default()
			.with_wait(self.wait)
			.with_poll_interval(self.poll_duration)
			.with_wait_timeout(self.wait_duration)
	}
}
impl Debug for RefreshParameters {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshParameters")
			.field("tenant_id", &self.tenant_id)
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.field("group_id", &self.group_id)
			.field("dataset_id", &self.dataset_id)
			.field("wait", &self.wait)
			.field("poll_duration", &self.poll_duration)
			.field("wait_duration", &self.wait_duration)
			.field("login_url", &self.login_url)
			.field("api_url", &self.api_url)
			.field("resource", &self.resource)
			.finish()
	}
}

/// Parses an ISO-8601 duration of the form `PnDTnHnMn.nS` or `PnW`.
///
/// Designators are case-insensitive; only seconds may carry a fraction. Calendar units
/// (years, months) and negative durations are rejected.
pub fn parse_iso8601_duration(value: &str) -> Result<Duration, ConfigError> {
	let invalid = || ConfigError::InvalidDuration { value: value.to_owned() };
	let upper = value.trim().to_ascii_uppercase();
	let rest = upper.strip_prefix('P').ok_or_else(invalid)?;

	if rest.is_empty() {
		return Err(invalid());
	}
	if let Some(weeks) = rest.strip_suffix('W') {
		let weeks = weeks.parse::<u64>().map_err(|_| invalid())?;

		return weeks.checked_mul(7 * 86_400).map(Duration::from_secs).ok_or_else(invalid);
	}

	let (date, time) = match rest.split_once('T') {
		Some((_, "")) => return Err(invalid()),
		Some((date, time)) => (date, time),
		None => (rest, ""),
	};
	let mut total = Duration::ZERO;

	for (part, units) in [(date, DATE_UNITS), (time, TIME_UNITS)] {
		let mut rest = part;
		let mut allowed = units;

		while !rest.is_empty() {
			let end = rest.find(|c: char| c.is_ascii_alphabetic()).ok_or_else(invalid)?;
			let (number, tail) = rest.split_at(end);
			let designator = tail.chars().next().ok_or_else(invalid)?;
			// Designators must appear in descending order, each at most once.
			let position =
				allowed.iter().position(|(unit, _)| *unit == designator).ok_or_else(invalid)?;
			let amount = component(number, designator, allowed[position].1).ok_or_else(invalid)?;

			total = total.checked_add(amount).ok_or_else(invalid)?;
			allowed = &allowed[position + 1..];
			rest = &tail[1..];
		}
	}

	Ok(total)
}

fn component(number: &str, designator: char, scale: u64) -> Option<Duration> {
	if number.is_empty() || number.starts_with(['+', '-']) {
		return None;
	}

	let number = number.replace(',', ".");

	match number.split_once('.') {
		Some((whole, fraction)) if designator == 'S' => {
			if fraction.is_empty()
				|| fraction.len() > 9
				|| !fraction.bytes().all(|b| b.is_ascii_digit())
			{
				return None;
			}

			let secs = if whole.is_empty() { 0 } else { whole.parse::<u64>().ok()? };
			let nanos = format!("{fraction:0<9}").parse::<u32>().ok()?;

			Some(Duration::new(secs, nanos))
		},
		Some(_) => None,
		None => number.parse::<u64>().ok()?.checked_mul(scale).map(Duration::from_secs),
	}
}

fn iso8601_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = String::deserialize(deserializer)?;

	parse_iso8601_duration(&raw).map_err(D::Error::custom)
}

fn default_poll_duration() -> Duration {
	RefreshOptions::DEFAULT_POLL_INTERVAL
}

fn default_wait_duration() -> Duration {
	RefreshOptions::DEFAULT_WAIT_TIMEOUT
}
