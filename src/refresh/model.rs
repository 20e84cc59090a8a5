//! Refresh targets, history records, and the published output.

// std
use std::ops::Deref;
// crates.io
use serde::Deserializer;
// self
use crate::{
	_prelude::*,
	auth::{DatasetId, GroupId, RequestId},
};

/// Status the service reports while a refresh is still running.
pub const UNKNOWN_STATUS: &str = "Unknown";

/// Workspace + dataset pair a refresh applies to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DatasetTarget {
	/// Workspace containing the dataset.
	pub group: GroupId,
	/// Dataset to refresh.
	pub dataset: DatasetId,
}
impl DatasetTarget {
	/// Pairs a workspace with one of its datasets.
	pub fn new(group: GroupId, dataset: DatasetId) -> Self {
		Self { group, dataset }
	}
}

/// Coarse classification of a [`RefreshRecord`] status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshState {
	/// Status is exactly `Unknown`.
	InProgress,
	/// Status is `completed` in any casing.
	Completed,
	/// Any other status (`Failed`, `Disabled`, `Cancelled`, ...).
	Failed,
}

/// One entry of a dataset's refresh history, as returned by the service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRecord {
	/// Correlation identifier echoed from the submission.
	#[serde(default)]
	pub request_id: String,
	/// Service status; a missing or `null` status reads as [`UNKNOWN_STATUS`].
	#[serde(default = "unknown_status", deserialize_with = "status_or_unknown")]
	pub status: String,
	/// Finer-grained status detail.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub extended_status: Option<String>,
	/// How the refresh was triggered (`ViaApi`, `Scheduled`, ...).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_type: Option<String>,
	/// Start instant.
	#[serde(default, with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
	pub start_time: Option<OffsetDateTime>,
	/// End instant, absent while running.
	#[serde(default, with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
	pub end_time: Option<OffsetDateTime>,
	/// Service-side failure payload, kept verbatim.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub service_exception_json: Option<String>,
}
impl RefreshRecord {
	/// `true` while the service still reports [`UNKNOWN_STATUS`].
	pub fn is_in_progress(&self) -> bool {
		self.status == UNKNOWN_STATUS
	}

	/// `true` when the status is `completed`, ignoring case.
	pub fn is_completed(&self) -> bool {
		self.status.eq_ignore_ascii_case("completed")
	}

	/// Classifies the status.
	pub fn state(&self) -> RefreshState {
		if self.is_in_progress() {
			RefreshState::InProgress
		} else if self.is_completed() {
			RefreshState::Completed
		} else {
			RefreshState::Failed
		}
	}
}

/// Refresh history for one dataset.
///
/// Decodes both a bare JSON array and the OData `{"value": [...]}` envelope.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Refreshes(Vec<RefreshRecord>);
impl Refreshes {
	/// First record carrying `request_id`.
	pub fn find(&self, request_id: &str) -> Option<&RefreshRecord> {
		self.0.iter().find(|record| record.request_id == request_id)
	}

	/// Takes ownership of the first record carrying `request_id`.
	pub fn into_record(self, request_id: &str) -> Option<RefreshRecord> {
		self.0.into_iter().find(|record| record.request_id == request_id)
	}
}
impl Deref for Refreshes {
	type Target = [RefreshRecord];

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl<'de> Deserialize<'de> for Refreshes {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		match RefreshesRepr::deserialize(deserializer)? {
			RefreshesRepr::Bare(records) | RefreshesRepr::Envelope { value: records } =>
				Ok(Self(records)),
		}
	}
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RefreshesRepr {
	Bare(Vec<RefreshRecord>),
	Envelope {
		#[serde(default)]
		value: Vec<RefreshRecord>,
	},
}

/// Result published to the host once a refresh was submitted (and, optionally, awaited).
///
/// Status fields stay empty unless a terminal record was observed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshOutput {
	/// Correlation identifier of the submitted refresh.
	pub request_id: RequestId,
	/// Terminal status.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<String>,
	/// Terminal extended status.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub extended_status: Option<String>,
	/// Refresh trigger type.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub refresh_type: Option<String>,
	/// Start instant.
	#[serde(with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
	pub start_time: Option<OffsetDateTime>,
	/// End instant.
	#[serde(with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
	pub end_time: Option<OffsetDateTime>,
}
impl RefreshOutput {
	/// Output for a refresh that was submitted without waiting.
	pub fn submitted(request_id: RequestId) -> Self {
		Self {
			request_id,
			status: None,
			extended_status: None,
			refresh_type: None,
			start_time: None,
			end_time: None,
		}
	}

	/// Output carrying every status field of `record`.
	pub fn from_record(request_id: RequestId, record: &RefreshRecord) -> Self {
		Self {
			request_id,
			status: Some(record.status.clone()),
			extended_status: record.extended_status.clone(),
			refresh_type: record.refresh_type.clone(),
			start_time: record.start_time,
			end_time: record.end_time,
		}
	}
}

fn unknown_status() -> String {
	UNKNOWN_STATUS.into()
}

fn status_or_unknown<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(unknown_status))
}
