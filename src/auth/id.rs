//! Strongly typed identifiers for tenants, clients, workspaces, datasets, and refresh requests.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				validate_view($kind, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 128;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty or whitespace.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (tenant, client, group, dataset, request).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (tenant, client, group, dataset, request).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (tenant, client, group, dataset, request).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { TenantId, "Azure AD tenant hosting the service principal.", "Tenant" }
def_id! { ClientId, "Application (client) identifier of the service principal.", "Client" }
def_id! { GroupId, "Power BI workspace (group) containing the dataset.", "Group" }
def_id! { DatasetId, "Power BI dataset to refresh.", "Dataset" }
def_id! { RequestId, "Correlation identifier issued by the service for a submitted refresh.", "Request" }

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identifiers_reject_surrounding_whitespace() {
		assert!(TenantId::new(" 72f988bf").is_err(), "Leading whitespace must be rejected.");
		assert!(GroupId::new("9f1c2b8c ").is_err(), "Trailing whitespace must be rejected.");

		let dataset = DatasetId::new("5c8b4a1e-7f89-4c33-9dd8-1f23c4567890")
			.expect("GUID dataset identifiers should be valid.");

		assert_eq!(dataset.as_ref(), "5c8b4a1e-7f89-4c33-9dd8-1f23c4567890");
		assert_eq!(
			RequestId::new("").expect_err("Empty identifiers must be rejected."),
			IdentifierError::Empty { kind: "Request" }
		);
		assert!(ClientId::new("with space").is_err());
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let group: GroupId =
			serde_json::from_str("\"group-42\"").expect("Group should deserialize successfully.");

		assert_eq!(group.as_ref(), "group-42");
		assert_eq!(serde_json::to_string(&group).expect("Group should serialize."), "\"group-42\"");
		assert!(serde_json::from_str::<GroupId>("\"with space\"").is_err());
		assert!(serde_json::from_str::<GroupId>("\"\"").is_err());
	}

	#[test]
	fn unicode_whitespace_and_length_limits() {
		let nbsp = format!("dataset{}id", '\u{00A0}');

		assert!(DatasetId::new(&nbsp).is_err());

		let exact = "a".repeat(IDENTIFIER_MAX_LEN);

		DatasetId::new(&exact).expect("Exact length should succeed.");

		let too_long = "a".repeat(IDENTIFIER_MAX_LEN + 1);

		assert_eq!(
			DatasetId::new(&too_long).expect_err("Overlong identifiers must be rejected."),
			IdentifierError::TooLong { kind: "Dataset", max: IDENTIFIER_MAX_LEN }
		);
	}

	#[test]
	fn debug_names_the_identifier_kind() {
		let request = RequestId::new("abc-123").expect("Request identifier should be valid.");

		assert_eq!(format!("{request:?}"), "Request(abc-123)");
		assert_eq!(request.to_string(), "abc-123");
		assert_eq!(&*request, "abc-123");
	}

	#[test]
	fn borrow_supports_fast_lookup() {
		let map: HashMap<RequestId, u8> = HashMap::from_iter([(
			RequestId::new("abc-123").expect("Request used for lookup should be valid."),
			7_u8,
		)]);

		assert_eq!(map.get("abc-123"), Some(&7));
	}
}
