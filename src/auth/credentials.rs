//! Service principal credentials used for the client-credentials exchange.

// crates.io
use oauth2::ClientSecret;
// self
use crate::{
	_prelude::*,
	auth::{ClientId, TenantId},
	error::ConfigError,
};

/// Service principal credentials, immutable once built.
///
/// The secret is held in [`ClientSecret`] so it never reaches `Debug` output or logs.
#[derive(Clone)]
pub struct Credentials {
	/// Tenant hosting the service principal.
	pub tenant: TenantId,
	/// Application (client) identifier.
	pub client_id: ClientId,
	client_secret: ClientSecret,
}
impl Credentials {
	/// Creates credentials, rejecting an empty client secret.
	pub fn new(
		tenant: TenantId,
		client_id: ClientId,
		client_secret: impl Into<String>,
	) -> Result<Self, ConfigError> {
		let client_secret = client_secret.into();

		if client_secret.is_empty() {
			return Err(ConfigError::EmptyClientSecret);
		}

		Ok(Self { tenant, client_id, client_secret: ClientSecret::new(client_secret) })
	}

	/// Returns the client secret. Callers must avoid logging it.
	pub fn client_secret(&self) -> &ClientSecret {
		&self.client_secret
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("tenant", &self.tenant)
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.finish()
	}
}
