//! Identity and resource endpoints the client talks to.

// crates.io
use url::Host;
// self
use crate::{
	_prelude::*,
	auth::TenantId,
	error::ConfigError,
	refresh::DatasetTarget,
};

/// Default identity endpoint base.
pub const DEFAULT_LOGIN_URL: &str = "https://login.microsoftonline.com";
/// Default Power BI REST API base.
pub const DEFAULT_API_URL: &str = "https://api.powerbi.com/v1.0/myorg";
/// Default token audience.
pub const DEFAULT_RESOURCE: &str = "https://analysis.windows.net/powerbi/api";

/// Validated identity/API base URLs plus the token audience.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceEndpoints {
	login: Url,
	api: Url,
	resource: String,
}
impl ServiceEndpoints {
	/// Builds endpoints from explicit bases, keeping the default audience.
	///
	/// Both bases must use HTTPS; plain HTTP is accepted for loopback hosts only.
	pub fn new(login: Url, api: Url) -> Result<Self, ConfigError> {
		validate_endpoint("login", &login)?;
		validate_endpoint("api", &api)?;

		Ok(Self { login, api, resource: DEFAULT_RESOURCE.into() })
	}

	/// Parses both bases before validating them.
	pub fn parse(login: &str, api: &str) -> Result<Self, ConfigError> {
		let login = Url::parse(login)
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: "login", source })?;
		let api = Url::parse(api)
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: "api", source })?;

		Self::new(login, api)
	}

	/// Overrides the token audience (sovereign clouds).
	pub fn with_resource(mut self, resource: impl Into<String>) -> Result<Self, ConfigError> {
		let resource = resource.into();

		if resource.trim().is_empty() {
			return Err(ConfigError::EmptyResource);
		}

		self.resource = resource;

		Ok(self)
	}

	/// Identity endpoint base.
	pub fn login(&self) -> &Url {
		&self.login
	}

	/// REST API base.
	pub fn api(&self) -> &Url {
		&self.api
	}

	/// Token audience.
	pub fn resource(&self) -> &str {
		&self.resource
	}

	/// Scope requested alongside the audience: `<resource>/.default`.
	pub fn scope(&self) -> String {
		format!("{}/.default", self.resource.trim_end_matches('/'))
	}

	/// `{login}/{tenant}/oauth2/token`.
	pub fn token_url(&self, tenant: &TenantId) -> Url {
		join_segments(&self.login, &[tenant.as_ref(), "oauth2", "token"])
	}

	/// `{api}/groups/{group}/datasets/{dataset}/refreshes`.
	pub fn refreshes_url(&self, target: &DatasetTarget) -> Url {
		join_segments(
			&self.api,
			&["groups", target.group.as_ref(), "datasets", target.dataset.as_ref(), "refreshes"],
		)
	}
}
impl Default for ServiceEndpoints {
	fn default() -> Self {
		Self::parse(DEFAULT_LOGIN_URL, DEFAULT_API_URL)
			.unwrap_or_else(|e| unreachable!("Built-in endpoints must validate: {e}."))
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ConfigError> {
	if url.cannot_be_a_base() {
		return Err(ConfigError::CannotBeBase { endpoint: name, url: url.to_string() });
	}

	match url.scheme() {
		"https" => Ok(()),
		"http" if is_loopback(url) => Ok(()),
		_ => Err(ConfigError::InsecureEndpoint { endpoint: name, url: url.to_string() }),
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(Host::Ipv4(ip)) => ip.is_loopback(),
		Some(Host::Ipv6(ip)) => ip.is_loopback(),
		None => false,
	}
}

fn join_segments(base: &Url, segments: &[&str]) -> Url {
	let mut url = base.clone();

	// Bases are validated to carry path segments, so this never yields `Err`.
	if let Ok(mut path) = url.path_segments_mut() {
		path.pop_if_empty().extend(segments);
	}

	url
}
