//! One-shot refresh task composed from host parameters.

// self
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;
use crate::{
	_prelude::*,
	auth::{ClientId, Credentials, DatasetId, GroupId, TenantId},
	client::AuthenticatedClient,
	config::RefreshParameters,
	endpoint::{DEFAULT_API_URL, DEFAULT_LOGIN_URL, ServiceEndpoints},
	error::ConfigError,
	http::HttpTransport,
	refresh::{DatasetTarget, RefreshOptions, RefreshOrchestrator, RefreshOutput},
};

/// Validated inputs for a single dataset refresh.
#[derive(Clone, Debug)]
pub struct RefreshDatasetTask {
	/// Service principal credentials.
	pub credentials: Credentials,
	/// Dataset to refresh.
	pub target: DatasetTarget,
	/// Waiting behavior.
	pub options: RefreshOptions,
	/// Identity/API endpoints.
	pub endpoints: ServiceEndpoints,
}
impl RefreshDatasetTask {
	/// Validates host parameters into a runnable task.
	pub fn from_parameters(params: RefreshParameters) -> Result<Self, ConfigError> {
		let options = params.options();

		options.validate()?;

		let credentials = Credentials::new(
			TenantId::new(&params.tenant_id)?,
			ClientId::new(&params.client_id)?,
			params.client_secret,
		)?;
		let target =
			DatasetTarget::new(GroupId::new(&params.group_id)?, DatasetId::new(&params.dataset_id)?);
		let mut endpoints = ServiceEndpoints::parse(
			params.login_url.as_deref().unwrap_or(DEFAULT_LOGIN_URL),
			params.api_url.as_deref().unwrap_or(DEFAULT_API_URL),
		)?;

		if let Some(resource) = params.resource {
			endpoints = endpoints.with_resource(resource)?;
		}

		Ok(Self { credentials, target, options, endpoints })
	}

	/// Runs the refresh over a caller-supplied transport.
	pub async fn run_with_transport<C>(&self, transport: Arc<C>) -> Result<RefreshOutput>
	where
		C: ?Sized + HttpTransport,
	{
		let client = AuthenticatedClient::with_transport(
			self.credentials.clone(),
			self.endpoints.clone(),
			transport,
		);

		RefreshOrchestrator::new(Arc::new(client), self.options)?.refresh(&self.target).await
	}

	/// Runs the refresh over a default reqwest transport.
	#[cfg(feature = "reqwest")]
	pub async fn run(&self) -> Result<RefreshOutput> {
		self.run_with_transport(Arc::new(ReqwestHttpClient::default())).await
	}
}
impl TryFrom<RefreshParameters> for RefreshDatasetTask {
	type Error = ConfigError;

	fn try_from(params: RefreshParameters) -> Result<Self, Self::Error> {
		Self::from_parameters(params)
	}
}
