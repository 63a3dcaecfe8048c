//! Client facade wiring configuration, transport, provisioning and sessions
//! together.

use crate::config::ClientConfig;
use crate::error::Result;
use crate::model::{SpaceId, SpaceInventory, Visibility};
use crate::provision::{
    self, decision::DecisionStrategy, CreateSpaceRequest, IdCallback, ProvisionOptions,
};
use crate::session::{wait::WaitStrategy, Space};
use crate::transport::{decode, HttpTransport, TrailingSlash, Transport};

/// Entry point of the SDK: one client per target deployment and credential.
///
/// Holds no global state; independent clients with different configurations
/// can run concurrently in one process.
pub struct SpaceClient {
    transport: HttpTransport,
    config: ClientConfig,
    cookie: String,
    provision_options: ProvisionOptions,
}

impl SpaceClient {
    /// `api_root` is the path prefix the backend API is mounted under
    /// (e.g. `/api/proxy`); `cookie` is the opaque session credential sent
    /// with every request and injected into opened sessions.
    pub fn new(
        api_root: impl Into<String>,
        cookie: impl Into<String>,
        config: ClientConfig,
    ) -> Result<Self> {
        let cookie = cookie.into();
        let transport = HttpTransport::new(&config, api_root, cookie.clone())?;
        Ok(Self {
            transport,
            config,
            cookie,
            provision_options: ProvisionOptions::default(),
        })
    }

    /// Override polling pace and the decision-phase deadline.
    pub fn with_provision_options(mut self, options: ProvisionOptions) -> Self {
        self.provision_options = options;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// All spaces visible to the caller, bucketed by visibility level.
    pub async fn spaces(&self) -> Result<SpaceInventory> {
        let endpoint = "api/getSpaces";
        decode(
            endpoint,
            self.transport
                .get_json(endpoint, TrailingSlash::Keep)
                .await?,
        )
    }

    /// Ids of every space named `name` across the given visibility levels.
    pub async fn space_ids_by_name(
        &self,
        name: &str,
        levels: &[Visibility],
    ) -> Result<Vec<String>> {
        let inventory = self.spaces().await?;
        Ok(levels
            .iter()
            .flat_map(|level| {
                inventory
                    .level(*level)
                    .iter()
                    .filter(|space| space.space_name == name)
                    .map(|space| space.space_id.clone())
            })
            .collect())
    }

    /// Provision a new space with the default decision policy.
    pub async fn create_space(&self, request: CreateSpaceRequest) -> Result<SpaceId> {
        provision::provision(&self.transport, request, &self.provision_options, None, None).await
    }

    /// Provision a new space with a caller-supplied decision strategy and/or
    /// an early id callback.
    pub async fn create_space_with(
        &self,
        request: CreateSpaceRequest,
        strategy: Option<&dyn DecisionStrategy>,
        on_id_assigned: Option<IdCallback>,
    ) -> Result<SpaceId> {
        provision::provision(
            &self.transport,
            request,
            &self.provision_options,
            strategy,
            on_id_assigned,
        )
        .await
    }

    /// Open an interactive session against an already provisioned space.
    pub async fn open_space(&self, space_id: SpaceId) -> Result<Space> {
        self.open_space_with(space_id, WaitStrategy::default()).await
    }

    /// Open a session with an explicit readiness wait strategy (see
    /// [`WaitStrategy::Polling`] for constrained embeddings).
    pub async fn open_space_with(
        &self,
        space_id: SpaceId,
        strategy: WaitStrategy,
    ) -> Result<Space> {
        Space::open(space_id, &self.cookie, self.config.clone(), strategy).await
    }
}
