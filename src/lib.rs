//! Client SDK for the Strata analytical workspace service.
//!
//! Two subsystems around one [`SpaceClient`] facade:
//!
//! - the **provisioning workflow** ([`provision`]): uploads a tabular
//!   dataset, polls the asynchronous synthesis pipeline, resolves the
//!   mid-pipeline layout decision (default policy or caller strategy), and
//!   returns the workspace id once the pipeline completes;
//! - the **session controller** ([`session`]): opens a browser-driven
//!   session against a provisioned workspace, performs the readiness
//!   handshake, and exposes the surface's command protocol plus image
//!   capture.
//!
//! ```no_run
//! use std::collections::HashMap;
//! use strata_sdk::{ClientConfig, CreateSpaceRequest, DatasetSource, SemanticType, SpaceClient};
//!
//! # async fn demo() -> strata_sdk::Result<()> {
//! let client = SpaceClient::new("/api/proxy", "sessionid=...", ClientConfig::from_env())?;
//! let request = CreateSpaceRequest::new(
//!     "stocks",
//!     DatasetSource::file("stocks.csv"),
//!     HashMap::from([
//!         ("Name".to_string(), SemanticType::Title),
//!         ("Description".to_string(), SemanticType::Semantic),
//!     ]),
//! );
//! let space_id = client.create_space(request).await?;
//!
//! let mut space = client.open_space(space_id).await?;
//! let _image = space.render_plot("Market Cap", "Volume").await?;
//! space.close().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod dataset;
pub mod error;
pub mod model;
pub mod provision;
pub mod session;
pub mod transport;

pub use client::SpaceClient;
pub use config::{ClientConfig, RenderOptions, Viewport};
pub use dataset::DatasetSource;
pub use error::{Error, Result};
pub use model::{
    AiProvider, ParameterProposals, Reducer, SemanticType, SpaceEntry, SpaceId, SpaceInventory,
    Visibility,
};
pub use provision::decision::{DecisionStrategy, MidpointDecision};
pub use provision::{CreateSpaceRequest, IdCallback, ProvisionOptions};
pub use session::wait::WaitStrategy;
pub use session::{SessionState, Space};
