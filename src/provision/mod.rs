//! Provisioning workflow: submit a dataset, then drive the asynchronous
//! synthesis pipeline to completion.
//!
//! One invocation owns its whole lifecycle: id generation, the single
//! multipart submission, the progress poll loop, and the exactly-once
//! mid-pipeline layout decision. Waits are cooperative sleeps, and the only
//! cancellation is the decision-phase deadline.

pub mod decision;

use crate::dataset::{one_hot_descriptors, DatasetSource};
use crate::error::{Error, Result};
use crate::model::{
    AiProvider, ParameterProposals, ProgressReport, Reducer, SemanticType, SpaceId,
    VariationsEnvelope, Visibility,
};
use crate::transport::{decode, TrailingSlash, Transport, UploadForm};
use decision::{DecisionStrategy, MidpointDecision};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Progress percentage at which the pipeline pauses for a layout choice.
const DECISION_PROGRESS: i64 = 50;
/// Terminal progress percentage.
const COMPLETE_PROGRESS: i64 = 100;

/// Notified with the generated space id before the submission round-trip, so
/// the caller can track the request while it is still in flight.
pub type IdCallback = Box<dyn FnOnce(&SpaceId) + Send>;

/// Pacing and deadlines for one provisioning run.
#[derive(Debug, Clone)]
pub struct ProvisionOptions {
    /// Delay between progress (and proposal) observations.
    pub poll_interval: Duration,
    /// How long the decision sub-phase waits for proposals to materialize.
    pub decision_deadline: Duration,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            decision_deadline: Duration::from_secs(3600),
        }
    }
}

/// Everything the caller supplies for a new space.
#[derive(Debug)]
pub struct CreateSpaceRequest {
    pub name: String,
    pub data: DatasetSource,
    /// Column name to semantic type. Columns left out are dropped server-side.
    pub types: HashMap<String, SemanticType>,
    /// One optional model override per mapped type entry. When present, the
    /// length must equal `types.len()`.
    pub custom_models: Option<Vec<Option<String>>>,
    pub reducer: Reducer,
    pub visibility: Visibility,
    pub ai_provider: AiProvider,
}

impl CreateSpaceRequest {
    pub fn new(
        name: impl Into<String>,
        data: DatasetSource,
        types: HashMap<String, SemanticType>,
    ) -> Self {
        Self {
            name: name.into(),
            data,
            types,
            custom_models: None,
            reducer: Reducer::default(),
            visibility: Visibility::default(),
            ai_provider: AiProvider::default(),
        }
    }
}

/// Immutable submission payload with the workspace id already attached.
struct PreparedSubmission {
    space_id: SpaceId,
    form: UploadForm,
}

/// Validate and encode the request. Pure apart from reading the dataset
/// source; runs entirely before any network activity.
fn prepare(request: CreateSpaceRequest) -> Result<PreparedSubmission> {
    let columns = request.data.columns()?;
    let descriptors = one_hot_descriptors(&columns, &request.types);

    let custom_models = match request.custom_models {
        Some(models) => {
            if models.len() != request.types.len() {
                return Err(Error::Precondition(format!(
                    "custom model list has {} entries, expected one per mapped type ({})",
                    models.len(),
                    request.types.len()
                )));
            }
            models
        }
        None => vec![None; request.types.len()],
    };

    let extension = request.data.extension().to_string();
    let space_id = SpaceId::generate();
    let file_key = format!("{}-{}.{}", request.name, space_id, extension);

    // Field names are what the landscape endpoint expects verbatim.
    let fields = vec![
        ("space_id".to_string(), space_id.as_str().to_string()),
        ("space_name".to_string(), request.name.clone()),
        (
            "is_public".to_string(),
            (request.visibility == Visibility::Public).to_string(),
        ),
        ("red_model".to_string(), request.reducer.as_str().to_string()),
        (
            "custom_models".to_string(),
            serde_json::to_string(&custom_models)
                .map_err(|err| Error::Precondition(format!("unencodable model list: {err}")))?,
        ),
        (
            "data_types".to_string(),
            serde_json::to_string(&descriptors)
                .map_err(|err| Error::Precondition(format!("unencodable descriptors: {err}")))?,
        ),
        (
            "ai_provider".to_string(),
            request.ai_provider.as_str().to_string(),
        ),
        ("file_key".to_string(), file_key),
    ];

    let form = UploadForm {
        fields,
        file_name: format!("data.{extension}"),
        mime: format!("text/{extension}"),
        bytes: request.data.into_bytes()?,
    };

    Ok(PreparedSubmission { space_id, form })
}

/// Provision a workspace: upload the dataset, poll the pipeline, resolve the
/// mid-pipeline layout decision, and return once the pipeline reports done.
///
/// `on_id_assigned` fires with the generated id before the upload, regardless
/// of the eventual outcome. A `None` strategy falls back to
/// [`MidpointDecision`].
pub async fn provision<T: Transport>(
    transport: &T,
    request: CreateSpaceRequest,
    options: &ProvisionOptions,
    strategy: Option<&dyn DecisionStrategy>,
    on_id_assigned: Option<IdCallback>,
) -> Result<SpaceId> {
    let PreparedSubmission { space_id, form } = prepare(request)?;

    if let Some(notify) = on_id_assigned {
        notify(&space_id);
    }

    tracing::info!(space_id = %space_id, "submitting dataset");
    // A failed submission may have partially registered the space
    // server-side; it is not safe to reattempt automatically.
    transport
        .post_multipart("synthesis/landscape", TrailingSlash::Keep, form)
        .await?;

    poll_to_completion(transport, &space_id, options, strategy).await?;
    Ok(space_id)
}

/// Outer polling loop. State:
/// `Polling -> (ParameterPending -> ParameterResolved ->) Polling ->
/// {Succeeded | Failed | TimedOut}`; the decision sub-phase runs at most
/// once per workflow.
async fn poll_to_completion<T: Transport>(
    transport: &T,
    space_id: &SpaceId,
    options: &ProvisionOptions,
    strategy: Option<&dyn DecisionStrategy>,
) -> Result<()> {
    let progress_endpoint = format!("synthesis/progress/{space_id}");
    let mut decision_resolved = false;

    loop {
        let report: ProgressReport = decode(
            &progress_endpoint,
            transport
                .get_json(&progress_endpoint, TrailingSlash::Keep)
                .await?,
        )?;
        tracing::debug!(space_id = %space_id, progress = report.progress, "pipeline progress");

        if let Some(message) = report.failure() {
            return Err(Error::Pipeline(message.to_string()));
        }

        if report.progress >= DECISION_PROGRESS && !decision_resolved {
            let proposals = await_proposals(transport, space_id, options).await?;
            let chosen = resolve_decision(strategy, &proposals)?;
            tracing::info!(space_id = %space_id, variation = %chosen, "confirming layout variation");
            // This endpoint is one of the slash-strippers.
            transport
                .post_json(
                    &format!("synthesis/landscape/{space_id}/select-umap/{chosen}"),
                    TrailingSlash::Strip,
                    &json!({ "selected_variation": chosen }),
                )
                .await?;
            decision_resolved = true;
        }

        if report.progress == COMPLETE_PROGRESS {
            return Ok(());
        }
        if stalled_progress_reset(report.progress, decision_resolved) {
            return Ok(());
        }

        tokio::time::sleep(options.poll_interval).await;
    }
}

/// The synthesis pipeline sometimes resets its progress counter to zero right
/// after a layout selection is confirmed, even though the build completes
/// server-side. Until that is fixed upstream, a zero observed after the
/// decision is treated as completion. Kept as a single named check so it can
/// be deleted without touching the loop.
// TODO: remove once the progress endpoint stops resetting after selection.
fn stalled_progress_reset(progress: i64, decision_resolved: bool) -> bool {
    progress == 0 && decision_resolved
}

/// Nested bounded wait for the proposal payload. The endpoint returns an
/// incomplete envelope until the candidates exist; an empty candidate map
/// counts as not-yet-ready because there is nothing to choose from.
async fn await_proposals<T: Transport>(
    transport: &T,
    space_id: &SpaceId,
    options: &ProvisionOptions,
) -> Result<ParameterProposals> {
    let endpoint = format!("synthesis/parameters/{space_id}");
    let started = Instant::now();

    loop {
        let envelope: VariationsEnvelope = decode(
            &endpoint,
            transport.get_json(&endpoint, TrailingSlash::Keep).await?,
        )?;

        if let Some(parameters) = envelope.proposals() {
            if !parameters.is_empty() {
                return Ok(ParameterProposals::from_map(parameters));
            }
        }

        if started.elapsed() >= options.decision_deadline {
            return Err(Error::DecisionTimeout {
                waited: options.decision_deadline,
            });
        }

        tracing::debug!(space_id = %space_id, "layout proposals not ready");
        tokio::time::sleep(options.poll_interval).await;
    }
}

/// Resolve the decision with the caller's strategy or the default, and hold
/// the strategy to its contract: the chosen key must be one of the proposals.
fn resolve_decision(
    strategy: Option<&dyn DecisionStrategy>,
    proposals: &ParameterProposals,
) -> Result<String> {
    let chosen = match strategy {
        Some(strategy) => strategy.choose(proposals),
        None => MidpointDecision.choose(proposals),
    };
    if !proposals.contains(&chosen) {
        return Err(Error::Precondition(format!(
            "decision strategy returned {chosen:?}, which is not a proposed variation"
        )));
    }
    Ok(chosen)
}
