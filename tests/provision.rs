//! Provisioning workflow tests against a scripted transport.
//!
//! The transport is the workflow's only collaborator, so these tests feed it
//! pre-recorded progress and proposal sequences and assert on the calls the
//! workflow makes.

use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strata_sdk::error::{Error, Result};
use strata_sdk::provision::{provision, CreateSpaceRequest, ProvisionOptions};
use strata_sdk::transport::{TrailingSlash, Transport, UploadForm};
use strata_sdk::{DatasetSource, SemanticType};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Upload(String),
    Progress,
    Parameters,
    Select {
        endpoint: String,
        slash: TrailingSlash,
        body: Value,
    },
}

/// Replays recorded responses: each queue pops until one element remains,
/// which then repeats forever.
#[derive(Default)]
struct ScriptedTransport {
    progress: Mutex<VecDeque<Value>>,
    parameters: Mutex<VecDeque<Value>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    fn new(
        progress: impl IntoIterator<Item = Value>,
        parameters: impl IntoIterator<Item = Value>,
    ) -> Self {
        Self {
            progress: Mutex::new(progress.into_iter().collect()),
            parameters: Mutex::new(parameters.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, wanted: fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| wanted(call)).count()
    }

    fn next_from(queue: &Mutex<VecDeque<Value>>) -> Value {
        let mut queue = queue.lock().unwrap();
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap_or(Value::Null)
        }
    }
}

impl Transport for ScriptedTransport {
    async fn get_json(&self, endpoint: &str, _slash: TrailingSlash) -> Result<Value> {
        if endpoint.starts_with("synthesis/progress/") {
            self.calls.lock().unwrap().push(Call::Progress);
            return Ok(Self::next_from(&self.progress));
        }
        if endpoint.starts_with("synthesis/parameters/") {
            self.calls.lock().unwrap().push(Call::Parameters);
            return Ok(Self::next_from(&self.parameters));
        }
        Err(Error::Transport {
            method: "GET".to_string(),
            url: endpoint.to_string(),
            message: "unscripted endpoint".to_string(),
        })
    }

    async fn post_json(&self, endpoint: &str, slash: TrailingSlash, body: &Value) -> Result<Value> {
        self.calls.lock().unwrap().push(Call::Select {
            endpoint: endpoint.to_string(),
            slash,
            body: body.clone(),
        });
        Ok(json!({}))
    }

    async fn post_multipart(
        &self,
        endpoint: &str,
        _slash: TrailingSlash,
        form: UploadForm,
    ) -> Result<Value> {
        assert!(!form.bytes.is_empty());
        self.calls
            .lock()
            .unwrap()
            .push(Call::Upload(endpoint.to_string()));
        Ok(json!({}))
    }
}

fn request() -> CreateSpaceRequest {
    CreateSpaceRequest::new(
        "stocks",
        DatasetSource::csv(&b"Name,Description,Extra\nacme,widgets,x\n"[..]),
        HashMap::from([
            ("Name".to_string(), SemanticType::Title),
            ("Description".to_string(), SemanticType::Semantic),
        ]),
    )
}

fn fast() -> ProvisionOptions {
    ProvisionOptions {
        poll_interval: Duration::from_millis(5),
        decision_deadline: Duration::from_millis(200),
    }
}

fn progress(value: i64) -> Value {
    json!({"progress": value, "error": null})
}

fn proposals(names: &[&str]) -> Value {
    let mut parameters = serde_json::Map::new();
    for (rank, name) in names.iter().enumerate() {
        parameters.insert(name.to_string(), json!(rank as f64 / 10.0));
    }
    json!({"umap_variations": {"parameters": parameters}})
}

#[tokio::test]
async fn succeeds_when_progress_reaches_full() {
    let transport = ScriptedTransport::new([progress(10), progress(100)], []);
    let delivered = Arc::new(Mutex::new(None));
    let delivered_in_callback = delivered.clone();

    let space_id = provision(
        &transport,
        request(),
        &fast(),
        None,
        Some(Box::new(move |id| {
            *delivered_in_callback.lock().unwrap() = Some(id.clone());
        })),
    )
    .await
    .unwrap();

    // The callback-delivered id is the id the workflow returns.
    assert_eq!(delivered.lock().unwrap().clone(), Some(space_id));
    assert_eq!(
        transport.calls().first(),
        Some(&Call::Upload("synthesis/landscape".to_string()))
    );
}

#[tokio::test]
async fn pipeline_error_fails_immediately_and_stops_polling() {
    let transport = ScriptedTransport::new(
        [json!({"progress": 10, "error": "synthesis blew up"}), progress(100)],
        [],
    );

    let err = provision(&transport, request(), &fast(), None, None)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Pipeline(message) if message == "synthesis blew up"));
    assert_eq!(transport.count(|call| matches!(call, Call::Progress)), 1);
}

#[tokio::test]
async fn empty_error_string_is_not_fatal() {
    let transport = ScriptedTransport::new(
        [json!({"progress": 10, "error": ""}), progress(100)],
        [],
    );
    provision(&transport, request(), &fast(), None, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn decision_phase_selects_the_midpoint_candidate() {
    let transport =
        ScriptedTransport::new([progress(60), progress(100)], [proposals(&["a", "b", "c"])]);

    let space_id = provision(&transport, request(), &fast(), None, None)
        .await
        .unwrap();

    let select = transport
        .calls()
        .into_iter()
        .find_map(|call| match call {
            Call::Select {
                endpoint,
                slash,
                body,
            } => Some((endpoint, slash, body)),
            _ => None,
        })
        .expect("selection submitted");
    assert_eq!(
        select.0,
        format!("synthesis/landscape/{space_id}/select-umap/b")
    );
    assert_eq!(select.1, TrailingSlash::Strip);
    assert_eq!(select.2, json!({"selected_variation": "b"}));
}

#[tokio::test]
async fn caller_strategy_overrides_the_default() {
    let transport =
        ScriptedTransport::new([progress(60), progress(100)], [proposals(&["a", "b", "c"])]);
    let pick_last = |proposals: &strata_sdk::ParameterProposals| {
        proposals.names().last().unwrap_or_default().to_string()
    };

    provision(&transport, request(), &fast(), Some(&pick_last), None)
        .await
        .unwrap();

    assert!(transport.calls().iter().any(|call| matches!(
        call,
        Call::Select { endpoint, .. } if endpoint.ends_with("/select-umap/c")
    )));
}

#[tokio::test]
async fn strategy_returning_unknown_candidate_is_a_precondition_error() {
    let transport =
        ScriptedTransport::new([progress(60), progress(100)], [proposals(&["a", "b"])]);
    let rogue = |_: &strata_sdk::ParameterProposals| "nonsense".to_string();

    let err = provision(&transport, request(), &fast(), Some(&rogue), None)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Precondition(_)));
    assert_eq!(
        transport.count(|call| matches!(call, Call::Select { .. })),
        0
    );
}

#[tokio::test]
async fn missing_proposals_time_out_with_the_decision_error() {
    let transport = ScriptedTransport::new(
        [progress(60)],
        // The envelope exists but never carries candidates.
        [json!({"umap_variations": {}})],
    );

    let err = provision(&transport, request(), &fast(), None, None)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::DecisionTimeout { .. }));
}

#[tokio::test]
async fn zero_progress_before_decision_keeps_polling() {
    let transport =
        ScriptedTransport::new([progress(0), progress(0), progress(30), progress(100)], []);

    provision(&transport, request(), &fast(), None, None)
        .await
        .unwrap();

    assert_eq!(transport.count(|call| matches!(call, Call::Progress)), 4);
}

#[tokio::test]
async fn zero_progress_after_decision_is_terminal() {
    let transport =
        ScriptedTransport::new([progress(60), progress(0)], [proposals(&["a", "b", "c"])]);

    provision(&transport, request(), &fast(), None, None)
        .await
        .unwrap();

    // The second observation (the buggy zero) ended the loop.
    assert_eq!(transport.count(|call| matches!(call, Call::Progress)), 2);
    assert_eq!(
        transport.count(|call| matches!(call, Call::Select { .. })),
        1
    );
}

#[tokio::test]
async fn mismatched_custom_models_fail_before_any_network_call() {
    let mut bad = request();
    bad.custom_models = Some(vec![None]); // two mapped types, one entry

    let transport = ScriptedTransport::new([], []);
    let delivered = Arc::new(Mutex::new(false));
    let delivered_in_callback = delivered.clone();

    let err = provision(
        &transport,
        bad,
        &fast(),
        None,
        Some(Box::new(move |_| {
            *delivered_in_callback.lock().unwrap() = true;
        })),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Precondition(_)));
    assert!(transport.calls().is_empty());
    // Validation happens before the id exists, so the callback never fired.
    assert!(!*delivered.lock().unwrap());
}
