//! Wire-level types shared by the provisioning workflow and the client
//! facade.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Semantic role assigned to a dataset column.
///
/// The wire names are the camelCase strings the synthesis pipeline expects in
/// its per-column descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SemanticType {
    Title,
    Semantic,
    Numeric,
    Categoric,
    Date,
    Links,
    CustomModel,
    Connection,
    Delete,
}

impl SemanticType {
    /// Full descriptor domain, in the order the backend enumerates it.
    pub const ALL: [SemanticType; 9] = [
        SemanticType::Title,
        SemanticType::Semantic,
        SemanticType::Numeric,
        SemanticType::Categoric,
        SemanticType::Date,
        SemanticType::Links,
        SemanticType::CustomModel,
        SemanticType::Connection,
        SemanticType::Delete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SemanticType::Title => "title",
            SemanticType::Semantic => "semantic",
            SemanticType::Numeric => "numeric",
            SemanticType::Categoric => "categoric",
            SemanticType::Date => "date",
            SemanticType::Links => "links",
            SemanticType::CustomModel => "customModel",
            SemanticType::Connection => "connection",
            SemanticType::Delete => "delete",
        }
    }
}

/// Dimensionality-reduction algorithm applied server-side to lay out the
/// workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reducer {
    #[default]
    Umap,
    PcaUmap,
    Tsne,
}

impl Reducer {
    pub fn as_str(self) -> &'static str {
        match self {
            Reducer::Umap => "UMAP",
            Reducer::PcaUmap => "PCA+UMAP",
            Reducer::Tsne => "t-SNE",
        }
    }
}

/// Who can see a provisioned space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    #[default]
    Private,
    Shared,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Shared => "shared",
        }
    }
}

/// External embedding provider the pipeline runs the dataset through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AiProvider {
    #[default]
    OpenAi,
    HuggingFace,
}

impl AiProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            AiProvider::OpenAi => "openai",
            AiProvider::HuggingFace => "huggingface",
        }
    }
}

/// Unique identifier of a provisioned workspace.
///
/// Generated client-side before the submission round-trip, so callers can
/// track an in-flight request even if provisioning later fails.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpaceId(String);

impl SpaceId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SpaceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SpaceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One observation from the pipeline progress endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressReport {
    #[serde(default)]
    pub progress: i64,
    #[serde(default)]
    pub error: Option<String>,
}

impl ProgressReport {
    /// The backend sends `""` for "no error"; only a non-empty message is
    /// fatal.
    pub(crate) fn failure(&self) -> Option<&str> {
        self.error.as_deref().filter(|message| !message.is_empty())
    }
}

/// Response envelope of the decision-parameters endpoint. The payload is
/// only well-formed once the nested `parameters` map is present.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct VariationsEnvelope {
    #[serde(default)]
    pub umap_variations: Option<UmapVariations>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct UmapVariations {
    #[serde(default)]
    pub parameters: Option<serde_json::Map<String, Value>>,
}

impl VariationsEnvelope {
    pub(crate) fn proposals(&self) -> Option<&serde_json::Map<String, Value>> {
        self.umap_variations
            .as_ref()
            .and_then(|variations| variations.parameters.as_ref())
    }
}

/// Candidate layout variations proposed by the pipeline, kept in backend
/// response order; rank is positional.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterProposals {
    candidates: Vec<(String, f64)>,
}

impl ParameterProposals {
    pub(crate) fn from_map(map: &serde_json::Map<String, Value>) -> Self {
        let candidates = map
            .iter()
            .map(|(name, score)| (name.clone(), score.as_f64().unwrap_or(f64::NAN)))
            .collect();
        Self { candidates }
    }

    /// Build proposals from explicit `(name, score)` pairs, preserving their
    /// order.
    pub fn from_scores<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        Self {
            candidates: pairs.into_iter().collect(),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.candidates.iter().map(|(name, _)| name.as_str())
    }

    pub fn score(&self, name: &str) -> Option<f64> {
        self.candidates
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, score)| *score)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.candidates.iter().any(|(candidate, _)| candidate == name)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// One space entry from the inventory endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SpaceEntry {
    pub space_id: String,
    pub space_name: String,
}

/// All spaces visible to the caller, bucketed by visibility level.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpaceInventory {
    #[serde(default)]
    pub public: Vec<SpaceEntry>,
    #[serde(default)]
    pub private: Vec<SpaceEntry>,
    #[serde(default)]
    pub shared: Vec<SpaceEntry>,
}

impl SpaceInventory {
    pub fn level(&self, visibility: Visibility) -> &[SpaceEntry] {
        match visibility {
            Visibility::Public => &self.public,
            Visibility::Private => &self.private,
            Visibility::Shared => &self.shared,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn semantic_type_wire_names_are_camel_case() {
        for ty in SemanticType::ALL {
            assert_eq!(serde_json::to_value(ty).unwrap(), json!(ty.as_str()));
        }
        assert_eq!(
            serde_json::to_value(SemanticType::CustomModel).unwrap(),
            json!("customModel")
        );
    }

    #[test]
    fn progress_error_is_fatal_only_when_non_empty() {
        let healthy: ProgressReport =
            serde_json::from_value(json!({"progress": 10, "error": ""})).unwrap();
        assert!(healthy.failure().is_none());

        let silent: ProgressReport =
            serde_json::from_value(json!({"progress": 10, "error": null})).unwrap();
        assert!(silent.failure().is_none());

        let broken: ProgressReport =
            serde_json::from_value(json!({"progress": 10, "error": "boom"})).unwrap();
        assert_eq!(broken.failure(), Some("boom"));
    }

    #[test]
    fn variations_envelope_requires_nested_parameters() {
        let empty: VariationsEnvelope = serde_json::from_value(json!({})).unwrap();
        assert!(empty.proposals().is_none());

        let partial: VariationsEnvelope =
            serde_json::from_value(json!({"umap_variations": {}})).unwrap();
        assert!(partial.proposals().is_none());

        let full: VariationsEnvelope = serde_json::from_value(
            json!({"umap_variations": {"parameters": {"a": 0.1, "b": 0.5}}}),
        )
        .unwrap();
        let proposals = ParameterProposals::from_map(full.proposals().unwrap());
        assert_eq!(proposals.len(), 2);
        assert_eq!(proposals.score("b"), Some(0.5));
    }

    #[test]
    fn proposals_preserve_backend_order() {
        let envelope: VariationsEnvelope = serde_json::from_value(
            json!({"umap_variations": {"parameters": {"z": 0.9, "a": 0.1, "m": 0.5}}}),
        )
        .unwrap();
        let proposals = ParameterProposals::from_map(envelope.proposals().unwrap());
        let names: Vec<_> = proposals.names().collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }
}
