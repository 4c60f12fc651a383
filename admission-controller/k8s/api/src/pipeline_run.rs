/// A single invocation of a Tekton build pipeline.
///
/// Only the fields the admission controller inspects are modeled; anything
/// else in the manifest is ignored when decoding.
#[derive(
    Clone, Debug, Default, PartialEq, kube::CustomResource, serde::Deserialize, serde::Serialize,
)]
#[kube(
    group = "tekton.dev",
    version = "v1beta1",
    kind = "PipelineRun",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_ref: Option<PipelineRef>,

    /// Pipeline parameters, in the order they appear in the manifest.
    #[serde(default)]
    pub params: Vec<Param>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct PipelineRef {
    pub name: String,
}

/// A named pipeline parameter.
///
/// Tekton also allows array and object values; those fail to decode here and
/// the build run is rejected.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
pub struct Param {
    pub name: String,
    pub value: String,
}

// === impl Param ===

impl Param {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}
