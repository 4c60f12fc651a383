use buildpack_admission_k8s_api::{DynamicObject, Param, PipelineRun, Resource};
use serde_json::Value;

/// The parameters of a build run, in manifest order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedResource {
    name: Option<String>,
    params: Vec<Param>,
}

/// The build run could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum PayloadDecodeError {
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a {expected_api_version} {expected_kind}, got apiVersion '{api_version}' kind '{kind}'")]
    UnexpectedType {
        api_version: String,
        kind: String,
        expected_api_version: String,
        expected_kind: String,
    },
}

// === impl ParsedResource ===

impl ParsedResource {
    /// Decodes a serialized `PipelineRun` manifest.
    pub fn from_slice(raw: &[u8]) -> Result<Self, PayloadDecodeError> {
        let value = serde_json::from_slice::<Value>(raw)?;
        Self::from_value(value)
    }

    /// Decodes a `PipelineRun` from the untyped object carried in an admission
    /// request.
    pub fn from_object(obj: DynamicObject) -> Result<Self, PayloadDecodeError> {
        let value = serde_json::to_value(obj)?;
        Self::from_value(value)
    }

    /// The manifest must be a `PipelineRun`; `metadata` may be omitted.
    fn from_value(mut value: Value) -> Result<Self, PayloadDecodeError> {
        let field = |name: &str| {
            value
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let api_version = field("apiVersion");
        let kind = field("kind");
        let expected_api_version = PipelineRun::api_version(&());
        let expected_kind = PipelineRun::kind(&());
        if api_version != expected_api_version || kind != expected_kind {
            return Err(PayloadDecodeError::UnexpectedType {
                api_version,
                kind,
                expected_api_version: expected_api_version.into_owned(),
                expected_kind: expected_kind.into_owned(),
            });
        }

        if let Some(obj) = value.as_object_mut() {
            obj.entry("metadata")
                .or_insert_with(|| Value::Object(Default::default()));
        }
        let run = serde_json::from_value::<PipelineRun>(value)?;
        Ok(Self::from(run))
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }
}

impl From<PipelineRun> for ParsedResource {
    fn from(run: PipelineRun) -> Self {
        Self {
            name: run.metadata.name,
            params: run.spec.params,
        }
    }
}

impl FromIterator<Param> for ParsedResource {
    fn from_iter<T: IntoIterator<Item = Param>>(iter: T) -> Self {
        Self {
            name: None,
            params: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn preserves_order() {
        let raw = serde_json::to_vec(&json!({
            "apiVersion": "tekton.dev/v1beta1",
            "kind": "PipelineRun",
            "metadata": { "name": "test2run", "namespace": "image-build" },
            "spec": {
                "params": [
                    { "name": "SOURCE_URL", "value": "https://example.com/repo" },
                    { "name": "APP_IMAGE", "value": "a/b/c" },
                    { "name": "BUILDER_IMAGE", "value": "b" },
                    { "name": "APP_IMAGE", "value": "d/e/f" },
                ],
            },
        }))
        .unwrap();

        let parsed = ParsedResource::from_slice(&raw).unwrap();
        assert_eq!(parsed.name(), Some("test2run"));
        let names = parsed
            .params()
            .iter()
            .map(|p| (p.name.as_str(), p.value.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            [
                ("SOURCE_URL", "https://example.com/repo"),
                ("APP_IMAGE", "a/b/c"),
                ("BUILDER_IMAGE", "b"),
                ("APP_IMAGE", "d/e/f"),
            ]
        );
    }

    #[test]
    fn invalid_json() {
        let error = ParsedResource::from_slice(b"{ this is not json").unwrap_err();
        let expected = serde_json::from_slice::<serde_json::Value>(b"{ this is not json")
            .unwrap_err()
            .to_string();
        assert_eq!(error.to_string(), expected);
    }

    #[test]
    fn non_string_value() {
        let raw = serde_json::to_vec(&json!({
            "apiVersion": "tekton.dev/v1beta1",
            "kind": "PipelineRun",
            "metadata": { "name": "test2run" },
            "spec": { "params": [{ "name": "USER_ID", "value": 1000 }] },
        }))
        .unwrap();
        assert!(ParsedResource::from_slice(&raw).is_err());
    }

    #[test]
    fn from_dynamic_object() {
        let obj: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "tekton.dev/v1beta1",
            "kind": "PipelineRun",
            "metadata": { "name": "test2run", "namespace": "image-build" },
            "spec": {
                "pipelineRef": { "name": "buildpacks" },
                "params": [{ "name": "BUILDER_IMAGE", "value": "good/builder:v1" }],
            },
        }))
        .unwrap();

        let parsed = ParsedResource::from_object(obj).unwrap();
        assert_eq!(parsed.params(), [Param::new("BUILDER_IMAGE", "good/builder:v1")]);
    }

    #[test]
    fn rejects_other_kinds() {
        let raw = serde_json::to_vec(&json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {},
            "spec": { "params": [{ "name": "SOURCE_URL", "value": "x" }] },
        }))
        .unwrap();
        let error = ParsedResource::from_slice(&raw).unwrap_err();
        assert!(
            matches!(error, PayloadDecodeError::UnexpectedType { .. }),
            "{error:?}"
        );
        assert_eq!(
            error.to_string(),
            "expected a tekton.dev/v1beta1 PipelineRun, got apiVersion 'v1' kind 'ConfigMap'"
        );

        let raw = serde_json::to_vec(&json!({
            "apiVersion": "tekton.dev/v1",
            "kind": "PipelineRun",
            "spec": { "params": [] },
        }))
        .unwrap();
        assert!(ParsedResource::from_slice(&raw).is_err());
    }

    #[test]
    fn rejects_missing_type() {
        let raw = serde_json::to_vec(&json!({ "metadata": {}, "spec": {} })).unwrap();
        let error = ParsedResource::from_slice(&raw).unwrap_err();
        assert_eq!(
            error.to_string(),
            "expected a tekton.dev/v1beta1 PipelineRun, got apiVersion '' kind ''"
        );

        assert!(ParsedResource::from_slice(b"[]").is_err());
        assert!(ParsedResource::from_slice(b"\"PipelineRun\"").is_err());
    }

    #[test]
    fn metadata_is_optional() {
        let raw = serde_json::to_vec(&json!({
            "apiVersion": "tekton.dev/v1beta1",
            "kind": "PipelineRun",
            "spec": { "params": [{ "name": "SOURCE_URL", "value": "x" }] },
        }))
        .unwrap();
        let parsed = ParsedResource::from_slice(&raw).unwrap();
        assert_eq!(parsed.name(), None);
        assert_eq!(parsed.params(), [Param::new("SOURCE_URL", "x")]);
    }

    #[test]
    fn object_of_other_kind() {
        let obj: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": "cm" },
            "spec": { "params": [] },
        }))
        .unwrap();
        assert!(matches!(
            ParsedResource::from_object(obj),
            Err(PayloadDecodeError::UnexpectedType { .. })
        ));
    }
}
