//! Endpoint extraction.
//!
//! Produces one [`EndpointDraft`] per (path, HTTP method) pair of a
//! document, in document order. Drafts carry everything an endpoint record
//! needs except its embedding.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::document::ApiDocument;
use crate::error::{OpenApiError, Result};
use crate::resolver::{SchemaResolver, reference_of};

/// HTTP methods recognised as operations under a path item.
pub const HTTP_METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Whether a path-item key names an operation.
pub fn is_http_method(key: &str) -> bool {
    HTTP_METHODS
        .iter()
        .any(|method| method.eq_ignore_ascii_case(key))
}

/// A parameter accepted by an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name.
    pub name: String,

    /// Declared primitive type, or the serialized schema when there is none.
    #[serde(rename = "type")]
    pub param_type: String,

    /// Description of the parameter.
    pub description: String,

    /// Whether the parameter is required.
    pub required: bool,

    /// Where the parameter goes (`query`, `path`, `header`, `cookie`).
    #[serde(default)]
    pub location: String,
}

/// An extracted endpoint without its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointDraft {
    /// Path template, e.g. `/users/{id}`.
    pub path: String,

    /// Lower-case HTTP method.
    pub method: String,

    /// Operation summary (empty when absent).
    pub summary: String,

    /// Operation description (empty when absent).
    pub description: String,

    /// Parameters, path-level ones included.
    pub parameters: Vec<Parameter>,

    /// Canonical text of the operation; the embedding input.
    pub definition: String,
}

/// Walks a document and produces endpoint drafts.
pub struct EndpointExtractor<'a> {
    document: &'a ApiDocument,
}

impl<'a> EndpointExtractor<'a> {
    /// Create an extractor over `document`.
    pub fn new(document: &'a ApiDocument) -> Self {
        Self { document }
    }

    /// Extract every endpoint.
    ///
    /// Any resolution error aborts extraction of the whole document.
    pub fn extract(&self) -> Result<Vec<EndpointDraft>> {
        let root = self.document.root();
        let full = SchemaResolver::new(root);
        let schema_only = SchemaResolver::schema_only(root);

        let mut drafts = Vec::new();
        for (path, item) in self.document.paths()? {
            let item = item.as_object().ok_or_else(|| {
                OpenApiError::InvalidDocument(format!("path item `{path}` is not an object"))
            })?;

            let shared = match item.get("parameters") {
                Some(parameters) => parse_parameters(&full.resolve_at(
                    parameters,
                    &["paths", path.as_str(), "parameters"],
                )?),
                None => Vec::new(),
            };

            for (method, operation) in item {
                if !is_http_method(method) {
                    continue;
                }
                let operation = operation.as_object().ok_or_else(|| {
                    OpenApiError::InvalidDocument(format!(
                        "operation `{method} {path}` is not an object"
                    ))
                })?;

                drafts.push(extract_operation(
                    path,
                    method,
                    operation,
                    &shared,
                    &full,
                    &schema_only,
                )?);
            }
        }

        info!("Extracted {} endpoints", drafts.len());
        Ok(drafts)
    }
}

fn extract_operation(
    path: &str,
    method: &str,
    operation: &Map<String, Value>,
    shared: &[Parameter],
    full: &SchemaResolver<'_>,
    schema_only: &SchemaResolver<'_>,
) -> Result<EndpointDraft> {
    let mut body = operation.clone();

    let mut parameters = Vec::new();
    if let Some(raw) = operation.get("parameters") {
        let resolved = full.resolve_at(raw, &["paths", path, method, "parameters"])?;
        parameters = parse_parameters(&resolved);
        body.insert("parameters".to_string(), resolved);
    }

    for inherited in shared {
        let overridden = parameters
            .iter()
            .any(|p| p.name == inherited.name && p.location == inherited.location);
        if !overridden {
            parameters.push(inherited.clone());
        }
    }

    if let Some(raw) = operation.get("responses") {
        let resolved = schema_only.resolve_at(raw, &["paths", path, method, "responses"])?;
        body.insert("responses".to_string(), resolved);
    }

    let definition = serde_json::to_string(&Value::Object(body))?;
    debug!(
        "Extracted {method} {path}: {} parameters, {} chars",
        parameters.len(),
        definition.len()
    );

    Ok(EndpointDraft {
        path: path.to_string(),
        method: method.to_ascii_lowercase(),
        summary: text_field(operation, "summary"),
        description: text_field(operation, "description"),
        parameters,
        definition,
    })
}

/// Build parameter records from a resolved parameter list.
///
/// Entries that are still reference markers are skipped.
fn parse_parameters(resolved: &Value) -> Vec<Parameter> {
    let Some(items) = resolved.as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(Value::as_object)
        .filter(|parameter| reference_of(parameter).is_none())
        .map(|parameter| Parameter {
            name: text_field(parameter, "name"),
            param_type: parameter_type(parameter),
            description: text_field(parameter, "description"),
            required: parameter
                .get("required")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            location: text_field(parameter, "in"),
        })
        .collect()
}

fn parameter_type(parameter: &Map<String, Value>) -> String {
    match parameter.get("schema") {
        Some(schema) => match schema.get("type").and_then(Value::as_str) {
            Some(primitive) => primitive.to_string(),
            None => schema.to_string(),
        },
        None => text_field(parameter, "type"),
    }
}

fn text_field(map: &Map<String, Value>, key: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn extract(doc: Value) -> Result<Vec<EndpointDraft>> {
        let document = ApiDocument::from_value(doc)?;
        EndpointExtractor::new(&document).extract()
    }

    #[test]
    fn test_one_draft_per_path_and_method() {
        let drafts = extract(json!({
            "paths": {
                "/a": {"get": {"summary": "a"}},
                "/b": {"get": {"summary": "b"}, "post": {"summary": "c"}}
            }
        }))
        .unwrap();

        let keys: Vec<_> = drafts
            .iter()
            .map(|d| (d.path.as_str(), d.method.as_str()))
            .collect();
        assert_eq!(keys, vec![("/a", "get"), ("/b", "get"), ("/b", "post")]);
    }

    #[test]
    fn test_document_order_is_kept() {
        let drafts = extract(json!({
            "paths": {
                "/zeta": {"post": {}, "get": {}},
                "/alpha": {"delete": {}}
            }
        }))
        .unwrap();

        let keys: Vec<_> = drafts
            .iter()
            .map(|d| format!("{} {}", d.method, d.path))
            .collect();
        assert_eq!(keys, vec!["post /zeta", "get /zeta", "delete /alpha"]);
    }

    #[test]
    fn test_non_method_keys_are_not_endpoints() {
        let drafts = extract(json!({
            "paths": {
                "/a": {
                    "summary": "path summary",
                    "parameters": [],
                    "x-internal": true,
                    "GET": {}
                }
            }
        }))
        .unwrap();

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].method, "get");
    }

    #[test]
    fn test_missing_text_fields_default_to_empty() {
        let drafts = extract(json!({"paths": {"/a": {"get": {}}}})).unwrap();
        assert_eq!(drafts[0].summary, "");
        assert_eq!(drafts[0].description, "");
        assert!(drafts[0].parameters.is_empty());
    }

    #[test]
    fn test_parameters_resolved_and_typed() {
        let drafts = extract(json!({
            "components": {
                "parameters": {
                    "limit": {
                        "name": "limit",
                        "in": "query",
                        "description": "Page size",
                        "schema": {"type": "integer"}
                    }
                }
            },
            "paths": {
                "/users": {
                    "get": {
                        "parameters": [
                            {"$ref": "#/components/parameters/limit"},
                            {
                                "name": "filter",
                                "in": "query",
                                "required": true,
                                "schema": {"oneOf": [{"type": "string"}, {"type": "integer"}]}
                            }
                        ]
                    }
                }
            }
        }))
        .unwrap();

        assert_eq!(
            drafts[0].parameters,
            vec![
                Parameter {
                    name: "limit".to_string(),
                    param_type: "integer".to_string(),
                    description: "Page size".to_string(),
                    required: false,
                    location: "query".to_string(),
                },
                Parameter {
                    name: "filter".to_string(),
                    param_type: r#"{"oneOf":[{"type":"string"},{"type":"integer"}]}"#.to_string(),
                    description: String::new(),
                    required: true,
                    location: "query".to_string(),
                },
            ]
        );
        assert!(!drafts[0].definition.contains("$ref"));
    }

    #[test]
    fn test_unresolved_references_are_skipped() {
        let drafts = extract(json!({
            "paths": {
                "/a": {
                    "get": {
                        "parameters": [
                            {"$ref": "external.yaml#/parameters/token"},
                            {"$ref": "x.yaml#/p", "description": "d"},
                            {"name": "q", "in": "query", "schema": {"type": "string"}},
                            {"name": "bare"}
                        ]
                    }
                }
            }
        }))
        .unwrap();

        let names: Vec<_> = drafts[0].parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["q", "bare"]);
    }

    #[test]
    fn test_swagger2_type_fallback() {
        let drafts = extract(json!({
            "paths": {"/a": {"get": {"parameters": [{"name": "n", "in": "query", "type": "number"}]}}}
        }))
        .unwrap();
        assert_eq!(drafts[0].parameters[0].param_type, "number");
    }

    #[test]
    fn test_path_level_parameters_are_inherited_unless_overridden() {
        let drafts = extract(json!({
            "paths": {
                "/users/{id}": {
                    "parameters": [
                        {"name": "id", "in": "path", "required": true, "schema": {"type": "string"}},
                        {"name": "trace", "in": "header", "schema": {"type": "string"}}
                    ],
                    "get": {
                        "parameters": [
                            {"name": "id", "in": "path", "required": true, "schema": {"type": "integer"}}
                        ]
                    }
                }
            }
        }))
        .unwrap();

        let params: Vec<_> = drafts[0]
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), p.param_type.as_str()))
            .collect();
        assert_eq!(params, vec![("id", "integer"), ("trace", "string")]);
    }

    #[test]
    fn test_definition_is_resolved_method_body() {
        let drafts = extract(json!({
            "components": {
                "schemas": {"User": {"type": "object"}}
            },
            "paths": {
                "/me": {
                    "get": {
                        "summary": "Current user",
                        "responses": {
                            "200": {
                                "description": "ok",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/User"},
                                        "example": {"$ref": "literal"}
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }))
        .unwrap();

        assert_eq!(
            drafts[0].definition,
            r#"{"summary":"Current user","responses":{"200":{"description":"ok","content":{"application/json":{"schema":{"type":"object"},"example":{"$ref":"literal"}}}}}}"#
        );
    }

    #[test]
    fn test_component_response_reference_is_followed() {
        let drafts = extract(json!({
            "components": {
                "schemas": {"Problem": {"type": "object", "properties": {"detail": {"type": "string"}}}},
                "responses": {
                    "NotFound": {
                        "description": "missing",
                        "content": {
                            "application/json": {
                                "schema": {"$ref": "#/components/schemas/Problem"},
                                "example": {"$ref": "literal"}
                            }
                        }
                    }
                }
            },
            "paths": {
                "/a": {"get": {"responses": {"404": {"$ref": "#/components/responses/NotFound"}}}}
            }
        }))
        .unwrap();

        assert_eq!(
            drafts[0].definition,
            r#"{"responses":{"404":{"description":"missing","content":{"application/json":{"schema":{"type":"object","properties":{"detail":{"type":"string"}}},"example":{"$ref":"literal"}}}}}}"#
        );
    }

    #[test]
    fn test_cycle_aborts_extraction() {
        let result = extract(json!({
            "components": {
                "parameters": {"p1": {"$ref": "#/components/parameters/p1"}}
            },
            "paths": {
                "/a": {"get": {"parameters": [{"$ref": "#/components/parameters/p1"}]}}
            }
        }));

        assert!(matches!(
            result,
            Err(OpenApiError::CircularReference { reference }) if reference == "#/components/parameters/p1"
        ));
    }

    #[test]
    fn test_non_object_operation_is_invalid() {
        assert!(matches!(
            extract(json!({"paths": {"/a": {"get": "nope"}}})),
            Err(OpenApiError::InvalidDocument(_))
        ));
    }
}
