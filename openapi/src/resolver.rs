//! Reference resolution.
//!
//! Replaces `{"$ref": "#/a/b"}` markers with the structure they point to,
//! following chains of references until a concrete structure is reached.
//! The set of references on the current expansion path travels down the
//! recursion by value, so a reference that leads back to itself is reported
//! instead of expanded forever.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{OpenApiError, Result};

/// Key of a reference marker.
pub const REF_KEY: &str = "$ref";

/// Which reference markers get expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveMode {
    /// Expand every internal reference.
    #[default]
    Full,

    /// Expand every internal reference outside example payloads.
    ///
    /// The last `schema`/`schemas` or `example`/`examples` key on the path
    /// from the resolution root decides the context. Markers in an example
    /// context are copied unchanged, since example payloads may hold
    /// `$ref`-shaped data that is not a schema reference.
    SchemaOnly,
}

/// Context of a location in the tree, as seen by [`ResolveMode::SchemaOnly`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Neutral,
    Schema,
    Example,
}

impl Context {
    fn enter(self, key: &str) -> Self {
        match key {
            "schema" | "schemas" => Self::Schema,
            "example" | "examples" => Self::Example,
            _ => self,
        }
    }
}

/// Resolves internal references against a root document.
#[derive(Debug, Clone, Copy)]
pub struct SchemaResolver<'a> {
    root: &'a Value,
    mode: ResolveMode,
}

impl<'a> SchemaResolver<'a> {
    /// Resolver expanding every internal reference.
    pub fn new(root: &'a Value) -> Self {
        Self {
            root,
            mode: ResolveMode::Full,
        }
    }

    /// Resolver leaving references in example contexts alone.
    pub fn schema_only(root: &'a Value) -> Self {
        Self {
            root,
            mode: ResolveMode::SchemaOnly,
        }
    }

    /// Set the resolution mode.
    pub fn with_mode(mut self, mode: ResolveMode) -> Self {
        self.mode = mode;
        self
    }

    /// Resolution mode in use.
    pub fn mode(&self) -> ResolveMode {
        self.mode
    }

    /// Resolve `node`, treating it as the top of the path.
    pub fn resolve(&self, node: &Value) -> Result<Value> {
        self.resolve_at(node, &[])
    }

    /// Resolve `node` located under `path` in the document.
    ///
    /// Only the context markers among the path segments matter.
    pub fn resolve_at(&self, node: &Value, path: &[&str]) -> Result<Value> {
        let context = path
            .iter()
            .fold(Context::Neutral, |context, key| context.enter(key));
        self.resolve_node(node, context, &HashSet::new())
    }

    fn resolve_node(
        &self,
        node: &Value,
        context: Context,
        visiting: &HashSet<String>,
    ) -> Result<Value> {
        match node {
            Value::Object(map) => {
                if let Some(reference) = reference_of(map) {
                    if self.expands(context) && reference.starts_with('#') {
                        return self.follow(reference, context, visiting);
                    }
                    if !reference.starts_with('#') {
                        debug!("Leaving external reference unresolved: {reference}");
                    }
                }

                let mut resolved = Map::with_capacity(map.len());
                for (key, value) in map {
                    let value = self.resolve_node(value, context.enter(key), visiting)?;
                    resolved.insert(key.clone(), value);
                }
                Ok(Value::Object(resolved))
            }
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve_node(item, context, visiting))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            scalar => Ok(scalar.clone()),
        }
    }

    fn follow(
        &self,
        reference: &str,
        context: Context,
        visiting: &HashSet<String>,
    ) -> Result<Value> {
        if visiting.contains(reference) {
            return Err(OpenApiError::CircularReference {
                reference: reference.to_string(),
            });
        }

        let target = self.lookup(reference)?;

        let mut visiting = visiting.clone();
        visiting.insert(reference.to_string());
        self.resolve_node(target, context, &visiting)
    }

    fn expands(&self, context: Context) -> bool {
        match self.mode {
            ResolveMode::Full => true,
            ResolveMode::SchemaOnly => context != Context::Example,
        }
    }

    /// Walk the root along the segments of `reference`.
    ///
    /// The leading `#` is dropped, `~1` and `~0` are unescaped and numeric
    /// segments index into arrays.
    fn lookup(&self, reference: &str) -> Result<&'a Value> {
        let unresolvable = || OpenApiError::UnresolvableReference {
            reference: reference.to_string(),
        };

        let mut target = self.root;
        for segment in reference.split('/').skip(1) {
            let segment = segment.replace("~1", "/").replace("~0", "~");
            target = match target {
                Value::Object(map) => map.get(&segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            }
            .ok_or_else(unresolvable)?;
        }
        Ok(target)
    }
}

/// The `$ref` target of a marker object, if it is one.
pub fn reference_of(map: &Map<String, Value>) -> Option<&str> {
    map.get(REF_KEY).and_then(Value::as_str)
}

/// Whether `value` still contains a reference marker anywhere.
pub fn contains_reference(value: &Value) -> bool {
    match value {
        Value::Object(map) => reference_of(map).is_some() || map.values().any(contains_reference),
        Value::Array(items) => items.iter().any(contains_reference),
        _ => false,
    }
}
