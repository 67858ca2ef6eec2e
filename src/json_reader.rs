use crate::ast::{DetailKind, Document, Documentation};
use crate::error::ReaderError;
use crate::reader::{build_document, Reader, SyntaxNode, TypeSpec};
use crate::utils::get_offset;
use miette::NamedSource;
use serde_json::Value;
use std::collections::BTreeMap;

/// Reads interface descriptions written as JSON.
///
/// The document is either one top-level object or an array of them:
///
/// ```json
/// { "name": "Calc", "nature": "interface", "body": [
///     { "name": "add", "nature": "function", "type": "integer",
///       "arguments": [ { "name": "a", "type": "integer" },
///                      { "name": "b", "type": "integer" } ] } ] }
/// ```
pub struct JsonReader {
    name: String,
    source: String,
}

impl JsonReader {
    pub fn new(source: impl Into<String>) -> Self {
        Self::new_with_name(source, "source.json")
    }

    pub fn new_with_name(source: impl Into<String>, name: impl Into<String>) -> Self {
        JsonReader {
            name: name.into(),
            source: source.into(),
        }
    }

    fn parse(&self) -> Result<Value, ReaderError> {
        serde_json::from_str(&self.source).map_err(|err| {
            let offset = get_offset(&self.source, err.line(), err.column());
            ReaderError::Parse {
                message: err.to_string(),
                src: NamedSource::new(&self.name, self.source.clone()),
                span: (offset, 0).into(),
            }
        })
    }
}

impl Reader for JsonReader {
    fn read(&self) -> Result<Document, ReaderError> {
        let root = self.parse()?;
        log::debug!("reading JSON document '{}'", self.name);
        match &root {
            Value::Array(items) => {
                let nodes: Vec<JsonNode<'_>> = items.iter().map(JsonNode).collect();
                build_document(&nodes)
            }
            Value::Object(_) => build_document(&[JsonNode(&root)]),
            _ => Err(ReaderError::malformed(
                &self.name,
                "root must be an object or an array of objects",
            )),
        }
    }
}

#[derive(Clone, Copy)]
struct JsonNode<'a>(&'a Value);

impl JsonNode<'_> {
    fn str(&self, key: &str) -> Option<String> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

impl SyntaxNode for JsonNode<'_> {
    fn name(&self) -> Option<String> {
        self.str("name")
    }

    fn nature(&self) -> Option<String> {
        self.str("nature")
    }

    fn bool_field(&self, key: &str) -> Result<Option<bool>, String> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(format!("'{key}' must be a boolean")),
        }
    }

    fn string_field(&self, key: &str) -> Result<Option<String>, String> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(format!("'{key}' must be a string")),
        }
    }

    fn type_spec(&self) -> Option<TypeSpec<Self>> {
        self.0.get("type").and_then(|t| JsonNode(t).as_type_spec())
    }

    fn as_type_spec(&self) -> Option<TypeSpec<Self>> {
        match self.0 {
            Value::String(name) if !name.is_empty() => Some(TypeSpec::Named(name.clone())),
            Value::Object(_) => Some(TypeSpec::Node(*self)),
            _ => None,
        }
    }

    fn list(&self, key: &str) -> Result<Option<Vec<Self>>, String> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Array(items)) => Ok(Some(items.iter().map(JsonNode).collect())),
            Some(_) => Err(format!("'{key}' is not an array")),
        }
    }

    fn documentation(&self) -> Result<Documentation, String> {
        match self.0.get("documentation") {
            None | Some(Value::Null) => Ok(Documentation::default()),
            Some(Value::String(brief)) => Ok(Documentation::new(brief.as_str())),
            Some(doc @ Value::Object(_)) => {
                let doc = JsonNode(doc);
                let mut documentation = Documentation::new(doc.str("brief").unwrap_or_default());
                for (key, kind) in [
                    ("description", DetailKind::Description),
                    ("return", DetailKind::Return),
                    ("group", DetailKind::Group),
                ] {
                    if let Some(text) = doc.str(key) {
                        documentation = documentation.with_detail(kind, text);
                    }
                }
                Ok(documentation)
            }
            Some(_) => Err("invalid documentation".to_string()),
        }
    }

    fn info(&self) -> Result<BTreeMap<String, String>, String> {
        match self.0.get("info") {
            None | Some(Value::Null) => Ok(BTreeMap::new()),
            Some(Value::Object(map)) => Ok(map
                .iter()
                .map(|(key, value)| {
                    let text = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (key.clone(), text)
                })
                .collect()),
            Some(_) => Err("'info' is not an object".to_string()),
        }
    }
}
