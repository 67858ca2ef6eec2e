use crate::ast::{
    Argument, DetailKind, Definition, Document, Documentation, FunctionVariant, Interface, Module,
    Object, Property, TopLevel, Type, TypeDefinition,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Serializable image of an AST, shaped exactly like the JSON reader input.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Boolean(bool),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

#[derive(Default)]
struct Fields(BTreeMap<String, Value>);

impl Fields {
    fn named(name: &str, nature: &str) -> Self {
        let mut fields = Fields::default();
        fields.set("name", name.into());
        fields.set("nature", nature.into());
        fields
    }

    fn set(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    fn documentation(&mut self, documentation: &Documentation) {
        if let Some(doc) = documentation_value(documentation) {
            self.set("documentation", doc);
        }
    }

    fn done(self) -> Value {
        Value::Object(self.0)
    }
}

/// Converts a whole document. One top-level becomes an object, several
/// become an array; both forms are accepted back by the JSON reader.
pub(crate) fn to_value(document: &Document) -> Value {
    let writer = DocumentWriter { document };
    let mut items: Vec<Value> = document
        .top_levels()
        .iter()
        .map(|t| writer.top_level(t))
        .collect();
    if items.len() == 1 {
        items.remove(0)
    } else {
        Value::Array(items)
    }
}

fn documentation_value(documentation: &Documentation) -> Option<Value> {
    if documentation.is_empty() {
        return None;
    }
    if documentation.details.is_empty() {
        return Some(documentation.brief.as_str().into());
    }
    let mut map = BTreeMap::new();
    if !documentation.brief.is_empty() {
        map.insert("brief".to_string(), documentation.brief.as_str().into());
    }
    for (kind, text) in &documentation.details {
        let key = match kind {
            DetailKind::Description => "description",
            DetailKind::Return => "return",
            DetailKind::Group => "group",
        };
        map.insert(key.to_string(), text.as_str().into());
    }
    Some(Value::Object(map))
}

fn type_value(ty: &Type) -> Value {
    match ty {
        Type::Nullable(inner) | Type::Array(inner) => {
            let mut fields = Fields::default();
            fields.set("name", ty.name().into());
            fields.set("type", type_value(inner));
            fields.done()
        }
        Type::Tuple(types) => {
            let mut fields = Fields::default();
            fields.set("name", "tuple".into());
            fields.set(
                "types",
                Value::Array(types.iter().map(|t| type_value(t)).collect()),
            );
            fields.done()
        }
        Type::Structure(structure) => {
            let members = structure
                .members
                .iter()
                .map(|m| {
                    let mut fields = Fields::default();
                    fields.set("name", m.name.as_str().into());
                    fields.set("type", type_value(&m.ty));
                    fields.documentation(&m.documentation);
                    fields.done()
                })
                .collect();
            let mut fields = Fields::default();
            fields.set("name", "structure".into());
            fields.set("members", Value::Array(members));
            fields.done()
        }
        _ => ty.name().into(),
    }
}

struct DocumentWriter<'a> {
    document: &'a Document,
}

impl DocumentWriter<'_> {
    fn top_level(&self, top_level: &TopLevel) -> Value {
        match top_level {
            TopLevel::Interface(interface) => self.interface(interface),
            TopLevel::Module(module) => self.module(module),
        }
    }

    fn module(&self, module: &Module) -> Value {
        let mut fields = Fields::named(&module.name, "module");
        fields.documentation(&module.documentation);
        if !module.info.is_empty() {
            let info = module
                .info
                .iter()
                .map(|(k, v)| (k.clone(), v.as_str().into()))
                .collect();
            fields.set("info", Value::Object(info));
        }
        let body = module.elements.iter().map(|e| self.top_level(e)).collect();
        fields.set("body", Value::Array(body));
        fields.done()
    }

    fn interface(&self, interface: &Interface) -> Value {
        let mut fields = Fields::named(&interface.name, "interface");
        fields.documentation(&interface.documentation);
        fields.set("body", self.body(&interface.definitions));
        fields.done()
    }

    fn body(&self, definitions: &[Definition]) -> Value {
        Value::Array(definitions.iter().map(|d| self.definition(d)).collect())
    }

    fn definition(&self, definition: &Definition) -> Value {
        match definition {
            Definition::TypeDefinition(td) => typedef_value(td),
            Definition::Function(f) => variant_value(f, "function"),
            Definition::Method(f) => variant_value(f, "method"),
            Definition::Property(p) => property_value(p),
            Definition::Object(handle) => self.object(self.document.object(handle)),
        }
    }

    fn object(&self, object: &Object) -> Value {
        let mut fields = Fields::named(&object.name, "object");
        fields.documentation(&object.documentation);
        fields.set("body", self.body(&object.definitions));
        fields.done()
    }
}

fn typedef_value(td: &TypeDefinition) -> Value {
    let mut fields = Fields::named(&td.name, "typedef");
    fields.set("type", type_value(&td.ty));
    fields.documentation(&td.documentation);
    fields.done()
}

fn argument_value(argument: &Argument) -> Value {
    let mut fields = Fields::default();
    fields.set("name", argument.name.as_str().into());
    fields.set("type", type_value(&argument.ty));
    fields.set("direction", argument.direction.as_str().into());
    fields.documentation(&argument.documentation);
    fields.done()
}

fn variant_value(variant: &FunctionVariant, nature: &str) -> Value {
    let mut fields = Fields::named(&variant.name, nature);
    fields.set("type", type_value(&variant.return_type));
    fields.set(
        "arguments",
        Value::Array(variant.arguments.iter().map(argument_value).collect()),
    );
    fields.documentation(&variant.documentation);
    fields.done()
}

fn property_value(property: &Property) -> Value {
    let mut fields = Fields::named(&property.name, "property");
    fields.set("type", type_value(&property.ty));
    if property.readonly {
        fields.set("readonly", Value::Boolean(true));
    }
    fields.documentation(&property.documentation);
    fields.done()
}
