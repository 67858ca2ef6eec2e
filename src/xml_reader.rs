use crate::ast::{DetailKind, Document, Documentation};
use crate::error::ReaderError;
use crate::reader::{build_document, Reader, SyntaxNode, TypeSpec};
use crate::utils::get_offset;
use miette::NamedSource;
use roxmltree::Node;
use std::collections::BTreeMap;

/// Reads interface descriptions written as XML.
///
/// Elements are named after their nature and the body sits in a `<body>`
/// child. A `type` is either an attribute naming the type or a `<type>`
/// child describing a composite; the child form is probed first.
///
/// ```xml
/// <interface name="Calc">
///   <body>
///     <function name="add" type="integer">
///       <arguments>
///         <argument name="a" type="integer"/>
///         <argument name="b" type="integer"/>
///       </arguments>
///     </function>
///   </body>
/// </interface>
/// ```
pub struct XmlReader {
    name: String,
    source: String,
}

impl XmlReader {
    pub fn new(source: impl Into<String>) -> Self {
        Self::new_with_name(source, "source.xml")
    }

    pub fn new_with_name(source: impl Into<String>, name: impl Into<String>) -> Self {
        XmlReader {
            name: name.into(),
            source: source.into(),
        }
    }
}

impl Reader for XmlReader {
    fn read(&self) -> Result<Document, ReaderError> {
        let document = roxmltree::Document::parse(&self.source).map_err(|err| {
            let pos = err.pos();
            let offset = get_offset(&self.source, pos.row as usize, pos.col as usize);
            ReaderError::Parse {
                message: err.to_string(),
                src: NamedSource::new(&self.name, self.source.clone()),
                span: (offset, 0).into(),
            }
        })?;
        log::debug!("reading XML document '{}'", self.name);

        let root = document.root_element();
        let nodes: Vec<XmlNode<'_, '_>> = match root.tag_name().name() {
            "interface" | "module" => vec![XmlNode(root)],
            _ => root.children().filter(Node::is_element).map(XmlNode).collect(),
        };
        build_document(&nodes)
    }
}

/// Element names accepted inside each list container.
fn expected_items(key: &str) -> Option<&'static [&'static str]> {
    match key {
        "members" => Some(&["member", "memb"]),
        "arguments" => Some(&["argument", "arg"]),
        "types" => Some(&["type"]),
        _ => None,
    }
}

#[derive(Clone, Copy)]
struct XmlNode<'a, 'input>(Node<'a, 'input>);

impl<'a, 'input> XmlNode<'a, 'input> {
    fn child(&self, tag: &str) -> Option<Node<'a, 'input>> {
        self.0
            .children()
            .find(|n| n.is_element() && n.tag_name().name() == tag)
    }

    fn text_of(node: Node<'_, '_>) -> Option<String> {
        node.text()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    fn raw(&self, key: &str) -> Option<String> {
        self.0
            .attribute(key)
            .map(str::to_string)
            .or_else(|| self.child(key).and_then(Self::text_of))
    }
}

impl SyntaxNode for XmlNode<'_, '_> {
    fn name(&self) -> Option<String> {
        self.0
            .attribute("name")
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    fn nature(&self) -> Option<String> {
        Some(self.0.tag_name().name().to_string())
    }

    fn bool_field(&self, key: &str) -> Result<Option<bool>, String> {
        match self.raw(key).as_deref() {
            None => Ok(None),
            Some("true" | "1") => Ok(Some(true)),
            Some("false" | "0") => Ok(Some(false)),
            Some(other) => Err(format!("'{key}' must be a boolean, found '{other}'")),
        }
    }

    fn string_field(&self, key: &str) -> Result<Option<String>, String> {
        Ok(self.raw(key))
    }

    fn type_spec(&self) -> Option<TypeSpec<Self>> {
        if let Some(node) = self.child("type") {
            return Some(TypeSpec::Node(XmlNode(node)));
        }
        self.0
            .attribute("type")
            .filter(|s| !s.is_empty())
            .map(|name| TypeSpec::Named(name.to_string()))
    }

    fn as_type_spec(&self) -> Option<TypeSpec<Self>> {
        Some(TypeSpec::Node(*self))
    }

    fn list(&self, key: &str) -> Result<Option<Vec<Self>>, String> {
        let Some(container) = self.child(key) else {
            return Ok(None);
        };
        let items: Vec<Self> = container
            .children()
            .filter(Node::is_element)
            .map(XmlNode)
            .collect();
        if let Some(expected) = expected_items(key) {
            if let Some(item) = items
                .iter()
                .find(|item| !expected.iter().any(|tag| *tag == item.0.tag_name().name()))
            {
                return Err(format!(
                    "unexpected element '{}' in '{key}'",
                    item.0.tag_name().name()
                ));
            }
        }
        Ok(Some(items))
    }

    fn documentation(&self) -> Result<Documentation, String> {
        let Some(doc) = self.child("documentation") else {
            return Ok(self
                .0
                .attribute("documentation")
                .map(Documentation::new)
                .unwrap_or_default());
        };
        let doc = XmlNode(doc);
        let has_parts = doc.0.children().any(|n| n.is_element());
        if !has_parts {
            return Ok(Documentation::new(Self::text_of(doc.0).unwrap_or_default()));
        }

        let mut documentation = Documentation::new(doc.raw("brief").unwrap_or_default());
        for (key, kind) in [
            ("description", DetailKind::Description),
            ("return", DetailKind::Return),
            ("group", DetailKind::Group),
        ] {
            if let Some(text) = doc.raw(key) {
                documentation = documentation.with_detail(kind, text);
            }
        }
        Ok(documentation)
    }

    fn info(&self) -> Result<BTreeMap<String, String>, String> {
        let Some(info) = self.child("info") else {
            return Ok(BTreeMap::new());
        };
        Ok(info
            .children()
            .filter(Node::is_element)
            .map(|n| {
                (
                    n.tag_name().name().to_string(),
                    Self::text_of(n).unwrap_or_default(),
                )
            })
            .collect())
    }
}
