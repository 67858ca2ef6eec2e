//! Format-neutral document building.
//!
//! The JSON and XML readers only differ in how they navigate their parse
//! trees; both hand a [`SyntaxNode`] implementation to [`build_document`],
//! which performs registration and type resolution.
//!
//! Grammar shared by both concrete syntaxes:
//!
//!    Document   ::= TopLevel+
//!    TopLevel   ::= Interface | Module
//!    Module     ::= name info? documentation? body: TopLevel*
//!    Interface  ::= name documentation? body: (Typedef | Object | Function)*
//!    Object     ::= name documentation? body: (Typedef | Object | Property | Method)*
//!    Typedef    ::= name type documentation?
//!    Function   ::= name type arguments: Argument* documentation?
//!    Method     ::= Function
//!    Property   ::= name type readonly? documentation?
//!    Argument   ::= name type (direction | out)? documentation?
//!    Type       ::= TypeName | Composite
//!    Composite  ::= nullable(type) | array(type) | tuple(types: Type+) | structure(members: Member*)
//!    Member     ::= name type documentation?

use crate::ast::{
    Argument, Direction, Document, Documentation, FunctionVariant, Interface, Member, Module,
    Object, ObjectHandle, Property, Structure, TopLevel, Type, TypeDefinition, TypeRef,
};
use crate::error::ReaderError;
use crate::resolver::{Registry, Resolver};
use crate::utils::is_identifier;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Produces the AST for one serialized interface description.
///
/// A failed read never exposes a partially built document.
pub trait Reader {
    /// # Errors
    /// Returns the first structural or resolution error encountered.
    fn read(&self) -> Result<Document, ReaderError>;
}

/// A type reference as written in the source: either a bare name or a
/// node describing a composite type.
pub enum TypeSpec<N> {
    Named(String),
    Node(N),
}

/// Navigation primitives a concrete syntax has to provide.
///
/// Methods returning `Err(String)` report a malformed field; the builder
/// prefixes the message with the element path.
pub trait SyntaxNode: Sized {
    /// The `name` of the element, if present and non-empty.
    fn name(&self) -> Option<String>;

    /// What the element declares (`interface`, `typedef`, `method`, ...).
    fn nature(&self) -> Option<String>;

    fn bool_field(&self, key: &str) -> Result<Option<bool>, String>;

    fn string_field(&self, key: &str) -> Result<Option<String>, String>;

    /// The `type` of the element.
    fn type_spec(&self) -> Option<TypeSpec<Self>>;

    /// Interprets the node itself as a type reference (used for tuple items).
    fn as_type_spec(&self) -> Option<TypeSpec<Self>>;

    /// Ordered child elements stored under `key` (`body`, `members`, `arguments`, `types`).
    fn list(&self, key: &str) -> Result<Option<Vec<Self>>, String>;

    fn documentation(&self) -> Result<Documentation, String>;

    fn info(&self) -> Result<BTreeMap<String, String>, String>;
}

/// Builds a [`Document`] from the top-level nodes of one source document.
///
/// # Errors
/// Returns the first error; nothing built so far escapes.
pub fn build_document<N: SyntaxNode>(roots: &[N]) -> Result<Document, ReaderError> {
    let mut builder = Builder {
        resolver: Resolver::new(),
    };
    let mut top_levels = Vec::with_capacity(roots.len());
    let mut seen = HashSet::new();
    for (i, root) in roots.iter().enumerate() {
        let top_level = builder.read_top_level("", root, i)?;
        if !seen.insert(top_level.name().to_string()) {
            return Err(ReaderError::DuplicateName {
                path: top_level.name().to_string(),
                name: top_level.name().to_string(),
            });
        }
        top_levels.push(top_level);
    }
    builder.resolver.finish(top_levels)
}

struct Builder {
    resolver: Resolver,
}

fn require_name<N: SyntaxNode>(node: &N, what: impl FnOnce() -> String) -> Result<String, ReaderError> {
    node.name().ok_or_else(|| {
        let what = what();
        ReaderError::malformed(what.clone(), format!("name of {what} is not specified"))
    })
}

fn documentation<N: SyntaxNode>(node: &N, path: &str) -> Result<Documentation, ReaderError> {
    node.documentation()
        .map_err(|message| ReaderError::malformed(path, message))
}

fn list<N: SyntaxNode>(node: &N, key: &str, path: &str) -> Result<Vec<N>, ReaderError> {
    node.list(key)
        .map(Option::unwrap_or_default)
        .map_err(|message| ReaderError::malformed(path, message))
}

/// `enclosing` followed by `local`, the lookup chain of a body's entries.
fn chain<'r>(enclosing: &[&'r Registry], local: &'r Registry) -> Vec<&'r Registry> {
    let mut scopes = enclosing.to_vec();
    scopes.push(local);
    scopes
}

fn join_logger(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{base}.{name}")
    }
}

impl Builder {
    fn read_top_level<N: SyntaxNode>(
        &mut self,
        base_logger: &str,
        node: &N,
        index: usize,
    ) -> Result<TopLevel, ReaderError> {
        let name = require_name(node, || format!("toplevel element #{}", index + 1))?;
        let nature = node.nature().ok_or_else(|| {
            ReaderError::malformed(&name, "nature of the toplevel element is not specified")
        })?;
        let logger = join_logger(base_logger, &name);

        match nature.as_str() {
            "interface" => self.read_interface(&logger, &name, node).map(TopLevel::Interface),
            "module" => self.read_module(&logger, &name, node).map(TopLevel::Module),
            _ => Err(ReaderError::InvalidNature { path: name, nature }),
        }
    }

    fn read_module<N: SyntaxNode>(
        &mut self,
        logger: &str,
        name: &str,
        node: &N,
    ) -> Result<Module, ReaderError> {
        log::debug!("reading module '{name}'");
        let info = node
            .info()
            .map_err(|message| ReaderError::malformed(name, message))?;

        // Read in name order, the order the elements are kept and written in,
        // so objects get the same arena slots when the output is read again.
        let mut children: Vec<(usize, N)> =
            list(node, "body", name)?.into_iter().enumerate().collect();
        children.sort_by_cached_key(|(_, child)| child.name());

        let mut elements = BTreeMap::new();
        for (i, child) in &children {
            let element = self.read_top_level(logger, child, *i)?;
            let element_name = element.name().to_string();
            if elements.contains_key(&element_name) {
                return Err(ReaderError::DuplicateName {
                    path: format!("{name}.{element_name}"),
                    name: element_name,
                });
            }
            elements.insert(element_name, element);
        }

        Ok(Module {
            name: name.to_string(),
            documentation: documentation(node, name)?,
            elements: elements.into_values().collect(),
            info,
        })
    }

    fn read_interface<N: SyntaxNode>(
        &mut self,
        logger: &str,
        name: &str,
        node: &N,
    ) -> Result<Interface, ReaderError> {
        log::debug!("reading interface '{name}'");
        let documentation = documentation(node, name)?;
        let scope = vec![name.to_string()];
        let mut registry = Registry::new(name);
        let body = list(node, "body", name)?;

        self.declare_objects(&mut registry, &scope, &body);

        for (i, element) in body.iter().enumerate() {
            let element_name = require_name(element, || {
                format!("element #{} of interface '{name}'", i + 1)
            })?;
            let path = format!("{name}.{element_name}");
            let nature = element.nature().ok_or_else(|| {
                ReaderError::malformed(&path, "nature of element is not specified")
            })?;

            match nature.as_str() {
                "typedef" => {
                    let typedef =
                        self.read_typedef(element, &[&registry], &scope, &element_name, &path)?;
                    registry.register_typedef(&self.resolver, &path, typedef)?;
                }
                "object" => {
                    self.read_object(logger, &mut registry, &[], &scope, &element_name, element, &path)?;
                }
                "function" => {
                    let variant =
                        self.read_variant(element, &[&registry], &scope, &element_name, &path)?;
                    registry.register_function(&path, variant)?;
                }
                _ => return Err(ReaderError::InvalidNature { path, nature }),
            }
        }

        Ok(Interface {
            name: name.to_string(),
            documentation,
            logger_name: logger.to_string(),
            definitions: registry.into_definitions(),
        })
    }

    /// Makes the objects of a body visible to the whole body before any
    /// entry is read. Names are checked later, when each object registers.
    fn declare_objects<N: SyntaxNode>(&mut self, registry: &mut Registry, scope: &[String], body: &[N]) {
        for element in body {
            if element.nature().as_deref() != Some("object") {
                continue;
            }
            if let Some(object_name) = element.name() {
                if registry.placeholder(&object_name).is_none() {
                    let handle = self.resolver.declare_object(scope.to_vec(), &object_name);
                    registry.add_placeholder(handle);
                }
            }
        }
    }

    /// Reads an object body and stores it in the arena.
    ///
    /// `outer` holds the registries enclosing `parent`, the interface first.
    #[allow(clippy::too_many_arguments)]
    fn read_object<N: SyntaxNode>(
        &mut self,
        logger: &str,
        parent: &mut Registry,
        outer: &[&Registry],
        scope: &[String],
        name: &str,
        node: &N,
        path: &str,
    ) -> Result<ObjectHandle, ReaderError> {
        log::debug!("reading object '{path}'");
        let documentation = documentation(node, path)?;
        let handle = parent.register_object(&mut self.resolver, path, scope, name)?;
        let enclosing = chain(outer, parent);

        let mut own_scope = scope.to_vec();
        own_scope.push(name.to_string());
        let mut local = Registry::new(own_scope.join("."));
        let body = list(node, "body", path)?;
        self.declare_objects(&mut local, &own_scope, &body);

        for (i, element) in body.iter().enumerate() {
            let element_name = require_name(element, || {
                format!("element #{} of object '{path}'", i + 1)
            })?;
            let element_path = format!("{path}.{element_name}");
            let nature = element.nature().ok_or_else(|| {
                ReaderError::malformed(&element_path, "nature of element is not specified")
            })?;

            match nature.as_str() {
                "typedef" => {
                    let typedef = self.read_typedef(
                        element,
                        &chain(&enclosing, &local),
                        &own_scope,
                        &element_name,
                        &element_path,
                    )?;
                    local.register_typedef(&self.resolver, &element_path, typedef)?;
                }
                "object" => {
                    self.read_object(
                        logger,
                        &mut local,
                        &enclosing,
                        &own_scope,
                        &element_name,
                        element,
                        &element_path,
                    )?;
                }
                "property" => {
                    let property = self.read_property(
                        element,
                        &chain(&enclosing, &local),
                        &own_scope,
                        &element_name,
                        &element_path,
                    )?;
                    local.register_property(&element_path, property)?;
                }
                "method" => {
                    let variant = self.read_variant(
                        element,
                        &chain(&enclosing, &local),
                        &own_scope,
                        &element_name,
                        &element_path,
                    )?;
                    local.register_method(&element_path, variant)?;
                }
                _ => {
                    return Err(ReaderError::InvalidNature {
                        path: element_path,
                        nature,
                    })
                }
            }
        }

        let body = Object {
            name: name.to_string(),
            scope: scope.to_vec(),
            documentation,
            logger_name: logger.to_string(),
            definitions: local.into_definitions(),
        };
        self.resolver.define_object(path, &handle, body)?;
        Ok(handle)
    }

    fn read_typedef<N: SyntaxNode>(
        &self,
        node: &N,
        scopes: &[&Registry],
        scope: &[String],
        name: &str,
        path: &str,
    ) -> Result<TypeDefinition, ReaderError> {
        let spec = node.type_spec().ok_or_else(|| {
            ReaderError::malformed(path, format!("type of '{name}' is not specified"))
        })?;
        let ty = self.read_type(spec, scopes, path)?;
        Ok(TypeDefinition {
            name: name.to_string(),
            scope: scope.to_vec(),
            ty,
            documentation: documentation(node, path)?,
        })
    }

    fn read_property<N: SyntaxNode>(
        &self,
        node: &N,
        scopes: &[&Registry],
        scope: &[String],
        name: &str,
        path: &str,
    ) -> Result<Property, ReaderError> {
        let spec = node.type_spec().ok_or_else(|| {
            ReaderError::malformed(path, format!("type of '{name}' is not specified"))
        })?;
        let ty = self.read_type(spec, scopes, path)?;
        let readonly = node
            .bool_field("readonly")
            .map_err(|message| ReaderError::malformed(path, message))?
            .unwrap_or(false);
        Ok(Property {
            name: name.to_string(),
            scope: scope.to_vec(),
            ty,
            readonly,
            documentation: documentation(node, path)?,
        })
    }

    fn read_variant<N: SyntaxNode>(
        &self,
        node: &N,
        scopes: &[&Registry],
        scope: &[String],
        name: &str,
        path: &str,
    ) -> Result<FunctionVariant, ReaderError> {
        let spec = node
            .type_spec()
            .ok_or_else(|| ReaderError::malformed(path, "type is not specified"))?;
        let return_type = self.read_type(spec, scopes, path)?;

        let mut arguments: Vec<Argument> = Vec::new();
        for (i, arg) in list(node, "arguments", path)?.iter().enumerate() {
            let arg_name = arg.name().ok_or_else(|| {
                ReaderError::malformed(
                    path,
                    format!("name of argument #{} is not specified", i + 1),
                )
            })?;
            if !is_identifier(&arg_name) {
                return Err(ReaderError::malformed(
                    path,
                    format!("name '{arg_name}' of argument #{} is not an identifier", i + 1),
                ));
            }
            let arg_path = format!("{path}.{arg_name}");
            if arguments.iter().any(|a| a.name == arg_name) {
                return Err(ReaderError::DuplicateName {
                    path: arg_path,
                    name: arg_name,
                });
            }
            let spec = arg.type_spec().ok_or_else(|| {
                ReaderError::malformed(&arg_path, format!("type of '{arg_name}' is not specified"))
            })?;
            let ty = self.read_type(spec, scopes, &arg_path)?;
            let direction = read_direction(arg, &arg_path)?;
            arguments.push(Argument {
                name: arg_name,
                ty,
                direction,
                documentation: documentation(arg, &arg_path)?,
            });
        }

        Ok(FunctionVariant::new(
            name,
            scope.to_vec(),
            return_type,
            arguments,
            documentation(node, path)?,
        ))
    }

    fn read_type<N: SyntaxNode>(
        &self,
        spec: TypeSpec<N>,
        scopes: &[&Registry],
        path: &str,
    ) -> Result<TypeRef, ReaderError> {
        match spec {
            TypeSpec::Named(name) => self.resolve_named(&name, scopes, path),
            TypeSpec::Node(node) => {
                let name = node.name().ok_or_else(|| {
                    ReaderError::malformed(path, "name of type is not specified")
                })?;
                self.read_composite(&name, &node, scopes, path)
            }
        }
    }

    fn read_composite<N: SyntaxNode>(
        &self,
        name: &str,
        node: &N,
        scopes: &[&Registry],
        path: &str,
    ) -> Result<TypeRef, ReaderError> {
        let component = |what: &str| -> Result<TypeRef, ReaderError> {
            let spec = node.type_spec().ok_or_else(|| {
                ReaderError::malformed(path, format!("type of '{what}' is not specified"))
            })?;
            self.read_type(spec, scopes, path)
        };

        let ty = match name {
            "nullable" => Type::Nullable(component(name)?),
            "array" => Type::Array(component(name)?),
            "tuple" => {
                let items = node
                    .list("types")
                    .map_err(|message| ReaderError::malformed(path, message))?
                    .ok_or_else(|| ReaderError::malformed(path, "types are not specified"))?;
                if items.is_empty() {
                    return Err(ReaderError::malformed(path, "tuple needs at least one type"));
                }
                let mut types = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let spec = item.as_type_spec().ok_or_else(|| {
                        ReaderError::malformed(path, format!("invalid type specifier #{}", i + 1))
                    })?;
                    types.push(self.read_type(spec, scopes, path)?);
                }
                Type::Tuple(types)
            }
            "structure" | "struct" => {
                let mut members: Vec<Member> = Vec::new();
                for (i, m) in list(node, "members", path)?.iter().enumerate() {
                    let member_name = m.name().ok_or_else(|| {
                        ReaderError::malformed(
                            path,
                            format!("name of member #{} is not specified", i + 1),
                        )
                    })?;
                    let member_path = format!("{path}.{member_name}");
                    if members.iter().any(|existing| existing.name == member_name) {
                        return Err(ReaderError::DuplicateName {
                            path: member_path,
                            name: member_name,
                        });
                    }
                    let spec = m.type_spec().ok_or_else(|| {
                        ReaderError::malformed(
                            &member_path,
                            format!("type of '{member_name}' is not specified"),
                        )
                    })?;
                    members.push(Member {
                        ty: self.read_type(spec, scopes, &member_path)?,
                        documentation: documentation(m, &member_path)?,
                        name: member_name,
                    });
                }
                Type::Structure(Structure { members })
            }
            _ => return self.resolve_named(name, scopes, path),
        };
        Ok(Arc::new(ty))
    }

    fn resolve_named(
        &self,
        name: &str,
        scopes: &[&Registry],
        path: &str,
    ) -> Result<TypeRef, ReaderError> {
        self.resolver
            .lookup(name, scopes)
            .ok_or_else(|| ReaderError::TypeNotFound {
                path: path.to_string(),
                name: name.to_string(),
                registry: scopes.last().map(|r| r.path()).unwrap_or_default().to_string(),
            })
    }
}

/// Explicit `direction` wins over the legacy boolean `out` flag.
fn read_direction<N: SyntaxNode>(node: &N, path: &str) -> Result<Direction, ReaderError> {
    let explicit = node
        .string_field("direction")
        .map_err(|message| ReaderError::malformed(path, message))?;
    let legacy = node
        .bool_field("out")
        .map_err(|message| ReaderError::malformed(path, message))?;

    match (explicit, legacy) {
        (Some(direction), legacy) => {
            if legacy.is_some() {
                log::warn!("{path}: both 'direction' and 'out' are given, using 'direction'");
            }
            Direction::parse(&direction).ok_or_else(|| {
                ReaderError::malformed(path, format!("invalid direction '{direction}'"))
            })
        }
        (None, Some(true)) => Ok(Direction::Out),
        (None, _) => Ok(Direction::In),
    }
}
