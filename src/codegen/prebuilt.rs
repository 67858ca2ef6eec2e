//! Deduplication of anonymous composite types.
//!
//! Anonymous structures and tuples need a generated name and a generated
//! marshaller. Two uses with the same shape must share both, otherwise the
//! target compiler sees duplicate overloads. Shapes are compared through a
//! structural hash string.

use crate::ast::{Definition, Document, Type, TypeRef};

/// Structural hash of a type.
///
/// Generics hash as `name<components>`, anonymous structures as
/// `structure{member:hash,...}`. A typedef naming a structure hashes
/// nominally by its qualified name; other typedefs are transparent since
/// the targets render them as the aliased type. Objects hash by their
/// qualified name, everything else by its own name.
pub fn structural_hash(ty: &Type) -> String {
    match ty {
        Type::Nullable(_) | Type::Array(_) | Type::Tuple(_) => {
            let components: Vec<String> =
                ty.components().iter().map(|c| structural_hash(c)).collect();
            format!("{}<{}>", ty.name(), components.join(","))
        }
        Type::Structure(structure) => {
            let members: Vec<String> = structure
                .members
                .iter()
                .map(|m| format!("{}:{}", m.name, structural_hash(&m.ty)))
                .collect();
            format!("structure{{{}}}", members.join(","))
        }
        Type::Definition(td) if td.is_structure() => qualified(&td.scope, &td.name),
        Type::Definition(td) => structural_hash(&td.ty),
        Type::Object(handle) => qualified(&handle.scope, &handle.name),
        _ => ty.name().to_string(),
    }
}

fn qualified(scope: &[String], name: &str) -> String {
    let mut parts = scope.to_vec();
    parts.push(name.to_string());
    parts.join(".")
}

/// Whether a type gets a generated name and marshaller of its own.
pub fn is_prebuilt(ty: &Type) -> bool {
    matches!(ty, Type::Structure(_) | Type::Tuple(_))
}

#[derive(Debug, Clone)]
pub struct PrebuiltType {
    pub index: usize,
    pub hash: String,
    pub ty: TypeRef,
}

impl PrebuiltType {
    #[must_use]
    pub fn is_structure(&self) -> bool {
        matches!(*self.ty, Type::Structure(_))
    }
}

/// Prebuilt types of one interface in first-seen order.
///
/// Components are registered before the composite containing them, so
/// emitting in index order never references an undeclared prebuilt.
#[derive(Debug, Clone, Default)]
pub struct PrebuiltRegistry {
    entries: Vec<PrebuiltType>,
}

impl PrebuiltRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects every prebuilt type reachable from a body, descending into
    /// nested objects.
    pub fn from_definitions(document: &Document, definitions: &[Definition]) -> Self {
        let mut registry = Self::new();
        for definition in definitions {
            for ty in reachable_types(document, definition) {
                registry.register(&ty);
            }
        }
        registry
    }

    /// Registers a type and the prebuilt types nested in it; returns the
    /// index of the type itself if it is prebuilt.
    pub fn register(&mut self, ty: &TypeRef) -> Option<usize> {
        self.visit(ty, false)
    }

    fn visit(&mut self, ty: &TypeRef, named: bool) -> Option<usize> {
        match &**ty {
            Type::Structure(structure) => {
                for member in &structure.members {
                    self.visit(&member.ty, false);
                }
                if named {
                    None
                } else {
                    Some(self.add(ty))
                }
            }
            Type::Tuple(types) => {
                for t in types {
                    self.visit(t, false);
                }
                Some(self.add(ty))
            }
            Type::Nullable(t) | Type::Array(t) => {
                self.visit(t, false);
                None
            }
            _ => None,
        }
    }

    fn add(&mut self, ty: &TypeRef) -> usize {
        let hash = structural_hash(ty);
        if let Some(existing) = self.entries.iter().find(|e| e.hash == hash) {
            return existing.index;
        }
        let index = self.entries.len();
        log::trace!("prebuilt type {index}: {hash}");
        self.entries.push(PrebuiltType {
            index,
            hash,
            ty: ty.clone(),
        });
        index
    }

    #[must_use]
    pub fn index_of(&self, ty: &Type) -> Option<usize> {
        let hash = structural_hash(ty);
        self.entries.iter().find(|e| e.hash == hash).map(|e| e.index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PrebuiltType> {
        self.entries.iter()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&PrebuiltType> {
        self.entries.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Indices of the prebuilt types a definition needs, components first.
    pub fn indices_for(&self, document: &Document, definition: &Definition) -> Vec<usize> {
        let mut scratch = PrebuiltRegistry::new();
        for ty in reachable_types(document, definition) {
            scratch.register(&ty);
        }
        scratch
            .entries
            .iter()
            .filter_map(|e| self.index_of(&e.ty))
            .collect()
    }
}

/// Types appearing in a definition's signature. A structure typedef
/// contributes its structure, which is walked for members only.
fn reachable_types(document: &Document, definition: &Definition) -> Vec<TypeRef> {
    let mut out = Vec::new();
    collect(document, definition, &mut out);
    out
}

fn collect(document: &Document, definition: &Definition, out: &mut Vec<TypeRef>) {
    match definition {
        Definition::TypeDefinition(td) => match &*td.ty {
            Type::Structure(structure) => {
                out.extend(structure.members.iter().map(|m| m.ty.clone()));
            }
            _ => out.push(td.ty.clone()),
        },
        Definition::Function(variant) | Definition::Method(variant) => {
            out.push(variant.return_type.clone());
            out.extend(variant.arguments.iter().map(|a| a.ty.clone()));
        }
        Definition::Property(property) => out.push(property.ty.clone()),
        Definition::Object(handle) => {
            for nested in &document.object(handle).definitions {
                collect(document, nested, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Documentation, Member, Structure, TypeDefinition};
    use std::sync::Arc;

    fn structure(members: &[(&str, Type)]) -> TypeRef {
        Arc::new(Type::Structure(Structure {
            members: members
                .iter()
                .map(|(name, ty)| Member {
                    name: (*name).to_string(),
                    ty: Arc::new(ty.clone()),
                    documentation: Documentation::default(),
                })
                .collect(),
        }))
    }

    fn typedef(name: &str, ty: TypeRef) -> Type {
        Type::Definition(Arc::new(TypeDefinition {
            name: name.to_string(),
            scope: vec!["Calc".into()],
            ty,
            documentation: Documentation::default(),
        }))
    }

    #[test]
    fn test_hash_shapes() {
        let ints = Type::Array(Arc::new(Type::Integer));
        assert_eq!(structural_hash(&ints), "array<integer>");
        let s = structure(&[("x", Type::Float), ("tags", ints)]);
        assert_eq!(structural_hash(&s), "structure{x:float,tags:array<integer>}");
    }

    #[test]
    fn test_structure_typedefs_are_nominal() {
        let shape = structure(&[("x", Type::Float)]);
        let a = typedef("A", shape.clone());
        let b = typedef("B", shape);
        assert_ne!(structural_hash(&a), structural_hash(&b));
        assert_eq!(structural_hash(&a), "Calc.A");
    }

    #[test]
    fn test_plain_typedefs_are_transparent() {
        let id = typedef("Id", Arc::new(Type::Integer));
        let tuple_a = Type::Tuple(vec![Arc::new(id)]);
        let tuple_b = Type::Tuple(vec![Arc::new(Type::Integer)]);
        assert_eq!(structural_hash(&tuple_a), structural_hash(&tuple_b));
    }

    #[test]
    fn test_registry_dedups_and_orders_components_first() {
        let inner = structure(&[("x", Type::Integer)]);
        let outer = Arc::new(Type::Array(structure(&[(
            "inner",
            Type::Nullable(inner.clone()),
        )])));
        let mut registry = PrebuiltRegistry::new();
        assert_eq!(registry.register(&outer), None);
        assert_eq!(registry.register(&inner), Some(0));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.index_of(&inner), Some(0));
        let again = structure(&[("x", Type::Integer)]);
        assert_eq!(registry.register(&again), Some(0));
        assert_eq!(registry.len(), 2);
    }
}
