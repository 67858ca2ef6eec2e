use crate::ast::{
    Definition, Document, FunctionVariant, Object, ObjectHandle, ObjectId, Property, TopLevel,
    Type, TypeDefinition, TypeRef, EMBEDDED_TYPE_NAMES,
};
use crate::error::ReaderError;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

enum ObjectSlot {
    Declared(ObjectHandle),
    Defined(Object),
}

/// Owns the state shared by every registry of one read: the embedded
/// types and the object arena.
///
/// Objects are allocated as placeholders first and filled in exactly once,
/// which lets a property or argument name an object whose body comes later
/// in the document.
pub struct Resolver {
    embedded: HashMap<&'static str, TypeRef>,
    objects: Vec<ObjectSlot>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        let embedded = EMBEDDED_TYPE_NAMES
            .iter()
            .filter_map(|name| Type::embedded(name).map(|t| (*name, Arc::new(t))))
            .collect();
        Resolver {
            embedded,
            objects: Vec::new(),
        }
    }

    pub fn is_embedded(&self, name: &str) -> bool {
        self.embedded.contains_key(name)
    }

    /// Allocates an uninitialized object and returns its handle.
    pub fn declare_object(&mut self, scope: Vec<String>, name: &str) -> ObjectHandle {
        let handle = ObjectHandle {
            id: ObjectId(self.objects.len()),
            name: name.to_string(),
            scope,
        };
        self.objects.push(ObjectSlot::Declared(handle.clone()));
        handle
    }

    pub fn is_defined(&self, handle: &ObjectHandle) -> bool {
        matches!(
            self.objects.get(handle.id.0),
            Some(ObjectSlot::Defined(_))
        )
    }

    /// Stores the body of a declared object. A second definition is rejected.
    pub fn define_object(
        &mut self,
        path: &str,
        handle: &ObjectHandle,
        body: Object,
    ) -> Result<(), ReaderError> {
        match self.objects.get_mut(handle.id.0) {
            Some(slot @ ObjectSlot::Declared(_)) => {
                *slot = ObjectSlot::Defined(body);
                Ok(())
            }
            Some(ObjectSlot::Defined(_)) => Err(ReaderError::ObjectAlreadyDefined {
                path: path.to_string(),
                name: handle.name.clone(),
            }),
            None => Err(ReaderError::UndefinedObject {
                name: handle.name.clone(),
            }),
        }
    }

    /// Resolves a type name: embedded types first, then the registries of
    /// `scopes` from the innermost (last) body out to the interface (first).
    pub fn lookup(&self, name: &str, scopes: &[&Registry]) -> Option<TypeRef> {
        self.embedded
            .get(name)
            .or_else(|| scopes.iter().rev().find_map(|r| r.types.get(name)))
            .cloned()
    }

    /// Freezes the arena into a [`Document`]. Every declared object must have
    /// received its body by now.
    pub fn finish(self, top_levels: Vec<TopLevel>) -> Result<Document, ReaderError> {
        let objects = self
            .objects
            .into_iter()
            .map(|slot| match slot {
                ObjectSlot::Defined(object) => Ok(object),
                ObjectSlot::Declared(handle) => {
                    Err(ReaderError::UndefinedObject { name: handle.name })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Document::new(top_levels, objects))
    }
}

/// Names and types declared by one interface or object body.
///
/// Every `register_*` method validates before it mutates anything, so a
/// rejected registration leaves the registry exactly as it was.
pub struct Registry {
    path: String,
    types: HashMap<String, TypeRef>,
    placeholders: HashMap<String, ObjectHandle>,
    // nature of every non-overload definition, by name
    names: HashMap<String, &'static str>,
    variants: HashMap<String, HashSet<String>>,
    definitions: Vec<Definition>,
}

impl Registry {
    pub fn new(path: impl Into<String>) -> Self {
        Registry {
            path: path.into(),
            types: HashMap::new(),
            placeholders: HashMap::new(),
            names: HashMap::new(),
            variants: HashMap::new(),
            definitions: Vec::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn definitions(&self) -> &[Definition] {
        &self.definitions
    }

    pub fn into_definitions(self) -> Vec<Definition> {
        self.definitions
    }

    /// Makes an object type visible before its body is read. A name seen
    /// twice keeps its first placeholder; the second body is rejected later.
    pub fn add_placeholder(&mut self, handle: ObjectHandle) {
        if self.placeholders.contains_key(&handle.name) || self.types.contains_key(&handle.name) {
            return;
        }
        self.types
            .insert(handle.name.clone(), Arc::new(Type::Object(handle.clone())));
        self.placeholders.insert(handle.name.clone(), handle);
    }

    pub fn placeholder(&self, name: &str) -> Option<&ObjectHandle> {
        self.placeholders.get(name)
    }

    fn taken(&self, name: &str) -> bool {
        self.names.contains_key(name) || self.variants.contains_key(name)
    }

    fn check_type_name(
        &self,
        resolver: &Resolver,
        path: &str,
        name: &str,
    ) -> Result<(), ReaderError> {
        if resolver.is_embedded(name) {
            return Err(ReaderError::ShadowsEmbeddedType {
                path: path.to_string(),
                name: name.to_string(),
            });
        }
        if self.taken(name) {
            return Err(ReaderError::DuplicateName {
                path: path.to_string(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    pub fn register_typedef(
        &mut self,
        resolver: &Resolver,
        path: &str,
        typedef: TypeDefinition,
    ) -> Result<TypeRef, ReaderError> {
        self.check_type_name(resolver, path, &typedef.name)?;
        if self.types.contains_key(&typedef.name) {
            return Err(ReaderError::DuplicateName {
                path: path.to_string(),
                name: typedef.name,
            });
        }
        log::trace!("registering typedef '{}' in '{}'", typedef.name, self.path);
        let typedef = Arc::new(typedef);
        let ty = Arc::new(Type::Definition(Arc::clone(&typedef)));
        self.types.insert(typedef.name.clone(), Arc::clone(&ty));
        self.names.insert(typedef.name.clone(), "typedef");
        self.definitions.push(Definition::TypeDefinition(typedef));
        Ok(ty)
    }

    /// Registers an object definition in this body. Uses the placeholder of
    /// the same name when one exists, otherwise declares a fresh object.
    pub fn register_object(
        &mut self,
        resolver: &mut Resolver,
        path: &str,
        scope: &[String],
        name: &str,
    ) -> Result<ObjectHandle, ReaderError> {
        if let Some(handle) = self.placeholders.get(name) {
            if resolver.is_defined(handle) || self.names.get(name) == Some(&"object") {
                return Err(ReaderError::ObjectAlreadyDefined {
                    path: path.to_string(),
                    name: name.to_string(),
                });
            }
        }
        self.check_type_name(resolver, path, name)?;
        let handle = match self.placeholders.get(name) {
            Some(handle) => handle.clone(),
            None => {
                if self.types.contains_key(name) {
                    return Err(ReaderError::DuplicateName {
                        path: path.to_string(),
                        name: name.to_string(),
                    });
                }
                let handle = resolver.declare_object(scope.to_vec(), name);
                self.types
                    .insert(name.to_string(), Arc::new(Type::Object(handle.clone())));
                handle
            }
        };
        log::trace!("registering object '{}' in '{}'", name, self.path);
        self.names.insert(name.to_string(), "object");
        self.definitions.push(Definition::Object(handle.clone()));
        Ok(handle)
    }

    pub fn register_property(&mut self, path: &str, property: Property) -> Result<(), ReaderError> {
        if self.taken(&property.name) {
            return Err(ReaderError::DuplicateName {
                path: path.to_string(),
                name: property.name,
            });
        }
        log::trace!("registering property '{}' in '{}'", property.name, self.path);
        self.names.insert(property.name.clone(), "property");
        self.definitions.push(Definition::Property(property));
        Ok(())
    }

    pub fn register_function(
        &mut self,
        path: &str,
        variant: FunctionVariant,
    ) -> Result<(), ReaderError> {
        self.check_variant(path, &variant)?;
        self.insert_variant(&variant);
        self.definitions.push(Definition::Function(variant));
        Ok(())
    }

    pub fn register_method(
        &mut self,
        path: &str,
        variant: FunctionVariant,
    ) -> Result<(), ReaderError> {
        self.check_variant(path, &variant)?;
        self.insert_variant(&variant);
        self.definitions.push(Definition::Method(variant));
        Ok(())
    }

    fn check_variant(&self, path: &str, variant: &FunctionVariant) -> Result<(), ReaderError> {
        if self.names.contains_key(&variant.name) {
            return Err(ReaderError::DuplicateName {
                path: path.to_string(),
                name: variant.name.clone(),
            });
        }
        let exists = self
            .variants
            .get(&variant.name)
            .is_some_and(|ids| ids.contains(variant.variant_id()));
        if exists {
            return Err(ReaderError::VariantExists {
                path: path.to_string(),
                name: variant.name.clone(),
                variant: variant.variant_id().to_string(),
            });
        }
        Ok(())
    }

    fn insert_variant(&mut self, variant: &FunctionVariant) {
        log::trace!(
            "registering '{}' variant '{}' in '{}'",
            variant.name,
            variant.variant_id(),
            self.path
        );
        self.variants
            .entry(variant.name.clone())
            .or_default()
            .insert(variant.variant_id().to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Argument, Direction, Documentation};

    fn typedef(name: &str, ty: Type) -> TypeDefinition {
        TypeDefinition {
            name: name.to_string(),
            scope: vec!["Calc".into()],
            ty: Arc::new(ty),
            documentation: Documentation::default(),
        }
    }

    fn function(name: &str, args: &[&str]) -> FunctionVariant {
        FunctionVariant::new(
            name,
            vec!["Calc".into()],
            Arc::new(Type::Integer),
            args.iter()
                .map(|a| Argument {
                    name: a.to_string(),
                    ty: Arc::new(Type::Integer),
                    direction: Direction::In,
                    documentation: Documentation::default(),
                })
                .collect(),
            Documentation::default(),
        )
    }

    #[test]
    fn test_lookup_prefers_local_scope() {
        let resolver = Resolver::new();
        let mut interface = Registry::new("Calc");
        let mut local = Registry::new("Calc.Account");
        interface
            .register_typedef(&resolver, "Calc.Id", typedef("Id", Type::Integer))
            .unwrap();
        local
            .register_typedef(&resolver, "Calc.Account.Id", typedef("Id", Type::String))
            .unwrap();

        let found = resolver.lookup("Id", &[&interface, &local]).unwrap();
        assert_eq!(found.final_type(), &Type::String);
        let found = resolver.lookup("Id", &[&interface]).unwrap();
        assert_eq!(found.final_type(), &Type::Integer);
        assert!(resolver.lookup("Missing", &[&interface, &local]).is_none());
        assert_eq!(
            resolver.lookup("blob", &[&interface, &local]).unwrap().as_ref(),
            &Type::Blob
        );
    }

    #[test]
    fn test_lookup_walks_every_enclosing_body() {
        let mut resolver = Resolver::new();
        let interface = Registry::new("Calc");
        let mut outer = Registry::new("Calc.Account");
        let inner = Registry::new("Calc.Account.Card");
        outer
            .register_typedef(&resolver, "Calc.Account.Pin", typedef("Pin", Type::Integer))
            .unwrap();
        let scope = vec!["Calc".to_string(), "Account".to_string()];
        outer.add_placeholder(resolver.declare_object(scope, "Owner"));

        let pin = resolver.lookup("Pin", &[&interface, &outer, &inner]).unwrap();
        assert_eq!(pin.final_type(), &Type::Integer);
        let owner = resolver.lookup("Owner", &[&interface, &outer, &inner]).unwrap();
        assert!(matches!(&*owner, Type::Object(h) if h.name == "Owner"));
        assert!(resolver.lookup("Pin", &[&interface, &inner]).is_none());
    }

    #[test]
    fn test_duplicate_typedef_leaves_registry_untouched() {
        let resolver = Resolver::new();
        let mut registry = Registry::new("Calc");
        registry
            .register_typedef(&resolver, "Calc.Id", typedef("Id", Type::Integer))
            .unwrap();
        let err = registry
            .register_typedef(&resolver, "Calc.Id", typedef("Id", Type::String))
            .unwrap_err();
        assert!(err.is_duplicate_name());
        assert_eq!(registry.definitions().len(), 1);
        let found = resolver.lookup("Id", &[&registry]).unwrap();
        assert_eq!(found.final_type(), &Type::Integer);
    }

    #[test]
    fn test_embedded_names_cannot_be_shadowed() {
        let resolver = Resolver::new();
        let mut registry = Registry::new("Calc");
        let err = registry
            .register_typedef(&resolver, "Calc.string", typedef("string", Type::Integer))
            .unwrap_err();
        assert!(matches!(err, ReaderError::ShadowsEmbeddedType { .. }));
        assert!(registry.definitions().is_empty());
    }

    #[test]
    fn test_function_variants() {
        let mut registry = Registry::new("Calc");
        registry.register_function("Calc.add", function("add", &["a", "b"])).unwrap();
        registry.register_function("Calc.add", function("add", &["x", "y"])).unwrap();
        let err = registry
            .register_function("Calc.add", function("add", &["a", "b"]))
            .unwrap_err();
        assert!(matches!(err, ReaderError::VariantExists { .. }));
        assert_eq!(registry.definitions().len(), 2);
    }

    #[test]
    fn test_object_placeholder_defined_once() {
        let mut resolver = Resolver::new();
        let mut registry = Registry::new("Calc");
        let scope = vec!["Calc".to_string()];
        let declared = resolver.declare_object(scope.clone(), "Account");
        registry.add_placeholder(declared.clone());

        let handle = registry
            .register_object(&mut resolver, "Calc.Account", &scope, "Account")
            .unwrap();
        assert_eq!(handle.id, declared.id);

        let body = Object {
            name: "Account".into(),
            scope: scope.clone(),
            documentation: Documentation::default(),
            logger_name: "Calc.Account".into(),
            definitions: Vec::new(),
        };
        resolver
            .define_object("Calc.Account", &handle, body.clone())
            .unwrap();
        let err = resolver
            .define_object("Calc.Account", &handle, body)
            .unwrap_err();
        assert!(err.is_duplicate_name());

        let err = registry
            .register_object(&mut resolver, "Calc.Account", &scope, "Account")
            .unwrap_err();
        assert!(matches!(err, ReaderError::ObjectAlreadyDefined { .. }));
    }

    #[test]
    fn test_finish_rejects_undefined_objects() {
        let mut resolver = Resolver::new();
        resolver.declare_object(vec!["Calc".into()], "Ghost");
        let err = resolver.finish(Vec::new()).unwrap_err();
        assert!(matches!(err, ReaderError::UndefinedObject { name } if name == "Ghost"));
    }
}
