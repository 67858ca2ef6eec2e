use std::collections::BTreeMap;
use std::sync::Arc;

/// Shared reference to a type node. The AST is read-only once the reader
/// returns it, so a type may be referenced from any number of definitions.
pub type TypeRef = Arc<Type>;

/// Names of the built-in types; none of them may be redefined.
pub const EMBEDDED_TYPE_NAMES: [&str; 7] = [
    "integer", "float", "string", "datetime", "void", "boolean", "blob",
];

// --- Documentation ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DetailKind {
    Description,
    Return,
    Group,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Documentation {
    pub brief: String,
    pub details: BTreeMap<DetailKind, String>,
}

impl Documentation {
    pub fn new(brief: impl Into<String>) -> Self {
        Documentation {
            brief: brief.into(),
            details: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_detail(mut self, kind: DetailKind, text: impl Into<String>) -> Self {
        self.details.insert(kind, text.into());
        self
    }

    pub fn detail(&self, kind: DetailKind) -> Option<&str> {
        self.details.get(&kind).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.brief.is_empty() && self.details.is_empty()
    }
}

// --- Types ---

/// Coarse classification of a [`Type`], used where code only cares about
/// the family a type belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Native,
    Embedded,
    Void,
    Structure,
    Generic,
    TypeDefinition,
    Object,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Integer,
    Float,
    Boolean,
    String,
    DateTime,
    Blob,
    Void,
    Structure(Structure),
    Nullable(TypeRef),
    Array(TypeRef),
    Tuple(Vec<TypeRef>),
    Definition(Arc<TypeDefinition>),
    Object(ObjectHandle),
}

impl Type {
    /// Resolves an embedded type by its IDL name.
    pub fn embedded(name: &str) -> Option<Type> {
        match name {
            "integer" => Some(Type::Integer),
            "float" => Some(Type::Float),
            "boolean" => Some(Type::Boolean),
            "string" => Some(Type::String),
            "datetime" => Some(Type::DateTime),
            "blob" => Some(Type::Blob),
            "void" => Some(Type::Void),
            _ => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Type::Integer => "integer",
            Type::Float => "float",
            Type::Boolean => "boolean",
            Type::String => "string",
            Type::DateTime => "datetime",
            Type::Blob => "blob",
            Type::Void => "void",
            Type::Structure(_) => "structure",
            Type::Nullable(_) => "nullable",
            Type::Array(_) => "array",
            Type::Tuple(_) => "tuple",
            Type::Definition(td) => &td.name,
            Type::Object(handle) => &handle.name,
        }
    }

    pub fn kind(&self) -> TypeKind {
        match self {
            Type::Integer | Type::Float | Type::Boolean => TypeKind::Native,
            Type::String | Type::DateTime | Type::Blob => TypeKind::Embedded,
            Type::Void => TypeKind::Void,
            Type::Structure(_) => TypeKind::Structure,
            Type::Nullable(_) | Type::Array(_) | Type::Tuple(_) => TypeKind::Generic,
            Type::Definition(_) => TypeKind::TypeDefinition,
            Type::Object(_) => TypeKind::Object,
        }
    }

    /// Enclosing-name components; empty for anonymous and built-in types.
    pub fn scope(&self) -> &[String] {
        match self {
            Type::Definition(td) => &td.scope,
            Type::Object(handle) => &handle.scope,
            _ => &[],
        }
    }

    /// Follows typedef chains down to the aliased type.
    ///
    /// Terminates because a typedef can only reference types registered
    /// before it, so chains are acyclic by construction.
    pub fn final_type(&self) -> &Type {
        let mut current = self;
        while let Type::Definition(td) = current {
            current = &td.ty;
        }
        current
    }

    /// Component types of a generic, in declaration order.
    pub fn components(&self) -> &[TypeRef] {
        match self {
            Type::Nullable(t) | Type::Array(t) => std::slice::from_ref(t),
            Type::Tuple(types) => types,
            _ => &[],
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self.final_type(), Type::Void)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Structure {
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub name: String,
    pub ty: TypeRef,
    pub documentation: Documentation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDefinition {
    pub name: String,
    pub scope: Vec<String>,
    pub ty: TypeRef,
    pub documentation: Documentation,
}

impl TypeDefinition {
    /// True when this typedef names a structure directly (`typedef struct {...} Name`).
    pub fn is_structure(&self) -> bool {
        matches!(*self.ty, Type::Structure(_))
    }
}

// --- Objects ---

/// Stable index of an object in the [`Document`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub(crate) usize);

impl ObjectId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Reference to an object body stored in the document arena.
///
/// Handles are handed out before the body is read, which is what lets an
/// object be used as a type ahead of its definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHandle {
    pub id: ObjectId,
    pub name: String,
    pub scope: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub name: String,
    pub scope: Vec<String>,
    pub documentation: Documentation,
    pub logger_name: String,
    pub definitions: Vec<Definition>,
}

// --- Functions ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    In,
    Out,
    InOut,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
            Direction::InOut => "in-out",
        }
    }

    pub fn parse(s: &str) -> Option<Direction> {
        match s {
            "in" => Some(Direction::In),
            "out" => Some(Direction::Out),
            "in-out" => Some(Direction::InOut),
            _ => None,
        }
    }

    /// Whether the argument travels in the request.
    pub fn is_input(self) -> bool {
        matches!(self, Direction::In | Direction::InOut)
    }

    /// Whether the argument travels back in the response.
    pub fn is_output(self) -> bool {
        matches!(self, Direction::Out | Direction::InOut)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: String,
    pub ty: TypeRef,
    pub direction: Direction,
    pub documentation: Documentation,
}

/// Computes the variant id of an overload from its ordered argument names.
///
/// The reader only accepts identifiers as argument names, so `|` never
/// occurs inside one and distinct name lists give distinct ids.
pub fn variant_id<'a>(argument_names: impl IntoIterator<Item = &'a str>) -> String {
    let names: Vec<&str> = argument_names.into_iter().collect();
    if names.is_empty() {
        "ARG:void".to_string()
    } else {
        format!("ARG:{}", names.join("|"))
    }
}

/// One overload of a function or method.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionVariant {
    pub name: String,
    pub scope: Vec<String>,
    pub return_type: TypeRef,
    pub arguments: Vec<Argument>,
    pub documentation: Documentation,
    variant_id: String,
}

impl FunctionVariant {
    pub fn new(
        name: impl Into<String>,
        scope: Vec<String>,
        return_type: TypeRef,
        arguments: Vec<Argument>,
        documentation: Documentation,
    ) -> Self {
        let variant_id = variant_id(arguments.iter().map(|a| a.name.as_str()));
        FunctionVariant {
            name: name.into(),
            scope,
            return_type,
            arguments,
            documentation,
            variant_id,
        }
    }

    pub fn variant_id(&self) -> &str {
        &self.variant_id
    }

    pub fn in_arguments(&self) -> impl Iterator<Item = &Argument> {
        self.arguments.iter().filter(|a| a.direction.is_input())
    }

    pub fn out_arguments(&self) -> impl Iterator<Item = &Argument> {
        self.arguments.iter().filter(|a| a.direction.is_output())
    }
}

/// All variants sharing one function name, in document order.
#[derive(Debug, Clone)]
pub struct FunctionGroup<'a> {
    pub name: &'a str,
    pub variants: Vec<&'a FunctionVariant>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub scope: Vec<String>,
    pub ty: TypeRef,
    pub readonly: bool,
    pub documentation: Documentation,
}

// --- Definitions ---

#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    TypeDefinition(Arc<TypeDefinition>),
    Function(FunctionVariant),
    Object(ObjectHandle),
    Property(Property),
    Method(FunctionVariant),
}

impl Definition {
    pub fn name(&self) -> &str {
        match self {
            Definition::TypeDefinition(td) => &td.name,
            Definition::Function(f) | Definition::Method(f) => &f.name,
            Definition::Object(handle) => &handle.name,
            Definition::Property(p) => &p.name,
        }
    }

    pub fn nature(&self) -> &'static str {
        match self {
            Definition::TypeDefinition(_) => "typedef",
            Definition::Function(_) => "function",
            Definition::Object(_) => "object",
            Definition::Property(_) => "property",
            Definition::Method(_) => "method",
        }
    }

    pub fn as_variant(&self) -> Option<&FunctionVariant> {
        match self {
            Definition::Function(f) | Definition::Method(f) => Some(f),
            _ => None,
        }
    }
}

/// Groups the function and method variants of a body by name, keeping
/// the order in which each name first appears.
pub fn group_variants(definitions: &[Definition]) -> Vec<FunctionGroup<'_>> {
    let mut groups: Vec<FunctionGroup<'_>> = Vec::new();
    for variant in definitions.iter().filter_map(Definition::as_variant) {
        match groups.iter_mut().find(|g| g.name == variant.name) {
            Some(group) => group.variants.push(variant),
            None => groups.push(FunctionGroup {
                name: &variant.name,
                variants: vec![variant],
            }),
        }
    }
    groups
}

// --- Top level ---

#[derive(Debug, Clone, PartialEq)]
pub struct Interface {
    pub name: String,
    pub documentation: Documentation,
    pub logger_name: String,
    pub definitions: Vec<Definition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub name: String,
    pub documentation: Documentation,
    /// Sorted by name.
    pub elements: Vec<TopLevel>,
    pub info: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TopLevel {
    Interface(Interface),
    Module(Module),
}

impl TopLevel {
    pub fn name(&self) -> &str {
        match self {
            TopLevel::Interface(i) => &i.name,
            TopLevel::Module(m) => &m.name,
        }
    }

    pub fn documentation(&self) -> &Documentation {
        match self {
            TopLevel::Interface(i) => &i.documentation,
            TopLevel::Module(m) => &m.documentation,
        }
    }
}

/// A body that owns definitions: either an interface or an object.
#[derive(Debug, Clone, Copy)]
pub enum DefinitionProvider<'a> {
    Interface(&'a Interface),
    Object(&'a Object),
}

impl<'a> DefinitionProvider<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            DefinitionProvider::Interface(i) => &i.name,
            DefinitionProvider::Object(o) => &o.name,
        }
    }

    /// Scope of the body itself; an interface sits at the root.
    pub fn scope(&self) -> &'a [String] {
        match self {
            DefinitionProvider::Interface(_) => &[],
            DefinitionProvider::Object(o) => &o.scope,
        }
    }

    pub fn definitions(&self) -> &'a [Definition] {
        match self {
            DefinitionProvider::Interface(i) => &i.definitions,
            DefinitionProvider::Object(o) => &o.definitions,
        }
    }

    pub fn documentation(&self) -> &'a Documentation {
        match self {
            DefinitionProvider::Interface(i) => &i.documentation,
            DefinitionProvider::Object(o) => &o.documentation,
        }
    }

    pub fn logger_name(&self) -> &'a str {
        match self {
            DefinitionProvider::Interface(i) => &i.logger_name,
            DefinitionProvider::Object(o) => &o.logger_name,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, DefinitionProvider::Object(_))
    }
}

/// The result of a successful read: the top-level forest plus the arena
/// holding every object body it references.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    top_levels: Vec<TopLevel>,
    objects: Vec<Object>,
}

impl Document {
    pub(crate) fn new(top_levels: Vec<TopLevel>, objects: Vec<Object>) -> Self {
        Document {
            top_levels,
            objects,
        }
    }

    pub fn top_levels(&self) -> &[TopLevel] {
        &self.top_levels
    }

    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    /// Looks up an object body. Handles only come from the reader that built
    /// this document, so the index is always in range.
    pub fn object(&self, handle: &ObjectHandle) -> &Object {
        &self.objects[handle.id.0]
    }

    /// Finds a top-level element by its dotted path, e.g. `Bank.Accounts`.
    pub fn find_top_level(&self, path: &str) -> Option<&TopLevel> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.top_levels.iter().find(|t| t.name() == first)?;
        for part in parts {
            match current {
                TopLevel::Module(m) => {
                    current = m.elements.iter().find(|t| t.name() == part)?;
                }
                TopLevel::Interface(_) => return None,
            }
        }
        Some(current)
    }

    /// Finds an interface anywhere in the forest by name.
    pub fn find_interface(&self, name: &str) -> Option<&Interface> {
        fn walk<'a>(items: &'a [TopLevel], name: &str) -> Option<&'a Interface> {
            items.iter().find_map(|t| match t {
                TopLevel::Interface(i) if i.name == name => Some(i),
                TopLevel::Interface(_) => None,
                TopLevel::Module(m) => walk(&m.elements, name),
            })
        }
        walk(&self.top_levels, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arg(name: &str, direction: Direction) -> Argument {
        Argument {
            name: name.to_string(),
            ty: Arc::new(Type::Integer),
            direction,
            documentation: Documentation::default(),
        }
    }

    #[test]
    fn test_final_type_follows_chain() {
        let inner = Arc::new(TypeDefinition {
            name: "Id".into(),
            scope: vec!["Calc".into()],
            ty: Arc::new(Type::Integer),
            documentation: Documentation::default(),
        });
        let outer = Arc::new(TypeDefinition {
            name: "AccountId".into(),
            scope: vec!["Calc".into()],
            ty: Arc::new(Type::Definition(inner)),
            documentation: Documentation::default(),
        });
        let ty = Type::Definition(outer);
        assert_eq!(ty.final_type(), &Type::Integer);
        assert_eq!(ty.final_type().final_type(), &Type::Integer);
        assert_eq!(ty.name(), "AccountId");
        assert_eq!(ty.kind(), TypeKind::TypeDefinition);
    }

    #[test]
    fn test_variant_id() {
        assert_eq!(variant_id(Vec::<&str>::new()), "ARG:void");
        assert_eq!(variant_id(["a", "b"]), "ARG:a|b");
        assert_ne!(variant_id(["a", "b"]), variant_id(["b", "a"]));
    }

    #[test]
    fn test_in_and_out_arguments() {
        let f = FunctionVariant::new(
            "swap",
            vec!["Calc".into()],
            Arc::new(Type::Void),
            vec![
                arg("a", Direction::In),
                arg("b", Direction::InOut),
                arg("c", Direction::Out),
            ],
            Documentation::default(),
        );
        let ins: Vec<_> = f.in_arguments().map(|a| a.name.as_str()).collect();
        let outs: Vec<_> = f.out_arguments().map(|a| a.name.as_str()).collect();
        assert_eq!(ins, ["a", "b"]);
        assert_eq!(outs, ["b", "c"]);
        assert_eq!(f.variant_id(), "ARG:a|b|c");
        assert!(f.return_type.is_void());
    }

    #[test]
    fn test_group_variants_keeps_first_appearance_order() {
        let scope = vec!["Calc".to_string()];
        let make = |name: &str, args: Vec<Argument>| {
            Definition::Function(FunctionVariant::new(
                name,
                scope.clone(),
                Arc::new(Type::Integer),
                args,
                Documentation::default(),
            ))
        };
        let defs = vec![
            make("sub", vec![]),
            make("add", vec![arg("a", Direction::In)]),
            make("sub", vec![arg("x", Direction::In)]),
        ];
        let groups = group_variants(&defs);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "sub");
        assert_eq!(groups[0].variants.len(), 2);
        assert_eq!(groups[1].name, "add");
    }

    #[test]
    fn test_direction_round_trip() {
        for d in [Direction::In, Direction::Out, Direction::InOut] {
            assert_eq!(Direction::parse(d.as_str()), Some(d));
        }
        assert_eq!(Direction::parse("inout"), None);
    }
}
