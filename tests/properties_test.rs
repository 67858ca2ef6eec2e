// Property-based checks for variant ids and structural hashing
use pidl_core::ast::{variant_id, Documentation, Member, Structure, Type, TypeRef};
use pidl_core::codegen::prebuilt::{structural_hash, PrebuiltRegistry};
use pidl_core::error::ReaderError;
use pidl_core::read_json;
use pidl_core::utils::is_identifier;
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

fn argument_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,7}"
}

fn argument_names() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(argument_name(), 1..6)
}

/// Names as they may appear in a source document, separators included.
fn raw_argument_names() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-c|_0-9 ]{1,3}", 0..4).prop_map(|names| {
        let mut seen = HashSet::new();
        names.into_iter().filter(|n| seen.insert(n.clone())).collect()
    })
}

fn overloads(a: &[String], b: &[String]) -> String {
    let function = |names: &[String]| {
        let arguments: Vec<_> = names
            .iter()
            .map(|name| serde_json::json!({ "name": name, "type": "integer" }))
            .collect();
        serde_json::json!({ "name": "f", "nature": "function", "type": "void", "arguments": arguments })
    };
    serde_json::json!({ "name": "I", "nature": "interface", "body": [function(a), function(b)] })
        .to_string()
}

fn leaf() -> impl Strategy<Value = Type> {
    prop_oneof![
        Just(Type::Integer),
        Just(Type::Float),
        Just(Type::Boolean),
        Just(Type::String),
        Just(Type::DateTime),
        Just(Type::Blob),
    ]
}

fn composite() -> impl Strategy<Value = Type> {
    leaf().prop_recursive(3, 16, 3, |inner| {
        let inner = inner.prop_map(Arc::new);
        prop_oneof![
            inner.clone().prop_map(Type::Nullable),
            inner.clone().prop_map(Type::Array),
            prop::collection::vec(inner.clone(), 1..4).prop_map(Type::Tuple),
            prop::collection::vec(("[a-c]", inner), 1..3).prop_map(|members| {
                Type::Structure(Structure {
                    members: members
                        .into_iter()
                        .map(|(name, ty)| Member {
                            name,
                            ty,
                            documentation: Documentation::default(),
                        })
                        .collect(),
                })
            }),
        ]
    })
}

proptest! {
    #[test]
    fn variant_id_is_deterministic(names in argument_names()) {
        let first = variant_id(names.iter().map(String::as_str));
        let second = variant_id(names.clone().iter().map(String::as_str));
        prop_assert_eq!(first, second);
    }

    #[test]
    fn variant_id_distinguishes_argument_lists(a in argument_names(), b in argument_names()) {
        prop_assume!(a != b);
        prop_assert_ne!(
            variant_id(a.iter().map(String::as_str)),
            variant_id(b.iter().map(String::as_str))
        );
    }

    #[test]
    fn variant_id_depends_on_order(names in prop::collection::vec(argument_name(), 2..6)) {
        let mut reversed = names.clone();
        reversed.reverse();
        prop_assume!(reversed != names);
        prop_assert_ne!(
            variant_id(names.iter().map(String::as_str)),
            variant_id(reversed.iter().map(String::as_str))
        );
    }

    #[test]
    fn overloads_read_from_source_keep_distinct_ids(a in raw_argument_names(), b in raw_argument_names()) {
        let result = read_json(&overloads(&a, &b), "overloads.json");
        let valid = a.iter().chain(&b).all(|name| is_identifier(name));
        match result {
            Err(ReaderError::MalformedDefinition { .. }) => prop_assert!(!valid),
            Err(ReaderError::VariantExists { .. }) => prop_assert!(valid && a == b),
            Ok(document) => {
                prop_assert!(valid && a != b);
                let interface = document.find_interface("I").unwrap();
                let ids: Vec<_> = interface
                    .definitions
                    .iter()
                    .filter_map(|d| d.as_variant())
                    .map(|v| v.variant_id().to_string())
                    .collect();
                prop_assert_eq!(ids.len(), 2);
                prop_assert_ne!(&ids[0], &ids[1]);
            }
            Err(other) => prop_assert!(false, "unexpected error {}", other),
        }
    }

    #[test]
    fn structural_hash_matches_structural_equality(a in composite(), b in composite()) {
        prop_assert_eq!(a == b, structural_hash(&a) == structural_hash(&b));
    }
}

fn structure(members: &[(&str, Type)]) -> Type {
    Type::Structure(Structure {
        members: members
            .iter()
            .map(|(name, ty)| Member {
                name: (*name).to_string(),
                ty: Arc::new(ty.clone()),
                documentation: Documentation::default(),
            })
            .collect(),
    })
}

fn rc(ty: Type) -> TypeRef {
    Arc::new(ty)
}

#[test]
fn test_distinct_shapes_get_distinct_hashes() {
    let corpus = vec![
        Type::Tuple(vec![rc(Type::Integer), rc(Type::Float)]),
        Type::Tuple(vec![rc(Type::Float), rc(Type::Integer)]),
        Type::Tuple(vec![rc(Type::Integer)]),
        Type::Array(rc(Type::Integer)),
        Type::Nullable(rc(Type::Integer)),
        Type::Array(rc(Type::Nullable(rc(Type::Integer)))),
        Type::Nullable(rc(Type::Array(rc(Type::Integer)))),
        structure(&[("x", Type::Integer)]),
        structure(&[("y", Type::Integer)]),
        structure(&[("x", Type::Float)]),
        structure(&[("x", Type::Integer), ("y", Type::Integer)]),
        Type::Tuple(vec![rc(structure(&[("x", Type::Integer)]))]),
        Type::Tuple(vec![rc(Type::Tuple(vec![rc(Type::Integer), rc(Type::Float)])), rc(Type::String)]),
        Type::Tuple(vec![rc(Type::Tuple(vec![rc(Type::Integer)])), rc(Type::Float), rc(Type::String)]),
    ];
    let hashes: HashSet<String> = corpus.iter().map(structural_hash).collect();
    assert_eq!(hashes.len(), corpus.len());
}

#[test]
fn test_equal_shapes_share_a_prebuilt_entry() {
    let mut registry = PrebuiltRegistry::new();
    let first = registry.register(&rc(structure(&[("x", Type::Integer)])));
    let second = registry.register(&rc(structure(&[("x", Type::Integer)])));
    let other = registry.register(&rc(Type::Tuple(vec![rc(Type::Integer), rc(Type::String)])));
    assert_eq!(first, Some(0));
    assert_eq!(second, Some(0));
    assert_eq!(other, Some(1));
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_components_registered_before_composites() {
    let inner = rc(structure(&[("x", Type::Integer)]));
    let mut registry = PrebuiltRegistry::new();
    let outer = registry.register(&rc(Type::Tuple(vec![inner.clone(), rc(Type::Float)])));
    assert_eq!(outer, Some(1));
    assert_eq!(registry.index_of(&inner), Some(0));
}
