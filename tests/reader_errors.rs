// Reader error paths: malformed input, unresolved types and name collisions
use pidl_core::error::ReaderError;
use pidl_core::{read_json, read_xml};

fn interface(body: &str) -> String {
    format!(r#"{{ "name": "Calc", "nature": "interface", "body": [ {body} ] }}"#)
}

fn read_err(source: &str) -> ReaderError {
    match read_json(source, "test.json") {
        Ok(document) => panic!("expected a reader error, got {document:?}"),
        Err(err) => err,
    }
}

mod malformed {
    use super::*;

    #[test]
    fn test_invalid_json_syntax() {
        let err = read_err(r#"{ "name": "Calc", "#);
        assert!(matches!(err, ReaderError::Parse { .. }), "got {err:?}");
    }

    #[test]
    fn test_invalid_xml_syntax() {
        let err = read_xml("<interface name=\"Calc\"><body></interface>", "test.xml").unwrap_err();
        assert!(matches!(err, ReaderError::Parse { .. }), "got {err:?}");
    }

    #[test]
    fn test_root_must_be_object_or_array() {
        let err = read_err("42");
        assert!(matches!(err, ReaderError::MalformedDefinition { .. }), "got {err:?}");
    }

    #[test]
    fn test_missing_top_level_name() {
        let err = read_err(r#"{ "nature": "interface", "body": [] }"#);
        match err {
            ReaderError::MalformedDefinition { path, message } => {
                assert_eq!(path, "toplevel element #1");
                assert!(message.contains("name"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_missing_nature() {
        let err = read_err(r#"{ "name": "Calc", "body": [] }"#);
        assert!(matches!(err, ReaderError::MalformedDefinition { ref path, .. } if path == "Calc"));
    }

    #[test]
    fn test_invalid_top_level_nature() {
        let err = read_err(r#"{ "name": "Calc", "nature": "object", "body": [] }"#);
        assert!(matches!(err, ReaderError::InvalidNature { ref nature, .. } if nature == "object"));
    }

    #[test]
    fn test_property_not_allowed_in_interface() {
        let err = read_err(&interface(r#"{ "name": "p", "nature": "property", "type": "integer" }"#));
        match err {
            ReaderError::InvalidNature { path, nature } => {
                assert_eq!(path, "Calc.p");
                assert_eq!(nature, "property");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_missing_function_type() {
        let err = read_err(&interface(r#"{ "name": "add", "nature": "function" }"#));
        assert!(matches!(err, ReaderError::MalformedDefinition { ref path, .. } if path == "Calc.add"));
    }

    #[test]
    fn test_missing_argument_name() {
        let err = read_err(&interface(
            r#"{ "name": "add", "nature": "function", "type": "integer",
                 "arguments": [ { "type": "integer" } ] }"#,
        ));
        match err {
            ReaderError::MalformedDefinition { message, .. } => {
                assert_eq!(message, "name of argument #1 is not specified");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_invalid_direction() {
        let err = read_err(&interface(
            r#"{ "name": "add", "nature": "function", "type": "integer",
                 "arguments": [ { "name": "a", "type": "integer", "direction": "sideways" } ] }"#,
        ));
        assert!(matches!(err, ReaderError::MalformedDefinition { ref path, .. } if path == "Calc.add.a"));
    }

    #[test]
    fn test_argument_name_must_be_an_identifier() {
        let err = read_err(&interface(
            r#"{ "name": "f", "nature": "function", "type": "void",
                 "arguments": [ { "name": "a|b", "type": "integer" } ] },
               { "name": "f", "nature": "function", "type": "void",
                 "arguments": [ { "name": "a", "type": "integer" },
                                { "name": "b", "type": "integer" } ] }"#,
        ));
        match err {
            ReaderError::MalformedDefinition { path, message } => {
                assert_eq!(path, "Calc.f");
                assert!(message.contains("'a|b'"), "{message}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_body_must_be_an_array() {
        let err = read_err(r#"{ "name": "Calc", "nature": "interface", "body": {} }"#);
        assert!(matches!(err, ReaderError::MalformedDefinition { .. }), "got {err:?}");
    }

    #[test]
    fn test_empty_tuple() {
        let err = read_err(&interface(
            r#"{ "name": "T", "nature": "typedef", "type": { "name": "tuple", "types": [] } }"#,
        ));
        assert!(matches!(err, ReaderError::MalformedDefinition { .. }), "got {err:?}");
    }

    #[test]
    fn test_unexpected_xml_list_item() {
        let source = r#"
            <interface name="Calc">
                <body>
                    <function name="add" type="integer">
                        <arguments><member name="a" type="integer"/></arguments>
                    </function>
                </body>
            </interface>"#;
        let err = read_xml(source, "calc.xml").unwrap_err();
        assert!(err.to_string().contains("unexpected element 'member'"), "got {err}");
    }
}

mod resolution {
    use super::*;

    #[test]
    fn test_type_not_found_message() {
        let err = read_err(&interface(
            r#"{ "name": "bar", "nature": "function", "type": "void",
                 "arguments": [ { "name": "x", "type": "Baz" } ] }"#,
        ));
        assert_eq!(err.to_string(), "Calc.bar.x: type 'Baz' is not found in 'Calc'");
    }

    #[test]
    fn test_typedef_cannot_be_used_before_definition() {
        let err = read_err(&interface(
            r#"{ "name": "A", "nature": "typedef", "type": "B" },
               { "name": "B", "nature": "typedef", "type": "integer" }"#,
        ));
        assert!(matches!(err, ReaderError::TypeNotFound { ref name, .. } if name == "B"));
    }

    #[test]
    fn test_object_scope_is_not_visible_from_interface() {
        let err = read_err(&interface(
            r#"{ "name": "Account", "nature": "object", "body": [
                   { "name": "Id", "nature": "typedef", "type": "string" } ] },
               { "name": "find", "nature": "function", "type": "Id" }"#,
        ));
        match err {
            ReaderError::TypeNotFound { path, registry, .. } => {
                assert_eq!(path, "Calc.find");
                assert_eq!(registry, "Calc");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_nested_object_scope_is_not_visible_from_siblings() {
        let err = read_err(&interface(
            r#"{ "name": "A", "nature": "object", "body": [
                   { "name": "T", "nature": "typedef", "type": "integer" } ] },
               { "name": "B", "nature": "object", "body": [
                   { "name": "p", "nature": "property", "type": "T" } ] }"#,
        ));
        match err {
            ReaderError::TypeNotFound { path, registry, .. } => {
                assert_eq!(path, "Calc.B.p");
                assert_eq!(registry, "Calc.B");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_inside_structure() {
        let err = read_err(&interface(
            r#"{ "name": "P", "nature": "typedef", "type": { "name": "structure",
                 "members": [ { "name": "x", "type": "Missing" } ] } }"#,
        ));
        assert!(err.to_string().starts_with("Calc.P.x: type 'Missing'"), "got {err}");
    }
}

mod duplicates {
    use super::*;

    fn assert_duplicate(body: &str) {
        let err = read_err(&interface(body));
        assert!(err.is_duplicate_name(), "expected a duplicate-name error, got {err:?}");
    }

    #[test]
    fn test_typedef_twice() {
        assert_duplicate(
            r#"{ "name": "Id", "nature": "typedef", "type": "integer" },
               { "name": "Id", "nature": "typedef", "type": "string" }"#,
        );
    }

    #[test]
    fn test_object_twice() {
        assert_duplicate(
            r#"{ "name": "Account", "nature": "object", "body": [] },
               { "name": "Account", "nature": "object", "body": [] }"#,
        );
    }

    #[test]
    fn test_property_twice() {
        assert_duplicate(
            r#"{ "name": "Account", "nature": "object", "body": [
                   { "name": "owner", "nature": "property", "type": "string" },
                   { "name": "owner", "nature": "property", "type": "integer" } ] }"#,
        );
    }

    #[test]
    fn test_method_with_same_variant_twice() {
        let err = read_err(&interface(
            r#"{ "name": "Account", "nature": "object", "body": [
                   { "name": "deposit", "nature": "method", "type": "void",
                     "arguments": [ { "name": "amount", "type": "float" } ] },
                   { "name": "deposit", "nature": "method", "type": "void",
                     "arguments": [ { "name": "amount", "type": "integer" } ] } ] }"#,
        ));
        match err {
            ReaderError::VariantExists { path, name, variant } => {
                assert_eq!(path, "Calc.Account.deposit");
                assert_eq!(name, "deposit");
                assert_eq!(variant, "ARG:amount");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_function_overloads_by_argument_names() {
        let document = read_json(
            &interface(
                r#"{ "name": "add", "nature": "function", "type": "integer",
                     "arguments": [ { "name": "a", "type": "integer" } ] },
                   { "name": "add", "nature": "function", "type": "integer",
                     "arguments": [ { "name": "b", "type": "integer" } ] }"#,
            ),
            "test.json",
        )
        .unwrap();
        let calc = document.find_interface("Calc").unwrap();
        assert_eq!(calc.definitions.len(), 2);
    }

    #[test]
    fn test_function_and_typedef_share_a_name() {
        assert_duplicate(
            r#"{ "name": "add", "nature": "typedef", "type": "integer" },
               { "name": "add", "nature": "function", "type": "integer" }"#,
        );
    }

    #[test]
    fn test_shadowing_embedded_type() {
        let err = read_err(&interface(r#"{ "name": "integer", "nature": "typedef", "type": "float" }"#));
        assert!(matches!(err, ReaderError::ShadowsEmbeddedType { .. }), "got {err:?}");
        assert!(err.is_duplicate_name());
    }

    #[test]
    fn test_duplicate_argument() {
        assert_duplicate(
            r#"{ "name": "add", "nature": "function", "type": "integer",
                 "arguments": [ { "name": "a", "type": "integer" },
                                { "name": "a", "type": "integer" } ] }"#,
        );
    }

    #[test]
    fn test_duplicate_structure_member() {
        assert_duplicate(
            r#"{ "name": "P", "nature": "typedef", "type": { "name": "structure",
                 "members": [ { "name": "x", "type": "float" },
                              { "name": "x", "type": "float" } ] } }"#,
        );
    }

    #[test]
    fn test_duplicate_top_level() {
        let source = r#"[
            { "name": "Calc", "nature": "interface", "body": [] },
            { "name": "Calc", "nature": "interface", "body": [] }
        ]"#;
        assert!(read_err(source).is_duplicate_name());
    }

    #[test]
    fn test_duplicate_module_element() {
        let source = r#"{ "name": "Services", "nature": "module", "body": [
            { "name": "Calc", "nature": "interface", "body": [] },
            { "name": "Calc", "nature": "module", "body": [] } ] }"#;
        let err = read_err(source);
        assert!(matches!(err, ReaderError::DuplicateName { ref path, .. } if path == "Services.Calc"));
    }

    #[test]
    fn test_failed_read_yields_no_document() {
        let result = read_json(
            &interface(
                r#"{ "name": "ok", "nature": "function", "type": "void" },
                   { "name": "ok", "nature": "function", "type": "void" }"#,
            ),
            "test.json",
        );
        assert!(result.is_err());
    }
}
