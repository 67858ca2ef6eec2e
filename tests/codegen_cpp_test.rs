// C++ generation: Mode x Role completeness and the calculator scenario
use pidl_core::codegen::{CodeGen, CppCodeGen, EmissionContext, Include, Mode, Role, StandardHelper};
use pidl_core::{read_json, Document};
use std::fs;
use std::path::PathBuf;
use test_case::test_case;

fn read_fixture(filename: &str) -> Document {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(filename);
    let source =
        fs::read_to_string(&path).unwrap_or_else(|_| panic!("Failed to read test file: {path:?}"));
    read_json(&source, filename).unwrap()
}

fn generate(document: &Document, mode: Mode, role: Role) -> String {
    CppCodeGen::json_stl(Box::new(StandardHelper::cpp()))
        .generate(document, EmissionContext::new(mode, role))
        .unwrap_or_else(|err| panic!("generation failed for {mode:?}/{role:?}: {err}"))
}

/// Occurrences of `name(` written as a declaration or definition, i.e. not
/// as a member call through `->`.
fn signatures(text: &str, name: &str) -> usize {
    let needle = format!("{name}(");
    text.match_indices(&needle)
        .filter(|(at, _)| {
            let before = &text[..*at];
            before.ends_with(' ') || before.ends_with("::")
        })
        .count()
}

#[test_case(Mode::Declaration, Role::Client, 1 ; "client declaration")]
#[test_case(Mode::Implementation, Role::Client, 1 ; "client implementation")]
#[test_case(Mode::AllInOne, Role::Client, 1 ; "client all in one")]
#[test_case(Mode::Declaration, Role::Server, 1 ; "server declaration")]
#[test_case(Mode::Implementation, Role::Server, 0 ; "server implementation")]
#[test_case(Mode::AllInOne, Role::Server, 1 ; "server all in one")]
fn test_one_signature_per_variant(mode: Mode, role: Role, expected: usize) {
    let document = read_fixture("bank.json");
    let text = generate(&document, mode, role);
    for name in ["swap", "open", "transfer", "history", "card", "get_owner", "get_limit", "set_limit", "get_pin"] {
        assert_eq!(
            signatures(&text, name),
            expected,
            "signature count of '{name}' for {mode:?}/{role:?}\n{text}"
        );
    }
    assert_eq!(signatures(&text, "set_owner"), 0, "read-only property got a setter");
}

#[test_case(Mode::Declaration ; "declaration")]
#[test_case(Mode::Implementation ; "implementation")]
#[test_case(Mode::AllInOne ; "all in one")]
fn test_server_registers_every_function(mode: Mode) {
    let document = read_fixture("bank.json");
    let text = generate(&document, mode, Role::Server);
    let registered = text.contains(r#"_functions["swap"].data["ARG:a|b|c"]"#);
    assert_eq!(registered, mode != Mode::Declaration, "{text}");
    if mode != Mode::Declaration {
        assert!(text.contains(r#"_functions["_dispose_object"]"#));
        assert!(text.contains(r#"_functions["limit"].data["set"]"#));
        assert!(!text.contains(r#"_functions["owner"].data["set"]"#));
        assert!(text.contains("NotSupportedMarshallingVersion"));
    }
}

#[test]
fn test_every_context_generates() {
    for filename in ["calc.json", "bank.json", "services.json"] {
        let document = read_fixture(filename);
        for ctx in EmissionContext::all() {
            let result = CppCodeGen::json_stl(Box::new(StandardHelper::cpp())).generate(&document, ctx);
            assert!(result.is_ok(), "{filename} {ctx}: {:?}", result.err());
        }
    }
}

#[test]
fn test_generation_is_deterministic() {
    let document = read_fixture("bank.json");
    for ctx in EmissionContext::all() {
        assert_eq!(
            generate(&document, ctx.mode, ctx.role),
            generate(&document, ctx.mode, ctx.role)
        );
    }
}

#[test]
fn test_contexts_generate_concurrently() {
    let document = read_fixture("bank.json");
    let expected: Vec<String> = EmissionContext::all()
        .map(|ctx| generate(&document, ctx.mode, ctx.role))
        .collect();
    let actual: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = EmissionContext::all()
            .map(|ctx| {
                let document = &document;
                scope.spawn(move || generate(document, ctx.mode, ctx.role))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(actual, expected);
}

mod calc {
    use super::*;

    #[test]
    fn test_server_declaration_is_pure_virtual() {
        let text = generate(&read_fixture("calc.json"), Mode::Declaration, Role::Server);
        assert!(
            text.contains("virtual long long add(const long long & a, const long long & b) = 0;"),
            "{text}"
        );
        assert!(!text.contains("_functions[\"add\"]"));
    }

    #[test]
    fn test_server_implementation_registers_closure() {
        let text = generate(&read_fixture("calc.json"), Mode::Implementation, Role::Server);
        assert!(text.contains(r#"_functions["add"].data["ARG:a|b"] = [&]"#), "{text}");
        assert!(text.contains("long long _arg_a;"));
        assert!(text.contains("long long _arg_b;"));
        assert!(text.contains(r#"_getValue(*aa, "a", _arg_a, ec)"#));
        assert!(text.contains(r#"_getValue(*aa, "b", _arg_b, ec)"#));
        assert!(text.contains("retval = _that->add(_arg_a, _arg_b);"));
        assert!(text.contains(r#"_addValue(ret, ret, "retval", retval);"#));
        assert_eq!(signatures(&text, "add"), 0);
    }

    #[test]
    fn test_client_all_in_one_has_inline_body() {
        let text = generate(&read_fixture("calc.json"), Mode::AllInOne, Role::Client);
        let signature = "long long add(const long long & a, const long long & b)";
        let start = text.find(signature).unwrap_or_else(|| panic!("{text}"));
        let body = &text[start..];
        assert!(body[signature.len()..].trim_start().starts_with('{'));
        assert!(body.contains(r#"_addValue(_doc, _doc, "version", 2);"#));
        assert!(body.contains(r#"_addValue(_doc, _v, "name", "add");"#));
        assert!(body.contains(r#"_addValue(_doc, _v, "variant", "ARG:a|b");"#));
        assert!(body.contains(r#"_addValue(_doc, _aa, "a", a);"#));
        assert!(body.contains(r#"addValue(_doc, _doc, "function", _v);"#));
        assert!(body.contains("_invokeCall(_doc, _ret, _ec)"));
        assert!(body.contains(r#"_getValue(_ret, "retval", _retval, _ec)"#));
        assert!(body.contains("return _retval;"));
        assert_eq!(signatures(&text, "add"), 1);
    }

    #[test]
    fn test_client_declaration_has_no_body() {
        let text = generate(&read_fixture("calc.json"), Mode::Declaration, Role::Client);
        assert!(text.contains("long long add(const long long & a, const long long & b);"));
        assert!(!text.contains("_invokeCall(_doc"));
    }
}

mod layout {
    use super::*;

    #[test]
    fn test_includes_and_core_path() {
        let helper = StandardHelper::cpp()
            .with_includes(vec![Include::local("stdafx.h")])
            .with_core_include_path(Include::local("runtime"));
        let text = CppCodeGen::json_stl(Box::new(helper))
            .generate(&read_fixture("calc.json"), EmissionContext::new(Mode::Declaration, Role::Client))
            .unwrap();
        let first = text.lines().next().unwrap();
        assert_eq!(first, "#include \"stdafx.h\"");
        assert!(text.contains("#include \"runtime/nullable.h\""));
        assert!(!text.contains("#include <functional>"));
    }

    #[test]
    fn test_module_info_constants() {
        let text = generate(&read_fixture("services.json"), Mode::Declaration, Role::Client);
        assert!(text.contains("namespace Services {"));
        assert!(text.contains(r#"static constexpr const char * version = "1.0";"#));
        assert!(text.contains(r#"static constexpr const char * build_date = "2026-10-19";"#));
    }

    #[test]
    fn test_prebuilt_structure_emitted_once() {
        let text = generate(&read_fixture("bank.json"), Mode::Declaration, Role::Client);
        assert_eq!(text.matches("struct _Prebuilt1").count(), 1, "{text}");
        assert!(text.contains("struct Point"));
        assert!(text.contains("typedef nullable<double> Balance;"));
    }

    #[test]
    fn test_in_class_names_are_unqualified() {
        let document = read_fixture("bank.json");
        for mode in [Mode::Declaration, Mode::AllInOne] {
            let text = generate(&document, mode, Role::Client);
            assert!(text.contains("/*in-out*/ Point & b"), "{mode:?}\n{text}");
            assert!(text.contains("Account::Ptr open(const string & owner)"), "{mode:?}");
            assert!(text.contains("Account::Card::Ptr card()"), "{mode:?}");
            assert!(text.contains("const _Prebuilt1 & amount"), "{mode:?}");
            assert!(!text.contains("Bank::Point"), "{mode:?}");
            assert!(!text.contains("Bank::Account::Ptr"), "{mode:?}");
        }
    }

    #[test]
    fn test_out_of_line_names_are_qualified() {
        let text = generate(&read_fixture("bank.json"), Mode::Implementation, Role::Client);
        assert!(text.contains("/*in-out*/ Bank::Point & b"), "{text}");
        assert!(text.contains("Bank::Account::Ptr Bank::open(const string & owner)"));
        assert!(text.contains("Bank::Account::Card::Ptr Bank::Account::card()"));
        assert!(text.contains("const Bank::_Prebuilt1 & amount"));
    }

    #[test]
    fn test_object_classes() {
        let text = generate(&read_fixture("bank.json"), Mode::Declaration, Role::Client);
        assert!(text.contains("class Account : public _Object"));
        assert!(text.contains("class Card : public _Object"));
        assert!(text.contains("typedef std::shared_ptr<Account> Ptr;"));
    }
}
