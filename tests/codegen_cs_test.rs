// C# generation over the shared fixtures
use pidl_core::codegen::documentation::DotNetDocumentation;
use pidl_core::codegen::logging::TraceSourceLogging;
use pidl_core::codegen::{CodeGen, CsCodeGen, EmissionContext, Mode, Role, StandardHelper};
use pidl_core::error::CodegenError;
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

fn generate_with(helper: StandardHelper, document: &Document, role: Role) -> Result<String, CodegenError> {
    CsCodeGen::json_cs(Box::new(helper)).generate(document, EmissionContext::new(Mode::AllInOne, role))
}

fn generate(document: &Document, role: Role) -> String {
    generate_with(StandardHelper::cs(), document, role)
        .unwrap_or_else(|err| panic!("generation failed for {role:?}: {err}"))
}

fn tuple_interface(arity: usize) -> String {
    let types: Vec<&str> = std::iter::repeat("\"integer\"").take(arity).collect();
    format!(
        r#"{{ "name": "Wide", "nature": "interface", "body": [
            {{ "name": "get", "nature": "function",
               "type": {{ "name": "tuple", "types": [ {} ] }} }} ] }}"#,
        types.join(", ")
    )
}

#[test_case(Role::Client ; "client")]
#[test_case(Role::Server ; "server")]
fn test_mode_is_ignored(role: Role) {
    let document = read_fixture("bank.json");
    let codegen = CsCodeGen::json_cs(Box::new(StandardHelper::cs()));
    let reference = codegen
        .generate(&document, EmissionContext::new(Mode::AllInOne, role))
        .unwrap();
    for mode in [Mode::Declaration, Mode::Implementation] {
        let text = codegen.generate(&document, EmissionContext::new(mode, role)).unwrap();
        assert_eq!(text, reference, "{mode:?} differs from AllInOne");
    }
}

#[test_case("calc.json" ; "calc")]
#[test_case("bank.json" ; "bank")]
#[test_case("services.json" ; "services")]
fn test_every_context_generates(filename: &str) {
    let document = read_fixture(filename);
    let codegen = CsCodeGen::json_cs(Box::new(StandardHelper::cs()));
    for ctx in EmissionContext::all() {
        let result = codegen.generate(&document, ctx);
        assert!(result.is_ok(), "{filename} {ctx}: {:?}", result.err());
    }
}

mod client {
    use super::*;

    #[test]
    fn test_usings_come_first() {
        let text = generate(&read_fixture("calc.json"), Role::Client);
        assert!(text.starts_with("using System;"), "{text}");
        assert!(text.contains("public abstract class Calc"));
    }

    #[test]
    fn test_function_with_ref_and_out() {
        let text = generate(&read_fixture("bank.json"), Role::Client);
        assert!(text.contains("public long swap(long a, ref Bank.Point b, out string c)"), "{text}");
        assert!(text.contains("public Bank.Account open(string owner)"));
        assert!(text.contains("public void transfer(Bank.Account source, Bank.Account target, Bank._Prebuilt1 amount)"));
    }

    #[test]
    fn test_types() {
        let text = generate(&read_fixture("bank.json"), Role::Client);
        assert!(text.contains("public Nullable<double> limit"));
        assert!(text.contains("public Tuple<DateTime, double>[] history()"));
        assert!(text.contains("public Bank.Account.Card card()"));
        assert!(text.contains("public struct Point"));
        assert!(text.contains("public struct _Prebuilt1"));
        assert!(!text.contains("struct _Prebuilt0"));
    }

    #[test]
    fn test_objects() {
        let text = generate(&read_fixture("bank.json"), Role::Client);
        assert!(text.contains("public class Account : _IObject"));
        assert!(text.contains("public class Card : _IObject"));
        assert!(text.contains("public Account(Bank intf, string id)"));
        assert!(text.contains("~Account()"));
        assert!(text.contains("_intf._dispose_object(_id);"));
    }

    #[test]
    fn test_read_only_property_has_no_setter() {
        let text = generate(&read_fixture("bank.json"), Role::Client);
        let start = text.find("public string owner").unwrap();
        let end = start + text[start..].find("public Nullable<double> limit").unwrap();
        let owner = &text[start..end];
        assert!(owner.contains("get"));
        assert!(!owner.contains("set"));
    }

    #[test]
    fn test_request_envelope() {
        let text = generate(&read_fixture("calc.json"), Role::Client);
        assert!(text.contains("public long add(long a, long b)"));
        assert!(text.contains(r#"_addValue(_root, "version", 2);"#), "{text}");
        assert!(text.contains(r#""ARG:a|b""#));
    }
}

mod server {
    use super::*;

    #[test]
    fn test_abstract_members() {
        let text = generate(&read_fixture("bank.json"), Role::Server);
        assert!(text.contains("protected abstract long swap(long a, ref Bank.Point b, out string c);"), "{text}");
        assert!(text.contains("public abstract class Account : _IObject"));
        assert!(text.contains("protected abstract string owner { get; }"));
        assert!(text.contains("protected abstract Nullable<double> limit { get; set; }"));
        assert!(!text.contains("~Account()"));
    }

    #[test]
    fn test_dispatch_registration() {
        let text = generate(&read_fixture("bank.json"), Role::Server);
        assert!(text.contains(r#"_register("swap", "ARG:a|b|c", (root, ec) =>"#));
        assert!(text.contains(r#"_register("limit", "get", (root, ec) =>"#));
        assert!(text.contains(r#"_register("limit", "set", (root, ec) =>"#));
        assert!(!text.contains(r#"_register("owner", "set""#));
        assert!(text.contains(r#"_register("_dispose_object", "", (root, ec) =>"#));
    }

    #[test]
    fn test_version_check() {
        let text = generate(&read_fixture("calc.json"), Role::Server);
        assert!(text.contains("if (version != 2)"));
        assert!(text.contains("return _InvokeStatus.NotSupportedMarshallingVersion;"));
    }

    #[test]
    fn test_overloads_share_a_name() {
        let text = generate(&read_fixture("services.json"), Role::Server);
        assert!(text.contains(r#"_register("echo", "ARG:text", (root, ec) =>"#));
        assert!(text.contains(r#"_register("echo", "ARG:text|times", (root, ec) =>"#));
    }

    #[test]
    fn test_logging() {
        let helper = StandardHelper::cs().with_logging(Box::new(TraceSourceLogging));
        let text = generate_with(helper, &read_fixture("calc.json"), Role::Server).unwrap();
        assert!(text.contains("System.Diagnostics.TraceSource"), "{text}");
        assert!(text.contains("TraceEventType"));
    }
}

mod layout {
    use super::*;

    #[test]
    fn test_namespace_wraps_output() {
        let helper = StandardHelper::cs().with_namespace(Some("Remote".into()));
        let text = generate_with(helper, &read_fixture("calc.json"), Role::Client).unwrap();
        let namespace = text.find("namespace Remote").unwrap();
        let class = text.find("public abstract class Calc").unwrap();
        assert!(namespace < class);
        assert!(text.trim_end().ends_with('}'));
    }

    #[test]
    fn test_module_info_class() {
        let text = generate(&read_fixture("services.json"), Role::Client);
        assert!(text.contains("namespace Services"));
        assert!(text.contains("public static class _Info"));
        assert!(text.contains(r#"public const string build_date = "2026-10-19";"#));
        assert!(text.contains(r#"public const string version = "1.0";"#));
    }

    #[test]
    fn test_dotnet_documentation() {
        let helper = StandardHelper::cs().with_documentation(Box::new(DotNetDocumentation));
        let text = generate_with(helper, &read_fixture("bank.json"), Role::Client).unwrap();
        assert!(text.contains("/// <summary>"));
        assert!(text.contains("/// Account management."));
    }
}

mod tuples {
    use super::*;

    #[test]
    fn test_seven_elements_supported() {
        let document = read_json(&tuple_interface(7), "wide.json").unwrap();
        let text = generate(&document, Role::Client);
        assert!(text.contains("public Tuple<long, long, long, long, long, long, long> get()"));
    }

    #[test]
    fn test_eight_elements_rejected() {
        let document = read_json(&tuple_interface(8), "wide.json").unwrap();
        for role in [Role::Client, Role::Server] {
            let err = generate_with(StandardHelper::cs(), &document, role).unwrap_err();
            match err {
                CodegenError::UnsupportedConstruct { path, message } => {
                    assert_eq!(path, "Wide");
                    assert!(message.contains('8'), "{message}");
                }
                other => panic!("unexpected error {other:?}"),
            }
        }
    }

    #[test]
    fn test_cpp_has_no_tuple_limit() {
        use pidl_core::codegen::CppCodeGen;
        let document = read_json(&tuple_interface(8), "wide.json").unwrap();
        let result = CppCodeGen::json_stl(Box::new(StandardHelper::cpp()))
            .generate(&document, EmissionContext::new(Mode::AllInOne, Role::Client));
        assert!(result.is_ok());
    }
}
