// End-to-end runs: configuration, readers, writers and the error collector
use pidl_core::json_reader::JsonReader;
use pidl_core::xml_reader::XmlReader;
use pidl_core::{CodeGenWriter, ErrorCollector, GeneratorConfig, JsonWriter, Pipeline};
use std::fs;
use std::path::PathBuf;

fn read_test_file(filename: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(filename);
    fs::read_to_string(&path).unwrap_or_else(|_| panic!("Failed to read test file: {path:?}"))
}

#[test]
fn test_header_and_source_from_one_read() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = Pipeline::new();
    assert!(pipeline.read("bank", &JsonReader::new_with_name(read_test_file("bank.json"), "bank.json")));

    let header = GeneratorConfig::from_yaml_str("mode: declaration\nrole: server\n").unwrap();
    let source = GeneratorConfig::from_yaml_str("mode: implementation\nrole: server\n").unwrap();
    let header_path = dir.path().join("bank.h");
    let source_path = dir.path().join("bank.cpp");
    assert!(pipeline.write_file("bank", &CodeGenWriter::from_config(&header), &header_path));
    assert!(pipeline.write_file("bank", &CodeGenWriter::from_config(&source), &source_path));
    assert!(pipeline.errors().is_empty(), "{}", pipeline.errors());

    let header = fs::read_to_string(header_path).unwrap();
    let source = fs::read_to_string(source_path).unwrap();
    assert!(header.contains("class Bank"));
    assert!(source.contains("Bank::Bank()"));
}

#[test]
fn test_failed_generation_leaves_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let wide = r#"{ "name": "Wide", "nature": "interface", "body": [
        { "name": "get", "nature": "function", "type": { "name": "tuple",
          "types": [ "integer", "integer", "integer", "integer",
                     "integer", "integer", "integer", "integer" ] } } ] }"#;
    let config = GeneratorConfig::from_json_str(r#"{ "target": "cs" }"#).unwrap();
    let path = dir.path().join("wide.cs");

    let mut pipeline = Pipeline::new();
    assert!(pipeline.read("wide", &JsonReader::new(wide)));
    assert!(!pipeline.write_file("wide", &CodeGenWriter::from_config(&config), &path));
    assert!(!path.exists());
    assert_eq!(pipeline.errors().len(), 1);
    assert!(pipeline.errors().messages()[0].starts_with("Wide: tuple of 8 elements"));
}

#[test]
fn test_errors_accumulate_across_jobs() {
    let mut pipeline = Pipeline::new();
    assert!(!pipeline.read("a", &JsonReader::new(r#"{ "name": "A" }"#)));
    assert!(!pipeline.read("b", &XmlReader::new("<interface name=\"B\"><body><bogus name=\"x\"/></body></interface>")));
    assert!(pipeline.read("c", &XmlReader::new(read_test_file("bank.xml"))));
    let mut sink = Vec::new();
    assert!(pipeline.write("c", &JsonWriter, &mut sink));

    let errors: ErrorCollector = pipeline.into_errors();
    assert_eq!(errors.len(), 2);
    let text = errors.to_string();
    assert_eq!(text.lines().count(), 2);
    assert!(text.lines().nth(1).unwrap().contains("nature 'bogus' is invalid"));
}

#[test]
fn test_json_writer_output_reads_back() {
    let mut pipeline = Pipeline::new();
    assert!(pipeline.read("services", &JsonReader::new(read_test_file("services.json"))));
    let mut sink = Vec::new();
    assert!(pipeline.write("services", &JsonWriter, &mut sink));

    let text = String::from_utf8(sink).unwrap();
    assert!(pipeline.read("again", &JsonReader::new(text)));
    assert_eq!(pipeline.document("again"), pipeline.document("services"));
}
