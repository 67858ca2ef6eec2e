use crate::ast::Document;
use crate::codegen::{CodeGen, EmissionContext};
use crate::config::GeneratorConfig;
use crate::error::{CodegenError, ErrorCollector, PidlError, ReaderError};
use crate::json_reader::JsonReader;
use crate::reader::Reader;
use crate::serialization::{to_value, Value};
use crate::xml_reader::XmlReader;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Reads a JSON interface description.
///
/// `file_name` only labels diagnostics.
///
/// # Errors
/// Returns the first parse, structure or resolution error.
pub fn read_json(source: &str, file_name: &str) -> Result<Document, ReaderError> {
    JsonReader::new_with_name(source, file_name).read()
}

/// Reads an XML interface description.
///
/// # Errors
/// Returns the first parse, structure or resolution error.
pub fn read_xml(source: &str, file_name: &str) -> Result<Document, ReaderError> {
    XmlReader::new_with_name(source, file_name).read()
}

/// The JSON reader's input form of a document.
#[must_use]
pub fn to_json_value(document: &Document) -> Value {
    to_value(document)
}

/// Serializes a document into pretty-printed JSON the JSON reader accepts.
///
/// # Errors
/// Returns a `serde_json::Error` if serialization fails.
pub fn to_json(document: &Document) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&to_value(document))
}

/// Renders a read document into a sink.
///
/// Output is produced completely before anything reaches the sink, so a
/// failed generation leaves the sink untouched.
pub trait Writer {
    /// # Errors
    /// Returns the generation failure or the sink's I/O error.
    fn write(&self, document: &Document, sink: &mut dyn Write) -> Result<(), PidlError>;
}

/// Drives a target-language [`CodeGen`] for one Mode/Role pair.
pub struct CodeGenWriter {
    codegen: Box<dyn CodeGen>,
    ctx: EmissionContext,
}

impl CodeGenWriter {
    pub fn new(codegen: Box<dyn CodeGen>, ctx: EmissionContext) -> Self {
        CodeGenWriter { codegen, ctx }
    }

    #[must_use]
    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self::new(config.build_codegen(), config.context())
    }

    #[must_use]
    pub fn context(&self) -> EmissionContext {
        self.ctx
    }
}

impl Writer for CodeGenWriter {
    fn write(&self, document: &Document, sink: &mut dyn Write) -> Result<(), PidlError> {
        let text = self.codegen.generate(document, self.ctx)?;
        sink.write_all(text.as_bytes()).map_err(CodegenError::from)?;
        sink.flush().map_err(CodegenError::from)?;
        Ok(())
    }
}

/// Writes the document back in the JSON reader's input format.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonWriter;

impl Writer for JsonWriter {
    fn write(&self, document: &Document, sink: &mut dyn Write) -> Result<(), PidlError> {
        let text = to_json(document).map_err(|err| CodegenError::GenerationIo {
            message: err.to_string(),
        })?;
        sink.write_all(text.as_bytes()).map_err(CodegenError::from)?;
        writeln!(sink).map_err(CodegenError::from)?;
        Ok(())
    }
}

/// Sequences named reads and the writes that consume them.
///
/// Every step stops at its own first failure; the pipeline records the
/// message and carries on, so one run reports every failed job.
#[derive(Debug, Default)]
pub struct Pipeline {
    documents: BTreeMap<String, Document>,
    errors: ErrorCollector,
}

impl Pipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs a reader and stores its document under `name`.
    pub fn read(&mut self, name: &str, reader: &dyn Reader) -> bool {
        match reader.read() {
            Ok(document) => {
                log::debug!("read '{name}': {} top-level element(s)", document.top_levels().len());
                self.documents.insert(name.to_string(), document);
                true
            }
            Err(err) => {
                log::error!("read '{name}' failed: {err}");
                self.errors.push(err.to_string());
                false
            }
        }
    }

    /// Writes the document previously read under `read_name`.
    pub fn write(&mut self, read_name: &str, writer: &dyn Writer, sink: &mut dyn Write) -> bool {
        let Some(document) = self.documents.get(read_name) else {
            let message = format!("no document was read under the name '{read_name}'");
            log::error!("{message}");
            self.errors.push(message);
            return false;
        };
        match writer.write(document, sink) {
            Ok(()) => true,
            Err(err) => {
                log::error!("write of '{read_name}' failed: {err}");
                self.errors.push(err.to_string());
                false
            }
        }
    }

    /// Like [`Pipeline::write`], into a newly created file.
    ///
    /// The file is only created once generation succeeded.
    pub fn write_file(&mut self, read_name: &str, writer: &dyn Writer, path: &Path) -> bool {
        let mut buffer = Vec::new();
        if !self.write(read_name, writer, &mut buffer) {
            return false;
        }
        let written = File::create(path).and_then(|mut file| file.write_all(&buffer));
        match written {
            Ok(()) => true,
            Err(err) => {
                let err = CodegenError::from(err);
                log::error!("writing '{}' failed: {err}", path.display());
                self.errors.push(format!("{}: {err}", path.display()));
                false
            }
        }
    }

    #[must_use]
    pub fn document(&self, name: &str) -> Option<&Document> {
        self.documents.get(name)
    }

    #[must_use]
    pub fn errors(&self) -> &ErrorCollector {
        &self.errors
    }

    #[must_use]
    pub fn into_errors(self) -> ErrorCollector {
        self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::{CppCodeGen, CsCodeGen, Mode, Role, StandardHelper};
    use crate::config::Target;
    use std::fs;

    const CALC: &str = r#"{
        "name": "Calc", "nature": "interface",
        "body": [
            { "name": "add", "nature": "function", "type": "integer",
              "arguments": [ { "name": "a", "type": "integer" },
                             { "name": "b", "type": "integer" } ] }
        ]
    }"#;

    const CALC_XML: &str = r#"
        <interface name="Calc">
            <body>
                <function name="add" type="integer">
                    <arguments>
                        <argument name="a" type="integer"/>
                        <argument name="b" type="integer"/>
                    </arguments>
                </function>
            </body>
        </interface>"#;

    fn cpp_writer(mode: Mode, role: Role) -> CodeGenWriter {
        CodeGenWriter::new(
            Box::new(CppCodeGen::json_stl(Box::new(StandardHelper::cpp()))),
            EmissionContext::new(mode, role),
        )
    }

    #[test]
    fn test_read_json_and_xml_agree() {
        let from_json = read_json(CALC, "calc.json").unwrap();
        let from_xml = read_xml(CALC_XML, "calc.xml").unwrap();
        assert_eq!(from_json, from_xml);
        assert!(from_json.find_interface("Calc").is_some());
    }

    #[test]
    fn test_to_json_reads_back() {
        let document = read_json(CALC, "calc.json").unwrap();
        let text = to_json(&document).unwrap();
        assert_eq!(read_json(&text, "again.json").unwrap(), document);
    }

    #[test]
    fn test_codegen_writer_writes_generated_code() {
        let document = read_json(CALC, "calc.json").unwrap();
        let mut sink = Vec::new();
        cpp_writer(Mode::AllInOne, Role::Client)
            .write(&document, &mut sink)
            .unwrap();
        let text = String::from_utf8(sink).unwrap();
        assert!(text.contains("class Calc"));
    }

    #[test]
    fn test_writer_from_config() {
        let config = GeneratorConfig {
            target: Target::Cs,
            role: Role::Server,
            ..GeneratorConfig::default()
        };
        let writer = CodeGenWriter::from_config(&config);
        assert_eq!(writer.context().role, Role::Server);

        let document = read_json(CALC, "calc.json").unwrap();
        let mut sink = Vec::new();
        writer.write(&document, &mut sink).unwrap();
        let text = String::from_utf8(sink).unwrap();
        assert!(text.contains("public abstract class Calc"));
    }

    #[test]
    fn test_pipeline_collects_every_failure() {
        let mut pipeline = Pipeline::new();
        assert!(pipeline.read("calc", &JsonReader::new(CALC)));
        assert!(!pipeline.read("broken", &JsonReader::new("{ \"name\": ")));

        let mut sink = Vec::new();
        assert!(!pipeline.write("missing", &JsonWriter, &mut sink));
        assert!(pipeline.write("calc", &JsonWriter, &mut sink));
        assert!(sink.ends_with(b"\n"));

        assert_eq!(pipeline.errors().len(), 2);
        assert!(pipeline.errors().messages()[1].contains("'missing'"));
        assert!(pipeline.document("calc").is_some());
        assert!(pipeline.document("broken").is_none());
    }

    #[test]
    fn test_pipeline_write_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calc.cs");

        let mut pipeline = Pipeline::new();
        assert!(pipeline.read("calc", &XmlReader::new(CALC_XML)));
        let writer = CodeGenWriter::new(
            Box::new(CsCodeGen::json_cs(Box::new(StandardHelper::cs()))),
            EmissionContext::new(Mode::AllInOne, Role::Client),
        );
        assert!(pipeline.write_file("calc", &writer, &path));

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("public long add(long a, long b)"));
        assert!(pipeline.into_errors().is_empty());
    }

    #[test]
    fn test_pipeline_write_file_into_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("calc.h");

        let mut pipeline = Pipeline::new();
        assert!(pipeline.read("calc", &JsonReader::new(CALC)));
        assert!(!pipeline.write_file("calc", &cpp_writer(Mode::Declaration, Role::Client), &path));
        assert_eq!(pipeline.errors().len(), 1);
        assert!(!path.exists());
    }
}
