pub mod ast;
pub mod codegen;
pub mod config;
pub mod error;
pub mod json_reader;
pub mod reader;
pub mod resolver;
pub mod utils;
pub mod xml_reader;
pub mod api;
mod serialization;

pub use api::{read_json, read_xml, to_json, CodeGenWriter, JsonWriter, Pipeline, Writer};
pub use ast::Document;
pub use config::GeneratorConfig;
pub use error::{CodegenError, ConfigError, ErrorCollector, PidlError, ReaderError};
pub use reader::Reader;
pub use serialization::Value;
