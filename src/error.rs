use miette::{Diagnostic, NamedSource, SourceSpan};
use std::fmt::{self, Display};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum PidlError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Reader(#[from] ReaderError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Codegen(#[from] CodegenError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

/// Failures while turning a serialized interface description into the AST.
///
/// Every variant except `Parse` carries a dotted `path` locating the
/// offending element, e.g. `Calc.Account.owner`.
#[derive(Error, Debug, Diagnostic, Clone)]
#[error("Reader Error")]
pub enum ReaderError {
    #[error("Malformed source document: {message}")]
    #[diagnostic(
        code(reader::parse),
        help("The document is not well-formed. Fix the syntax error before it can be read.")
    )]
    Parse {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("syntax error here")]
        span: SourceSpan,
    },

    #[error("{path}: type '{name}' is not found in '{registry}'")]
    #[diagnostic(
        code(reader::type_not_found),
        help("Declare the type before using it. Only objects may be referenced ahead of their definition.")
    )]
    TypeNotFound {
        path: String,
        name: String,
        registry: String,
    },

    #[error("{path}: name '{name}' is already registered")]
    #[diagnostic(
        code(reader::duplicate_name),
        help("Definition names must be unique within one interface or object body.")
    )]
    DuplicateName { path: String, name: String },

    #[error("{path}: name '{name}' is already registered as embedded type")]
    #[diagnostic(
        code(reader::shadows_embedded_type),
        help("Embedded type names (integer, float, string, datetime, void, boolean, blob) cannot be redefined.")
    )]
    ShadowsEmbeddedType { path: String, name: String },

    #[error("{path}: name '{name}' variant id '{variant}' is already registered")]
    #[diagnostic(
        code(reader::duplicate_variant),
        help("Overloads of one function must differ in their argument names.")
    )]
    VariantExists {
        path: String,
        name: String,
        variant: String,
    },

    #[error("{path}: object '{name}' has been already registered")]
    #[diagnostic(
        code(reader::object_already_defined),
        help("An object body can be given only once.")
    )]
    ObjectAlreadyDefined { path: String, name: String },

    #[error("{path}: {message}")]
    #[diagnostic(code(reader::malformed_definition))]
    MalformedDefinition { path: String, message: String },

    #[error("{path}: nature '{nature}' is invalid")]
    #[diagnostic(
        code(reader::invalid_nature),
        help("Interfaces accept typedef, object and function entries; objects accept typedef, object, property and method entries.")
    )]
    InvalidNature { path: String, nature: String },

    #[error("object '{name}' is declared but its body was never read")]
    #[diagnostic(code(reader::undefined_object))]
    UndefinedObject { name: String },
}

impl ReaderError {
    /// True for every error reporting a name collision within one scope.
    #[must_use]
    pub fn is_duplicate_name(&self) -> bool {
        matches!(
            self,
            ReaderError::DuplicateName { .. }
                | ReaderError::ShadowsEmbeddedType { .. }
                | ReaderError::VariantExists { .. }
                | ReaderError::ObjectAlreadyDefined { .. }
        )
    }

    pub(crate) fn malformed(path: impl Into<String>, message: impl Into<String>) -> Self {
        ReaderError::MalformedDefinition {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
#[error("Codegen Error")]
pub enum CodegenError {
    #[error("{path}: {message}")]
    #[diagnostic(
        code(codegen::unsupported_construct),
        help("The selected target language cannot express this construct.")
    )]
    UnsupportedConstruct { path: String, message: String },

    #[error("failed to format generated code")]
    #[diagnostic(code(codegen::format))]
    Format,

    #[error("failed to write generated code: {message}")]
    #[diagnostic(code(codegen::io))]
    GenerationIo { message: String },
}

impl From<fmt::Error> for CodegenError {
    fn from(_: fmt::Error) -> Self {
        CodegenError::Format
    }
}

impl From<std::io::Error> for CodegenError {
    fn from(err: std::io::Error) -> Self {
        CodegenError::GenerationIo {
            message: err.to_string(),
        }
    }
}

#[derive(Error, Debug, Diagnostic, Clone)]
#[error("Config Error")]
pub enum ConfigError {
    #[error("invalid JSON configuration: {message}")]
    #[diagnostic(code(config::json))]
    Json { message: String },

    #[error("invalid YAML configuration: {message}")]
    #[diagnostic(code(config::yaml))]
    Yaml { message: String },
}

/// Accumulates rendered error messages across several operations.
///
/// Each reader or generator call still stops at its own first failure;
/// the collector only keeps what every failed step reported.
#[derive(Debug, Default, Clone)]
pub struct ErrorCollector {
    messages: Vec<String>,
}

impl ErrorCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Records the error of a failed result and hands back the success value.
    pub fn collect<T, E: Display>(&mut self, result: Result<T, E>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.push(err.to_string());
                None
            }
        }
    }

    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

impl Display for ErrorCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, message) in self.messages.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{message}")?;
        }
        Ok(())
    }
}
