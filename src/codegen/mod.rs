//! Code generation: walks a read-only [`Document`] and renders C++ or C#
//! marshalling stubs for one [`EmissionContext`].
//!
//! The language dispatchers (`cpp`, `cs`) decide the layout of classes,
//! signatures and sections; what goes inside bodies is delegated to a
//! marshalling backend (`json_stl`, `json_cs`).

pub mod context;
pub mod cpp;
pub mod cs;
pub mod documentation;
pub mod helper;
pub mod json_cs;
pub mod json_stl;
pub mod logging;
pub mod prebuilt;

use crate::ast::Document;
use crate::error::CodegenError;

pub use context::{CodeWriter, EmissionContext, Mode, Role};
pub use cpp::{CppCodeGen, CppMarshalling};
pub use cs::{CsCodeGen, CsMarshalling};
pub use helper::{CodeGenHelper, Include, IncludeKind, StandardHelper, TabDefinition};
pub use json_cs::JsonCs;
pub use json_stl::JsonStl;

/// Version stamped into every request envelope and checked by the
/// generated server dispatcher.
pub const MARSHALLING_VERSION: u32 = 2;

/// A complete generator for one target language and marshalling backend.
pub trait CodeGen {
    /// Renders the whole document for one Mode/Role pair.
    ///
    /// # Errors
    /// Returns a [`CodegenError`] for constructs the target cannot express.
    /// Nothing is returned on failure, so callers never see partial output.
    fn generate(&self, document: &Document, ctx: EmissionContext) -> Result<String, CodegenError>;
}

/// Turns an arbitrary key into a valid C-family identifier.
pub(crate) fn identifier(key: &str) -> String {
    let mut out: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Quotes text as a C/C# string literal.
pub(crate) fn string_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier() {
        assert_eq!(identifier("build-date"), "build_date");
        assert_eq!(identifier("2nd"), "_2nd");
        assert_eq!(identifier(""), "_");
    }

    #[test]
    fn test_string_literal() {
        assert_eq!(string_literal("a \"b\"\n"), "\"a \\\"b\\\"\\n\"");
    }
}
