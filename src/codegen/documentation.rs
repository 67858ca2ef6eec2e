use super::context::CodeWriter;
use crate::ast::{Argument, DetailKind, Direction, Documentation};
use crate::utils::{clean_line, single_line};
use std::fmt::Debug;

/// Where a comment is placed relative to the documented element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Place {
    Before,
    After,
}

/// An element that carries documentation, tagged with what the styles
/// need to know about it.
#[derive(Debug, Clone, Copy)]
pub enum Documented<'a> {
    Plain(&'a Documentation),
    Function {
        documentation: &'a Documentation,
        arguments: &'a [Argument],
    },
    Argument {
        documentation: &'a Documentation,
        direction: Direction,
    },
}

impl<'a> Documented<'a> {
    pub fn documentation(&self) -> &'a Documentation {
        match self {
            Documented::Plain(documentation)
            | Documented::Function { documentation, .. }
            | Documented::Argument { documentation, .. } => documentation,
        }
    }

    fn is_argument(&self) -> bool {
        matches!(self, Documented::Argument { .. })
    }
}

/// A comment convention. Styles are stateless; `write` is called at both
/// places around every documented element and decides itself what to emit.
pub trait DocumentationStyle: Debug {
    fn write(&self, w: &mut CodeWriter, level: usize, item: Documented<'_>, place: Place);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VoidDocumentation;

impl DocumentationStyle for VoidDocumentation {
    fn write(&self, _: &mut CodeWriter, _: usize, _: Documented<'_>, _: Place) {}
}

/// Plain `/* ... */` blocks, arguments get a trailing `//` comment.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicDocumentation;

impl DocumentationStyle for BasicDocumentation {
    fn write(&self, w: &mut CodeWriter, level: usize, item: Documented<'_>, place: Place) {
        let doc = item.documentation();
        if doc.is_empty() {
            return;
        }

        match place {
            Place::Before if !item.is_argument() => {
                let write_lines = |w: &mut CodeWriter, title: &str, text: &str| {
                    if !title.is_empty() {
                        w.line(level, format!(" * {title}"));
                    }
                    for line in text.split('\n') {
                        w.line(level, format!(" * {}", clean_line(line)));
                    }
                };

                w.blank();
                w.line(level, "/*");
                if !doc.brief.is_empty() {
                    write_lines(w, "", &doc.brief);
                }
                if let Some(description) = doc.detail(DetailKind::Description) {
                    write_lines(w, "Description:", description);
                }
                if let (Documented::Function { .. }, Some(ret)) =
                    (item, doc.detail(DetailKind::Return))
                {
                    write_lines(w, "Return:", ret);
                }
                w.line(level, " */");
            }
            Place::After if item.is_argument() => {
                w.text(format!(" // {}\n", single_line(&doc.brief)));
                w.indent(level + 1);
            }
            _ => {}
        }
    }
}

/// Doxygen `/*! @brief ... */` blocks with `@param[dir]` entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct DoxygenDocumentation;

impl DocumentationStyle for DoxygenDocumentation {
    fn write(&self, w: &mut CodeWriter, level: usize, item: Documented<'_>, place: Place) {
        let doc = item.documentation();
        if doc.is_empty() || place == Place::After || item.is_argument() {
            return;
        }

        w.blank();
        match doc.detail(DetailKind::Group) {
            Some(group) => w.line(level, format!("/*! @ingroup {}", single_line(group))),
            None => w.line(level, "/*!"),
        }
        if !doc.brief.is_empty() {
            w.line(level, format!(" * @brief {}", single_line(&doc.brief)));
        }
        if let Some(description) = doc.detail(DetailKind::Description) {
            for line in description.split('\n') {
                w.line(level, format!(" * {}", clean_line(line)));
            }
        }
        if let Documented::Function { arguments, .. } = item {
            if let Some(ret) = doc.detail(DetailKind::Return) {
                w.line(level, format!(" * @return {}", single_line(ret)));
            }
            for argument in arguments {
                let direction = match argument.direction {
                    Direction::In => "in",
                    Direction::Out => "out",
                    Direction::InOut => "in,out",
                };
                w.line(
                    level,
                    format!(
                        " * @param[{direction}] {} {}",
                        argument.name,
                        single_line(&argument.documentation.brief)
                    ),
                );
            }
        }
        w.line(level, " */");
    }
}

/// .NET XML doc comments (`/// <summary>`).
#[derive(Debug, Clone, Copy, Default)]
pub struct DotNetDocumentation;

impl DotNetDocumentation {
    fn write_lines(w: &mut CodeWriter, level: usize, text: &str) {
        for line in text.split('\n') {
            w.line(level, format!("/// {}", line.replace('\r', "")));
        }
    }

    fn write_tagged(w: &mut CodeWriter, level: usize, tag: &str, text: &str) {
        w.line(level, format!("/// <{tag}>"));
        Self::write_lines(w, level, text);
        w.line(level, format!("/// </{tag}>"));
    }
}

impl DocumentationStyle for DotNetDocumentation {
    fn write(&self, w: &mut CodeWriter, level: usize, item: Documented<'_>, place: Place) {
        let doc = item.documentation();
        if doc.is_empty() || place == Place::After || item.is_argument() {
            return;
        }

        w.blank();
        if !doc.brief.is_empty() {
            Self::write_tagged(w, level, "summary", &doc.brief);
        }
        if let Some(description) = doc.detail(DetailKind::Description) {
            Self::write_tagged(w, level, "remarks", description);
        }
        if let Documented::Function { arguments, .. } = item {
            if let Some(ret) = doc.detail(DetailKind::Return) {
                Self::write_tagged(w, level, "returns", ret);
            }
            for argument in arguments {
                let brief = &argument.documentation.brief;
                if brief.contains('\n') {
                    w.line(level, format!("/// <param name=\"{}\">", argument.name));
                    Self::write_lines(w, level, brief);
                    w.line(level, "/// </param>");
                } else {
                    w.line(
                        level,
                        format!("/// <param name=\"{}\">{brief}</param>", argument.name),
                    );
                }
            }
        }
    }
}
