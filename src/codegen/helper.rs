use super::documentation::{DocumentationStyle, VoidDocumentation};
use super::logging::{LoggingStyle, VoidLogging};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncludeKind {
    #[default]
    Global,
    Local,
}

/// One `#include` line, rendered as `<path>` or `"path"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Include {
    #[serde(default)]
    pub kind: IncludeKind,
    pub path: String,
}

impl Include {
    pub fn global(path: impl Into<String>) -> Self {
        Include {
            kind: IncludeKind::Global,
            path: path.into(),
        }
    }

    pub fn local(path: impl Into<String>) -> Self {
        Include {
            kind: IncludeKind::Local,
            path: path.into(),
        }
    }

    /// A file below this include used as a directory prefix.
    #[must_use]
    pub fn join(&self, file: &str) -> Include {
        let path = if self.path.is_empty() {
            file.to_string()
        } else {
            format!("{}/{file}", self.path.trim_end_matches('/'))
        };
        Include {
            kind: self.kind,
            path,
        }
    }

    #[must_use]
    pub fn render(&self) -> String {
        match self.kind {
            IncludeKind::Global => format!("#include <{}>", self.path),
            IncludeKind::Local => format!("#include \"{}\"", self.path),
        }
    }
}

/// Indentation unit: `length` repetitions of `character`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabDefinition {
    pub length: usize,
    pub character: char,
}

impl TabDefinition {
    #[must_use]
    pub fn tabs() -> Self {
        TabDefinition {
            length: 1,
            character: '\t',
        }
    }

    #[must_use]
    pub fn spaces(length: usize) -> Self {
        TabDefinition {
            length,
            character: ' ',
        }
    }

    #[must_use]
    pub fn unit(&self) -> String {
        std::iter::repeat(self.character).take(self.length).collect()
    }
}

/// Target-independent settings injected into a generator.
pub trait CodeGenHelper: Debug {
    fn tab(&self) -> TabDefinition;
    fn documentation(&self) -> &dyn DocumentationStyle;
    fn logging(&self) -> &dyn LoggingStyle;
    /// Extra includes emitted before the generator's own (C++ only).
    fn includes(&self) -> &[Include];
    /// Directory holding the runtime headers.
    fn core_include_path(&self) -> Include;
    /// Namespace wrapping the whole output (C# only).
    fn namespace(&self) -> Option<&str>;
}

#[derive(Debug)]
pub struct StandardHelper {
    tab: TabDefinition,
    documentation: Box<dyn DocumentationStyle>,
    logging: Box<dyn LoggingStyle>,
    includes: Vec<Include>,
    core_include_path: Include,
    namespace: Option<String>,
}

impl StandardHelper {
    /// Defaults for C++ output: one tab, runtime headers under `<pidlCore/...>`.
    #[must_use]
    pub fn cpp() -> Self {
        StandardHelper {
            tab: TabDefinition::tabs(),
            documentation: Box::new(VoidDocumentation),
            logging: Box::new(VoidLogging),
            includes: Vec::new(),
            core_include_path: Include::global("pidlCore"),
            namespace: None,
        }
    }

    /// Defaults for C# output: four spaces.
    #[must_use]
    pub fn cs() -> Self {
        StandardHelper {
            tab: TabDefinition::spaces(4),
            ..Self::cpp()
        }
    }

    #[must_use]
    pub fn with_tab(mut self, tab: TabDefinition) -> Self {
        self.tab = tab;
        self
    }

    #[must_use]
    pub fn with_documentation(mut self, documentation: Box<dyn DocumentationStyle>) -> Self {
        self.documentation = documentation;
        self
    }

    #[must_use]
    pub fn with_logging(mut self, logging: Box<dyn LoggingStyle>) -> Self {
        self.logging = logging;
        self
    }

    #[must_use]
    pub fn with_includes(mut self, includes: Vec<Include>) -> Self {
        self.includes = includes;
        self
    }

    #[must_use]
    pub fn with_core_include_path(mut self, include: Include) -> Self {
        self.core_include_path = include;
        self
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }
}

impl CodeGenHelper for StandardHelper {
    fn tab(&self) -> TabDefinition {
        self.tab
    }

    fn documentation(&self) -> &dyn DocumentationStyle {
        self.documentation.as_ref()
    }

    fn logging(&self) -> &dyn LoggingStyle {
        self.logging.as_ref()
    }

    fn includes(&self) -> &[Include] {
        &self.includes
    }

    fn core_include_path(&self) -> Include {
        self.core_include_path.clone()
    }

    fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}
