use serde::{Deserialize, Serialize};
use std::fmt;

/// Which part of a split header/source pair is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Declaration,
    Implementation,
    #[default]
    AllInOne,
}

/// Which side of the call boundary the code is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Client,
    Server,
}

/// The immutable (Mode, Role) pair threaded through one generation walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EmissionContext {
    pub mode: Mode,
    pub role: Role,
}

impl EmissionContext {
    #[must_use]
    pub fn new(mode: Mode, role: Role) -> Self {
        EmissionContext { mode, role }
    }

    #[must_use]
    pub fn is_client(&self) -> bool {
        self.role == Role::Client
    }

    #[must_use]
    pub fn is_server(&self) -> bool {
        self.role == Role::Server
    }

    /// Every Mode x Role combination.
    pub fn all() -> impl Iterator<Item = EmissionContext> {
        [Mode::Declaration, Mode::Implementation, Mode::AllInOne]
            .into_iter()
            .flat_map(|mode| {
                [Role::Client, Role::Server]
                    .into_iter()
                    .map(move |role| EmissionContext::new(mode, role))
            })
    }
}

impl fmt::Display for EmissionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}", self.mode, self.role)
    }
}

/// Buffered text sink for generated code.
///
/// Generation renders into memory first so that a failed walk never leaves
/// half a file behind in the caller's sink.
#[derive(Debug, Clone)]
pub struct CodeWriter {
    buffer: String,
    tab: String,
}

impl CodeWriter {
    pub fn new(tab: impl Into<String>) -> Self {
        CodeWriter {
            buffer: String::new(),
            tab: tab.into(),
        }
    }

    pub fn indent(&mut self, level: usize) {
        for _ in 0..level {
            self.buffer.push_str(&self.tab);
        }
    }

    /// Writes one indented line.
    pub fn line(&mut self, level: usize, text: impl AsRef<str>) {
        self.indent(level);
        self.buffer.push_str(text.as_ref());
        self.buffer.push('\n');
    }

    pub fn blank(&mut self) {
        self.buffer.push('\n');
    }

    /// Appends text without indentation or line break.
    pub fn text(&mut self, text: impl AsRef<str>) {
        self.buffer.push_str(text.as_ref());
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.buffer
    }
}

impl fmt::Write for CodeWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.buffer.push_str(s);
        Ok(())
    }
}
