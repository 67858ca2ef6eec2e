//! Generator configuration, loadable from JSON or YAML.
//!
//! ```yaml
//! target: cs
//! role: server
//! documentation: dotnet
//! logging: trace_source
//! namespace: Bank.Remote
//! ```

use crate::codegen::documentation::{
    BasicDocumentation, DocumentationStyle, DotNetDocumentation, DoxygenDocumentation,
    VoidDocumentation,
};
use crate::codegen::logging::{LoggingStyle, MacroLogging, TraceSourceLogging, VoidLogging};
use crate::codegen::{
    CodeGen, CodeGenHelper, CppCodeGen, CsCodeGen, EmissionContext, Include, Mode, Role,
    StandardHelper, TabDefinition,
};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    #[default]
    Cpp,
    Cs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentationKind {
    #[default]
    None,
    Basic,
    Doxygen,
    Dotnet,
}

impl DocumentationKind {
    fn style(self) -> Box<dyn DocumentationStyle> {
        match self {
            DocumentationKind::None => Box::new(VoidDocumentation),
            DocumentationKind::Basic => Box::new(BasicDocumentation),
            DocumentationKind::Doxygen => Box::new(DoxygenDocumentation),
            DocumentationKind::Dotnet => Box::new(DotNetDocumentation),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoggingKind {
    #[default]
    None,
    Macro,
    TraceSource,
}

impl LoggingKind {
    fn style(self) -> Box<dyn LoggingStyle> {
        match self {
            LoggingKind::None => Box::new(VoidLogging),
            LoggingKind::Macro => Box::new(MacroLogging),
            LoggingKind::TraceSource => Box::new(TraceSourceLogging),
        }
    }
}

/// Everything needed to set up one generator run.
///
/// Missing fields take their defaults, so an empty document is a valid
/// configuration for C++ all-in-one client output.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub target: Target,
    pub mode: Mode,
    pub role: Role,
    /// Falls back to one tab for C++ and four spaces for C#.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab: Option<TabDefinition>,
    pub includes: Vec<Include>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core_include_path: Option<Include>,
    pub documentation: DocumentationKind,
    pub logging: LoggingKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl GeneratorConfig {
    /// # Errors
    /// Returns [`ConfigError::Json`] when the text is not a valid configuration.
    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(source).map_err(|err| ConfigError::Json {
            message: err.to_string(),
        })
    }

    /// # Errors
    /// Returns [`ConfigError::Yaml`] when the text is not a valid configuration.
    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(source).map_err(|err| ConfigError::Yaml {
            message: err.to_string(),
        })
    }

    #[must_use]
    pub fn context(&self) -> EmissionContext {
        EmissionContext::new(self.mode, self.role)
    }

    #[must_use]
    pub fn build_helper(&self) -> Box<dyn CodeGenHelper> {
        let mut helper = match self.target {
            Target::Cpp => StandardHelper::cpp(),
            Target::Cs => StandardHelper::cs(),
        };
        if let Some(tab) = self.tab {
            helper = helper.with_tab(tab);
        }
        if let Some(include) = &self.core_include_path {
            helper = helper.with_core_include_path(include.clone());
        }
        Box::new(
            helper
                .with_includes(self.includes.clone())
                .with_documentation(self.documentation.style())
                .with_logging(self.logging.style())
                .with_namespace(self.namespace.clone()),
        )
    }

    /// The JSON marshalling generator for the configured target.
    #[must_use]
    pub fn build_codegen(&self) -> Box<dyn CodeGen> {
        let helper = self.build_helper();
        match self.target {
            Target::Cpp => Box::new(CppCodeGen::json_stl(helper)),
            Target::Cs => Box::new(CsCodeGen::json_cs(helper)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::IncludeKind;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = GeneratorConfig::from_json_str("{}").unwrap();
        assert_eq!(config, GeneratorConfig::default());
        assert_eq!(config.context(), EmissionContext::new(Mode::AllInOne, Role::Client));
        assert_eq!(config.build_helper().tab(), TabDefinition::tabs());
    }

    #[test]
    fn test_cs_defaults_to_four_spaces() {
        let config = GeneratorConfig::from_json_str(r#"{ "target": "cs" }"#).unwrap();
        let helper = config.build_helper();
        assert_eq!(helper.tab(), TabDefinition::spaces(4));
        assert!(helper.namespace().is_none());
    }

    #[test]
    fn test_yaml_configuration() {
        let source = "
target: cs
mode: declaration
role: server
tab:
  length: 2
  character: ' '
documentation: dotnet
logging: trace_source
namespace: Bank.Remote
";
        let config = GeneratorConfig::from_yaml_str(source).unwrap();
        assert_eq!(config.target, Target::Cs);
        assert_eq!(config.context(), EmissionContext::new(Mode::Declaration, Role::Server));
        let helper = config.build_helper();
        assert_eq!(helper.tab(), TabDefinition::spaces(2));
        assert_eq!(helper.namespace(), Some("Bank.Remote"));
        assert!(helper.logging().is_enabled());
    }

    #[test]
    fn test_includes_and_core_path() {
        let source = r#"{
            "includes": [ { "kind": "local", "path": "stdafx.h" } ],
            "core_include_path": { "path": "vendor/pidl" },
            "logging": "macro"
        }"#;
        let config = GeneratorConfig::from_json_str(source).unwrap();
        let helper = config.build_helper();
        assert_eq!(helper.includes(), &[Include::local("stdafx.h")]);
        let core = helper.core_include_path();
        assert_eq!(core.kind, IncludeKind::Global);
        assert_eq!(core.join("nullable.h").render(), "#include <vendor/pidl/nullable.h>");
        assert_eq!(helper.logging().logger_type(), MacroLogging.logger_type());
    }

    #[test]
    fn test_invalid_json_is_reported() {
        let err = GeneratorConfig::from_json_str(r#"{ "target": "java" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json { .. }));
        assert!(err.to_string().starts_with("invalid JSON configuration"));
    }

    #[test]
    fn test_invalid_yaml_is_reported() {
        let err = GeneratorConfig::from_yaml_str("role: [client").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }

    #[test]
    fn test_serialized_config_reads_back() {
        let config = GeneratorConfig {
            target: Target::Cs,
            namespace: Some("Remote".into()),
            ..GeneratorConfig::default()
        };
        let text = serde_json::to_string(&config).unwrap();
        assert_eq!(GeneratorConfig::from_json_str(&text).unwrap(), config);
    }
}
