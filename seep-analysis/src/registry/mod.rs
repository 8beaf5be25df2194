//! Immutable taint pattern registry.
//!
//! Holds the `(sources, sinks, sanitizers)` triple driving discovery and
//! propagation. Every combinator returns a new value; analysis code never
//! mutates pattern state.

mod builtin;
mod frameworks;

use std::path::Path;

use serde::{Deserialize, Serialize};

use seep_core::errors::ConfigError;

use crate::types::PatternMap;

pub use frameworks::Framework;

/// Patterns contributed by an external rule registry. These replace the
/// built-in sets wholesale; rule patterns already include framework effects
/// by convention.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleRegistry {
    pub sources: PatternMap,
    pub sinks: PatternMap,
}

/// Pattern counts, for logging and host display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    pub sources: usize,
    pub sinks: usize,
    pub sanitizers: usize,
}

/// The immutable `(sources, sinks, sanitizers)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaintRegistry {
    sources: PatternMap,
    sinks: PatternMap,
    sanitizers: PatternMap,
}

impl TaintRegistry {
    /// Registry with the built-in source, sink, and sanitizer sets.
    pub fn from_defaults() -> Self {
        let mut sources = PatternMap::new();
        sources.insert("js".into(), to_vec(builtin::JS_SOURCES));
        sources.insert("python".into(), to_vec(builtin::PYTHON_SOURCES));
        sources.insert("network".into(), to_vec(builtin::NETWORK_SOURCES));
        sources.insert("web_scraping".into(), to_vec(builtin::WEB_SCRAPING_SOURCES));
        sources.insert("file_io".into(), to_vec(builtin::FILE_IO_SOURCES));

        let mut sinks = PatternMap::new();
        sinks.insert("sql".into(), to_vec(builtin::SQL_SINKS));
        sinks.insert("command".into(), to_vec(builtin::COMMAND_SINKS));
        sinks.insert("xss".into(), to_vec(builtin::XSS_SINKS));
        sinks.insert("path".into(), to_vec(builtin::PATH_SINKS));
        sinks.insert("ldap".into(), to_vec(builtin::LDAP_SINKS));
        sinks.insert("nosql".into(), to_vec(builtin::NOSQL_SINKS));

        let mut sanitizers = PatternMap::new();
        sanitizers.insert("sql".into(), to_vec(builtin::SQL_SANITIZERS));
        sanitizers.insert("xss".into(), to_vec(builtin::XSS_SANITIZERS));
        sanitizers.insert("path".into(), to_vec(builtin::PATH_SANITIZERS));
        sanitizers.insert("command".into(), to_vec(builtin::COMMAND_SANITIZERS));
        sanitizers.insert("validation".into(), to_vec(builtin::VALIDATION_SANITIZERS));

        Self {
            sources,
            sinks,
            sanitizers,
        }
    }

    /// New registry with framework-specific patterns added.
    pub fn with_frameworks(&self, frameworks: &[Framework]) -> Self {
        let mut sources = self.sources.clone();
        let mut sinks = self.sinks.clone();
        for framework in frameworks {
            frameworks::apply_framework(*framework, &mut sources, &mut sinks);
        }
        Self {
            sources,
            sinks,
            sanitizers: self.sanitizers.clone(),
        }
    }

    /// New registry whose source and sink sets come from an external rule
    /// registry. Sanitizers are kept.
    pub fn with_rule_registry(&self, rules: &RuleRegistry) -> Self {
        Self {
            sources: rules.sources.clone(),
            sinks: rules.sinks.clone(),
            sanitizers: self.sanitizers.clone(),
        }
    }

    /// Substring-normalized, case-insensitive sanitizer check across all
    /// categories. Matches in either direction so `validateUserInput` hits
    /// the `validate` stem and `escape` hits `DOMPurify.sanitize`-style
    /// qualified names.
    pub fn is_sanitizer(&self, function_name: &str) -> bool {
        if function_name.is_empty() {
            return false;
        }
        let lower = function_name.to_lowercase();
        self.sanitizers.values().flatten().any(|s| {
            let sanitizer = s.to_lowercase();
            lower.contains(&sanitizer) || sanitizer.contains(&lower)
        })
    }

    pub fn sources(&self) -> &PatternMap {
        &self.sources
    }

    pub fn sinks(&self) -> &PatternMap {
        &self.sinks
    }

    pub fn sanitizers(&self) -> &PatternMap {
        &self.sanitizers
    }

    /// All source patterns across categories.
    pub fn all_source_patterns(&self) -> Vec<&str> {
        self.sources
            .values()
            .flatten()
            .map(String::as_str)
            .collect()
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            sources: self.sources.values().map(Vec::len).sum(),
            sinks: self.sinks.values().map(Vec::len).sum(),
            sanitizers: self.sanitizers.values().map(Vec::len).sum(),
        }
    }

    /// Parse a registry from a TOML pattern file. Missing sections fall back
    /// to the built-in sets.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        #[derive(Deserialize)]
        struct PatternFile {
            #[serde(default)]
            sources: PatternMap,
            #[serde(default)]
            sinks: PatternMap,
            #[serde(default)]
            sanitizers: PatternMap,
        }

        let file: PatternFile =
            toml::from_str(content).map_err(|e| ConfigError::PatternParse(e.to_string()))?;

        for map in [&file.sources, &file.sinks, &file.sanitizers] {
            for (category, patterns) in map {
                if category.is_empty() {
                    return Err(ConfigError::UnknownCategory(category.clone()));
                }
                if patterns.is_empty() || patterns.iter().any(String::is_empty) {
                    return Err(ConfigError::InvalidOverride(format!(
                        "category '{category}' contains an empty pattern list or pattern"
                    )));
                }
            }
        }

        let defaults = Self::from_defaults();
        Ok(Self {
            sources: if file.sources.is_empty() {
                defaults.sources
            } else {
                file.sources
            },
            sinks: if file.sinks.is_empty() {
                defaults.sinks
            } else {
                file.sinks
            },
            sanitizers: if file.sanitizers.is_empty() {
                defaults.sanitizers
            } else {
                file.sanitizers
            },
        })
    }

    /// Load a registry from a TOML pattern file on disk.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::PatternFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Serialize the pattern triple as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        #[derive(Serialize)]
        struct PatternFile<'a> {
            sources: &'a PatternMap,
            sinks: &'a PatternMap,
            sanitizers: &'a PatternMap,
        }
        toml::to_string_pretty(&PatternFile {
            sources: &self.sources,
            sinks: &self.sinks,
            sanitizers: &self.sanitizers,
        })
        .map_err(|e| ConfigError::PatternParse(e.to_string()))
    }
}

impl Default for TaintRegistry {
    fn default() -> Self {
        Self::from_defaults()
    }
}

fn to_vec(patterns: &[&str]) -> Vec<String> {
    patterns.iter().map(|p| (*p).to_string()).collect()
}
