// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Every template carries a `scaraplate.toml` at its top level that declares
//! how rendered files are reconciled into the target project: a default
//! merge strategy, a mapping of glob patterns to strategies for files that
//! need different treatment, and optional overrides for the remote host
//! type and the context source.
//!
//! # General Layout
//!
//! ```toml
//! default_strategy = "overwrite"
//! git_remote_type = "github"
//!
//! [strategies_mapping]
//! "Makefile" = "if_missing"
//! "setup.py" = { strategy = "template_hash" }
//! ".gitignore" = { strategy = "sorted_unique_lines", config = {} }
//! ```
//!
//! A strategy entry is either a bare reference string or a table with a
//! required `strategy` key and an optional `config` table that is passed to
//! the strategy verbatim. Anything else is a hard error, as is any
//! reference that does not resolve or any glob pattern that does not
//! compile. Loading is all-or-nothing: one invalid entry fails the whole
//! document before any file is touched.

use crate::{
    cookiecutter::{self, CookiecutterContext, ScaraplateConf},
    strategy::{BadStrategyConfig, ReferenceError, Strategy, StrategyRegistry},
    template::{self, GitRemote},
};

use glob::Pattern;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};
use toml::{Table, Value};
use tracing::debug;

/// Name of the configuration document inside the template.
pub const SCARAPLATE_TOML: &str = "scaraplate.toml";

/// A resolved strategy entry: the strategy plus its verbatim config.
///
/// Equality is structural (reference name and config table), which keeps
/// loaded configurations comparable in tests.
#[derive(Debug, Clone)]
pub struct StrategyNode {
    reference: String,
    config: Table,
    strategy: Arc<dyn Strategy>,
}

impl StrategyNode {
    /// The reference this node was resolved from.
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// The verbatim config table.
    pub fn config(&self) -> &Table {
        &self.config
    }

    /// The strategy built from the config.
    pub fn strategy(&self) -> &Arc<dyn Strategy> {
        &self.strategy
    }

    /// Resolve one strategy entry of the configuration document.
    ///
    /// `path` names the entry in diagnostics: either `default_strategy` or
    /// the glob pattern the entry is keyed under.
    fn resolve(path: &str, raw: &Value, registry: &StrategyRegistry) -> Result<Self> {
        let (reference, config) = match raw {
            Value::String(reference) => (reference.clone(), Table::new()),
            Value::Table(table) => {
                let reference = match table.get("strategy") {
                    Some(Value::String(reference)) => reference.clone(),
                    Some(other) => {
                        return Err(ConfigError::StrategyRef {
                            path: path.to_owned(),
                            found: value_kind(other),
                        })
                    }
                    None => {
                        return Err(ConfigError::StrategyRef {
                            path: path.to_owned(),
                            found: "nothing",
                        })
                    }
                };

                let config = match table.get("config") {
                    None => Table::new(),
                    Some(Value::Table(config)) => config.clone(),
                    Some(other) => {
                        return Err(ConfigError::ConfigShape {
                            path: path.to_owned(),
                            found: value_kind(other),
                        })
                    }
                };

                (reference, config)
            }
            other => {
                return Err(ConfigError::NodeShape {
                    path: path.to_owned(),
                    found: value_kind(other),
                })
            }
        };

        let constructor =
            registry
                .resolve(&reference)
                .map_err(|source| ConfigError::Reference {
                    path: path.to_owned(),
                    source,
                })?;
        let strategy = constructor(&config).map_err(|source| ConfigError::Construct {
            path: path.to_owned(),
            reference: reference.clone(),
            source,
        })?;

        Ok(Self {
            reference,
            config,
            strategy,
        })
    }
}

impl PartialEq for StrategyNode {
    fn eq(&self, other: &Self) -> bool {
        self.reference == other.reference && self.config == other.config
    }
}

/// Parsed and validated `scaraplate.toml`.
#[derive(Debug)]
pub struct ScaraplateToml {
    /// Strategy applied to any file matching no explicit pattern.
    pub default_strategy: StrategyNode,

    /// Glob pattern to strategy mapping, keyed by pattern string. The
    /// [`BTreeMap`] makes lookup order a property of the data structure:
    /// ascending lexicographic order of the pattern.
    pub strategies_mapping: BTreeMap<String, StrategyNode>,

    /// Remote host type used to build browsable commit URLs. Absent means
    /// the bare commit id is used instead.
    pub git_remote_type: Option<Arc<dyn GitRemote>>,

    /// Source of the target project's stored render context.
    pub cookiecutter_context_type: Arc<dyn CookiecutterContext>,
}

impl ScaraplateToml {
    /// Parse a configuration document against a strategy registry.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError`] if the document is not valid TOML, a
    ///   required key is missing, an entry has an unexpected shape, a glob
    ///   pattern does not compile, or any reference fails resolution.
    pub fn parse(data: &str, registry: &StrategyRegistry) -> Result<Self> {
        let root: Table = toml::from_str(data)?;

        let default_strategy = root
            .get("default_strategy")
            .ok_or(ConfigError::MissingKey {
                key: "default_strategy",
            })
            .and_then(|raw| StrategyNode::resolve("default_strategy", raw, registry))?;

        let mapping = root
            .get("strategies_mapping")
            .ok_or(ConfigError::MissingKey {
                key: "strategies_mapping",
            })?;
        let mapping = mapping.as_table().ok_or_else(|| ConfigError::KeyNotATable {
            key: "strategies_mapping",
            found: value_kind(mapping),
        })?;

        let mut strategies_mapping = BTreeMap::new();
        for (pattern, raw) in mapping {
            // INVARIANT: Every pattern compiles at load time, so dispatch
            // never meets an invalid one.
            Pattern::new(pattern).map_err(|source| ConfigError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;

            let node = StrategyNode::resolve(pattern, raw, registry)?;
            strategies_mapping.insert(pattern.clone(), node);
        }

        let git_remote_type = match root.get("git_remote_type") {
            None => None,
            Some(raw) => {
                let name = raw.as_str().ok_or_else(|| ConfigError::KeyNotAString {
                    key: "git_remote_type",
                    found: value_kind(raw),
                })?;
                let remote =
                    template::remote_from_name(name).map_err(|source| ConfigError::Reference {
                        path: "git_remote_type".to_owned(),
                        source,
                    })?;
                Some(remote)
            }
        };

        let cookiecutter_context_type = match root.get("cookiecutter_context_type") {
            None => Arc::new(ScaraplateConf) as Arc<dyn CookiecutterContext>,
            Some(raw) => {
                let name = raw.as_str().ok_or_else(|| ConfigError::KeyNotAString {
                    key: "cookiecutter_context_type",
                    found: value_kind(raw),
                })?;
                cookiecutter::context_source_from_name(name).map_err(|source| {
                    ConfigError::Reference {
                        path: "cookiecutter_context_type".to_owned(),
                        source,
                    }
                })?
            }
        };

        Ok(Self {
            default_strategy,
            strategies_mapping,
            git_remote_type,
            cookiecutter_context_type,
        })
    }
}

impl FromStr for ScaraplateToml {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        Self::parse(data, &StrategyRegistry::default())
    }
}

/// Load and validate the `scaraplate.toml` of a template.
///
/// # Errors
///
/// - Return [`ConfigError::Read`] if the document cannot be read.
/// - Return any [`ConfigError`] from [`ScaraplateToml::parse`].
pub fn get_scaraplate_toml(template_path: impl AsRef<Path>) -> Result<ScaraplateToml> {
    let path = template_path.as_ref().join(SCARAPLATE_TOML);
    debug!("load configuration from {:?}", path.display());

    let data = fs::read_to_string(&path).map_err(|source| ConfigError::Read { source, path })?;
    data.parse()
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::String(_) => "a string",
        Value::Integer(_) => "an integer",
        Value::Float(_) => "a float",
        Value::Boolean(_) => "a boolean",
        Value::Datetime(_) => "a datetime",
        Value::Array(_) => "an array",
        Value::Table(_) => "a table",
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration document cannot be read.
    #[error("failed to read {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Configuration document is not valid TOML.
    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    /// A required top-level key is missing.
    #[error("missing required key `{key}`")]
    MissingKey { key: &'static str },

    /// A top-level key that must be a table is something else.
    #[error("unexpected `{key}` value: a table is expected, got {found}")]
    KeyNotATable { key: &'static str, found: &'static str },

    /// A top-level key that must be a string is something else.
    #[error("unexpected `{key}` value: a string is expected, got {found}")]
    KeyNotAString { key: &'static str, found: &'static str },

    /// A strategy entry is neither a string nor a table.
    #[error("unexpected strategy value for {path}: a string or a table is expected, got {found}")]
    NodeShape { path: String, found: &'static str },

    /// A strategy entry table has a missing or non-string `strategy` key.
    #[error("unexpected `strategy` value for {path}: a string is expected, got {found}")]
    StrategyRef { path: String, found: &'static str },

    /// A strategy entry has a `config` key that is not a table.
    #[error("unexpected strategy `config` value for {path}: a table is expected, got {found}")]
    ConfigShape { path: String, found: &'static str },

    /// A mapping key is not a valid glob pattern.
    #[error("invalid glob pattern {pattern:?}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// A configured reference fails resolution.
    #[error("unresolvable reference for {path}")]
    Reference {
        path: String,
        #[source]
        source: ReferenceError,
    },

    /// A strategy constructor rejected its config table.
    #[error("strategy {reference:?} for {path} rejected its config")]
    Construct {
        path: String,
        reference: String,
        #[source]
        source: BadStrategyConfig,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn full_document_loads() {
        let config: ScaraplateToml = indoc! {r#"
            default_strategy = "overwrite"
            git_remote_type = "github"
            cookiecutter_context_type = "setup_cfg"

            [strategies_mapping]
            "Makefile" = "if_missing"
            ".gitignore" = { strategy = "sorted_unique_lines" }
            ".pylintrc" = { strategy = "pylintrc_merge", config = {} }
            "setup.py" = { strategy = "template_hash" }
        "#}
        .parse()
        .unwrap();

        assert_eq!(config.default_strategy.reference(), "overwrite");
        assert_eq!(config.strategies_mapping.len(), 4);
        assert_eq!(
            config.strategies_mapping["Makefile"].reference(),
            "if_missing"
        );
        assert!(config.git_remote_type.is_some());
    }

    #[test]
    fn bare_string_entry_means_empty_config() {
        let config: ScaraplateToml = indoc! {r#"
            default_strategy = "overwrite"

            [strategies_mapping]
            "setup.py" = { strategy = "overwrite", config = {} }
        "#}
        .parse()
        .unwrap();

        // A bare reference and an explicit empty config are the same node.
        assert_eq!(
            config.default_strategy,
            config.strategies_mapping["setup.py"]
        );
        assert!(config.default_strategy.config().is_empty());
    }

    #[test]
    fn missing_default_strategy_is_rejected() {
        let error = indoc! {r#"
            [strategies_mapping]
            "setup.py" = "overwrite"
        "#}
        .parse::<ScaraplateToml>()
        .unwrap_err();

        assert!(matches!(
            error,
            ConfigError::MissingKey {
                key: "default_strategy"
            }
        ));
    }

    #[test]
    fn missing_strategies_mapping_is_rejected() {
        let error = r#"default_strategy = "overwrite""#
            .parse::<ScaraplateToml>()
            .unwrap_err();

        assert!(matches!(
            error,
            ConfigError::MissingKey {
                key: "strategies_mapping"
            }
        ));
    }

    #[test]
    fn non_string_strategy_reference_is_rejected() {
        let error = indoc! {r#"
            default_strategy = "overwrite"

            [strategies_mapping]
            "setup.py" = { strategy = 42 }
        "#}
        .parse::<ScaraplateToml>()
        .unwrap_err();

        match error {
            ConfigError::StrategyRef { path, found } => {
                assert_eq!(path, "setup.py");
                assert_eq!(found, "an integer");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn table_without_strategy_key_is_rejected() {
        let error = indoc! {r#"
            default_strategy = "overwrite"

            [strategies_mapping]
            "setup.py" = { config = {} }
        "#}
        .parse::<ScaraplateToml>()
        .unwrap_err();

        assert!(matches!(
            error,
            ConfigError::StrategyRef { found: "nothing", .. }
        ));
    }

    #[test]
    fn non_table_config_is_rejected() {
        let error = indoc! {r#"
            default_strategy = "overwrite"

            [strategies_mapping]
            "setup.py" = { strategy = "overwrite", config = "yes" }
        "#}
        .parse::<ScaraplateToml>()
        .unwrap_err();

        assert!(matches!(error, ConfigError::ConfigShape { .. }));
    }

    #[test]
    fn scalar_entry_is_rejected() {
        let error = indoc! {r#"
            default_strategy = 42

            [strategies_mapping]
        "#}
        .parse::<ScaraplateToml>()
        .unwrap_err();

        match error {
            ConfigError::NodeShape { path, found } => {
                assert_eq!(path, "default_strategy");
                assert_eq!(found, "an integer");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unknown_strategy_reference_is_rejected() {
        let error = indoc! {r#"
            default_strategy = "three_way_merge"

            [strategies_mapping]
        "#}
        .parse::<ScaraplateToml>()
        .unwrap_err();

        match error {
            ConfigError::Reference { path, source } => {
                assert_eq!(path, "default_strategy");
                assert_eq!(source.reference, "three_way_merge");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unknown_remote_type_is_rejected() {
        let error = indoc! {r#"
            default_strategy = "overwrite"
            git_remote_type = "sourcehut"

            [strategies_mapping]
        "#}
        .parse::<ScaraplateToml>()
        .unwrap_err();

        assert!(matches!(
            error,
            ConfigError::Reference { ref path, .. } if path == "git_remote_type"
        ));
    }

    #[test]
    fn unknown_context_source_is_rejected() {
        let error = indoc! {r#"
            default_strategy = "overwrite"
            cookiecutter_context_type = "pyproject_toml"

            [strategies_mapping]
        "#}
        .parse::<ScaraplateToml>()
        .unwrap_err();

        assert!(matches!(
            error,
            ConfigError::Reference { ref path, .. } if path == "cookiecutter_context_type"
        ));
    }

    #[test]
    fn invalid_glob_pattern_is_rejected() {
        let error = indoc! {r#"
            default_strategy = "overwrite"

            [strategies_mapping]
            "src/[oops" = "overwrite"
        "#}
        .parse::<ScaraplateToml>()
        .unwrap_err();

        assert!(matches!(
            error,
            ConfigError::Pattern { ref pattern, .. } if pattern == "src/[oops"
        ));
    }

    #[test]
    fn strategy_config_is_kept_verbatim() {
        let config: ScaraplateToml = indoc! {r#"
            default_strategy = "overwrite"

            [strategies_mapping]
            "setup.py" = { strategy = "template_hash", config = { answer = 42 } }
        "#}
        .parse()
        .unwrap();

        let node = &config.strategies_mapping["setup.py"];
        assert_eq!(node.config()["answer"], Value::Integer(42));
    }
}
