// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Merge strategy capability and registry.
//!
//! A __strategy__ is a small deterministic algorithm that reconciles one
//! template-rendered file with the corresponding file of the target project.
//! Each file that the template renders is handed to exactly one strategy,
//! selected through the pattern mapping in `scaraplate.toml`.
//!
//! # Strategy References
//!
//! Configuration refers to strategies by name. Names are resolved against a
//! [`StrategyRegistry`], which ships with the built-in strategy set and
//! accepts additional constructors through [`StrategyRegistry::register`].
//! Resolution happens once, while the configuration document is loaded, so a
//! bad reference surfaces before any file is touched.
//!
//! # Lifecycle
//!
//! A strategy object is built from its verbatim `config` table when the
//! configuration document is loaded. Construction is the only place a
//! strategy may reject its config. Per file, the rollup hands the strategy an
//! owned [`StrategyContext`] and [`Strategy::apply`] returns either the bytes
//! to write or [`None`] to leave the target file untouched. Nothing carries
//! over from one file to the next.

pub mod builtin;
pub mod inidoc;

use crate::template::TemplateMeta;

use std::{
    collections::BTreeMap,
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    sync::Arc,
};
use toml::Table;

/// Per-file value bundle handed to [`Strategy::apply`].
#[derive(Debug)]
pub struct StrategyContext<'a> {
    /// Current contents of the target file, absent when the file does not
    /// exist yet.
    pub target_contents: Option<Vec<u8>>,

    /// Contents the template rendered for this file.
    pub template_contents: Vec<u8>,

    /// Version-control metadata of the template at render time.
    pub template_meta: &'a TemplateMeta,
}

/// Reconcile one rendered file with the target project.
pub trait Strategy: Debug + Send + Sync {
    /// Combine the rendered contents with the current target contents.
    ///
    /// Returns the bytes to write to the target file, or [`None`] to leave
    /// the target file exactly as it is. [`None`] is distinct from returning
    /// the target's own bytes: the latter still rewrites the file and
    /// refreshes its permission bits.
    ///
    /// # Errors
    ///
    /// - Return [`MergeError`] if the inputs cannot be parsed or combined.
    fn apply(&self, ctx: StrategyContext<'_>) -> Result<Option<Vec<u8>>>;
}

/// Build a strategy object from its verbatim config table.
pub type StrategyConstructor = fn(&Table) -> Result<Arc<dyn Strategy>, BadStrategyConfig>;

/// Named strategy constructors.
///
/// [`StrategyRegistry::default`] carries the built-in strategy set. Names
/// are held in a [`BTreeMap`] so diagnostics list them in a stable order.
#[derive(Debug, Clone)]
pub struct StrategyRegistry {
    entries: BTreeMap<String, StrategyConstructor>,
}

impl StrategyRegistry {
    /// Construct a registry with no entries.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Register a strategy constructor under a name.
    ///
    /// An existing entry with the same name is replaced.
    pub fn register(&mut self, name: impl Into<String>, constructor: StrategyConstructor) {
        self.entries.insert(name.into(), constructor);
    }

    /// Resolve a strategy reference to its constructor.
    ///
    /// # Errors
    ///
    /// - Return [`ReferenceError`] if no constructor is registered under the
    ///   given name.
    pub fn resolve(&self, reference: &str) -> Result<StrategyConstructor, ReferenceError> {
        self.entries
            .get(reference)
            .copied()
            .ok_or_else(|| ReferenceError {
                capability: "merge strategy",
                reference: reference.to_owned(),
                known: self.entries.keys().cloned().collect(),
            })
    }
}

impl Default for StrategyRegistry {
    /// Registry pre-populated with the built-in strategy set.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("overwrite", builtin::Overwrite::construct);
        registry.register("if_missing", builtin::IfMissing::construct);
        registry.register("sorted_unique_lines", builtin::SortedUniqueLines::construct);
        registry.register("template_hash", builtin::TemplateHash::construct);
        registry.register("python_template_hash", builtin::PythonTemplateHash::construct);
        registry.register("pylintrc_merge", builtin::PylintrcMerge::construct);
        registry
    }
}

/// A configured reference does not resolve to a registered implementation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("no {capability} named {reference:?} is registered (known: {})", known.join(", "))]
pub struct ReferenceError {
    /// Capability the reference was resolved against.
    pub capability: &'static str,

    /// The reference as written in configuration.
    pub reference: String,

    /// Names that would have resolved.
    pub known: Vec<String>,
}

/// A strategy constructor rejected its config table.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{reason}")]
pub struct BadStrategyConfig {
    pub reason: String,
}

/// Which of the two input documents a merge failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Document {
    Template,
    Target,
}

impl Display for Document {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Template => fmt.write_str("template"),
            Self::Target => fmt.write_str("target"),
        }
    }
}

/// Strategy application error types.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// Input document failed to parse as INI.
    #[error("{strategy} could not parse the {document} contents as INI")]
    IniParse {
        strategy: &'static str,
        document: Document,
        #[source]
        source: ini::ParseError,
    },

    /// Input document is not valid UTF-8.
    #[error("{strategy} requires UTF-8 {document} contents")]
    NotUtf8 {
        strategy: &'static str,
        document: Document,
        #[source]
        source: std::str::Utf8Error,
    },

    /// Generated trailer comment cannot be encoded as ASCII.
    #[error("{strategy} produced a non-ASCII trailer comment: {trailer:?}")]
    NonAsciiTrailer {
        strategy: &'static str,
        trailer: String,
    },
}

/// Friendly result alias :3
pub type Result<T, E = MergeError> = std::result::Result<T, E>;
