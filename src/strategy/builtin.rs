// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Built-in strategy set.
//!
//! These cover the reconciliation shapes a template rollup needs in
//! practice: replace the file, keep the file, merge line sets, resync while
//! honoring local divergence (the template-hash pair), and the semantic INI
//! merge for `.pylintrc`. Anything fancier belongs in an extension
//! registered through [`StrategyRegistry::register`].
//!
//! [`StrategyRegistry::register`]: crate::strategy::StrategyRegistry::register

use crate::strategy::{
    inidoc, BadStrategyConfig, Document, MergeError, Result, Strategy, StrategyContext,
};
use crate::template::TemplateMeta;

use std::{collections::BTreeSet, sync::Arc};
use toml::Table;

/// Longest comment line Python linters accept before flagging it.
const NOQA_LINE_LENGTH: usize = 87;

/// Keys of the `[TYPECHECK]` section that survive a pylintrc resync.
const PRESERVED_TYPECHECK_KEYS: [&str; 2] = ["ignored-modules", "ignored-classes"];

/// Always take the template's contents.
///
/// The target file, if any, is ignored entirely.
#[derive(Debug, Default)]
pub struct Overwrite;

impl Overwrite {
    pub fn construct(_config: &Table) -> Result<Arc<dyn Strategy>, BadStrategyConfig> {
        Ok(Arc::new(Self))
    }
}

impl Strategy for Overwrite {
    fn apply(&self, ctx: StrategyContext<'_>) -> Result<Option<Vec<u8>>> {
        Ok(Some(ctx.template_contents))
    }
}

/// Take the template's contents only when the target file does not exist.
///
/// An existing target file is left untouched, permission bits included.
#[derive(Debug, Default)]
pub struct IfMissing;

impl IfMissing {
    pub fn construct(_config: &Table) -> Result<Arc<dyn Strategy>, BadStrategyConfig> {
        Ok(Arc::new(Self))
    }
}

impl Strategy for IfMissing {
    fn apply(&self, ctx: StrategyContext<'_>) -> Result<Option<Vec<u8>>> {
        match ctx.target_contents {
            Some(_) => Ok(None),
            None => Ok(Some(ctx.template_contents)),
        }
    }
}

/// Merge the line sets of both files, sorted and deduplicated.
///
/// Useful for files that are plain unordered listings, e.g. `.gitignore` or
/// spelling dictionaries. Blank lines are dropped. Output is sorted
/// bytewise and newline-terminated.
#[derive(Debug, Default)]
pub struct SortedUniqueLines;

impl SortedUniqueLines {
    pub fn construct(_config: &Table) -> Result<Arc<dyn Strategy>, BadStrategyConfig> {
        Ok(Arc::new(Self))
    }

    fn lines(contents: &[u8], document: Document) -> Result<BTreeSet<String>> {
        let text = std::str::from_utf8(contents).map_err(|source| MergeError::NotUtf8 {
            strategy: "sorted_unique_lines",
            document,
            source,
        })?;

        Ok(text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_owned)
            .collect())
    }
}

impl Strategy for SortedUniqueLines {
    fn apply(&self, ctx: StrategyContext<'_>) -> Result<Option<Vec<u8>>> {
        let mut lines = Self::lines(&ctx.template_contents, Document::Template)?;
        if let Some(target) = &ctx.target_contents {
            lines.extend(Self::lines(target, Document::Target)?);
        }

        let mut out = String::new();
        for line in &lines {
            out.push_str(line);
            out.push('\n');
        }

        Ok(Some(out.into_bytes()))
    }
}

/// Resync from the template, stamped with the template's commit URL.
///
/// The rendered contents are written with a trailer comment citing the
/// commit the template was rendered from. On later rollups, a target that
/// still carries the exact trailer of a clean render is returned unchanged,
/// so a file that intentionally diverged from the template after its first
/// sync is not silently rewritten forever. A dirty template working tree
/// never skips: dirty renders have no stable identity to deduplicate
/// against.
#[derive(Debug, Default)]
pub struct TemplateHash;

impl TemplateHash {
    pub fn construct(_config: &Table) -> Result<Arc<dyn Strategy>, BadStrategyConfig> {
        Ok(Arc::new(Self))
    }
}

impl Strategy for TemplateHash {
    fn apply(&self, ctx: StrategyContext<'_>) -> Result<Option<Vec<u8>>> {
        apply_with_trailer(ctx, "template_hash", false)
    }
}

/// [`TemplateHash`] with Python linters taken into account.
///
/// Trailer comment lines long enough to trip a line-length lint are
/// suffixed with `# noqa`.
#[derive(Debug, Default)]
pub struct PythonTemplateHash;

impl PythonTemplateHash {
    pub fn construct(_config: &Table) -> Result<Arc<dyn Strategy>, BadStrategyConfig> {
        Ok(Arc::new(Self))
    }
}

impl Strategy for PythonTemplateHash {
    fn apply(&self, ctx: StrategyContext<'_>) -> Result<Option<Vec<u8>>> {
        apply_with_trailer(ctx, "python_template_hash", true)
    }
}

fn trailer_comment(meta: &TemplateMeta, noqa: bool) -> String {
    let origin = if meta.is_dirty {
        format!("From (dirty) {}", meta.commit_url)
    } else {
        format!("From {}", meta.commit_url)
    };

    let mut lines = vec![
        "# Generated by https://github.com/awkless/scaraplate".to_string(),
        format!("# {origin}"),
    ];

    if noqa {
        for line in &mut lines {
            if line.chars().count() >= NOQA_LINE_LENGTH {
                line.push_str("  # noqa");
            }
        }
    }

    let mut comment = lines.join("\n");
    comment.push('\n');
    comment
}

fn apply_with_trailer(
    ctx: StrategyContext<'_>,
    strategy: &'static str,
    noqa: bool,
) -> Result<Option<Vec<u8>>> {
    let StrategyContext {
        target_contents,
        template_contents,
        template_meta,
    } = ctx;

    let trailer = trailer_comment(template_meta, noqa);
    if !trailer.is_ascii() {
        return Err(MergeError::NonAsciiTrailer { strategy, trailer });
    }

    if let Some(target) = target_contents {
        // INVARIANT: Only a clean render may skip. The trailer of a clean
        // render names a commit; matching it in the target proves the file
        // was already synced to that exact template state.
        if !template_meta.is_dirty && contains(&target, trailer.as_bytes()) {
            return Ok(Some(target));
        }
    }

    let mut out = template_contents;
    out.push(b'\n');
    out.extend_from_slice(trailer.as_bytes());

    Ok(Some(out))
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// Merge `.pylintrc` between the template and the target project.
///
/// The result is the template's document with comments stripped and a
/// canonical re-serialization (see [`inidoc`]), except that the
/// `ignored-modules` and `ignored-classes` keys of the `[TYPECHECK]`
/// section are taken from the target when the target defines them. This
/// lets environment-specific lint suppressions survive template updates
/// while everything else resyncs.
#[derive(Debug, Default)]
pub struct PylintrcMerge;

impl PylintrcMerge {
    pub fn construct(_config: &Table) -> Result<Arc<dyn Strategy>, BadStrategyConfig> {
        Ok(Arc::new(Self))
    }
}

impl Strategy for PylintrcMerge {
    fn apply(&self, ctx: StrategyContext<'_>) -> Result<Option<Vec<u8>>> {
        let mut doc = inidoc::parse(&ctx.template_contents, Document::Template, "pylintrc_merge")?;

        if let Some(target) = &ctx.target_contents {
            let donor = inidoc::parse(target, Document::Target, "pylintrc_merge")?;
            for key in PRESERVED_TYPECHECK_KEYS {
                inidoc::preserve_key(&mut doc, &donor, "TYPECHECK", key);
            }
        }

        Ok(Some(inidoc::to_pretty_bytes(&doc)))
    }
}
