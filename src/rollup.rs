// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! End-to-end template rollup.
//!
//! A __rollup__ renders the template into a scratch directory and
//! reconciles every rendered file into the target project, one file at a
//! time, through the strategy selected by the configuration document.
//!
//! The scratch directory is a temporary resource scoped to the run and is
//! removed on every exit path. There is no transactional rollback: an
//! error aborts the run and leaves already-written target files behind,
//! and because every strategy derives its output from the template and the
//! target's current state, running the rollup again is the recovery
//! mechanism.
//!
//! # Structure Validation
//!
//! Cookiecutter writes the generated project to
//! `output_dir / {{ cookiecutter.project_dest }}`. The rollup assumes that
//! `project_dest` equals the directory name of the target project, and
//! refuses to apply anything when the scratch output does not consist of
//! exactly that one directory. Anything else means the template's
//! `project_dest` value and the target directory disagree, which is a
//! configuration mistake on the user's side, not a state this tool can
//! repair.

use crate::{
    config::{get_scaraplate_toml, ConfigError, ScaraplateToml, StrategyNode},
    cookiecutter::{ContextError, CookiecutterCli, Render, RenderError},
    strategy::{MergeError, StrategyContext},
    template::{self, TemplateError, TemplateMeta},
};

use glob::Pattern;
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

/// Roll up the template into the target project.
///
/// Renders through the `cookiecutter` command line tool. See
/// [`rollup_with`] for the seam that takes any renderer.
///
/// # Errors
///
/// - Return [`RollupError`] if configuration loading, template metadata,
///   rendering, structure validation, or any per-file strategy fails.
pub fn rollup(
    template_dir: impl AsRef<Path>,
    target_project_dir: impl AsRef<Path>,
    no_input: bool,
) -> Result<()> {
    rollup_with(&CookiecutterCli, template_dir, target_project_dir, no_input)
}

/// Roll up the template into the target project with a specific renderer.
///
/// # Errors
///
/// - Return [`RollupError`] if configuration loading, template metadata,
///   rendering, structure validation, or any per-file strategy fails.
#[instrument(skip_all, level = "debug")]
pub fn rollup_with<R>(
    renderer: &R,
    template_dir: impl AsRef<Path>,
    target_project_dir: impl AsRef<Path>,
    no_input: bool,
) -> Result<()>
where
    R: Render,
{
    let template_path = template_dir.as_ref();
    let target_path = target_project_dir.as_ref();

    let scaraplate_toml = get_scaraplate_toml(template_path)?;
    let template_meta = template::describe(template_path, scaraplate_toml.git_remote_type.as_deref())?;

    create_dir_with_mode(target_path, 0o755)?;
    let target_path = target_path
        .canonicalize()
        .map_err(|source| RollupError::Io {
            source,
            path: target_path.to_path_buf(),
        })?;
    let project_dest = get_project_dest(&target_path)?;

    let mut extra_context = scaraplate_toml.cookiecutter_context_type.read(&target_path)?;
    if extra_context.is_empty() {
        info!("no stored context found, continuing with an empty one");
    } else {
        info!("continuing with the stored context: {extra_context:?}");
    }
    extra_context
        .entry("project_dest".to_owned())
        .or_insert_with(|| project_dest.clone());

    let scratch = tempfile::tempdir().map_err(RollupError::Scratch)?;
    let output_dir = scratch.path().join("out");
    create_dir_with_mode(&output_dir, 0o700)?;
    let config_home = scratch.path().join("cookiecutter_home");
    create_dir_with_mode(&config_home, 0o700)?;

    if !no_input {
        info!("`project_dest` must equal to {project_dest:?}");
    }

    renderer.render(
        template_path,
        &extra_context,
        no_input,
        &output_dir,
        &config_home,
    )?;

    let generated_path = validate_output_structure(&output_dir, &project_dest)?;
    apply_generated_project(&generated_path, &target_path, &template_meta, &scaraplate_toml)?;

    info!("Done!");
    Ok(())
}

/// Select the strategy node governing a rendered file.
///
/// Patterns are tried in ascending lexicographic order of the pattern
/// string, first glob match wins; a path matching no pattern falls back to
/// the default strategy. The order is a deliberate behavioral contract:
/// overlapping patterns resolve the same way no matter how the mapping was
/// written down.
pub fn get_strategy<'a>(scaraplate_toml: &'a ScaraplateToml, path: &str) -> &'a StrategyNode {
    for (pattern, node) in &scaraplate_toml.strategies_mapping {
        // Patterns were validated at config load.
        let matches = Pattern::new(pattern)
            .map(|pattern| pattern.matches(path))
            .unwrap_or(false);
        if matches {
            return node;
        }
    }

    &scaraplate_toml.default_strategy
}

/// Directory name the rendered project must be generated under.
fn get_project_dest(target_path: &Path) -> Result<String> {
    target_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| RollupError::NoProjectDest {
            path: target_path.to_path_buf(),
        })
}

/// Check the scratch output holds exactly the expected directory.
fn validate_output_structure(output_dir: &Path, project_dest: &str) -> Result<PathBuf> {
    let mut actual = Vec::new();
    let entries = fs::read_dir(output_dir).map_err(|source| RollupError::Io {
        source,
        path: output_dir.to_path_buf(),
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| RollupError::Io {
            source,
            path: output_dir.to_path_buf(),
        })?;
        actual.push(entry.file_name().to_string_lossy().into_owned());
    }
    actual.sort();

    if actual != [project_dest] {
        return Err(RollupError::StructureMismatch {
            expected: project_dest.to_owned(),
            actual,
        });
    }

    Ok(output_dir.join(project_dest))
}

/// Walk the rendered tree and reconcile every file into the target.
fn apply_generated_project(
    generated_path: &Path,
    target_path: &Path,
    template_meta: &TemplateMeta,
    scaraplate_toml: &ScaraplateToml,
) -> Result<()> {
    for entry in WalkDir::new(generated_path).sort_by_file_name() {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(generated_path)
            .expect("walk entries live under the walk root");

        if entry.file_type().is_dir() {
            create_dir_with_mode(&target_path.join(relative), 0o755)?;
            continue;
        }
        if !entry.file_type().is_file() {
            debug!("skipping non-regular file {:?}", entry.path().display());
            continue;
        }

        let relative_str = forward_slashed(relative);
        let node = get_strategy(scaraplate_toml, &relative_str);
        debug!("{relative_str}: {}", node.reference());

        let template_contents = fs::read(entry.path()).map_err(|source| RollupError::Io {
            source,
            path: entry.path().to_path_buf(),
        })?;

        let target_file = target_path.join(relative);
        let target_contents = match fs::read(&target_file) {
            Ok(contents) => Some(contents),
            Err(source) if source.kind() == ErrorKind::NotFound => None,
            Err(source) => {
                return Err(RollupError::Io {
                    source,
                    path: target_file,
                })
            }
        };

        let result = node
            .strategy()
            .apply(StrategyContext {
                target_contents,
                template_contents,
                template_meta,
            })
            .map_err(|source| RollupError::Merge {
                path: relative_str.clone(),
                source,
            })?;

        if let Some(contents) = result {
            fs::write(&target_file, contents).map_err(|source| RollupError::Io {
                source,
                path: target_file.clone(),
            })?;
            copy_permission_bits(entry.path(), &target_file)?;
        }
    }

    Ok(())
}

/// Platform-neutral relative path representation used for glob matching.
fn forward_slashed(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn create_dir_with_mode(path: &Path, mode: u32) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    builder.create(path).map_err(|source| RollupError::Io {
        source,
        path: path.to_path_buf(),
    })
}

#[cfg(unix)]
fn copy_permission_bits(from: &Path, to: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(from).map_err(|source| RollupError::Io {
        source,
        path: from.to_path_buf(),
    })?;
    let mode = metadata.permissions().mode() & 0o777;
    fs::set_permissions(to, fs::Permissions::from_mode(mode)).map_err(|source| {
        RollupError::Io {
            source,
            path: to.to_path_buf(),
        }
    })
}

#[cfg(not(unix))]
fn copy_permission_bits(_from: &Path, _to: &Path) -> Result<()> {
    Ok(())
}

/// Rollup error types.
#[derive(Debug, thiserror::Error)]
pub enum RollupError {
    /// Configuration document failed to load.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Template metadata extraction failed.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Stored context of the target project failed to load.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// Rendering failed.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// A strategy failed to combine its inputs for one file.
    #[error("failed to merge {path}")]
    Merge {
        path: String,
        #[source]
        source: MergeError,
    },

    /// The rendered output does not consist of exactly the expected
    /// project directory.
    #[error(
        "rendered project has an unexpected file structure.\n\
         Expected directory listing: [{expected:?}]\n\
         Actual: {actual:?}\n\
         Does the target project directory name match the cookiecutter \
         `project_dest` value?"
    )]
    StructureMismatch {
        expected: String,
        actual: Vec<String>,
    },

    /// Target path has no final directory name to derive `project_dest`
    /// from.
    #[error("target path {:?} has no directory name", path.display())]
    NoProjectDest { path: PathBuf },

    /// Scratch directory cannot be created.
    #[error("failed to create scratch directory")]
    Scratch(#[source] std::io::Error),

    /// Filesystem access failed.
    #[error("failed to access {:?}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Walking the rendered tree failed.
    #[error(transparent)]
    Walk(#[from] walkdir::Error),
}

/// Friendly result alias :3
pub type Result<T, E = RollupError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use simple_test_case::test_case;

    fn config(document: &str) -> ScaraplateToml {
        document.parse().unwrap()
    }

    #[test_case("setup.py", "template_hash"; "exact path")]
    #[test_case("some/nested/setup.py", "overwrite"; "exact nested path")]
    #[test_case("docs/index.md", "if_missing"; "wildcard across separators")]
    #[test_case("README.rst", "overwrite"; "no match falls back")]
    #[test]
    fn dispatch_matches_globs(path: &str, expect: &str) {
        let config = config(indoc! {r#"
            default_strategy = "overwrite"

            [strategies_mapping]
            "setup.py" = "template_hash"
            "some/nested/setup.py" = "overwrite"
            "*.md" = "if_missing"
        "#});

        assert_eq!(get_strategy(&config, path).reference(), expect);
    }

    #[test]
    fn dispatch_prefers_lexicographically_earlier_pattern() {
        // Both patterns match "aa.py"; "a*" sorts before "aa*" regardless
        // of where each is declared in the document.
        let config = config(indoc! {r#"
            default_strategy = "overwrite"

            [strategies_mapping]
            "aa*" = "template_hash"
            "a*" = "if_missing"
        "#});

        assert_eq!(get_strategy(&config, "aa.py").reference(), "if_missing");
    }

    #[test]
    fn dispatch_declaration_order_is_irrelevant() {
        let forward = config(indoc! {r#"
            default_strategy = "overwrite"

            [strategies_mapping]
            "*.py" = "template_hash"
            "setup.*" = "if_missing"
        "#});
        let reversed = config(indoc! {r#"
            default_strategy = "overwrite"

            [strategies_mapping]
            "setup.*" = "if_missing"
            "*.py" = "template_hash"
        "#});

        // "*.py" < "setup.*" lexicographically, so it wins in both.
        assert_eq!(get_strategy(&forward, "setup.py").reference(), "template_hash");
        assert_eq!(
            get_strategy(&forward, "setup.py").reference(),
            get_strategy(&reversed, "setup.py").reference(),
        );
    }

    #[test]
    fn dispatch_falls_back_to_default() {
        let config = config(indoc! {r#"
            default_strategy = "sorted_unique_lines"

            [strategies_mapping]
        "#});

        assert_eq!(
            get_strategy(&config, "anything/at/all").reference(),
            "sorted_unique_lines"
        );
    }

    #[test]
    fn structure_validation_accepts_single_expected_directory() {
        let scratch = tempfile::tempdir().unwrap();
        fs::create_dir(scratch.path().join("myproject")).unwrap();

        let generated = validate_output_structure(scratch.path(), "myproject").unwrap();
        assert_eq!(generated, scratch.path().join("myproject"));
    }

    #[test]
    fn structure_validation_rejects_extra_entries() {
        let scratch = tempfile::tempdir().unwrap();
        fs::create_dir(scratch.path().join("myproject")).unwrap();
        fs::create_dir(scratch.path().join("stray")).unwrap();

        let error = validate_output_structure(scratch.path(), "myproject").unwrap_err();
        match error {
            RollupError::StructureMismatch { expected, actual } => {
                assert_eq!(expected, "myproject");
                assert_eq!(actual, vec!["myproject".to_owned(), "stray".to_owned()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn structure_validation_rejects_wrong_name() {
        let scratch = tempfile::tempdir().unwrap();
        fs::create_dir(scratch.path().join("otherproject")).unwrap();

        let error = validate_output_structure(scratch.path(), "myproject").unwrap_err();
        assert!(matches!(error, RollupError::StructureMismatch { .. }));
    }

    #[test]
    fn forward_slashed_joins_components() {
        let path = Path::new("some").join("nested").join("setup.py");
        assert_eq!(forward_slashed(&path), "some/nested/setup.py");
    }
}
