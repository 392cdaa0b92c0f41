// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Cookiecutter collaborators.
//!
//! Scaraplate does not render template placeholders itself. Rendering is
//! delegated to the `cookiecutter` binary through the [`Render`] seam, and
//! the context a target project was originally generated with is read back
//! through the [`CookiecutterContext`] seam.
//!
//! # Renderer Isolation
//!
//! Cookiecutter preserves entered template variables in the user's home
//! directory and tries to reuse them on subsequent runs. A rollup must not
//! read or pollute that shared state, so every render is handed a
//! `--config-file` generated inside the run's scratch directory, pointing
//! both `cookiecutters_dir` and `replay_dir` at scratch paths that vanish
//! with the run.
//!
//! # Context Sources
//!
//! Rendering a template records its context into a marker file inside the
//! generated project (the template itself decides which). On the next
//! rollup that file seeds the render context, so the user is not asked the
//! same questions again. `.scaraplate.conf` is the conventional location;
//! `setup.cfg` is supported for Python projects that prefer one less file.

use crate::strategy::ReferenceError;

use ini::Ini;
use std::{
    collections::BTreeMap,
    ffi::{OsStr, OsString},
    fmt::Debug,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    process::Command,
    sync::Arc,
};
use tracing::{debug, info};

/// Expand a template into a concrete file tree.
pub trait Render: Debug {
    /// Render `template_dir` into `output_dir` with the given context.
    ///
    /// Must write exactly one top-level directory into `output_dir`. All
    /// renderer-private state belongs under `config_home`.
    ///
    /// # Errors
    ///
    /// - Return [`RenderError`] if the render cannot be started or reports
    ///   failure.
    fn render(
        &self,
        template_dir: &Path,
        context: &BTreeMap<String, String>,
        no_input: bool,
        output_dir: &Path,
        config_home: &Path,
    ) -> Result<()>;
}

/// Rendering through the `cookiecutter` command line tool.
#[derive(Debug, Default)]
pub struct CookiecutterCli;

impl CookiecutterCli {
    /// Write the isolated cookiecutter config into `config_home`.
    fn write_isolated_config(&self, config_home: &Path) -> Result<PathBuf> {
        let config_path = config_home.join("cookiecutterrc.yaml");
        let contents = format!(
            "cookiecutters_dir: \"{}\"\nreplay_dir: \"{}\"\n",
            config_home.join("cookiecutters").display(),
            config_home.join("replay").display(),
        );

        fs::write(&config_path, contents).map_err(|source| RenderError::WriteConfig {
            source,
            path: config_path.clone(),
        })?;

        Ok(config_path)
    }
}

impl Render for CookiecutterCli {
    fn render(
        &self,
        template_dir: &Path,
        context: &BTreeMap<String, String>,
        no_input: bool,
        output_dir: &Path,
        config_home: &Path,
    ) -> Result<()> {
        let config_path = self.write_isolated_config(config_home)?;

        // Cookiecutter records the template reference it was invoked with
        // into the generated context (the `_template` key). Run from the
        // template's parent and pass the bare directory name, so that
        // record does not leak a machine-local absolute path.
        let resolved = template_dir
            .canonicalize()
            .map_err(|source| RenderError::ResolveTemplate {
                source,
                path: template_dir.to_path_buf(),
            })?;
        let template_root = resolved
            .parent()
            .ok_or_else(|| RenderError::NoTemplateRoot {
                path: resolved.clone(),
            })?
            .to_path_buf();
        let template_name = resolved
            .file_name()
            .ok_or_else(|| RenderError::NoTemplateRoot {
                path: resolved.clone(),
            })?
            .to_os_string();

        let mut args: Vec<OsString> = vec![
            "--output-dir".into(),
            output_dir.into(),
            "--config-file".into(),
            config_path.into(),
        ];
        if no_input {
            args.push("--no-input".into());
        }
        args.push(template_name);
        for (key, value) in context {
            args.push(format!("{key}={value}").into());
        }

        if no_input {
            let output = syscall_non_interactive("cookiecutter", &template_root, args)?;
            if !output.is_empty() {
                debug!("{output}");
            }
        } else {
            // Interactive prompts go straight to the user's terminal.
            syscall_interactive("cookiecutter", &template_root, args)?;
        }

        Ok(())
    }
}

fn syscall_interactive(
    cmd: impl AsRef<OsStr>,
    cwd: &Path,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<()> {
    let status = Command::new(cmd.as_ref())
        .current_dir(cwd)
        .args(args)
        .spawn()
        .map_err(RenderError::Syscall)?
        .wait()
        .map_err(RenderError::Syscall)?;

    if !status.success() {
        return Err(RenderError::Syscall(std::io::Error::other(format!(
            "command {:?} failed",
            cmd.as_ref()
        ))));
    }

    Ok(())
}

fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    cwd: &Path,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<String> {
    let output = Command::new(cmd.as_ref())
        .current_dir(cwd)
        .args(args)
        .output()
        .map_err(RenderError::Syscall)?;

    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();
    let mut message = String::new();

    if !stdout.is_empty() {
        message.push_str(format!("stdout: {stdout}").as_str());
    }

    if !stderr.is_empty() {
        message.push_str(format!("stderr: {stderr}").as_str());
    }

    // INVARIANT: Chomp trailing newlines.
    let message = message
        .strip_suffix("\r\n")
        .or(message.strip_suffix('\n'))
        .map(ToString::to_string)
        .unwrap_or(message);

    if !output.status.success() {
        return Err(RenderError::Syscall(std::io::Error::other(format!(
            "command {:?} failed:\n{message}",
            cmd.as_ref()
        ))));
    }

    Ok(message)
}

/// Read back the context a target project was generated with.
pub trait CookiecutterContext: Debug + Send + Sync {
    /// Read the stored context of the project at `target_path`.
    ///
    /// A structurally-absent source is not an error: it reads as an empty
    /// context. A present but malformed source is an error.
    ///
    /// # Errors
    ///
    /// - Return [`ContextError`] if the source exists but cannot be read or
    ///   parsed.
    fn read(&self, target_path: &Path) -> Result<BTreeMap<String, String>, ContextError>;
}

/// Context stored in the `.scaraplate.conf` marker file.
#[derive(Debug, Default)]
pub struct ScaraplateConf;

impl CookiecutterContext for ScaraplateConf {
    fn read(&self, target_path: &Path) -> Result<BTreeMap<String, String>, ContextError> {
        read_ini_section(target_path.join(".scaraplate.conf"), "cookiecutter_context")
    }
}

/// Context stored in the project's `setup.cfg`.
#[derive(Debug, Default)]
pub struct SetupCfg;

impl CookiecutterContext for SetupCfg {
    fn read(&self, target_path: &Path) -> Result<BTreeMap<String, String>, ContextError> {
        read_ini_section(target_path.join("setup.cfg"), "tool:cookiecutter_context")
    }
}

fn read_ini_section(
    path: PathBuf,
    section: &str,
) -> Result<BTreeMap<String, String>, ContextError> {
    let data = match fs::read_to_string(&path) {
        Ok(data) => data,
        Err(source) if source.kind() == ErrorKind::NotFound => {
            info!("no context file at {:?}, continuing without", path.display());
            return Ok(BTreeMap::new());
        }
        Err(source) => return Err(ContextError::Read { source, path }),
    };

    let doc =
        Ini::load_from_str(&data).map_err(|source| ContextError::Malformed { source, path })?;

    Ok(doc
        .section(Some(section))
        .map(|properties| {
            properties
                .iter()
                .map(|(key, value)| (key.to_owned(), value.to_owned()))
                .collect()
        })
        .unwrap_or_default())
}

/// Resolve a `cookiecutter_context_type` reference to its implementation.
///
/// # Errors
///
/// - Return [`ReferenceError`] if the name does not match a known context
///   source.
pub fn context_source_from_name(name: &str) -> Result<Arc<dyn CookiecutterContext>, ReferenceError> {
    match name {
        "scaraplate_conf" => Ok(Arc::new(ScaraplateConf)),
        "setup_cfg" => Ok(Arc::new(SetupCfg)),
        _ => Err(ReferenceError {
            capability: "cookiecutter context source",
            reference: name.to_owned(),
            known: vec!["scaraplate_conf".to_owned(), "setup_cfg".to_owned()],
        }),
    }
}

/// Context source error types.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// Context file exists but cannot be read.
    #[error("failed to read context file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Context file exists but is not a parsable INI document.
    #[error("malformed context file at {:?}", path.display())]
    Malformed {
        #[source]
        source: ini::ParseError,
        path: PathBuf,
    },
}

/// Render error types.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Renderer isolation config cannot be written.
    #[error("failed to prepare renderer config at {:?}", path.display())]
    WriteConfig {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Template path cannot be canonicalized.
    #[error("failed to resolve template path {:?}", path.display())]
    ResolveTemplate {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Template path has no parent directory or name.
    #[error("template path {:?} has no parent directory", path.display())]
    NoTemplateRoot { path: PathBuf },

    /// External renderer invocation fails.
    #[error(transparent)]
    Syscall(std::io::Error),
}

/// Friendly result alias :3
pub type Result<T, E = RenderError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn scaraplate_conf_reads_context_section() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(".scaraplate.conf"),
            indoc! {r#"
                [cookiecutter_context]
                project_dest = myproject
                author = Jane Doe
            "#},
        )
        .unwrap();

        let context = ScaraplateConf.read(dir.path()).unwrap();
        let expect: BTreeMap<String, String> = [
            ("project_dest".to_owned(), "myproject".to_owned()),
            ("author".to_owned(), "Jane Doe".to_owned()),
        ]
        .into();
        assert_eq!(context, expect);
    }

    #[test]
    fn absent_context_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let context = ScaraplateConf.read(dir.path()).unwrap();
        assert!(context.is_empty());
    }

    #[test]
    fn present_file_without_section_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".scaraplate.conf"), "[other]\nkey = value\n").unwrap();

        let context = ScaraplateConf.read(dir.path()).unwrap();
        assert!(context.is_empty());
    }

    #[test]
    fn malformed_context_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".scaraplate.conf"), "[unclosed\n").unwrap();

        let error = ScaraplateConf.read(dir.path()).unwrap_err();
        assert!(matches!(error, ContextError::Malformed { .. }));
    }

    #[test]
    fn setup_cfg_reads_tool_section() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("setup.cfg"),
            indoc! {r#"
                [metadata]
                name = myproject

                [tool:cookiecutter_context]
                project_dest = myproject
            "#},
        )
        .unwrap();

        let context = SetupCfg.read(dir.path()).unwrap();
        assert_eq!(context.get("project_dest"), Some(&"myproject".to_owned()));
        assert_eq!(context.get("name"), None);
    }

    #[test]
    fn isolated_config_points_into_config_home() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = CookiecutterCli.write_isolated_config(dir.path()).unwrap();

        let contents = fs::read_to_string(config_path).unwrap();
        assert!(contents.contains("cookiecutters_dir"));
        assert!(contents.contains("replay_dir"));
        assert!(contents.contains(&dir.path().display().to_string()));
    }

    #[test]
    fn unknown_context_source_fails_resolution() {
        let error = context_source_from_name("pyproject_toml").unwrap_err();
        assert_eq!(error.capability, "cookiecutter context source");
        assert_eq!(error.known, vec!["scaraplate_conf", "setup_cfg"]);
    }
}
