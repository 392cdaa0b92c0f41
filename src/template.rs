// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Template version-control metadata.
//!
//! A template is a git repository. Every rollup records which commit of the
//! template it rendered, so strategies like `template_hash` can stamp files
//! with a stable identity and recognize an already-synced target later on.
//!
//! The commit is presented as a browsable URL when the configuration names
//! the remote host type (`git_remote_type` in `scaraplate.toml`). Without
//! one, the bare commit id is used instead, which keeps the trailer
//! contract intact for templates that live nowhere public.

use crate::strategy::ReferenceError;

use git2::{Repository, StatusOptions};
use std::{fmt::Debug, path::Path, sync::Arc};
use tracing::debug;

/// Version-control state of the template at render time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateMeta {
    /// HEAD commit id of the template repository.
    pub commit: String,

    /// Browsable URL of that commit, or the bare commit id when no remote
    /// host type is configured.
    pub commit_url: String,

    /// Whether the template working tree had uncommitted changes.
    pub is_dirty: bool,
}

/// Build browsable commit URLs for a remote host.
pub trait GitRemote: Debug + Send + Sync {
    /// URL of `commit` on the host serving `remote_url`.
    fn commit_url(&self, remote_url: &str, commit: &str) -> String;
}

/// Commit URLs for repositories hosted on GitHub.
#[derive(Debug, Default)]
pub struct GitHub;

impl GitRemote for GitHub {
    fn commit_url(&self, remote_url: &str, commit: &str) -> String {
        format!("{}/commit/{commit}", https_base(remote_url))
    }
}

/// Commit URLs for repositories hosted on GitLab.
#[derive(Debug, Default)]
pub struct GitLab;

impl GitRemote for GitLab {
    fn commit_url(&self, remote_url: &str, commit: &str) -> String {
        format!("{}/-/commit/{commit}", https_base(remote_url))
    }
}

/// Normalize a git remote URL into a browsable https base.
///
/// Handles the scp-like `git@host:owner/repo.git` form and strips a
/// trailing `.git` from https/ssh forms alike.
fn https_base(remote_url: &str) -> String {
    let trimmed = remote_url.trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);

    if let Some(rest) = trimmed.strip_prefix("git@") {
        if let Some((host, path)) = rest.split_once(':') {
            return format!("https://{host}/{path}");
        }
    }

    if let Some(rest) = trimmed.strip_prefix("ssh://git@") {
        return format!("https://{rest}");
    }

    trimmed.to_owned()
}

/// Resolve a `git_remote_type` reference to its implementation.
///
/// # Errors
///
/// - Return [`ReferenceError`] if the name does not match a known remote
///   host type.
pub fn remote_from_name(name: &str) -> Result<Arc<dyn GitRemote>, ReferenceError> {
    match name {
        "github" => Ok(Arc::new(GitHub)),
        "gitlab" => Ok(Arc::new(GitLab)),
        _ => Err(ReferenceError {
            capability: "git remote type",
            reference: name.to_owned(),
            known: vec!["github".to_owned(), "gitlab".to_owned()],
        }),
    }
}

/// Describe the template repository at `template_path`.
///
/// # Errors
///
/// - Return [`TemplateError::Git2`] if the repository cannot be opened or
///   inspected.
/// - Return [`TemplateError::NoOrigin`] if a remote host type is configured
///   but the repository has no usable `origin` remote.
pub fn describe(
    template_path: impl AsRef<Path>,
    remote: Option<&dyn GitRemote>,
) -> Result<TemplateMeta> {
    let repository = Repository::discover(template_path.as_ref())?;
    let commit = repository.head()?.peel_to_commit()?.id().to_string();

    let mut options = StatusOptions::new();
    options.include_untracked(true);
    let is_dirty = !repository.statuses(Some(&mut options))?.is_empty();

    let commit_url = match remote {
        None => commit.clone(),
        Some(remote) => {
            let origin = repository
                .find_remote("origin")
                .map_err(|source| TemplateError::NoOrigin { source })?;
            let url = origin.url().ok_or(TemplateError::OriginUrlNotUtf8)?;
            remote.commit_url(url, &commit)
        }
    };

    debug!("template at {commit_url} (dirty: {is_dirty})");

    Ok(TemplateMeta {
        commit,
        commit_url,
        is_dirty,
    })
}

/// Template metadata error types.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),

    /// A remote host type is configured but `origin` is missing.
    #[error("template repository has no `origin` remote")]
    NoOrigin {
        #[source]
        source: git2::Error,
    },

    /// The `origin` remote URL is not valid UTF-8.
    #[error("template `origin` remote URL is not valid UTF-8")]
    OriginUrlNotUtf8,
}

/// Friendly result alias :3
pub type Result<T, E = TemplateError> = std::result::Result<T, E>;
