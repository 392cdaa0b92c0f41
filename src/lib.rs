// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Roll up cookiecutter template updates into existing projects.
//!
//! A project generated from a cookiecutter template drifts: the template
//! grows new lint rules, CI tweaks, and packaging fixes, while the project
//! accumulates local modifications that must not be thrown away. Scaraplate
//! re-renders the template and reconciles every rendered file into the
//! target project through a per-file, configurable __merge strategy__
//! instead of blindly overwriting.
//!
//! Which strategy governs which file is declared in the template's
//! `scaraplate.toml` (see [`config`]). The strategies themselves live in
//! [`strategy`], the template's git metadata handling in [`template`], the
//! cookiecutter collaborators in [`cookiecutter`], and the end-to-end run
//! in [`rollup`].

pub mod config;
pub mod cookiecutter;
pub mod rollup;
pub mod strategy;
pub mod template;

pub use crate::rollup::{rollup, rollup_with, RollupError};
