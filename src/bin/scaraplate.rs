// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use scaraplate::rollup;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::{path::PathBuf, process::exit};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "scaraplate rollup [options] <template_dir> <target_project_dir>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        match self.command {
            Command::Rollup(opts) => run_rollup(opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Render the template and reconcile it into the target project.
    #[command(override_usage = "scaraplate rollup [options] <template_dir> <target_project_dir>")]
    Rollup(RollupOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct RollupOptions {
    /// Path to the template directory (a git repository containing
    /// scaraplate.toml).
    #[arg(value_name = "template_dir")]
    pub template_dir: PathBuf,

    /// Path to the target project directory to sync.
    #[arg(value_name = "target_project_dir")]
    pub target_project_dir: PathBuf,

    /// Suppress interactive prompts; fail instead if required context is
    /// missing.
    #[arg(long)]
    pub no_input: bool,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn run_rollup(opts: RollupOptions) -> Result<()> {
    rollup(opts.template_dir, opts.target_project_dir, opts.no_input)?;
    Ok(())
}
