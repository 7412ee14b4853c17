//! # goven CLI Entry Point
//!
//! Parses arguments with clap, folds them over `goven.toml`, and hands an
//! immutable [`VendorOptions`] to the vendoring pipeline.
//!
//! ## Commands
//!
//! - `vendor` - vendor dependencies into the module
//! - `release` - vendor, then commit/tag/push the result
//! - `completion` - shell completion scripts
//!
//! Any failure prints one line to stderr and exits with status 1.

use anyhow::{Context, Result, bail};
use clap::error::ErrorKind;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::*;
use std::path::PathBuf;

use goven::config::{GovenConfig, VendorFlags};
use goven::release::{self, Credentials, Publisher, ReleaseTarget};
use goven::rewrite::RewriteMode;
use goven::{VendorOptions, VendorReport, Vendorer, ui};

#[derive(Parser)]
#[command(name = "goven")]
#[command(about = "Vendor Go module dependencies into the module itself", version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
struct Cli {
    /// Read settings from this file instead of ./goven.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Vendor replaced (and optionally all required) modules into the module
    Vendor(VendorArgs),
    /// Vendor, then publish the result to the module's git repository
    Release {
        #[command(flatten)]
        vendor: VendorArgs,
        #[command(flatten)]
        release: ReleaseArgs,
    },
    /// Generate shell completion scripts
    Completion { shell: Shell },
}

#[derive(Args)]
struct VendorArgs {
    /// Location of go.mod to be vendored [default: ./go.mod]
    #[arg(long)]
    module: Option<PathBuf>,
    /// Vendor required modules too (run "go mod vendor" first)
    #[arg(long)]
    required: bool,
    /// Path where to put the vendored module [default: ./out]
    #[arg(long)]
    out: Option<PathBuf>,
    /// Vendor in place instead of copying to --out
    #[arg(long, conflicts_with = "out")]
    in_place: bool,
    /// Internal path where vendored modules are placed [default: goven]
    #[arg(long = "vendor")]
    vendor_folder: Option<String>,
    /// Name of the module after vendoring
    #[arg(long)]
    name: Option<String>,
    /// Folder to leave out when copying the module (repeatable)
    #[arg(long)]
    ignore: Vec<String>,
    /// Filename glob to leave out of vendored modules (repeatable)
    #[arg(long)]
    exclude: Vec<String>,
    /// Filename glob of files whose references are rewritten [default: *.go]
    #[arg(long = "pattern")]
    patterns: Vec<String>,
    /// How references are rewritten [default: text]
    #[arg(long, value_enum)]
    rewrite: Option<RewriteMode>,
    /// Skip "go mod tidy" after vendoring
    #[arg(long)]
    no_tidy: bool,
    /// List every rewritten file
    #[arg(short, long)]
    verbose: bool,
}

impl VendorArgs {
    fn into_flags(self) -> VendorFlags {
        VendorFlags {
            module: self.module,
            out: self.out,
            in_place: self.in_place,
            folder: self.vendor_folder,
            name: self.name,
            required: self.required,
            ignore: self.ignore,
            exclude: self.exclude,
            patterns: self.patterns,
            rewrite: self.rewrite,
            no_tidy: self.no_tidy,
            verbose: self.verbose,
        }
    }
}

#[derive(Args)]
struct ReleaseArgs {
    /// Version to release, in format vMAJOR.MINOR.PATCH
    #[arg(long)]
    version: Option<String>,
    /// Repository to push to [default: https://<module path>.git]
    #[arg(long)]
    repository: Option<String>,
    /// Destination inside the repository [default: major version suffix or .]
    #[arg(long)]
    path: Option<String>,
    /// Commit author name (a readable name, not a user name)
    #[arg(long, env = "GITHUB_NAME", hide_env_values = true)]
    github_name: Option<String>,
    /// Commit author email
    #[arg(long, env = "GITHUB_EMAIL", hide_env_values = true)]
    github_email: Option<String>,
    /// Account used for push
    #[arg(long, env = "GITHUB_USER", hide_env_values = true)]
    github_user: Option<String>,
    /// Token used for push
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,
}

impl ReleaseArgs {
    fn credentials(&self) -> Result<Credentials> {
        fn required(value: &Option<String>, flag: &str, env: &str) -> Result<String> {
            match value.as_deref().map(str::trim) {
                Some(v) if !v.is_empty() => Ok(v.to_string()),
                _ => bail!(
                    "argument \"{}\" has to be provided or set via environment variable \"{}\"",
                    flag,
                    env
                ),
            }
        }
        Ok(Credentials {
            name: required(&self.github_name, "github-name", "GITHUB_NAME")?,
            email: required(&self.github_email, "github-email", "GITHUB_EMAIL")?,
            user: required(&self.github_user, "github-user", "GITHUB_USER")?,
            token: required(&self.github_token, "github-token", "GITHUB_TOKEN")?,
        })
    }
}

fn parse_cli() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            let _ = err.print();
            std::process::exit(1);
        }
    }
}

fn main() {
    let cli = parse_cli();
    if let Err(err) = run(cli) {
        eprintln!("{} {:#}", "error:".red().bold(), err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Vendor(args) => {
            let config = GovenConfig::discover(cli.config.as_deref())?;
            let options = VendorOptions::resolve(args.into_flags(), &config.vendor);
            vendor(options)?;
            Ok(())
        }

        Commands::Release {
            vendor: args,
            release: release_args,
        } => {
            let config = GovenConfig::discover(cli.config.as_deref())?;
            // fail on bad release arguments before anything is written
            let credentials = release_args.credentials()?;
            if let Some(tag) = &release_args.version {
                release::validate_tag(tag)?;
            }
            let options = VendorOptions::resolve(args.into_flags(), &config.vendor);
            let report = vendor(options)?;

            let derived = ReleaseTarget::for_module(&report.module_path);
            let target = ReleaseTarget {
                repository: release_args
                    .repository
                    .or(config.release.repository)
                    .unwrap_or(derived.repository),
                path: release_args
                    .path
                    .or(config.release.path)
                    .unwrap_or(derived.path),
            };
            println!(
                "{} Releasing {} to {} ({})",
                "🚀".cyan(),
                report.module_path.bold(),
                target.repository,
                target.path
            );
            Publisher::new(target, release_args.version, credentials)
                .publish(&report.module_dir)
                .context("saving to git repository failed")?;
            Ok(())
        }

        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "goven", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn vendor(options: VendorOptions) -> Result<VendorReport> {
    let report = Vendorer::new(options).run().context("vendoring failed")?;

    for path in &report.skipped {
        println!("{} Not vendored: {}", "!".yellow(), path);
    }
    let table = ui::vendor_summary(&report);
    if !table.is_empty() {
        table.print();
    }
    Ok(report)
}
