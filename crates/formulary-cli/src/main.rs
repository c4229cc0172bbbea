//! Formulary CLI
//!
//! A thin wrapper around the formulary library.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use formulary::{FormulaLoader, FormulaMap, LoadOptions, TranslationPolicy, render_instructions};

#[derive(Parser)]
#[command(name = "formulary")]
#[command(about = "Static loader for Homebrew-style formula recipes")]
#[command(after_help = "\
EXAMPLES:
    # A formula and its runtime dependencies, as JSON
    formulary load Formula/jq.rb

    # Keep metadata for formulae whose install method cannot be translated
    formulary load --lenient Formula/jq.rb

    # Also follow dependencies declared in `on_linux` blocks
    formulary load --platform linux Formula/jq.rb

    # Install steps of every formula in a directory
    formulary steps 'Formula/*.rb'
")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a recipe and its runtime dependency closure
    Load {
        /// Root recipe file
        path: PathBuf,

        /// Only the given file, without dependencies
        #[arg(long)]
        single: bool,

        /// Single-line JSON
        #[arg(long)]
        compact: bool,

        #[command(flatten)]
        options: LoaderArgs,
    },

    /// Print the translated install steps of matching recipes
    Steps {
        /// Recipe files or glob patterns
        #[arg(required = true)]
        patterns: Vec<String>,

        /// Print the instruction list as JSON instead of text
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        options: LoaderArgs,
    },
}

#[derive(Args)]
struct LoaderArgs {
    /// Keep metadata when the install method cannot be translated
    #[arg(long)]
    lenient: bool,

    /// Longest dependency chain to follow
    #[arg(long, default_value = "64")]
    max_depth: usize,

    /// Recipe file extension
    #[arg(long, default_value = "rb")]
    extension: String,

    /// Follow runtime dependencies of this platform's blocks (repeatable)
    #[arg(long = "platform", value_name = "PLATFORM")]
    platforms: Vec<String>,
}

impl LoaderArgs {
    fn loader(&self) -> FormulaLoader {
        let policy = if self.lenient {
            TranslationPolicy::KeepMetadata
        } else {
            TranslationPolicy::Fail
        };
        let options = self.platforms.iter().fold(
            LoadOptions::new()
                .with_extension(&self.extension)
                .with_max_depth(self.max_depth)
                .with_translation_policy(policy),
            |options, platform| options.with_platform(platform),
        );
        FormulaLoader::new().with_options(options)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::Load {
            path,
            single,
            compact,
            options,
        } => load(path, single, compact, &options),
        Command::Steps {
            patterns,
            json,
            options,
        } => steps(&patterns, json, &options),
    }
}

fn load(path: PathBuf, single: bool, compact: bool, options: &LoaderArgs) -> anyhow::Result<()> {
    let loader = options.loader();
    let mut formulae = FormulaMap::new();
    if single {
        let record = loader.load_file(&path)?;
        formulae.insert(record.name.clone(), record);
    } else {
        loader.load_closure(&path, &mut formulae)?;
    }

    let json = if compact {
        serde_json::to_string(&formulae)?
    } else {
        serde_json::to_string_pretty(&formulae)?
    };
    println!("{json}");
    Ok(())
}

fn steps(patterns: &[String], json: bool, options: &LoaderArgs) -> anyhow::Result<()> {
    let loader = options.loader();
    let paths = expand(patterns)?;
    if paths.is_empty() {
        anyhow::bail!("no recipe files match {}", patterns.join(" "));
    }

    for path in paths {
        let record = loader.load_file(&path)?;
        let Some(install) = record.install else {
            log::warn!(
                "{}: no install steps ({})",
                record.name,
                record.install_error.as_deref().unwrap_or("not translated")
            );
            continue;
        };
        if json {
            println!("{}", serde_json::to_string(&install)?);
        } else {
            println!("# {} ({})", record.name, path.display());
            print!("{}", render_instructions(&install));
        }
    }
    Ok(())
}

/// Existing files matching each pattern, in pattern order.
fn expand(patterns: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for pattern in patterns {
        let matches =
            glob::glob(pattern).with_context(|| format!("invalid glob pattern `{pattern}`"))?;
        let before = paths.len();
        for entry in matches {
            paths.push(entry?);
        }
        if paths.len() == before {
            log::debug!("`{pattern}` matched nothing");
        }
    }
    Ok(paths)
}
