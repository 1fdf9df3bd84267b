//! # rgpzip
//!
//! Command-line front end for the RGPZip build recipe.
//!
//! ## Quick Start
//!
//! ```bash
//! # Write a starter build profile
//! rgpzip init
//!
//! # Show the CMake definitions for an Android arm64 build
//! ANDROID_NDK_PATH=/opt/ndk rgpzip definitions --os Android --arch armv8
//!
//! # Configure, build, install and test
//! rgpzip build --dep boost=/opt/deps/boost --dep zlib=/opt/deps/zlib
//!
//! # Preview the CMake commands without running them
//! rgpzip build --os iOS --arch armv8 --dry-run
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `init` | Write a starter `rgpzip.toml` |
//! | `definitions` | Print the CMake definitions for a configuration |
//! | `build` | Configure, build, install and test with CMake |
//! | `package-id` | Print the normalised package id and its hash |
//! | `requirements` | Print build requirements and propagated options |
//! | `info` | Describe an installed package |
//! | `export` | Copy the recipe's source files into a folder |
//!
//! ## Configuration
//!
//! Settings and options are resolved from CLI flags first, then from
//! `rgpzip.toml` (see [`config`]), then from the host. `ANDROID_NDK_PATH`
//! may also be set in a `.env.local` file at the repository root.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

use rgpzip_recipe::builders::{CMakeBuilder, ProcessRunner, TestStatus};
use rgpzip_recipe::{BuildEnv, Definitions, Recipe, export};

pub mod config;

use config::{CONFIG_FILE_NAME, ConfigResolver, OptionArgs, RecipeConfig, SettingsArgs};

/// Configures, builds and packages RGPZip for desktop and mobile targets.
#[derive(Parser, Debug)]
#[command(name = "rgpzip", author, version, about = "RGPZip build recipe", long_about = None)]
struct Cli {
    /// Print what would be done without actually doing it
    #[arg(long, global = true)]
    dry_run: bool,

    /// Print verbose output including all commands
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Path to config file (default: discover rgpzip.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Package version (default: from config, then the tool version)
    #[arg(long, global = true)]
    package_version: Option<String>,

    /// User part of the package namespace
    #[arg(long, global = true)]
    user: Option<String>,

    /// Channel part of the package namespace
    #[arg(long, global = true)]
    channel: Option<String>,

    #[command(flatten)]
    settings: SettingsArgs,

    #[command(flatten)]
    options: OptionArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a starter rgpzip.toml.
    Init {
        #[arg(long, default_value = CONFIG_FILE_NAME)]
        output: PathBuf,
        #[arg(long, help = "Overwrite an existing file")]
        force: bool,
    },
    /// Print the CMake definitions for the resolved configuration.
    Definitions {
        #[arg(long, help = "Print a JSON object instead of KEY=VALUE lines")]
        json: bool,
    },
    /// Configure, build, install and test with CMake.
    Build {
        #[arg(long, help = "Folder containing CMakeLists.txt (default: from config, then .)")]
        source_dir: Option<PathBuf>,
        #[arg(long, help = "CMake build folder (default: from config, then build)")]
        build_dir: Option<PathBuf>,
        #[arg(long, help = "Install prefix (default: from config, then package)")]
        package_dir: Option<PathBuf>,
        #[arg(long = "dep", value_name = "NAME=PATH", help = "Install root of a build requirement")]
        deps: Vec<String>,
        #[arg(long, short = 'G', help = "CMake generator")]
        generator: Option<String>,
        #[arg(long, short = 'j', help = "Parallel build jobs (default: CPU count)")]
        jobs: Option<usize>,
    },
    /// Print the normalised package id and its hash.
    PackageId {
        #[arg(long)]
        json: bool,
    },
    /// Print build requirements and the options propagated to them.
    Requirements,
    /// Describe an installed package.
    Info {
        #[arg(long, help = "Install prefix to inspect (default: from config, then package)")]
        package_dir: Option<PathBuf>,
    },
    /// Copy the recipe's source files into a folder.
    Export {
        #[arg(long)]
        dest: PathBuf,
        #[arg(long, help = "Source tree (default: from config, then .)")]
        source_dir: Option<PathBuf>,
    },
}

pub fn run() -> Result<()> {
    load_dotenv();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let resolver = ConfigResolver::load(cli.config.as_deref())?;
    if let Some(path) = &resolver.config_path {
        log::debug!("Using config file {}", path.display());
    }

    if let Command::Init { output, force } = &cli.command {
        return cmd_init(output, *force, &cli.settings);
    }

    let recipe = resolve_recipe(&cli, &resolver)?;
    let env = BuildEnv::from_process();

    match cli.command {
        Command::Init { .. } => {}
        Command::Definitions { json } => {
            let defs = recipe.definitions(&env)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&definitions_json(&defs))?);
            } else {
                print!("{}", defs);
            }
        }
        Command::Build {
            source_dir,
            build_dir,
            package_dir,
            deps,
            generator,
            jobs,
        } => {
            let layout = resolver.layout(source_dir, build_dir, package_dir);
            let roots = resolver.dependency_roots(&deps)?;
            let mut builder = CMakeBuilder::with_runner(layout, ProcessRunner::new(cli.verbose))
                .verbose(cli.verbose)
                .dry_run(cli.dry_run)
                .generator(generator);
            if let Some(jobs) = jobs {
                builder = builder.jobs(jobs);
            }
            for (name, root) in roots {
                builder = builder.dependency_root(name, root);
            }
            cmd_build(&builder, &recipe, &env, cli.dry_run)?;
        }
        Command::PackageId { json } => {
            let id = recipe.package_id();
            if json {
                let value = json!({
                    "reference": recipe.reference().to_string(),
                    "settings": id.settings,
                    "options": id.options,
                    "hash": id.hash(),
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                print!("{}", id.info_text());
                println!("{}", id.hash());
            }
        }
        Command::Requirements => {
            println!("{}", requirements_json(&recipe));
        }
        Command::Info { package_dir } => {
            let layout = resolver.layout(None, None, package_dir);
            let info = recipe
                .package_info(&layout.package_dir)
                .with_context(|| format!("reading package {}", layout.package_dir.display()))?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Export { dest, source_dir } => {
            let layout = resolver.layout(source_dir, None, None);
            if cli.dry_run {
                println!(
                    "[dry-run] Would export sources from {:?} to {:?}",
                    layout.source_dir, dest
                );
                return Ok(());
            }
            let copied = export::export_sources(&layout.source_dir, &dest)?;
            println!("✓ Exported {} files to {:?}", copied.len(), dest);
        }
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .try_init();
}

fn resolve_recipe(cli: &Cli, resolver: &ConfigResolver) -> Result<Recipe> {
    let settings = resolver.settings(&cli.settings)?;
    let options = resolver.options(&cli.options)?;
    let version = cli
        .package_version
        .clone()
        .or_else(|| resolver.version())
        .unwrap_or_else(|| rgpzip_recipe::VERSION.to_string());
    let namespace = resolver.namespace(cli.user.clone(), cli.channel.clone());

    let recipe = Recipe::new(settings, &options)
        .version(version)
        .namespace(namespace);
    log::debug!(
        "Resolved {} for {} {} ({})",
        recipe.reference(),
        recipe.settings().os.name(),
        recipe.settings().arch,
        recipe.settings().build_type.as_str()
    );
    Ok(recipe)
}

fn cmd_init(output: &Path, force: bool, settings: &SettingsArgs) -> Result<()> {
    if output.exists() && !force {
        bail!(
            "{:?} already exists. Use --force to overwrite it.",
            output
        );
    }
    let os = settings
        .os
        .clone()
        .unwrap_or_else(|| rgpzip_recipe::Os::host().name().to_string());
    std::fs::write(output, RecipeConfig::generate_starter_toml(&os))
        .with_context(|| format!("writing {:?}", output))?;
    println!("Wrote starter config to {:?}", output);
    Ok(())
}

fn cmd_build(
    builder: &CMakeBuilder<ProcessRunner>,
    recipe: &Recipe,
    env: &BuildEnv,
    dry_run: bool,
) -> Result<()> {
    println!("Building {}", recipe.reference());
    let result = builder.build(recipe, env)?;

    if dry_run {
        for invocation in &result.invocations {
            println!("  [dry-run] {}", invocation);
        }
        println!("\n[dry-run] Build simulation completed. No changes were made.");
        return Ok(());
    }

    println!("\n✓ Build completed!");
    println!("  Package id: {}", result.package_id);
    match result.tests {
        TestStatus::Passed => println!("  Tests: passed"),
        TestStatus::SkippedCrossBuilding => println!("  Tests: skipped (cross-building)"),
        TestStatus::NotBuilt => println!("  Tests: not built for this target"),
        TestStatus::DryRun => {}
    }
    if let Some(info) = &result.cpp_info {
        println!("  Libraries: {}", info.libs.join(", "));
    }
    if let Some(path) = &result.manifest_path {
        println!("  Manifest: {:?}", path);
    }
    Ok(())
}

fn definitions_json(defs: &Definitions) -> Value {
    let map = defs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect::<serde_json::Map<_, _>>();
    Value::Object(map)
}

fn requirements_json(recipe: &Recipe) -> Value {
    let requires: Vec<String> = recipe
        .build_requirements()
        .iter()
        .map(ToString::to_string)
        .collect();
    json!({
        "build_requires": requires,
        "options": recipe.configure(),
    })
}

fn load_dotenv() {
    if let Some(root) = repo_root() {
        let _ = dotenvy::from_path(root.join(".env.local"));
    }
}

fn repo_root() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;
    loop {
        if current.join(".git").exists() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}
