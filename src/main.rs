// src/main.rs

use addonry::config::Config;
use addonry::manifest::ManifestStore;
use addonry::reconcile::{run_batch, Operation, Reconciler};
use addonry::remote::CurseClient;
use addonry::verify::{self, Health};
use anyhow::{anyhow, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Parser)]
#[command(name = "addonry")]
#[command(author, version, about = "World of Warcraft addon manager with content-verified manifests", long_about = None)]
struct Cli {
    /// Config file path (default: platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Manifest cache directory (default: platform cache directory)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Install addons and start tracking them
    Install {
        /// Addon names as the distribution site knows them
        #[arg(required = true)]
        addons: Vec<String>,
    },
    /// Update addons to their latest release
    Update {
        /// Addon names (omit with --all to update everything tracked)
        #[arg(required_unless_present = "all")]
        addons: Vec<String>,
        /// Update all tracked addons
        #[arg(long, conflicts_with = "addons")]
        all: bool,
    },
    /// Remove addons and stop tracking them
    Remove {
        /// Addon names to remove
        #[arg(required = true)]
        addons: Vec<String>,
    },
    /// List tracked addons and their installed versions
    List,
    /// Verify installed files against their recorded digests
    Verify {
        /// Addon names (verifies all tracked addons if omitted)
        addons: Vec<String>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        shell: Shell,
    },
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Some(Commands::Completions { shell }) = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "addonry", &mut std::io::stdout());
        return Ok(());
    }

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::default_path()
            .ok_or_else(|| anyhow!("Unable to determine the config directory"))?,
    };
    let mut config = Config::load(&config_path)?;
    let config_before = config.clone();

    if !config.game_dir_looks_valid() {
        warn!(
            "No WoW installation found at {}",
            config.game_dir.display()
        );
    }

    let store_root = match &cli.cache_dir {
        Some(path) => path.clone(),
        None => Config::default_store_root()
            .ok_or_else(|| anyhow!("Unable to determine the cache directory"))?,
    };
    let store = ManifestStore::new(store_root);

    match cli.command {
        Some(Commands::Install { addons }) => {
            let reconciler = Reconciler::new(CurseClient::new()?, store, config.addons_dir());
            let reports = run_batch(&reconciler, Operation::Install, &addons, &mut config);

            for report in &reports {
                println!("{}: {}", report.addon, report.status);
            }

            save_config_if_changed(&config, &config_before, &config_path)?;
            fail_if_nothing_succeeded(&reports)
        }
        Some(Commands::Update { addons, all }) => {
            let addons = if all { config.addons.clone() } else { addons };
            if addons.is_empty() {
                println!("No addons are tracked yet. Run 'addonry install <addon>' first.");
                return Ok(());
            }

            let reconciler = Reconciler::new(CurseClient::new()?, store, config.addons_dir());
            let reports = run_batch(&reconciler, Operation::Update, &addons, &mut config);

            for report in &reports {
                println!("{}: {}", report.addon, report.status);
            }

            save_config_if_changed(&config, &config_before, &config_path)?;
            fail_if_nothing_succeeded(&reports)
        }
        Some(Commands::Remove { addons }) => {
            let reconciler = Reconciler::new(CurseClient::new()?, store, config.addons_dir());
            let reports = run_batch(&reconciler, Operation::Remove, &addons, &mut config);

            for report in &reports {
                println!("{}: {}", report.addon, report.status);
            }

            save_config_if_changed(&config, &config_before, &config_path)?;
            fail_if_nothing_succeeded(&reports)
        }
        Some(Commands::List) => {
            if config.addons.is_empty() {
                println!("No addons tracked.");
                return Ok(());
            }

            println!("Tracked addons:");
            for addon in &config.addons {
                match store.load(addon) {
                    Ok(Some(manifest)) => println!(
                        "  {} {} ({} files)",
                        addon,
                        manifest.version(),
                        manifest.len()
                    ),
                    Ok(None) => println!("  {} (not installed)", addon),
                    Err(e) => println!("  {} (manifest unreadable: {})", addon, e),
                }
            }
            println!("\nTotal: {} addon(s)", config.addons.len());
            Ok(())
        }
        Some(Commands::Verify { addons }) => {
            let addons = if addons.is_empty() {
                config.addons.clone()
            } else {
                addons
            };
            if addons.is_empty() {
                println!("No addons tracked.");
                return Ok(());
            }

            let install_root = config.addons_dir();
            for addon in &addons {
                match store.load(addon) {
                    Ok(Some(manifest)) => {
                        match verify::verify(&manifest, &install_root)? {
                            Health::Intact => {
                                println!("{}: ok ({} files)", addon, manifest.len())
                            }
                            Health::Broken(reason) => println!("{}: broken ({})", addon, reason),
                        }
                    }
                    Ok(None) => println!("{}: not installed", addon),
                    Err(e) => println!("{}: manifest unreadable ({})", addon, e),
                }
            }
            Ok(())
        }
        Some(Commands::Completions { .. }) => unreachable!("handled above"),
        None => {
            // No command provided, show help
            println!("Addonry v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'addonry --help' for usage information");
            Ok(())
        }
    }
}

/// The config is written back once at process end, and only when a
/// batch actually changed the tracked set.
fn save_config_if_changed(config: &Config, before: &Config, path: &Path) -> Result<()> {
    if config != before {
        config.save(path)?;
    }
    Ok(())
}

/// Per-addon failures are reported inline and do not fail the process
/// unless every requested addon failed.
fn fail_if_nothing_succeeded(reports: &[addonry::reconcile::AddonReport]) -> Result<()> {
    if !reports.is_empty() && reports.iter().all(|r| r.is_failure()) {
        return Err(anyhow!("All {} requested addon(s) failed", reports.len()));
    }
    Ok(())
}
