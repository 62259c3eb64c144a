//! vpkg subcommands
//!
//! Each command builds what it needs from the session settings, calls into
//! `vpkg_core` and prints the result as a table, plain text or JSON.

use anyhow::{Context, Result};
use clap::Subcommand;
use std::io::IsTerminal;
use std::path::PathBuf;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

use vpkg_core::config::interactive_progress_enabled;
use vpkg_core::hooks::{exec, SyncCapabilityRunner};
use vpkg_core::installer::{spawn_install, InstallPlan, InstallReceipt};
use vpkg_core::registry::{PackageFilter, PackageKind};
use vpkg_core::updates::{UpdateChecker, UpdateStatus};
use vpkg_core::{
    InstallOptions, InstallOutcome, InstalledIndex, Installer, PackageResolver, RegistryClient,
    Settings, Uninstaller,
};

use crate::progress;

/// Everything a command needs, resolved once per invocation
pub struct Session {
    pub project_root: PathBuf,
    pub settings: Settings,
}

impl Session {
    fn client(&self) -> Result<RegistryClient> {
        RegistryClient::new(&self.settings).context("Failed to create registry client")
    }

    fn install_root(&self) -> PathBuf {
        self.project_root.join(&self.settings.install_root)
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List packages available in the registry
    List {
        /// Search query (matches name, title, description and tags)
        query: Option<String>,

        /// Only packages of this type (library-module, cli-command)
        #[clap(long = "type", value_parser = parse_kind)]
        kind: Option<PackageKind>,

        /// Only packages carrying any of these tags (comma-separated)
        #[clap(long, value_delimiter = ',')]
        tag: Vec<String>,

        /// Output results as JSON
        #[clap(long)]
        json: bool,
    },

    /// Install a package into the project
    #[clap(alias = "install")]
    Add {
        /// Package specifier, e.g. acme/redis-cache or acme/redis-cache@1.2.0
        package: String,

        /// Overwrite an existing installation
        #[clap(long, short)]
        force: bool,

        /// Show what would be installed without writing anything
        #[clap(long)]
        dry_run: bool,

        /// Install to this directory (must be under the install root)
        #[clap(long)]
        dest: Option<PathBuf>,

        /// Version to record (a @version suffix on the specifier wins)
        #[clap(long)]
        version: Option<String>,

        /// Output the result as JSON
        #[clap(long)]
        json: bool,
    },

    /// Remove an installed package
    #[clap(alias = "rm")]
    Remove {
        /// Package name, e.g. acme/redis-cache
        package: String,

        /// Move the package aside instead of deleting it
        #[clap(long)]
        backup: bool,
    },

    /// List installed packages
    #[clap(alias = "list-installed")]
    Installed {
        /// Output results as JSON
        #[clap(long)]
        json: bool,
    },

    /// Run an installed cli-command package
    Exec {
        /// Package name
        package: String,

        /// Arguments passed to the command
        #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Run the sync hooks of every installed package
    Sync,

    /// Compare installed packages with the registry
    Outdated {
        /// Packages to check (all installed packages if omitted)
        packages: Vec<String>,

        /// Output results as JSON
        #[clap(long)]
        json: bool,
    },
}

fn parse_kind(s: &str) -> Result<PackageKind, String> {
    s.parse::<PackageKind>().map_err(|e| e.to_string())
}

impl Command {
    /// Run the command, returning the process exit code
    pub async fn execute(self, session: Session) -> Result<i32> {
        match self {
            Command::List {
                query,
                kind,
                tag,
                json,
            } => {
                let filter = PackageFilter {
                    kind,
                    tags: tag,
                    query,
                };
                execute_list(&session, &filter, json).await?;
            }
            Command::Add {
                package,
                force,
                dry_run,
                dest,
                version,
                json,
            } => {
                let options = InstallOptions {
                    destination: dest,
                    force,
                    dry_run,
                    version,
                };
                execute_add(&session, package, options, json).await?;
            }
            Command::Remove { package, backup } => execute_remove(&session, &package, backup)?,
            Command::Installed { json } => execute_installed(&session, json)?,
            Command::Exec { package, args } => return execute_exec(&session, &package, &args).await,
            Command::Sync => execute_sync(&session).await?,
            Command::Outdated { packages, json } => {
                execute_outdated(&session, &packages, json).await?
            }
        }
        Ok(0)
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

fn render_table<T: Tabled>(rows: &[T]) -> String {
    Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string()
}

/// Table row for available packages
#[derive(Tabled)]
struct AvailableRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Repository")]
    repository: String,
    #[tabled(rename = "Description")]
    description: String,
}

async fn execute_list(session: &Session, filter: &PackageFilter, json_output: bool) -> Result<()> {
    let client = session.client()?;
    let packages = PackageResolver::new(&client).list_available(filter).await?;

    if json_output {
        let json_results: Vec<serde_json::Value> = packages
            .iter()
            .map(|p| {
                serde_json::json!({
                    "repository": p.repository,
                    "name": p.descriptor.name,
                    "title": p.descriptor.title,
                    "version": p.descriptor.version,
                    "type": p.descriptor.kind.as_str(),
                    "tags": p.descriptor.tags,
                    "description": p.descriptor.description,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&json_results)?);
        return Ok(());
    }

    if packages.is_empty() {
        println!("No packages found.");
        return Ok(());
    }

    let rows: Vec<AvailableRow> = packages
        .iter()
        .map(|p| AvailableRow {
            name: p.descriptor.name.clone(),
            version: p.descriptor.version.clone(),
            kind: p.descriptor.kind.to_string(),
            repository: p.repository.clone(),
            description: truncate(p.descriptor.short_description(), 50),
        })
        .collect();

    println!("Found {} package(s):\n", packages.len());
    println!("{}", render_table(&rows));
    Ok(())
}

async fn execute_add(
    session: &Session,
    package: String,
    options: InstallOptions,
    json_output: bool,
) -> Result<()> {
    let installer = Installer::new(session.client()?, &session.project_root);
    let interactive =
        !json_output && !options.dry_run && interactive_progress_enabled(std::io::stdout().is_terminal());

    let outcome = if interactive {
        progress::follow(spawn_install(installer, package.clone(), options)).await?
    } else {
        installer.install(&package, &options).await?
    };

    match outcome {
        InstallOutcome::Installed(receipt) if json_output => {
            println!("{}", serde_json::to_string_pretty(&receipt)?)
        }
        InstallOutcome::DryRun(plan) if json_output => {
            println!("{}", serde_json::to_string_pretty(&plan)?)
        }
        InstallOutcome::Installed(receipt) => print_receipt(session, &receipt),
        InstallOutcome::DryRun(plan) => print_plan(session, &plan),
    }
    Ok(())
}

fn display_path(session: &Session, path: &std::path::Path) -> String {
    path.strip_prefix(&session.project_root)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn print_receipt(session: &Session, receipt: &InstallReceipt) {
    println!(
        "Installed {} v{} ({}) from '{}'",
        receipt.name, receipt.version, receipt.kind, receipt.repository
    );
    println!("Location: {}/", display_path(session, &receipt.destination));
    println!();
    println!("Files ({} via {}):", receipt.files.len(), receipt.discovered_by);
    for file in &receipt.files {
        let marker = if file.rendered { " (rendered)" } else { "" };
        println!("  {}{}", file.path, marker);
    }
    println!();
    println!("{}", receipt.usage);
}

fn print_plan(session: &Session, plan: &InstallPlan) {
    println!("Dry run: nothing was written.\n");
    println!("Package:     {} v{} ({})", plan.name, plan.version, plan.kind);
    println!("Repository:  {}", plan.repository);
    println!("Destination: {}/", display_path(session, &plan.destination));
    println!("Record:      {}", display_path(session, &plan.record_path));
    println!("Module:      {}", plan.context.module);
    if plan.overwrites {
        println!("\nWarning: destination already contains files; use --force to overwrite.");
    }
}

fn execute_remove(session: &Session, package: &str, backup: bool) -> Result<()> {
    let removed = Uninstaller::new(&session.project_root, &session.settings).remove(package, backup)?;

    match &removed.backup {
        Some(backup_path) => println!(
            "Removed '{}' (backup at {})",
            removed.name,
            display_path(session, backup_path)
        ),
        None => println!(
            "Removed '{}' from {}",
            removed.name,
            display_path(session, &removed.path)
        ),
    }
    Ok(())
}

/// Table row for installed packages
#[derive(Tabled)]
struct InstalledRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Installed")]
    installed_at: String,
}

fn execute_installed(session: &Session, json_output: bool) -> Result<()> {
    let index = InstalledIndex::scan(&session.install_root(), &session.settings.metadata_file)?;

    if json_output {
        let records: Vec<_> = index.all().into_iter().map(|p| &p.record).collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if index.is_empty() {
        println!("No packages installed.");
        println!("\nRun 'vpkg list' to find available packages.");
        return Ok(());
    }

    let rows: Vec<InstalledRow> = index
        .all()
        .into_iter()
        .map(|p| InstalledRow {
            name: p.record.name.clone(),
            version: p.record.version.clone(),
            kind: p.record.kind.to_string(),
            path: display_path(session, &p.dir),
            installed_at: p.record.installed_at.format("%Y-%m-%d").to_string(),
        })
        .collect();

    println!("Installed packages:\n");
    println!("{}", render_table(&rows));
    Ok(())
}

async fn execute_exec(session: &Session, package: &str, args: &[String]) -> Result<i32> {
    let outcome = exec(&session.project_root, &session.settings, package, args).await?;
    tracing::debug!(
        "{} finished in {:.2}s",
        outcome.package,
        outcome.duration.as_secs_f64()
    );
    Ok(outcome.exit_code.unwrap_or(1))
}

async fn execute_sync(session: &Session) -> Result<()> {
    let runner = SyncCapabilityRunner::new(&session.project_root, &session.settings);

    match runner.run_all().await {
        Ok(report) if report.outcomes.is_empty() => {
            println!("No installed package declares a sync hook.");
            Ok(())
        }
        Ok(report) => {
            for outcome in &report.outcomes {
                println!(
                    "Synced {} ({:.1}s)",
                    outcome.package,
                    outcome.duration.as_secs_f64()
                );
            }
            Ok(())
        }
        Err(failure) => {
            for outcome in &failure.completed {
                println!("Synced {}", outcome.package);
            }
            Err(failure.into())
        }
    }
}

/// Table row for update checks
#[derive(Tabled)]
struct OutdatedRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Installed")]
    installed: String,
    #[tabled(rename = "Latest")]
    latest: String,
    #[tabled(rename = "Status")]
    status: String,
}

async fn execute_outdated(session: &Session, packages: &[String], json_output: bool) -> Result<()> {
    let client = session.client()?;
    let checks = UpdateChecker::new(&client, &session.project_root)
        .check(packages)
        .await?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&checks)?);
        return Ok(());
    }

    if checks.is_empty() {
        println!("No packages installed.");
        return Ok(());
    }

    let rows: Vec<OutdatedRow> = checks
        .iter()
        .map(|c| OutdatedRow {
            name: c.name.clone(),
            installed: c.installed.clone(),
            latest: c.latest.clone().unwrap_or_else(|| "-".to_string()),
            status: match c.status {
                UpdateStatus::UpToDate => "up to date",
                UpdateStatus::UpdateAvailable => "update available",
                UpdateStatus::Ahead => "ahead of registry",
                UpdateStatus::NotInRegistry => "not in registry",
            }
            .to_string(),
        })
        .collect();

    println!("{}", render_table(&rows));

    let available = checks
        .iter()
        .filter(|c| c.status == UpdateStatus::UpdateAvailable)
        .count();
    if available > 0 {
        println!("\nRun 'vpkg add <package> --force' to update.");
    }
    Ok(())
}
