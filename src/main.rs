mod batch;
mod client;
mod config;
mod executor;
mod inventory;
mod manifest;
mod report;
mod validate;

use crate::batch::BatchBuilder;
use crate::client::ApiClient;
use crate::config::{EffectiveConfig, Overrides, Scope, resolve, save};
use crate::inventory::{InventoryIndex, Organization, select_organization};
use crate::report::Table;
use anyhow::{Context, Result};
use clap::{ArgAction, CommandFactory, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "bonjourctl",
    version,
    about = "Bulk-configure Meraki wireless Bonjour forwarding from a CSV manifest"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "Dashboard API key for this invocation (otherwise env or config)"
    )]
    api_key: Option<String>,

    #[arg(
        long,
        global = true,
        value_name = "URL",
        help = "Base URL for the API (defaults to https://api.meraki.com/api/v1)"
    )]
    base_url: Option<String>,

    #[arg(
        long,
        global = true,
        value_name = "ID_OR_NAME",
        help = "Organization to work against (required when the key sees several)"
    )]
    org: Option<String>,

    #[arg(
        long,
        short = 'o',
        value_enum,
        default_value_t = OutputFormat::Pretty,
        global = true,
        help = "Output format"
    )]
    output: OutputFormat,

    #[arg(
        long,
        short = 'v',
        action = ArgAction::Count,
        global = true,
        help = "More log output on stderr (-v info, -vv debug); RUST_LOG wins when set"
    )]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Persist an API key to the chosen scope (--base-url and --org are stored too when given)
    Configure {
        #[arg(long)]
        key: String,
        #[arg(
            long,
            value_enum,
            default_value_t = ScopeArg::User,
            help = "Where to write the config (local project dir or user config dir)"
        )]
        scope: ScopeArg,
    },
    /// Show current configuration (secrets masked)
    ConfigShow,
    /// List organizations visible to the API key
    Orgs,
    /// List wireless networks with their SSID names and slots
    Inventory,
    /// Validate a CSV manifest against the inventory and apply it
    Apply {
        #[arg(value_name = "CSV")]
        csv: PathBuf,
        #[arg(long, help = "Validate and show the planned updates without applying them")]
        dry_run: bool,
    },
    /// Generate shell completion scripts
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Pretty,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ScopeArg {
    Local,
    User,
}

impl From<ScopeArg> for Scope {
    fn from(value: ScopeArg) -> Self {
        match value {
            ScopeArg::Local => Scope::Local,
            ScopeArg::User => Scope::User,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let cwd = std::env::current_dir().context("reading current directory")?;

    match &cli.command {
        Commands::Configure { key, scope } => {
            let mut existing = config::load_scope((*scope).into(), &cwd)?;
            existing.api_key = Some(key.clone());
            if let Some(url) = cli.base_url.clone() {
                existing.base_url = Some(url);
            }
            if let Some(org) = cli.org.clone() {
                existing.org = Some(org);
            }

            let path = save((*scope).into(), &existing, &cwd)?;
            println!("Saved API key to {}", path.display());
        }
        Commands::ConfigShow => {
            let mut masked = config::load(&cwd)?;
            if masked.api_key.is_some() {
                masked.api_key = Some("*****".into());
            }
            println!("{}", serde_json::to_string_pretty(&masked)?);
        }
        Commands::Completion { shell } => print_completion(*shell),
        Commands::Orgs => {
            let (client, _) = dashboard(&cli, &cwd)?;
            let orgs = connect(&client)?;
            match cli.output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&orgs)?),
                OutputFormat::Pretty => {
                    let mut table = Table::new(["Name", "ID"]);
                    for org in orgs {
                        table.push_row(vec![org.name, org.id]);
                    }
                    print!("{}", table.render());
                }
            }
        }
        Commands::Inventory => {
            let (client, effective) = dashboard(&cli, &cwd)?;
            let org = select_organization(connect(&client)?, effective.org.as_deref())?;
            let index = InventoryIndex::build(&client, &org.id)
                .with_context(|| format!("collecting networks for {}", org.name))?;
            if index.is_empty() {
                warn!(org = %org.name, "organization has no wireless networks");
            }
            match cli.output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&index)?),
                OutputFormat::Pretty => {
                    let mut table = Table::new(["Network Name", "Network ID", "SSID Name", "Slot"]);
                    for (name, entry) in index.networks() {
                        for (ssid, slot) in &entry.ssids {
                            table.push_row(vec![
                                name.to_string(),
                                entry.id.clone(),
                                ssid.clone(),
                                slot.to_string(),
                            ]);
                        }
                    }
                    print!("{}", table.render());
                }
            }
        }
        Commands::Apply { csv, dry_run } => {
            let (client, effective) = dashboard(&cli, &cwd)?;
            run_apply(&client, effective.org.as_deref(), csv, *dry_run, cli.output)?;
        }
    }

    Ok(())
}

/// Merge flags, env and config files, then build a client from the result.
fn dashboard(cli: &Cli, cwd: &Path) -> Result<(ApiClient, EffectiveConfig)> {
    let effective = resolve(
        cwd,
        Overrides {
            api_key: cli.api_key.clone(),
            base_url: cli.base_url.clone(),
            org: cli.org.clone(),
        },
    )?;
    let client = ApiClient::new(&effective.base_url, &effective.api_key)?;
    Ok((client, effective))
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Failing to list organizations means bad credentials or no connectivity; nothing else can run.
fn connect(client: &ApiClient) -> Result<Vec<Organization>> {
    let orgs = client
        .organizations()
        .context("failed to connect to the Meraki dashboard")?;
    info!(count = orgs.len(), "connected to Meraki dashboard");
    Ok(orgs)
}

fn run_apply(
    client: &ApiClient,
    org: Option<&str>,
    csv: &Path,
    dry_run: bool,
    output: OutputFormat,
) -> Result<()> {
    let rows = manifest::read_path(csv)?;

    let org = select_organization(connect(client)?, org)?;
    info!(org = %org.name, id = %org.id, "using organization");
    let index = InventoryIndex::build(client, &org.id)
        .with_context(|| format!("collecting networks for {}", org.name))?;
    if index.is_empty() {
        warn!(org = %org.name, "organization has no wireless networks; every row will be rejected");
    }

    let (batch, summary) = rows
        .iter()
        .map(|row| validate::validate(row, &index))
        .collect::<BatchBuilder>()
        .finish();

    let pretty = output == OutputFormat::Pretty;
    if pretty {
        println!("{}", report::validation_headline(&summary));
        if summary.rejected_count() > 0 {
            print!("{}", report::rejection_table(&summary).render());
        }
    }

    if dry_run || batch.is_empty() {
        if pretty {
            if batch.is_empty() {
                println!("Nothing to update.");
            } else {
                println!(
                    "Dry run: {} update(s) would be sent.",
                    batch.group_count()
                );
                print!("{}", report::plan_table(&batch, &index).render());
            }
        } else {
            let doc = report::run_json(&summary, &batch, None);
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        return Ok(());
    }

    let failures = executor::apply_with(&batch, client);

    if pretty {
        if failures.is_empty() {
            println!("All changes processed successfully.");
        } else {
            println!("{} changes had errors.", failures.len());
            print!("{}", report::failure_table(&failures, &index).render());
        }
    } else {
        let doc = report::run_json(&summary, &batch, Some(&failures));
        println!("{}", serde_json::to_string_pretty(&doc)?);
    }

    Ok(())
}

fn print_completion(shell: CompletionShell) {
    use clap_complete::{generate, shells};
    let mut cmd = Cli::command();
    let bin = cmd.get_name().to_string();
    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, bin, &mut std::io::stdout()),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, bin, &mut std::io::stdout()),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, bin, &mut std::io::stdout()),
        CompletionShell::PowerShell => {
            generate(shells::PowerShell, &mut cmd, bin, &mut std::io::stdout())
        }
    }
}
