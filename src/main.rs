use clap::{Parser, Subcommand};
use colored::Colorize;
use m365diag::{cmd, error};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "m365diag",
    about = "Diagnostics and reports for Microsoft 365 tenants",
    version,
    long_about = "Diagnostics and reports for Microsoft 365 tenants\n\n\
                  Connects to Entra ID, Exchange Online, OneDrive and Teams through Microsoft Graph\n\
                  and writes CSV, HTML, JSON and PDF reports."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Authenticate to Microsoft Graph and cache the token
    Login(cmd::login::LoginArgs),

    /// Clear cached tokens
    Logout(cmd::login::LogoutArgs),

    /// Manage tenant configurations
    #[command(subcommand)]
    Tenant(TenantCommands),

    /// Authenticate and read the organization record
    #[command(name = "test-connection")]
    TestConnection(cmd::diag::TestConnectionArgs),

    /// Generate a report
    Report(cmd::report::ReportArgs),
}

#[derive(Subcommand, Debug)]
enum TenantCommands {
    /// Add a new tenant configuration
    Add(cmd::tenant::TenantAddArgs),

    /// List all configured tenants
    List(cmd::tenant::TenantListArgs),

    /// Switch active tenant
    Switch(cmd::tenant::TenantSwitchArgs),

    /// Remove a tenant configuration
    Remove(cmd::tenant::TenantRemoveArgs),

    /// Show the active tenant and settings
    Show,

    /// Import a tenant from a JSON credential file
    Import(cmd::tenant::TenantImportArgs),

    /// Validate a tenant configuration without connecting
    Check(cmd::tenant::TenantCheckArgs),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "m365diag=debug"
    } else {
        "m365diag=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run() -> error::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Login(args) => cmd::login::login(args).await?,
        Commands::Logout(args) => cmd::login::logout(args).await?,
        Commands::Tenant(tenant_cmd) => match tenant_cmd {
            TenantCommands::Add(args) => cmd::tenant::add(args).await?,
            TenantCommands::List(args) => cmd::tenant::list(args).await?,
            TenantCommands::Switch(args) => cmd::tenant::switch(args).await?,
            TenantCommands::Remove(args) => cmd::tenant::remove(args).await?,
            TenantCommands::Show => cmd::tenant::show().await?,
            TenantCommands::Import(args) => cmd::tenant::import(args).await?,
            TenantCommands::Check(args) => cmd::tenant::check(args).await?,
        },
        Commands::TestConnection(args) => cmd::diag::test_connection(args).await?,
        Commands::Report(args) => cmd::report::run(args).await?,
    }

    Ok(())
}
