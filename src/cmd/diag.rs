use crate::cmd::login::prompt_secret_if_needed;
use crate::cmd::progress;
use crate::config::ConfigManager;
use crate::error::{DiagError, Result};
use crate::graph::GraphClient;
use crate::graph::auth::GraphAuth;
use crate::graph::directory;
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct TestConnectionArgs {
    /// Tenant name (defaults to the active tenant)
    #[arg(short, long, env = "M365DIAG_TENANT")]
    tenant: Option<String>,

    /// Prompt for the client secret instead of reading it from the environment
    #[arg(long)]
    prompt_secret: bool,
}

/// Authenticate with fresh credentials and read `/organization`
pub async fn test_connection(args: TestConnectionArgs) -> Result<()> {
    let config_manager = ConfigManager::new()?;
    let mut tenant = config_manager.resolve_tenant(args.tenant.as_deref())?;
    prompt_secret_if_needed(&mut tenant, args.prompt_secret)?;

    println!(
        "\n{} Testing connection to {} ({})",
        "→".cyan(),
        tenant.name.bold(),
        tenant.auth_type
    );

    let spinner = progress::create_spinner("Requesting access token...");
    let auth = GraphAuth::new(config_manager.clone());
    let token = match auth.login(&tenant).await {
        Ok(token) => {
            progress::finish_spinner_success(&spinner, "Access token acquired");
            token
        }
        Err(e) => {
            progress::finish_spinner_error(&spinner, "Authentication failed");
            return Err(e);
        }
    };

    let spinner = progress::create_spinner("Reading organization...");
    let client = GraphClient::new(token.access_token);
    let org = match directory::get_organization(&client).await {
        Ok(Some(org)) => {
            progress::finish_spinner_success(&spinner, "Microsoft Graph reachable");
            org
        }
        Ok(None) => {
            progress::finish_spinner_error(&spinner, "No organization returned");
            return Err(DiagError::GraphApiError(
                "The organization endpoint returned no records".into(),
            ));
        }
        Err(e) => {
            progress::finish_spinner_error(&spinner, "Graph request failed");
            return Err(e);
        }
    };

    println!("\n{}", "Organization".bold());
    println!("{}", "─".repeat(60));
    println!(
        "  Name:           {}",
        org.display_name.as_deref().unwrap_or("(unnamed)")
    );
    println!("  Tenant ID:      {}", org.id);
    if let Some(domain) = org.default_domain() {
        println!("  Default domain: {}", domain);
    }
    if let Some(country) = &org.country_letter_code {
        println!("  Country:        {}", country);
    }

    if !org.verified_domains.is_empty() {
        println!("\n  Verified domains:");
        for domain in &org.verified_domains {
            let marker = if domain.is_default == Some(true) {
                " (default)".green().to_string()
            } else {
                String::new()
            };
            println!("    - {}{}", domain.name, marker);
        }
    }

    println!("\n{} Connection OK", "✓".green());
    Ok(())
}
