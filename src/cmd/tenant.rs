use crate::cmd::login::prompt_secret_if_needed;
use crate::config::{AuthType, ConfigManager, TenantConfig, normalize_thumbprint};
use crate::error::Result;
use crate::graph::auth::REQUIRED_SCOPES;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct TenantAddArgs {
    /// Tenant name
    name: String,

    /// Tenant ID (GUID or primary domain)
    #[arg(long)]
    tenant_id: String,

    /// Client ID (Application ID)
    #[arg(long)]
    client_id: String,

    /// SHA-1 thumbprint of the app certificate; selects certificate auth
    #[arg(long, requires = "certificate_key")]
    certificate_thumbprint: Option<String>,

    /// Unencrypted PEM private key of the app certificate
    #[arg(long)]
    certificate_key: Option<PathBuf>,

    /// Prompt for the client secret and store it in tenants.toml
    #[arg(long, conflicts_with = "certificate_thumbprint")]
    store_secret: bool,

    /// Tenant description
    #[arg(long)]
    description: Option<String>,
}

#[derive(Args, Debug)]
pub struct TenantListArgs {
    /// Show detailed information
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Args, Debug)]
pub struct TenantSwitchArgs {
    /// Tenant name to switch to
    name: String,
}

#[derive(Args, Debug)]
pub struct TenantRemoveArgs {
    /// Tenant name to remove
    name: String,
}

#[derive(Args, Debug)]
pub struct TenantImportArgs {
    /// JSON file with TenantId, ClientId and ClientSecret or CertificateThumbprint
    file: PathBuf,

    /// Name to save the tenant under (defaults to the file's name)
    #[arg(long)]
    name: Option<String>,

    /// Keep the client secret from the file in tenants.toml
    #[arg(long)]
    store_secret: bool,
}

#[derive(Args, Debug)]
pub struct TenantCheckArgs {
    /// Tenant name (defaults to the active tenant)
    name: Option<String>,

    /// Check a JSON credential file instead of a configured tenant
    #[arg(long, conflicts_with = "name")]
    file: Option<PathBuf>,
}

pub async fn add(args: TenantAddArgs) -> Result<()> {
    let config_manager = ConfigManager::new()?;

    let auth_type = if args.certificate_thumbprint.is_some() {
        AuthType::Certificate
    } else {
        AuthType::ClientSecret
    };

    let mut tenant = TenantConfig {
        name: args.name.clone(),
        tenant_id: args.tenant_id,
        client_id: args.client_id,
        auth_type,
        client_secret: None,
        certificate_thumbprint: args
            .certificate_thumbprint
            .map(|tp| normalize_thumbprint(&tp).unwrap_or(tp)),
        certificate_key_path: args.certificate_key,
        description: args.description,
    };

    tenant.validate()?;
    if args.store_secret {
        prompt_secret_if_needed(&mut tenant, true)?;
    }

    config_manager.add_tenant(tenant.clone())?;
    if config_manager.load_settings()?.current_tenant.is_none() {
        config_manager.set_active_tenant(&tenant.name)?;
    }

    println!("{} Tenant '{}' added successfully", "✓".green(), args.name);
    print_secret_hint(&tenant);
    println!(
        "\n{} Run {} to authenticate",
        "→".cyan(),
        format!("m365diag login {}", args.name).bold()
    );

    Ok(())
}

pub async fn list(args: TenantListArgs) -> Result<()> {
    let config_manager = ConfigManager::new()?;
    let tenants = config_manager.load_tenants()?;
    let settings = config_manager.load_settings()?;

    if tenants.is_empty() {
        println!("{} No tenants configured", "!".yellow());
        println!(
            "\n{} Run {} or {} to add a tenant",
            "→".cyan(),
            "m365diag tenant add".bold(),
            "m365diag tenant import".bold()
        );
        return Ok(());
    }

    println!("\n{}", "Configured Tenants:".bold());
    println!("{}", "─".repeat(60));

    for tenant in &tenants {
        let is_current = settings
            .current_tenant
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(&tenant.name));
        let marker = if is_current {
            "●".green()
        } else {
            "○".dimmed()
        };

        println!("\n{} {}", marker, tenant.name.bold());

        if args.verbose {
            print_tenant_details(&config_manager, tenant);
        }
    }

    println!("\n{}", "─".repeat(60));
    println!("{} {} tenant(s) total", "→".cyan(), tenants.len());

    if let Some(current) = &settings.current_tenant {
        println!("{} Active: {}", "→".cyan(), current.bold());
    }

    Ok(())
}

pub async fn switch(args: TenantSwitchArgs) -> Result<()> {
    let config_manager = ConfigManager::new()?;
    config_manager.set_active_tenant(&args.name)?;

    println!("{} Switched to tenant '{}'", "✓".green(), args.name);

    Ok(())
}

pub async fn remove(args: TenantRemoveArgs) -> Result<()> {
    let config_manager = ConfigManager::new()?;
    config_manager.remove_tenant(&args.name)?;

    println!("{} Tenant '{}' removed", "✓".green(), args.name);

    Ok(())
}

pub async fn show() -> Result<()> {
    let config_manager = ConfigManager::new()?;
    let settings = config_manager.load_settings()?;

    println!("\n{}", "Configuration".bold());
    println!("{}", "─".repeat(60));
    println!("  Config dir:   {}", config_manager.config_dir().display());
    println!(
        "  Output dir:   {}",
        settings
            .output_dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "./reports".into())
    );
    println!(
        "  Template:     {}",
        settings
            .template_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "built-in".into())
    );
    println!("  CSV BOM:      {}", settings.csv_bom);
    println!("  Sample data:  {}", if settings.fallback_to_sample { "on failure" } else { "never" });
    let renderers: Vec<&str> = settings
        .pdf_renderers
        .iter()
        .map(|r| r.program.as_str())
        .collect();
    println!("  PDF renderer: {}", renderers.join(", "));

    match config_manager.get_active_tenant()? {
        Some(tenant) => {
            println!("\n{} {}", "●".green(), tenant.name.bold());
            print_tenant_details(&config_manager, &tenant);
        }
        None => println!("\n{} No active tenant", "!".yellow()),
    }

    Ok(())
}

pub async fn import(args: TenantImportArgs) -> Result<()> {
    let config_manager = ConfigManager::new()?;
    let mut tenant = ConfigManager::load_json_tenant(&args.file, args.name.as_deref())?;

    tenant.validate()?;

    if tenant.client_secret.is_some() && !args.store_secret {
        tenant.client_secret = None;
        println!(
            "{} Client secret in {} was not stored; set {} or use --store-secret",
            "!".yellow(),
            args.file.display(),
            tenant.secret_env_var().bold()
        );
    }

    config_manager.add_tenant(tenant.clone())?;
    if config_manager.load_settings()?.current_tenant.is_none() {
        config_manager.set_active_tenant(&tenant.name)?;
    }

    println!(
        "{} Imported tenant '{}' ({})",
        "✓".green(),
        tenant.name.bold(),
        tenant.auth_type
    );

    Ok(())
}

pub async fn check(args: TenantCheckArgs) -> Result<()> {
    let tenant = match &args.file {
        Some(file) => ConfigManager::load_json_tenant(file, None)?,
        None => ConfigManager::new()?.resolve_tenant(args.name.as_deref())?,
    };

    tenant.validate()?;

    println!("{} Tenant '{}' configuration is valid", "✓".green(), tenant.name.bold());
    println!("  Auth: {}", tenant.auth_type);

    match tenant.auth_type {
        AuthType::ClientSecret => print_secret_hint(&tenant),
        AuthType::Certificate => {
            if let Some(path) = &tenant.certificate_key_path {
                if path.exists() {
                    println!("  {} Private key: {}", "✓".green(), path.display());
                } else {
                    println!("  {} Private key not found: {}", "!".yellow(), path.display());
                }
            }
        }
    }

    println!("\n{} The app registration needs these application permissions:", "→".cyan());
    for scope in REQUIRED_SCOPES {
        println!("  - {}", scope);
    }

    Ok(())
}

fn print_secret_hint(tenant: &TenantConfig) {
    if tenant.auth_type != AuthType::ClientSecret {
        return;
    }

    if tenant.client_secret.is_some() {
        println!("  {} Client secret stored in tenants.toml", "!".yellow());
    } else if tenant.resolve_client_secret().is_some() {
        println!("  {} Client secret found in the environment", "✓".green());
    } else {
        println!(
            "  {} No client secret; set {} or pass --prompt-secret to login",
            "!".yellow(),
            tenant.secret_env_var().bold()
        );
    }
}

fn print_tenant_details(config_manager: &ConfigManager, tenant: &TenantConfig) {
    println!("  Tenant ID:    {}", tenant.tenant_id);
    println!("  Client ID:    {}", tenant.client_id);
    println!("  Auth Type:    {}", tenant.auth_type);

    if let Some(tp) = &tenant.certificate_thumbprint {
        println!("  Thumbprint:   {}", tp);
    }

    if let Some(desc) = &tenant.description {
        println!("  Description:  {}", desc);
    }

    match config_manager.load_token(&tenant.name) {
        Ok(token) => {
            println!(
                "  Status:       {} (expires: {})",
                "Authenticated".green(),
                token.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
        Err(_) => {
            println!("  Status:       {}", "Not authenticated".yellow());
        }
    }
}
