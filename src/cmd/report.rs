use crate::cmd::progress;
use crate::config::{ConfigManager, Settings};
use crate::error::{DiagError, Result};
use crate::graph::GraphClient;
use crate::graph::usage::ReportPeriod;
use crate::report::html::{self, ReportContext};
use crate::report::pdf::{self, PdfExportChain};
use crate::report::sources::{
    AlertsSource, MailboxSource, MfaSource, OneDriveSource, TeamsSource, UsersSource,
};
use crate::report::template::Template;
use crate::report::{self, DataSource, Dataset, FallbackPolicy, ReportKind, ReportRecord, csv};
use chrono::{DateTime, Local};
use clap::{Args, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};

const DEFAULT_OUTPUT_DIR: &str = "reports";
const MAX_ALERT_DAYS: i64 = 3650;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Csv,
    Html,
    Json,
    /// CSV, HTML and JSON
    All,
}

impl OutputFormat {
    fn includes(&self, other: OutputFormat) -> bool {
        *self == OutputFormat::All || *self == other
    }
}

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Report to generate
    #[arg(value_enum)]
    pub kind: ReportKind,

    /// Tenant name (defaults to the active tenant)
    #[arg(short, long, env = "M365DIAG_TENANT")]
    pub tenant: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::All)]
    pub format: OutputFormat,

    /// Output directory (defaults to output_dir from config.toml, then ./reports)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// HTML template; the built-in template is used if the file is missing
    #[arg(long)]
    pub template: Option<PathBuf>,

    /// Write CSV without a UTF-8 byte-order mark
    #[arg(long)]
    pub no_bom: bool,

    /// Use the built-in sample data without contacting the tenant
    #[arg(long, conflicts_with = "no_fallback")]
    pub sample: bool,

    /// Fail instead of falling back to sample data
    #[arg(long)]
    pub no_fallback: bool,

    /// Also convert the HTML report to PDF with an external renderer
    #[arg(long)]
    pub pdf: bool,

    /// Usage report period (mailboxes, onedrive): D7, D30, D90 or D180
    #[arg(long, default_value = "D30", value_parser = parse_period)]
    pub period: ReportPeriod,

    /// Alert look-back window in days (alerts), 1 to 3650
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(i64).range(1..=MAX_ALERT_DAYS))]
    pub days: i64,
}

fn parse_period(s: &str) -> std::result::Result<ReportPeriod, String> {
    s.parse().map_err(|e: DiagError| e.to_string())
}

pub fn fallback_policy(args: &ReportArgs, settings: &Settings) -> FallbackPolicy {
    if args.sample {
        FallbackPolicy::SampleOnly
    } else if args.no_fallback || !settings.fallback_to_sample {
        FallbackPolicy::FailOnError
    } else {
        FallbackPolicy::SampleOnError
    }
}

/// `{kind}_{tenant}_{YYYYmmdd_HHMMSS}`, restricted to filename-safe characters
pub fn report_basename(kind: ReportKind, tenant: &str, at: &DateTime<Local>) -> String {
    let tenant: String = tenant
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_{}_{}", kind.slug(), tenant, at.format("%Y%m%d_%H%M%S"))
}

pub async fn run(args: ReportArgs) -> Result<()> {
    match args.kind {
        ReportKind::Users => generate(&UsersSource, &args).await,
        ReportKind::Mfa => generate(&MfaSource, &args).await,
        ReportKind::Mailboxes => {
            generate(&MailboxSource { period: args.period }, &args).await
        }
        ReportKind::Onedrive => {
            generate(&OneDriveSource { period: args.period }, &args).await
        }
        ReportKind::Teams => generate(&TeamsSource, &args).await,
        ReportKind::Alerts => generate(&AlertsSource { days: args.days }, &args).await,
    }
}

async fn generate<S: DataSource>(source: &S, args: &ReportArgs) -> Result<()> {
    let config_manager = ConfigManager::new()?;
    let settings = config_manager.load_settings()?;
    let policy = fallback_policy(args, &settings);
    let kind = source.kind();

    let (tenant_label, connection) = match config_manager.resolve_tenant(args.tenant.as_deref()) {
        Ok(tenant) => {
            let connection = if policy == FallbackPolicy::SampleOnly {
                Err(DiagError::ConfigError("sample data requested".into()))
            } else {
                GraphClient::from_tenant(&config_manager, &tenant).await
            };
            (tenant.name, connection)
        }
        Err(e) => ("sample".to_string(), Err(e)),
    };

    let client_holder;
    let client = match connection {
        Ok(client) => {
            client_holder = client;
            Ok(&client_holder)
        }
        Err(e) => Err(e),
    };

    let spinner = progress::create_spinner(&format!("Retrieving {}...", kind.title()));
    let dataset = match report::collect(source, client, policy).await {
        Ok(dataset) => dataset,
        Err(e) => {
            progress::finish_spinner_error(&spinner, &format!("{} retrieval failed", kind.title()));
            return Err(e);
        }
    };

    let count = dataset.records.len();
    if dataset.origin.is_sample() {
        progress::finish_spinner_warning(
            &spinner,
            &format!("{} sample record(s): {}", count, dataset.origin.label()),
        );
    } else {
        progress::finish_spinner_success(&spinner, &format!("{} record(s) retrieved", count));
    }

    print_summary(&dataset, &tenant_label);

    let generated_at = Local::now();
    let output_dir = args
        .output
        .clone()
        .or_else(|| settings.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
    std::fs::create_dir_all(&output_dir)?;
    let base = output_dir.join(report_basename(kind, &tenant_label, &generated_at));

    let mut written = Vec::new();

    if args.format.includes(OutputFormat::Csv) {
        let path = base.with_extension("csv");
        let bom = settings.csv_bom && !args.no_bom;
        csv::write_csv_file(&dataset.records, &path, bom)?;
        written.push(("CSV", path));
    }

    if args.format.includes(OutputFormat::Json) {
        let path = base.with_extension("json");
        std::fs::write(&path, serde_json::to_string_pretty(&dataset)?)?;
        written.push(("JSON", path));
    }

    let html_path = if args.format.includes(OutputFormat::Html) || args.pdf {
        let template_path = args.template.as_deref().or(settings.template_path.as_deref());
        let template = Template::load(template_path)?;
        let ctx = ReportContext {
            tenant: tenant_label.clone(),
            generated_at,
            pdf_filename: report_basename(kind, &tenant_label, &generated_at),
        };

        let path = base.with_extension("html");
        let rendered = html::render_report(&template, &dataset, &ctx, &PdfExportChain::standard())?;
        std::fs::write(&path, rendered)?;
        written.push(("HTML", path.clone()));
        Some(path)
    } else {
        None
    };

    println!();
    for (label, path) in &written {
        println!("{} {:<5} {}", "✓".green(), label, path.display());
    }

    if let Some(html_path) = html_path.filter(|_| args.pdf) {
        export_pdf(&settings, &html_path).await;
    }

    Ok(())
}

/// Server-side PDF conversion; if no renderer works the HTML report's own
/// export button remains available
async fn export_pdf(settings: &Settings, html_path: &Path) {
    let pdf_path = html_path.with_extension("pdf");
    let spinner = progress::create_spinner("Rendering PDF...");

    match pdf::render_with_external(&settings.pdf_renderers, html_path, &pdf_path).await {
        Ok(program) => {
            progress::finish_spinner_success(&spinner, &format!("PDF rendered with {}", program));
            println!("{} {:<5} {}", "✓".green(), "PDF", pdf_path.display());
        }
        Err(e) => {
            progress::finish_spinner_warning(&spinner, &e.to_string());
            println!(
                "{} Open {} and use {} to save it as PDF",
                "→".cyan(),
                html_path.display(),
                "Download PDF".bold()
            );
        }
    }
}

fn print_summary<R: ReportRecord>(dataset: &Dataset<R>, tenant: &str) {
    println!("\n{}", dataset.kind.title().bold());
    println!("{}", "─".repeat(60));
    println!("  Tenant:  {}", tenant);
    println!("  Service: {}", dataset.kind.service());
    if dataset.origin.is_sample() {
        println!("  Data:    {}", dataset.origin.label().yellow());
    } else {
        println!("  Data:    {}", dataset.origin.label().green());
    }

    for (label, value) in R::summarize(&dataset.records) {
        println!("  {:<24} {}", format!("{}:", label), value.bold());
    }
    println!("{}", "─".repeat(60));
}
