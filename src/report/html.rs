//! HTML report rendering
//!
//! Record data is escaped before it is placed into the template; the
//! template itself, the stylesheet and the export script are trusted.

use crate::error::Result;
use crate::report::pdf::PdfExportChain;
use crate::report::template::{Placeholders, Template};
use crate::report::{Dataset, ReportRecord};
use chrono::{DateTime, Local};

/// Report-wide values that don't come from the records themselves
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub tenant: String,
    pub generated_at: DateTime<Local>,
    /// File name offered by the in-browser PDF export
    pub pdf_filename: String,
}

pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            // braces in data must not read as template tokens
            '{' => out.push_str("&#123;"),
            '}' => out.push_str("&#125;"),
            _ => out.push(c),
        }
    }
    out
}

/// Build the placeholder map for `dataset` and render it into `template`
pub fn render_report<R: ReportRecord>(
    template: &Template,
    dataset: &Dataset<R>,
    ctx: &ReportContext,
    chain: &PdfExportChain,
) -> Result<String> {
    template.render(&placeholders(dataset, ctx, chain))
}

pub fn placeholders<R: ReportRecord>(
    dataset: &Dataset<R>,
    ctx: &ReportContext,
    chain: &PdfExportChain,
) -> Placeholders {
    let kind = dataset.kind;
    let origin_class = if dataset.origin.is_sample() {
        "origin-sample"
    } else {
        "origin-live"
    };

    let mut values = Placeholders::new();
    let mut set = |key: &str, value: String| {
        values.insert(key.to_string(), value);
    };

    set("TITLE", html_escape(kind.title()));
    set("SUBTITLE", html_escape(kind.service()));
    set("TENANT", html_escape(&ctx.tenant));
    set(
        "GENERATED_AT",
        ctx.generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    );
    set("DATA_ORIGIN", html_escape(&dataset.origin.label()));
    set("ORIGIN_CLASS", origin_class.to_string());
    set("RECORD_COUNT", dataset.records.len().to_string());
    set("SUMMARY", summary_cards(&R::summarize(&dataset.records)));
    set("TABLE", data_table(&dataset.records));
    set("STYLES", STYLES.to_string());
    set("PDF_SCRIPT", chain.script(&ctx.pdf_filename));
    set(
        "GENERATOR",
        format!("m365diag {}", env!("CARGO_PKG_VERSION")),
    );

    values
}

fn summary_cards(summary: &[(String, String)]) -> String {
    if summary.is_empty() {
        return String::new();
    }

    let cards: String = summary
        .iter()
        .map(|(label, value)| {
            format!(
                r#"                    <div class="summary-card">
                        <h4>{}</h4>
                        <p>{}</p>
                    </div>
"#,
                html_escape(label),
                html_escape(value)
            )
        })
        .collect();

    format!(
        "                <div class=\"summary-grid\">\n{}                </div>",
        cards
    )
}

fn data_table<R: ReportRecord>(records: &[R]) -> String {
    if records.is_empty() {
        return r#"                <p class="empty">No records found.</p>"#.to_string();
    }

    let header: String = R::HEADERS
        .iter()
        .map(|h| format!("<th>{}</th>", html_escape(h)))
        .collect();

    let rows: String = records
        .iter()
        .map(|record| {
            let cells: String = record
                .row()
                .iter()
                .map(|cell| format!("<td>{}</td>", html_escape(cell)))
                .collect();
            format!("                        <tr>{}</tr>\n", cells)
        })
        .collect();

    format!(
        r#"                <table class="data-table">
                    <thead>
                        <tr>{header}</tr>
                    </thead>
                    <tbody>
{rows}                    </tbody>
                </table>"#
    )
}

const STYLES: &str = r#"
        :root {
            --primary: #1e40af;
            --primary-dark: #1e3a8a;
            --secondary: #64748b;
            --success: #16a34a;
            --warning: #ca8a04;
            --danger: #dc2626;
            --light: #f8fafc;
            --dark: #1e293b;
            --border: #e2e8f0;
        }

        * {
            margin: 0;
            padding: 0;
            box-sizing: border-box;
        }

        body {
            font-family: 'Segoe UI', system-ui, -apple-system, sans-serif;
            line-height: 1.6;
            color: var(--dark);
            background: var(--light);
        }

        .container {
            max-width: 1200px;
            margin: 0 auto;
            padding: 2rem;
            background: white;
            min-height: 100vh;
        }

        .toolbar {
            display: flex;
            justify-content: flex-end;
            margin-bottom: 1rem;
        }

        .export-button {
            background: var(--primary);
            color: white;
            border: none;
            border-radius: 6px;
            padding: 0.5rem 1rem;
            font-size: 0.9rem;
            cursor: pointer;
        }

        .export-button:hover {
            background: var(--primary-dark);
        }

        .notification {
            padding: 0.75rem 1rem;
            border-radius: 6px;
            margin-bottom: 1rem;
            font-size: 0.9rem;
        }

        .notification.success { background: #dcfce7; color: var(--success); }
        .notification.info { background: #e0f2fe; color: var(--primary); }
        .notification.error { background: #fee2e2; color: var(--danger); }

        .header {
            text-align: center;
            padding: 2rem 0;
            border-bottom: 3px solid var(--primary);
            margin-bottom: 2rem;
        }

        .header h1 {
            color: var(--primary);
            font-size: 2rem;
            font-weight: 600;
            margin-bottom: 0.5rem;
        }

        .header .subtitle {
            color: var(--secondary);
            font-size: 1.1rem;
        }

        .header .metadata {
            display: flex;
            justify-content: center;
            gap: 2rem;
            margin-top: 1rem;
            font-size: 0.9rem;
            color: var(--secondary);
        }

        .origin {
            display: inline-block;
            margin-top: 1rem;
            padding: 0.25rem 0.75rem;
            border-radius: 9999px;
            font-size: 0.8rem;
            font-weight: 600;
        }

        .origin-live { background: #dcfce7; color: var(--success); }
        .origin-sample { background: #fef9c3; color: var(--warning); }

        .section {
            margin-bottom: 2rem;
        }

        .section-title {
            font-size: 1.25rem;
            font-weight: 600;
            color: var(--primary);
            margin-bottom: 1rem;
            padding-bottom: 0.5rem;
            border-bottom: 2px solid var(--border);
        }

        .summary-grid {
            display: grid;
            grid-template-columns: repeat(auto-fit, minmax(200px, 1fr));
            gap: 1rem;
        }

        .summary-card {
            background: var(--light);
            padding: 1.25rem;
            border-radius: 8px;
            border: 1px solid var(--border);
        }

        .summary-card h4 {
            font-size: 0.9rem;
            color: var(--secondary);
            text-transform: uppercase;
            margin-bottom: 0.5rem;
        }

        .summary-card p {
            font-size: 1.5rem;
            font-weight: 600;
            color: var(--dark);
        }

        .data-table {
            width: 100%;
            border-collapse: collapse;
            font-size: 0.9rem;
        }

        .data-table th,
        .data-table td {
            padding: 0.6rem 0.75rem;
            text-align: left;
            border-bottom: 1px solid var(--border);
        }

        .data-table th {
            background: var(--light);
            font-weight: 600;
            color: var(--secondary);
            font-size: 0.8rem;
            text-transform: uppercase;
        }

        .data-table tr:hover {
            background: var(--light);
        }

        .empty {
            color: var(--secondary);
            font-style: italic;
        }

        .footer {
            text-align: center;
            padding: 2rem 0;
            margin-top: 2rem;
            border-top: 1px solid var(--border);
            color: var(--secondary);
            font-size: 0.85rem;
        }

        .footer-brand {
            font-weight: 600;
            color: var(--primary);
        }

        @media print {
            body {
                background: white;
            }
            .container {
                padding: 0;
                max-width: none;
            }
            .no-print,
            .notification {
                display: none !important;
            }
            .summary-card,
            .data-table tr {
                break-inside: avoid;
            }
        }
"#;
