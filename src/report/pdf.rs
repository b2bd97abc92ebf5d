//! PDF export
//!
//! Two routes produce a PDF from a rendered HTML report:
//!
//! - In the browser, through a script embedded in the report. It tries a
//!   whole-page HTML→PDF converter, then a canvas snapshot assembled into a
//!   PDF, then the browser's print dialog. Each stage runs only when the
//!   previous one failed to load or threw, and the outcome is always shown
//!   in an on-page notification.
//! - On the command line, through external renderers (`wkhtmltopdf` by
//!   default) tried in the configured order.

use crate::config::PdfRendererConfig;
use crate::error::{DiagError, Result};
use std::path::Path;

pub const HTML2PDF_URL: &str =
    "https://cdnjs.cloudflare.com/ajax/libs/html2pdf.js/0.10.1/html2pdf.bundle.min.js";
pub const HTML2CANVAS_URL: &str =
    "https://cdnjs.cloudflare.com/ajax/libs/html2canvas/1.4.1/html2canvas.min.js";
pub const JSPDF_URL: &str =
    "https://cdnjs.cloudflare.com/ajax/libs/jspdf/2.5.1/jspdf.umd.min.js";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PdfStage {
    /// html2pdf.js renders the whole page
    Html2Pdf,
    /// html2canvas snapshot assembled with jsPDF
    CanvasSnapshot,
    /// `window.print()`, the user saves as PDF
    PrintDialog,
}

impl PdfStage {
    pub fn label(&self) -> &'static str {
        match self {
            PdfStage::Html2Pdf => "html2pdf",
            PdfStage::CanvasSnapshot => "html2canvas + jsPDF",
            PdfStage::PrintDialog => "print dialog",
        }
    }

    /// Libraries the stage loads before it runs
    pub fn script_urls(&self) -> &'static [&'static str] {
        match self {
            PdfStage::Html2Pdf => &[HTML2PDF_URL],
            PdfStage::CanvasSnapshot => &[HTML2CANVAS_URL, JSPDF_URL],
            PdfStage::PrintDialog => &[],
        }
    }

    fn success_message(&self) -> &'static str {
        match self {
            PdfStage::Html2Pdf | PdfStage::CanvasSnapshot => "PDF downloaded.",
            PdfStage::PrintDialog => "Print dialog opened. Choose \"Save as PDF\" as the destination.",
        }
    }

    fn js_body(&self) -> &'static str {
        match self {
            PdfStage::Html2Pdf => JS_HTML2PDF,
            PdfStage::CanvasSnapshot => JS_CANVAS,
            PdfStage::PrintDialog => JS_PRINT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Succeeded,
    /// A library failed to load
    LoadFailed,
    Threw,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportResult {
    Downloaded(PdfStage),
    PrintDialogOpened,
    /// Every stage failed; the notification tells the user to print manually
    Failed,
}

/// What the embedded script does for a given set of stage outcomes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTrace {
    pub attempts: Vec<(PdfStage, StageOutcome)>,
    pub result: ExportResult,
    pub notification: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfExportChain {
    stages: Vec<PdfStage>,
}

impl PdfExportChain {
    pub fn standard() -> Self {
        Self {
            stages: vec![
                PdfStage::Html2Pdf,
                PdfStage::CanvasSnapshot,
                PdfStage::PrintDialog,
            ],
        }
    }

    /// Build a chain from `stages`, which must be ordered from most to
    /// least capable and end with the print dialog
    pub fn new(stages: Vec<PdfStage>) -> Result<Self> {
        if stages.last() != Some(&PdfStage::PrintDialog) {
            return Err(DiagError::PdfError(
                "export chain must end with the print dialog".into(),
            ));
        }
        if stages.windows(2).any(|w| w[0] >= w[1]) {
            return Err(DiagError::PdfError(
                "export stages must be distinct and ordered by capability".into(),
            ));
        }
        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[PdfStage] {
        &self.stages
    }

    /// Walk the chain the way the embedded script does
    pub fn simulate(&self, mut outcome: impl FnMut(PdfStage) -> StageOutcome) -> ExportTrace {
        let mut attempts = Vec::new();

        for &stage in &self.stages {
            let result = outcome(stage);
            attempts.push((stage, result));

            if result == StageOutcome::Succeeded {
                let result = match stage {
                    PdfStage::PrintDialog => ExportResult::PrintDialogOpened,
                    other => ExportResult::Downloaded(other),
                };
                return ExportTrace {
                    attempts,
                    result,
                    notification: stage.success_message().to_string(),
                };
            }
        }

        ExportTrace {
            attempts,
            result: ExportResult::Failed,
            notification: FAILURE_MESSAGE.to_string(),
        }
    }

    /// JavaScript defining `exportReportToPdf()` for the report page
    pub fn script(&self, filename: &str) -> String {
        let filename = serde_json::Value::String(pdf_filename(filename)).to_string();

        let mut js = String::new();
        js.push_str(&format!("const PDF_FILENAME = {};\n", filename));
        js.push_str(JS_HELPERS);
        js.push_str("const PDF_STAGES = [\n");
        for stage in &self.stages {
            let urls = serde_json::Value::from(stage.script_urls().to_vec()).to_string();
            js.push_str(&format!(
                "    {{ name: {}, scripts: {}, success: {}, run: {} }},\n",
                serde_json::Value::from(stage.label()),
                urls,
                serde_json::Value::from(stage.success_message()),
                stage.js_body().trim()
            ));
        }
        js.push_str("];\n");
        js.push_str(&format!(
            "const PDF_FAILURE_MESSAGE = {};\n",
            serde_json::Value::from(FAILURE_MESSAGE)
        ));
        js.push_str(JS_RUNNER);
        js
    }
}

impl Default for PdfExportChain {
    fn default() -> Self {
        Self::standard()
    }
}

/// Restrict a download name to characters safe in every browser and OS
pub fn pdf_filename(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem_empty = out.trim_matches(|c| c == '.' || c == '_').is_empty();
    if stem_empty {
        out = "report".to_string();
    }
    if !out.to_ascii_lowercase().ends_with(".pdf") {
        out.push_str(".pdf");
    }
    out
}

const FAILURE_MESSAGE: &str =
    "PDF export failed. Use your browser's Print command and choose \"Save as PDF\".";

const JS_HELPERS: &str = r#"
function loadScript(url) {
    return new Promise(function (resolve, reject) {
        if (document.querySelector('script[src="' + url + '"]')) {
            resolve();
            return;
        }
        const el = document.createElement('script');
        el.src = url;
        el.onload = function () { resolve(); };
        el.onerror = function () { reject(new Error('Failed to load ' + url)); };
        document.head.appendChild(el);
    });
}

function showPdfNotification(message, kind) {
    const box = document.getElementById('pdf-notification');
    if (!box) {
        alert(message);
        return;
    }
    box.textContent = message;
    box.className = 'notification ' + kind;
    box.hidden = false;
}

function reportElement() {
    return document.getElementById('report-content') || document.body;
}
"#;

const JS_HTML2PDF: &str = r#"
async function () {
        await html2pdf()
            .set({
                margin: 10,
                filename: PDF_FILENAME,
                image: { type: 'jpeg', quality: 0.98 },
                html2canvas: { scale: 2, useCORS: true },
                jsPDF: { unit: 'mm', format: 'a4', orientation: 'landscape' }
            })
            .from(reportElement())
            .save();
    }
"#;

const JS_CANVAS: &str = r#"
async function () {
        const canvas = await html2canvas(reportElement(), { scale: 2, useCORS: true });
        const pdf = new window.jspdf.jsPDF({ orientation: 'landscape', unit: 'mm', format: 'a4' });
        const pageWidth = pdf.internal.pageSize.getWidth();
        const pageHeight = pdf.internal.pageSize.getHeight();
        const imageHeight = canvas.height * pageWidth / canvas.width;
        const image = canvas.toDataURL('image/jpeg', 0.95);
        let offset = 0;
        while (offset < imageHeight) {
            if (offset > 0) {
                pdf.addPage();
            }
            pdf.addImage(image, 'JPEG', 0, -offset, pageWidth, imageHeight);
            offset += pageHeight;
        }
        pdf.save(PDF_FILENAME);
    }
"#;

const JS_PRINT: &str = r#"
async function () {
        window.print();
    }
"#;

const JS_RUNNER: &str = r#"
async function exportReportToPdf() {
    for (let i = 0; i < PDF_STAGES.length; i++) {
        const stage = PDF_STAGES[i];
        try {
            for (const url of stage.scripts) {
                await loadScript(url);
            }
            await stage.run();
            showPdfNotification(stage.success, 'success');
            return;
        } catch (err) {
            console.warn('PDF export via ' + stage.name + ' failed:', err);
            if (i + 1 < PDF_STAGES.length) {
                showPdfNotification(stage.name + ' unavailable, trying ' + PDF_STAGES[i + 1].name + '...', 'info');
            }
        }
    }
    showPdfNotification(PDF_FAILURE_MESSAGE, 'error');
}
"#;

/// Convert `input` to `output` with the first external renderer that works.
///
/// Each renderer's arguments have `{input}` and `{output}` replaced by the
/// file paths. Returns the program that produced the PDF.
pub async fn render_with_external(
    renderers: &[PdfRendererConfig],
    input: &Path,
    output: &Path,
) -> Result<String> {
    if renderers.is_empty() {
        return Err(DiagError::PdfError("no PDF renderers configured".into()));
    }

    let input_str = input.to_string_lossy();
    let output_str = output.to_string_lossy();
    let mut failures = Vec::new();

    for renderer in renderers {
        let args: Vec<String> = renderer
            .args
            .iter()
            .map(|a| a.replace("{input}", &input_str).replace("{output}", &output_str))
            .collect();

        tracing::debug!("Trying PDF renderer {} {:?}", renderer.program, args);

        let result = tokio::process::Command::new(&renderer.program)
            .args(&args)
            .output()
            .await;

        match result {
            Ok(out) if out.status.success() && output.exists() => {
                tracing::info!("PDF written by {}", renderer.program);
                return Ok(renderer.program.clone());
            }
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                let reason = match stderr.trim() {
                    "" => format!("exited with {}", out.status),
                    msg => msg.lines().next().unwrap_or(msg).to_string(),
                };
                tracing::warn!("PDF renderer {} failed: {}", renderer.program, reason);
                failures.push(format!("{}: {}", renderer.program, reason));
            }
            Err(e) => {
                tracing::warn!("PDF renderer {} unavailable: {}", renderer.program, e);
                failures.push(format!("{}: {}", renderer.program, e));
            }
        }
    }

    Err(DiagError::PdfError(format!(
        "no PDF renderer succeeded ({})",
        failures.join("; ")
    )))
}
