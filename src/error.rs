use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiagError {
    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Graph API error: {0}")]
    GraphApiError(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Client assertion error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Interactive prompt error: {0}")]
    DialoguerError(#[from] dialoguer::Error),

    #[error("Template has unresolved placeholders: {}", .0.join(", "))]
    UnresolvedPlaceholders(Vec<String>),

    #[error("PDF rendering failed: {0}")]
    PdfError(String),

    #[error("Token not found. Please run 'm365diag login' first")]
    TokenNotFound,

    #[error("Tenant '{0}' not found")]
    TenantNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, DiagError>;

/// Parse Graph API error response and provide helpful context
pub fn enhance_graph_error(error_response: &str) -> String {
    if let Ok(error_json) = serde_json::from_str::<serde_json::Value>(error_response) {
        if let Some(error_obj) = error_json.get("error") {
            let code = error_obj
                .get("code")
                .and_then(|c| c.as_str())
                .unwrap_or("Unknown");
            let message = error_obj
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("No message");

            let hint = match code {
                "Unauthorized" | "InvalidAuthenticationToken" => {
                    "\nHint: The access token may have expired. Run 'm365diag login' again."
                }
                "Forbidden" | "Authorization_RequestDenied" | "InsufficientPrivileges" => {
                    "\nHint: Check that the app registration has the required application permissions and admin consent is granted."
                }
                "BadRequest" => {
                    if message.contains("Resource not found for the segment") {
                        "\nHint: This report may only be available on the beta endpoint."
                    } else {
                        "\nHint: The request format may be incorrect."
                    }
                }
                "NotFound" => "\nHint: The requested resource doesn't exist in this tenant.",
                "TooManyRequests" => "\nHint: API rate limit exceeded. Wait a moment and try again.",
                _ => "",
            };

            return format!("{}: {}{}", code, message, hint);
        }
    }

    error_response.to_string()
}
