use crate::error::{DiagError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Overrides the platform config directory when set.
pub const CONFIG_DIR_ENV: &str = "M365DIAG_CONFIG_DIR";
/// Fallback client secret for any tenant.
pub const CLIENT_SECRET_ENV: &str = "M365DIAG_CLIENT_SECRET";

/// Values starting with one of these are dummy text from sample files
const PLACEHOLDER_PREFIXES: &[&str] = &[
    "your-",
    "your_",
    "yourtenant",
    "xxxx",
    "replace",
    "insert-",
    "insert_",
];

/// Values equal to one of these are dummy text
const PLACEHOLDER_VALUES: &[&str] = &[
    "changeme",
    "change-me",
    "todo",
    "tbd",
    "placeholder",
    "secret",
];

const NIL_GUID: &str = "00000000-0000-0000-0000-000000000000";

/// Main configuration structure (`config.toml`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub current_tenant: Option<String>,

    /// Directory reports are written to when `--output` isn't given
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// HTML template used instead of the built-in one
    #[serde(default)]
    pub template_path: Option<PathBuf>,

    /// Prefix CSV files with a UTF-8 byte-order mark
    #[serde(default = "default_true")]
    pub csv_bom: bool,

    /// Use sample data when live retrieval fails
    #[serde(default = "default_true")]
    pub fallback_to_sample: bool,

    /// External HTML-to-PDF renderers, tried in order
    #[serde(default = "default_pdf_renderers")]
    pub pdf_renderers: Vec<PdfRendererConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            current_tenant: None,
            output_dir: None,
            template_path: None,
            csv_bom: true,
            fallback_to_sample: true,
            pdf_renderers: default_pdf_renderers(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_pdf_renderers() -> Vec<PdfRendererConfig> {
    vec![PdfRendererConfig {
        program: "wkhtmltopdf".into(),
        args: vec!["--quiet".into(), "{input}".into(), "{output}".into()],
    }]
}

/// An external command that converts an HTML file to PDF.
///
/// `{input}` and `{output}` in `args` are replaced with the file paths.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PdfRendererConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Tenant-specific configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TenantConfig {
    pub name: String,
    pub tenant_id: String,
    pub client_id: String,

    #[serde(default)]
    pub auth_type: AuthType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_thumbprint: Option<String>,

    /// Unencrypted PEM private key matching the certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_key_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    #[default]
    ClientSecret,
    Certificate,
}

impl std::fmt::Display for AuthType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthType::ClientSecret => write!(f, "Client secret"),
            AuthType::Certificate => write!(f, "Certificate"),
        }
    }
}

impl TenantConfig {
    /// Check that identifiers are well formed and nothing is a template placeholder.
    ///
    /// The client secret is not checked here because it may come from the
    /// environment; see [`TenantConfig::resolve_client_secret`].
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.name.trim().is_empty() {
            problems.push("name is empty".to_string());
        }

        if is_placeholder(&self.tenant_id) {
            problems.push(format!("tenant_id '{}' looks like a placeholder", self.tenant_id));
        } else if !is_guid(&self.tenant_id) && !is_domain(&self.tenant_id) {
            problems.push(format!(
                "tenant_id '{}' is neither a GUID nor a domain name",
                self.tenant_id
            ));
        }

        if is_placeholder(&self.client_id) {
            problems.push(format!("client_id '{}' looks like a placeholder", self.client_id));
        } else if !is_guid(&self.client_id) {
            problems.push(format!("client_id '{}' is not a GUID", self.client_id));
        }

        if let Some(secret) = &self.client_secret {
            if is_placeholder(secret) {
                problems.push("client_secret looks like a placeholder".to_string());
            }
        }

        if self.auth_type == AuthType::Certificate {
            match &self.certificate_thumbprint {
                Some(tp) if normalize_thumbprint(tp).is_some() => {}
                Some(tp) => problems.push(format!(
                    "certificate_thumbprint '{}' is not a 40 character hex SHA-1 thumbprint",
                    tp
                )),
                None => problems.push("certificate auth requires certificate_thumbprint".into()),
            }
            if self.certificate_key_path.is_none() {
                problems.push("certificate auth requires certificate_key_path".into());
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(DiagError::InvalidConfig(format!(
                "tenant '{}': {}",
                self.name,
                problems.join("; ")
            )))
        }
    }

    /// Environment variable holding this tenant's secret
    pub fn secret_env_var(&self) -> String {
        let suffix: String = self
            .name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}_{}", CLIENT_SECRET_ENV, suffix)
    }

    /// Resolve the client secret from the config or the process environment
    pub fn resolve_client_secret(&self) -> Option<String> {
        self.resolve_client_secret_with(|key| std::env::var(key).ok())
    }

    /// Resolution order: stored secret, `M365DIAG_CLIENT_SECRET_<NAME>`,
    /// then `M365DIAG_CLIENT_SECRET`.
    pub fn resolve_client_secret_with<F>(&self, lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.client_secret
            .clone()
            .or_else(|| lookup(&self.secret_env_var()))
            .or_else(|| lookup(CLIENT_SECRET_ENV))
            .filter(|s| !s.trim().is_empty() && !is_placeholder(s))
    }
}

/// Token cache structure
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenCache {
    pub access_token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub tenant_id: String,
}

/// JSON credential file; PascalCase and camelCase keys are both accepted
#[derive(Debug, Deserialize)]
struct JsonTenantFile {
    #[serde(default, alias = "Name", alias = "TenantName")]
    name: Option<String>,
    #[serde(alias = "TenantId", alias = "tenantId")]
    tenant_id: String,
    #[serde(alias = "ClientId", alias = "clientId", alias = "AppId", alias = "appId")]
    client_id: String,
    #[serde(default, alias = "ClientSecret", alias = "clientSecret")]
    client_secret: Option<String>,
    #[serde(
        default,
        alias = "CertificateThumbprint",
        alias = "certificateThumbprint",
        alias = "Thumbprint"
    )]
    certificate_thumbprint: Option<String>,
    #[serde(default, alias = "CertificatePath", alias = "certificatePath")]
    certificate_path: Option<PathBuf>,
    #[serde(default, alias = "Description")]
    description: Option<String>,
}

/// Configuration manager
#[derive(Clone, Debug)]
pub struct ConfigManager {
    config_dir: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            return Self::with_dir(PathBuf::from(dir));
        }

        let project_dirs = ProjectDirs::from("com", "m365diag", "m365diag").ok_or_else(|| {
            DiagError::ConfigError("Failed to determine config directory".into())
        })?;

        Self::with_dir(project_dirs.config_dir().to_path_buf())
    }

    /// Use an explicit config directory, creating it if needed
    pub fn with_dir(config_dir: PathBuf) -> Result<Self> {
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)?;
        }
        tracing::debug!("Using config directory {}", config_dir.display());
        Ok(Self { config_dir })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn tenants_file(&self) -> PathBuf {
        self.config_dir.join("tenants.toml")
    }

    pub fn token_cache_file(&self, tenant_name: &str) -> PathBuf {
        self.config_dir
            .join("cache")
            .join(format!("{}.token", tenant_name.to_lowercase()))
    }

    pub fn load_settings(&self) -> Result<Settings> {
        let path = self.config_file();

        if !path.exists() {
            return Ok(Settings::default());
        }

        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        let contents = toml::to_string_pretty(settings)
            .map_err(|e| DiagError::ConfigError(format!("Failed to serialize config: {}", e)))?;
        fs::write(self.config_file(), contents)?;
        Ok(())
    }

    pub fn load_tenants(&self) -> Result<Vec<TenantConfig>> {
        let tenants_path = self.tenants_file();

        if !tenants_path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(tenants_path)?;

        #[derive(Deserialize)]
        struct TenantsFile {
            #[serde(default)]
            tenants: Vec<TenantConfig>,
        }

        let file: TenantsFile = toml::from_str(&contents)?;
        Ok(file.tenants)
    }

    pub fn save_tenants(&self, tenants: &[TenantConfig]) -> Result<()> {
        #[derive(Serialize)]
        struct TenantsFile<'a> {
            tenants: &'a [TenantConfig],
        }

        let contents = toml::to_string_pretty(&TenantsFile { tenants })
            .map_err(|e| DiagError::ConfigError(format!("Failed to serialize tenants: {}", e)))?;
        fs::write(self.tenants_file(), contents)?;
        Ok(())
    }

    /// Add or replace a tenant (names compare case-insensitively)
    pub fn add_tenant(&self, tenant: TenantConfig) -> Result<()> {
        let mut tenants = self.load_tenants()?;
        tenants.retain(|t| !t.name.eq_ignore_ascii_case(&tenant.name));
        tenants.push(tenant);
        self.save_tenants(&tenants)
    }

    pub fn get_tenant(&self, name: &str) -> Result<TenantConfig> {
        self.load_tenants()?
            .into_iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| DiagError::TenantNotFound(name.to_string()))
    }

    pub fn get_active_tenant(&self) -> Result<Option<TenantConfig>> {
        match self.load_settings()?.current_tenant {
            Some(name) => Ok(Some(self.get_tenant(&name)?)),
            None => Ok(None),
        }
    }

    /// The named tenant, or the active one when no name is given
    pub fn resolve_tenant(&self, name: Option<&str>) -> Result<TenantConfig> {
        match name {
            Some(name) => self.get_tenant_or_env(name),
            None => self.get_active_tenant()?.ok_or_else(|| {
                DiagError::ConfigError(
                    "No active tenant. Run 'm365diag tenant add' or pass --tenant".into(),
                )
            }),
        }
    }

    pub fn set_active_tenant(&self, tenant_name: &str) -> Result<()> {
        let tenant = self.get_tenant(tenant_name)?;
        let mut settings = self.load_settings()?;
        settings.current_tenant = Some(tenant.name);
        self.save_settings(&settings)
    }

    pub fn remove_tenant(&self, tenant_name: &str) -> Result<()> {
        let mut tenants = self.load_tenants()?;
        let original_len = tenants.len();
        tenants.retain(|t| !t.name.eq_ignore_ascii_case(tenant_name));

        if tenants.len() == original_len {
            return Err(DiagError::TenantNotFound(tenant_name.to_string()));
        }

        self.save_tenants(&tenants)?;
        if let Err(e) = self.delete_token(tenant_name) {
            tracing::warn!("Could not delete cached token for '{}': {}", tenant_name, e);
        }

        let mut settings = self.load_settings()?;
        if settings
            .current_tenant
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(tenant_name))
        {
            settings.current_tenant = None;
            self.save_settings(&settings)?;
        }

        Ok(())
    }

    pub fn save_token(&self, tenant_name: &str, token: &TokenCache) -> Result<()> {
        let cache_dir = self.config_dir.join("cache");
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir)?;
        }

        let contents = serde_json::to_string_pretty(token)?;
        fs::write(self.token_cache_file(tenant_name), contents)?;
        Ok(())
    }

    /// Load a cached token; expired tokens count as missing
    pub fn load_token(&self, tenant_name: &str) -> Result<TokenCache> {
        let token_path = self.token_cache_file(tenant_name);

        if !token_path.exists() {
            return Err(DiagError::TokenNotFound);
        }

        let contents = fs::read_to_string(token_path)?;
        let token: TokenCache = serde_json::from_str(&contents)?;

        if token.expires_at < chrono::Utc::now() {
            return Err(DiagError::AuthError("Token expired".into()));
        }

        Ok(token)
    }

    pub fn delete_token(&self, tenant_name: &str) -> Result<()> {
        let token_path = self.token_cache_file(tenant_name);

        if token_path.exists() {
            fs::remove_file(token_path)?;
        }

        Ok(())
    }

    /// Read a JSON credential file (`TenantId`, `ClientId`, `ClientSecret`,
    /// `CertificateThumbprint`, `CertificatePath`).
    pub fn load_json_tenant(path: &Path, name: Option<&str>) -> Result<TenantConfig> {
        let contents = fs::read_to_string(path).map_err(|e| {
            DiagError::ConfigError(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let file: JsonTenantFile = serde_json::from_str(contents.trim_start_matches('\u{feff}'))?;

        let name = name
            .map(str::to_string)
            .or(file.name)
            .or_else(|| {
                path.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "default".to_string());

        let auth_type = if file.certificate_thumbprint.is_some() {
            AuthType::Certificate
        } else {
            AuthType::ClientSecret
        };

        // Relative key paths are resolved against the JSON file's directory
        let certificate_key_path = file.certificate_path.map(|p| {
            if p.is_relative() {
                path.parent().map(|dir| dir.join(&p)).unwrap_or(p)
            } else {
                p
            }
        });

        Ok(TenantConfig {
            name,
            tenant_id: file.tenant_id.trim().to_string(),
            client_id: file.client_id.trim().to_string(),
            auth_type,
            client_secret: file.client_secret.filter(|s| !s.trim().is_empty()),
            certificate_thumbprint: file.certificate_thumbprint,
            certificate_key_path,
            description: file.description,
        })
    }

    /// Load tenant from `{name}.env` or `.env` in the config directory
    ///
    /// ```text
    /// TENANT_ID=xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx
    /// CLIENT_ID=xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx
    /// CLIENT_SECRET=your-secret-here
    /// ```
    pub fn load_env_file(&self, name: &str) -> Result<Option<TenantConfig>> {
        let env_path = self.config_dir.join(format!("{}.env", name.to_lowercase()));
        let fallback_path = self.config_dir.join(".env");

        let path = if env_path.exists() {
            env_path
        } else if fallback_path.exists() {
            fallback_path
        } else {
            return Ok(None);
        };

        let contents = fs::read_to_string(&path)?;
        let vars = parse_env_lines(contents.lines());
        Ok(vars_to_tenant(name, &vars))
    }

    /// Load all tenants from a multi-tenant `tenants.env` with `[NAME]` sections
    pub fn load_tenants_env(&self) -> Result<Vec<TenantConfig>> {
        let env_path = self.config_dir.join("tenants.env");

        if !env_path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&env_path)?;
        Ok(parse_sectioned_env(&contents))
    }

    /// Look up a tenant in tenants.toml, then tenants.env, then `{name}.env`.
    /// Tenants found in env files are saved to tenants.toml.
    pub fn get_tenant_or_env(&self, name: &str) -> Result<TenantConfig> {
        if let Ok(tenant) = self.get_tenant(name) {
            return Ok(tenant);
        }

        if let Some(tenant) = self
            .load_tenants_env()?
            .into_iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
        {
            self.add_tenant(tenant.clone())?;
            return Ok(tenant);
        }

        if let Some(tenant) = self.load_env_file(name)? {
            self.add_tenant(tenant.clone())?;
            return Ok(tenant);
        }

        Err(DiagError::TenantNotFound(name.to_string()))
    }
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

fn parse_env_lines<'a>(lines: impl Iterator<Item = &'a str>) -> HashMap<String, String> {
    let mut vars = HashMap::new();

    for line in lines {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            vars.insert(
                key.trim().to_uppercase(),
                unquote(value.trim()).to_string(),
            );
        }
    }

    vars
}

fn parse_sectioned_env(contents: &str) -> Vec<TenantConfig> {
    let mut tenants = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in contents.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            if let Some((section, lines)) = current.take() {
                tenants.extend(vars_to_tenant(&section, &parse_env_lines(lines.into_iter())));
            }
            current = Some((trimmed[1..trimmed.len() - 1].to_string(), Vec::new()));
        } else if let Some((_, lines)) = current.as_mut() {
            lines.push(trimmed);
        }
    }

    if let Some((section, lines)) = current {
        tenants.extend(vars_to_tenant(&section, &parse_env_lines(lines.into_iter())));
    }

    tenants
}

fn vars_to_tenant(name: &str, vars: &HashMap<String, String>) -> Option<TenantConfig> {
    let tenant_id = vars.get("TENANT_ID")?;
    let client_id = vars.get("CLIENT_ID")?;
    let thumbprint = vars.get("CERTIFICATE_THUMBPRINT").cloned();

    Some(TenantConfig {
        name: name.to_uppercase(),
        tenant_id: tenant_id.clone(),
        client_id: client_id.clone(),
        auth_type: if thumbprint.is_some() {
            AuthType::Certificate
        } else {
            AuthType::ClientSecret
        },
        client_secret: vars.get("CLIENT_SECRET").cloned(),
        certificate_thumbprint: thumbprint,
        certificate_key_path: vars.get("CERTIFICATE_KEY_PATH").map(PathBuf::from),
        description: vars
            .get("NAME")
            .or_else(|| vars.get("DESCRIPTION"))
            .cloned(),
    })
}

/// True for empty values and the dummy strings left in sample config files
pub fn is_placeholder(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v.is_empty()
        || v == NIL_GUID
        || (v.starts_with('<') && v.ends_with('>'))
        || (v.starts_with("{{") && v.ends_with("}}"))
        || PLACEHOLDER_PREFIXES.iter().any(|p| v.starts_with(p))
        || PLACEHOLDER_VALUES.contains(&v.as_str())
}

pub fn is_guid(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 36
        && bytes.iter().enumerate().all(|(i, b)| match i {
            8 | 13 | 18 | 23 => *b == b'-',
            _ => b.is_ascii_hexdigit(),
        })
}

fn is_domain(value: &str) -> bool {
    value.contains('.')
        && !value.starts_with('.')
        && !value.ends_with('.')
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

/// Uppercase hex thumbprint with separators removed, if it is a SHA-1 hash
pub fn normalize_thumbprint(value: &str) -> Option<String> {
    let cleaned: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect::<String>()
        .to_uppercase();

    (cleaned.len() == 40 && cleaned.chars().all(|c| c.is_ascii_hexdigit())).then_some(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TENANT_ID: &str = "c59151ed-4414-4426-b239-08974ab0e805";
    const CLIENT_ID: &str = "3c54f805-db0a-4f83-be24-6744ab9fd758";

    fn tenant(name: &str) -> TenantConfig {
        TenantConfig {
            name: name.to_string(),
            tenant_id: TENANT_ID.to_string(),
            client_id: CLIENT_ID.to_string(),
            auth_type: AuthType::ClientSecret,
            client_secret: None,
            certificate_thumbprint: None,
            certificate_key_path: None,
            description: None,
        }
    }

    #[test]
    fn test_placeholder_detection() {
        assert!(is_placeholder(""));
        assert!(is_placeholder("YOUR-TENANT-ID"));
        assert!(is_placeholder("<client-secret>"));
        assert!(is_placeholder("xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx"));
        assert!(is_placeholder(NIL_GUID));
        assert!(!is_placeholder(TENANT_ID));
        assert!(!is_placeholder("contoso.onmicrosoft.com"));
        assert!(is_placeholder("REPLACE_WITH_SECRET"));
        assert!(is_placeholder("changeme"));
        assert!(is_placeholder(" TODO "));
        assert!(is_placeholder("{{CLIENT_SECRET}}"));
    }

    #[test]
    fn test_placeholder_markers_inside_real_values() {
        assert!(!is_placeholder("todoist.onmicrosoft.com"));
        assert!(!is_placeholder("inserttech.com"));
        assert!(!is_placeholder("Xy7Q~abcTODOdefREPLACExxxx9"));
        assert!(!is_placeholder("placeholder-labs.com"));
    }

    #[test]
    fn test_guid_and_thumbprint() {
        assert!(is_guid(TENANT_ID));
        assert!(!is_guid("c59151ed44144426b23908974ab0e805"));
        assert_eq!(
            normalize_thumbprint("ab:cd:ef:01:23:45:67:89:ab:cd:ef:01:23:45:67:89:ab:cd:ef:01"),
            Some("ABCDEF0123456789ABCDEF0123456789ABCDEF01".to_string())
        );
        assert_eq!(normalize_thumbprint("ABCDEF"), None);
    }

    #[test]
    fn test_validate_accepts_domain_tenant() {
        let mut t = tenant("contoso");
        t.tenant_id = "contoso.onmicrosoft.com".into();
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_validate_accepts_marker_words_in_real_values() {
        let mut t = tenant("todoist");
        t.tenant_id = "todoist.onmicrosoft.com".into();
        t.client_secret = Some("Xy7Q~abcTODOdef8Hj2Lm4Np6Rs".into());
        assert!(t.validate().is_ok());
        assert_eq!(
            t.resolve_client_secret_with(|_| None).as_deref(),
            Some("Xy7Q~abcTODOdef8Hj2Lm4Np6Rs")
        );
    }

    #[test]
    fn test_validate_rejects_placeholders() {
        let mut t = tenant("acme");
        t.tenant_id = "YOUR-TENANT-ID".into();
        t.client_secret = Some("<secret>".into());
        let err = t.validate().unwrap_err().to_string();
        assert!(err.contains("tenant_id 'YOUR-TENANT-ID' looks like a placeholder"));
        assert!(err.contains("client_secret looks like a placeholder"));
    }

    #[test]
    fn test_validate_certificate_requirements() {
        let mut t = tenant("acme");
        t.auth_type = AuthType::Certificate;
        let err = t.validate().unwrap_err().to_string();
        assert!(err.contains("certificate_thumbprint"));
        assert!(err.contains("certificate_key_path"));

        t.certificate_thumbprint = Some("ABCDEF0123456789ABCDEF0123456789ABCDEF01".into());
        t.certificate_key_path = Some(PathBuf::from("/etc/m365/key.pem"));
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_secret_resolution_order() {
        let mut t = tenant("Acme Corp");
        assert_eq!(t.secret_env_var(), "M365DIAG_CLIENT_SECRET_ACME_CORP");

        let env = |key: &str| match key {
            "M365DIAG_CLIENT_SECRET_ACME_CORP" => Some("tenant-secret".to_string()),
            "M365DIAG_CLIENT_SECRET" => Some("global-secret".to_string()),
            _ => None,
        };
        assert_eq!(t.resolve_client_secret_with(env).as_deref(), Some("tenant-secret"));

        let global_only = |key: &str| (key == CLIENT_SECRET_ENV).then(|| "global-secret".to_string());
        assert_eq!(
            t.resolve_client_secret_with(global_only).as_deref(),
            Some("global-secret")
        );

        t.client_secret = Some("stored".into());
        assert_eq!(t.resolve_client_secret_with(env).as_deref(), Some("stored"));

        t.client_secret = Some("CHANGEME".into());
        assert_eq!(t.resolve_client_secret_with(|_| None), None);
    }

    #[test]
    fn test_tenant_crud_and_active() {
        let dir = TempDir::new().unwrap();
        let cm = ConfigManager::with_dir(dir.path().to_path_buf()).unwrap();

        cm.add_tenant(tenant("acme")).unwrap();
        cm.add_tenant(tenant("contoso")).unwrap();
        cm.add_tenant(tenant("ACME")).unwrap();
        assert_eq!(cm.load_tenants().unwrap().len(), 2);

        cm.set_active_tenant("contoso").unwrap();
        assert_eq!(cm.get_active_tenant().unwrap().unwrap().name, "contoso");
        assert_eq!(cm.resolve_tenant(None).unwrap().name, "contoso");

        cm.remove_tenant("CONTOSO").unwrap();
        assert!(cm.get_active_tenant().unwrap().is_none());
        assert!(matches!(
            cm.remove_tenant("contoso"),
            Err(DiagError::TenantNotFound(_))
        ));
    }

    #[test]
    fn test_remove_tenant_survives_undeletable_token() {
        let dir = TempDir::new().unwrap();
        let cm = ConfigManager::with_dir(dir.path().to_path_buf()).unwrap();
        cm.add_tenant(tenant("acme")).unwrap();

        // a directory where the token file should be cannot be removed as a file
        let token_path = cm.token_cache_file("acme");
        fs::create_dir_all(token_path.join("stale")).unwrap();

        cm.remove_tenant("acme").unwrap();
        assert!(cm.load_tenants().unwrap().is_empty());
        assert!(token_path.exists());
    }

    #[test]
    fn test_settings_defaults_when_missing_keys() {
        let settings: Settings = toml::from_str("current_tenant = \"acme\"").unwrap();
        assert!(settings.csv_bom);
        assert!(settings.fallback_to_sample);
        assert_eq!(settings.pdf_renderers[0].program, "wkhtmltopdf");
    }

    #[test]
    fn test_token_cache_expiry() {
        let dir = TempDir::new().unwrap();
        let cm = ConfigManager::with_dir(dir.path().to_path_buf()).unwrap();

        let expired = TokenCache {
            access_token: "old".into(),
            expires_at: chrono::Utc::now() - chrono::Duration::minutes(5),
            tenant_id: TENANT_ID.into(),
        };
        cm.save_token("acme", &expired).unwrap();
        assert!(matches!(cm.load_token("acme"), Err(DiagError::AuthError(_))));

        let fresh = TokenCache {
            access_token: "new".into(),
            expires_at: chrono::Utc::now() + chrono::Duration::minutes(30),
            tenant_id: TENANT_ID.into(),
        };
        cm.save_token("acme", &fresh).unwrap();
        assert_eq!(cm.load_token("ACME").unwrap().access_token, "new");

        cm.delete_token("acme").unwrap();
        assert!(matches!(cm.load_token("acme"), Err(DiagError::TokenNotFound)));
    }

    #[test]
    fn test_load_json_tenant_pascal_case_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("contoso.json");
        fs::write(
            &path,
            format!(
                "\u{feff}{{\"TenantId\":\"{}\",\"ClientId\":\"{}\",\"CertificateThumbprint\":\"ABCDEF0123456789ABCDEF0123456789ABCDEF01\",\"CertificatePath\":\"certs/app.pem\"}}",
                TENANT_ID, CLIENT_ID
            ),
        )
        .unwrap();

        let t = ConfigManager::load_json_tenant(&path, None).unwrap();
        assert_eq!(t.name, "contoso");
        assert_eq!(t.auth_type, AuthType::Certificate);
        assert_eq!(
            t.certificate_key_path,
            Some(dir.path().join("certs/app.pem"))
        );
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_sectioned_env_file() {
        let contents = format!(
            "# clients\n[ACME]\nNAME=Acme Corporation\nTENANT_ID={t}\nCLIENT_ID={c}\nCLIENT_SECRET=\"s3cr3t\"\n\n[beta]\nTENANT_ID={t}\nCLIENT_ID={c}\n",
            t = TENANT_ID,
            c = CLIENT_ID
        );
        let tenants = parse_sectioned_env(&contents);
        assert_eq!(tenants.len(), 2);
        assert_eq!(tenants[0].name, "ACME");
        assert_eq!(tenants[0].client_secret.as_deref(), Some("s3cr3t"));
        assert_eq!(tenants[0].description.as_deref(), Some("Acme Corporation"));
        assert_eq!(tenants[1].name, "BETA");
        assert!(tenants[1].client_secret.is_none());
    }

    #[test]
    fn test_get_tenant_or_env_imports_env_file() {
        let dir = TempDir::new().unwrap();
        let cm = ConfigManager::with_dir(dir.path().to_path_buf()).unwrap();
        fs::write(
            dir.path().join("fabrikam.env"),
            format!("TENANT_ID={}\nCLIENT_ID='{}'\n", TENANT_ID, CLIENT_ID),
        )
        .unwrap();

        let t = cm.get_tenant_or_env("fabrikam").unwrap();
        assert_eq!(t.name, "FABRIKAM");
        assert_eq!(t.client_id, CLIENT_ID);
        assert!(cm.get_tenant("fabrikam").is_ok());
    }
}
