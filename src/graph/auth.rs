use crate::config::{AuthType, ConfigManager, TenantConfig, TokenCache, normalize_thumbprint};
use crate::error::{DiagError, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use oauth2::{
    AuthUrl, ClientId, ClientSecret, Scope, TokenResponse, TokenUrl, basic::BasicClient,
    reqwest::async_http_client,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const MICROSOFT_AUTHORITY: &str = "https://login.microsoftonline.com";
pub const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";
/// Overrides [`MICROSOFT_AUTHORITY`], e.g. for sovereign clouds
pub const AUTHORITY_ENV: &str = "M365DIAG_AUTHORITY";

const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 600;
/// Cached tokens are considered expired this long before the real expiry
const EXPIRY_SKEW_SECS: i64 = 300;

/// Application permissions the report commands rely on
pub const REQUIRED_SCOPES: &[&str] = &[
    "User.Read.All",
    "AuditLog.Read.All",
    "Reports.Read.All",
    "Group.Read.All",
    "SecurityAlert.Read.All",
    "Organization.Read.All",
];

/// Claims of the signed JWT used for certificate client credentials
#[derive(Debug, Serialize, Deserialize)]
pub struct ClientAssertionClaims {
    pub aud: String,
    pub iss: String,
    pub sub: String,
    pub jti: String,
    pub nbf: i64,
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
struct RawTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawTokenError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

pub struct GraphAuth {
    config_manager: ConfigManager,
    authority: String,
}

impl GraphAuth {
    pub fn new(config_manager: ConfigManager) -> Self {
        let authority =
            std::env::var(AUTHORITY_ENV).unwrap_or_else(|_| MICROSOFT_AUTHORITY.to_string());
        Self::with_authority(config_manager, &authority)
    }

    pub fn with_authority(config_manager: ConfigManager, authority: &str) -> Self {
        Self {
            config_manager,
            authority: authority.trim_end_matches('/').to_string(),
        }
    }

    pub fn token_url(&self, tenant_id: &str) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.authority, tenant_id)
    }

    /// Return a cached token when still valid, otherwise authenticate
    pub async fn acquire_token(&self, tenant: &TenantConfig) -> Result<String> {
        match self.config_manager.load_token(&tenant.name) {
            Ok(token) if token.tenant_id == tenant.tenant_id => {
                tracing::debug!("Using cached token for '{}'", tenant.name);
                return Ok(token.access_token);
            }
            Ok(_) => tracing::debug!("Cached token for '{}' belongs to another tenant", tenant.name),
            Err(e) => tracing::debug!("No usable cached token for '{}': {}", tenant.name, e),
        }

        Ok(self.login(tenant).await?.access_token)
    }

    /// Authenticate with the tenant's configured method and cache the token
    pub async fn login(&self, tenant: &TenantConfig) -> Result<TokenCache> {
        tenant.validate()?;

        let token = match tenant.auth_type {
            AuthType::ClientSecret => self.login_client_secret(tenant).await?,
            AuthType::Certificate => self.login_certificate(tenant).await?,
        };

        self.config_manager.save_token(&tenant.name, &token)?;
        tracing::info!(
            "Authenticated to tenant '{}' ({}), token valid until {}",
            tenant.name,
            tenant.auth_type,
            token.expires_at
        );

        Ok(token)
    }

    /// Client credentials flow with a shared secret
    async fn login_client_secret(&self, tenant: &TenantConfig) -> Result<TokenCache> {
        let client_secret = tenant.resolve_client_secret().ok_or_else(|| {
            DiagError::AuthError(format!(
                "No client secret for tenant '{}'. Set {} or {}",
                tenant.name,
                tenant.secret_env_var(),
                crate::config::CLIENT_SECRET_ENV
            ))
        })?;

        let auth_url = AuthUrl::new(format!(
            "{}/{}/oauth2/v2.0/authorize",
            self.authority, tenant.tenant_id
        ))
        .map_err(|e| DiagError::AuthError(format!("Invalid auth URL: {}", e)))?;

        let token_url = TokenUrl::new(self.token_url(&tenant.tenant_id))
            .map_err(|e| DiagError::AuthError(format!("Invalid token URL: {}", e)))?;

        let client = BasicClient::new(
            ClientId::new(tenant.client_id.clone()),
            Some(ClientSecret::new(client_secret)),
            auth_url,
            Some(token_url),
        )
        .set_auth_type(oauth2::AuthType::RequestBody);

        let token = client
            .exchange_client_credentials()
            .add_scope(Scope::new(GRAPH_SCOPE.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| {
                DiagError::AuthError(format!("Client credentials exchange failed: {}", e))
            })?;

        Ok(TokenCache {
            access_token: token.access_token().secret().clone(),
            expires_at: expiry_from(token.expires_in()),
            tenant_id: tenant.tenant_id.clone(),
        })
    }

    /// Client credentials flow with a certificate-signed client assertion
    async fn login_certificate(&self, tenant: &TenantConfig) -> Result<TokenCache> {
        let thumbprint = tenant.certificate_thumbprint.as_deref().ok_or_else(|| {
            DiagError::AuthError("Certificate thumbprint required for certificate auth".into())
        })?;
        let key_path = tenant.certificate_key_path.as_ref().ok_or_else(|| {
            DiagError::AuthError("Certificate key path required for certificate auth".into())
        })?;

        let key_pem = std::fs::read(key_path).map_err(|e| {
            DiagError::AuthError(format!(
                "Cannot read private key {}: {}",
                key_path.display(),
                e
            ))
        })?;

        let token_url = self.token_url(&tenant.tenant_id);
        let assertion = build_client_assertion(&tenant.client_id, &token_url, &key_pem, thumbprint)?;

        let params = [
            ("client_id", tenant.client_id.as_str()),
            ("scope", GRAPH_SCOPE),
            ("grant_type", "client_credentials"),
            ("client_assertion_type", CLIENT_ASSERTION_TYPE),
            ("client_assertion", assertion.as_str()),
        ];

        let response = reqwest::Client::new()
            .post(&token_url)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<RawTokenError>(&body)
                .map(|e| match e.error_description {
                    Some(desc) => format!("{}: {}", e.error, desc),
                    None => e.error,
                })
                .unwrap_or(body);
            return Err(DiagError::AuthError(format!(
                "Certificate token request failed ({}): {}",
                status, detail
            )));
        }

        let token: RawTokenResponse = response.json().await?;

        Ok(TokenCache {
            access_token: token.access_token,
            expires_at: expiry_from(token.expires_in.map(Duration::from_secs)),
            tenant_id: tenant.tenant_id.clone(),
        })
    }

    /// Delete the cached token
    pub fn logout(&self, tenant_name: &str) -> Result<()> {
        self.config_manager.delete_token(tenant_name)
    }
}

fn expiry_from(expires_in: Option<Duration>) -> chrono::DateTime<chrono::Utc> {
    let lifetime = chrono::Duration::from_std(expires_in.unwrap_or(Duration::from_secs(3600)))
        .unwrap_or_else(|_| chrono::Duration::hours(1));
    chrono::Utc::now() + lifetime - chrono::Duration::seconds(EXPIRY_SKEW_SECS)
}

/// Base64url-encoded SHA-1 thumbprint, as expected in the JWT `x5t` header
pub fn thumbprint_to_x5t(thumbprint: &str) -> Result<String> {
    let normalized = normalize_thumbprint(thumbprint).ok_or_else(|| {
        DiagError::InvalidConfig(format!("'{}' is not a SHA-1 thumbprint", thumbprint))
    })?;
    let bytes = hex::decode(normalized)
        .map_err(|e| DiagError::InvalidConfig(format!("Invalid thumbprint: {}", e)))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Sign an RS256 client assertion for the token endpoint
pub fn build_client_assertion(
    client_id: &str,
    token_url: &str,
    private_key_pem: &[u8],
    thumbprint: &str,
) -> Result<String> {
    let now = chrono::Utc::now().timestamp();
    let claims = ClientAssertionClaims {
        aud: token_url.to_string(),
        iss: client_id.to_string(),
        sub: client_id.to_string(),
        jti: uuid::Uuid::new_v4().to_string(),
        nbf: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };

    let mut header = Header::new(Algorithm::RS256);
    header.typ = Some("JWT".to_string());
    header.x5t = Some(thumbprint_to_x5t(thumbprint)?);

    let key = EncodingKey::from_rsa_pem(private_key_pem)?;
    Ok(jsonwebtoken::encode(&header, &claims, &key)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation};

    const PRIVATE_KEY: &[u8] = include_bytes!("../../tests/fixtures/test_key.pem");
    const PUBLIC_KEY: &[u8] = include_bytes!("../../tests/fixtures/test_key.pub.pem");
    const THUMBPRINT: &str = "2F4A6B8C0D1E3F5A7B9C0D2E4F6A8B0C1D3E5F7A";
    const CLIENT_ID: &str = "3c54f805-db0a-4f83-be24-6744ab9fd758";

    #[test]
    fn test_thumbprint_to_x5t() {
        // 20 zero bytes encode to 27 base64url characters, no padding
        let x5t = thumbprint_to_x5t(&"0".repeat(40)).unwrap();
        assert_eq!(x5t, "AAAAAAAAAAAAAAAAAAAAAAAAAAA");
        assert!(thumbprint_to_x5t("not-a-thumbprint").is_err());
    }

    #[test]
    fn test_client_assertion_header_and_claims() {
        let token_url = "https://login.microsoftonline.com/contoso.onmicrosoft.com/oauth2/v2.0/token";
        let jwt = build_client_assertion(CLIENT_ID, token_url, PRIVATE_KEY, THUMBPRINT).unwrap();

        let header = jsonwebtoken::decode_header(&jwt).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);
        assert_eq!(header.x5t, Some(thumbprint_to_x5t(THUMBPRINT).unwrap()));

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[token_url]);
        validation.set_issuer(&[CLIENT_ID]);
        let decoded = jsonwebtoken::decode::<ClientAssertionClaims>(
            &jwt,
            &DecodingKey::from_rsa_pem(PUBLIC_KEY).unwrap(),
            &validation,
        )
        .unwrap();

        assert_eq!(decoded.claims.sub, CLIENT_ID);
        assert_eq!(decoded.claims.exp - decoded.claims.nbf, ASSERTION_LIFETIME_SECS);
        assert!(uuid::Uuid::parse_str(&decoded.claims.jti).is_ok());
    }

    #[test]
    fn test_expiry_applies_skew() {
        let expires = expiry_from(Some(Duration::from_secs(3600)));
        let remaining = expires - chrono::Utc::now();
        assert!(remaining <= chrono::Duration::seconds(3600 - EXPIRY_SKEW_SECS));
        assert!(remaining > chrono::Duration::seconds(3000));
    }

    #[test]
    fn test_token_url_trims_authority() {
        let dir = tempfile::TempDir::new().unwrap();
        let cm = ConfigManager::with_dir(dir.path().to_path_buf()).unwrap();
        let auth = GraphAuth::with_authority(cm, "http://127.0.0.1:8080/");
        assert_eq!(
            auth.token_url("contoso.onmicrosoft.com"),
            "http://127.0.0.1:8080/contoso.onmicrosoft.com/oauth2/v2.0/token"
        );
    }
}
