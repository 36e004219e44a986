use super::token::Token;
use super::{AuthorizationRequest, TokenProvider};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use oauth2::{
    AuthUrl, AuthorizationCode, Client, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    EndpointSet, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken, Scope,
    StandardRevocableToken, TokenResponse, TokenUrl,
    basic::{
        BasicClient, BasicErrorResponse, BasicRevocationErrorResponse,
        BasicTokenIntrospectionResponse, BasicTokenResponse, BasicTokenType,
    },
};
use reqwest::redirect::Policy;
use std::fs;
use std::path::Path;
use tracing::{debug, instrument};
use yup_oauth2::ApplicationSecret;

/// Read-only access to spreadsheet contents.
pub const SHEETS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";

/// Out-of-band redirect: the consent page displays the code for the operator to copy.
pub const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

// Type alias for the client when Auth and Token URLs are set
type ConfiguredClient = Client<
    BasicErrorResponse,
    BasicTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,    // HasAuthUrl
    EndpointNotSet, // HasDeviceAuthUrl
    EndpointNotSet, // HasIntrospectionUrl
    EndpointNotSet, // HasRevocationUrl
    EndpointSet,    // HasTokenUrl
>;

/// Load the operator-supplied client secret (`installed` or `web` JSON).
pub fn read_client_secret(path: &Path) -> Result<ApplicationSecret> {
    let contents = fs::read(path).map_err(|e| {
        AppError::Config(format!(
            "Unable to read client secret file {}: {}",
            path.display(),
            e
        ))
    })?;

    yup_oauth2::parse_application_secret(contents).map_err(|e| {
        AppError::Config(format!(
            "Unable to parse client secret file {}: {}",
            path.display(),
            e
        ))
    })
}

/// Redirect URI for copy/paste flows: the first one registered with the secret.
pub fn interactive_redirect_uri(secret: &ApplicationSecret) -> String {
    secret
        .redirect_uris
        .first()
        .cloned()
        .unwrap_or_else(|| OOB_REDIRECT_URI.to_string())
}

pub struct GoogleOAuth {
    client: ConfiguredClient,
    http_client: reqwest::Client,
    scopes: Vec<String>,
}

impl GoogleOAuth {
    pub fn new(secret: &ApplicationSecret, redirect_uri: &str, scopes: &[&str]) -> Result<Self> {
        let auth_url = AuthUrl::new(secret.auth_uri.clone())
            .map_err(|e| AppError::Auth(format!("Invalid auth URL: {}", e)))?;
        let token_url = TokenUrl::new(secret.token_uri.clone())
            .map_err(|e| AppError::Auth(format!("Invalid token URL: {}", e)))?;
        let redirect_url = RedirectUrl::new(redirect_uri.to_string())
            .map_err(|e| AppError::Auth(format!("Invalid redirect URL: {}", e)))?;

        let client = BasicClient::new(ClientId::new(secret.client_id.clone()))
            .set_client_secret(ClientSecret::new(secret.client_secret.clone()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url);

        let http_client = reqwest::ClientBuilder::new()
            .redirect(Policy::none())
            .build()
            .map_err(|e| AppError::Auth(format!("Failed to build reqwest client: {}", e)))?;

        Ok(Self {
            client,
            http_client,
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        })
    }
}

#[async_trait]
impl TokenProvider for GoogleOAuth {
    fn authorization_request(&self) -> AuthorizationRequest {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let scopes = self
            .scopes
            .iter()
            .map(|s| Scope::new(s.clone()))
            .collect::<Vec<Scope>>();

        // access_type=offline makes Google issue a refresh token alongside the access token
        let (url, csrf_token) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(scopes)
            .set_pkce_challenge(pkce_challenge)
            .add_extra_param("access_type", "offline")
            .url();

        AuthorizationRequest {
            url,
            csrf_token,
            pkce_verifier,
        }
    }

    #[instrument(name = "Exchanging authorization code", skip_all)]
    async fn exchange_code(&self, code: String, pkce_verifier: PkceCodeVerifier) -> Result<Token> {
        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(&self.http_client)
            .await
            .map_err(|e| AppError::AuthExchange(e.to_string()))?;

        debug!(
            has_refresh_token = response.refresh_token().is_some(),
            "Authorization code exchanged"
        );
        Ok(token_from_response(&response, None, Utc::now()))
    }

    #[instrument(name = "Refreshing access token", skip_all)]
    async fn refresh(&self, refresh_token: &str) -> Result<Token> {
        let response = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| AppError::Auth(format!("Failed to refresh token: {}", e)))?;

        Ok(token_from_response(&response, Some(refresh_token), Utc::now()))
    }
}

/// Convert a token endpoint response into a cacheable [`Token`].
///
/// Refresh responses usually omit the refresh token; `fallback_refresh_token`
/// is kept in that case.
fn token_from_response(
    response: &BasicTokenResponse,
    fallback_refresh_token: Option<&str>,
    now: DateTime<Utc>,
) -> Token {
    let refresh_token = response
        .refresh_token()
        .map(|token| token.secret().clone())
        .or_else(|| fallback_refresh_token.map(str::to_string));

    let token_type = match response.token_type() {
        BasicTokenType::Mac => "MAC".to_string(),
        BasicTokenType::Extension(other) => other.clone(),
        _ => "Bearer".to_string(),
    };

    Token {
        access_token: response.access_token().secret().clone(),
        token_type,
        refresh_token,
        expiry: response
            .expires_in()
            .map(|d| now + Duration::seconds(d.as_secs() as i64)),
    }
}
