mod flow;
mod google;
mod receiver;
pub(crate) mod token;

pub use flow::{AuthFlow, AuthorizedClient};
pub use google::{
    GoogleOAuth, SHEETS_READONLY_SCOPE, interactive_redirect_uri, read_client_secret,
};
pub use receiver::{ConsolePrompt, LoopbackReceiver};
pub use token::{Token, TokenStore};

use crate::error::Result;
use async_trait::async_trait;
use oauth2::{CsrfToken, PkceCodeVerifier};
use url::Url;

/// A consent URL together with the secrets needed to complete it.
pub struct AuthorizationRequest {
    pub url: Url,
    pub csrf_token: CsrfToken,
    pub pkce_verifier: PkceCodeVerifier,
}

/// The OAuth2 endpoints of an identity provider.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    fn authorization_request(&self) -> AuthorizationRequest;

    async fn exchange_code(&self, code: String, pkce_verifier: PkceCodeVerifier) -> Result<Token>;

    async fn refresh(&self, refresh_token: &str) -> Result<Token>;
}

/// Obtains an authorization code from the operator for a consent request.
pub trait CodeReceiver: Send + Sync {
    fn receive_code(&self, request: &AuthorizationRequest) -> Result<String>;
}
