use super::token::{Token, TokenStore};
use super::{CodeReceiver, TokenProvider};
use crate::error::{AppError, Result};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Obtains a usable token, from the cache or by asking the operator.
pub struct AuthFlow<P> {
    provider: P,
    receiver: Box<dyn CodeReceiver>,
    store: TokenStore,
}

impl<P: TokenProvider> AuthFlow<P> {
    pub fn new(provider: P, receiver: Box<dyn CodeReceiver>, store: TokenStore) -> Self {
        Self {
            provider,
            receiver,
            store,
        }
    }

    /// Load the cached token, falling back to the interactive web flow when
    /// the cache is missing or unreadable.
    ///
    /// The cached token is not checked for expiry here; [`AuthorizedClient`]
    /// refreshes it on first use if needed.
    #[instrument(name = "Authenticating to Google Sheets", skip_all)]
    pub async fn get_client(self) -> Result<AuthorizedClient<P>> {
        let token = match self.store.load() {
            Ok(token) => {
                debug!("Using cached token");
                token
            }
            Err(e) => {
                debug!(reason = %e, "No usable cached token, starting web flow");
                let token = self.token_from_web().await?;
                self.persist(&token);
                token
            }
        };

        Ok(AuthorizedClient {
            provider: self.provider,
            store: self.store,
            token: Mutex::new(token),
        })
    }

    async fn token_from_web(&self) -> Result<Token> {
        let request = self.provider.authorization_request();
        let code = self.receiver.receive_code(&request)?;
        self.provider.exchange_code(code, request.pkce_verifier).await
    }

    fn persist(&self, token: &Token) {
        match self.store.save(token) {
            Ok(()) => info!(path = %self.store.path().display(), "Saved credential file"),
            Err(e) => warn!(
                path = %self.store.path().display(),
                "Unable to cache oauth token, continuing without it: {}", e
            ),
        }
    }
}

/// Hands out access tokens, refreshing them through the provider when they expire.
pub struct AuthorizedClient<P> {
    provider: P,
    store: TokenStore,
    token: Mutex<Token>,
}

impl<P: TokenProvider> AuthorizedClient<P> {
    pub async fn access_token(&self) -> Result<String> {
        let mut token = self.token.lock().await;
        if !token.is_expired() {
            return Ok(token.access_token.clone());
        }

        let refresh_token = token.refresh_token.clone().ok_or_else(|| {
            AppError::Auth(
                "Access token expired and no refresh token is cached; rerun with --reset-token"
                    .to_string(),
            )
        })?;

        debug!("Access token expired, refreshing...");
        let refreshed = self.provider.refresh(&refresh_token).await?;

        if let Err(e) = self.store.save(&refreshed) {
            warn!("Unable to cache refreshed token: {}", e);
        }

        *token = refreshed;
        Ok(token.access_token.clone())
    }
}
