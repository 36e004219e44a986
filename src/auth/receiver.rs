use super::{AuthorizationRequest, CodeReceiver};
use crate::error::{AppError, Result};
use std::io::{self, BufRead};
use tiny_http::{Response, Server};
use tracing::debug;
use url::Url;

/// Prints the consent URL and waits for the operator to paste the code.
///
/// Everything goes to stderr; stdout may be carrying CSV.
pub struct ConsolePrompt;

impl ConsolePrompt {
    fn read_code<R: BufRead>(reader: &mut R) -> Result<String> {
        let mut line = String::new();
        reader.read_line(&mut line).map_err(|e| {
            AppError::AuthExchange(format!("Unable to read authorization code: {}", e))
        })?;

        let code = line.trim();
        if code.is_empty() {
            return Err(AppError::AuthExchange("No authorization code entered".to_string()));
        }
        Ok(code.to_string())
    }
}

impl CodeReceiver for ConsolePrompt {
    fn receive_code(&self, request: &AuthorizationRequest) -> Result<String> {
        eprintln!(
            "Go to the following link in your browser then type the authorization code:\n{}",
            request.url
        );

        // No timeout: waits for as long as the operator takes.
        Self::read_code(&mut io::stdin().lock())
    }
}

/// Receives the redirect on a local port instead of asking for a pasted code.
pub struct LoopbackReceiver {
    port: u16,
}

impl LoopbackReceiver {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Pull the authorization code out of a callback request path, checking
    /// the `state` parameter against the CSRF token that was sent.
    fn code_from_callback(&self, request_path: &str, expected_state: &str) -> Result<String> {
        let callback_url = format!("{}{}", self.redirect_uri(), request_path);
        let url = Url::parse(&callback_url)
            .map_err(|e| AppError::Auth(format!("Failed to parse callback URL: {}", e)))?;

        let param = |name: &str| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
        };

        if let Some(error) = param("error") {
            return Err(AppError::AuthExchange(format!(
                "Authorization was denied: {}",
                error
            )));
        }

        let state =
            param("state").ok_or_else(|| AppError::Auth("No state in callback".to_string()))?;
        if state != expected_state {
            return Err(AppError::Auth("CSRF token mismatch".to_string()));
        }

        param("code").ok_or_else(|| AppError::Auth("No code in callback".to_string()))
    }
}

impl CodeReceiver for LoopbackReceiver {
    fn receive_code(&self, request: &AuthorizationRequest) -> Result<String> {
        let bind_addr = format!("127.0.0.1:{}", self.port);
        let server = Server::http(&bind_addr).map_err(|e| {
            AppError::Other(anyhow::anyhow!("Failed to bind to {}: {}", bind_addr, e))
        })?;

        eprintln!("Open this URL in your browser:\n{}", request.url);
        eprintln!();
        eprintln!("Waiting for authorization...");

        let callback = server
            .recv()
            .map_err(|e| AppError::Auth(format!("Failed to receive request: {}", e)))?;
        debug!(path = callback.url(), "Received OAuth callback");

        let result = self.code_from_callback(callback.url(), request.csrf_token.secret());

        let body = match &result {
            Ok(_) => "Authentication successful! You can close this window.".to_string(),
            Err(e) => format!("Authentication failed: {}", e),
        };
        callback
            .respond(Response::from_string(body))
            .map_err(|e| AppError::Auth(format!("Failed to send response: {}", e)))?;

        result
    }
}
