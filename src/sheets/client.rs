use super::{SheetOperations, ValueRender};
use crate::auth::{AuthorizedClient, TokenProvider};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use google_sheets4::api::{Scope, Sheets};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use tracing::{debug, instrument};

// Read-only access to spreadsheet values
const AUTH_SCOPE: Scope = Scope::SpreadsheetReadonly;

pub struct SheetsClient<P> {
    auth: AuthorizedClient<P>,
    connector: HttpsConnector<HttpConnector>,
    value_render: ValueRender,
}

impl<P: TokenProvider> SheetsClient<P> {
    pub fn new(auth: AuthorizedClient<P>, value_render: ValueRender) -> Result<Self> {
        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()?
            .https_or_http()
            .enable_http1()
            .build();

        Ok(Self {
            auth,
            connector,
            value_render,
        })
    }
}

#[async_trait]
impl<P: TokenProvider> SheetOperations for SheetsClient<P> {
    #[instrument(name = "Reading values", skip(self))]
    async fn read_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<serde_json::Value>>> {
        // Refreshes the access token first if it has expired
        let access_token = self.auth.access_token().await?;

        let client =
            Client::builder(hyper_util::rt::TokioExecutor::new()).build(self.connector.clone());
        let hub = Sheets::new(client, access_token);

        let (_, response) = hub
            .spreadsheets()
            .values_get(spreadsheet_id, range)
            .major_dimension("ROWS")
            .value_render_option(self.value_render.as_api_str())
            .date_time_render_option("FORMATTED_STRING")
            .add_scope(AUTH_SCOPE)
            .doit()
            .await
            .map_err(|e| classify_error(e, range))?;

        debug!(range = ?response.range, "Values received");

        // Values are Option<Vec<Vec<serde_json::Value>>>
        Ok(response.values.unwrap_or_default())
    }
}

/// Unknown spreadsheet IDs come back as 404 and unparseable ranges as 400.
fn classify_error(err: google_sheets4::Error, range: &str) -> AppError {
    if let google_sheets4::Error::BadRequest(body) = &err {
        let code = body["error"]["code"].as_u64();
        if matches!(code, Some(400) | Some(404)) {
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or("requested entity was not found");
            return AppError::NotFound(format!("{}: {}", range, message));
        }
    }

    AppError::Sheets(format!(
        "Unable to retrieve data from sheet '{}': {}",
        range, err
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_not_found() {
        let err = google_sheets4::Error::BadRequest(json!({
            "error": {
                "code": 404,
                "message": "Requested entity was not found.",
                "status": "NOT_FOUND"
            }
        }));

        match classify_error(err, "Sheet1!A1:B") {
            AppError::NotFound(message) => {
                assert_eq!(message, "Sheet1!A1:B: Requested entity was not found.")
            }
            other => panic!("expected not found, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_bad_range() {
        let err = google_sheets4::Error::BadRequest(json!({
            "error": {
                "code": 400,
                "message": "Unable to parse range: Nope!A1",
                "status": "INVALID_ARGUMENT"
            }
        }));

        assert!(matches!(
            classify_error(err, "Nope!A1"),
            AppError::NotFound(_)
        ));
    }

    #[test]
    fn test_classify_other_errors() {
        let err = google_sheets4::Error::BadRequest(json!({
            "error": {"code": 403, "message": "The caller does not have permission"}
        }));
        assert!(matches!(classify_error(err, "A1"), AppError::Sheets(_)));

        assert!(matches!(
            classify_error(google_sheets4::Error::Cancelled, "A1"),
            AppError::Sheets(_)
        ));
    }
}
