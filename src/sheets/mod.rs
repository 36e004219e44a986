mod cell;
mod client;

pub use cell::{CellValue, Row, Table};
pub use client::SheetsClient;

use crate::error::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, instrument};

/// How the values API should render cell contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ValueRender {
    /// Values as displayed in the sheet; every cell arrives as text
    #[default]
    Formatted,
    /// Raw values; numbers arrive as numbers
    Unformatted,
    /// Formulas instead of their results
    Formula,
}

impl ValueRender {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            ValueRender::Formatted => "FORMATTED_VALUE",
            ValueRender::Unformatted => "UNFORMATTED_VALUE",
            ValueRender::Formula => "FORMULA",
        }
    }
}

/// An A1-notation range, optionally qualified by a sheet name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRange {
    pub sheet_name: Option<String>,
    pub cells: String,
}

impl SheetRange {
    pub fn new(sheet_name: Option<String>, cells: impl Into<String>) -> Self {
        Self {
            sheet_name: sheet_name.filter(|name| !name.is_empty()),
            cells: cells.into(),
        }
    }
}

impl fmt::Display for SheetRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sheet_name {
            None => write!(f, "{}", self.cells),
            Some(name) if needs_quoting(name) => {
                write!(f, "'{}'!{}", name.replace('\'', "''"), self.cells)
            }
            Some(name) => write!(f, "{}!{}", name, self.cells),
        }
    }
}

fn needs_quoting(sheet_name: &str) -> bool {
    let already_quoted =
        sheet_name.len() >= 2 && sheet_name.starts_with('\'') && sheet_name.ends_with('\'');
    !already_quoted
        && !sheet_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == ' ' || c == '_')
}

#[async_trait]
pub trait SheetOperations {
    /// Fetch the raw value grid for one range.
    async fn read_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<serde_json::Value>>>;
}

/// Fetch one range as a [`Table`]. An empty range is an error, not an empty table.
#[instrument(name = "Fetching sheet", skip(source, range), fields(range = %range))]
pub async fn fetch<S>(source: &S, spreadsheet_id: &str, range: &SheetRange) -> Result<Table>
where
    S: SheetOperations + Sync,
{
    let range = range.to_string();
    let values = source.read_values(spreadsheet_id, &range).await?;

    let table = Table::from_values(&values)?;
    if table.is_empty() {
        return Err(AppError::EmptyResult(range));
    }

    debug!(rows = table.len(), "Fetched rows");
    Ok(table)
}

#[cfg(test)]
pub(crate) mod mocks {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct MockSheetsClient {
        pub values: Vec<Vec<serde_json::Value>>,
        pub requests: Mutex<Vec<(String, String)>>,
    }

    impl MockSheetsClient {
        pub(crate) fn with_values(values: Vec<Vec<serde_json::Value>>) -> Self {
            Self {
                values,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl SheetOperations for MockSheetsClient {
        async fn read_values(
            &self,
            spreadsheet_id: &str,
            range: &str,
        ) -> Result<Vec<Vec<serde_json::Value>>> {
            self.requests
                .lock()
                .unwrap()
                .push((spreadsheet_id.to_string(), range.to_string()));
            Ok(self.values.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::MockSheetsClient;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_range_display() {
        let bare = SheetRange::new(None, "A2:E");
        assert_eq!(bare.to_string(), "A2:E");

        let named = SheetRange::new(Some("Class Data".to_string()), "A2:E");
        assert_eq!(named.to_string(), "Class Data!A2:E");

        let empty_name = SheetRange::new(Some(String::new()), "A1:ZZ");
        assert_eq!(empty_name.to_string(), "A1:ZZ");
    }

    #[test]
    fn test_range_display_quotes_special_names() {
        let range = SheetRange::new(Some("Bob's Q1-2024".to_string()), "A:C");
        assert_eq!(range.to_string(), "'Bob''s Q1-2024'!A:C");
    }

    #[test]
    fn test_range_display_keeps_quoted_names() {
        let range = SheetRange::new(Some("'My-Sheet'".to_string()), "A1:B");
        assert_eq!(range.to_string(), "'My-Sheet'!A1:B");

        let escaped = SheetRange::new(Some("'Bob''s Q1'".to_string()), "A:C");
        assert_eq!(escaped.to_string(), "'Bob''s Q1'!A:C");
    }

    #[test]
    fn test_value_render_api_names() {
        assert_eq!(ValueRender::default().as_api_str(), "FORMATTED_VALUE");
        assert_eq!(ValueRender::Unformatted.as_api_str(), "UNFORMATTED_VALUE");
        assert_eq!(ValueRender::Formula.as_api_str(), "FORMULA");
    }

    #[tokio::test]
    async fn test_fetch_issues_one_request() {
        let client = MockSheetsClient::with_values(vec![
            vec![json!("Name"), json!("Major")],
            vec![json!("Alexandra"), json!("English")],
        ]);
        let range = SheetRange::new(Some("Class Data".to_string()), "A2:E");

        let table = fetch(&client, "sheet-123", &range).await.unwrap();

        assert_eq!(table.len(), 2);
        let expected: Row = vec!["Alexandra".into(), "English".into()];
        assert_eq!(table.rows[1], expected);
        assert_eq!(
            *client.requests.lock().unwrap(),
            vec![("sheet-123".to_string(), "Class Data!A2:E".to_string())]
        );
    }

    #[tokio::test]
    async fn test_fetch_empty_range_is_an_error() {
        let client = MockSheetsClient::default();
        let range = SheetRange::new(None, "A1:ZZ");

        let err = fetch(&client, "sheet-123", &range).await.unwrap_err();
        match err {
            AppError::EmptyResult(range) => assert_eq!(range, "A1:ZZ"),
            other => panic!("expected empty result, got {:?}", other),
        }
    }
}
