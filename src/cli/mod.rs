use crate::auth::{
    AuthFlow, CodeReceiver, ConsolePrompt, GoogleOAuth, LoopbackReceiver, SHEETS_READONLY_SCOPE,
    TokenStore, interactive_redirect_uri, read_client_secret,
};
use crate::config::{Config, ExportSettings, Overrides};
use crate::error::Result;
use crate::sheets::{self, SheetOperations, SheetsClient, ValueRender};
use crate::transcribe::transcribe;
use clap::Parser;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};
use yup_oauth2::ApplicationSecret;

const EXAMPLES: &str = "\
Examples:
  Export columns A through E of the \"Class Data\" sheet, starting at row 2:

    sheets2csv --client-secret etc/client_secret.json \\
        1BxiMVs0XRA5nFMdKvBdBZjgmUUqptlbs74OgvE2upms \"Class Data\" A2:E

  Take the secret and spreadsheet from the environment and write a file:

    export GOOGLE_CLIENT_SECRET_JSON=etc/client_secret.json
    export GOOGLE_SHEET_ID=1BxiMVs0XRA5nFMdKvBdBZjgmUUqptlbs74OgvE2upms
    sheets2csv -o class-data.csv \"Class Data\"

The first run prints a consent URL and waits for the authorization code; the
token is then cached in ~/.credentials for later runs.";

#[derive(Parser, Debug)]
#[command(name = "sheets2csv")]
#[command(about = "Export a Google Sheets range as CSV", long_about = None)]
#[command(version, after_help = "Run with --help for examples.", after_long_help = EXAMPLES)]
pub struct Cli {
    /// Path to the OAuth client secret JSON
    #[arg(long, env = "GOOGLE_CLIENT_SECRET_JSON", value_name = "PATH")]
    pub client_secret: Option<PathBuf>,

    /// Spreadsheet ID
    #[arg(long, env = "GOOGLE_SHEET_ID", value_name = "ID")]
    pub sheet_id: Option<String>,

    /// Sheet (tab) name to qualify the range with
    #[arg(long, value_name = "NAME")]
    pub sheet_name: Option<String>,

    /// Cell range in A1 notation [default: A1:ZZ]
    #[arg(long, value_name = "RANGE")]
    pub cell_range: Option<String>,

    /// Write CSV to this file instead of stdout
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// How cell values are rendered by the API
    #[arg(long, value_enum)]
    pub value_render: Option<ValueRender>,

    /// Token cache location [default: ~/.credentials/sheets.googleapis.com-sheets2csv.json]
    #[arg(long, value_name = "PATH")]
    pub token_cache: Option<PathBuf>,

    /// Receive the authorization code on this local port instead of pasting it
    #[arg(long, value_name = "PORT")]
    pub listen: Option<u16>,

    /// Discard any cached token and authenticate again
    #[arg(long)]
    pub reset_token: bool,

    /// Suppress error messages
    #[arg(short, long)]
    pub quiet: bool,

    /// [SPREADSHEET_ID] [SHEET_NAME] [CELL_RANGE]
    #[arg(value_name = "ARGS")]
    pub args: Vec<String>,
}

impl Cli {
    pub async fn run(&self) -> Result<()> {
        let settings = ExportSettings::resolve(self.overrides(), Config::load()?)?;

        let store = match &settings.token_cache {
            Some(path) => TokenStore::new(path),
            None => TokenStore::new(TokenStore::locate()?),
        };
        let secret = load_secret_and_reset(&settings, &store, self.reset_token)?;
        let (redirect_uri, receiver): (String, Box<dyn CodeReceiver>) = match self.listen {
            Some(port) => {
                let receiver = LoopbackReceiver::new(port);
                (receiver.redirect_uri(), Box::new(receiver) as Box<dyn CodeReceiver>)
            }
            None => (
                interactive_redirect_uri(&secret),
                Box::new(ConsolePrompt) as Box<dyn CodeReceiver>,
            ),
        };
        let provider = GoogleOAuth::new(&secret, &redirect_uri, &[SHEETS_READONLY_SCOPE])?;

        let auth = AuthFlow::new(provider, receiver, store).get_client().await?;
        let client = SheetsClient::new(auth, settings.value_render)?;

        export(&client, &settings, self.output.as_deref()).await
    }

    fn overrides(&self) -> Overrides {
        Overrides {
            client_secret: self.client_secret.clone(),
            sheet_id: self.sheet_id.clone(),
            sheet_name: self.sheet_name.clone(),
            cell_range: self.cell_range.clone(),
            token_cache: self.token_cache.clone(),
            value_render: self.value_render,
            positional: self.args.clone(),
        }
    }
}

/// Load the client secret, then discard the cached token if asked to. A bad
/// secret path leaves the cache untouched.
fn load_secret_and_reset(
    settings: &ExportSettings,
    store: &TokenStore,
    reset_token: bool,
) -> Result<ApplicationSecret> {
    let secret = read_client_secret(&settings.client_secret)?;
    if reset_token {
        store.clear()?;
        info!(path = %store.path().display(), "Cleared cached token");
    }
    Ok(secret)
}

/// Fetch the configured range and write it as CSV. The output file is only
/// created once the fetch has succeeded.
#[instrument(name = "Exporting", skip_all, fields(spreadsheet_id = %settings.spreadsheet_id))]
async fn export<S>(
    source: &S,
    settings: &ExportSettings,
    output: Option<&Path>,
) -> Result<()>
where
    S: SheetOperations + Sync,
{
    let table = sheets::fetch(source, &settings.spreadsheet_id, &settings.range).await?;
    let csv = transcribe(&table)?;

    match output {
        Some(path) => {
            fs::write(path, csv)?;
            info!(path = %path.display(), rows = table.len(), "Wrote CSV");
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(csv.as_bytes())?;
            stdout.flush()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::test_helpers::mock_token;
    use crate::error::AppError;
    use crate::sheets::SheetRange;
    use crate::sheets::mocks::MockSheetsClient;
    use clap::CommandFactory;
    use serde_json::json;

    fn settings() -> ExportSettings {
        ExportSettings {
            client_secret: PathBuf::from("secret.json"),
            spreadsheet_id: "sheet-123".to_string(),
            range: SheetRange::new(Some("Class Data".to_string()), "A2:E"),
            token_cache: None,
            value_render: ValueRender::Unformatted,
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parses_flags_and_positionals() {
        let cli = Cli::try_parse_from([
            "sheets2csv",
            "--client-secret",
            "etc/client_secret.json",
            "-o",
            "out.csv",
            "--value-render",
            "unformatted",
            "--reset-token",
            "sheet-123",
            "Class Data",
        ])
        .unwrap();

        assert_eq!(cli.output, Some(PathBuf::from("out.csv")));
        assert_eq!(cli.value_render, Some(ValueRender::Unformatted));
        assert!(cli.reset_token);

        let overrides = cli.overrides();
        assert_eq!(overrides.positional, vec!["sheet-123", "Class Data"]);
        assert_eq!(
            overrides.client_secret,
            Some(PathBuf::from("etc/client_secret.json"))
        );
    }

    #[test]
    fn test_reset_token_keeps_cache_when_secret_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        store.save(&mock_token("still-good", None)).unwrap();
        let mut settings = settings();
        settings.client_secret = dir.path().join("typo.json");

        let err = load_secret_and_reset(&settings, &store, true).unwrap_err();

        assert!(matches!(err, AppError::Config(_)), "got {:?}", err);
        assert_eq!(store.load().unwrap().access_token, "still-good");
    }

    #[test]
    fn test_reset_token_clears_cache() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        store.save(&mock_token("stale", None)).unwrap();
        let mut settings = settings();
        settings.client_secret = dir.path().join("client_secret.json");
        fs::write(
            &settings.client_secret,
            r#"{"installed":{"client_id":"id.apps.googleusercontent.com","client_secret":"s3cret","auth_uri":"https://accounts.google.com/o/oauth2/auth","token_uri":"https://oauth2.googleapis.com/token","redirect_uris":["urn:ietf:wg:oauth:2.0:oob"]}}"#,
        )
        .unwrap();

        load_secret_and_reset(&settings, &store, true).unwrap();

        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_export_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let client = MockSheetsClient::with_values(vec![
            vec![json!(1), json!("Alice"), json!(3.5)],
            vec![json!("Bob"), json!(2)],
            vec![json!("Smith, John")],
        ]);

        export(&client, &settings(), Some(path.as_path())).await.unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "1,Alice,3.500000\nBob,2\n\"Smith, John\"\n"
        );
    }

    #[tokio::test]
    async fn test_export_twice_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.csv");
        let second = dir.path().join("second.csv");
        let client = MockSheetsClient::with_values(vec![vec![json!("a"), json!(1.25)]]);

        export(&client, &settings(), Some(first.as_path())).await.unwrap();
        export(&client, &settings(), Some(second.as_path())).await.unwrap();

        assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
    }

    #[tokio::test]
    async fn test_export_empty_result_creates_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let client = MockSheetsClient::default();

        let err = export(&client, &settings(), Some(path.as_path())).await.unwrap_err();

        assert!(matches!(err, AppError::EmptyResult(_)), "got {:?}", err);
        assert!(!path.exists(), "no output should be produced");
    }
}
