//! Stocksheet CLI - publish and read tabular report data in Google Sheets.
//!
//! One run authorizes against Google once, then resolves the report's
//! folder, spreadsheet, and tab idempotently before touching any cells.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use stocksheet_google::{
    AuthManager, ClientConfig, CredentialCache, CredentialStore, TabColor,
};
use stocksheet_report::{first_column, ReportTarget, ReportWorkspace};

/// Scopes the report workflow needs.
const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive",
];

#[derive(Parser)]
#[command(name = "stocksheet")]
#[command(about = "Stocksheet - stock reports in Google Sheets")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Path to the OAuth2 client configuration (installed-app JSON).
    #[arg(long, default_value = "client_secret.json")]
    client_secret: PathBuf,

    /// Path to the persisted credential slot.
    #[arg(long, default_value = "token.json")]
    token: PathBuf,

    /// Drive folder holding the report spreadsheets.
    #[arg(long, default_value = "Stock Report")]
    folder: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write rows into a report tab, creating missing resources on the way.
    Push {
        /// Spreadsheet name, e.g. a stock number.
        #[arg(short, long)]
        spreadsheet: String,

        /// Tab title inside the spreadsheet.
        #[arg(long, default_value = "Daily")]
        tab: String,

        /// Rows as a JSON array of arrays, inline or as @path to a file.
        #[arg(short, long)]
        data: String,

        /// Color for a newly created tab, as "r,g,b" with components in 0..=1.
        #[arg(long)]
        tab_color: Option<String>,
    },

    /// Read the current contents of a report tab.
    Pull {
        /// Spreadsheet name, e.g. a stock number.
        #[arg(short, long)]
        spreadsheet: String,

        /// Tab title inside the spreadsheet.
        #[arg(long, default_value = "Daily")]
        tab: String,

        /// Print only the first cell of each row.
        #[arg(long)]
        first_column: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = ClientConfig::from_file(&cli.client_secret)?;
    let cache = CredentialCache::new(CredentialStore::new(&cli.token), AuthManager::new(config));
    let scopes: Vec<String> = SCOPES.iter().map(|s| s.to_string()).collect();
    let credential = cache.obtain(&scopes).await?;

    let workspace = ReportWorkspace::new(&credential);

    match cli.command {
        Commands::Push {
            spreadsheet,
            tab,
            data,
            tab_color,
        } => {
            cmd_push(
                &workspace,
                &cli.folder,
                &spreadsheet,
                &tab,
                &data,
                tab_color.as_deref(),
            )
            .await
        }

        Commands::Pull {
            spreadsheet,
            tab,
            first_column,
        } => cmd_pull(&workspace, &cli.folder, &spreadsheet, &tab, first_column).await,
    }
}

async fn cmd_push(
    workspace: &ReportWorkspace,
    folder: &str,
    spreadsheet: &str,
    tab: &str,
    data: &str,
    tab_color: Option<&str>,
) -> Result<()> {
    let rows = read_rows(data)?;

    let mut target = ReportTarget::new(folder, spreadsheet, tab);
    if let Some(raw) = tab_color {
        target = target.with_tab_color(parse_tab_color(raw)?);
    }

    let summary = workspace.push(&target, &rows).await?;

    tracing::info!(
        "Updated {} cells in {}",
        summary.updated_cells.unwrap_or(0),
        summary.updated_range.as_deref().unwrap_or("?")
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "spreadsheetId": summary.spreadsheet_id,
            "updatedRange": summary.updated_range,
            "updatedCells": summary.updated_cells,
        }))?
    );

    Ok(())
}

async fn cmd_pull(
    workspace: &ReportWorkspace,
    folder: &str,
    spreadsheet: &str,
    tab: &str,
    only_first_column: bool,
) -> Result<()> {
    let target = ReportTarget::new(folder, spreadsheet, tab);
    let values = workspace.pull(&target).await?;

    let output = if only_first_column {
        Value::Array(first_column(&values))
    } else {
        serde_json::to_value(values)?
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

/// Parse the push payload: a JSON array of arrays, given inline or as
/// `@path` to a file holding it.
fn read_rows(data: &str) -> Result<Vec<Vec<Value>>> {
    let raw = match data.strip_prefix('@') {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?
        }
        None => data.to_string(),
    };

    let rows: Vec<Vec<Value>> =
        serde_json::from_str(&raw).context("Rows must be a JSON array of arrays")?;
    if rows.is_empty() {
        anyhow::bail!("At least one row is required");
    }
    Ok(rows)
}

/// Parse "r,g,b" with components in 0..=1.
fn parse_tab_color(raw: &str) -> Result<TabColor> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        anyhow::bail!("Tab color must be three comma-separated components");
    }

    let mut components = [0.0f64; 3];
    for (slot, part) in components.iter_mut().zip(&parts) {
        let value: f64 = part
            .parse()
            .with_context(|| format!("Invalid color component {:?}", part))?;
        if !(0.0..=1.0).contains(&value) {
            anyhow::bail!("Color components must be within 0..=1, got {}", value);
        }
        *slot = value;
    }

    Ok(TabColor {
        red: components[0],
        green: components[1],
        blue: components[2],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_read_rows_inline_json() {
        let rows = read_rows(r#"[[1, 2], ["x", null]]"#).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_read_rows_rejects_non_tabular_json() {
        assert!(read_rows("[]").is_err());
        assert!(read_rows(r#"{"a": 1}"#).is_err());
        assert!(read_rows("not json").is_err());
    }

    #[test]
    fn test_parse_tab_color() {
        let color = parse_tab_color("1.0, 0.3, 0.4").unwrap();
        assert_eq!(color.red, 1.0);
        assert_eq!(color.green, 0.3);
        assert_eq!(color.blue, 0.4);

        assert!(parse_tab_color("1.0, 0.3").is_err());
        assert!(parse_tab_color("1.0, 0.3, 2.5").is_err());
        assert!(parse_tab_color("red, green, blue").is_err());
    }
}
