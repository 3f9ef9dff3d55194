//! Report runs over the Google access layer.

use serde_json::Value;

use stocksheet_common::{Error, Result};
use stocksheet_google::{
    find_or_create, Credential, DriveClient, FolderScope, GridProperties, Resource, SheetScope,
    SheetsClient, SpreadsheetScope, TabColor, UpdateSummary,
};

use crate::range::a1_range;

/// Grid used when a tab has to be created without data to size it from.
const DEFAULT_GRID: GridProperties = GridProperties {
    row_count: 20,
    column_count: 12,
};

/// Where a report lives: a folder under the drive root, a spreadsheet under
/// the folder, a tab inside the spreadsheet.
#[derive(Debug, Clone)]
pub struct ReportTarget {
    /// Folder name under the drive root.
    pub folder: String,
    /// Spreadsheet name, e.g. a stock number.
    pub spreadsheet: String,
    /// Tab title.
    pub tab: String,
    /// Color applied to a newly created tab.
    pub tab_color: Option<TabColor>,
}

impl ReportTarget {
    pub fn new(
        folder: impl Into<String>,
        spreadsheet: impl Into<String>,
        tab: impl Into<String>,
    ) -> Self {
        Self {
            folder: folder.into(),
            spreadsheet: spreadsheet.into(),
            tab: tab.into(),
            tab_color: None,
        }
    }

    pub fn with_tab_color(mut self, color: TabColor) -> Self {
        self.tab_color = Some(color);
        self
    }
}

/// Drive/Sheets client pair executing report runs.
pub struct ReportWorkspace {
    drive: DriveClient,
    sheets: SheetsClient,
}

impl ReportWorkspace {
    /// Create a workspace from an obtained credential.
    pub fn new(credential: &Credential) -> Self {
        Self::with_clients(
            DriveClient::new(credential.bearer()),
            SheetsClient::new(credential.bearer()),
        )
    }

    /// Create a workspace over preconfigured clients.
    pub fn with_clients(drive: DriveClient, sheets: SheetsClient) -> Self {
        Self { drive, sheets }
    }

    /// Resolve the target's folder and spreadsheet, creating either when
    /// missing.
    async fn resolve_spreadsheet(&self, target: &ReportTarget) -> Result<Resource> {
        let folder = find_or_create(&FolderScope::new(&self.drive), &target.folder).await?;
        let scope = SpreadsheetScope::new(&self.drive, folder.id);
        find_or_create(&scope, &target.spreadsheet).await
    }

    /// Resolve the target's tab inside `spreadsheet_id`, creating it with
    /// the given grid when missing.
    async fn resolve_tab(
        &self,
        target: &ReportTarget,
        spreadsheet_id: &str,
        grid: GridProperties,
    ) -> Result<Resource> {
        let mut scope = SheetScope::new(&self.sheets, spreadsheet_id, grid);
        if let Some(color) = target.tab_color {
            scope = scope.with_tab_color(color);
        }
        find_or_create(&scope, &target.tab).await
    }

    /// Write rows into the target tab, creating the folder, spreadsheet,
    /// and tab as needed; a created tab's grid is sized to the data.
    ///
    /// Rows are written from A1 with RAW value input.
    pub async fn push(&self, target: &ReportTarget, rows: &[Vec<Value>]) -> Result<UpdateSummary> {
        let grid = grid_for(rows)?;
        let spreadsheet = self.resolve_spreadsheet(target).await?;
        self.resolve_tab(target, &spreadsheet.id, grid).await?;

        let range = a1_range(&target.tab, grid.row_count, grid.column_count)?;
        tracing::info!(
            "Writing {} rows to {} in spreadsheet {}",
            rows.len(),
            range,
            spreadsheet.id
        );
        self.sheets
            .update_values(&spreadsheet.id, &range, rows)
            .await
    }

    /// Read the target tab's full grid, creating missing resources on the
    /// way like the write path does.
    pub async fn pull(&self, target: &ReportTarget) -> Result<Vec<Vec<Value>>> {
        let spreadsheet = self.resolve_spreadsheet(target).await?;
        self.resolve_tab(target, &spreadsheet.id, DEFAULT_GRID)
            .await?;

        // The tab's grid bounds the read range.
        let properties = self
            .sheets
            .get_spreadsheet(&spreadsheet.id)
            .await?
            .find_sheet(&target.tab)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Sheet tab {:?}", target.tab)))?;
        let grid = properties.grid_properties.unwrap_or(DEFAULT_GRID);

        let range = a1_range(&target.tab, grid.row_count, grid.column_count)?;
        let mut ranges = self
            .sheets
            .batch_get_values(&spreadsheet.id, &[range])
            .await?;

        Ok(ranges.pop().map(|range| range.values).unwrap_or_default())
    }
}

/// Grid sized to the rows about to be written.
fn grid_for(rows: &[Vec<Value>]) -> Result<GridProperties> {
    let columns = rows.iter().map(|row| row.len() as i64).max().unwrap_or(0);
    if rows.is_empty() || columns == 0 {
        return Err(Error::InvalidInput(
            "At least one non-empty row is required".to_string(),
        ));
    }
    Ok(GridProperties {
        row_count: rows.len() as i64,
        column_count: columns,
    })
}

/// First cell of every populated row.
pub fn first_column(rows: &[Vec<Value>]) -> Vec<Value> {
    rows.iter().filter_map(|row| row.first().cloned()).collect()
}
