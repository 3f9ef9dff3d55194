//! Idempotent list-filter-create resolution of named remote resources.
//!
//! One generic [`find_or_create`] is parameterized over a [`ResourceScope`]
//! capability and applied at three levels: folders under the drive root,
//! spreadsheets under a folder, and sheet tabs within a spreadsheet. Only
//! the listing call, the match predicate, and the creation payload differ
//! per level.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::fmt;

use stocksheet_common::{Error, Result};

use super::drive::{DriveClient, DriveFile};
use super::sheets::{GridProperties, SheetProperties, SheetsClient, TabColor};

/// Kind of a named remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Folder,
    Spreadsheet,
    Sheet,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Folder => write!(f, "folder"),
            ResourceKind::Spreadsheet => write!(f, "spreadsheet"),
            ResourceKind::Sheet => write!(f, "sheet"),
        }
    }
}

/// A named remote resource tracked by identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Identifier assigned by the service, immutable once created.
    pub id: String,
    /// Name used as the lookup key.
    pub name: String,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Identifier of the containing resource, none at top level.
    pub parent: Option<String>,
    /// Creation time, where the service reports one.
    pub created: Option<DateTime<Utc>>,
}

/// Capability a resolvable resource level provides: listing the parent
/// scope, matching candidates, and building the creation call.
#[async_trait]
pub trait ResourceScope: Send + Sync {
    /// Kind this scope resolves.
    fn kind(&self) -> ResourceKind;

    /// Identifier of the parent scope, none for the drive root.
    fn parent(&self) -> Option<&str>;

    /// List the resources of this kind currently visible in the scope.
    async fn list(&self) -> Result<Vec<Resource>>;

    /// Exact-name match within the scope.
    fn matches(&self, resource: &Resource, name: &str) -> bool {
        resource.kind == self.kind() && resource.name == name
    }

    /// Create the resource, forwarding `name` and the scope's parent and
    /// kind-specific creation properties.
    async fn create(&self, name: &str) -> Result<Resource>;
}

/// Find the resource with the given name in the scope, creating it when no
/// match exists.
///
/// Two sequential calls with identical arguments yield the same identifier
/// and at most one creation call, absent concurrent external mutation.
/// When the listing already holds several resources with the same name, the
/// earliest created wins, keeping listing order among entries the service
/// reports no timestamp for.
pub async fn find_or_create<S: ResourceScope + ?Sized>(scope: &S, name: &str) -> Result<Resource> {
    let listed = scope.list().await?;
    let mut matches: Vec<Resource> = listed
        .into_iter()
        .filter(|resource| scope.matches(resource, name))
        .collect();

    if matches.len() > 1 {
        tracing::warn!(
            "{} {}s named {:?} in scope {:?}, resolving to the earliest created",
            matches.len(),
            scope.kind(),
            name,
            scope.parent()
        );
        matches.sort_by(|a, b| match (a.created, b.created) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
    }

    if let Some(existing) = matches.into_iter().next() {
        tracing::debug!(
            "Found existing {} {:?} ({})",
            existing.kind,
            existing.name,
            existing.id
        );
        return Ok(existing);
    }

    tracing::info!("Creating {} {:?}", scope.kind(), name);
    scope.create(name).await
}

fn drive_resource(file: DriveFile, kind: ResourceKind) -> Resource {
    Resource {
        id: file.id,
        name: file.name,
        kind,
        parent: file.parents.into_iter().next(),
        created: file.created_time,
    }
}

/// Folders directly visible to the identity, resolved under the drive root.
pub struct FolderScope<'a> {
    drive: &'a DriveClient,
}

impl<'a> FolderScope<'a> {
    pub fn new(drive: &'a DriveClient) -> Self {
        Self { drive }
    }
}

#[async_trait]
impl ResourceScope for FolderScope<'_> {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Folder
    }

    fn parent(&self) -> Option<&str> {
        None
    }

    async fn list(&self) -> Result<Vec<Resource>> {
        let files = self.drive.list_files(Some("trashed = false")).await?;
        Ok(files
            .into_iter()
            .filter(DriveFile::is_folder)
            .map(|file| drive_resource(file, ResourceKind::Folder))
            .collect())
    }

    async fn create(&self, name: &str) -> Result<Resource> {
        let file = self.drive.create_folder(name, None).await?;
        Ok(drive_resource(file, ResourceKind::Folder))
    }
}

/// Spreadsheets under one folder.
pub struct SpreadsheetScope<'a> {
    drive: &'a DriveClient,
    folder_id: String,
    description: Option<String>,
}

impl<'a> SpreadsheetScope<'a> {
    pub fn new(drive: &'a DriveClient, folder_id: impl Into<String>) -> Self {
        Self {
            drive,
            folder_id: folder_id.into(),
            description: None,
        }
    }

    /// Description attached to newly created spreadsheets.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[async_trait]
impl ResourceScope for SpreadsheetScope<'_> {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Spreadsheet
    }

    fn parent(&self) -> Option<&str> {
        Some(&self.folder_id)
    }

    async fn list(&self) -> Result<Vec<Resource>> {
        let files = self.drive.list_children(&self.folder_id).await?;
        Ok(files
            .into_iter()
            .filter(DriveFile::is_spreadsheet)
            .map(|file| drive_resource(file, ResourceKind::Spreadsheet))
            .collect())
    }

    async fn create(&self, name: &str) -> Result<Resource> {
        let file = self
            .drive
            .create_spreadsheet(name, &self.folder_id, self.description.as_deref())
            .await?;
        Ok(drive_resource(file, ResourceKind::Spreadsheet))
    }
}

/// Sheet tabs within one spreadsheet.
pub struct SheetScope<'a> {
    sheets: &'a SheetsClient,
    spreadsheet_id: String,
    grid: GridProperties,
    tab_color: Option<TabColor>,
}

impl<'a> SheetScope<'a> {
    pub fn new(
        sheets: &'a SheetsClient,
        spreadsheet_id: impl Into<String>,
        grid: GridProperties,
    ) -> Self {
        Self {
            sheets,
            spreadsheet_id: spreadsheet_id.into(),
            grid,
            tab_color: None,
        }
    }

    /// Tab color applied to newly created tabs.
    pub fn with_tab_color(mut self, color: TabColor) -> Self {
        self.tab_color = Some(color);
        self
    }

    fn sheet_resource(&self, properties: &SheetProperties) -> Result<Resource> {
        let id = properties
            .sheet_id
            .ok_or_else(|| Error::Remote("Sheet reply missing sheetId".to_string()))?;
        Ok(Resource {
            id: id.to_string(),
            name: properties.title.clone(),
            kind: ResourceKind::Sheet,
            parent: Some(self.spreadsheet_id.clone()),
            created: None,
        })
    }
}

#[async_trait]
impl ResourceScope for SheetScope<'_> {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Sheet
    }

    fn parent(&self) -> Option<&str> {
        Some(&self.spreadsheet_id)
    }

    async fn list(&self) -> Result<Vec<Resource>> {
        let spreadsheet = self.sheets.get_spreadsheet(&self.spreadsheet_id).await?;
        spreadsheet
            .sheet_properties()
            .map(|properties| self.sheet_resource(properties))
            .collect()
    }

    async fn create(&self, name: &str) -> Result<Resource> {
        let properties = SheetProperties {
            sheet_id: None,
            title: name.to_string(),
            index: Some(0),
            grid_properties: Some(self.grid),
            tab_color: self.tab_color,
        };
        let created = self.sheets.add_sheet(&self.spreadsheet_id, &properties).await?;
        self.sheet_resource(&created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Mutex;

    /// In-memory scope double; creation assigns fresh identifiers and is
    /// counted.
    struct MemoryScope {
        kind: ResourceKind,
        parent: Option<String>,
        resources: Mutex<Vec<Resource>>,
        create_calls: AtomicUsize,
        created_names: Mutex<Vec<String>>,
    }

    impl MemoryScope {
        fn new(kind: ResourceKind, parent: Option<&str>) -> Self {
            Self {
                kind,
                parent: parent.map(str::to_string),
                resources: Mutex::new(Vec::new()),
                create_calls: AtomicUsize::new(0),
                created_names: Mutex::new(Vec::new()),
            }
        }

        fn seed(self, resources: Vec<Resource>) -> Self {
            *self.resources.lock().unwrap() = resources;
            self
        }

        fn creations(&self) -> usize {
            self.create_calls.load(AtomicOrdering::SeqCst)
        }
    }

    #[async_trait]
    impl ResourceScope for MemoryScope {
        fn kind(&self) -> ResourceKind {
            self.kind
        }

        fn parent(&self) -> Option<&str> {
            self.parent.as_deref()
        }

        async fn list(&self) -> Result<Vec<Resource>> {
            Ok(self.resources.lock().unwrap().clone())
        }

        async fn create(&self, name: &str) -> Result<Resource> {
            self.create_calls.fetch_add(1, AtomicOrdering::SeqCst);
            self.created_names.lock().unwrap().push(name.to_string());
            let resource = Resource {
                id: uuid::Uuid::new_v4().to_string(),
                name: name.to_string(),
                kind: self.kind,
                parent: self.parent.clone(),
                created: Some(Utc::now()),
            };
            self.resources.lock().unwrap().push(resource.clone());
            Ok(resource)
        }
    }

    fn resource(id: &str, name: &str, kind: ResourceKind) -> Resource {
        Resource {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            parent: None,
            created: None,
        }
    }

    #[tokio::test]
    async fn test_find_or_create_is_idempotent() {
        let scope = MemoryScope::new(ResourceKind::Spreadsheet, Some("folder-1"));

        let first = find_or_create(&scope, "2330").await.unwrap();
        let second = find_or_create(&scope, "2330").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(scope.creations(), 1);
    }

    #[tokio::test]
    async fn test_create_receives_exact_name_and_parent() {
        let scope = MemoryScope::new(ResourceKind::Spreadsheet, Some("folder-1"));

        let created = find_or_create(&scope, "Weekly Report").await.unwrap();

        assert_eq!(created.name, "Weekly Report");
        assert_eq!(created.parent.as_deref(), Some("folder-1"));
        assert_eq!(
            *scope.created_names.lock().unwrap(),
            vec!["Weekly Report".to_string()]
        );
    }

    #[tokio::test]
    async fn test_empty_listing_creates_folder_and_forwards_id() {
        // Drive root, name "Stock Report", empty listing: exactly one
        // creation, and its identifier is the call's result.
        let scope = MemoryScope::new(ResourceKind::Folder, None);

        let folder = find_or_create(&scope, "Stock Report").await.unwrap();

        assert_eq!(scope.creations(), 1);
        assert_eq!(folder.kind, ResourceKind::Folder);
        let stored = scope.resources.lock().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, folder.id);
    }

    #[tokio::test]
    async fn test_existing_resource_is_returned_without_creation() {
        let scope = MemoryScope::new(ResourceKind::Folder, None).seed(vec![resource(
            "folder-7",
            "Stock Report",
            ResourceKind::Folder,
        )]);

        let found = find_or_create(&scope, "Stock Report").await.unwrap();

        assert_eq!(found.id, "folder-7");
        assert_eq!(scope.creations(), 0);
    }

    #[tokio::test]
    async fn test_name_match_is_exact() {
        let scope = MemoryScope::new(ResourceKind::Folder, None).seed(vec![resource(
            "folder-7",
            "Stock Report 2024",
            ResourceKind::Folder,
        )]);

        let created = find_or_create(&scope, "Stock Report").await.unwrap();

        assert_ne!(created.id, "folder-7");
        assert_eq!(scope.creations(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_names_resolve_to_earliest_created() {
        let newer = Resource {
            created: Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()),
            ..resource("newer", "Stock Report", ResourceKind::Folder)
        };
        let older = Resource {
            created: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            ..resource("older", "Stock Report", ResourceKind::Folder)
        };
        let scope = MemoryScope::new(ResourceKind::Folder, None).seed(vec![newer, older]);

        let resolved = find_or_create(&scope, "Stock Report").await.unwrap();

        assert_eq!(resolved.id, "older");
        assert_eq!(scope.creations(), 0);
    }

    #[tokio::test]
    async fn test_untimestamped_duplicates_keep_listing_order() {
        let scope = MemoryScope::new(ResourceKind::Sheet, Some("ss-1")).seed(vec![
            resource("0", "Daily", ResourceKind::Sheet),
            resource("7", "Daily", ResourceKind::Sheet),
        ]);

        let resolved = find_or_create(&scope, "Daily").await.unwrap();

        assert_eq!(resolved.id, "0");
    }
}
