//! Google Drive and Sheets access layer for stocksheet.
//!
//! This crate covers the two halves of the automation core:
//! - Credential lifecycle: a persisted token slot with reuse, refresh, and
//!   interactive re-acquisition (`credentials`, `auth`).
//! - Idempotent resource resolution: one generic find-or-create applied to
//!   folders, spreadsheets, and sheet tabs (`resolver`), backed by thin
//!   HTTP clients (`drive`, `sheets`).

pub mod auth;
pub mod credentials;
pub mod drive;
pub mod resolver;
pub mod sheets;

pub use auth::{AuthManager, ClientConfig};
pub use credentials::{Credential, CredentialCache, CredentialStore, IdentityProvider};
pub use drive::{DriveClient, DriveFile};
pub use resolver::{
    find_or_create, FolderScope, Resource, ResourceKind, ResourceScope, SheetScope,
    SpreadsheetScope,
};
pub use sheets::{
    GridProperties, SheetProperties, SheetsClient, Spreadsheet, TabColor, UpdateSummary,
    ValueRange,
};
