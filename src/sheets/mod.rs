//! Spreadsheet gateway: the raw range primitives the engine consumes.
//!
//! Gateways are always scoped to one set of OAuth credentials. A
//! [`SheetsConnector`] hands out a fresh gateway per resolved request, so no
//! client is ever shared between two users.

pub mod google;

use std::sync::Arc;

use async_trait::async_trait;

use crate::models::User;

pub use google::GoogleSheetsConnector;

/// Cell values of one row as rendered by the spreadsheet. Trailing empty
/// cells may be missing.
pub type CellRow = Vec<String>;

/// Sheet row holding the column labels.
pub const HEADER_ROW: u32 = 1;

/// Sheet row of the first record. Also the id of the first record, since record
/// ids are sheet row numbers.
pub const FIRST_DATA_ROW: u32 = 2;

/// Last column addressed when a range has no explicit width.
const LAST_COLUMN: &str = "ZZZ";

#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl From<&User> for Credentials {
    fn from(user: &User) -> Self {
        Self {
            access_token: user.access_token.clone(),
            refresh_token: user.refresh_token.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    /// Credentials rejected even after a refresh attempt.
    Unauthorized,
    /// The tab or range does not exist, usually after a tab rename.
    RangeNotFound,
    Transport,
    Api,
}

#[derive(Debug, Clone)]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub message: String,
}

impl GatewayError {
    pub fn new(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// A rectangular block of one tab, always starting at column A.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRange {
    pub sheet: String,
    /// 1-based first row.
    pub first_row: u32,
    /// Inclusive last row; `None` runs to the end of the sheet.
    pub last_row: Option<u32>,
    /// Number of columns; `None` covers every column up to ZZZ.
    pub width: Option<usize>,
}

impl SheetRange {
    pub fn header(sheet: &str) -> Self {
        Self::rows(sheet, HEADER_ROW, Some(HEADER_ROW))
    }

    /// Every record row, header excluded.
    pub fn data(sheet: &str) -> Self {
        Self::rows(sheet, FIRST_DATA_ROW, None)
    }

    pub fn whole(sheet: &str) -> Self {
        Self::rows(sheet, HEADER_ROW, None)
    }

    pub fn row(sheet: &str, row: u32, width: Option<usize>) -> Self {
        Self {
            width,
            ..Self::rows(sheet, row, Some(row))
        }
    }

    fn rows(sheet: &str, first_row: u32, last_row: Option<u32>) -> Self {
        Self {
            sheet: sheet.to_string(),
            first_row,
            last_row,
            width: None,
        }
    }

    /// A1 notation, e.g. `'My Tab'!A2:ZZZ`.
    pub fn to_a1(&self) -> String {
        let last_column = match self.width {
            Some(width) => column_letter(width.max(1)),
            None => LAST_COLUMN.to_string(),
        };
        let last_row = self.last_row.map(|r| r.to_string()).unwrap_or_default();
        format!(
            "'{}'!A{}:{}{}",
            self.sheet.replace('\'', "''"),
            self.first_row,
            last_column,
            last_row
        )
    }
}

/// 1-based column index to its letter name: 1 -> A, 27 -> AA.
pub fn column_letter(mut index: usize) -> String {
    let mut letters = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        letters.push(b'A' + rem as u8);
        index = (index - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

#[async_trait]
pub trait SpreadsheetGateway: Send + Sync {
    /// Titles of all tabs in sheet order.
    async fn list_tabs(&self, spreadsheet_id: &str) -> Result<Vec<String>, GatewayError>;

    /// Rows of the range. Trailing empty rows are not returned.
    async fn read_range(
        &self,
        spreadsheet_id: &str,
        range: &SheetRange,
    ) -> Result<Vec<CellRow>, GatewayError>;

    /// Append `row` after the last non-empty row of the tab.
    async fn append_row(
        &self,
        spreadsheet_id: &str,
        sheet: &str,
        row: &[String],
    ) -> Result<(), GatewayError>;

    /// Write `row` into `range`. `None` cells are left untouched.
    async fn update_row(
        &self,
        spreadsheet_id: &str,
        range: &SheetRange,
        row: &[Option<String>],
    ) -> Result<(), GatewayError>;

    async fn clear_range(
        &self,
        spreadsheet_id: &str,
        range: &SheetRange,
    ) -> Result<(), GatewayError>;
}

/// Builds gateways bound to a user's credentials.
pub trait SheetsConnector: Send + Sync {
    fn connect(&self, credentials: Credentials) -> Arc<dyn SpreadsheetGateway>;
}
