//! Client for the legacy Google Spreadsheets XML (GData) feed API.
//!
//! A spreadsheet is addressed by its key. The client reads the worksheets
//! feed for metadata, the list feed for rows, and the cells feed for
//! individual cells, and writes back through each entry's edit link.
//!
//! # Features
//!
//! - **Worksheets**: Spreadsheet metadata and the worksheet list
//! - **Rows**: Read, filter, order, append, update, and delete list-feed rows
//! - **Cells**: Read cell ranges, set and clear individual values
//! - **Authentication**: Anonymous, bearer token, or service account with
//!   transparent token refresh
//!
//! # Example
//!
//! ```no_run
//! use sheets_feed::{RowQuery, Spreadsheet};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let sheet = Spreadsheet::new("1nmcxA...")?;
//!
//! let info = sheet.info().await?;
//! println!("{} has {} worksheets", info.title, info.worksheets.len());
//!
//! let rows = info.worksheets[0].rows(RowQuery::default()).await?;
//! for row in &rows {
//!     println!("{:?}", row.get("name"));
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

// Core modules
pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod transport;
pub mod types;
pub mod xml;

// Internal modules (not part of public API)
#[cfg(test)]
mod mocks;

// Re-exports for convenience
pub use auth::{AccessToken, ServiceAccountKey};
pub use client::{CellQuery, RowQuery, Spreadsheet};
pub use config::{FeedConfig, FeedConfigBuilder, Projection, Visibility};
pub use errors::{FeedError, FeedResult};
pub use types::{Cell, ColumnMap, Row, SpreadsheetInfo, Worksheet};

/// Prelude module with commonly used types and traits.
///
/// ```no_run
/// use sheets_feed::prelude::*;
/// ```
pub mod prelude {
    // Client
    pub use crate::client::{CellQuery, RowQuery, Spreadsheet};

    // Configuration
    pub use crate::config::{FeedConfig, FeedConfigBuilder, Projection, Visibility};

    // Authentication
    pub use crate::auth::{AccessToken, Clock, ServiceAccountKey, TokenIssuer};

    // Domain types
    pub use crate::types::{Cell, ColumnMap, Row, SpreadsheetInfo, Worksheet};

    // Errors
    pub use crate::errors::{FeedError, FeedResult};

    // Transport seam
    pub use crate::transport::{HttpTransport, ReqwestTransport};
}
