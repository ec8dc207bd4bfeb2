//! Domain objects mapped from feed entries.

mod cell;
mod row;

pub use cell::Cell;
pub use row::Row;

use crate::client::{CellQuery, FeedSession, RowQuery};
use crate::errors::{FeedError, FeedResult};
use crate::xml::{normalize_column_name, Element};
use std::fmt;
use std::sync::Arc;

/// Atom namespace.
pub(crate) const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
/// Spreadsheet (`gs:`) namespace of the cells feed.
pub(crate) const GS_NS: &str = "http://schemas.google.com/spreadsheets/2006";

/// Opening `<entry>` tag declaring the Atom and extended-column (`gsx:`)
/// namespaces a list-feed write needs.
pub(crate) const ENTRY_OPEN_WITH_GSX: &str = "<entry xmlns=\"http://www.w3.org/2005/Atom\" xmlns:gsx=\"http://schemas.google.com/spreadsheets/2006/extended\">";

/// Names that are entry metadata, never data columns.
pub(crate) fn is_reserved_key(name: &str) -> bool {
    matches!(name, "id" | "title" | "content" | "links")
}

/// Ordered mapping from normalized column name to cell text.
///
/// Data columns live here, apart from entry metadata, so a spreadsheet
/// column named `id` or `links` can never collide with reserved fields.
/// Insertion order is feed document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMap {
    entries: Vec<(String, String)>,
}

impl ColumnMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks a column up; the name is normalized first, so `"Due Date"`
    /// finds the `duedate` column.
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = normalize_column_name(name);
        self.entries
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Sets a column value, normalizing the name. Setting an existing column
    /// replaces its value in place; names that normalize to nothing are
    /// ignored.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let name = normalize_column_name(name);
        if name.is_empty() {
            return;
        }
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Inserts an already-normalized column name during entry parsing.
    pub(crate) fn insert_parsed(&mut self, name: String, value: String) {
        self.entries.push((name, value));
    }

    /// Iterates `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map holds no columns.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for ColumnMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = ColumnMap::new();
        for (name, value) in iter {
            map.set(name.as_ref(), value);
        }
        map
    }
}

/// Spreadsheet metadata plus its worksheets, from the worksheets feed.
pub struct SpreadsheetInfo {
    /// Spreadsheet title.
    pub title: String,
    /// Last-updated timestamp, verbatim from the feed.
    pub updated: Option<String>,
    /// Author name, verbatim from the feed.
    pub author_name: Option<String>,
    /// Author email, verbatim from the feed.
    pub author_email: Option<String>,
    /// Worksheets in feed order.
    pub worksheets: Vec<Worksheet>,
}

impl SpreadsheetInfo {
    pub(crate) fn from_feed(session: &Arc<FeedSession>, feed: &Element) -> FeedResult<Self> {
        let title = feed
            .child_text("title")
            .ok_or_else(|| FeedError::Parse("worksheets feed has no title".to_string()))?
            .to_string();

        let author = feed.child("author");
        let worksheets = feed
            .children_named("entry")
            .into_iter()
            .map(|entry| Worksheet::from_entry(session, entry))
            .collect::<FeedResult<Vec<_>>>()?;

        Ok(Self {
            title,
            updated: feed.child_text("updated").map(str::to_string),
            author_name: author
                .and_then(|a| a.child_text("name"))
                .map(str::to_string),
            author_email: author
                .and_then(|a| a.child_text("email"))
                .map(str::to_string),
            worksheets,
        })
    }
}

impl fmt::Debug for SpreadsheetInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpreadsheetInfo")
            .field("title", &self.title)
            .field("updated", &self.updated)
            .field("author_name", &self.author_name)
            .field("author_email", &self.author_email)
            .field("worksheets", &self.worksheets)
            .finish()
    }
}

/// One worksheet of a spreadsheet; a view bound to its owning session.
pub struct Worksheet {
    session: Arc<FeedSession>,
    id: String,
    title: String,
    row_count: u32,
    col_count: u32,
}

impl Worksheet {
    pub(crate) fn from_entry(session: &Arc<FeedSession>, entry: &Element) -> FeedResult<Self> {
        let full_id = entry
            .child_text("id")
            .ok_or_else(|| FeedError::Parse("worksheet entry has no id".to_string()))?;
        // The worksheet id is the trailing path segment of the entry id URL.
        let id = full_id
            .rsplit('/')
            .next()
            .unwrap_or(full_id)
            .to_string();

        let title = entry
            .child_text("title")
            .ok_or_else(|| FeedError::Parse("worksheet entry has no title".to_string()))?
            .to_string();

        let row_count = parse_count(entry, "gs:rowCount")?;
        let col_count = parse_count(entry, "gs:colCount")?;

        Ok(Self {
            session: session.clone(),
            id,
            title,
            row_count,
            col_count,
        })
    }

    /// Worksheet id, as used in feed paths.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Worksheet title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Declared row count.
    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    /// Declared column count.
    pub fn col_count(&self) -> u32 {
        self.col_count
    }

    /// Fetches rows of this worksheet.
    pub async fn rows(&self, query: RowQuery) -> FeedResult<Vec<Row>> {
        self.session.rows(&self.id, query).await
    }

    /// Appends a row to this worksheet.
    pub async fn add_row(&self, values: &ColumnMap) -> FeedResult<()> {
        self.session.add_row(&self.id, values).await
    }

    /// Fetches cells of this worksheet.
    pub async fn cells(&self, query: CellQuery) -> FeedResult<Vec<Cell>> {
        self.session.cells(&self.id, query).await
    }
}

impl fmt::Debug for Worksheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worksheet")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("row_count", &self.row_count)
            .field("col_count", &self.col_count)
            .finish()
    }
}

fn parse_count(entry: &Element, name: &str) -> FeedResult<u32> {
    let text = entry
        .child_text(name)
        .ok_or_else(|| FeedError::Parse(format!("worksheet entry has no {name}")))?;
    text.parse()
        .map_err(|_| FeedError::Parse(format!("invalid {name}: {text:?}")))
}
