//! Cell entries of the cells feed.

use super::{ATOM_NS, GS_NS};
use crate::client::{FeedSession, FeedTarget, Payload};
use crate::errors::{FeedError, FeedResult};
use crate::transport::HttpMethod;
use crate::xml::{xml_escape, Element};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// One cell of a worksheet, addressed by 1-based row and column.
///
/// Unlike [`super::Row`], a cell write sends a freshly built minimal entity
/// rather than patching received XML; the two strategies are kept distinct
/// because the feed protocol tolerates the asymmetry.
pub struct Cell {
    session: Arc<FeedSession>,
    worksheet_id: String,
    id: Option<String>,
    row: u32,
    col: u32,
    value: String,
    numeric_value: Option<f64>,
    links: BTreeMap<String, String>,
}

impl Cell {
    pub(crate) fn from_entry(
        session: Arc<FeedSession>,
        worksheet_id: &str,
        entry: &Element,
    ) -> FeedResult<Self> {
        let cell = entry
            .child("gs:cell")
            .ok_or_else(|| FeedError::Parse("cells feed entry has no gs:cell".to_string()))?;

        let row = parse_index(cell, "row")?;
        let col = parse_index(cell, "col")?;
        let numeric_value = cell.attr("numericValue").and_then(|v| v.parse().ok());

        let mut links = BTreeMap::new();
        for link in entry.children_named("link") {
            if let (Some(rel), Some(href)) = (link.attr("rel"), link.attr("href")) {
                links.insert(rel.to_string(), href.to_string());
            }
        }

        Ok(Self {
            session,
            worksheet_id: worksheet_id.to_string(),
            id: entry.child_text("id").map(str::to_string),
            row,
            col,
            value: cell.text.clone(),
            numeric_value,
            links,
        })
    }

    /// Entry id URL, verbatim from the feed.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// 1-based row index.
    pub fn row(&self) -> u32 {
        self.row
    }

    /// 1-based column index.
    pub fn col(&self) -> u32 {
        self.col
    }

    /// Display value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Numeric value, when the feed reported one.
    pub fn numeric_value(&self) -> Option<f64> {
        self.numeric_value
    }

    /// Link URL by relation name.
    pub fn link(&self, rel: &str) -> Option<&str> {
        self.links.get(rel).map(String::as_str)
    }

    /// Sets the value locally and saves in one step.
    pub async fn set_value(&mut self, value: impl Into<String>) -> FeedResult<()> {
        self.value = value.into();
        self.save().await
    }

    /// Empties the cell. The entity stays on the sheet with an empty input
    /// value; nothing is removed.
    pub async fn clear(&mut self) -> FeedResult<()> {
        self.set_value("").await
    }

    /// Persists the cell by `PUT`ting a freshly built minimal entity to its
    /// edit URL.
    pub async fn save(&self) -> FeedResult<()> {
        let edit = self.edit_url();
        let value = xml_escape(&self.value);
        let row = self.row;
        let col = self.col;
        let body = format!(
            "<entry xmlns=\"{ATOM_NS}\" xmlns:gs=\"{GS_NS}\"><id>{edit}</id><link rel=\"edit\" type=\"application/atom+xml\" href=\"{edit}\"/><gs:cell row=\"{row}\" col=\"{col}\" inputValue=\"{value}\"/></entry>"
        );

        self.session
            .dispatch(FeedTarget::Url(&edit), HttpMethod::Put, Payload::AtomXml(body))
            .await?;
        Ok(())
    }

    /// The edit link returned by the server, or, for entries fetched without
    /// one, the feed's fixed `R<row>C<col>` address under `private/full`.
    fn edit_url(&self) -> String {
        if let Some(edit) = self.links.get("edit") {
            return edit.clone();
        }
        format!(
            "{base}cells/{key}/{worksheet}/private/full/R{row}C{col}",
            base = self.session.config.base_url,
            key = self.session.key,
            worksheet = self.worksheet_id,
            row = self.row,
            col = self.col,
        )
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("worksheet_id", &self.worksheet_id)
            .field("row", &self.row)
            .field("col", &self.col)
            .field("value", &self.value)
            .field("numeric_value", &self.numeric_value)
            .finish()
    }
}

fn parse_index(cell: &Element, attr: &str) -> FeedResult<u32> {
    let text = cell
        .attr(attr)
        .ok_or_else(|| FeedError::Parse(format!("gs:cell has no {attr} attribute")))?;
    text.parse()
        .map_err(|_| FeedError::Parse(format!("invalid gs:cell {attr}: {text:?}")))
}
