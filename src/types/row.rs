//! Row entries of the list feed.

use super::{ColumnMap, ENTRY_OPEN_WITH_GSX};
use crate::client::{FeedSession, FeedTarget, Payload};
use crate::errors::{FeedError, FeedResult};
use crate::transport::HttpMethod;
use crate::xml::{xml_escape, Element};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// One row of a worksheet, mapped from a list-feed entry.
///
/// Data columns live in a [`ColumnMap`]; entry metadata (`id`, `title`,
/// `updated`, `content`, links) is kept apart so column names can never
/// shadow it. The verbatim source fragment the entry was parsed from is
/// retained because [`Row::save`] patches that text in place rather than
/// re-serializing the entry.
pub struct Row {
    session: Arc<FeedSession>,
    id: Option<String>,
    title: Option<String>,
    updated: Option<String>,
    content: Option<String>,
    columns: ColumnMap,
    links: BTreeMap<String, String>,
    source_xml: String,
}

impl Row {
    pub(crate) fn from_entry(session: Arc<FeedSession>, entry: &Element, fragment: &str) -> Self {
        let mut id = None;
        let mut title = None;
        let mut updated = None;
        let mut content = None;
        let mut columns = ColumnMap::new();
        let mut links = BTreeMap::new();

        for child in &entry.children {
            if let Some(column) = child.name.strip_prefix("gsx:") {
                if column.is_empty() {
                    continue;
                }
                // Self-closing empty elements parse to empty text already.
                columns.insert_parsed(column.to_string(), child.text.clone());
                continue;
            }
            match child.name.as_str() {
                "id" => id = Some(child.text.clone()),
                "title" => title = Some(child.text.clone()),
                "updated" => updated = Some(child.text.clone()),
                "content" => content = Some(child.text.clone()),
                "link" => {
                    if let (Some(rel), Some(href)) = (child.attr("rel"), child.attr("href")) {
                        links.insert(rel.to_string(), href.to_string());
                    }
                }
                _ => {}
            }
        }

        Self {
            session,
            id,
            title,
            updated,
            content,
            columns,
            links,
            source_xml: fragment.to_string(),
        }
    }

    /// Entry id URL, verbatim from the feed.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Entry title, verbatim from the feed.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Last-updated timestamp, verbatim from the feed.
    pub fn updated(&self) -> Option<&str> {
        self.updated.as_deref()
    }

    /// Entry content text, verbatim from the feed.
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// The row's data columns.
    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    /// Value of one column; the name is normalized before lookup.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns.get(column)
    }

    /// Sets a column value locally. Nothing is sent until [`Row::save`].
    pub fn set(&mut self, column: &str, value: impl Into<String>) {
        self.columns.set(column, value);
    }

    /// Link URL by relation name (`edit`, `self`, ...).
    pub fn link(&self, rel: &str) -> Option<&str> {
        self.links.get(rel).map(String::as_str)
    }

    /// The verbatim entry fragment this row was parsed from.
    pub fn source_xml(&self) -> &str {
        &self.source_xml
    }

    /// Persists the row by patching its original entry fragment and `PUT`ting
    /// the result to the entry's edit link.
    ///
    /// Only columns that already have a `<gsx:...>` region in the fragment
    /// are written; others are silently skipped, which is what the feed
    /// protocol expects of a row update. Requires the `private/full`
    /// projection, since the `values` projection carries no edit link.
    pub async fn save(&self) -> FeedResult<()> {
        let edit = self.links.get("edit").ok_or_else(|| {
            FeedError::Configuration(
                "row has no edit link; fetch it authenticated with the full projection"
                    .to_string(),
            )
        })?;

        let mut body = inject_entry_namespaces(&self.source_xml);
        for (name, value) in self.columns.iter() {
            body = patch_column(&body, name, value);
        }

        self.session
            .dispatch(FeedTarget::Url(edit), HttpMethod::Put, Payload::AtomXml(body))
            .await?;
        Ok(())
    }

    /// Deletes the row via its edit link.
    pub async fn delete(&self) -> FeedResult<()> {
        let edit = self.links.get("edit").ok_or_else(|| {
            FeedError::Configuration(
                "row has no edit link; fetch it authenticated with the full projection"
                    .to_string(),
            )
        })?;

        self.session
            .dispatch(FeedTarget::Url(edit), HttpMethod::Delete, Payload::Empty)
            .await?;
        Ok(())
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Row")
            .field("id", &self.id)
            .field("columns", &self.columns)
            .field("links", &self.links)
            .finish()
    }
}

/// Declares the Atom and gsx namespaces on the fragment's bare opening
/// `<entry>` tag, which the standalone PUT body needs.
fn inject_entry_namespaces(fragment: &str) -> String {
    fragment.replacen("<entry>", ENTRY_OPEN_WITH_GSX, 1)
}

/// Replaces the first `<gsx:name>...</gsx:name>` region with the escaped
/// value. Fragments without such a region are returned unchanged.
fn patch_column(fragment: &str, name: &str, value: &str) -> String {
    let open = format!("<gsx:{name}>");
    let close = format!("</gsx:{name}>");

    let Some(start) = fragment.find(&open) else {
        return fragment.to_string();
    };
    let content_start = start + open.len();
    let Some(end) = fragment[content_start..].find(&close) else {
        return fragment.to_string();
    };

    let mut patched = String::with_capacity(fragment.len() + value.len());
    patched.push_str(&fragment[..content_start]);
    patched.push_str(&xml_escape(value));
    patched.push_str(&fragment[content_start + end..]);
    patched
}
