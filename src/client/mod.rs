//! Spreadsheet client: the public facade plus the feed-level operations.

use crate::auth::{AccessToken, Clock, ServiceAccountKey, SystemClock, TokenIssuer};
use crate::auth::JwtTokenIssuer;
use crate::config::FeedConfig;
use crate::errors::{FeedError, FeedResult};
use crate::transport::{HttpMethod, HttpTransport, ReqwestTransport};
use crate::types::{Cell, ColumnMap, Row, SpreadsheetInfo, ENTRY_OPEN_WITH_GSX};
use crate::xml;
use serde::Serialize;
use std::sync::Arc;

mod session;
pub(crate) use session::{FeedSession, FeedTarget, Payload};

/// Filtering and paging options for the list (rows) feed.
///
/// Serialized straight into the feed's query string, so field names follow
/// the wire parameter names.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RowQuery {
    /// 1-based index of the first row to return.
    #[serde(rename = "start-index", skip_serializing_if = "Option::is_none")]
    pub start_index: Option<u32>,
    /// Maximum number of rows to return.
    #[serde(rename = "max-results", skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,
    /// Column to order by, e.g. `column:duedate`.
    #[serde(rename = "orderby", skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
    /// Reverse the sort order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reverse: Option<bool>,
    /// Structured query, e.g. `age > 25`.
    #[serde(rename = "sq", skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

/// Range options for the cells feed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CellQuery {
    /// First row of the range, 1-based.
    #[serde(rename = "min-row", skip_serializing_if = "Option::is_none")]
    pub min_row: Option<u32>,
    /// Last row of the range, 1-based.
    #[serde(rename = "max-row", skip_serializing_if = "Option::is_none")]
    pub max_row: Option<u32>,
    /// First column of the range, 1-based.
    #[serde(rename = "min-col", skip_serializing_if = "Option::is_none")]
    pub min_col: Option<u32>,
    /// Last column of the range, 1-based.
    #[serde(rename = "max-col", skip_serializing_if = "Option::is_none")]
    pub max_col: Option<u32>,
    /// Also return cells with no content.
    #[serde(rename = "return-empty", skip_serializing_if = "Option::is_none")]
    pub return_empty: Option<bool>,
}

/// Handle on one remote spreadsheet.
///
/// Created once per resource; cheap to clone, and everything it hands out
/// (worksheets, rows, cells) shares its session, so credentials installed
/// here apply to their follow-up requests too.
#[derive(Clone)]
pub struct Spreadsheet {
    session: Arc<FeedSession>,
}

impl Spreadsheet {
    /// Creates a client for the spreadsheet with the given key, using the
    /// default configuration and transport.
    pub fn new(key: impl Into<String>) -> FeedResult<Self> {
        Self::with_config(key, FeedConfig::default())
    }

    /// Creates a client with a custom configuration.
    pub fn with_config(key: impl Into<String>, config: FeedConfig) -> FeedResult<Self> {
        config.validate()?;
        let issuer = Arc::new(JwtTokenIssuer::with_token_url(config.token_url.clone()));
        let transport = Arc::new(ReqwestTransport::with_default_client()?);
        Self::with_parts(key, config, transport, issuer, Arc::new(SystemClock))
    }

    /// Creates a client from explicit parts. This is the seam tests use to
    /// substitute the transport, token issuer, or clock.
    pub fn with_parts(
        key: impl Into<String>,
        config: FeedConfig,
        transport: Arc<dyn HttpTransport>,
        issuer: Arc<dyn TokenIssuer>,
        clock: Arc<dyn Clock>,
    ) -> FeedResult<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(FeedError::Configuration(
                "spreadsheet key not provided".to_string(),
            ));
        }
        Ok(Self {
            session: Arc::new(FeedSession::new(key, config, transport, issuer, clock)),
        })
    }

    /// Installs a bearer token. Anonymous clients are promoted to token auth,
    /// which also flips the default visibility/projection to `private/full`.
    pub fn set_token(&self, token: AccessToken) {
        self.session.set_token(token);
    }

    /// Switches to service account auth and exchanges the key for a token
    /// before returning. Subsequent requests transparently re-exchange
    /// whenever the held token has expired.
    pub async fn use_service_account(&self, key: ServiceAccountKey) -> FeedResult<()> {
        self.session.use_service_account(key).await
    }

    /// Fetches spreadsheet metadata and the worksheet list.
    pub async fn info(&self) -> FeedResult<SpreadsheetInfo> {
        self.session.info().await
    }

    /// Fetches rows of a worksheet through the list feed.
    pub async fn rows(&self, worksheet_id: &str, query: RowQuery) -> FeedResult<Vec<Row>> {
        self.session.rows(worksheet_id, query).await
    }

    /// Appends a row to a worksheet.
    pub async fn add_row(&self, worksheet_id: &str, values: &ColumnMap) -> FeedResult<()> {
        self.session.add_row(worksheet_id, values).await
    }

    /// Fetches cells of a worksheet through the cells feed.
    pub async fn cells(&self, worksheet_id: &str, query: CellQuery) -> FeedResult<Vec<Cell>> {
        self.session.cells(worksheet_id, query).await
    }
}

impl FeedSession {
    pub(crate) async fn info(self: &Arc<Self>) -> FeedResult<SpreadsheetInfo> {
        let document = self
            .dispatch(
                FeedTarget::Segments(vec!["worksheets".to_string(), self.key.clone()]),
                HttpMethod::Get,
                Payload::Empty,
            )
            .await?
            .ok_or(FeedError::EmptyResponse("worksheets feed"))?;

        SpreadsheetInfo::from_feed(self, &document.entity)
    }

    pub(crate) async fn rows(
        self: &Arc<Self>,
        worksheet_id: &str,
        query: RowQuery,
    ) -> FeedResult<Vec<Row>> {
        let query = serde_urlencoded::to_string(&query)
            .map_err(|e| FeedError::Configuration(format!("invalid row query: {e}")))?;
        let payload = if query.is_empty() {
            Payload::Empty
        } else {
            Payload::Query(query)
        };

        let document = self
            .dispatch(
                FeedTarget::Segments(vec![
                    "list".to_string(),
                    self.key.clone(),
                    worksheet_id.to_string(),
                ]),
                HttpMethod::Get,
                payload,
            )
            .await?
            .ok_or(FeedError::EmptyResponse("list feed"))?;

        let entries = document.entity.children_named("entry");
        let fragments = xml::entry_fragments(&document.raw);
        if entries.len() != fragments.len() {
            return Err(FeedError::Parse(format!(
                "list feed has {} entries but {} source fragments",
                entries.len(),
                fragments.len()
            )));
        }

        Ok(entries
            .into_iter()
            .zip(fragments)
            .map(|(entry, fragment)| Row::from_entry(self.clone(), entry, fragment))
            .collect())
    }

    pub(crate) async fn add_row(
        &self,
        worksheet_id: &str,
        values: &ColumnMap,
    ) -> FeedResult<()> {
        let mut body = String::from(ENTRY_OPEN_WITH_GSX);
        body.push('\n');
        for (name, value) in values.iter() {
            if crate::types::is_reserved_key(name) {
                continue;
            }
            let value = xml::xml_escape(value);
            body.push_str(&format!("<gsx:{name}>{value}</gsx:{name}>\n"));
        }
        body.push_str("</entry>");

        self.dispatch(
            FeedTarget::Segments(vec![
                "list".to_string(),
                self.key.clone(),
                worksheet_id.to_string(),
            ]),
            HttpMethod::Post,
            Payload::AtomXml(body),
        )
        .await?;

        Ok(())
    }

    pub(crate) async fn cells(
        self: &Arc<Self>,
        worksheet_id: &str,
        query: CellQuery,
    ) -> FeedResult<Vec<Cell>> {
        let query = serde_urlencoded::to_string(&query)
            .map_err(|e| FeedError::Configuration(format!("invalid cell query: {e}")))?;
        let payload = if query.is_empty() {
            Payload::Empty
        } else {
            Payload::Query(query)
        };

        let document = self
            .dispatch(
                FeedTarget::Segments(vec![
                    "cells".to_string(),
                    self.key.clone(),
                    worksheet_id.to_string(),
                ]),
                HttpMethod::Get,
                payload,
            )
            .await?
            .ok_or(FeedError::EmptyResponse("cells feed"))?;

        document
            .entity
            .children_named("entry")
            .into_iter()
            .map(|entry| Cell::from_entry(self.clone(), worksheet_id, entry))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{self, MockTransport};
    use tokio_test::block_on;

    #[test]
    fn empty_key_is_rejected() {
        let result = Spreadsheet::new("");
        assert!(matches!(result, Err(FeedError::Configuration(_))));
    }

    #[test]
    fn row_query_serialization() {
        let query = RowQuery {
            start_index: Some(2),
            max_results: Some(10),
            order_by: Some("column:duedate".to_string()),
            reverse: Some(true),
            query: Some("age > 25".to_string()),
        };
        let qs = serde_urlencoded::to_string(&query).unwrap();
        assert_eq!(
            qs,
            "start-index=2&max-results=10&orderby=column%3Aduedate&reverse=true&sq=age+%3E+25"
        );
    }

    #[test]
    fn empty_row_query_serializes_to_nothing() {
        let qs = serde_urlencoded::to_string(RowQuery::default()).unwrap();
        assert!(qs.is_empty());
    }

    #[test]
    fn rows_reject_entry_fragment_mismatch() {
        let transport = Arc::new(MockTransport::new());
        // The commented-out entry is invisible to the parser but still
        // matches the raw-text fragment scan, so the counts disagree.
        transport.push_response(MockTransport::xml(
            "<feed><!-- <entry><gsx:name>stale</gsx:name></entry> --><entry><gsx:name>Anna</gsx:name></entry></feed>",
        ));
        let session = mocks::session_with_transport(transport);

        let err = block_on(session.rows("od6", RowQuery::default())).unwrap_err();
        assert!(matches!(err, FeedError::Parse(_)));
    }

    #[test]
    fn bodiless_info_response_is_an_error() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(MockTransport::empty_ok());
        let session = mocks::session_with_transport(transport);

        let err = block_on(session.info()).unwrap_err();
        assert!(matches!(err, FeedError::EmptyResponse("worksheets feed")));
    }

    #[test]
    fn bodiless_rows_response_is_an_error() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(MockTransport::empty_ok());
        let session = mocks::session_with_transport(transport);

        let err = block_on(session.rows("od6", RowQuery::default())).unwrap_err();
        assert!(matches!(err, FeedError::EmptyResponse("list feed")));
    }

    #[test]
    fn bodiless_cells_response_is_an_error() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(MockTransport::empty_ok());
        let session = mocks::session_with_transport(transport);

        let err = block_on(session.cells("od6", CellQuery::default())).unwrap_err();
        assert!(matches!(err, FeedError::EmptyResponse("cells feed")));
    }

    #[test]
    fn cell_query_serialization() {
        let query = CellQuery {
            min_row: Some(1),
            max_row: Some(5),
            min_col: None,
            max_col: None,
            return_empty: Some(true),
        };
        let qs = serde_urlencoded::to_string(&query).unwrap();
        assert_eq!(qs, "min-row=1&max-row=5&return-empty=true");
    }
}
