//! Assignment and Grade Services (AGS) client.
//!
//! AGS is the LTI Advantage gradebook API: line items are gradebook columns,
//! results are what learners currently hold, scores are what the tool writes
//! back. The launch claims advertise where to call (`lineitems` URL plus the
//! scopes the platform will grant); this client takes those URLs as given and
//! layers bearer auth and the IMS media types on top.

use std::sync::Arc;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::lti::{media_types, scopes};
use crate::services::token::AccessTokenService;

/// A gradebook column, as the platform serializes it.
///
/// `id` is the line item's own URL and doubles as the base for the results
/// and scores endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Platform-assigned line item URL; always present on responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Maximum score the column accepts.
    pub score_maximum: f64,
    /// Column label shown in the gradebook.
    pub label: String,
    /// Tool-chosen tag for finding its own columns again.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Tool-side resource identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    /// Resource link this column is coupled to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_link_id: Option<String>,
    /// ISO 8601 instant from which submissions count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date_time: Option<String>,
    /// ISO 8601 submission deadline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date_time: Option<String>,
}

/// A learner's current standing in one line item.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemResult {
    /// Result URL.
    #[serde(default)]
    pub id: Option<String>,
    /// URL of the line item this result belongs to.
    #[serde(default)]
    pub score_of: Option<String>,
    /// Platform user the result is about.
    pub user_id: String,
    /// Current score, absent when nothing has been graded yet.
    #[serde(default)]
    pub result_score: Option<f64>,
    /// Maximum the score is measured against.
    #[serde(default)]
    pub result_maximum: Option<f64>,
    /// Grader comment.
    #[serde(default)]
    pub comment: Option<String>,
}

/// A score the tool publishes into a line item.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    /// Platform user the score is for (the `sub` of their launches).
    pub user_id: String,
    /// Points awarded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_given: Option<f64>,
    /// Scale `score_given` is measured against; required whenever
    /// `score_given` is present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_maximum: Option<f64>,
    /// Comment surfaced to the learner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// ISO 8601 instant the activity happened; platforms drop out-of-order
    /// timestamps, so this must move forward between updates.
    pub timestamp: String,
    /// One of `Initialized`, `Started`, `InProgress`, `Submitted`,
    /// `Completed`.
    pub activity_progress: String,
    /// One of `NotReady`, `Failed`, `Pending`, `PendingManual`,
    /// `FullyGraded`.
    pub grading_progress: String,
}

/// Container shape the platform wraps line item listings in. Some platforms
/// return a bare array instead, so both forms are accepted.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LineItemListing {
    Bare(Vec<LineItem>),
    Wrapped { #[serde(rename = "lineItems")] line_items: Vec<LineItem> },
}

/// AGS operations against one platform.
pub struct AgsClient {
    tokens: Arc<AccessTokenService>,
    http: reqwest::Client,
}

impl AgsClient {
    /// Builds an AGS client sharing the token service and HTTP client.
    pub fn new(tokens: Arc<AccessTokenService>, http: reqwest::Client) -> Self {
        Self { tokens, http }
    }

    /// Lists the gradebook columns behind the launch's `lineitems` URL.
    pub async fn list_line_items(
        &self,
        issuer: &str,
        lineitems_url: &str,
    ) -> Result<Vec<LineItem>> {
        let token = self
            .tokens
            .get_access_token(issuer, &[scopes::AGS_LINE_ITEM_READONLY])
            .await?;
        debug!(url = %lineitems_url, "listing line items");

        let response = self
            .http
            .get(lineitems_url)
            .bearer_auth(&token.access_token)
            .header(ACCEPT, media_types::LINE_ITEM_CONTAINER)
            .send()
            .await?;
        let body = check_service_response(response).await?;
        let listing: LineItemListing = serde_json::from_str(&body)?;
        Ok(match listing {
            LineItemListing::Bare(items) => items,
            LineItemListing::Wrapped { line_items } => line_items,
        })
    }

    /// Lists current results for one line item.
    pub async fn list_results(
        &self,
        issuer: &str,
        line_item_url: &str,
    ) -> Result<Vec<LineItemResult>> {
        let token = self
            .tokens
            .get_access_token(issuer, &[scopes::AGS_RESULT_READONLY])
            .await?;
        let url = append_segment(line_item_url, "results");
        debug!(url = %url, "listing results");

        let response = self
            .http
            .get(&url)
            .bearer_auth(&token.access_token)
            .header(ACCEPT, media_types::RESULT_CONTAINER)
            .send()
            .await?;
        let body = check_service_response(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Publishes a score into one line item.
    pub async fn post_score(&self, issuer: &str, line_item_url: &str, score: &Score) -> Result<()> {
        let token = self
            .tokens
            .get_access_token(issuer, &[scopes::AGS_SCORE])
            .await?;
        let url = append_segment(line_item_url, "scores");
        debug!(url = %url, user_id = %score.user_id, "posting score");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&token.access_token)
            .header(CONTENT_TYPE, media_types::SCORE)
            .body(serde_json::to_vec(score)?)
            .send()
            .await?;
        check_service_response(response).await?;
        Ok(())
    }
}

/// Appends a sub-service segment to a line item URL.
///
/// Line item ids are URLs and on some platforms carry a query string
/// (Moodle's `lineitem?type_id=…`), so the segment has to go before the `?`
/// rather than onto the end of the raw string.
fn append_segment(url: &str, segment: &str) -> String {
    match url.split_once('?') {
        Some((path, query)) => {
            format!("{}/{segment}?{query}", path.trim_end_matches('/'))
        }
        None => format!("{}/{segment}", url.trim_end_matches('/')),
    }
}

/// Maps a non-2xx service reply to [`Error::UpstreamService`], otherwise
/// hands back the body text.
pub(crate) async fn check_service_response(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(Error::UpstreamService {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}
