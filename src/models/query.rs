use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::DataUrl;

/// Open/closed flag the insurer keeps on a claim's query record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryStatus {
    #[default]
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryAttachment {
    pub file_name: String,
    pub file_url: DataUrl,
}

/// One clarification request raised by the insurer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimQuery {
    pub query_id: String,
    #[serde(default)]
    pub query_text: String,
    #[serde(default)]
    pub query_request: String,
    #[serde(default)]
    pub date_raised: Option<DateTime<Utc>>,
    #[serde(default)]
    pub query_response: String,
    #[serde(default)]
    pub attachment_required: bool,
    #[serde(default)]
    pub attachment: Vec<QueryAttachment>,
}

impl ClaimQuery {
    /// A query is submitted once it has a response and, when one is required,
    /// an attachment. Submitted queries are locked against further responses.
    pub fn is_submitted(&self) -> bool {
        !self.query_response.trim().is_empty() && (!self.attachment_required || !self.attachment.is_empty())
    }
}

/// All queries raised against one claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRecord {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub claim_raised_id: String,
    #[serde(default)]
    pub raised_by_insurer_id: Option<String>,
    #[serde(default)]
    pub query_status: QueryStatus,
    #[serde(default)]
    pub query: Vec<ClaimQuery>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl QueryRecord {
    pub fn find(&self, query_id: &str) -> Option<&ClaimQuery> {
        self.query.iter().find(|q| q.query_id == query_id)
    }

    pub fn pending_count(&self) -> usize {
        self.query.iter().filter(|q| !q.is_submitted()).count()
    }
}

/// Body of `POST hospitalqueries` when a claim has no query record yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQueryRecord {
    pub claim_raised_id: String,
    pub raised_by_insurer_id: Option<String>,
    pub query_status: QueryStatus,
    pub query: Vec<ClaimQuery>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(response: &str, required: bool, attachments: usize) -> ClaimQuery {
        ClaimQuery {
            query_id: "1".into(),
            query_text: "Provide lab reports".into(),
            query_request: String::new(),
            date_raised: None,
            query_response: response.into(),
            attachment_required: required,
            attachment: (0..attachments)
                .map(|i| QueryAttachment {
                    file_name: format!("{}.pdf", i),
                    file_url: DataUrl::from("data:application/pdf;base64,JVBERi0=".to_string()),
                })
                .collect(),
        }
    }

    #[test]
    fn submission_needs_response_and_required_attachment() {
        assert!(!query("", false, 0).is_submitted());
        assert!(query("Attached", false, 0).is_submitted());
        assert!(!query("Attached", true, 0).is_submitted());
        assert!(query("Attached", true, 1).is_submitted());
        assert!(!query("   ", true, 1).is_submitted());
    }

    #[test]
    fn query_status_wire_format() {
        assert_eq!(serde_json::to_string(&QueryStatus::Closed).unwrap(), "\"CLOSED\"");
        let parsed: QueryStatus = serde_json::from_str("\"OPEN\"").unwrap();
        assert_eq!(parsed, QueryStatus::Open);
    }
}
