//! Insurer queries on a claim: drafting new ones, answering them, and the
//! guarded open/closed selector.

use chrono::{DateTime, Utc};

use crate::document::Upload;
use crate::error::{ClaimError, Result};
use crate::models::{ClaimQuery, QueryAttachment, QueryRecord, QueryStatus};

/// A row of the insurer's "raise query" form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryDraftRow {
    pub query_text: String,
    pub query_request: String,
    pub attachment_required: bool,
}

impl QueryDraftRow {
    pub fn is_blank(&self) -> bool {
        self.query_text.trim().is_empty() && self.query_request.trim().is_empty()
    }
}

/// Turns the non-blank draft rows into queries numbered after the `existing` ones.
pub fn build_queries(existing: usize, rows: &[QueryDraftRow], raised_at: DateTime<Utc>) -> Result<Vec<ClaimQuery>> {
    let queries: Vec<ClaimQuery> = rows
        .iter()
        .filter(|row| !row.is_blank())
        .enumerate()
        .map(|(i, row)| ClaimQuery {
            query_id: (existing + i + 1).to_string(),
            query_text: row.query_text.trim().to_string(),
            query_request: row.query_request.trim().to_string(),
            date_raised: Some(raised_at),
            query_response: String::new(),
            attachment_required: row.attachment_required,
            attachment: Vec::new(),
        })
        .collect();

    if queries.is_empty() {
        return Err(ClaimError::validation("Enter at least one query."));
    }
    Ok(queries)
}

/// Non-blank rows that are not already waiting on the hospital in `record`.
/// A row repeats a query when its trimmed text and request both match an
/// unanswered one.
pub fn fresh_rows(record: &QueryRecord, rows: &[QueryDraftRow]) -> Vec<QueryDraftRow> {
    rows.iter()
        .filter(|row| !row.is_blank())
        .filter(|row| {
            !record.query.iter().any(|q| {
                !q.is_submitted()
                    && q.query_text.trim() == row.query_text.trim()
                    && q.query_request.trim() == row.query_request.trim()
            })
        })
        .cloned()
        .collect()
}

/// The hospital's answer to one query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResponseForm {
    pub response: String,
    pub attachment: Option<Upload>,
}

/// Writes `form` into the matching query of `record`.
///
/// Submitted queries are locked. A new attachment replaces whatever was there;
/// without one the existing attachments are kept and must satisfy
/// `attachmentRequired`.
pub fn apply_response(record: &mut QueryRecord, query_id: &str, form: &QueryResponseForm) -> Result<()> {
    let query = record
        .query
        .iter_mut()
        .find(|q| q.query_id == query_id)
        .ok_or_else(|| ClaimError::NotFound(format!("Query {}", query_id)))?;

    if query.is_submitted() {
        return Err(ClaimError::invalid_state("This query has already been answered."));
    }
    if form.response.trim().is_empty() {
        return Err(ClaimError::validation("Response cannot be empty."));
    }

    let attachments = match &form.attachment {
        Some(upload) => {
            upload.require_pdf("Query attachment")?;
            vec![QueryAttachment { file_name: upload.file_name.clone(), file_url: upload.to_data_url() }]
        }
        None => query.attachment.clone(),
    };
    if query.attachment_required && attachments.is_empty() {
        return Err(ClaimError::validation("Attachment is required for this query."));
    }

    query.query_response = form.response.trim().to_string();
    query.attachment = attachments;
    Ok(())
}

/// Two-step selector for a query record's status: `edit` unlocks it, `choose`
/// stages a value, `confirm` hands back the value to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryStatusSelector {
    current: QueryStatus,
    staged: Option<QueryStatus>,
    editing: bool,
}

impl QueryStatusSelector {
    pub fn new(current: QueryStatus) -> Self {
        Self { current, staged: None, editing: false }
    }

    pub fn current(&self) -> QueryStatus {
        self.current
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn staged(&self) -> Option<QueryStatus> {
        self.staged
    }

    pub fn edit(&mut self) {
        self.editing = true;
        self.staged = None;
    }

    /// Ignored unless the selector was unlocked with `edit`.
    pub fn choose(&mut self, status: QueryStatus) {
        if self.editing {
            self.staged = Some(status);
        }
    }

    pub fn cancel(&mut self) {
        self.editing = false;
        self.staged = None;
    }

    /// Locks the selector again. Returns the status to persist, or `None` when
    /// nothing was staged or the staged value equals the current one.
    pub fn confirm(&mut self) -> Option<QueryStatus> {
        let staged = self.staged.take();
        let was_editing = std::mem::replace(&mut self.editing, false);
        match staged {
            Some(status) if was_editing && status != self.current => {
                self.current = status;
                Some(status)
            }
            _ => None,
        }
    }

    /// Restores a status after a failed write.
    pub fn revert(&mut self, status: QueryStatus) {
        self.current = status;
        self.cancel();
    }
}
