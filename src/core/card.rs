use std::collections::HashMap;

use tracing::debug;

use super::query_flow::{QueryDraftRow, QueryResponseForm, QueryStatusSelector};
use super::settlement::BillRow;
use super::stage::{Stage, StageView};
use super::Snapshot;
use crate::models::QueryStatus;

/// Unsaved input held by the enabled panel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Drafts {
    pub query_responses: HashMap<String, QueryResponseForm>,
    pub new_queries: Vec<QueryDraftRow>,
    pub query_status: Option<QueryStatusSelector>,
    pub denial_reason: String,
    pub editing_denial: bool,
    pub re_raise_message: String,
    pub bill_rows: Vec<BillRow>,
    pub insurer_message: String,
}

impl Drafts {
    pub fn is_empty(&self) -> bool {
        *self == Drafts::default()
    }

    pub fn query_status_selector(&mut self, current: QueryStatus) -> &mut QueryStatusSelector {
        self.query_status.get_or_insert_with(|| QueryStatusSelector::new(current))
    }
}

/// One claim as shown to a user: the current interpretation plus drafts.
/// A refresh that lands on a different stage throws the drafts away.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimCard {
    snapshot: Snapshot,
    drafts: Drafts,
}

impl ClaimCard {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot, drafts: Drafts::default() }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn view(&self) -> &StageView {
        &self.snapshot.view
    }

    pub fn drafts(&self) -> &Drafts {
        &self.drafts
    }

    pub fn drafts_mut(&mut self) -> &mut Drafts {
        &mut self.drafts
    }

    /// Unlocks the denial message of a denied claim, prefilled with the
    /// message the insurer sent. Returns `false` on any other stage.
    pub fn edit_denial(&mut self) -> bool {
        if self.snapshot.view.stage != Stage::ClaimDenied {
            return false;
        }
        self.drafts.denial_reason = self.snapshot.claim.insurer_message().unwrap_or_default().to_string();
        self.drafts.editing_denial = true;
        true
    }

    pub fn cancel_denial_edit(&mut self) {
        self.drafts.editing_denial = false;
        self.drafts.denial_reason.clear();
    }

    /// Swaps in a newer snapshot. Returns `true` when the stage changed and the
    /// drafts were reset.
    pub fn refresh(&mut self, snapshot: Snapshot) -> bool {
        let changed = snapshot.view.stage != self.snapshot.view.stage;
        if changed {
            debug!(
                claim_id = %snapshot.claim.id,
                from = %self.snapshot.view.stage,
                to = %snapshot.view.stage,
                "Stage changed, discarding drafts"
            );
            self.drafts = Drafts::default();
        }
        self.snapshot = snapshot;
        changed
    }
}
