//! Status interpreter: maps the two status fields of a claim onto the single
//! workflow stage a user acts on.

use std::fmt;

use serde::Serialize;

use crate::models::{Claim, HospitalStatus, InsurerStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    ClaimRaised,
    ClaimAssignedForQuery,
    ClaimDenied,
    ClaimApproved,
    ClaimReRaise,
    ClaimSettled,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::ClaimRaised => "Claim Raised",
            Stage::ClaimAssignedForQuery => "Insurer Query Review",
            Stage::ClaimDenied => "Denied",
            Stage::ClaimApproved => "Approved",
            Stage::ClaimReRaise => "Re-Raised",
            Stage::ClaimSettled => "Settled",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Stage::ClaimApproved | Stage::ClaimSettled => Severity::Success,
            Stage::ClaimDenied => Severity::Error,
            Stage::ClaimAssignedForQuery | Stage::ClaimReRaise => Severity::Warning,
            Stage::ClaimRaised => Severity::Info,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// The one action panel enabled for a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Panel {
    ClaimDetail,
    Query,
    Denial {
        /// Hospital may re-raise from here.
        re_raise_open: bool,
        /// The hospital's re-raise message can still be revised.
        message_editable: bool,
    },
    Approval {
        settlement_read_only: bool,
        can_settle: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageView {
    pub stage: Stage,
    pub severity: Severity,
    pub panel: Panel,
}

/// Pure function of the claim's status fields. Rules are checked top to bottom.
pub fn interpret(claim: &Claim) -> StageView {
    let hospital = claim.hospital_status;
    let insurer = claim.effective_insurer_status();

    let (stage, panel) = match (insurer, hospital) {
        (Some(InsurerStatus::ClaimAssignedForQuery), _) => (Stage::ClaimAssignedForQuery, Panel::Query),
        // A re-raise leaves the earlier denial in place on the insurer side.
        (Some(InsurerStatus::ClaimDenied) | None, HospitalStatus::ClaimReRaise) => (Stage::ClaimReRaise, re_raised()),
        (Some(InsurerStatus::ClaimDenied), _) => {
            (Stage::ClaimDenied, Panel::Denial { re_raise_open: true, message_editable: false })
        }
        (Some(InsurerStatus::ClaimApproved), _) => {
            let settled = hospital == HospitalStatus::ClaimSettled;
            (Stage::ClaimApproved, Panel::Approval { settlement_read_only: settled, can_settle: !settled })
        }
        (_, HospitalStatus::ClaimReRaise) => (Stage::ClaimReRaise, re_raised()),
        (_, HospitalStatus::ClaimSettled) => {
            (Stage::ClaimSettled, Panel::Approval { settlement_read_only: true, can_settle: false })
        }
        _ => (Stage::ClaimRaised, Panel::ClaimDetail),
    };

    StageView { stage, severity: stage.severity(), panel }
}

fn re_raised() -> Panel {
    Panel::Denial { re_raise_open: false, message_editable: true }
}
