//! Claim lifecycle projection.
//!
//! The stage interpreter and the action dispatchers. Dispatchers check their
//! preconditions against the snapshot they are handed, perform their write(s)
//! and hand back a freshly fetched [`Snapshot`]; they never patch a claim
//! locally.

pub mod card;
pub mod guard;
pub mod hospital;
pub mod insurer;
pub mod query_flow;
pub mod rooms;
pub mod settlement;
pub mod stage;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;
use validator::ValidationError;

use crate::api::ClaimsGateway;
use crate::error::Result;
use crate::models::Claim;

pub use card::ClaimCard;
pub use guard::InFlightGuard;
pub use hospital::HospitalDesk;
pub use insurer::InsurerDesk;
pub use rooms::RoomDesk;
pub use stage::{interpret, Panel, Severity, Stage, StageView};

/// A claim as last fetched, with its interpretation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub claim: Claim,
    pub view: StageView,
}

impl Snapshot {
    pub fn new(claim: Claim) -> Self {
        let view = interpret(&claim);
        Self { claim, view }
    }

    pub fn stage(&self) -> Stage {
        self.view.stage
    }
}

/// Field validator for money entered on forms.
pub(crate) fn non_negative_amount(value: &Decimal) -> std::result::Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut err = ValidationError::new("non_negative");
        err.message = Some("Amount cannot be negative.".into());
        return Err(err);
    }
    Ok(())
}

/// Full reload after a mutation.
pub(crate) async fn reload<G>(gateway: &G, claim_id: &str) -> Result<Snapshot>
where
    G: ClaimsGateway + ?Sized,
{
    let claim = gateway.fetch_claim(claim_id).await?;
    let snapshot = Snapshot::new(claim);
    debug!(claim_id, stage = %snapshot.view.stage, "Reloaded claim");
    Ok(snapshot)
}
