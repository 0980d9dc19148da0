//! Insurer-side dispatchers: pre-authorization decisions, queries, denial and
//! approval with the settlement advice.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument};
use validator::Validate;

use super::card::ClaimCard;
use super::guard::InFlightGuard;
use super::non_negative_amount;
use super::query_flow::{build_queries, fresh_rows, QueryDraftRow, QueryStatusSelector};
use super::settlement::{self, AdviceContext, BillRow};
use super::stage::{interpret, Stage};
use super::{reload, Snapshot};
use crate::api::ClaimsGateway;
use crate::error::{ClaimError, Result};
use crate::models::{
    Claim, ClaimFilter, ClaimUpdate, FinalClaimSettlement, HospitalStatus, InsurerStatus, NewQueryRecord,
    PreAuthorization, QueryStatus,
};
use crate::session::{Role, Session};

pub const PRE_AUTH_APPROVED_COMMENT: &str = "Pre-Authorization approved by insurer.";
pub const PRE_AUTH_DENIED_COMMENT: &str = "Pre-Authorization denied by insurer.";

#[derive(Debug, Clone, Default, Validate)]
pub struct PreAuthApprovalForm {
    #[validate(required(message = "Approved amount is required."), custom = "non_negative_amount")]
    pub approved_amount: Option<Decimal>,
    pub comments: String,
}

pub struct InsurerDesk<G: ClaimsGateway> {
    gateway: Arc<G>,
    guard: InFlightGuard,
    insurer_id: String,
}

impl<G: ClaimsGateway> InsurerDesk<G> {
    pub fn new(gateway: Arc<G>, insurer_id: impl Into<String>) -> Self {
        Self { gateway, guard: InFlightGuard::new(), insurer_id: insurer_id.into() }
    }

    /// Desk acting as the signed-in insurer.
    pub fn for_session(gateway: Arc<G>, session: &Session) -> Result<Self> {
        if !session.is(Role::Insurer) {
            return Err(ClaimError::invalid_state(format!("A {} session cannot use the insurer desk.", session.role)));
        }
        Ok(Self::new(gateway, session.user_id.clone()))
    }

    pub fn with_guard(mut self, guard: InFlightGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn insurer_id(&self) -> &str {
        &self.insurer_id
    }

    /// Pre-authorizations nobody has picked up yet.
    pub async fn pre_auth_queue(&self) -> Result<Vec<Claim>> {
        self.gateway.list_claims(&ClaimFilter::NoInsurer).await
    }

    pub async fn assigned_claims(&self) -> Result<Vec<Snapshot>> {
        let filter = ClaimFilter::Insurer { insurer_id: self.insurer_id.clone() };
        let claims = self.gateway.list_claims(&filter).await?;
        Ok(claims.into_iter().map(Snapshot::new).collect())
    }

    #[instrument(skip(self, claim, form), fields(claim_id = %claim.id))]
    pub async fn approve_pre_auth(&self, claim: &Claim, form: &PreAuthApprovalForm) -> Result<Snapshot> {
        check_pre_auth_open(claim)?;
        form.validate()?;
        let decision = PreAuthorization {
            approved_amount: form.approved_amount,
            insurer_comments: Some(comment_or(&form.comments, PRE_AUTH_APPROVED_COMMENT)),
            response_date_time: Some(Utc::now()),
        };
        self.decide_pre_auth(claim, InsurerStatus::PreAuthApproved, decision).await
    }

    #[instrument(skip(self, claim, comments), fields(claim_id = %claim.id))]
    pub async fn deny_pre_auth(&self, claim: &Claim, comments: &str) -> Result<Snapshot> {
        check_pre_auth_open(claim)?;
        let decision = PreAuthorization {
            approved_amount: None,
            insurer_comments: Some(comment_or(comments, PRE_AUTH_DENIED_COMMENT)),
            response_date_time: Some(Utc::now()),
        };
        self.decide_pre_auth(claim, InsurerStatus::PreAuthDenied, decision).await
    }

    async fn decide_pre_auth(
        &self,
        claim: &Claim,
        status: InsurerStatus,
        decision: PreAuthorization,
    ) -> Result<Snapshot> {
        let _permit = self.guard.acquire("pre-auth decision", &claim.id)?;
        let mut update = ClaimUpdate::at(Utc::now());
        update.insurer_id = Some(self.insurer_id.clone());
        update.insurer_status = Some(status);
        update.pre_authorization = Some(decision);
        self.gateway.update_claim(&claim.id, &update).await?;

        info!(%status, "Pre-authorization decided");
        reload(self.gateway.as_ref(), &claim.id).await
    }

    /// Appends the non-blank rows to the claim's query record, creating the
    /// record on first use, and hands the claim back to the hospital.
    #[instrument(skip(self, claim, rows), fields(claim_id = %claim.id))]
    pub async fn raise_query(&self, claim: &Claim, rows: &[QueryDraftRow]) -> Result<Snapshot> {
        check_claim_under_review(claim)?;
        if matches!(interpret(claim).stage, Stage::ClaimApproved | Stage::ClaimDenied | Stage::ClaimSettled) {
            return Err(ClaimError::invalid_state("Queries can only be raised on a claim under review."));
        }
        if rows.iter().all(QueryDraftRow::is_blank) {
            return Err(ClaimError::validation("Enter at least one query."));
        }

        let _permit = self.guard.acquire("raise query", &claim.id)?;
        let now = Utc::now();
        match self.gateway.fetch_query_record_for_claim(&claim.id).await? {
            Some(mut record) => {
                let rows = fresh_rows(&record, rows);
                if rows.is_empty() {
                    info!(record_id = %record.id, "Every query is already open, record left as is");
                } else {
                    let queries = build_queries(record.query.len(), &rows, now)?;
                    record.query.extend(queries);
                    record.query_status = QueryStatus::Open;
                    record.updated_at = Some(now);
                    self.gateway.update_query_record(&record).await?;
                }
            }
            None => {
                let record = NewQueryRecord {
                    claim_raised_id: claim.id.clone(),
                    raised_by_insurer_id: Some(self.insurer_id.clone()),
                    query_status: QueryStatus::Open,
                    query: build_queries(0, rows, now)?,
                    created_at: now,
                    updated_at: now,
                };
                self.gateway.create_query_record(&record).await?;
            }
        }

        let mut update = ClaimUpdate::at(now);
        update.insurer_id = Some(self.insurer_id.clone());
        update.insurer_status = Some(InsurerStatus::ClaimAssignedForQuery);
        self.gateway.update_claim(&claim.id, &update).await?;

        info!("Query raised");
        reload(self.gateway.as_ref(), &claim.id).await
    }

    #[instrument(skip(self, claim), fields(claim_id = %claim.id))]
    pub async fn set_query_status(&self, claim: &Claim, status: QueryStatus) -> Result<Snapshot> {
        let _permit = self.guard.acquire("query status", &claim.id)?;
        let mut record = self
            .gateway
            .fetch_query_record_for_claim(&claim.id)
            .await?
            .ok_or_else(|| ClaimError::NotFound("Query record".into()))?;
        record.query_status = status;
        record.updated_at = Some(Utc::now());
        self.gateway.update_query_record(&record).await?;

        info!(?status, "Query status changed");
        reload(self.gateway.as_ref(), &claim.id).await
    }

    /// Writes whatever the selector confirms. Nothing is sent when the
    /// selector has nothing new to commit; a failed write restores the old value.
    pub async fn commit_query_status(
        &self,
        claim: &Claim,
        selector: &mut QueryStatusSelector,
    ) -> Result<Option<Snapshot>> {
        let previous = selector.current();
        let Some(status) = selector.confirm() else {
            return Ok(None);
        };
        match self.set_query_status(claim, status).await {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                selector.revert(previous);
                Err(e)
            }
        }
    }

    /// First denial of a claim. A claim the hospital re-raised goes back to
    /// `CLAIM_RAISED` so the new denial is what the hospital sees.
    #[instrument(skip(self, claim, reason), fields(claim_id = %claim.id))]
    pub async fn deny_claim(&self, claim: &Claim, reason: &str) -> Result<Snapshot> {
        check_claim_under_review(claim)?;
        let stage = interpret(claim).stage;
        match stage {
            Stage::ClaimDenied => {
                return Err(ClaimError::invalid_state(
                    "Claim is already denied; update the denial message instead.",
                ))
            }
            Stage::ClaimApproved | Stage::ClaimSettled => {
                return Err(ClaimError::invalid_state("An approved claim cannot be denied."))
            }
            _ => {}
        }
        let reason = non_empty_reason(reason)?;

        let _permit = self.guard.acquire("deny", &claim.id)?;
        let mut update = ClaimUpdate::at(Utc::now());
        update.insurer_id = Some(self.insurer_id.clone());
        update.insurer_status = Some(InsurerStatus::ClaimDenied);
        if stage == Stage::ClaimReRaise {
            update.hospital_status = Some(HospitalStatus::ClaimRaised);
        }
        update.final_claim_settlement = Some(with_message(claim, reason));
        self.gateway.update_claim(&claim.id, &update).await?;

        info!("Claim denied");
        reload(self.gateway.as_ref(), &claim.id).await
    }

    /// Rewrites the reason on an already-denied claim without touching its status.
    #[instrument(skip(self, claim, reason), fields(claim_id = %claim.id))]
    pub async fn update_denial_message(&self, claim: &Claim, reason: &str) -> Result<Snapshot> {
        if interpret(claim).stage != Stage::ClaimDenied {
            return Err(ClaimError::invalid_state("Claim is not denied."));
        }
        let reason = non_empty_reason(reason)?;

        let _permit = self.guard.acquire("deny", &claim.id)?;
        let mut update = ClaimUpdate::at(Utc::now());
        update.final_claim_settlement = Some(with_message(claim, reason));
        self.gateway.update_claim(&claim.id, &update).await?;
        reload(self.gateway.as_ref(), &claim.id).await
    }

    /// Approves the claim for the settled total of `rows` and attaches the
    /// settlement advice. Calling it again on an approved claim revises the
    /// approval until the hospital settles.
    #[instrument(skip(self, claim, rows, message), fields(claim_id = %claim.id, rows = rows.len()))]
    pub async fn approve_claim(&self, claim: &Claim, rows: &[BillRow], message: &str) -> Result<Snapshot> {
        check_claim_under_review(claim)?;
        if claim.hospital_status == HospitalStatus::ClaimSettled {
            return Err(ClaimError::invalid_state("Claim is already settled."));
        }
        settlement::validate_rows(rows)?;
        let totals = settlement::totals(rows);

        let _permit = self.guard.acquire("approve", &claim.id)?;
        let (customer, hospital) = futures::try_join!(
            self.gateway.fetch_customer(&claim.customer.id),
            self.gateway.fetch_hospital(&claim.hospital_id)
        )?;

        let message = message.trim();
        let now = Utc::now();
        let advice = settlement::advice_document(&AdviceContext {
            claim,
            customer: &customer,
            hospital: &hospital,
            rows,
            totals: &totals,
            insurer_message: Some(message),
            issued_at: now,
        });

        let mut update = ClaimUpdate::at(now);
        update.insurer_id = Some(self.insurer_id.clone());
        update.insurer_status = Some(InsurerStatus::ClaimApproved);
        update.final_claim_settlement = Some(FinalClaimSettlement {
            insurer_approved_amount: Some(totals.payable),
            insurer_message: Some(message.to_string()),
            insurer_final_bill: Some(advice),
        });
        self.gateway.update_claim(&claim.id, &update).await?;

        info!(payable = %totals.payable, "Claim approved");
        reload(self.gateway.as_ref(), &claim.id).await
    }

    /// Sends the card's query rows and clears them once written.
    pub async fn submit_queries(&self, card: &mut ClaimCard) -> Result<Snapshot> {
        let rows = card.drafts().new_queries.clone();
        let snapshot = self.raise_query(&card.snapshot().claim, &rows).await?;
        card.refresh(snapshot.clone());
        card.drafts_mut().new_queries.clear();
        Ok(snapshot)
    }

    /// Sends the card's denial reason. On a claim that is already denied the
    /// reason is only rewritten after [`ClaimCard::edit_denial`]; without it
    /// nothing is sent.
    pub async fn submit_denial(&self, card: &mut ClaimCard) -> Result<Snapshot> {
        let reason = card.drafts().denial_reason.clone();
        let snapshot = if card.view().stage == Stage::ClaimDenied {
            if !card.drafts().editing_denial {
                return Err(ClaimError::invalid_state("Choose edit before changing the denial message."));
            }
            self.update_denial_message(&card.snapshot().claim, &reason).await?
        } else {
            self.deny_claim(&card.snapshot().claim, &reason).await?
        };
        card.refresh(snapshot.clone());
        let drafts = card.drafts_mut();
        drafts.editing_denial = false;
        drafts.denial_reason.clear();
        Ok(snapshot)
    }

    /// Approves from the card's bill rows and message.
    pub async fn submit_approval(&self, card: &mut ClaimCard) -> Result<Snapshot> {
        let rows = card.drafts().bill_rows.clone();
        let message = card.drafts().insurer_message.clone();
        let snapshot = self.approve_claim(&card.snapshot().claim, &rows, &message).await?;
        card.refresh(snapshot.clone());
        Ok(snapshot)
    }
}

fn check_pre_auth_open(claim: &Claim) -> Result<()> {
    let undecided_or_revisable = match claim.effective_insurer_status() {
        None => true,
        Some(status) => status.is_pre_auth_decision(),
    };
    if claim.hospital_status != HospitalStatus::PreAuthInitiated || !undecided_or_revisable {
        return Err(ClaimError::invalid_state("Pre-authorization is no longer open for a decision."));
    }
    Ok(())
}

/// Adjudication only applies once the hospital has raised the final claim.
fn check_claim_under_review(claim: &Claim) -> Result<()> {
    match claim.hospital_status {
        HospitalStatus::ClaimRaised | HospitalStatus::ClaimReRaise | HospitalStatus::ClaimSettled => Ok(()),
        _ => Err(ClaimError::invalid_state("The hospital has not raised this claim yet.")),
    }
}

fn comment_or(comments: &str, default: &str) -> String {
    let comments = comments.trim();
    if comments.is_empty() {
        default.to_string()
    } else {
        comments.to_string()
    }
}

fn non_empty_reason(reason: &str) -> Result<&str> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(ClaimError::validation("Denial reason cannot be empty."));
    }
    Ok(reason)
}

/// Existing settlement details with the insurer message replaced.
fn with_message(claim: &Claim, message: &str) -> FinalClaimSettlement {
    let mut settlement = claim.final_claim_settlement.clone().unwrap_or_default();
    settlement.insurer_message = Some(message.to_string());
    settlement
}
