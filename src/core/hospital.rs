//! Hospital-side dispatchers: pre-authorization, admission, discharge, query
//! responses, re-raise and settlement.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};
use validator::Validate;

use super::card::ClaimCard;
use super::guard::InFlightGuard;
use super::non_negative_amount;
use super::query_flow::{apply_response, QueryResponseForm};
use super::stage::{interpret, Stage};
use super::{reload, Snapshot};
use crate::api::ClaimsGateway;
use crate::document::Upload;
use crate::error::{ClaimError, Result};
use crate::models::{
    Claim, ClaimFilter, ClaimUpdate, Customer, HospitalStatus, InsurerStatus, NewClaim, PolicySummary, QueryRecord,
};
use crate::session::{Role, Session};

const UNKNOWN_POLICY: &str = "Unknown policy";

#[derive(Debug, Clone, Default, Validate)]
pub struct PreAuthForm {
    #[validate(length(min = 1, message = "Treatment offered is required."))]
    pub treatment_offered: String,
    #[validate(required(message = "Estimated cost is required."), custom = "non_negative_amount")]
    pub estimated_cost: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Validate)]
pub struct DischargeForm {
    #[validate(required(message = "Final bill amount is required."), custom = "non_negative_amount")]
    pub final_bill_amount: Option<Decimal>,
    #[validate(custom = "non_negative_amount")]
    pub non_medical_expenses: Option<Decimal>,
    pub final_bill: Option<Upload>,
    pub discharge_summary: Option<Upload>,
}

/// A customer found by Aadhaar number, with the names of the policies they hold.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerLookup {
    pub customer: Customer,
    pub policies: Vec<PolicySummary>,
}

pub struct HospitalDesk<G: ClaimsGateway> {
    gateway: Arc<G>,
    guard: InFlightGuard,
    hospital_id: String,
}

impl<G: ClaimsGateway> HospitalDesk<G> {
    pub fn new(gateway: Arc<G>, hospital_id: impl Into<String>) -> Self {
        Self { gateway, guard: InFlightGuard::new(), hospital_id: hospital_id.into() }
    }

    /// Desk for a signed-in hospital user, scoped to their hospital.
    pub fn for_session(gateway: Arc<G>, session: &Session) -> Result<Self> {
        if !session.is(Role::Hospital) {
            return Err(ClaimError::invalid_state(format!("A {} session cannot use the hospital desk.", session.role)));
        }
        let hospital_id = session
            .hospital_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ClaimError::validation("Hospital sessions need a hospital id."))?;
        Ok(Self::new(gateway, hospital_id))
    }

    pub fn with_guard(mut self, guard: InFlightGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn hospital_id(&self) -> &str {
        &self.hospital_id
    }

    pub async fn claim(&self, claim_id: &str) -> Result<Snapshot> {
        reload(self.gateway.as_ref(), claim_id).await
    }

    /// All claims this hospital has raised, newest data from the backend.
    pub async fn tracked_claims(&self) -> Result<Vec<Snapshot>> {
        let filter = ClaimFilter::TrackedBy { hospital_id: self.hospital_id.clone() };
        let claims = self.gateway.list_claims(&filter).await?;
        Ok(claims.into_iter().map(Snapshot::new).collect())
    }

    /// Pre-authorizations the insurer has already ruled on, ready for admission.
    pub async fn admission_queue(&self) -> Result<Vec<Claim>> {
        let filter = ClaimFilter::Initiated { hospital_id: self.hospital_id.clone() };
        let claims = self.gateway.list_claims(&filter).await?;
        Ok(claims.into_iter().filter(|c| c.insurer_status.is_some()).collect())
    }

    pub async fn discharge_queue(&self) -> Result<Vec<Claim>> {
        let filter = ClaimFilter::Admitted { hospital_id: self.hospital_id.clone() };
        self.gateway.list_claims(&filter).await
    }

    #[instrument(skip(self, aadhar_number))]
    pub async fn lookup_customer(&self, aadhar_number: &str) -> Result<CustomerLookup> {
        let aadhar_number = aadhar_number.trim();
        if aadhar_number.len() != 12 || !aadhar_number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ClaimError::validation("Aadhaar number must be exactly 12 digits."));
        }

        let customer = self
            .gateway
            .find_customer_by_aadhar(aadhar_number)
            .await?
            .ok_or_else(|| ClaimError::NotFound("Customer".into()))?;

        let gateway = self.gateway.as_ref();
        let policies = join_all(customer.policies.iter().map(|holding| async move {
            let name = match gateway.fetch_policy(&holding.policy_id).await {
                Ok(policy) => policy.name.unwrap_or_else(|| UNKNOWN_POLICY.to_string()),
                Err(e) => {
                    warn!(policy_id = %holding.policy_id, error = %e, "Policy lookup failed");
                    UNKNOWN_POLICY.to_string()
                }
            };
            PolicySummary {
                policy_id: holding.policy_id.clone(),
                name,
                bought_date: holding.bought_date.clone(),
                expiry_date: holding.expiry_date.clone(),
            }
        }))
        .await;

        Ok(CustomerLookup { customer, policies })
    }

    /// Holding a `Customer` means the lookup succeeded.
    #[instrument(skip(self, customer, form), fields(customer_id = %customer.id))]
    pub async fn raise_pre_authorization(&self, customer: &Customer, form: &PreAuthForm) -> Result<Snapshot> {
        let form = PreAuthForm { treatment_offered: form.treatment_offered.trim().to_string(), ..form.clone() };
        form.validate()?;
        let estimated_cost = form.estimated_cost.unwrap_or_default();

        let _permit = self.guard.acquire("pre-authorization", &customer.id)?;
        let claim = NewClaim {
            hospital_id: self.hospital_id.clone(),
            customer_name: customer.name.clone(),
            customer_aadhar_number: customer.aadhar_card_number.clone(),
            customer_id: customer.id.clone(),
            treatment_offered: form.treatment_offered,
            estimated_cost_to_hospital: estimated_cost,
            hospital_status: HospitalStatus::PreAuthInitiated,
            created_at: Utc::now(),
        };
        let created = self.gateway.create_claim(&claim).await?;
        info!(claim_id = %created.id, "Pre-authorization raised");
        reload(self.gateway.as_ref(), &created.id).await
    }

    #[instrument(skip(self, claim, notes), fields(claim_id = %claim.id))]
    pub async fn admit_patient(&self, claim: &Claim, notes: Option<&str>) -> Result<Snapshot> {
        let hospital_status = match claim.effective_insurer_status() {
            Some(InsurerStatus::PreAuthApproved) => HospitalStatus::Admitted,
            Some(InsurerStatus::PreAuthDenied) => HospitalStatus::CashBasedAdmission,
            _ => {
                return Err(ClaimError::invalid_state(
                    "Patient can only be admitted once the insurer has decided the pre-authorization.",
                ))
            }
        };
        if claim.is_admitted() {
            return Err(ClaimError::invalid_state("Patient is already admitted."));
        }

        let _permit = self.guard.acquire("admit", &claim.id)?;
        let now = Utc::now();
        let mut details = claim.treatment_details.clone().unwrap_or_default();
        details.is_admitted = true;
        details.date_of_admission = Some(now);
        if let Some(notes) = notes.map(str::trim).filter(|n| !n.is_empty()) {
            details.admission_notes = Some(notes.to_string());
        }

        let mut update = ClaimUpdate::at(now);
        update.hospital_status = Some(hospital_status);
        update.treatment_details = Some(details);
        self.gateway.update_claim(&claim.id, &update).await?;

        info!(status = %hospital_status, "Patient admitted");
        reload(self.gateway.as_ref(), &claim.id).await
    }

    #[instrument(skip(self, claim, form), fields(claim_id = %claim.id))]
    pub async fn submit_discharge_claim(&self, claim: &Claim, form: &DischargeForm) -> Result<Snapshot> {
        if !claim.is_admitted() {
            return Err(ClaimError::invalid_state("Patient has not been admitted."));
        }
        if claim.is_discharged() {
            return Err(ClaimError::invalid_state("Patient has already been discharged."));
        }
        form.validate()?;
        let final_bill = form
            .final_bill
            .as_ref()
            .ok_or_else(|| ClaimError::validation("Final bill document is required."))?;
        final_bill.require_pdf("Final bill")?;
        let discharge_summary = form
            .discharge_summary
            .as_ref()
            .ok_or_else(|| ClaimError::validation("Discharge summary is required."))?;
        discharge_summary.require_pdf("Discharge summary")?;

        let _permit = self.guard.acquire("discharge", &claim.id)?;
        let now = Utc::now();
        let mut details = claim.treatment_details.clone().unwrap_or_default();
        details.is_discharged = true;
        details.date_of_discharge = Some(now);
        details.hospital_final_bill_amount = form.final_bill_amount;
        details.patient_paid_non_medical_expenses = Some(form.non_medical_expenses.unwrap_or_default());
        details.hospital_final_bill = Some(final_bill.to_data_url());
        details.discharge_summary_url = Some(discharge_summary.to_data_url());

        let mut update = ClaimUpdate::at(now);
        update.hospital_status = Some(HospitalStatus::ClaimRaised);
        update.treatment_details = Some(details);
        self.gateway.update_claim(&claim.id, &update).await?;

        info!("Discharge claim submitted");
        reload(self.gateway.as_ref(), &claim.id).await
    }

    /// The query record raised against `claim`, if the insurer has raised any.
    pub async fn query_record(&self, claim: &Claim) -> Result<Option<QueryRecord>> {
        self.gateway.fetch_query_record_for_claim(&claim.id).await
    }

    #[instrument(skip(self, claim, form), fields(claim_id = %claim.id))]
    pub async fn respond_to_query(
        &self,
        claim: &Claim,
        record_id: &str,
        query_id: &str,
        form: &QueryResponseForm,
    ) -> Result<Snapshot> {
        if interpret(claim).stage != Stage::ClaimAssignedForQuery {
            return Err(ClaimError::invalid_state("The insurer has no open queries on this claim."));
        }
        if form.response.trim().is_empty() {
            return Err(ClaimError::validation("Response cannot be empty."));
        }
        if let Some(upload) = &form.attachment {
            upload.require_pdf("Query attachment")?;
        }

        let _permit = self.guard.acquire("respond", &format!("{}/{}", record_id, query_id))?;
        let mut record = self.gateway.fetch_query_record(record_id).await?;
        if record.claim_raised_id != claim.id {
            return Err(ClaimError::invalid_state("Query record belongs to a different claim."));
        }
        apply_response(&mut record, query_id, form)?;
        record.updated_at = Some(Utc::now());
        let saved = self.gateway.update_query_record(&record).await?;

        info!(record_id, query_id, pending = saved.pending_count(), "Query answered");
        reload(self.gateway.as_ref(), &claim.id).await
    }

    #[instrument(skip(self, claim, message), fields(claim_id = %claim.id))]
    pub async fn re_raise_claim(&self, claim: &Claim, message: &str) -> Result<Snapshot> {
        if interpret(claim).stage != Stage::ClaimDenied {
            return Err(ClaimError::invalid_state("Only a denied claim can be re-raised."));
        }
        let message = message.trim();
        if message.is_empty() {
            return Err(ClaimError::validation("Re-raise message cannot be empty."));
        }

        let _permit = self.guard.acquire("re-raise", &claim.id)?;
        let mut update = ClaimUpdate::at(Utc::now());
        update.hospital_status = Some(HospitalStatus::ClaimReRaise);
        update.hospital_re_raise_claim_message = Some(message.to_string());
        self.gateway.update_claim(&claim.id, &update).await?;

        info!("Claim re-raised");
        reload(self.gateway.as_ref(), &claim.id).await
    }

    /// Revises the message of a claim that is already re-raised.
    #[instrument(skip(self, claim, message), fields(claim_id = %claim.id))]
    pub async fn update_re_raise_message(&self, claim: &Claim, message: &str) -> Result<Snapshot> {
        if interpret(claim).stage != Stage::ClaimReRaise {
            return Err(ClaimError::invalid_state("Claim has not been re-raised."));
        }
        let message = message.trim();
        if message.is_empty() {
            return Err(ClaimError::validation("Re-raise message cannot be empty."));
        }

        let _permit = self.guard.acquire("re-raise", &claim.id)?;
        let mut update = ClaimUpdate::at(Utc::now());
        update.hospital_re_raise_claim_message = Some(message.to_string());
        self.gateway.update_claim(&claim.id, &update).await?;
        reload(self.gateway.as_ref(), &claim.id).await
    }

    /// Sends the card's re-raise draft: a re-raise from the denial, or a
    /// revised message once the claim is re-raised.
    pub async fn submit_re_raise(&self, card: &mut ClaimCard) -> Result<Snapshot> {
        let claim = &card.snapshot().claim;
        let message = card.drafts().re_raise_message.clone();
        let snapshot = match card.view().stage {
            Stage::ClaimReRaise => self.update_re_raise_message(claim, &message).await?,
            _ => self.re_raise_claim(claim, &message).await?,
        };
        card.refresh(snapshot.clone());
        card.drafts_mut().re_raise_message.clear();
        Ok(snapshot)
    }

    /// Sends the card's draft answer to one query. The draft stays on the card
    /// when the write fails.
    pub async fn submit_query_response(
        &self,
        card: &mut ClaimCard,
        record_id: &str,
        query_id: &str,
    ) -> Result<Snapshot> {
        let form = card
            .drafts()
            .query_responses
            .get(query_id)
            .cloned()
            .ok_or_else(|| ClaimError::validation("Response cannot be empty."))?;
        let snapshot = self.respond_to_query(&card.snapshot().claim, record_id, query_id, &form).await?;
        card.refresh(snapshot.clone());
        card.drafts_mut().query_responses.remove(query_id);
        Ok(snapshot)
    }

    #[instrument(skip(self, claim), fields(claim_id = %claim.id))]
    pub async fn settle_claim(&self, claim: &Claim) -> Result<Snapshot> {
        if claim.effective_insurer_status() != Some(InsurerStatus::ClaimApproved) {
            return Err(ClaimError::invalid_state("Only an approved claim can be settled."));
        }
        if claim.hospital_status == HospitalStatus::ClaimSettled {
            return Err(ClaimError::invalid_state("Claim is already settled."));
        }

        let _permit = self.guard.acquire("settle", &claim.id)?;
        let mut update = ClaimUpdate::at(Utc::now());
        update.hospital_status = Some(HospitalStatus::ClaimSettled);
        self.gateway.update_claim(&claim.id, &update).await?;

        info!("Claim settled");
        reload(self.gateway.as_ref(), &claim.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::gateway::MockClaimsGateway;
    use crate::core::stage::Panel;
    use crate::document::PDF_MIME;
    use crate::models::{ClaimQuery, QueryStatus};
    use crate::models::party::PolicyHolding;
    use crate::models::Policy;
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};
    use std::sync::{mpsc, Mutex};
    use std::time::Duration;

    fn claim(value: Value) -> Claim {
        let mut base = json!({
            "_id": "c-1",
            "customerId": "cust-1",
            "customerName": "Asha Rao",
            "hospitalId": "h-1",
            "treatmentOffered": "Appendectomy",
            "estimatedCostToHospital": 50000,
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), value.as_object()) {
            base.extend(extra.clone());
        }
        serde_json::from_value(base).unwrap()
    }

    fn desk(gateway: MockClaimsGateway) -> HospitalDesk<MockClaimsGateway> {
        HospitalDesk::new(Arc::new(gateway), "h-1")
    }

    fn pdf(name: &str) -> Upload {
        Upload::new(name, PDF_MIME, b"%PDF-1.7 test".to_vec())
    }

    /// Records every update and serves `after` on reload.
    fn recording_gateway(after: Claim, updates: Arc<Mutex<Vec<ClaimUpdate>>>) -> MockClaimsGateway {
        let mut gateway = MockClaimsGateway::new();
        gateway.expect_update_claim().times(1).returning(move |_, update| {
            updates.lock().unwrap().push(update.clone());
            Ok(())
        });
        gateway.expect_fetch_claim().times(1).returning(move |_| Ok(after.clone()));
        gateway
    }

    #[tokio::test]
    async fn admit_without_pre_auth_decision_sends_nothing() {
        let mut gateway = MockClaimsGateway::new();
        gateway.expect_update_claim().never();
        gateway.expect_fetch_claim().never();
        let desk = desk(gateway);

        for insurer_status in [Value::Null, json!("CLAIM_ASSIGNED_FOR_QUERY"), json!("CLAIM_APPROVED")] {
            let pending = claim(json!({
                "insurerId": "ins-1",
                "hospitalStatus": "PRE_AUTH_INITIATED",
                "insurerStatus": insurer_status,
            }));
            let err = desk.admit_patient(&pending, None).await.unwrap_err();
            assert!(matches!(err, ClaimError::InvalidState(_)));
        }
    }

    #[tokio::test]
    async fn admit_after_pre_auth_approval() {
        let before = claim(json!({
            "insurerId": "ins-1",
            "hospitalStatus": "PRE_AUTH_INITIATED",
            "insurerStatus": "PRE_AUTH_APPROVED",
        }));
        let after = claim(json!({
            "insurerId": "ins-1",
            "hospitalStatus": "ADMITTED",
            "insurerStatus": "PRE_AUTH_APPROVED",
            "treatmentDetails": { "isAdmitted": true, "dateOfAdmission": "2024-03-01T09:00:00Z" },
        }));
        let updates = Arc::new(Mutex::new(Vec::new()));
        let desk = desk(recording_gateway(after, updates.clone()));

        let snapshot = desk.admit_patient(&before, Some("Ward 3")).await.unwrap();

        let sent = updates.lock().unwrap();
        assert_eq!(sent[0].hospital_status, Some(HospitalStatus::Admitted));
        let details = sent[0].treatment_details.as_ref().unwrap();
        assert!(details.is_admitted);
        assert_eq!(details.admission_notes.as_deref(), Some("Ward 3"));
        assert_eq!(snapshot.claim.hospital_status, HospitalStatus::Admitted);
        assert!(snapshot.claim.is_admitted());
    }

    #[tokio::test]
    async fn denied_pre_auth_admits_as_cash_patient() {
        let before = claim(json!({
            "insurerId": "ins-1",
            "hospitalStatus": "PRE_AUTH_INITIATED",
            "insurerStatus": "PRE_AUTH_DENIED",
        }));
        let updates = Arc::new(Mutex::new(Vec::new()));
        let desk = desk(recording_gateway(before.clone(), updates.clone()));

        desk.admit_patient(&before, None).await.unwrap();
        assert_eq!(updates.lock().unwrap()[0].hospital_status, Some(HospitalStatus::CashBasedAdmission));
    }

    #[tokio::test]
    async fn discharge_requires_pdf_documents() {
        let mut gateway = MockClaimsGateway::new();
        gateway.expect_update_claim().never();
        let desk = desk(gateway);
        let admitted = claim(json!({
            "insurerId": "ins-1",
            "hospitalStatus": "ADMITTED",
            "insurerStatus": "PRE_AUTH_APPROVED",
            "treatmentDetails": { "isAdmitted": true },
        }));

        let mut form = DischargeForm {
            final_bill_amount: Some(dec!(48000)),
            non_medical_expenses: None,
            final_bill: Some(pdf("bill.pdf")),
            discharge_summary: None,
        };
        let err = desk.submit_discharge_claim(&admitted, &form).await.unwrap_err();
        assert_eq!(err.user_message(), "Discharge summary is required.");

        form.discharge_summary = Some(Upload::new("summary.pdf", "image/png", vec![0x89, b'P', b'N', b'G']));
        let err = desk.submit_discharge_claim(&admitted, &form).await.unwrap_err();
        assert_eq!(err.user_message(), "Discharge summary must be a PDF file.");

        form.final_bill_amount = None;
        assert!(matches!(desk.submit_discharge_claim(&admitted, &form).await, Err(ClaimError::Validation(_))));
    }

    #[tokio::test]
    async fn discharge_raises_the_claim() {
        let admitted = claim(json!({
            "insurerId": "ins-1",
            "hospitalStatus": "ADMITTED",
            "insurerStatus": "PRE_AUTH_APPROVED",
            "treatmentDetails": { "isAdmitted": true, "admissionNotes": "Ward 3" },
        }));
        let updates = Arc::new(Mutex::new(Vec::new()));
        let desk = desk(recording_gateway(admitted.clone(), updates.clone()));
        let form = DischargeForm {
            final_bill_amount: Some(dec!(48000)),
            non_medical_expenses: Some(dec!(1200)),
            final_bill: Some(pdf("bill.pdf")),
            discharge_summary: Some(pdf("summary.pdf")),
        };

        desk.submit_discharge_claim(&admitted, &form).await.unwrap();

        let sent = updates.lock().unwrap();
        assert_eq!(sent[0].hospital_status, Some(HospitalStatus::ClaimRaised));
        let details = sent[0].treatment_details.as_ref().unwrap();
        assert!(details.is_discharged);
        assert_eq!(details.admission_notes.as_deref(), Some("Ward 3"));
        assert_eq!(details.hospital_final_bill_amount, Some(dec!(48000)));
        assert!(details.discharge_summary_url.as_ref().unwrap().as_str().starts_with("data:application/pdf"));
    }

    #[tokio::test]
    async fn re_raise_only_from_denied() {
        let mut gateway = MockClaimsGateway::new();
        gateway.expect_update_claim().never();
        let desk = desk(gateway);

        let raised = claim(json!({ "insurerId": "ins-1", "hospitalStatus": "CLAIM_RAISED" }));
        let err = desk.re_raise_claim(&raised, "Added missing reports").await.unwrap_err();
        assert!(matches!(err, ClaimError::InvalidState(_)));

        let denied = claim(json!({
            "insurerId": "ins-1",
            "hospitalStatus": "CLAIM_RAISED",
            "insurerStatus": "CLAIM_DENIED",
        }));
        assert!(matches!(desk.re_raise_claim(&denied, "   ").await, Err(ClaimError::Validation(_))));
    }

    #[tokio::test]
    async fn re_raise_after_denial_shows_denial_panel() {
        let denied = claim(json!({
            "insurerId": "ins-1",
            "hospitalStatus": "CLAIM_RAISED",
            "insurerStatus": "CLAIM_DENIED",
            "finalClaimSettlement": { "insurerMessage": "Insufficient documentation" },
        }));
        let re_raised = claim(json!({
            "insurerId": "ins-1",
            "hospitalStatus": "CLAIM_RE_RAISE",
            "insurerStatus": "CLAIM_DENIED",
            "hospitalReRaiseClaimMessage": "Added missing reports",
            "finalClaimSettlement": { "insurerMessage": "Insufficient documentation" },
        }));
        let updates = Arc::new(Mutex::new(Vec::new()));
        let desk = desk(recording_gateway(re_raised, updates.clone()));

        let snapshot = desk.re_raise_claim(&denied, "Added missing reports").await.unwrap();

        let sent = updates.lock().unwrap();
        assert_eq!(sent[0].hospital_status, Some(HospitalStatus::ClaimReRaise));
        assert_eq!(sent[0].hospital_re_raise_claim_message.as_deref(), Some("Added missing reports"));
        assert_eq!(sent[0].insurer_status, None);
        assert_eq!(snapshot.stage(), Stage::ClaimReRaise);
        assert!(matches!(snapshot.view.panel, Panel::Denial { .. }));
    }

    #[tokio::test]
    async fn settle_requires_approval_and_is_not_repeated() {
        let mut gateway = MockClaimsGateway::new();
        gateway.expect_update_claim().never();
        let desk = desk(gateway);

        let denied = claim(json!({ "insurerId": "ins-1", "hospitalStatus": "CLAIM_RAISED", "insurerStatus": "CLAIM_DENIED" }));
        assert!(desk.settle_claim(&denied).await.is_err());

        let settled = claim(json!({ "insurerId": "ins-1", "hospitalStatus": "CLAIM_SETTLED", "insurerStatus": "CLAIM_APPROVED" }));
        assert!(matches!(desk.settle_claim(&settled).await, Err(ClaimError::InvalidState(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn second_settle_while_first_in_flight_is_refused() {
        let approved = claim(json!({ "insurerId": "ins-1", "hospitalStatus": "CLAIM_RAISED", "insurerStatus": "CLAIM_APPROVED" }));
        let settled = claim(json!({ "insurerId": "ins-1", "hospitalStatus": "CLAIM_SETTLED", "insurerStatus": "CLAIM_APPROVED" }));
        let (release, hold) = mpsc::channel::<()>();
        let hold = Mutex::new(hold);
        let mut gateway = MockClaimsGateway::new();
        gateway.expect_update_claim().times(1).returning(move |_, _| {
            hold.lock().unwrap().recv().ok();
            Ok(())
        });
        gateway.expect_fetch_claim().times(1).returning(move |_| Ok(settled.clone()));
        let gateway = Arc::new(gateway);
        let guard = InFlightGuard::new();
        let first = HospitalDesk::new(Arc::clone(&gateway), "h-1").with_guard(guard.clone());
        let second = HospitalDesk::new(Arc::clone(&gateway), "h-1").with_guard(guard.clone());

        let in_flight = {
            let approved = approved.clone();
            tokio::spawn(async move { first.settle_claim(&approved).await })
        };
        while !guard.is_pending("settle", "c-1") {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let err = second.settle_claim(&approved).await.unwrap_err();
        assert!(matches!(err, ClaimError::InFlight(_)));

        release.send(()).unwrap();
        let snapshot = in_flight.await.unwrap().unwrap();
        assert_eq!(snapshot.stage(), Stage::ClaimSettled);
        assert!(!guard.is_pending("settle", "c-1"));
    }

    #[test]
    fn desk_for_session_needs_hospital_role() {
        let hospital = Session::start("u-1", "front@city.htl", Some("h-9".into())).unwrap();
        let desk = HospitalDesk::for_session(Arc::new(MockClaimsGateway::new()), &hospital).unwrap();
        assert_eq!(desk.hospital_id(), "h-9");

        let insurer = Session::start("u-2", "desk@star.ins", None).unwrap();
        let err = HospitalDesk::for_session(Arc::new(MockClaimsGateway::new()), &insurer).err().unwrap();
        assert!(matches!(err, ClaimError::InvalidState(_)));
    }

    #[tokio::test]
    async fn re_raise_draft_is_sent_from_the_card() {
        let denied = claim(json!({
            "insurerId": "ins-1",
            "hospitalStatus": "CLAIM_RAISED",
            "insurerStatus": "CLAIM_DENIED",
        }));
        let re_raised = claim(json!({
            "insurerId": "ins-1",
            "hospitalStatus": "CLAIM_RE_RAISE",
            "insurerStatus": "CLAIM_DENIED",
            "hospitalReRaiseClaimMessage": "Added missing reports",
        }));
        let updates = Arc::new(Mutex::new(Vec::new()));
        let desk = desk(recording_gateway(re_raised, updates.clone()));
        let mut card = ClaimCard::new(Snapshot::new(denied));
        card.drafts_mut().re_raise_message = "  Added missing reports ".into();

        desk.submit_re_raise(&mut card).await.unwrap();

        let sent = updates.lock().unwrap();
        assert_eq!(sent[0].hospital_status, Some(HospitalStatus::ClaimReRaise));
        assert_eq!(sent[0].hospital_re_raise_claim_message.as_deref(), Some("Added missing reports"));
        assert_eq!(card.view().stage, Stage::ClaimReRaise);
        assert!(card.drafts().re_raise_message.is_empty());
    }

    #[tokio::test]
    async fn query_answer_without_draft_sends_nothing() {
        let mut gateway = MockClaimsGateway::new();
        gateway.expect_fetch_query_record().never();
        gateway.expect_update_query_record().never();
        let desk = desk(gateway);
        let queried = claim(json!({
            "insurerId": "ins-1",
            "hospitalStatus": "CLAIM_RAISED",
            "insurerStatus": "CLAIM_ASSIGNED_FOR_QUERY",
        }));
        let mut card = ClaimCard::new(Snapshot::new(queried));

        let err = desk.submit_query_response(&mut card, "q-1", "1").await.unwrap_err();
        assert!(matches!(err, ClaimError::Validation(_)));
    }

    #[tokio::test]
    async fn answered_query_rejects_new_response() {
        let mut gateway = MockClaimsGateway::new();
        gateway.expect_fetch_query_record().returning(|_| {
            Ok(QueryRecord {
                id: "q-1".into(),
                claim_raised_id: "c-1".into(),
                raised_by_insurer_id: Some("ins-1".into()),
                query_status: QueryStatus::Open,
                query: vec![ClaimQuery {
                    query_id: "1".into(),
                    query_text: "Share lab reports".into(),
                    query_request: String::new(),
                    date_raised: None,
                    query_response: "Shared on email".into(),
                    attachment_required: false,
                    attachment: Vec::new(),
                }],
                created_at: None,
                updated_at: None,
            })
        });
        gateway.expect_update_query_record().never();
        let desk = desk(gateway);
        let queried = claim(json!({
            "insurerId": "ins-1",
            "hospitalStatus": "CLAIM_RAISED",
            "insurerStatus": "CLAIM_ASSIGNED_FOR_QUERY",
        }));

        let form = QueryResponseForm { response: "Updated answer".into(), attachment: None };
        let err = desk.respond_to_query(&queried, "q-1", "1", &form).await.unwrap_err();
        assert!(matches!(err, ClaimError::InvalidState(_)));
    }

    #[tokio::test]
    async fn lookup_validates_aadhaar_and_names_policies() {
        let mut gateway = MockClaimsGateway::new();
        gateway.expect_find_customer_by_aadhar().times(1).returning(|_| {
            Ok(Some(Customer {
                id: "cust-1".into(),
                name: "Asha Rao".into(),
                aadhar_card_number: "123412341234".into(),
                policies: vec![
                    PolicyHolding { policy_id: "p-1".into(), bought_date: None, expiry_date: None },
                    PolicyHolding { policy_id: "p-2".into(), bought_date: None, expiry_date: None },
                ],
                address: None,
                date_of_birth: None,
            }))
        });
        gateway.expect_fetch_policy().returning(|id| match id {
            "p-1" => Ok(Policy { id: "p-1".into(), name: Some("Family Floater".into()) }),
            _ => Err(ClaimError::NotFound("policy".into())),
        });
        let desk = desk(gateway);

        assert!(matches!(desk.lookup_customer("1234").await, Err(ClaimError::Validation(_))));
        assert!(matches!(desk.lookup_customer("12341234123x").await, Err(ClaimError::Validation(_))));

        let found = desk.lookup_customer("123412341234").await.unwrap();
        let names: Vec<&str> = found.policies.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Family Floater", UNKNOWN_POLICY]);
    }

    #[tokio::test]
    async fn pre_auth_form_is_validated_before_posting() {
        let mut gateway = MockClaimsGateway::new();
        gateway.expect_create_claim().never();
        let desk = desk(gateway);
        let customer = Customer {
            id: "cust-1".into(),
            name: "Asha Rao".into(),
            aadhar_card_number: "123412341234".into(),
            policies: Vec::new(),
            address: None,
            date_of_birth: None,
        };

        let blank = PreAuthForm { treatment_offered: "  ".into(), estimated_cost: Some(dec!(100)) };
        assert!(matches!(desk.raise_pre_authorization(&customer, &blank).await, Err(ClaimError::Validation(_))));

        let negative = PreAuthForm { treatment_offered: "Appendectomy".into(), estimated_cost: Some(dec!(-5)) };
        assert!(matches!(desk.raise_pre_authorization(&customer, &negative).await, Err(ClaimError::Validation(_))));
    }
}
