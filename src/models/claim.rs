use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::document::DataUrl;

/// Hospital-side progress of a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HospitalStatus {
    PreAuthInitiated,
    Initiated,
    Admitted,
    CashBasedAdmission,
    ClaimRaised,
    ClaimReRaise,
    ClaimSettled,
}

impl HospitalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HospitalStatus::PreAuthInitiated => "PRE_AUTH_INITIATED",
            HospitalStatus::Initiated => "INITIATED",
            HospitalStatus::Admitted => "ADMITTED",
            HospitalStatus::CashBasedAdmission => "CASH_BASED_ADMISSION",
            HospitalStatus::ClaimRaised => "CLAIM_RAISED",
            HospitalStatus::ClaimReRaise => "CLAIM_RE_RAISE",
            HospitalStatus::ClaimSettled => "CLAIM_SETTLED",
        }
    }
}

impl fmt::Display for HospitalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Insurer-side decision on a claim. Absent until an insurer picks the claim up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InsurerStatus {
    PreAuthApproved,
    PreAuthDenied,
    ClaimAssignedForQuery,
    ClaimAssignedForVerifierReview,
    ClaimDenied,
    ClaimApproved,
}

impl InsurerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsurerStatus::PreAuthApproved => "PRE_AUTH_APPROVED",
            InsurerStatus::PreAuthDenied => "PRE_AUTH_DENIED",
            InsurerStatus::ClaimAssignedForQuery => "CLAIM_ASSIGNED_FOR_QUERY",
            InsurerStatus::ClaimAssignedForVerifierReview => "CLAIM_ASSIGNED_FOR_VERIFIER_REVIEW",
            InsurerStatus::ClaimDenied => "CLAIM_DENIED",
            InsurerStatus::ClaimApproved => "CLAIM_APPROVED",
        }
    }

    pub fn is_pre_auth_decision(&self) -> bool {
        matches!(self, InsurerStatus::PreAuthApproved | InsurerStatus::PreAuthDenied)
    }
}

impl fmt::Display for InsurerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerRef {
    #[serde(rename = "customerId", default)]
    pub id: String,
    #[serde(rename = "customerName", default)]
    pub name: String,
    #[serde(rename = "customerAadharNumber", default)]
    pub aadhar_number: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreAuthorization {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insurer_comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentDetails {
    #[serde(default)]
    pub is_admitted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_admission: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_discharged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_discharge: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_paid_non_medical_expenses: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hospital_final_bill_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hospital_final_bill: Option<DataUrl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discharge_summary_url: Option<DataUrl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admission_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bed_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalClaimSettlement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insurer_approved_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insurer_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insurer_final_bill: Option<DataUrl>,
}

/// Server-owned claim snapshot. Never mutated locally; every write is
/// followed by a fresh fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(flatten)]
    pub customer: CustomerRef,
    #[serde(default)]
    pub hospital_id: String,
    #[serde(default)]
    pub insurer_id: Option<String>,
    #[serde(default)]
    pub treatment_offered: String,
    #[serde(default)]
    pub estimated_cost_to_hospital: Decimal,
    pub hospital_status: HospitalStatus,
    #[serde(default)]
    pub insurer_status: Option<InsurerStatus>,
    #[serde(default)]
    pub pre_authorization: Option<PreAuthorization>,
    #[serde(default)]
    pub treatment_details: Option<TreatmentDetails>,
    #[serde(default)]
    pub final_claim_settlement: Option<FinalClaimSettlement>,
    #[serde(default)]
    pub hospital_re_raise_claim_message: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Claim {
    /// Insurer status only counts once an insurer has been assigned.
    pub fn effective_insurer_status(&self) -> Option<InsurerStatus> {
        match &self.insurer_id {
            Some(id) if !id.is_empty() => self.insurer_status,
            _ => None,
        }
    }

    pub fn is_admitted(&self) -> bool {
        self.treatment_details.as_ref().map_or(false, |t| t.is_admitted)
    }

    pub fn is_discharged(&self) -> bool {
        self.treatment_details.as_ref().map_or(false, |t| t.is_discharged)
    }

    pub fn insurer_message(&self) -> Option<&str> {
        self.final_claim_settlement
            .as_ref()
            .and_then(|s| s.insurer_message.as_deref())
            .filter(|m| !m.trim().is_empty())
    }
}

/// Body of the pre-authorization POST.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClaim {
    pub hospital_id: String,
    pub customer_name: String,
    pub customer_aadhar_number: String,
    pub customer_id: String,
    pub treatment_offered: String,
    pub estimated_cost_to_hospital: Decimal,
    pub hospital_status: HospitalStatus,
    pub created_at: DateTime<Utc>,
}

/// Partial update sent with `PUT hospital/claims/{id}`. Unset fields are left
/// untouched by the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insurer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hospital_status: Option<HospitalStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insurer_status: Option<InsurerStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_authorization: Option<PreAuthorization>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treatment_details: Option<TreatmentDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_claim_settlement: Option<FinalClaimSettlement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hospital_re_raise_claim_message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ClaimUpdate {
    pub fn at(updated_at: DateTime<Utc>) -> Self {
        Self {
            insurer_id: None,
            hospital_status: None,
            insurer_status: None,
            pre_authorization: None,
            treatment_details: None,
            final_claim_settlement: None,
            hospital_re_raise_claim_message: None,
            updated_at,
        }
    }
}

/// Response of `GET hospital/claims/{id}/discharge-status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DischargeStatus {
    #[serde(default)]
    pub is_discharged: bool,
    #[serde(default)]
    pub date_of_discharge: Option<DateTime<Utc>>,
    #[serde(default)]
    pub discharge_summary_url: Option<DataUrl>,
}

/// Server-side claim listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimFilter {
    All,
    /// Awaiting admission at a hospital.
    Initiated { hospital_id: String },
    /// Admitted and awaiting discharge.
    Admitted { hospital_id: String },
    /// Claims assigned to an insurer.
    Insurer { insurer_id: String },
    /// Pre-authorizations no insurer has picked up.
    NoInsurer,
    TrackedBy { hospital_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn deserializes_backend_claim() {
        let claim: Claim = serde_json::from_value(json!({
            "_id": "c-1",
            "customerId": "cust-9",
            "customerName": "Asha Rao",
            "customerAadharNumber": "123412341234",
            "hospitalId": "h-1",
            "insurerId": null,
            "treatmentOffered": "Appendectomy",
            "estimatedCostToHospital": 50000,
            "hospitalStatus": "PRE_AUTH_INITIATED",
            "insurerStatus": null,
            "createdAt": "2024-03-01T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(claim.id, "c-1");
        assert_eq!(claim.customer.name, "Asha Rao");
        assert_eq!(claim.estimated_cost_to_hospital, dec!(50000));
        assert_eq!(claim.hospital_status, HospitalStatus::PreAuthInitiated);
        assert_eq!(claim.insurer_status, None);
        assert!(!claim.is_admitted());
    }

    #[test]
    fn insurer_status_ignored_without_insurer() {
        let mut claim: Claim = serde_json::from_value(json!({
            "_id": "c-2",
            "hospitalStatus": "CLAIM_RAISED",
            "insurerStatus": "CLAIM_DENIED"
        }))
        .unwrap();
        assert_eq!(claim.effective_insurer_status(), None);

        claim.insurer_id = Some("ins-1".into());
        assert_eq!(claim.effective_insurer_status(), Some(InsurerStatus::ClaimDenied));
    }

    #[test]
    fn update_omits_unset_fields() {
        let mut update = ClaimUpdate::at("2024-03-02T00:00:00Z".parse().unwrap());
        update.hospital_status = Some(HospitalStatus::ClaimSettled);

        let body = serde_json::to_value(&update).unwrap();
        assert_eq!(
            body,
            json!({ "hospitalStatus": "CLAIM_SETTLED", "updatedAt": "2024-03-02T00:00:00Z" })
        );
    }
}
