//! Settlement arithmetic and the settlement advice letter sent with an approval.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::document::DataUrl;
use crate::error::{ClaimError, Result};
use crate::models::{Claim, Customer, Hospital};

/// Co-pay and discount are not negotiated yet; both always contribute zero.
pub const CO_PAY: Decimal = Decimal::ZERO;
pub const DISCOUNT: Decimal = Decimal::ZERO;

pub const INSURER_NAME: &str = "Bobbili's Health Insurance Pvt. Ltd.";
const ADVICE_MIME: &str = "text/plain";

/// One line of the insurer's bill breakdown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BillRow {
    pub head: String,
    pub bill_amount: Option<Decimal>,
    pub deduction: Option<Decimal>,
    pub settled: Option<Decimal>,
}

impl BillRow {
    pub fn new(head: impl Into<String>, bill_amount: Decimal, deduction: Decimal, settled: Decimal) -> Self {
        Self { head: head.into(), bill_amount: Some(bill_amount), deduction: Some(deduction), settled: Some(settled) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementTotals {
    pub total_bill: Decimal,
    pub total_deduction: Decimal,
    pub total_settled: Decimal,
    pub co_pay: Decimal,
    pub discount: Decimal,
    pub payable: Decimal,
}

/// Every row needs a head, a bill amount and a settled amount; none may be negative.
pub fn validate_rows(rows: &[BillRow]) -> Result<()> {
    if rows.is_empty() {
        return Err(ClaimError::validation("Add at least one bill row."));
    }
    for (i, row) in rows.iter().enumerate() {
        let line = i + 1;
        if row.head.trim().is_empty() || row.bill_amount.is_none() || row.settled.is_none() {
            return Err(ClaimError::validation(format!(
                "Row {}: head, bill amount and settled amount are required.",
                line
            )));
        }
        let amounts = [row.bill_amount, row.deduction, row.settled];
        if amounts.iter().flatten().any(|a| a.is_sign_negative() && !a.is_zero()) {
            return Err(ClaimError::validation(format!("Row {}: amounts cannot be negative.", line)));
        }
    }
    Ok(())
}

pub fn totals(rows: &[BillRow]) -> SettlementTotals {
    let sum = |f: fn(&BillRow) -> Option<Decimal>| rows.iter().filter_map(f).sum::<Decimal>();
    let total_settled = sum(|r| r.settled);
    SettlementTotals {
        total_bill: sum(|r| r.bill_amount),
        total_deduction: sum(|r| r.deduction),
        total_settled,
        co_pay: CO_PAY,
        discount: DISCOUNT,
        payable: total_settled + CO_PAY + DISCOUNT,
    }
}

pub struct AdviceContext<'a> {
    pub claim: &'a Claim,
    pub customer: &'a Customer,
    pub hospital: &'a Hospital,
    pub rows: &'a [BillRow],
    pub totals: &'a SettlementTotals,
    pub insurer_message: Option<&'a str>,
    pub issued_at: DateTime<Utc>,
}

/// Plain-text settlement advice addressed to the patient.
pub struct AdviceLetter<'c, 'a>(pub &'c AdviceContext<'a>);

impl fmt::Display for AdviceLetter<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ctx = self.0;
        let claim = ctx.claim;
        let customer = ctx.customer;
        let na = |v: Option<&str>| v.filter(|s| !s.trim().is_empty()).unwrap_or("N/A").to_string();
        let address = customer.address.clone().unwrap_or_default();
        let policy = customer.policies.first();
        let treatment = claim.treatment_details.clone().unwrap_or_default();
        let treatment_offered = na(Some(claim.treatment_offered.as_str()));

        writeln!(f, "Date: {}", ctx.issued_at.format("%d/%m/%Y"))?;
        writeln!(f)?;
        writeln!(f, "To,")?;
        writeln!(f, "{}", na(Some(customer.name.as_str())))?;
        writeln!(f, "{}", na(address.street.as_deref()))?;
        writeln!(f, "State: {}, City: {}", na(address.state.as_deref()), na(address.city.as_deref()))?;
        writeln!(f, "Pin: {}", na(address.pincode.as_deref()))?;
        writeln!(f)?;
        writeln!(f, "Dear Sir/Madam,")?;
        writeln!(f)?;
        writeln!(f, "SUBJECT: Claim Settlement Advice (Claim ID: {})", claim.id)?;
        writeln!(f)?;
        writeln!(
            f,
            "Patient Name: {}    Age: {}",
            na(Some(customer.name.as_str())),
            age_on(customer.date_of_birth.as_deref(), ctx.issued_at.date_naive()).map_or("N/A".to_string(), |a| a.to_string())
        )?;
        writeln!(
            f,
            "Policy No.: {}    Policy Validity: {}",
            policy.map_or("N/A".to_string(), |p| p.policy_id.clone()),
            policy.map_or("N/A".to_string(), |p| format!(
                "{} - {}",
                na(p.bought_date.as_deref()),
                na(p.expiry_date.as_deref())
            ))
        )?;
        writeln!(f, "Hospital Name: {}", na(Some(ctx.hospital.name.as_str())))?;
        writeln!(
            f,
            "DOA: {}    DOD: {}",
            format_date(treatment.date_of_admission),
            format_date(treatment.date_of_discharge)
        )?;
        writeln!(
            f,
            "Illness: {}    Amount Claimed: Rs. {}    Amount Settled: Rs. {}",
            treatment_offered,
            claim.estimated_cost_to_hospital.round_dp(2),
            ctx.totals.payable.round_dp(2)
        )?;
        writeln!(f)?;
        writeln!(
            f,
            "As per the instructions of the insurer, the claim is settled for Rs. {} on account of {}.",
            ctx.totals.payable.round_dp(2),
            treatment_offered
        )?;
        writeln!(f)?;
        writeln!(f, "{:<30}{:>16}{:>16}{:>16}", "Heads", "Bill (Rs.)", "Deduction (Rs.)", "Settled (Rs.)")?;
        for row in ctx.rows {
            writeln!(
                f,
                "{:<30}{:>16}{:>16}{:>16}",
                row.head,
                money(row.bill_amount),
                money(row.deduction),
                money(row.settled)
            )?;
        }
        writeln!(
            f,
            "{:<30}{:>16}{:>16}{:>16}",
            "Total:",
            money(Some(ctx.totals.total_bill)),
            money(Some(ctx.totals.total_deduction)),
            money(Some(ctx.totals.total_settled))
        )?;
        writeln!(f)?;
        writeln!(f, "Co-pay: Rs. {}", money(Some(ctx.totals.co_pay)))?;
        writeln!(f, "Discount: Rs. {}", money(Some(ctx.totals.discount)))?;
        writeln!(f, "Payable Amount: Rs. {}", money(Some(ctx.totals.payable)))?;
        if let Some(message) = ctx.insurer_message.filter(|m| !m.trim().is_empty()) {
            writeln!(f)?;
            writeln!(f, "Insurer Message: {}", message.trim())?;
        }
        writeln!(f)?;
        writeln!(f, "Sincerely yours,")?;
        writeln!(f, "TEAM")?;
        writeln!(f, "{}", INSURER_NAME)?;
        writeln!(f, "[NB: This is a computer generated letter and no signature is required.]")?;
        Ok(())
    }
}

pub fn advice_letter(ctx: &AdviceContext<'_>) -> String {
    AdviceLetter(ctx).to_string()
}

/// The advice letter as the data URL stored in `finalClaimSettlement.insurerFinalBill`.
pub fn advice_document(ctx: &AdviceContext<'_>) -> DataUrl {
    let file_name = format!("settlement-advice-{}.txt", ctx.claim.id);
    DataUrl::encode(ADVICE_MIME, Some(&file_name), advice_letter(ctx).as_bytes())
}

fn money(amount: Option<Decimal>) -> String {
    format!("{:.2}", amount.unwrap_or(Decimal::ZERO))
}

fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map_or("N/A".to_string(), |d| d.format("%d/%m/%Y").to_string())
}

/// Age in whole years. Birth dates arrive either as `YYYY-MM-DD` or as a full timestamp.
fn age_on(date_of_birth: Option<&str>, today: NaiveDate) -> Option<u32> {
    let raw = date_of_birth?.trim();
    let born = match DateTime::parse_from_rfc3339(raw) {
        Ok(d) => d.date_naive(),
        Err(_) => NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok()?,
    };
    let mut age = today.year() - born.year();
    if (today.month(), today.day()) < (born.month(), born.day()) {
        age -= 1;
    }
    u32::try_from(age).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::party::{Address, PolicyHolding};
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn claim() -> Claim {
        serde_json::from_value(json!({
            "_id": "c-42",
            "hospitalId": "h-1",
            "insurerId": "ins-1",
            "treatmentOffered": "Appendectomy",
            "estimatedCostToHospital": 50000,
            "hospitalStatus": "CLAIM_RAISED",
            "treatmentDetails": {
                "isAdmitted": true,
                "dateOfAdmission": "2024-03-01T09:00:00Z",
                "isDischarged": true,
                "dateOfDischarge": "2024-03-04T09:00:00Z"
            }
        }))
        .unwrap()
    }

    fn customer() -> Customer {
        Customer {
            id: "cust-1".into(),
            name: "Asha Rao".into(),
            aadhar_card_number: "123412341234".into(),
            policies: vec![PolicyHolding {
                policy_id: "POL-7".into(),
                bought_date: Some("2023-01-01".into()),
                expiry_date: Some("2025-01-01".into()),
            }],
            address: Some(Address {
                street: Some("12 MG Road".into()),
                city: Some("Pune".into()),
                state: Some("MH".into()),
                pincode: Some("411001".into()),
            }),
            date_of_birth: Some("1990-06-15".into()),
        }
    }

    #[test]
    fn payable_is_sum_of_settled_amounts() {
        let rows = vec![
            BillRow::new("Room", dec!(1000), dec!(100), dec!(900)),
            BillRow::new("Pharmacy", dec!(500), dec!(0), dec!(500)),
        ];
        let totals = totals(&rows);
        assert_eq!(totals.total_bill, dec!(1500));
        assert_eq!(totals.total_deduction, dec!(100));
        assert_eq!(totals.payable, dec!(1400));
    }

    #[test]
    fn rows_need_head_bill_and_settled() {
        assert!(validate_rows(&[]).is_err());

        let missing_settled = BillRow { head: "Room".into(), bill_amount: Some(dec!(10)), ..Default::default() };
        assert!(matches!(validate_rows(&[missing_settled]), Err(ClaimError::Validation(_))));

        let blank_head = BillRow::new("  ", dec!(10), dec!(0), dec!(10));
        assert!(validate_rows(&[blank_head]).is_err());

        let negative = BillRow::new("Room", dec!(10), dec!(0), dec!(-1));
        assert!(validate_rows(&[negative]).is_err());

        let no_deduction = BillRow { deduction: None, ..BillRow::new("Room", dec!(10), dec!(0), dec!(10)) };
        assert!(validate_rows(&[no_deduction]).is_ok());
    }

    #[test]
    fn letter_carries_claim_patient_and_totals() {
        let rows = vec![BillRow::new("Room", dec!(1000), dec!(100), dec!(900))];
        let totals = totals(&rows);
        let hospital = Hospital { id: "h-1".into(), name: "City Hospital".into() };
        let claim = claim();
        let customer = customer();
        let ctx = AdviceContext {
            claim: &claim,
            customer: &customer,
            hospital: &hospital,
            rows: &rows,
            totals: &totals,
            insurer_message: Some("Approved as per policy terms"),
            issued_at: "2024-03-10T00:00:00Z".parse().unwrap(),
        };

        let letter = advice_letter(&ctx);
        assert!(letter.contains("Claim Settlement Advice (Claim ID: c-42)"));
        assert!(letter.contains("Age: 33"));
        assert!(letter.contains("Policy No.: POL-7"));
        assert!(letter.contains("DOA: 01/03/2024"));
        assert!(letter.contains("Payable Amount: Rs. 900.00"));
        assert!(letter.contains("Insurer Message: Approved as per policy terms"));

        let doc = advice_document(&ctx).decode().unwrap();
        assert_eq!(doc.mime, "text/plain");
        assert_eq!(doc.file_name.as_deref(), Some("settlement-advice-c-42.txt"));
        assert_eq!(String::from_utf8(doc.bytes).unwrap(), letter);
    }

    #[test]
    fn letter_without_message_ends_with_footer() {
        let rows = vec![BillRow::new("Pharmacy", dec!(400), dec!(0), dec!(400))];
        let totals = totals(&rows);
        let hospital = Hospital { id: "h-1".into(), name: "City Hospital".into() };
        let claim = claim();
        let customer = customer();
        let ctx = AdviceContext {
            claim: &claim,
            customer: &customer,
            hospital: &hospital,
            rows: &rows,
            totals: &totals,
            insurer_message: Some("   "),
            issued_at: "2024-03-10T00:00:00Z".parse().unwrap(),
        };

        let letter = format!("{}", AdviceLetter(&ctx));
        assert!(!letter.contains("Insurer Message"));
        assert!(letter.lines().any(|l| l.starts_with("Pharmacy") && l.ends_with("400.00")));
        assert_eq!(
            letter.lines().last(),
            Some("[NB: This is a computer generated letter and no signature is required.]")
        );
    }

    #[test]
    fn age_accepts_timestamp_birth_dates() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 14).unwrap();
        assert_eq!(age_on(Some("1990-06-15T00:00:00Z"), today), Some(33));
        assert_eq!(age_on(Some("1990-06-14"), today), Some(34));
        assert_eq!(age_on(Some("not a date"), today), None);
        assert_eq!(age_on(None, today), None);
    }
}
