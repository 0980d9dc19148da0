//! Relative paths of the backend microservices, resolved against `api.base_url`.

use crate::models::ClaimFilter;

pub const HOSPITAL_CLAIMS: &str = "hospital/claims";
pub const HOSPITAL_QUERIES: &str = "hospitalqueries";
pub const ROOMS: &str = "patient/rooms";
pub const BED_STATUS: &str = "patient/rooms/updateBedAndRoomStatus";
pub const ROOM_BOOKINGS: &str = "patient/roombookings";
pub const ROOM_TRANSFERS: &str = "patient/roomtransfers";
pub const NOTIFICATIONS: &str = "patient/notifications";

pub fn claim(claim_id: &str) -> String {
    format!("{}/{}", HOSPITAL_CLAIMS, claim_id)
}

/// Path plus query parameters for a claim listing.
pub fn claim_listing(filter: &ClaimFilter) -> (String, Vec<(&'static str, String)>) {
    match filter {
        ClaimFilter::All => (HOSPITAL_CLAIMS.to_string(), Vec::new()),
        ClaimFilter::Initiated { hospital_id } => {
            (format!("{}/initiated", HOSPITAL_CLAIMS), vec![("HospitalId", hospital_id.clone())])
        }
        ClaimFilter::Admitted { hospital_id } => {
            (format!("{}/admitted", HOSPITAL_CLAIMS), vec![("HospitalId", hospital_id.clone())])
        }
        ClaimFilter::Insurer { insurer_id } => {
            (format!("{}/insurer", HOSPITAL_CLAIMS), vec![("InsurerId", insurer_id.clone())])
        }
        ClaimFilter::NoInsurer => (format!("{}/no-insurer", HOSPITAL_CLAIMS), Vec::new()),
        ClaimFilter::TrackedBy { hospital_id } => {
            (format!("{}/track", HOSPITAL_CLAIMS), vec![("HospitalId", hospital_id.clone())])
        }
    }
}

pub fn approved_patients() -> String {
    format!("{}/insurer-approved/patient-list", HOSPITAL_CLAIMS)
}

pub fn current_room_bed(claim_id: &str) -> String {
    format!("{}/{}/currentRoomBed", HOSPITAL_CLAIMS, claim_id)
}

pub fn discharge_status(claim_id: &str) -> String {
    format!("{}/{}/discharge-status", HOSPITAL_CLAIMS, claim_id)
}

pub fn assign_room_bed() -> String {
    format!("{}/updateRoomBed", HOSPITAL_CLAIMS)
}

pub fn queries_for_claim(claim_id: &str) -> String {
    format!("{}/claimraised/{}", HOSPITAL_QUERIES, claim_id)
}

pub fn query_record(record_id: &str) -> String {
    format!("{}/{}", HOSPITAL_QUERIES, record_id)
}

pub fn query_record_update(record_id: &str) -> String {
    format!("{}/query/{}", HOSPITAL_QUERIES, record_id)
}

pub fn customer_lookup() -> &'static str {
    "insurer/manage/customer"
}

pub fn customer(customer_id: &str) -> String {
    format!("login/Customer/{}", customer_id)
}

pub fn hospital(hospital_id: &str) -> String {
    format!("login/Hospital/{}", hospital_id)
}

pub fn policy(policy_id: &str) -> String {
    format!("admin/policies/{}", policy_id)
}

pub fn room(room_id: &str) -> String {
    format!("{}/{}", ROOMS, room_id)
}

pub fn booking(booking_id: &str) -> String {
    format!("{}/{}", ROOM_BOOKINGS, booking_id)
}

pub fn transfer(transfer_id: &str) -> String {
    format!("{}/{}", ROOM_TRANSFERS, transfer_id)
}

pub fn booking_transfer_status(claim_id: &str) -> String {
    format!("patient/roombooking-transfer/status/{}", claim_id)
}

pub fn notifications_for(claim_id: &str) -> String {
    format!("{}/patient/{}", NOTIFICATIONS, claim_id)
}

pub fn notification_read(notification_id: &str) -> String {
    format!("{}/{}/read", NOTIFICATIONS, notification_id)
}

pub fn notifications_read_all(claim_id: &str) -> String {
    format!("{}/patient/{}/readall", NOTIFICATIONS, claim_id)
}
