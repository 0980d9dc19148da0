//! Data-access boundary. Dispatchers only talk to the backend through these
//! traits, so every write can be followed by an explicit reload.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    ApprovedPatient, BedStatusChange, BookingTransferStatus, Claim, ClaimFilter, ClaimUpdate, Customer,
    DischargeStatus, Hospital, NewClaim, NewQueryRecord, NewRoom, Notification, Policy, QueryRecord, Room,
    RoomBedAssignment, RoomBooking, RoomTransfer,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClaimsGateway: Send + Sync {
    async fn fetch_claim(&self, claim_id: &str) -> Result<Claim>;

    async fn list_claims(&self, filter: &ClaimFilter) -> Result<Vec<Claim>>;

    async fn create_claim(&self, claim: &NewClaim) -> Result<Claim>;

    async fn update_claim(&self, claim_id: &str, update: &ClaimUpdate) -> Result<()>;

    /// `None` when no customer holds the given Aadhaar number.
    async fn find_customer_by_aadhar(&self, aadhar_number: &str) -> Result<Option<Customer>>;

    async fn fetch_customer(&self, customer_id: &str) -> Result<Customer>;

    async fn fetch_hospital(&self, hospital_id: &str) -> Result<Hospital>;

    async fn fetch_policy(&self, policy_id: &str) -> Result<Policy>;

    async fn fetch_query_record_for_claim(&self, claim_id: &str) -> Result<Option<QueryRecord>>;

    async fn fetch_query_record(&self, record_id: &str) -> Result<QueryRecord>;

    async fn create_query_record(&self, record: &NewQueryRecord) -> Result<QueryRecord>;

    async fn update_query_record(&self, record: &QueryRecord) -> Result<QueryRecord>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomsGateway: Send + Sync {
    async fn list_rooms(&self) -> Result<Vec<Room>>;

    async fn fetch_room(&self, room_id: &str) -> Result<Room>;

    async fn create_room(&self, room: &NewRoom) -> Result<()>;

    /// Replaces the stored room, beds included.
    async fn update_room(&self, room: &Room) -> Result<()>;

    async fn delete_room(&self, room_id: &str) -> Result<()>;

    async fn set_bed_status(&self, change: &BedStatusChange) -> Result<()>;

    async fn list_bookings(&self) -> Result<Vec<RoomBooking>>;

    async fn create_booking(&self, booking: &RoomBooking) -> Result<()>;

    async fn update_booking(&self, booking_id: &str, booking: &RoomBooking) -> Result<()>;

    async fn list_transfers(&self) -> Result<Vec<RoomTransfer>>;

    async fn create_transfer(&self, transfer: &RoomTransfer) -> Result<()>;

    async fn update_transfer(&self, transfer_id: &str, transfer: &RoomTransfer) -> Result<()>;

    /// Records the requested room and bed on the patient's claim.
    async fn assign_room_bed(&self, claim_id: &str, room_id: &str, bed_id: &str) -> Result<()>;

    async fn current_room_bed(&self, claim_id: &str) -> Result<Option<RoomBedAssignment>>;

    async fn approved_patients(&self) -> Result<Vec<ApprovedPatient>>;

    async fn booking_transfer_status(&self, claim_id: &str) -> Result<BookingTransferStatus>;

    async fn discharge_status(&self, claim_id: &str) -> Result<DischargeStatus>;

    async fn notifications(&self, claim_id: &str) -> Result<Vec<Notification>>;

    async fn mark_notification_read(&self, notification_id: &str) -> Result<()>;

    async fn mark_all_notifications_read(&self, claim_id: &str) -> Result<()>;
}
