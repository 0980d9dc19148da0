//! Wire types for claims, queries, rooms and the parties involved.

pub mod claim;
pub mod notification;
pub mod party;
pub mod query;
pub mod room;

pub use claim::{
    Claim, ClaimFilter, ClaimUpdate, CustomerRef, DischargeStatus, FinalClaimSettlement, HospitalStatus, InsurerStatus, NewClaim,
    PreAuthorization, TreatmentDetails,
};
pub use notification::Notification;
pub use party::{ApprovedPatient, Customer, Hospital, Policy, PolicySummary};
pub use query::{ClaimQuery, NewQueryRecord, QueryAttachment, QueryRecord, QueryStatus};
pub use room::{
    Bed, BedStatus, BedStatusChange, BookingStatus, BookingTransferStatus, NewRoom, Room, RoomBedAssignment,
    RoomBooking, RoomTransfer,
};
