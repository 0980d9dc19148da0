//! Room inventory, bed booking and transfer requests, and the staff decisions
//! on them.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};
use validator::Validate;

use super::guard::InFlightGuard;
use super::non_negative_amount;
use crate::api::RoomsGateway;
use crate::error::{ClaimError, Result};
use crate::models::{
    notification, ApprovedPatient, Bed, BedStatus, BedStatusChange, BookingStatus, BookingTransferStatus,
    DischargeStatus, NewRoom, Notification, Room, RoomBooking, RoomTransfer,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RoomFilter {
    #[default]
    All,
    Available,
    Private,
    DeluxeOrSuite,
    /// Rooms with at least one occupied bed, as the administration screen lists them.
    Occupied,
}

impl RoomFilter {
    pub fn matches(&self, room: &Room) -> bool {
        let kind = room.room_type.to_ascii_lowercase();
        match self {
            RoomFilter::All => true,
            RoomFilter::Available => room.has_available_bed(),
            RoomFilter::Private => kind == "private",
            RoomFilter::DeluxeOrSuite => kind == "deluxe" || kind == "suite",
            RoomFilter::Occupied => room.has_occupied_bed(),
        }
    }
}

impl FromStr for RoomFilter {
    type Err = ClaimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(RoomFilter::All),
            "available" => Ok(RoomFilter::Available),
            "private" => Ok(RoomFilter::Private),
            "deluxe" | "suite" | "deluxe-or-suite" => Ok(RoomFilter::DeluxeOrSuite),
            "occupied" => Ok(RoomFilter::Occupied),
            other => Err(ClaimError::validation(format!("unknown room filter '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceOrder {
    Ascending,
    Descending,
}

impl FromStr for PriceOrder {
    type Err = ClaimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "price-asc" | "low-to-high" => Ok(PriceOrder::Ascending),
            "desc" | "price-desc" | "high-to-low" => Ok(PriceOrder::Descending),
            other => Err(ClaimError::validation(format!("unknown sort order '{}'", other))),
        }
    }
}

pub fn select_rooms(rooms: Vec<Room>, filter: RoomFilter, order: Option<PriceOrder>) -> Vec<Room> {
    let mut rooms: Vec<Room> = rooms.into_iter().filter(|r| filter.matches(r)).collect();
    match order {
        Some(PriceOrder::Ascending) => rooms.sort_by(|a, b| a.price.cmp(&b.price)),
        Some(PriceOrder::Descending) => rooms.sort_by(|a, b| b.price.cmp(&a.price)),
        None => {}
    }
    rooms
}

/// Steps shown to a patient following their stay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TrackStep {
    Requested,
    Approved,
    TransferRequested,
    TransferApproved,
    Discharged,
}

impl TrackStep {
    pub const ALL: [TrackStep; 5] = [
        TrackStep::Requested,
        TrackStep::Approved,
        TrackStep::TransferRequested,
        TrackStep::TransferApproved,
        TrackStep::Discharged,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TrackStep::Requested => "Requested",
            TrackStep::Approved => "Approved",
            TrackStep::TransferRequested => "Transfer Requested",
            TrackStep::TransferApproved => "Transfer Approved",
            TrackStep::Discharged => "Discharged",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Matches a backend status label; unknown labels fall back to the first step.
    fn from_label(label: Option<&str>) -> TrackStep {
        label
            .and_then(|l| TrackStep::ALL.into_iter().find(|s| s.label().eq_ignore_ascii_case(l.trim())))
            .unwrap_or(TrackStep::Requested)
    }
}

impl fmt::Display for TrackStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Discharge wins, then the latest transfer, then the latest booking.
pub fn track_step(status: &BookingTransferStatus, discharge: &DischargeStatus) -> TrackStep {
    if discharge.is_discharged {
        return TrackStep::Discharged;
    }
    if let Some(transfer) = &status.latest_transfer {
        return match transfer.status {
            BookingStatus::Requested | BookingStatus::Transfer => TrackStep::TransferRequested,
            BookingStatus::Approved => TrackStep::TransferApproved,
            BookingStatus::Rejected => TrackStep::from_label(status.current_status.as_deref()),
        };
    }
    if let Some(booking) = &status.latest_booking {
        return match booking.status {
            BookingStatus::Approved => TrackStep::Approved,
            other => TrackStep::from_label(Some(other.as_str())),
        };
    }
    TrackStep::from_label(status.current_status.as_deref())
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatientProgress {
    pub step: TrackStep,
    pub status: BookingTransferStatus,
    pub discharge: DischargeStatus,
}

/// Everything the bed-management screen shows, fetched together.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomBoard {
    pub rooms: Vec<Room>,
    pub bookings: Vec<RoomBooking>,
    pub transfers: Vec<RoomTransfer>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub patient: ApprovedPatient,
    pub room_id: String,
    pub bed_id: String,
    pub requested_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub patient: ApprovedPatient,
    pub to_room_id: String,
    pub bed_id: String,
    pub reason: String,
    pub requested_date: DateTime<Utc>,
}

/// The administrator's "add room" form.
#[derive(Debug, Clone, Default, Validate)]
pub struct RoomForm {
    #[validate(length(min = 1, message = "Room type is required."))]
    pub room_type: String,
    #[validate(required(message = "Floor is required."))]
    pub floor: Option<i32>,
    #[validate(required(message = "Price is required."), custom = "non_negative_amount")]
    pub price: Option<Decimal>,
    #[validate(length(min = 1, message = "Image URL is required."))]
    pub image: String,
    #[validate(length(min = 1, message = "Feature is required."))]
    pub feature: String,
    #[validate(length(min = 1, message = "Description is required."))]
    pub description: String,
    #[validate(length(min = 1, message = "At least one bed is required."))]
    pub bed_ids: Vec<String>,
}

impl RoomForm {
    fn into_new_room(self) -> Result<NewRoom> {
        let form = RoomForm {
            room_type: self.room_type.trim().to_string(),
            image: self.image.trim().to_string(),
            feature: self.feature.trim().to_string(),
            description: self.description.trim().to_string(),
            bed_ids: self.bed_ids.iter().map(|b| b.trim().to_string()).collect(),
            ..self
        };
        form.validate()?;
        if let Some(i) = form.bed_ids.iter().position(|b| b.is_empty()) {
            return Err(ClaimError::validation(format!("Bed ID #{} is required.", i + 1)));
        }

        Ok(NewRoom {
            room_type: form.room_type,
            status: BedStatus::Available,
            floor: form.floor.unwrap_or_default(),
            image: form.image,
            feature: form.feature,
            description: form.description,
            price: form.price.unwrap_or_default(),
            beds: form
                .bed_ids
                .into_iter()
                .map(|bed_id| Bed { bed_id, status: BedStatus::Available })
                .collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbox {
    pub notifications: Vec<Notification>,
    pub unread: usize,
}

impl Inbox {
    fn new(notifications: Vec<Notification>) -> Self {
        let unread = notification::unread_count(&notifications);
        Self { notifications, unread }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

pub struct RoomDesk<G: RoomsGateway> {
    gateway: Arc<G>,
    guard: InFlightGuard,
}

impl<G: RoomsGateway> RoomDesk<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway, guard: InFlightGuard::new() }
    }

    pub fn with_guard(mut self, guard: InFlightGuard) -> Self {
        self.guard = guard;
        self
    }

    pub async fn rooms(&self, filter: RoomFilter, order: Option<PriceOrder>) -> Result<Vec<Room>> {
        Ok(select_rooms(self.gateway.list_rooms().await?, filter, order))
    }

    pub async fn eligible_patients(&self) -> Result<Vec<ApprovedPatient>> {
        self.gateway.approved_patients().await
    }

    pub async fn board(&self) -> Result<RoomBoard> {
        let (rooms, bookings, transfers) = futures::try_join!(
            self.gateway.list_rooms(),
            self.gateway.list_bookings(),
            self.gateway.list_transfers()
        )?;
        Ok(RoomBoard { rooms, bookings, transfers })
    }

    async fn require_available(&self, room_id: &str, bed_id: &str) -> Result<Room> {
        let rooms = self.gateway.list_rooms().await?;
        let room = rooms
            .into_iter()
            .find(|r| r.id == room_id)
            .ok_or_else(|| ClaimError::NotFound(format!("Room {}", room_id)))?;
        match room.bed(bed_id).map(|b| b.status) {
            Some(BedStatus::Available) => Ok(room),
            Some(status) => Err(ClaimError::invalid_state(format!("Bed {} is {}.", bed_id, status))),
            None => Err(ClaimError::NotFound(format!("Bed {}", bed_id))),
        }
    }

    #[instrument(skip(self, request), fields(patient_id = %request.patient.patient_id, room_id = %request.room_id))]
    pub async fn book_bed(&self, request: &BookingRequest) -> Result<RoomBoard> {
        let room = self.require_available(&request.room_id, &request.bed_id).await?;

        let _permit = self.guard.acquire("book bed", &request.patient.patient_id)?;
        let booking = RoomBooking {
            id: None,
            patient_id: request.patient.patient_id.clone(),
            patient_name: request.patient.patient_name.clone(),
            booking_type: Some("New Booking".to_string()),
            room_type: Some(room.room_type.clone()),
            room_id: request.room_id.clone(),
            bed_id: request.bed_id.clone(),
            requested_date: request.requested_date,
            status: BookingStatus::Requested,
        };
        self.gateway.create_booking(&booking).await?;
        self.gateway
            .assign_room_bed(&request.patient.patient_id, &request.room_id, &request.bed_id)
            .await?;

        info!(bed_id = %request.bed_id, "Bed booking requested");
        self.board().await
    }

    #[instrument(skip(self, request), fields(patient_id = %request.patient.patient_id, to_room_id = %request.to_room_id))]
    pub async fn transfer_bed(&self, request: &TransferRequest) -> Result<RoomBoard> {
        if request.reason.trim().is_empty() {
            return Err(ClaimError::validation("Transfer reason is required."));
        }
        self.require_available(&request.to_room_id, &request.bed_id).await?;
        let current = self.gateway.current_room_bed(&request.patient.patient_id).await?.unwrap_or_default();

        let _permit = self.guard.acquire("transfer bed", &request.patient.patient_id)?;
        let transfer = RoomTransfer {
            id: None,
            patient_id: request.patient.patient_id.clone(),
            patient_name: request.patient.patient_name.clone(),
            from_room_id: current.room_id,
            from_bed_id: current.bed_id,
            to_room_id: request.to_room_id.clone(),
            bed_id: request.bed_id.clone(),
            reason: request.reason.trim().to_string(),
            requested_date: request.requested_date,
            status: BookingStatus::Requested,
        };
        self.gateway.create_transfer(&transfer).await?;
        self.gateway
            .assign_room_bed(&request.patient.patient_id, &request.to_room_id, &request.bed_id)
            .await?;

        info!(bed_id = %request.bed_id, "Bed transfer requested");
        self.board().await
    }

    /// Staff decision on a booking; the bed follows the decision.
    #[instrument(skip(self, booking), fields(patient_id = %booking.patient_id))]
    pub async fn decide_booking(&self, booking: &RoomBooking, decision: Decision) -> Result<RoomBoard> {
        let booking_id = pending_id(booking.id.as_deref(), booking.status)?;

        let _permit = self.guard.acquire("decide booking", booking_id)?;
        let (status, bed_status) = match decision {
            Decision::Approve => (BookingStatus::Approved, BedStatus::Occupied),
            Decision::Reject => (BookingStatus::Rejected, BedStatus::Available),
        };
        let decided = RoomBooking { status, ..booking.clone() };
        self.gateway.update_booking(booking_id, &decided).await?;
        self.gateway
            .set_bed_status(&BedStatusChange {
                room_id: booking.room_id.clone(),
                bed_id: booking.bed_id.clone(),
                new_status: bed_status,
            })
            .await?;

        info!(booking_id, ?decision, "Booking decided");
        self.board().await
    }

    /// Staff decision on a transfer. The backend moves the patient between beds.
    #[instrument(skip(self, transfer), fields(patient_id = %transfer.patient_id))]
    pub async fn decide_transfer(&self, transfer: &RoomTransfer, decision: Decision) -> Result<RoomBoard> {
        let transfer_id = pending_id(transfer.id.as_deref(), transfer.status)?;

        let _permit = self.guard.acquire("decide transfer", transfer_id)?;
        let status = match decision {
            Decision::Approve => BookingStatus::Approved,
            Decision::Reject => BookingStatus::Rejected,
        };
        let decided = RoomTransfer { status, ..transfer.clone() };
        self.gateway.update_transfer(transfer_id, &decided).await?;

        info!(transfer_id, ?decision, "Transfer decided");
        self.board().await
    }

    #[instrument(skip(self, form), fields(room_type = %form.room_type))]
    pub async fn add_room(&self, form: RoomForm) -> Result<RoomBoard> {
        let room = form.into_new_room()?;

        let _permit = self.guard.acquire("add room", &room.room_type)?;
        self.gateway.create_room(&room).await?;

        info!(beds = room.beds.len(), "Room added");
        self.board().await
    }

    #[instrument(skip(self))]
    pub async fn remove_room(&self, room_id: &str) -> Result<RoomBoard> {
        let _permit = self.guard.acquire("remove room", room_id)?;
        self.gateway.delete_room(room_id).await?;

        info!("Room removed");
        self.board().await
    }

    /// Drops one bed by writing the room back without it.
    #[instrument(skip(self))]
    pub async fn remove_bed(&self, room_id: &str, bed_id: &str) -> Result<RoomBoard> {
        let _permit = self.guard.acquire("remove bed", &format!("{}/{}", room_id, bed_id))?;
        let mut room = self.gateway.fetch_room(room_id).await?;
        if room.bed(bed_id).is_none() {
            return Err(ClaimError::NotFound(format!("Bed {}", bed_id)));
        }
        room.beds.retain(|b| b.bed_id != bed_id);
        self.gateway.update_room(&room).await?;

        info!("Bed removed");
        self.board().await
    }

    /// Returns an occupied or under-maintenance bed to the pool.
    #[instrument(skip(self))]
    pub async fn release_bed(&self, room_id: &str, bed_id: &str) -> Result<RoomBoard> {
        let room = self.gateway.fetch_room(room_id).await?;
        match room.bed(bed_id).map(|b| b.status) {
            None => return Err(ClaimError::NotFound(format!("Bed {}", bed_id))),
            Some(BedStatus::Available) => {
                return Err(ClaimError::invalid_state(format!("Bed {} is already Available.", bed_id)))
            }
            Some(_) => {}
        }

        let _permit = self.guard.acquire("release bed", &format!("{}/{}", room_id, bed_id))?;
        self.gateway
            .set_bed_status(&BedStatusChange {
                room_id: room_id.to_string(),
                bed_id: bed_id.to_string(),
                new_status: BedStatus::Available,
            })
            .await?;

        info!("Bed marked available");
        self.board().await
    }

    /// Where a patient's stay currently stands. A missing discharge record
    /// counts as not discharged.
    #[instrument(skip(self))]
    pub async fn track(&self, claim_id: &str) -> Result<PatientProgress> {
        let (status, discharge) = futures::join!(
            self.gateway.booking_transfer_status(claim_id),
            self.gateway.discharge_status(claim_id)
        );
        let status = status?;
        if status.latest_booking.is_none() && status.latest_transfer.is_none() {
            return Err(ClaimError::NotFound("Booking or transfer for this claim".into()));
        }
        let discharge = discharge.unwrap_or_else(|e| {
            warn!(error = %e, "Discharge status unavailable");
            DischargeStatus::default()
        });

        let step = track_step(&status, &discharge);
        Ok(PatientProgress { step, status, discharge })
    }

    pub async fn inbox(&self, claim_id: &str) -> Result<Inbox> {
        Ok(Inbox::new(self.gateway.notifications(claim_id).await?))
    }

    #[instrument(skip(self))]
    pub async fn mark_read(&self, claim_id: &str, notification_id: &str) -> Result<Inbox> {
        self.gateway.mark_notification_read(notification_id).await?;
        self.inbox(claim_id).await
    }

    #[instrument(skip(self))]
    pub async fn mark_all_read(&self, claim_id: &str) -> Result<Inbox> {
        self.gateway.mark_all_notifications_read(claim_id).await?;
        self.inbox(claim_id).await
    }
}

fn pending_id(id: Option<&str>, status: BookingStatus) -> Result<&str> {
    let id = id.filter(|id| !id.is_empty()).ok_or_else(|| ClaimError::validation("Request has no id."))?;
    if !status.is_pending() {
        return Err(ClaimError::invalid_state(format!("Request is already {}.", status.as_str())));
    }
    Ok(id)
}
