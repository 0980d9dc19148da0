use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BedStatus {
    Available,
    Occupied,
    Requested,
    TransferRequested,
    Maintenance,
}

impl BedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BedStatus::Available => "Available",
            BedStatus::Occupied => "Occupied",
            BedStatus::Requested => "Requested",
            BedStatus::TransferRequested => "Transfer Requested",
            BedStatus::Maintenance => "Maintenance",
        }
    }
}

// The backend is inconsistent about casing, so statuses are matched case-insensitively.
impl FromStr for BedStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(BedStatus::Available),
            "occupied" => Ok(BedStatus::Occupied),
            "requested" => Ok(BedStatus::Requested),
            "transfer requested" => Ok(BedStatus::TransferRequested),
            "maintenance" => Ok(BedStatus::Maintenance),
            other => Err(format!("unknown bed status '{}'", other)),
        }
    }
}

impl TryFrom<String> for BedStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BedStatus> for String {
    fn from(status: BedStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for BedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BookingStatus {
    Requested,
    Approved,
    Rejected,
    Transfer,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Requested => "Requested",
            BookingStatus::Approved => "Approved",
            BookingStatus::Rejected => "Rejected",
            BookingStatus::Transfer => "Transfer",
        }
    }

    /// Still waiting on a staff decision.
    pub fn is_pending(&self) -> bool {
        matches!(self, BookingStatus::Requested | BookingStatus::Transfer)
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "requested" | "transfer requested" => Ok(BookingStatus::Requested),
            "approved" | "transfer approved" => Ok(BookingStatus::Approved),
            "rejected" => Ok(BookingStatus::Rejected),
            "transfer" => Ok(BookingStatus::Transfer),
            other => Err(format!("unknown booking status '{}'", other)),
        }
    }
}

impl TryFrom<String> for BookingStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BookingStatus> for String {
    fn from(status: BookingStatus) -> Self {
        status.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bed {
    pub bed_id: String,
    pub status: BedStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(rename = "type", default)]
    pub room_type: String,
    #[serde(default)]
    pub floor: Option<i32>,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub feature: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub beds: Vec<Bed>,
}

impl Room {
    pub fn bed(&self, bed_id: &str) -> Option<&Bed> {
        self.beds.iter().find(|b| b.bed_id == bed_id)
    }

    pub fn has_available_bed(&self) -> bool {
        self.beds.iter().any(|b| b.status == BedStatus::Available)
    }

    pub fn has_occupied_bed(&self) -> bool {
        self.beds.iter().any(|b| b.status == BedStatus::Occupied)
    }
}

/// Body of `POST patient/rooms`. New rooms and their beds start out Available.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRoom {
    #[serde(rename = "type")]
    pub room_type: String,
    pub status: BedStatus,
    pub floor: i32,
    pub image: String,
    pub feature: String,
    pub description: String,
    pub price: Decimal,
    pub beds: Vec<Bed>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomBooking {
    #[serde(rename = "_id", alias = "id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "patientid", alias = "patientId")]
    pub patient_id: String,
    pub patient_name: String,
    #[serde(default)]
    pub booking_type: Option<String>,
    #[serde(default)]
    pub room_type: Option<String>,
    pub room_id: String,
    pub bed_id: String,
    pub requested_date: DateTime<Utc>,
    pub status: BookingStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomTransfer {
    #[serde(rename = "_id", alias = "id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "patientid", alias = "patientId")]
    pub patient_id: String,
    pub patient_name: String,
    #[serde(default)]
    pub from_room_id: String,
    #[serde(default)]
    pub from_bed_id: String,
    pub to_room_id: String,
    pub bed_id: String,
    #[serde(default)]
    pub reason: String,
    pub requested_date: DateTime<Utc>,
    pub status: BookingStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomBedAssignment {
    #[serde(default)]
    pub room_id: String,
    #[serde(default)]
    pub bed_id: String,
}

/// Body of `POST patient/rooms/updateBedAndRoomStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BedStatusChange {
    pub room_id: String,
    pub bed_id: String,
    pub new_status: BedStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingTransferStatus {
    #[serde(default)]
    pub latest_booking: Option<RoomBooking>,
    #[serde(default)]
    pub latest_transfer: Option<RoomTransfer>,
    #[serde(default)]
    pub current_status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bed_status_parses_any_case() {
        let room: Room = serde_json::from_value(json!({
            "_id": "r-101",
            "type": "Private",
            "price": 2500,
            "beds": [
                { "bedId": "b1", "status": "available" },
                { "bedId": "b2", "status": "Transfer Requested" }
            ]
        }))
        .unwrap();
        assert_eq!(room.beds[0].status, BedStatus::Available);
        assert_eq!(room.beds[1].status, BedStatus::TransferRequested);
        assert!(room.has_available_bed());
    }

    #[test]
    fn booking_uses_backend_patient_key() {
        let booking = RoomBooking {
            id: None,
            patient_id: "c-1".into(),
            patient_name: "Asha".into(),
            booking_type: Some("New Booking".into()),
            room_type: Some("Private".into()),
            room_id: "r-101".into(),
            bed_id: "b1".into(),
            requested_date: "2024-03-05T00:00:00Z".parse().unwrap(),
            status: BookingStatus::Requested,
        };
        let body = serde_json::to_value(&booking).unwrap();
        assert_eq!(body["patientid"], "c-1");
        assert_eq!(body["status"], "Requested");
        assert!(body.get("_id").is_none());
    }

    #[test]
    fn unknown_bed_status_is_rejected() {
        let parsed: Result<Bed, _> = serde_json::from_value(json!({ "bedId": "b1", "status": "Haunted" }));
        assert!(parsed.is_err());
    }
}
