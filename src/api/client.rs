//! reqwest implementation of the gateway traits.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use super::endpoints;
use super::gateway::{ClaimsGateway, RoomsGateway};
use crate::config::ApiConfig;
use crate::error::{ClaimError, Result};
use crate::models::{
    ApprovedPatient, BedStatusChange, BookingTransferStatus, Claim, ClaimFilter, ClaimUpdate, Customer,
    DischargeStatus, Hospital, NewClaim, NewQueryRecord, NewRoom, Notification, Policy, QueryRecord, Room,
    RoomBedAssignment, RoomBooking, RoomTransfer,
};

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";
pub const DUPLICATE_BOOKING_MESSAGE: &str = "Booking failed: Patient already has a booking on this date.";

/// HTTP client for the claims backend.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpGateway {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        // Trailing slash so relative paths join under the API prefix.
        let cleaned = format!("{}/", config.base_url.trim_end_matches('/'));
        let base_url = Url::parse(&cleaned)?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ClaimError::validation(format!(
                "API base URL must use http or https, got: {}",
                base_url.scheme()
            )));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build()?;

        info!(base_url = %base_url, "Created claims gateway");
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn url_with_query(&self, path: &str, params: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.url(path)?;
        url.query_pairs_mut().extend_pairs(params);
        Ok(url)
    }

    /// Every write carries a fresh key so the backend can drop replays.
    fn write(&self, method: Method, url: Url) -> RequestBuilder {
        let key = Uuid::new_v4();
        debug!(%method, %url, idempotency_key = %key, "Sending write");
        self.http.request(method, url).header(IDEMPOTENCY_HEADER, key.to_string())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = check(self.http.get(url).send().await?).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Like `get_json`, but a 404 or an empty/null body means "nothing there".
    async fn get_optional<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>> {
        let response = match check(self.http.get(url).send().await?).await {
            Ok(response) => response,
            Err(ClaimError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let body = response.bytes().await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(serde_json::from_slice::<Option<T>>(&body)?)
    }

    async fn send_json<B, T>(&self, method: Method, url: Url, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = check(self.write(method, url).json(body).send().await?).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn send_unit<B: Serialize + ?Sized>(&self, method: Method, url: Url, body: Option<&B>) -> Result<()> {
        let mut request = self.write(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        check(request.send().await?).await?;
        Ok(())
    }
}

/// Maps non-2xx responses onto the error taxonomy.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let path = response.url().path().to_string();
    let body = response.text().await.unwrap_or_default();
    warn!(%status, %path, "Backend rejected request");

    Err(match status {
        StatusCode::NOT_FOUND => ClaimError::NotFound(path),
        StatusCode::BAD_REQUEST if is_duplicate_booking(&body) => {
            ClaimError::Conflict(DUPLICATE_BOOKING_MESSAGE.to_string())
        }
        _ => ClaimError::Http { status, body },
    })
}

/// The booking service reports a same-day double booking only in its message text.
pub fn is_duplicate_booking(body: &str) -> bool {
    let body = body.to_ascii_lowercase();
    body.contains("same patient") && body.contains("same date")
}

#[async_trait]
impl ClaimsGateway for HttpGateway {
    #[instrument(skip(self))]
    async fn fetch_claim(&self, claim_id: &str) -> Result<Claim> {
        self.get_json(self.url(&endpoints::claim(claim_id))?).await
    }

    #[instrument(skip(self))]
    async fn list_claims(&self, filter: &ClaimFilter) -> Result<Vec<Claim>> {
        let (path, params) = endpoints::claim_listing(filter);
        let params: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        self.get_json(self.url_with_query(&path, &params)?).await
    }

    #[instrument(skip(self, claim), fields(customer_id = %claim.customer_id))]
    async fn create_claim(&self, claim: &NewClaim) -> Result<Claim> {
        let created: Claim = self.send_json(Method::POST, self.url(endpoints::HOSPITAL_CLAIMS)?, claim).await?;
        info!(claim_id = %created.id, "Pre-authorization claim created");
        Ok(created)
    }

    #[instrument(skip(self, update))]
    async fn update_claim(&self, claim_id: &str, update: &ClaimUpdate) -> Result<()> {
        self.send_unit(Method::PUT, self.url(&endpoints::claim(claim_id))?, Some(update)).await
    }

    #[instrument(skip(self, aadhar_number))]
    async fn find_customer_by_aadhar(&self, aadhar_number: &str) -> Result<Option<Customer>> {
        let url = self.url_with_query(endpoints::customer_lookup(), &[("AadharNumber", aadhar_number)])?;
        self.get_optional(url).await
    }

    #[instrument(skip(self))]
    async fn fetch_customer(&self, customer_id: &str) -> Result<Customer> {
        self.get_json(self.url(&endpoints::customer(customer_id))?).await
    }

    #[instrument(skip(self))]
    async fn fetch_hospital(&self, hospital_id: &str) -> Result<Hospital> {
        self.get_json(self.url(&endpoints::hospital(hospital_id))?).await
    }

    #[instrument(skip(self))]
    async fn fetch_policy(&self, policy_id: &str) -> Result<Policy> {
        self.get_json(self.url(&endpoints::policy(policy_id))?).await
    }

    #[instrument(skip(self))]
    async fn fetch_query_record_for_claim(&self, claim_id: &str) -> Result<Option<QueryRecord>> {
        let records: Option<Vec<QueryRecord>> =
            self.get_optional(self.url(&endpoints::queries_for_claim(claim_id))?).await?;
        Ok(records.and_then(|r| r.into_iter().next()))
    }

    #[instrument(skip(self))]
    async fn fetch_query_record(&self, record_id: &str) -> Result<QueryRecord> {
        self.get_json(self.url(&endpoints::query_record(record_id))?).await
    }

    #[instrument(skip(self, record), fields(claim_id = %record.claim_raised_id))]
    async fn create_query_record(&self, record: &NewQueryRecord) -> Result<QueryRecord> {
        self.send_json(Method::POST, self.url(endpoints::HOSPITAL_QUERIES)?, record).await
    }

    #[instrument(skip(self, record), fields(record_id = %record.id))]
    async fn update_query_record(&self, record: &QueryRecord) -> Result<QueryRecord> {
        self.send_json(Method::PUT, self.url(&endpoints::query_record_update(&record.id))?, record).await
    }
}

#[async_trait]
impl RoomsGateway for HttpGateway {
    #[instrument(skip(self))]
    async fn list_rooms(&self) -> Result<Vec<Room>> {
        self.get_json(self.url(endpoints::ROOMS)?).await
    }

    #[instrument(skip(self))]
    async fn fetch_room(&self, room_id: &str) -> Result<Room> {
        self.get_json(self.url(&endpoints::room(room_id))?).await
    }

    #[instrument(skip(self, room), fields(room_type = %room.room_type, beds = room.beds.len()))]
    async fn create_room(&self, room: &NewRoom) -> Result<()> {
        self.send_unit(Method::POST, self.url(endpoints::ROOMS)?, Some(room)).await
    }

    #[instrument(skip(self, room), fields(room_id = %room.id))]
    async fn update_room(&self, room: &Room) -> Result<()> {
        self.send_unit(Method::PUT, self.url(&endpoints::room(&room.id))?, Some(room)).await
    }

    #[instrument(skip(self))]
    async fn delete_room(&self, room_id: &str) -> Result<()> {
        self.send_unit::<()>(Method::DELETE, self.url(&endpoints::room(room_id))?, None).await
    }

    #[instrument(skip(self, change), fields(room_id = %change.room_id, bed_id = %change.bed_id))]
    async fn set_bed_status(&self, change: &BedStatusChange) -> Result<()> {
        self.send_unit(Method::POST, self.url(endpoints::BED_STATUS)?, Some(change)).await
    }

    #[instrument(skip(self))]
    async fn list_bookings(&self) -> Result<Vec<RoomBooking>> {
        self.get_json(self.url(endpoints::ROOM_BOOKINGS)?).await
    }

    #[instrument(skip(self, booking), fields(patient_id = %booking.patient_id))]
    async fn create_booking(&self, booking: &RoomBooking) -> Result<()> {
        self.send_unit(Method::POST, self.url(endpoints::ROOM_BOOKINGS)?, Some(booking)).await
    }

    #[instrument(skip(self, booking))]
    async fn update_booking(&self, booking_id: &str, booking: &RoomBooking) -> Result<()> {
        self.send_unit(Method::PUT, self.url(&endpoints::booking(booking_id))?, Some(booking)).await
    }

    #[instrument(skip(self))]
    async fn list_transfers(&self) -> Result<Vec<RoomTransfer>> {
        self.get_json(self.url(endpoints::ROOM_TRANSFERS)?).await
    }

    #[instrument(skip(self, transfer), fields(patient_id = %transfer.patient_id))]
    async fn create_transfer(&self, transfer: &RoomTransfer) -> Result<()> {
        self.send_unit(Method::POST, self.url(endpoints::ROOM_TRANSFERS)?, Some(transfer)).await
    }

    #[instrument(skip(self, transfer))]
    async fn update_transfer(&self, transfer_id: &str, transfer: &RoomTransfer) -> Result<()> {
        self.send_unit(Method::PUT, self.url(&endpoints::transfer(transfer_id))?, Some(transfer)).await
    }

    #[instrument(skip(self))]
    async fn assign_room_bed(&self, claim_id: &str, room_id: &str, bed_id: &str) -> Result<()> {
        let url = self.url_with_query(
            &endpoints::assign_room_bed(),
            &[("claimId", claim_id), ("roomId", room_id), ("bedId", bed_id)],
        )?;
        self.send_unit::<()>(Method::PUT, url, None).await
    }

    #[instrument(skip(self))]
    async fn current_room_bed(&self, claim_id: &str) -> Result<Option<RoomBedAssignment>> {
        self.get_optional(self.url(&endpoints::current_room_bed(claim_id))?).await
    }

    #[instrument(skip(self))]
    async fn approved_patients(&self) -> Result<Vec<ApprovedPatient>> {
        self.get_json(self.url(&endpoints::approved_patients())?).await
    }

    #[instrument(skip(self))]
    async fn booking_transfer_status(&self, claim_id: &str) -> Result<BookingTransferStatus> {
        self.get_json(self.url(&endpoints::booking_transfer_status(claim_id))?).await
    }

    #[instrument(skip(self))]
    async fn discharge_status(&self, claim_id: &str) -> Result<DischargeStatus> {
        self.get_json(self.url(&endpoints::discharge_status(claim_id))?).await
    }

    #[instrument(skip(self))]
    async fn notifications(&self, claim_id: &str) -> Result<Vec<Notification>> {
        self.get_json(self.url(&endpoints::notifications_for(claim_id))?).await
    }

    #[instrument(skip(self))]
    async fn mark_notification_read(&self, notification_id: &str) -> Result<()> {
        self.send_unit::<()>(Method::PUT, self.url(&endpoints::notification_read(notification_id))?, None).await
    }

    #[instrument(skip(self))]
    async fn mark_all_notifications_read(&self, claim_id: &str) -> Result<()> {
        self.send_unit::<()>(Method::PUT, self.url(&endpoints::notifications_read_all(claim_id))?, None).await
    }
}
