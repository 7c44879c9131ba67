//! Normalization of a booking into the sink's wire payload.
//!
//! The sink contract: no field is ever omitted or `undefined`. Absent
//! optional attributes are forwarded as explicit `null`, absent numerics as
//! `0`, `passengerCount` as the string `"1"`, and `paymentMethod` as
//! `"Cash"`. The `Option` fields below therefore serialize unconditionally -
//! adding `skip_serializing_if` anywhere in this struct would break the
//! contract.

use serde::{Deserialize, Serialize};

use crate::types::{Booking, BookingId};

/// Default passenger count forwarded when the booking carries none.
pub const DEFAULT_PASSENGER_COUNT: &str = "1";

/// Default payment method forwarded when the booking carries none.
pub const DEFAULT_PAYMENT_METHOD: &str = "Cash";

/// The normalized JSON body POSTed to the sink, one per relayed booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SinkPayload {
    pub booking_id: String,
    pub status: String,
    pub driver_id: Option<String>,
    pub created_at: Option<String>,
    pub completed_at: Option<String>,
    pub fare: f64,
    pub passenger_name: Option<String>,
    pub passenger_phone: Option<String>,
    pub passenger_count: String,
    pub pickup_latitude: f64,
    pub pickup_longitude: f64,
    pub dropoff_latitude: f64,
    pub dropoff_longitude: f64,
    pub payment_method: String,
    pub ratings: Option<f64>,
}

impl SinkPayload {
    /// Builds the normalized payload for a booking.
    pub fn from_booking(id: &BookingId, booking: &Booking) -> Self {
        SinkPayload {
            booking_id: id.as_str().to_string(),
            status: booking.status_str().to_string(),
            driver_id: booking.driver_id.clone(),
            created_at: booking.created_at.clone(),
            completed_at: booking.completed_at.clone(),
            fare: booking.fare.unwrap_or(0.0),
            passenger_name: booking.passenger_name.clone(),
            passenger_phone: booking.passenger_phone.clone(),
            passenger_count: booking
                .passenger_count
                .clone()
                .unwrap_or_else(|| DEFAULT_PASSENGER_COUNT.to_string()),
            pickup_latitude: booking.pickup_latitude.unwrap_or(0.0),
            pickup_longitude: booking.pickup_longitude.unwrap_or(0.0),
            dropoff_latitude: booking.dropoff_latitude.unwrap_or(0.0),
            dropoff_longitude: booking.dropoff_longitude.unwrap_or(0.0),
            payment_method: booking
                .payment_method
                .clone()
                .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string()),
            ratings: booking.ratings,
        }
    }
}
