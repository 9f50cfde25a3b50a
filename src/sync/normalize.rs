//! Conversion of raw feed batches into validated vehicle records.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use thiserror::Error;

use crate::providers::feed::wire::RawVehicle;

use super::types::VehicleRecord;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Feed batch yielded no valid vehicle records")]
    EmptyBatch,
}

/// Outcome of normalizing one batch.
#[derive(Debug)]
pub struct Normalized {
    pub records: Vec<VehicleRecord>,
    /// Raw entries rejected by per-record validation
    pub dropped: usize,
}

/// Normalize a raw batch into validated records.
///
/// Pure function of its inputs: individual bad records (missing fields,
/// out-of-range or NaN coordinates, duplicate vehicle ids) are filtered
/// out; only a batch with zero valid records fails as a whole.
pub fn normalize(
    raw: Vec<RawVehicle>,
    observed_at: DateTime<Utc>,
) -> Result<Normalized, ValidationError> {
    let total = raw.len();
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut records = Vec::with_capacity(total);

    for vehicle in raw {
        let Some(record) = validate(vehicle, observed_at) else {
            continue;
        };
        // First occurrence wins; a vehicle id appears at most once per snapshot
        if !seen_ids.insert(record.vehicle_id.clone()) {
            continue;
        }
        records.push(record);
    }

    if records.is_empty() {
        return Err(ValidationError::EmptyBatch);
    }

    let dropped = total - records.len();
    Ok(Normalized { records, dropped })
}

fn validate(vehicle: RawVehicle, observed_at: DateTime<Utc>) -> Option<VehicleRecord> {
    let vehicle_id = vehicle.vehicle_id.filter(|id| !id.is_empty())?;
    if vehicle.route_id.is_empty() {
        return None;
    }
    let latitude = vehicle.latitude?;
    let longitude = vehicle.longitude?;
    // NaN fails both range checks and is dropped with the rest
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return None;
    }

    Some(VehicleRecord {
        vehicle_id,
        route_id: vehicle.route_id,
        latitude,
        longitude,
        heading: vehicle.heading,
        speed: vehicle.speed,
        timestamp: vehicle
            .timestamp
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        observed_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_raw(vehicle_id: &str, lat: f64, lon: f64) -> RawVehicle {
        RawVehicle {
            vehicle_id: Some(vehicle_id.to_string()),
            route_id: "71".to_string(),
            latitude: Some(lat),
            longitude: Some(lon),
            heading: None,
            speed: None,
            timestamp: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn out_of_range_records_are_dropped_not_fatal() {
        let raw = vec![
            make_raw("V1", 22.19, 113.54),
            make_raw("V2", 22.20, 113.55),
            make_raw("V3", 22.21, 113.56),
            make_raw("V4", 22.22, 113.57),
            make_raw("V5", 22.23, 113.58),
            make_raw("BAD-LAT", 91.0, 113.54),
            make_raw("BAD-LON", 22.19, -181.0),
        ];
        let normalized = normalize(raw, now()).unwrap();
        assert_eq!(normalized.records.len(), 5);
        assert_eq!(normalized.dropped, 2);
        assert!(normalized
            .records
            .iter()
            .all(|r| r.vehicle_id.starts_with('V')));
    }

    #[test]
    fn nan_coordinates_are_dropped() {
        let raw = vec![make_raw("V1", 22.19, 113.54), make_raw("NAN", f64::NAN, 113.54)];
        let normalized = normalize(raw, now()).unwrap();
        assert_eq!(normalized.records.len(), 1);
        assert_eq!(normalized.dropped, 1);
    }

    #[test]
    fn missing_required_fields_are_dropped() {
        let mut no_id = make_raw("", 22.19, 113.54);
        no_id.vehicle_id = None;
        let mut no_coords = make_raw("V2", 0.0, 0.0);
        no_coords.latitude = None;
        no_coords.longitude = None;

        let raw = vec![no_id, no_coords, make_raw("V3", 22.19, 113.54)];
        let normalized = normalize(raw, now()).unwrap();
        assert_eq!(normalized.records.len(), 1);
        assert_eq!(normalized.records[0].vehicle_id, "V3");
    }

    #[test]
    fn duplicate_vehicle_ids_first_occurrence_wins() {
        let raw = vec![make_raw("V1", 22.19, 113.54), make_raw("V1", 30.0, 100.0)];
        let normalized = normalize(raw, now()).unwrap();
        assert_eq!(normalized.records.len(), 1);
        assert_eq!(normalized.records[0].latitude, 22.19);
        assert_eq!(normalized.dropped, 1);
    }

    #[test]
    fn all_invalid_batch_is_empty_batch_error() {
        let raw = vec![make_raw("BAD", 91.0, 113.54)];
        assert!(matches!(
            normalize(raw, now()),
            Err(ValidationError::EmptyBatch)
        ));
        assert!(matches!(
            normalize(Vec::new(), now()),
            Err(ValidationError::EmptyBatch)
        ));
    }

    #[test]
    fn observed_at_and_source_timestamp_are_set() {
        let mut raw = make_raw("V1", 22.19, 113.54);
        raw.timestamp = Some(1700000000);
        let normalized = normalize(vec![raw], now()).unwrap();
        let record = &normalized.records[0];
        assert_eq!(record.observed_at, now());
        assert_eq!(
            record.timestamp,
            Some(DateTime::from_timestamp(1700000000, 0).unwrap())
        );
    }
}
