//! Wire payload adapters for the upstream feed.
//!
//! The exact schema a deployment speaks is configuration, not code: each
//! supported layout decodes into the same `RawVehicle` shape, which is all
//! the rest of the pipeline depends on.

use serde::Deserialize;

use crate::config::WireFormat;

use super::error::FeedError;

/// One vehicle as reported by the upstream feed, before validation.
///
/// Fields the feed may omit or garble stay `Option` here; the normalizer
/// decides what is usable.
#[derive(Debug, Clone)]
pub struct RawVehicle {
    pub vehicle_id: Option<String>,
    pub route_id: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    /// Source-reported unix timestamp in seconds
    pub timestamp: Option<i64>,
}

/// Decode a response body in the configured wire format.
///
/// `route` is the route the fetch was issued for; layouts that don't carry
/// a route per vehicle inherit it.
pub fn decode(format: WireFormat, route: &str, bytes: &[u8]) -> Result<Vec<RawVehicle>, FeedError> {
    match format {
        WireFormat::Positions => decode_positions(route, bytes),
        WireFormat::RouteStations => decode_route_stations(route, bytes),
    }
}

// --- Flat positions layout ---

#[derive(Debug, Deserialize)]
struct PositionsBody {
    #[serde(default)]
    vehicles: Vec<PositionEntry>,
}

#[derive(Debug, Deserialize)]
struct PositionEntry {
    id: Option<String>,
    route: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    heading: Option<f64>,
    speed: Option<f64>,
    timestamp: Option<i64>,
}

fn decode_positions(route: &str, bytes: &[u8]) -> Result<Vec<RawVehicle>, FeedError> {
    let body: PositionsBody = serde_json::from_slice(bytes)?;

    Ok(body
        .vehicles
        .into_iter()
        .map(|entry| RawVehicle {
            vehicle_id: entry.id,
            route_id: entry.route.unwrap_or_else(|| route.to_string()),
            latitude: entry.lat,
            longitude: entry.lon,
            heading: entry.heading,
            speed: entry.speed,
            timestamp: entry.timestamp,
        })
        .collect())
}

// --- Nested route/station layout (DSAT-style) ---
//
// {"data": {"routeInfo": [{"staCode": "...", "busInfo": [{"busPlate": "...",
//  "latitude": "22.19", "longitude": "113.54", "speed": "23"}]}]}}
// Coordinates and speed arrive as strings.

#[derive(Debug, Deserialize)]
struct RouteStationsBody {
    data: Option<RouteStationsData>,
}

#[derive(Debug, Deserialize)]
struct RouteStationsData {
    #[serde(rename = "routeInfo", default)]
    route_info: Vec<StationEntry>,
}

#[derive(Debug, Deserialize)]
struct StationEntry {
    #[serde(rename = "busInfo", default)]
    bus_info: Vec<BusEntry>,
}

#[derive(Debug, Deserialize)]
struct BusEntry {
    #[serde(rename = "busPlate")]
    bus_plate: Option<String>,
    latitude: Option<String>,
    longitude: Option<String>,
    speed: Option<String>,
}

fn decode_route_stations(route: &str, bytes: &[u8]) -> Result<Vec<RawVehicle>, FeedError> {
    let body: RouteStationsBody = serde_json::from_slice(bytes)?;

    let stations = body
        .data
        .map(|d| d.route_info)
        .unwrap_or_default();

    Ok(stations
        .into_iter()
        .flat_map(|station| station.bus_info)
        .map(|bus| RawVehicle {
            vehicle_id: bus.bus_plate,
            route_id: route.to_string(),
            latitude: parse_numeric(bus.latitude.as_deref()),
            longitude: parse_numeric(bus.longitude.as_deref()),
            heading: None,
            speed: parse_numeric(bus.speed.as_deref()),
            timestamp: None,
        })
        .collect())
}

/// Parse a string-encoded numeric field, treating garbage as absent.
fn parse_numeric(value: Option<&str>) -> Option<f64> {
    value.and_then(|s| s.trim().parse::<f64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- positions layout ---

    #[test]
    fn decode_positions_layout() {
        let body = br#"{
            "vehicles": [
                {"id": "MX-10-01", "route": "71", "lat": 22.19, "lon": 113.54,
                 "heading": 180.0, "speed": 32.5, "timestamp": 1700000000},
                {"id": "MX-10-02", "lat": 22.20, "lon": 113.55}
            ]
        }"#;
        let raw = decode(WireFormat::Positions, "73", body).unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].vehicle_id.as_deref(), Some("MX-10-01"));
        assert_eq!(raw[0].route_id, "71");
        assert_eq!(raw[0].timestamp, Some(1700000000));
        // No per-vehicle route falls back to the polled route
        assert_eq!(raw[1].route_id, "73");
        assert_eq!(raw[1].heading, None);
    }

    #[test]
    fn decode_positions_empty_body() {
        let raw = decode(WireFormat::Positions, "71", b"{}").unwrap();
        assert!(raw.is_empty());
    }

    // --- route/station layout ---

    #[test]
    fn decode_route_stations_layout() {
        let body = br#"{
            "data": {
                "routeInfo": [
                    {"staCode": "T530/1", "busInfo": [
                        {"busPlate": "MX-11-22", "latitude": "22.1987",
                         "longitude": "113.5439", "speed": "27"}
                    ]},
                    {"staCode": "T531", "busInfo": []}
                ]
            }
        }"#;
        let raw = decode(WireFormat::RouteStations, "701X", body).unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].vehicle_id.as_deref(), Some("MX-11-22"));
        assert_eq!(raw[0].route_id, "701X");
        assert_eq!(raw[0].latitude, Some(22.1987));
        assert_eq!(raw[0].longitude, Some(113.5439));
        assert_eq!(raw[0].speed, Some(27.0));
        assert_eq!(raw[0].timestamp, None);
    }

    #[test]
    fn decode_route_stations_empty_route_info() {
        let raw = decode(WireFormat::RouteStations, "71", br#"{"data": {"routeInfo": []}}"#)
            .unwrap();
        assert!(raw.is_empty());
    }

    #[test]
    fn decode_route_stations_garbled_coordinates() {
        let body = br#"{
            "data": {"routeInfo": [{"busInfo": [
                {"busPlate": "MX-33-44", "latitude": "not-a-number", "longitude": "113.54"}
            ]}]}
        }"#;
        let raw = decode(WireFormat::RouteStations, "71", body).unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].latitude, None);
        assert_eq!(raw[0].longitude, Some(113.54));
    }

    #[test]
    fn decode_malformed_body_is_parse_error() {
        let err = decode(WireFormat::RouteStations, "71", b"<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, FeedError::Parse(_)));

        let err = decode(WireFormat::Positions, "71", b"[1, 2").unwrap_err();
        assert!(matches!(err, FeedError::Parse(_)));
    }
}
