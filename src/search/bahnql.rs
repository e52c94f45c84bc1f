//! 1BahnQL search backend (Deutsche Bahn GraphQL API)
//!
//! Two queries are used: `nearby` for radius searches and `search` for name
//! searches. Both return the same station shape, so one parser handles
//! either response. Entries without a usable station number or name are
//! skipped; the rest of the batch is kept.

use crate::constants::api::BAHNQL_URL;
use crate::error::{Error, Result};
use crate::search::SearchService;
use crate::station::{parse_yes_no, Station};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("station-finder/", env!("CARGO_PKG_VERSION"));

const STATION_FIELDS: &str = "primaryEvaId name hasParking hasWiFi hasSteplessAccess picture { url }";

/// 1BahnQL search backend
#[derive(Debug, Clone)]
pub struct BahnQlService {
    client: reqwest::Client,
    endpoint: String,
}

/// GraphQL request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphQlRequest<'a> {
    operation_name: &'a str,
    query: String,
    variables: Value,
}

/// GraphQL response envelope
#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

/// One station entry as the API returns it
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStation {
    primary_eva_id: Option<i64>,
    name: Option<String>,
    has_parking: Option<bool>,
    #[serde(rename = "hasWiFi")]
    has_wifi: Option<bool>,
    has_stepless_access: Option<String>,
    picture: Option<RawPicture>,
}

#[derive(Debug, Deserialize)]
struct RawPicture {
    url: Option<String>,
}

impl RawStation {
    fn into_station(self) -> Option<Station> {
        let id = self.primary_eva_id?;
        let name = self.name?;
        Some(Station {
            has_wifi: self.has_wifi.unwrap_or(false),
            has_parking: self.has_parking.unwrap_or(false),
            has_stepless_access: parse_yes_no(self.has_stepless_access.as_deref()).unwrap_or(false),
            picture_url: self.picture.and_then(|p| p.url),
            ..Station::new(id, name)
        })
    }
}

impl BahnQlService {
    /// Create a backend for the public endpoint
    pub fn new() -> Result<Self> {
        Self::with_endpoint(BAHNQL_URL, None)
    }

    /// Create a backend for a specific endpoint and optional request timeout
    pub fn with_endpoint(endpoint: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn nearby_request(latitude: f64, longitude: f64, radius: u32, count: u32) -> GraphQlRequest<'static> {
        GraphQlRequest {
            operation_name: "NearBy",
            query: format!(
                "query NearBy($latitude: Float!, $longitude: Float!, $radius: Int!, $count: Int!) \
                 {{ nearby(latitude: $latitude, longitude: $longitude, radius: $radius) \
                 {{ stations(count: $count) {{ {} }} }} }}",
                STATION_FIELDS
            ),
            variables: json!({
                "latitude": latitude,
                "longitude": longitude,
                "radius": radius,
                "count": count,
            }),
        }
    }

    fn search_request(term: &str) -> GraphQlRequest<'static> {
        GraphQlRequest {
            operation_name: "Search",
            query: format!(
                "query Search($searchTerm: String!) \
                 {{ search(searchTerm: $searchTerm) {{ stations {{ {} }} }} }}",
                STATION_FIELDS
            ),
            variables: json!({ "searchTerm": term }),
        }
    }

    async fn execute(&self, request: GraphQlRequest<'_>) -> Result<Vec<Station>> {
        let operation = request.operation_name;
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Search(format!("{} request failed: {}", operation, e)))?;

        if !response.status().is_success() {
            return Err(Error::Search(format!(
                "{} returned status: {}",
                operation,
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::Search(format!("Failed to parse {} response: {}", operation, e)))?;

        parse_response(body)
    }
}

impl SearchService for BahnQlService {
    fn name(&self) -> &'static str {
        "bahnql"
    }

    async fn search_near(
        &self,
        latitude: f64,
        longitude: f64,
        radius_meters: u32,
        max_results: u32,
    ) -> Result<Vec<Station>> {
        self.execute(Self::nearby_request(latitude, longitude, radius_meters, max_results))
            .await
    }

    async fn search_by_text(&self, term: &str) -> Result<Vec<Station>> {
        self.execute(Self::search_request(term)).await
    }
}

/// Extract stations from a `nearby` or `search` response
///
/// GraphQL errors are logged but do not fail the call; a response without
/// data yields no stations.
pub fn parse_response(body: Value) -> Result<Vec<Station>> {
    let response: GraphQlResponse = serde_json::from_value(body)?;

    if !response.errors.is_empty() {
        info!(errors = response.errors.len(), "Response contains errors");
        for error in &response.errors {
            info!("{}", error.message);
        }
    }

    let Some(data) = response.data else {
        return Ok(Vec::new());
    };

    let entries = ["nearby", "search"]
        .iter()
        .find_map(|root| data.get(*root))
        .and_then(|root| root.get("stations"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let total = entries.len();
    let stations: Vec<Station> = entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<RawStation>(entry) {
            Ok(raw) => raw.into_station(),
            Err(e) => {
                debug!(error = %e, "Skipping malformed station entry");
                None
            }
        })
        .collect();

    if stations.len() < total {
        debug!(skipped = total - stations.len(), "Skipped incomplete station entries");
    }

    Ok(stations)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station_json(id: Value, name: &str, wifi: bool, parking: bool, stepless: &str, url: &str) -> Value {
        json!({
            "primaryEvaId": id,
            "name": name,
            "hasWiFi": wifi,
            "hasParking": parking,
            "hasSteplessAccess": stepless,
            "picture": { "url": url },
        })
    }

    fn assert_station(
        station: &Station,
        id: i64,
        name: &str,
        has_wifi: bool,
        has_parking: bool,
        has_stepless_access: bool,
        picture_url: &str,
    ) {
        assert_eq!(station.id, id);
        assert_eq!(station.name, name);
        assert_eq!(station.has_wifi, has_wifi);
        assert_eq!(station.has_parking, has_parking);
        assert_eq!(station.has_stepless_access, has_stepless_access);
        assert_eq!(station.picture_url.as_deref(), Some(picture_url));
    }

    #[test]
    fn test_parse_nearby_response() {
        let body = json!({
            "data": { "nearby": { "stations": [
                station_json(json!(1), "Dresden - Hauptbahnhof", true, true, "yes", "http://123.de/456.jpg"),
                station_json(json!(2), "Dresden - Strehlen", false, true, "no", "http://123.de/789.jpg"),
            ]}}
        });

        let stations = parse_response(body).unwrap();
        assert_eq!(stations.len(), 2);
        assert_station(&stations[0], 1, "Dresden - Hauptbahnhof", true, true, true, "http://123.de/456.jpg");
        assert_station(&stations[1], 2, "Dresden - Strehlen", false, true, false, "http://123.de/789.jpg");
    }

    #[test]
    fn test_parse_search_response() {
        let body = json!({
            "data": { "search": { "stations": [
                station_json(json!(1), "Dresden - Hauptbahnhof", true, true, "yes", "http://123.de/456.jpg"),
                station_json(json!(2), "Dresden - Strehlen", false, true, "no", "http://123.de/789.jpg"),
            ]}}
        });

        let stations = parse_response(body).unwrap();
        assert_eq!(stations.len(), 2);
        assert_station(&stations[1], 2, "Dresden - Strehlen", false, true, false, "http://123.de/789.jpg");
    }

    #[test]
    fn test_malformed_entries_skipped() {
        let body = json!({
            "data": { "nearby": { "stations": [
                station_json(Value::Null, "No Id", true, true, "yes", "x"),
                station_json(json!("abc"), "Bad Id", true, true, "yes", "x"),
                { "primaryEvaId": 3 },
                station_json(json!(4), "Pirna", false, false, "unknown", "http://123.de/pirna.jpg"),
            ]}}
        });

        let stations = parse_response(body).unwrap();
        assert_eq!(stations.len(), 1);
        assert_station(&stations[0], 4, "Pirna", false, false, false, "http://123.de/pirna.jpg");
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let body = json!({
            "data": { "search": { "stations": [
                { "primaryEvaId": 8010085, "name": "Dresden Hbf", "picture": null }
            ]}}
        });

        let stations = parse_response(body).unwrap();
        assert_eq!(stations, vec![Station::new(8010085, "Dresden Hbf")]);
    }

    #[test]
    fn test_errors_without_data() {
        let body = json!({ "errors": [{ "message": "rate limited" }] });
        assert!(parse_response(body).unwrap().is_empty());
    }

    #[test]
    fn test_errors_with_partial_data() {
        let body = json!({
            "errors": [{ "message": "picture service down" }],
            "data": { "nearby": { "stations": [
                { "primaryEvaId": 1, "name": "A" }
            ]}}
        });
        assert_eq!(parse_response(body).unwrap().len(), 1);
    }

    #[test]
    fn test_unexpected_shape_is_error() {
        assert!(parse_response(json!({ "errors": "nope" })).is_err());
    }

    #[test]
    fn test_nearby_request_variables() {
        let request = BahnQlService::nearby_request(51.04, 13.73, 2000, 10);
        assert_eq!(request.operation_name, "NearBy");
        assert!(request.query.contains("nearby(latitude: $latitude"));
        assert!(request.query.contains("stations(count: $count)"));
        assert_eq!(request.variables["radius"], 2000);
        assert_eq!(request.variables["count"], 10);

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["operationName"], "NearBy");
    }

    #[test]
    fn test_search_request_variables() {
        let request = BahnQlService::search_request("Dresden");
        assert_eq!(request.variables["searchTerm"], "Dresden");
        assert!(request.query.contains("search(searchTerm: $searchTerm)"));
    }

    #[test]
    fn test_backend_creation() {
        let backend = BahnQlService::new().unwrap();
        assert_eq!(backend.endpoint(), BAHNQL_URL);
        assert_eq!(backend.name(), "bahnql");
    }
}
