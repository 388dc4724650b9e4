use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use serde_json::{Map, Value};

use crate::model::GlobalDelay;
use crate::settings::Settings;
use crate::CliError;

/// Outcome of a single admin API call. Exactly one of the two shapes
/// occurs: a completed exchange records the status line and any decoded
/// body, a transport failure leaves the status at zero and carries one
/// fixed message in `error`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiResponse {
    pub status_code: u16,
    pub reason: String,
    pub url: Option<String>,
    pub data: Option<Value>,
    pub error: Option<String>,
}

/// Shared transport handle: resolved admin base URL plus the request
/// timeout from the active settings. Cloned into each resource client.
#[derive(Debug, Clone)]
pub struct AdminEndpoint {
    base_url: String,
    timeout: Duration,
    http: Client,
}

impl AdminEndpoint {
    pub fn new(settings: &Settings) -> Result<Self, CliError> {
        let http = Client::builder()
            .build()
            .map_err(|error| CliError::Transport(error.to_string()))?;
        Ok(Self {
            base_url: format!("{}/__admin", settings.host.trim_end_matches('/')),
            timeout: Duration::from_secs(settings.api_request_timeout),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, path: &str, query: &[(&str, String)]) -> ApiResponse {
        self.execute(self.http.get(self.url(path)).query(query))
    }

    fn post(&self, path: &str) -> ApiResponse {
        self.execute(self.http.post(self.url(path)))
    }

    fn post_json(&self, path: &str, body: &Value) -> ApiResponse {
        self.execute(self.http.post(self.url(path)).json(body))
    }

    fn put_json(&self, path: &str, body: &Value) -> ApiResponse {
        self.execute(self.http.put(self.url(path)).json(body))
    }

    fn delete(&self, path: &str) -> ApiResponse {
        self.execute(self.http.delete(self.url(path)))
    }

    fn execute(&self, request: RequestBuilder) -> ApiResponse {
        let mut result = ApiResponse::default();
        let response = match request.timeout(self.timeout).send() {
            Ok(response) => response,
            Err(error) => {
                result.error = Some(transport_error_message(&error).to_owned());
                return result;
            }
        };

        let status = response.status();
        result.status_code = status.as_u16();
        result.reason = status.canonical_reason().unwrap_or_default().to_owned();
        result.url = Some(response.url().to_string());

        let body = match response.bytes() {
            Ok(body) => body,
            Err(error) => {
                // A failure while reading the body is still a transport
                // failure; the partial status line is discarded.
                return ApiResponse {
                    error: Some(transport_error_message(&error).to_owned()),
                    ..ApiResponse::default()
                };
            }
        };
        if !body.is_empty() {
            // An undecodable body on a completed exchange degrades to the
            // generic request failure, keeping the recorded status line.
            match serde_json::from_slice(&body) {
                Ok(value) => result.data = Some(value),
                Err(_) => result.error = Some(GENERIC_REQUEST_ERROR.to_owned()),
            }
        }
        result
    }
}

const GENERIC_REQUEST_ERROR: &str =
    "There was an ambiguous exception that occurred while handling your request.";

/// Maps a transport failure to one fixed message, most specific kind
/// first: timeout subtypes, then redirect, URL, protocol and connection
/// failures, with a generic fallback.
fn transport_error_message(error: &reqwest::Error) -> &'static str {
    if error.is_timeout() {
        if error.is_connect() {
            "The request timed out while trying to connect to the remote server."
        } else if error.is_body() {
            "The server did not send any data in the allotted amount of time."
        } else {
            "The request timed out."
        }
    } else if error.is_redirect() {
        "Too many redirects."
    } else if error.is_builder() {
        "A valid URL is required to make a request."
    } else if error.is_status() {
        "An HTTP error occurred."
    } else if error.is_connect() {
        "A Connection error occurred."
    } else {
        GENERIC_REQUEST_ERROR
    }
}

fn optional_query(entries: &[(&'static str, Option<String>)]) -> Vec<(&'static str, String)> {
    entries
        .iter()
        .filter_map(|(name, value)| value.clone().map(|value| (*name, value)))
        .collect()
}

pub struct ServiceApi {
    endpoint: AdminEndpoint,
}

impl ServiceApi {
    pub fn new(endpoint: AdminEndpoint) -> Self {
        Self { endpoint }
    }

    pub fn update_settings(&self, delay: &GlobalDelay) -> ApiResponse {
        self.endpoint.post_json("/settings", &delay.to_json())
    }

    pub fn reset(&self) -> ApiResponse {
        self.endpoint.post("/reset")
    }

    pub fn shutdown(&self) -> ApiResponse {
        self.endpoint.post("/shutdown")
    }
}

pub struct MappingsApi {
    endpoint: AdminEndpoint,
}

impl MappingsApi {
    pub fn new(endpoint: AdminEndpoint) -> Self {
        Self { endpoint }
    }

    pub fn get(&self, limit: Option<u32>, offset: Option<u32>) -> ApiResponse {
        let query = optional_query(&[
            ("limit", limit.map(|v| v.to_string())),
            ("offset", offset.map(|v| v.to_string())),
        ]);
        self.endpoint.get("/mappings", &query)
    }

    pub fn create(&self, mapping: &Map<String, Value>) -> ApiResponse {
        self.endpoint
            .post_json("/mappings", &Value::Object(mapping.clone()))
    }

    pub fn delete(&self) -> ApiResponse {
        self.endpoint.delete("/mappings")
    }

    pub fn reset(&self) -> ApiResponse {
        self.endpoint.post("/mappings/reset")
    }

    pub fn persist(&self) -> ApiResponse {
        self.endpoint.post("/mappings/save")
    }

    pub fn find_by_metadata(&self, metadata: &Map<String, Value>) -> ApiResponse {
        self.endpoint
            .post_json("/mappings/find-by-metadata", &Value::Object(metadata.clone()))
    }

    pub fn delete_by_metadata(&self, metadata: &Map<String, Value>) -> ApiResponse {
        self.endpoint.post_json(
            "/mappings/remove-by-metadata",
            &Value::Object(metadata.clone()),
        )
    }

    pub fn get_by_id(&self, mapping_id: &str) -> ApiResponse {
        self.endpoint.get(&format!("/mappings/{mapping_id}"), &[])
    }

    pub fn update_by_id(&self, mapping_id: &str, mapping: &Map<String, Value>) -> ApiResponse {
        self.endpoint.put_json(
            &format!("/mappings/{mapping_id}"),
            &Value::Object(mapping.clone()),
        )
    }

    pub fn delete_by_id(&self, mapping_id: &str) -> ApiResponse {
        self.endpoint.delete(&format!("/mappings/{mapping_id}"))
    }
}

pub struct JournalApi {
    endpoint: AdminEndpoint,
}

impl JournalApi {
    pub fn new(endpoint: AdminEndpoint) -> Self {
        Self { endpoint }
    }

    pub fn get(&self, limit: Option<u32>, since: Option<String>) -> ApiResponse {
        let query = optional_query(&[("limit", limit.map(|v| v.to_string())), ("since", since)]);
        self.endpoint.get("/requests", &query)
    }

    pub fn get_by_id(&self, request_id: &str) -> ApiResponse {
        self.endpoint.get(&format!("/requests/{request_id}"), &[])
    }

    pub fn delete(&self) -> ApiResponse {
        self.endpoint.delete("/requests")
    }

    pub fn delete_by_id(&self, request_id: &str) -> ApiResponse {
        self.endpoint.delete(&format!("/requests/{request_id}"))
    }

    pub fn reset(&self) -> ApiResponse {
        self.endpoint.post("/requests/reset")
    }

    pub fn get_unmatched(&self) -> ApiResponse {
        self.endpoint.get("/requests/unmatched", &[])
    }

    pub fn get_unmatched_near_misses(&self) -> ApiResponse {
        self.endpoint.get("/requests/unmatched/near-misses", &[])
    }

    pub fn count_by_criteria(&self, criteria: &Map<String, Value>) -> ApiResponse {
        self.endpoint
            .post_json("/requests/count", &Value::Object(criteria.clone()))
    }

    pub fn find_by_criteria(&self, criteria: &Map<String, Value>) -> ApiResponse {
        self.endpoint
            .post_json("/requests/find", &Value::Object(criteria.clone()))
    }

    pub fn delete_by_criteria(&self, criteria: &Map<String, Value>) -> ApiResponse {
        self.endpoint
            .post_json("/requests/remove", &Value::Object(criteria.clone()))
    }

    pub fn delete_by_metadata(&self, metadata: &Map<String, Value>) -> ApiResponse {
        self.endpoint.post_json(
            "/requests/remove-by-metadata",
            &Value::Object(metadata.clone()),
        )
    }

    pub fn get_near_misses_by_request(&self, request: &Map<String, Value>) -> ApiResponse {
        self.endpoint
            .post_json("/near-misses/request", &Value::Object(request.clone()))
    }

    pub fn get_near_misses_by_pattern(&self, pattern: &Map<String, Value>) -> ApiResponse {
        self.endpoint
            .post_json("/near-misses/request-pattern", &Value::Object(pattern.clone()))
    }
}

pub struct RecordingsApi {
    endpoint: AdminEndpoint,
}

impl RecordingsApi {
    pub fn new(endpoint: AdminEndpoint) -> Self {
        Self { endpoint }
    }

    pub fn start(&self, settings: &Map<String, Value>) -> ApiResponse {
        self.endpoint
            .post_json("/recordings/start", &Value::Object(settings.clone()))
    }

    pub fn stop(&self) -> ApiResponse {
        self.endpoint.post("/recordings/stop")
    }

    pub fn status(&self) -> ApiResponse {
        self.endpoint.get("/recordings/status", &[])
    }

    pub fn snapshot(&self, settings: &Map<String, Value>) -> ApiResponse {
        self.endpoint
            .post_json("/recordings/snapshot", &Value::Object(settings.clone()))
    }
}

pub struct ScenariosApi {
    endpoint: AdminEndpoint,
}

impl ScenariosApi {
    pub fn new(endpoint: AdminEndpoint) -> Self {
        Self { endpoint }
    }

    pub fn get(&self) -> ApiResponse {
        self.endpoint.get("/scenarios", &[])
    }

    pub fn reset(&self) -> ApiResponse {
        self.endpoint.post("/scenarios/reset")
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::{AdminEndpoint, JournalApi, MappingsApi, ServiceApi};
    use crate::model::GlobalDelay;
    use crate::settings::Settings;

    fn endpoint_for(server: &MockServer) -> AdminEndpoint {
        AdminEndpoint::new(&Settings::generate(server.base_url(), 5, true)).expect("endpoint")
    }

    #[test]
    fn completed_exchange_records_status_and_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/__admin/mappings");
            then.status(200)
                .json_body(json!({ "mappings": [], "meta": { "total": 0 } }));
        });

        let api = MappingsApi::new(endpoint_for(&server));
        let response = api.get(None, None);

        mock.assert();
        assert_eq!(response.status_code, 200);
        assert_eq!(response.reason, "OK");
        assert_eq!(response.error, None);
        assert_eq!(
            response.data,
            Some(json!({ "mappings": [], "meta": { "total": 0 } }))
        );
        assert!(response
            .url
            .as_deref()
            .is_some_and(|url| url.ends_with("/__admin/mappings")));
    }

    #[test]
    fn empty_body_leaves_data_absent() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/__admin/reset");
            then.status(200);
        });

        let api = ServiceApi::new(endpoint_for(&server));
        let response = api.reset();

        assert_eq!(response.status_code, 200);
        assert_eq!(response.data, None);
        assert_eq!(response.error, None);
    }

    #[test]
    fn error_status_is_still_a_completed_exchange() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/__admin/mappings/missing");
            then.status(404).json_body(json!({ "errors": ["not found"] }));
        });

        let api = MappingsApi::new(endpoint_for(&server));
        let response = api.get_by_id("missing");

        assert_eq!(response.status_code, 404);
        assert_eq!(response.reason, "Not Found");
        assert_eq!(response.error, None);
        assert_eq!(response.data, Some(json!({ "errors": ["not found"] })));
    }

    #[test]
    fn query_parameters_are_forwarded_when_present() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/__admin/mappings")
                .query_param("limit", "10")
                .query_param("offset", "5");
            then.status(200).json_body(json!({ "mappings": [] }));
        });

        let api = MappingsApi::new(endpoint_for(&server));
        let response = api.get(Some(10), Some(5));

        mock.assert();
        assert_eq!(response.status_code, 200);
    }

    #[test]
    fn absent_query_parameters_are_omitted() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/__admin/requests");
            then.status(200).json_body(json!({ "requests": [] }));
        });

        let api = JournalApi::new(endpoint_for(&server));
        let response = api.get(None, None);

        mock.assert();
        assert!(response
            .url
            .as_deref()
            .is_some_and(|url| !url.contains("limit")));
    }

    #[test]
    fn json_body_is_forwarded() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/__admin/settings")
                .json_body(json!({ "fixedDelay": 500 }));
            then.status(200);
        });

        let api = ServiceApi::new(endpoint_for(&server));
        let delay = GlobalDelay::fixed(500).expect("valid delay");
        let response = api.update_settings(&delay);

        mock.assert();
        assert_eq!(response.status_code, 200);
    }

    #[test]
    fn refused_connection_yields_connection_error_message() {
        let refused = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
            let port = listener.local_addr().expect("addr").port();
            drop(listener);
            format!("http://127.0.0.1:{port}")
        };

        let endpoint =
            AdminEndpoint::new(&Settings::generate(refused, 1, true)).expect("endpoint");
        let api = ServiceApi::new(endpoint);
        let response = api.reset();

        assert_eq!(response.status_code, 0);
        assert_eq!(response.error.as_deref(), Some("A Connection error occurred."));
        assert_eq!(response.data, None);
    }

    #[test]
    fn stalled_body_read_resets_the_status_line() {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let address = listener.local_addr().expect("addr");
        let stalling = std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = [0_u8; 1024];
                let _ = stream.read(&mut request);
                let _ = stream.write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 1000\r\n\r\n");
                let _ = stream.flush();
                // Hold the connection open past the client's timeout
                // without ever sending the body.
                std::thread::sleep(std::time::Duration::from_secs(2));
            }
        });

        let endpoint = AdminEndpoint::new(&Settings::generate(format!("http://{address}"), 1, true))
            .expect("endpoint");
        let response = ServiceApi::new(endpoint).reset();
        stalling.join().expect("stalling server");

        assert_eq!(response.status_code, 0);
        assert_eq!(response.reason, "");
        assert_eq!(response.url, None);
        assert_eq!(response.data, None);
        assert!(response
            .error
            .as_deref()
            .is_some_and(|error| error.contains("timed out") || error.contains("allotted")));
    }

    #[test]
    fn undecodable_body_degrades_to_generic_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/__admin/scenarios");
            then.status(200)
                .header("content-type", "application/json")
                .body("not json at all");
        });

        let api = super::ScenariosApi::new(endpoint_for(&server));
        let response = api.get();

        assert_eq!(response.status_code, 200);
        assert_eq!(
            response.error.as_deref(),
            Some("There was an ambiguous exception that occurred while handling your request.")
        );
        assert_eq!(response.data, None);
    }
}
