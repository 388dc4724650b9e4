use std::fmt;

use serde_json::Value;

use crate::api::{
    AdminEndpoint, ApiResponse, JournalApi, MappingsApi, RecordingsApi, ScenariosApi, ServiceApi,
};
use crate::input::resolve_json_argument;
use crate::model::GlobalDelay;
use crate::settings::Settings;
use crate::CliError;

/// Renderable payload of a domain operation. JSON payloads are printed
/// pretty, text payloads (recording status, batch aggregates) verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(value) => {
                let rendered =
                    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
                f.write_str(&rendered)
            }
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// What every domain operation reduces to: an optional payload and an
/// optional error line. The payload is passed through independently of
/// the error, so callers can still inspect the body of a response that
/// arrived with an unexpected status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub data: Option<Payload>,
    pub error: Option<String>,
}

impl Outcome {
    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }
}

/// Accepts the response when its status is in `accepted`; transport
/// failures are surfaced verbatim.
fn reduce_expected(response: ApiResponse, accepted: &[u16]) -> Outcome {
    let data = response.data.map(Payload::Json);
    if let Some(error) = response.error {
        return Outcome {
            data,
            error: Some(error),
        };
    }
    let error = if accepted.contains(&response.status_code) {
        None
    } else {
        Some(format!(
            "Expected one of {} HTTP codes, got {}",
            format_accepted(accepted),
            response.status_code
        ))
    };
    Outcome { data, error }
}

// Rendered as "(200,)" or "(200, 201)" to match the service's error text.
fn format_accepted(accepted: &[u16]) -> String {
    match accepted {
        [single] => format!("({single},)"),
        _ => {
            let joined = accepted
                .iter()
                .map(u16::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            format!("({joined})")
        }
    }
}

/// Reduction for single-resource-by-id lookups, which tell "not found"
/// apart from other failures.
fn reduce_by_id(response: ApiResponse, not_found: &str) -> Outcome {
    let data = response.data.map(Payload::Json);
    if let Some(error) = response.error {
        return Outcome {
            data,
            error: Some(error),
        };
    }
    let url = response.url.as_deref().unwrap_or_default();
    let error = match response.status_code {
        200 => None,
        404 => Some(format!("{not_found} {url}")),
        status => Some(format!(
            "Unexpected response status code {status} {} from {url}",
            response.reason
        )),
    };
    Outcome { data, error }
}

/// Runs a per-id operation over every id in order, never stopping at a
/// failure. Payloads and errors are aggregated separately; each error
/// line is prefixed with the id that produced it.
pub fn run_for_each<F>(operation: F, ids: &[String]) -> Outcome
where
    F: Fn(&str) -> Outcome,
{
    let mut output = String::new();
    let mut errors = String::new();
    for id in ids {
        let result = operation(id);
        if let Some(payload) = result.data {
            output.push_str(&payload.to_string());
            output.push('\n');
        }
        if let Some(error) = result.error {
            errors.push_str(id);
            errors.push_str(": ");
            errors.push_str(&error);
            errors.push('\n');
        }
    }
    Outcome {
        data: (!output.is_empty()).then(|| Payload::Text(output.trim_end().to_owned())),
        error: (!errors.is_empty()).then(|| errors.trim_end().to_owned()),
    }
}

const OK: &[u16] = &[200];
const CREATED: &[u16] = &[201];
const NO_MAPPING: &str = "No mapping with such id on service";
const NO_REQUEST: &str = "No request with such id in Journal service";

pub struct ServiceClient {
    api: ServiceApi,
    shutdown_disabled: bool,
}

impl ServiceClient {
    pub fn new(endpoint: AdminEndpoint, settings: &Settings) -> Self {
        Self {
            api: ServiceApi::new(endpoint),
            shutdown_disabled: settings.shutdown_disabled,
        }
    }

    pub fn set_delay_fixed(&self, milliseconds: i64) -> Result<Outcome, CliError> {
        let delay = GlobalDelay::fixed(milliseconds)?;
        Ok(reduce_expected(self.api.update_settings(&delay), OK))
    }

    pub fn set_delay_uniform(&self, lower: i64, upper: i64) -> Result<Outcome, CliError> {
        let delay = GlobalDelay::uniform(lower, upper)?;
        Ok(reduce_expected(self.api.update_settings(&delay), OK))
    }

    pub fn set_delay_log_normal(&self, median: i64, sigma: f64) -> Result<Outcome, CliError> {
        let delay = GlobalDelay::log_normal(median, sigma)?;
        Ok(reduce_expected(self.api.update_settings(&delay), OK))
    }

    pub fn reset(&self) -> Outcome {
        reduce_expected(self.api.reset(), OK)
    }

    /// Refused locally while the shutdown safety flag is set; no request
    /// reaches the server in that case.
    pub fn shutdown(&self) -> Outcome {
        if self.shutdown_disabled {
            return Outcome {
                data: None,
                error: Some(
                    "Shutdown is disabled in settings, enable it with 'settings --shutdown-enable'"
                        .to_owned(),
                ),
            };
        }
        reduce_expected(self.api.shutdown(), OK)
    }
}

pub struct MappingsClient {
    api: MappingsApi,
}

impl MappingsClient {
    pub fn new(endpoint: AdminEndpoint) -> Self {
        Self {
            api: MappingsApi::new(endpoint),
        }
    }

    pub fn get(&self, limit: Option<u32>, offset: Option<u32>) -> Outcome {
        reduce_expected(self.api.get(limit, offset), OK)
    }

    pub fn create(&self, mapping: &str) -> Result<Outcome, CliError> {
        let mapping = resolve_json_argument(mapping)?;
        Ok(reduce_expected(self.api.create(&mapping), CREATED))
    }

    pub fn delete(&self) -> Outcome {
        reduce_expected(self.api.delete(), OK)
    }

    pub fn reset(&self) -> Outcome {
        reduce_expected(self.api.reset(), OK)
    }

    pub fn persist(&self) -> Outcome {
        reduce_expected(self.api.persist(), OK)
    }

    pub fn find_by_metadata(&self, metadata: &str) -> Result<Outcome, CliError> {
        let metadata = resolve_json_argument(metadata)?;
        Ok(reduce_expected(self.api.find_by_metadata(&metadata), OK))
    }

    pub fn delete_by_metadata(&self, metadata: &str) -> Result<Outcome, CliError> {
        let metadata = resolve_json_argument(metadata)?;
        Ok(reduce_expected(self.api.delete_by_metadata(&metadata), OK))
    }

    pub fn get_by_id(&self, mapping_id: &str) -> Outcome {
        reduce_by_id(self.api.get_by_id(mapping_id), NO_MAPPING)
    }

    pub fn update_by_id(&self, mapping_id: &str, mapping: &str) -> Result<Outcome, CliError> {
        let mapping = resolve_json_argument(mapping)?;
        Ok(reduce_by_id(
            self.api.update_by_id(mapping_id, &mapping),
            NO_MAPPING,
        ))
    }

    pub fn delete_by_id(&self, mapping_id: &str) -> Outcome {
        reduce_expected(self.api.delete_by_id(mapping_id), OK)
    }
}

pub struct JournalClient {
    api: JournalApi,
}

impl JournalClient {
    pub fn new(endpoint: AdminEndpoint) -> Self {
        Self {
            api: JournalApi::new(endpoint),
        }
    }

    pub fn get(&self, limit: Option<u32>, since: Option<String>) -> Outcome {
        reduce_expected(self.api.get(limit, since), OK)
    }

    pub fn get_by_id(&self, request_id: &str) -> Outcome {
        reduce_by_id(self.api.get_by_id(request_id), NO_REQUEST)
    }

    pub fn delete(&self) -> Outcome {
        reduce_expected(self.api.delete(), OK)
    }

    pub fn delete_by_id(&self, request_id: &str) -> Outcome {
        reduce_expected(self.api.delete_by_id(request_id), OK)
    }

    pub fn reset(&self) -> Outcome {
        reduce_expected(self.api.reset(), OK)
    }

    pub fn get_unmatched(&self) -> Outcome {
        reduce_expected(self.api.get_unmatched(), OK)
    }

    pub fn get_unmatched_near_misses(&self) -> Outcome {
        reduce_expected(self.api.get_unmatched_near_misses(), OK)
    }

    /// Successful counts reduce to the bare integer from the response's
    /// `count` field.
    pub fn count_by_criteria(&self, criteria: &str) -> Result<Outcome, CliError> {
        let criteria = resolve_json_argument(criteria)?;
        let mut outcome = reduce_expected(self.api.count_by_criteria(&criteria), OK);
        if !outcome.is_err() {
            outcome.data = match outcome.data.take() {
                Some(Payload::Json(value)) => value.get("count").cloned().map(Payload::Json),
                other => other,
            };
        }
        Ok(outcome)
    }

    pub fn find_by_criteria(&self, criteria: &str) -> Result<Outcome, CliError> {
        let criteria = resolve_json_argument(criteria)?;
        Ok(reduce_expected(self.api.find_by_criteria(&criteria), OK))
    }

    pub fn delete_by_criteria(&self, criteria: &str) -> Result<Outcome, CliError> {
        let criteria = resolve_json_argument(criteria)?;
        Ok(reduce_expected(self.api.delete_by_criteria(&criteria), OK))
    }

    pub fn delete_by_metadata(&self, metadata: &str) -> Result<Outcome, CliError> {
        let metadata = resolve_json_argument(metadata)?;
        Ok(reduce_expected(self.api.delete_by_metadata(&metadata), OK))
    }

    pub fn get_near_misses_by_request(&self, request: &str) -> Result<Outcome, CliError> {
        let request = resolve_json_argument(request)?;
        Ok(reduce_expected(
            self.api.get_near_misses_by_request(&request),
            OK,
        ))
    }

    pub fn get_near_misses_by_pattern(&self, pattern: &str) -> Result<Outcome, CliError> {
        let pattern = resolve_json_argument(pattern)?;
        Ok(reduce_expected(
            self.api.get_near_misses_by_pattern(&pattern),
            OK,
        ))
    }
}

pub struct RecordingsClient {
    api: RecordingsApi,
}

impl RecordingsClient {
    pub fn new(endpoint: AdminEndpoint) -> Self {
        Self {
            api: RecordingsApi::new(endpoint),
        }
    }

    pub fn start(&self, settings: &str) -> Result<Outcome, CliError> {
        let settings = resolve_json_argument(settings)?;
        Ok(reduce_expected(self.api.start(&settings), OK))
    }

    pub fn stop(&self) -> Outcome {
        reduce_expected(self.api.stop(), OK)
    }

    /// A successful status reduces to the bare value of the `status`
    /// field, rendered without JSON quoting.
    pub fn status(&self) -> Outcome {
        let mut outcome = reduce_expected(self.api.status(), OK);
        if !outcome.is_err() {
            if let Some(Payload::Json(value)) = outcome.data.take() {
                outcome.data = value
                    .get("status")
                    .and_then(Value::as_str)
                    .map(|status| Payload::Text(status.to_owned()));
            }
        }
        outcome
    }

    pub fn snapshot(&self, settings: &str) -> Result<Outcome, CliError> {
        let settings = resolve_json_argument(settings)?;
        Ok(reduce_expected(self.api.snapshot(&settings), OK))
    }
}

pub struct ScenariosClient {
    api: ScenariosApi,
}

impl ScenariosClient {
    pub fn new(endpoint: AdminEndpoint) -> Self {
        Self {
            api: ScenariosApi::new(endpoint),
        }
    }

    pub fn get(&self) -> Outcome {
        reduce_expected(self.api.get(), OK)
    }

    pub fn reset(&self) -> Outcome {
        reduce_expected(self.api.reset(), OK)
    }
}
