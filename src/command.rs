use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::api::AdminEndpoint;
use crate::client::{
    run_for_each, JournalClient, MappingsClient, Outcome, RecordingsClient, ScenariosClient,
    ServiceClient,
};
use crate::settings::{Settings, SettingsStore};

#[derive(Debug, Clone, Parser)]
#[command(name = "wmk", version, about = "Mock API handler.")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum CliCommand {
    /// Global operations.
    Service(ServiceArgs),

    /// Operations on stub mappings.
    Mapping(MappingArgs),

    /// Logged requests and responses received by the mock service.
    Journal(JournalArgs),

    /// Stub mapping record and snapshot functions.
    Record(RecordArgs),

    /// Scenarios support modelling of stateful behaviour.
    Scenario(ScenarioArgs),

    /// App settings and configuration.
    Settings(SettingsArgs),
}

#[derive(Debug, Clone, Args)]
#[group(required = true, multiple = false)]
pub struct ServiceArgs {
    /// Set global delay: NUM -> fixed, NUM NUM -> uniform,
    /// NUM FLOAT -> log normal.
    #[arg(long, num_args = 1..=2, value_name = "NUM", allow_negative_numbers = true)]
    pub delay: Option<Vec<String>>,

    /// Reset mappings to the default state and reset the request journal.
    #[arg(long)]
    pub reset: bool,

    /// Shutdown the server. Disabled in settings by default for safety.
    #[arg(long)]
    pub stop: bool,
}

#[derive(Debug, Clone, Args)]
#[group(required = true, multiple = false)]
pub struct MappingArgs {
    /// Get mappings: no values -> all, LIMIT OFFSET -> page,
    /// one or more IDs otherwise.
    #[arg(long, num_args = 0.., value_name = "ARG")]
    pub get: Option<Vec<String>>,

    /// Find mappings matching metadata from a JSON string or file.
    #[arg(long = "get-meta", value_name = "METADATA")]
    pub get_meta: Option<String>,

    /// Create a mapping from a JSON string or file.
    #[arg(long, value_name = "MAPPING")]
    pub create: Option<String>,

    /// Delete mappings: no values -> all, one or more IDs otherwise.
    #[arg(long, num_args = 0.., value_name = "ID")]
    pub delete: Option<Vec<String>>,

    /// Delete mappings matching metadata from a JSON string or file.
    #[arg(long = "delete-meta", value_name = "METADATA")]
    pub delete_meta: Option<String>,

    /// Reset stub mappings without resetting the journal.
    #[arg(long)]
    pub reset: bool,

    /// Save all persistent stub mappings to the backing store.
    #[arg(long)]
    pub persist: bool,

    /// Update a mapping by id: ID MAPPING (JSON string or file).
    #[arg(long, num_args = 2, value_names = ["ID", "MAPPING"])]
    pub update: Option<Vec<String>>,
}

#[derive(Debug, Clone, Args)]
#[group(required = true, multiple = false)]
pub struct JournalArgs {
    /// Get requests: no values -> all, LIMIT TIMESTAMP -> page since,
    /// one or more IDs otherwise.
    #[arg(long, num_args = 0.., value_name = "ARG")]
    pub get: Option<Vec<String>>,

    /// Find requests matching criteria from a JSON string or file.
    #[arg(long = "get-criteria", value_name = "CRITERIA")]
    pub get_criteria: Option<String>,

    /// Delete requests: no values -> all, one or more IDs otherwise.
    #[arg(long, num_args = 0.., value_name = "ID")]
    pub delete: Option<Vec<String>>,

    /// Delete requests matching criteria from a JSON string or file.
    #[arg(long = "delete-criteria", value_name = "CRITERIA")]
    pub delete_criteria: Option<String>,

    /// Delete requests matching metadata from a JSON string or file.
    #[arg(long = "delete-metadata", value_name = "METADATA")]
    pub delete_metadata: Option<String>,

    /// Get logged requests that weren't matched by any stub mapping.
    #[arg(long)]
    pub unmatched: bool,

    /// Get near-misses for all unmatched requests.
    #[arg(long)]
    pub miss: bool,

    /// Get near-misses for a request from a JSON string or file.
    #[arg(long = "miss-request", value_name = "REQUEST")]
    pub miss_request: Option<String>,

    /// Get near-misses for a request pattern from a JSON string or file.
    #[arg(long = "miss-pattern", value_name = "PATTERN")]
    pub miss_pattern: Option<String>,

    /// Reset (empty) the request journal.
    #[arg(long)]
    pub reset: bool,

    /// Count requests matching criteria from a JSON string or file.
    #[arg(long, value_name = "CRITERIA")]
    pub count: Option<String>,
}

#[derive(Debug, Clone, Args)]
#[group(required = true, multiple = false)]
pub struct RecordArgs {
    /// Begin recording stub mappings with settings from a JSON string or file.
    #[arg(long, value_name = "SETTINGS")]
    pub start: Option<String>,

    /// End recording of stub mappings.
    #[arg(long)]
    pub stop: bool,

    /// Get recording status.
    #[arg(long)]
    pub status: bool,

    /// Take a snapshot recording with settings from a JSON string or file.
    #[arg(long, value_name = "SETTINGS")]
    pub snapshot: Option<String>,
}

#[derive(Debug, Clone, Args)]
#[group(required = true, multiple = false)]
pub struct ScenarioArgs {
    /// Get all scenarios.
    #[arg(long)]
    pub get: bool,

    /// Reset the state of all scenarios.
    #[arg(long)]
    pub reset: bool,
}

#[derive(Debug, Clone, Args)]
#[group(required = true, multiple = false)]
pub struct SettingsArgs {
    /// Generate new settings as HOST TIMEOUT SHUTDOWN.
    #[arg(long, num_args = 3, value_names = ["HOST", "TIMEOUT", "SHUTDOWN"])]
    pub gen: Option<Vec<String>>,

    /// Set a new host.
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Set the max API request timeout in seconds.
    #[arg(long, value_name = "TIMEOUT")]
    pub timeout: Option<u64>,

    /// Allow shutting the service down by request.
    #[arg(long = "shutdown-enable")]
    pub shutdown_enable: bool,

    /// Disallow shutting the service down by request.
    #[arg(long = "shutdown-disable")]
    pub shutdown_disable: bool,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Input(String),

    #[error("{0}")]
    Config(String),

    #[error("invalid delay settings: {0}")]
    Delay(String),

    #[error("invalid arguments: {0}")]
    Arguments(String),

    #[error("transport failure: {0}")]
    Transport(String),
}

struct Clients {
    service: ServiceClient,
    mappings: MappingsClient,
    journal: JournalClient,
    recordings: RecordingsClient,
    scenarios: ScenariosClient,
}

impl Clients {
    fn new(settings: &Settings) -> Result<Self, CliError> {
        let endpoint = AdminEndpoint::new(settings)?;
        Ok(Self {
            service: ServiceClient::new(endpoint.clone(), settings),
            mappings: MappingsClient::new(endpoint.clone()),
            journal: JournalClient::new(endpoint.clone()),
            recordings: RecordingsClient::new(endpoint.clone()),
            scenarios: ScenariosClient::new(endpoint),
        })
    }
}

/// One CLI invocation: the settings store plus the domain clients bound
/// to the loaded settings record.
pub struct App {
    pub settings: SettingsStore,
    clients: Option<Clients>,
}

impl App {
    pub fn new(settings_path: PathBuf) -> Self {
        Self {
            settings: SettingsStore::new(settings_path),
            clients: None,
        }
    }

    /// Loads the settings file and binds the domain clients to it.
    pub fn load(&mut self) -> Result<(), CliError> {
        self.settings.load()?;
        if let Some(settings) = self.settings.current() {
            self.clients = Some(Clients::new(settings)?);
        }
        Ok(())
    }

    fn clients(&self) -> Result<&Clients, CliError> {
        self.clients
            .as_ref()
            .ok_or_else(|| CliError::Config("No current settings loaded".to_owned()))
    }

    pub fn run(&mut self, command: &CliCommand) -> Result<Outcome, CliError> {
        match command {
            CliCommand::Service(args) => self.run_service(args),
            CliCommand::Mapping(args) => self.run_mappings(args),
            CliCommand::Journal(args) => self.run_journal(args),
            CliCommand::Record(args) => self.run_recordings(args),
            CliCommand::Scenario(args) => self.run_scenarios(args),
            CliCommand::Settings(args) => self.run_settings(args),
        }
    }

    fn run_service(&self, args: &ServiceArgs) -> Result<Outcome, CliError> {
        let service = &self.clients()?.service;
        if let Some(values) = &args.delay {
            return dispatch_delay(service, values);
        }
        if args.reset {
            return Ok(service.reset());
        }
        if args.stop {
            return Ok(service.shutdown());
        }
        Ok(Outcome::default())
    }

    fn run_mappings(&self, args: &MappingArgs) -> Result<Outcome, CliError> {
        let mappings = &self.clients()?.mappings;
        if let Some(values) = &args.get {
            return Ok(mappings_get(mappings, values));
        }
        if let Some(metadata) = &args.get_meta {
            return mappings.find_by_metadata(metadata);
        }
        if let Some(mapping) = &args.create {
            return mappings.create(mapping);
        }
        if let Some(values) = &args.delete {
            return Ok(if values.is_empty() {
                mappings.delete()
            } else {
                run_for_each(|id| mappings.delete_by_id(id), values)
            });
        }
        if let Some(metadata) = &args.delete_meta {
            return mappings.delete_by_metadata(metadata);
        }
        if args.reset {
            return Ok(mappings.reset());
        }
        if args.persist {
            return Ok(mappings.persist());
        }
        if let Some(values) = &args.update {
            if let [id, mapping] = values.as_slice() {
                return mappings.update_by_id(id, mapping);
            }
            return Err(CliError::Arguments(
                "expected a mapping ID followed by its JSON".to_owned(),
            ));
        }
        Ok(Outcome::default())
    }

    fn run_journal(&self, args: &JournalArgs) -> Result<Outcome, CliError> {
        let journal = &self.clients()?.journal;
        if let Some(values) = &args.get {
            return Ok(journal_get(journal, values));
        }
        if let Some(criteria) = &args.get_criteria {
            return journal.find_by_criteria(criteria);
        }
        if let Some(values) = &args.delete {
            return Ok(if values.is_empty() {
                journal.delete()
            } else {
                run_for_each(|id| journal.delete_by_id(id), values)
            });
        }
        if let Some(criteria) = &args.delete_criteria {
            return journal.delete_by_criteria(criteria);
        }
        if let Some(metadata) = &args.delete_metadata {
            return journal.delete_by_metadata(metadata);
        }
        if args.unmatched {
            return Ok(journal.get_unmatched());
        }
        if args.miss {
            return Ok(journal.get_unmatched_near_misses());
        }
        if let Some(request) = &args.miss_request {
            return journal.get_near_misses_by_request(request);
        }
        if let Some(pattern) = &args.miss_pattern {
            return journal.get_near_misses_by_pattern(pattern);
        }
        if args.reset {
            return Ok(journal.reset());
        }
        if let Some(criteria) = &args.count {
            return journal.count_by_criteria(criteria);
        }
        Ok(Outcome::default())
    }

    fn run_recordings(&self, args: &RecordArgs) -> Result<Outcome, CliError> {
        let recordings = &self.clients()?.recordings;
        if let Some(settings) = &args.start {
            return recordings.start(settings);
        }
        if args.stop {
            return Ok(recordings.stop());
        }
        if args.status {
            return Ok(recordings.status());
        }
        if let Some(settings) = &args.snapshot {
            return recordings.snapshot(settings);
        }
        Ok(Outcome::default())
    }

    fn run_scenarios(&self, args: &ScenarioArgs) -> Result<Outcome, CliError> {
        let scenarios = &self.clients()?.scenarios;
        if args.get {
            return Ok(scenarios.get());
        }
        if args.reset {
            return Ok(scenarios.reset());
        }
        Ok(Outcome::default())
    }

    fn run_settings(&mut self, args: &SettingsArgs) -> Result<Outcome, CliError> {
        if let Some(values) = &args.gen {
            let [host, timeout, shutdown] = values.as_slice() else {
                return Err(CliError::Arguments(
                    "expected HOST TIMEOUT SHUTDOWN".to_owned(),
                ));
            };
            let timeout = timeout.parse::<u64>().map_err(|_| {
                CliError::Arguments("timeout must be an integer number of seconds".to_owned())
            })?;
            let shutdown = shutdown.parse::<bool>().map_err(|_| {
                CliError::Arguments("shutdown must be 'true' or 'false'".to_owned())
            })?;
            self.settings.generate(host.clone(), timeout, shutdown)?;
        } else if let Some(host) = &args.host {
            self.settings.change_host(host.clone())?;
        } else if let Some(timeout) = args.timeout {
            self.settings.change_timeout(timeout)?;
        } else if args.shutdown_enable {
            self.settings.enable_shutdown()?;
        } else if args.shutdown_disable {
            self.settings.disable_shutdown()?;
        }
        Ok(Outcome::default())
    }
}

fn dispatch_delay(service: &ServiceClient, values: &[String]) -> Result<Outcome, CliError> {
    match values {
        [single] => {
            let delay = single.parse::<i64>().map_err(|_| {
                CliError::Arguments("expected a single integer delay value".to_owned())
            })?;
            service.set_delay_fixed(delay)
        }
        [first, second] => {
            let lower = first.parse::<i64>().map_err(|_| delay_usage())?;
            if let Ok(upper) = second.parse::<i64>() {
                service.set_delay_uniform(lower, upper)
            } else {
                let sigma = second.parse::<f64>().map_err(|_| delay_usage())?;
                service.set_delay_log_normal(lower, sigma)
            }
        }
        other => Err(CliError::Arguments(format!(
            "unexpected number of delay arguments {}, expected 1 or 2",
            other.len()
        ))),
    }
}

fn delay_usage() -> CliError {
    CliError::Arguments(
        "expected INT for fixed, INT INT for uniform or INT FLOAT for log normal delay".to_owned(),
    )
}

fn mappings_get(client: &MappingsClient, values: &[String]) -> Outcome {
    if values.is_empty() {
        return client.get(None, None);
    }
    if let [limit, offset] = values {
        if let (Ok(limit), Ok(offset)) = (limit.parse(), offset.parse()) {
            return client.get(Some(limit), Some(offset));
        }
    }
    run_for_each(|id| client.get_by_id(id), values)
}

fn journal_get(client: &JournalClient, values: &[String]) -> Outcome {
    if values.is_empty() {
        return client.get(None, None);
    }
    if let [limit, since] = values {
        if let Ok(limit) = limit.parse::<u32>() {
            if is_timestamp(since) {
                return client.get(Some(limit), Some(since.clone()));
            }
        }
    }
    run_for_each(|id| client.get_by_id(id), values)
}

const NAIVE_TIMESTAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

// Two get arguments are a LIMIT/SINCE pair only when the second one is a
// parseable timestamp; anything else is a pair of request ids.
fn is_timestamp(value: &str) -> bool {
    OffsetDateTime::parse(value, &Rfc3339).is_ok()
        || PrimitiveDateTime::parse(value, NAIVE_TIMESTAMP).is_ok()
}
