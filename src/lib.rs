mod api;
mod client;
mod command;
mod input;
mod model;
mod settings;

pub use api::{AdminEndpoint, ApiResponse};
pub use client::{
    run_for_each, JournalClient, MappingsClient, Outcome, Payload, RecordingsClient,
    ScenariosClient, ServiceClient,
};
pub use command::{
    App, CliArgs, CliCommand, CliError, JournalArgs, MappingArgs, RecordArgs, ScenarioArgs,
    ServiceArgs, SettingsArgs,
};
pub use input::resolve_json_argument;
pub use model::GlobalDelay;
pub use settings::{config_path, Settings, SettingsStore};
