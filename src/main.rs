use std::fs;
use std::process::ExitCode;

use clap::Parser;
use wmk_cli::{config_path, App, CliArgs, CliCommand, Outcome};

fn main() -> ExitCode {
    let outcome = match run() {
        Ok(outcome) => outcome,
        Err(error) => {
            eprintln!("wmk failed: {error}");
            return ExitCode::from(1);
        }
    };

    if let Some(error) = &outcome.error {
        eprintln!("{error}");
    }
    if let Some(data) = &outcome.data {
        println!("{data}");
    }

    if outcome.error.is_some() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

fn run() -> Result<Outcome, String> {
    let args = CliArgs::parse();

    let path = config_path().map_err(|error| error.to_string())?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|error| format!("unable to create {}: {error}", parent.display()))?;
    }

    let mut app = App::new(path);
    let loaded = app.load();
    // Settings commands still run against a broken or absent file, so a
    // configuration can be regenerated; everything else needs one.
    if !matches!(args.command, CliCommand::Settings(_)) {
        loaded.map_err(|error| error.to_string())?;
    }

    app.run(&args.command).map_err(|error| error.to_string())
}
