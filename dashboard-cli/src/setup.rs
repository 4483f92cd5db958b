//! Interactive setup dialog.

use anyhow::Context;
use dashboard_core::{
    AppConfig, RefreshScheduler,
    setup::{self as core_setup, SetupError, SetupRequest},
};
use inquire::{InquireError, Password, PasswordDisplayMode, Text};
use log::{info, warn};

use crate::cli::App;

/// Ask for the API key and ZIP code; `None` if the user backs out.
///
/// A blank key keeps `previous.api_key`.
fn prompt(previous: Option<&SetupRequest>) -> anyhow::Result<Option<SetupRequest>> {
    let has_key = previous.is_some_and(|p| !p.api_key.is_empty());
    let help = if has_key { "Leave blank to keep the current key" } else { "From openweathermap.org" };

    let api_key = Password::new("OpenWeather API key:")
        .without_confirmation()
        .with_display_mode(PasswordDisplayMode::Masked)
        .with_help_message(help)
        .prompt();
    let api_key = match api_key {
        Ok(key) if key.trim().is_empty() && has_key => {
            previous.map(|p| p.api_key.clone()).unwrap_or_default()
        }
        Ok(key) => key,
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => return Ok(None),
        Err(err) => return Err(err).context("Failed to read API key"),
    };

    let initial_zip = previous.map(|p| p.zip_code.as_str()).unwrap_or_default();
    let zip_code = Text::new("ZIP code:")
        .with_initial_value(initial_zip)
        .with_help_message("5-digit US ZIP code")
        .prompt();
    let zip_code = match zip_code {
        Ok(zip) => zip,
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => return Ok(None),
        Err(err) => return Err(err).context("Failed to read ZIP code"),
    };

    Ok(Some(SetupRequest { api_key, zip_code }))
}

/// Run the setup dialog until a configuration is saved or the user cancels.
///
/// With a scheduler, a saved configuration also repoints it and starts an
/// immediate sync.
pub async fn run(app: &App, scheduler: Option<&RefreshScheduler>) -> anyhow::Result<Option<AppConfig>> {
    let mut previous = app.saved_config()?.map(|config| SetupRequest {
        api_key: config.api_key,
        zip_code: config.zip_code,
    });

    loop {
        let defaults = previous.clone();
        let request = tokio::task::spawn_blocking(move || prompt(defaults.as_ref()))
            .await
            .context("Setup prompt task failed")??;
        let Some(request) = request else {
            info!("Setup cancelled");
            return Ok(None);
        };

        let geocoder = &app.geocoder;
        let result = match scheduler {
            Some(scheduler) => {
                core_setup::save_and_sync(app.store.as_ref(), geocoder, scheduler, &request).await
            }
            None => core_setup::save_config(app.store.as_ref(), geocoder, &request).await,
        };

        match result {
            Ok(config) => return Ok(Some(config)),
            Err(err) if err.is_correctable() => {
                warn!("Setup rejected: {err}");
                eprintln!("{}", describe(&err));
                previous = Some(request);
            }
            Err(err) => return Err(err.into()),
        }
    }
}

fn describe(err: &SetupError) -> String {
    match err {
        SetupError::Geocode(dashboard_core::GeocodeError::NotFound(zip)) => {
            format!("Could not find ZIP code {zip}. Please check it and try again.")
        }
        other => format!("{other}. Please try again."),
    }
}
