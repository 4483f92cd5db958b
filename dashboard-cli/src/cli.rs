use std::{path::PathBuf, str::FromStr, sync::Arc};

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use dashboard_core::{
    AppConfig, RefreshScheduler, Settings, SnapshotStore,
    assets::AssetCatalog,
    geocoder::ZippopotamGeocoder,
    logging, provider,
    render::{self, Renderer},
    scheduler::Trigger,
    store::{ConfigStore, SqliteConfigStore},
};
use log::info;

use crate::{dashboard, output, setup};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-dashboard", version, about = "Weather dashboard with a scrolling alert ticker")]
pub struct Cli {
    /// Settings file to use instead of the platform default.
    #[arg(long, global = true, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Enter the API key and ZIP code, then sync right away.
    Configure,

    /// Run the dashboard until Ctrl-C (the default).
    Run,

    /// Fetch once and print the current weather.
    Show {
        /// Also render the dashboard frame to this PNG file.
        #[arg(long, value_name = "PNG")]
        frame: Option<PathBuf>,

        /// Draw the forecast tooltip under this pointer position, e.g. `90,360`.
        #[arg(long, value_name = "X,Y", requires = "frame")]
        hover: Option<Point>,
    },
}

/// Pointer position on the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl FromStr for Point {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s.split_once(',').ok_or_else(|| format!("expected X,Y but got '{s}'"))?;
        let parse = |v: &str| v.trim().parse::<u32>().map_err(|e| format!("invalid coordinate '{v}': {e}"));
        Ok(Point { x: parse(x)?, y: parse(y)? })
    }
}

/// Everything the commands share.
pub struct App {
    pub settings: Settings,
    pub store: Arc<dyn ConfigStore>,
    pub geocoder: ZippopotamGeocoder,
}

impl App {
    fn open(settings: Settings) -> anyhow::Result<Self> {
        let store = SqliteConfigStore::open(&settings.database_path()?)?;
        let geocoder = ZippopotamGeocoder::new(settings.request_timeout())?;
        Ok(Self { settings, store: Arc::new(store), geocoder })
    }

    pub fn saved_config(&self) -> anyhow::Result<Option<AppConfig>> {
        self.store.get().context("Failed to read saved configuration")
    }

    pub fn renderer(&self) -> anyhow::Result<Renderer> {
        Ok(Renderer::new(AssetCatalog::new(self.settings.asset_dir()?)))
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let settings = match &self.settings {
            Some(path) => Settings::load_from(path)?,
            None => Settings::load()?,
        };
        logging::init(&settings.log_path()?);
        info!("weather-dashboard {} starting", env!("CARGO_PKG_VERSION"));

        let app = App::open(settings)?;

        match self.command.unwrap_or(Command::Run) {
            Command::Configure => configure(&app).await,
            Command::Run => dashboard::run(&app).await,
            Command::Show { frame, hover } => show(&app, frame, hover).await,
        }
    }
}

async fn configure(app: &App) -> anyhow::Result<()> {
    let Some(config) = setup::run(app, None).await? else {
        println!("Setup cancelled; nothing was changed.");
        return Ok(());
    };
    println!("Saved location: {} ({})", config.location_label(), config.zip_code);

    let client = provider::client_from_settings(&app.settings)?;
    let scheduler = RefreshScheduler::new(
        client,
        Arc::new(SnapshotStore::new()),
        app.settings.poll_interval(),
        Some(&config),
    );
    scheduler.refresh(Trigger::Manual).await;
    println!("{}", scheduler.status());

    Ok(())
}

async fn show(app: &App, frame_path: Option<PathBuf>, hover: Option<Point>) -> anyhow::Result<()> {
    let config = app
        .saved_config()?
        .ok_or_else(|| anyhow!("No configuration saved yet; run `weather-dashboard configure` first"))?;

    let client = provider::client_from_settings(&app.settings)?;
    let snapshot = client
        .fetch(&config.fetch_target())
        .await
        .with_context(|| format!("Failed to fetch weather for {}", config.location_label()))?;

    print!("{}", output::summary(&config.location_label(), &snapshot));

    if let Some(path) = frame_path {
        let frame = app.renderer()?.render(&config.location_label(), Some(&snapshot));
        let image = match hover {
            Some(Point { x, y }) => frame.with_tooltip(x, y).unwrap_or_else(|| {
                println!("No forecast box at {x},{y}; writing the frame without a tooltip");
                frame.image.clone()
            }),
            None => frame.image,
        };
        render::write_png(&image, &path)?;
        println!("Frame written to {}", path.display());
    }

    Ok(())
}
