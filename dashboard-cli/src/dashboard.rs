//! The running dashboard: scheduler, frame writer and terminal ticker.

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use dashboard_core::{
    RefreshScheduler, SnapshotStore, provider,
    render::{self, Dashboard},
    ticker::{AlertTicker, DashboardFeed, run_ticker},
};
use log::{error, info};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    cli::App,
    console::{Console, ConsoleCommand, HELP},
    setup,
};

enum Exit {
    Shutdown,
    Configure,
}

pub async fn run(app: &App) -> anyhow::Result<()> {
    let config = match app.saved_config()? {
        Some(config) => config,
        None => {
            println!("No configuration found; let's set one up.");
            match setup::run(app, None).await? {
                Some(config) => config,
                None => return Ok(()),
            }
        }
    };

    let client = provider::client_from_settings(&app.settings)?;
    let snapshots = Arc::new(SnapshotStore::new());
    let scheduler =
        RefreshScheduler::new(client, Arc::clone(&snapshots), app.settings.poll_interval(), Some(&config));

    let frame_path = app.settings.frame_path()?;
    let mut dashboard = Dashboard::new(app.renderer()?, config.location_label());
    write_frame(&dashboard, &frame_path);

    println!("{} - frames are written to {}", config.location_label(), frame_path.display());
    println!("{HELP}. Ctrl-C also quits.");

    let mut console = Console::spawn();

    loop {
        let cancel = CancellationToken::new();
        let poller = tokio::spawn({
            let scheduler = scheduler.clone();
            let cancel = cancel.clone();
            async move { scheduler.run(cancel).await }
        });
        let ticker = spawn_ticker(app, &scheduler, cancel.clone());
        let renderer = spawn_renderer(dashboard, Arc::clone(&snapshots), frame_path.clone(), cancel.clone());

        let exit = wait_for_exit(&scheduler, &mut console).await?;

        cancel.cancel();
        let _ = poller.await;
        let _ = ticker.await;
        dashboard = renderer.await.context("Frame writer task failed")?;
        println!();

        match exit {
            Exit::Shutdown => {
                info!("Dashboard shutting down");
                return Ok(());
            }
            Exit::Configure => {
                let saved = setup::run(app, Some(&scheduler)).await;
                console.resume();
                if let Some(config) = saved? {
                    dashboard.set_location(config.location_label());
                    write_frame(&dashboard, &frame_path);
                    println!("Now showing {}", config.location_label());
                }
            }
        }
    }
}

/// Handle console input and status changes until the tasks have to stop.
async fn wait_for_exit(scheduler: &RefreshScheduler, console: &mut Console) -> anyhow::Result<Exit> {
    let mut status = scheduler.subscribe_status();
    let mut setup_pending = false;

    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res.context("Failed to listen for Ctrl-C")?;
                return Ok(Exit::Shutdown);
            }
            res = status.wait_for(|s| s.needs_setup()), if !setup_pending => {
                if res.is_err() {
                    return Ok(Exit::Shutdown);
                }
                setup_pending = true;
                let message = scheduler.status().to_string();
                if console.is_open() {
                    println!("\n{message}. Press Enter to update the configuration.");
                } else {
                    error!("{message}; no console attached, run `weather-dashboard configure` and restart");
                }
            }
            line = console.next_line(), if console.is_open() => {
                let Some(line) = line else {
                    info!("Console closed; dashboard keeps running");
                    continue;
                };
                match ConsoleCommand::parse(&line, setup_pending) {
                    ConsoleCommand::Configure => return Ok(Exit::Configure),
                    ConsoleCommand::Quit => return Ok(Exit::Shutdown),
                    ConsoleCommand::Sync => match scheduler.sync_now() {
                        Ok(_) => info!("Manual sync started"),
                        Err(outcome) => info!("Manual sync not started: {outcome:?}"),
                    },
                    ConsoleCommand::Unknown => println!("\n{HELP}"),
                }
                console.resume();
            }
        }
    }
}

fn spawn_ticker(app: &App, scheduler: &RefreshScheduler, cancel: CancellationToken) -> JoinHandle<()> {
    let feed = DashboardFeed::new(Arc::clone(scheduler.store()), scheduler.subscribe_status());
    let interval = app.settings.ticker_interval();

    tokio::spawn(run_ticker(
        AlertTicker::default(),
        feed,
        interval,
        |ticker: &AlertTicker| {
            let mut out = io::stdout().lock();
            let _ = write!(out, "\r{}", ticker.window(ticker.columns()));
            let _ = out.flush();
        },
        cancel,
    ))
}

/// Re-render on every snapshot change; hands the dashboard back when cancelled.
fn spawn_renderer(
    mut dashboard: Dashboard,
    snapshots: Arc<SnapshotStore>,
    frame_path: PathBuf,
    cancel: CancellationToken,
) -> JoinHandle<Dashboard> {
    tokio::spawn(async move {
        let mut changes = snapshots.subscribe();
        loop {
            let snapshot = snapshots.current();
            tokio::task::block_in_place(|| {
                if dashboard.update(snapshot) {
                    write_frame(&dashboard, &frame_path);
                }
            });

            tokio::select! {
                res = changes.changed() => {
                    if res.is_err() {
                        break;
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
        dashboard
    })
}

fn write_frame(dashboard: &Dashboard, path: &Path) {
    if let Err(err) = render::write_png(&dashboard.frame().image, path) {
        error!("{err:#}");
    }
}
