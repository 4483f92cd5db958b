//! Scrolling alert lane.
//!
//! The lane text moves left by a fixed step on every animation tick. Once it
//! has left the lane completely, the offset resets to the right edge and the
//! text is re-read, so alert changes show up at the next cycle. With no
//! alerts, the lane scrolls the sync status line instead.

use std::{sync::Arc, time::Duration};

use log::info;
use tokio::{
    sync::watch,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{snapshot::SnapshotStore, status::SyncStatus};

/// Gap between consecutive alerts in the lane.
pub const ALERT_SEPARATOR: &str = "     ";

/// Pixels moved per animation tick.
pub const DEFAULT_STEP: i32 = 2;

/// Width of the lane in pixels.
pub const DEFAULT_LANE_WIDTH: i32 = 800;

/// Width of one character cell in pixels.
pub const DEFAULT_GLYPH_WIDTH: i32 = 8;

/// What the ticker reads at the start of each scroll cycle.
pub trait LaneSource {
    fn alerts(&self) -> Vec<String>;

    fn status_line(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerState {
    /// Showing the status line (no alerts).
    Idle,
    /// Showing alerts.
    Scrolling,
}

#[derive(Debug, Clone)]
pub struct AlertTicker {
    lane_width: i32,
    glyph_width: i32,
    step: i32,
    offset: i32,
    text: String,
    state: TickerState,
    loaded: bool,
}

impl Default for AlertTicker {
    fn default() -> Self {
        Self::new(DEFAULT_LANE_WIDTH, DEFAULT_GLYPH_WIDTH, DEFAULT_STEP)
    }
}

impl AlertTicker {
    pub fn new(lane_width: i32, glyph_width: i32, step: i32) -> Self {
        Self {
            lane_width: lane_width.max(1),
            glyph_width: glyph_width.max(1),
            step: step.max(1),
            offset: lane_width.max(1),
            text: String::new(),
            state: TickerState::Idle,
            loaded: false,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn state(&self) -> TickerState {
        self.state
    }

    /// Horizontal position of the text's left edge, in pixels.
    pub fn offset(&self) -> i32 {
        self.offset
    }

    fn text_width(&self) -> i32 {
        self.text.chars().count() as i32 * self.glyph_width
    }

    /// Advance one animation step.
    pub fn tick(&mut self, source: &dyn LaneSource) {
        if !self.loaded {
            self.reload(source);
            return;
        }

        self.offset -= self.step;
        if self.offset + self.text_width() <= 0 {
            self.reload(source);
        }
    }

    fn reload(&mut self, source: &dyn LaneSource) {
        let alerts = source.alerts();
        if alerts.is_empty() {
            self.text = source.status_line();
            self.state = TickerState::Idle;
        } else {
            self.text = alerts.join(ALERT_SEPARATOR);
            self.state = TickerState::Scrolling;
        }
        self.offset = self.lane_width;
        self.loaded = true;
    }

    /// The visible part of the lane as `columns` character cells.
    pub fn window(&self, columns: usize) -> String {
        let start = self.offset.div_euclid(self.glyph_width);
        let chars: Vec<char> = self.text.chars().collect();

        (0..columns as i32)
            .map(|col| {
                let idx = col - start;
                if idx >= 0 {
                    chars.get(idx as usize).copied().unwrap_or(' ')
                } else {
                    ' '
                }
            })
            .collect()
    }

    /// Columns the lane spans in character cells.
    pub fn columns(&self) -> usize {
        (self.lane_width / self.glyph_width) as usize
    }
}

/// Reads alerts from the snapshot store and the status channel.
#[derive(Debug, Clone)]
pub struct DashboardFeed {
    store: Arc<SnapshotStore>,
    status: watch::Receiver<SyncStatus>,
}

impl DashboardFeed {
    pub fn new(store: Arc<SnapshotStore>, status: watch::Receiver<SyncStatus>) -> Self {
        Self { store, status }
    }
}

impl LaneSource for DashboardFeed {
    fn alerts(&self) -> Vec<String> {
        self.store.current().map(|s| s.alerts.clone()).unwrap_or_default()
    }

    fn status_line(&self) -> String {
        self.status.borrow().to_string()
    }
}

/// Animate `ticker` every `interval` until cancelled, handing each step to `draw`.
///
/// Only reads shared state; it never waits on the network.
pub async fn run_ticker<S, F>(
    mut ticker: AlertTicker,
    source: S,
    interval: Duration,
    mut draw: F,
    cancel: CancellationToken,
) where
    S: LaneSource,
    F: FnMut(&AlertTicker),
{
    let mut clock = time::interval(interval);
    clock.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = clock.tick() => {
                ticker.tick(&source);
                draw(&ticker);
            }
            _ = cancel.cancelled() => {
                info!("Ticker shutting down");
                break;
            }
        }
    }
}
