//! Frame compositor.
//!
//! Every frame is built on a fresh canvas: background, translucent panels,
//! icons, then text. Identical input therefore produces identical pixels.

use std::{collections::HashMap, convert::Infallible, path::{Path, PathBuf}, sync::Arc};

use chrono::{DateTime, FixedOffset};
use embedded_graphics::{
    Drawable, Pixel as EgPixel,
    draw_target::DrawTarget,
    geometry::{OriginDimensions, Point, Size},
    mono_font::{MonoFont, MonoTextStyle},
    pixelcolor::{Rgb888, RgbColor},
    text::{Baseline, Text},
};
use image::{Pixel, Rgba, RgbaImage, imageops::{self, FilterType}};
use log::{debug, warn};
use profont::{PROFONT_10_POINT, PROFONT_12_POINT, PROFONT_14_POINT, PROFONT_18_POINT, PROFONT_24_POINT};

use crate::{
    assets::{AssetCatalog, AssetPair},
    model::{DailyForecast, FORECAST_DAYS, WeatherSnapshot},
};

pub const FRAME_WIDTH: u32 = 800;
pub const FRAME_HEIGHT: u32 = 480;

const FALLBACK_BACKGROUND: Rgba<u8> = Rgba([24, 28, 38, 255]);
const GLASS: Rgba<u8> = Rgba([0, 0, 0, 60]);
const GLASS_EDGE: Rgba<u8> = Rgba([255, 255, 255, 30]);
const BOX_EDGE: Rgba<u8> = Rgba([255, 255, 255, 40]);
const DETAIL_FILL: Rgba<u8> = Rgba([0, 0, 0, 175]);
const DETAIL_EDGE: Rgba<u8> = Rgba([255, 255, 255, 20]);
const TOOLTIP_FILL: Rgba<u8> = Rgba([0x22, 0x22, 0x22, 255]);
const TOOLTIP_EDGE: Rgba<u8> = Rgba([255, 255, 255, 255]);

const WHITE: Rgb888 = Rgb888::WHITE;
const HUMIDITY_GREEN: Rgb888 = Rgb888::new(0x48, 0xff, 0x00);

const BOX_LEFT: u32 = 10;
const BOX_TOP: u32 = 305;
const BOX_PITCH: u32 = 158;
const BOX_WIDTH: u32 = 152;
const BOX_HEIGHT: u32 = 137;

const TEMP_SCALE: u32 = 3;
const DETAIL_LINE_HEIGHT: i32 = 26;

/// Inclusive pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl Bounds {
    pub const fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        (self.x0..=self.x1).contains(&x) && (self.y0..=self.y1).contains(&y)
    }
}

/// Hover region of one forecast box.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastBox {
    pub bounds: Bounds,
    pub tooltip: String,
}

/// One composited dashboard frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbaImage,
    pub boxes: Vec<ForecastBox>,
}

impl Frame {
    /// Tooltip text for the forecast box under the pointer, if any.
    pub fn tooltip_at(&self, x: u32, y: u32) -> Option<&str> {
        self.boxes
            .iter()
            .find(|b| b.bounds.contains(x, y))
            .map(|b| b.tooltip.as_str())
    }

    /// Copy of the frame with the hover tooltip drawn near the pointer.
    pub fn with_tooltip(&self, x: u32, y: u32) -> Option<RgbaImage> {
        let text = self.tooltip_at(x, y)?;
        let mut image = self.image.clone();

        let font = &PROFONT_10_POINT;
        let lines: Vec<&str> = text.lines().collect();
        let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) as u32;
        let width = longest * glyph_advance(font) + 16;
        let height = lines.len() as u32 * line_height(font) + 10;

        let left = x.min(FRAME_WIDTH.saturating_sub(width + 1));
        let top = y.saturating_sub(80).min(FRAME_HEIGHT.saturating_sub(height + 1));
        let bounds = Bounds::new(left, top, left + width, top + height);

        fill_rect(&mut image, bounds, TOOLTIP_FILL);
        outline_rect(&mut image, bounds, TOOLTIP_EDGE);
        for (i, line) in lines.iter().enumerate() {
            let y = top as i32 + 5 + (i as u32 * line_height(font)) as i32;
            draw_text(&mut image, line, left as i32 + 8, y, font, WHITE);
        }

        Some(image)
    }
}

/// Composites snapshots into frames, caching decoded assets.
#[derive(Debug)]
pub struct Renderer {
    assets: AssetCatalog,
    images: HashMap<PathBuf, Option<RgbaImage>>,
    backgrounds: HashMap<PathBuf, Option<RgbaImage>>,
}

impl Renderer {
    pub fn new(assets: AssetCatalog) -> Self {
        Self { assets, images: HashMap::new(), backgrounds: HashMap::new() }
    }

    /// Assets for the snapshot's current conditions.
    pub fn select_assets(&self, snapshot: &WeatherSnapshot) -> AssetPair {
        self.assets.lookup(snapshot.current.key())
    }

    /// Build a frame; `None` renders the loading placeholder.
    pub fn render(&mut self, location: &str, snapshot: Option<&WeatherSnapshot>) -> Frame {
        match snapshot {
            Some(snapshot) => self.render_snapshot(location, snapshot),
            None => self.render_placeholder(location),
        }
    }

    fn render_placeholder(&mut self, location: &str) -> Frame {
        let pair = self.assets.default_pair();
        let mut image = self.background(&pair.background);
        draw_panels(&mut image);

        draw_text(&mut image, location, 30, 60, &PROFONT_24_POINT, WHITE);
        draw_text(&mut image, "Loading weather...", 30, 215, &PROFONT_18_POINT, WHITE);

        Frame { image, boxes: Vec::new() }
    }

    fn render_snapshot(&mut self, location: &str, snapshot: &WeatherSnapshot) -> Frame {
        let pair = self.select_assets(snapshot);
        let mut image = self.background(&pair.background);
        draw_panels(&mut image);

        let current = &snapshot.current;
        let units = snapshot.units;
        let location = if location.is_empty() { snapshot.timezone_label() } else { location.to_string() };

        draw_text(&mut image, &location, 30, 60, &PROFONT_24_POINT, WHITE);
        draw_scaled_text(&mut image, &format!("{:.0}°", current.temperature), 25, 100, TEMP_SCALE);
        draw_text(&mut image, &current.description, 30, 215, &PROFONT_18_POINT, WHITE);
        draw_text(
            &mut image,
            &snapshot.fetched_at.format("%m/%d").to_string(),
            30,
            240,
            &PROFONT_18_POINT,
            WHITE,
        );

        if let Some(icon) = self.image(&pair.icon) {
            imageops::overlay(&mut image, icon, 280, 80);
        }

        let details = [
            format!("Feels: {:.0}°", current.feels_like),
            format!("Humid: {}%", current.humidity_pct),
            format!("Wind:  {:.0} {}", current.wind_speed, units.speed_label()),
            format!("UV:    {:.1}", current.uv_index),
            format!("Vis:   {:.1} {}", current.visibility, units.distance_label()),
            format!("Sunrise: {}", clock(current.sunrise)),
            format!("Sunset:  {}", clock(current.sunset)),
            format!("Dew Point: {:.0}°", current.dew_point),
        ];
        for (i, line) in details.iter().enumerate() {
            let y = 60 + i as i32 * DETAIL_LINE_HEIGHT;
            draw_text(&mut image, line, 535, y, &PROFONT_14_POINT, WHITE);
        }

        let mut boxes = Vec::with_capacity(FORECAST_DAYS);
        for (i, day) in snapshot.daily.iter().enumerate() {
            boxes.push(self.draw_forecast_box(&mut image, i as u32, day));
        }

        Frame { image, boxes }
    }

    fn draw_forecast_box(&mut self, image: &mut RgbaImage, index: u32, day: &DailyForecast) -> ForecastBox {
        let left = BOX_LEFT + index * BOX_PITCH;
        let x = left as i32 + 20;

        let label = day.date.format("%a %m/%d").to_string().to_uppercase();
        draw_text(image, &label, x, 312, &PROFONT_12_POINT, WHITE);

        let small = self.assets.lookup(day.key()).small_icon;
        if let Some(icon) = self.image(&small) {
            imageops::overlay(image, icon, i64::from(left) + 60, 300);
        }

        let lines = [
            (format!("{:.0}°/{:.0}°", day.day_temp, day.feels_like_day), &PROFONT_14_POINT, WHITE),
            (format!("L:{:.0} H:{:.0}", day.low, day.high), &PROFONT_10_POINT, WHITE),
            (format!("H:{}%", day.humidity_pct), &PROFONT_10_POINT, HUMIDITY_GREEN),
            (format!("Sunrise: {}", day.sunrise.format("%H:%M")), &PROFONT_10_POINT, WHITE),
            (format!("Sunset:  {}", day.sunset.format("%H:%M")), &PROFONT_10_POINT, WHITE),
        ];
        for (i, (text, font, color)) in lines.iter().enumerate() {
            draw_text(image, text, x - 15, 358 + i as i32 * 15, font, *color);
        }

        ForecastBox {
            bounds: Bounds::new(left, BOX_TOP, left + BOX_WIDTH, BOX_TOP + BOX_HEIGHT),
            tooltip: day.tooltip(),
        }
    }

    fn background(&mut self, path: &Path) -> RgbaImage {
        let cached = self.backgrounds.entry(path.to_path_buf()).or_insert_with(|| {
            load_image(path).map(|img| {
                imageops::resize(&img, FRAME_WIDTH, FRAME_HEIGHT, FilterType::Lanczos3)
            })
        });

        match cached {
            Some(img) => img.clone(),
            None => RgbaImage::from_pixel(FRAME_WIDTH, FRAME_HEIGHT, FALLBACK_BACKGROUND),
        }
    }

    fn image(&mut self, path: &Path) -> Option<&RgbaImage> {
        self.images
            .entry(path.to_path_buf())
            .or_insert_with(|| load_image(path))
            .as_ref()
    }
}

/// Renders only when the snapshot actually changes.
#[derive(Debug)]
pub struct Dashboard {
    renderer: Renderer,
    location: String,
    shown: Option<Arc<WeatherSnapshot>>,
    frame: Frame,
}

impl Dashboard {
    /// Starts out showing the loading placeholder.
    pub fn new(mut renderer: Renderer, location: impl Into<String>) -> Self {
        let location = location.into();
        let frame = renderer.render(&location, None);
        Self { renderer, location, shown: None, frame }
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn set_location(&mut self, location: impl Into<String>) {
        self.location = location.into();
        self.frame = self.renderer.render(&self.location, self.shown.as_deref());
    }

    /// Re-render if `snapshot` differs from the one on screen.
    ///
    /// Returns whether a new frame was produced.
    pub fn update(&mut self, snapshot: Option<Arc<WeatherSnapshot>>) -> bool {
        let unchanged = match (&self.shown, &snapshot) {
            (Some(shown), Some(next)) => Arc::ptr_eq(shown, next),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return false;
        }

        self.frame = self.renderer.render(&self.location, snapshot.as_deref());
        self.shown = snapshot;
        true
    }
}

/// Write `image` as PNG, creating parent directories as needed.
pub fn write_png(image: &RgbaImage, path: &Path) -> anyhow::Result<()> {
    use anyhow::Context;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create frame directory: {}", parent.display()))?;
    }
    image
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("Failed to write frame: {}", path.display()))
}

fn load_image(path: &Path) -> Option<RgbaImage> {
    if !path.is_file() {
        debug!("Asset {} not present", path.display());
        return None;
    }
    match image::open(path) {
        Ok(img) => Some(img.into_rgba8()),
        Err(err) => {
            warn!("Failed to load asset {}: {err}", path.display());
            None
        }
    }
}

fn clock(time: Option<DateTime<FixedOffset>>) -> String {
    time.map(|t| t.format("%H:%M").to_string()).unwrap_or_else(|| "--:--".to_string())
}

fn draw_panels(image: &mut RgbaImage) {
    let current = Bounds::new(10, 45, 485, 290);
    let details = Bounds::new(520, 45, 790, 275);
    for panel in [current, details] {
        fill_rect(image, panel, GLASS);
        outline_rect(image, panel, GLASS_EDGE);
    }

    for i in 0..FORECAST_DAYS as u32 {
        let left = BOX_LEFT + i * BOX_PITCH;
        let outer = Bounds::new(left, BOX_TOP, left + BOX_WIDTH, BOX_TOP + BOX_HEIGHT);
        fill_rect(image, outer, GLASS);
        outline_rect(image, outer, BOX_EDGE);

        let inner = Bounds::new(left + 3, 355, left + BOX_WIDTH - 3, 435);
        fill_rect(image, inner, DETAIL_FILL);
        outline_rect(image, inner, DETAIL_EDGE);
    }
}

fn fill_rect(image: &mut RgbaImage, bounds: Bounds, color: Rgba<u8>) {
    let x1 = bounds.x1.min(image.width().saturating_sub(1));
    let y1 = bounds.y1.min(image.height().saturating_sub(1));
    for y in bounds.y0..=y1 {
        for x in bounds.x0..=x1 {
            image.get_pixel_mut(x, y).blend(&color);
        }
    }
}

fn outline_rect(image: &mut RgbaImage, bounds: Bounds, color: Rgba<u8>) {
    let (w, h) = image.dimensions();
    let mut blend = |x: u32, y: u32| {
        if x < w && y < h {
            image.get_pixel_mut(x, y).blend(&color);
        }
    };

    for x in bounds.x0..=bounds.x1 {
        blend(x, bounds.y0);
        blend(x, bounds.y1);
    }
    for y in bounds.y0 + 1..bounds.y1 {
        blend(bounds.x0, y);
        blend(bounds.x1, y);
    }
}

fn glyph_advance(font: &MonoFont<'_>) -> u32 {
    font.character_size.width + font.character_spacing
}

fn line_height(font: &MonoFont<'_>) -> u32 {
    font.character_size.height
}

fn draw_text(image: &mut RgbaImage, text: &str, x: i32, y: i32, font: &MonoFont<'_>, color: Rgb888) {
    let style = MonoTextStyle::new(font, color);
    Text::with_baseline(text, Point::new(x, y), style, Baseline::Top)
        .draw(&mut Canvas { image })
        .ok();
}

/// Draw large text by rendering at the biggest font size and scaling up.
fn draw_scaled_text(image: &mut RgbaImage, text: &str, x: i64, y: i64, scale: u32) {
    let font = &PROFONT_24_POINT;
    let width = (text.chars().count() as u32 * glyph_advance(font)).max(1);
    let mut layer = RgbaImage::from_pixel(width, line_height(font), Rgba([0, 0, 0, 0]));
    draw_text(&mut layer, text, 0, 0, font, WHITE);

    let scaled = imageops::resize(&layer, width * scale, line_height(font) * scale, FilterType::Nearest);
    imageops::overlay(image, &scaled, x, y);
}

/// `DrawTarget` view of an RGBA image; drawn pixels are opaque.
struct Canvas<'a> {
    image: &'a mut RgbaImage,
}

impl OriginDimensions for Canvas<'_> {
    fn size(&self) -> Size {
        Size::new(self.image.width(), self.image.height())
    }
}

impl DrawTarget for Canvas<'_> {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = EgPixel<Self::Color>>,
    {
        let (w, h) = self.image.dimensions();
        for EgPixel(point, color) in pixels {
            let (Ok(x), Ok(y)) = (u32::try_from(point.x), u32::try_from(point.y)) else {
                continue;
            };
            if x < w && y < h {
                self.image.put_pixel(x, y, Rgba([color.r(), color.g(), color.b(), 255]));
            }
        }
        Ok(())
    }
}
