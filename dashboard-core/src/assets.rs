//! Condition key -> image file mapping.
//!
//! Files follow the OpenWeather icon naming (`01d`, `10n`, ...), so an icon
//! pack downloaded from the provider can be dropped into the asset directory
//! as-is. `unknown` is the default stem used for anything without files.

use std::path::{Path, PathBuf};

use log::debug;

use crate::model::{Condition, ConditionKey};

/// Stem used when a key has no background on disk.
pub const DEFAULT_STEM: &str = "unknown";

/// The file stem for every condition key.
pub fn asset_stem(key: ConditionKey) -> &'static str {
    use Condition::*;

    match (key.condition, key.is_daytime) {
        (Clear, true) => "01d",
        (Clear, false) => "01n",
        (FewClouds, true) => "02d",
        (FewClouds, false) => "02n",
        (ScatteredClouds, true) => "03d",
        (ScatteredClouds, false) => "03n",
        (BrokenClouds, true) => "04d",
        (BrokenClouds, false) => "04n",
        (ShowerRain, true) => "09d",
        (ShowerRain, false) => "09n",
        (Rain, true) => "10d",
        (Rain, false) => "10n",
        (Thunderstorm, true) => "11d",
        (Thunderstorm, false) => "11n",
        (Snow, true) => "13d",
        (Snow, false) => "13n",
        (Mist, true) => "50d",
        (Mist, false) => "50n",
        (Unknown, _) => DEFAULT_STEM,
    }
}

/// Image files for one condition key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPair {
    pub stem: &'static str,
    pub background: PathBuf,
    pub icon: PathBuf,
    /// Smaller icon used in the forecast boxes.
    pub small_icon: PathBuf,
}

impl AssetPair {
    fn in_dir(root: &Path, stem: &'static str) -> Self {
        Self {
            stem,
            background: root.join(format!("{stem}_bg.png")),
            icon: root.join(format!("{stem}_t@4x.png")),
            small_icon: root.join(format!("{stem}_t@2x.png")),
        }
    }

    pub fn is_default(&self) -> bool {
        self.stem == DEFAULT_STEM
    }
}

#[derive(Debug, Clone)]
pub struct AssetCatalog {
    root: PathBuf,
}

impl AssetCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn default_pair(&self) -> AssetPair {
        AssetPair::in_dir(&self.root, DEFAULT_STEM)
    }

    /// Assets for `key`, or the default pair when its background is missing.
    pub fn lookup(&self, key: ConditionKey) -> AssetPair {
        let stem = asset_stem(key);
        let pair = AssetPair::in_dir(&self.root, stem);

        if pair.is_default() || pair.background.is_file() {
            pair
        } else {
            debug!("No background for {stem}, using {DEFAULT_STEM} assets");
            self.default_pair()
        }
    }
}
