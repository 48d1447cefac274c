use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The four editing workflows. Each carries its own settings schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkMode {
    Portrait,
    Restore,
    Creative,
    Composite,
}

impl WorkMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Portrait => "PORTRAIT",
            Self::Restore => "RESTORE",
            Self::Creative => "CREATIVE",
            Self::Composite => "COMPOSITE",
        }
    }
}

/// Settings snapshot for one generation request, tagged by mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "UPPERCASE")]
pub enum ModeSettings {
    Portrait(PortraitSettings),
    Restore(RestoreSettings),
    Creative(CreativeSettings),
    Composite(CompositeSettings),
}

impl ModeSettings {
    pub fn mode(&self) -> WorkMode {
        match self {
            Self::Portrait(_) => WorkMode::Portrait,
            Self::Restore(_) => WorkMode::Restore,
            Self::Creative(_) => WorkMode::Creative,
            Self::Composite(_) => WorkMode::Composite,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PortraitSettings {
    pub target_resolution: String,
    pub auto_skin_texture: bool,
    pub auto_hair_detail: bool,
    pub auto_balance_lighting: bool,
    pub light_style: String,
    pub light_intensity: u8,
    pub auto_bokeh: bool,
    pub lens_profile: String,
    pub background_blur: u8,
    pub chromatic_aberration: bool,
    pub skin_smoothing: u8,
    pub remove_blemishes: bool,
    pub remove_wrinkles: bool,
    pub remove_dark_circles: bool,
    pub makeup: String,
    pub hair: String,
}

impl Default for PortraitSettings {
    fn default() -> Self {
        Self {
            target_resolution: "8K".into(),
            auto_skin_texture: true,
            auto_hair_detail: true,
            auto_balance_lighting: true,
            light_style: "3-point".into(),
            light_intensity: 70,
            auto_bokeh: true,
            lens_profile: "85mm f/1.4".into(),
            background_blur: 80,
            chromatic_aberration: false,
            skin_smoothing: 40,
            remove_blemishes: true,
            remove_wrinkles: false,
            remove_dark_circles: true,
            makeup: String::new(),
            hair: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundProcessing {
    /// Remaster the original background in place.
    Remaster,
    /// Replace the background with a generated studio backdrop.
    NewStudio,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RestoreSettings {
    pub auto_clean: bool,
    pub hyper_real_skin: bool,
    pub hair_and_fabric_details: bool,
    pub resolution: String,
    pub auto_studio_light: bool,
    pub light_style: String,
    pub modern_auto_color: bool,
    pub auto_white_balance: bool,
    pub background_processing: BackgroundProcessing,
    pub studio_backdrop: String,
    pub context: String,
}

impl Default for RestoreSettings {
    fn default() -> Self {
        Self {
            auto_clean: true,
            hyper_real_skin: true,
            hair_and_fabric_details: true,
            resolution: "4K".into(),
            auto_studio_light: true,
            light_style: "3-point".into(),
            modern_auto_color: true,
            auto_white_balance: true,
            background_processing: BackgroundProcessing::Remaster,
            studio_backdrop: "grey".into(),
            context: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreativeSettings {
    pub background_prompt: String,
    pub full_body_prompt: String,
}

/// Composite mode carries an open key/value bag; unrecognized keys are dumped
/// verbatim into the prompt (minus empty/null values, see the compiler).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompositeSettings {
    pub values: BTreeMap<String, serde_json::Value>,
}
