use std::{
    fmt,
    path::{Path, PathBuf},
};

use serde_yaml::{Mapping, Value};
use thiserror::Error;

use super::yaml::{load_mapping, save_mapping};
use crate::{info, sources::unique};

/* =========================
   UI REGIONS
   ========================= */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UiRegion {
    Window,
    Editor,
    Sidebar,
    Panel,
}

impl UiRegion {
    pub const ALL: [UiRegion; 4] = [Self::Window, Self::Editor, Self::Sidebar, Self::Panel];

    pub fn key(self) -> &'static str {
        match self {
            Self::Window => "window",
            Self::Editor => "editor",
            Self::Sidebar => "sidebar",
            Self::Panel => "panel",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Window => "Window",
            Self::Editor => "Editor",
            Self::Sidebar => "Sidebar",
            Self::Panel => "Panel",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "window" | "body" => Some(Self::Window),
            "editor" | "editors" => Some(Self::Editor),
            "sidebar" | "side-bar" | "side_bar" => Some(Self::Sidebar),
            "panel" | "terminal" => Some(Self::Panel),
            _ => None,
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Window => 0,
            Self::Editor => 1,
            Self::Sidebar => 2,
            Self::Panel => 3,
        }
    }
}

impl fmt::Display for UiRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/* =========================
   CSS ENUMS
   ========================= */

pub const MANUAL: &str = "Manual";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    TopLeft,
    TopCenter,
    TopRight,
    CenterLeft,
    CenterCenter,
    CenterRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
    Manual,
}

impl Alignment {
    pub const ALL: [Alignment; 10] = [
        Self::TopLeft,
        Self::TopCenter,
        Self::TopRight,
        Self::CenterLeft,
        Self::CenterCenter,
        Self::CenterRight,
        Self::BottomLeft,
        Self::BottomCenter,
        Self::BottomRight,
        Self::Manual,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::TopLeft => "Top Left",
            Self::TopCenter => "Top Center",
            Self::TopRight => "Top Right",
            Self::CenterLeft => "Center Left",
            Self::CenterCenter => "Center Center",
            Self::CenterRight => "Center Right",
            Self::BottomLeft => "Bottom Left",
            Self::BottomCenter => "Bottom Center",
            Self::BottomRight => "Bottom Right",
            Self::Manual => MANUAL,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let wanted = normalize_label(value);
        Self::ALL.into_iter().find(|a| normalize_label(a.label()) == wanted)
    }

    /// `background-position` value, `None` for the manual sentinel.
    pub fn css(self) -> Option<String> {
        match self {
            Self::Manual => None,
            other => Some(other.label().to_lowercase()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    Repeat,
    RepeatX,
    RepeatY,
    NoRepeat,
    Space,
    Round,
}

impl Repeat {
    pub const ALL: [Repeat; 6] = [
        Self::Repeat,
        Self::RepeatX,
        Self::RepeatY,
        Self::NoRepeat,
        Self::Space,
        Self::Round,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Repeat => "Repeat",
            Self::RepeatX => "Repeat X",
            Self::RepeatY => "Repeat Y",
            Self::NoRepeat => "No Repeat",
            Self::Space => "Space",
            Self::Round => "Round",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Repeat => "Tile the image in both directions",
            Self::RepeatX => "Tile the image horizontally",
            Self::RepeatY => "Tile the image vertically",
            Self::NoRepeat => "Show the image once",
            Self::Space => "Tile without clipping, spacing tiles evenly",
            Self::Round => "Tile without clipping, stretching tiles to fit",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let wanted = normalize_label(value);
        Self::ALL.into_iter().find(|r| normalize_label(r.label()) == wanted)
    }

    pub fn css(self) -> String {
        self.label().to_lowercase().replace(' ', "-")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeMode {
    Auto,
    Contain,
    Cover,
    Manual,
}

impl SizeMode {
    pub const ALL: [SizeMode; 4] = [Self::Auto, Self::Contain, Self::Cover, Self::Manual];

    pub fn label(self) -> &'static str {
        match self {
            Self::Auto => "Auto",
            Self::Contain => "Contain",
            Self::Cover => "Cover",
            Self::Manual => MANUAL,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Auto => "Original image size",
            Self::Contain => "Fit to the region",
            Self::Cover => "Cover the region",
            Self::Manual => "Manual size",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let wanted = normalize_label(value);
        Self::ALL.into_iter().find(|s| normalize_label(s.label()) == wanted)
    }

    pub fn css(self) -> Option<String> {
        match self {
            Self::Manual => None,
            other => Some(other.label().to_lowercase()),
        }
    }
}

fn normalize_label(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .collect()
}

/* =========================
   SETTING KEYS
   ========================= */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Number,
    Bool,
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    Backgrounds,
    BackgroundAlignment,
    BackgroundAlignmentValue,
    BackgroundBlur,
    BackgroundOpacity,
    BackgroundRepeat,
    BackgroundSize,
    BackgroundSizeValue,
    BackgroundChangeTime,
    RenderContentAboveBackground,
    SmoothImageRendering,
    Css,
    EmbedImages,
    AppRoot,
}

impl Setting {
    pub fn key(self) -> &'static str {
        match self {
            Self::Backgrounds => "Backgrounds",
            Self::BackgroundAlignment => "backgroundAlignment",
            Self::BackgroundAlignmentValue => "backgroundAlignmentValue",
            Self::BackgroundBlur => "backgroundBlur",
            Self::BackgroundOpacity => "backgroundOpacity",
            Self::BackgroundRepeat => "backgroundRepeat",
            Self::BackgroundSize => "backgroundSize",
            Self::BackgroundSizeValue => "backgroundSizeValue",
            Self::BackgroundChangeTime => "backgroundChangeTime",
            Self::RenderContentAboveBackground => "renderContentAboveBackground",
            Self::SmoothImageRendering => "smoothImageRendering",
            Self::Css => "CSS",
            Self::EmbedImages => "embedImages",
            Self::AppRoot => "appRoot",
        }
    }

    pub fn scoped(self) -> bool {
        !matches!(
            self,
            Self::RenderContentAboveBackground
                | Self::SmoothImageRendering
                | Self::Css
                | Self::EmbedImages
                | Self::AppRoot
        )
    }

    pub fn kind(self) -> ValueKind {
        match self {
            Self::Backgrounds => ValueKind::List,
            Self::BackgroundOpacity | Self::BackgroundChangeTime => ValueKind::Number,
            Self::RenderContentAboveBackground | Self::SmoothImageRendering | Self::EmbedImages => {
                ValueKind::Bool
            }
            _ => ValueKind::Text,
        }
    }

    pub fn default_value(self) -> Value {
        match self {
            Self::Backgrounds => Value::Sequence(Vec::new()),
            Self::BackgroundAlignment => Value::from(Alignment::CenterCenter.label()),
            Self::BackgroundAlignmentValue => Value::from("center center"),
            Self::BackgroundBlur => Value::from("0"),
            Self::BackgroundOpacity => Value::from(0.9),
            Self::BackgroundRepeat => Value::from(Repeat::NoRepeat.label()),
            Self::BackgroundSize => Value::from(SizeMode::Cover.label()),
            Self::BackgroundSizeValue => Value::from("auto"),
            Self::BackgroundChangeTime => Value::from(0),
            Self::RenderContentAboveBackground
            | Self::SmoothImageRendering
            | Self::EmbedImages => Value::Bool(false),
            Self::Css | Self::AppRoot => Value::from(""),
        }
    }

    fn storage_key(self, region: Option<UiRegion>) -> String {
        match (self, region) {
            (Self::Backgrounds, Some(region)) => format!("{}{}", region.key(), self.key()),
            _ => self.key().to_string(),
        }
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/* =========================
   ERRORS
   ========================= */

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("setting '{0}' is scoped by UI region; no region given")]
    MissingRegion(Setting),
    #[error("setting '{setting}' expects a {expected:?} value")]
    Type { setting: Setting, expected: ValueKind },
}

/* =========================
   SNAPSHOT
   ========================= */

/// Resolved settings of one UI region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionSettings {
    pub sources: Vec<String>,
    pub alignment: Alignment,
    pub alignment_value: String,
    pub blur: String,
    pub opacity: f64,
    pub repeat: Repeat,
    pub size: SizeMode,
    pub size_value: String,
    pub change_time: f64,
}

impl Default for RegionSettings {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            alignment: Alignment::CenterCenter,
            alignment_value: "center center".to_string(),
            blur: "0".to_string(),
            opacity: 0.9,
            repeat: Repeat::NoRepeat,
            size: SizeMode::Cover,
            size_value: "auto".to_string(),
            change_time: 0.0,
        }
    }
}

impl RegionSettings {
    pub fn position_css(&self) -> String {
        self.alignment.css().unwrap_or_else(|| self.alignment_value.clone())
    }

    pub fn size_css(&self) -> String {
        self.size.css().unwrap_or_else(|| self.size_value.clone())
    }

    pub fn repeat_css(&self) -> String {
        self.repeat.css()
    }

    /// Short value shown next to a setting in menus.
    pub fn display(&self, setting: Setting) -> String {
        match setting {
            Setting::BackgroundAlignment => match self.alignment {
                Alignment::Manual => self.alignment_value.clone(),
                other => other.label().to_string(),
            },
            Setting::BackgroundSize => match self.size {
                SizeMode::Manual => self.size_value.clone(),
                other => other.label().to_string(),
            },
            Setting::BackgroundRepeat => self.repeat.label().to_string(),
            Setting::BackgroundBlur => self.blur.clone(),
            Setting::BackgroundOpacity => self.opacity.to_string(),
            Setting::BackgroundChangeTime => self.change_time.to_string(),
            Setting::Backgrounds => self.sources.len().to_string(),
            _ => String::new(),
        }
    }
}

/// Immutable view of every setting the script generator reads.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BackgroundConfig {
    regions: [RegionSettings; 4],
    pub render_above: bool,
    pub smooth_rendering: bool,
    pub css: String,
    pub embed_images: bool,
}

impl BackgroundConfig {
    pub fn region(&self, region: UiRegion) -> &RegionSettings {
        &self.regions[region.index()]
    }

    pub fn region_mut(&mut self, region: UiRegion) -> &mut RegionSettings {
        &mut self.regions[region.index()]
    }
}

/* =========================
   STORE
   ========================= */

/// Settings persisted in a YAML file, written through on every update.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    map: Mapping,
    changed: bool,
}

impl ConfigStore {
    pub fn open(path: &Path) -> Result<Self, ConfigError> {
        let map = load_mapping(path)
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .unwrap_or_default();

        info!("[CONFIG] Loaded {} key(s) from {}", map.len(), path.display());

        Ok(Self {
            path: path.to_path_buf(),
            map,
            changed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw value with the default substituted for missing or mistyped entries.
    pub fn get(&self, setting: Setting, region: Option<UiRegion>) -> Value {
        self.stored(setting, region)
            .filter(|v| kind_matches(setting.kind(), v))
            .cloned()
            .unwrap_or_else(|| setting.default_value())
    }

    pub fn get_str(&self, setting: Setting, region: Option<UiRegion>) -> String {
        match self.get(setting, region) {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            _ => String::new(),
        }
    }

    pub fn get_f64(&self, setting: Setting, region: Option<UiRegion>) -> f64 {
        self.get(setting, region)
            .as_f64()
            .or_else(|| setting.default_value().as_f64())
            .unwrap_or(0.0)
    }

    pub fn get_bool(&self, setting: Setting, region: Option<UiRegion>) -> bool {
        self.get(setting, region).as_bool().unwrap_or(false)
    }

    pub fn get_list(&self, setting: Setting, region: Option<UiRegion>) -> Vec<String> {
        match self.get(setting, region) {
            Value::Sequence(seq) => seq
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Persists a value. Returns whether the stored value changed; a
    /// non-silent change is remembered until [`ConfigStore::take_changed`].
    pub fn update(
        &mut self,
        setting: Setting,
        value: impl Into<Value>,
        region: Option<UiRegion>,
        silent: bool,
    ) -> Result<bool, ConfigError> {
        let value = value.into();
        if !kind_matches(setting.kind(), &value) {
            return Err(ConfigError::Type {
                setting,
                expected: setting.kind(),
            });
        }
        if setting.scoped() && region.is_none() {
            return Err(ConfigError::MissingRegion(setting));
        }

        if self.get(setting, region) == value {
            return Ok(false);
        }

        let key = Value::String(setting.storage_key(region));
        match (setting, region) {
            (Setting::Backgrounds, _) | (_, None) => {
                self.map.insert(key, value.clone());
            }
            (_, Some(region)) => {
                let entry = self
                    .map
                    .entry(key)
                    .or_insert_with(|| Value::Mapping(Mapping::new()));
                if !entry.is_mapping() {
                    *entry = Value::Mapping(Mapping::new());
                }
                if let Value::Mapping(scoped) = entry {
                    scoped.insert(Value::String(region.key().to_string()), value.clone());
                }
            }
        }

        save_mapping(&self.path, &self.map).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;

        let scope = region.map(|r| format!("{r}.")).unwrap_or_default();
        if silent {
            info!("[CONFIG] Updated {}{} (silent)", scope, setting);
        } else {
            info!("[CONFIG] Updated {}{} = {:?}", scope, setting, value);
            self.changed = true;
        }

        Ok(true)
    }

    /// Returns and clears the pending change notification.
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    /// Raises the notification for a group of silent writes.
    pub fn notify(&mut self) {
        self.changed = true;
    }

    /* ---------- image sources ---------- */

    pub fn sources(&self, region: UiRegion) -> Vec<String> {
        unique(self.get_list(Setting::Backgrounds, Some(region)))
    }

    /// Appends sources one at a time, only the last write notifies.
    pub fn add_sources(&mut self, region: UiRegion, sources: &[String]) -> Result<bool, ConfigError> {
        let mut changed = false;
        for (i, source) in sources.iter().enumerate() {
            let last = i + 1 == sources.len();
            let mut list = self.sources(region);
            list.push(source.clone());
            changed |= self.write_sources(region, list, !last)?;
        }
        // the last entry may have been a duplicate
        if changed {
            self.notify();
        }
        Ok(changed)
    }

    pub fn replace_source(&mut self, region: UiRegion, old: &str, new: &str) -> Result<bool, ConfigError> {
        let list = self
            .sources(region)
            .into_iter()
            .map(|s| if s == old { new.to_string() } else { s })
            .collect();
        self.write_sources(region, list, old == new)
    }

    pub fn remove_source(&mut self, region: UiRegion, source: &str) -> Result<bool, ConfigError> {
        let list = self.sources(region).into_iter().filter(|s| s != source).collect();
        self.write_sources(region, list, false)
    }

    fn write_sources(&mut self, region: UiRegion, list: Vec<String>, silent: bool) -> Result<bool, ConfigError> {
        let seq = unique(list).into_iter().map(Value::String).collect::<Vec<_>>();
        self.update(Setting::Backgrounds, Value::Sequence(seq), Some(region), silent)
    }

    /* ---------- snapshot ---------- */

    pub fn region(&self, region: UiRegion) -> RegionSettings {
        let r = Some(region);
        let defaults = RegionSettings::default();

        RegionSettings {
            sources: self.sources(region),
            alignment: Alignment::parse(&self.get_str(Setting::BackgroundAlignment, r))
                .unwrap_or(defaults.alignment),
            alignment_value: self.get_str(Setting::BackgroundAlignmentValue, r),
            blur: self.get_str(Setting::BackgroundBlur, r),
            opacity: self.get_f64(Setting::BackgroundOpacity, r).clamp(0.0, 1.0),
            repeat: Repeat::parse(&self.get_str(Setting::BackgroundRepeat, r)).unwrap_or(defaults.repeat),
            size: SizeMode::parse(&self.get_str(Setting::BackgroundSize, r)).unwrap_or(defaults.size),
            size_value: self.get_str(Setting::BackgroundSizeValue, r),
            change_time: self.get_f64(Setting::BackgroundChangeTime, r),
        }
    }

    pub fn snapshot(&self) -> BackgroundConfig {
        let mut config = BackgroundConfig {
            render_above: self.get_bool(Setting::RenderContentAboveBackground, None),
            smooth_rendering: self.get_bool(Setting::SmoothImageRendering, None),
            css: self.get_str(Setting::Css, None),
            embed_images: self.get_bool(Setting::EmbedImages, None),
            ..BackgroundConfig::default()
        };
        for region in UiRegion::ALL {
            *config.region_mut(region) = self.region(region);
        }
        config
    }

    fn stored(&self, setting: Setting, region: Option<UiRegion>) -> Option<&Value> {
        let value = self.map.get(setting.storage_key(region).as_str())?;
        match (setting, region) {
            (Setting::Backgrounds, _) => Some(value),
            (_, Some(region)) if setting.scoped() => value.as_mapping()?.get(region.key()),
            (_, None) if setting.scoped() => None,
            _ => Some(value),
        }
    }
}

fn kind_matches(kind: ValueKind, value: &Value) -> bool {
    match kind {
        ValueKind::Text => value.is_string(),
        ValueKind::Number => value.is_number(),
        ValueKind::Bool => value.is_bool(),
        ValueKind::List => value
            .as_sequence()
            .map(|seq| seq.iter().all(Value::is_string))
            .unwrap_or(false),
    }
}
