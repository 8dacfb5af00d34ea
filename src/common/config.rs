use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_with::{DurationMilliSeconds, serde_as};

use super::collections::HashSet;
use crate::command::DetectedCommand;
use crate::model::tree::{Layout, Orientation};

const DEFAULT_CONFIG: &str = include_str!("../../trellis.default.toml");

pub fn config_file() -> PathBuf {
    dirs::home_dir().unwrap_or_default().join(".config").join("trellis").join("trellis.toml")
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    settings: Settings,
    #[serde(default)]
    workspaces: WorkspaceSettings,
    #[serde(default)]
    on_window_detected: Vec<WindowDetectedCallback>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub settings: Settings,
    pub workspaces: WorkspaceSettings,
    pub on_window_detected: Vec<WindowDetectedCallback>,
}

#[serde_as]
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// When disabled, the model is still kept in sync but windows are not
    /// moved and focus is not changed.
    #[serde(default = "yes")]
    pub enabled: bool,
    #[serde(default)]
    pub gaps: GapSettings,
    #[serde(default)]
    pub layout: LayoutSettings,
    #[serde(default = "no")]
    pub automatically_unhide_hidden_apps: bool,
    /// Launches started by the login item exit unless this is set.
    #[serde(default = "no")]
    pub start_at_login: bool,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "closed_windows_cache_ttl_ms", default = "default_closed_windows_ttl")]
    pub closed_windows_cache_ttl: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            enabled: true,
            gaps: GapSettings::default(),
            layout: LayoutSettings::default(),
            automatically_unhide_hidden_apps: false,
            start_at_login: false,
            closed_windows_cache_ttl: default_closed_windows_ttl(),
        }
    }
}

/// Gap configuration for window spacing
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct GapSettings {
    /// Space between windows and screen edges
    #[serde(default)]
    pub outer: OuterGaps,
    /// Space between windows
    #[serde(default)]
    pub inner: InnerGaps,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Copy, Default)]
#[serde(deny_unknown_fields)]
pub struct OuterGaps {
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub bottom: f64,
    #[serde(default)]
    pub right: f64,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Copy, Default)]
#[serde(deny_unknown_fields)]
pub struct InnerGaps {
    #[serde(default)]
    pub horizontal: f64,
    #[serde(default)]
    pub vertical: f64,
}

impl InnerGaps {
    pub fn along(&self, orientation: Orientation) -> f64 {
        match orientation {
            Orientation::Horizontal => self.horizontal,
            Orientation::Vertical => self.vertical,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct LayoutSettings {
    #[serde(default)]
    pub default_root_layout: Layout,
    /// Orientation of new root containers. Unset means wide monitors get a
    /// horizontal root and tall ones a vertical root.
    #[serde(default)]
    pub default_orientation: Option<Orientation>,
    #[serde(default = "default_accordion_padding")]
    pub accordion_padding: f64,
    /// Applied once at startup: roots with at most this many children tile,
    /// larger ones become accordions.
    #[serde(default = "default_smart_layout_threshold")]
    pub smart_layout_threshold: usize,
    #[serde(default = "yes")]
    pub normalize_flatten_containers: bool,
    #[serde(default = "yes")]
    pub normalize_opposite_orientation_for_nested_containers: bool,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        LayoutSettings {
            default_root_layout: Layout::Tiles,
            default_orientation: None,
            accordion_padding: default_accordion_padding(),
            smart_layout_threshold: default_smart_layout_threshold(),
            normalize_flatten_containers: true,
            normalize_opposite_orientation_for_nested_containers: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceSettings {
    /// Names handed out to monitors that need a workspace, in order.
    #[serde(default)]
    pub names: Vec<String>,
    /// Workspaces that exist even when empty.
    #[serde(default)]
    pub persistent: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct WindowDetectedCallback {
    #[serde(rename = "if", default)]
    pub matcher: WindowMatcher,
    #[serde(default = "no")]
    pub check_further_callbacks: bool,
    pub run: Vec<DetectedCommand>,
}

/// Conditions of an `on_window_detected` callback. Unset fields match
/// anything.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct WindowMatcher {
    #[serde(default)]
    pub during_startup: Option<bool>,
    #[serde(default)]
    pub window_title_regex_substring: Option<Pattern>,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub app_name_regex_substring: Option<Pattern>,
    #[serde(default)]
    pub workspace: Option<String>,
}

/// What a callback is matched against.
pub struct DetectedWindow<'a> {
    pub title: Option<&'a str>,
    pub app_id: Option<&'a str>,
    pub app_name: Option<&'a str>,
    pub workspace: &'a str,
    pub startup: bool,
}

impl WindowMatcher {
    pub fn matches(&self, window: &DetectedWindow<'_>) -> bool {
        fn pattern_matches(pattern: &Option<Pattern>, value: Option<&str>) -> bool {
            pattern.as_ref().is_none_or(|p| p.is_match(value.unwrap_or_default()))
        }

        self.during_startup.is_none_or(|startup| startup == window.startup)
            && self.app_id.as_deref().is_none_or(|id| Some(id) == window.app_id)
            && self.workspace.as_deref().is_none_or(|ws| ws == window.workspace)
            && pattern_matches(&self.window_title_regex_substring, window.title)
            && pattern_matches(&self.app_name_regex_substring, window.app_name)
    }
}

/// A regex kept next to its source text.
///
/// Invalid patterns never match; [`Config::validate`] reports them.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Option<Regex>,
}

impl Pattern {
    pub fn new(source: impl Into<String>) -> Pattern {
        let source = source.into();
        let regex = Regex::new(&source).ok();
        Pattern { source, regex }
    }

    pub fn as_str(&self) -> &str { &self.source }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.as_ref().is_some_and(|r| r.is_match(haystack))
    }

    fn error(&self) -> Option<regex::Error> { Regex::new(&self.source).err() }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool { self.source == other.source }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Pattern::new)
    }
}

fn yes() -> bool { true }
fn no() -> bool { false }
fn default_accordion_padding() -> f64 { 30.0 }
fn default_smart_layout_threshold() -> usize { 3 }
fn default_closed_windows_ttl() -> Duration { Duration::from_millis(1000) }

impl From<ConfigFile> for Config {
    fn from(file: ConfigFile) -> Self {
        Config {
            settings: file.settings,
            workspaces: file.workspaces,
            on_window_detected: file.on_window_detected,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse(DEFAULT_CONFIG).unwrap_or_else(|_| ConfigFile::default().into())
    }
}

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let buf = std::fs::read_to_string(path)?;
        Self::parse(&buf)
    }

    pub fn parse(buf: &str) -> anyhow::Result<Config> {
        let file: ConfigFile = toml::from_str(buf)?;
        Ok(file.into())
    }

    /// Validates the entire configuration and returns a list of issues found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        issues.extend(self.settings.validate());
        issues.extend(self.workspaces.validate());

        for (index, callback) in self.on_window_detected.iter().enumerate() {
            let matcher = &callback.matcher;
            for pattern in
                [&matcher.window_title_regex_substring, &matcher.app_name_regex_substring]
                    .into_iter()
                    .flatten()
            {
                if let Some(err) = pattern.error() {
                    issues.push(format!(
                        "on_window_detected[{index}]: invalid regex '{}': {err}",
                        pattern.as_str()
                    ));
                }
            }
            if callback.run.is_empty() {
                issues.push(format!("on_window_detected[{index}]: run is empty"));
            }
        }

        issues
    }
}

impl Settings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let OuterGaps { top, left, bottom, right } = self.gaps.outer;
        if [top, left, bottom, right].iter().any(|g| *g < 0.0) {
            issues.push("outer gaps must be non-negative".to_string());
        }
        if self.gaps.inner.horizontal < 0.0 || self.gaps.inner.vertical < 0.0 {
            issues.push("inner gaps must be non-negative".to_string());
        }
        if self.layout.accordion_padding < 0.0 {
            issues.push("accordion_padding must be non-negative".to_string());
        }
        if self.closed_windows_cache_ttl.is_zero() {
            issues.push("closed_windows_cache_ttl_ms must be at least 1".to_string());
        }
        issues
    }
}

impl WorkspaceSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let mut seen = HashSet::default();
        for name in &self.names {
            if name.trim().is_empty() {
                issues.push("workspace names must not be empty".to_string());
            } else if !seen.insert(name.as_str()) {
                issues.push(format!("Duplicate workspace name '{name}'"));
            }
        }
        for name in &self.persistent {
            if name.trim().is_empty() {
                issues.push("persistent workspace names must not be empty".to_string());
            }
        }
        issues
    }
}
