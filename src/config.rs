//! Configuration management with serde serialization/deserialization
//!
//! This module provides all configuration structures for the showcase capture
//! engine: session pool sizing, cache policy, navigation limits, viewport
//! presets, section selectors and Chromium launch settings.

use crate::automation::{ResourceClass, WaitCondition};
use crate::error::ShowcaseError;
use crate::model::Section;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for the showcase capture engine
///
/// # Examples
///
/// ```rust
/// use showcase_capture::Config;
/// use std::time::Duration;
///
/// let config = Config {
///     session_pool_size: 5,
///     cache_ttl: Duration::from_secs(600),
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of idle capture sessions kept for reuse (default: 3)
    ///
    /// Only idle sessions are bounded. Concurrent captures may create as many
    /// sessions as they need; surplus sessions are closed on release.
    pub session_pool_size: usize,

    /// Hard upper bound for a single navigation (default: 30 seconds)
    pub navigation_timeout: Duration,

    /// Page state to wait for before capturing (default: network idle)
    pub wait_condition: WaitCondition,

    /// Age after which a cached showcase is no longer served (default: 1 hour)
    pub cache_ttl: Duration,

    /// Maximum number of cached showcases (default: 50)
    pub cache_max_entries: usize,

    /// Root directory for persisted section images and records
    pub storage_dir: PathBuf,

    /// Public site URL template; `{key}` is replaced by the site key
    pub site_url_template: String,

    /// Base URL used to build the canonical share link of a showcase
    pub share_base_url: String,

    /// Screenshot quality for lossy formats, 0-100 (default: 80)
    pub screenshot_quality: u8,

    /// Output image format for page screenshots (default: PNG)
    pub output_format: OutputFormat,

    /// Viewport used when a request does not name one
    pub default_viewport: ViewportSpec,

    /// Resource classes rejected by every new session
    pub blocked_resources: Vec<ResourceClass>,

    /// CSS selectors used to locate each highlight section
    pub selectors: SectionSelectors,

    /// Path to Chrome/Chromium executable (default: auto-detect)
    pub chrome_path: Option<String>,

    /// Custom User-Agent string for requests (default: Chrome default)
    pub user_agent: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_pool_size: 3,
            navigation_timeout: Duration::from_secs(30),
            wait_condition: WaitCondition::NetworkIdle,
            cache_ttl: Duration::from_secs(60 * 60),
            cache_max_entries: 50,
            storage_dir: PathBuf::from("./showcases"),
            site_url_template: "https://{key}.sites.local".to_string(),
            share_base_url: "https://sites.local/showcase".to_string(),
            screenshot_quality: 80,
            output_format: OutputFormat::Png,
            default_viewport: ViewportSpec::Preset(ViewportPreset::Desktop),
            blocked_resources: vec![
                ResourceClass::Font,
                ResourceClass::Media,
                ResourceClass::WebSocket,
            ],
            selectors: SectionSelectors::default(),
            chrome_path: None,
            user_agent: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ShowcaseError> {
        if self.session_pool_size == 0 {
            return Err(ShowcaseError::Configuration(
                "Session pool size must be greater than 0".into(),
            ));
        }
        if self.navigation_timeout.is_zero() {
            return Err(ShowcaseError::Configuration(
                "Navigation timeout must be greater than 0".into(),
            ));
        }
        if self.cache_ttl.is_zero() {
            return Err(ShowcaseError::Configuration(
                "Cache TTL must be greater than 0".into(),
            ));
        }
        if self.cache_max_entries == 0 {
            return Err(ShowcaseError::Configuration(
                "Cache max entries must be greater than 0".into(),
            ));
        }
        if self.screenshot_quality > 100 {
            return Err(ShowcaseError::Configuration(
                "Screenshot quality must be between 0 and 100".into(),
            ));
        }
        if self.storage_dir.as_os_str().is_empty() {
            return Err(ShowcaseError::Configuration(
                "Storage directory must not be empty".into(),
            ));
        }
        if !self.site_url_template.contains("{key}") {
            return Err(ShowcaseError::Configuration(
                "Site URL template must contain {key}".into(),
            ));
        }
        let viewport = self.default_viewport.resolve();
        if viewport.width == 0 || viewport.height == 0 {
            return Err(ShowcaseError::Configuration(
                "Viewport dimensions must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Public URL of the published site for `key`.
    pub fn site_url(&self, key: &str) -> String {
        self.site_url_template.replace("{key}", key)
    }

    /// Canonical share URL of the showcase for `key`.
    pub fn share_url(&self, key: &str) -> String {
        format!("{}/{}", self.share_base_url.trim_end_matches('/'), key)
    }
}

/// Browser viewport used for a capture
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Viewport {
    /// Viewport width in pixels
    pub width: u32,

    /// Viewport height in pixels
    pub height: u32,

    /// Device pixel ratio for high-DPI displays (default: 1.0)
    pub device_scale_factor: f64,

    /// Whether to emulate a mobile device
    pub mobile: bool,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            device_scale_factor: 1.0,
            mobile: false,
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        ViewportPreset::Desktop.viewport()
    }
}

/// Named viewport presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewportPreset {
    Desktop,
    Tablet,
    Mobile,
}

impl ViewportPreset {
    pub fn viewport(self) -> Viewport {
        match self {
            ViewportPreset::Desktop => Viewport::new(1920, 1080),
            ViewportPreset::Tablet => Viewport {
                width: 768,
                height: 1024,
                device_scale_factor: 2.0,
                mobile: true,
            },
            ViewportPreset::Mobile => Viewport {
                width: 375,
                height: 667,
                device_scale_factor: 2.0,
                mobile: true,
            },
        }
    }
}

/// Either a named preset or explicit dimensions
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ViewportSpec {
    Preset(ViewportPreset),
    Custom(Viewport),
}

impl ViewportSpec {
    pub fn resolve(&self) -> Viewport {
        match self {
            ViewportSpec::Preset(preset) => preset.viewport(),
            ViewportSpec::Custom(viewport) => *viewport,
        }
    }
}

impl Default for ViewportSpec {
    fn default() -> Self {
        ViewportSpec::Preset(ViewportPreset::Desktop)
    }
}

impl std::str::FromStr for ViewportSpec {
    type Err = ShowcaseError;

    /// Parses `desktop`, `tablet`, `mobile` or `WIDTHxHEIGHT`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "desktop" => Ok(ViewportSpec::Preset(ViewportPreset::Desktop)),
            "tablet" => Ok(ViewportSpec::Preset(ViewportPreset::Tablet)),
            "mobile" => Ok(ViewportSpec::Preset(ViewportPreset::Mobile)),
            other => {
                let (w, h) = other.split_once('x').ok_or_else(|| {
                    ShowcaseError::Configuration(format!("Unknown viewport: {s}"))
                })?;
                let width = w.parse::<u32>().map_err(|_| {
                    ShowcaseError::Configuration(format!("Invalid viewport width: {w}"))
                })?;
                let height = h.parse::<u32>().map_err(|_| {
                    ShowcaseError::Configuration(format!("Invalid viewport height: {h}"))
                })?;
                if width == 0 || height == 0 {
                    return Err(ShowcaseError::Configuration(
                        "Viewport dimensions must be greater than 0".into(),
                    ));
                }
                Ok(ViewportSpec::Custom(Viewport::new(width, height)))
            }
        }
    }
}

/// Supported output image formats for page screenshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum OutputFormat {
    /// PNG format - lossless compression, best quality
    Png,
    /// JPEG format - lossy compression, smaller files
    Jpeg,
    /// WebP format - modern compression
    Webp,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Webp => "webp",
        }
    }
}

/// Comma-separated CSS selectors for each highlight section. Selectors are
/// tried left to right and the first one that matches wins.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SectionSelectors {
    pub hero: String,
    pub services: String,
    pub reviews: String,
    pub contact: String,
}

impl SectionSelectors {
    pub fn for_section(&self, section: Section) -> &str {
        match section {
            Section::Hero => &self.hero,
            Section::Services => &self.services,
            Section::Reviews => &self.reviews,
            Section::Contact => &self.contact,
        }
    }

    /// Individual selectors for `section`, highest priority first.
    pub fn candidates(&self, section: Section) -> impl Iterator<Item = &str> {
        self.for_section(section)
            .split(',')
            .map(str::trim)
            .filter(|selector| !selector.is_empty())
    }
}

impl Default for SectionSelectors {
    fn default() -> Self {
        Self {
            hero: "[data-section=\"hero\"], section.hero, #hero".to_string(),
            services: "[data-section=\"services\"], section.services, #services".to_string(),
            reviews: "[data-section=\"reviews\"], section.reviews, #reviews, #testimonials"
                .to_string(),
            contact: "[data-section=\"contact\"], section.contact, #contact".to_string(),
        }
    }
}

/// Generate Chrome command-line arguments based on configuration
///
/// ```rust
/// use showcase_capture::{Config, get_chrome_args};
///
/// let args = get_chrome_args(&Config::default());
/// assert!(args.contains(&"--headless".to_string()));
/// ```
pub fn get_chrome_args(config: &Config) -> Vec<String> {
    let viewport = config.default_viewport.resolve();
    let unique_id = format!("{}-{}", std::process::id(), uuid::Uuid::new_v4());

    let mut args = vec![
        "--headless".to_string(),
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        "--disable-background-timer-throttling".to_string(),
        "--disable-backgrounding-occluded-windows".to_string(),
        "--disable-renderer-backgrounding".to_string(),
        "--disable-features=TranslateUI".to_string(),
        "--disable-extensions".to_string(),
        "--disable-default-apps".to_string(),
        "--disable-sync".to_string(),
        "--no-first-run".to_string(),
        "--hide-scrollbars".to_string(),
        "--mute-audio".to_string(),
        format!("--window-size={},{}", viewport.width, viewport.height),
        format!("--user-data-dir=/tmp/showcase-capture-{unique_id}"),
    ];

    if let Some(user_agent) = &config.user_agent {
        args.push(format!("--user-agent={user_agent}"));
    }

    args
}

pub fn create_browser_config(
    config: &Config,
) -> Result<chromiumoxide::browser::BrowserConfig, ShowcaseError> {
    use chromiumoxide::browser::BrowserConfig;

    let viewport = config.default_viewport.resolve();
    let mut builder = BrowserConfig::builder()
        .window_size(viewport.width, viewport.height)
        .args(get_chrome_args(config));

    if let Some(chrome_path) = &config.chrome_path {
        builder = builder.chrome_executable(chrome_path);
    }

    builder
        .build()
        .map_err(ShowcaseError::EngineInitialization)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.session_pool_size, 3);
        assert_eq!(config.navigation_timeout, Duration::from_secs(30));
        assert_eq!(config.cache_max_entries, 50);
        assert_eq!(config.output_format, OutputFormat::Png);
        assert!(config.blocked_resources.contains(&ResourceClass::Font));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_rejects_zero_values() {
        let config = Config {
            session_pool_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ShowcaseError::Configuration(_))
        ));

        let config = Config {
            cache_ttl: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            site_url_template: "https://static.example".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_site_and_share_urls() {
        let config = Config {
            share_base_url: "https://builder.example/showcase/".into(),
            ..Default::default()
        };
        assert_eq!(config.site_url("joes-bakery"), "https://joes-bakery.sites.local");
        assert_eq!(
            config.share_url("joes-bakery"),
            "https://builder.example/showcase/joes-bakery"
        );
    }

    #[test]
    fn test_viewport_spec_parsing() {
        let spec: ViewportSpec = "mobile".parse().unwrap();
        assert_eq!(spec.resolve().width, 375);

        let spec: ViewportSpec = "1280x720".parse().unwrap();
        assert_eq!(spec.resolve(), Viewport::new(1280, 720));

        assert!("0x720".parse::<ViewportSpec>().is_err());
        assert!("huge".parse::<ViewportSpec>().is_err());
    }

    #[test]
    fn test_selector_candidates_keep_priority_order() {
        let selectors = SectionSelectors::default();
        let reviews: Vec<&str> = selectors.candidates(Section::Reviews).collect();
        assert_eq!(
            reviews,
            vec!["[data-section=\"reviews\"]", "section.reviews", "#reviews", "#testimonials"]
        );

        let sparse = SectionSelectors {
            hero: " #a ,, #b ".into(),
            ..SectionSelectors::default()
        };
        assert_eq!(sparse.candidates(Section::Hero).collect::<Vec<_>>(), vec!["#a", "#b"]);
    }

    #[test]
    fn test_config_partial_json() {
        let config: Config =
            serde_json::from_str(r#"{"session_pool_size": 7, "default_viewport": "tablet"}"#)
                .unwrap();
        assert_eq!(config.session_pool_size, 7);
        assert_eq!(config.default_viewport.resolve().width, 768);
        assert_eq!(config.cache_max_entries, 50);
    }

    #[test]
    fn test_chrome_args_generation() {
        let config = Config::default();
        let args = get_chrome_args(&config);
        assert!(args.contains(&"--headless".to_string()));
        assert!(args.contains(&"--no-sandbox".to_string()));
        assert!(args.contains(&"--window-size=1920,1080".to_string()));
    }
}
