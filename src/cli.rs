use crate::{
    format_bytes, format_duration, Config, HighlightOptions, InMemorySiteDirectory,
    OutputFormat, ScreenshotOptions, ShowcaseRecord, ShowcaseService, SiteDirectory, Viewport,
    ViewportSpec,
};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::info;

#[derive(Parser)]
#[command(name = "showcase-capture")]
#[command(about = "Captures and caches highlight showcases of published sites")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, help = "Maximum idle capture sessions")]
    pub pool_size: Option<usize>,

    #[arg(long, help = "Cache TTL in seconds")]
    pub ttl: Option<u64>,

    #[arg(long, help = "Navigation timeout in seconds")]
    pub timeout: Option<u64>,

    #[arg(long, help = "Chrome executable path")]
    pub chrome_path: Option<String>,

    #[arg(long, help = "Directory for persisted showcases")]
    pub storage_dir: Option<PathBuf>,

    #[arg(long, help = "JSON file mapping site keys to business details")]
    pub sites: Option<PathBuf>,

    #[arg(long, help = "Expose Prometheus metrics on this port")]
    pub metrics_port: Option<u16>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate (or serve from cache) the showcase for a site
    Generate {
        #[arg(short, long, help = "Site key (subdomain)")]
        key: String,

        #[arg(long, help = "Viewport: desktop, tablet, mobile or WIDTHxHEIGHT")]
        viewport: Option<ViewportSpec>,
    },

    /// Discard cached and persisted state for a site and regenerate it
    Refresh {
        #[arg(short, long, help = "Site key (subdomain)")]
        key: String,

        #[arg(long, help = "Viewport: desktop, tablet, mobile or WIDTHxHEIGHT")]
        viewport: Option<ViewportSpec>,
    },

    /// Delete the persisted showcase for a site
    Delete {
        #[arg(short, long, help = "Site key (subdomain)")]
        key: String,
    },

    /// List persisted showcases, newest first
    List,

    /// Take a single page screenshot
    Screenshot {
        #[arg(short, long, help = "URL to screenshot")]
        url: String,

        #[arg(short, long, help = "Output file path; the extension picks the format")]
        output: PathBuf,

        #[arg(long, help = "Take full page screenshot")]
        full_page: bool,

        #[arg(long, help = "Quality for JPEG/WebP output (0-100)")]
        quality: Option<u8>,

        #[arg(long, help = "Viewport width")]
        width: Option<u32>,

        #[arg(long, help = "Viewport height")]
        height: Option<u32>,
    },

    /// Show cache, pool and engine statistics
    Stats,

    /// Validate configuration
    Validate {
        #[arg(short, long, help = "Configuration file to validate")]
        config: PathBuf,
    },
}

impl Cli {
    /// Applies command line overrides on top of `config`.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(pool_size) = self.pool_size {
            config.session_pool_size = pool_size;
        }
        if let Some(ttl) = self.ttl {
            config.cache_ttl = Duration::from_secs(ttl);
        }
        if let Some(timeout) = self.timeout {
            config.navigation_timeout = Duration::from_secs(timeout);
        }
        if let Some(chrome_path) = &self.chrome_path {
            config.chrome_path = Some(chrome_path.clone());
        }
        if let Some(storage_dir) = &self.storage_dir {
            config.storage_dir = storage_dir.clone();
        }
    }
}

pub struct CliRunner {
    pub config: Config,
    pub service: Arc<ShowcaseService>,
}

impl CliRunner {
    pub async fn new(config: Config, args: &Cli) -> anyhow::Result<Self> {
        let sites: Arc<dyn SiteDirectory> = match &args.sites {
            Some(path) => {
                let directory = InMemorySiteDirectory::from_file(path)
                    .await
                    .with_context(|| format!("loading site directory {}", path.display()))?;
                info!("Loaded {} sites from {}", directory.len(), path.display());
                Arc::new(directory)
            }
            None => Arc::new(InMemorySiteDirectory::new()),
        };

        let service = Arc::new(ShowcaseService::with_chrome(config.clone(), sites)?);
        Ok(Self { config, service })
    }

    pub async fn run(&self, command: Commands) -> anyhow::Result<()> {
        match command {
            Commands::Generate { key, viewport } => self.run_generate(&key, viewport).await,
            Commands::Refresh { key, viewport } => self.run_refresh(&key, viewport).await,
            Commands::Delete { key } => self.run_delete(&key).await,
            Commands::List => self.run_list().await,
            Commands::Screenshot {
                url,
                output,
                full_page,
                quality,
                width,
                height,
            } => {
                let options = self.screenshot_options(&output, full_page, quality, width, height);
                self.run_screenshot(&url, &output, options).await
            }
            Commands::Stats => self.show_stats().await,
            Commands::Validate { config } => validate_config_file(&config).await,
        }
    }

    pub async fn run_generate(
        &self,
        key: &str,
        viewport: Option<ViewportSpec>,
    ) -> anyhow::Result<()> {
        info!("Generating showcase for {}", key);
        let options = HighlightOptions { viewport };
        let record = self.service.generate_showcase(key, &options).await?;
        print_record(&record);
        Ok(())
    }

    pub async fn run_refresh(
        &self,
        key: &str,
        viewport: Option<ViewportSpec>,
    ) -> anyhow::Result<()> {
        info!("Refreshing showcase for {}", key);
        let options = HighlightOptions { viewport };
        let record = self.service.refresh_showcase(key, &options).await?;
        print_record(&record);
        Ok(())
    }

    pub async fn run_delete(&self, key: &str) -> anyhow::Result<()> {
        if self.service.delete_showcase(key).await? {
            println!("Deleted showcase for {key}");
        } else {
            println!("No showcase stored for {key}");
        }
        Ok(())
    }

    pub async fn run_list(&self) -> anyhow::Result<()> {
        let summaries = self.service.list_showcases().await?;
        if summaries.is_empty() {
            println!("No showcases stored in {}", self.config.storage_dir.display());
            return Ok(());
        }

        println!("{} showcases:", summaries.len());
        for summary in summaries {
            println!(
                "  {:<24} {:<32} {} sections  {}  {}",
                summary.subdomain,
                summary.business_name,
                summary.section_count,
                summary.generated_at.format("%Y-%m-%d %H:%M:%S"),
                summary.url
            );
        }
        Ok(())
    }

    pub fn screenshot_options(
        &self,
        output: &Path,
        full_page: bool,
        quality: Option<u8>,
        width: Option<u32>,
        height: Option<u32>,
    ) -> ScreenshotOptions {
        let viewport = if width.is_some() || height.is_some() {
            let default = self.config.default_viewport.resolve();
            Some(ViewportSpec::Custom(Viewport {
                width: width.unwrap_or(default.width),
                height: height.unwrap_or(default.height),
                ..default
            }))
        } else {
            None
        };

        ScreenshotOptions {
            viewport,
            full_page,
            quality,
            format: Some(format_for_path(output)),
        }
    }

    pub async fn run_screenshot(
        &self,
        url: &str,
        output: &Path,
        options: ScreenshotOptions,
    ) -> anyhow::Result<()> {
        info!("Taking screenshot of: {}", url);
        let screenshot = self.service.capture().capture_screenshot(url, &options).await?;

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(output, &screenshot.data)
            .await
            .with_context(|| format!("writing {}", output.display()))?;

        println!("Screenshot captured successfully:");
        println!("  URL: {}", screenshot.url);
        println!("  Output: {}", output.display());
        println!("  Format: {:?}", screenshot.format);
        println!("  Dimensions: {}x{}", screenshot.width, screenshot.height);
        println!("  Size: {}", format_bytes(screenshot.data.len()));
        println!("  Duration: {}", format_duration(screenshot.duration));
        Ok(())
    }

    pub async fn show_stats(&self) -> anyhow::Result<()> {
        let stats = self.service.get_stats().await;
        let pool = self.service.pool_stats().await;

        println!("Showcase Service");
        println!("================");
        println!("Cache:");
        println!(
            "  Entries: {}/{}",
            stats.cache_size, self.config.cache_max_entries
        );
        println!("  TTL: {}", format_duration(self.config.cache_ttl));
        println!("  In-flight generations: {}", stats.in_flight_count);
        println!("\nSession Pool:");
        println!("  Idle sessions: {}/{}", pool.idle_sessions, pool.max_idle);
        println!("  Sessions created: {}", pool.sessions_created);
        println!("  Sessions discarded: {}", pool.sessions_discarded);
        println!("\nEngine:");
        println!("  Active: {}", stats.engine_active);
        Ok(())
    }
}

fn print_record(record: &ShowcaseRecord) {
    println!("Showcase for {}:", record.subdomain);
    println!("  Business: {}", record.metadata.business_name);
    println!("  Template: {}", record.metadata.template);
    println!("  Generated: {}", record.generated_at.to_rfc3339());
    println!("  Share URL: {}", record.url);
    println!("  Sections:");
    for section in &record.sections {
        match section.height {
            Some(height) => println!(
                "    {:<9} {}x{}  {}",
                section.name.as_str(),
                section.width,
                height,
                section.image_path
            ),
            None => println!(
                "    {:<9} {}  {}",
                section.name.as_str(),
                section.width,
                section.image_path
            ),
        }
    }
}

/// Picks the screenshot format from the output file extension.
pub fn format_for_path(path: &Path) -> OutputFormat {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => OutputFormat::Jpeg,
        Some("webp") => OutputFormat::Webp,
        _ => OutputFormat::Png,
    }
}

pub async fn load_config(args: &Cli) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(config_path) => {
            let content = fs::read_to_string(config_path)
                .await
                .with_context(|| format!("reading {}", config_path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", config_path.display()))?
        }
        None => Config::default(),
    };

    args.apply_overrides(&mut config);
    config.validate()?;

    info!("Configuration loaded successfully");
    info!("Idle session pool size: {}", config.session_pool_size);
    info!(
        "Cache: {} entries, TTL {:?}",
        config.cache_max_entries, config.cache_ttl
    );
    info!("Navigation timeout: {:?}", config.navigation_timeout);
    info!("Storage directory: {}", config.storage_dir.display());

    Ok(config)
}

pub async fn validate_config_file(config_path: &Path) -> anyhow::Result<()> {
    println!("Validating configuration: {}", config_path.display());

    let content = fs::read_to_string(config_path).await?;
    let config: Config = serde_json::from_str(&content)?;
    config.validate()?;

    let viewport = config.default_viewport.resolve();
    println!("Configuration is valid:");
    println!("  Idle session pool size: {}", config.session_pool_size);
    println!("  Navigation timeout: {:?}", config.navigation_timeout);
    println!("  Cache TTL: {:?}", config.cache_ttl);
    println!("  Cache max entries: {}", config.cache_max_entries);
    println!("  Output format: {:?}", config.output_format);
    println!("  Viewport: {}x{}", viewport.width, viewport.height);
    println!("  Storage directory: {}", config.storage_dir.display());

    Ok(())
}

pub fn setup_logging(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generate_with_viewport() {
        let cli = Cli::try_parse_from([
            "showcase-capture",
            "generate",
            "--key",
            "joes-bakery",
            "--viewport",
            "1280x720",
        ])
        .unwrap();

        match cli.command {
            Commands::Generate { key, viewport } => {
                assert_eq!(key, "joes-bakery");
                assert_eq!(viewport.unwrap().resolve(), Viewport::new(1280, 720));
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn test_bad_viewport_is_rejected() {
        let result = Cli::try_parse_from([
            "showcase-capture",
            "generate",
            "--key",
            "joes-bakery",
            "--viewport",
            "huge",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_overrides() {
        let cli = Cli::try_parse_from([
            "showcase-capture",
            "--pool-size",
            "7",
            "--ttl",
            "120",
            "--timeout",
            "10",
            "--storage-dir",
            "/tmp/showcases",
            "list",
        ])
        .unwrap();

        let mut config = Config::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.session_pool_size, 7);
        assert_eq!(config.cache_ttl, Duration::from_secs(120));
        assert_eq!(config.navigation_timeout, Duration::from_secs(10));
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/showcases"));
        assert!(matches!(cli.command, Commands::List));
    }

    #[test]
    fn test_format_for_path() {
        assert_eq!(format_for_path(Path::new("shot.png")), OutputFormat::Png);
        assert_eq!(format_for_path(Path::new("shot.JPG")), OutputFormat::Jpeg);
        assert_eq!(format_for_path(Path::new("shot.webp")), OutputFormat::Webp);
        assert_eq!(format_for_path(Path::new("shot")), OutputFormat::Png);
    }

    #[tokio::test]
    async fn test_validate_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let good = dir.path().join("good.json");
        std::fs::write(&good, r#"{"session_pool_size": 4, "cache_max_entries": 10}"#).unwrap();
        assert!(validate_config_file(&good).await.is_ok());

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, r#"{"session_pool_size": 0}"#).unwrap();
        assert!(validate_config_file(&bad).await.is_err());
    }
}
