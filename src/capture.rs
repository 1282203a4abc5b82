//! Capture orchestrator
//!
//! Drives a pooled session through viewport setup, navigation and either a
//! single page screenshot or the four highlight section captures. A session
//! goes back to the pool only when the whole capture succeeded; any failure
//! disposes it.

use crate::automation::{AutomationSession, NavigationOptions, ScreenshotParams};
use crate::config::{Config, OutputFormat, Viewport, ViewportSpec};
use crate::error::{ShowcaseError, ShowcaseResult};
use crate::metrics::Metrics;
use crate::model::{Section, SectionCapture};
use crate::session_pool::{CaptureSession, SessionPool};
use crate::store::ArtifactStore;
use crate::utils::{probe_dimensions, validate_site_key, validate_url};
use futures::future::{join_all, try_join_all};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Options for a single page screenshot
#[derive(Debug, Clone, Default)]
pub struct ScreenshotOptions {
    /// Falls back to the configured default viewport
    pub viewport: Option<ViewportSpec>,
    pub full_page: bool,
    /// Falls back to the configured screenshot quality
    pub quality: Option<u8>,
    /// Falls back to the configured output format
    pub format: Option<OutputFormat>,
}

#[derive(Debug, Clone)]
pub struct Screenshot {
    pub url: String,
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    pub duration: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct HighlightOptions {
    pub viewport: Option<ViewportSpec>,
}

impl From<ViewportSpec> for HighlightOptions {
    fn from(viewport: ViewportSpec) -> Self {
        Self {
            viewport: Some(viewport),
        }
    }
}

/// Sections found on a page, both as an ordered list and by name.
///
/// `services` is a list so a site can later expose several service cards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Highlights {
    pub sections: Vec<SectionCapture>,
    pub hero: Option<SectionCapture>,
    pub services: Vec<SectionCapture>,
    pub reviews: Option<SectionCapture>,
    pub contact: Option<SectionCapture>,
}

impl Highlights {
    pub fn from_sections(sections: Vec<SectionCapture>) -> Self {
        let mut highlights = Highlights::default();
        for capture in &sections {
            match capture.name {
                Section::Hero => highlights.hero = Some(capture.clone()),
                Section::Services => highlights.services.push(capture.clone()),
                Section::Reviews => highlights.reviews = Some(capture.clone()),
                Section::Contact => highlights.contact = Some(capture.clone()),
            }
        }
        highlights.sections = sections;
        highlights
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

pub struct CaptureOrchestrator {
    pool: Arc<SessionPool>,
    store: Arc<dyn ArtifactStore>,
    config: Config,
    metrics: Arc<Metrics>,
}

impl CaptureOrchestrator {
    pub fn new(
        pool: Arc<SessionPool>,
        store: Arc<dyn ArtifactStore>,
        config: Config,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            pool,
            store,
            config,
            metrics,
        }
    }

    pub fn pool(&self) -> &Arc<SessionPool> {
        &self.pool
    }

    /// Screenshot of a whole page.
    pub async fn capture_screenshot(
        &self,
        url: &str,
        options: &ScreenshotOptions,
    ) -> ShowcaseResult<Screenshot> {
        let start_time = Instant::now();
        let url = validate_url(url)?;
        let viewport = options
            .viewport
            .unwrap_or(self.config.default_viewport)
            .resolve();
        let format = options.format.unwrap_or(self.config.output_format);
        let params = ScreenshotParams {
            full_page: options.full_page,
            quality: Some(options.quality.unwrap_or(self.config.screenshot_quality)),
            format,
        };

        let session = self.pool.acquire().await?;
        let data = match self.render_page(&session, url.as_str(), &viewport, &params).await {
            Ok(data) => data,
            Err(e) => {
                warn!("Screenshot of {} failed: {}", url, e);
                self.pool.discard(session, "screenshot failed").await;
                return Err(e);
            }
        };
        self.pool.release(session).await;

        let (width, height) = probe_dimensions(&data).unwrap_or((viewport.width, viewport.height));
        let duration = start_time.elapsed();
        info!(
            "Captured {} ({}x{}, {} bytes) in {:?}",
            url,
            width,
            height,
            data.len(),
            duration
        );

        Ok(Screenshot {
            url: url.to_string(),
            data,
            width,
            height,
            format,
            duration,
        })
    }

    async fn render_page(
        &self,
        session: &CaptureSession,
        url: &str,
        viewport: &Viewport,
        params: &ScreenshotParams,
    ) -> ShowcaseResult<Vec<u8>> {
        session.page().set_viewport(viewport).await?;
        self.navigate_with_timeout(session.page(), url).await?;
        session.page().screenshot(params).await
    }

    /// Captures every highlight section present on the page and persists
    /// each image under `key`.
    pub async fn capture_highlights(
        &self,
        key: &str,
        url: &str,
        options: &HighlightOptions,
    ) -> ShowcaseResult<Highlights> {
        validate_site_key(key)?;
        let url = validate_url(url)?;
        let viewport = options
            .viewport
            .unwrap_or(self.config.default_viewport)
            .resolve();

        let session = self.pool.acquire().await?;
        let found = match self.capture_sections(&session, url.as_str(), &viewport).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Highlight capture for {} failed: {}", key, e);
                self.pool.discard(session, "highlight capture failed").await;
                return Err(e);
            }
        };
        self.pool.release(session).await;

        debug!("Found {} of {} sections for {}", found.len(), Section::ALL.len(), key);

        let persisted = found
            .into_iter()
            .map(|(section, data)| self.persist_section(key, section, data, &viewport));
        Ok(Highlights::from_sections(join_all(persisted).await))
    }

    async fn capture_sections(
        &self,
        session: &CaptureSession,
        url: &str,
        viewport: &Viewport,
    ) -> ShowcaseResult<Vec<(Section, Vec<u8>)>> {
        let page = session.page();
        page.set_viewport(viewport).await?;
        self.navigate_with_timeout(page, url).await?;

        let attempts = Section::ALL
            .iter()
            .map(|&section| self.capture_section(page, section));
        let results = try_join_all(attempts).await?;
        Ok(results.into_iter().flatten().collect())
    }

    /// `Ok(None)` when none of the section's selectors match.
    async fn capture_section(
        &self,
        page: &dyn AutomationSession,
        section: Section,
    ) -> ShowcaseResult<Option<(Section, Vec<u8>)>> {
        let mut found = None;
        for selector in self.config.selectors.candidates(section) {
            if let Some(element) = page.query_selector(selector).await? {
                found = Some(element);
                break;
            }
        }
        let Some(element) = found else {
            debug!("Section {} not present", section);
            return Ok(None);
        };

        let data = element.screenshot().await.map_err(|e| match e {
            ShowcaseError::CaptureFailed(_) => e,
            other => ShowcaseError::CaptureFailed(format!("{section}: {other}")),
        })?;
        Ok(Some((section, data)))
    }

    async fn persist_section(
        &self,
        key: &str,
        section: Section,
        data: Vec<u8>,
        viewport: &Viewport,
    ) -> SectionCapture {
        let image_path = match self.store.write_artifact(key, section, &data).await {
            Ok(path) => path,
            Err(e) => {
                warn!("Failed to persist {} section for {}: {}", section, key, e);
                self.metrics.record_persistence_failure();
                self.store.artifact_path(key, section)
            }
        };

        let dimensions = probe_dimensions(&data);
        SectionCapture {
            name: section,
            image_path,
            width: dimensions.map(|(w, _)| w).unwrap_or(viewport.width),
            height: dimensions.map(|(_, h)| h),
        }
    }

    async fn navigate_with_timeout(
        &self,
        page: &dyn AutomationSession,
        url: &str,
    ) -> ShowcaseResult<()> {
        let options = NavigationOptions {
            timeout: self.config.navigation_timeout,
            wait_condition: self.config.wait_condition,
        };

        match timeout(options.timeout, page.navigate(url, &options)).await {
            Ok(result) => result,
            Err(_) => Err(ShowcaseError::NavigationTimeout(options.timeout)),
        }
    }
}
