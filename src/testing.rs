//! Scripted automation backend for tests.

use crate::automation::{
    AutomationEngine, AutomationSession, ElementHandle, EngineLauncher, NavigationOptions,
    RequestFilter, ScreenshotParams,
};
use crate::config::{Config, SectionSelectors, Viewport};
use crate::error::{ShowcaseError, ShowcaseResult};
use async_trait::async_trait;
use std::collections::HashSet;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Counters and switches shared by every object the fake launcher creates.
#[derive(Default)]
pub struct FakeState {
    pub launches: AtomicUsize,
    pub engines_closed: AtomicUsize,
    pub sessions_created: AtomicUsize,
    pub sessions_closed: AtomicUsize,
    pub sessions_reset: AtomicUsize,
    pub navigations: AtomicUsize,
    /// Number of upcoming launches that fail
    pub failing_launches: AtomicUsize,
    pub fail_navigation: AtomicBool,
    pub hang_navigation: AtomicBool,
    pub fail_reset: AtomicBool,
    pub launch_delay: Mutex<Duration>,
    pub missing_selectors: Mutex<HashSet<String>>,
    pub failing_selectors: Mutex<HashSet<String>>,
    pub filters: Mutex<Vec<RequestFilter>>,
    /// Every selector queried, in call order
    pub queried: Mutex<Vec<String>>,
}

impl FakeState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn set_launch_delay(&self, delay: Duration) {
        *self.launch_delay.lock().unwrap() = delay;
    }

    pub fn fail_next_launches(&self, count: usize) {
        self.failing_launches.store(count, Ordering::SeqCst);
    }

    pub fn hide_selector(&self, selector: &str) {
        self.missing_selectors
            .lock()
            .unwrap()
            .insert(selector.to_string());
    }

    pub fn break_selector(&self, selector: &str) {
        self.failing_selectors
            .lock()
            .unwrap()
            .insert(selector.to_string());
    }
}

/// Encoded PNG of the given size.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::DynamicImage::new_rgb8(width, height)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

/// Config with one plain id selector per section.
pub fn test_config() -> Config {
    Config {
        session_pool_size: 2,
        navigation_timeout: Duration::from_secs(5),
        selectors: SectionSelectors {
            hero: "#hero".into(),
            services: "#services".into(),
            reviews: "#reviews".into(),
            contact: "#contact".into(),
        },
        ..Default::default()
    }
}

pub struct FakeLauncher {
    state: Arc<FakeState>,
}

impl FakeLauncher {
    pub fn new(state: Arc<FakeState>) -> Arc<Self> {
        Arc::new(Self { state })
    }
}

#[async_trait]
impl EngineLauncher for FakeLauncher {
    async fn launch(&self) -> ShowcaseResult<Arc<dyn AutomationEngine>> {
        self.state.launches.fetch_add(1, Ordering::SeqCst);

        let delay = *self.state.launch_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .state
            .failing_launches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(ShowcaseError::EngineInitialization(
                "fake launch failure".into(),
            ));
        }

        Ok(Arc::new(FakeEngine {
            state: self.state.clone(),
        }))
    }
}

struct FakeEngine {
    state: Arc<FakeState>,
}

#[async_trait]
impl AutomationEngine for FakeEngine {
    async fn new_session(&self) -> ShowcaseResult<Box<dyn AutomationSession>> {
        self.state.sessions_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            state: self.state.clone(),
            viewport: Mutex::new(Viewport::default()),
        }))
    }

    async fn close(&self) -> ShowcaseResult<()> {
        self.state.engines_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeSession {
    state: Arc<FakeState>,
    viewport: Mutex<Viewport>,
}

#[async_trait]
impl AutomationSession for FakeSession {
    async fn set_viewport(&self, viewport: &Viewport) -> ShowcaseResult<()> {
        *self.viewport.lock().unwrap() = *viewport;
        Ok(())
    }

    async fn navigate(&self, url: &str, _options: &NavigationOptions) -> ShowcaseResult<()> {
        self.state.navigations.fetch_add(1, Ordering::SeqCst);
        if self.state.hang_navigation.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.state.fail_navigation.load(Ordering::SeqCst) {
            return Err(ShowcaseError::Navigation(format!("{url}: net::ERR_FAILED")));
        }
        Ok(())
    }

    async fn screenshot(&self, params: &ScreenshotParams) -> ShowcaseResult<Vec<u8>> {
        let viewport = *self.viewport.lock().unwrap();
        let height = if params.full_page {
            viewport.height * 2
        } else {
            viewport.height
        };
        Ok(png(viewport.width, height))
    }

    async fn query_selector(
        &self,
        selector: &str,
    ) -> ShowcaseResult<Option<Box<dyn ElementHandle>>> {
        self.state.queried.lock().unwrap().push(selector.to_string());
        if self.state.missing_selectors.lock().unwrap().contains(selector) {
            return Ok(None);
        }
        let fail = self.state.failing_selectors.lock().unwrap().contains(selector);
        let width = self.viewport.lock().unwrap().width;
        Ok(Some(Box::new(FakeElement { width, fail })))
    }

    async fn intercept_requests(&self, filter: RequestFilter) -> ShowcaseResult<()> {
        self.state.filters.lock().unwrap().push(filter);
        Ok(())
    }

    async fn reset(&self) -> ShowcaseResult<()> {
        if self.state.fail_reset.load(Ordering::SeqCst) {
            return Err(ShowcaseError::Navigation("reset failed".into()));
        }
        self.state.sessions_reset.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> ShowcaseResult<()> {
        self.state.sessions_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeElement {
    width: u32,
    fail: bool,
}

#[async_trait]
impl ElementHandle for FakeElement {
    async fn screenshot(&self) -> ShowcaseResult<Vec<u8>> {
        if self.fail {
            return Err(ShowcaseError::CaptureFailed("element detached".into()));
        }
        Ok(png(self.width, 240))
    }
}
