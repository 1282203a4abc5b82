//! Automation session interface
//!
//! The capture engine drives a remote rendering engine through these traits.
//! `crate::chrome` implements them on top of headless Chromium; tests plug in
//! a scripted backend.

use crate::config::{OutputFormat, Viewport};
use crate::error::ShowcaseResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Starts the underlying automation engine.
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    async fn launch(&self) -> ShowcaseResult<Arc<dyn AutomationEngine>>;
}

/// A running automation engine.
#[async_trait]
pub trait AutomationEngine: Send + Sync {
    /// Opens a new, blank session.
    async fn new_session(&self) -> ShowcaseResult<Box<dyn AutomationSession>>;

    async fn close(&self) -> ShowcaseResult<()>;
}

/// A single controllable rendering context.
///
/// Methods take `&self` so several element captures can run against the same
/// session concurrently.
#[async_trait]
pub trait AutomationSession: Send + Sync {
    async fn set_viewport(&self, viewport: &Viewport) -> ShowcaseResult<()>;

    /// Navigates and waits for `options.wait_condition`. Callers enforce the
    /// hard timeout.
    async fn navigate(&self, url: &str, options: &NavigationOptions) -> ShowcaseResult<()>;

    async fn screenshot(&self, params: &ScreenshotParams) -> ShowcaseResult<Vec<u8>>;

    /// First element matching `selector`, or `None` when nothing matches.
    async fn query_selector(&self, selector: &str)
        -> ShowcaseResult<Option<Box<dyn ElementHandle>>>;

    /// Rejects every request whose resource class the filter blocks.
    async fn intercept_requests(&self, filter: RequestFilter) -> ShowcaseResult<()>;

    /// Returns the session to a blank, idle state.
    async fn reset(&self) -> ShowcaseResult<()>;

    async fn close(&self) -> ShowcaseResult<()>;
}

#[async_trait]
pub trait ElementHandle: Send + Sync {
    /// PNG screenshot of the element's bounding box.
    async fn screenshot(&self) -> ShowcaseResult<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitCondition {
    DomContentLoaded,
    Load,
    /// Load event plus a quiet period with no new resource requests
    NetworkIdle,
}

#[derive(Debug, Clone, Copy)]
pub struct NavigationOptions {
    pub timeout: Duration,
    pub wait_condition: WaitCondition,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenshotParams {
    pub full_page: bool,
    /// Only honoured by lossy formats
    pub quality: Option<u8>,
    pub format: OutputFormat,
}

impl Default for ScreenshotParams {
    fn default() -> Self {
        Self {
            full_page: false,
            quality: None,
            format: OutputFormat::Png,
        }
    }
}

/// Classes of network resources a session may refuse to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceClass {
    Font,
    Media,
    WebSocket,
    Image,
    Stylesheet,
    Script,
}

/// Set of resource classes rejected by a session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestFilter {
    blocked: Vec<ResourceClass>,
}

impl RequestFilter {
    pub fn new(blocked: impl IntoIterator<Item = ResourceClass>) -> Self {
        let mut filter = Self::default();
        for class in blocked {
            if !filter.blocked.contains(&class) {
                filter.blocked.push(class);
            }
        }
        filter
    }

    pub fn should_block(&self, class: ResourceClass) -> bool {
        self.blocked.contains(&class)
    }

    pub fn blocked(&self) -> &[ResourceClass] {
        &self.blocked
    }

    pub fn is_empty(&self) -> bool {
        self.blocked.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_filter_dedups_and_blocks() {
        let filter = RequestFilter::new([
            ResourceClass::Font,
            ResourceClass::Media,
            ResourceClass::Font,
            ResourceClass::WebSocket,
        ]);
        assert_eq!(filter.blocked().len(), 3);
        assert!(filter.should_block(ResourceClass::Font));
        assert!(filter.should_block(ResourceClass::WebSocket));
        assert!(!filter.should_block(ResourceClass::Stylesheet));
        assert!(!filter.should_block(ResourceClass::Image));
        assert!(RequestFilter::default().is_empty());
    }
}
