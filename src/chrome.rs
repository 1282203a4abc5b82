//! Headless Chromium backend for the automation traits
//!
//! One shared `Browser` process is the engine; every capture session is a
//! page in that browser.

use crate::automation::{
    AutomationEngine, AutomationSession, ElementHandle, EngineLauncher, NavigationOptions,
    RequestFilter, ResourceClass, ScreenshotParams, WaitCondition,
};
use crate::config::{create_browser_config, Config, OutputFormat, Viewport};
use crate::error::{ShowcaseError, ShowcaseResult};
use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::emulation::{
    ClearDeviceMetricsOverrideParams, SetDeviceMetricsOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::fetch::{
    EnableParams, EventRequestPaused, FailRequestParams, RequestPattern, RequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Resolves once no new resource entries have appeared for 500ms.
const NETWORK_IDLE_SCRIPT: &str = r#"
new Promise((resolve) => {
    let last = performance.getEntriesByType('resource').length;
    let quiet = 0;
    const tick = () => {
        const count = performance.getEntriesByType('resource').length;
        if (count === last) {
            quiet += 100;
            if (quiet >= 500) { resolve(true); return; }
        } else {
            last = count;
            quiet = 0;
        }
        setTimeout(tick, 100);
    };
    tick();
})
"#;

const BLANK_PAGE: &str = "about:blank";

pub struct ChromeLauncher {
    config: Config,
}

impl ChromeLauncher {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EngineLauncher for ChromeLauncher {
    async fn launch(&self) -> ShowcaseResult<Arc<dyn AutomationEngine>> {
        let browser_config = create_browser_config(&self.config)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ShowcaseError::EngineInitialization(e.to_string()))?;

        // The handler drives the DevTools connection and must be polled for
        // the browser to make progress.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    error!("Chromium handler error: {}", e);
                    break;
                }
            }
            info!("Chromium handler stream ended");
        });

        info!("Chromium engine launched");
        Ok(Arc::new(ChromeEngine {
            browser: Mutex::new(browser),
            handler: std::sync::Mutex::new(Some(handler_task)),
        }))
    }
}

pub struct ChromeEngine {
    browser: Mutex<Browser>,
    handler: std::sync::Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl AutomationEngine for ChromeEngine {
    async fn new_session(&self) -> ShowcaseResult<Box<dyn AutomationSession>> {
        let page = self
            .browser
            .lock()
            .await
            .new_page(BLANK_PAGE)
            .await
            .map_err(|e| ShowcaseError::SessionCreation(e.to_string()))?;

        Ok(Box::new(ChromeSession {
            page,
            interceptor: std::sync::Mutex::new(None),
        }))
    }

    async fn close(&self) -> ShowcaseResult<()> {
        let mut browser = self.browser.lock().await;
        let result = browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| ShowcaseError::EngineInitialization(e.to_string()));
        let _ = browser.wait().await;

        let handler = self
            .handler
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(handler) = handler {
            handler.abort();
        }
        result
    }
}

pub struct ChromeSession {
    page: Page,
    interceptor: std::sync::Mutex<Option<JoinHandle<()>>>,
}

fn resource_type(class: ResourceClass) -> ResourceType {
    match class {
        ResourceClass::Font => ResourceType::Font,
        ResourceClass::Media => ResourceType::Media,
        ResourceClass::WebSocket => ResourceType::WebSocket,
        ResourceClass::Image => ResourceType::Image,
        ResourceClass::Stylesheet => ResourceType::Stylesheet,
        ResourceClass::Script => ResourceType::Script,
    }
}

fn capture_format(format: OutputFormat) -> CaptureScreenshotFormat {
    match format {
        OutputFormat::Png => CaptureScreenshotFormat::Png,
        OutputFormat::Jpeg => CaptureScreenshotFormat::Jpeg,
        OutputFormat::Webp => CaptureScreenshotFormat::Webp,
    }
}

#[async_trait]
impl AutomationSession for ChromeSession {
    async fn set_viewport(&self, viewport: &Viewport) -> ShowcaseResult<()> {
        let params = SetDeviceMetricsOverrideParams::builder()
            .width(viewport.width)
            .height(viewport.height)
            .device_scale_factor(viewport.device_scale_factor)
            .mobile(viewport.mobile)
            .build()
            .map_err(ShowcaseError::CaptureFailed)?;

        self.page
            .execute(params)
            .await
            .map_err(|e| ShowcaseError::CaptureFailed(e.to_string()))?;
        Ok(())
    }

    async fn navigate(&self, url: &str, options: &NavigationOptions) -> ShowcaseResult<()> {
        // goto resolves after the load event
        self.page
            .goto(url)
            .await
            .map_err(|e| ShowcaseError::Navigation(e.to_string()))?;

        if options.wait_condition == WaitCondition::NetworkIdle {
            let params = EvaluateParams::builder()
                .expression(NETWORK_IDLE_SCRIPT)
                .await_promise(true)
                .return_by_value(true)
                .build()
                .map_err(ShowcaseError::Navigation)?;
            self.page
                .evaluate_expression(params)
                .await
                .map_err(|e| ShowcaseError::Navigation(e.to_string()))?;
        }
        Ok(())
    }

    async fn screenshot(&self, params: &ScreenshotParams) -> ShowcaseResult<Vec<u8>> {
        let mut builder = chromiumoxide::page::ScreenshotParams::builder()
            .format(capture_format(params.format))
            .full_page(params.full_page);
        if params.format != OutputFormat::Png {
            if let Some(quality) = params.quality {
                builder = builder.quality(quality as i64);
            }
        }

        self.page
            .screenshot(builder.build())
            .await
            .map_err(|e| ShowcaseError::CaptureFailed(e.to_string()))
    }

    async fn query_selector(
        &self,
        selector: &str,
    ) -> ShowcaseResult<Option<Box<dyn ElementHandle>>> {
        let elements = self
            .page
            .find_elements(selector)
            .await
            .map_err(|e| ShowcaseError::CaptureFailed(e.to_string()))?;

        Ok(elements
            .into_iter()
            .next()
            .map(|element| Box::new(ChromeElement { element }) as Box<dyn ElementHandle>))
    }

    async fn intercept_requests(&self, filter: RequestFilter) -> ShowcaseResult<()> {
        if filter.is_empty() {
            return Ok(());
        }

        let patterns: Vec<RequestPattern> = filter
            .blocked()
            .iter()
            .map(|class| {
                RequestPattern::builder()
                    .url_pattern("*")
                    .resource_type(resource_type(*class))
                    .request_stage(RequestStage::Request)
                    .build()
            })
            .collect();

        let mut paused = self
            .page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(|e| ShowcaseError::SessionCreation(e.to_string()))?;

        self.page
            .execute(EnableParams::builder().patterns(patterns).build())
            .await
            .map_err(|e| ShowcaseError::SessionCreation(e.to_string()))?;

        // Only blocked classes are paused, so every paused request is failed.
        let page = self.page.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let fail = FailRequestParams::new(
                    event.request_id.clone(),
                    ErrorReason::BlockedByClient,
                );
                if let Err(e) = page.execute(fail).await {
                    debug!("Failed to reject intercepted request: {}", e);
                }
            }
        });

        let previous = self
            .interceptor
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
        Ok(())
    }

    async fn reset(&self) -> ShowcaseResult<()> {
        self.page
            .goto(BLANK_PAGE)
            .await
            .map_err(|e| ShowcaseError::Navigation(e.to_string()))?;
        self.page
            .execute(ClearDeviceMetricsOverrideParams::default())
            .await
            .map_err(|e| ShowcaseError::CaptureFailed(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> ShowcaseResult<()> {
        let interceptor = self
            .interceptor
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(interceptor) = interceptor {
            interceptor.abort();
        }

        self.page.clone().close().await.map_err(|e| {
            warn!("Failed to close page: {}", e);
            ShowcaseError::CaptureFailed(e.to_string())
        })
    }
}

struct ChromeElement {
    element: Element,
}

#[async_trait]
impl ElementHandle for ChromeElement {
    async fn screenshot(&self) -> ShowcaseResult<Vec<u8>> {
        self.element
            .screenshot(CaptureScreenshotFormat::Png)
            .await
            .map_err(|e| ShowcaseError::CaptureFailed(e.to_string()))
    }
}
