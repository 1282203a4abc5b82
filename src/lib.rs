//! # Showcase Capture
//!
//! Produces a cached, shareable "highlight reel" of a published site: the
//! hero, services, reviews and contact sections, each captured as its own
//! image by a headless browser. Rendering a page is expensive, so the engine
//! keeps one browser process alive, reuses browser pages between captures
//! and serves repeat requests from an in-memory cache.
//!
//! ## Architecture
//!
//! | Layer | Type | Role |
//! |-------|------|------|
//! | Engine | [`EngineManager`] | Lazily launches the single browser; concurrent first callers share one launch |
//! | Sessions | [`SessionPool`] | Bounded idle list of reset pages; failed sessions are closed, never pooled |
//! | Capture | [`CaptureOrchestrator`] | Viewport, navigation with a hard timeout, page or section screenshots |
//! | Cache | [`ShowcaseCache`] | TTL expiry plus a cap that evicts the oldest entries |
//! | Service | [`ShowcaseService`] | Generate, refresh, delete, list and stats |
//! | Storage | [`ArtifactStore`], [`SiteDirectory`] | Persisted images/records and business details |
//!
//! The browser is reached only through the traits in [`automation`]; the
//! [`chrome`] module implements them with `chromiumoxide`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use showcase_capture::{Config, HighlightOptions, InMemorySiteDirectory, ShowcaseService};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = ShowcaseService::with_chrome(
//!         Config::default(),
//!         Arc::new(InMemorySiteDirectory::new()),
//!     )?;
//!
//!     let record = service
//!         .generate_showcase("joes-bakery", &HighlightOptions::default())
//!         .await?;
//!     for section in &record.sections {
//!         println!("{}: {}", section.name, section.image_path);
//!     }
//!
//!     service.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! showcase-capture generate --key joes-bakery --viewport mobile
//! showcase-capture refresh --key joes-bakery
//! showcase-capture list
//! showcase-capture screenshot --url https://example.com --output page.png --full-page
//! ```

/// Configuration and settings
pub mod config;

/// Error types and error handling utilities
pub mod error;

/// Automation session interface consumed by the capture engine
pub mod automation;

/// Headless Chromium implementation of the automation interface
pub mod chrome;

/// Engine instance manager
pub mod engine;

/// Pool of reusable capture sessions
pub mod session_pool;

/// Page and highlight section capture
pub mod capture;

/// In-memory showcase cache
pub mod cache;

/// Persistence and site metadata adapters
pub mod store;

/// Showcase generation service
pub mod showcase;

/// Showcase data model
pub mod model;

/// Command-line interface implementation
pub mod cli;

/// Metrics collection and Prometheus export
pub mod metrics;

/// Utility functions and helpers
pub mod utils;

#[cfg(test)]
mod testing;


pub use automation::*;
pub use cache::*;
pub use capture::*;
pub use chrome::*;
pub use cli::*;
pub use config::*;
pub use engine::*;
pub use error::*;
pub use self::metrics::*;
pub use model::*;
pub use session_pool::*;
pub use showcase::*;
pub use store::*;
pub use utils::*;
