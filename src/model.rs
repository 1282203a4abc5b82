//! Showcase data model shared by the orchestrator, cache and stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named, independently captured region of a published site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Hero,
    Services,
    Reviews,
    Contact,
}

impl Section {
    /// All sections in display order.
    pub const ALL: [Section; 4] = [
        Section::Hero,
        Section::Services,
        Section::Reviews,
        Section::Contact,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Section::Hero => "hero",
            Section::Services => "services",
            Section::Reviews => "reviews",
            Section::Contact => "contact",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SectionCapture {
    pub name: Section,
    /// Path of the persisted image, relative to the storage root
    pub image_path: String,
    pub width: u32,
    pub height: Option<u32>,
}

/// Site details shown alongside the captured sections
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SiteInfo {
    pub business_name: String,
    pub template: String,
}

impl SiteInfo {
    /// Placeholder used when the site directory has nothing for a key.
    pub fn placeholder(key: &str) -> Self {
        Self {
            business_name: key.to_string(),
            template: "default".to_string(),
        }
    }
}

/// One generation pass for a site. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ShowcaseRecord {
    pub subdomain: String,
    /// Found sections, ordered hero, services, reviews, contact
    pub sections: Vec<SectionCapture>,
    pub metadata: SiteInfo,
    pub generated_at: DateTime<Utc>,
    pub url: String,
}

impl ShowcaseRecord {
    pub fn section(&self, name: Section) -> Option<&SectionCapture> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn summary(&self) -> ShowcaseSummary {
        ShowcaseSummary {
            subdomain: self.subdomain.clone(),
            business_name: self.metadata.business_name.clone(),
            section_count: self.sections.len(),
            generated_at: self.generated_at,
            url: self.url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShowcaseSummary {
    pub subdomain: String,
    pub business_name: String,
    pub section_count: usize,
    pub generated_at: DateTime<Utc>,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShowcaseStats {
    pub cache_size: usize,
    pub in_flight_count: usize,
    pub idle_pool_size: usize,
    pub engine_active: bool,
}
