use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Where a batch of raw records came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Scraper,
    UserSubmission,
    AdminManual,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Scraper => write!(f, "scraper"),
            SourceType::UserSubmission => write!(f, "user_submission"),
            SourceType::AdminManual => write!(f, "admin_manual"),
        }
    }
}

impl std::str::FromStr for SourceType {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scraper" => Ok(Self::Scraper),
            "user_submission" => Ok(Self::UserSubmission),
            "admin_manual" => Ok(Self::AdminManual),
            _ => Err(anyhow::anyhow!("Unknown source type: {}", s)),
        }
    }
}

/// Lifecycle status of a staged event. Flipped only by the auditor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Clean,
    Quarantined,
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventStatus::Clean => write!(f, "clean"),
            EventStatus::Quarantined => write!(f, "quarantined"),
        }
    }
}

impl std::str::FromStr for EventStatus {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clean" => Ok(Self::Clean),
            "quarantined" => Ok(Self::Quarantined),
            _ => Err(anyhow::anyhow!("Unknown event status: {}", s)),
        }
    }
}

/// Door policy as declared by the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AgeRestriction {
    #[default]
    #[serde(rename = "all_ages")]
    AllAges,
    #[serde(rename = "18+")]
    EighteenPlus,
    #[serde(rename = "21+")]
    TwentyOnePlus,
}

impl std::fmt::Display for AgeRestriction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgeRestriction::AllAges => write!(f, "all_ages"),
            AgeRestriction::EighteenPlus => write!(f, "18+"),
            AgeRestriction::TwentyOnePlus => write!(f, "21+"),
        }
    }
}

impl std::str::FromStr for AgeRestriction {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all_ages" => Ok(Self::AllAges),
            "18+" => Ok(Self::EighteenPlus),
            "21+" => Ok(Self::TwentyOnePlus),
            _ => Err(anyhow::anyhow!("Unknown age restriction: {}", s)),
        }
    }
}

/// One raw event document as scrapers and submission forms produce it.
///
/// Only the three identity fields are required — they feed the fingerprint.
/// Everything else is volatile and may be corrected by a later scrape.
/// Unknown fields in the source document (scrape timestamps, scraper version
/// tags) are ignored on deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEventRecord {
    pub venue_id: i64,
    pub event_date: NaiveDate,
    pub start_time: NaiveTime,

    #[serde(default)]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub price_min_cents: Option<i64>,
    #[serde(default)]
    pub price_max_cents: Option<i64>,
    #[serde(default)]
    pub is_free: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub age_restriction: AgeRestriction,
    #[serde(default)]
    pub ticket_url: Option<String>,
    #[serde(default)]
    pub event_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub genre_ids: Vec<i64>,
    #[serde(default)]
    pub artist_ids: Vec<i64>,
}

impl RawEventRecord {
    pub fn new(venue_id: i64, event_date: NaiveDate, start_time: NaiveTime) -> Self {
        Self {
            venue_id,
            event_date,
            start_time,
            end_time: None,
            event_name: None,
            price_min_cents: None,
            price_max_cents: None,
            is_free: false,
            description: None,
            age_restriction: AgeRestriction::AllAges,
            ticket_url: None,
            event_url: None,
            image_url: None,
            genre_ids: Vec::new(),
            artist_ids: Vec::new(),
        }
    }

    /// Fingerprint over the identity fields. See [`crate::fingerprint`].
    pub fn fingerprint(&self) -> String {
        crate::fingerprint::fingerprint(self.venue_id, self.event_date, self.start_time)
    }

    /// Content hash over all fields, volatile ones included.
    pub fn content_hash(&self) -> String {
        crate::fingerprint::content_hash(self)
    }
}
