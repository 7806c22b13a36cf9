use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Platforms we ingest from. Stored in Postgres as kebab-case strings
/// ("twitter", "google-search", ...), which `serde` and `FromStr` mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlatformId {
    Twitter,
    GoogleSearch,
    GoogleNews,
    Instagram,
}

impl PlatformId {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformId::Twitter => "twitter",
            PlatformId::GoogleSearch => "google-search",
            PlatformId::GoogleNews => "google-news",
            PlatformId::Instagram => "instagram",
        }
    }

    /// Google-family platforms share API quota and poll less often.
    pub fn is_google_family(&self) -> bool {
        matches!(self, PlatformId::GoogleSearch | PlatformId::GoogleNews)
    }

    /// Cron cadence for ingestion triggers. Google-family every two hours,
    /// everything else every ten minutes. The asymmetry reflects API quota
    /// cost, not urgency.
    pub fn poll_schedule(&self) -> &'static str {
        if self.is_google_family() {
            "0 */2 * * *"
        } else {
            "*/10 * * * *"
        }
    }

    /// Post id prefix written by the ingestion worker for this platform.
    pub fn post_prefix(&self) -> &'static str {
        match self {
            PlatformId::Twitter => "tw",
            PlatformId::GoogleSearch => "gs",
            PlatformId::GoogleNews => "gn",
            PlatformId::Instagram => "ig",
        }
    }

    /// Recover the platform from a post id prefix ("tw-<uuid>" → Twitter).
    /// Returns None for unknown prefixes; callers fall back to the payload's
    /// own platform_id in that case.
    pub fn from_post_id(post_id: &str) -> Option<PlatformId> {
        if post_id.starts_with("tw-") {
            Some(PlatformId::Twitter)
        } else if post_id.starts_with("gs-") {
            Some(PlatformId::GoogleSearch)
        } else if post_id.starts_with("gn-") {
            Some(PlatformId::GoogleNews)
        } else if post_id.starts_with("ig-") {
            Some(PlatformId::Instagram)
        } else {
            None
        }
    }
}

impl std::fmt::Display for PlatformId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PlatformId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "twitter" => Ok(PlatformId::Twitter),
            "google-search" => Ok(PlatformId::GoogleSearch),
            "google-news" => Ok(PlatformId::GoogleNews),
            "instagram" => Ok(PlatformId::Instagram),
            other => Err(format!("unknown platform id: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Deterministic ingestion job id for a (thread, platform) pair.
/// Provisioning the same pair twice always lands on the same id.
pub fn scraping_job_id(thread_id: i64, platform_id: PlatformId) -> String {
    format!("scraping-job-{thread_id}-{platform_id}")
}

/// Scheduler trigger name for an ingestion job.
pub fn trigger_name(job_id: &str) -> String {
    format!("trigger-{job_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_roundtrips_through_str() {
        for p in [
            PlatformId::Twitter,
            PlatformId::GoogleSearch,
            PlatformId::GoogleNews,
            PlatformId::Instagram,
        ] {
            assert_eq!(p.as_str().parse::<PlatformId>().unwrap(), p);
        }
    }

    #[test]
    fn google_family_polls_slower() {
        assert_eq!(PlatformId::GoogleSearch.poll_schedule(), "0 */2 * * *");
        assert_eq!(PlatformId::GoogleNews.poll_schedule(), "0 */2 * * *");
        assert_eq!(PlatformId::Twitter.poll_schedule(), "*/10 * * * *");
        assert_eq!(PlatformId::Instagram.poll_schedule(), "*/10 * * * *");
    }

    #[test]
    fn post_prefix_maps_back_to_platform() {
        assert_eq!(
            PlatformId::from_post_id("tw-8d1f3c"),
            Some(PlatformId::Twitter)
        );
        assert_eq!(
            PlatformId::from_post_id("gn-8d1f3c"),
            Some(PlatformId::GoogleNews)
        );
        assert_eq!(PlatformId::from_post_id("xx-8d1f3c"), None);
    }

    #[test]
    fn job_ids_are_deterministic() {
        assert_eq!(
            scraping_job_id(7, PlatformId::Twitter),
            "scraping-job-7-twitter"
        );
        assert_eq!(
            scraping_job_id(7, PlatformId::GoogleNews),
            "scraping-job-7-google-news"
        );
        assert_eq!(
            trigger_name("scraping-job-7-twitter"),
            "trigger-scraping-job-7-twitter"
        );
    }
}
