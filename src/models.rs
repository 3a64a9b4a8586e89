//! Wire-level data model for the enrichment pipeline.
//!
//! Field names on the JSON shapes are part of the queue contract and are
//! case-sensitive. `ScrapeTarget` is the inbound unit of work, `ScrapedArticle`
//! the outbound one; everything in between is immutable except the single
//! score assignment on each `Subject`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ScrapeError;

/// Wire format for `articleDate`: UTC, second precision, trailing `Z`.
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Serde codec enforcing the exact `articleDate` format on both directions.
///
/// A date string that does not match the format fails deserialization, which
/// surfaces as a malformed-message rejection upstream.
pub mod article_date {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    use super::DATE_FORMAT;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&date.format(DATE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        let naive = NaiveDateTime::parse_from_str(&raw, DATE_FORMAT)
            .map_err(serde::de::Error::custom)?;
        Ok(naive.and_utc())
    }
}

/// A candidate subject scored against one article.
///
/// `score` starts at whatever the producer sent (conventionally 0) and is
/// overwritten exactly once by the scoring engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub score: f64,
    #[serde(rename = "articleId")]
    pub article_id: String,
}

impl Subject {
    /// The text used for similarity comparison: `"{symbol} {name}"`.
    pub fn describe(&self) -> String {
        format!("{} {}", self.symbol, self.name)
    }
}

/// Source attribution carried through the pipeline unchanged.
///
/// The core logic never reads or writes any of these fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Referer {
    pub id: String,
    #[serde(rename = "externalId")]
    pub external_id: String,
    #[serde(rename = "followerCount")]
    pub follower_count: i64,
    #[serde(rename = "articleId")]
    pub article_id: String,
}

/// A fully resolved article. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub url: String,
    pub title: String,
    pub body: String,
    pub keywords: Vec<String>,
    #[serde(rename = "articleDate", with = "article_date")]
    pub date: DateTime<Utc>,
}

impl Article {
    /// The text used for similarity comparison: `"{title} {body}"`.
    ///
    /// Keywords are part of the serialized shape but deliberately excluded
    /// from the scoring text.
    pub fn describe(&self) -> String {
        format!("{} {}", self.title, self.body)
    }
}

/// Inbound unit of work, deserialized from a queue message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeTarget {
    pub url: String,
    pub subjects: Vec<Subject>,
    pub referer: Referer,
    pub title: Option<String>,
    pub body: Option<String>,
    #[serde(rename = "articleId")]
    pub article_id: String,
}

impl ScrapeTarget {
    /// True iff the target already carries non-empty title and body text.
    pub fn is_scraped(&self) -> bool {
        matches!(
            (&self.title, &self.body),
            (Some(title), Some(body)) if !title.is_empty() && !body.is_empty()
        )
    }

    /// Synthesizes an [`Article`] directly from pre-filled content.
    ///
    /// Only valid when [`is_scraped`](Self::is_scraped) holds; calling it on
    /// an unscraped target is an invariant violation and fails with
    /// [`ScrapeError::NotScraped`]. The article date is the supplied `now`
    /// since a pre-filled target carries no date of its own.
    pub fn to_article(&self, now: DateTime<Utc>) -> Result<Article, ScrapeError> {
        if !self.is_scraped() {
            return Err(ScrapeError::NotScraped {
                url: self.url.clone(),
            });
        }
        Ok(Article {
            id: self.article_id.clone(),
            url: self.url.clone(),
            // is_scraped() guarantees both fields are present
            title: self.title.clone().unwrap_or_default(),
            body: self.body.clone().unwrap_or_default(),
            keywords: Vec::new(),
            date: now,
        })
    }
}

/// Outbound unit of work: one article, its scored subjects, and the referer
/// it arrived with. Built once per successful pipeline run, serialized, and
/// dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedArticle {
    pub article: Article,
    pub subjects: Vec<Subject>,
    pub referer: Referer,
}
