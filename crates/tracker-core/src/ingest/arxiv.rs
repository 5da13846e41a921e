//! Preprint feed crawler.
//!
//! Pulls the newest submissions for each tracked category from the arXiv
//! Atom API and registers them as papers. Existing papers are only filled
//! in, never overwritten.

use super::{Crawler, IngestReport, IngestSource};
use crate::config::ArxivConfig;
use crate::network::HttpClient;
use crate::store::{PaperFields, SnapshotStore};
use crate::{Result, TrackerError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    id: Option<String>,
    title: Option<String>,
    summary: Option<String>,
    published: Option<String>,
    #[serde(rename = "author", default)]
    authors: Vec<AtomAuthor>,
    #[serde(rename = "primary_category", alias = "arxiv:primary_category")]
    primary_category: Option<AtomCategory>,
}

#[derive(Debug, Deserialize)]
struct AtomAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomCategory {
    #[serde(rename = "@term")]
    term: Option<String>,
}

/// A paper decoded from one feed entry.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPaper {
    pub arxiv_id: String,
    pub fields: PaperFields,
}

/// Turn an entry id URL into a bare, version-less arXiv id.
///
/// `http://arxiv.org/abs/2301.00234v2` becomes `2301.00234`; old-style ids
/// such as `hep-th/9901001v1` keep their archive prefix.
pub fn arxiv_id_from_entry_id(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let tail = raw.rsplit_once("/abs/").map_or(raw, |(_, tail)| tail);
    let id = strip_version(tail);
    (!id.is_empty()).then(|| id.to_string())
}

fn strip_version(id: &str) -> &str {
    match id.rsplit_once('v') {
        Some((base, version))
            if !base.is_empty()
                && !version.is_empty()
                && version.chars().all(|c| c.is_ascii_digit()) =>
        {
            base
        }
        _ => id,
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.map(|t| collapse_whitespace(&t)).filter(|t| !t.is_empty())
}

fn entry_to_paper(entry: AtomEntry, fallback_category: &str) -> Result<FeedPaper> {
    let raw_id = entry
        .id
        .ok_or_else(|| TrackerError::parse("atom entry", "missing id"))?;
    let arxiv_id = arxiv_id_from_entry_id(&raw_id)
        .ok_or_else(|| TrackerError::parse("atom entry", format!("bad id {:?}", raw_id)))?;

    let submitted_at = entry
        .published
        .as_deref()
        .map(|s| {
            DateTime::parse_from_rfc3339(s.trim())
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| TrackerError::parse("published timestamp", e))
        })
        .transpose()?;

    let authors: Vec<String> = entry
        .authors
        .into_iter()
        .filter_map(|a| non_empty(a.name))
        .collect();

    let category = entry
        .primary_category
        .and_then(|c| c.term)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| fallback_category.to_string());

    Ok(FeedPaper {
        arxiv_id,
        fields: PaperFields {
            title: non_empty(entry.title),
            abstract_text: non_empty(entry.summary),
            submitted_at,
            authors: Some(authors),
            category: Some(category),
            // Set later by the benchmark enrichment pass.
            pwc_sota_flag: None,
        },
    })
}

/// Parse an Atom response body.
///
/// A document that is not a feed at all is an error; individual entries
/// that cannot be turned into papers come back as per-entry errors.
pub fn parse_feed(xml: &str, fallback_category: &str) -> Result<Vec<Result<FeedPaper>>> {
    let feed: AtomFeed =
        quick_xml::de::from_str(xml).map_err(|e| TrackerError::parse("atom feed", e))?;

    // The API reports query errors as a feed with a single error entry.
    if let Some(raw_id) = feed
        .entries
        .iter()
        .filter_map(|e| e.id.as_deref())
        .find(|id| id.contains("/api/errors"))
    {
        return Err(TrackerError::parse("atom feed", format!("API error entry {}", raw_id)));
    }

    Ok(feed
        .entries
        .into_iter()
        .map(|entry| entry_to_paper(entry, fallback_category))
        .collect())
}

/// Write decoded papers into the store.
pub fn apply_papers(store: &SnapshotStore, papers: Vec<Result<FeedPaper>>) -> IngestReport {
    let mut report = IngestReport::new(IngestSource::Arxiv);
    for (index, paper) in papers.into_iter().enumerate() {
        match paper {
            Ok(paper) => {
                let outcome = store.upsert_paper(&paper.arxiv_id, &paper.fields);
                report.record(&paper.arxiv_id, outcome);
            }
            Err(e) => report.record(&format!("entry #{}", index), Err(e)),
        }
    }
    report
}

/// Crawler for the arXiv query API.
pub struct ArxivCrawler {
    client: Arc<HttpClient>,
    api_url: String,
    categories: Vec<String>,
    per_category: u32,
    pause: std::time::Duration,
}

impl ArxivCrawler {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self {
            client,
            api_url: ArxivConfig::API_URL.to_string(),
            categories: ArxivConfig::CATEGORIES
                .iter()
                .map(|c| c.to_string())
                .collect(),
            per_category: ArxivConfig::PAPERS_PER_CATEGORY,
            pause: ArxivConfig::PAUSE_BETWEEN_CATEGORIES,
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = categories;
        self
    }

    /// Fetch and parse the newest submissions in one category.
    pub async fn fetch_category(&self, category: &str) -> Result<Vec<Result<FeedPaper>>> {
        let query = [
            ("search_query", format!("cat:{}", category)),
            ("sortBy", "submittedDate".to_string()),
            ("sortOrder", "descending".to_string()),
            ("start", "0".to_string()),
            ("max_results", self.per_category.to_string()),
        ];
        let body = self.client.get_text(&self.api_url, &query).await?;
        parse_feed(&body, category)
    }
}

#[async_trait]
impl Crawler for ArxivCrawler {
    fn source(&self) -> IngestSource {
        IngestSource::Arxiv
    }

    async fn crawl(&self, store: &SnapshotStore, _today: NaiveDate) -> Result<IngestReport> {
        let mut report = IngestReport::new(IngestSource::Arxiv);

        for (i, category) in self.categories.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.pause).await;
            }
            info!("Fetching category={} ...", category);
            let papers = match self.fetch_category(category).await {
                Ok(papers) => papers,
                Err(e) => {
                    error!("arXiv API fetch failed for {}: {}", category, e);
                    continue;
                }
            };
            info!("  Got {} papers", papers.len());
            report.merge(&apply_papers(store, papers));
        }

        report.log_summary();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <id>http://arxiv.org/api/abc</id>
  <title type="html">ArXiv Query: search_query=cat:cs.CL</title>
  <updated>2026-02-26T00:00:00-05:00</updated>
  <entry>
    <id>http://arxiv.org/abs/2602.01234v2</id>
    <updated>2026-02-25T10:00:00Z</updated>
    <published>2026-02-24T18:30:00Z</published>
    <title>Scaling Laws for
      Tiny Models</title>
    <summary>  We study
   small things.  </summary>
    <author><name>Ada Lovelace</name></author>
    <author><name>Alan Turing</name><arxiv:affiliation>Cambridge</arxiv:affiliation></author>
    <link href="http://arxiv.org/abs/2602.01234v2" rel="alternate" type="text/html"/>
    <arxiv:primary_category xmlns:arxiv="http://arxiv.org/schemas/atom" term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <title>Entry without an id</title>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2602.05555v1</id>
    <published>yesterday</published>
    <title>Bad date</title>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2602.07777v1</id>
    <published>2026-02-25T09:00:00Z</published>
    <title>No category</title>
  </entry>
</feed>"#;

    #[test]
    fn test_arxiv_id_from_entry_id() {
        assert_eq!(
            arxiv_id_from_entry_id("http://arxiv.org/abs/2301.00234v1").as_deref(),
            Some("2301.00234")
        );
        assert_eq!(
            arxiv_id_from_entry_id("http://arxiv.org/abs/hep-th/9901001v3").as_deref(),
            Some("hep-th/9901001")
        );
        assert_eq!(
            arxiv_id_from_entry_id("http://arxiv.org/abs/solv-int/9901001").as_deref(),
            Some("solv-int/9901001")
        );
        assert_eq!(arxiv_id_from_entry_id("  "), None);
    }

    #[test]
    fn test_parse_feed() {
        let parsed = parse_feed(FEED, "cs.AI").unwrap();
        assert_eq!(parsed.len(), 4);

        let first = parsed[0].as_ref().unwrap();
        assert_eq!(first.arxiv_id, "2602.01234");
        assert_eq!(first.fields.title.as_deref(), Some("Scaling Laws for Tiny Models"));
        assert_eq!(first.fields.abstract_text.as_deref(), Some("We study small things."));
        assert_eq!(
            first.fields.authors,
            Some(vec!["Ada Lovelace".to_string(), "Alan Turing".to_string()])
        );
        assert_eq!(first.fields.category.as_deref(), Some("cs.CL"));
        assert_eq!(
            first.fields.submitted_at,
            Some(Utc.with_ymd_and_hms(2026, 2, 24, 18, 30, 0).unwrap())
        );

        assert!(parsed[1].is_err());
        assert!(parsed[2].is_err());

        let fallback = parsed[3].as_ref().unwrap();
        assert_eq!(fallback.fields.category.as_deref(), Some("cs.AI"));
    }

    #[test]
    fn test_parse_feed_rejects_error_entry() {
        let error_feed = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <entry><id>http://arxiv.org/api/errors#incorrect_id_format</id><title>Error</title></entry>
</feed>"#;
        assert!(parse_feed(error_feed, "cs.AI").is_err());
    }

    #[test]
    fn test_apply_papers_fills_without_overwriting() {
        let store = SnapshotStore::open_in_memory().unwrap();
        store
            .upsert_paper(
                "2602.01234",
                &PaperFields {
                    title: Some("Curated title".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let report = apply_papers(&store, parse_feed(FEED, "cs.AI").unwrap());
        assert_eq!(report.ok, 2);
        assert_eq!(report.errors, 2);

        let paper = store.get_paper("2602.01234").unwrap().unwrap();
        assert_eq!(paper.title.as_deref(), Some("Curated title"));
        assert_eq!(paper.abstract_text.as_deref(), Some("We study small things."));
        assert_eq!(paper.authors.len(), 2);
        assert!(!paper.pwc_sota_flag);

        // A second run of the same feed changes nothing.
        let again = apply_papers(&store, parse_feed(FEED, "cs.AI").unwrap());
        assert_eq!(again.ok, 2);
        assert_eq!(store.counts().unwrap().papers, 2);
    }
}
