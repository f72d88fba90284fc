use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod cache;
pub mod ingestion;

pub use cache::{CacheRecord, CacheStore, CorruptCacheRow, NewsGateway, SqliteNewsCache};
pub use ingestion::{FeedSource, RssFeedSource};

/// Words that mark an item as job related. Everything else is educational.
const JOB_KEYWORDS: [&str; 6] = [
    "job",
    "recruitment",
    "employment",
    "internship",
    "hiring",
    "vacancy",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Educational,
    Job,
}

impl Category {
    /// Classify by keyword presence in the title and description.
    pub fn classify(title: &str, description: &str) -> Self {
        let text = format!("{} {}", title, description).to_lowercase();
        if JOB_KEYWORDS.iter().any(|k| text.contains(k)) {
            Category::Job
        } else {
            Category::Educational
        }
    }
}

/// Category selector accepted by the news endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryFilter {
    All,
    Only(Category),
    /// A category name nothing is classified as; matches no item
    Unknown,
}

impl CategoryFilter {
    /// A missing category means `all`.
    pub fn parse(category: Option<&str>) -> Self {
        match category.map(str::trim) {
            None | Some("") | Some("all") => CategoryFilter::All,
            Some("educational") => CategoryFilter::Only(Category::Educational),
            Some("job") => CategoryFilter::Only(Category::Job),
            Some(_) => CategoryFilter::Unknown,
        }
    }

    pub fn matches(&self, item: &NewsItem) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(c) => item.category == *c,
            CategoryFilter::Unknown => false,
        }
    }

    pub fn apply(&self, items: Vec<NewsItem>) -> Vec<NewsItem> {
        items.into_iter().filter(|i| self.matches(i)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub category: Category,
    pub published_at: DateTime<Utc>,
    pub source: String,
}

/// Newest first, then keep at most `max_items`.
pub fn most_recent(mut items: Vec<NewsItem>, max_items: usize) -> Vec<NewsItem> {
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    items.truncate(max_items);
    items
}
