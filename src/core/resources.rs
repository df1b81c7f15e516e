use crate::error::{Error, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";
const RESULTS_PER_QUERY: u32 = 5;
const MAX_RESOURCES: usize = 5;
const TOPIC_CHARS: usize = 100;
const MIN_SUBJECT_CHARS: usize = 30;
const SUBJECT_BREAKS: &[char] = &['.', '!', '?', ':', ';', '-'];
const SOCIAL_DOMAINS: &[&str] = &["facebook.com", "twitter.com", "instagram.com"];
const SOCIAL_EXCEPTIONS: &[&str] = &["education", "learn", "course"];
const EDU_TERMS: &[&str] = &[
    "learn",
    "course",
    "education",
    "tutorial",
    "guide",
    "book",
    "paper",
    "research",
    "study",
    "academic",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub title: String,
    pub url: String,
    pub content: String,
}

/// Topic in, ranked resources out. Ranking is the implementation's business.
#[async_trait]
pub trait ResourceSearch: Send + Sync {
    async fn search(&self, topic: &str) -> Result<Vec<Resource>>;
}

/// The title when there is one, otherwise the start of the transcript.
pub fn search_topic(title: &str, transcript: &str) -> String {
    let title = title.trim();
    if title.is_empty() {
        transcript.chars().take(TOPIC_CHARS).collect()
    } else {
        title.to_string()
    }
}

/// Shortens a topic to its leading clause when that clause is long enough to stand alone.
pub fn main_subject(topic: &str) -> String {
    let subject: String = topic.trim().chars().take(TOPIC_CHARS).collect();
    let subject = subject.trim();
    for delimiter in SUBJECT_BREAKS {
        let first = subject.split(*delimiter).next().unwrap_or(subject);
        if first.chars().count() > MIN_SUBJECT_CHARS {
            return first.to_string();
        }
    }
    subject.to_string()
}

fn search_queries(subject: &str) -> [String; 4] {
    [
        format!("{subject} academic papers research journals scholarly articles"),
        format!("{subject} educational resources learning materials tutorials course"),
        format!("{subject} recommended books textbooks reading list"),
        format!("{subject} educational videos lectures explanations"),
    ]
}

fn relevance(resource: &Resource) -> u32 {
    let title = resource.title.to_lowercase();
    let content = resource.content.to_lowercase();
    EDU_TERMS
        .iter()
        .map(|term| {
            let mut score = 0;
            if title.contains(term) {
                score += 3;
            }
            if content.contains(term) {
                score += 1;
            }
            score
        })
        .sum()
}

fn is_unwanted_social(resource: &Resource) -> bool {
    let url = resource.url.to_lowercase();
    if !SOCIAL_DOMAINS.iter().any(|domain| url.contains(domain)) {
        return false;
    }
    let content = resource.content.to_lowercase();
    !SOCIAL_EXCEPTIONS.iter().any(|term| content.contains(term))
}

/// De-duplicates by URL, drops non-educational social links and keeps the best few.
pub fn rank_resources(results: Vec<Resource>) -> Vec<Resource> {
    let mut seen = HashSet::new();
    let mut scored: Vec<(u32, Resource)> = results
        .into_iter()
        .filter(|r| !r.url.is_empty())
        .filter(|r| !is_unwanted_social(r))
        .filter(|r| seen.insert(r.url.clone()))
        .map(|r| (relevance(&r), r))
        .collect();

    // stable: equal scores keep search order
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored
        .into_iter()
        .take(MAX_RESOURCES)
        .map(|(_, r)| r)
        .collect()
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl From<TavilyResult> for Resource {
    fn from(result: TavilyResult) -> Self {
        let title = result
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| "Untitled".to_string());
        Self {
            title: html_escape::decode_html_entities(&title).into_owned(),
            url: result.url,
            content: html_escape::decode_html_entities(&result.content).into_owned(),
        }
    }
}

#[derive(Clone)]
pub struct TavilySearch {
    client: reqwest::Client,
    api_key: SecretString,
}

impl TavilySearch {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
        }
    }

    async fn query(&self, query: &str) -> Result<Vec<Resource>> {
        let response = self
            .client
            .post(TAVILY_ENDPOINT)
            .bearer_auth(self.api_key.expose_secret())
            .json(&TavilyRequest {
                query,
                max_results: RESULTS_PER_QUERY,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::custom(format!("Tavily search failed ({status}): {body}")));
        }
        let response = response.json::<TavilyResponse>().await?;

        Ok(response.results.into_iter().map(Resource::from).collect())
    }
}

#[async_trait]
impl ResourceSearch for TavilySearch {
    async fn search(&self, topic: &str) -> Result<Vec<Resource>> {
        let subject = main_subject(topic);
        log::info!("Searching related resources for '{subject}'");

        let mut results = Vec::new();
        let mut last_error = None;
        for query in search_queries(&subject) {
            match self.query(&query).await {
                Ok(found) => results.extend(found),
                Err(e) => {
                    log::debug!("Resource query '{query}' failed: {e}");
                    last_error = Some(e);
                }
            }
        }

        if results.is_empty() {
            match self.query(&format!("{subject} learning resources")).await {
                Ok(found) => results = found,
                Err(e) => return Err(last_error.unwrap_or(e)),
            }
        }

        Ok(rank_resources(results))
    }
}
