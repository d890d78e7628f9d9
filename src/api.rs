use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use reqwest::Url;
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;

use crate::config::{ApiConfig, EventsFormat, RetryPolicy};
use crate::error::FetchError;
use crate::http_client::build_http_client;
use crate::matches::parse_match_rows;
use crate::model::{CompetitionSeasonRow, MatchRow, Page, Resource, ResourceFormat};
use crate::reference::{normalize, require_results};
use crate::table::Table;

const MAX_JITTER_MS: u64 = 250;

/// Authenticated, blocking client for the SkillCorner API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    config: ApiConfig,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = build_http_client(config.timeout)?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: ApiConfig, client: Client) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path.trim_start_matches('/'))
    }

    pub fn competition_editions_url(&self) -> String {
        self.endpoint("competition_editions/?user=true")
    }

    pub fn matches_url(&self) -> String {
        self.endpoint("matches/?user=true")
    }

    pub fn dynamic_events_url(&self, match_id: u64, format: EventsFormat) -> String {
        self.endpoint(&format!(
            "match/{match_id}/dynamic_events/?file_format={}",
            format.as_query()
        ))
    }

    pub fn fetch_competition_editions(&self) -> Result<Vec<CompetitionSeasonRow>, FetchError> {
        let url = self.competition_editions_url();
        let raw = require_results(self.fetch_all(&url)?, &url)?;
        normalize(&raw)
    }

    pub fn fetch_all_matches(&self) -> Result<Vec<MatchRow>, FetchError> {
        let raw = self.fetch_all(&self.matches_url())?;
        parse_match_rows(raw)
    }

    pub fn fetch_dynamic_events(
        &self,
        match_id: u64,
        format: EventsFormat,
    ) -> Result<Resource, FetchError> {
        let resource_format = match format {
            EventsFormat::Csv => ResourceFormat::Tabular,
            EventsFormat::Json => ResourceFormat::Structured,
        };
        self.fetch_one(&self.dynamic_events_url(match_id, format), resource_format)
    }

    /// Follows `next` cursors until exhausted and returns every `results` item.
    ///
    /// All-or-error: a failure on any page discards the pages already read.
    pub fn fetch_all(&self, url: &str) -> Result<Vec<Value>, FetchError> {
        let mut results = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(url.to_string());

        while let Some(url) = next.take() {
            if !visited.insert(url.clone()) {
                return Err(FetchError::CursorLoop { url });
            }
            let resp = self.get_with_retry(&url)?;
            let body = read_body(resp, &url)?;
            let page: Page = serde_json::from_str(&body).map_err(|source| FetchError::Decode {
                url: url.clone(),
                source,
            })?;
            next = page.next_url().map(str::to_string);
            results.extend(page.results);
        }

        Ok(results)
    }

    /// One GET against the API, decoded per `format`.
    pub fn fetch_one(&self, url: &str, format: ResourceFormat) -> Result<Resource, FetchError> {
        let resp = self.get_with_retry(url)?;
        let is_json = response_is_json(&resp);
        let body = read_body(resp, url)?;

        match format {
            ResourceFormat::Structured => serde_json::from_str(&body)
                .map(Resource::Json)
                .map_err(|source| FetchError::Decode {
                    url: url.to_string(),
                    source,
                }),
            ResourceFormat::Tabular => {
                let text = if is_json || body.trim_start().starts_with('{') {
                    let link = linked_resource(&body).ok_or_else(|| {
                        FetchError::InvalidTable(format!(
                            "response from {url} carried no file link: {}",
                            body.trim()
                        ))
                    })?;
                    self.fetch_linked_text(&link)?
                } else {
                    body
                };
                Table::from_delimited(&text).map(Resource::Table)
            }
        }
    }

    // Signed download links must not carry API credentials.
    fn fetch_linked_text(&self, link: &str) -> Result<String, FetchError> {
        let url = Url::parse(link).map_err(|err| FetchError::InvalidUrl {
            url: link.to_string(),
            reason: err.to_string(),
        })?;
        let resp = with_retry(self.config.retry, || {
            self.client
                .get(url.clone())
                .send()
                .map_err(|source| FetchError::Transport {
                    url: link.to_string(),
                    source,
                })
                .and_then(|resp| check_status(resp, link))
        })?;
        read_body(resp, link)
    }

    fn get_with_retry(&self, url: &str) -> Result<Response, FetchError> {
        with_retry(self.config.retry, || self.get(url))
    }

    fn get(&self, url: &str) -> Result<Response, FetchError> {
        let creds = &self.config.credentials;
        let resp = self
            .client
            .get(url)
            .basic_auth(&creds.username, Some(&creds.password))
            .header(ACCEPT, "application/json")
            .send()
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;
        check_status(resp, url)
    }
}

fn with_retry<T>(
    policy: RetryPolicy,
    mut attempt_fn: impl FnMut() -> Result<T, FetchError>,
) -> Result<T, FetchError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match attempt_fn() {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_attempts && err.is_retryable() => {
                thread::sleep(policy.backoff(attempt) + jitter(policy.base_delay));
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

fn jitter(base: Duration) -> Duration {
    if base.is_zero() {
        return Duration::ZERO;
    }
    let cap = (base.as_millis() as u64 / 4).clamp(1, MAX_JITTER_MS);
    Duration::from_millis(rand::thread_rng().gen_range(0..=cap))
}

fn check_status(resp: Response, url: &str) -> Result<Response, FetchError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    Err(FetchError::Http {
        url: url.to_string(),
        status: status.as_u16(),
        body: body.trim().to_string(),
    })
}

fn read_body(resp: Response, url: &str) -> Result<String, FetchError> {
    resp.text().map_err(|source| FetchError::Transport {
        url: url.to_string(),
        source,
    })
}

fn response_is_json(resp: &Response) -> bool {
    resp.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().contains("json"))
}

// A tabular response is either the delimited text itself or JSON pointing at it.
fn linked_resource(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body.trim()).ok()?;
    ["url", "file_url", "download_url"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}
