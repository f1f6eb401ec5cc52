use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::USER_AGENT;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;
use url::Url;

use crate::error::ActionError;

/// Identifier of the only queue backend the server integrates with.
pub const QUEUE_BACKEND: &str = "amule";

const SEARCH_PATH: &str = "api/search";
const QUEUE_CONFIG_PATH: &str = "api/emule/config";
const QUEUE_TEST_PATH: &str = "api/emule/test";
const QUEUE_ADD_PATH: &str = "api/emule/add";
const QUEUE_ADD_MANY_PATH: &str = "api/emule/add-multiple";
const COVERS_PREFIX: &str = "covers/";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchCriteria {
    pub query: String,
    pub volume: String,
    pub category: String,
}

impl SearchCriteria {
    pub fn is_empty(&self) -> bool {
        self.query.is_empty() && self.volume.is_empty() && self.category.is_empty()
    }

    /// Query-string pairs; empty fields are left out entirely.
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        [
            ("query", self.query.as_str()),
            ("volume", self.volume.as_str()),
            ("category", self.category.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .collect()
    }
}

/// One matched link as returned by the search endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    #[serde(default, deserialize_with = "lenient_string")]
    pub thread_id: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub thread_title: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub thread_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub forum_category: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub cover_image: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub volume: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub filename: Option<String>,
    #[serde(default, deserialize_with = "lenient_size")]
    pub filesize: Option<u64>,
    #[serde(default)]
    pub link: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<ResultRow>,
}

/// Settings of the remote download queue, exchanged verbatim with the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    pub enabled: bool,
    #[serde(rename = "type")]
    pub kind: String,
    pub host: String,
    pub ec_port: i64,
    pub password: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            kind: QUEUE_BACKEND.to_string(),
            host: String::new(),
            ec_port: 0,
            password: String::new(),
        }
    }
}

/// `{ success, error? }` reply shared by the queue endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ActionOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn rejected<S: Into<String>>(error: S) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            message: None,
        }
    }

    /// Turns `success: false` into a [`ActionError::Domain`].
    pub fn into_result(self) -> Result<Option<String>, ActionError> {
        if self.success {
            Ok(self.message)
        } else {
            Err(ActionError::domain(self.error))
        }
    }
}

/// Reply of the batch enqueue endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub success: bool,
    #[serde(default)]
    pub sent: usize,
    #[serde(default)]
    pub failed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchOutcome {
    pub fn into_result(self) -> Result<(usize, usize), ActionError> {
        if self.success {
            Ok((self.sent, self.failed))
        } else {
            Err(ActionError::domain(self.error))
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

/// Blocking client for the link search server.
pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: Url,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("linkseek client user agent required");
        }

        let mut base_url = Url::parse(config.base_url.trim())
            .with_context(|| format!("parse server url {:?}", config.base_url))?;
        if base_url.cannot_be_a_base() {
            bail!("server url {} cannot be used as a base", base_url);
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = match config.http_client {
            Some(client) => client,
            // A request stays outstanding until the server answers unless a
            // timeout was asked for; reqwest would otherwise impose 30s.
            None => HttpClient::builder()
                .timeout(config.timeout)
                .build()
                .context("build http client")?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn search(&self, criteria: &SearchCriteria) -> Result<Vec<ResultRow>, ActionError> {
        if criteria.is_empty() {
            return Err(ActionError::Validation(
                "enter at least one search criterion".into(),
            ));
        }
        let response: SearchResponse = self.get(SEARCH_PATH, &criteria.query_pairs())?;
        Ok(response.results)
    }

    pub fn queue_config(&self) -> Result<QueueConfig, ActionError> {
        self.get(QUEUE_CONFIG_PATH, &[])
    }

    pub fn save_queue_config(&self, config: &QueueConfig) -> Result<ActionOutcome, ActionError> {
        self.post(QUEUE_CONFIG_PATH, config)
    }

    pub fn test_queue(&self) -> Result<ActionOutcome, ActionError> {
        self.get(QUEUE_TEST_PATH, &[])
    }

    pub fn enqueue(&self, link: &str) -> Result<ActionOutcome, ActionError> {
        #[derive(Serialize)]
        struct Body<'a> {
            link: &'a str,
        }
        self.post(QUEUE_ADD_PATH, &Body { link })
    }

    pub fn enqueue_many(&self, links: &[String]) -> Result<BatchOutcome, ActionError> {
        #[derive(Serialize)]
        struct Body<'a> {
            links: &'a [String],
        }
        self.post(QUEUE_ADD_MANY_PATH, &Body { links })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ActionError> {
        self.base_url
            .join(path)
            .map_err(|err| ActionError::network(format!("invalid endpoint {path}: {err}")))
    }

    fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ActionError> {
        let mut url = self.endpoint(path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        debug!(%url, "GET");
        let response = self
            .http
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .map_err(ActionError::network)?;
        decode(response)
    }

    fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ActionError> {
        let url = self.endpoint(path)?;
        debug!(%url, "POST");
        let response = self
            .http
            .post(url)
            .header(USER_AGENT, &self.user_agent)
            .json(body)
            .send()
            .map_err(ActionError::network)?;
        decode(response)
    }
}

/// `/covers/<basename>` for a stored cover value, `None` when there is none.
pub fn cover_path(cover_image: &str) -> Option<String> {
    if cover_image.is_empty() {
        return None;
    }
    let basename = cover_image
        .strip_prefix(COVERS_PREFIX)
        .unwrap_or(cover_image);
    Some(format!("/{COVERS_PREFIX}{basename}"))
}

// The server answers domain rejections with 4xx/5xx and a JSON body, so the
// body is decoded regardless of status.
fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ActionError> {
    let status = response.status();
    let body = response.text().map_err(ActionError::network)?;
    serde_json::from_str(&body).map_err(|err| {
        if status.is_success() {
            ActionError::decode(err)
        } else {
            ActionError::decode(format!("HTTP {status}: {err}"))
        }
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::Unsigned(value) => value.to_string(),
            Scalar::Signed(value) => value.to_string(),
            Scalar::Float(value) => value.to_string(),
            Scalar::Bool(value) => value.to_string(),
            Scalar::Text(value) => value,
        }
    }

    fn into_size(self) -> Option<u64> {
        match self {
            Scalar::Unsigned(value) => Some(value),
            Scalar::Signed(value) => u64::try_from(value).ok(),
            Scalar::Float(value) if value.is_finite() && value >= 0.0 => Some(value as u64),
            Scalar::Float(_) | Scalar::Bool(_) => None,
            Scalar::Text(value) => leading_integer(&value),
        }
    }
}

// Sizes scraped from forum pages arrive as text; accept "123" and "123 bytes".
fn leading_integer(raw: &str) -> Option<u64> {
    let trimmed = raw.trim_start();
    let end = trimmed
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(trimmed.len());
    trimmed[..end].parse().ok()
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<Scalar>::deserialize(deserializer)?
        .map(Scalar::into_string)
        .unwrap_or_default())
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(Scalar::into_string))
}

fn lenient_size<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Ok(Option::<Scalar>::deserialize(deserializer)?.and_then(Scalar::into_size))
}
