use std::sync::Arc;

use parking_lot::Mutex;

use crate::api::{self, ActionOutcome, BatchOutcome, QueueConfig, ResultRow, SearchCriteria};
use crate::error::ActionError;

pub trait SearchService: Send + Sync {
    fn search(&self, criteria: &SearchCriteria) -> Result<Vec<ResultRow>, ActionError>;
}

/// The remote download queue as seen through the search server.
///
/// Each call is one independent request with no retry.
pub trait QueueService: Send + Sync {
    fn fetch_config(&self) -> Result<QueueConfig, ActionError>;
    fn save_config(&self, config: &QueueConfig) -> Result<ActionOutcome, ActionError>;
    fn test_connection(&self) -> Result<ActionOutcome, ActionError>;
    fn enqueue(&self, link: &str) -> Result<ActionOutcome, ActionError>;
    fn enqueue_many(&self, links: &[String]) -> Result<BatchOutcome, ActionError>;
}

pub struct HttpSearchService {
    client: Arc<api::Client>,
}

impl HttpSearchService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl SearchService for HttpSearchService {
    fn search(&self, criteria: &SearchCriteria) -> Result<Vec<ResultRow>, ActionError> {
        self.client.search(criteria)
    }
}

pub struct HttpQueueService {
    client: Arc<api::Client>,
}

impl HttpQueueService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl QueueService for HttpQueueService {
    fn fetch_config(&self) -> Result<QueueConfig, ActionError> {
        self.client.queue_config()
    }

    fn save_config(&self, config: &QueueConfig) -> Result<ActionOutcome, ActionError> {
        self.client.save_queue_config(config)
    }

    fn test_connection(&self) -> Result<ActionOutcome, ActionError> {
        self.client.test_queue()
    }

    fn enqueue(&self, link: &str) -> Result<ActionOutcome, ActionError> {
        self.client.enqueue(link)
    }

    fn enqueue_many(&self, links: &[String]) -> Result<BatchOutcome, ActionError> {
        self.client.enqueue_many(links)
    }
}

/// Canned search backend.
#[derive(Default)]
pub struct MockSearchService {
    reply: Mutex<Option<Result<Vec<ResultRow>, ActionError>>>,
    calls: Mutex<Vec<SearchCriteria>>,
}

impl MockSearchService {
    pub fn new(rows: Vec<ResultRow>) -> Self {
        let service = Self::default();
        service.respond_with(Ok(rows));
        service
    }

    pub fn respond_with(&self, reply: Result<Vec<ResultRow>, ActionError>) {
        *self.reply.lock() = Some(reply);
    }

    pub fn calls(&self) -> Vec<SearchCriteria> {
        self.calls.lock().clone()
    }
}

impl SearchService for MockSearchService {
    fn search(&self, criteria: &SearchCriteria) -> Result<Vec<ResultRow>, ActionError> {
        self.calls.lock().push(criteria.clone());
        self.reply.lock().clone().unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Queue backend that keeps its configuration in memory, like the server does.
///
/// Saves are accepted and stored unless a rejection is scripted.
pub struct MockQueueService {
    config: Mutex<QueueConfig>,
    fetch_failure: Mutex<Option<ActionError>>,
    save_reply: Mutex<Option<Result<ActionOutcome, ActionError>>>,
    test_reply: Mutex<Result<ActionOutcome, ActionError>>,
    enqueue_reply: Mutex<Result<ActionOutcome, ActionError>>,
    enqueued: Mutex<Vec<String>>,
    calls: Mutex<Vec<&'static str>>,
}

impl Default for MockQueueService {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

impl MockQueueService {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config: Mutex::new(config),
            fetch_failure: Mutex::new(None),
            save_reply: Mutex::new(None),
            test_reply: Mutex::new(Ok(ActionOutcome::ok())),
            enqueue_reply: Mutex::new(Ok(ActionOutcome::ok())),
            enqueued: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn enabled() -> Self {
        Self::new(QueueConfig {
            enabled: true,
            host: "127.0.0.1".into(),
            ec_port: 4712,
            ..QueueConfig::default()
        })
    }

    pub fn config(&self) -> QueueConfig {
        self.config.lock().clone()
    }

    pub fn fail_fetch(&self, failure: Option<ActionError>) {
        *self.fetch_failure.lock() = failure;
    }

    pub fn reply_to_save(&self, reply: Option<Result<ActionOutcome, ActionError>>) {
        *self.save_reply.lock() = reply;
    }

    pub fn reply_to_test(&self, reply: Result<ActionOutcome, ActionError>) {
        *self.test_reply.lock() = reply;
    }

    pub fn reply_to_enqueue(&self, reply: Result<ActionOutcome, ActionError>) {
        *self.enqueue_reply.lock() = reply;
    }

    pub fn enqueued(&self) -> Vec<String> {
        self.enqueued.lock().clone()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }
}

impl QueueService for MockQueueService {
    fn fetch_config(&self) -> Result<QueueConfig, ActionError> {
        self.calls.lock().push("fetch_config");
        if let Some(err) = self.fetch_failure.lock().clone() {
            return Err(err);
        }
        Ok(self.config())
    }

    fn save_config(&self, config: &QueueConfig) -> Result<ActionOutcome, ActionError> {
        self.calls.lock().push("save_config");
        if let Some(reply) = self.save_reply.lock().clone() {
            return reply;
        }
        *self.config.lock() = config.clone();
        Ok(ActionOutcome::ok())
    }

    fn test_connection(&self) -> Result<ActionOutcome, ActionError> {
        self.calls.lock().push("test_connection");
        self.test_reply.lock().clone()
    }

    fn enqueue(&self, link: &str) -> Result<ActionOutcome, ActionError> {
        self.calls.lock().push("enqueue");
        let reply = self.enqueue_reply.lock().clone();
        if matches!(reply, Ok(ActionOutcome { success: true, .. })) {
            self.enqueued.lock().push(link.to_owned());
        }
        reply
    }

    fn enqueue_many(&self, links: &[String]) -> Result<BatchOutcome, ActionError> {
        self.calls.lock().push("enqueue_many");
        let reply = self.enqueue_reply.lock().clone()?;
        if !reply.success {
            return Ok(BatchOutcome {
                success: false,
                error: reply.error,
                ..BatchOutcome::default()
            });
        }
        self.enqueued.lock().extend(links.iter().cloned());
        Ok(BatchOutcome {
            success: true,
            sent: links.len(),
            failed: 0,
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_queue_stores_saved_config() {
        let service = MockQueueService::default();
        let updated = QueueConfig {
            enabled: true,
            host: "nas.lan".into(),
            ec_port: 4712,
            ..QueueConfig::default()
        };
        assert!(service.save_config(&updated).unwrap().success);
        assert_eq!(service.fetch_config().unwrap(), updated);
        assert_eq!(service.calls(), vec!["save_config", "fetch_config"]);
    }

    #[test]
    fn mock_queue_records_only_accepted_links() {
        let service = MockQueueService::enabled();
        service.enqueue("a").unwrap();
        service.reply_to_enqueue(Ok(ActionOutcome::rejected("full")));
        let outcome = service.enqueue("b").unwrap();
        assert_eq!(outcome.error.as_deref(), Some("full"));
        assert_eq!(service.enqueued(), vec!["a".to_string()]);
    }
}
