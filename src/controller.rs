use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};

use crate::aggregate::{self, ThreadGroup};
use crate::api::{ActionOutcome, BatchOutcome, QueueConfig, ResultRow, SearchCriteria, QUEUE_BACKEND};
use crate::clipboard::{self, ClipboardSink};
use crate::data::{QueueService, SearchService};
use crate::error::ActionError;
use crate::timer::Timers;

pub const EMPTY_CRITERIA_PROMPT: &str = "Enter at least one search criterion.";
const CONFIG_SAVED: &str = "Configuration saved.";
const CONNECTION_OK: &str = "Connection to the download queue succeeded.";
const TESTING_CONNECTION: &str = "Testing connection…";

/// Rows of the most recent successful search.
///
/// Replaced wholesale by each completed search and never cleared otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    rows: Vec<ResultRow>,
}

impl ResultSet {
    pub fn new(rows: Vec<ResultRow>) -> Self {
        Self { rows }
    }

    pub fn replace(&mut self, rows: Vec<ResultRow>) {
        self.rows = rows;
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Identity of a per-link control: its thread and position within the thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ControlId {
    pub thread_id: String,
    pub index: usize,
}

impl ControlId {
    pub fn new<S: Into<String>>(thread_id: S, index: usize) -> Self {
        Self {
            thread_id: thread_id.into(),
            index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SearchState {
    #[default]
    Idle,
    Searching,
    Displayed,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CopyState {
    #[default]
    Ready,
    Copied,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AddState {
    #[default]
    Ready,
    Pending,
    Success,
    Error(String),
}

impl AddState {
    /// Only a `Ready` control accepts a new submission.
    pub fn is_enabled(&self) -> bool {
        matches!(self, AddState::Ready)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanelState {
    #[default]
    Closed,
    Loading,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub text: String,
    pub kind: MessageKind,
}

impl Banner {
    fn success<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            kind: MessageKind::Success,
        }
    }

    fn error<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            kind: MessageKind::Error,
        }
    }
}

/// Editable copy of the queue settings. The port stays text until saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsForm {
    pub enabled: bool,
    pub kind: String,
    pub host: String,
    pub ec_port: String,
    pub password: String,
}

impl Default for SettingsForm {
    fn default() -> Self {
        Self {
            enabled: false,
            kind: QUEUE_BACKEND.to_string(),
            host: String::new(),
            ec_port: String::new(),
            password: String::new(),
        }
    }
}

impl SettingsForm {
    fn fill(&mut self, config: QueueConfig) {
        self.enabled = config.enabled;
        self.kind = config.kind;
        self.host = config.host;
        self.ec_port = config.ec_port.to_string();
        self.password = config.password;
    }

    fn to_config(&self) -> Result<QueueConfig, ActionError> {
        let ec_port = self
            .ec_port
            .trim()
            .parse::<i64>()
            .map_err(|_| ActionError::Validation("EC port must be a number.".into()))?;
        Ok(QueueConfig {
            enabled: self.enabled,
            kind: self.kind.clone(),
            host: self.host.clone(),
            ec_port,
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Default)]
pub struct SettingsPanel {
    state: PanelState,
    session: u64,
    form: SettingsForm,
    message: Option<Banner>,
    saving: bool,
    testing: bool,
}

impl SettingsPanel {
    pub fn state(&self) -> PanelState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state != PanelState::Closed
    }

    pub fn form(&self) -> &SettingsForm {
        &self.form
    }

    pub fn message(&self) -> Option<&Banner> {
        self.message.as_ref()
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn is_testing(&self) -> bool {
        self.testing
    }

    fn accepts(&self, session: u64) -> bool {
        self.is_open() && self.session == session
    }
}

/// Auto-revert windows of the transient acknowledgements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub copy_feedback: Duration,
    pub add_feedback: Duration,
    pub message_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            copy_feedback: Duration::from_secs(2),
            add_feedback: Duration::from_secs(3),
            message_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TimerKey {
    Copy(ControlId),
    Add(ControlId),
    AddAll,
    SettingsMessage,
    Status,
}

enum AsyncResponse {
    Search {
        request_id: u64,
        result: Result<Vec<ResultRow>, ActionError>,
    },
    QueueStatus {
        result: Result<QueueConfig, ActionError>,
    },
    Enqueue {
        generation: u64,
        control: ControlId,
        result: Result<ActionOutcome, ActionError>,
    },
    EnqueueMany {
        generation: u64,
        result: Result<BatchOutcome, ActionError>,
    },
    SettingsLoaded {
        session: u64,
        result: Result<QueueConfig, ActionError>,
    },
    SettingsSaved {
        session: u64,
        result: Result<ActionOutcome, ActionError>,
    },
    ConnectionTested {
        session: u64,
        result: Result<ActionOutcome, ActionError>,
    },
}

pub struct Options {
    pub search_service: Arc<dyn SearchService>,
    pub queue_service: Arc<dyn QueueService>,
    pub clipboard: Box<dyn ClipboardSink>,
    pub results: ResultSet,
    pub timings: Timings,
}

/// Coordinates searches and per-control actions.
///
/// Requests run on background threads and report back through a channel;
/// nothing changes until the owner drains it with [`Controller::poll_async`].
/// Timed reverts fire from [`Controller::tick`].
pub struct Controller {
    search_service: Arc<dyn SearchService>,
    queue_service: Arc<dyn QueueService>,
    clipboard: Box<dyn ClipboardSink>,
    timings: Timings,
    criteria: SearchCriteria,
    results: ResultSet,
    groups: Vec<ThreadGroup>,
    generation: u64,
    search: SearchState,
    pending_search: Option<u64>,
    next_request_id: u64,
    prompt: Option<String>,
    copy_states: HashMap<ControlId, CopyState>,
    add_states: HashMap<ControlId, AddState>,
    add_all: AddState,
    queue_enabled: bool,
    settings: SettingsPanel,
    status: Option<Banner>,
    timers: Timers<TimerKey>,
    in_flight: usize,
    response_tx: Sender<AsyncResponse>,
    response_rx: Receiver<AsyncResponse>,
}

impl Controller {
    pub fn new(opts: Options) -> Self {
        let (response_tx, response_rx) = unbounded();
        let mut controller = Self {
            search_service: opts.search_service,
            queue_service: opts.queue_service,
            clipboard: opts.clipboard,
            timings: opts.timings,
            criteria: SearchCriteria::default(),
            results: opts.results,
            groups: Vec::new(),
            generation: 0,
            search: SearchState::Idle,
            pending_search: None,
            next_request_id: 1,
            prompt: None,
            copy_states: HashMap::new(),
            add_states: HashMap::new(),
            add_all: AddState::Ready,
            queue_enabled: false,
            settings: SettingsPanel::default(),
            status: None,
            timers: Timers::new(),
            in_flight: 0,
            response_tx,
            response_rx,
        };
        if !controller.results.is_empty() {
            controller.groups = aggregate::group(controller.results.rows());
        }
        controller
    }

    pub fn criteria(&self) -> &SearchCriteria {
        &self.criteria
    }

    pub fn criteria_mut(&mut self) -> &mut SearchCriteria {
        &mut self.criteria
    }

    pub fn set_criteria(&mut self, criteria: SearchCriteria) {
        self.criteria = criteria;
    }

    pub fn search_state(&self) -> &SearchState {
        &self.search
    }

    pub fn results(&self) -> &ResultSet {
        &self.results
    }

    pub fn groups(&self) -> &[ThreadGroup] {
        &self.groups
    }

    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    pub fn status(&self) -> Option<&Banner> {
        self.status.as_ref()
    }

    pub fn settings(&self) -> &SettingsPanel {
        &self.settings
    }

    pub fn copy_state(&self, control: &ControlId) -> CopyState {
        self.copy_states.get(control).cloned().unwrap_or_default()
    }

    pub fn add_state(&self, control: &ControlId) -> AddState {
        self.add_states.get(control).cloned().unwrap_or_default()
    }

    pub fn add_all_state(&self) -> &AddState {
        &self.add_all
    }

    /// Whether add-to-queue controls are shown, per the last fetched config.
    pub fn queue_controls_visible(&self) -> bool {
        self.queue_enabled
    }

    /// The batch copy control is only offered for more than one link.
    pub fn copy_all_available(&self) -> bool {
        self.results.len() > 1
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight > 0
    }

    pub fn row(&self, control: &ControlId) -> Option<&ResultRow> {
        self.groups
            .iter()
            .find(|group| group.thread_id == control.thread_id)
            .and_then(|group| group.links.get(control.index))
    }

    /// Starts a search with the current criteria.
    ///
    /// Empty criteria are rejected without a request and leave the result
    /// set untouched. A trigger while a search is outstanding is ignored.
    pub fn submit_search(&mut self) -> Result<(), ActionError> {
        if self.search == SearchState::Searching {
            debug!("search already in flight; ignoring trigger");
            return Ok(());
        }
        if self.criteria.is_empty() {
            self.prompt = Some(EMPTY_CRITERIA_PROMPT.to_string());
            return Err(ActionError::Validation(EMPTY_CRITERIA_PROMPT.to_string()));
        }

        self.prompt = None;
        self.search = SearchState::Searching;
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        self.pending_search = Some(request_id);
        info!(request_id, criteria = ?self.criteria, "search started");

        let service = Arc::clone(&self.search_service);
        let criteria = self.criteria.clone();
        self.spawn(move || AsyncResponse::Search {
            request_id,
            result: service.search(&criteria),
        });
        Ok(())
    }

    /// Fetches the queue configuration to show or hide add-to-queue controls.
    pub fn refresh_queue_status(&mut self) {
        let service = Arc::clone(&self.queue_service);
        self.spawn(move || AsyncResponse::QueueStatus {
            result: service.fetch_config(),
        });
    }

    pub fn copy_link(&mut self, control: &ControlId, now: Instant) -> Result<(), ActionError> {
        let link = self
            .row(control)
            .map(|row| row.link.clone())
            .ok_or_else(|| ActionError::Validation("no such link".into()))?;
        match clipboard::copy_one(self.clipboard.as_mut(), &link) {
            Ok(()) => {
                self.copy_states.insert(control.clone(), CopyState::Copied);
                self.timers.schedule(
                    TimerKey::Copy(control.clone()),
                    now,
                    self.timings.copy_feedback,
                );
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "copy failed");
                self.timers.cancel(&TimerKey::Copy(control.clone()));
                self.copy_states
                    .insert(control.clone(), CopyState::Error(err.user_message()));
                Err(err)
            }
        }
    }

    /// Clears copy errors; they stay visible until the next interaction.
    pub fn dismiss_copy_errors(&mut self) {
        self.copy_states
            .retain(|_, state| !matches!(state, CopyState::Error(_)));
    }

    /// Copies every link of the current result set, one per line.
    pub fn copy_all(&mut self, now: Instant) -> Result<usize, ActionError> {
        if self.results.is_empty() {
            return Err(ActionError::Validation("no links to copy".into()));
        }
        let result = clipboard::copy_all(self.clipboard.as_mut(), self.results.rows());
        let banner = match &result {
            Ok(count) => Banner::success(format!("{count} links copied to the clipboard.")),
            Err(err) => {
                warn!(error = %err, "copy all failed");
                Banner::error(format!("Copy failed: {}", err.user_message()))
            }
        };
        self.show_status(banner, now);
        result
    }

    /// Submits one link to the remote queue. Only a `Ready`, visible control
    /// accepts the trigger.
    pub fn add_to_queue(&mut self, control: &ControlId) -> bool {
        if !self.queue_enabled {
            debug!(?control, "queue integration disabled; ignoring add");
            return false;
        }
        if !self.add_state(control).is_enabled() {
            return false;
        }
        let Some(link) = self.row(control).map(|row| row.link.clone()) else {
            return false;
        };

        self.add_states.insert(control.clone(), AddState::Pending);
        info!(?control, "enqueue link");
        let service = Arc::clone(&self.queue_service);
        let generation = self.generation;
        let control = control.clone();
        self.spawn(move || AsyncResponse::Enqueue {
            generation,
            control,
            result: service.enqueue(&link),
        });
        true
    }

    /// Submits every link of the current result set in one request.
    pub fn add_all_to_queue(&mut self) -> bool {
        if !self.queue_enabled || !self.add_all.is_enabled() || self.results.is_empty() {
            return false;
        }
        let links: Vec<String> = self
            .results
            .rows()
            .iter()
            .map(|row| row.link.clone())
            .collect();
        self.add_all = AddState::Pending;
        info!(count = links.len(), "enqueue all links");
        let service = Arc::clone(&self.queue_service);
        let generation = self.generation;
        self.spawn(move || AsyncResponse::EnqueueMany {
            generation,
            result: service.enqueue_many(&links),
        });
        true
    }

    pub fn open_settings(&mut self) {
        if self.settings.is_open() {
            return;
        }
        self.settings.session += 1;
        self.settings.state = PanelState::Loading;
        self.settings.message = None;
        self.settings.saving = false;
        self.settings.testing = false;
        self.timers.cancel(&TimerKey::SettingsMessage);

        let session = self.settings.session;
        let service = Arc::clone(&self.queue_service);
        self.spawn(move || AsyncResponse::SettingsLoaded {
            session,
            result: service.fetch_config(),
        });
    }

    /// Closes the panel. In-flight panel requests still complete, but their
    /// results no longer touch the panel.
    pub fn close_settings(&mut self) {
        if !self.settings.is_open() {
            return;
        }
        self.settings.state = PanelState::Closed;
        self.settings.message = None;
        self.timers.cancel(&TimerKey::SettingsMessage);
    }

    /// A click landed somewhere; closes the panel when it is outside it.
    pub fn click(&mut self, inside_settings: bool) {
        if self.settings.is_open() && !inside_settings {
            self.close_settings();
        }
    }

    pub fn settings_form_mut(&mut self) -> Option<&mut SettingsForm> {
        if self.settings.is_open() {
            Some(&mut self.settings.form)
        } else {
            None
        }
    }

    pub fn save_settings(&mut self, now: Instant) -> bool {
        if self.settings.state != PanelState::Ready || self.settings.saving {
            return false;
        }
        let config = match self.settings.form.to_config() {
            Ok(config) => config,
            Err(err) => {
                self.show_settings_message(Banner::error(err.user_message()), now);
                return false;
            }
        };

        self.settings.saving = true;
        let session = self.settings.session;
        let service = Arc::clone(&self.queue_service);
        self.spawn(move || AsyncResponse::SettingsSaved {
            session,
            result: service.save_config(&config),
        });
        true
    }

    pub fn test_connection(&mut self, now: Instant) -> bool {
        if self.settings.state != PanelState::Ready || self.settings.testing {
            return false;
        }
        self.settings.testing = true;
        self.show_settings_message(Banner::success(TESTING_CONNECTION), now);
        let session = self.settings.session;
        let service = Arc::clone(&self.queue_service);
        self.spawn(move || AsyncResponse::ConnectionTested {
            session,
            result: service.test_connection(),
        });
        true
    }

    /// Applies every completed background request. Returns whether anything
    /// changed.
    pub fn poll_async(&mut self, now: Instant) -> bool {
        let mut changed = false;
        while let Ok(message) = self.response_rx.try_recv() {
            self.handle_async_response(message, now);
            changed = true;
        }
        changed
    }

    /// Blocks until one background request completes or `timeout` elapses.
    pub fn wait_async(&mut self, timeout: Duration, now: Instant) -> bool {
        match self.response_rx.recv_timeout(timeout) {
            Ok(message) => {
                self.handle_async_response(message, now);
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Fires due reverts. Returns whether anything changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let expired = self.timers.expire(now);
        let changed = !expired.is_empty();
        for key in expired {
            debug!(?key, "timer expired");
            match key {
                TimerKey::Copy(control) => {
                    if self.copy_states.get(&control) == Some(&CopyState::Copied) {
                        self.copy_states.remove(&control);
                    }
                }
                TimerKey::Add(control) => {
                    self.add_states.remove(&control);
                }
                TimerKey::AddAll => self.add_all = AddState::Ready,
                TimerKey::SettingsMessage => self.settings.message = None,
                TimerKey::Status => self.status = None,
            }
        }
        changed
    }

    fn spawn<F>(&mut self, job: F)
    where
        F: FnOnce() -> AsyncResponse + Send + 'static,
    {
        self.in_flight += 1;
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let _ = tx.send(job());
        });
    }

    fn handle_async_response(&mut self, message: AsyncResponse, now: Instant) {
        self.in_flight = self.in_flight.saturating_sub(1);
        match message {
            AsyncResponse::Search { request_id, result } => {
                self.finish_search(request_id, result)
            }
            AsyncResponse::QueueStatus { result } => match result {
                Ok(config) => {
                    debug!(enabled = config.enabled, "queue status refreshed");
                    self.queue_enabled = config.enabled;
                }
                Err(err) => warn!(error = %err, "queue status check failed"),
            },
            AsyncResponse::Enqueue {
                generation,
                control,
                result,
            } => {
                if generation != self.generation {
                    debug!(?control, "dropping enqueue result for replaced results");
                    return;
                }
                let state = match result.and_then(ActionOutcome::into_result) {
                    Ok(_) => {
                        info!(?control, "link queued");
                        AddState::Success
                    }
                    Err(err) => {
                        warn!(?control, error = %err, "enqueue failed");
                        AddState::Error(err.user_message())
                    }
                };
                self.add_states.insert(control.clone(), state);
                self.timers
                    .schedule(TimerKey::Add(control), now, self.timings.add_feedback);
            }
            AsyncResponse::EnqueueMany { generation, result } => {
                if generation != self.generation {
                    return;
                }
                let (state, banner) = match result.and_then(BatchOutcome::into_result) {
                    Ok((sent, failed)) => {
                        info!(sent, failed, "batch enqueue finished");
                        let banner = if failed == 0 {
                            Banner::success(format!("{sent} links sent to the download queue."))
                        } else {
                            Banner::error(format!("{sent} links sent, {failed} failed."))
                        };
                        (AddState::Success, banner)
                    }
                    Err(err) => {
                        warn!(error = %err, "batch enqueue failed");
                        let message = err.user_message();
                        (AddState::Error(message.clone()), Banner::error(message))
                    }
                };
                self.add_all = state;
                self.timers
                    .schedule(TimerKey::AddAll, now, self.timings.add_feedback);
                self.show_status(banner, now);
            }
            AsyncResponse::SettingsLoaded { session, result } => {
                if !self.settings.accepts(session) {
                    debug!(session, "settings closed before load finished");
                    return;
                }
                self.settings.state = PanelState::Ready;
                match result {
                    Ok(config) => self.settings.form.fill(config),
                    Err(err) => {
                        warn!(error = %err, "loading queue settings failed");
                        self.show_settings_message(
                            Banner::error(format!(
                                "Failed to load configuration: {}",
                                err.user_message()
                            )),
                            now,
                        );
                    }
                }
            }
            AsyncResponse::SettingsSaved { session, result } => {
                let result = result.and_then(ActionOutcome::into_result);
                if result.is_ok() {
                    info!("queue settings saved");
                    self.refresh_queue_status();
                }
                if !self.settings.accepts(session) {
                    return;
                }
                self.settings.saving = false;
                let banner = match result {
                    Ok(_) => Banner::success(CONFIG_SAVED),
                    Err(err) => {
                        warn!(error = %err, "saving queue settings failed");
                        Banner::error(err.user_message())
                    }
                };
                self.show_settings_message(banner, now);
            }
            AsyncResponse::ConnectionTested { session, result } => {
                if !self.settings.accepts(session) {
                    return;
                }
                self.settings.testing = false;
                let banner = match result.and_then(ActionOutcome::into_result) {
                    Ok(_) => Banner::success(CONNECTION_OK),
                    Err(err) => {
                        warn!(error = %err, "queue connection test failed");
                        Banner::error(err.user_message())
                    }
                };
                self.show_settings_message(banner, now);
            }
        }
    }

    fn finish_search(&mut self, request_id: u64, result: Result<Vec<ResultRow>, ActionError>) {
        if self.pending_search != Some(request_id) {
            debug!(request_id, "dropping stale search response");
            return;
        }
        self.pending_search = None;
        match result {
            Ok(rows) => {
                info!(request_id, rows = rows.len(), "search finished");
                self.results.replace(rows);
                self.generation += 1;
                self.groups = aggregate::group(self.results.rows());
                self.reset_link_controls();
                self.search = SearchState::Displayed;
                self.refresh_queue_status();
            }
            Err(err) => {
                warn!(request_id, error = %err, "search failed");
                self.search = SearchState::Failed(err.user_message());
            }
        }
    }

    fn reset_link_controls(&mut self) {
        for control in self.copy_states.keys() {
            self.timers.cancel(&TimerKey::Copy(control.clone()));
        }
        for control in self.add_states.keys() {
            self.timers.cancel(&TimerKey::Add(control.clone()));
        }
        self.timers.cancel(&TimerKey::AddAll);
        self.copy_states.clear();
        self.add_states.clear();
        self.add_all = AddState::Ready;
    }

    fn show_settings_message(&mut self, banner: Banner, now: Instant) {
        self.settings.message = Some(banner);
        self.timers
            .schedule(TimerKey::SettingsMessage, now, self.timings.message_timeout);
    }

    fn show_status(&mut self, banner: Banner, now: Instant) {
        self.status = Some(banner);
        self.timers
            .schedule(TimerKey::Status, now, self.timings.message_timeout);
    }
}
