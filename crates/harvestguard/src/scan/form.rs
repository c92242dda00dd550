//! Scan form: selection, submit gating and the per-submission state machine.
//!
//! `Idle → Validating → Submitting → Success | Failed`, back to `Idle` on a new
//! selection. Only one submission per form is in flight at a time.

use crate::api::ApiClient;
use crate::probe::ServerStatus;
use crate::scan::file::{validate_batch, validate_single, ImageFile};
use crate::scan::pipeline::{scan_batch, scan_single, ScanOutcome};
use crate::session::SessionStore;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub const OFFLINE_MESSAGE: &str =
    "Cannot scan: Backend server is offline. Please try again later.";
pub const CANCELLED_MESSAGE: &str = "Scan was cancelled before it completed.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanMode {
    Single,
    Batch,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SubmissionState {
    Idle,
    Validating,
    Submitting,
    Success(ScanOutcome),
    Failed(String),
}

impl SubmissionState {
    fn in_flight(&self) -> bool {
        matches!(self, SubmissionState::Validating | SubmissionState::Submitting)
    }
}

/// What a call to [`ScanForm::submit`] did.
#[derive(Clone, Debug, PartialEq)]
pub enum SubmitOutcome {
    /// A submission was already in flight; nothing was sent.
    Ignored,
    Success(ScanOutcome),
    Failed(String),
}

/// Leaves the form `Failed` if a submission is dropped while still in flight.
struct InFlight<'a>(&'a ScanForm);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.0.lock_state();
        if state.in_flight() {
            warn!("scan cancelled while in flight");
            *state = SubmissionState::Failed(CANCELLED_MESSAGE.to_string());
        }
    }
}

/// One scan form: its own selection and state, sharing the client and session.
pub struct ScanForm {
    mode: ScanMode,
    client: Arc<ApiClient>,
    session: Arc<SessionStore>,
    status: Option<watch::Receiver<ServerStatus>>,
    files: Mutex<Vec<ImageFile>>,
    state: Mutex<SubmissionState>,
}

impl ScanForm {
    pub fn new(mode: ScanMode, client: Arc<ApiClient>, session: Arc<SessionStore>) -> Self {
        Self {
            mode,
            client,
            session,
            status: None,
            files: Mutex::new(Vec::new()),
            state: Mutex::new(SubmissionState::Idle),
        }
    }

    /// Gate submits on a status probe's readings.
    pub fn with_status(mut self, status: watch::Receiver<ServerStatus>) -> Self {
        self.status = Some(status);
        self
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    fn lock_state(&self) -> MutexGuard<'_, SubmissionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_files(&self) -> MutexGuard<'_, Vec<ImageFile>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the selection. Single mode keeps the first file only.
    /// Returns the form to `Idle` unless a submission is in flight.
    pub fn select(&self, mut files: Vec<ImageFile>) {
        if self.mode == ScanMode::Single {
            files.truncate(1);
        }
        debug!(count = files.len(), "files selected");
        *self.lock_files() = files;
        let mut state = self.lock_state();
        if !state.in_flight() {
            *state = SubmissionState::Idle;
        }
    }

    pub fn state(&self) -> SubmissionState {
        self.lock_state().clone()
    }

    pub fn server_status(&self) -> ServerStatus {
        self.status
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(ServerStatus::Checking)
    }

    /// Submit control: needs a selection, no submission in flight, and no `Offline` reading.
    pub fn is_submit_enabled(&self) -> bool {
        !self.lock_state().in_flight()
            && !self.lock_files().is_empty()
            && self.server_status() != ServerStatus::Offline
    }

    fn finish(&self, state: SubmissionState) {
        *self.lock_state() = state;
    }

    fn fail(&self, message: String) -> SubmitOutcome {
        warn!(%message, "scan failed");
        self.finish(SubmissionState::Failed(message.clone()));
        SubmitOutcome::Failed(message)
    }

    /// Run one submission. Failures are terminal for the attempt; nothing is retried.
    pub async fn submit(&self) -> SubmitOutcome {
        {
            let mut state = self.lock_state();
            if state.in_flight() {
                debug!("submission already in flight");
                return SubmitOutcome::Ignored;
            }
            *state = SubmissionState::Validating;
        }
        let _in_flight = InFlight(self);
        let files = self.lock_files().clone();

        let validated = match self.mode {
            ScanMode::Single => validate_single(files.first()).map(|_| ()),
            ScanMode::Batch => validate_batch(&files),
        };
        if let Err(e) = validated {
            return self.fail(e.to_string());
        }
        if self.server_status() == ServerStatus::Offline {
            return self.fail(OFFLINE_MESSAGE.to_string());
        }
        let token = match self.session.get_token() {
            Ok(token) => token,
            Err(e) => return self.fail(e.to_string()),
        };

        self.finish(SubmissionState::Submitting);
        let result = match self.mode {
            ScanMode::Single => scan_single(&self.client, files.first(), token.as_deref())
                .await
                .map(ScanOutcome::single),
            ScanMode::Batch => scan_batch(&self.client, &files, token.as_deref())
                .await
                .map(ScanOutcome::batch),
        };
        match result {
            Ok(outcome) => {
                info!(
                    rows = outcome.results.len(),
                    partial_failure = outcome.partial_failure,
                    "scan submitted"
                );
                self.finish(SubmissionState::Success(outcome.clone()));
                SubmitOutcome::Success(outcome)
            }
            Err(e) => self.fail(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::scan::ValidationError;

    fn form(mode: ScanMode) -> ScanForm {
        let client = Arc::new(ApiClient::new(ClientConfig::default()).unwrap());
        let session = Arc::new(SessionStore::open_in_memory().unwrap());
        ScanForm::new(mode, client, session)
    }

    fn image(name: &str) -> ImageFile {
        ImageFile::from_bytes(name, vec![1, 2, 3]).unwrap()
    }

    #[tokio::test]
    async fn empty_selection_fails_locally() {
        let f = form(ScanMode::Batch);
        assert!(!f.is_submit_enabled());
        let out = f.submit().await;
        assert_eq!(
            out,
            SubmitOutcome::Failed(ValidationError::NoFiles.to_string())
        );
        assert_eq!(f.client.request_count(), 0);
        assert!(matches!(f.state(), SubmissionState::Failed(_)));
    }

    #[tokio::test]
    async fn missing_token_is_an_auth_failure() {
        let f = form(ScanMode::Single);
        f.select(vec![image("a.jpg")]);
        assert_eq!(f.state(), SubmissionState::Idle);
        match f.submit().await {
            SubmitOutcome::Failed(msg) => assert!(msg.contains("log in")),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(f.client.request_count(), 0);
    }

    #[tokio::test]
    async fn offline_reading_disables_submit() {
        let (_tx, rx) = watch::channel(ServerStatus::Offline);
        let f = form(ScanMode::Single).with_status(rx);
        f.select(vec![image("a.jpg")]);
        assert!(!f.is_submit_enabled());
        assert_eq!(
            f.submit().await,
            SubmitOutcome::Failed(OFFLINE_MESSAGE.to_string())
        );
        assert_eq!(f.client.request_count(), 0);
    }

    #[tokio::test]
    async fn dropped_submit_leaves_form_usable() {
        // accepts connections but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ClientConfig {
            server_url: format!("http://{}", listener.local_addr().unwrap()),
            ..Default::default()
        };
        let client = Arc::new(ApiClient::new(config).unwrap());
        let session = Arc::new(SessionStore::open_in_memory().unwrap());
        session.set_token("abc").unwrap();
        let f = ScanForm::new(ScanMode::Single, client, session);
        f.select(vec![image("a.jpg")]);

        let pending = tokio::time::timeout(std::time::Duration::from_millis(100), f.submit()).await;
        assert!(pending.is_err());
        assert_eq!(
            f.state(),
            SubmissionState::Failed(CANCELLED_MESSAGE.to_string())
        );
        assert!(f.is_submit_enabled());
        assert_eq!(f.client.request_count(), 1);
    }

    #[test]
    fn single_mode_keeps_one_file_and_reselect_resets() {
        let f = form(ScanMode::Single);
        f.finish(SubmissionState::Failed("x".into()));
        f.select(vec![image("a.jpg"), image("b.png")]);
        assert_eq!(f.lock_files().len(), 1);
        assert_eq!(f.state(), SubmissionState::Idle);
        assert!(f.is_submit_enabled());
    }

    #[test]
    fn select_does_not_interrupt_in_flight() {
        let f = form(ScanMode::Batch);
        f.finish(SubmissionState::Submitting);
        f.select(vec![image("a.jpg")]);
        assert_eq!(f.state(), SubmissionState::Submitting);
        assert!(!f.is_submit_enabled());
    }
}
