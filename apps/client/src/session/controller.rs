//! Session controller: drives `SessionState` against the real world.
//!
//! Owns the state, the regeneration timer, and the channel that backend
//! tasks and the timer report back on. Callers use the `&mut self` methods
//! for user actions and `next_update` / `settle` to let results land.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::api_client::{AnalysisBackend, BackendRequest, BackendResponse, OperationKind};
use crate::auth::{AuthGate, AuthSnapshot};
use crate::errors::SessionError;
use crate::models::{Difficulty, Document};
use crate::session::debounce::{DebouncedTrigger, TimerToken};
use crate::session::state::{
    Command, Completion, CompletionOutcome, SessionState, Ticket, TimerDirective,
};

enum SessionEvent {
    Completed(Completion),
    RegenerationDue(TimerToken),
}

/// What a single `next_update` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    Applied(OperationKind),
    /// A response arrived for a superseded request and was ignored.
    Discarded(OperationKind),
    RegenerationIssued(Difficulty),
    /// The quiet period passed during an initial analysis; regeneration waits for it.
    RegenerationDeferred,
    /// The quiet period passed but there was nothing to regenerate.
    RegenerationSkipped,
    /// A timer firing lost the race against a newer schedule or a cancel.
    TimerSuperseded,
    AuthChanged { signed_in: bool },
}

pub struct SessionController {
    state: SessionState,
    auth: Arc<AuthGate>,
    auth_rx: watch::Receiver<AuthSnapshot>,
    backend: Arc<dyn AnalysisBackend>,
    trigger: DebouncedTrigger,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    /// Spawned backend tasks that have not reported back yet, stale ones included.
    outstanding: usize,
}

impl SessionController {
    pub fn new(
        auth: Arc<AuthGate>,
        backend: Arc<dyn AnalysisBackend>,
        quiet_period: Duration,
    ) -> Self {
        let auth_rx = auth.subscribe();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            state: SessionState::new(),
            auth,
            auth_rx,
            backend,
            trigger: DebouncedTrigger::new(quiet_period),
            events_tx,
            events_rx,
            outstanding: 0,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    // ── User actions ────────────────────────────────────────────────────────

    pub fn select_document(&mut self, document: Document) {
        info!("Selected document {}", document.file_name);
        self.state.select_document(document);
        self.reconcile_timer();
    }

    pub fn set_job_description(&mut self, text: impl Into<String>) {
        self.state.set_job_description(text);
    }

    pub fn submit_initial_analysis(&mut self) -> Result<Ticket, SessionError> {
        let command = self.state.submit_initial_analysis()?;
        self.reconcile_timer();
        Ok(self.dispatch(command))
    }

    pub fn change_difficulty(&mut self, level: u8) -> Result<(), SessionError> {
        match self.state.change_difficulty(level)? {
            TimerDirective::Restart => {
                let tx = self.events_tx.clone();
                self.trigger.schedule(move |token| {
                    // Receiver only goes away with the controller.
                    let _ = tx.send(SessionEvent::RegenerationDue(token));
                });
                debug!(
                    "Regeneration at difficulty {level} scheduled in {:?}",
                    self.trigger.quiet_period()
                );
            }
            TimerDirective::Keep => {}
        }
        Ok(())
    }

    pub fn request_deep_dive(&mut self) -> Result<Ticket, SessionError> {
        let command = self.state.request_deep_dive()?;
        Ok(self.dispatch(command))
    }

    pub fn request_project_drilldown(&mut self, project_name: &str) -> Result<Ticket, SessionError> {
        let command = self.state.request_project_drilldown(project_name)?;
        Ok(self.dispatch(command))
    }

    /// Session state is cleared once the gate reports the sign-out.
    pub fn sign_out(&self) {
        self.auth.sign_out();
    }

    // ── Event loop ──────────────────────────────────────────────────────────

    /// Nothing in flight and no regeneration waiting on the timer.
    pub fn is_idle(&self) -> bool {
        self.outstanding == 0 && !self.trigger.is_pending()
    }

    /// Waits for and applies the next event. Never returns while idle and
    /// no auth change arrives; use `settle` for a bounded wait.
    pub async fn next_update(&mut self) -> Update {
        tokio::select! {
            Some(event) = self.events_rx.recv() => self.handle_event(event),
            Ok(()) = self.auth_rx.changed() => self.handle_auth_change(),
        }
    }

    /// Applies events until every request has reported back and no timer is pending.
    pub async fn settle(&mut self) -> Vec<Update> {
        let mut updates = Vec::new();
        while !self.is_idle() {
            updates.push(self.next_update().await);
        }
        updates
    }

    fn dispatch(&mut self, command: Command) -> Ticket {
        let Command { ticket, request } = command;
        info!("Issuing {} request #{}", ticket.kind, ticket.seq);

        let auth = Arc::clone(&self.auth);
        let backend = Arc::clone(&self.backend);
        let tx = self.events_tx.clone();
        self.outstanding += 1;

        tokio::spawn(async move {
            let outcome = execute(&auth, backend.as_ref(), request).await;
            if tx
                .send(SessionEvent::Completed(Completion { ticket, outcome }))
                .is_err()
            {
                debug!("Session closed before {} #{} finished", ticket.kind, ticket.seq);
            }
        });

        ticket
    }

    fn handle_event(&mut self, event: SessionEvent) -> Update {
        match event {
            SessionEvent::Completed(completion) => {
                self.outstanding = self.outstanding.saturating_sub(1);
                let kind = completion.ticket.kind;
                if let Err(e) = &completion.outcome {
                    warn!("{kind} #{} failed: {e}", completion.ticket.seq);
                }
                match self.state.apply(completion) {
                    CompletionOutcome::Applied => {
                        if kind == OperationKind::InitialAnalysis {
                            if let Some(command) = self.state.take_deferred_regeneration() {
                                info!("Analysis landed; issuing deferred regeneration");
                                self.dispatch(command);
                            }
                        }
                        Update::Applied(kind)
                    }
                    CompletionOutcome::Stale => Update::Discarded(kind),
                }
            }
            SessionEvent::RegenerationDue(token) => {
                if !self.trigger.claim(token) {
                    return Update::TimerSuperseded;
                }
                match self.state.fire_regeneration() {
                    Some(command) => {
                        let difficulty = self.state.input().difficulty;
                        self.dispatch(command);
                        Update::RegenerationIssued(difficulty)
                    }
                    None if self.state.regeneration_deferred() => Update::RegenerationDeferred,
                    None => Update::RegenerationSkipped,
                }
            }
        }
    }

    fn handle_auth_change(&mut self) -> Update {
        let signed_in = self.auth_rx.borrow_and_update().principal.is_some();
        if !signed_in {
            info!("Signed out; clearing session");
            self.state.reset();
            self.reconcile_timer();
        }
        Update::AuthChanged { signed_in }
    }

    fn reconcile_timer(&mut self) {
        if !self.state.regeneration_scheduled() && self.trigger.cancel() {
            debug!("Pending regeneration cancelled");
        }
    }
}

async fn execute(
    auth: &AuthGate,
    backend: &dyn AnalysisBackend,
    request: BackendRequest,
) -> Result<BackendResponse, SessionError> {
    let headers = auth.mint_auth_headers(request.is_multipart()).await?;
    Ok(backend.execute(request, headers).await?)
}
