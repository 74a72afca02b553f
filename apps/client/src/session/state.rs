//! Session state and its transitions.
//!
//! Every transition is a synchronous method on `SessionState`. A transition
//! that needs the network returns the `Command` to issue; it never performs
//! I/O itself. Results come back as `Completion`s and are applied only when
//! their ticket is still the latest one issued for that operation kind.

use tracing::debug;

use crate::api_client::{
    BackendRequest, BackendResponse, OperationKind, RequestError, RequestErrorKind,
};
use crate::errors::SessionError;
use crate::models::{
    AnalysisResult, DeepDiveResult, Difficulty, Document, ProjectQuestionSet, UploadInput,
};

/// Lifecycle of the most recent request of one kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestState {
    #[default]
    Idle,
    InFlight,
    Succeeded,
    Failed(SessionError),
}

impl RequestState {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, RequestState::InFlight)
    }

    pub fn error(&self) -> Option<&SessionError> {
        match self {
            RequestState::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Identifies one issued request. `seq` grows monotonically per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub kind: OperationKind,
    pub seq: u64,
}

/// A request the driver must send.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub ticket: Ticket,
    pub request: BackendRequest,
}

/// The answer to a `Command`, successful or not.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub ticket: Ticket,
    pub outcome: Result<BackendResponse, SessionError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    Applied,
    /// A newer request of the same kind was issued (or the session was reset).
    Stale,
}

/// What the regeneration timer should do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerDirective {
    Keep,
    Restart,
}

#[derive(Debug, Default)]
struct Sequencer {
    latest: [u64; 4],
}

impl Sequencer {
    fn issue(&mut self, kind: OperationKind) -> Ticket {
        let slot = &mut self.latest[kind.index()];
        *slot += 1;
        Ticket { kind, seq: *slot }
    }

    fn is_current(&self, ticket: Ticket) -> bool {
        self.latest[ticket.kind.index()] == ticket.seq
    }

    /// Makes every outstanding ticket of `kind` stale.
    fn invalidate(&mut self, kind: OperationKind) {
        self.latest[kind.index()] += 1;
    }
}

/// Everything the user sees, and the rules for changing it.
#[derive(Debug, Default)]
pub struct SessionState {
    input: UploadInput,
    analysis: Option<AnalysisResult>,
    deep_dive: Option<DeepDiveResult>,
    project_questions: Option<ProjectQuestionSet>,
    drilldown_project: Option<String>,
    requests: [RequestState; 4],
    /// Set by the first successful initial analysis; enables regeneration.
    armed: bool,
    /// A regeneration is waiting for the quiet period to pass.
    regeneration_scheduled: bool,
    /// The quiet period passed while an initial analysis was in flight.
    regeneration_deferred: bool,
    /// Difficulty the latest initial analysis was requested at.
    submitted_difficulty: Option<Difficulty>,
    sequencer: Sequencer,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Read access ─────────────────────────────────────────────────────────

    pub fn input(&self) -> &UploadInput {
        &self.input
    }

    pub fn analysis(&self) -> Option<&AnalysisResult> {
        self.analysis.as_ref()
    }

    pub fn deep_dive(&self) -> Option<&DeepDiveResult> {
        self.deep_dive.as_ref()
    }

    pub fn project_questions(&self) -> Option<&ProjectQuestionSet> {
        self.project_questions.as_ref()
    }

    /// The project currently being (or last) drilled into.
    pub fn drilldown_project(&self) -> Option<&str> {
        self.drilldown_project.as_deref()
    }

    pub fn request_state(&self, kind: OperationKind) -> &RequestState {
        &self.requests[kind.index()]
    }

    pub fn error(&self, kind: OperationKind) -> Option<&SessionError> {
        self.request_state(kind).error()
    }

    #[allow(dead_code)]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn regeneration_scheduled(&self) -> bool {
        self.regeneration_scheduled
    }

    /// True while a regeneration is waiting on the timer or on the backend.
    pub fn is_regenerating(&self) -> bool {
        self.regeneration_scheduled
            || self.regeneration_deferred
            || self.request_state(OperationKind::Regeneration).is_in_flight()
    }

    /// Submit is possible: a document, a job description, nothing in flight.
    #[allow(dead_code)]
    pub fn can_submit(&self) -> bool {
        self.input.document.is_some()
            && !self.input.job_description.trim().is_empty()
            && !self.request_state(OperationKind::InitialAnalysis).is_in_flight()
    }

    // ── Transitions ─────────────────────────────────────────────────────────

    /// Picking a new résumé discards everything derived from the old one.
    pub fn select_document(&mut self, document: Document) {
        self.input.document = Some(document);
        self.clear_results();
        self.armed = false;
    }

    pub fn set_job_description(&mut self, text: impl Into<String>) {
        self.input.job_description = text.into();
    }

    pub fn submit_initial_analysis(&mut self) -> Result<Command, SessionError> {
        let kind = OperationKind::InitialAnalysis;

        let Some(document) = self.input.document.clone() else {
            return Err(self.fail(kind, SessionError::Validation(
                "Please select a PDF file first.".to_string(),
            )));
        };
        if self.input.job_description.trim().is_empty() {
            return Err(self.fail(kind, SessionError::Validation(
                "Please enter a job role or description.".to_string(),
            )));
        }

        self.clear_results();
        self.requests[kind.index()] = RequestState::InFlight;
        self.submitted_difficulty = Some(self.input.difficulty);

        Ok(Command {
            ticket: self.sequencer.issue(kind),
            request: BackendRequest::AnalyzeResume {
                document,
                job_description: self.input.job_description.clone(),
                difficulty: self.input.difficulty,
            },
        })
    }

    /// The level is stored even before arming; only armed sessions schedule a request.
    pub fn change_difficulty(&mut self, level: u8) -> Result<TimerDirective, SessionError> {
        self.input.difficulty = Difficulty::new(level)?;

        if !self.armed {
            return Ok(TimerDirective::Keep);
        }
        self.regeneration_scheduled = true;
        Ok(TimerDirective::Restart)
    }

    /// Called when the quiet period elapses. Uses the difficulty current at this moment.
    ///
    /// While an initial analysis is in flight there are no questions to replace
    /// yet; the request is deferred until that analysis lands.
    pub fn fire_regeneration(&mut self) -> Option<Command> {
        self.regeneration_scheduled = false;
        if !self.armed {
            return None;
        }
        if self.request_state(OperationKind::InitialAnalysis).is_in_flight() {
            debug!("Regeneration due during initial analysis; deferring");
            self.regeneration_deferred = true;
            return None;
        }
        self.issue_regeneration()
    }

    pub fn regeneration_deferred(&self) -> bool {
        self.regeneration_deferred
    }

    /// Issues a deferred regeneration once the initial analysis has succeeded,
    /// unless its questions already match the selected difficulty.
    pub fn take_deferred_regeneration(&mut self) -> Option<Command> {
        if !std::mem::take(&mut self.regeneration_deferred) {
            return None;
        }
        if self.request_state(OperationKind::InitialAnalysis) != &RequestState::Succeeded {
            return None;
        }
        if self.submitted_difficulty == Some(self.input.difficulty) {
            debug!("Analysis already at difficulty {}; no regeneration", self.input.difficulty);
            return None;
        }
        self.issue_regeneration()
    }

    fn issue_regeneration(&mut self) -> Option<Command> {
        let Some(analysis) = self.analysis.as_ref().filter(|a| a.has_resume_text()) else {
            debug!("Regeneration due but no analysis with résumé text; skipping");
            return None;
        };
        let request = BackendRequest::RegenerateQuestions {
            resume_text: analysis.raw_resume_text.clone(),
            job_description: self.input.job_description.clone(),
            difficulty: self.input.difficulty,
        };

        let kind = OperationKind::Regeneration;
        self.requests[kind.index()] = RequestState::InFlight;
        Some(Command {
            ticket: self.sequencer.issue(kind),
            request,
        })
    }

    pub fn request_deep_dive(&mut self) -> Result<Command, SessionError> {
        let kind = OperationKind::DeepDive;
        let Some(resume_text) = self.resume_text() else {
            return Err(self.fail(kind, SessionError::Precondition(
                "Cannot run deep dive without a successful initial analysis.".to_string(),
            )));
        };

        self.deep_dive = None;
        self.requests[kind.index()] = RequestState::InFlight;
        Ok(Command {
            ticket: self.sequencer.issue(kind),
            request: BackendRequest::DeepDive { resume_text },
        })
    }

    /// Drilldown swaps the subject, so the previous set is dropped up front.
    pub fn request_project_drilldown(&mut self, project_name: &str) -> Result<Command, SessionError> {
        let kind = OperationKind::ProjectDrilldown;
        let project_name = project_name.trim();
        if project_name.is_empty() {
            return Err(self.fail(kind, SessionError::Validation(
                "Please choose a project.".to_string(),
            )));
        }
        let Some(resume_text) = self.resume_text() else {
            return Err(self.fail(kind, SessionError::Precondition(
                "Cannot drill into a project without a successful initial analysis.".to_string(),
            )));
        };

        self.project_questions = None;
        self.drilldown_project = Some(project_name.to_string());
        self.requests[kind.index()] = RequestState::InFlight;
        Ok(Command {
            ticket: self.sequencer.issue(kind),
            request: BackendRequest::ProjectQuestions {
                resume_text,
                project_name: project_name.to_string(),
            },
        })
    }

    /// Applies a finished request, unless a newer one of the same kind superseded it.
    pub fn apply(&mut self, completion: Completion) -> CompletionOutcome {
        let Completion { ticket, outcome } = completion;
        if !self.sequencer.is_current(ticket) {
            debug!("Dropping stale {} response #{}", ticket.kind, ticket.seq);
            return CompletionOutcome::Stale;
        }

        let kind = ticket.kind;
        let response = match outcome {
            Ok(response) => response,
            Err(err) => {
                // Failures only touch their own slot; earlier results stay visible.
                self.requests[kind.index()] = RequestState::Failed(err);
                return CompletionOutcome::Applied;
            }
        };

        match (kind, response) {
            (OperationKind::InitialAnalysis, BackendResponse::Analysis(result)) => {
                self.analysis = Some(result);
                self.armed = true;
            }
            (OperationKind::DeepDive, BackendResponse::DeepDive(result)) => {
                self.deep_dive = Some(result);
            }
            (OperationKind::ProjectDrilldown, BackendResponse::ProjectQuestions(response)) => {
                let project_name = self
                    .drilldown_project
                    .clone()
                    .or(response.project_name)
                    .unwrap_or_default();
                self.project_questions = Some(ProjectQuestionSet {
                    project_name,
                    questions: response.questions,
                });
            }
            (OperationKind::Regeneration, BackendResponse::Regenerated(regenerated)) => {
                if let Some(analysis) = self.analysis.as_mut() {
                    analysis.categorized_questions = regenerated.categorized_questions;
                }
            }
            (kind, other) => {
                self.requests[kind.index()] = RequestState::Failed(SessionError::Request(
                    RequestError {
                        kind: RequestErrorKind::MalformedResponse,
                        message: format!("Unexpected response for {kind}: {other:?}"),
                    },
                ));
                return CompletionOutcome::Applied;
            }
        }

        self.requests[kind.index()] = RequestState::Succeeded;
        CompletionOutcome::Applied
    }

    /// Back to a blank session, e.g. after sign-out. Outstanding requests become stale.
    pub fn reset(&mut self) {
        self.input = UploadInput::default();
        self.clear_results();
        self.armed = false;
    }

    // ── Helpers ─────────────────────────────────────────────────────────────

    fn resume_text(&self) -> Option<String> {
        self.analysis
            .as_ref()
            .filter(|a| a.has_resume_text())
            .map(|a| a.raw_resume_text.clone())
    }

    fn fail(&mut self, kind: OperationKind, err: SessionError) -> SessionError {
        self.requests[kind.index()] = RequestState::Failed(err.clone());
        err
    }

    fn clear_results(&mut self) {
        self.analysis = None;
        self.deep_dive = None;
        self.project_questions = None;
        self.drilldown_project = None;
        self.regeneration_scheduled = false;
        self.regeneration_deferred = false;
        for kind in OperationKind::ALL {
            self.requests[kind.index()] = RequestState::Idle;
            self.sequencer.invalidate(kind);
        }
    }
}
