//! Shared test doubles: an in-memory identity provider, a scripted backend,
//! fixtures, and a helper that serves an axum router on an ephemeral port.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::api_client::{
    AnalysisBackend, BackendRequest, BackendResponse, OperationKind, RequestError,
    RequestErrorKind,
};
use crate::auth::{AuthError, AuthHeaders, AuthListener, IdentityProvider, Principal, TokenSource};
use crate::models::{
    AnalysisResult, Document, ProjectQuestionsResponse, QuestionCategories, QuestionCategory,
    QuestionItem,
};

/// Serves `router` on 127.0.0.1 and returns its base URL.
pub async fn serve(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

// ── Identity ────────────────────────────────────────────────────────────────

struct CountingTokens {
    minted: Arc<AtomicUsize>,
}

#[async_trait]
impl TokenSource for CountingTokens {
    async fn id_token(&self) -> Result<String, AuthError> {
        let n = self.minted.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("token-{n}"))
    }
}

type SharedListener = Arc<dyn Fn(Option<Principal>) + Send + Sync>;

pub struct FakeIdentity {
    current: Mutex<Option<Principal>>,
    listeners: Mutex<Vec<SharedListener>>,
    minted: Arc<AtomicUsize>,
    sign_out_calls: AtomicUsize,
    fail_sign_out: bool,
    report_on_subscribe: bool,
}

impl FakeIdentity {
    fn build(report_on_subscribe: bool) -> Self {
        Self {
            current: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
            minted: Arc::new(AtomicUsize::new(0)),
            sign_out_calls: AtomicUsize::new(0),
            fail_sign_out: false,
            report_on_subscribe,
        }
    }

    /// Never reports on subscribe; use `emit` to drive it.
    pub fn silent() -> Self {
        Self::build(false)
    }

    pub fn signed_out() -> Self {
        Self::build(true)
    }

    pub fn signed_in(uid: &str) -> Self {
        let identity = Self::build(true);
        let principal = identity.principal(uid, None);
        *identity.current.lock().unwrap() = Some(principal);
        identity
    }

    pub fn failing_sign_out(mut self) -> Self {
        self.fail_sign_out = true;
        self
    }

    pub fn principal(&self, uid: &str, email: Option<String>) -> Principal {
        Principal::new(
            uid,
            email,
            Arc::new(CountingTokens {
                minted: Arc::clone(&self.minted),
            }),
        )
    }

    pub fn emit(&self, principal: Option<Principal>) {
        *self.current.lock().unwrap() = principal.clone();
        let listeners: Vec<SharedListener> = self.listeners.lock().unwrap().clone();
        for listener in listeners {
            listener(principal.clone());
        }
    }

    pub fn tokens_minted(&self) -> usize {
        self.minted.load(Ordering::SeqCst)
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    fn on_auth_state_changed(&self, listener: AuthListener) {
        let listener: SharedListener = Arc::from(listener);
        self.listeners.lock().unwrap().push(Arc::clone(&listener));
        if self.report_on_subscribe {
            let current = self.current.lock().unwrap().clone();
            listener(current);
        }
    }

    async fn sign_in(&self, email: &str, _password: &str) -> Result<Principal, AuthError> {
        let principal = self.principal(&format!("uid-{email}"), Some(email.to_string()));
        self.emit(Some(principal.clone()));
        Ok(principal)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        self.sign_in(email, password).await
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_sign_out {
            return Err(AuthError::Provider("network down".to_string()));
        }
        self.emit(None);
        Ok(())
    }
}

// ── Backend ─────────────────────────────────────────────────────────────────

struct Scripted {
    delay: Duration,
    outcome: Result<BackendResponse, RequestError>,
}

/// Backend double: records every call and answers from a per-kind script,
/// after the scripted delay.
#[derive(Default)]
pub struct ScriptedBackend {
    calls: Mutex<Vec<(BackendRequest, AuthHeaders)>>,
    script: Mutex<HashMap<OperationKind, VecDeque<Scripted>>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(
        &self,
        kind: OperationKind,
        delay_ms: u64,
        outcome: Result<BackendResponse, RequestError>,
    ) {
        self.script
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push_back(Scripted {
                delay: Duration::from_millis(delay_ms),
                outcome,
            });
    }

    pub fn requests(&self) -> Vec<(BackendRequest, AuthHeaders)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn requests_of(&self, kind: OperationKind) -> Vec<BackendRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(request, _)| request.kind() == kind)
            .map(|(request, _)| request.clone())
            .collect()
    }
}

#[async_trait]
impl AnalysisBackend for ScriptedBackend {
    async fn execute(
        &self,
        request: BackendRequest,
        auth: AuthHeaders,
    ) -> Result<BackendResponse, RequestError> {
        let kind = request.kind();
        self.calls.lock().unwrap().push((request, auth));

        let next = self
            .script
            .lock()
            .unwrap()
            .get_mut(&kind)
            .and_then(VecDeque::pop_front);
        let Some(Scripted { delay, outcome }) = next else {
            return Err(RequestError {
                kind: RequestErrorKind::ServerRejected { status: 500 },
                message: format!("no scripted response for {kind}"),
            });
        };

        tokio::time::sleep(delay).await;
        outcome
    }
}

// ── Fixtures ────────────────────────────────────────────────────────────────

pub fn pdf() -> Document {
    Document::new("jane_doe.pdf", "application/pdf", Bytes::from_static(b"%PDF-1.4"))
}

pub fn question(text: &str, difficulty: u8) -> QuestionItem {
    QuestionItem {
        question: text.to_string(),
        difficulty,
        expected_answer: "Indexes trade write cost for faster indexing lookups.".to_string(),
        non_technical_explanation: "Like the index at the back of a book.".to_string(),
        keywords: vec!["indexing".to_string()],
    }
}

/// One category holding `count` questions of the given difficulty.
pub fn categories(name: &str, count: usize, difficulty: u8) -> QuestionCategories {
    QuestionCategories(vec![QuestionCategory {
        name: name.to_string(),
        questions: (0..count)
            .map(|i| question(&format!("Question {}", i + 1), difficulty))
            .collect(),
    }])
}

pub fn analysis_fixture() -> AnalysisResult {
    AnalysisResult {
        candidate_name: "Jane Doe".to_string(),
        alignment_summary: None,
        confidence_score: None,
        categorized_questions: QuestionCategories(vec![QuestionCategory {
            name: "Backend".to_string(),
            questions: vec![question("Explain indexing", 3)],
        }]),
        raw_resume_text: "Jane Doe\nBackend Engineer at Acme".to_string(),
        date_analysis: None,
        potential_inconsistencies: None,
        project_names: vec!["Checkout Service".to_string()],
    }
}

pub fn project_questions_fixture() -> ProjectQuestionsResponse {
    ProjectQuestionsResponse {
        project_name: Some("Checkout Service".to_string()),
        questions: vec![question("How did you make refunds idempotent?", 4)],
    }
}
