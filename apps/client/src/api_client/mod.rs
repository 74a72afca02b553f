/// Request client: the single point of entry for all analysis backend calls.
///
/// No other module talks to the backend over HTTP. The session controller
/// reaches it through the `AnalysisBackend` trait so tests can script responses.
///
/// No retries and no default timeout: a failed call is reported once and the
/// caller decides what to do with it.
use std::fmt;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::auth::AuthHeaders;
use crate::config::Config;
use crate::models::{
    AnalysisResult, DeepDiveResult, Difficulty, Document, ProjectQuestionsResponse,
    RegeneratedQuestions,
};

const ANALYZE_PATH: &str = "/analyze-resume/";
const DEEP_DIVE_PATH: &str = "/deep-dive-analysis/";
const PROJECT_QUESTIONS_PATH: &str = "/project-questions/";
const REGENERATE_PATH: &str = "/regenerate-questions/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestErrorKind {
    /// Connection, TLS or timeout failure; no usable response.
    NetworkFailure,
    /// Non-2xx response.
    ServerRejected { status: u16 },
    /// 2xx response whose body did not match the expected shape.
    MalformedResponse,
    /// The request could not be built locally; nothing was sent.
    InvalidRequest,
}

impl RequestErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            RequestErrorKind::NetworkFailure => "NETWORK_FAILURE",
            RequestErrorKind::ServerRejected { .. } => "SERVER_REJECTED",
            RequestErrorKind::MalformedResponse => "MALFORMED_RESPONSE",
            RequestErrorKind::InvalidRequest => "INVALID_REQUEST",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RequestError {
    pub kind: RequestErrorKind,
    /// Human-readable; the server's `detail` when it sent one.
    pub message: String,
}

impl RequestError {
    fn network(err: reqwest::Error) -> Self {
        Self {
            kind: RequestErrorKind::NetworkFailure,
            message: err.to_string(),
        }
    }

    fn invalid(message: String) -> Self {
        Self {
            kind: RequestErrorKind::InvalidRequest,
            message,
        }
    }
}

/// The four backend operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    InitialAnalysis,
    DeepDive,
    ProjectDrilldown,
    Regeneration,
}

impl OperationKind {
    pub const ALL: [OperationKind; 4] = [
        OperationKind::InitialAnalysis,
        OperationKind::DeepDive,
        OperationKind::ProjectDrilldown,
        OperationKind::Regeneration,
    ];

    pub fn index(self) -> usize {
        match self {
            OperationKind::InitialAnalysis => 0,
            OperationKind::DeepDive => 1,
            OperationKind::ProjectDrilldown => 2,
            OperationKind::Regeneration => 3,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::InitialAnalysis => "initial analysis",
            OperationKind::DeepDive => "deep dive",
            OperationKind::ProjectDrilldown => "project drilldown",
            OperationKind::Regeneration => "regeneration",
        };
        f.write_str(name)
    }
}

/// A fully-formed backend call, built by the session state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendRequest {
    AnalyzeResume {
        document: Document,
        job_description: String,
        difficulty: Difficulty,
    },
    DeepDive {
        resume_text: String,
    },
    ProjectQuestions {
        resume_text: String,
        project_name: String,
    },
    RegenerateQuestions {
        resume_text: String,
        job_description: String,
        difficulty: Difficulty,
    },
}

impl BackendRequest {
    #[allow(dead_code)]
    pub fn kind(&self) -> OperationKind {
        match self {
            BackendRequest::AnalyzeResume { .. } => OperationKind::InitialAnalysis,
            BackendRequest::DeepDive { .. } => OperationKind::DeepDive,
            BackendRequest::ProjectQuestions { .. } => OperationKind::ProjectDrilldown,
            BackendRequest::RegenerateQuestions { .. } => OperationKind::Regeneration,
        }
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self, BackendRequest::AnalyzeResume { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackendResponse {
    Analysis(AnalysisResult),
    DeepDive(DeepDiveResult),
    ProjectQuestions(ProjectQuestionsResponse),
    Regenerated(RegeneratedQuestions),
}

/// The analysis backend as seen by the session controller.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn execute(
        &self,
        request: BackendRequest,
        auth: AuthHeaders,
    ) -> Result<BackendResponse, RequestError>;
}

#[derive(Debug, Serialize)]
struct DeepDiveBody<'a> {
    resume_text: &'a str,
}

#[derive(Debug, Serialize)]
struct ProjectQuestionsBody<'a> {
    resume_text: &'a str,
    project_name: &'a str,
}

#[derive(Debug, Serialize)]
struct RegenerateBody<'a> {
    resume_text: &'a str,
    job_description: &'a str,
    difficulty: u8,
}

/// HTTP client for the analysis backend.
#[derive(Clone)]
pub struct RequestClient {
    client: Client,
    base_url: String,
}

impl RequestClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: config.api_url.clone(),
        })
    }

    /// POST /analyze-resume/ (multipart: file, job_description, difficulty)
    pub async fn analyze_resume(
        &self,
        document: &Document,
        job_description: &str,
        difficulty: Difficulty,
        auth: &AuthHeaders,
    ) -> Result<AnalysisResult, RequestError> {
        let file = Part::bytes(document.bytes.to_vec())
            .file_name(document.file_name.clone())
            .mime_str(&document.mime_type)
            .map_err(|e| {
                RequestError::invalid(format!(
                    "Invalid content type '{}' for {}: {e}",
                    document.mime_type, document.file_name
                ))
            })?;

        let form = Form::new()
            .part("file", file)
            .text("job_description", job_description.to_string())
            .text("difficulty", difficulty.to_string());

        // The form encoder declares multipart/form-data together with its boundary.
        debug!(
            "Uploading {} ({} bytes), declared content type {:?}",
            document.file_name,
            document.bytes.len(),
            auth.content_type
        );
        let builder = self.post(ANALYZE_PATH, auth).multipart(form);
        self.send(ANALYZE_PATH, builder).await
    }

    /// POST /deep-dive-analysis/
    pub async fn deep_dive(
        &self,
        resume_text: &str,
        auth: &AuthHeaders,
    ) -> Result<DeepDiveResult, RequestError> {
        let builder = self
            .post(DEEP_DIVE_PATH, auth)
            .json(&DeepDiveBody { resume_text });
        self.send(DEEP_DIVE_PATH, builder).await
    }

    /// POST /project-questions/
    pub async fn project_questions(
        &self,
        resume_text: &str,
        project_name: &str,
        auth: &AuthHeaders,
    ) -> Result<ProjectQuestionsResponse, RequestError> {
        let builder = self
            .post(PROJECT_QUESTIONS_PATH, auth)
            .json(&ProjectQuestionsBody {
                resume_text,
                project_name,
            });
        self.send(PROJECT_QUESTIONS_PATH, builder).await
    }

    /// POST /regenerate-questions/
    pub async fn regenerate_questions(
        &self,
        resume_text: &str,
        job_description: &str,
        difficulty: Difficulty,
        auth: &AuthHeaders,
    ) -> Result<RegeneratedQuestions, RequestError> {
        let builder = self.post(REGENERATE_PATH, auth).json(&RegenerateBody {
            resume_text,
            job_description,
            difficulty: difficulty.level(),
        });
        self.send(REGENERATE_PATH, builder).await
    }

    fn post(&self, path: &str, auth: &AuthHeaders) -> RequestBuilder {
        self.client
            .post(format!("{}{path}", self.base_url))
            .header(AUTHORIZATION, &auth.authorization)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        path: &str,
        builder: RequestBuilder,
    ) -> Result<T, RequestError> {
        let response = builder.send().await.map_err(|e| {
            warn!("POST {path} failed before a response: {e}");
            RequestError::network(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = extract_detail(&body)
                .unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()));
            warn!("POST {path} rejected with {status}: {message}");
            return Err(RequestError {
                kind: RequestErrorKind::ServerRejected {
                    status: status.as_u16(),
                },
                message,
            });
        }

        let body = response.bytes().await.map_err(RequestError::network)?;
        debug!("POST {path} succeeded ({} bytes)", body.len());

        serde_json::from_slice(&body).map_err(|e| RequestError {
            kind: RequestErrorKind::MalformedResponse,
            message: format!("Unexpected response from {path}: {e}"),
        })
    }
}

#[async_trait]
impl AnalysisBackend for RequestClient {
    async fn execute(
        &self,
        request: BackendRequest,
        auth: AuthHeaders,
    ) -> Result<BackendResponse, RequestError> {
        match request {
            BackendRequest::AnalyzeResume {
                document,
                job_description,
                difficulty,
            } => self
                .analyze_resume(&document, &job_description, difficulty, &auth)
                .await
                .map(BackendResponse::Analysis),
            BackendRequest::DeepDive { resume_text } => self
                .deep_dive(&resume_text, &auth)
                .await
                .map(BackendResponse::DeepDive),
            BackendRequest::ProjectQuestions {
                resume_text,
                project_name,
            } => self
                .project_questions(&resume_text, &project_name, &auth)
                .await
                .map(BackendResponse::ProjectQuestions),
            BackendRequest::RegenerateQuestions {
                resume_text,
                job_description,
                difficulty,
            } => self
                .regenerate_questions(&resume_text, &job_description, difficulty, &auth)
                .await
                .map(BackendResponse::Regenerated),
        }
    }
}

/// Pulls the human-readable `detail` out of an error body.
///
/// FastAPI sends either a string or, for request validation failures, a list
/// of objects each carrying a `msg`.
fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    }
}
