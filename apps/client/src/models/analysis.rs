//! Response shapes returned by the analysis backend.
//!
//! Field names follow the backend's camelCase JSON. Everything except the
//! question bodies is optional on the wire so that both summary variants
//! (`alignmentSummary` or `confidenceScore`) decode into the same type.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// A single generated interview question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionItem {
    pub question: String,
    /// 1 (easy) to 5 (hard), as judged by the backend.
    pub difficulty: u8,
    #[serde(default)]
    pub expected_answer: String,
    #[serde(default)]
    pub non_technical_explanation: String,
    /// Terms to listen for. Used for highlighting only.
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionCategory {
    pub name: String,
    pub questions: Vec<QuestionItem>,
}

/// Category name → questions, in the order the backend listed them.
///
/// Encoded on the wire as a JSON object; a plain map type would lose the order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionCategories(pub Vec<QuestionCategory>);

impl QuestionCategories {
    pub fn iter(&self) -> impl Iterator<Item = &QuestionCategory> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[allow(dead_code)]
    pub fn get(&self, name: &str) -> Option<&[QuestionItem]> {
        self.0
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.questions.as_slice())
    }

    pub fn question_count(&self) -> usize {
        self.0.iter().map(|c| c.questions.len()).sum()
    }
}

impl Serialize for QuestionCategories {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for category in &self.0 {
            map.serialize_entry(&category.name, &category.questions)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for QuestionCategories {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CategoriesVisitor;

        impl<'de> Visitor<'de> for CategoriesVisitor {
            type Value = QuestionCategories;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping category names to question lists")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut categories = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, questions)) =
                    access.next_entry::<String, Vec<QuestionItem>>()?
                {
                    categories.push(QuestionCategory { name, questions });
                }
                Ok(QuestionCategories(categories))
            }
        }

        deserializer.deserialize_map(CategoriesVisitor)
    }
}

/// How well the résumé lines up with the job description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignmentSummary {
    pub summary_text: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub potential_gaps: Vec<String>,
}

/// Alternative summary shape: a single score, optionally explained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfidenceScore {
    Bare(f64),
    Detailed {
        score: f64,
        #[serde(default)]
        rationale: Option<String>,
    },
}

impl ConfidenceScore {
    pub fn score(&self) -> f64 {
        match self {
            ConfidenceScore::Bare(score) => *score,
            ConfidenceScore::Detailed { score, .. } => *score,
        }
    }

    pub fn rationale(&self) -> Option<&str> {
        match self {
            ConfidenceScore::Bare(_) => None,
            ConfidenceScore::Detailed { rationale, .. } => rationale.as_deref(),
        }
    }
}

/// Borrowed view over whichever summary shape the backend produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Assessment<'a> {
    Alignment(&'a AlignmentSummary),
    Confidence(&'a ConfidenceScore),
}

/// Result of the initial résumé analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    #[serde(default)]
    pub candidate_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment_summary: Option<AlignmentSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<ConfidenceScore>,
    #[serde(default)]
    pub categorized_questions: QuestionCategories,
    /// Extracted résumé text; the follow-up analyses send it back to the backend.
    #[serde(default)]
    pub raw_resume_text: String,
    /// Employment timeline analysis. Shape is owned by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_analysis: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub potential_inconsistencies: Option<Vec<String>>,
    #[serde(default)]
    pub project_names: Vec<String>,
}

impl AnalysisResult {
    /// Alignment summary wins when a backend sends both shapes.
    pub fn assessment(&self) -> Option<Assessment<'_>> {
        self.alignment_summary
            .as_ref()
            .map(Assessment::Alignment)
            .or_else(|| self.confidence_score.as_ref().map(Assessment::Confidence))
    }

    pub fn has_resume_text(&self) -> bool {
        !self.raw_resume_text.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectAnalysis {
    pub project_name: String,
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub pin_pointed_question: String,
}

/// Result of the deep-dive analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepDiveResult {
    #[serde(default)]
    pub project_analyses: Vec<ProjectAnalysis>,
    #[serde(default)]
    pub potential_inconsistencies: Vec<String>,
}

/// Wire shape of `/project-questions/`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectQuestionsResponse {
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub questions: Vec<QuestionItem>,
}

/// Questions drilled down for one project. Only one set is kept per session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectQuestionSet {
    pub project_name: String,
    pub questions: Vec<QuestionItem>,
}

/// Wire shape of `/regenerate-questions/`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegeneratedQuestions {
    pub categorized_questions: QuestionCategories,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALIGNMENT_FIXTURE: &str = r#"{
        "candidateName": "Jane Doe",
        "alignmentSummary": {
            "summaryText": "Strong backend profile.",
            "strengths": ["PostgreSQL", "FastAPI"],
            "potentialGaps": ["No Kubernetes"]
        },
        "categorizedQuestions": {
            "Skill Match": [
                {
                    "question": "Explain indexing",
                    "difficulty": 3,
                    "expectedAnswer": "B-tree indexes speed up lookups.",
                    "keywords": ["indexing", "B-tree"],
                    "nonTechnicalExplanation": "Like a book index."
                }
            ],
            "Behavioral": [],
            "Project Experience": []
        },
        "rawResumeText": "Jane Doe\nBackend Engineer"
    }"#;

    #[test]
    fn test_alignment_variant_deserializes() {
        let result: AnalysisResult = serde_json::from_str(ALIGNMENT_FIXTURE).unwrap();
        assert_eq!(result.candidate_name, "Jane Doe");
        assert!(result.has_resume_text());
        match result.assessment() {
            Some(Assessment::Alignment(summary)) => {
                assert_eq!(summary.strengths.len(), 2);
                assert_eq!(summary.potential_gaps, vec!["No Kubernetes"]);
            }
            other => panic!("expected alignment summary, got {other:?}"),
        }
        assert!(result.project_names.is_empty());
        assert!(result.date_analysis.is_none());
    }

    #[test]
    fn test_category_order_is_preserved() {
        let result: AnalysisResult = serde_json::from_str(ALIGNMENT_FIXTURE).unwrap();
        let names: Vec<&str> = result
            .categorized_questions
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["Skill Match", "Behavioral", "Project Experience"]);
        assert_eq!(result.categorized_questions.question_count(), 1);
    }

    #[test]
    fn test_confidence_variant_deserializes() {
        let json = r#"{
            "candidateName": "Sam Lee",
            "confidenceScore": {"score": 72, "rationale": "Solid but short tenure"},
            "categorizedQuestions": {},
            "rawResumeText": "Sam Lee",
            "dateAnalysis": {"gaps": [{"from": "2021-01", "to": "2021-09"}]},
            "potentialInconsistencies": ["Overlapping roles in 2020"],
            "projectNames": ["Ledger", "Checkout Service"]
        }"#;
        let result: AnalysisResult = serde_json::from_str(json).unwrap();
        match result.assessment() {
            Some(Assessment::Confidence(score)) => {
                assert!((score.score() - 72.0).abs() < f64::EPSILON);
                assert_eq!(score.rationale(), Some("Solid but short tenure"));
            }
            other => panic!("expected confidence score, got {other:?}"),
        }
        assert_eq!(result.project_names, vec!["Ledger", "Checkout Service"]);
        assert_eq!(
            result.potential_inconsistencies.as_deref(),
            Some(&["Overlapping roles in 2020".to_string()][..])
        );
        assert!(result.date_analysis.is_some());
    }

    #[test]
    fn test_bare_confidence_score() {
        let score: ConfidenceScore = serde_json::from_str("0.85").unwrap();
        assert!((score.score() - 0.85).abs() < f64::EPSILON);
        assert_eq!(score.rationale(), None);
    }

    #[test]
    fn test_minimal_payload_uses_defaults() {
        let result: AnalysisResult = serde_json::from_str(r#"{"candidateName": "X"}"#).unwrap();
        assert!(result.categorized_questions.is_empty());
        assert!(!result.has_resume_text());
        assert!(result.assessment().is_none());
    }

    #[test]
    fn test_categories_serialize_back_to_object() {
        let categories = QuestionCategories(vec![QuestionCategory {
            name: "Backend".to_string(),
            questions: vec![],
        }]);
        let json = serde_json::to_value(&categories).unwrap();
        assert_eq!(json, serde_json::json!({"Backend": []}));
    }

    #[test]
    fn test_categories_reject_non_object() {
        let err = serde_json::from_str::<QuestionCategories>("[]").unwrap_err();
        assert!(err.to_string().contains("category names"));
    }

    #[test]
    fn test_deep_dive_result_deserializes() {
        let json = r#"{
            "projectAnalyses": [
                {
                    "projectName": "Checkout Service",
                    "analysis": "Claims sole ownership of payments flow.",
                    "pinPointedQuestion": "How did you make refunds idempotent?"
                }
            ],
            "potentialInconsistencies": ["Timeline overlap"]
        }"#;
        let result: DeepDiveResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.project_analyses[0].project_name, "Checkout Service");
        assert_eq!(result.potential_inconsistencies.len(), 1);
    }
}
