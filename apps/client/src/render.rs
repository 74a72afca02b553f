//! Terminal report for whatever the session currently holds.
//!
//! Pure formatting: nothing here changes session state or talks to the network.

use colored::{Color, Colorize};
use regex::RegexBuilder;
use tracing::warn;

use crate::api_client::OperationKind;
use crate::errors::SessionError;
use crate::models::{Assessment, QuestionItem};
use crate::session::{RequestState, SessionState};

/// A run of text, either plain or matching one of the keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Plain(&'a str),
    Highlight(&'a str),
}

/// Splits `text` into plain and highlighted runs. Matching is case-insensitive
/// and keywords are taken literally. Concatenating the runs gives back `text`.
pub fn highlight_segments<'a>(text: &'a str, keywords: &[String]) -> Vec<Segment<'a>> {
    let mut terms: Vec<&str> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .collect();
    if terms.is_empty() || text.is_empty() {
        return vec![Segment::Plain(text)];
    }
    // Longest first, so "rust async" wins over "rust".
    terms.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    terms.dedup();

    let pattern = terms
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");
    let re = match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(re) => re,
        Err(e) => {
            warn!("Keyword pattern rejected, rendering without highlights: {e}");
            return vec![Segment::Plain(text)];
        }
    };

    let mut segments = Vec::new();
    let mut last = 0;
    for m in re.find_iter(text) {
        if m.start() > last {
            segments.push(Segment::Plain(&text[last..m.start()]));
        }
        segments.push(Segment::Highlight(m.as_str()));
        last = m.end();
    }
    if last < text.len() {
        segments.push(Segment::Plain(&text[last..]));
    }
    segments
}

fn highlighted(text: &str, keywords: &[String]) -> String {
    highlight_segments(text, keywords)
        .into_iter()
        .map(|segment| match segment {
            Segment::Plain(s) => s.to_string(),
            Segment::Highlight(s) => s.black().on_yellow().bold().to_string(),
        })
        .collect()
}

/// Colour for a difficulty level; out-of-range levels clamp to the nearest end.
pub fn difficulty_color(level: u8) -> Color {
    match level {
        0 | 1 => Color::Green,
        2 => Color::Cyan,
        3 => Color::Yellow,
        4 => Color::TrueColor {
            r: 255,
            g: 140,
            b: 0,
        },
        _ => Color::Red,
    }
}

pub fn difficulty_marker(level: u8) -> String {
    format!("Difficulty: {level}/5")
        .color(difficulty_color(level))
        .bold()
        .to_string()
}

/// User-facing message for a failed slot. Input problems are shown as-is,
/// everything else carries the operation's prefix.
pub fn error_message(kind: OperationKind, err: &SessionError) -> String {
    if matches!(err, SessionError::Validation(_) | SessionError::Precondition(_)) {
        return err.to_string();
    }
    let prefix = match kind {
        OperationKind::InitialAnalysis => "Failed to analyze resume",
        OperationKind::DeepDive => "Failed to run deep dive",
        OperationKind::ProjectDrilldown => "Failed to generate project questions",
        OperationKind::Regeneration => "Failed to regenerate questions",
    };
    format!("{prefix}: {err}")
}

#[derive(Default)]
struct Report {
    lines: Vec<String>,
}

impl Report {
    fn line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    fn blank(&mut self) {
        self.lines.push(String::new());
    }

    fn heading(&mut self, title: &str) {
        self.blank();
        self.line(title.bold().underline().to_string());
    }

    fn finish(self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

fn render_question(report: &mut Report, number: usize, item: &QuestionItem) {
    report.line(format!(
        "{number:>3}. {}  [{}]",
        item.question,
        difficulty_marker(item.difficulty)
    ));
    if !item.expected_answer.is_empty() {
        report.line(format!(
            "     Expected: {}",
            highlighted(&item.expected_answer, &item.keywords)
        ));
    }
    if !item.non_technical_explanation.is_empty() {
        report.line(format!(
            "     In plain terms: {}",
            item.non_technical_explanation.dimmed()
        ));
    }
}

/// Renders the whole session as a multi-line report.
pub fn render_session(state: &SessionState) -> String {
    let mut report = Report::default();
    let input = state.input();

    report.line("Interview Brief".bold().to_string());
    match &input.document {
        Some(doc) => report.line(format!("Résumé: {}", doc.file_name)),
        None => report.line("Résumé: (none selected)"),
    }
    if !input.job_description.trim().is_empty() {
        report.line(format!("Role: {}", input.job_description.trim()));
    }
    report.line(format!("Requested {}", difficulty_marker(input.difficulty.level())));

    if state.request_state(OperationKind::InitialAnalysis).is_in_flight() {
        report.line("Analyzing résumé...".italic().to_string());
    }
    if state.is_regenerating() {
        report.line("Regenerating questions...".italic().to_string());
    }

    if let Some(analysis) = state.analysis() {
        report.heading(&format!("Candidate: {}", analysis.candidate_name));
        match analysis.assessment() {
            Some(Assessment::Alignment(summary)) => {
                report.line(summary.summary_text.clone());
                if !summary.strengths.is_empty() {
                    report.line(format!(
                        "{} {}",
                        "Strengths:".green(),
                        summary.strengths.join(", ")
                    ));
                }
                if !summary.potential_gaps.is_empty() {
                    report.line(format!(
                        "{} {}",
                        "Potential gaps:".yellow(),
                        summary.potential_gaps.join(", ")
                    ));
                }
            }
            Some(Assessment::Confidence(score)) => {
                report.line(format!("Confidence score: {}", score.score()));
                if let Some(rationale) = score.rationale() {
                    report.line(rationale.to_string());
                }
            }
            None => {}
        }

        if let Some(dates) = &analysis.date_analysis {
            report.heading("Timeline");
            report.line(format!("{dates:#}"));
        }
        if let Some(flags) = analysis.potential_inconsistencies.as_ref().filter(|f| !f.is_empty()) {
            report.heading("Potential Inconsistencies");
            for flag in flags {
                report.line(format!("  - {flag}"));
            }
        }

        report.heading(&format!(
            "Interview Questions ({})",
            analysis.categorized_questions.question_count()
        ));
        for category in analysis.categorized_questions.iter() {
            report.line(format!("[{}]", category.name).cyan().to_string());
            for (i, item) in category.questions.iter().enumerate() {
                render_question(&mut report, i + 1, item);
            }
        }

        if !analysis.project_names.is_empty() {
            report.heading("Projects");
            for name in &analysis.project_names {
                report.line(format!("  - {name}"));
            }
        }
    }

    if state.request_state(OperationKind::DeepDive).is_in_flight() {
        report.blank();
        report.line("Running deep dive...".italic().to_string());
    }
    if let Some(deep_dive) = state.deep_dive() {
        report.heading("Deep Dive");
        for project in &deep_dive.project_analyses {
            report.line(project.project_name.bold().to_string());
            if !project.analysis.is_empty() {
                report.line(format!("  {}", project.analysis));
            }
            if !project.pin_pointed_question.is_empty() {
                report.line(format!("  Ask: {}", project.pin_pointed_question));
            }
        }
        if !deep_dive.potential_inconsistencies.is_empty() {
            report.line("Inconsistencies:".yellow().to_string());
            for flag in &deep_dive.potential_inconsistencies {
                report.line(format!("  - {flag}"));
            }
        }
    }

    if let Some(project) = state.drilldown_project() {
        if state.request_state(OperationKind::ProjectDrilldown).is_in_flight() {
            report.blank();
            report.line(format!("Generating questions for {project}...").italic().to_string());
        }
    }
    if let Some(set) = state.project_questions() {
        report.heading(&format!("Project Questions: {}", set.project_name));
        for (i, item) in set.questions.iter().enumerate() {
            render_question(&mut report, i + 1, item);
        }
    }

    let errors: Vec<String> = OperationKind::ALL
        .iter()
        .filter_map(|&kind| match state.request_state(kind) {
            RequestState::Failed(err) => Some(error_message(kind, err)),
            _ => None,
        })
        .collect();
    if !errors.is_empty() {
        report.heading("Errors");
        for message in errors {
            report.line(message.red().to_string());
        }
    }

    report.finish()
}
