pub mod analysis;
pub mod input;

pub use analysis::{
    AnalysisResult, Assessment, DeepDiveResult, ProjectQuestionSet, ProjectQuestionsResponse,
    QuestionCategories, QuestionCategory, QuestionItem, RegeneratedQuestions,
};
pub use input::{Difficulty, Document, UploadInput};
