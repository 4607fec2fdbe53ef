//! Turning stored feedback into prompt material.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::models::LearningStatus;
use super::repository::FeedbackRepository;
use super::Result;
use crate::prompts::{LearnedContent, Prompt};

const EXEMPLAR_HEADER: &str = "Here are some examples of good queries from previous interactions:\n\n";
const CORRECTION_HEADER: &str = "Learn from these common mistakes:\n\n";

/// Which learned blocks to build, and how many entries each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningOptions {
    #[serde(default = "default_true")]
    pub use_examples: bool,
    #[serde(default = "default_true")]
    pub use_corrections: bool,
    #[serde(default = "default_max_examples")]
    pub max_examples: usize,
    #[serde(default = "default_max_corrections")]
    pub max_corrections: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_examples() -> usize {
    3
}

fn default_max_corrections() -> usize {
    2
}

impl Default for LearningOptions {
    fn default() -> Self {
        Self {
            use_examples: true,
            use_corrections: true,
            max_examples: default_max_examples(),
            max_corrections: default_max_corrections(),
        }
    }
}

/// Reads the feedback store and renders exemplar and correction blocks.
#[derive(Debug, Clone)]
pub struct FeedbackLearning {
    repo: FeedbackRepository,
}

impl FeedbackLearning {
    pub fn new(repo: FeedbackRepository) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &FeedbackRepository {
        &self.repo
    }

    /// Up to `max_n` good past queries, those similar to `question` first.
    ///
    /// Entries repeating an earlier (question, query) pair are skipped and the
    /// list is backfilled from the remaining positive examples.
    pub fn build_exemplars(&self, question: &str, max_n: usize) -> Result<String> {
        if max_n == 0 {
            return Ok(String::new());
        }

        let mut seen = HashSet::new();
        let similar = self.repo.similar(question, max_n)?;
        let fetched = similar.len();
        let mut examples: Vec<_> = similar
            .into_iter()
            .filter(|e| seen.insert((e.question.clone(), e.sql_query.clone())))
            .collect();

        if examples.len() < max_n {
            let backfill = self.repo.positive_examples(max_n + fetched)?;
            examples.extend(
                backfill
                    .into_iter()
                    .filter(|e| seen.insert((e.question.clone(), e.sql_query.clone()))),
            );
            examples.truncate(max_n);
        }

        if examples.is_empty() {
            return Ok(String::new());
        }

        let mut text = String::from(EXEMPLAR_HEADER);
        for (idx, example) in examples.iter().enumerate() {
            text.push_str(&format!(
                "Example {}:\nQuestion: {}\nSQL: {}\n\n",
                idx + 1,
                example.question,
                example.sql_query
            ));
        }
        Ok(text)
    }

    /// The `max_n` most recent corrections as wrong/correct pairs.
    pub fn build_correction_guidance(&self, max_n: usize) -> Result<String> {
        let corrections = self.repo.corrections(max_n)?;
        if corrections.is_empty() {
            return Ok(String::new());
        }

        let mut text = String::from(CORRECTION_HEADER);
        for (idx, correction) in corrections.iter().enumerate() {
            text.push_str(&format!(
                "Mistake {}:\nQuestion: {}\nWrong: {}\nCorrect: {}\n\n",
                idx + 1,
                correction.question,
                correction.original_query,
                correction.corrected_query
            ));
        }
        Ok(text)
    }

    pub fn learned_content(&self, question: &str, options: &LearningOptions) -> Result<LearnedContent> {
        let examples = if options.use_examples {
            self.build_exemplars(question, options.max_examples)?
        } else {
            String::new()
        };
        let corrections = if options.use_corrections {
            self.build_correction_guidance(options.max_corrections)?
        } else {
            String::new()
        };
        debug!(
            examples = !examples.is_empty(),
            corrections = !corrections.is_empty(),
            "Built learned content"
        );
        Ok(LearnedContent {
            examples,
            corrections,
        })
    }

    /// Splice learned content into `prompt`. Unchanged when there is none.
    pub fn enhance(&self, mut prompt: Prompt, question: &str, options: &LearningOptions) -> Result<Prompt> {
        self.learned_content(question, options)?.apply(&mut prompt);
        Ok(prompt)
    }

    pub fn status(&self) -> Result<LearningStatus> {
        let stats = self.repo.stats()?;
        Ok(LearningStatus {
            has_learning_data: self.repo.has_learning_data()?,
            positive_examples: self.repo.count_positive()?,
            corrections: self.repo.count_corrections()?,
            total_feedback: stats.total_feedback,
            average_rating: stats.average_rating,
        })
    }

    /// Where more feedback would help the most.
    pub fn suggest_improvements(&self) -> Result<Vec<String>> {
        Ok(suggestions(&self.status()?))
    }
}

fn suggestions(status: &LearningStatus) -> Vec<String> {
    let mut out = Vec::new();
    if status.positive_examples < 5 {
        out.push(format!(
            "Collect more positive examples (current: {})",
            status.positive_examples
        ));
    }
    if status.corrections == 0 {
        out.push("No corrections recorded. Provide corrected queries for failed attempts.".to_string());
    }
    if status.total_feedback < 10 {
        out.push("Limited feedback data. Rate more queries to improve learning.".to_string());
    }
    if status.average_rating < 3.5 {
        out.push(format!(
            "Low average rating ({:.1}). System needs improvement.",
            status.average_rating
        ));
    }
    if out.is_empty() {
        out.push("Feedback system is working well! Continue providing feedback.".to_string());
    }
    out
}
