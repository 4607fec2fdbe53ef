//! Prompt assembly.
//!
//! Templates render into a [`Prompt`], a sequence of text and named insertion
//! points. Learned feedback is added by filling a slot rather than by editing
//! the rendered text, so it lands in exactly one place.

pub mod templates;

use serde::{Deserialize, Serialize};
use tracing::warn;

use templates::BEFORE_QUESTION_MARKER;

/// Named places in a prompt where extra context can be inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsertionPoint {
    /// Immediately before the final `Question: ...` line.
    BeforeQuestion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Text(String),
    Slot(InsertionPoint, String),
}

/// A rendered template with open insertion points.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prompt {
    parts: Vec<Part>,
}

impl Prompt {
    /// A prompt with no insertion points.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![Part::Text(text.into())],
        }
    }

    /// Render `template`, substituting `{name}` placeholders from `vars`.
    ///
    /// The template is split on insertion markers before substitution, so
    /// variable values can never open a slot.
    pub fn from_template(template: &str, vars: &[(&str, &str)]) -> Self {
        let mut parts = Vec::new();
        let mut segments = template.split(BEFORE_QUESTION_MARKER).peekable();
        while let Some(segment) = segments.next() {
            parts.push(Part::Text(substitute(segment, vars)));
            if segments.peek().is_some() {
                parts.push(Part::Slot(InsertionPoint::BeforeQuestion, String::new()));
            }
        }
        Self { parts }
    }

    pub fn has_point(&self, point: InsertionPoint) -> bool {
        self.parts
            .iter()
            .any(|p| matches!(p, Part::Slot(slot, _) if *slot == point))
    }

    /// Append `text` at `point`. Returns false, leaving the prompt unchanged,
    /// when the prompt has no such point.
    pub fn insert(&mut self, point: InsertionPoint, text: &str) -> bool {
        let slot = self.parts.iter_mut().find_map(|p| match p {
            Part::Slot(slot, content) if *slot == point => Some(content),
            _ => None,
        });
        match slot {
            Some(content) => {
                content.push_str(text);
                true
            }
            None => {
                warn!("Prompt has no {:?} insertion point, skipping insert", point);
                false
            }
        }
    }

    pub fn render(&self) -> String {
        self.parts
            .iter()
            .map(|p| match p {
                Part::Text(t) | Part::Slot(_, t) => t.as_str(),
            })
            .collect()
    }
}

impl std::fmt::Display for Prompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

/// Single-pass `{name}` substitution. Unknown placeholders are left as-is.
fn substitute(segment: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut rest = segment;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| (*v, close))
        });
        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// How a question is put to the model.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PromptMode {
    #[default]
    Plain,
    FewShot,
    ChainOfThought,
    /// Repair a failed query.
    ErrorCorrection { previous_query: String, error: String },
}

impl PromptMode {
    /// Resolve CLI flags. Chain-of-thought wins when both are set.
    pub fn from_flags(few_shot: bool, chain_of_thought: bool) -> Self {
        match (few_shot, chain_of_thought) {
            (_, true) => PromptMode::ChainOfThought,
            (true, false) => PromptMode::FewShot,
            (false, false) => PromptMode::Plain,
        }
    }

    pub fn is_generation(&self) -> bool {
        !matches!(self, PromptMode::ErrorCorrection { .. })
    }
}

/// Where learned feedback goes in a generation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackStyle {
    /// Insert learned blocks into the mode's own template.
    #[default]
    Splice,
    /// Switch to the feedback-enhanced template.
    Template,
}

/// Learned prompt blocks. Either may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LearnedContent {
    pub examples: String,
    pub corrections: String,
}

/// Lead-in placed after learned blocks when splicing.
pub const SPLICE_LEAD_IN: &str = "Now generate SQL for this question:\n\n";

impl LearnedContent {
    pub fn is_empty(&self) -> bool {
        self.examples.is_empty() && self.corrections.is_empty()
    }

    /// Non-empty blocks joined by a newline, followed by the lead-in.
    pub fn splice_text(&self) -> String {
        let blocks: Vec<&str> = [self.examples.as_str(), self.corrections.as_str()]
            .into_iter()
            .filter(|b| !b.is_empty())
            .collect();
        format!("{}{}", blocks.join("\n"), SPLICE_LEAD_IN)
    }

    /// Splice into `prompt` at [`InsertionPoint::BeforeQuestion`]. No-op when empty.
    pub fn apply(&self, prompt: &mut Prompt) {
        if self.is_empty() {
            return;
        }
        prompt.insert(InsertionPoint::BeforeQuestion, &self.splice_text());
    }
}

/// Builds every prompt the system sends.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptAssembler {
    style: FeedbackStyle,
}

impl PromptAssembler {
    pub fn new(style: FeedbackStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> FeedbackStyle {
        self.style
    }

    /// Prompt for `mode`. Learned content only affects generation modes.
    pub fn build(
        &self,
        mode: &PromptMode,
        schema: &str,
        question: &str,
        learned: Option<&LearnedContent>,
    ) -> Prompt {
        let learned = learned.filter(|l| !l.is_empty() && mode.is_generation());
        if let (Some(content), FeedbackStyle::Template) = (learned, self.style) {
            return Prompt::from_template(
                templates::FEEDBACK_ENHANCED,
                &[
                    ("schema", schema),
                    ("question", question),
                    ("feedback_examples", content.examples.as_str()),
                    ("feedback_corrections", content.corrections.as_str()),
                ],
            );
        }

        let mut prompt = match mode {
            PromptMode::Plain => Prompt::from_template(
                templates::SQL_GENERATION,
                &[("schema", schema), ("question", question)],
            ),
            PromptMode::FewShot => Prompt::from_template(
                templates::FEW_SHOT,
                &[("schema", schema), ("question", question)],
            ),
            PromptMode::ChainOfThought => Prompt::from_template(
                templates::CHAIN_OF_THOUGHT,
                &[("schema", schema), ("question", question)],
            ),
            PromptMode::ErrorCorrection {
                previous_query,
                error,
            } => Prompt::from_template(
                templates::ERROR_CORRECTION,
                &[
                    ("sql_query", previous_query.as_str()),
                    ("error", error.as_str()),
                    ("schema", schema),
                    ("question", question),
                ],
            ),
        };

        if let Some(content) = learned {
            content.apply(&mut prompt);
        }
        prompt
    }

    pub fn summarization(&self, question: &str, query: &str, results: &str) -> Prompt {
        Prompt::from_template(
            templates::SUMMARIZATION,
            &[("question", question), ("sql_query", query), ("results", results)],
        )
    }

    pub fn clarification(&self, question: &str, schema: &str) -> Prompt {
        Prompt::from_template(
            templates::CLARIFICATION,
            &[("question", question), ("schema", schema)],
        )
    }

    pub fn ambiguity_check(&self, question: &str, schema: &str) -> Prompt {
        Prompt::from_template(
            templates::AMBIGUITY_CHECK,
            &[("question", question), ("schema", schema)],
        )
    }

    pub fn model_comparison(&self, question: &str, schema: &str) -> Prompt {
        Prompt::from_template(
            templates::MODEL_COMPARISON,
            &[("question", question), ("schema", schema)],
        )
    }
}
