pub mod labels;
pub mod pipeline;
pub mod price;
pub mod prompt;
pub mod structured;
pub mod text;
pub mod validate;

pub use pipeline::{AnalysisOutcome, AttemptReport, ChartAnalyzer, ESCALATION_THRESHOLD};
pub use prompt::{build_prompt, PromptVariant};

use crate::domain::DraftAnalysis;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserKind {
    Structured,
    Heuristic,
    /// No strategy produced a draft; the empty draft was used.
    Empty,
}

/// One way of reading a raw model response.
pub trait ResponseParser: Send + Sync {
    fn kind(&self) -> ParserKind;

    fn parse(&self, raw: &str) -> Option<DraftAnalysis>;
}

pub struct StructuredParser;

impl ResponseParser for StructuredParser {
    fn kind(&self) -> ParserKind {
        ParserKind::Structured
    }

    fn parse(&self, raw: &str) -> Option<DraftAnalysis> {
        structured::try_structured_parse(raw)
    }
}

impl ResponseParser for text::TextParser {
    fn kind(&self) -> ParserKind {
        ParserKind::Heuristic
    }

    fn parse(&self, raw: &str) -> Option<DraftAnalysis> {
        Some(self.parse_text_analysis(raw))
    }
}

/// Strategies tried in order; the first `Some` wins.
pub struct ParserChain {
    strategies: Vec<Box<dyn ResponseParser>>,
}

impl ParserChain {
    pub fn new(strategies: Vec<Box<dyn ResponseParser>>) -> Self {
        Self { strategies }
    }

    /// Structured JSON first, then label-anchored text over the full section table.
    pub fn standard() -> Result<Self, regex::Error> {
        Ok(Self::new(vec![
            Box::new(StructuredParser),
            Box::new(text::TextParser::new(labels::SectionTable::detailed())?),
        ]))
    }

    pub fn parse(&self, raw: &str) -> (ParserKind, DraftAnalysis) {
        self.strategies
            .iter()
            .find_map(|s| s.parse(raw).map(|draft| (s.kind(), draft)))
            .unwrap_or_else(|| (ParserKind::Empty, DraftAnalysis::default()))
    }
}
