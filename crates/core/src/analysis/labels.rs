//! Label vocabulary shared by the prompt builder and the text parser.
//!
//! Prompts ask the model to emit these labels verbatim at the start of a line; the
//! heuristic parser anchors on the same strings. Change them here and nowhere else.

use crate::domain::DetailField;

pub const CURRENT_STATUS: &str = "Current Status:";
pub const RECOMMENDATION: &str = "Recommendation:";
pub const CONFIDENCE: &str = "Confidence:";
pub const SUPPORT_PRICE: &str = "Support Price:";
pub const RESISTANCE_PRICE: &str = "Resistance Price:";
pub const STOP_LOSS_PRICE: &str = "Stop Loss Price:";
pub const TAKE_PROFIT_PRICE: &str = "Take Profit Price:";
pub const SHORT_EXPLANATION: &str = "Short Explanation:";

pub const TREND_ANALYSIS: &str = "Trend Analysis:";
pub const SUPPORT_RESISTANCE: &str = "Support and Resistance:";
pub const TECHNICAL_INDICATORS: &str = "Technical Indicators:";
pub const PATTERNS: &str = "Patterns:";
pub const RISK_ASSESSMENT: &str = "Risk Assessment:";
pub const CURRENT_TECHNICAL_POSITION: &str = "Current Technical Position:";
pub const GAP_ANALYSIS: &str = "Gap Analysis:";

/// Summary labels in the order prompts list them. The explanation is last because
/// it runs to the end of its paragraph.
pub const SUMMARY_LABELS: [&str; 8] = [
    CURRENT_STATUS,
    RECOMMENDATION,
    CONFIDENCE,
    SUPPORT_PRICE,
    RESISTANCE_PRICE,
    STOP_LOSS_PRICE,
    TAKE_PROFIT_PRICE,
    SHORT_EXPLANATION,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionSpec {
    pub field: DetailField,
    pub label: &'static str,
}

/// Ordered detailed-section labels. A section's text ends where any later entry's
/// label starts, or at the end of the block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionTable {
    sections: Vec<SectionSpec>,
}

impl SectionTable {
    pub fn new(sections: Vec<SectionSpec>) -> Self {
        Self { sections }
    }

    /// Full table used by the detailed prompt.
    pub fn detailed() -> Self {
        let mut table = Self::simple();
        table.sections.push(SectionSpec {
            field: DetailField::GapAnalysis,
            label: GAP_ANALYSIS,
        });
        table
    }

    /// Same table without the gap subsection.
    pub fn simple() -> Self {
        Self::new(vec![
            SectionSpec {
                field: DetailField::TrendAnalysis,
                label: TREND_ANALYSIS,
            },
            SectionSpec {
                field: DetailField::SupportResistance,
                label: SUPPORT_RESISTANCE,
            },
            SectionSpec {
                field: DetailField::TechnicalIndicators,
                label: TECHNICAL_INDICATORS,
            },
            SectionSpec {
                field: DetailField::Patterns,
                label: PATTERNS,
            },
            SectionSpec {
                field: DetailField::RiskAssessment,
                label: RISK_ASSESSMENT,
            },
            SectionSpec {
                field: DetailField::CurrentTechnicalPosition,
                label: CURRENT_TECHNICAL_POSITION,
            },
        ])
    }

    pub fn sections(&self) -> &[SectionSpec] {
        &self.sections
    }

    pub fn labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.sections.iter().map(|s| s.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detailed_table_extends_simple_with_gap_analysis() {
        let simple: Vec<_> = SectionTable::simple().labels().collect();
        let detailed: Vec<_> = SectionTable::detailed().labels().collect();
        assert_eq!(detailed.len(), simple.len() + 1);
        assert_eq!(&detailed[..simple.len()], simple.as_slice());
        assert_eq!(detailed.last(), Some(&GAP_ANALYSIS));
    }
}
