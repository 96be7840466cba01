use crate::domain::analysis::{GapEvent, PriceTargets, Recommendation};

/// What a parser managed to recover from one model response.
///
/// Missing text is an empty string, missing scalars are `None`. Nothing here is
/// guaranteed; `analysis::validate` turns a draft into a `TechnicalAnalysisRecord`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftAnalysis {
    pub summary: DraftSummary,
    pub detailed: DraftDetailed,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftSummary {
    pub current_status: String,
    pub recommendation: Option<Recommendation>,
    pub confidence: Option<u8>,
    pub short_explanation: String,
    pub price_targets: PriceTargets,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftDetailed {
    pub trend_analysis: String,
    pub support_resistance: String,
    pub technical_indicators: String,
    pub patterns: String,
    pub risk_assessment: String,
    pub current_technical_position: String,
    pub gap_analysis: Option<DraftGapAnalysis>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftGapAnalysis {
    pub has_gaps: bool,
    pub gaps: Vec<GapEvent>,
    pub analysis: String,
}

/// The detailed-section text fields, addressable by the section table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailField {
    TrendAnalysis,
    SupportResistance,
    TechnicalIndicators,
    Patterns,
    RiskAssessment,
    CurrentTechnicalPosition,
    GapAnalysis,
}

impl DraftDetailed {
    pub fn set(&mut self, field: DetailField, text: String) {
        match field {
            DetailField::TrendAnalysis => self.trend_analysis = text,
            DetailField::SupportResistance => self.support_resistance = text,
            DetailField::TechnicalIndicators => self.technical_indicators = text,
            DetailField::Patterns => self.patterns = text,
            DetailField::RiskAssessment => self.risk_assessment = text,
            DetailField::CurrentTechnicalPosition => self.current_technical_position = text,
            DetailField::GapAnalysis => {
                self.gap_analysis.get_or_insert_with(Default::default).analysis = text
            }
        }
    }
}

/// Clamp any integer-ish confidence into 0..=100.
pub(crate) fn clamp_confidence(value: f64) -> Option<u8> {
    if !value.is_finite() {
        return None;
    }
    Some(value.round().clamp(0.0, 100.0) as u8)
}
