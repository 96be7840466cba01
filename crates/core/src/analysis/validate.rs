use crate::domain::{
    AnalysisMetadata, AnalysisSummary, DetailedAnalysis, DraftAnalysis, GapAnalysis,
    Recommendation, TechnicalAnalysisRecord,
};

pub const DEFAULT_CONFIDENCE: u8 = 50;
pub const DEFAULT_RECOMMENDATION: Recommendation = Recommendation::Hold;

/// Critical text fields, in reporting order.
pub const CRITICAL_FIELDS: [&str; 8] = [
    "currentStatus",
    "shortExplanation",
    "trendAnalysis",
    "supportResistance",
    "technicalIndicators",
    "patterns",
    "riskAssessment",
    "currentTechnicalPosition",
];

/// Names of critical fields the draft left empty. Run this on the draft, before
/// placeholders hide what was missing.
pub fn missing_critical_fields(draft: &DraftAnalysis) -> Vec<&'static str> {
    let s = &draft.summary;
    let d = &draft.detailed;
    let values = [
        &s.current_status,
        &s.short_explanation,
        &d.trend_analysis,
        &d.support_resistance,
        &d.technical_indicators,
        &d.patterns,
        &d.risk_assessment,
        &d.current_technical_position,
    ];

    CRITICAL_FIELDS
        .iter()
        .zip(values)
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(name, _)| *name)
        .collect()
}

/// Turn a draft into a complete record. Total: every text field ends up non-empty,
/// prices are passed through untouched.
pub fn validate_and_fill(draft: DraftAnalysis, metadata: AnalysisMetadata) -> TechnicalAnalysisRecord {
    let DraftAnalysis { summary, detailed } = draft;

    let gap_analysis = match detailed.gap_analysis {
        Some(gap) => GapAnalysis {
            has_gaps: gap.has_gaps,
            gaps: gap.gaps,
            analysis: or_placeholder(gap.analysis, "No gap analysis available"),
        },
        None => GapAnalysis {
            has_gaps: false,
            gaps: Vec::new(),
            analysis: "No gap analysis available".to_string(),
        },
    };

    TechnicalAnalysisRecord {
        summary: AnalysisSummary {
            current_status: or_placeholder(summary.current_status, "Current status not available"),
            recommendation: summary.recommendation.unwrap_or(DEFAULT_RECOMMENDATION),
            confidence: summary.confidence.unwrap_or(DEFAULT_CONFIDENCE).min(100),
            short_explanation: or_placeholder(
                summary.short_explanation,
                "Short explanation not available",
            ),
            price_targets: summary.price_targets,
        },
        detailed_analysis: DetailedAnalysis {
            trend_analysis: or_placeholder(detailed.trend_analysis, "Trend analysis not available"),
            support_resistance: or_placeholder(
                detailed.support_resistance,
                "Support and resistance analysis not available",
            ),
            technical_indicators: or_placeholder(
                detailed.technical_indicators,
                "Technical indicators analysis not available",
            ),
            patterns: or_placeholder(detailed.patterns, "No patterns identified"),
            risk_assessment: or_placeholder(detailed.risk_assessment, "Risk assessment not available"),
            current_technical_position: or_placeholder(
                detailed.current_technical_position,
                "Current technical position not available",
            ),
            gap_analysis,
        },
        metadata,
    }
}

fn or_placeholder(text: String, placeholder: &str) -> String {
    if text.trim().is_empty() {
        placeholder.to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DateRange, DraftGapAnalysis, PriceTargets};
    use chrono::Utc;

    fn metadata() -> AnalysisMetadata {
        AnalysisMetadata {
            timestamp: Utc::now(),
            model: "test-model".to_string(),
            date_range: DateRange::OneMonth,
        }
    }

    fn text_fields(record: &TechnicalAnalysisRecord) -> Vec<&str> {
        let s = &record.summary;
        let d = &record.detailed_analysis;
        vec![
            s.current_status.as_str(),
            s.short_explanation.as_str(),
            d.trend_analysis.as_str(),
            d.support_resistance.as_str(),
            d.technical_indicators.as_str(),
            d.patterns.as_str(),
            d.risk_assessment.as_str(),
            d.current_technical_position.as_str(),
            d.gap_analysis.analysis.as_str(),
            record.metadata.model.as_str(),
        ]
    }

    #[test]
    fn fills_an_empty_draft() {
        let record = validate_and_fill(DraftAnalysis::default(), metadata());
        assert!(text_fields(&record).iter().all(|t| !t.trim().is_empty()));
        assert_eq!(record.summary.confidence, 50);
        assert_eq!(record.summary.recommendation, Recommendation::Hold);
        assert_eq!(record.summary.price_targets, PriceTargets::default());
        assert_eq!(record.detailed_analysis.patterns, "No patterns identified");
        assert_eq!(record.detailed_analysis.trend_analysis, "Trend analysis not available");
        let gap = &record.detailed_analysis.gap_analysis;
        assert!(!gap.has_gaps);
        assert!(gap.gaps.is_empty());
        assert_eq!(gap.analysis, "No gap analysis available");
    }

    #[test]
    fn keeps_extracted_content() {
        let mut draft = DraftAnalysis::default();
        draft.summary.current_status = "Bullish".to_string();
        draft.summary.recommendation = Some(Recommendation::Sell);
        draft.summary.confidence = Some(12);
        draft.summary.price_targets.stop_loss_price = Some(10.5);
        draft.detailed.gap_analysis = Some(DraftGapAnalysis {
            has_gaps: false,
            gaps: vec![],
            analysis: "   ".to_string(),
        });

        let record = validate_and_fill(draft, metadata());
        assert_eq!(record.summary.current_status, "Bullish");
        assert_eq!(record.summary.recommendation, Recommendation::Sell);
        assert_eq!(record.summary.confidence, 12);
        assert_eq!(record.summary.price_targets.stop_loss_price, Some(10.5));
        assert_eq!(record.summary.price_targets.support_price, None);
        assert_eq!(
            record.detailed_analysis.gap_analysis.analysis,
            "No gap analysis available"
        );
    }

    #[test]
    fn reports_missing_fields_in_fixed_order() {
        assert_eq!(
            missing_critical_fields(&DraftAnalysis::default()),
            CRITICAL_FIELDS.to_vec()
        );

        let mut draft = DraftAnalysis::default();
        draft.summary.current_status = "x".to_string();
        draft.detailed.patterns = "y".to_string();
        draft.detailed.risk_assessment = "  \n".to_string();
        assert_eq!(
            missing_critical_fields(&draft),
            vec![
                "shortExplanation",
                "trendAnalysis",
                "supportResistance",
                "technicalIndicators",
                "riskAssessment",
                "currentTechnicalPosition",
            ]
        );
    }
}
