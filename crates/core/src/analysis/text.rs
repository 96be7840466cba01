use crate::analysis::labels::{self, SectionTable};
use crate::analysis::price::parse_price;
use crate::domain::draft::clamp_confidence;
use crate::domain::{DraftAnalysis, DraftDetailed, DraftGapAnalysis, DraftSummary, GapEvent, PriceTargets, Recommendation};
use regex::Regex;

const NUMBER: &str = r"[$€£]?\s?\d[\d,]*(?:\.\d+)?";

// Words that flip a following "filled" ("has not been filled", "yet to be filled").
const NEGATORS: [&str; 3] = ["not", "never", "yet"];
const NEGATION_WINDOW: usize = 3;

/// Line-anchored label, tolerating list bullets, numbering and `**bold**`.
fn label_pattern(label: &str) -> String {
    format!(
        r"(?m)^[ \t]*(?:[-*>#]+[ \t]*|\d+[.)][ \t]*)?\*{{0,2}}{}\*{{0,2}}[ \t]*",
        regex::escape(label)
    )
}

struct SummaryPatterns {
    anchor: Regex,
    labels: Vec<Regex>,
    current_status: Regex,
    recommendation: Regex,
    confidence: Regex,
    support_price: Regex,
    resistance_price: Regex,
    stop_loss_price: Regex,
    take_profit_price: Regex,
    short_explanation: Regex,
}

impl SummaryPatterns {
    fn compile() -> Result<Self, regex::Error> {
        let line = |label: &str| Regex::new(&format!("{}(.*)$", label_pattern(label)));
        Ok(Self {
            anchor: Regex::new(&label_pattern(labels::CURRENT_STATUS))?,
            labels: labels::SUMMARY_LABELS
                .iter()
                .map(|l| Regex::new(&label_pattern(l)))
                .collect::<Result<_, _>>()?,
            current_status: line(labels::CURRENT_STATUS)?,
            recommendation: Regex::new(&format!(
                r"{}\*{{0,2}}(BUY|SELL|HOLD)\b",
                label_pattern(labels::RECOMMENDATION)
            ))?,
            confidence: Regex::new(&format!(
                r"{}\*{{0,2}}(\d+)",
                label_pattern(labels::CONFIDENCE)
            ))?,
            support_price: line(labels::SUPPORT_PRICE)?,
            resistance_price: line(labels::RESISTANCE_PRICE)?,
            stop_loss_price: line(labels::STOP_LOSS_PRICE)?,
            take_profit_price: line(labels::TAKE_PROFIT_PRICE)?,
            short_explanation: Regex::new(&format!(
                r"{}([\s\S]*?)(?:\n[ \t]*\n|\z)",
                label_pattern(labels::SHORT_EXPLANATION)
            ))?,
        })
    }
}

/// Fallback parser for responses that are not JSON. Never fails; an unrecognized
/// response yields an empty draft.
pub struct TextParser {
    table: SectionTable,
    sections: Vec<Regex>,
    summary: SummaryPatterns,
    blank_line: Regex,
    number: Regex,
    gap_phrase: Regex,
    filled: Regex,
}

impl TextParser {
    pub fn new(table: SectionTable) -> Result<Self, regex::Error> {
        let sections = table
            .labels()
            .map(|l| Regex::new(&label_pattern(l)))
            .collect::<Result<_, _>>()?;

        Ok(Self {
            table,
            sections,
            summary: SummaryPatterns::compile()?,
            blank_line: Regex::new(r"\n[ \t]*\n")?,
            number: Regex::new(NUMBER)?,
            gap_phrase: Regex::new(&format!(
                r"(?i)\b(?:gap|break|jump)s?\s+(?:of|at|from|to|between)\s+({NUMBER})\s+(?:to|and)\s+({NUMBER})"
            ))?,
            filled: Regex::new(r"(?i)\b(un)?filled\b")?,
        })
    }

    pub fn parse_text_analysis(&self, raw: &str) -> DraftAnalysis {
        let text = raw.replace("\r\n", "\n");
        let blocks: Vec<&str> = self
            .blank_line
            .split(&text)
            .filter(|b| !b.trim().is_empty())
            .collect();

        let detailed_anchor = self.sections.first();

        let summary = self
            .region(&blocks, &self.summary.anchor, &self.summary.labels, detailed_anchor)
            .map(|block| self.parse_summary(&block))
            .unwrap_or_default();

        let detailed = match detailed_anchor {
            Some(anchor) => self
                .region(&blocks, anchor, &self.sections, Some(&self.summary.anchor))
                .map(|block| self.parse_detailed(&block))
                .unwrap_or_default(),
            None => DraftDetailed::default(),
        };

        DraftAnalysis { summary, detailed }
    }

    /// The first block matching `anchor`, extended over following blocks that open
    /// with one of `continuation` labels and do not belong to the other section.
    fn region(
        &self,
        blocks: &[&str],
        anchor: &Regex,
        continuation: &[Regex],
        other: Option<&Regex>,
    ) -> Option<String> {
        let start = blocks.iter().position(|b| anchor.is_match(b))?;
        let mut end = start + 1;
        while end < blocks.len() {
            let block = blocks[end];
            let first_line = block.trim_start_matches('\n').lines().next().unwrap_or("");
            let opens_with_label = continuation.iter().any(|p| p.is_match(first_line));
            let foreign = other.is_some_and(|o| o.is_match(block));
            if !opens_with_label || foreign {
                break;
            }
            end += 1;
        }
        Some(blocks[start..end].join("\n\n"))
    }

    fn parse_summary(&self, block: &str) -> DraftSummary {
        let p = &self.summary;
        DraftSummary {
            current_status: capture(&p.current_status, block).unwrap_or_default(),
            recommendation: capture(&p.recommendation, block)
                .and_then(|t| Recommendation::from_token(&t)),
            confidence: capture(&p.confidence, block)
                .and_then(|d| d.parse::<f64>().ok())
                .and_then(clamp_confidence),
            short_explanation: capture(&p.short_explanation, block)
                .map(|s| self.cut_at_section_label(&s))
                .unwrap_or_default(),
            price_targets: PriceTargets {
                support_price: self.price(&p.support_price, block),
                resistance_price: self.price(&p.resistance_price, block),
                stop_loss_price: self.price(&p.stop_loss_price, block),
                take_profit_price: self.price(&p.take_profit_price, block),
            },
        }
    }

    fn price(&self, pattern: &Regex, block: &str) -> Option<f64> {
        let line = capture(pattern, block)?;
        let number = self.number.find(&line)?;
        parse_price(number.as_str())
    }

    /// When summary and detailed text share a block, the explanation stops at the
    /// first detailed label.
    fn cut_at_section_label(&self, text: &str) -> String {
        let cut = self
            .sections
            .iter()
            .filter_map(|p| p.find(text).map(|m| m.start()))
            .min()
            .unwrap_or(text.len());
        text[..cut].trim().to_string()
    }

    fn parse_detailed(&self, block: &str) -> DraftDetailed {
        let hits: Vec<Option<regex::Match<'_>>> =
            self.sections.iter().map(|p| p.find(block)).collect();

        let mut detailed = DraftDetailed::default();
        for (idx, spec) in self.table.sections().iter().enumerate() {
            let Some(hit) = hits[idx] else {
                continue;
            };
            let start = hit.end();
            let end = hits[idx + 1..]
                .iter()
                .flatten()
                .map(|m| m.start())
                .filter(|&s| s >= start)
                .min()
                .unwrap_or(block.len());
            detailed.set(spec.field, block[start..end].trim().to_string());
        }

        if let Some(gap) = detailed.gap_analysis.as_mut() {
            self.mine_gaps(gap);
        }
        detailed
    }

    fn mine_gaps(&self, gap: &mut DraftGapAnalysis) {
        let is_filled = self.mentions_filled(&gap.analysis);
        gap.gaps = self
            .gap_phrase
            .captures_iter(&gap.analysis)
            .filter_map(|c| {
                let start = parse_price(c.get(1)?.as_str())?;
                let end = parse_price(c.get(2)?.as_str())?;
                Some(GapEvent::between(start, end, is_filled))
            })
            .collect();
        gap.has_gaps = !gap.gaps.is_empty();
    }

    /// One flag for the whole subsection: any un-negated "filled" counts.
    fn mentions_filled(&self, text: &str) -> bool {
        self.filled.captures_iter(text).any(|c| {
            if c.get(1).is_some() {
                return false;
            }
            let Some(word) = c.get(0) else {
                return false;
            };
            let before = text[..word.start()].to_lowercase();
            let negated = before
                .split_whitespace()
                .rev()
                .take(NEGATION_WINDOW)
                .map(|w| w.trim_matches(|ch: char| !ch.is_alphanumeric() && ch != '\''))
                .any(|w| NEGATORS.contains(&w) || w.ends_with("n't"));
            !negated
        })
    }
}

fn capture(pattern: &Regex, text: &str) -> Option<String> {
    let value = pattern.captures(text)?.get(1)?.as_str().trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GapDirection;

    fn parser() -> TextParser {
        TextParser::new(SectionTable::detailed()).unwrap()
    }

    const CANONICAL: &str = "Current Status: Consolidating below resistance\n\
Recommendation: HOLD\n\
Confidence: 61\n\
Support Price: $182.40\n\
Resistance Price: 195.00 (March high)\n\
Stop Loss Price: 179.90\n\
Take Profit Price: n/a\n\
Short Explanation: Momentum is fading.\n\
Wait for a breakout.\n\
\n\
Trend Analysis: Uptrend since March,\n\
flattening this month.\n\
Support and Resistance: Support 182.40, resistance 195.00.\n\
Technical Indicators: RSI 55, MACD flat.\n\
Patterns: Rectangle.\n\
Risk Assessment: Moderate.\n\
Current Technical Position: Mid-range.\n\
Gap Analysis: A gap of 100.00 to 110.50 which has not been filled.\n";

    #[test]
    fn recovers_all_labelled_fields_in_canonical_order() {
        let draft = parser().parse_text_analysis(CANONICAL);
        let s = &draft.summary;
        assert_eq!(s.current_status, "Consolidating below resistance");
        assert_eq!(s.recommendation, Some(Recommendation::Hold));
        assert_eq!(s.confidence, Some(61));
        assert_eq!(s.short_explanation, "Momentum is fading.\nWait for a breakout.");
        assert_eq!(s.price_targets.support_price, Some(182.40));
        assert_eq!(s.price_targets.resistance_price, Some(195.00));
        assert_eq!(s.price_targets.stop_loss_price, Some(179.90));
        assert_eq!(s.price_targets.take_profit_price, None);

        let d = &draft.detailed;
        assert_eq!(d.trend_analysis, "Uptrend since March,\nflattening this month.");
        assert_eq!(d.support_resistance, "Support 182.40, resistance 195.00.");
        assert_eq!(d.technical_indicators, "RSI 55, MACD flat.");
        assert_eq!(d.patterns, "Rectangle.");
        assert_eq!(d.risk_assessment, "Moderate.");
        assert_eq!(d.current_technical_position, "Mid-range.");
        let gap = d.gap_analysis.as_ref().unwrap();
        assert_eq!(gap.analysis, "A gap of 100.00 to 110.50 which has not been filled.");
    }

    #[test]
    fn mines_unfilled_up_gap() {
        let draft = parser().parse_text_analysis(CANONICAL);
        let gap = draft.detailed.gap_analysis.unwrap();
        assert!(gap.has_gaps);
        assert_eq!(
            gap.gaps,
            vec![GapEvent {
                kind: GapDirection::Up,
                start_price: 100.00,
                end_price: 110.50,
                size: 10.50,
                date: None,
                is_filled: false,
            }]
        );
    }

    #[test]
    fn filled_flag_applies_to_every_gap_in_the_subsection() {
        let text = "Trend Analysis: Down.\n\
Gap Analysis: A break from 52.25 to 50.00 last week and a jump between 47.10 and 49.90. The first gap was filled on Friday.";
        let gap = parser().parse_text_analysis(text).detailed.gap_analysis.unwrap();
        assert_eq!(gap.gaps.len(), 2);
        assert_eq!(gap.gaps[0].kind, GapDirection::Down);
        assert_eq!(gap.gaps[0].size, 2.25);
        assert_eq!(gap.gaps[1].kind, GapDirection::Up);
        assert_eq!(gap.gaps[1].size, 2.8);
        assert!(gap.gaps.iter().all(|g| g.is_filled));
    }

    #[test]
    fn negated_or_unfilled_mentions_do_not_count() {
        let p = parser();
        assert!(!p.mentions_filled("The gap has not been filled."));
        assert!(!p.mentions_filled("It remains unfilled."));
        assert!(!p.mentions_filled("It hasn't filled yet."));
        assert!(!p.mentions_filled("Yet to be filled."));
        assert!(p.mentions_filled("The gap was FILLED quickly."));
        assert!(p.mentions_filled("Not much volume, but the gap was partially filled."));
    }

    #[test]
    fn simple_variant_without_gap_section() {
        let text = "Current Status: Weak\nRecommendation: SELL\nConfidence: 70\nShort Explanation: Breakdown.\n\n\
Trend Analysis: Down.\nSupport and Resistance: 40.00 / 45.00\nTechnical Indicators: RSI 30\n\
Patterns: Head and shoulders\nRisk Assessment: High\nCurrent Technical Position: Oversold";
        let draft = TextParser::new(SectionTable::simple()).unwrap().parse_text_analysis(text);
        assert_eq!(draft.summary.recommendation, Some(Recommendation::Sell));
        assert_eq!(draft.detailed.risk_assessment, "High");
        assert_eq!(draft.detailed.current_technical_position, "Oversold");
        assert!(draft.detailed.gap_analysis.is_none());
    }

    #[test]
    fn risk_assessment_ends_at_whichever_later_label_comes_first() {
        let text = "Trend Analysis: Up\nRisk Assessment: Low\nGap Analysis: none\nCurrent Technical Position: Strong";
        let d = parser().parse_text_analysis(text).detailed;
        assert_eq!(d.risk_assessment, "Low");
        // Current Technical Position precedes Gap Analysis in the table, so a gap
        // section written first runs until the end of the block.
        assert_eq!(d.current_technical_position, "Strong");
        assert_eq!(
            d.gap_analysis.unwrap().analysis,
            "none\nCurrent Technical Position: Strong"
        );
    }

    #[test]
    fn tolerates_markdown_and_blank_lines_between_sections() {
        let text = "**Current Status:** Breaking out\n**Recommendation:** **BUY**\n- Confidence: 80%\n\n\
1. **Trend Analysis:** Strong uptrend.\n\n\
2. **Support and Resistance:** 10.00 and 12.00.\n\n\
Disclaimer: not financial advice.";
        let draft = parser().parse_text_analysis(text);
        assert_eq!(draft.summary.current_status, "Breaking out");
        assert_eq!(draft.summary.recommendation, Some(Recommendation::Buy));
        assert_eq!(draft.summary.confidence, Some(80));
        assert_eq!(draft.detailed.trend_analysis, "Strong uptrend.");
        assert_eq!(draft.detailed.support_resistance, "10.00 and 12.00.");
        assert_eq!(draft.detailed.patterns, "");
    }

    #[test]
    fn recommendation_must_be_a_literal_token() {
        let draft = parser()
            .parse_text_analysis("Current Status: ok\nRecommendation: buy on dips\nConfidence: high");
        assert_eq!(draft.summary.recommendation, None);
        assert_eq!(draft.summary.confidence, None);
        assert_eq!(draft.summary.current_status, "ok");
    }

    #[test]
    fn explanation_stops_at_detailed_label_in_same_block() {
        let text = "Current Status: Flat\nShort Explanation: Nothing happening.\nTrend Analysis: Sideways.";
        let draft = parser().parse_text_analysis(text);
        assert_eq!(draft.summary.short_explanation, "Nothing happening.");
        assert_eq!(draft.detailed.trend_analysis, "Sideways.");
    }

    #[test]
    fn unrecognized_text_yields_empty_draft() {
        let draft = parser().parse_text_analysis("I cannot analyze this image.");
        assert_eq!(draft, DraftAnalysis::default());
        assert_eq!(parser().parse_text_analysis(""), DraftAnalysis::default());
    }
}
