use crate::analysis::price::extract_price;
use crate::domain::analysis::round_cents;
use crate::domain::draft::clamp_confidence;
use crate::domain::{
    DraftAnalysis, DraftDetailed, DraftGapAnalysis, DraftSummary, GapDirection, GapEvent,
    PriceTargets, Recommendation,
};
use serde_json::{Map, Value};

/// Body of the first fenced code block (```json ... ``` or ``` ... ```), if any.
pub fn extract_fenced(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let mut rest = &text[open + 3..];
    if rest.get(..4).is_some_and(|tag| tag.eq_ignore_ascii_case("json")) {
        rest = &rest[4..];
    }
    let body = match rest.find("```") {
        Some(close) => &rest[..close],
        None => rest,
    };
    Some(body.trim())
}

/// Read the response as a JSON record. `None` means "not structured", not an error.
pub fn try_structured_parse(text: &str) -> Option<DraftAnalysis> {
    let payload = extract_fenced(text).unwrap_or_else(|| text.trim());
    let value: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(err) => {
            tracing::debug!(error = %err, "response is not JSON; falling back");
            return None;
        }
    };

    let root = value.as_object()?;
    let summary = root.get("summary").and_then(Value::as_object);
    let detailed = root.get("detailedAnalysis").and_then(Value::as_object);
    if summary.is_none() && detailed.is_none() {
        tracing::debug!("JSON response has neither summary nor detailedAnalysis");
        return None;
    }

    Some(DraftAnalysis {
        summary: summary.map(summary_from).unwrap_or_default(),
        detailed: detailed.map(detailed_from).unwrap_or_default(),
    })
}

fn summary_from(obj: &Map<String, Value>) -> DraftSummary {
    let targets = obj.get("priceTargets").and_then(Value::as_object);
    let price = |key: &str| targets.and_then(|t| t.get(key)).and_then(extract_price);

    DraftSummary {
        current_status: text_field(obj, "currentStatus"),
        recommendation: obj
            .get("recommendation")
            .and_then(Value::as_str)
            .and_then(|s| Recommendation::from_token(&s.to_ascii_uppercase())),
        confidence: obj.get("confidence").and_then(confidence_from),
        short_explanation: text_field(obj, "shortExplanation"),
        price_targets: PriceTargets {
            support_price: price("supportPrice"),
            resistance_price: price("resistancePrice"),
            stop_loss_price: price("stopLossPrice"),
            take_profit_price: price("takeProfitPrice"),
        },
    }
}

fn detailed_from(obj: &Map<String, Value>) -> DraftDetailed {
    DraftDetailed {
        trend_analysis: text_field(obj, "trendAnalysis"),
        support_resistance: text_field(obj, "supportResistance"),
        technical_indicators: text_field(obj, "technicalIndicators"),
        patterns: text_field(obj, "patterns"),
        risk_assessment: text_field(obj, "riskAssessment"),
        current_technical_position: text_field(obj, "currentTechnicalPosition"),
        gap_analysis: obj
            .get("gapAnalysis")
            .and_then(Value::as_object)
            .map(gap_analysis_from),
    }
}

fn gap_analysis_from(obj: &Map<String, Value>) -> DraftGapAnalysis {
    let gaps = obj
        .get("gaps")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(gap_from).collect())
        .unwrap_or_default();

    DraftGapAnalysis {
        has_gaps: obj.get("hasGaps").and_then(Value::as_bool).unwrap_or(false),
        gaps,
        analysis: text_field(obj, "analysis"),
    }
}

fn gap_from(value: &Value) -> Option<GapEvent> {
    let obj = value.as_object()?;
    let start_price = round_cents(obj.get("startPrice").and_then(extract_price)?);
    let end_price = round_cents(obj.get("endPrice").and_then(extract_price)?);

    let kind = match obj.get("type").and_then(Value::as_str).map(str::trim) {
        Some(t) if t.eq_ignore_ascii_case("UP") => GapDirection::Up,
        Some(t) if t.eq_ignore_ascii_case("DOWN") => GapDirection::Down,
        _ => GapDirection::from_prices(start_price, end_price),
    };

    Some(GapEvent {
        kind,
        start_price,
        end_price,
        size: round_cents((end_price - start_price).abs()),
        date: obj
            .get("date")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string),
        is_filled: obj.get("isFilled").and_then(Value::as_bool).unwrap_or(false),
    })
}

fn confidence_from(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    clamp_confidence(raw)
}

/// Strings are trimmed, lists of strings are joined one per line, anything else is empty.
fn text_field(obj: &Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_response() -> Value {
        json!({
            "summary": {
                "currentStatus": "Trading near the upper Bollinger Band",
                "recommendation": "BUY",
                "confidence": 78,
                "shortExplanation": "Momentum is strong and MACD just crossed up.",
                "priceTargets": {
                    "supportPrice": 182.40,
                    "resistancePrice": "$195.00",
                    "stopLossPrice": "179.90",
                    "takeProfitPrice": "$1,201.25"
                }
            },
            "detailedAnalysis": {
                "trendAnalysis": "Higher highs and higher lows since March.",
                "supportResistance": "Support at 182.40, resistance at 195.00.",
                "technicalIndicators": "RSI 64, MACD positive.",
                "patterns": "Ascending triangle.",
                "riskAssessment": "Moderate; earnings next week.",
                "currentTechnicalPosition": "Testing resistance.",
                "gapAnalysis": {
                    "hasGaps": true,
                    "gaps": [
                        {"type": "UP", "startPrice": 170.00, "endPrice": 174.50, "size": 4.50, "date": "2026-03-02", "isFilled": true},
                        {"type": "DOWN", "startPrice": "188.10", "endPrice": "185.00", "isFilled": false}
                    ],
                    "analysis": "Two gaps; the March gap is filled."
                }
            }
        })
    }

    #[test]
    fn recovers_every_field_of_a_complete_response() {
        let draft = try_structured_parse(&full_response().to_string()).unwrap();

        assert_eq!(draft.summary.current_status, "Trading near the upper Bollinger Band");
        assert_eq!(draft.summary.recommendation, Some(Recommendation::Buy));
        assert_eq!(draft.summary.confidence, Some(78));
        assert_eq!(
            draft.summary.short_explanation,
            "Momentum is strong and MACD just crossed up."
        );
        assert_eq!(
            draft.summary.price_targets,
            PriceTargets {
                support_price: Some(182.40),
                resistance_price: Some(195.00),
                stop_loss_price: Some(179.90),
                take_profit_price: Some(1201.25),
            }
        );

        let d = &draft.detailed;
        assert_eq!(d.trend_analysis, "Higher highs and higher lows since March.");
        assert_eq!(d.support_resistance, "Support at 182.40, resistance at 195.00.");
        assert_eq!(d.technical_indicators, "RSI 64, MACD positive.");
        assert_eq!(d.patterns, "Ascending triangle.");
        assert_eq!(d.risk_assessment, "Moderate; earnings next week.");
        assert_eq!(d.current_technical_position, "Testing resistance.");

        let gaps = d.gap_analysis.as_ref().unwrap();
        assert!(gaps.has_gaps);
        assert_eq!(gaps.analysis, "Two gaps; the March gap is filled.");
        assert_eq!(
            gaps.gaps,
            vec![
                GapEvent {
                    kind: GapDirection::Up,
                    start_price: 170.0,
                    end_price: 174.5,
                    size: 4.5,
                    date: Some("2026-03-02".to_string()),
                    is_filled: true,
                },
                GapEvent {
                    kind: GapDirection::Down,
                    start_price: 188.1,
                    end_price: 185.0,
                    size: 3.1,
                    date: None,
                    is_filled: false,
                },
            ]
        );
    }

    #[test]
    fn fenced_and_unfenced_parse_identically() {
        let body = full_response().to_string();
        let plain = try_structured_parse(&body).unwrap();

        let tagged = format!("Here is the analysis:\n```json\n{body}\n```\nThanks.");
        assert_eq!(try_structured_parse(&tagged).unwrap(), plain);

        let untagged = format!("```\n{body}\n```");
        assert_eq!(try_structured_parse(&untagged).unwrap(), plain);
    }

    #[test]
    fn extract_fenced_handles_tags_and_missing_close() {
        assert_eq!(extract_fenced("```json\n{\"a\":1}\n```"), Some("{\"a\":1}"));
        assert_eq!(extract_fenced("```JSON {\"a\":1}```"), Some("{\"a\":1}"));
        assert_eq!(extract_fenced("x ```\n{\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(extract_fenced("{\"a\":1}"), None);
    }

    #[test]
    fn rejects_non_json_and_unrelated_json() {
        assert!(try_structured_parse("Current Status: bullish").is_none());
        assert!(try_structured_parse("{\"summary\": ").is_none());
        assert!(try_structured_parse("{\"answer\": 42}").is_none());
        assert!(try_structured_parse("[1, 2, 3]").is_none());
    }

    #[test]
    fn coerces_loose_scalars() {
        let raw = json!({
            "summary": {
                "recommendation": "hold",
                "confidence": "65%",
                "currentStatus": ["Range bound", "low volume"],
                "priceTargets": {"supportPrice": "abc"}
            }
        })
        .to_string();
        let draft = try_structured_parse(&raw).unwrap();
        assert_eq!(draft.summary.recommendation, Some(Recommendation::Hold));
        assert_eq!(draft.summary.confidence, Some(65));
        assert_eq!(draft.summary.current_status, "Range bound\nlow volume");
        assert_eq!(draft.summary.price_targets.support_price, None);
        assert_eq!(draft.detailed, DraftDetailed::default());
    }

    #[test]
    fn gap_defaults_and_inference() {
        let raw = json!({
            "detailedAnalysis": {
                "trendAnalysis": {"nested": "not text"},
                "gapAnalysis": {
                    "gaps": [
                        {"startPrice": 50.0, "endPrice": 48.0},
                        {"startPrice": 50.0}
                    ]
                }
            }
        })
        .to_string();
        let draft = try_structured_parse(&raw).unwrap();
        assert_eq!(draft.detailed.trend_analysis, "");
        let gaps = draft.detailed.gap_analysis.unwrap();
        assert!(!gaps.has_gaps);
        assert_eq!(gaps.gaps.len(), 1);
        assert_eq!(gaps.gaps[0].kind, GapDirection::Down);
        assert_eq!(gaps.gaps[0].size, 2.0);
        assert!(!gaps.gaps[0].is_filled);
    }
}
