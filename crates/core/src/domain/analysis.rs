use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Validated technical analysis of one chart. Field names are the wire contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalAnalysisRecord {
    pub summary: AnalysisSummary,
    pub detailed_analysis: DetailedAnalysis,
    pub metadata: AnalysisMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub current_status: String,
    pub recommendation: Recommendation,
    pub confidence: u8,
    pub short_explanation: String,
    pub price_targets: PriceTargets,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTargets {
    pub support_price: Option<f64>,
    pub resistance_price: Option<f64>,
    pub stop_loss_price: Option<f64>,
    pub take_profit_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedAnalysis {
    pub trend_analysis: String,
    pub support_resistance: String,
    pub technical_indicators: String,
    pub patterns: String,
    pub risk_assessment: String,
    pub current_technical_position: String,
    pub gap_analysis: GapAnalysis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GapAnalysis {
    pub has_gaps: bool,
    pub gaps: Vec<GapEvent>,
    pub analysis: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GapEvent {
    #[serde(rename = "type")]
    pub kind: GapDirection,
    pub start_price: f64,
    pub end_price: f64,
    pub size: f64,
    pub date: Option<String>,
    pub is_filled: bool,
}

impl GapEvent {
    /// Direction and size are derived from the two price levels.
    pub fn between(start_price: f64, end_price: f64, is_filled: bool) -> Self {
        let start_price = round_cents(start_price);
        let end_price = round_cents(end_price);
        Self {
            kind: GapDirection::from_prices(start_price, end_price),
            start_price,
            end_price,
            size: round_cents((end_price - start_price).abs()),
            date: None,
            is_filled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GapDirection {
    Up,
    Down,
}

impl GapDirection {
    pub fn from_prices(start_price: f64, end_price: f64) -> Self {
        if end_price > start_price {
            GapDirection::Up
        } else {
            GapDirection::Down
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetadata {
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub date_range: DateRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Buy,
    Sell,
    Hold,
}

impl Recommendation {
    pub fn as_str(self) -> &'static str {
        match self {
            Recommendation::Buy => "BUY",
            Recommendation::Sell => "SELL",
            Recommendation::Hold => "HOLD",
        }
    }

    /// Exact upper-case token only; prose like "buy the dip" is not a recommendation.
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        [Recommendation::Buy, Recommendation::Sell, Recommendation::Hold]
            .into_iter()
            .find(|r| r.as_str() == token)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DateRange {
    OneDay,
    FiveDays,
    TenDays,
    #[default]
    OneMonth,
    SixMonths,
    OneYear,
    FiveYears,
    AllTime,
}

impl DateRange {
    pub const ALL: [DateRange; 8] = [
        DateRange::OneDay,
        DateRange::FiveDays,
        DateRange::TenDays,
        DateRange::OneMonth,
        DateRange::SixMonths,
        DateRange::OneYear,
        DateRange::FiveYears,
        DateRange::AllTime,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DateRange::OneDay => "ONE_DAY",
            DateRange::FiveDays => "FIVE_DAYS",
            DateRange::TenDays => "TEN_DAYS",
            DateRange::OneMonth => "ONE_MONTH",
            DateRange::SixMonths => "SIX_MONTHS",
            DateRange::OneYear => "ONE_YEAR",
            DateRange::FiveYears => "FIVE_YEARS",
            DateRange::AllTime => "ALL_TIME",
        }
    }

    /// Phrase used inside prompts ("... over the last month").
    pub fn description(self) -> &'static str {
        match self {
            DateRange::OneDay => "the last trading day",
            DateRange::FiveDays => "the last 5 days",
            DateRange::TenDays => "the last 10 days",
            DateRange::OneMonth => "the last month",
            DateRange::SixMonths => "the last 6 months",
            DateRange::OneYear => "the last year",
            DateRange::FiveYears => "the last 5 years",
            DateRange::AllTime => "all available history",
        }
    }

    /// Range code handed to the chart renderer.
    pub fn range_code(self) -> &'static str {
        match self {
            DateRange::OneDay => "1D",
            DateRange::FiveDays => "5D",
            DateRange::TenDays => "10D",
            DateRange::OneMonth => "1M",
            DateRange::SixMonths => "6M",
            DateRange::OneYear => "12M",
            DateRange::FiveYears => "60M",
            DateRange::AllTime => "ALL",
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown date range: {0}")]
pub struct UnknownDateRange(pub String);

impl FromStr for DateRange {
    type Err = UnknownDateRange;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        DateRange::ALL
            .into_iter()
            .find(|r| {
                r.as_str().eq_ignore_ascii_case(needle) || r.range_code().eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| UnknownDateRange(s.to_string()))
    }
}

pub(crate) fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
