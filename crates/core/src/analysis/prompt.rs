use crate::analysis::labels::{self, SectionTable};
use crate::domain::DateRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptVariant {
    /// First attempt: JSON schema, label format, gap analysis.
    Detailed,
    /// Escalation: label format only, no gaps, no date range.
    Simple,
}

impl PromptVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            PromptVariant::Detailed => "detailed",
            PromptVariant::Simple => "simple",
        }
    }
}

pub fn build_prompt(variant: PromptVariant, date_range: DateRange) -> String {
    match variant {
        PromptVariant::Detailed => detailed_prompt(date_range),
        PromptVariant::Simple => simple_prompt(),
    }
}

fn detailed_prompt(date_range: DateRange) -> String {
    let schema = [
        "{",
        "  \"summary\": {",
        "    \"currentStatus\": \"string\",",
        "    \"recommendation\": \"BUY\" | \"SELL\" | \"HOLD\",",
        "    \"confidence\": 0-100,",
        "    \"shortExplanation\": \"string\",",
        "    \"priceTargets\": {",
        "      \"supportPrice\": 0.00,",
        "      \"resistancePrice\": 0.00,",
        "      \"stopLossPrice\": 0.00,",
        "      \"takeProfitPrice\": 0.00",
        "    }",
        "  },",
        "  \"detailedAnalysis\": {",
        "    \"trendAnalysis\": \"string\",",
        "    \"supportResistance\": \"string\",",
        "    \"technicalIndicators\": \"string\",",
        "    \"patterns\": \"string\",",
        "    \"riskAssessment\": \"string\",",
        "    \"currentTechnicalPosition\": \"string\",",
        "    \"gapAnalysis\": {",
        "      \"hasGaps\": true,",
        "      \"gaps\": [",
        "        {",
        "          \"type\": \"UP\" | \"DOWN\",",
        "          \"startPrice\": 0.00,",
        "          \"endPrice\": 0.00,",
        "          \"size\": 0.00,",
        "          \"date\": \"YYYY-MM-DD\",",
        "          \"isFilled\": false",
        "        }",
        "      ],",
        "      \"analysis\": \"string\"",
        "    }",
        "  }",
        "}",
    ]
    .join("\n");

    format!(
        "You are a professional technical analyst. Analyze the attached stock chart covering {range}.\n\
The chart shows daily candles with RSI, MACD, Bollinger Bands and a simple moving average.\n\n\
Work step by step:\n\
1. Identify the short-term and long-term trend.\n\
2. Locate the key support and resistance levels.\n\
3. Interpret RSI, MACD and Bollinger Bands.\n\
4. Name any chart patterns.\n\
5. Find every price gap: give its start and end price, whether it went up or down, and whether it has been filled.\n\
6. Assess the risk and set price targets.\n\
7. Decide on a recommendation and how confident you are.\n\n\
Rules:\n\
- Write every price with exactly two decimals (for example 123.45), without currency symbols.\n\
- recommendation must be exactly one of BUY, SELL, HOLD.\n\
- confidence must be an integer from 0 to 100.\n\
- Describe gaps as \"gap from <start price> to <end price>\".\n\n\
Return ONLY a JSON object matching this schema:\n{schema}\n\n\
If you cannot return JSON, answer in this exact labeled format instead, one label per line:\n\n\
{format}",
        range = date_range.description(),
        schema = schema,
        format = label_format(&SectionTable::detailed()),
    )
}

fn simple_prompt() -> String {
    format!(
        "Analyze the attached stock chart and give a short technical analysis.\n\
Write every price with two decimals. Recommendation must be exactly BUY, SELL or HOLD and confidence an integer from 0 to 100.\n\n\
Answer in this exact labeled format, one label per line, and fill in every label:\n\n\
{format}",
        format = label_format(&SectionTable::simple()),
    )
}

/// Summary paragraph, a blank line, then the detailed sections on consecutive lines.
fn label_format(table: &SectionTable) -> String {
    let summary: Vec<String> = labels::SUMMARY_LABELS
        .iter()
        .map(|label| format!("{label} {}", summary_hint(label)))
        .collect();
    let detailed: Vec<String> = table
        .labels()
        .map(|label| format!("{label} <your analysis>"))
        .collect();
    format!("{}\n\n{}", summary.join("\n"), detailed.join("\n"))
}

fn summary_hint(label: &str) -> &'static str {
    match label {
        labels::RECOMMENDATION => "BUY | SELL | HOLD",
        labels::CONFIDENCE => "<0-100>",
        labels::SUPPORT_PRICE
        | labels::RESISTANCE_PRICE
        | labels::STOP_LOSS_PRICE
        | labels::TAKE_PROFIT_PRICE => "<price>",
        labels::SHORT_EXPLANATION => "<two or three sentences>",
        _ => "<one line>",
    }
}
