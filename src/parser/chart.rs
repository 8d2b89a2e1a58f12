use serde::Serialize;

use super::blocks::{classify_lines, Block};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub strategy: String,
    pub pass_rate: f64,
    pub tokens: u64,
}

/// Points from the first `| Strategy | Pass Rate | … | Avg Tokens |` table.
pub fn extract_chart(text: &str) -> Option<Vec<ChartPoint>> {
    let blocks = classify_lines(text);

    let (start, header) = blocks.iter().enumerate().find_map(|(i, b)| match b {
        Block::TableRow(cells) if column(cells, "strategy").is_some() && column(cells, "pass rate").is_some() => {
            Some((i, cells))
        }
        _ => None,
    })?;

    let strategy_col = column(header, "strategy")?;
    let rate_col = column(header, "pass rate")?;
    let tokens_col = column(header, "avg tokens");

    let points = blocks[start + 1..]
        .iter()
        .take_while(|b| matches!(b, Block::TableRow(_) | Block::TableRule))
        .filter_map(|b| match b {
            Block::TableRow(cells) => parse_row(cells, strategy_col, rate_col, tokens_col),
            _ => None,
        })
        .collect();

    Some(points)
}

fn column(cells: &[String], name: &str) -> Option<usize> {
    cells
        .iter()
        .position(|c| c.replace("**", "").trim().eq_ignore_ascii_case(name))
}

fn parse_row(
    cells: &[String],
    strategy_col: usize,
    rate_col: usize,
    tokens_col: Option<usize>,
) -> Option<ChartPoint> {
    let strategy = cells.get(strategy_col)?.replace("**", "").trim().to_string();
    if strategy.is_empty() {
        return None;
    }
    let pass_rate = cells
        .get(rate_col)?
        .replace(['*', '%'], "")
        .trim()
        .parse::<f64>()
        .ok()?;
    let tokens = tokens_col
        .and_then(|c| cells.get(c))
        .and_then(|t| t.replace([',', '*', '~'], "").trim().parse::<u64>().ok())
        .unwrap_or(0);

    Some(ChartPoint {
        strategy,
        pass_rate,
        tokens,
    })
}
