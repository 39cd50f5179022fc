//! Forecast adjustments supplied as free text by a commentary source.
//!
//! The source is asked for one percentage delta per forecast step and replies
//! with prose that should contain a JSON array such as `[-1.2, 0.5, 1.8]`.
//! Anything that does not parse is treated as "no adjustment".

/// Prompt asking for `horizon` per-step percentage deltas given recent prices.
/// Returns `None` when there is nothing to describe.
pub fn build_adjustment_prompt(recent: &[f64], horizon: usize) -> Option<String> {
    let first = *recent.first()?;
    let current = *recent.last()?;
    let average = recent.iter().sum::<f64>() / recent.len() as f64;
    let trend = if first != 0.0 {
        (current - first) / first * 100.0
    } else {
        0.0
    };

    Some(format!(
        "Based on recent price data with current: ${current:.2}, average: ${average:.2}, \
         trend: {trend:.2}%, provide {horizon} percentage adjustments (positive or negative, \
         -5 to +5) for each day forecast as JSON array. Example: [-1.2, 0.5, 1.8]. \
         Only return the array, no explanation."
    ))
}

/// Extracts the first bracketed list of plain numbers from `text`.
pub fn parse_adjustment(text: &str) -> Option<Vec<f64>> {
    let mut rest = text;
    while let Some(open) = rest.find('[') {
        let candidate = &rest[open..];
        let Some(close) = candidate.find(']') else {
            return None;
        };
        let inner = &candidate[1..close];
        let numeric = !inner.trim().is_empty()
            && inner
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_whitespace() || matches!(c, '.' | ',' | '-'));
        if numeric {
            if let Ok(deltas) = serde_json::from_str::<Vec<f64>>(&candidate[..=close]) {
                return Some(deltas);
            }
        }
        rest = &candidate[1..];
    }
    None
}
