use pipeline::FilterRange;
use thiserror::Error;

/// Bounds of the numeric min/max inputs.
pub const CONTROL_MIN: i32 = 1;
pub const CONTROL_MAX: i32 = 25;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("expected two numbers: <min> <max>")]
    Arity,
    #[error("not a number: {0}")]
    NotANumber(String),
}

/// Clamp both inputs into the control bounds. Their order is left alone.
pub fn clamped_range(min: i32, max: i32) -> FilterRange {
    FilterRange::new(
        min.clamp(CONTROL_MIN, CONTROL_MAX),
        max.clamp(CONTROL_MIN, CONTROL_MAX),
    )
}

/// Parse a `min max` line typed at the prompt.
pub fn parse_filter_line(line: &str) -> Result<FilterRange, ControlError> {
    let parts: Vec<&str> = line
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .collect();
    let [min, max] = parts.as_slice() else {
        return Err(ControlError::Arity);
    };
    let parse = |s: &str| {
        s.parse::<i32>()
            .map_err(|_| ControlError::NotANumber(s.to_string()))
    };
    Ok(clamped_range(parse(*min)?, parse(*max)?))
}
