use std::fmt;
use std::str::FromStr;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::GpioError;

/// Header pin -> kernel line for revision 2/3 boards.
pub const DEFAULT_PIN_MAP: &[(u32, u32)] = &[
    (3, 0),
    (5, 1),
    (7, 4),
    (8, 14),
    (10, 15),
    (11, 17),
    (12, 18),
    (13, 21),
    (15, 22),
    (16, 23),
    (18, 24),
    (19, 10),
    (21, 9),
    (22, 25),
    (23, 11),
    (24, 8),
    (26, 7),
];

/// Replacements for older or modified boards. Pins 30-33 only exist there.
pub const LEGACY_PIN_OVERRIDES: &[(u32, u32)] = &[
    (3, 2),
    (5, 3),
    (13, 27),
    (30, 28),
    (31, 29),
    (32, 30),
    (33, 31),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinTable {
    lines: FxHashMap<u32, u32>,
}

impl Default for PinTable {
    fn default() -> Self {
        Self::from_entries(DEFAULT_PIN_MAP)
    }
}

impl PinTable {
    pub fn from_entries(entries: &[(u32, u32)]) -> Self {
        Self {
            lines: entries.iter().copied().collect(),
        }
    }

    pub fn resolve(&self, pin: u32) -> Result<u32, GpioError> {
        self.lines
            .get(&pin)
            .copied()
            .ok_or_else(|| GpioError::InvalidPin(pin.to_string()))
    }

    /// Merges `overrides` key by key; pins it doesn't name keep their line.
    pub fn apply_override(&mut self, overrides: &[(u32, u32)]) {
        for &(pin, line) in overrides {
            self.lines.insert(pin, line);
        }
    }

    pub fn pins(&self) -> Vec<u32> {
        let mut pins: Vec<u32> = self.lines.keys().copied().collect();
        pins.sort_unstable();
        pins
    }

    pub fn entries(&self) -> Vec<(u32, u32)> {
        self.pins()
            .into_iter()
            .map(|pin| (pin, self.lines[&pin]))
            .collect()
    }
}

/// Parses a header pin given as text, e.g. from a request path.
pub fn parse_pin(text: &str) -> Result<u32, GpioError> {
    text.trim()
        .parse::<u32>()
        .map_err(|_| GpioError::InvalidPin(text.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    #[default]
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }

    /// Lenient form for caller input: anything not recognizably an input
    /// token falls back to `Out`.
    pub fn normalize(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "in" | "input" => Direction::In,
            _ => Direction::Out,
        }
    }

    /// Strict form for contents read back from the kernel.
    pub fn parse_strict(token: &str) -> Result<Self, GpioError> {
        match token.trim().to_ascii_lowercase().as_str() {
            "in" | "input" => Ok(Direction::In),
            "out" | "output" => Ok(Direction::Out),
            other => Err(GpioError::InvalidDirection(other.to_string())),
        }
    }
}

impl From<&str> for Direction {
    fn from(token: &str) -> Self {
        Direction::normalize(token)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pull {
    #[default]
    None,
    PullUp,
    PullDown,
}

impl Pull {
    /// Token passed to the export helper.
    pub fn as_str(&self) -> &'static str {
        match self {
            Pull::None => "",
            Pull::PullUp => "pullup",
            Pull::PullDown => "pulldown",
        }
    }

    pub fn normalize(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "pullup" => Pull::PullUp,
            "pulldown" => Pull::PullDown,
            _ => Pull::None,
        }
    }
}

/// Settings applied when a pin is opened.
///
/// * `direction` - `"in"`/`"input"` or `"out"`/`"output"`, defaults to `out`.
/// * `pull` - `"pullup"`, `"pulldown"` or none, defaults to none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PinOptions {
    #[serde(deserialize_with = "lenient_direction")]
    pub direction: Direction,
    #[serde(deserialize_with = "lenient_pull")]
    pub pull: Pull,
}

impl PinOptions {
    pub fn new(direction: Direction, pull: Pull) -> Self {
        Self { direction, pull }
    }

    pub fn input(pull: Pull) -> Self {
        Self::new(Direction::In, pull)
    }

    pub fn output() -> Self {
        Self::new(Direction::Out, Pull::None)
    }
}

impl From<Direction> for PinOptions {
    fn from(direction: Direction) -> Self {
        Self::new(direction, Pull::None)
    }
}

/// Legacy `"<direction> <pull>"` form, e.g. `"in pullup"`.
impl FromStr for PinOptions {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = s.split_whitespace();
        let direction = Direction::normalize(tokens.next().unwrap_or(""));
        let pull = Pull::normalize(tokens.next().unwrap_or(""));
        Ok(Self { direction, pull })
    }
}

impl From<&str> for PinOptions {
    fn from(s: &str) -> Self {
        let Ok(options) = s.parse::<PinOptions>();
        options
    }
}

fn lenient_direction<'de, D>(deserializer: D) -> Result<Direction, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let token = Option::<String>::deserialize(deserializer)?;
    Ok(token.as_deref().map(Direction::normalize).unwrap_or_default())
}

fn lenient_pull<'de, D>(deserializer: D) -> Result<Pull, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let token = Option::<String>::deserialize(deserializer)?;
    Ok(token.as_deref().map(Pull::normalize).unwrap_or_default())
}

/// Contents of a value file: the leading base-10 integer, if there was one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Reading(Option<i64>);

impl Reading {
    pub fn parse(raw: &str) -> Self {
        let text = raw.trim_start();
        let (sign, digits) = match text.strip_prefix('-') {
            Some(rest) => (-1, rest),
            None => (1, text.strip_prefix('+').unwrap_or(text)),
        };
        let end = digits
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(digits.len());

        let digits = &digits[..end];
        if digits.is_empty() {
            return Reading(None);
        }

        // Only overflow can fail here; saturate so huge values still read high.
        Reading(Some(sign * digits.parse::<i64>().unwrap_or(i64::MAX)))
    }

    pub fn value(&self) -> Option<i64> {
        self.0
    }

    /// `None` when the file didn't hold a number.
    pub fn is_high(&self) -> Option<bool> {
        self.0.map(|v| v != 0)
    }
}
