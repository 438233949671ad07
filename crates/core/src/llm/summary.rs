//! Parser for the labeled free-text summary format:
//!
//! ```text
//! Tag: DD
//! TLDR: ...
//! Ticker: GME
//! Direction: Up
//! Positions: 10x 30c 6/21
//! ```
//!
//! Lines that start with no known label continue the most recent field. Parsing
//! never fails; a field that is absent or blank is `None`.

use crate::domain::synthesis::Ticker;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostTag {
    DueDiligence,
    News,
    Results,
    Info,
    Other(String),
}

impl PostTag {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dd" => PostTag::DueDiligence,
            "news" => PostTag::News,
            "results" => PostTag::Results,
            "info" => PostTag::Info,
            _ => PostTag::Other(raw.trim().to_string()),
        }
    }

    /// Gains/loss brags and advice requests never carry a play.
    pub fn is_discardable(&self) -> bool {
        matches!(self, PostTag::Results | PostTag::Info)
    }
}

impl fmt::Display for PostTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostTag::DueDiligence => f.write_str("DD"),
            PostTag::News => f.write_str("News"),
            PostTag::Results => f.write_str("Results"),
            PostTag::Info => f.write_str("Info"),
            PostTag::Other(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn parse(raw: &str) -> Self {
        if raw.to_ascii_lowercase().contains("up") {
            Direction::Up
        } else {
            Direction::Down
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "Up",
            Direction::Down => "Down",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSummary {
    pub tag: Option<String>,
    pub tldr: Option<String>,
    pub ticker: Option<String>,
    pub direction: Option<String>,
    pub positions: Option<String>,
}

impl ParsedSummary {
    pub fn tag(&self) -> Option<PostTag> {
        self.tag.as_deref().map(PostTag::parse)
    }

    /// Absent ticker text maps to the no-ticker sentinel.
    pub fn ticker(&self) -> Ticker {
        Ticker::parse(self.ticker.as_deref().unwrap_or_default())
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction.as_deref().map(Direction::parse)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Tag,
    Tldr,
    Ticker,
    Direction,
    Positions,
}

const LABELS: &[(&str, Field)] = &[
    ("tag:", Field::Tag),
    ("tldr:", Field::Tldr),
    ("ticker:", Field::Ticker),
    ("direction:", Field::Direction),
    ("positions:", Field::Positions),
];

pub fn parse_summary(text: &str) -> ParsedSummary {
    let mut buffers: [String; 5] = Default::default();
    let mut current: Option<Field> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let lower = line.to_ascii_lowercase();
        let labeled = LABELS
            .iter()
            .find(|(label, _)| lower.starts_with(label))
            .map(|(label, field)| (*field, &line[label.len()..]));

        match (labeled, current) {
            (Some((field, value)), _) => {
                buffers[field as usize] = value.trim().to_string();
                current = Some(field);
            }
            (None, Some(field)) => {
                let buf = &mut buffers[field as usize];
                buf.push(' ');
                buf.push_str(line);
            }
            (None, None) => {}
        }
    }

    let [tag, tldr, ticker, direction, positions] = buffers.map(|s| {
        let s = s.trim().to_string();
        (!s.is_empty()).then_some(s)
    });

    ParsedSummary {
        tag,
        tldr,
        ticker,
        direction,
        positions,
    }
}
