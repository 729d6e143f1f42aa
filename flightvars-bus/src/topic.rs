use crate::error::BusError;
use core::fmt;
use std::str::FromStr;

/// A concrete topic a message is published under. Wildcards are not
/// allowed here; they belong to [`Pattern`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic(String);

impl Topic {
    pub fn new(topic: impl AsRef<str>) -> Result<Topic, BusError> {
        let raw = topic.as_ref();
        if raw.is_empty() || raw.contains(|c| c == '+' || c == '#') {
            return Err(BusError::InvalidTopic(raw.to_string()));
        }
        Ok(Topic(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn levels(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl FromStr for Topic {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Topic, BusError> {
        Topic::new(s)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(fmt)
    }
}

/// One level of a topic pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Level {
    Normal(String),
    /// Single level wildcard `+`
    SingleWildcard,
    /// Trailing multi-level wildcard `#`
    MultiWildcard,
}

/// A subscription pattern: topic levels where `+` matches any single level
/// and a trailing `#` matches the whole remainder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern(Vec<Level>);

impl Pattern {
    pub fn new(pattern: impl AsRef<str>) -> Result<Pattern, BusError> {
        let raw = pattern.as_ref();
        if raw.is_empty() {
            return Err(BusError::InvalidPattern(raw.to_string()));
        }
        let parts: Vec<&str> = raw.split('/').collect();
        let last = parts.len() - 1;
        let mut levels = Vec::with_capacity(parts.len());
        for (pos, part) in parts.iter().enumerate() {
            let level = match *part {
                "+" => Level::SingleWildcard,
                "#" if pos == last => Level::MultiWildcard,
                s if s.contains(|c| c == '+' || c == '#') => {
                    return Err(BusError::InvalidPattern(raw.to_string()));
                }
                s => Level::Normal(s.to_string()),
            };
            levels.push(level);
        }
        Ok(Pattern(levels))
    }

    pub fn matches(&self, topic: &Topic) -> bool {
        let mut levels = topic.levels();
        for level in &self.0 {
            match level {
                Level::MultiWildcard => return true,
                Level::SingleWildcard => {
                    if levels.next().is_none() {
                        return false;
                    }
                }
                Level::Normal(expected) => match levels.next() {
                    Some(found) if found == expected => {}
                    _ => return false,
                },
            }
        }
        levels.next().is_none()
    }
}

impl FromStr for Pattern {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Pattern, BusError> {
        Pattern::new(s)
    }
}
