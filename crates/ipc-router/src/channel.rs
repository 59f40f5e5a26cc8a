//! Channel names and route descriptors
//!
//! Channels are colon-delimited paths such as `query:pegawai:list`. Each
//! route module declares explicitly which source module and operation a
//! channel belongs to; the conventional derivation from the channel string
//! is available for modules that follow it.

use crate::error::RegistryError;
use regex::Regex;
use std::fmt;

/// Segment separator in channel names
pub const SEPARATOR: char = ':';

lazy_static::lazy_static! {
    static ref SEGMENT_RE: Regex = Regex::new(r"^[A-Za-z0-9_-]+$").unwrap();
}

/// A validated channel name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelName(String);

impl ChannelName {
    pub fn parse(raw: &str) -> Result<Self, RegistryError> {
        let invalid = |reason: &str| RegistryError::InvalidChannel {
            channel: raw.to_string(),
            reason: reason.to_string(),
        };

        if raw.is_empty() {
            return Err(invalid("channel is empty"));
        }

        for segment in raw.split(SEPARATOR) {
            if segment.is_empty() {
                return Err(invalid("empty segment"));
            }
            if !SEGMENT_RE.is_match(segment) {
                return Err(invalid("segments may only contain letters, digits, '_' and '-'"));
            }
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR)
    }

    /// Last segment (the callable leaf)
    pub fn leaf(&self) -> &str {
        self.0.rsplit(SEPARATOR).next().unwrap_or(&self.0)
    }

    /// Everything before the last segment, `None` for single-segment names
    pub fn parent(&self) -> Option<&str> {
        self.0.rsplit_once(SEPARATOR).map(|(parent, _)| parent)
    }

    /// True when `self` is a strict path prefix of `other` (`a:b` of `a:b:c`)
    pub fn is_prefix_of(&self, other: &ChannelName) -> bool {
        other
            .0
            .strip_prefix(self.0.as_str())
            .map(|rest| rest.starts_with(SEPARATOR))
            .unwrap_or(false)
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registration-time declaration supplied by a route module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDescriptor {
    pub channel: ChannelName,
    /// Module the route's schema types belong to (e.g. `routes/query/pegawai`)
    pub source_module: String,
    /// Operation name inside that module (e.g. `list`)
    pub operation: String,
}

impl RouteDescriptor {
    pub fn new(channel: &str, source_module: &str, operation: &str) -> Result<Self, RegistryError> {
        Ok(Self {
            channel: ChannelName::parse(channel)?,
            source_module: source_module.to_string(),
            operation: operation.to_string(),
        })
    }

    /// Conventional derivation: `a:b:c` → module `routes/a/b`, operation `c`.
    /// Single-segment channels live in `routes/index`.
    pub fn from_channel(channel: &str) -> Result<Self, RegistryError> {
        let channel = ChannelName::parse(channel)?;
        let source_module = match channel.parent() {
            Some(parent) => format!("routes/{}", parent.replace(SEPARATOR, "/")),
            None => "routes/index".to_string(),
        };
        let operation = channel.leaf().to_string();
        Ok(Self {
            channel,
            source_module,
            operation,
        })
    }
}
