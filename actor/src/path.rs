// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Actor path
//!
//! Actors are addressed as `<service>/<name>`. The first segment names the
//! service hosting the actor and decides whether delivery is local or goes
//! through the broker; the last segment is the actor's local name.
//!

use crate::Error;

use std::fmt::{Error as FmtError, Formatter};

/// Path of an actor, made of `/` separated segments.
///
/// Parsing keeps every segment, empty ones included, so a malformed string
/// such as `"rooms//room-1"` stays malformed and is rejected where a
/// well-formed path is required. Only the empty string parses to the empty
/// path.
#[derive(Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct ActorPath(Vec<String>);

impl ActorPath {
    /// Service segment (the first one), or an empty string for an empty path.
    pub fn service(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or("")
    }

    /// Local name of the actor (the last segment).
    pub fn name(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or("")
    }

    /// Number of segments.
    pub fn level(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when the path has at least `service/name` and no segment is
    /// blank.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() > 1 && self.0.iter().all(|segment| !segment.trim().is_empty())
    }

    /// True if the actor lives in `service`.
    pub fn belongs_to(&self, service: &str) -> bool {
        self.service() == service
    }

    /// Splits a remote target into `(service, name)`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPath` unless the path has exactly two non-blank
    /// segments.
    pub fn split(&self) -> Result<(&str, &str), Error> {
        match self.0.as_slice() {
            [service, name] if self.is_well_formed() => {
                Ok((service.as_str(), name.as_str()))
            }
            _ => Err(Error::InvalidPath(self.to_string())),
        }
    }

    /// Broker routing key for this path: `service.name`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPath` unless the path has exactly two non-blank
    /// segments.
    pub fn routing_key(&self) -> Result<String, Error> {
        let (service, name) = self.split()?;
        Ok(format!("{}.{}", service, name))
    }
}

impl From<&str> for ActorPath {
    fn from(str: &str) -> Self {
        if str.is_empty() {
            return ActorPath(Vec::new());
        }
        ActorPath(str.split('/').map(|s| s.to_string()).collect())
    }
}

impl From<String> for ActorPath {
    fn from(string: String) -> Self {
        ActorPath::from(string.as_str())
    }
}

impl From<&String> for ActorPath {
    fn from(string: &String) -> Self {
        ActorPath::from(string.as_str())
    }
}

impl std::ops::Div<&str> for ActorPath {
    type Output = ActorPath;

    fn div(self, rhs: &str) -> Self::Output {
        let mut keys = self.0;
        let mut tokens: Vec<String> = rhs
            .split('/')
            .filter(|x| !x.trim().is_empty())
            .map(|s| s.to_string())
            .collect();

        keys.append(&mut tokens);
        ActorPath(keys)
    }
}

impl std::fmt::Display for ActorPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        write!(f, "{}", self.0.join("/"))
    }
}

impl std::fmt::Debug for ActorPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        write!(f, "{}", self.0.join("/"))
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn parse_empty_string() {
        let path = ActorPath::from("");
        assert!(path.is_empty());
        assert_eq!(path.service(), "");
        assert_eq!(path.name(), "");
    }

    #[test]
    fn parse_service_and_name() {
        let path = ActorPath::from("djroom/room-abc123");
        assert_eq!(path.service(), "djroom");
        assert_eq!(path.name(), "room-abc123");
        assert_eq!(path.level(), 2);
        assert!(path.is_well_formed());
    }

    #[test]
    fn parse_keeps_empty_segments() {
        let path = ActorPath::from("rooms//room-1");
        assert_eq!(path.level(), 3);
        assert_eq!(path.to_string(), "rooms//room-1");
        assert!(!path.is_well_formed());

        for raw in ["djactor/", "/room-1", "/"] {
            let path = ActorPath::from(raw);
            assert_eq!(path.to_string(), raw);
            assert!(!path.is_well_formed());
        }
        assert!(ActorPath::from("rooms/room-1").is_well_formed());
        assert!(!ActorPath::from("room-1").is_well_formed());
    }

    #[test]
    fn test_belongs_to_service() {
        let path = ActorPath::from("rooms/room-1");
        assert!(path.belongs_to("rooms"));
        assert!(!ActorPath::from("other/x").belongs_to("rooms"));
    }

    #[test]
    fn test_add_path() {
        let path = ActorPath::from("chat-actor") / "chat-manager";
        assert_eq!(path.to_string(), "chat-actor/chat-manager");
        assert_eq!(path.name(), "chat-manager");
    }

    #[test]
    fn test_routing_key() {
        let path = ActorPath::from("djactor/dj-room-abc123");
        assert_eq!(path.routing_key().unwrap(), "djactor.dj-room-abc123");
    }

    #[test]
    fn test_routing_key_rejects_malformed_paths() {
        for raw in
            ["djactor", "djactor/room/dj", "", "djactor//dj-1", "djactor/", "/dj-1", " /dj-1"]
        {
            let path = ActorPath::from(raw);
            assert_eq!(
                path.routing_key(),
                Err(Error::InvalidPath(path.to_string()))
            );
        }
    }
}
