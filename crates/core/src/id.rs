//! Identifiers for the inventory objects that mutations and audit entries target.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Kind of inventory object.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Device,
    Rack,
    Location,
    Manufacturer,
    Model,
    User,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Device => "device",
            EntityKind::Rack => "rack",
            EntityKind::Location => "location",
            EntityKind::Manufacturer => "manufacturer",
            EntityKind::Model => "model",
            EntityKind::User => "user",
        }
    }
}

impl core::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "device" => Ok(EntityKind::Device),
            "rack" => Ok(EntityKind::Rack),
            "location" => Ok(EntityKind::Location),
            "manufacturer" => Ok(EntityKind::Manufacturer),
            "model" => Ok(EntityKind::Model),
            "user" => Ok(EntityKind::User),
            other => Err(DomainError::invalid_id(format!("EntityKind: unknown kind '{other}'"))),
        }
    }
}

/// Reference to a single inventory object (`device/42`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetRef {
    pub kind: EntityKind,
    pub id: String,
}

impl TargetRef {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }

    pub fn device(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Device, id)
    }
}

impl core::fmt::Display for TargetRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

impl FromStr for TargetRef {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once('/')
            .ok_or_else(|| DomainError::invalid_id(format!("TargetRef: expected 'kind/id', got '{s}'")))?;
        if id.trim().is_empty() {
            return Err(DomainError::invalid_id("TargetRef: empty id"));
        }
        Ok(Self::new(kind.parse()?, id.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_ref_parses_and_displays() {
        let target: TargetRef = "device/sw-core-01".parse().unwrap();
        assert_eq!(target, TargetRef::device("sw-core-01"));
        assert_eq!(target.to_string(), "device/sw-core-01");
    }

    #[test]
    fn target_ref_rejects_unknown_kind_and_empty_id() {
        assert!("toaster/1".parse::<TargetRef>().is_err());
        assert!("rack/".parse::<TargetRef>().is_err());
        assert!("rack".parse::<TargetRef>().is_err());
    }
}
