//! Remote wire model
//!
//! Records are what the remote system stores; a [`SyncRequest`] always carries
//! a batch, even for a single entity.

use serde::{Deserialize, Serialize};

use super::resources::{RuleAction, ServicePort, TrafficDirection};
use super::sync::{SyncOperation, SyncSubjectType};
use crate::errors::{Result, SgSyncError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteService {
    pub name: String,
    pub description: String,
    pub ports: Vec<ServicePort>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteGroup {
    pub name: String,
    pub default_action: RuleAction,
    pub logs: bool,
    pub trace: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNetwork {
    pub name: String,
    pub cidr: String,
}

/// Host as known by the remote system. `ip_list` is the source of truth for
/// the local host's IP set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteHost {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub ip_list: Vec<String>,
    #[serde(default)]
    pub security_group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRule {
    pub name: String,
    pub direction: TrafficDirection,
    pub service: String,
    pub local_group: String,
    pub remote_group: String,
    pub action: RuleAction,
}

/// One remote record of any subject kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RemoteRecord {
    Group(RemoteGroup),
    Network(RemoteNetwork),
    Host(RemoteHost),
    Rule(RemoteRule),
    Service(RemoteService),
}

impl RemoteRecord {
    pub fn subject_type(&self) -> SyncSubjectType {
        match self {
            Self::Group(_) => SyncSubjectType::Groups,
            Self::Network(_) => SyncSubjectType::Networks,
            Self::Host(_) => SyncSubjectType::Hosts,
            Self::Rule(_) => SyncSubjectType::Rules,
            Self::Service(_) => SyncSubjectType::Services,
        }
    }
}

/// Homogeneous batch of records for one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "subject", content = "items", rename_all = "lowercase")]
pub enum SyncPayload {
    Groups(Vec<RemoteGroup>),
    Networks(Vec<RemoteNetwork>),
    Hosts(Vec<RemoteHost>),
    Rules(Vec<RemoteRule>),
    Services(Vec<RemoteService>),
}

impl SyncPayload {
    /// Build the batch for `subject` from converted records.
    ///
    /// # Errors
    /// Returns `SgSyncError::Conversion` if any record belongs to another
    /// subject.
    pub fn from_records(subject: SyncSubjectType, records: Vec<RemoteRecord>) -> Result<Self> {
        fn take<T>(
            subject: SyncSubjectType,
            records: Vec<RemoteRecord>,
            pick: impl Fn(RemoteRecord) -> std::result::Result<T, RemoteRecord>,
        ) -> Result<Vec<T>> {
            records
                .into_iter()
                .map(|record| {
                    pick(record).map_err(|other| {
                        SgSyncError::Conversion(format!(
                            "unexpected {} record in {subject} payload",
                            other.subject_type()
                        ))
                    })
                })
                .collect()
        }

        Ok(match subject {
            SyncSubjectType::Groups => Self::Groups(take(subject, records, |r| match r {
                RemoteRecord::Group(g) => Ok(g),
                other => Err(other),
            })?),
            SyncSubjectType::Networks => Self::Networks(take(subject, records, |r| match r {
                RemoteRecord::Network(n) => Ok(n),
                other => Err(other),
            })?),
            SyncSubjectType::Hosts => Self::Hosts(take(subject, records, |r| match r {
                RemoteRecord::Host(h) => Ok(h),
                other => Err(other),
            })?),
            SyncSubjectType::Rules => Self::Rules(take(subject, records, |r| match r {
                RemoteRecord::Rule(rule) => Ok(rule),
                other => Err(other),
            })?),
            SyncSubjectType::Services => Self::Services(take(subject, records, |r| match r {
                RemoteRecord::Service(s) => Ok(s),
                other => Err(other),
            })?),
        })
    }

    pub fn subject_type(&self) -> SyncSubjectType {
        match self {
            Self::Groups(_) => SyncSubjectType::Groups,
            Self::Networks(_) => SyncSubjectType::Networks,
            Self::Hosts(_) => SyncSubjectType::Hosts,
            Self::Rules(_) => SyncSubjectType::Rules,
            Self::Services(_) => SyncSubjectType::Services,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Groups(items) => items.len(),
            Self::Networks(items) => items.len(),
            Self::Hosts(items) => items.len(),
            Self::Rules(items) => items.len(),
            Self::Services(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Envelope sent to the remote system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub operation: SyncOperation,
    pub subject_type: SyncSubjectType,
    pub payload: SyncPayload,
}

impl SyncRequest {
    /// # Errors
    /// Returns `SgSyncError::Conversion` when the payload kind does not match
    /// `subject_type`.
    pub fn new(
        operation: SyncOperation,
        subject_type: SyncSubjectType,
        payload: SyncPayload,
    ) -> Result<Self> {
        if payload.subject_type() != subject_type {
            return Err(SgSyncError::Conversion(format!(
                "payload for {} cannot be sent as {subject_type}",
                payload.subject_type()
            )));
        }
        Ok(Self { operation, subject_type, payload })
    }
}
