//! Local control-plane resources
//!
//! Each resource composes a [`ResourceIdentifier`] and implements
//! [`SyncableEntity`] so the push path can route and convert it.

use serde::{Deserialize, Serialize};

use super::identity::ResourceIdentifier;
use super::remote::{
    RemoteGroup, RemoteHost, RemoteNetwork, RemoteRecord, RemoteRule, RemoteService,
};
use super::sync::{SyncSubjectType, SyncableEntity};
use crate::errors::{Result, SgSyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransportProtocol {
    Tcp,
    Udp,
}

/// Port range exposed by a service, e.g. `"80"` or `"8000-8100"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePort {
    pub protocol: TransportProtocol,
    pub ports: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleAction {
    #[default]
    Accept,
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficDirection {
    Ingress,
    Egress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub identity: ResourceIdentifier,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ports: Vec<ServicePort>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressGroup {
    pub identity: ResourceIdentifier,
    #[serde(default)]
    pub default_action: RuleAction,
    #[serde(default)]
    pub logs: bool,
    #[serde(default)]
    pub trace: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub identity: ResourceIdentifier,
    pub cidr: String,
}

/// Workload host. `ip_set` is derived from the remote system by the pull
/// path; an empty set marks the host as needing reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub identity: ResourceIdentifier,
    pub uuid: String,
    #[serde(default)]
    pub ip_set: Vec<String>,
    #[serde(default)]
    pub address_group: Option<ResourceIdentifier>,
}

impl Host {
    pub fn has_ip_set(&self) -> bool {
        !self.ip_set.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub identity: ResourceIdentifier,
    pub direction: TrafficDirection,
    pub service: ResourceIdentifier,
    pub local_group: ResourceIdentifier,
    pub remote_group: ResourceIdentifier,
    #[serde(default)]
    pub action: RuleAction,
}

fn require_ref(owner: &ResourceIdentifier, field: &str, value: &ResourceIdentifier) -> Result<()> {
    if value.is_empty() {
        return Err(SgSyncError::Conversion(format!("{owner}: {field} reference is empty")));
    }
    Ok(())
}

impl SyncableEntity for Service {
    fn subject_type(&self) -> SyncSubjectType {
        SyncSubjectType::Services
    }

    fn sync_key(&self) -> String {
        self.identity.key()
    }

    fn to_remote(&self) -> Result<RemoteRecord> {
        Ok(RemoteRecord::Service(RemoteService {
            name: self.identity.key(),
            description: self.description.clone(),
            ports: self.ports.clone(),
        }))
    }
}

impl SyncableEntity for AddressGroup {
    fn subject_type(&self) -> SyncSubjectType {
        SyncSubjectType::Groups
    }

    fn sync_key(&self) -> String {
        self.identity.key()
    }

    fn to_remote(&self) -> Result<RemoteRecord> {
        Ok(RemoteRecord::Group(RemoteGroup {
            name: self.identity.key(),
            default_action: self.default_action,
            logs: self.logs,
            trace: self.trace,
        }))
    }
}

impl SyncableEntity for Network {
    fn subject_type(&self) -> SyncSubjectType {
        SyncSubjectType::Networks
    }

    fn sync_key(&self) -> String {
        self.identity.key()
    }

    fn to_remote(&self) -> Result<RemoteRecord> {
        if self.cidr.trim().is_empty() {
            return Err(SgSyncError::Conversion(format!("{}: network has no CIDR", self.identity)));
        }
        Ok(RemoteRecord::Network(RemoteNetwork {
            name: self.identity.key(),
            cidr: self.cidr.clone(),
        }))
    }
}

impl SyncableEntity for Host {
    fn subject_type(&self) -> SyncSubjectType {
        SyncSubjectType::Hosts
    }

    fn sync_key(&self) -> String {
        self.identity.key()
    }

    fn to_remote(&self) -> Result<RemoteRecord> {
        if self.uuid.trim().is_empty() {
            return Err(SgSyncError::Conversion(format!("{}: host has no uuid", self.identity)));
        }
        Ok(RemoteRecord::Host(RemoteHost {
            uuid: self.uuid.clone(),
            name: self.identity.key(),
            ip_list: self.ip_set.clone(),
            security_group: self.address_group.as_ref().map(ResourceIdentifier::key),
        }))
    }
}

impl SyncableEntity for Rule {
    fn subject_type(&self) -> SyncSubjectType {
        SyncSubjectType::Rules
    }

    fn sync_key(&self) -> String {
        self.identity.key()
    }

    fn to_remote(&self) -> Result<RemoteRecord> {
        require_ref(&self.identity, "service", &self.service)?;
        require_ref(&self.identity, "local_group", &self.local_group)?;
        require_ref(&self.identity, "remote_group", &self.remote_group)?;

        Ok(RemoteRecord::Rule(RemoteRule {
            name: self.identity.key(),
            direction: self.direction,
            service: self.service.key(),
            local_group: self.local_group.key(),
            remote_group: self.remote_group.key(),
            action: self.action,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(uuid: &str) -> Host {
        Host {
            identity: ResourceIdentifier::new("prod", "web-1"),
            uuid: uuid.to_string(),
            ip_set: vec!["10.0.0.1".to_string()],
            address_group: Some(ResourceIdentifier::new("prod", "web")),
        }
    }

    #[test]
    fn host_converts_to_remote_host() {
        let record = host("h-1").to_remote().expect("convertible host");
        match record {
            RemoteRecord::Host(remote) => {
                assert_eq!(remote.uuid, "h-1");
                assert_eq!(remote.name, "prod/web-1");
                assert_eq!(remote.security_group.as_deref(), Some("prod/web"));
            }
            other => panic!("unexpected record: {other:?}"),
        }
    }

    #[test]
    fn host_without_uuid_fails_conversion() {
        assert!(matches!(host("").to_remote(), Err(SgSyncError::Conversion(_))));
    }

    #[test]
    fn rule_with_dangling_reference_fails_conversion() {
        let rule = Rule {
            identity: ResourceIdentifier::new("prod", "allow-web"),
            direction: TrafficDirection::Ingress,
            service: ResourceIdentifier::new("prod", "http"),
            local_group: ResourceIdentifier::new("prod", ""),
            remote_group: ResourceIdentifier::new("prod", "lb"),
            action: RuleAction::Accept,
        };
        let err = rule.to_remote().expect_err("empty local group");
        assert!(err.to_string().contains("local_group"));
    }

    #[test]
    fn subject_types_match_resource_kinds() {
        let group = AddressGroup {
            identity: ResourceIdentifier::new("prod", "web"),
            default_action: RuleAction::Drop,
            logs: true,
            trace: false,
        };
        let network = Network {
            identity: ResourceIdentifier::new("prod", "net"),
            cidr: "10.0.0.0/24".to_string(),
        };

        assert_eq!(group.subject_type(), SyncSubjectType::Groups);
        assert_eq!(network.subject_type(), SyncSubjectType::Networks);
        assert_eq!(host("h-1").subject_type(), SyncSubjectType::Hosts);
        assert_eq!(network.sync_key(), "prod/net");
    }
}
