//! Typed views over raw provider records
//!
//! Each model reads only the fields it shows. Timestamps are normalized into
//! the display zone handed in by the caller.

use super::record::{short_field, short_name, str_field, u64_field, PLACEHOLDER};
use crate::timezone::{DisplayInstant, DisplayZone};
use serde::Serialize;
use serde_json::Value;

fn owned(item: &Value, key: &str) -> String {
    str_field(item, key)
        .filter(|s| !s.is_empty())
        .unwrap_or(PLACEHOLDER)
        .to_string()
}

fn instant(item: &Value, keys: &[&str], zone: DisplayZone) -> Option<DisplayInstant> {
    keys.iter()
        .find_map(|key| str_field(item, key))
        .and_then(|raw| zone.parse_instant(raw))
}

fn array<'a>(item: &'a Value, key: &str) -> &'a [Value] {
    item.get(key)
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn strings(item: &Value, key: &str) -> Vec<String> {
    array(item, key)
        .iter()
        .filter_map(|v| v.as_str())
        .map(str::to_string)
        .collect()
}

fn joined_or_placeholder(values: &[String]) -> String {
    if values.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        values.join(", ")
    }
}

fn external_ip(nic: &Value) -> Option<String> {
    array(nic, "accessConfigs")
        .iter()
        .find_map(|ac| str_field(ac, "natIP"))
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

// =========================================================================
// Compute
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceSummary {
    pub name: String,
    pub id: String,
    pub state: String,
    pub machine_type: String,
    pub zone: String,
    pub internal_ip: String,
    pub external_ip: String,
    pub launched: Option<DisplayInstant>,
}

impl InstanceSummary {
    pub fn from_record(item: &Value, zone: DisplayZone) -> Self {
        let first_nic = array(item, "networkInterfaces").first();
        Self {
            name: owned(item, "name"),
            id: owned(item, "id"),
            state: owned(item, "status"),
            machine_type: short_field(item, "machineType"),
            zone: short_field(item, "zone"),
            internal_ip: first_nic
                .map(|nic| owned(nic, "networkIP"))
                .unwrap_or_else(|| PLACEHOLDER.to_string()),
            external_ip: first_nic
                .and_then(external_ip)
                .unwrap_or_else(|| PLACEHOLDER.to_string()),
            launched: instant(item, &["lastStartTimestamp", "creationTimestamp"], zone),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceDetail {
    pub cpu_platform: String,
    pub created: Option<DisplayInstant>,
    pub deletion_protection: bool,
    pub service_accounts: Vec<String>,
    pub network_tags: Vec<String>,
    pub labels: Vec<Label>,
    pub description: String,
}

impl InstanceDetail {
    pub fn from_record(item: &Value, zone: DisplayZone) -> Self {
        Self {
            cpu_platform: owned(item, "cpuPlatform"),
            created: instant(item, &["creationTimestamp"], zone),
            deletion_protection: item
                .get("deletionProtection")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            service_accounts: service_accounts(item),
            network_tags: network_tags(item),
            labels: Label::list_from(item.get("labels")),
            description: owned(item, "description"),
        }
    }

    pub fn service_accounts_display(&self) -> String {
        joined_or_placeholder(&self.service_accounts)
    }

    pub fn network_tags_display(&self) -> String {
        joined_or_placeholder(&self.network_tags)
    }

    pub fn labels_display(&self) -> String {
        if self.labels.is_empty() {
            return PLACEHOLDER.to_string();
        }
        self.labels
            .iter()
            .map(|l| format!("{}={}", l.key, l.value))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkInterface {
    pub name: String,
    pub network: String,
    pub subnetwork: String,
    pub internal_ip: String,
    pub external_ip: String,
    pub stack_type: String,
}

impl NetworkInterface {
    pub fn list_from(instance: &Value) -> Vec<Self> {
        array(instance, "networkInterfaces")
            .iter()
            .map(|nic| Self {
                name: owned(nic, "name"),
                network: short_field(nic, "network"),
                subnetwork: short_field(nic, "subnetwork"),
                internal_ip: owned(nic, "networkIP"),
                external_ip: external_ip(nic).unwrap_or_else(|| PLACEHOLDER.to_string()),
                stack_type: owned(nic, "stackType"),
            })
            .collect()
    }

    /// Full network URLs, deduplicated, in interface order
    pub fn network_urls(instance: &Value) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();
        for nic in array(instance, "networkInterfaces") {
            if let Some(url) = str_field(nic, "network") {
                if !urls.iter().any(|u| u == url) {
                    urls.push(url.to_string());
                }
            }
        }
        urls
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Volume {
    pub name: String,
    pub size_gb: String,
    pub disk_type: String,
    pub status: String,
    pub device: String,
    pub boot: bool,
    pub auto_delete: bool,
    pub mode: String,
    pub created: Option<DisplayInstant>,
}

impl Volume {
    /// Disk source URLs attached to an instance
    pub fn source_urls(instance: &Value) -> Vec<String> {
        array(instance, "attachedDisks")
            .iter()
            .filter_map(|d| str_field(d, "source"))
            .map(str::to_string)
            .collect()
    }

    /// Join fetched disk records with the instance's attachment metadata
    pub fn list_from(instance: &Value, disks: &Value, zone: DisplayZone) -> Vec<Self> {
        let attachments = array(instance, "attachedDisks");
        array(disks, "items")
            .iter()
            .map(|disk| {
                let self_link = str_field(disk, "selfLink").unwrap_or_default();
                let name = str_field(disk, "name").unwrap_or_default();
                let attachment = attachments.iter().find(|a| {
                    str_field(a, "source").is_some_and(|src| {
                        src == self_link || (!name.is_empty() && short_name(src) == name)
                    })
                });
                let flag = |key: &str| {
                    attachment
                        .and_then(|a| a.get(key))
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false)
                };
                Self {
                    name: owned(disk, "name"),
                    size_gb: u64_field(disk, "sizeGb")
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| PLACEHOLDER.to_string()),
                    disk_type: short_field(disk, "type"),
                    status: owned(disk, "status"),
                    device: attachment
                        .map(|a| owned(a, "deviceName"))
                        .unwrap_or_else(|| PLACEHOLDER.to_string()),
                    boot: flag("boot"),
                    auto_delete: flag("autoDelete"),
                    mode: attachment
                        .map(|a| owned(a, "mode"))
                        .unwrap_or_else(|| PLACEHOLDER.to_string()),
                    created: instant(disk, &["creationTimestamp"], zone),
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FirewallRule {
    pub rule: String,
    pub network: String,
    pub priority: String,
    pub action: String,
    pub protocol: String,
    pub port_range: String,
    pub peer: String,
    pub description: String,
}

/// Firewall rules split by traffic direction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FirewallRules {
    pub ingress: Vec<FirewallRule>,
    pub egress: Vec<FirewallRule>,
}

impl FirewallRules {
    /// Enabled rules from a firewall listing that target the given instance
    pub fn for_instance(response: &Value, instance: &Value) -> Self {
        let tags = network_tags(instance);
        let accounts = service_accounts(instance);
        let mut rules = Self::default();
        for firewall in array(response, "items") {
            if firewall.get("disabled").and_then(|v| v.as_bool()).unwrap_or(false) {
                continue;
            }
            if !targets(firewall, &tags, &accounts) {
                continue;
            }
            let egress = str_field(firewall, "direction") == Some("EGRESS");
            let peer = if egress {
                joined_or_placeholder(&strings(firewall, "destinationRanges"))
            } else {
                let mut sources = strings(firewall, "sourceRanges");
                sources.extend(strings(firewall, "sourceTags").into_iter().map(|t| format!("tag:{}", t)));
                joined_or_placeholder(&sources)
            };

            let (action, entries) = if firewall.get("denied").is_some() {
                ("DENY", array(firewall, "denied"))
            } else {
                ("ALLOW", array(firewall, "allowed"))
            };

            for entry in entries {
                let row = FirewallRule {
                    rule: owned(firewall, "name"),
                    network: short_field(firewall, "network"),
                    priority: u64_field(firewall, "priority")
                        .map(|p| p.to_string())
                        .unwrap_or_else(|| PLACEHOLDER.to_string()),
                    action: action.to_string(),
                    protocol: owned(entry, "IPProtocol"),
                    port_range: {
                        let ports = strings(entry, "ports");
                        if ports.is_empty() {
                            "all".to_string()
                        } else {
                            ports.join(",")
                        }
                    },
                    peer: peer.clone(),
                    description: owned(firewall, "description"),
                };
                if egress {
                    rules.egress.push(row);
                } else {
                    rules.ingress.push(row);
                }
            }
        }
        rules
    }

    pub fn is_empty(&self) -> bool {
        self.ingress.is_empty() && self.egress.is_empty()
    }
}

fn network_tags(instance: &Value) -> Vec<String> {
    instance.get("tags").map(|t| strings(t, "items")).unwrap_or_default()
}

fn service_accounts(instance: &Value) -> Vec<String> {
    array(instance, "serviceAccounts")
        .iter()
        .filter_map(|sa| str_field(sa, "email"))
        .map(str::to_string)
        .collect()
}

/// A rule without targets applies to every instance on its network
fn targets(firewall: &Value, tags: &[String], accounts: &[String]) -> bool {
    let target_tags = strings(firewall, "targetTags");
    let target_accounts = strings(firewall, "targetServiceAccounts");
    if target_tags.is_empty() && target_accounts.is_empty() {
        return true;
    }
    target_tags.iter().any(|t| tags.contains(t))
        || target_accounts.iter().any(|a| accounts.contains(a))
}

// =========================================================================
// Storage
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketSummary {
    pub name: String,
    pub location: String,
    pub storage_class: String,
    pub created: Option<DisplayInstant>,
    pub updated: Option<DisplayInstant>,
}

impl BucketSummary {
    pub fn from_record(item: &Value, zone: DisplayZone) -> Self {
        Self {
            name: owned(item, "name"),
            location: owned(item, "location"),
            storage_class: owned(item, "storageClass"),
            created: instant(item, &["timeCreated"], zone),
            updated: instant(item, &["updated"], zone),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectSummary {
    pub key: String,
    pub size: Option<u64>,
    pub storage_class: String,
    pub last_modified: Option<DisplayInstant>,
}

impl ObjectSummary {
    pub fn from_record(item: &Value, zone: DisplayZone) -> Self {
        Self {
            key: owned(item, "name"),
            size: u64_field(item, "size"),
            storage_class: owned(item, "storageClass"),
            last_modified: instant(item, &["updated"], zone),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyBinding {
    pub role: String,
    pub members: Vec<String>,
    pub condition: Option<String>,
}

impl PolicyBinding {
    pub fn list_from(policy: &Value) -> Vec<Self> {
        array(policy, "bindings")
            .iter()
            .map(|b| Self {
                role: owned(b, "role"),
                members: strings(b, "members"),
                condition: b
                    .get("condition")
                    .and_then(|c| str_field(c, "title"))
                    .map(str::to_string),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Versioning {
    pub enabled: bool,
}

impl Versioning {
    /// A bucket that never had versioning configured reports nothing; that is "disabled"
    pub fn from_response(bucket: &Value) -> Self {
        Self {
            enabled: bucket
                .get("versioning")
                .and_then(|v| v.get("enabled"))
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
        }
    }

    pub fn status(&self) -> &'static str {
        if self.enabled {
            "Enabled"
        } else {
            "Disabled"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Label {
    pub key: String,
    pub value: String,
}

impl Label {
    pub fn list_from(labels: Option<&Value>) -> Vec<Self> {
        labels
            .and_then(|v| v.as_object())
            .map(|map| {
                map.iter()
                    .map(|(k, v)| Self {
                        key: k.clone(),
                        value: v.as_str().unwrap_or(PLACEHOLDER).to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Encryption {
    pub kms_key: String,
    pub key_ring: String,
    pub location: String,
}

impl Encryption {
    /// `None` when the bucket uses provider-managed keys
    pub fn from_response(bucket: &Value) -> Option<Self> {
        let key = bucket
            .get("encryption")
            .and_then(|e| str_field(e, "defaultKmsKeyName"))
            .filter(|k| !k.is_empty())?;
        // projects/{p}/locations/{l}/keyRings/{r}/cryptoKeys/{k}
        let parts: Vec<&str> = key.split('/').collect();
        let segment = |name: &str| {
            parts
                .iter()
                .position(|p| *p == name)
                .and_then(|i| parts.get(i + 1))
                .map(|s| s.to_string())
                .unwrap_or_else(|| PLACEHOLDER.to_string())
        };
        Some(Self {
            kms_key: short_name(key).to_string(),
            key_ring: segment("keyRings"),
            location: segment("locations"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleRule {
    pub action: String,
    pub storage_class: String,
    pub condition: String,
}

impl LifecycleRule {
    pub fn list_from(bucket: &Value) -> Vec<Self> {
        let Some(lifecycle) = bucket.get("lifecycle") else {
            return Vec::new();
        };
        array(lifecycle, "rule")
            .iter()
            .map(|rule| {
                let action = rule.get("action").cloned().unwrap_or(Value::Null);
                let condition = rule
                    .get("condition")
                    .and_then(|c| c.as_object())
                    .map(|map| {
                        map.iter()
                            .map(|(k, v)| match v {
                                Value::String(s) => format!("{}={}", k, s),
                                other => format!("{}={}", k, other),
                            })
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .filter(|c| !c.is_empty())
                    .unwrap_or_else(|| PLACEHOLDER.to_string());
                Self {
                    action: owned(&action, "type"),
                    storage_class: owned(&action, "storageClass"),
                    condition,
                }
            })
            .collect()
    }
}
