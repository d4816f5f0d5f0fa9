use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::common::entity::{TenantId, TriggerId};

/// Availability state reported by a collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AvailabilityType {
    Up,
    Down,
    Unavailable,
    Unknown,
}

/// Payload of a `Data` fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataValue {
    Numeric(f64),
    Availability(AvailabilityType),
    String(String),
}

impl DataValue {
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            Self::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    /// Total order over values: numeric (IEEE total order), then
    /// availability, then string.
    pub fn total_cmp(&self, other: &Self) -> std::cmp::Ordering {
        fn rank(v: &DataValue) -> u8 {
            match v {
                DataValue::Numeric(_) => 0,
                DataValue::Availability(_) => 1,
                DataValue::String(_) => 2,
            }
        }
        match (self, other) {
            (Self::Numeric(a), Self::Numeric(b)) => a.total_cmp(b),
            (Self::Availability(a), Self::Availability(b)) => (*a as u8).cmp(&(*b as u8)),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

impl std::fmt::Display for DataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "{v}"),
            Self::Availability(a) => write!(f, "{a:?}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

/// A single measurement for one data id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Data {
    pub tenant_id: TenantId,
    pub data_id: String,
    /// Milliseconds since epoch.
    pub timestamp: i64,
    pub value: DataValue,
}

/// A structured occurrence matched by event expressions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub tenant_id: TenantId,
    pub id: String,
    /// Milliseconds since epoch.
    pub ctime: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// Set when the event is addressed to one trigger only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_id: Option<TriggerId>,
}

/// Stable identity of a fact, used for deduplication and tie-breaking.
///
/// A data point is identified by id and timestamp only. When a tick carries
/// two points with the same id and timestamp but different values, both are
/// evaluated but an eval set keeps one result per condition and key: the one
/// for the point sorting first, i.e. the smallest value under
/// [`DataValue::total_cmp`]. Arrival order never decides.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FactKey {
    #[serde(rename_all = "camelCase")]
    Data { data_id: String, timestamp: i64 },
    Event { id: String },
}

impl std::fmt::Display for FactKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Data { data_id, timestamp } => write!(f, "{data_id}@{timestamp}"),
            Self::Event { id } => write!(f, "event:{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Fact {
    Data(Data),
    Event(Event),
}

impl Fact {
    pub fn tenant_id(&self) -> &TenantId {
        match self {
            Self::Data(d) => &d.tenant_id,
            Self::Event(e) => &e.tenant_id,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            Self::Data(d) => d.timestamp,
            Self::Event(e) => e.ctime,
        }
    }

    pub fn key(&self) -> FactKey {
        match self {
            Self::Data(d) => FactKey::Data {
                data_id: d.data_id.clone(),
                timestamp: d.timestamp,
            },
            Self::Event(e) => FactKey::Event { id: e.id.clone() },
        }
    }
}

/// Sort a tick's facts into the total `(timestamp, identity, value)` order.
pub fn sort_facts(facts: &mut [Fact]) {
    facts.sort_by(|a, b| {
        (a.timestamp(), a.key())
            .cmp(&(b.timestamp(), b.key()))
            .then_with(|| match (a, b) {
                (Fact::Data(x), Fact::Data(y)) => x.value.total_cmp(&y.value),
                _ => std::cmp::Ordering::Equal,
            })
    });
}
