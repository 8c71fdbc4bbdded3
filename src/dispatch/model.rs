//! Incident and unit aggregates.
//!
//! An incident's `assigned_units` and a unit's `assigned_incident` form one
//! bidirectional link. Nothing in this module keeps the two sides in step;
//! the correlator updates both under its gate.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::{DispatchError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Created,
    Dispatched,
    Acknowledged,
    InProgress,
    Resolved,
    Pending,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Created => "created",
            IncidentStatus::Dispatched => "dispatched",
            IncidentStatus::Acknowledged => "acknowledged",
            IncidentStatus::InProgress => "in_progress",
            IncidentStatus::Resolved => "resolved",
            IncidentStatus::Pending => "pending",
        }
    }

    pub fn is_open(&self) -> bool {
        *self != IncidentStatus::Resolved
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Active,
    Resolved,
    Unavailable,
}

/// What happens to a unit aggregate when its connection goes away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisconnectPolicy {
    /// Detach the unit from its open incident and mark it unavailable.
    #[default]
    Unlink,
    /// Detach the unit from any incident and delete the aggregate.
    Remove,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub status: IncidentStatus,
    pub created_at: DateTime<Utc>,
    /// Set exactly when `status` is `Resolved`.
    pub resolved_at: Option<DateTime<Utc>>,
    pub assigned_units: BTreeSet<String>,
}

impl Incident {
    pub fn new(id: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            status: IncidentStatus::Created,
            created_at: Utc::now(),
            resolved_at: None,
            assigned_units: BTreeSet::new(),
        }
    }

    /// CREATED -> DISPATCHED. Any other starting status is refused.
    pub fn dispatch(&mut self) -> Result<()> {
        if self.status != IncidentStatus::Created {
            return Err(DispatchError::InvalidTransition {
                id: self.id.clone(),
                from: self.status,
                to: IncidentStatus::Dispatched,
            });
        }
        self.status = IncidentStatus::Dispatched;
        Ok(())
    }

    /// DISPATCHED -> ACKNOWLEDGED; other statuses are left alone. Returns
    /// whether the status changed.
    pub fn acknowledge(&mut self) -> bool {
        if self.status == IncidentStatus::Dispatched {
            self.status = IncidentStatus::Acknowledged;
            true
        } else {
            false
        }
    }

    /// Mark resolved and stamp `resolved_at`, once. Returns whether the
    /// status changed.
    pub fn resolve(&mut self, at: DateTime<Utc>) -> bool {
        if self.status == IncidentStatus::Resolved {
            return false;
        }
        self.status = IncidentStatus::Resolved;
        self.resolved_at = Some(at);
        true
    }

    pub fn assign(&mut self, unit_id: &str) -> bool {
        self.assigned_units.insert(unit_id.to_string())
    }

    pub fn release(&mut self, unit_id: &str) -> bool {
        self.assigned_units.remove(unit_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub status: UnitStatus,
    pub assigned_incident: Option<String>,
}

impl Unit {
    pub fn new(id: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            status: UnitStatus::Active,
            assigned_incident: None,
        }
    }

    pub fn is_assigned_to(&self, incident_id: &str) -> bool {
        self.assigned_incident.as_deref() == Some(incident_id)
    }
}

/// Control-point request to open an incident. Without an `id` the store
/// generates one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewIncident {
    #[serde(default)]
    pub id: Option<String>,
    pub x: f64,
    pub y: f64,
}
