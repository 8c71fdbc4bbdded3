//! Event correlator
//!
//! Applies unit events and control-point actions to the incident and unit
//! aggregates. Every entry point runs its read-decide-write sequence under one
//! gate, which makes each update of a unit and its incident indivisible with
//! respect to every other update. Critical sections are bounded by the units
//! of one incident, and contention is rare because a unit sends one event at
//! a time.
//!
//! Status transitions the correlator performs are re-published through the
//! hub: a dispatch on `new_incident`, acknowledgment and resolution on
//! `incident_status`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::broker::Hub;
use crate::dispatch::event::{
    Acknowledgment, DispatchEvent, INCIDENT_STATUS_TOPIC, LocationReport, NEW_INCIDENT_TOPIC,
    ResolutionReport,
};
use crate::dispatch::model::{
    DisconnectPolicy, Incident, IncidentStatus, NewIncident, Unit, UnitStatus,
};
use crate::dispatch::store::{IncidentStore, MemoryStore, UnitStore};
use crate::utils::{DispatchError, EntityKind, Result};

pub struct Correlator {
    incidents: Arc<dyn IncidentStore>,
    units: Arc<dyn UnitStore>,
    hub: Hub,
    policy: DisconnectPolicy,
    gate: Mutex<()>,
}

impl std::fmt::Debug for Correlator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Correlator")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Correlator {
    pub fn new(
        incidents: Arc<dyn IncidentStore>,
        units: Arc<dyn UnitStore>,
        hub: Hub,
        policy: DisconnectPolicy,
    ) -> Self {
        Self {
            incidents,
            units,
            hub,
            policy,
            gate: Mutex::new(()),
        }
    }

    /// A correlator over fresh in-memory stores.
    pub fn in_memory(hub: Hub, policy: DisconnectPolicy) -> Self {
        Self::new(
            Arc::new(MemoryStore::<Incident>::new()),
            Arc::new(MemoryStore::<Unit>::new()),
            hub,
            policy,
        )
    }

    pub fn policy(&self) -> DisconnectPolicy {
        self.policy
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ---- control point ----------------------------------------------------

    /// Open a new incident in CREATED. An id already in use is refused with
    /// `AlreadyExists`; the live incident and its links stay untouched.
    pub fn create_incident(&self, request: NewIncident) -> Result<Incident> {
        let _gate = self.lock();
        let id = request.id.unwrap_or_default();
        if !id.is_empty() && self.incidents.get(&id).is_some() {
            return Err(DispatchError::AlreadyExists {
                kind: EntityKind::Incident,
                id,
            });
        }
        let incident = self
            .incidents
            .create(Incident::new(id, request.x, request.y));
        info!(incident = %incident.id, x = incident.x, y = incident.y, "incident created");
        Ok(incident)
    }

    /// CREATED -> DISPATCHED, then broadcast the incident on `new_incident`.
    /// A second dispatch fails with `InvalidTransition` and broadcasts nothing.
    pub fn dispatch_incident(&self, incident_id: &str) -> Result<Incident> {
        let _gate = self.lock();
        let mut incident = self
            .incidents
            .get(incident_id)
            .ok_or_else(|| DispatchError::incident_not_found(incident_id))?;

        incident.dispatch()?;
        let incident = self.incidents.update(incident)?;
        let delivered = self.broadcast(NEW_INCIDENT_TOPIC, &incident);
        info!(incident = %incident.id, delivered, "incident dispatched");
        Ok(incident)
    }

    pub fn get_incident(&self, incident_id: &str) -> Result<Incident> {
        self.incidents
            .get(incident_id)
            .ok_or_else(|| DispatchError::incident_not_found(incident_id))
    }

    pub fn list_incidents(&self) -> Vec<Incident> {
        self.incidents.list()
    }

    /// Incidents that are not yet resolved.
    pub fn open_incidents(&self) -> Vec<Incident> {
        self.incidents
            .list()
            .into_iter()
            .filter(|i| i.status.is_open())
            .collect()
    }

    /// Delete an incident and clear the back-reference of every unit linked
    /// to it.
    pub fn delete_incident(&self, incident_id: &str) -> Result<Incident> {
        let _gate = self.lock();
        let incident = self
            .incidents
            .get(incident_id)
            .ok_or_else(|| DispatchError::incident_not_found(incident_id))?;

        for unit_id in &incident.assigned_units {
            if let Some(mut unit) = self.units.get(unit_id) {
                if unit.is_assigned_to(incident_id) {
                    unit.assigned_incident = None;
                    self.units.update(unit)?;
                }
            }
        }
        self.incidents.delete(incident_id);
        info!(incident = %incident_id, "incident deleted");
        Ok(incident)
    }

    pub fn get_unit(&self, unit_id: &str) -> Result<Unit> {
        self.units
            .get(unit_id)
            .ok_or_else(|| DispatchError::unit_not_found(unit_id))
    }

    pub fn list_units(&self) -> Vec<Unit> {
        self.units.list()
    }

    // ---- unit event stream ------------------------------------------------

    /// Route a decoded event to its handler.
    pub fn apply(&self, event: DispatchEvent) -> Result<()> {
        match event {
            DispatchEvent::Location(report) => self.handle_location(&report),
            DispatchEvent::Acknowledgment(ack) => self.handle_acknowledgment(&ack),
            DispatchEvent::Resolution(report) => self.handle_resolution(&report),
            DispatchEvent::IncidentBroadcast(payload) => {
                debug!(incident = %payload["id"], "incident broadcast observed");
                Ok(())
            }
            DispatchEvent::Unknown { topic } => {
                debug!(topic = %topic, "ignoring event on unknown topic");
                Ok(())
            }
        }
    }

    /// Overwrite a known unit's coordinates. Reports from units that never
    /// acknowledged are dropped with `NotFound`.
    pub fn handle_location(&self, report: &LocationReport) -> Result<()> {
        let _gate = self.lock();
        let mut unit = self
            .units
            .get(&report.ert_id)
            .ok_or_else(|| DispatchError::unit_not_found(&report.ert_id))?;

        unit.x = report.x;
        unit.y = report.y;
        self.units.update(unit)?;
        debug!(unit = %report.ert_id, x = report.x, y = report.y, "location updated");
        Ok(())
    }

    /// Create the unit if needed, link it to the incident (moving it off any
    /// previous incident) and move a DISPATCHED incident to ACKNOWLEDGED.
    pub fn handle_acknowledgment(&self, ack: &Acknowledgment) -> Result<()> {
        let _gate = self.lock();
        let unit_id = ack.ert_id.as_str();
        let incident_id = ack.incident_id.as_str();

        let (mut unit, is_new) = match self.units.get(unit_id) {
            Some(unit) => (unit, false),
            None => (
                Unit::new(unit_id, ack.x.unwrap_or_default(), ack.y.unwrap_or_default()),
                true,
            ),
        };
        if let Some(x) = ack.x {
            unit.x = x;
        }
        if let Some(y) = ack.y {
            unit.y = y;
        }
        unit.status = UnitStatus::Active;

        let previous = unit.assigned_incident.replace(incident_id.to_string());
        if let Some(previous) = previous.filter(|p| p != incident_id) {
            if let Some(mut old) = self.incidents.get(&previous) {
                old.release(unit_id);
                self.incidents.update(old)?;
                info!(unit = %unit_id, from = %previous, to = %incident_id, "unit reassigned");
            }
        }

        if is_new {
            self.units.create(unit);
            info!(unit = %unit_id, "unit created from acknowledgment");
        } else {
            self.units.update(unit)?;
        }

        let Some(mut incident) = self.incidents.get(incident_id) else {
            warn!(unit = %unit_id, incident = %incident_id, "acknowledgment names an unknown incident");
            return Ok(());
        };
        incident.assign(unit_id);
        let acknowledged = incident.acknowledge();
        let incident = self.incidents.update(incident)?;

        if acknowledged {
            info!(incident = %incident_id, unit = %unit_id, "incident acknowledged");
            self.broadcast(INCIDENT_STATUS_TOPIC, &incident);
        } else {
            debug!(incident = %incident_id, unit = %unit_id, status = %incident.status, "unit joined incident");
        }
        Ok(())
    }

    /// Mark the unit resolved; resolve its incident once every unit linked to
    /// it has resolved.
    pub fn handle_resolution(&self, report: &ResolutionReport) -> Result<()> {
        let _gate = self.lock();
        let unit_id = report.ert_id.as_str();
        let mut unit = self
            .units
            .get(unit_id)
            .ok_or_else(|| DispatchError::unit_not_found(unit_id))?;

        // captured before the unit is written back
        let linked = unit.assigned_incident.clone();
        unit.status = UnitStatus::Resolved;
        self.units.update(unit)?;
        info!(unit = %unit_id, "unit resolved");

        let Some(incident_id) = linked else {
            debug!(unit = %unit_id, "resolved unit had no assignment");
            return Ok(());
        };
        let Some(mut incident) = self.incidents.get(&incident_id) else {
            warn!(unit = %unit_id, incident = %incident_id, "resolved unit points at an unknown incident");
            return Ok(());
        };
        if incident.status == IncidentStatus::Resolved {
            return Ok(());
        }

        let assigned: Vec<Unit> = self
            .units
            .list()
            .into_iter()
            .filter(|u| u.is_assigned_to(&incident_id))
            .collect();
        let outstanding = assigned
            .iter()
            .filter(|u| u.status != UnitStatus::Resolved)
            .count();

        if !assigned.is_empty() && outstanding == 0 {
            incident.resolve(Utc::now());
            let incident = self.incidents.update(incident)?;
            info!(incident = %incident_id, units = assigned.len(), "incident resolved");
            self.broadcast(INCIDENT_STATUS_TOPIC, &incident);
        } else {
            info!(incident = %incident_id, outstanding, "incident still in progress");
        }
        Ok(())
    }

    /// Reconcile a field unit whose connection closed. Under `Unlink` the unit
    /// leaves its incident if that incident is still open, and is marked
    /// unavailable. Under `Remove` it leaves any incident and is deleted.
    /// Never resolves an incident. Unknown units are ignored.
    pub fn handle_disconnection(&self, unit_id: &str) -> Result<()> {
        let _gate = self.lock();
        let Some(mut unit) = self.units.get(unit_id) else {
            debug!(unit = %unit_id, "disconnect of a unit that never acknowledged");
            return Ok(());
        };

        if let Some(incident_id) = unit.assigned_incident.clone() {
            match self.incidents.get(&incident_id) {
                Some(mut incident)
                    if incident.status.is_open() || self.policy == DisconnectPolicy::Remove =>
                {
                    incident.release(unit_id);
                    let incident = self.incidents.update(incident)?;
                    unit.assigned_incident = None;
                    info!(
                        unit = %unit_id,
                        incident = %incident_id,
                        remaining = incident.assigned_units.len(),
                        "disconnected unit removed from incident"
                    );
                }
                Some(_) => {}
                None => unit.assigned_incident = None,
            }
        }

        match self.policy {
            DisconnectPolicy::Unlink => {
                unit.status = UnitStatus::Unavailable;
                self.units.update(unit)?;
                info!(unit = %unit_id, "unit unavailable after disconnect");
            }
            DisconnectPolicy::Remove => {
                self.units.delete(unit_id);
                info!(unit = %unit_id, "unit removed after disconnect");
            }
        }
        Ok(())
    }

    fn broadcast<T: Serialize>(&self, topic: &str, body: &T) -> usize {
        match serde_json::to_value(body) {
            Ok(payload) => self.hub.publish(topic, payload),
            Err(e) => {
                warn!(topic, "failed to encode broadcast: {e}");
                0
            }
        }
    }
}
