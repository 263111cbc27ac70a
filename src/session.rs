//! One planning session: an inbound and an outbound plan sharing one yard.

use rand::Rng;
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::allocator::{AllocationEngine, PlanEvent, PlanningResult};
use crate::error::{PlanningError, Result};
use crate::layout::YardLayout;
use crate::model::{Container, PlacementRecord};
use crate::types::{ContainerLength, OperationType};
use crate::yard::{YardModel, ZoneConfiguration};

/// Per-zone counts over the combined layout.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct CombinedZoneSummary {
    pub zone: String,
    pub inbound: usize,
    pub outbound: usize,
    pub short_containers: usize,
    pub long_containers: usize,
    pub total: usize,
    pub capacity: usize,
    pub utilization: f64,
}

/// Owns the yard for one inbound and one outbound plan.
///
/// Both plans stack onto the same physical occupancy, so the outbound plan
/// sees every slot the inbound plan used and vice versa.
#[derive(Clone, Debug)]
pub struct PlanningSession {
    layout: YardLayout,
    engine: AllocationEngine,
    yard: YardModel,
    inbound: Option<PlanningResult>,
    outbound: Option<PlanningResult>,
}

impl PlanningSession {
    pub fn new(layout: YardLayout, engine: AllocationEngine) -> Self {
        let yard = YardModel::from_layout(&layout);
        Self {
            layout,
            engine,
            yard,
            inbound: None,
            outbound: None,
        }
    }

    pub fn yard(&self) -> &YardModel {
        &self.yard
    }

    pub fn inbound(&self) -> Option<&PlanningResult> {
        self.inbound.as_ref()
    }

    pub fn outbound(&self) -> Option<&PlanningResult> {
        self.outbound.as_ref()
    }

    pub fn plan<R: Rng + ?Sized>(
        &mut self,
        containers: &[Container],
        operation: OperationType,
        zone_config: &ZoneConfiguration,
        rng: &mut R,
    ) -> Result<&PlanningResult> {
        self.plan_with_progress(containers, operation, zone_config, rng, |_| {})
    }

    /// Plans one operation into the session yard.
    ///
    /// # Errors
    /// `AlreadyPlanned` when this operation already has a plan; call
    /// [`reset`](Self::reset) first.
    pub fn plan_with_progress<R: Rng + ?Sized>(
        &mut self,
        containers: &[Container],
        operation: OperationType,
        zone_config: &ZoneConfiguration,
        rng: &mut R,
        on_event: impl FnMut(&PlanEvent),
    ) -> Result<&PlanningResult> {
        let slot = match operation {
            OperationType::Inbound => &mut self.inbound,
            OperationType::Outbound => &mut self.outbound,
        };
        if slot.is_some() {
            return Err(PlanningError::AlreadyPlanned(operation));
        }

        let result = self.engine.plan_with_progress(
            containers,
            operation,
            zone_config,
            &mut self.yard,
            rng,
            on_event,
        )?;
        Ok(&*slot.insert(result))
    }

    /// Discards both plans and empties the yard.
    pub fn reset(&mut self) {
        info!("planning session reset");
        self.yard = YardModel::from_layout(&self.layout);
        self.inbound = None;
        self.outbound = None;
    }

    /// Inbound placements followed by outbound placements.
    ///
    /// A later record for the same container replaces the earlier one in place.
    pub fn combined_layout(&self) -> Vec<PlacementRecord> {
        let mut combined: Vec<PlacementRecord> = Vec::new();
        let records = self
            .inbound
            .iter()
            .chain(self.outbound.iter())
            .flat_map(|result| result.placements.iter());
        for record in records {
            match combined
                .iter_mut()
                .find(|existing| existing.container_id == record.container_id)
            {
                Some(existing) => *existing = record.clone(),
                None => combined.push(record.clone()),
            }
        }
        combined
    }

    /// Zone totals over [`combined_layout`](Self::combined_layout), in yard order.
    pub fn combined_summary(&self) -> Vec<CombinedZoneSummary> {
        let combined = self.combined_layout();
        self.yard
            .zones()
            .iter()
            .filter_map(|zone| {
                let records: Vec<_> = combined.iter().filter(|r| r.zone == zone.name()).collect();
                if records.is_empty() {
                    return None;
                }
                let total = records.len();
                let capacity = zone.total_slots();
                let inbound = records
                    .iter()
                    .filter(|r| r.operation == OperationType::Inbound)
                    .count();
                let short_containers = records
                    .iter()
                    .filter(|r| r.length == ContainerLength::Short)
                    .count();
                Some(CombinedZoneSummary {
                    zone: zone.name().to_string(),
                    inbound,
                    outbound: total - inbound,
                    short_containers,
                    long_containers: total - short_containers,
                    total,
                    capacity,
                    utilization: total as f64 / capacity as f64 * 100.0,
                })
            })
            .collect()
    }
}
