//! Slot allocation for inbound and outbound container batches.
//!
//! A run has three phases:
//! 1. classify every container into a weight class
//! 2. place containers group by group (carrier for inbound, port and weight
//!    class for outbound)
//! 3. send whatever the group phase left behind through a best-effort fallback
//!
//! The engine is synchronous and mutates only the [`YardModel`] it is handed.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::error::{PlanningError, Result};
use crate::metrics::PlanMetrics;
use crate::model::{Container, PlacementRecord};
use crate::types::{OperationType, WeightClass, WeightClassSet, WEIGHT_CLASS_COUNT};
use crate::weight::WeightClassifier;
use crate::yard::{SlotPosition, YardModel, ZoneConfiguration};

/// Order in which the members of a group are placed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Sequencing {
    /// Input order.
    #[default]
    FirstSeen,
    /// Handling priority first, then heavier containers, unknown weights last.
    Priority,
}

impl FromStr for Sequencing {
    type Err = PlanningError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "first_seen" | "first-seen" => Ok(Sequencing::FirstSeen),
            "priority" => Ok(Sequencing::Priority),
            other => Err(PlanningError::InvalidConfiguration(format!(
                "unknown sequencing '{other}'"
            ))),
        }
    }
}

/// Tuning parameters of the allocation engine.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AllocationConfig {
    /// Share of an inbound group that one zone must take for the group to commit there.
    pub group_completion_threshold: f64,
    /// Largest weight-class difference that still counts as grouped for outbound plans.
    pub weight_class_adjacency: u8,
    pub sequencing: Sequencing,
    /// Keep non-reefer cargo off reefer slots while general slots remain.
    pub prefer_general_slots: bool,
    /// Reject zone configurations that name unknown zones.
    pub strict_zones: bool,
}

impl AllocationConfig {
    pub const DEFAULT_GROUP_COMPLETION_THRESHOLD: f64 = 0.8;
    pub const DEFAULT_WEIGHT_CLASS_ADJACENCY: u8 = 1;

    pub fn builder() -> AllocationConfigBuilder {
        AllocationConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        let threshold = self.group_completion_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(PlanningError::InvalidConfiguration(format!(
                "group completion threshold must be in (0, 1], got {threshold}"
            )));
        }
        if self.weight_class_adjacency >= WEIGHT_CLASS_COUNT {
            return Err(PlanningError::InvalidConfiguration(format!(
                "weight class adjacency must be at most {}, got {}",
                WEIGHT_CLASS_COUNT - 1,
                self.weight_class_adjacency
            )));
        }
        Ok(())
    }
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            group_completion_threshold: Self::DEFAULT_GROUP_COMPLETION_THRESHOLD,
            weight_class_adjacency: Self::DEFAULT_WEIGHT_CLASS_ADJACENCY,
            sequencing: Sequencing::default(),
            prefer_general_slots: false,
            strict_zones: false,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct AllocationConfigBuilder {
    config: AllocationConfig,
}

impl AllocationConfigBuilder {
    pub fn group_completion_threshold(mut self, threshold: f64) -> Self {
        self.config.group_completion_threshold = threshold;
        self
    }

    pub fn weight_class_adjacency(mut self, adjacency: u8) -> Self {
        self.config.weight_class_adjacency = adjacency;
        self
    }

    pub fn sequencing(mut self, sequencing: Sequencing) -> Self {
        self.config.sequencing = sequencing;
        self
    }

    pub fn prefer_general_slots(mut self, prefer: bool) -> Self {
        self.config.prefer_general_slots = prefer;
        self
    }

    pub fn strict_zones(mut self, strict: bool) -> Self {
        self.config.strict_zones = strict;
        self
    }

    pub fn build(self) -> AllocationConfig {
        self.config
    }
}

/// Why a container could not be placed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnplacedReason {
    NoPermittedZone,
    NoReeferSlot,
    NoCompatibleSlot,
    GroupStraggler,
}

impl UnplacedReason {
    pub fn code(&self) -> &'static str {
        match self {
            UnplacedReason::NoPermittedZone => "no_permitted_zone",
            UnplacedReason::NoReeferSlot => "no_reefer_slot",
            UnplacedReason::NoCompatibleSlot => "no_compatible_slot",
            UnplacedReason::GroupStraggler => "group_straggler",
        }
    }
}

impl fmt::Display for UnplacedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnplacedReason::NoPermittedZone => {
                write!(f, "No zone permits the container's weight class")
            }
            UnplacedReason::NoReeferSlot => {
                write!(f, "No free reefer slot of matching length in a permitted zone")
            }
            UnplacedReason::NoCompatibleSlot => {
                write!(f, "No free slot of matching length in a permitted zone")
            }
            UnplacedReason::GroupStraggler => {
                write!(f, "Group was committed to a zone that had no room left for it")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnplacedContainer {
    pub container_id: String,
    pub weight_class: WeightClass,
    pub reason: UnplacedReason,
}

/// Events emitted while planning, for live progress views.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum PlanEvent {
    /// Group placement begins.
    GroupStarted {
        key: String,
        weight_class: Option<u8>,
        size: usize,
    },
    /// Group members were placed in a zone.
    GroupCommitted {
        key: String,
        zone: String,
        placed: usize,
        size: usize,
    },
    /// Members go through the best-effort fallback; `key` is `None` for the
    /// outbound sweep over all leftovers.
    GroupFallback { key: Option<String>, size: usize },
    ContainerPlaced {
        container_id: String,
        position: String,
        zone: String,
        weight_class: u8,
    },
    ContainerRejected {
        container_id: String,
        weight_class: u8,
        reason_code: String,
        reason_text: String,
    },
    /// Planning finished.
    Finished { placed: usize, unplaced: usize },
}

/// Outcome of one run.
#[derive(Clone, Debug)]
pub struct PlanningResult {
    pub operation: OperationType,
    /// Placements in the order they were made.
    pub placements: Vec<PlacementRecord>,
    pub unplaced: Vec<UnplacedContainer>,
    pub metrics: PlanMetrics,
}

impl PlanningResult {
    pub fn is_complete(&self) -> bool {
        self.unplaced.is_empty()
    }

    pub fn placed_count(&self) -> usize {
        self.placements.len()
    }

    pub fn unplaced_count(&self) -> usize {
        self.unplaced.len()
    }

    pub fn placement(&self, container_id: &str) -> Option<&PlacementRecord> {
        self.placements
            .iter()
            .find(|record| record.container_id == container_id)
    }
}

/// Places container batches into a yard.
#[derive(Clone, Debug, Default)]
pub struct AllocationEngine {
    config: AllocationConfig,
    classifier: WeightClassifier,
}

impl AllocationEngine {
    pub fn new(config: AllocationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            classifier: WeightClassifier,
        })
    }

    pub fn config(&self) -> &AllocationConfig {
        &self.config
    }

    /// Plans a batch without progress reporting.
    pub fn plan<R: Rng + ?Sized>(
        &self,
        containers: &[Container],
        operation: OperationType,
        zone_config: &ZoneConfiguration,
        yard: &mut YardModel,
        rng: &mut R,
    ) -> Result<PlanningResult> {
        self.plan_with_progress(containers, operation, zone_config, yard, rng, |_| {})
    }

    /// Plans a batch and reports every step through `on_event`.
    ///
    /// The zone configuration is applied to `yard` first. Containers that
    /// could not be placed are part of the result, not an error.
    pub fn plan_with_progress<R: Rng + ?Sized>(
        &self,
        containers: &[Container],
        operation: OperationType,
        zone_config: &ZoneConfiguration,
        yard: &mut YardModel,
        rng: &mut R,
        mut on_event: impl FnMut(&PlanEvent),
    ) -> Result<PlanningResult> {
        yard.apply_configuration(zone_config, self.config.strict_zones)?;

        let classes: Vec<WeightClass> = containers
            .iter()
            .map(|container| self.classifier.classify(container.weight, &mut *rng))
            .collect();

        let mut run = PlanRun {
            config: &self.config,
            operation,
            containers,
            classes: &classes,
            yard,
            placed: vec![false; containers.len()],
            placements: Vec::with_capacity(containers.len()),
            unplaced: Vec::new(),
            on_event: &mut on_event,
        };

        match operation {
            OperationType::Inbound => run.inbound(),
            OperationType::Outbound => run.outbound(),
        }

        let PlanRun {
            yard,
            placements,
            unplaced,
            on_event,
            ..
        } = run;

        on_event(&PlanEvent::Finished {
            placed: placements.len(),
            unplaced: unplaced.len(),
        });

        let metrics = PlanMetrics::compile(
            operation,
            containers.len(),
            &placements,
            yard,
            self.config.weight_class_adjacency,
        );
        info!(
            %operation,
            placed = placements.len(),
            unplaced = unplaced.len(),
            efficiency = metrics.efficiency,
            "{}",
            metrics.message
        );

        Ok(PlanningResult {
            operation,
            placements,
            unplaced,
            metrics,
        })
    }
}

/// Groups container indices by key, keeping first-seen order of keys and members.
fn group_by_key<K: PartialEq>(keys: impl Iterator<Item = K>) -> Vec<(K, Vec<usize>)> {
    let mut groups: Vec<(K, Vec<usize>)> = Vec::new();
    for (idx, key) in keys.enumerate() {
        match groups.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, members)) => members.push(idx),
            None => groups.push((key, vec![idx])),
        }
    }
    groups
}

/// Priority ascending, then heavier first; unknown weights go last.
fn priority_order(a: &Container, b: &Container) -> Ordering {
    a.priority().cmp(&b.priority()).then_with(|| match (a.weight, b.weight) {
        (Some(wa), Some(wb)) => wb.partial_cmp(&wa).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    })
}

/// Mutable state of one planning run.
struct PlanRun<'a> {
    config: &'a AllocationConfig,
    operation: OperationType,
    containers: &'a [Container],
    classes: &'a [WeightClass],
    yard: &'a mut YardModel,
    placed: Vec<bool>,
    placements: Vec<PlacementRecord>,
    unplaced: Vec<UnplacedContainer>,
    on_event: &'a mut dyn FnMut(&PlanEvent),
}

impl PlanRun<'_> {
    fn sequence(&self, members: &mut [usize]) {
        if self.config.sequencing == Sequencing::Priority {
            members.sort_by(|&a, &b| priority_order(&self.containers[a], &self.containers[b]));
        }
    }

    fn inbound(&mut self) {
        let groups = group_by_key(
            self.containers
                .iter()
                .map(|container| {
                    container
                        .grouping_key(OperationType::Inbound)
                        .unwrap_or_default()
                        .to_string()
                }),
        );

        for (carrier, mut members) in groups {
            self.sequence(&mut members);
            let size = members.len();
            let group_classes: WeightClassSet = members.iter().map(|&i| self.classes[i]).collect();
            (self.on_event)(&PlanEvent::GroupStarted {
                key: carrier.clone(),
                weight_class: None,
                size,
            });

            let required = size as f64 * self.config.group_completion_threshold;
            let mut committed = false;

            for zone_idx in 0..self.yard.zones().len() {
                if !self.yard.zones()[zone_idx]
                    .permitted()
                    .contains_all(group_classes.iter())
                {
                    continue;
                }

                let mut staged_zone = self.yard.zones()[zone_idx].clone();
                let staged: Vec<(usize, SlotPosition)> = members
                    .iter()
                    .filter(|&&i| !self.placed[i])
                    .filter_map(|&i| {
                        staged_zone
                            .place(&self.containers[i], self.classes[i], self.config.prefer_general_slots)
                            .map(|position| (i, position))
                    })
                    .collect();

                if (staged.len() as f64) < required {
                    debug!(
                        carrier = %carrier,
                        zone = staged_zone.name(),
                        staged = staged.len(),
                        size,
                        "zone below group completion threshold"
                    );
                    continue;
                }

                debug!(
                    carrier = %carrier,
                    zone = staged_zone.name(),
                    placed = staged.len(),
                    size,
                    "group committed"
                );
                let zone_name = staged_zone.name().to_string();
                self.yard.zones_mut()[zone_idx] = staged_zone;
                let placed = staged.len();
                for (idx, position) in staged {
                    self.record(idx, &position);
                }
                (self.on_event)(&PlanEvent::GroupCommitted {
                    key: carrier.clone(),
                    zone: zone_name,
                    placed,
                    size,
                });
                committed = true;
                break;
            }

            if committed {
                for &idx in &members {
                    if !self.placed[idx] {
                        self.reject(idx, UnplacedReason::GroupStraggler);
                    }
                }
            } else {
                debug!(carrier = %carrier, size, "no zone reached threshold, using fallback");
                (self.on_event)(&PlanEvent::GroupFallback {
                    key: Some(carrier.clone()),
                    size,
                });
                for &idx in &members {
                    if !self.placed[idx] {
                        self.fallback(idx);
                    }
                }
            }
        }
    }

    fn outbound(&mut self) {
        let groups = group_by_key(self.containers.iter().enumerate().map(|(i, container)| {
            let port = container.grouping_key(OperationType::Outbound).unwrap_or_default();
            (port.to_string(), self.classes[i])
        }));

        for ((port, class), mut members) in groups {
            self.sequence(&mut members);
            let size = members.len();
            (self.on_event)(&PlanEvent::GroupStarted {
                key: port.clone(),
                weight_class: Some(class.get()),
                size,
            });

            let mut remaining = members;
            for zone_idx in 0..self.yard.zones().len() {
                if remaining.is_empty() {
                    break;
                }
                if !self.yard.zones()[zone_idx].permits(class) {
                    continue;
                }

                let mut placed_here = 0;
                let mut still_open = Vec::with_capacity(remaining.len());
                for idx in remaining {
                    let position = self.yard.zones_mut()[zone_idx].place(
                        &self.containers[idx],
                        class,
                        self.config.prefer_general_slots,
                    );
                    match position {
                        Some(position) => {
                            self.record(idx, &position);
                            placed_here += 1;
                        }
                        None => still_open.push(idx),
                    }
                }
                remaining = still_open;

                if placed_here > 0 {
                    let zone = self.yard.zones()[zone_idx].name().to_string();
                    debug!(port = %port, class = class.get(), zone = %zone, placed_here, "group drained into zone");
                    (self.on_event)(&PlanEvent::GroupCommitted {
                        key: port.clone(),
                        zone,
                        placed: placed_here,
                        size,
                    });
                }
            }
        }

        let leftovers: Vec<usize> = (0..self.containers.len())
            .filter(|&i| !self.placed[i])
            .collect();
        if leftovers.is_empty() {
            return;
        }
        (self.on_event)(&PlanEvent::GroupFallback {
            key: None,
            size: leftovers.len(),
        });
        for idx in leftovers {
            self.fallback(idx);
        }
    }

    /// Tries every zone in declaration order; the first compatible slot wins.
    fn fallback(&mut self, idx: usize) {
        let container = &self.containers[idx];
        let class = self.classes[idx];
        let prefer_general = self.config.prefer_general_slots;

        let position = self
            .yard
            .zones_mut()
            .iter_mut()
            .find_map(|zone| zone.place(container, class, prefer_general));

        match position {
            Some(position) => self.record(idx, &position),
            None => {
                let reason = self.diagnose(idx);
                self.reject(idx, reason);
            }
        }
    }

    fn diagnose(&self, idx: usize) -> UnplacedReason {
        let container = &self.containers[idx];
        let class = self.classes[idx];
        let mut permitted = self.yard.zones().iter().filter(|zone| zone.permits(class)).peekable();

        if permitted.peek().is_none() {
            return UnplacedReason::NoPermittedZone;
        }
        if container.category.is_reefer()
            && !permitted.any(|zone| zone.has_free_reefer_slot(container.length))
        {
            return UnplacedReason::NoReeferSlot;
        }
        UnplacedReason::NoCompatibleSlot
    }

    fn record(&mut self, idx: usize, position: &SlotPosition) {
        let container = &self.containers[idx];
        let record = PlacementRecord::new(container, self.classes[idx], position, self.operation);
        (self.on_event)(&PlanEvent::ContainerPlaced {
            container_id: record.container_id.clone(),
            position: record.position.clone(),
            zone: record.zone.clone(),
            weight_class: record.weight_class.get(),
        });
        self.placed[idx] = true;
        self.placements.push(record);
    }

    fn reject(&mut self, idx: usize, reason: UnplacedReason) {
        let container = &self.containers[idx];
        let class = self.classes[idx];
        debug!(container = %container.id, reason = reason.code(), "container not placed");
        (self.on_event)(&PlanEvent::ContainerRejected {
            container_id: container.id.clone(),
            weight_class: class.get(),
            reason_code: reason.code().to_string(),
            reason_text: reason.to_string(),
        });
        self.unplaced.push(UnplacedContainer {
            container_id: container.id.clone(),
            weight_class: class,
            reason,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContainerRecord;
    use crate::types::{CargoCategory, ContainerLength};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::{HashMap, HashSet};

    fn class(value: u8) -> WeightClass {
        WeightClass::new(value).unwrap()
    }

    fn inbound(id: &str, iso: &str, carrier: &str) -> Container {
        ContainerRecord::inbound(id, iso, carrier)
            .into_container(OperationType::Inbound)
            .unwrap()
    }

    fn outbound(id: &str, iso: &str, port: &str, weight: f64) -> Container {
        ContainerRecord::outbound(id, iso, port, Some(weight))
            .into_container(OperationType::Outbound)
            .unwrap()
    }

    fn only_zone(zone: &str, classes: WeightClassSet) -> ZoneConfiguration {
        ["M1", "M2", "W1", "W2", "Q1", "Q2"]
            .into_iter()
            .fold(ZoneConfiguration::new(), |config, name| {
                let permitted = if name == zone { classes } else { WeightClassSet::empty() };
                config.with_zone(name, permitted)
            })
    }

    fn run(
        engine: &AllocationEngine,
        containers: &[Container],
        operation: OperationType,
        config: &ZoneConfiguration,
        seed: u64,
    ) -> (PlanningResult, YardModel) {
        let mut yard = YardModel::canonical();
        let mut rng = StdRng::seed_from_u64(seed);
        let result = engine
            .plan(containers, operation, config, &mut yard, &mut rng)
            .unwrap();
        (result, yard)
    }

    fn assert_plan_invariants(containers: &[Container], result: &PlanningResult, yard: &YardModel) {
        assert!(result.placements.len() <= containers.len());
        let ids: HashSet<_> = result.placements.iter().map(|p| &p.container_id).collect();
        assert_eq!(ids.len(), result.placements.len());
        assert_eq!(result.placed_count() + result.unplaced_count(), containers.len());

        let mut stacks: HashMap<(String, u8, char), Vec<u8>> = HashMap::new();
        for record in &result.placements {
            let zone = yard.zone(&record.zone).unwrap();
            let slot = zone
                .slots()
                .iter()
                .find(|s| s.row == record.row && s.column == record.column)
                .unwrap();
            assert_eq!(slot.length, record.length);
            assert!(zone.permits(record.weight_class));
            if record.category == CargoCategory::Reefer {
                assert!(slot.reefer);
            }
            assert!(record.tier >= 1 && record.tier <= slot.max_tiers);
            stacks
                .entry((record.zone.clone(), record.row, record.column))
                .or_default()
                .push(record.tier);
        }
        for tiers in stacks.values() {
            assert!(tiers.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn two_carriers_fit_one_zone_without_fallback() {
        let mut containers = Vec::new();
        for i in 0..6 {
            containers.push(inbound(&format!("A{i}"), "22G1", "Maersk"));
            if i < 4 {
                containers.push(inbound(&format!("B{i}"), "45G1", "MSC"));
            }
        }
        let config = only_zone("M1", WeightClassSet::all());
        let engine = AllocationEngine::default();
        let mut events = Vec::new();
        let mut yard = YardModel::canonical();
        let mut rng = StdRng::seed_from_u64(1);
        let result = engine
            .plan_with_progress(
                &containers,
                OperationType::Inbound,
                &config,
                &mut yard,
                &mut rng,
                |event| events.push(event.clone()),
            )
            .unwrap();

        assert_eq!(result.metrics.efficiency, 100.0);
        assert!(result.is_complete());
        assert!(result.placements.iter().all(|p| p.zone == "M1"));
        assert!(!events.iter().any(|e| matches!(e, PlanEvent::GroupFallback { .. })));
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, PlanEvent::GroupCommitted { .. }))
                .count(),
            2
        );
        assert!(matches!(
            events.last(),
            Some(PlanEvent::Finished { placed: 10, unplaced: 0 })
        ));

        // Maersk first (input order), short boxes on row 1 of M1, five high.
        assert_eq!(result.placement("A0").unwrap().position, "M11A1");
        assert_eq!(result.placement("A4").unwrap().position, "M11A5");
        assert_eq!(result.placement("A5").unwrap().position, "M11B1");
        assert_eq!(result.placement("B0").unwrap().position, "M12A1");
        // 10 records, 9 pairs, only the carrier switch breaks grouping.
        assert!((result.metrics.grouping_efficiency - 8.0 / 9.0 * 100.0).abs() < 1e-9);
        assert_plan_invariants(&containers, &result, &yard);
    }

    #[test]
    fn outbound_heavy_containers_without_permitting_zone() {
        let containers: Vec<_> = (0..3)
            .map(|i| outbound(&format!("H{i}"), "45G1", "Rotterdam", 35.0))
            .collect();
        let config = ZoneConfiguration::new()
            .with_zone("M1", WeightClassSet::range(class(1), class(7)))
            .with_zone("M2", WeightClassSet::range(class(1), class(7)))
            .with_zone("W1", WeightClassSet::range(class(1), class(7)))
            .with_zone("W2", WeightClassSet::range(class(1), class(7)))
            .with_zone("Q1", WeightClassSet::range(class(1), class(7)))
            .with_zone("Q2", WeightClassSet::range(class(1), class(7)));
        let (result, _) = run(
            &AllocationEngine::default(),
            &containers,
            OperationType::Outbound,
            &config,
            3,
        );

        assert_eq!(result.metrics.efficiency, 0.0);
        assert!(result.placements.is_empty());
        assert_eq!(result.unplaced.len(), 3);
        assert!(result
            .unplaced
            .iter()
            .all(|u| u.reason == UnplacedReason::NoPermittedZone && u.weight_class == class(8)));
        assert!(result.metrics.zone_details.is_empty());
    }

    #[test]
    fn outbound_groups_by_port_and_class() {
        let containers = vec![
            outbound("R1", "22G1", "Rotterdam", 24.0),
            outbound("H1", "22G1", "Hamburg", 24.0),
            outbound("R2", "22G1", "Rotterdam", 24.0),
            outbound("R3", "22G1", "Rotterdam", 10.0),
        ];
        let (result, yard) = run(
            &AllocationEngine::default(),
            &containers,
            OperationType::Outbound,
            &ZoneConfiguration::new(),
            5,
        );

        let order: Vec<_> = result.placements.iter().map(|p| p.container_id.as_str()).collect();
        assert_eq!(order, ["R1", "R2", "H1", "R3"]);
        assert_eq!(result.placement("R2").unwrap().position, "M11A2");
        assert_eq!(result.placement("H1").unwrap().position, "M11A3");
        assert_eq!(result.placement("R3").unwrap().weight_class, class(1));
        assert_eq!(result.metrics.message, "Outbound planning completed");
        assert_plan_invariants(&containers, &result, &yard);
    }

    #[test]
    fn outbound_group_drains_into_next_zone() {
        // Leave room for exactly three long boxes in M1.
        let engine = AllocationEngine::default();
        let containers: Vec<_> = (0..8)
            .map(|i| outbound(&format!("X{i}"), "45G1", "Antwerp", 27.0))
            .collect();
        let mut yard = YardModel::canonical();
        let m1 = yard.zone_mut("M1").unwrap();
        let filler = outbound("F", "45G1", "Antwerp", 27.0);
        let long_slots = m1.slots().iter().filter(|s| s.length == ContainerLength::Long).count();
        for _ in 0..(long_slots * 5 - 3) {
            m1.place(&filler, class(5), false).unwrap();
        }

        let mut rng = StdRng::seed_from_u64(0);
        let result = engine
            .plan(&containers, OperationType::Outbound, &ZoneConfiguration::new(), &mut yard, &mut rng)
            .unwrap();
        assert!(result.is_complete());
        let zones: Vec<_> = result.placements.iter().map(|p| p.zone.as_str()).collect();
        assert_eq!(zones, ["M1", "M1", "M1", "M2", "M2", "M2", "M2", "M2"]);
    }

    #[test]
    fn inbound_group_below_threshold_falls_back_without_consuming_slots() {
        // Q1 is the only zone and has 63 long reefer slots, four high.
        let engine = AllocationEngine::default();
        let mut containers = Vec::new();
        for i in 0..4 {
            containers.push(
                ContainerRecord::inbound(&format!("R{i}"), "45R1", "Hapag")
                    .with_category(CargoCategory::Reefer)
                    .into_container(OperationType::Inbound)
                    .unwrap(),
            );
        }
        for i in 0..6 {
            containers.push(
                ContainerRecord::inbound(&format!("S{i}"), "22R1", "Hapag")
                    .with_category(CargoCategory::Reefer)
                    .into_container(OperationType::Inbound)
                    .unwrap(),
            );
        }
        let config = only_zone("Q1", WeightClassSet::all());
        let mut events = Vec::new();
        let mut yard = YardModel::canonical();
        let mut rng = StdRng::seed_from_u64(11);
        let result = engine
            .plan_with_progress(
                &containers,
                OperationType::Inbound,
                &config,
                &mut yard,
                &mut rng,
                |event| events.push(event.clone()),
            )
            .unwrap();

        // Only the four long reefers fit (4/10 < 0.8), so the fallback places them.
        assert!(events.iter().any(|e| matches!(e, PlanEvent::GroupFallback { .. })));
        assert_eq!(result.placed_count(), 4);
        // The rejected trial left no trace: positions start at tier 1 again.
        assert_eq!(result.placement("R0").unwrap().position, "Q12A1");
        assert_eq!(yard.zone("Q1").unwrap().usage(), 4);
        assert_eq!(result.unplaced.len(), 6);
        assert!(result
            .unplaced
            .iter()
            .all(|u| u.reason == UnplacedReason::NoReeferSlot));
        assert_plan_invariants(&containers, &result, &yard);
    }

    #[test]
    fn committed_group_leaves_stragglers_unplaced() {
        // Nine short boxes and one reefer that M1 cannot take; 9/10 reaches 0.8.
        let mut containers: Vec<_> = (0..9)
            .map(|i| inbound(&format!("S{i}"), "22G1", "CMA"))
            .collect();
        containers.push(
            ContainerRecord::inbound("RF", "22R1", "CMA")
                .with_category(CargoCategory::Reefer)
                .into_container(OperationType::Inbound)
                .unwrap(),
        );
        let (result, _) = run(
            &AllocationEngine::default(),
            &containers,
            OperationType::Inbound,
            &ZoneConfiguration::new(),
            2,
        );
        assert_eq!(result.placed_count(), 9);
        assert_eq!(
            result.unplaced,
            vec![UnplacedContainer {
                container_id: "RF".to_string(),
                weight_class: result.unplaced[0].weight_class,
                reason: UnplacedReason::GroupStraggler,
            }]
        );
    }

    #[test]
    fn candidate_zone_must_permit_every_class_of_the_group() {
        let containers = vec![
            ContainerRecord::outbound("L", "22G1", "x", Some(5.0)),
            ContainerRecord::outbound("H", "22G1", "x", Some(45.0)),
        ]
        .into_iter()
        .map(|mut record| {
            record.carrier = Some("ONE".to_string());
            record.into_container(OperationType::Inbound).unwrap()
        })
        .collect::<Vec<_>>();
        let config = ZoneConfiguration::new()
            .with_zone("M1", WeightClassSet::range(class(1), class(4)))
            .with_zone("M2", WeightClassSet::range(class(5), class(8)));
        let (result, _) = run(
            &AllocationEngine::default(),
            &containers,
            OperationType::Inbound,
            &config,
            9,
        );
        // W1 is the first zone with both classes.
        assert!(result.placements.iter().all(|p| p.zone == "W1"));
    }

    #[test]
    fn priority_sequencing_orders_group_members() {
        let containers = vec![
            ContainerRecord::outbound("STD", "22G1", "P", Some(12.0)),
            ContainerRecord::outbound("DG", "22G1", "P", Some(5.0)).with_category(CargoCategory::Dangerous),
            ContainerRecord::outbound("HEAVY", "22G1", "P", Some(18.0)),
        ]
        .into_iter()
        .map(|record| record.into_container(OperationType::Outbound).unwrap())
        .collect::<Vec<_>>();
        let engine = AllocationEngine::new(
            AllocationConfig::builder()
                .sequencing(Sequencing::Priority)
                .build(),
        )
        .unwrap();
        let (result, _) = run(
            &engine,
            &containers,
            OperationType::Outbound,
            &ZoneConfiguration::new(),
            4,
        );
        let order: Vec<_> = result.placements.iter().map(|p| p.container_id.as_str()).collect();
        assert_eq!(order, ["DG", "HEAVY", "STD"]);
    }

    #[test]
    fn prefer_general_slots_keeps_reefer_rows_free() {
        let containers = vec![inbound("G", "45G1", "ONE")];
        let engine = AllocationEngine::new(
            AllocationConfig::builder().prefer_general_slots(true).build(),
        )
        .unwrap();
        let config = only_zone("Q1", WeightClassSet::all());
        let (result, _) = run(&engine, &containers, OperationType::Inbound, &config, 0);
        assert_eq!(result.placement("G").unwrap().position, "Q114A1");

        let (plain, _) = run(
            &AllocationEngine::default(),
            &containers,
            OperationType::Inbound,
            &config,
            0,
        );
        assert_eq!(plain.placement("G").unwrap().position, "Q12A1");
    }

    #[test]
    fn fresh_yards_give_identical_plans() {
        let containers: Vec<_> = (0..40)
            .map(|i| {
                let iso = if i % 3 == 0 { "45G1" } else { "22G1" };
                outbound(&format!("U{i}"), iso, ["A", "B", "C"][i % 3], 10.0 + i as f64)
            })
            .collect();
        let engine = AllocationEngine::default();
        let (first, yard) = run(&engine, &containers, OperationType::Outbound, &ZoneConfiguration::new(), 8);
        let (second, _) = run(&engine, &containers, OperationType::Outbound, &ZoneConfiguration::new(), 8);
        assert_eq!(first.placements, second.placements);
        assert_plan_invariants(&containers, &first, &yard);
    }

    #[test]
    fn missing_weights_are_drawn_from_the_rng() {
        let containers: Vec<_> = (0..30)
            .map(|i| {
                ContainerRecord::outbound(&format!("N{i}"), "22G1", "P", None)
                    .into_container(OperationType::Outbound)
                    .unwrap()
            })
            .collect();
        let engine = AllocationEngine::default();
        let (a, _) = run(&engine, &containers, OperationType::Outbound, &ZoneConfiguration::new(), 21);
        let (b, _) = run(&engine, &containers, OperationType::Outbound, &ZoneConfiguration::new(), 21);
        assert_eq!(a.placements, b.placements);
        let classes: HashSet<_> = a.placements.iter().map(|p| p.weight_class).collect();
        assert!(classes.len() > 1);
    }

    #[test]
    fn empty_batch_finishes_immediately() {
        let mut events = Vec::new();
        let mut yard = YardModel::canonical();
        let mut rng = StdRng::seed_from_u64(0);
        let result = AllocationEngine::default()
            .plan_with_progress(
                &[],
                OperationType::Inbound,
                &ZoneConfiguration::new(),
                &mut yard,
                &mut rng,
                |event| events.push(event.clone()),
            )
            .unwrap();
        assert_eq!(result.metrics.efficiency, 0.0);
        assert_eq!(result.metrics.grouping_efficiency, 0.0);
        assert!(matches!(
            events.as_slice(),
            [PlanEvent::Finished { placed: 0, unplaced: 0 }]
        ));
    }

    #[test]
    fn strict_zones_rejects_unknown_names() {
        let engine = AllocationEngine::new(AllocationConfig::builder().strict_zones(true).build()).unwrap();
        let config = ZoneConfiguration::new().with_zone("Z9", WeightClassSet::all());
        let mut yard = YardModel::canonical();
        let mut rng = StdRng::seed_from_u64(0);
        let err = engine
            .plan(&[], OperationType::Outbound, &config, &mut yard, &mut rng)
            .unwrap_err();
        assert!(matches!(err, PlanningError::UnknownZone(name) if name == "Z9"));
    }

    #[test]
    fn config_validation() {
        assert!(AllocationConfig::default().validate().is_ok());
        assert!(AllocationEngine::new(AllocationConfig::builder().group_completion_threshold(0.0).build()).is_err());
        assert!(AllocationEngine::new(AllocationConfig::builder().group_completion_threshold(1.5).build()).is_err());
        assert!(AllocationEngine::new(AllocationConfig::builder().weight_class_adjacency(8).build()).is_err());
        assert_eq!("priority".parse::<Sequencing>().unwrap(), Sequencing::Priority);
        assert!("random".parse::<Sequencing>().is_err());
    }

    #[test]
    fn reason_codes() {
        assert_eq!(UnplacedReason::NoPermittedZone.code(), "no_permitted_zone");
        assert_eq!(UnplacedReason::NoReeferSlot.code(), "no_reefer_slot");
        assert_eq!(UnplacedReason::NoCompatibleSlot.code(), "no_compatible_slot");
        assert_eq!(UnplacedReason::GroupStraggler.code(), "group_straggler");
    }
}
