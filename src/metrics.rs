//! Result metrics for a single planning run.

use chrono::Local;
use serde::Serialize;
use utoipa::ToSchema;

use crate::model::PlacementRecord;
use crate::types::OperationType;
use crate::yard::YardModel;

/// Placed containers of one zone during one run.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ZoneUsageDetail {
    pub zone: String,
    pub placed: usize,
    pub slots: usize,
    /// Placed containers relative to the zone's slot count, in percent.
    pub utilization: f64,
    pub permitted_classes: Vec<u8>,
}

/// Quality figures of a planning run.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct PlanMetrics {
    pub operation: OperationType,
    pub total_containers: usize,
    pub placed_containers: usize,
    /// Placed share of all containers, in percent.
    pub efficiency: f64,
    /// Placed containers relative to all slots of the yard, in percent.
    pub space_utilization: f64,
    /// Share of neighbouring records that keep their group together, in percent.
    pub grouping_efficiency: f64,
    pub zone_details: Vec<ZoneUsageDetail>,
    pub message: String,
    pub timestamp: String,
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Current local time in the format used by all results.
pub fn timestamp_now() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

impl PlanMetrics {
    /// Computes the metrics from the run's placements in insertion order.
    ///
    /// Zone details list only zones that received containers in this run, in
    /// yard order.
    pub fn compile(
        operation: OperationType,
        total_containers: usize,
        placements: &[PlacementRecord],
        yard: &YardModel,
        weight_class_adjacency: u8,
    ) -> Self {
        let placed = placements.len();

        let zone_details = yard
            .zones()
            .iter()
            .filter_map(|zone| {
                let count = placements.iter().filter(|p| p.zone == zone.name()).count();
                (count > 0).then(|| ZoneUsageDetail {
                    zone: zone.name().to_string(),
                    placed: count,
                    slots: zone.total_slots(),
                    utilization: percent(count, zone.total_slots()),
                    permitted_classes: zone.permitted().into(),
                })
            })
            .collect();

        let message = match operation {
            OperationType::Inbound => "Inbound planning completed",
            OperationType::Outbound => "Outbound planning completed",
        };

        Self {
            operation,
            total_containers,
            placed_containers: placed,
            efficiency: percent(placed, total_containers),
            space_utilization: percent(placed, yard.total_slots()),
            grouping_efficiency: grouping_efficiency(placements, weight_class_adjacency),
            zone_details,
            message: message.to_string(),
            timestamp: timestamp_now(),
        }
    }
}

/// Fraction of adjacent record pairs that stay grouped, in percent.
///
/// Inbound pairs count when zone and carrier match. Outbound pairs count when
/// zone and port match and the weight classes differ by at most
/// `weight_class_adjacency`. The measure follows record order, not physical
/// neighbourhood. Fewer than two records yield 0.
pub fn grouping_efficiency(placements: &[PlacementRecord], weight_class_adjacency: u8) -> f64 {
    if placements.len() < 2 {
        return 0.0;
    }
    let grouped = placements
        .windows(2)
        .filter(|pair| {
            let (a, b) = (&pair[0], &pair[1]);
            if a.zone != b.zone || a.operation != b.operation {
                return false;
            }
            let same_key = a.grouping_key().is_some() && a.grouping_key() == b.grouping_key();
            match a.operation {
                OperationType::Inbound => same_key,
                OperationType::Outbound => {
                    same_key && a.weight_class.distance(b.weight_class) <= weight_class_adjacency
                }
            }
        })
        .count();
    percent(grouped, placements.len() - 1)
}
