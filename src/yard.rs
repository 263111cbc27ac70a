//! Physical yard state: slots, zones and the whole yard model.
//!
//! A [`YardModel`] is built once from a [`YardLayout`] and then only ever
//! gains containers. Slot coordinates, lengths and reefer flags never change
//! after construction; only the remaining-tier counters move, and only down.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

use crate::error::{PlanningError, Result};
use crate::layout::{self, YardLayout, ZoneBlueprint};
use crate::types::{ContainerLength, Stackable, WeightClass, WeightClassSet};

/// One ground position inside a zone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Slot {
    pub row: u8,
    pub column: char,
    pub length: ContainerLength,
    pub max_tiers: u8,
    remaining: u8,
    pub reefer: bool,
}

impl Slot {
    fn new(row: u8, column: char, length: ContainerLength, max_tiers: u8, reefer: bool) -> Self {
        Self {
            row,
            column,
            length,
            max_tiers,
            remaining: max_tiers,
            reefer,
        }
    }

    /// Free tiers left on this slot.
    #[inline]
    pub fn remaining(&self) -> u8 {
        self.remaining
    }

    /// Containers currently stacked here.
    #[inline]
    pub fn occupied(&self) -> u8 {
        self.max_tiers - self.remaining
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.remaining == 0
    }

    /// Length, free tier and reefer checks; the zone checks the weight class.
    fn accepts(&self, container: &impl Stackable) -> bool {
        self.length == container.length()
            && !self.is_full()
            && (self.reefer || !container.category().is_reefer())
    }

    /// Pushes one container and returns its tier (first container = 1).
    fn stack(&mut self) -> u8 {
        self.remaining -= 1;
        self.occupied()
    }
}

/// Where a container ended up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotPosition {
    pub zone: String,
    pub row: u8,
    pub column: char,
    pub tier: u8,
}

impl SlotPosition {
    /// Position code such as `M13A2`.
    pub fn code(&self) -> String {
        layout::position_code(&self.zone, self.row, self.column, self.tier)
    }
}

/// A named block of slots with a set of permitted weight classes.
#[derive(Clone, Debug)]
pub struct Zone {
    name: String,
    slots: Vec<Slot>,
    permitted: WeightClassSet,
    default_permitted: WeightClassSet,
    max_tiers: u8,
}

impl Zone {
    /// Generates the full slot inventory described by `blueprint`.
    pub fn from_blueprint(blueprint: &ZoneBlueprint) -> Self {
        let slots = layout::slot_coordinates()
            .map(|(row, column, length)| {
                Slot::new(
                    row,
                    column,
                    length,
                    blueprint.max_tiers,
                    blueprint.reefer_rows.contains(row),
                )
            })
            .collect();
        Self {
            name: blueprint.name.clone(),
            slots,
            permitted: blueprint.permitted,
            default_permitted: blueprint.permitted,
            max_tiers: blueprint.max_tiers,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn permitted(&self) -> WeightClassSet {
        self.permitted
    }

    pub fn set_permitted(&mut self, permitted: WeightClassSet) {
        self.permitted = permitted;
    }

    pub fn max_tiers(&self) -> u8 {
        self.max_tiers
    }

    #[inline]
    pub fn permits(&self, class: WeightClass) -> bool {
        self.permitted.contains(class)
    }

    pub fn total_slots(&self) -> usize {
        self.slots.len()
    }

    /// Number of containers stacked in this zone.
    pub fn usage(&self) -> usize {
        self.slots.iter().map(|slot| slot.occupied() as usize).sum()
    }

    pub fn reefer_slot_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.reefer).count()
    }

    /// Whether any reefer slot of the given length still has a free tier.
    pub fn has_free_reefer_slot(&self, length: ContainerLength) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.reefer && slot.length == length && !slot.is_full())
    }

    /// Index of the first slot in construction order that can take the container.
    ///
    /// With `prefer_general` set, non-reefer cargo only falls back to reefer
    /// slots when no general slot is left in this zone.
    pub fn find_candidate(
        &self,
        container: &impl Stackable,
        class: WeightClass,
        prefer_general: bool,
    ) -> Option<usize> {
        if !self.permits(class) {
            return None;
        }
        let mut fits = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.accepts(container));

        if prefer_general && !container.category().is_reefer() {
            let mut reefer_fallback = None;
            for (idx, slot) in fits {
                if !slot.reefer {
                    return Some(idx);
                }
                reefer_fallback.get_or_insert(idx);
            }
            return reefer_fallback;
        }

        fits.next().map(|(idx, _)| idx)
    }

    /// Stacks the container on the first candidate slot.
    ///
    /// `None` means the zone has no room for it; that is a normal outcome.
    pub fn place(
        &mut self,
        container: &impl Stackable,
        class: WeightClass,
        prefer_general: bool,
    ) -> Option<SlotPosition> {
        let idx = self.find_candidate(container, class, prefer_general)?;
        let slot = &mut self.slots[idx];
        let tier = slot.stack();
        Some(SlotPosition {
            zone: self.name.clone(),
            row: slot.row,
            column: slot.column,
            tier,
        })
    }
}

/// Permitted weight classes per zone name, applied before a run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneConfiguration {
    zones: BTreeMap<String, WeightClassSet>,
}

impl ZoneConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_zone(mut self, name: impl Into<String>, permitted: WeightClassSet) -> Self {
        self.set(name, permitted);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, permitted: WeightClassSet) {
        self.zones.insert(name.into(), permitted);
    }

    pub fn get(&self, name: &str) -> Option<WeightClassSet> {
        self.zones.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, WeightClassSet)> + '_ {
        self.zones.iter().map(|(name, set)| (name.as_str(), *set))
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

/// Summary of one zone for clients.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ZoneDescription {
    pub name: String,
    pub slots: usize,
    pub max_tiers: u8,
    pub reefer_slots: usize,
    #[schema(value_type = Vec<u8>)]
    pub permitted_classes: WeightClassSet,
    pub used: usize,
}

/// The whole yard: an ordered list of zones.
#[derive(Clone, Debug)]
pub struct YardModel {
    zones: Vec<Zone>,
}

impl YardModel {
    pub fn from_layout(layout: &YardLayout) -> Self {
        Self {
            zones: layout.zones().iter().map(Zone::from_blueprint).collect(),
        }
    }

    /// The canonical six-zone yard.
    pub fn canonical() -> Self {
        Self::from_layout(&YardLayout::canonical())
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn zones_mut(&mut self) -> &mut [Zone] {
        &mut self.zones
    }

    pub fn zone(&self, name: &str) -> Option<&Zone> {
        self.zones.iter().find(|zone| zone.name == name)
    }

    pub fn zone_mut(&mut self, name: &str) -> Option<&mut Zone> {
        self.zones.iter_mut().find(|zone| zone.name == name)
    }

    /// Sets each zone's permitted classes from `config`.
    ///
    /// Zones the configuration does not mention fall back to their layout
    /// default. Names that match no zone are logged and skipped, or rejected
    /// when `strict` is set; in that case the yard is left unchanged.
    pub fn apply_configuration(&mut self, config: &ZoneConfiguration, strict: bool) -> Result<()> {
        for (name, _) in config.iter() {
            if self.zone(name).is_none() {
                if strict {
                    return Err(PlanningError::UnknownZone(name.to_string()));
                }
                warn!(zone = name, "ignoring configuration for unknown zone");
            }
        }
        for zone in &mut self.zones {
            let permitted = config.get(&zone.name).unwrap_or(zone.default_permitted);
            zone.set_permitted(permitted);
        }
        Ok(())
    }

    pub fn total_slots(&self) -> usize {
        self.zones.iter().map(Zone::total_slots).sum()
    }

    pub fn total_usage(&self) -> usize {
        self.zones.iter().map(Zone::usage).sum()
    }

    pub fn describe(&self) -> Vec<ZoneDescription> {
        self.zones
            .iter()
            .map(|zone| ZoneDescription {
                name: zone.name.clone(),
                slots: zone.total_slots(),
                max_tiers: zone.max_tiers,
                reefer_slots: zone.reefer_slot_count(),
                permitted_classes: zone.permitted,
                used: zone.usage(),
            })
            .collect()
    }
}

impl Default for YardModel {
    fn default() -> Self {
        Self::canonical()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CargoCategory;

    struct Unit(ContainerLength, CargoCategory);

    impl Stackable for Unit {
        fn length(&self) -> ContainerLength {
            self.0
        }

        fn category(&self) -> CargoCategory {
            self.1
        }
    }

    fn class(value: u8) -> WeightClass {
        WeightClass::new(value).unwrap()
    }

    #[test]
    fn canonical_yard_has_six_full_zones() {
        let yard = YardModel::canonical();
        assert_eq!(yard.zones().len(), 6);
        assert!(yard.zones().iter().all(|zone| zone.total_slots() == 504));
        assert_eq!(yard.total_slots(), 6 * 504);
        assert_eq!(yard.total_usage(), 0);
    }

    #[test]
    fn reefer_rows_follow_layout() {
        let yard = YardModel::canonical();
        assert_eq!(yard.zone("M2").unwrap().reefer_slot_count(), 504);
        assert_eq!(yard.zone("M1").unwrap().reefer_slot_count(), 0);
        assert_eq!(yard.zone("Q1").unwrap().reefer_slot_count(), 3 * 21);
        // Row 12 is a walkway, so Q2 has the same three reefer rows.
        assert_eq!(yard.zone("Q2").unwrap().reefer_slot_count(), 3 * 21);
    }

    #[test]
    fn short_container_lands_on_first_odd_row() {
        let mut yard = YardModel::canonical();
        let zone = yard.zone_mut("M1").unwrap();
        let unit = Unit(ContainerLength::Short, CargoCategory::Standard);
        let pos = zone.place(&unit, class(3), false).unwrap();
        assert_eq!(pos.code(), "M11A1");
        let pos = zone.place(&unit, class(3), false).unwrap();
        assert_eq!(pos.code(), "M11A2");
    }

    #[test]
    fn long_container_lands_on_even_row() {
        let mut zone = YardModel::canonical().zone("W1").unwrap().clone();
        let unit = Unit(ContainerLength::Long, CargoCategory::Standard);
        let pos = zone.place(&unit, class(5), false).unwrap();
        assert_eq!((pos.row, pos.column, pos.tier), (2, 'A', 1));
    }

    #[test]
    fn tiers_fill_up_then_move_to_next_column() {
        let mut zone = YardModel::canonical().zone("W1").unwrap().clone();
        let unit = Unit(ContainerLength::Short, CargoCategory::Standard);
        let tiers: Vec<_> = (0..5)
            .map(|_| zone.place(&unit, class(1), false).unwrap())
            .collect();
        assert_eq!(
            tiers.iter().map(|p| p.tier).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 1]
        );
        assert_eq!(tiers[4].column, 'B');
        assert_eq!(zone.usage(), 5);
    }

    #[test]
    fn reefer_cargo_needs_reefer_slot() {
        let mut yard = YardModel::canonical();
        let reefer = Unit(ContainerLength::Long, CargoCategory::Reefer);
        assert!(yard.zone_mut("M1").unwrap().place(&reefer, class(2), false).is_none());

        let pos = yard.zone_mut("Q1").unwrap().place(&reefer, class(2), false).unwrap();
        assert_eq!(pos.row, 2);

        // Q1 has no short reefer rows.
        let short_reefer = Unit(ContainerLength::Short, CargoCategory::Reefer);
        assert!(yard.zone_mut("Q1").unwrap().place(&short_reefer, class(2), false).is_none());
        assert!(!yard.zone("Q1").unwrap().has_free_reefer_slot(ContainerLength::Short));
    }

    #[test]
    fn prefer_general_skips_reefer_slots() {
        let yard = YardModel::canonical();
        let q1 = yard.zone("Q1").unwrap();
        let unit = Unit(ContainerLength::Long, CargoCategory::Standard);

        let first = q1.find_candidate(&unit, class(4), false).unwrap();
        assert!(q1.slots()[first].reefer);

        let preferred = q1.find_candidate(&unit, class(4), true).unwrap();
        assert!(!q1.slots()[preferred].reefer);
        assert_eq!(q1.slots()[preferred].row, 14);

        // M2 has nothing but reefer slots, so the fallback is used.
        let m2 = yard.zone("M2").unwrap();
        assert_eq!(m2.find_candidate(&unit, class(4), true), Some(21));
    }

    #[test]
    fn unpermitted_class_is_rejected() {
        let mut yard = YardModel::canonical();
        let zone = yard.zone_mut("M1").unwrap();
        zone.set_permitted(WeightClassSet::range(class(1), class(3)));
        let unit = Unit(ContainerLength::Short, CargoCategory::Standard);
        assert!(zone.place(&unit, class(4), false).is_none());
        assert!(zone.place(&unit, class(3), false).is_some());
    }

    #[test]
    fn configuration_resets_unlisted_zones_to_default() {
        let mut yard = YardModel::canonical();
        let light = WeightClassSet::range(class(1), class(2));
        let config = ZoneConfiguration::new().with_zone("M1", light);
        yard.apply_configuration(&config, false).unwrap();
        assert_eq!(yard.zone("M1").unwrap().permitted(), light);
        assert_eq!(yard.zone("W1").unwrap().permitted(), WeightClassSet::all());

        yard.apply_configuration(&ZoneConfiguration::new(), false).unwrap();
        assert_eq!(yard.zone("M1").unwrap().permitted(), WeightClassSet::all());
    }

    #[test]
    fn unknown_zone_in_configuration() {
        let mut yard = YardModel::canonical();
        let config = ZoneConfiguration::new()
            .with_zone("X9", WeightClassSet::empty())
            .with_zone("M1", WeightClassSet::empty());

        assert!(matches!(
            yard.apply_configuration(&config, true),
            Err(PlanningError::UnknownZone(name)) if name == "X9"
        ));
        assert_eq!(yard.zone("M1").unwrap().permitted(), WeightClassSet::all());

        yard.apply_configuration(&config, false).unwrap();
        assert!(yard.zone("M1").unwrap().permitted().is_empty());
    }

    #[test]
    fn zone_configuration_deserializes_from_map() {
        let config: ZoneConfiguration =
            serde_json::from_str(r#"{"M1": [1, 2], "W2": [8]}"#).unwrap();
        assert_eq!(Vec::<u8>::from(config.get("M1").unwrap()), vec![1, 2]);
        assert!(config.get("Q1").is_none());
        assert!(serde_json::from_str::<ZoneConfiguration>(r#"{"M1": [9]}"#).is_err());
    }

    #[test]
    fn describe_reports_capacity_and_usage() {
        let mut yard = YardModel::canonical();
        let unit = Unit(ContainerLength::Long, CargoCategory::Standard);
        yard.zone_mut("M2").unwrap().place(&unit, class(8), false).unwrap();
        let description = yard.describe();
        let m2 = description.iter().find(|d| d.name == "M2").unwrap();
        assert_eq!(m2.slots, 504);
        assert_eq!(m2.max_tiers, 5);
        assert_eq!(m2.reefer_slots, 504);
        assert_eq!(m2.used, 1);
    }
}
