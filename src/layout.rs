//! Yard geometry rules and the declarative zone topology.
//!
//! Every zone shares the same grid: rows `1..=31`, columns `A..=U`. Rows that
//! are multiples of four are walkways. Each remaining even row holds long
//! containers and each odd row holds short ones. What differs between zones
//! (stack height, reefer rows, default weight classes) is described by a
//! [`ZoneBlueprint`]. A [`YardLayout`] is an ordered list of blueprints.

use std::collections::HashSet;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{PlanningError, Result};
use crate::types::{ContainerLength, WeightClass, WeightClassSet};

/// Number of grid rows per zone.
pub const ROW_COUNT: u8 = 31;

/// Number of grid columns per zone (`A` to `U`).
pub const COLUMN_COUNT: u8 = 21;

/// Every n-th row is a walkway without slots.
pub const WALKWAY_INTERVAL: u8 = 4;

/// Checks whether a row is a walkway.
#[inline]
pub fn is_walkway(row: u8) -> bool {
    row % WALKWAY_INTERVAL == 0
}

/// Determines the slot length of a row.
///
/// # Returns
/// `None` for walkway rows, `Long` for other even rows, `Short` for odd rows
///
/// # Examples
/// ```
/// use yard_planner::layout::slot_length_for_row;
/// use yard_planner::types::ContainerLength;
///
/// assert_eq!(slot_length_for_row(1), Some(ContainerLength::Short));
/// assert_eq!(slot_length_for_row(2), Some(ContainerLength::Long));
/// assert_eq!(slot_length_for_row(4), None);
/// ```
pub fn slot_length_for_row(row: u8) -> Option<ContainerLength> {
    if is_walkway(row) {
        None
    } else if row % 2 == 0 {
        Some(ContainerLength::Long)
    } else {
        Some(ContainerLength::Short)
    }
}

/// Column letters in ascending order.
pub fn columns() -> impl Iterator<Item = char> {
    (0..COLUMN_COUNT).map(|offset| char::from(b'A' + offset))
}

/// Every slot coordinate of a zone in construction order (row, then column).
pub fn slot_coordinates() -> impl Iterator<Item = (u8, char, ContainerLength)> {
    (1..=ROW_COUNT).flat_map(|row| {
        slot_length_for_row(row)
            .into_iter()
            .flat_map(move |length| columns().map(move |column| (row, column, length)))
    })
}

/// Formats a position code: zone, row, column, tier (e.g. `M13A2`).
pub fn position_code(zone: &str, row: u8, column: char, tier: u8) -> String {
    format!("{zone}{row}{column}{tier}")
}

/// Which rows of a zone are wired for refrigerated containers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReeferRows {
    None,
    All,
    Rows(Vec<u8>),
}

impl ReeferRows {
    pub fn contains(&self, row: u8) -> bool {
        match self {
            ReeferRows::None => false,
            ReeferRows::All => true,
            ReeferRows::Rows(rows) => rows.contains(&row),
        }
    }
}

/// Template for one zone of the yard.
#[derive(Clone, Debug)]
pub struct ZoneBlueprint {
    pub name: String,
    pub permitted: WeightClassSet,
    pub max_tiers: u8,
    pub reefer_rows: ReeferRows,
}

impl ZoneBlueprint {
    pub const DEFAULT_MAX_TIERS: u8 = 4;

    /// Creates a zone template after validating name and stack height.
    pub fn new(
        name: impl Into<String>,
        permitted: WeightClassSet,
        max_tiers: u8,
        reefer_rows: ReeferRows,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(PlanningError::InvalidLayout(
                "zone name must not be empty".to_string(),
            ));
        }
        if max_tiers == 0 {
            return Err(PlanningError::InvalidLayout(format!(
                "zone {name} must allow at least one tier"
            )));
        }
        Ok(Self {
            name,
            permitted,
            max_tiers,
            reefer_rows,
        })
    }

    fn general(name: &str, permitted: WeightClassSet, max_tiers: u8) -> Self {
        Self {
            name: name.to_string(),
            permitted,
            max_tiers,
            reefer_rows: ReeferRows::None,
        }
    }

    fn with_reefer_rows(mut self, reefer_rows: ReeferRows) -> Self {
        self.reefer_rows = reefer_rows;
        self
    }
}

/// Built-in yard topologies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LayoutKind {
    /// Six zones, all eight weight classes permitted everywhere.
    #[default]
    Canonical,
    /// Canonical zones with W1/W2 limited to classes 3..=8.
    WeightRestricted,
}

impl LayoutKind {
    pub fn name(self) -> &'static str {
        match self {
            LayoutKind::Canonical => "canonical",
            LayoutKind::WeightRestricted => "weight_restricted",
        }
    }
}

impl FromStr for LayoutKind {
    type Err = PlanningError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "canonical" => Ok(LayoutKind::Canonical),
            "weight_restricted" | "weight-restricted" => Ok(LayoutKind::WeightRestricted),
            other => Err(PlanningError::InvalidLayout(format!(
                "unknown layout '{other}'"
            ))),
        }
    }
}

/// Ordered set of zone blueprints describing a whole yard.
#[derive(Clone, Debug)]
pub struct YardLayout {
    zones: Vec<ZoneBlueprint>,
}

impl YardLayout {
    /// Builds a layout from blueprints; zone names must be unique.
    pub fn new(zones: Vec<ZoneBlueprint>) -> Result<Self> {
        if zones.is_empty() {
            return Err(PlanningError::InvalidLayout(
                "a yard needs at least one zone".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for zone in &zones {
            if !seen.insert(zone.name.as_str()) {
                return Err(PlanningError::InvalidLayout(format!(
                    "duplicate zone name {}",
                    zone.name
                )));
            }
        }
        Ok(Self { zones })
    }

    /// The six standard zones.
    ///
    /// M1 and M2 stack five high and M2 is reefer-capable throughout.
    /// W1 and W2 stack four high. Q1 and Q2 stack four high and have reefer
    /// plugs on selected rows.
    pub fn canonical() -> Self {
        let all = WeightClassSet::all();
        Self {
            zones: vec![
                ZoneBlueprint::general("M1", all, 5),
                ZoneBlueprint::general("M2", all, 5).with_reefer_rows(ReeferRows::All),
                ZoneBlueprint::general("W1", all, ZoneBlueprint::DEFAULT_MAX_TIERS),
                ZoneBlueprint::general("W2", all, ZoneBlueprint::DEFAULT_MAX_TIERS),
                ZoneBlueprint::general("Q1", all, ZoneBlueprint::DEFAULT_MAX_TIERS)
                    .with_reefer_rows(ReeferRows::Rows(vec![2, 6, 10])),
                ZoneBlueprint::general("Q2", all, ZoneBlueprint::DEFAULT_MAX_TIERS)
                    .with_reefer_rows(ReeferRows::Rows(vec![2, 6, 10, 12])),
            ],
        }
    }

    /// Canonical zones with the weight zones W1/W2 closed to the two lightest classes.
    pub fn weight_restricted() -> Self {
        let heavy = WeightClassSet::range(
            WeightClass::new(3).unwrap_or(WeightClass::LIGHTEST),
            WeightClass::HEAVIEST,
        );
        let mut layout = Self::canonical();
        for zone in &mut layout.zones {
            if zone.name.starts_with('W') {
                zone.permitted = heavy;
            }
        }
        layout
    }

    pub fn from_kind(kind: LayoutKind) -> Self {
        match kind {
            LayoutKind::Canonical => Self::canonical(),
            LayoutKind::WeightRestricted => Self::weight_restricted(),
        }
    }

    pub fn zones(&self) -> &[ZoneBlueprint] {
        &self.zones
    }

    pub fn zone(&self, name: &str) -> Option<&ZoneBlueprint> {
        self.zones.iter().find(|zone| zone.name == name)
    }
}

/// One zone of a layout file.
///
/// ```json
/// { "name": "R1", "permitted": [1, 2, 3], "max_tiers": 3, "reefer_rows": [2, 6] }
/// ```
#[derive(Clone, Debug, Deserialize)]
pub struct ZoneDefinition {
    pub name: String,
    #[serde(default = "WeightClassSet::all")]
    pub permitted: WeightClassSet,
    #[serde(default)]
    pub max_tiers: Option<u8>,
    /// Rows with reefer plugs; ignored when `all_reefer` is set.
    #[serde(default)]
    pub reefer_rows: Vec<u8>,
    #[serde(default)]
    pub all_reefer: bool,
}

impl TryFrom<ZoneDefinition> for ZoneBlueprint {
    type Error = PlanningError;

    fn try_from(definition: ZoneDefinition) -> Result<Self> {
        let reefer_rows = if definition.all_reefer {
            ReeferRows::All
        } else if definition.reefer_rows.is_empty() {
            ReeferRows::None
        } else {
            if let Some(row) = definition
                .reefer_rows
                .iter()
                .copied()
                .find(|&row| slot_length_for_row(row).is_none() || row > ROW_COUNT)
            {
                return Err(PlanningError::InvalidLayout(format!(
                    "zone {} lists reefer row {row}, which holds no slots",
                    definition.name
                )));
            }
            ReeferRows::Rows(definition.reefer_rows)
        };
        ZoneBlueprint::new(
            definition.name,
            definition.permitted,
            definition.max_tiers.unwrap_or(ZoneBlueprint::DEFAULT_MAX_TIERS),
            reefer_rows,
        )
    }
}

impl YardLayout {
    /// Parses a JSON array of [`ZoneDefinition`]s.
    pub fn from_json(raw: &str) -> Result<Self> {
        let definitions: Vec<ZoneDefinition> = serde_json::from_str(raw)
            .map_err(|err| PlanningError::InvalidLayout(err.to_string()))?;
        let zones = definitions
            .into_iter()
            .map(ZoneBlueprint::try_from)
            .collect::<Result<Vec<_>>>()?;
        Self::new(zones)
    }
}

impl Default for YardLayout {
    fn default() -> Self {
        Self::canonical()
    }
}
