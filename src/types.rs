//! Common value types for the yard planning domain.
//!
//! Weight classes, container lengths, cargo categories and the operation type
//! are shared by the model, the yard and the allocation engine.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Number of ordinal weight bands.
pub const WEIGHT_CLASS_COUNT: u8 = 8;

/// Error for a weight class outside of `1..=8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("weight class must be between 1 and 8, got {0}")]
pub struct InvalidWeightClass(pub u8);

/// One of the eight ordinal weight bands (1 = lightest, 8 = heaviest).
///
/// # Examples
/// ```
/// use yard_planner::types::WeightClass;
///
/// let class = WeightClass::new(3).unwrap();
/// assert_eq!(class.get(), 3);
/// assert!(WeightClass::new(9).is_none());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct WeightClass(u8);

impl WeightClass {
    pub const LIGHTEST: Self = Self(1);
    pub const HEAVIEST: Self = Self(WEIGHT_CLASS_COUNT);

    /// Creates a weight class, returning `None` outside of `1..=8`.
    #[inline]
    pub fn new(value: u8) -> Option<Self> {
        (1..=WEIGHT_CLASS_COUNT)
            .contains(&value)
            .then_some(Self(value))
    }

    /// Returns the band number.
    #[inline]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Iterates all eight classes in ascending order.
    pub fn all() -> impl Iterator<Item = Self> {
        (1..=WEIGHT_CLASS_COUNT).map(Self)
    }

    /// Absolute band distance between two classes.
    #[inline]
    pub fn distance(self, other: Self) -> u8 {
        self.0.abs_diff(other.0)
    }

    #[inline]
    const fn bit(self) -> u8 {
        1 << (self.0 - 1)
    }
}

impl TryFrom<u8> for WeightClass {
    type Error = InvalidWeightClass;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidWeightClass(value))
    }
}

impl From<WeightClass> for u8 {
    fn from(class: WeightClass) -> Self {
        class.0
    }
}

impl fmt::Display for WeightClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Set of permitted weight classes, stored as a bit mask.
///
/// Serialises as an ascending list of band numbers, e.g. `[3, 4, 5]`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct WeightClassSet {
    bits: u8,
}

impl WeightClassSet {
    /// Creates an empty set.
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    /// Creates the set of all eight classes.
    pub const fn all() -> Self {
        Self { bits: u8::MAX }
    }

    /// Creates the set of classes `from..=to`.
    pub fn range(from: WeightClass, to: WeightClass) -> Self {
        WeightClass::all()
            .filter(|class| *class >= from && *class <= to)
            .collect()
    }

    #[inline]
    pub fn contains(&self, class: WeightClass) -> bool {
        self.bits & class.bit() != 0
    }

    #[inline]
    pub fn insert(&mut self, class: WeightClass) {
        self.bits |= class.bit();
    }

    /// Checks whether every class yielded by `classes` is a member.
    pub fn contains_all(&self, classes: impl IntoIterator<Item = WeightClass>) -> bool {
        classes.into_iter().all(|class| self.contains(class))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Iterates the members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = WeightClass> + '_ {
        WeightClass::all().filter(|class| self.contains(*class))
    }
}

impl FromIterator<WeightClass> for WeightClassSet {
    fn from_iter<I: IntoIterator<Item = WeightClass>>(iter: I) -> Self {
        let mut set = Self::empty();
        for class in iter {
            set.insert(class);
        }
        set
    }
}

impl TryFrom<Vec<u8>> for WeightClassSet {
    type Error = InvalidWeightClass;

    fn try_from(values: Vec<u8>) -> Result<Self, Self::Error> {
        values
            .into_iter()
            .map(WeightClass::try_from)
            .collect::<Result<Self, _>>()
    }
}

impl From<WeightClassSet> for Vec<u8> {
    fn from(set: WeightClassSet) -> Self {
        set.iter().map(WeightClass::get).collect()
    }
}

impl fmt::Debug for WeightClassSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(WeightClass::get)).finish()
    }
}

/// Physical length of a container or of the slot that hosts it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContainerLength {
    /// 20' container, 6 m slot.
    Short,
    /// 40' / 45' container, 12 m slot.
    Long,
}

/// Outcome of classifying an ISO type code by length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LengthClass {
    Short,
    Long,
    /// The code matched neither pattern; the caller has to decide.
    Unclassified,
}

impl LengthClass {
    /// Classifies an ISO type code.
    ///
    /// Codes containing `45` are long; otherwise codes containing `22` or `20`
    /// are short. Everything else is unclassified.
    ///
    /// # Examples
    /// ```
    /// use yard_planner::types::LengthClass;
    ///
    /// assert_eq!(LengthClass::from_iso_code("45G1"), LengthClass::Long);
    /// assert_eq!(LengthClass::from_iso_code("22G1"), LengthClass::Short);
    /// assert_eq!(LengthClass::from_iso_code("L5G1"), LengthClass::Unclassified);
    /// ```
    pub fn from_iso_code(code: &str) -> Self {
        if code.contains("45") {
            LengthClass::Long
        } else if code.contains("22") || code.contains("20") {
            LengthClass::Short
        } else {
            LengthClass::Unclassified
        }
    }

    pub fn resolved(self) -> Option<ContainerLength> {
        match self {
            LengthClass::Short => Some(ContainerLength::Short),
            LengthClass::Long => Some(ContainerLength::Long),
            LengthClass::Unclassified => None,
        }
    }
}

/// Cargo category of a container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum CargoCategory {
    #[default]
    Standard,
    Reefer,
    Dangerous,
    #[serde(rename = "Out-of-Gauge", alias = "OutOfGauge")]
    OutOfGauge,
}

impl CargoCategory {
    /// Handling priority; lower numbers are handled first.
    pub const fn priority(self) -> u8 {
        match self {
            CargoCategory::Dangerous | CargoCategory::OutOfGauge => 1,
            CargoCategory::Reefer => 2,
            CargoCategory::Standard => 3,
        }
    }

    #[inline]
    pub const fn is_reefer(self) -> bool {
        matches!(self, CargoCategory::Reefer)
    }
}

impl fmt::Display for CargoCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CargoCategory::Standard => "Standard",
            CargoCategory::Reefer => "Reefer",
            CargoCategory::Dangerous => "Dangerous",
            CargoCategory::OutOfGauge => "Out-of-Gauge",
        };
        f.write_str(label)
    }
}

/// Direction of a planning run; decides the grouping strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    /// Discharged containers, grouped by carrier.
    #[serde(alias = "import")]
    Inbound,
    /// Containers to be loaded, grouped by destination port and weight class.
    #[serde(alias = "export")]
    Outbound,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationType::Inbound => f.write_str("Inbound"),
            OperationType::Outbound => f.write_str("Outbound"),
        }
    }
}

/// Anything that can occupy a yard slot.
pub trait Stackable {
    /// Physical length the hosting slot must match.
    fn length(&self) -> ContainerLength;

    /// Cargo category, used for reefer zoning.
    fn category(&self) -> CargoCategory;
}
