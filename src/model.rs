//! Data models for yard planning.
//!
//! This module defines the records exchanged with the outside world and the
//! validated container the engine works on:
//! - `ContainerRecord`: raw input as supplied by the caller
//! - `Container`: validated, immutable unit to be stacked
//! - `PlacementRecord`: one successful placement, the primary output

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::error::{PlanningError, Result};
use crate::types::{
    CargoCategory, ContainerLength, LengthClass, OperationType, Stackable, WeightClass,
};
use crate::yard::SlotPosition;

/// Validation error for container records.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("record {unit}: missing required field '{field}'")]
    MissingField { unit: String, field: &'static str },

    #[error("record {unit}: ISO type '{iso_type}' has no known length, supply 'length'")]
    UnclassifiedLength { unit: String, iso_type: String },

    #[error("record {unit}: weight must be a non-negative finite number, got {weight}")]
    InvalidWeight { unit: String, weight: f64 },

    #[error("unit {0} appears more than once")]
    DuplicateUnit(String),
}

/// Trims a text field and rejects it when empty.
fn require_text(
    value: Option<String>,
    unit: &str,
    field: &'static str,
) -> std::result::Result<String, ValidationError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ValidationError::MissingField {
            unit: unit.to_string(),
            field,
        }),
    }
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Container row as delivered by the caller.
///
/// Inbound rows need `unit_id`, `iso_type` and `carrier`. Outbound rows need
/// `unit_id`, `iso_type` and `port`; `weight` is optional.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "unit_id": "MSCU1234567",
    "iso_type": "45G1",
    "carrier": "Maersk",
    "category": "Standard"
}))]
pub struct ContainerRecord {
    #[serde(default, alias = "unit_number")]
    pub unit_id: Option<String>,
    #[serde(default)]
    pub iso_type: Option<String>,
    #[serde(default, alias = "transporter")]
    pub carrier: Option<String>,
    #[serde(default)]
    pub port: Option<String>,
    /// Gross weight in tons.
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub category: Option<CargoCategory>,
    /// Explicit length for ISO codes that cannot be classified.
    #[serde(default)]
    pub length: Option<ContainerLength>,
}

impl ContainerRecord {
    /// Creates an inbound row.
    pub fn inbound(unit_id: &str, iso_type: &str, carrier: &str) -> Self {
        Self {
            unit_id: Some(unit_id.to_string()),
            iso_type: Some(iso_type.to_string()),
            carrier: Some(carrier.to_string()),
            ..Self::default()
        }
    }

    /// Creates an outbound row.
    pub fn outbound(unit_id: &str, iso_type: &str, port: &str, weight: Option<f64>) -> Self {
        Self {
            unit_id: Some(unit_id.to_string()),
            iso_type: Some(iso_type.to_string()),
            port: Some(port.to_string()),
            weight,
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: CargoCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_length(mut self, length: ContainerLength) -> Self {
        self.length = Some(length);
        self
    }

    /// Validates the row for the given operation.
    pub fn into_container(
        self,
        operation: OperationType,
    ) -> std::result::Result<Container, ValidationError> {
        let unit = self
            .unit_id
            .as_deref()
            .map(str::trim)
            .unwrap_or("<unnamed>")
            .to_string();

        let id = require_text(self.unit_id, &unit, "unit_id")?;
        let iso_type = require_text(self.iso_type, &unit, "iso_type")?;

        let (carrier, port) = match operation {
            OperationType::Inbound => (
                Some(require_text(self.carrier, &unit, "carrier")?),
                optional_text(self.port),
            ),
            OperationType::Outbound => (
                optional_text(self.carrier),
                Some(require_text(self.port, &unit, "port")?),
            ),
        };

        if let Some(weight) = self.weight {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ValidationError::InvalidWeight { unit, weight });
            }
        }

        let length = match self.length {
            Some(length) => length,
            None => LengthClass::from_iso_code(&iso_type).resolved().ok_or_else(|| {
                ValidationError::UnclassifiedLength {
                    unit: unit.clone(),
                    iso_type: iso_type.clone(),
                }
            })?,
        };

        Ok(Container {
            id,
            iso_type,
            length,
            carrier,
            port,
            weight: self.weight,
            category: self.category.unwrap_or_default(),
        })
    }
}

/// Validates a batch of rows and rejects duplicate unit ids.
pub fn validate_records(
    records: Vec<ContainerRecord>,
    operation: OperationType,
) -> std::result::Result<Vec<Container>, ValidationError> {
    let mut seen = HashSet::new();
    let mut containers = Vec::with_capacity(records.len());
    for record in records {
        let container = record.into_container(operation)?;
        if !seen.insert(container.id.clone()) {
            return Err(ValidationError::DuplicateUnit(container.id));
        }
        containers.push(container);
    }
    Ok(containers)
}

impl OperationType {
    /// Infers the operation from the fields present in the rows.
    ///
    /// All rows with a port and no carrier mean outbound, all rows with a carrier
    /// mean inbound.
    pub fn detect(records: &[ContainerRecord]) -> Result<Self> {
        let has = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());

        if records.is_empty() {
            return Err(PlanningError::UnknownOperation(
                "no container records supplied".to_string(),
            ));
        }
        if records.iter().all(|r| has(&r.port) && !has(&r.carrier)) {
            return Ok(OperationType::Outbound);
        }
        if records.iter().all(|r| has(&r.carrier)) {
            return Ok(OperationType::Inbound);
        }
        Err(PlanningError::UnknownOperation(
            "records must all carry a carrier (inbound) or a port (outbound)".to_string(),
        ))
    }
}

/// A validated container.
///
/// # Fields
/// * `id` - Unique unit number
/// * `length` - Resolved physical length
/// * `carrier` - Carrier name (inbound grouping key)
/// * `port` - Destination port (outbound grouping key)
/// * `weight` - Gross weight in tons, if known
#[derive(Clone, Debug, PartialEq)]
pub struct Container {
    pub id: String,
    pub iso_type: String,
    pub length: ContainerLength,
    pub carrier: Option<String>,
    pub port: Option<String>,
    pub weight: Option<f64>,
    pub category: CargoCategory,
}

impl Container {
    /// Handling priority derived from the cargo category.
    #[inline]
    pub fn priority(&self) -> u8 {
        self.category.priority()
    }

    /// Key the given operation groups by.
    pub fn grouping_key(&self, operation: OperationType) -> Option<&str> {
        match operation {
            OperationType::Inbound => self.carrier.as_deref(),
            OperationType::Outbound => self.port.as_deref(),
        }
    }
}

impl Stackable for Container {
    fn length(&self) -> ContainerLength {
        self.length
    }

    fn category(&self) -> CargoCategory {
        self.category
    }
}

/// One placed container.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PlacementRecord {
    pub container_id: String,
    /// Zone, row, column and tier, e.g. `M13A1`.
    pub position: String,
    pub zone: String,
    pub row: u8,
    #[schema(value_type = String)]
    pub column: char,
    pub tier: u8,
    #[schema(value_type = u8)]
    pub weight_class: WeightClass,
    pub length: ContainerLength,
    pub category: CargoCategory,
    pub iso_type: String,
    pub operation: OperationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carrier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
}

impl PlacementRecord {
    pub fn new(
        container: &Container,
        weight_class: WeightClass,
        slot: &SlotPosition,
        operation: OperationType,
    ) -> Self {
        Self {
            container_id: container.id.clone(),
            position: slot.code(),
            zone: slot.zone.clone(),
            row: slot.row,
            column: slot.column,
            tier: slot.tier,
            weight_class,
            length: container.length,
            category: container.category,
            iso_type: container.iso_type.clone(),
            operation,
            carrier: container.carrier.clone(),
            port: container.port.clone(),
        }
    }

    /// Grouping key for this record's operation.
    pub fn grouping_key(&self) -> Option<&str> {
        match self.operation {
            OperationType::Inbound => self.carrier.as_deref(),
            OperationType::Outbound => self.port.as_deref(),
        }
    }
}
