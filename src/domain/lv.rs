use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a position's quantity comes from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Measured,
    #[default]
    Estimated,
    Assumed,
    Manual,
}

impl DataSource {
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "measured" | "gemessen" => Self::Measured,
            "assumed" | "angenommen" => Self::Assumed,
            "manual" | "manuell" => Self::Manual,
            _ => Self::Estimated,
        }
    }
}

/// A priced line item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Sequential label, e.g. "3.00"
    pub pos: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    #[serde(default)]
    pub data_source: DataSource,
    /// Non-binding ("NEP") position, excluded from the binding total
    #[serde(rename = "isNEP", default)]
    pub is_nep: bool,
    /// Total was set by hand and is not derived from quantity × unit price
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub manual_total: bool,
}

/// Input for a new position
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PositionInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub quantity: Decimal,
    #[serde(default)]
    pub unit: String,
    pub unit_price: Decimal,
    #[serde(default)]
    pub total_price: Option<Decimal>,
    #[serde(rename = "isNEP", default)]
    pub is_nep: bool,
    #[serde(default)]
    pub data_source: Option<DataSource>,
}

/// Partial update of an existing position
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PositionPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub quantity: Option<Decimal>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub total_price: Option<Decimal>,
    #[serde(rename = "isNEP", default)]
    pub is_nep: Option<bool>,
    #[serde(default)]
    pub data_source: Option<DataSource>,
}

/// A mutation applied by the LV assembler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LvMutation {
    Create {
        positions: Vec<PositionInput>,
        #[serde(default)]
        assumptions: Vec<String>,
    },
    Add {
        position: PositionInput,
    },
    Edit {
        pos: String,
        patch: PositionPatch,
    },
    Delete {
        pos: String,
    },
    Replace {
        positions: Vec<PositionInput>,
    },
}

impl LvMutation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Add { .. } => "add",
            Self::Edit { .. } => "edit",
            Self::Delete { .. } => "delete",
            Self::Replace { .. } => "replace",
        }
    }
}

/// Positions flagged as materially identical
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateFlag {
    pub positions: Vec<String>,
    pub title: String,
}

/// Price sanity finding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PriceWarning {
    pub pos: String,
    pub message: String,
}

/// Validation report recomputed with every mutation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LvValidation {
    pub duplicates: Vec<DuplicateFlag>,
    pub warnings: Vec<PriceWarning>,
    /// 0–100
    pub quality_score: u8,
}

/// Line-item list for one (project, trade)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lv {
    pub project_id: Uuid,
    pub trade_code: String,
    pub positions: Vec<Position>,
    /// Sum of binding positions
    pub total_sum: Decimal,
    /// Sum of NEP positions
    pub nep_sum: Decimal,
    #[serde(default)]
    pub assumptions: Vec<String>,
    #[serde(default)]
    pub validation: LvValidation,
    pub updated_at: DateTime<Utc>,
}
