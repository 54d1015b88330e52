//! LV assembly: mutations, recalculation and validation.

use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

use super::text;
use crate::domain::{
    DataSource, DuplicateFlag, Lv, LvMutation, LvValidation, Position, PositionInput,
    PositionPatch, PriceWarning,
};
use crate::error::{PipelineError, PipelineResult};

/// Token similarity at which two positions count as the same work.
const DUPLICATE_SIMILARITY: f64 = 0.9;
const DUPLICATE_PENALTY: u8 = 10;
const WARNING_PENALTY: u8 = 5;

const OUT_OF_RANGE: &str = "Betrag außerhalb des zulässigen Bereichs";

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Quantity × unit price, rounded. `None` when the product overflows.
fn line_total(quantity: Decimal, unit_price: Decimal) -> Option<Decimal> {
    quantity.checked_mul(unit_price).map(round_money)
}

fn sum_totals<'a>(mut positions: impl Iterator<Item = &'a Position>) -> PipelineResult<Decimal> {
    positions.try_fold(Decimal::ZERO, |acc, p| {
        acc.checked_add(p.total_price)
            .ok_or_else(|| PipelineError::validation(OUT_OF_RANGE))
    })
}

fn label(index: usize) -> String {
    format!("{}.00", index + 1)
}

fn position_from_input(input: PositionInput, default_source: DataSource) -> PipelineResult<Position> {
    let title = input.title.trim().to_string();
    if title.is_empty() {
        return Err(PipelineError::validation("position title must not be empty"));
    }
    let (total_price, manual_total) = match input.total_price {
        Some(total) => (round_money(total), true),
        None => (
            line_total(input.quantity, input.unit_price)
                .ok_or_else(|| PipelineError::validation(OUT_OF_RANGE))?,
            false,
        ),
    };
    Ok(Position {
        pos: String::new(),
        title,
        description: input.description.trim().to_string(),
        quantity: input.quantity,
        unit: input.unit.trim().to_string(),
        unit_price: input.unit_price,
        total_price,
        data_source: input.data_source.unwrap_or(default_source),
        is_nep: input.is_nep,
        manual_total,
    })
}

fn positions_from_inputs(
    inputs: Vec<PositionInput>,
    default_source: DataSource,
) -> PipelineResult<Vec<Position>> {
    inputs
        .into_iter()
        .map(|i| position_from_input(i, default_source))
        .collect()
}

fn apply_patch(position: &mut Position, patch: PositionPatch) -> PipelineResult<()> {
    if let Some(title) = patch.title {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(PipelineError::validation("position title must not be empty"));
        }
        position.title = title;
    }
    if let Some(description) = patch.description {
        position.description = description.trim().to_string();
    }
    if let Some(unit) = patch.unit {
        position.unit = unit.trim().to_string();
    }
    if let Some(is_nep) = patch.is_nep {
        position.is_nep = is_nep;
    }

    let priced = patch.quantity.is_some() || patch.unit_price.is_some();
    if let Some(quantity) = patch.quantity {
        position.quantity = quantity;
    }
    if let Some(unit_price) = patch.unit_price {
        position.unit_price = unit_price;
    }
    match patch.total_price {
        Some(total) => {
            position.total_price = round_money(total);
            position.manual_total = true;
        }
        // New quantity or price without a total: derive it again.
        None if priced => position.manual_total = false,
        None => {}
    }

    position.data_source = patch.data_source.unwrap_or(DataSource::Manual);
    Ok(())
}

fn find_index(positions: &[Position], pos: &str) -> PipelineResult<usize> {
    positions
        .iter()
        .position(|p| p.pos == pos)
        .ok_or_else(|| PipelineError::not_found(format!("position {pos}")))
}

/// Recompute derived totals, renumber, and validate.
///
/// Fails with `ValidationFailed` when a line total or a sum leaves the
/// `Decimal` range.
pub fn finalize(lv: &mut Lv) -> PipelineResult<()> {
    for (i, p) in lv.positions.iter_mut().enumerate() {
        p.pos = label(i);
        if !p.manual_total {
            p.total_price = line_total(p.quantity, p.unit_price)
                .ok_or_else(|| PipelineError::validation(OUT_OF_RANGE))?;
        }
    }
    lv.total_sum = sum_totals(lv.positions.iter().filter(|p| !p.is_nep))?;
    lv.nep_sum = sum_totals(lv.positions.iter().filter(|p| p.is_nep))?;
    lv.validation = validate(&lv.positions);
    lv.updated_at = Utc::now();
    Ok(())
}

/// Apply one mutation to a trade's LV.
///
/// Every mutation except `Create` needs an existing LV.
pub fn assemble_lv(
    existing: Option<Lv>,
    project_id: Uuid,
    trade_code: &str,
    mutation: LvMutation,
) -> PipelineResult<Lv> {
    let op = mutation.name();
    let mut lv = match (existing, mutation) {
        (_, LvMutation::Create { positions, assumptions }) => Lv {
            project_id,
            trade_code: trade_code.to_string(),
            positions: positions_from_inputs(positions, DataSource::Estimated)?,
            total_sum: Decimal::ZERO,
            nep_sum: Decimal::ZERO,
            assumptions,
            validation: LvValidation::default(),
            updated_at: Utc::now(),
        },
        (None, _) => {
            return Err(PipelineError::not_found(format!("LV for trade {trade_code}")));
        }
        (Some(mut lv), LvMutation::Add { position }) => {
            lv.positions
                .push(position_from_input(position, DataSource::Manual)?);
            lv
        }
        (Some(mut lv), LvMutation::Edit { pos, patch }) => {
            let i = find_index(&lv.positions, &pos)?;
            apply_patch(&mut lv.positions[i], patch)?;
            lv
        }
        (Some(mut lv), LvMutation::Delete { pos }) => {
            let i = find_index(&lv.positions, &pos)?;
            lv.positions.remove(i);
            lv
        }
        (Some(mut lv), LvMutation::Replace { positions }) => {
            lv.positions = positions_from_inputs(positions, DataSource::Manual)?;
            lv
        }
    };

    finalize(&mut lv)?;
    debug!(
        trade = trade_code,
        op,
        positions = lv.positions.len(),
        total_sum = %lv.total_sum,
        nep_sum = %lv.nep_sum,
        quality = lv.validation.quality_score,
        "LV assembled"
    );
    Ok(lv)
}

fn duplicate_key(p: &Position) -> String {
    text::normalize(&format!("{} {}", p.title, p.description))
}

fn is_duplicate(a: &Position, b: &Position) -> bool {
    let (ka, kb) = (duplicate_key(a), duplicate_key(b));
    ka == kb || text::jaccard(&text::tokens(&ka), &text::tokens(&kb)) >= DUPLICATE_SIMILARITY
}

/// Flag duplicates and price problems. Nothing is merged or changed.
pub fn validate(positions: &[Position]) -> LvValidation {
    let mut duplicates = Vec::new();
    let mut clustered = vec![false; positions.len()];
    for i in 0..positions.len() {
        if clustered[i] {
            continue;
        }
        let mut group = vec![positions[i].pos.clone()];
        for j in i + 1..positions.len() {
            if !clustered[j] && is_duplicate(&positions[i], &positions[j]) {
                clustered[j] = true;
                group.push(positions[j].pos.clone());
            }
        }
        if group.len() > 1 {
            duplicates.push(DuplicateFlag {
                positions: group,
                title: positions[i].title.clone(),
            });
        }
    }

    let mut warnings = Vec::new();
    let mut warn = |p: &Position, message: &str| {
        warnings.push(PriceWarning {
            pos: p.pos.clone(),
            message: message.to_string(),
        })
    };
    for p in positions {
        if !p.is_nep && p.unit_price <= Decimal::ZERO {
            warn(p, "Einheitspreis fehlt oder ist nicht positiv");
        }
        if p.quantity <= Decimal::ZERO {
            warn(p, "Menge fehlt oder ist nicht positiv");
        }
        if p.unit.is_empty() {
            warn(p, "Einheit fehlt");
        }
        if p.manual_total && line_total(p.quantity, p.unit_price) != Some(p.total_price) {
            warn(p, "Gesamtpreis weicht von Menge × Einheitspreis ab");
        }
    }

    let penalty = (duplicates.len() as u32 * u32::from(DUPLICATE_PENALTY))
        + (warnings.len() as u32 * u32::from(WARNING_PENALTY));
    LvValidation {
        duplicates,
        warnings,
        quality_score: 100u32.saturating_sub(penalty) as u8,
    }
}

fn decimal_of(v: Option<&Value>) -> Option<Decimal> {
    match v? {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .ok()
            .or_else(|| n.as_f64().and_then(|f| Decimal::try_from(f).ok())),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
                .collect();
            // German notation: "1.234,50"
            let normalized = if cleaned.contains(',') {
                cleaned.replace('.', "").replace(',', ".")
            } else {
                cleaned
            };
            Decimal::from_str(&normalized).ok()
        }
        _ => None,
    }
}

fn string_of(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(|s| s.trim().to_string())
}

fn get<'a>(obj: &'a serde_json::Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

/// Read oracle-drafted positions. Entries without a title are skipped.
pub fn positions_from_values(items: &[Value]) -> Vec<PositionInput> {
    items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|obj| {
            let title = string_of(obj, &["title", "bezeichnung", "name"]).filter(|t| !t.is_empty())?;
            Some(PositionInput {
                title,
                description: string_of(obj, &["description", "beschreibung"]).unwrap_or_default(),
                quantity: decimal_of(get(obj, &["quantity", "menge"])).unwrap_or(Decimal::ZERO),
                unit: string_of(obj, &["unit", "einheit"]).unwrap_or_default(),
                unit_price: decimal_of(get(obj, &["unitPrice", "unit_price", "einheitspreis", "ep"]))
                    .unwrap_or(Decimal::ZERO),
                total_price: None,
                is_nep: get(obj, &["isNEP", "isNep", "is_nep", "nep", "optional"])
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                data_source: string_of(obj, &["dataSource", "data_source"])
                    .map(|s| DataSource::parse_lenient(&s)),
            })
        })
        .collect()
}
