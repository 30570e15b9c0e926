// Field normalization
//
// Maps raw decoded values through the model catalog and merges compound
// fields into user-meaningful metrics. Per-field resolution is an
// explicit tagged outcome rather than exception-driven control flow, so
// skip/drop/keep decisions are visible in the types.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::trace;

use thinqpoll_api::{ModelCatalog, ValueDescriptor};

use crate::decode::{DecodedFrame, FieldValue};

/// Enum label that marks a field as "not reported" -- such fields are
/// never emitted.
const SENTINEL_LABEL: &str = "-";

/// Run-scoped mutable store of normalized output fields.
///
/// Populated incrementally across poll attempts: a frame that adds only
/// part of the field set leaves earlier values in place. It is not
/// established whether the device ever spreads its field set over several
/// frames or whether every frame is complete -- if field sets vary
/// between polls, a value from an earlier frame can persist into the
/// final result. Accumulation matches the observed device behavior and
/// is kept deliberately.
#[derive(Debug, Default)]
pub struct FieldAccumulator {
    fields: BTreeMap<String, FieldValue>,
}

impl FieldAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Consume the accumulator, yielding the final field set.
    pub fn into_fields(self) -> BTreeMap<String, FieldValue> {
        self.fields
    }
}

/// A merge rule input could not be interpreted as a number. The
/// accumulator is left unchanged by the failed rule; the poll loop
/// treats this as transient and keeps polling.
#[derive(Debug, Error)]
#[error("field {key:?} is not numeric")]
pub struct NormalizeError {
    pub key: String,
}

/// Outcome of resolving one raw field against the catalog.
#[derive(Debug, PartialEq)]
enum FieldOutcome {
    /// Write this value into the accumulator.
    Keep(FieldValue),
    /// Field resolved to the sentinel label; never emitted.
    Drop,
    /// Key unrecognized by the catalog; silently ignored.
    Skip,
}

fn resolve_field(key: &str, value: FieldValue, catalog: &ModelCatalog) -> FieldOutcome {
    match catalog.descriptor(key) {
        None => FieldOutcome::Skip,
        Some(ValueDescriptor::Enum(options)) => match options.get(&value.as_code()) {
            Some(label) if label == SENTINEL_LABEL => FieldOutcome::Drop,
            Some(label) => FieldOutcome::Keep(FieldValue::Str(label.clone())),
            // No mapping entry for this code: pass the raw value through.
            None => FieldOutcome::Keep(value),
        },
        Some(ValueDescriptor::Range(_)) => FieldOutcome::Keep(value),
    }
}

/// Normalize one decoded frame into the accumulator.
///
/// Runs the per-field pass, then the merge rules in fixed order. A merge
/// rule that fails leaves its inputs in place and aborts the remaining
/// rules; per-field values written before the failure stay accumulated.
pub fn normalize_into(
    acc: &mut FieldAccumulator,
    frame: DecodedFrame,
    catalog: &ModelCatalog,
) -> Result<(), NormalizeError> {
    for (key, value) in frame {
        match resolve_field(&key, value, catalog) {
            FieldOutcome::Keep(resolved) => {
                acc.fields.insert(key, resolved);
            }
            FieldOutcome::Drop => {
                trace!(key, "field resolved to sentinel, dropping");
            }
            FieldOutcome::Skip => {
                trace!(key, "unrecognized field, skipping");
            }
        }
    }

    apply_merge_rules(acc)
}

/// The fixed merge-rule sequence. Each rule fires only when all of its
/// inputs are present, and removes its inputs atomically with inserting
/// the derived key -- raw and derived keys never coexist.
fn apply_merge_rules(acc: &mut FieldAccumulator) -> Result<(), NormalizeError> {
    merge_duration(acc, "Remain_Time_H", "Remain_Time_M", "remaining_minutes")?;
    merge_duration(acc, "Initial_Time_H", "Initial_Time_M", "starting_minutes")?;

    if acc.fields.contains_key("MoreLessTime") {
        let minutes = require_i64(acc, "MoreLessTime")?;
        acc.fields.remove("MoreLessTime");
        acc.fields
            .insert("more_less_time_minutes".into(), FieldValue::Int(minutes));
    }

    Ok(())
}

/// Merge an hours/minutes pair into a single minute count. If only one
/// half is present no merge occurs and the half-key stays in the
/// accumulator -- observed device behavior, preserved as-is.
fn merge_duration(
    acc: &mut FieldAccumulator,
    h_key: &str,
    m_key: &str,
    out_key: &str,
) -> Result<(), NormalizeError> {
    if !(acc.fields.contains_key(h_key) && acc.fields.contains_key(m_key)) {
        return Ok(());
    }

    // Parse both halves before mutating so a failure leaves the
    // accumulator untouched.
    let hours = require_i64(acc, h_key)?;
    let minutes = require_i64(acc, m_key)?;

    acc.fields.remove(h_key);
    acc.fields.remove(m_key);
    acc.fields
        .insert(out_key.into(), FieldValue::Int(60 * hours + minutes));
    Ok(())
}

fn require_i64(acc: &FieldAccumulator, key: &str) -> Result<i64, NormalizeError> {
    acc.fields
        .get(key)
        .and_then(FieldValue::as_i64)
        .ok_or_else(|| NormalizeError { key: key.into() })
}
