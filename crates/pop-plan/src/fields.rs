//! Field spec parsing and default merging.

use pop_core::{FieldValue, Filter};
use serde_yaml::Value;

use crate::errors::{Result, SpecError};
use crate::model::{FieldSpec, FieldSpecs, Modifier, WeightedOption};

const CHOOSE_KEYWORD: &str = "choose";
const REFERENCE_PREFIX: &str = "r.";

/// Parse a `fields` block. `null` is an empty block.
pub fn parse_fields(value: &Value) -> Result<FieldSpecs> {
    let mut fields = FieldSpecs::new();
    let map = match value {
        Value::Null => return Ok(fields),
        Value::Mapping(map) => map,
        _ => {
            return Err(SpecError::InvalidFieldSpec {
                field: "fields".to_string(),
                reason: "fields must be a mapping of field name to value".to_string(),
            });
        }
    };

    for (name, spec) in map {
        let Some(name) = name.as_str() else {
            return Err(SpecError::InvalidFieldSpec {
                field: format!("{name:?}"),
                reason: "field names must be strings".to_string(),
            });
        };
        fields.insert(name.to_string(), parse_field_spec(name, spec)?);
    }

    Ok(fields)
}

/// Parse one field's raw value into a typed spec.
pub fn parse_field_spec(field: &str, value: &Value) -> Result<FieldSpec> {
    match value {
        Value::Mapping(map) => {
            let mut options = Vec::with_capacity(map.len());
            for (choice, weight) in map {
                options.push(WeightedOption {
                    key: choice_key(field, choice)?,
                    value: parse_scalar_spec(field, choice)?,
                    weight: parse_weight(field, weight)?,
                });
            }
            check_choices(field, &options)?;
            Ok(FieldSpec::WeightedChoice(options))
        }
        Value::Sequence(items) => {
            let mut options = Vec::with_capacity(items.len());
            for item in items {
                options.push(WeightedOption {
                    key: choice_key(field, item)?,
                    value: parse_scalar_spec(field, item)?,
                    weight: None,
                });
            }
            check_choices(field, &options)?;
            Ok(FieldSpec::WeightedChoice(options))
        }
        other => parse_scalar_spec(field, other),
    }
}

/// Parse a scalar that may be a modifier string.
pub fn parse_scalar_spec(field: &str, value: &Value) -> Result<FieldSpec> {
    let scalar = choice_key(field, value)?;
    if let FieldValue::Text(text) = &scalar
        && let Some(modifier) = parse_modifier(text).map_err(|reason| {
            SpecError::InvalidFieldSpec {
                field: field.to_string(),
                reason,
            }
        })?
    {
        return Ok(FieldSpec::Modifier(modifier));
    }
    Ok(FieldSpec::Literal(scalar))
}

/// Recognize modifier shorthands. Plain text yields `Ok(None)`.
///
/// Checked in order: the `choose` keyword, the `r.` prefix, then a
/// case-insensitive `f.` prefix.
pub fn parse_modifier(text: &str) -> std::result::Result<Option<Modifier>, String> {
    if text == CHOOSE_KEYWORD {
        return Ok(Some(Modifier::Choose));
    }

    if let Some(rest) = text.strip_prefix(REFERENCE_PREFIX) {
        let mut parts = rest.split(',');
        let entity = parts.next().unwrap_or_default().trim();
        if entity.is_empty() {
            return Err(format!("'{text}' does not name an entity"));
        }
        let mut filter = Filter::new();
        for term in parts {
            let (key, value) = term
                .split_once('=')
                .ok_or_else(|| format!("filter term '{term}' must look like key=value"))?;
            filter.insert(key.trim().to_string(), FieldValue::parse_scalar(value));
        }
        return Ok(Some(Modifier::Reference {
            entity: entity.to_string(),
            filter,
        }));
    }

    if text.len() >= 2 && text.is_char_boundary(2) && text[..2].eq_ignore_ascii_case("f.") {
        let capitalize = text.starts_with('F');
        let mut parts = text[2..].split(',');
        let generator = parts.next().unwrap_or_default().trim();
        if generator.is_empty() {
            return Err(format!("'{text}' does not name a generator"));
        }
        return Ok(Some(Modifier::Fake {
            generator: generator.to_string(),
            args: parts.map(|arg| arg.trim().to_string()).collect(),
            capitalize,
        }));
    }

    Ok(None)
}

fn choice_key(field: &str, value: &Value) -> Result<FieldValue> {
    FieldValue::from_yaml(value).ok_or_else(|| SpecError::InvalidFieldSpec {
        field: field.to_string(),
        reason: "expected a scalar value".to_string(),
    })
}

fn parse_weight(field: &str, value: &Value) -> Result<Option<f64>> {
    let weight = match value {
        Value::Null => return Ok(None),
        Value::Number(number) => number.as_f64(),
        _ => None,
    };
    match weight {
        Some(weight) if weight.is_finite() && weight >= 0.0 => Ok(Some(weight)),
        _ => Err(SpecError::InvalidFieldSpec {
            field: field.to_string(),
            reason: format!("weight {value:?} must be a non-negative number"),
        }),
    }
}

fn check_choices(field: &str, options: &[WeightedOption]) -> Result<()> {
    if options.is_empty() {
        return Err(SpecError::InvalidFieldSpec {
            field: field.to_string(),
            reason: "a choice needs at least one option".to_string(),
        });
    }
    let total: f64 = options.iter().map(WeightedOption::weight).sum();
    if total <= 0.0 {
        return Err(SpecError::InvalidFieldSpec {
            field: field.to_string(),
            reason: "every option has zero weight".to_string(),
        });
    }
    Ok(())
}

/// Merge two field blocks; `higher` wins every conflict.
///
/// Weighted choices present on both sides merge option by option instead of
/// being replaced wholesale.
pub fn merge_fields(lower: &FieldSpecs, higher: FieldSpecs) -> FieldSpecs {
    let mut merged = lower.clone();
    for (name, spec) in higher {
        let next = match merged.remove(&name) {
            Some(existing) => merge_spec(existing, spec),
            None => spec,
        };
        merged.insert(name, next);
    }
    merged
}

fn merge_spec(lower: FieldSpec, higher: FieldSpec) -> FieldSpec {
    match (lower, higher) {
        (FieldSpec::WeightedChoice(mut options), FieldSpec::WeightedChoice(overrides)) => {
            for option in overrides {
                match options.iter_mut().find(|existing| existing.key == option.key) {
                    Some(existing) => *existing = option,
                    None => options.push(option),
                }
            }
            FieldSpec::WeightedChoice(options)
        }
        (_, higher) => higher,
    }
}
