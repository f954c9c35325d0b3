use pop_core::{CONTACT_ENTITY, EntityApi, EntityId, FieldValue, Filter, is_contact_alias};
use pop_plan::{FieldSpec, Modifier, WeightedOption};
use rand::{Rng, RngCore};

use crate::cache::{EntityCache, OptionCache};
use crate::errors::LookupError;
use crate::generators::ValueGenerator;

/// Pick one option with probability proportional to its weight.
///
/// Options without a weight count as 1; zero-weight options are never picked.
/// Returns `None` when no option carries positive weight.
pub fn weighted_select<'a>(
    options: &'a [WeightedOption],
    rng: &mut dyn RngCore,
) -> Option<&'a WeightedOption> {
    let total: f64 = options.iter().map(WeightedOption::weight).sum();
    if !(total > 0.0) {
        return None;
    }
    let draw = rng.random::<f64>() * total;
    let mut threshold = 0.0;
    for option in options {
        threshold += option.weight();
        if draw < threshold {
            return Some(option);
        }
    }
    // float accumulation can leave the draw just past the last threshold
    options.iter().rev().find(|option| option.weight() > 0.0)
}

/// Turns one field spec into a concrete value.
pub struct FieldResolver<'a> {
    pub api: &'a dyn EntityApi,
    pub generator: &'a dyn ValueGenerator,
    pub entities: &'a mut EntityCache,
    pub options: &'a mut OptionCache,
    pub rng: &'a mut dyn RngCore,
}

impl FieldResolver<'_> {
    /// Weighted choice first, then modifier expansion of the chosen value.
    pub fn resolve(
        &mut self,
        entity: &str,
        field: &str,
        spec: &FieldSpec,
    ) -> Result<FieldValue, LookupError> {
        match spec {
            FieldSpec::Literal(value) => Ok(value.clone()),
            FieldSpec::WeightedChoice(options) => {
                let chosen = weighted_select(options, &mut *self.rng).ok_or_else(|| {
                    LookupError::NoChoice {
                        field: field.to_string(),
                    }
                })?;
                self.resolve(entity, field, &chosen.value)
            }
            FieldSpec::Modifier(modifier) => self.expand(entity, field, modifier),
        }
    }

    fn expand(
        &mut self,
        entity: &str,
        field: &str,
        modifier: &Modifier,
    ) -> Result<FieldValue, LookupError> {
        match modifier {
            Modifier::Choose => self.random_option(entity, field),
            Modifier::Reference { entity: target, filter } => {
                self.random_reference(target, filter).map(FieldValue::from)
            }
            Modifier::Fake {
                generator,
                args,
                capitalize,
            } => {
                let value = self
                    .generator
                    .generate(generator, args, &mut *self.rng)?
                    .into_field_value();
                Ok(if *capitalize { capitalize_first(value) } else { value })
            }
        }
    }

    /// A random existing id. `r.Individual` and the other contact aliases
    /// select contacts of that type.
    pub fn random_reference(&mut self, entity: &str, filter: &Filter) -> Result<EntityId, LookupError> {
        if is_contact_alias(entity) {
            let mut filter = filter.clone();
            filter
                .entry("contact_type".to_string())
                .or_insert_with(|| FieldValue::from(entity));
            return self
                .entities
                .random_id(self.api, CONTACT_ENTITY, Some(&filter), &mut *self.rng);
        }
        let filter = (!filter.is_empty()).then_some(filter);
        self.entities
            .random_id(self.api, entity, filter, &mut *self.rng)
    }

    pub fn random_option(&mut self, entity: &str, field: &str) -> Result<FieldValue, LookupError> {
        self.options
            .random_option(self.api, entity, field, &mut *self.rng)
    }
}

fn capitalize_first(value: FieldValue) -> FieldValue {
    match value {
        FieldValue::Text(text) => {
            let mut chars = text.chars();
            match chars.next() {
                Some(first) => FieldValue::Text(first.to_uppercase().chain(chars).collect()),
                None => FieldValue::Text(text),
            }
        }
        other => other,
    }
}
