//! Hooks that fill related fields before resolution.
//!
//! A populator only adds fields the definition left empty, so anything set
//! explicitly in an instruction or in defaults wins.

use chrono::Duration;
use pop_core::{CONTACT_ENTITY, FieldValue};
use pop_plan::{FieldSpec, FieldSpecs, PopulatorKind};
use rand::{Rng, RngCore};

use crate::errors::LookupError;
use crate::generators::{DATE_TIME_FORMAT, GeneratedValue, ValueGenerator};

const EMAIL_DOMAINS: [&str; 3] = ["example.org", "example.com", "example.net"];

pub struct PopulatorContext<'a> {
    pub generator: &'a dyn ValueGenerator,
    pub rng: &'a mut dyn RngCore,
}

impl PopulatorContext<'_> {
    fn text(&mut self, generator: &str) -> Result<String, LookupError> {
        Ok(self
            .generator
            .generate(generator, &[], &mut *self.rng)?
            .into_field_value()
            .to_string())
    }
}

pub fn apply(
    kind: PopulatorKind,
    entity: &str,
    fields: &mut FieldSpecs,
    ctx: &mut PopulatorContext<'_>,
) -> Result<(), LookupError> {
    match kind {
        PopulatorKind::ContactName => contact_name(entity, fields, ctx),
        PopulatorKind::ContactEmail => contact_email(entity, fields, ctx),
        PopulatorKind::EventDates => event_dates(fields, ctx),
    }
}

fn literal_text<'a>(fields: &'a FieldSpecs, field: &str) -> Option<&'a str> {
    match fields.get(field) {
        Some(FieldSpec::Literal(value)) => value.as_str(),
        _ => None,
    }
}

fn set_if_absent(fields: &mut FieldSpecs, field: &str, value: impl Into<FieldValue>) {
    fields
        .entry(field.to_string())
        .or_insert_with(|| FieldSpec::Literal(value.into()));
}

fn contact_name(
    entity: &str,
    fields: &mut FieldSpecs,
    ctx: &mut PopulatorContext<'_>,
) -> Result<(), LookupError> {
    if entity != CONTACT_ENTITY {
        return Ok(());
    }
    match literal_text(fields, "contact_type") {
        Some("Individual") => {
            if !fields.contains_key("first_name") {
                let first = ctx.text("firstName")?;
                set_if_absent(fields, "first_name", first);
            }
            if !fields.contains_key("last_name") {
                let last = ctx.text("lastName")?;
                set_if_absent(fields, "last_name", last);
            }
        }
        Some("Organization") => {
            if !fields.contains_key("organization_name") {
                let company = ctx.text("company")?;
                set_if_absent(fields, "organization_name", company);
            }
        }
        Some("Household") => {
            if !fields.contains_key("household_name") {
                let name = format!("The {} Household", ctx.text("lastName")?);
                set_if_absent(fields, "household_name", name);
            }
        }
        _ => {}
    }
    Ok(())
}

fn contact_email(
    entity: &str,
    fields: &mut FieldSpecs,
    ctx: &mut PopulatorContext<'_>,
) -> Result<(), LookupError> {
    if fields.contains_key("email") {
        return Ok(());
    }
    let local = if entity == CONTACT_ENTITY {
        match (literal_text(fields, "first_name"), literal_text(fields, "last_name")) {
            (Some(first), Some(last)) => Some(format!("{}.{}", slug(first), slug(last))),
            _ => literal_text(fields, "organization_name")
                .or_else(|| literal_text(fields, "household_name"))
                .map(slug),
        }
    } else {
        None
    };
    let Some(local) = local.filter(|local| !local.is_empty() && local != ".") else {
        return Ok(());
    };
    let domain = EMAIL_DOMAINS[ctx.rng.random_range(0..EMAIL_DOMAINS.len())];
    set_if_absent(fields, "email", format!("{local}@{domain}"));
    Ok(())
}

fn event_dates(fields: &mut FieldSpecs, ctx: &mut PopulatorContext<'_>) -> Result<(), LookupError> {
    if fields.contains_key("start_date") {
        return Ok(());
    }
    let args = ["+1 day".to_string(), "+1 year".to_string()];
    let start = match ctx.generator.generate("dateTimeBetween", &args, &mut *ctx.rng)? {
        GeneratedValue::DateTime(moment) => moment,
        GeneratedValue::Value(_) => {
            return Err(LookupError::generator("dateTimeBetween", "expected a date-time"));
        }
    };
    set_if_absent(fields, "start_date", start.format(DATE_TIME_FORMAT).to_string());
    if !fields.contains_key("end_date") {
        let length = Duration::days(ctx.rng.random_range(0..=2))
            + Duration::hours(ctx.rng.random_range(2..=8));
        let end = start + length;
        set_if_absent(fields, "end_date", end.format(DATE_TIME_FORMAT).to_string());
    }
    Ok(())
}

fn slug(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(".")
        .to_ascii_lowercase()
}
