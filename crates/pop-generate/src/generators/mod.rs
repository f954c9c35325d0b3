//! Named value generators behind the `f.` modifier.

mod dates;
mod faker;

use chrono::NaiveDateTime;
use pop_core::FieldValue;
use rand::RngCore;

use crate::errors::LookupError;

pub use dates::parse_moment;
pub use faker::FakerValueGenerator;

/// Backend date-time format for generated moments.
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Output of a generator. Moments stay typed until they are written to a field.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedValue {
    Value(FieldValue),
    DateTime(NaiveDateTime),
}

impl GeneratedValue {
    pub fn into_field_value(self) -> FieldValue {
        match self {
            GeneratedValue::Value(value) => value,
            GeneratedValue::DateTime(moment) => {
                FieldValue::Text(moment.format(DATE_TIME_FORMAT).to_string())
            }
        }
    }

    pub fn as_date_time(&self) -> Option<NaiveDateTime> {
        match self {
            GeneratedValue::DateTime(moment) => Some(*moment),
            GeneratedValue::Value(_) => None,
        }
    }
}

/// A source of named random values.
pub trait ValueGenerator {
    /// Whether `name` is a known generator. Names are case-insensitive.
    fn supports(&self, name: &str) -> bool;

    fn generate(
        &self,
        name: &str,
        args: &[String],
        rng: &mut dyn RngCore,
    ) -> Result<GeneratedValue, LookupError>;
}
