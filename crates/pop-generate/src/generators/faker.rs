use chrono::{Duration, NaiveDateTime, Utc};
use fake::Fake;
use fake::faker::address::en::{BuildingNumber, CityName, CountryName, StateName, StreetName, ZipCode};
use fake::faker::company::en::{Bs, CatchPhrase, CompanyName};
use fake::faker::internet::en::{DomainSuffix, FreeEmail, SafeEmail, Username};
use fake::faker::job::en::Title as JobTitle;
use fake::faker::lorem::en::{Paragraph, Sentence, Word, Words};
use fake::faker::name::en::{FirstName, LastName, Name, Title};
use fake::faker::phone_number::en::{CellNumber, PhoneNumber};
use pop_core::FieldValue;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::dates::parse_moment;
use super::{GeneratedValue, ValueGenerator};
use crate::errors::LookupError;

/// Largest word, sentence or paragraph count a generator accepts.
const MAX_TEXT_COUNT: usize = 1000;

/// Lower-cased names understood by [`FakerValueGenerator`].
pub const GENERATOR_NAMES: &[&str] = &[
    "firstname",
    "lastname",
    "name",
    "title",
    "email",
    "safeemail",
    "freeemail",
    "username",
    "domainname",
    "url",
    "company",
    "catchphrase",
    "bs",
    "jobtitle",
    "phonenumber",
    "cellnumber",
    "streetaddress",
    "streetname",
    "buildingnumber",
    "city",
    "postcode",
    "state",
    "country",
    "address",
    "word",
    "words",
    "sentence",
    "paragraph",
    "text",
    "numberbetween",
    "randomnumber",
    "randomdigit",
    "randomfloat",
    "boolean",
    "randomelement",
    "uuid",
    "date",
    "time",
    "datetime",
    "datetimebetween",
    "datetimethisyear",
    "datetimethismonth",
    "datetimethisdecade",
];

/// Generators backed by the `fake` crate, English locale.
///
/// Date generators work relative to a fixed `now` taken at construction, so
/// a run sees one consistent clock.
#[derive(Debug, Clone)]
pub struct FakerValueGenerator {
    now: NaiveDateTime,
}

impl Default for FakerValueGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl FakerValueGenerator {
    pub fn new() -> Self {
        Self {
            now: Utc::now().naive_utc(),
        }
    }

    pub fn with_now(now: NaiveDateTime) -> Self {
        Self { now }
    }

    pub fn now(&self) -> NaiveDateTime {
        self.now
    }

    fn moment_arg(
        &self,
        name: &str,
        args: &[String],
        index: usize,
        default: &str,
    ) -> Result<NaiveDateTime, LookupError> {
        let raw = args.get(index).map(String::as_str).unwrap_or(default);
        parse_moment(raw, self.now)
            .ok_or_else(|| LookupError::generator(name, format!("invalid date argument '{raw}'")))
    }

    fn between(
        &self,
        name: &str,
        args: &[String],
        start: &str,
        end: &str,
        rng: &mut ChaCha8Rng,
    ) -> Result<NaiveDateTime, LookupError> {
        let start = self.moment_arg(name, args, 0, start)?;
        let end = self.moment_arg(name, args, 1, end)?;
        Ok(random_between(start, end, rng))
    }
}

impl ValueGenerator for FakerValueGenerator {
    fn supports(&self, name: &str) -> bool {
        GENERATOR_NAMES.contains(&name.to_ascii_lowercase().as_str())
    }

    fn generate(
        &self,
        name: &str,
        args: &[String],
        rng: &mut dyn RngCore,
    ) -> Result<GeneratedValue, LookupError> {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        let mut rng = ChaCha8Rng::from_seed(seed);

        let text = |value: String| Ok(GeneratedValue::Value(FieldValue::Text(value)));
        match name.to_ascii_lowercase().as_str() {
            "firstname" => text(FirstName().fake_with_rng(&mut rng)),
            "lastname" => text(LastName().fake_with_rng(&mut rng)),
            "name" => text(Name().fake_with_rng(&mut rng)),
            "title" => text(Title().fake_with_rng(&mut rng)),

            "email" | "safeemail" => text(SafeEmail().fake_with_rng(&mut rng)),
            "freeemail" => text(FreeEmail().fake_with_rng(&mut rng)),
            "username" => text(Username().fake_with_rng(&mut rng)),
            "domainname" => text(domain_name(&mut rng)),
            "url" => text(format!("https://www.{}/", domain_name(&mut rng))),

            "company" => text(CompanyName().fake_with_rng(&mut rng)),
            "catchphrase" => text(CatchPhrase().fake_with_rng(&mut rng)),
            "bs" => text(Bs().fake_with_rng(&mut rng)),
            "jobtitle" => text(JobTitle().fake_with_rng(&mut rng)),
            "phonenumber" => text(PhoneNumber().fake_with_rng(&mut rng)),
            "cellnumber" => text(CellNumber().fake_with_rng(&mut rng)),

            "streetaddress" => text(street_address(&mut rng)),
            "streetname" => text(StreetName().fake_with_rng(&mut rng)),
            "buildingnumber" => text(BuildingNumber().fake_with_rng(&mut rng)),
            "city" => text(CityName().fake_with_rng(&mut rng)),
            "postcode" => text(ZipCode().fake_with_rng(&mut rng)),
            "state" => text(StateName().fake_with_rng(&mut rng)),
            "country" => text(CountryName().fake_with_rng(&mut rng)),
            "address" => {
                let street = street_address(&mut rng);
                let city: String = CityName().fake_with_rng(&mut rng);
                let state: String = StateName().fake_with_rng(&mut rng);
                let zip: String = ZipCode().fake_with_rng(&mut rng);
                text(format!("{street}, {city}, {state} {zip}"))
            }

            "word" => text(Word().fake_with_rng(&mut rng)),
            "words" => {
                let count = count_arg(name, args, 3)?;
                let words: Vec<String> = Words(count..count + 1).fake_with_rng(&mut rng);
                text(words.join(" "))
            }
            "sentence" => {
                let count = count_arg(name, args, 6)?;
                text(Sentence(count..count + 1).fake_with_rng(&mut rng))
            }
            "paragraph" => {
                let count = count_arg(name, args, 3)?;
                text(Paragraph(count..count + 1).fake_with_rng(&mut rng))
            }
            "text" => {
                let max_chars = usize_arg(name, args, 0, 200)?.max(5);
                let paragraph: String = Paragraph(3..6).fake_with_rng(&mut rng);
                text(truncate_chars(&paragraph, max_chars))
            }

            "numberbetween" => {
                let min = i64_arg(name, args, 0, 0)?;
                let max = i64_arg(name, args, 1, i64::from(i32::MAX))?;
                let (low, high) = if min <= max { (min, max) } else { (max, min) };
                Ok(GeneratedValue::Value(FieldValue::Int(rng.random_range(low..=high))))
            }
            "randomnumber" => {
                let value = match args.first() {
                    Some(_) => {
                        let digits = u32::try_from(usize_arg(name, args, 0, 9)?.clamp(1, 18))
                            .unwrap_or(18);
                        rng.random_range(0..10_i64.pow(digits))
                    }
                    None => rng.random_range(0..=i64::from(i32::MAX)),
                };
                Ok(GeneratedValue::Value(FieldValue::Int(value)))
            }
            "randomdigit" => Ok(GeneratedValue::Value(FieldValue::Int(rng.random_range(0..=9)))),
            "randomfloat" => {
                let decimals = i32::try_from(usize_arg(name, args, 0, 2)?.min(10)).unwrap_or(2);
                let min = f64_arg(name, args, 1, 0.0)?;
                let max = f64_arg(name, args, 2, 100.0)?;
                let raw = min + rng.random::<f64>() * (max - min);
                let scale = 10_f64.powi(decimals);
                Ok(GeneratedValue::Value(FieldValue::Float((raw * scale).round() / scale)))
            }
            "boolean" => {
                let chance = f64_arg(name, args, 0, 50.0)?.clamp(0.0, 100.0);
                Ok(GeneratedValue::Value(FieldValue::Bool(
                    rng.random_bool(chance / 100.0),
                )))
            }
            "randomelement" => {
                if args.is_empty() {
                    return Err(LookupError::generator(name, "no elements to choose from"));
                }
                let choice = &args[rng.random_range(0..args.len())];
                Ok(GeneratedValue::Value(FieldValue::parse_scalar(choice)))
            }
            "uuid" => {
                let bytes: [u8; 16] = rng.random();
                text(uuid::Builder::from_random_bytes(bytes).into_uuid().to_string())
            }

            "date" => {
                let moment = self.between(name, &[], "1970-01-01", "now", &mut rng)?;
                text(moment.format("%Y-%m-%d").to_string())
            }
            "time" => {
                let moment = self.between(name, &[], "1970-01-01", "now", &mut rng)?;
                text(moment.format("%H:%M:%S").to_string())
            }
            "datetime" => Ok(GeneratedValue::DateTime(
                self.between(name, &[], "1970-01-01", "now", &mut rng)?,
            )),
            "datetimebetween" => Ok(GeneratedValue::DateTime(
                self.between(name, args, "-30 years", "now", &mut rng)?,
            )),
            "datetimethisyear" => Ok(GeneratedValue::DateTime(
                self.between(name, &[], "-1 year", "now", &mut rng)?,
            )),
            "datetimethismonth" => Ok(GeneratedValue::DateTime(
                self.between(name, &[], "-1 month", "now", &mut rng)?,
            )),
            "datetimethisdecade" => Ok(GeneratedValue::DateTime(
                self.between(name, &[], "-10 years", "now", &mut rng)?,
            )),

            _ => Err(LookupError::generator(name, "unknown generator")),
        }
    }
}

fn random_between(start: NaiveDateTime, end: NaiveDateTime, rng: &mut ChaCha8Rng) -> NaiveDateTime {
    let span = (end - start).num_seconds();
    if span <= 0 {
        return start;
    }
    start + Duration::seconds(rng.random_range(0..=span))
}

fn domain_name(rng: &mut ChaCha8Rng) -> String {
    let word: String = Word().fake_with_rng(rng);
    let suffix: String = DomainSuffix().fake_with_rng(rng);
    format!("{}.{}", word.to_lowercase(), suffix)
}

fn street_address(rng: &mut ChaCha8Rng) -> String {
    let number: String = BuildingNumber().fake_with_rng(rng);
    let street: String = StreetName().fake_with_rng(rng);
    format!("{number} {street}")
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let cut: String = value.chars().take(max_chars - 1).collect();
    format!("{}.", cut.trim_end())
}

fn raw_arg<'a>(args: &'a [String], index: usize) -> Option<&'a str> {
    args.get(index)
        .map(|arg| arg.trim())
        .filter(|arg| !arg.is_empty())
}

fn i64_arg(name: &str, args: &[String], index: usize, default: i64) -> Result<i64, LookupError> {
    raw_arg(args, index).map_or(Ok(default), |raw| {
        raw.parse()
            .map_err(|_| LookupError::generator(name, format!("expected an integer, got '{raw}'")))
    })
}

fn usize_arg(name: &str, args: &[String], index: usize, default: usize) -> Result<usize, LookupError> {
    raw_arg(args, index).map_or(Ok(default), |raw| {
        raw.parse().map_err(|_| {
            LookupError::generator(name, format!("expected a non-negative integer, got '{raw}'"))
        })
    })
}

/// Word, sentence or paragraph count in `1..=MAX_TEXT_COUNT`.
fn count_arg(name: &str, args: &[String], default: usize) -> Result<usize, LookupError> {
    let count = usize_arg(name, args, 0, default)?;
    if count > MAX_TEXT_COUNT {
        return Err(LookupError::generator(
            name,
            format!("count {count} is above the limit of {MAX_TEXT_COUNT}"),
        ));
    }
    Ok(count.max(1))
}

fn f64_arg(name: &str, args: &[String], index: usize, default: f64) -> Result<f64, LookupError> {
    let Some(raw) = raw_arg(args, index) else {
        return Ok(default);
    };
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(LookupError::generator(
            name,
            format!("expected a finite number, got '{raw}'"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::DATE_TIME_FORMAT;

    fn generator() -> FakerValueGenerator {
        let now = NaiveDateTime::parse_from_str("2024-06-15 12:00:00", DATE_TIME_FORMAT)
            .expect("fixed now");
        FakerValueGenerator::with_now(now)
    }

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn names_are_case_insensitive() {
        let generator = generator();
        assert!(generator.supports("firstName"));
        assert!(generator.supports("FIRSTNAME"));
        assert!(generator.supports("dateTimeBetween"));
        assert!(!generator.supports("favouriteColour"));
    }

    #[test]
    fn every_listed_name_generates() {
        let generator = generator();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for name in GENERATOR_NAMES {
            let input = if *name == "randomelement" { args(&["a", "b"]) } else { Vec::new() };
            let value = generator
                .generate(name, &input, &mut rng)
                .unwrap_or_else(|err| panic!("{name} failed: {err}"));
            assert!(!value.into_field_value().is_null(), "{name} produced null");
        }
    }

    #[test]
    fn number_between_respects_bounds() {
        let generator = generator();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..200 {
            let value = generator
                .generate("numberBetween", &args(&["3", "5"]), &mut rng)
                .expect("generate")
                .into_field_value();
            let number = value.as_i64().expect("int");
            assert!((3..=5).contains(&number));
        }
    }

    #[test]
    fn date_time_between_stays_in_window() {
        let generator = generator();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let start = parse_moment("+1 day", generator.now()).expect("start");
        let end = parse_moment("+1 year", generator.now()).expect("end");
        for _ in 0..100 {
            let moment = generator
                .generate("dateTimeBetween", &args(&["+1 day", "+1 year"]), &mut rng)
                .expect("generate")
                .as_date_time()
                .expect("moment");
            assert!(moment >= start && moment <= end);
        }
    }

    #[test]
    fn same_seed_same_values() {
        let generator = generator();
        let mut first = ChaCha8Rng::seed_from_u64(99);
        let mut second = ChaCha8Rng::seed_from_u64(99);
        for name in ["firstName", "company", "email", "uuid"] {
            assert_eq!(
                generator.generate(name, &[], &mut first).expect("first"),
                generator.generate(name, &[], &mut second).expect("second"),
            );
        }
    }

    #[test]
    fn oversized_counts_are_rejected() {
        let generator = generator();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let huge = usize::MAX.to_string();
        for name in ["words", "sentence", "paragraph"] {
            let err = generator
                .generate(name, &args(&[&huge]), &mut rng)
                .expect_err("count above limit");
            assert!(matches!(err, LookupError::Generator { .. }), "{name}: {err}");
        }
        assert!(generator.generate("words", &args(&["1000"]), &mut rng).is_ok());
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        let generator = generator();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        for raw in ["NaN", "inf", "-inf"] {
            assert!(generator.generate("boolean", &args(&[raw]), &mut rng).is_err());
            assert!(
                generator
                    .generate("randomFloat", &args(&["2", "0", raw]), &mut rng)
                    .is_err()
            );
        }
    }

    #[test]
    fn bad_arguments_are_reported() {
        let generator = generator();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let err = generator
            .generate("numberBetween", &args(&["low"]), &mut rng)
            .expect_err("bad bound");
        assert!(matches!(err, LookupError::Generator { .. }));
        assert!(generator.generate("randomElement", &[], &mut rng).is_err());
    }
}
