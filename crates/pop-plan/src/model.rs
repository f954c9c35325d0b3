use std::collections::BTreeMap;

use pop_core::{FieldValue, Filter};
use serde::{Deserialize, Serialize};

/// A raw, user-authored instruction node.
///
/// The node is kept as parsed YAML until it is translated, so that children
/// are only validated when their parent is materialized and so that errors
/// can show the node exactly as written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instruction(serde_yaml::Value);

impl Instruction {
    pub fn new(value: serde_yaml::Value) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &serde_yaml::Value {
        &self.0
    }

    /// Render the node as YAML for diagnostics.
    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(&self.0).unwrap_or_else(|_| format!("{:?}", self.0))
    }
}

/// Number of entities an instruction asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Count {
    Fixed(u64),
    /// Inclusive range, drawn once per materialization.
    Range { min: u64, max: u64 },
}

impl Count {
    pub fn bounds(&self) -> (u64, u64) {
        match *self {
            Count::Fixed(count) => (count, count),
            Count::Range { min, max } => (min, max),
        }
    }
}

/// Field-value shorthand resolved at creation time.
#[derive(Debug, Clone, PartialEq)]
pub enum Modifier {
    /// `choose`: a random valid option of the field.
    Choose,
    /// `r.<Entity>[,key=value...]`: a random existing entity id.
    Reference { entity: String, filter: Filter },
    /// `f.<generator>[,arg...]`, or `F.` to capitalize the first letter.
    Fake {
        generator: String,
        args: Vec<String>,
        capitalize: bool,
    },
}

/// One alternative of a weighted choice.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedOption {
    /// The choice as written, used to match options when merging defaults.
    pub key: FieldValue,
    /// Literal or modifier the choice resolves to.
    pub value: FieldSpec,
    /// `None` when the weight was left empty.
    pub weight: Option<f64>,
}

impl WeightedOption {
    pub fn weight(&self) -> f64 {
        self.weight.unwrap_or(1.0)
    }
}

/// How a single field gets its value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSpec {
    Literal(FieldValue),
    WeightedChoice(Vec<WeightedOption>),
    Modifier(Modifier),
}

pub type FieldSpecs = BTreeMap<String, FieldSpec>;

/// Named pre-processing hooks that fill fields before resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PopulatorKind {
    ContactName,
    ContactEmail,
    EventDates,
}

impl PopulatorKind {
    pub const ALL: [PopulatorKind; 3] = [
        PopulatorKind::ContactName,
        PopulatorKind::ContactEmail,
        PopulatorKind::EventDates,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PopulatorKind::ContactName => "contact_name",
            PopulatorKind::ContactEmail => "contact_email",
            PopulatorKind::EventDates => "event_dates",
        }
    }
}

/// A validated, normalized instruction ready for creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub entity: String,
    pub count: Count,
    pub fields: FieldSpecs,
    pub children: Vec<Instruction>,
    pub populators: Vec<PopulatorKind>,
}

impl Definition {
    /// Every `(field, generator)` pair referenced through fake modifiers,
    /// including those nested in weighted choices.
    pub fn fake_generators(&self) -> Vec<(&str, &str)> {
        let mut found = Vec::new();
        for (field, spec) in &self.fields {
            collect_generators(field, spec, &mut found);
        }
        found
    }
}

fn collect_generators<'a>(field: &'a str, spec: &'a FieldSpec, found: &mut Vec<(&'a str, &'a str)>) {
    match spec {
        FieldSpec::Modifier(Modifier::Fake { generator, .. }) => {
            found.push((field, generator.as_str()));
        }
        FieldSpec::WeightedChoice(options) => {
            for option in options {
                collect_generators(field, &option.value, found);
            }
        }
        _ => {}
    }
}
