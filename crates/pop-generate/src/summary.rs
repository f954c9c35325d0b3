use std::collections::BTreeMap;

use pop_core::{EntityId, FieldValues};
use serde::Serialize;

use crate::errors::CreationFailure;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureRecord {
    pub fields: FieldValues,
    pub message: String,
}

/// Per-entity tally of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntitySummary {
    pub count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_id: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_id: Option<EntityId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailureRecord>,
}

impl EntitySummary {
    /// Final report line, e.g. `Email: 3 (12 to 14), 1 failed`.
    pub fn final_line(&self, entity: &str) -> String {
        let ids = match (self.first_id, self.last_id) {
            (Some(first), Some(last)) if first == last => format!("({first})"),
            (Some(first), Some(last)) if first < last => format!("({first} to {last})"),
            _ => "(unknown ids)".to_string(),
        };
        let mut line = format!("{entity}: {} {ids}", self.count);
        if !self.failures.is_empty() {
            line.push_str(&format!(", {} failed", self.failures.len()));
        }
        line
    }
}

/// Running counts of created and failed entities, keyed by backend entity type.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct SummaryReporter {
    entities: BTreeMap<String, EntitySummary>,
}

impl SummaryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, entity: &str, id: EntityId) {
        let summary = self.entities.entry(entity.to_string()).or_default();
        summary.count += 1;
        summary.first_id.get_or_insert(id);
        summary.last_id = Some(id);
    }

    pub fn record_failure(&mut self, failure: &CreationFailure) {
        self.entities
            .entry(failure.entity.clone())
            .or_default()
            .failures
            .push(FailureRecord {
                fields: failure.fields.clone(),
                message: failure.message.clone(),
            });
    }

    pub fn entity(&self, entity: &str) -> Option<&EntitySummary> {
        self.entities.get(entity)
    }

    pub fn entities(&self) -> &BTreeMap<String, EntitySummary> {
        &self.entities
    }

    pub fn total_created(&self) -> u64 {
        self.entities.values().map(|summary| summary.count).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.entities.values().map(|summary| summary.failures.len()).sum()
    }

    /// One `<entity>: <count>` line per entity type with at least one creation.
    pub fn progress_lines(&self) -> Vec<String> {
        self.entities
            .iter()
            .filter(|(_, summary)| summary.count > 0)
            .map(|(entity, summary)| format!("{entity}: {}", summary.count))
            .collect()
    }

    pub fn final_lines(&self) -> Vec<String> {
        self.entities
            .iter()
            .map(|(entity, summary)| summary.final_line(entity))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(entity: &str) -> CreationFailure {
        CreationFailure {
            entity: entity.to_string(),
            fields: FieldValues::new(),
            message: "rejected".to_string(),
        }
    }

    #[test]
    fn tracks_first_and_last_ids() {
        let mut summary = SummaryReporter::new();
        summary.record_success("Contact", EntityId(7));
        summary.record_success("Contact", EntityId(8));
        summary.record_success("Contact", EntityId(9));
        summary.record_success("Email", EntityId(3));

        assert_eq!(summary.progress_lines(), vec!["Contact: 3", "Email: 1"]);
        assert_eq!(summary.final_lines(), vec!["Contact: 3 (7 to 9)", "Email: 1 (3)"]);
        assert_eq!(summary.total_created(), 4);
    }

    #[test]
    fn failures_are_counted_separately() {
        let mut summary = SummaryReporter::new();
        summary.record_success("Email", EntityId(4));
        summary.record_failure(&failure("Email"));
        summary.record_failure(&failure("Phone"));

        assert_eq!(summary.progress_lines(), vec!["Email: 1"]);
        assert_eq!(
            summary.final_lines(),
            vec!["Email: 1 (4), 1 failed", "Phone: 0 (unknown ids), 1 failed"]
        );
        assert_eq!(summary.total_failed(), 2);
    }

    #[test]
    fn out_of_order_ids_are_unknown() {
        let mut summary = SummaryReporter::new();
        summary.record_success("Note", EntityId(10));
        summary.record_success("Note", EntityId(2));
        assert_eq!(summary.final_lines(), vec!["Note: 2 (unknown ids)"]);
    }

    #[test]
    fn serializes_as_entity_map() {
        let mut summary = SummaryReporter::new();
        summary.record_success("Contact", EntityId(1));
        let json = serde_json::to_value(&summary).expect("json");
        assert_eq!(json["Contact"]["count"], 1);
        assert_eq!(json["Contact"]["first_id"], 1);
    }
}
