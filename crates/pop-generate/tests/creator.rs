use std::cell::RefCell;
use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use pop_core::{EntityApi, EntityId, FieldDescriptor, FieldValue, FieldValues, Filter, filter_key};
use pop_generate::{
    BufferedOutput, Catalog, EntityCache, EntityCreator, FakerValueGenerator, MemoryBackend,
    RunContext, SummaryReporter,
};
use pop_plan::{DefaultBlock, DefinitionBuilder, EntityDefaults, SpecError, parse_instructions};

const CATALOG: &str = r#"
entities:
  Contact:
    fields:
      - { name: contact_type, required: true, pseudoconstant: true, options: [Individual, Organization, Household] }
      - { name: first_name }
      - { name: last_name }
      - { name: organization_name }
      - { name: household_name }
      - { name: email }
      - { name: source }
    existing:
      - { id: 1, fields: { contact_type: Individual } }
      - { id: 2, fields: { contact_type: Organization } }
  Email:
    fields:
      - { name: contact_id, required: true, fk_entity: Contact }
      - { name: email, required: true }
      - { name: location_type_id, required: true, pseudoconstant: true, options: [1, 2, 3] }
  Activity:
    fields:
      - { name: status_id, required: true, pseudoconstant: true, options: [1, 2, 5] }
      - { name: source_contact_id, required: true, fk_entity: Contact }
      - { name: subject }
  Event:
    fields:
      - { name: title, required: true }
      - { name: start_date }
      - { name: end_date }
"#;

/// Records every bulk fetch so cache behaviour can be observed.
struct CountingApi {
    inner: MemoryBackend,
    fetches: RefCell<Vec<String>>,
}

impl CountingApi {
    fn new(catalog: &str) -> Self {
        Self {
            inner: backend(catalog),
            fetches: RefCell::new(Vec::new()),
        }
    }
}

impl EntityApi for CountingApi {
    fn list_entity_types(&self) -> pop_core::Result<BTreeSet<String>> {
        self.inner.list_entity_types()
    }

    fn creatable_fields(&self, entity: &str) -> pop_core::Result<Vec<FieldDescriptor>> {
        self.inner.creatable_fields(entity)
    }

    fn valid_options(&self, entity: &str, field: &str) -> pop_core::Result<Vec<FieldValue>> {
        self.inner.valid_options(entity, field)
    }

    fn fetch_existing(
        &self,
        entity: &str,
        filter: &Filter,
        limit: usize,
    ) -> pop_core::Result<Vec<EntityId>> {
        self.fetches.borrow_mut().push(filter_key(entity, Some(filter)));
        self.inner.fetch_existing(entity, filter, limit)
    }

    fn create(&mut self, entity: &str, fields: &FieldValues) -> pop_core::Result<EntityId> {
        self.inner.create(entity, fields)
    }
}

fn backend(catalog: &str) -> MemoryBackend {
    MemoryBackend::new(Catalog::parse(catalog).expect("catalog"))
}

fn fixed_now() -> NaiveDateTime {
    NaiveDateTime::parse_from_str("2024-06-15 12:00:00", "%Y-%m-%d %H:%M:%S").expect("now")
}

fn run<A: EntityApi>(
    api: &mut A,
    spec: &str,
    seed: u64,
) -> (SummaryReporter, BufferedOutput, Result<(), SpecError>) {
    let instructions = parse_instructions(spec, "test.yml").expect("spec");
    let generator = FakerValueGenerator::with_now(fixed_now());
    let mut output = BufferedOutput::default();
    let builder = DefinitionBuilder::new(&*api, EntityDefaults::empty()).expect("builder");
    let ctx = RunContext::new(seed, EntityCache::default());
    let mut creator = EntityCreator::new(api, &generator, &mut output, builder, ctx);
    let result = creator.run(&instructions);
    let summary = creator.into_context().summary;
    (summary, output, result)
}

fn field<'a>(fields: &'a FieldValues, name: &str) -> &'a FieldValue {
    fields
        .get(name)
        .unwrap_or_else(|| panic!("missing field {name} in {fields:?}"))
}

#[test]
fn fixed_and_degenerate_range_counts() {
    for (count, expected) in [("3-3", 3), ("1-1", 1), ("5", 5)] {
        let mut api = backend(CATALOG);
        let spec = format!("- Event: {count}\n  fields:\n    title: Gala\n");
        let (summary, _, result) = run(&mut api, &spec, 1);
        result.expect("run");
        assert_eq!(summary.entity("Event").map(|s| s.count), Some(expected));
        assert_eq!(api.created()["Event"].len() as u64, expected);
    }
}

#[test]
fn ranges_stay_within_bounds() {
    let mut api = backend(CATALOG);
    let (summary, _, result) = run(&mut api, "- Event: 2-4\n  fields:\n    title: Gala\n", 11);
    result.expect("run");
    let count = summary.entity("Event").map(|s| s.count).unwrap_or_default();
    assert!((2..=4).contains(&count), "count was {count}");
}

#[test]
fn aliases_create_contacts_with_contact_type() {
    let mut api = backend(CATALOG);
    let (summary, _, result) = run(&mut api, "- Household: 2\n", 3);
    result.expect("run");

    assert!(!api.created().contains_key("Household"));
    let contacts = &api.created()["Contact"];
    assert_eq!(contacts.len(), 2);
    for record in contacts {
        assert_eq!(field(&record.fields, "contact_type"), &FieldValue::from("Household"));
    }
    assert_eq!(summary.entity("Contact").map(|s| s.count), Some(2));
}

#[test]
fn required_fields_are_filled_without_overwriting() {
    let mut api = backend(CATALOG);
    let (_, _, result) = run(&mut api, "- Activity: 4\n  fields:\n    status_id: 5\n", 8);
    result.expect("run");

    for record in &api.created()["Activity"] {
        assert_eq!(field(&record.fields, "status_id"), &FieldValue::Int(5));
        let contact = field(&record.fields, "source_contact_id").as_i64();
        assert!(matches!(contact, Some(1 | 2)), "unexpected contact {contact:?}");
    }
}

#[test]
fn children_are_linked_to_their_parent() {
    let mut api = backend(CATALOG);
    let spec = "- Individual: 2\n  children:\n    - Email: 1\n      fields:\n        email: someone@example.org\n";
    let (summary, _, result) = run(&mut api, spec, 21);
    result.expect("run");

    let contact_ids: Vec<i64> = api.created()["Contact"].iter().map(|r| r.id.0).collect();
    let linked: Vec<i64> = api.created()["Email"]
        .iter()
        .filter_map(|record| field(&record.fields, "contact_id").as_i64())
        .collect();
    assert_eq!(linked, contact_ids);
    for record in &api.created()["Email"] {
        let location = field(&record.fields, "location_type_id").as_i64();
        assert!(matches!(location, Some(1..=3)));
    }
    assert_eq!(summary.entity("Email").map(|s| s.count), Some(2));
}

#[test]
fn failed_parent_creates_no_children() {
    let mut api = backend(CATALOG);
    let spec = "- Contact: 2\n  fields:\n    contact_type: Alien\n  children:\n    - Email: 1\n      fields:\n        email: x@example.org\n";
    let (summary, output, result) = run(&mut api, spec, 5);
    result.expect("failures are not fatal");

    assert!(api.attempts().iter().all(|(entity, _)| entity == "Contact"));
    assert_eq!(api.attempts().len(), 2);
    let contact = summary.entity("Contact").expect("contact summary");
    assert_eq!(contact.count, 0);
    assert_eq!(contact.failures.len(), 2);
    assert_eq!(
        contact.failures[0].fields.get("contact_type"),
        Some(&FieldValue::from("Alien"))
    );
    assert!(output.errors.iter().any(|line| line.contains("Could not create 'Contact'")));
}

#[test]
fn filtered_references_hit_one_cache_entry() {
    let mut api = CountingApi::new(CATALOG);
    let spec = "- Activity: 5\n  fields:\n    source_contact_id: r.Contact,contact_type=Organization\n";
    let (_, _, result) = run(&mut api, spec, 2);
    result.expect("run");

    let fetches = api.fetches.borrow();
    let organization_fetches = fetches
        .iter()
        .filter(|key| key.contains("Organization"))
        .count();
    assert_eq!(organization_fetches, 1, "fetches: {fetches:?}");
    for record in &api.inner.created()["Activity"] {
        assert_eq!(field(&record.fields, "source_contact_id"), &FieldValue::Int(2));
    }
}

#[test]
fn alias_references_select_that_contact_type() {
    let mut api = backend(CATALOG);
    let spec = "- Activity: 3\n  fields:\n    source_contact_id: r.Individual\n";
    let (_, _, result) = run(&mut api, spec, 4);
    result.expect("run");
    for record in &api.created()["Activity"] {
        assert_eq!(field(&record.fields, "source_contact_id"), &FieldValue::Int(1));
    }
}

#[test]
fn zero_weight_choices_never_land() {
    let mut api = backend(CATALOG);
    let spec = "- Individual: 20\n  fields:\n    source: {Web: 0, Phone: 1}\n";
    let (_, _, result) = run(&mut api, spec, 9);
    result.expect("run");
    assert!(
        api.created()["Contact"]
            .iter()
            .all(|record| field(&record.fields, "source") == &FieldValue::from("Phone"))
    );
}

#[test]
fn weighted_choice_can_yield_a_modifier() {
    let mut api = backend(CATALOG);
    let spec = "- Individual: 3\n  fields:\n    first_name: {'f.firstName': 1}\n";
    let (_, _, result) = run(&mut api, spec, 10);
    result.expect("run");
    for record in &api.created()["Contact"] {
        let name = field(&record.fields, "first_name").as_str().unwrap_or_default();
        assert!(!name.is_empty() && name != "f.firstName");
    }
}

#[test]
fn populators_fill_names_and_email() {
    let mut api = backend(CATALOG);
    let spec = "- Individual: 2\n  populators: [contact_name, contact_email]\n";
    let (_, _, result) = run(&mut api, spec, 12);
    result.expect("run");
    for record in &api.created()["Contact"] {
        assert!(field(&record.fields, "first_name").as_str().is_some());
        let email = field(&record.fields, "email").to_string();
        let (local, domain) = email.split_once('@').expect("address");
        assert!(local.contains('.'), "{email}");
        assert!(domain.starts_with("example."), "{email}");
    }
}

#[test]
fn same_seed_same_records() {
    let spec = "- Individual: 3\n  fields:\n    first_name: f.firstName\n    source: [Web, Phone, Mail]\n  children:\n    - Email: 1-2\n      fields:\n        email: f.safeEmail\n";
    let mut first = backend(CATALOG);
    let mut second = backend(CATALOG);
    run(&mut first, spec, 77).2.expect("first run");
    run(&mut second, spec, 77).2.expect("second run");
    assert_eq!(first.created(), second.created());
}

#[test]
fn unknown_generator_is_fatal_before_any_create() {
    let mut api = backend(CATALOG);
    let spec = "- Individual: 2\n  fields:\n    first_name: f.favouriteColour\n";
    let (_, _, result) = run(&mut api, spec, 1);
    let err = result.expect_err("unknown generator");
    assert!(matches!(err, SpecError::UnknownGenerator { ref name, .. } if name == "favouriteColour"));
    assert!(api.attempts().is_empty());
}

#[test]
fn empty_lookup_fails_only_that_entity() {
    let catalog = r#"
entities:
  Contact:
    fields:
      - { name: contact_type, required: true }
  Email:
    fields:
      - { name: contact_id, required: true, fk_entity: Contact }
      - { name: email, required: true }
  Event:
    fields:
      - { name: title, required: true }
"#;
    let mut api = backend(catalog);
    let spec = "- Email: 2\n  fields:\n    email: a@example.org\n- Event: 1\n  fields:\n    title: Gala\n";
    let (summary, _, result) = run(&mut api, spec, 6);
    result.expect("run");

    let email = summary.entity("Email").expect("email summary");
    assert_eq!(email.failures.len(), 2);
    assert!(email.failures[0].message.contains("no existing 'Contact'"));
    assert_eq!(summary.entity("Event").map(|s| s.count), Some(1));
}

#[test]
fn final_summary_replaces_progress_block() {
    let mut api = backend(CATALOG);
    let spec = "- Event: 2\n  fields:\n    title: Gala\n";
    let (summary, output, result) = run(&mut api, spec, 1);
    result.expect("run");
    assert_eq!(output.block, summary.final_lines());
    assert_eq!(output.block, vec!["Event: 2 (3 to 4)"]);
}

#[test]
fn self_nesting_defaults_abort_at_depth_limit() {
    let catalog = r#"
entities:
  Note:
    fields:
      - { name: note_id }
      - { name: subject }
"#;
    let mut api = backend(catalog);
    let defaults = EntityDefaults::empty().with_entity(
        "Note",
        DefaultBlock::from_yaml("children:\n  - Note: 1\n", "Note.yml").expect("defaults"),
    );
    let instructions = parse_instructions("- Note: 1\n", "test.yml").expect("spec");
    let generator = FakerValueGenerator::with_now(fixed_now());
    let mut output = BufferedOutput::default();
    let builder = DefinitionBuilder::new(&api, defaults).expect("builder");
    let mut creator = EntityCreator::new(
        &mut api,
        &generator,
        &mut output,
        builder,
        RunContext::new(1, EntityCache::default()),
    )
    .with_max_depth(4);

    let err = creator.run(&instructions).expect_err("nesting never ends");
    assert!(matches!(err, SpecError::TooDeep { ref entity, limit: 4 } if entity == "Note"));
    let summary = creator.into_context().summary;
    assert_eq!(summary.entity("Note").map(|s| s.count), Some(4));
    // levels 0 through 3 are created before the fifth level is refused
    assert_eq!(api.created()["Note"].len(), 4);
}

#[test]
fn bundled_defaults_give_individuals_names_and_email() {
    let root = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
    let mut api = MemoryBackend::from_path(&root.join("demos/catalog.yml")).expect("catalog");
    let defaults = EntityDefaults::from_dir(&root.join("defaults")).expect("defaults");
    let instructions = parse_instructions("- Individual: 3\n", "test.yml").expect("spec");
    let generator = FakerValueGenerator::with_now(fixed_now());
    let mut output = BufferedOutput::default();
    let builder = DefinitionBuilder::new(&api, defaults).expect("builder");
    let mut creator = EntityCreator::new(
        &mut api,
        &generator,
        &mut output,
        builder,
        RunContext::new(12, EntityCache::default()),
    );
    creator.run(&instructions).expect("run");
    let summary = creator.into_context().summary;
    assert_eq!(summary.entity("Contact").map(|s| s.count), Some(3));

    for record in &api.created()["Contact"] {
        let FieldValue::Text(email) = field(&record.fields, "email") else {
            panic!("email should be text: {:?}", record.fields);
        };
        assert!(email.contains('@'), "unexpected email {email}");
        assert!(matches!(field(&record.fields, "first_name"), FieldValue::Text(_)));
        assert!(matches!(field(&record.fields, "last_name"), FieldValue::Text(_)));
    }
}
