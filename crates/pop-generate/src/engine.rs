use std::io;

use pop_core::{CONTACT_ENTITY, EntityApi, EntityId, FieldValue, FieldValues, is_contact_alias};
use pop_plan::builder::{check_depth, check_generators, parent_link_field};
use pop_plan::{
    Count, Definition, DefinitionBuilder, FieldSpec, FieldSpecs, Instruction, MAX_DEPTH,
    PopulatorKind, SpecError,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::cache::{EntityCache, OptionCache};
use crate::errors::{CreationFailure, LookupError};
use crate::generators::ValueGenerator;
use crate::output::OutputChannel;
use crate::populators::{PopulatorContext, apply as apply_populator};
use crate::resolver::FieldResolver;
use crate::summary::SummaryReporter;

/// Mutable state shared by every creation of one run.
#[derive(Debug)]
pub struct RunContext {
    pub entities: EntityCache,
    pub options: OptionCache,
    pub summary: SummaryReporter,
    pub rng: ChaCha8Rng,
    pub seed: u64,
}

impl RunContext {
    pub fn new(seed: u64, entities: EntityCache) -> Self {
        Self {
            entities,
            options: OptionCache::new(),
            summary: SummaryReporter::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }
}

/// A successfully created entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityHandle {
    /// Backend entity type, i.e. `Contact` for the contact aliases.
    pub entity: String,
    pub id: EntityId,
}

/// Walks definitions depth-first and creates entities through the backend.
pub struct EntityCreator<'a> {
    api: &'a mut dyn EntityApi,
    generator: &'a dyn ValueGenerator,
    output: &'a mut dyn OutputChannel,
    builder: DefinitionBuilder,
    ctx: RunContext,
    max_depth: usize,
}

impl<'a> EntityCreator<'a> {
    pub fn new(
        api: &'a mut dyn EntityApi,
        generator: &'a dyn ValueGenerator,
        output: &'a mut dyn OutputChannel,
        builder: DefinitionBuilder,
        ctx: RunContext,
    ) -> Self {
        Self {
            api,
            generator,
            output,
            builder,
            ctx,
            max_depth: MAX_DEPTH,
        }
    }

    /// Deepest child nesting a run may reach before it aborts with `TooDeep`.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn summary(&self) -> &SummaryReporter {
        &self.ctx.summary
    }

    pub fn into_context(self) -> RunContext {
        self.ctx
    }

    /// Create everything the top-level instructions ask for, then print the summary.
    pub fn run(&mut self, instructions: &[Instruction]) -> Result<(), SpecError> {
        info!(instructions = instructions.len(), seed = self.ctx.seed, "run started");
        emit(self.output.info(&format!("Populating with seed {}", self.ctx.seed)));
        for instruction in instructions {
            let definition = self.builder.build(&*self.api, instruction)?;
            self.create_entities(definition, None)?;
        }
        let summary = &self.ctx.summary;
        info!(
            created = summary.total_created(),
            failed = summary.total_failed(),
            "run finished"
        );
        let lines = summary.final_lines();
        emit(self.output.redraw(&lines));
        Ok(())
    }

    /// Create `definition.count` entities, each followed by its children.
    ///
    /// Returns the handles of the entities created at this level. Creation
    /// failures are recorded and skipped; only spec errors abort.
    pub fn create_entities(
        &mut self,
        definition: Definition,
        parent: Option<&EntityHandle>,
    ) -> Result<Vec<EntityHandle>, SpecError> {
        self.create_nested(definition, parent, 0)
    }

    fn create_nested(
        &mut self,
        definition: Definition,
        parent: Option<&EntityHandle>,
        depth: usize,
    ) -> Result<Vec<EntityHandle>, SpecError> {
        let generator = self.generator;
        check_generators(&definition, &|name: &str| generator.supports(name))?;
        check_depth(&definition, depth, self.max_depth)?;
        let Definition {
            mut entity,
            count,
            mut fields,
            children,
            populators,
        } = definition;

        let count = match count {
            Count::Fixed(count) => count,
            Count::Range { min, max } => self.ctx.rng.random_range(min..=max),
        };
        if is_contact_alias(&entity) {
            fields.insert(
                "contact_type".to_string(),
                FieldSpec::Literal(FieldValue::from(entity.as_str())),
            );
            entity = CONTACT_ENTITY.to_string();
        }
        if let Some(parent) = parent {
            fields.insert(
                parent_link_field(&parent.entity),
                FieldSpec::Literal(FieldValue::from(parent.id)),
            );
        }
        debug!(entity = %entity, count, "creating entities");

        let mut created = Vec::new();
        for _ in 0..count {
            let Ok(handle) = self.populate(&entity, fields.clone(), &populators) else {
                continue;
            };
            for child in &children {
                let child = self.builder.build(&*self.api, child)?;
                self.builder.check_parent_link(&*self.api, &child, &handle.entity)?;
                self.create_nested(child, Some(&handle), depth + 1)?;
            }
            created.push(handle);
        }
        Ok(created)
    }

    /// Resolve and create one entity. Failures are recorded before they are returned.
    pub fn populate(
        &mut self,
        entity: &str,
        fields: FieldSpecs,
        populators: &[PopulatorKind],
    ) -> Result<EntityHandle, CreationFailure> {
        let mut values = FieldValues::new();
        let outcome = match self.resolve_fields(entity, fields, populators, &mut values) {
            Ok(()) => self.api.create(entity, &values).map_err(|err| err.to_string()),
            Err(err) => Err(err.to_string()),
        };

        match outcome {
            Ok(id) => {
                self.ctx.summary.record_success(entity, id);
                self.ctx.entities.register(entity, id);
                info!(entity = %entity, id = %id, "entity created");
                let lines = self.ctx.summary.progress_lines();
                emit(self.output.redraw(&lines));
                Ok(EntityHandle {
                    entity: entity.to_string(),
                    id,
                })
            }
            Err(message) => {
                let failure = CreationFailure {
                    entity: entity.to_string(),
                    fields: values,
                    message,
                };
                self.record_failure(&failure);
                Err(failure)
            }
        }
    }

    fn resolve_fields(
        &mut self,
        entity: &str,
        mut fields: FieldSpecs,
        populators: &[PopulatorKind],
        values: &mut FieldValues,
    ) -> Result<(), LookupError> {
        let Self {
            api,
            generator,
            builder,
            ctx,
            ..
        } = self;
        let api: &dyn EntityApi = &**api;

        let mut hooks = PopulatorContext {
            generator: *generator,
            rng: &mut ctx.rng,
        };
        for populator in populators {
            apply_populator(*populator, entity, &mut fields, &mut hooks)?;
        }

        let mut resolver = FieldResolver {
            api,
            generator: *generator,
            entities: &mut ctx.entities,
            options: &mut ctx.options,
            rng: &mut ctx.rng,
        };
        for (field, spec) in &fields {
            let value = resolver.resolve(entity, field, spec)?;
            values.insert(field.clone(), value);
        }

        let required = builder
            .catalog_mut()
            .required(api, entity)
            .map_err(|err| LookupError::Fields {
                entity: entity.to_string(),
                reason: err.to_string(),
            })?;
        for descriptor in required {
            if values.get(&descriptor.name).is_some_and(|value| !value.is_null()) {
                continue;
            }
            let value = if let Some(target) = &descriptor.fk_entity {
                FieldValue::from(resolver.random_reference(target, &Default::default())?)
            } else if descriptor.pseudoconstant {
                resolver.random_option(entity, &descriptor.name)?
            } else {
                continue;
            };
            values.insert(descriptor.name, value);
        }
        Ok(())
    }

    fn record_failure(&mut self, failure: &CreationFailure) {
        warn!(
            entity = %failure.entity,
            error = %failure.message,
            fields = ?failure.fields,
            "entity creation failed"
        );
        self.ctx.summary.record_failure(failure);
        let attempted = serde_json::to_string_pretty(&failure.fields)
            .unwrap_or_else(|_| format!("{:?}", failure.fields));
        emit(self.output.error(&format!(
            "Could not create '{}' [{}] with fields:",
            failure.entity, failure.message
        )));
        emit(self.output.error(&attempted));
    }
}

fn emit(result: io::Result<()>) {
    if let Err(err) = result {
        debug!(error = %err, "console output failed");
    }
}
