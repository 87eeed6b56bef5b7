//! Schema synthesis.
//!
//! A [`StructBuilder`] turns the field list of one struct into an object schema and
//! reports the struct types it references. [`SchemaSynthesizer`] drives builders from a
//! worklist until every reachable type has a definition in the [`SchemaRegistry`].

use crate::config::BuildConfig;
use crate::error::Diagnostic;
use crate::schema::{
    basic_schema, keyword_schema, typed_value, Projection, Schema, SchemaKind, SchemaRegistry,
};
use crate::tag::FieldTag;
use crate::walker::{FieldDescriptor, TypeHandle, TypeKey, TypeWalker};
use log::{debug, warn};
use std::collections::{BTreeMap, VecDeque};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SynthError {
    #[error("property {property:?} is produced by both {first} and {second}")]
    DuplicateProperty {
        property: String,
        first: String,
        second: String,
    },
}

/// Tag conventions used while building object schemas.
#[derive(Debug, Clone)]
pub struct SynthOptions {
    pub name_tag_keys: Vec<String>,
    pub visibility_tag: String,
}

impl SynthOptions {
    pub fn from_config(config: &BuildConfig) -> Self {
        Self {
            name_tag_keys: config.name_tag_keys.clone(),
            visibility_tag: config.visibility_tag.clone(),
        }
    }
}

/// Builds the definition of one struct under one projection.
pub struct StructBuilder {
    key: TypeKey,
    projection: Projection,
    fields: Vec<FieldDescriptor>,
}

impl StructBuilder {
    pub fn new(key: TypeKey, projection: Projection, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            key,
            projection,
            fields,
        }
    }

    /// Returns the object schema together with the struct types its properties reference.
    pub fn build(
        self,
        registry: &mut SchemaRegistry,
        options: &SynthOptions,
    ) -> Result<(Schema, Vec<TypeKey>), SynthError> {
        debug!("Building {:?} schema for {}", self.projection, self.key);
        build_schema(&self.fields, self.projection, registry, options)
    }
}

/// Builds an object schema from a field list.
///
/// # Arguments
/// * `fields` - Fields as produced by the walker
/// * `projection` - `Public` keeps only fields carrying the visibility marker
/// * `registry` - Allocates the names used in `$ref`s
///
/// # Returns
/// The schema and the de-duplicated list of struct types that still need definitions
pub fn build_schema(
    fields: &[FieldDescriptor],
    projection: Projection,
    registry: &mut SchemaRegistry,
    options: &SynthOptions,
) -> Result<(Schema, Vec<TypeKey>), SynthError> {
    let mut properties: BTreeMap<String, Schema> = BTreeMap::new();
    let mut sources: BTreeMap<String, &str> = BTreeMap::new();
    let mut required = Vec::new();
    let mut nested = Vec::new();

    for field in fields {
        if !is_exported(&field.name) {
            continue;
        }
        let tag = FieldTag::parse(&field.tag);
        if tag.is_skipped(&options.name_tag_keys) {
            debug!("Skipping field {}", field.name);
            continue;
        }
        if projection == Projection::Public && !tag.has_marker(&options.visibility_tag) {
            continue;
        }

        let name = tag
            .property_name(&options.name_tag_keys)
            .unwrap_or_else(|| field.name.clone());
        if let Some(first) = sources.get(&name) {
            return Err(SynthError::DuplicateProperty {
                property: name,
                first: first.to_string(),
                second: field.name.clone(),
            });
        }

        let mut schema = match tag.swagger_type().and_then(swagger_type_schema) {
            Some(schema) => schema,
            None => handle_schema(&field.handle, projection, registry, &mut nested),
        };
        if tag.is_stringified() && schema.kind() == SchemaKind::Primitive {
            schema = Schema::primitive("string", None);
        }
        if schema.kind() != SchemaKind::Reference {
            apply_tag(&mut schema, &tag);
        }

        if !tag.is_omitempty(&options.name_tag_keys) {
            required.push(name.clone());
        }
        sources.insert(name.clone(), &field.name);
        properties.insert(name, schema);
    }

    Ok((Schema::object(properties, required), nested))
}

/// Schema for a resolved handle. Struct types become references; their keys are
/// appended to `nested` once each.
pub fn handle_schema(
    handle: &TypeHandle,
    projection: Projection,
    registry: &mut SchemaRegistry,
    nested: &mut Vec<TypeKey>,
) -> Schema {
    match handle {
        TypeHandle::Basic(kind) => basic_schema(*kind),
        TypeHandle::Struct(key) => {
            let name = registry.name_for(key, projection);
            if !nested.contains(key) {
                nested.push(key.clone());
            }
            Schema::reference(&name)
        }
        TypeHandle::Slice(inner) => {
            Schema::array(handle_schema(inner, projection, registry, nested))
        }
        TypeHandle::Map(_, value) => {
            Schema::map(handle_schema(value, projection, registry, nested))
        }
        TypeHandle::Any | TypeHandle::Unresolved(_) => Schema::any(),
    }
}

fn is_exported(name: &str) -> bool {
    name.chars().next().map(char::is_uppercase).unwrap_or(false)
}

/// `swaggertype:"string"`, `swaggertype:"primitive,integer"` or `swaggertype:"array,number"`.
fn swagger_type_schema(value: &str) -> Option<Schema> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    match parts.as_slice() {
        ["array", item] => keyword_schema(item).map(Schema::array),
        ["primitive", keyword] | [keyword] => keyword_schema(keyword),
        _ => None,
    }
}

fn apply_tag(schema: &mut Schema, tag: &FieldTag) {
    let value_type = match schema.kind() {
        SchemaKind::Array => schema
            .items
            .as_ref()
            .and_then(|items| items.schema_type.clone()),
        _ => schema.schema_type.clone(),
    };

    if let Some(format) = tag.format() {
        schema.format = Some(format.to_string());
    }
    if let Some(default) = tag.default_value() {
        schema.default = Some(typed_value(value_type.as_deref(), default));
    }
    if let Some(example) = tag.example() {
        schema.example = Some(typed_value(value_type.as_deref(), example));
    }
    let enums = tag.enums();
    if !enums.is_empty() {
        let values = enums
            .iter()
            .map(|v| typed_value(value_type.as_deref(), v))
            .collect();
        match schema.items.as_mut() {
            Some(items) => items.enum_values = Some(values),
            None => schema.enum_values = Some(values),
        }
    }
    schema.minimum = tag.minimum().or(schema.minimum);
    schema.maximum = tag.maximum().or(schema.maximum);
    if tag.is_nullable() {
        schema.nullable = Some(true);
    }
}

/// Produces definitions for every struct reachable from the types it is asked about.
pub struct SchemaSynthesizer<'l> {
    walker: TypeWalker<'l>,
    options: SynthOptions,
    diagnostics: Vec<Diagnostic>,
}

impl<'l> SchemaSynthesizer<'l> {
    pub fn new(walker: TypeWalker<'l>, options: SynthOptions) -> Self {
        Self {
            walker,
            options,
            diagnostics: Vec::new(),
        }
    }

    pub fn walker(&mut self) -> &mut TypeWalker<'l> {
        &mut self.walker
    }

    /// Drains the diagnostics of the synthesizer and its walker.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        let mut diagnostics = self.walker.take_diagnostics();
        diagnostics.append(&mut self.diagnostics);
        diagnostics
    }

    /// Schema for a handle used directly by an operation, defining every struct it reaches.
    pub fn schema_for(
        &mut self,
        handle: &TypeHandle,
        projection: Projection,
        registry: &mut SchemaRegistry,
    ) -> Schema {
        let mut nested = Vec::new();
        let schema = handle_schema(handle, projection, registry, &mut nested);
        for key in nested {
            self.define(&key, projection, registry);
        }
        schema
    }

    /// Ensures `key` and everything it references are defined; returns its definition name.
    ///
    /// Types are processed from a worklist. A type whose name already holds a definition
    /// is skipped, which terminates on cyclic graphs.
    pub fn define(
        &mut self,
        key: &TypeKey,
        projection: Projection,
        registry: &mut SchemaRegistry,
    ) -> String {
        let root_name = registry.name_for(key, projection);
        let mut worklist = VecDeque::from([key.clone()]);

        while let Some(next) = worklist.pop_front() {
            let name = registry.name_for(&next, projection);
            if registry.contains(&name) {
                continue;
            }

            let schema = match self.walker.shallow_fields_for_key(&next) {
                Ok(fields) => match StructBuilder::new(next.clone(), projection, fields)
                    .build(registry, &self.options)
                {
                    Ok((schema, nested)) => {
                        worklist.extend(nested);
                        schema
                    }
                    Err(e) => self.degrade(&next, e.to_string()),
                },
                Err(e) => self.degrade(&next, e.to_string()),
            };
            debug!("Defined {}", name);
            registry.insert(&name, schema);
        }

        root_name
    }

    fn degrade(&mut self, key: &TypeKey, message: String) -> Schema {
        let diagnostic = Diagnostic::new(key.qualified_name(), message);
        warn!("{}", diagnostic);
        self.diagnostics.push(diagnostic);
        Schema::any()
    }
}
