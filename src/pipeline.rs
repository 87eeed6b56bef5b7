//! The `build_document` entry point.
//!
//! One sequential pass: load the entry package and read the general API info from the
//! entry file, parse the comments of every function in the scanned packages into
//! operations, resolve the types they mention into definitions, and assemble the
//! document. Problems that only affect one declaration or one type are collected as
//! diagnostics; the build fails only for a missing entry package or file, an invalid
//! configuration, or a route collision.

use crate::annotation::{
    parse_general_info, parse_operations, primitive_keyword, HeaderTarget, Operation,
    ParamLocation, ParamSpec, ParamType, ResponseShape, ResponseSpec,
};
use crate::assembler::DocumentAssembler;
use crate::config::BuildConfig;
use crate::document::{
    HeaderObject, OperationObject, ParameterObject, ResponseObject, SwaggerDocument,
};
use crate::error::{Diagnostic, Error, Result};
use crate::loader::PackageLoader;
use crate::schema::{basic_schema, keyword_schema, typed_value, Projection, Schema, SchemaRegistry};
use crate::synthesizer::{SchemaSynthesizer, SynthOptions};
use crate::walker::{Resolved, TypeHandle, TypeWalker};
use log::{debug, info, warn};
use std::collections::BTreeMap;

/// Result of a successful build.
#[derive(Debug)]
pub struct BuildOutput {
    pub document: SwaggerDocument,
    /// Recoverable problems found during the build.
    pub diagnostics: Vec<Diagnostic>,
}

impl BuildOutput {
    pub fn definition(&self, name: &str) -> Option<&Schema> {
        self.document.definitions.get(name)
    }
}

/// Builds the API document for the packages reachable through `loader`.
///
/// # Arguments
/// * `loader` - Source of parsed packages
/// * `config` - Entry package, packages to scan and tag conventions
///
/// # Returns
/// The document with its diagnostics, or the fatal error that stopped the build
pub fn build_document(loader: &dyn PackageLoader, config: &BuildConfig) -> Result<BuildOutput> {
    config.validate()?;
    info!("Building document for {}", config.entry_package);

    let synthesizer = SchemaSynthesizer::new(
        TypeWalker::new(loader, config),
        SynthOptions::from_config(config),
    );
    let mut resolver = OperationResolver {
        synthesizer,
        public_suffix: config.public_suffix.clone(),
        diagnostics: Vec::new(),
    };

    let entry = resolver
        .synthesizer
        .walker()
        .package(&config.entry_package)
        .map_err(|source| Error::EntryPackage {
            path: config.entry_package.clone(),
            source,
        })?;
    let entry_file = entry.file(&config.entry_file).ok_or_else(|| Error::EntryFile {
        package: entry.path.clone(),
        file: config.entry_file.clone(),
    })?;

    let mut lines = entry_file.package_doc.clone();
    if let Some(main) = entry_file.funcs.iter().find(|f| f.name == "main") {
        lines.extend(main.doc.iter().cloned());
    }
    let (general, errors) = parse_general_info(&lines);
    let entry_location = format!("{}/{}", entry.path, entry_file.name);
    for e in errors {
        resolver.report(&entry_location, e.to_string());
    }

    let mut assembler =
        DocumentAssembler::new(general, SchemaRegistry::new(&config.public_suffix));

    let scan = config.packages_to_scan();
    resolver.synthesizer.walker().preload(&scan);
    for package_path in scan {
        let package = match resolver.synthesizer.walker().package(&package_path) {
            Ok(package) => package,
            Err(e) => {
                resolver.report(&package_path, format!("package skipped: {}", e));
                continue;
            }
        };
        debug!("Scanning package {}", package.path);

        for file in &package.files {
            for func in &file.funcs {
                if func.doc.is_empty() {
                    continue;
                }
                let origin = format!("{}/{}:{}", package.path, file.name, func.name);
                let operations = match parse_operations(&func.doc) {
                    Ok(operations) => operations,
                    Err(e) => {
                        resolver.report(&origin, format!("operation rejected: {}", e));
                        continue;
                    }
                };

                let site = Site {
                    package: &package.path,
                    file: &file.name,
                    origin: &origin,
                };
                for operation in operations {
                    let object = resolver.resolve(&operation, &site, assembler.registry_mut());
                    assembler.add_operation(&operation.path, operation.method, object, &origin)?;
                }
            }
        }
    }

    let mut diagnostics = resolver.diagnostics;
    diagnostics.extend(resolver.synthesizer.take_diagnostics());
    let (document, assembly_diagnostics) = assembler.finish();
    diagnostics.extend(assembly_diagnostics);

    info!(
        "Built {} operations, {} definitions, {} diagnostics",
        document.operation_count(),
        document.definitions.len(),
        diagnostics.len()
    );
    Ok(BuildOutput {
        document,
        diagnostics,
    })
}

/// Where an operation was declared; type names in its comments resolve against this file.
struct Site<'a> {
    package: &'a str,
    file: &'a str,
    origin: &'a str,
}

/// Turns parsed operations into document objects, defining the types they mention.
struct OperationResolver<'l> {
    synthesizer: SchemaSynthesizer<'l>,
    public_suffix: String,
    diagnostics: Vec<Diagnostic>,
}

impl<'l> OperationResolver<'l> {
    fn report(&mut self, location: &str, message: String) {
        let diagnostic = Diagnostic::new(location, message);
        warn!("{}", diagnostic);
        self.diagnostics.push(diagnostic);
    }

    fn resolve(
        &mut self,
        operation: &Operation,
        site: &Site,
        registry: &mut SchemaRegistry,
    ) -> OperationObject {
        let parameters = operation
            .params
            .iter()
            .map(|param| self.parameter(param, site, registry))
            .collect();

        let mut responses = BTreeMap::new();
        for response in &operation.responses {
            let object = self.response(response, site, registry);
            for code in &response.codes {
                responses.insert(code.to_string(), object.clone());
            }
        }
        for header in &operation.headers {
            let object = HeaderObject {
                header_type: header.header_type.clone(),
                description: Some(header.description.clone()).filter(|d| !d.is_empty()),
            };
            match &header.target {
                HeaderTarget::All => {
                    for response in responses.values_mut() {
                        response.headers.insert(header.name.clone(), object.clone());
                    }
                }
                HeaderTarget::Codes(codes) => {
                    for code in codes {
                        match responses.get_mut(&code.to_string()) {
                            Some(response) => {
                                response.headers.insert(header.name.clone(), object.clone());
                            }
                            None => self.report(
                                site.origin,
                                format!("header {} targets undeclared response {}", header.name, code),
                            ),
                        }
                    }
                }
            }
        }

        OperationObject {
            tags: operation.tags.clone(),
            summary: operation.summary.clone(),
            description: operation.description.clone(),
            operation_id: operation.id.clone(),
            consumes: operation.consumes.clone(),
            produces: operation.produces.clone(),
            parameters,
            responses,
            security: if operation.security.is_empty() {
                None
            } else {
                Some(operation.security.clone())
            },
            deprecated: operation.deprecated,
        }
    }

    fn parameter(
        &mut self,
        param: &ParamSpec,
        site: &Site,
        registry: &mut SchemaRegistry,
    ) -> ParameterObject {
        let mut object = ParameterObject {
            name: param.name.clone(),
            location: param.location.as_str().to_string(),
            description: Some(param.description.clone()).filter(|d| !d.is_empty()),
            required: param.required,
            ..Default::default()
        };

        let value_type = if param.location == ParamLocation::Body {
            let schema = self.param_type_schema(&param.data_type, site, registry);
            let value_type = schema.schema_type.clone();
            object.schema = Some(schema);
            value_type
        } else {
            let schema = self.simple_schema(param, site);
            object.param_type = schema.schema_type;
            object.format = schema.format;
            object.items = schema.items.map(|items| *items);
            object
                .items
                .as_ref()
                .map_or(object.param_type.clone(), |items| items.schema_type.clone())
        };

        let modifiers = &param.modifiers;
        let value_type = value_type.as_deref();
        if !modifiers.enums.is_empty() {
            object.enum_values = Some(
                modifiers
                    .enums
                    .iter()
                    .map(|v| typed_value(value_type, v))
                    .collect(),
            );
        }
        object.default = modifiers.default.as_deref().map(|v| typed_value(value_type, v));
        object.example = modifiers.example.as_deref().map(|v| typed_value(value_type, v));
        object.minimum = modifiers.minimum;
        object.maximum = modifiers.maximum;
        object.min_length = modifiers.min_length;
        object.max_length = modifiers.max_length;
        object.collection_format = modifiers.collection_format.clone();
        if let Some(format) = &modifiers.format {
            object.format = Some(format.clone());
        }
        object
    }

    fn param_type_schema(
        &mut self,
        data_type: &ParamType,
        site: &Site,
        registry: &mut SchemaRegistry,
    ) -> Schema {
        match data_type {
            ParamType::Primitive(keyword) => keyword_schema(keyword).unwrap_or_else(Schema::any),
            ParamType::Array(inner) => Schema::array(self.param_type_schema(inner, site, registry)),
            ParamType::Model(spelling) => self.type_schema(spelling, site, registry),
        }
    }

    /// Schema of a non-body parameter; only primitives and arrays of primitives are allowed.
    fn simple_schema(&mut self, param: &ParamSpec, site: &Site) -> Schema {
        let schema = match &param.data_type {
            ParamType::Primitive(keyword) if keyword != "object" => keyword_schema(keyword),
            ParamType::Array(inner) => match inner.as_ref() {
                ParamType::Primitive(keyword) if keyword != "object" => {
                    keyword_schema(keyword).map(Schema::array)
                }
                _ => None,
            },
            ParamType::Model(spelling) => self
                .resolve_model(spelling, site)
                .and_then(|(resolved, _)| primitive_handle_schema(&resolved.handle)),
            _ => None,
        };

        schema.unwrap_or_else(|| {
            self.report(
                site.origin,
                format!(
                    "{} parameter {} must have a primitive type, using string",
                    param.location.as_str(),
                    param.name
                ),
            );
            Schema::primitive("string", None)
        })
    }

    fn response(
        &mut self,
        response: &ResponseSpec,
        site: &Site,
        registry: &mut SchemaRegistry,
    ) -> ResponseObject {
        let schema = match (response.shape, response.type_ref.as_deref()) {
            (None, _) => None,
            (Some(ResponseShape::Object), Some(spelling)) => {
                Some(self.type_schema(spelling, site, registry))
            }
            (Some(ResponseShape::Array), Some(spelling)) => {
                Some(Schema::array(self.type_schema(spelling, site, registry)))
            }
            (Some(ResponseShape::Object), None) | (Some(ResponseShape::Array), None) => None,
            (Some(ResponseShape::String), _) => Some(Schema::primitive("string", None)),
            (Some(ResponseShape::Integer), _) => Some(Schema::primitive("integer", None)),
            (Some(ResponseShape::Number), _) => Some(Schema::primitive("number", None)),
            (Some(ResponseShape::Boolean), _) => Some(Schema::primitive("boolean", None)),
            (Some(ResponseShape::File), _) => Some(Schema::primitive("file", None)),
        };

        let description = if response.description.is_empty() {
            response
                .codes
                .first()
                .map(|code| code.reason().to_string())
                .unwrap_or_default()
        } else {
            response.description.clone()
        };

        ResponseObject {
            description,
            schema,
            headers: BTreeMap::new(),
        }
    }

    /// Schema for a type named in a comment: a primitive keyword, `[]T`, or a declared type.
    fn type_schema(&mut self, spelling: &str, site: &Site, registry: &mut SchemaRegistry) -> Schema {
        if let Some(schema) = primitive_keyword(spelling).and_then(keyword_schema) {
            return schema;
        }
        if let Some(inner) = spelling.strip_prefix("[]") {
            return Schema::array(self.type_schema(inner, site, registry));
        }

        match self.resolve_model(spelling, site) {
            Some((resolved, projection)) => {
                self.synthesizer
                    .schema_for(&resolved.handle, projection, registry)
            }
            None => Schema::any(),
        }
    }

    /// Resolves a type spelled in a comment.
    ///
    /// A name ending in the public suffix that is not itself declared selects the public
    /// projection of the type without the suffix.
    fn resolve_model(&mut self, spelling: &str, site: &Site) -> Option<(Resolved, Projection)> {
        match self
            .synthesizer
            .walker()
            .probe_in_file(site.package, site.file, spelling)
        {
            Ok(resolved) if !is_unresolved(&resolved.handle) => {
                return Some((resolved, Projection::Full));
            }
            Ok(_) => {}
            Err(e) => {
                self.report(site.origin, e.to_string());
                return None;
            }
        }

        if let Some(stem) = spelling
            .strip_suffix(self.public_suffix.as_str())
            .filter(|stem| !stem.is_empty() && !stem.ends_with('.'))
        {
            let probe = self
                .synthesizer
                .walker()
                .probe_in_file(site.package, site.file, stem);
            if let Ok(resolved) = probe {
                if matches!(resolved.handle, TypeHandle::Struct(_)) {
                    debug!("{} selects the public projection of {}", spelling, stem);
                    return Some((resolved, Projection::Public));
                }
            }
        }

        // Resolve again with diagnostics enabled so the failure is reported.
        let resolved = self
            .synthesizer
            .walker()
            .resolve_in_file(site.package, site.file, spelling, site.origin);
        match resolved {
            Ok(resolved) => Some((resolved, Projection::Full)),
            Err(e) => {
                self.report(site.origin, e.to_string());
                None
            }
        }
    }
}

fn is_unresolved(handle: &TypeHandle) -> bool {
    match handle {
        TypeHandle::Unresolved(_) => true,
        TypeHandle::Slice(inner) => is_unresolved(inner),
        TypeHandle::Map(key, value) => is_unresolved(key) || is_unresolved(value),
        _ => false,
    }
}

fn primitive_handle_schema(handle: &TypeHandle) -> Option<Schema> {
    match handle {
        TypeHandle::Basic(kind) => Some(basic_schema(*kind)),
        TypeHandle::Slice(inner) => match inner.as_ref() {
            TypeHandle::Basic(kind) => Some(Schema::array(basic_schema(*kind))),
            _ => None,
        },
        _ => None,
    }
}
