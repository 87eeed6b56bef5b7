use crate::annotation::{GeneralInfo, HttpMethod};
use crate::document::{OperationObject, PathItem, SwaggerDocument};
use crate::error::{Diagnostic, Error, Result};
use crate::schema::{Schema, SchemaRegistry};
use log::{debug, info};
use std::collections::{BTreeMap, HashMap};

/// Collects operations and definitions of one build into a [`SwaggerDocument`].
///
/// The assembler owns the build's [`SchemaRegistry`] and the route map used to detect
/// two declarations claiming the same path and method.
pub struct DocumentAssembler {
    general: GeneralInfo,
    registry: SchemaRegistry,
    paths: BTreeMap<String, PathItem>,
    /// Declaration that registered each `(path, method)`.
    origins: HashMap<(String, HttpMethod), String>,
    /// Declaration that registered each operation id.
    operation_ids: HashMap<String, String>,
    diagnostics: Vec<Diagnostic>,
}

impl DocumentAssembler {
    pub fn new(general: GeneralInfo, registry: SchemaRegistry) -> Self {
        Self {
            general,
            registry,
            paths: BTreeMap::new(),
            origins: HashMap::new(),
            operation_ids: HashMap::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn registry_mut(&mut self) -> &mut SchemaRegistry {
        &mut self.registry
    }

    /// Read-only access to the definitions registered so far.
    pub fn lookup(&self, name: &str) -> Option<&Schema> {
        self.registry.get(name)
    }

    /// Adds an operation.
    ///
    /// # Arguments
    /// * `origin` - Declaration the operation comes from, used in error messages
    ///
    /// # Returns
    /// `Error::RouteCollision` if another declaration already registered the same
    /// path and method
    pub fn add_operation(
        &mut self,
        path: &str,
        method: HttpMethod,
        operation: OperationObject,
        origin: &str,
    ) -> Result<()> {
        let slot = (path.to_string(), method);
        if let Some(first) = self.origins.get(&slot) {
            return Err(Error::RouteCollision {
                method: method.to_string(),
                path: path.to_string(),
                first: first.clone(),
                second: origin.to_string(),
            });
        }

        if let Some(id) = &operation.operation_id {
            match self.operation_ids.get(id) {
                Some(first) => self.diagnostics.push(Diagnostic::new(
                    origin,
                    format!("operation id {:?} is also used by {}", id, first),
                )),
                None => {
                    self.operation_ids.insert(id.clone(), origin.to_string());
                }
            }
        }

        debug!("Adding {} {} from {}", method, path, origin);
        self.origins.insert(slot, origin.to_string());
        self.paths
            .entry(path.to_string())
            .or_default()
            .insert(method.key(), operation);
        Ok(())
    }

    /// Produces the document and the diagnostics recorded while assembling.
    pub fn finish(self) -> (SwaggerDocument, Vec<Diagnostic>) {
        info!(
            "Assembled {} operations and {} definitions",
            self.origins.len(),
            self.registry.len()
        );
        let general = self.general;
        let document = SwaggerDocument {
            swagger: "2.0".to_string(),
            info: general.info,
            host: general.host,
            base_path: general.base_path,
            schemes: general.schemes,
            consumes: general.consumes,
            produces: general.produces,
            paths: self.paths,
            definitions: self.registry.into_definitions(),
            security_definitions: general.security_definitions,
            security: general.security,
            tags: general.tags,
        };
        (document, self.diagnostics)
    }
}
