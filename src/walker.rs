//! Type-graph walker.
//!
//! Given a loaded package and a type name, the walker extracts the struct's field list
//! as a tree of [`FieldDescriptor`]s. It follows pointers, slices, maps, declared
//! non-struct types and aliases, promotes embedded structs, instantiates generic
//! structs, and unwraps configured generic wrappers into their type argument.
//!
//! Recursion is bounded by an explicit visited set keyed by [`TypeKey`] (package path,
//! type name and instantiation arguments): a struct that is already being walked
//! further up the same chain contributes an empty nested list instead of recursing.

use crate::config::BuildConfig;
use crate::error::Diagnostic;
use crate::loader::{FieldDecl, LoadError, Package, PackageLoader, SourceFile, TypeDeclKind};
use crate::tag::FieldTag;
use crate::type_expr::{parse_type, TypeExpr};
use log::{debug, warn};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use thiserror::Error;

/// Structural identity of a named type.
///
/// Equality, hashing and ordering use the package path, the type name and the
/// instantiation arguments' identities. `arg_names` only feeds display and naming.
#[derive(Debug, Clone)]
pub struct TypeKey {
    /// Import path of the declaring package.
    pub package: String,
    /// Declared name of that package.
    pub package_name: String,
    pub name: String,
    /// Identities of the instantiation arguments (see [`TypeHandle::identity`]); empty
    /// for non-generic types.
    pub args: Vec<String>,
    /// Source spellings of the instantiation arguments, e.g. `model.User`.
    pub arg_names: Vec<String>,
}

impl TypeKey {
    pub fn new(package: &str, package_name: &str, name: &str) -> Self {
        Self {
            package: package.to_string(),
            package_name: package_name.to_string(),
            name: name.to_string(),
            args: Vec::new(),
            arg_names: Vec::new(),
        }
    }

    /// Name as written in source, e.g. `model.User` or `model.Page[model.User]`.
    pub fn qualified_name(&self) -> String {
        if self.arg_names.is_empty() {
            format!("{}.{}", self.package_name, self.name)
        } else {
            format!(
                "{}.{}[{}]",
                self.package_name,
                self.name,
                self.arg_names.join(",")
            )
        }
    }

    fn base(&self) -> TypeKey {
        TypeKey {
            args: Vec::new(),
            arg_names: Vec::new(),
            ..self.clone()
        }
    }

    fn identity(&self) -> (&str, &str, &[String]) {
        (self.package.as_str(), self.name.as_str(), self.args.as_slice())
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl PartialOrd for TypeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.package, self.name)?;
        if !self.args.is_empty() {
            write!(f, "[{}]", self.args.join(","))?;
        }
        Ok(())
    }
}

/// Primitive shapes a type can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicKind {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    String,
    /// `[]byte`, encoded as base64 text.
    Bytes,
    DateTime,
    Uuid,
}

impl BasicKind {
    pub fn from_builtin(name: &str) -> Option<BasicKind> {
        let kind = match name {
            "bool" => BasicKind::Bool,
            "int" => BasicKind::Int,
            "int8" => BasicKind::Int8,
            "int16" => BasicKind::Int16,
            "int32" | "rune" => BasicKind::Int32,
            "int64" => BasicKind::Int64,
            "uint" => BasicKind::Uint,
            "uint8" | "byte" => BasicKind::Uint8,
            "uint16" => BasicKind::Uint16,
            "uint32" => BasicKind::Uint32,
            "uint64" | "uintptr" => BasicKind::Uint64,
            "float32" => BasicKind::Float32,
            "float64" => BasicKind::Float64,
            "string" | "error" => BasicKind::String,
            _ => return None,
        };
        Some(kind)
    }
}

/// Opaque reference to a resolved type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeHandle {
    Basic(BasicKind),
    Struct(TypeKey),
    Slice(Box<TypeHandle>),
    Map(Box<TypeHandle>, Box<TypeHandle>),
    Any,
    /// A type that could not be resolved; carries its spelling.
    Unresolved(String),
}

impl TypeHandle {
    /// The struct reached after peeling at most one slice or map level.
    pub fn element_struct(&self) -> Option<&TypeKey> {
        match self {
            TypeHandle::Struct(key) => Some(key),
            TypeHandle::Slice(inner) | TypeHandle::Map(_, inner) => match inner.as_ref() {
                TypeHandle::Struct(key) => Some(key),
                _ => None,
            },
            _ => None,
        }
    }

    /// Spelling-independent identity: struct types carry their full package path.
    pub fn identity(&self) -> String {
        match self {
            TypeHandle::Basic(kind) => format!("{:?}", kind).to_lowercase(),
            TypeHandle::Struct(key) => key.to_string(),
            TypeHandle::Slice(inner) => format!("[]{}", inner.identity()),
            TypeHandle::Map(key, value) => {
                format!("map[{}]{}", key.identity(), value.identity())
            }
            TypeHandle::Any => "any".to_string(),
            TypeHandle::Unresolved(spelling) => format!("?{}", spelling),
        }
    }
}

/// One struct field discovered while walking a type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    /// Normalized type spelling, e.g. `*model.User`, `[]model.User`, `map[string]model.User`.
    pub type_string: String,
    pub handle: TypeHandle,
    /// Raw tag string.
    pub tag: String,
    /// Fields of the (peeled) struct type; empty for leaves and for re-entered types.
    pub nested: Vec<FieldDescriptor>,
}

/// A resolved type together with its normalized spelling.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub handle: TypeHandle,
    pub spelling: String,
}

impl Resolved {
    fn new(handle: TypeHandle, spelling: impl Into<String>) -> Self {
        Self {
            handle,
            spelling: spelling.into(),
        }
    }

    fn unresolved(spelling: &str) -> Self {
        Self::new(TypeHandle::Unresolved(spelling.to_string()), spelling)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WalkError {
    #[error("cannot resolve {type_name}: {source}")]
    Package {
        type_name: String,
        #[source]
        source: LoadError,
    },
    #[error("type {name} is not declared in package {package}")]
    UnknownType { package: String, name: String },
    #[error("type {0} is not a struct")]
    NotStruct(String),
    #[error("file {file} not found in package {package}")]
    UnknownFile { package: String, file: String },
}

/// Resolution context: the package and file a spelling appears in, plus bound type parameters.
#[derive(Clone)]
struct Scope {
    package: Rc<Package>,
    file: usize,
    params: Rc<HashMap<String, Resolved>>,
}

impl Scope {
    fn new(package: Rc<Package>, file: usize) -> Self {
        Self {
            package,
            file,
            params: Rc::new(HashMap::new()),
        }
    }

    fn source_file(&self) -> Option<&SourceFile> {
        self.package.files.get(self.file)
    }
}

struct PackageCache<'l> {
    loader: &'l dyn PackageLoader,
    loaded: HashMap<String, Rc<Package>>,
    failed: HashMap<String, LoadError>,
}

impl<'l> PackageCache<'l> {
    fn get(&mut self, path: &str) -> Result<Rc<Package>, LoadError> {
        if let Some(package) = self.loaded.get(path) {
            return Ok(package.clone());
        }
        if let Some(err) = self.failed.get(path) {
            return Err(err.clone());
        }

        debug!("Loading package {}", path);
        match self.loader.load(path) {
            Ok(package) => {
                let package = Rc::new(package);
                self.loaded.insert(path.to_string(), package.clone());
                Ok(package)
            }
            Err(err) => {
                self.failed.insert(path.to_string(), err.clone());
                Err(err)
            }
        }
    }
}

impl<'l> PackageCache<'l> {
    /// Loads every path not cached yet through one batched loader call.
    fn preload(&mut self, paths: &[&str]) {
        let pending: Vec<&str> = paths
            .iter()
            .copied()
            .filter(|path| !self.loaded.contains_key(*path) && !self.failed.contains_key(*path))
            .collect();
        if pending.is_empty() {
            return;
        }

        debug!("Preloading {} packages", pending.len());
        for (path, result) in pending.iter().zip(self.loader.load_all(&pending)) {
            match result {
                Ok(package) => {
                    self.loaded.insert(path.to_string(), Rc::new(package));
                }
                Err(err) => {
                    self.failed.insert(path.to_string(), err);
                }
            }
        }
    }
}

/// Walks declared types of loaded packages.
pub struct TypeWalker<'l> {
    packages: PackageCache<'l>,
    config: BuildConfig,
    /// Types currently being expanded somewhere up the chain.
    in_progress: HashSet<TypeKey>,
    /// Bound arguments of every generic instantiation seen so far.
    instantiations: HashMap<TypeKey, Vec<Resolved>>,
    locations: Vec<String>,
    diagnostics: Vec<Diagnostic>,
    /// Suppresses diagnostics while probing spellings that may legitimately fail.
    quiet: bool,
    /// Leaves `nested` empty so each struct is expanded one level only.
    shallow: bool,
}

impl<'l> TypeWalker<'l> {
    pub fn new(loader: &'l dyn PackageLoader, config: &BuildConfig) -> Self {
        Self {
            packages: PackageCache {
                loader,
                loaded: HashMap::new(),
                failed: HashMap::new(),
            },
            config: config.clone(),
            in_progress: HashSet::new(),
            instantiations: HashMap::new(),
            locations: Vec::new(),
            diagnostics: Vec::new(),
            quiet: false,
            shallow: false,
        }
    }

    /// Loads (or returns the cached) package for an import path.
    pub fn package(&mut self, path: &str) -> Result<Rc<Package>, LoadError> {
        self.packages.get(path)
    }

    /// Loads several packages up front; failures surface later through [`TypeWalker::package`].
    pub fn preload(&mut self, paths: &[String]) {
        let paths: Vec<&str> = paths.iter().map(String::as_str).collect();
        self.packages.preload(&paths);
    }

    /// Drains the diagnostics recorded so far.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Extracts the field list of struct `type_name` declared in `package`.
    pub fn extract_fields(
        &mut self,
        package: &str,
        type_name: &str,
    ) -> Result<Vec<FieldDescriptor>, WalkError> {
        let pkg = self.package(package).map_err(|source| WalkError::Package {
            type_name: format!("{}.{}", package, type_name),
            source,
        })?;
        let key = TypeKey::new(&pkg.path, &pkg.name, type_name);
        self.fields_for_key(&key)
    }

    /// Extracts the field list of the struct identified by `key`, including generic
    /// instantiations previously produced by this walker.
    pub fn fields_for_key(&mut self, key: &TypeKey) -> Result<Vec<FieldDescriptor>, WalkError> {
        let package = self.package(&key.package).map_err(|source| WalkError::Package {
            type_name: key.to_string(),
            source,
        })?;

        let Some((file, decl_index)) = locate(&package, &key.name) else {
            return Err(WalkError::UnknownType {
                package: key.package.clone(),
                name: key.name.clone(),
            });
        };
        let decl = &package.files[file].types[decl_index];
        let TypeDeclKind::Struct { fields } = &decl.kind else {
            return Err(WalkError::NotStruct(key.to_string()));
        };

        let mut scope = Scope::new(package.clone(), file);
        if !key.args.is_empty() {
            if let Some(bound) = self.instantiations.get(key) {
                let params = decl
                    .type_params
                    .iter()
                    .cloned()
                    .zip(bound.iter().cloned())
                    .collect();
                scope.params = Rc::new(params);
            }
        }

        Ok(self.walk_struct(key, fields, &scope))
    }

    /// Like [`TypeWalker::fields_for_key`], but struct-typed fields keep their handle
    /// without their own field list being walked.
    ///
    /// Embedded structs are still promoted.
    pub fn shallow_fields_for_key(
        &mut self,
        key: &TypeKey,
    ) -> Result<Vec<FieldDescriptor>, WalkError> {
        let was_shallow = std::mem::replace(&mut self.shallow, true);
        let fields = self.fields_for_key(key);
        self.shallow = was_shallow;
        fields
    }

    /// Resolves a type spelling as it would be read inside `file` of `package`.
    ///
    /// Fails only when the package or file is unavailable; an unknown type yields an
    /// [`TypeHandle::Unresolved`] handle and a diagnostic at `location`.
    pub fn resolve_in_file(
        &mut self,
        package: &str,
        file: &str,
        spelling: &str,
        location: &str,
    ) -> Result<Resolved, WalkError> {
        let pkg = self.package(package).map_err(|source| WalkError::Package {
            type_name: spelling.to_string(),
            source,
        })?;
        let Some(file_index) = pkg.files.iter().position(|f| f.name == file) else {
            return Err(WalkError::UnknownFile {
                package: package.to_string(),
                file: file.to_string(),
            });
        };

        self.locations.push(location.to_string());
        let scope = Scope::new(pkg, file_index);
        let resolved = match parse_type(spelling) {
            Ok(expr) => self.resolve(&expr, &scope),
            Err(e) => {
                self.warn(format!("cannot parse type {:?}: {}", spelling, e));
                Resolved::unresolved(spelling)
            }
        };
        self.locations.pop();
        Ok(resolved)
    }

    /// Like [`TypeWalker::resolve_in_file`], but records no diagnostics.
    pub fn probe_in_file(
        &mut self,
        package: &str,
        file: &str,
        spelling: &str,
    ) -> Result<Resolved, WalkError> {
        let was_quiet = std::mem::replace(&mut self.quiet, true);
        let resolved = self.resolve_in_file(package, file, spelling, "<probe>");
        self.quiet = was_quiet;
        resolved
    }

    /// Whether a declared type exists, without recording diagnostics.
    pub fn declares(&mut self, package: &str, name: &str) -> bool {
        self.package(package)
            .map(|pkg| pkg.find_type(name).is_some())
            .unwrap_or(false)
    }

    fn walk_struct(
        &mut self,
        key: &TypeKey,
        fields: &[FieldDecl],
        scope: &Scope,
    ) -> Vec<FieldDescriptor> {
        if !self.in_progress.insert(key.clone()) {
            debug!("Type {} re-entered, cutting recursion", key);
            return Vec::new();
        }
        self.locations.push(key.qualified_name());
        debug!("Walking struct {}", key);

        let direct: HashSet<&str> = fields
            .iter()
            .filter(|f| !f.embedded)
            .map(|f| f.name.as_str())
            .collect();
        let mut out: Vec<FieldDescriptor> = Vec::new();

        for field in fields {
            let expr = match parse_type(&field.ty) {
                Ok(expr) => expr,
                Err(e) => {
                    self.warn(format!("field {}: {}", field.name, e));
                    out.push(FieldDescriptor {
                        name: field.name.clone(),
                        type_string: field.ty.clone(),
                        handle: TypeHandle::Unresolved(field.ty.clone()),
                        tag: field.tag.clone(),
                        nested: Vec::new(),
                    });
                    continue;
                }
            };

            if field.embedded {
                self.embed(field, &expr, scope, &direct, &mut out);
            } else {
                let descriptor = self.describe(&field.name, &field.tag, &expr, scope);
                out.push(descriptor);
            }
        }

        self.locations.pop();
        self.in_progress.remove(key);
        out
    }

    fn describe(
        &mut self,
        name: &str,
        tag: &str,
        expr: &TypeExpr,
        scope: &Scope,
    ) -> FieldDescriptor {
        let resolved = self.resolve(expr, scope);
        let element = if self.shallow {
            None
        } else {
            resolved.handle.element_struct().cloned()
        };
        let nested = match element {
            Some(key) => match self.fields_for_key(&key) {
                Ok(fields) => fields,
                Err(e) => {
                    self.warn(format!("field {}: {}", name, e));
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        FieldDescriptor {
            name: name.to_string(),
            type_string: resolved.spelling,
            handle: resolved.handle,
            tag: tag.to_string(),
            nested,
        }
    }

    fn embed(
        &mut self,
        field: &FieldDecl,
        expr: &TypeExpr,
        scope: &Scope,
        direct: &HashSet<&str>,
        out: &mut Vec<FieldDescriptor>,
    ) {
        let resolved = self.resolve(expr, scope);
        let TypeHandle::Struct(key) = &resolved.handle else {
            let descriptor = self.describe(&field.name, &field.tag, expr, scope);
            out.push(descriptor);
            return;
        };

        let in_wrapper = self.config.is_wrapper_package(&key.package);
        if in_wrapper && self.declared_field_count(key) == Some(0) {
            debug!("Dropping embedded marker {}", key);
            return;
        }

        let tag = FieldTag::parse(&field.tag);
        if !in_wrapper && tag.property_name(&self.config.name_tag_keys).is_some() {
            let descriptor = self.describe(&field.name, &field.tag, expr, scope);
            out.push(descriptor);
            return;
        }

        let promoted = match self.fields_for_key(key) {
            Ok(fields) => fields,
            Err(e) => {
                self.warn(format!("embedded {}: {}", field.name, e));
                return;
            }
        };
        for descriptor in promoted {
            if direct.contains(descriptor.name.as_str())
                || out.iter().any(|existing| existing.name == descriptor.name)
            {
                debug!("Promoted field {} shadowed", descriptor.name);
                continue;
            }
            out.push(descriptor);
        }
    }

    fn declared_field_count(&mut self, key: &TypeKey) -> Option<usize> {
        let package = self.package(&key.package).ok()?;
        let (_, decl) = package.find_type(&key.name)?;
        match &decl.kind {
            TypeDeclKind::Struct { fields } => Some(fields.len()),
            _ => None,
        }
    }

    fn resolve(&mut self, expr: &TypeExpr, scope: &Scope) -> Resolved {
        match expr {
            TypeExpr::Pointer(inner) => {
                if let TypeExpr::Pointer(_) = inner.as_ref() {
                    self.warn(format!("{} dereferences more than one pointer level", expr));
                    return Resolved::unresolved(&expr.to_string());
                }
                let inner = self.resolve(inner, scope);
                Resolved::new(inner.handle, format!("*{}", inner.spelling))
            }
            TypeExpr::Slice(inner) | TypeExpr::Array(_, inner) => {
                let inner = self.resolve(inner, scope);
                if inner.handle == TypeHandle::Basic(BasicKind::Uint8) {
                    return Resolved::new(TypeHandle::Basic(BasicKind::Bytes), "[]byte");
                }
                Resolved::new(
                    TypeHandle::Slice(Box::new(inner.handle)),
                    format!("[]{}", inner.spelling),
                )
            }
            TypeExpr::Map(key, value) => {
                let key = self.resolve(key, scope);
                let value = self.resolve(value, scope);
                Resolved::new(
                    TypeHandle::Map(Box::new(key.handle), Box::new(value.handle)),
                    format!("map[{}]{}", key.spelling, value.spelling),
                )
            }
            TypeExpr::Chan(_) => {
                self.warn(format!("channel type {} has no schema", expr));
                Resolved::unresolved(&expr.to_string())
            }
            TypeExpr::Any => Resolved::new(TypeHandle::Any, "interface{}"),
            TypeExpr::EmptyStruct => Resolved::new(TypeHandle::Any, "struct{}"),
            TypeExpr::Named {
                qualifier,
                name,
                args,
            } => self.resolve_named(qualifier.as_deref(), name, args, scope, expr),
        }
    }

    fn resolve_named(
        &mut self,
        qualifier: Option<&str>,
        name: &str,
        args: &[TypeExpr],
        scope: &Scope,
        expr: &TypeExpr,
    ) -> Resolved {
        if qualifier.is_none() {
            if args.is_empty() {
                if let Some(bound) = scope.params.get(name) {
                    return bound.clone();
                }
            }
            if let Some(kind) = BasicKind::from_builtin(name) {
                return Resolved::new(TypeHandle::Basic(kind), name);
            }
        }

        let package_path = match qualifier {
            None => scope.package.path.clone(),
            Some(q) if q.contains('/') => q.to_string(),
            Some(q) => match scope.source_file().and_then(|f| f.resolve_qualifier(q)) {
                Some(path) => path.to_string(),
                None => {
                    self.warn(format!("package qualifier {:?} is not imported", q));
                    return Resolved::unresolved(&expr.to_string());
                }
            },
        };

        if let Some(known) = well_known(&package_path, name) {
            return known;
        }

        let package = match self.package(&package_path) {
            Ok(package) => package,
            Err(e) => {
                self.warn(format!("{} treated as opaque: {}", expr, e));
                return Resolved::unresolved(&expr.to_string());
            }
        };

        let Some((file, decl_index)) = locate(&package, name) else {
            self.warn(format!(
                "type {} is not declared in package {}",
                name, package.path
            ));
            return Resolved::unresolved(&expr.to_string());
        };
        let decl = &package.files[file].types[decl_index];

        if let TypeDeclKind::Struct { .. } = decl.kind {
            if !args.is_empty()
                && (self.config.is_generic_wrapper(name)
                    || self.config.is_wrapper_package(&package.path))
            {
                debug!("Unwrapping generic wrapper {}", expr);
                return self.resolve(&args[0], scope);
            }
        }

        let bound: Vec<Resolved> = args.iter().map(|arg| self.resolve(arg, scope)).collect();
        if !bound.is_empty() && bound.len() != decl.type_params.len() {
            self.warn(format!(
                "{} expects {} type arguments, got {}",
                name,
                decl.type_params.len(),
                bound.len()
            ));
        }

        let mut key = TypeKey::new(&package.path, &package.name, name);
        key.args = bound.iter().map(|r| r.handle.identity()).collect();
        key.arg_names = bound.iter().map(|r| r.spelling.clone()).collect();
        let spelling = key.qualified_name();

        match &decl.kind {
            TypeDeclKind::Struct { .. } => {
                if !bound.is_empty() {
                    self.instantiations.insert(key.clone(), bound);
                }
                Resolved::new(TypeHandle::Struct(key), spelling)
            }
            TypeDeclKind::Named { underlying: target } | TypeDeclKind::Alias { target } => {
                let guard = key.base();
                if !self.in_progress.insert(guard.clone()) {
                    self.warn(format!("type {} is defined in terms of itself", spelling));
                    return Resolved::unresolved(&spelling);
                }

                let mut decl_scope = Scope::new(package.clone(), file);
                if !bound.is_empty() {
                    decl_scope.params = Rc::new(
                        decl.type_params.iter().cloned().zip(bound).collect(),
                    );
                }
                let underlying = match parse_type(target) {
                    Ok(target_expr) => self.resolve(&target_expr, &decl_scope),
                    Err(e) => {
                        self.warn(format!("underlying type of {}: {}", spelling, e));
                        Resolved::unresolved(target)
                    }
                };
                self.in_progress.remove(&guard);

                // Aliases to structs keep the struct's identity; named non-struct types keep
                // their own spelling so the field type reads as declared.
                match underlying.handle {
                    TypeHandle::Struct(_) => underlying,
                    handle => Resolved::new(handle, spelling),
                }
            }
            TypeDeclKind::Interface => Resolved::new(TypeHandle::Any, spelling),
        }
    }

    fn warn(&mut self, message: String) {
        if self.quiet {
            debug!("Suppressed while probing: {}", message);
            return;
        }
        let location = self
            .locations
            .last()
            .cloned()
            .unwrap_or_else(|| "<root>".to_string());
        let diagnostic = Diagnostic::new(location, message);
        if !self.diagnostics.contains(&diagnostic) {
            warn!("{}", diagnostic);
            self.diagnostics.push(diagnostic);
        }
    }
}

fn locate(package: &Package, name: &str) -> Option<(usize, usize)> {
    package.files.iter().enumerate().find_map(|(file_index, file)| {
        file.types
            .iter()
            .position(|decl| decl.name == name)
            .map(|decl_index| (file_index, decl_index))
    })
}

/// Types from packages that are commonly not loaded but have a fixed encoding.
fn well_known(package: &str, name: &str) -> Option<Resolved> {
    let kind = match (package, name) {
        ("time", "Time") | ("database/sql", "NullTime") => BasicKind::DateTime,
        ("time", "Duration") | ("database/sql", "NullInt64") => BasicKind::Int64,
        ("database/sql", "NullInt32") => BasicKind::Int32,
        ("database/sql", "NullString") => BasicKind::String,
        ("database/sql", "NullBool") => BasicKind::Bool,
        ("database/sql", "NullFloat64") => BasicKind::Float64,
        ("github.com/google/uuid", "UUID") | ("github.com/gofrs/uuid", "UUID") => BasicKind::Uuid,
        ("encoding/json", "RawMessage") => {
            return Some(Resolved::new(TypeHandle::Any, "json.RawMessage"));
        }
        _ => return None,
    };
    let short = crate::loader::default_import_name(package);
    Some(Resolved::new(
        TypeHandle::Basic(kind),
        format!("{}.{}", short, name),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{Import, MemoryLoader, SourceFile, TypeDecl};

    const MODEL: &str = "example.com/shop/model";
    const FIELDS: &str = "example.com/shop/fields";
    const COMMON: &str = "example.com/shop/common";

    fn field(name: &str, ty: &str, tag: &str) -> FieldDecl {
        FieldDecl {
            name: name.to_string(),
            ty: ty.to_string(),
            tag: tag.to_string(),
            embedded: false,
        }
    }

    fn embedded(ty: &str) -> FieldDecl {
        let name = ty.rsplit('.').next().unwrap().trim_start_matches('*');
        FieldDecl {
            name: name.to_string(),
            ty: ty.to_string(),
            tag: String::new(),
            embedded: true,
        }
    }

    fn strukt(name: &str, fields: Vec<FieldDecl>) -> TypeDecl {
        TypeDecl {
            name: name.to_string(),
            type_params: vec![],
            doc: vec![],
            kind: TypeDeclKind::Struct { fields },
        }
    }

    fn generic(name: &str, params: &[&str], fields: Vec<FieldDecl>) -> TypeDecl {
        TypeDecl {
            type_params: params.iter().map(|p| p.to_string()).collect(),
            ..strukt(name, fields)
        }
    }

    fn named(name: &str, underlying: &str) -> TypeDecl {
        TypeDecl {
            name: name.to_string(),
            type_params: vec![],
            doc: vec![],
            kind: TypeDeclKind::Named {
                underlying: underlying.to_string(),
            },
        }
    }

    fn package(path: &str, name: &str, imports: Vec<Import>, types: Vec<TypeDecl>) -> Package {
        Package {
            path: path.to_string(),
            name: name.to_string(),
            files: vec![SourceFile {
                name: format!("{}.go", name),
                imports,
                types,
                ..Default::default()
            }],
        }
    }

    fn import(path: &str) -> Import {
        Import {
            alias: None,
            path: path.to_string(),
        }
    }

    fn loader() -> MemoryLoader {
        let model = package(
            MODEL,
            "model",
            vec![import(FIELDS), import(COMMON), import("time")],
            vec![
                strukt(
                    "User",
                    vec![
                        field("ID", "int64", r#"json:"id""#),
                        field("Name", "string", r#"json:"name""#),
                        field("Home", "Address", r#"json:"home""#),
                        field("Work", "*Address", r#"json:"work,omitempty""#),
                        field("CreatedAt", "time.Time", r#"json:"created_at""#),
                        field("Status", "Status", r#"json:"status""#),
                    ],
                ),
                strukt(
                    "Address",
                    vec![
                        field("Street", "string", r#"json:"street""#),
                        field("City", "string", r#"json:"city""#),
                    ],
                ),
                named("Status", "string"),
                strukt(
                    "Order",
                    vec![
                        field("Items", "[]Item", r#"json:"items""#),
                        field("ByCode", "map[string]*Item", r#"json:"by_code""#),
                        field("Tags", "[]string", r#"json:"tags""#),
                        field("Raw", "[]byte", r#"json:"raw""#),
                    ],
                ),
                strukt("Item", vec![field("SKU", "string", r#"json:"sku""#)]),
                strukt(
                    "Node",
                    vec![
                        field("Value", "int", r#"json:"value""#),
                        field("Parent", "*Node", r#"json:"parent""#),
                        field("Children", "[]*Node", r#"json:"children""#),
                    ],
                ),
                strukt("A", vec![field("B", "*B", r#"json:"b""#)]),
                strukt("B", vec![field("A", "*A", r#"json:"a""#)]),
                strukt(
                    "Account",
                    vec![
                        embedded("fields.Audit"),
                        embedded("fields.Marker"),
                        field("Email", "string", r#"json:"email""#),
                    ],
                ),
                strukt(
                    "Admin",
                    vec![
                        embedded("*User"),
                        field("Name", "string", r#"json:"display_name""#),
                        field("Level", "int", r#"json:"level""#),
                    ],
                ),
                strukt(
                    "Card",
                    vec![
                        field("Owner", "fields.StructField[Profile]", r#"json:"owner""#),
                        field("Backup", "fields.StructField[*Profile]", r#"json:"backup""#),
                    ],
                ),
                strukt(
                    "Profile",
                    vec![
                        field("Bio", "string", r#"json:"bio" public:"view""#),
                        field("Secret", "string", r#"json:"secret""#),
                    ],
                ),
                generic(
                    "Page",
                    &["T"],
                    vec![
                        field("Items", "[]T", r#"json:"items""#),
                        field("Total", "int", r#"json:"total""#),
                    ],
                ),
                strukt(
                    "UserPage",
                    vec![field("Page", "Page[User]", r#"json:"page""#)],
                ),
                strukt(
                    "Remote",
                    vec![
                        field("Money", "common.Money", r#"json:"money""#),
                        field("Direct", "example.com/shop/common.Money", r#"json:"direct""#),
                        field("Ghost", "ghost.Thing", r#"json:"ghost""#),
                        field("Gone", "example.com/gone.Thing", r#"json:"gone""#),
                        field("Fine", "string", r#"json:"fine""#),
                    ],
                ),
            ],
        );
        let fields = package(
            FIELDS,
            "fields",
            vec![],
            vec![
                strukt(
                    "Audit",
                    vec![
                        field("CreatedBy", "string", r#"json:"created_by""#),
                        field("UpdatedBy", "string", r#"json:"updated_by""#),
                    ],
                ),
                strukt("Marker", vec![]),
                generic("StructField", &["T"], vec![field("Value", "T", "")]),
            ],
        );
        let common = package(
            COMMON,
            "common",
            vec![],
            vec![strukt(
                "Money",
                vec![
                    field("Amount", "int64", r#"json:"amount""#),
                    field("Currency", "string", r#"json:"currency""#),
                ],
            )],
        );

        MemoryLoader::new()
            .with_package(model)
            .with_package(fields)
            .with_package(common)
    }

    fn config() -> BuildConfig {
        BuildConfig {
            wrapper_packages: vec![FIELDS.to_string()],
            ..BuildConfig::new(MODEL)
        }
    }

    fn by_name<'a>(fields: &'a [FieldDescriptor], name: &str) -> &'a FieldDescriptor {
        fields
            .iter()
            .find(|f| f.name == name)
            .unwrap_or_else(|| panic!("field {} not found", name))
    }

    #[test]
    fn test_extract_leaf_and_nested_fields() {
        let loader = loader();
        let mut walker = TypeWalker::new(&loader, &config());
        let fields = walker.extract_fields(MODEL, "User").unwrap();

        assert_eq!(fields.len(), 6);
        let id = by_name(&fields, "ID");
        assert_eq!(id.type_string, "int64");
        assert_eq!(id.handle, TypeHandle::Basic(BasicKind::Int64));
        assert!(id.nested.is_empty());

        let home = by_name(&fields, "Home");
        assert_eq!(home.type_string, "model.Address");
        assert_eq!(home.nested.len(), 2);

        let work = by_name(&fields, "Work");
        assert_eq!(work.type_string, "*model.Address");
        assert_eq!(work.nested.len(), 2);

        let created = by_name(&fields, "CreatedAt");
        assert_eq!(created.handle, TypeHandle::Basic(BasicKind::DateTime));

        let status = by_name(&fields, "Status");
        assert_eq!(status.type_string, "model.Status");
        assert_eq!(status.handle, TypeHandle::Basic(BasicKind::String));
        assert!(walker.take_diagnostics().is_empty());
    }

    #[test]
    fn test_slice_and_map_elements() {
        let loader = loader();
        let mut walker = TypeWalker::new(&loader, &config());
        let fields = walker.extract_fields(MODEL, "Order").unwrap();

        let items = by_name(&fields, "Items");
        assert_eq!(items.type_string, "[]model.Item");
        assert_eq!(items.nested.len(), 1);

        let by_code = by_name(&fields, "ByCode");
        assert_eq!(by_code.type_string, "map[string]*model.Item");
        assert_eq!(by_code.nested.len(), 1);

        let tags = by_name(&fields, "Tags");
        assert!(tags.nested.is_empty());
        assert_eq!(
            tags.handle,
            TypeHandle::Slice(Box::new(TypeHandle::Basic(BasicKind::String)))
        );

        assert_eq!(by_name(&fields, "Raw").handle, TypeHandle::Basic(BasicKind::Bytes));
    }

    #[test]
    fn test_self_reference_terminates() {
        let loader = loader();
        let mut walker = TypeWalker::new(&loader, &config());
        let fields = walker.extract_fields(MODEL, "Node").unwrap();

        let parent = by_name(&fields, "Parent");
        assert!(matches!(parent.handle, TypeHandle::Struct(ref key) if key.name == "Node"));
        assert!(parent.nested.is_empty());
        assert!(by_name(&fields, "Children").nested.is_empty());
    }

    #[test]
    fn test_mutual_reference_terminates() {
        let loader = loader();
        let mut walker = TypeWalker::new(&loader, &config());
        let fields = walker.extract_fields(MODEL, "A").unwrap();

        let b = by_name(&fields, "B");
        assert_eq!(b.nested.len(), 1);
        let back = &b.nested[0];
        assert_eq!(back.name, "A");
        assert!(matches!(back.handle, TypeHandle::Struct(ref key) if key.name == "A"));
        assert!(back.nested.is_empty());
    }

    #[test]
    fn test_shallow_fields_keep_handles_only() {
        let loader = loader();
        let mut walker = TypeWalker::new(&loader, &config());
        let fields = walker
            .shallow_fields_for_key(&TypeKey::new(MODEL, "model", "User"))
            .unwrap();

        let home = by_name(&fields, "Home");
        assert!(matches!(home.handle, TypeHandle::Struct(ref key) if key.name == "Address"));
        assert!(home.nested.is_empty());

        let deep = walker.extract_fields(MODEL, "User").unwrap();
        assert_eq!(by_name(&deep, "Home").nested.len(), 2);
    }

    /// Counts calls reaching the underlying loader.
    struct CountingLoader {
        inner: MemoryLoader,
        loads: std::cell::Cell<usize>,
    }

    impl PackageLoader for CountingLoader {
        fn load(&self, import_path: &str) -> Result<Package, LoadError> {
            self.loads.set(self.loads.get() + 1);
            self.inner.load(import_path)
        }
    }

    #[test]
    fn test_preloaded_packages_are_cached() {
        let loader = CountingLoader {
            inner: loader(),
            loads: std::cell::Cell::new(0),
        };
        let mut walker = TypeWalker::new(&loader, &config());

        walker.preload(&[
            MODEL.to_string(),
            COMMON.to_string(),
            "example.com/missing".to_string(),
        ]);
        assert_eq!(loader.loads.get(), 3);

        assert!(walker.package(MODEL).is_ok());
        assert!(walker.package(COMMON).is_ok());
        assert!(matches!(
            walker.package("example.com/missing"),
            Err(LoadError::NotFound(_))
        ));
        walker.preload(&[MODEL.to_string()]);
        assert_eq!(loader.loads.get(), 3);
    }

    #[test]
    fn test_wrapper_package_embedding() {
        let loader = loader();
        let mut walker = TypeWalker::new(&loader, &config());
        let fields = walker.extract_fields(MODEL, "Account").unwrap();

        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["CreatedBy", "UpdatedBy", "Email"]);
    }

    #[test]
    fn test_embedded_struct_is_promoted_and_shadowed() {
        let loader = loader();
        let mut walker = TypeWalker::new(&loader, &config());
        let fields = walker.extract_fields(MODEL, "Admin").unwrap();

        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["ID", "Home", "Work", "CreatedAt", "Status", "Name", "Level"]
        );
        assert_eq!(by_name(&fields, "Name").tag, r#"json:"display_name""#);
    }

    #[test]
    fn test_generic_wrapper_unwrapping() {
        let loader = loader();
        let mut walker = TypeWalker::new(&loader, &config());
        let fields = walker.extract_fields(MODEL, "Card").unwrap();

        let owner = by_name(&fields, "Owner");
        assert_eq!(owner.type_string, "model.Profile");
        assert!(matches!(owner.handle, TypeHandle::Struct(ref key) if key.name == "Profile"));
        assert_eq!(owner.nested.len(), 2);

        let backup = by_name(&fields, "Backup");
        assert_eq!(backup.type_string, "*model.Profile");
        assert_eq!(backup.nested.len(), 2);
    }

    #[test]
    fn test_generic_instantiation_substitutes_parameters() {
        let loader = loader();
        let mut walker = TypeWalker::new(&loader, &config());
        let fields = walker.extract_fields(MODEL, "UserPage").unwrap();

        let page = by_name(&fields, "Page");
        assert_eq!(page.type_string, "model.Page[model.User]");
        let TypeHandle::Struct(key) = &page.handle else {
            panic!("expected struct handle");
        };
        assert_eq!(key.arg_names, vec!["model.User".to_string()]);
        assert_eq!(key.args, vec!["example.com/shop/model.User".to_string()]);

        let items = by_name(&page.nested, "Items");
        assert_eq!(items.type_string, "[]model.User");
        assert_eq!(items.nested.len(), 6);
    }

    #[test]
    fn test_cross_package_and_degraded_fields() {
        let loader = loader();
        let mut walker = TypeWalker::new(&loader, &config());
        let fields = walker.extract_fields(MODEL, "Remote").unwrap();

        assert_eq!(fields.len(), 5);
        assert_eq!(by_name(&fields, "Money").type_string, "common.Money");
        assert_eq!(by_name(&fields, "Money").nested.len(), 2);
        assert_eq!(by_name(&fields, "Direct").type_string, "common.Money");

        assert!(matches!(by_name(&fields, "Ghost").handle, TypeHandle::Unresolved(_)));
        assert!(matches!(by_name(&fields, "Gone").handle, TypeHandle::Unresolved(_)));
        assert_eq!(
            by_name(&fields, "Fine").handle,
            TypeHandle::Basic(BasicKind::String)
        );

        let diagnostics = walker.take_diagnostics();
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.iter().all(|d| d.location == "model.Remote"));
    }

    #[test]
    fn test_extract_errors() {
        let loader = loader();
        let mut walker = TypeWalker::new(&loader, &config());

        assert!(matches!(
            walker.extract_fields("example.com/missing", "User"),
            Err(WalkError::Package { .. })
        ));
        assert!(matches!(
            walker.extract_fields(MODEL, "Nope"),
            Err(WalkError::UnknownType { .. })
        ));
        assert!(matches!(
            walker.extract_fields(MODEL, "Status"),
            Err(WalkError::NotStruct(_))
        ));
    }

    #[test]
    fn test_resolve_in_file() {
        let loader = loader();
        let mut walker = TypeWalker::new(&loader, &config());

        let resolved = walker
            .resolve_in_file(MODEL, "model.go", "[]common.Money", "handler")
            .unwrap();
        assert_eq!(resolved.spelling, "[]common.Money");
        assert!(resolved.handle.element_struct().is_some());

        let resolved = walker
            .resolve_in_file(MODEL, "model.go", "nothere.X", "handler")
            .unwrap();
        assert!(matches!(resolved.handle, TypeHandle::Unresolved(_)));
        assert_eq!(walker.take_diagnostics()[0].location, "handler");

        assert!(matches!(
            walker.resolve_in_file(MODEL, "other.go", "User", "handler"),
            Err(WalkError::UnknownFile { .. })
        ));
    }

    #[test]
    fn test_double_pointer_degrades() {
        let loader = loader();
        let mut walker = TypeWalker::new(&loader, &config());

        let resolved = walker
            .resolve_in_file(MODEL, "model.go", "*User", "handler")
            .unwrap();
        assert!(matches!(resolved.handle, TypeHandle::Struct(_)));
        assert!(walker.take_diagnostics().is_empty());

        let resolved = walker
            .resolve_in_file(MODEL, "model.go", "**User", "handler")
            .unwrap();
        assert!(matches!(resolved.handle, TypeHandle::Unresolved(_)));
        let diagnostics = walker.take_diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].location, "handler");
    }

    #[test]
    fn test_probe_records_no_diagnostics() {
        let loader = loader();
        let mut walker = TypeWalker::new(&loader, &config());

        let resolved = walker.probe_in_file(MODEL, "model.go", "UserPublic").unwrap();
        assert!(matches!(resolved.handle, TypeHandle::Unresolved(_)));
        assert!(walker.take_diagnostics().is_empty());

        let resolved = walker.probe_in_file(MODEL, "model.go", "User").unwrap();
        assert_eq!(resolved.spelling, "model.User");
    }
}
