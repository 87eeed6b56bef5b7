use crate::walker::{BasicKind, TypeKey};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Prefix of every definition reference.
pub const DEFINITIONS_PREFIX: &str = "#/definitions/";

/// Swagger schema node.
///
/// Nodes are built through the constructors below, each of which populates exactly
/// one shape: primitive, object, array, map or reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Reference to a definition
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// The type keyword (string, integer, number, boolean, object, array, file)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Properties of object schemas, ordered by name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, Schema>>,
    /// Value schema of map-shaped objects
    #[serde(rename = "additionalProperties", skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<Schema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    /// Item schema of array schemas
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(rename = "x-nullable", skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
}

/// The populated shape of a [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Primitive,
    Object,
    Array,
    Map,
    Reference,
    /// `{type: object}` with nothing else: accepts any value.
    Any,
}

impl Schema {
    pub fn primitive(schema_type: &str, format: Option<&str>) -> Self {
        Self {
            schema_type: Some(schema_type.to_string()),
            format: format.map(str::to_string),
            ..Default::default()
        }
    }

    pub fn object(properties: BTreeMap<String, Schema>, required: Vec<String>) -> Self {
        Self {
            schema_type: Some("object".to_string()),
            properties: Some(properties),
            required: if required.is_empty() {
                None
            } else {
                Some(required)
            },
            ..Default::default()
        }
    }

    pub fn array(items: Schema) -> Self {
        Self {
            schema_type: Some("array".to_string()),
            items: Some(Box::new(items)),
            ..Default::default()
        }
    }

    pub fn map(values: Schema) -> Self {
        Self {
            schema_type: Some("object".to_string()),
            additional_properties: Some(Box::new(values)),
            ..Default::default()
        }
    }

    /// Reference to the definition called `name`.
    pub fn reference(name: &str) -> Self {
        Self {
            reference: Some(format!("{}{}", DEFINITIONS_PREFIX, name)),
            ..Default::default()
        }
    }

    pub fn any() -> Self {
        Self {
            schema_type: Some("object".to_string()),
            ..Default::default()
        }
    }

    pub fn kind(&self) -> SchemaKind {
        if self.reference.is_some() {
            return SchemaKind::Reference;
        }
        match self.schema_type.as_deref() {
            Some("array") => SchemaKind::Array,
            Some("object") if self.properties.is_some() => SchemaKind::Object,
            Some("object") if self.additional_properties.is_some() => SchemaKind::Map,
            Some("object") | None => SchemaKind::Any,
            Some(_) => SchemaKind::Primitive,
        }
    }

    /// Definition name this node refers to, if it is a reference.
    pub fn ref_name(&self) -> Option<&str> {
        self.reference
            .as_deref()
            .and_then(|r| r.strip_prefix(DEFINITIONS_PREFIX))
    }
}

/// Fixed mapping from primitive kinds to schema type and format.
pub fn basic_schema(kind: BasicKind) -> Schema {
    let (schema_type, format) = match kind {
        BasicKind::Bool => ("boolean", None),
        BasicKind::Int | BasicKind::Uint => ("integer", None),
        BasicKind::Int8
        | BasicKind::Int16
        | BasicKind::Int32
        | BasicKind::Uint8
        | BasicKind::Uint16
        | BasicKind::Uint32 => ("integer", Some("int32")),
        BasicKind::Int64 | BasicKind::Uint64 => ("integer", Some("int64")),
        BasicKind::Float32 => ("number", Some("float")),
        BasicKind::Float64 => ("number", Some("double")),
        BasicKind::String => ("string", None),
        BasicKind::Bytes => ("string", Some("byte")),
        BasicKind::DateTime => ("string", Some("date-time")),
        BasicKind::Uuid => ("string", Some("uuid")),
    };
    Schema::primitive(schema_type, format)
}

/// Schema for a primitive type keyword as written in comments and tags
/// (`string`, `integer`, `number`, `boolean`, `object`, `file`).
pub fn keyword_schema(keyword: &str) -> Option<Schema> {
    match keyword.trim().to_ascii_lowercase().as_str() {
        "string" => Some(Schema::primitive("string", None)),
        "integer" | "int" => Some(Schema::primitive("integer", None)),
        "number" | "float" => Some(Schema::primitive("number", None)),
        "boolean" | "bool" => Some(Schema::primitive("boolean", None)),
        "file" => Some(Schema::primitive("file", None)),
        "object" => Some(Schema::any()),
        _ => None,
    }
}

/// Converts a literal written in a tag or comment into a JSON value of the given type.
///
/// Literals that do not parse as the type are kept as strings.
pub fn typed_value(schema_type: Option<&str>, raw: &str) -> serde_json::Value {
    let raw = raw.trim();
    let parsed = match schema_type {
        Some("integer") => raw.parse::<i64>().ok().map(serde_json::Value::from),
        Some("number") => raw.parse::<f64>().ok().map(serde_json::Value::from),
        Some("boolean") => raw.parse::<bool>().ok().map(serde_json::Value::from),
        _ => None,
    };
    parsed.unwrap_or_else(|| serde_json::Value::String(raw.to_string()))
}

/// Field-visibility mode a definition is built under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Projection {
    /// Every serialized field.
    Full,
    /// Only fields carrying the visibility marker.
    Public,
}

/// Definitions produced during one build.
///
/// Names are allocated per `(TypeKey, Projection)` and stay stable for the whole build.
/// Inserting under a name that already holds a definition is a no-op, which is what
/// lets synthesis stop on cyclic type graphs.
#[derive(Debug)]
pub struct SchemaRegistry {
    public_suffix: String,
    names: HashMap<(TypeKey, Projection), String>,
    owners: HashMap<String, (TypeKey, Projection)>,
    definitions: BTreeMap<String, Schema>,
}

impl SchemaRegistry {
    pub fn new(public_suffix: &str) -> Self {
        Self {
            public_suffix: public_suffix.to_string(),
            names: HashMap::new(),
            owners: HashMap::new(),
            definitions: BTreeMap::new(),
        }
    }

    /// Returns the definition name for a type under a projection, allocating it on first use.
    ///
    /// The preferred name is `package.Type`; when another type already owns it (same
    /// package name, different import path) the name is qualified with the full path.
    pub fn name_for(&mut self, key: &TypeKey, projection: Projection) -> String {
        let slot = (key.clone(), projection);
        if let Some(name) = self.names.get(&slot) {
            return name.clone();
        }

        let suffix = self.name_suffix(key, projection);
        let short = format!("{}.{}{}", key.package_name, key.name, suffix);
        let qualified = format!("{}.{}{}", sanitize(&key.package), key.name, suffix);

        let mut name = short;
        if self.owners.contains_key(&name) {
            debug!("Definition name {} taken, qualifying {}", name, key);
            name = qualified;
        }
        let mut counter = 2;
        let base = name.clone();
        while self.owners.contains_key(&name) {
            name = format!("{}_{}", base, counter);
            counter += 1;
        }

        self.owners.insert(name.clone(), slot.clone());
        self.names.insert(slot, name.clone());
        name
    }

    fn name_suffix(&self, key: &TypeKey, projection: Projection) -> String {
        let mut suffix = String::new();
        for arg in &key.arg_names {
            suffix.push('-');
            suffix.push_str(&sanitize(arg));
        }
        if projection == Projection::Public {
            suffix.push_str(&self.public_suffix);
        }
        suffix
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Registers a definition. Returns `false`, leaving the existing one untouched,
    /// when the name is already defined.
    pub fn insert(&mut self, name: &str, schema: Schema) -> bool {
        if self.definitions.contains_key(name) {
            debug!("Definition {} already registered", name);
            return false;
        }
        self.definitions.insert(name.to_string(), schema);
        true
    }

    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.definitions.get(name)
    }

    pub fn definitions(&self) -> &BTreeMap<String, Schema> {
        &self.definitions
    }

    pub fn into_definitions(self) -> BTreeMap<String, Schema> {
        self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Turns a spelling or import path into a definition-name segment.
fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            c if c.is_alphanumeric() || c == '_' || c == '-' => out.push(c),
            '.' | '/' | '[' | ',' => out.push('_'),
            _ => {}
        }
    }
    out
}
