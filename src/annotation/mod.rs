//! Comment-attribute parser.
//!
//! Every comment line that starts with `@keyword` is turned into one [`Attribute`] by a
//! single dispatch table keyed by the lowercase keyword. Each attribute kind has its own
//! small grammar; a line that does not satisfy it yields an [`AttributeError`].
//! Unrecognized keywords are ignored.
//!
//! [`operation`] folds the attributes attached to one function into [`Operation`]s and
//! [`general`] folds the entry-file attributes into [`GeneralInfo`].

pub mod general;
pub mod operation;

pub use general::{parse_general_info, GeneralInfo};
pub use operation::{parse_operations, Operation};

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttributeError {
    #[error("invalid @Router {0:?}: expected `/path [method]`")]
    Router(String),

    #[error("unsupported HTTP method {0:?}")]
    Method(String),

    #[error("invalid @Param {line:?}: {reason}")]
    Param { line: String, reason: String },

    #[error("invalid response {line:?}: {reason}")]
    Response { line: String, reason: String },

    #[error("invalid @Header {line:?}: {reason}")]
    Header { line: String, reason: String },

    #[error("invalid @Security {0:?}")]
    Security(String),

    #[error("@{0} requires a value")]
    MissingValue(String),
}

/// HTTP methods an operation can be routed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    pub fn parse(token: &str) -> Result<Self, AttributeError> {
        match token.to_ascii_lowercase().as_str() {
            "get" => Ok(HttpMethod::Get),
            "post" => Ok(HttpMethod::Post),
            "put" => Ok(HttpMethod::Put),
            "delete" => Ok(HttpMethod::Delete),
            "patch" => Ok(HttpMethod::Patch),
            "head" => Ok(HttpMethod::Head),
            "options" => Ok(HttpMethod::Options),
            _ => Err(AttributeError::Method(token.to_string())),
        }
    }

    /// Upper-case name, e.g. `GET`.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    /// Key used in the path map, e.g. `get`.
    pub fn key(&self) -> String {
        self.as_str().to_ascii_lowercase()
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    pub path: String,
    pub method: HttpMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamLocation {
    Path,
    Query,
    Header,
    Body,
    FormData,
}

impl ParamLocation {
    fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "path" => Some(ParamLocation::Path),
            "query" => Some(ParamLocation::Query),
            "header" => Some(ParamLocation::Header),
            "body" => Some(ParamLocation::Body),
            "formdata" => Some(ParamLocation::FormData),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamLocation::Path => "path",
            ParamLocation::Query => "query",
            ParamLocation::Header => "header",
            ParamLocation::Body => "body",
            ParamLocation::FormData => "formData",
        }
    }
}

/// Data type written in a `@Param` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    /// A primitive keyword: `string`, `integer`, `number`, `boolean`, `file`, `object`.
    Primitive(String),
    /// `[]T`
    Array(Box<ParamType>),
    /// Any other spelling, resolved against the declaring file.
    Model(String),
}

impl ParamType {
    pub fn parse(spelling: &str) -> Self {
        if let Some(inner) = spelling.strip_prefix("[]") {
            return ParamType::Array(Box::new(ParamType::parse(inner)));
        }
        match primitive_keyword(spelling) {
            Some(keyword) => ParamType::Primitive(keyword.to_string()),
            None => ParamType::Model(spelling.to_string()),
        }
    }
}

/// Normalizes primitive spellings accepted in comments.
pub fn primitive_keyword(spelling: &str) -> Option<&'static str> {
    let keyword = match spelling.to_ascii_lowercase().as_str() {
        "string" => "string",
        "integer" | "int" | "int8" | "int16" | "int32" | "int64" | "uint" | "uint8"
        | "uint16" | "uint32" | "uint64" => "integer",
        "number" | "float" | "float32" | "float64" => "number",
        "boolean" | "bool" => "boolean",
        "file" => "file",
        "object" | "interface{}" | "any" => "object",
        _ => return None,
    };
    Some(keyword)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamModifiers {
    pub enums: Vec<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub default: Option<String>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub format: Option<String>,
    pub collection_format: Option<String>,
    pub example: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub location: ParamLocation,
    pub data_type: ParamType,
    pub required: bool,
    pub description: String,
    pub modifiers: ParamModifiers,
}

/// Status key of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusCode {
    Code(u16),
    Default,
}

impl StatusCode {
    fn parse(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("default") {
            return Some(StatusCode::Default);
        }
        if !token.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        match token.parse::<u16>() {
            Ok(code) if (100..=599).contains(&code) => Some(StatusCode::Code(code)),
            _ => None,
        }
    }

    /// Reason phrase used when a response has no description of its own.
    pub fn reason(&self) -> &'static str {
        match self {
            StatusCode::Default => "Default response",
            StatusCode::Code(code) => match *code {
                200 => "OK",
                201 => "Created",
                202 => "Accepted",
                204 => "No Content",
                301 => "Moved Permanently",
                302 => "Found",
                304 => "Not Modified",
                400 => "Bad Request",
                401 => "Unauthorized",
                403 => "Forbidden",
                404 => "Not Found",
                405 => "Method Not Allowed",
                409 => "Conflict",
                410 => "Gone",
                422 => "Unprocessable Entity",
                429 => "Too Many Requests",
                500 => "Internal Server Error",
                501 => "Not Implemented",
                502 => "Bad Gateway",
                503 => "Service Unavailable",
                504 => "Gateway Timeout",
                _ => "",
            },
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCode::Code(code) => write!(f, "{}", code),
            StatusCode::Default => f.write_str("default"),
        }
    }
}

/// The `{...}` keyword of a response line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    Object,
    Array,
    String,
    Integer,
    Number,
    Boolean,
    File,
}

impl ResponseShape {
    fn parse(token: &str) -> Option<Self> {
        let inner = token.strip_prefix('{')?.strip_suffix('}')?;
        match inner.trim().to_ascii_lowercase().as_str() {
            "object" => Some(ResponseShape::Object),
            "array" => Some(ResponseShape::Array),
            "string" => Some(ResponseShape::String),
            "integer" | "int" => Some(ResponseShape::Integer),
            "number" => Some(ResponseShape::Number),
            "boolean" | "bool" => Some(ResponseShape::Boolean),
            "file" => Some(ResponseShape::File),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSpec {
    pub codes: Vec<StatusCode>,
    pub shape: Option<ResponseShape>,
    pub type_ref: Option<String>,
    pub description: String,
}

/// Responses a `@Header` line applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderTarget {
    All,
    Codes(Vec<StatusCode>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSpec {
    pub target: HeaderTarget,
    pub header_type: String,
    pub name: String,
    pub description: String,
}

/// One alternative of `@Security`: every scheme in it must be satisfied.
pub type SecurityRequirement = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactField {
    Name,
    Url,
    Email,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseField {
    Name,
    Url,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecuritySchemeKind {
    Basic,
    ApiKey,
    OAuth2Application,
    OAuth2Implicit,
    OAuth2Password,
    OAuth2AccessCode,
}

/// One recognized comment attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Summary(String),
    Description(String),
    Id(String),
    Tags(Vec<String>),
    Accept(Vec<String>),
    Produce(Vec<String>),
    Param(ParamSpec),
    Response(ResponseSpec),
    Header(HeaderSpec),
    Router(RouteSpec),
    Security(Vec<SecurityRequirement>),
    Deprecated,

    Title(String),
    Version(String),
    TermsOfService(String),
    Contact(ContactField, String),
    License(LicenseField, String),
    Host(String),
    BasePath(String),
    Schemes(Vec<String>),
    TagName(String),
    TagDescription(String),
    SecurityDefinition(SecuritySchemeKind, String),
    SecurityIn(String),
    SecurityName(String),
    TokenUrl(String),
    AuthorizationUrl(String),
    Scope(String, String),
}

type ParseFn = fn(&str) -> Result<Attribute, AttributeError>;

static PARSERS: Lazy<HashMap<&'static str, ParseFn>> = Lazy::new(|| {
    let mut table: HashMap<&'static str, ParseFn> = HashMap::new();
    table.insert("summary", |rest| Ok(Attribute::Summary(rest.to_string())));
    table.insert("description", |rest| {
        Ok(Attribute::Description(rest.to_string()))
    });
    table.insert("id", |rest| required("ID", rest).map(Attribute::Id));
    table.insert("tags", |rest| Ok(Attribute::Tags(split_list(rest))));
    table.insert("accept", |rest| Ok(Attribute::Accept(media_types(rest))));
    table.insert("produce", |rest| Ok(Attribute::Produce(media_types(rest))));
    table.insert("param", |rest| parse_param(rest).map(Attribute::Param));
    table.insert("success", parse_response_attribute);
    table.insert("failure", parse_response_attribute);
    table.insert("response", parse_response_attribute);
    table.insert("header", |rest| parse_header(rest).map(Attribute::Header));
    table.insert("router", |rest| parse_router(rest).map(Attribute::Router));
    table.insert("security", |rest| {
        parse_security(rest).map(Attribute::Security)
    });
    table.insert("deprecated", |_| Ok(Attribute::Deprecated));

    table.insert("title", |rest| Ok(Attribute::Title(rest.to_string())));
    table.insert("version", |rest| Ok(Attribute::Version(rest.to_string())));
    table.insert("termsofservice", |rest| {
        Ok(Attribute::TermsOfService(rest.to_string()))
    });
    table.insert("contact.name", |rest| {
        Ok(Attribute::Contact(ContactField::Name, rest.to_string()))
    });
    table.insert("contact.url", |rest| {
        Ok(Attribute::Contact(ContactField::Url, rest.to_string()))
    });
    table.insert("contact.email", |rest| {
        Ok(Attribute::Contact(ContactField::Email, rest.to_string()))
    });
    table.insert("license.name", |rest| {
        Ok(Attribute::License(LicenseField::Name, rest.to_string()))
    });
    table.insert("license.url", |rest| {
        Ok(Attribute::License(LicenseField::Url, rest.to_string()))
    });
    table.insert("host", |rest| Ok(Attribute::Host(rest.to_string())));
    table.insert("basepath", |rest| Ok(Attribute::BasePath(rest.to_string())));
    table.insert("schemes", |rest| {
        Ok(Attribute::Schemes(
            rest.split_whitespace().map(str::to_string).collect(),
        ))
    });
    table.insert("tag.name", |rest| Ok(Attribute::TagName(rest.to_string())));
    table.insert("tag.description", |rest| {
        Ok(Attribute::TagDescription(rest.to_string()))
    });
    table.insert("securitydefinitions.basic", |rest| {
        security_definition(SecuritySchemeKind::Basic, rest)
    });
    table.insert("securitydefinitions.apikey", |rest| {
        security_definition(SecuritySchemeKind::ApiKey, rest)
    });
    table.insert("securitydefinitions.oauth2.application", |rest| {
        security_definition(SecuritySchemeKind::OAuth2Application, rest)
    });
    table.insert("securitydefinitions.oauth2.implicit", |rest| {
        security_definition(SecuritySchemeKind::OAuth2Implicit, rest)
    });
    table.insert("securitydefinitions.oauth2.password", |rest| {
        security_definition(SecuritySchemeKind::OAuth2Password, rest)
    });
    table.insert("securitydefinitions.oauth2.accesscode", |rest| {
        security_definition(SecuritySchemeKind::OAuth2AccessCode, rest)
    });
    table.insert("in", |rest| Ok(Attribute::SecurityIn(rest.to_string())));
    table.insert("name", |rest| Ok(Attribute::SecurityName(rest.to_string())));
    table.insert("tokenurl", |rest| Ok(Attribute::TokenUrl(rest.to_string())));
    table.insert("authorizationurl", |rest| {
        Ok(Attribute::AuthorizationUrl(rest.to_string()))
    });
    table
});

static ROUTER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(/[^\[\s]*)\s*\[(\w+)\]$").expect("router pattern is valid"));

static MODIFIER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+)\((.*)\)$").expect("modifier pattern is valid"));

/// Parses one comment line.
///
/// Returns `Ok(None)` for lines that are not attributes or whose keyword is not recognized.
pub fn parse_attribute(line: &str) -> Result<Option<Attribute>, AttributeError> {
    let text = strip_comment(line);
    let Some(body) = text.strip_prefix('@') else {
        return Ok(None);
    };

    let (keyword, rest) = match body.find(char::is_whitespace) {
        Some(index) => (&body[..index], body[index..].trim()),
        None => (body, ""),
    };
    let keyword = keyword.to_ascii_lowercase();

    if let Some(scope) = keyword.strip_prefix("scope.") {
        return Ok(Some(Attribute::Scope(scope.to_string(), rest.to_string())));
    }

    match PARSERS.get(keyword.as_str()) {
        Some(parse) => parse(rest).map(Some),
        None => {
            debug!("Ignoring unknown attribute @{}", keyword);
            Ok(None)
        }
    }
}

/// Removes a leading `//` comment marker and surrounding whitespace.
fn strip_comment(line: &str) -> &str {
    let trimmed = line.trim();
    trimmed.strip_prefix("//").unwrap_or(trimmed).trim()
}

fn required(keyword: &str, rest: &str) -> Result<String, AttributeError> {
    if rest.is_empty() {
        return Err(AttributeError::MissingValue(keyword.to_string()));
    }
    Ok(rest.to_string())
}

fn split_list(rest: &str) -> Vec<String> {
    rest.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn security_definition(kind: SecuritySchemeKind, rest: &str) -> Result<Attribute, AttributeError> {
    let name = required("securityDefinitions", rest)?;
    Ok(Attribute::SecurityDefinition(kind, name))
}

/// Maps the comma-separated short codes of `@Accept`/`@Produce` to media types.
///
/// Tokens already spelled as `type/subtype` pass through; unknown codes are dropped.
pub fn media_types(list: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for token in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let media_type = match token.to_ascii_lowercase().as_str() {
            "json" => "application/json".to_string(),
            "xml" => "text/xml".to_string(),
            "plain" => "text/plain".to_string(),
            "html" => "text/html".to_string(),
            "mpfd" => "multipart/form-data".to_string(),
            "x-www-form-urlencoded" => "application/x-www-form-urlencoded".to_string(),
            "json-api" => "application/vnd.api+json".to_string(),
            "json-stream" => "application/x-json-stream".to_string(),
            "octet-stream" => "application/octet-stream".to_string(),
            "png" => "image/png".to_string(),
            "jpeg" => "image/jpeg".to_string(),
            "gif" => "image/gif".to_string(),
            _ if token.contains('/') => token.to_string(),
            _ => {
                debug!("Dropping unknown media type code {:?}", token);
                continue;
            }
        };
        if !out.contains(&media_type) {
            out.push(media_type);
        }
    }
    out
}

pub fn parse_router(rest: &str) -> Result<RouteSpec, AttributeError> {
    let captures = ROUTER_REGEX
        .captures(rest.trim())
        .ok_or_else(|| AttributeError::Router(rest.to_string()))?;
    let method = HttpMethod::parse(&captures[2])?;
    Ok(RouteSpec {
        path: captures[1].to_string(),
        method,
    })
}

/// Splits a line into whitespace-separated fields, keeping double-quoted text and
/// bracketed groups (`{...}`, `[...]`) inside one field.
///
/// A parenthesis only groups when it directly follows a word, as in `Enums(a, b)`;
/// free text such as `User id (numeric)` still splits on its spaces.
pub fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut parens = 0usize;
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '{' | '[' if !in_quotes => {
                depth += 1;
                current.push(c);
            }
            '}' | ']' if !in_quotes => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            '(' if !in_quotes => {
                if parens > 0 || is_word(&current) {
                    parens += 1;
                }
                current.push(c);
            }
            ')' if !in_quotes => {
                parens = parens.saturating_sub(1);
                current.push(c);
            }
            c if c.is_whitespace() && !in_quotes && depth == 0 && parens == 0 => {
                if !current.is_empty() {
                    fields.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        fields.push(current);
    }
    fields
}

fn is_word(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn unquote(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
}

fn join_description(fields: &[String]) -> String {
    if let [single] = fields {
        return unquote(single).to_string();
    }
    fields.join(" ").trim_matches('"').to_string()
}

/// `name location type required "description" [Modifier(value)...]`
pub fn parse_param(rest: &str) -> Result<ParamSpec, AttributeError> {
    let error = |reason: &str| AttributeError::Param {
        line: rest.to_string(),
        reason: reason.to_string(),
    };

    let fields = split_fields(rest);
    if fields.len() < 4 {
        return Err(error("expected name, location, type and required flag"));
    }

    let location =
        ParamLocation::parse(&fields[1]).ok_or_else(|| error("unknown parameter location"))?;
    let required = match fields[3].to_ascii_lowercase().as_str() {
        "true" => true,
        "false" => false,
        _ => return Err(error("required flag must be true or false")),
    };

    let mut modifiers = ParamModifiers::default();
    let mut description = Vec::new();
    for field in &fields[4..] {
        match MODIFIER_REGEX.captures(field) {
            Some(captures) if !field.starts_with('"') => {
                apply_modifier(&mut modifiers, &captures[1], &captures[2]).map_err(|r| error(&r))?;
            }
            _ => description.push(field.clone()),
        }
    }

    Ok(ParamSpec {
        name: fields[0].clone(),
        location,
        data_type: ParamType::parse(&fields[2]),
        required: required || location == ParamLocation::Path,
        description: join_description(&description),
        modifiers,
    })
}

fn apply_modifier(
    modifiers: &mut ParamModifiers,
    name: &str,
    value: &str,
) -> Result<(), String> {
    let value = value.trim();
    let number = |v: &str| {
        v.parse::<f64>()
            .map_err(|_| format!("{}({}) is not a number", name, v))
    };
    let length = |v: &str| {
        v.parse::<usize>()
            .map_err(|_| format!("{}({}) is not a length", name, v))
    };

    match name.to_ascii_lowercase().as_str() {
        "enums" => modifiers.enums = split_list(value),
        "minimum" => modifiers.minimum = Some(number(value)?),
        "maximum" => modifiers.maximum = Some(number(value)?),
        "default" => modifiers.default = Some(value.to_string()),
        "minlength" => modifiers.min_length = Some(length(value)?),
        "maxlength" => modifiers.max_length = Some(length(value)?),
        "format" => modifiers.format = Some(value.to_string()),
        "collectionformat" => modifiers.collection_format = Some(value.to_string()),
        "example" => modifiers.example = Some(value.to_string()),
        other => debug!("Ignoring unknown @Param modifier {}", other),
    }
    Ok(())
}

fn parse_response_attribute(rest: &str) -> Result<Attribute, AttributeError> {
    parse_response(rest).map(Attribute::Response)
}

/// `code[,code...] [{shape}] [type] ["description"]`
pub fn parse_response(rest: &str) -> Result<ResponseSpec, AttributeError> {
    let error = |reason: &str| AttributeError::Response {
        line: rest.to_string(),
        reason: reason.to_string(),
    };

    let fields = split_fields(rest);
    let Some(first) = fields.first() else {
        return Err(error("missing status code"));
    };
    let codes = parse_codes(first).ok_or_else(|| error("status code must be numeric or default"))?;

    let mut index = 1;
    let mut shape = None;
    let mut type_ref = None;
    if let Some(token) = fields.get(index).filter(|t| t.starts_with('{')) {
        shape = Some(ResponseShape::parse(token).ok_or_else(|| error("unknown response shape"))?);
        index += 1;
        if let Some(token) = fields.get(index).filter(|t| !t.starts_with('"')) {
            type_ref = Some(token.clone());
            index += 1;
        }
    }
    if matches!(shape, Some(ResponseShape::Object) | Some(ResponseShape::Array)) && type_ref.is_none()
    {
        return Err(error("object and array responses need a type"));
    }

    Ok(ResponseSpec {
        codes,
        shape,
        type_ref,
        description: join_description(&fields[index.min(fields.len())..]),
    })
}

fn parse_codes(token: &str) -> Option<Vec<StatusCode>> {
    token.split(',').map(|code| StatusCode::parse(code.trim())).collect()
}

/// `code[,code...]|all {type} name "description"`
pub fn parse_header(rest: &str) -> Result<HeaderSpec, AttributeError> {
    let error = |reason: &str| AttributeError::Header {
        line: rest.to_string(),
        reason: reason.to_string(),
    };

    let fields = split_fields(rest);
    if fields.len() < 3 {
        return Err(error("expected code, {type} and name"));
    }

    let target = if fields[0].eq_ignore_ascii_case("all") {
        HeaderTarget::All
    } else {
        HeaderTarget::Codes(
            parse_codes(&fields[0]).ok_or_else(|| error("status code must be numeric or all"))?,
        )
    };
    let header_type = fields[1]
        .strip_prefix('{')
        .and_then(|t| t.strip_suffix('}'))
        .and_then(primitive_keyword)
        .ok_or_else(|| error("header type must be a primitive in braces"))?;

    Ok(HeaderSpec {
        target,
        header_type: header_type.to_string(),
        name: fields[2].clone(),
        description: join_description(&fields[3..]),
    })
}

/// `Scheme[scope, ...] && Other || Alternative`
pub fn parse_security(rest: &str) -> Result<Vec<SecurityRequirement>, AttributeError> {
    let error = || AttributeError::Security(rest.to_string());
    if rest.trim().is_empty() {
        return Err(error());
    }

    let mut alternatives = Vec::new();
    for alternative in rest.split("||") {
        let mut requirement = SecurityRequirement::new();
        for scheme in alternative.split("&&") {
            let scheme = scheme.trim();
            let (name, scopes) = match scheme.find('[') {
                Some(open) => {
                    let scopes = scheme[open + 1..].strip_suffix(']').ok_or_else(error)?;
                    (scheme[..open].trim(), split_list(scopes))
                }
                None => (scheme, Vec::new()),
            };
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(error());
            }
            requirement.insert(name.to_string(), scopes);
        }
        alternatives.push(requirement);
    }
    Ok(alternatives)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_table() {
        assert_eq!(
            media_types("json,xml,plain,html,mpfd"),
            vec![
                "application/json",
                "text/xml",
                "text/plain",
                "text/html",
                "multipart/form-data"
            ]
        );
        assert_eq!(
            media_types("json, bogus, application/pdf, json"),
            vec!["application/json", "application/pdf"]
        );
        assert!(media_types("").is_empty());
    }

    #[test]
    fn test_router_line() {
        let route = parse_router("/customer/get-wishlist/{wishlist_id} [get]").unwrap();
        assert_eq!(route.path, "/customer/get-wishlist/{wishlist_id}");
        assert_eq!(route.method.as_str(), "GET");
        assert_eq!(route.method.key(), "get");

        assert!(matches!(
            parse_router("/customer/get-wishlist"),
            Err(AttributeError::Router(_))
        ));
        assert!(matches!(
            parse_router("customer [get]"),
            Err(AttributeError::Router(_))
        ));
        assert!(matches!(
            parse_router("/customer [fetch]"),
            Err(AttributeError::Method(_))
        ));
    }

    #[test]
    fn test_response_line() {
        let response =
            parse_response(r#"200 {object} model.OrderRow "Error message, if code != 200""#)
                .unwrap();
        assert_eq!(response.codes, vec![StatusCode::Code(200)]);
        assert_eq!(response.shape, Some(ResponseShape::Object));
        assert_eq!(response.type_ref.as_deref(), Some("model.OrderRow"));
        assert_eq!(response.description, "Error message, if code != 200");
    }

    #[test]
    fn test_response_variants() {
        let response = parse_response(r#"400,404 {object} httputil.HTTPError"#).unwrap();
        assert_eq!(
            response.codes,
            vec![StatusCode::Code(400), StatusCode::Code(404)]
        );
        assert_eq!(response.description, "");

        let response = parse_response(r#"default {string} string "fallback""#).unwrap();
        assert_eq!(response.codes, vec![StatusCode::Default]);
        assert_eq!(response.shape, Some(ResponseShape::String));

        let response = parse_response("204").unwrap();
        assert_eq!(response.shape, None);
        assert_eq!(StatusCode::Code(204).reason(), "No Content");

        assert!(parse_response(r#"OK {object} model.User"#).is_err());
        assert!(parse_response(r#"2OO {object} model.User"#).is_err());
        assert!(parse_response(r#"200 {object} "no type""#).is_err());
        assert!(parse_response(r#"200 {thing} model.User"#).is_err());
    }

    #[test]
    fn test_param_line() {
        let param = parse_param(
            r#"status query string false "Filter by status" Enums(active, blocked) default(active)"#,
        )
        .unwrap();
        assert_eq!(param.name, "status");
        assert_eq!(param.location, ParamLocation::Query);
        assert_eq!(param.data_type, ParamType::Primitive("string".to_string()));
        assert!(!param.required);
        assert_eq!(param.description, "Filter by status");
        assert_eq!(param.modifiers.enums, vec!["active", "blocked"]);
        assert_eq!(param.modifiers.default.as_deref(), Some("active"));

        let param = parse_param(r#"limit query int false "Page size" Minimum(1) Maximum(100)"#)
            .unwrap();
        assert_eq!(param.data_type, ParamType::Primitive("integer".to_string()));
        assert_eq!(param.modifiers.minimum, Some(1.0));
        assert_eq!(param.modifiers.maximum, Some(100.0));

        let param = parse_param(r#"order body model.Order true "New order""#).unwrap();
        assert_eq!(param.location, ParamLocation::Body);
        assert_eq!(param.data_type, ParamType::Model("model.Order".to_string()));

        let param = parse_param(r#"ids query []int false "IDs" collectionFormat(csv)"#).unwrap();
        assert_eq!(
            param.data_type,
            ParamType::Array(Box::new(ParamType::Primitive("integer".to_string())))
        );
        assert_eq!(param.modifiers.collection_format.as_deref(), Some("csv"));
    }

    #[test]
    fn test_path_param_is_always_required() {
        let param = parse_param(r#"id path int false "Order ID""#).unwrap();
        assert!(param.required);
    }

    #[test]
    fn test_param_errors() {
        assert!(parse_param("id path int").is_err());
        assert!(parse_param(r#"id cookie int true "ID""#).is_err());
        assert!(parse_param(r#"id path int yes "ID""#).is_err());
        assert!(parse_param(r#"limit query int false "Size" Minimum(one)"#).is_err());
    }

    #[test]
    fn test_header_line() {
        let header = parse_header(r#"200 {string} Token "qwerty""#).unwrap();
        assert_eq!(header.target, HeaderTarget::Codes(vec![StatusCode::Code(200)]));
        assert_eq!(header.header_type, "string");
        assert_eq!(header.name, "Token");
        assert_eq!(header.description, "qwerty");

        let header = parse_header(r#"all {int} X-Rate-Limit "Requests left""#).unwrap();
        assert_eq!(header.target, HeaderTarget::All);
        assert_eq!(header.header_type, "integer");

        assert!(parse_header(r#"200 {object} Token"#).is_err());
    }

    #[test]
    fn test_security_line() {
        let security = parse_security("ApiKeyAuth").unwrap();
        assert_eq!(security.len(), 1);
        assert_eq!(security[0]["ApiKeyAuth"], Vec::<String>::new());

        let security = parse_security("OAuth2Application[write, admin] && ApiKeyAuth").unwrap();
        assert_eq!(security.len(), 1);
        assert_eq!(security[0]["OAuth2Application"], vec!["write", "admin"]);
        assert!(security[0].contains_key("ApiKeyAuth"));

        let security = parse_security("BasicAuth || ApiKeyAuth").unwrap();
        assert_eq!(security.len(), 2);

        assert!(parse_security("").is_err());
        assert!(parse_security("OAuth2[write").is_err());
    }

    #[test]
    fn test_dispatch_is_case_insensitive() {
        assert_eq!(
            parse_attribute("// @SUMMARY Get an order").unwrap(),
            Some(Attribute::Summary("Get an order".to_string()))
        );
        assert_eq!(
            parse_attribute("@accept json").unwrap(),
            Some(Attribute::Accept(vec!["application/json".to_string()]))
        );
        assert_eq!(
            parse_attribute("@scope.write Grants write access").unwrap(),
            Some(Attribute::Scope(
                "write".to_string(),
                "Grants write access".to_string()
            ))
        );
        assert_eq!(
            parse_attribute("@securityDefinitions.apikey ApiKeyAuth").unwrap(),
            Some(Attribute::SecurityDefinition(
                SecuritySchemeKind::ApiKey,
                "ApiKeyAuth".to_string()
            ))
        );
    }

    #[test]
    fn test_unknown_and_plain_lines_are_ignored() {
        assert_eq!(parse_attribute("@x-codeSamples file").unwrap(), None);
        assert_eq!(parse_attribute("GetOrder returns one order").unwrap(), None);
        assert_eq!(parse_attribute("").unwrap(), None);
        assert!(matches!(
            parse_attribute("@ID"),
            Err(AttributeError::MissingValue(_))
        ));
    }

    #[test]
    fn test_split_fields_keeps_groups() {
        assert_eq!(
            split_fields(r#"a "b c" Enums(x, y) {object}"#),
            vec!["a", "\"b c\"", "Enums(x, y)", "{object}"]
        );
    }

    #[test]
    fn test_unquoted_parenthesis_in_description_does_not_group() {
        assert_eq!(
            split_fields("User id (numeric) minimum(1)"),
            vec!["User", "id", "(numeric)", "minimum(1)"]
        );

        let param = parse_param("id path int true User id (numeric) minimum(1)").unwrap();
        assert_eq!(param.description, "User id (numeric)");
        assert_eq!(param.modifiers.minimum, Some(1.0));
    }
}
