use super::operation::DescriptionBuilder;
use super::{
    parse_attribute, Attribute, AttributeError, ContactField, LicenseField, SecurityRequirement,
    SecuritySchemeKind,
};
use crate::document::{Contact, Info, License, SecurityScheme, Tag};
use log::debug;
use std::collections::BTreeMap;

/// API-wide information declared in the entry file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneralInfo {
    pub info: Info,
    pub host: Option<String>,
    pub base_path: Option<String>,
    pub schemes: Vec<String>,
    pub consumes: Vec<String>,
    pub produces: Vec<String>,
    pub tags: Vec<Tag>,
    pub security_definitions: BTreeMap<String, SecurityScheme>,
    pub security: Vec<SecurityRequirement>,
}

/// What a context-dependent attribute (`@description`, `@in`, `@name`, ...) applies to.
///
/// A tag or security definition stays the target until an unrelated attribute appears.
enum Target {
    Api,
    Tag(usize),
    Scheme(String),
}

/// Folds the entry-file comment lines into [`GeneralInfo`].
///
/// Malformed lines are skipped and returned alongside the result.
pub fn parse_general_info(lines: &[String]) -> (GeneralInfo, Vec<AttributeError>) {
    let mut general = GeneralInfo::default();
    let mut errors = Vec::new();
    let mut description = DescriptionBuilder::default();
    let mut target = Target::Api;

    for line in lines {
        let attribute = match parse_attribute(line) {
            Ok(Some(attribute)) => attribute,
            Ok(None) => continue,
            Err(e) => {
                errors.push(e);
                continue;
            }
        };

        match attribute {
            Attribute::Title(title) => general.info.title = title,
            Attribute::Version(version) => general.info.version = version,
            Attribute::Description(text) => {
                match &target {
                    Target::Api => description.push(&text),
                    Target::Tag(index) => general.tags[*index].description = Some(text),
                    Target::Scheme(name) => {
                        if let Some(scheme) = general.security_definitions.get_mut(name) {
                            scheme.description = Some(text);
                        }
                    }
                }
                continue;
            }
            Attribute::TermsOfService(url) => general.info.terms_of_service = Some(url),
            Attribute::Contact(field, value) => {
                let contact = general.info.contact.get_or_insert_with(Contact::default);
                match field {
                    ContactField::Name => contact.name = Some(value),
                    ContactField::Url => contact.url = Some(value),
                    ContactField::Email => contact.email = Some(value),
                }
            }
            Attribute::License(field, value) => {
                let license = general.info.license.get_or_insert_with(License::default);
                match field {
                    LicenseField::Name => license.name = value,
                    LicenseField::Url => license.url = Some(value),
                }
            }
            Attribute::Host(host) => general.host = Some(host),
            Attribute::BasePath(path) => general.base_path = Some(path),
            Attribute::Schemes(schemes) => general.schemes = schemes,
            Attribute::Accept(types) => general.consumes.extend(types),
            Attribute::Produce(types) => general.produces.extend(types),
            Attribute::Security(requirements) => general.security.extend(requirements),
            Attribute::TagName(name) => {
                general.tags.push(Tag {
                    name,
                    description: None,
                });
                target = Target::Tag(general.tags.len() - 1);
                continue;
            }
            Attribute::TagDescription(text) => {
                if let Some(tag) = general.tags.last_mut() {
                    tag.description = Some(text);
                }
                continue;
            }
            Attribute::SecurityDefinition(kind, name) => {
                general
                    .security_definitions
                    .insert(name.clone(), new_scheme(kind));
                target = Target::Scheme(name);
                continue;
            }
            Attribute::SecurityIn(location) => {
                with_scheme(&mut general, &target, |s| s.location = Some(location));
                continue;
            }
            Attribute::SecurityName(name) => {
                with_scheme(&mut general, &target, |s| s.name = Some(name));
                continue;
            }
            Attribute::TokenUrl(url) => {
                with_scheme(&mut general, &target, |s| s.token_url = Some(url));
                continue;
            }
            Attribute::AuthorizationUrl(url) => {
                with_scheme(&mut general, &target, |s| s.authorization_url = Some(url));
                continue;
            }
            Attribute::Scope(scope, text) => {
                with_scheme(&mut general, &target, |s| {
                    s.scopes.insert(scope, text);
                });
                continue;
            }
            other => debug!("Attribute {:?} has no meaning in general info", other),
        }

        target = Target::Api;
    }

    general.info.description = description.finish();
    (general, errors)
}

fn new_scheme(kind: SecuritySchemeKind) -> SecurityScheme {
    let (scheme_type, flow) = match kind {
        SecuritySchemeKind::Basic => ("basic", None),
        SecuritySchemeKind::ApiKey => ("apiKey", None),
        SecuritySchemeKind::OAuth2Application => ("oauth2", Some("application")),
        SecuritySchemeKind::OAuth2Implicit => ("oauth2", Some("implicit")),
        SecuritySchemeKind::OAuth2Password => ("oauth2", Some("password")),
        SecuritySchemeKind::OAuth2AccessCode => ("oauth2", Some("accessCode")),
    };
    SecurityScheme {
        scheme_type: scheme_type.to_string(),
        flow: flow.map(str::to_string),
        ..Default::default()
    }
}

fn with_scheme(general: &mut GeneralInfo, target: &Target, apply: impl FnOnce(&mut SecurityScheme)) {
    match target {
        Target::Scheme(name) => {
            if let Some(scheme) = general.security_definitions.get_mut(name) {
                apply(scheme);
            }
        }
        _ => debug!("Security attribute outside of a security definition"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_info_block() {
        let doc = lines(
            r#"// @title           Shop API
// @version         1.0
// @description     Orders and customers.
// @termsOfService  http://example.com/terms/
// @contact.name    API Support
// @contact.email   support@example.com
// @license.name    Apache 2.0
// @license.url     http://www.apache.org/licenses/LICENSE-2.0.html
// @host            shop.example.com
// @BasePath        /api/v1
// @schemes         https http
// @accept          json
// @produce         json"#,
        );

        let (general, errors) = parse_general_info(&doc);
        assert!(errors.is_empty());
        assert_eq!(general.info.title, "Shop API");
        assert_eq!(general.info.version, "1.0");
        assert_eq!(general.info.description.as_deref(), Some("Orders and customers."));
        assert_eq!(
            general.info.terms_of_service.as_deref(),
            Some("http://example.com/terms/")
        );
        let contact = general.info.contact.unwrap();
        assert_eq!(contact.name.as_deref(), Some("API Support"));
        assert_eq!(contact.email.as_deref(), Some("support@example.com"));
        assert_eq!(general.info.license.unwrap().name, "Apache 2.0");
        assert_eq!(general.host.as_deref(), Some("shop.example.com"));
        assert_eq!(general.base_path.as_deref(), Some("/api/v1"));
        assert_eq!(general.schemes, vec!["https", "http"]);
        assert_eq!(general.consumes, vec!["application/json"]);
    }

    #[test]
    fn test_security_definitions() {
        let doc = lines(
            r#"@securityDefinitions.basic BasicAuth
@securityDefinitions.apikey ApiKeyAuth
@in header
@name Authorization
@description Bearer token
@securityDefinitions.oauth2.application OAuth2Application
@tokenUrl https://example.com/oauth/token
@scope.write Grants write access
@scope.admin Grants read and write access to administrative information
@title After"#,
        );

        let (general, errors) = parse_general_info(&doc);
        assert!(errors.is_empty());
        assert_eq!(general.info.title, "After");
        assert_eq!(general.info.description, None);

        let definitions = &general.security_definitions;
        assert_eq!(definitions["BasicAuth"].scheme_type, "basic");

        let api_key = &definitions["ApiKeyAuth"];
        assert_eq!(api_key.scheme_type, "apiKey");
        assert_eq!(api_key.location.as_deref(), Some("header"));
        assert_eq!(api_key.name.as_deref(), Some("Authorization"));
        assert_eq!(api_key.description.as_deref(), Some("Bearer token"));

        let oauth = &definitions["OAuth2Application"];
        assert_eq!(oauth.scheme_type, "oauth2");
        assert_eq!(oauth.flow.as_deref(), Some("application"));
        assert_eq!(
            oauth.token_url.as_deref(),
            Some("https://example.com/oauth/token")
        );
        assert_eq!(oauth.scopes.len(), 2);
        assert_eq!(oauth.scopes["write"], "Grants write access");
    }

    #[test]
    fn test_tags_and_errors() {
        let doc = lines(
            "@tag.name orders\n@tag.description Order management\n@tag.name users\n@ID\n@description API",
        );

        let (general, errors) = parse_general_info(&doc);
        assert_eq!(errors.len(), 1);
        assert_eq!(general.tags.len(), 2);
        assert_eq!(general.tags[0].description.as_deref(), Some("Order management"));
        // The description after the second tag belongs to that tag.
        assert_eq!(general.tags[1].description.as_deref(), Some("API"));
        assert_eq!(general.info.description, None);
    }
}
