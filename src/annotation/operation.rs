use super::{
    parse_attribute, Attribute, AttributeError, HeaderSpec, HttpMethod, ParamSpec, ResponseSpec,
    RouteSpec, SecurityRequirement,
};
use log::debug;

/// One HTTP endpoint as described by the comments of a function.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub method: HttpMethod,
    pub path: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub id: Option<String>,
    pub tags: Vec<String>,
    pub consumes: Vec<String>,
    pub produces: Vec<String>,
    pub params: Vec<ParamSpec>,
    pub responses: Vec<ResponseSpec>,
    pub headers: Vec<HeaderSpec>,
    pub security: Vec<SecurityRequirement>,
    pub deprecated: bool,
}

/// Accumulates `@Description` lines.
///
/// Lines are joined with a newline unless the previous one ended in a backslash; an
/// empty line contributes a blank line.
#[derive(Debug, Default)]
pub(crate) struct DescriptionBuilder {
    text: Option<String>,
    continues: bool,
}

impl DescriptionBuilder {
    pub(crate) fn push(&mut self, line: &str) {
        let (line, continues) = match line.strip_suffix('\\') {
            Some(stripped) => (stripped, true),
            None => (line, false),
        };
        match self.text.as_mut() {
            Some(text) => {
                if !self.continues {
                    text.push('\n');
                }
                text.push_str(line);
            }
            None => self.text = Some(line.to_string()),
        }
        self.continues = continues;
    }

    pub(crate) fn finish(self) -> Option<String> {
        self.text
    }
}

/// Parses the comment lines of one function.
///
/// Returns one [`Operation`] per `@Router` line, or none when the function has no
/// route. Any malformed attribute rejects the whole function.
pub fn parse_operations(lines: &[String]) -> Result<Vec<Operation>, AttributeError> {
    let mut routes: Vec<RouteSpec> = Vec::new();
    let mut summary = None;
    let mut description = DescriptionBuilder::default();
    let mut id = None;
    let mut tags = Vec::new();
    let mut consumes = Vec::new();
    let mut produces = Vec::new();
    let mut params = Vec::new();
    let mut responses = Vec::new();
    let mut headers = Vec::new();
    let mut security = Vec::new();
    let mut deprecated = false;

    for line in lines {
        let Some(attribute) = parse_attribute(line)? else {
            continue;
        };
        match attribute {
            Attribute::Summary(text) => summary = Some(text),
            Attribute::Description(text) => description.push(&text),
            Attribute::Id(value) => id = Some(value),
            Attribute::Tags(values) => tags.extend(values),
            Attribute::Accept(values) => extend_unique(&mut consumes, values),
            Attribute::Produce(values) => extend_unique(&mut produces, values),
            Attribute::Param(param) => params.push(param),
            Attribute::Response(response) => responses.push(response),
            Attribute::Header(header) => headers.push(header),
            Attribute::Router(route) => routes.push(route),
            Attribute::Security(requirements) => security.extend(requirements),
            Attribute::Deprecated => deprecated = true,
            other => debug!("Attribute {:?} has no meaning on an operation", other),
        }
    }

    if routes.is_empty() {
        return Ok(Vec::new());
    }

    let description = description.finish();
    let operations = routes
        .into_iter()
        .map(|route| Operation {
            method: route.method,
            path: route.path,
            summary: summary.clone(),
            description: description.clone(),
            id: id.clone(),
            tags: tags.clone(),
            consumes: consumes.clone(),
            produces: produces.clone(),
            params: params.clone(),
            responses: responses.clone(),
            headers: headers.clone(),
            security: security.clone(),
            deprecated,
        })
        .collect();
    Ok(operations)
}

fn extend_unique(target: &mut Vec<String>, values: Vec<String>) {
    for value in values {
        if !target.contains(&value) {
            target.push(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{ParamLocation, ResponseShape, StatusCode};

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_full_operation() {
        let doc = lines(
            r#"// GetWishlist returns the wishlist of a customer.
// @Summary      Get wishlist
// @Description  Returns every item on the wishlist.
// @ID           get-wishlist
// @Tags         wishlist, customer
// @Accept       json
// @Produce      json,xml
// @Param        wishlist_id path int true "Wishlist ID"
// @Success      200 {object} model.OrderRow "Error message, if code != 200"
// @Failure      404 {object} httputil.HTTPError
// @Header       200 {string} Token "qwerty"
// @Security     ApiKeyAuth
// @Router       /customer/get-wishlist/{wishlist_id} [get]"#,
        );

        let operations = parse_operations(&doc).unwrap();
        assert_eq!(operations.len(), 1);
        let op = &operations[0];
        assert_eq!(op.method, HttpMethod::Get);
        assert_eq!(op.path, "/customer/get-wishlist/{wishlist_id}");
        assert_eq!(op.summary.as_deref(), Some("Get wishlist"));
        assert_eq!(op.description.as_deref(), Some("Returns every item on the wishlist."));
        assert_eq!(op.id.as_deref(), Some("get-wishlist"));
        assert_eq!(op.tags, vec!["wishlist", "customer"]);
        assert_eq!(op.consumes, vec!["application/json"]);
        assert_eq!(op.produces, vec!["application/json", "text/xml"]);

        assert_eq!(op.params.len(), 1);
        assert_eq!(op.params[0].location, ParamLocation::Path);

        assert_eq!(op.responses.len(), 2);
        assert_eq!(op.responses[0].codes, vec![StatusCode::Code(200)]);
        assert_eq!(op.responses[0].shape, Some(ResponseShape::Object));
        assert_eq!(op.responses[1].codes, vec![StatusCode::Code(404)]);
        assert_eq!(op.headers.len(), 1);
        assert_eq!(op.security.len(), 1);
        assert!(!op.deprecated);
    }

    #[test]
    fn test_description_joining() {
        let doc = lines(
            "@Description first line\n\
             @Description second \\\n\
             @Description continued\n\
             @Description\n\
             @Description after blank\n\
             @Router /x [post]",
        );

        let operations = parse_operations(&doc).unwrap();
        assert_eq!(
            operations[0].description.as_deref(),
            Some("first line\nsecond continued\n\nafter blank")
        );
    }

    #[test]
    fn test_without_router_is_not_an_operation() {
        let doc = lines("// Helper does things.\n// @Summary Not routed");
        assert!(parse_operations(&doc).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_router_rejects_operation() {
        let doc = lines("@Summary Broken\n@Router /customer/get-wishlist");
        assert!(matches!(
            parse_operations(&doc),
            Err(AttributeError::Router(_))
        ));
    }

    #[test]
    fn test_non_numeric_status_rejects_operation() {
        let doc = lines("@Success OK {object} model.User\n@Router /users [get]");
        assert!(matches!(
            parse_operations(&doc),
            Err(AttributeError::Response { .. })
        ));
    }

    #[test]
    fn test_several_routers() {
        let doc = lines(
            "@Summary List\n@Deprecated\n@Router /users [get]\n@Router /v1/users [get]",
        );
        let operations = parse_operations(&doc).unwrap();
        assert_eq!(operations.len(), 2);
        assert_eq!(operations[0].path, "/users");
        assert_eq!(operations[1].path, "/v1/users");
        assert!(operations.iter().all(|op| op.deprecated));
        assert!(operations.iter().all(|op| op.summary.as_deref() == Some("List")));
    }
}
