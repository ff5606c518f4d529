use std::collections::HashSet;

use regex::Regex;
use thiserror::Error;

use crate::models::WILDCARD;

const RESOURCE_GROUP: &str = "resource";
const OBJECT_GROUP: &str = "object";

#[derive(Debug, Error)]
pub enum RouteMatchError {
    #[error("no resource or object")]
    NoMatch,

    #[error("invalid route template '{template}': {source}")]
    InvalidTemplate {
        template: String,
        #[source]
        source: regex::Error,
    },

    #[error("route template '{template}' declares unknown group '{group}'")]
    UnknownGroup { template: String, group: String },

    #[error("route template '{0}' declares neither a resource nor an object group")]
    NoGroups(String),
}

/// The `(resource, object)` pair derived from a path. A side the template
/// doesn't capture is `*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub resource: String,
    pub object: String,
}

struct CompiledTemplate {
    source: String,
    regex: Regex,
    declared: usize,
}

/// Ordered path templates. The first template that matches the whole path
/// and captures every group it declares wins.
pub struct RouteMatcher {
    templates: Vec<CompiledTemplate>,
}

impl RouteMatcher {
    pub fn new<S: AsRef<str>>(templates: &[S]) -> Result<Self, RouteMatchError> {
        let templates = templates
            .iter()
            .map(|t| compile(t.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { templates })
    }

    /// Templates that appear more than once. Later copies can never win.
    pub fn duplicates(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.templates
            .iter()
            .filter(|t| !seen.insert(t.source.as_str()))
            .map(|t| t.source.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Derive `(resource, object)` from a forwarded URI. The query string and
    /// fragment are ignored.
    pub fn match_uri(&self, uri: &str) -> Result<RouteMatch, RouteMatchError> {
        let path = uri
            .split_once(['?', '#'])
            .map_or(uri, |(path, _)| path);

        for template in &self.templates {
            let Some(caps) = template.regex.captures(path) else {
                continue;
            };

            let resource = caps.name(RESOURCE_GROUP).map(|m| m.as_str());
            let object = caps.name(OBJECT_GROUP).map(|m| m.as_str());
            let captured = usize::from(resource.is_some()) + usize::from(object.is_some());
            if captured != template.declared {
                continue;
            }

            return Ok(RouteMatch {
                resource: resource.unwrap_or(WILDCARD).to_string(),
                object: object.unwrap_or(WILDCARD).to_string(),
            });
        }

        Err(RouteMatchError::NoMatch)
    }
}

fn compile(template: &str) -> Result<CompiledTemplate, RouteMatchError> {
    let regex = Regex::new(&format!("^(?:{template})$")).map_err(|source| {
        RouteMatchError::InvalidTemplate {
            template: template.to_string(),
            source,
        }
    })?;

    let mut declared = 0;
    for name in regex.capture_names().flatten() {
        if name != RESOURCE_GROUP && name != OBJECT_GROUP {
            return Err(RouteMatchError::UnknownGroup {
                template: template.to_string(),
                group: name.to_string(),
            });
        }
        declared += 1;
    }
    if declared == 0 {
        return Err(RouteMatchError::NoGroups(template.to_string()));
    }

    Ok(CompiledTemplate {
        source: template.to_string(),
        regex,
        declared,
    })
}
