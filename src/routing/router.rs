//! Ordered route table.

use crate::routing::matcher::{RouteTemplate, RouteTemplateError, RouteValues};

/// Name of the conventional route.
pub const DEFAULT_ROUTE_NAME: &str = "default";

/// Conventional `{controller}/{action}/{id?}` template with `Home`/`Index` defaults.
pub const DEFAULT_ROUTE_TEMPLATE: &str = "{controller=Home}/{action=Index}/{id?}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedRoute {
    pub name: String,
    pub template: RouteTemplate,
}

/// A matched route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a> {
    pub route: &'a str,
    pub values: RouteValues,
}

/// Immutable list of routes. First match wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<NamedRoute>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table holding only the conventional default route.
    pub fn with_default_route() -> Result<Self, RouteTemplateError> {
        let mut table = Self::new();
        table.map_route(DEFAULT_ROUTE_NAME, DEFAULT_ROUTE_TEMPLATE)?;
        Ok(table)
    }

    pub fn map_route(&mut self, name: impl Into<String>, template: &str) -> Result<&mut Self, RouteTemplateError> {
        self.routes.push(NamedRoute {
            name: name.into(),
            template: RouteTemplate::parse(template)?,
        });
        Ok(self)
    }

    pub fn match_path(&self, path: &str) -> Option<RouteMatch<'_>> {
        self.routes.iter().find_map(|route| {
            route.template.matches(path).map(|values| RouteMatch {
                route: route.name.as_str(),
                values,
            })
        })
    }

    pub fn routes(&self) -> &[NamedRoute] {
        &self.routes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_match_wins() {
        let mut table = RouteTable::new();
        table.map_route("admin", "admin/{action=Status}").unwrap();
        table.map_route(DEFAULT_ROUTE_NAME, DEFAULT_ROUTE_TEMPLATE).unwrap();

        let admin = table.match_path("/admin").unwrap();
        assert_eq!(admin.route, "admin");
        assert_eq!(admin.values.action(), Some("Status"));

        let home = table.match_path("/").unwrap();
        assert_eq!(home.route, DEFAULT_ROUTE_NAME);
        assert_eq!(home.values.controller(), Some("Home"));
    }

    #[test]
    fn test_no_match() {
        let table = RouteTable::with_default_route().unwrap();
        assert!(table.match_path("/a/b/c/d").is_none());
    }
}
