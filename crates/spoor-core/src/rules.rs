//! Route ignore rules and per-route tracking overrides.
//!
//! All rules are declared while the tracker is being built, before any
//! request traffic is served. After that the set is read-only and shared
//! lock-free across in-flight requests.

use std::collections::{HashMap, HashSet};

use regex::Regex;

use crate::config::ConfigError;

/// Per-route tracking overrides.
#[derive(Debug, Clone, Default)]
pub struct RouteDetail {
    pub action_name: Option<String>,
}

/// Ignore rules and route metadata, keyed by the resolved route identifier
/// (the route pattern, not the literal request path).
#[derive(Debug, Default)]
pub struct RouteRules {
    ignored_routes: HashSet<String>,
    ignored_patterns: Vec<Regex>,
    ignored_ua_patterns: Vec<Regex>,
    ignored_ua_prefixes: Vec<String>,
    details: HashMap<String, RouteDetail>,
}

impl RouteRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclude a route from tracking by its exact identifier.
    pub fn ignore_route(&mut self, route: impl Into<String>) -> &mut Self {
        self.ignored_routes.insert(route.into());
        self
    }

    /// Exclude every route whose identifier matches `pattern` in full.
    pub fn ignore_pattern(&mut self, pattern: &str) -> Result<&mut Self, ConfigError> {
        let anchored = format!("^(?:{pattern})$");
        let regex = Regex::new(&anchored).map_err(|source| ConfigError::InvalidIgnorePattern {
            pattern: pattern.to_string(),
            source: Box::new(source),
        })?;
        self.ignored_patterns.push(regex);
        Ok(self)
    }

    /// Exclude requests whose user agent matches `pattern` anywhere.
    pub fn ignore_user_agent_pattern(&mut self, pattern: &str) -> Result<&mut Self, ConfigError> {
        let regex = Regex::new(pattern).map_err(|source| ConfigError::InvalidIgnorePattern {
            pattern: pattern.to_string(),
            source: Box::new(source),
        })?;
        self.ignored_ua_patterns.push(regex);
        Ok(self)
    }

    /// Exclude requests whose user agent starts with `prefix`.
    pub fn ignore_user_agent_prefix(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.ignored_ua_prefixes.push(prefix.into());
        self
    }

    /// Declare metadata for a route, adjacent to where the route is defined:
    ///
    /// ```
    /// use spoor_core::RouteRules;
    ///
    /// let mut rules = RouteRules::new();
    /// rules.declare("/users").action_name("Users");
    /// rules.declare("/heartbeat").ignore();
    /// ```
    pub fn declare(&mut self, route: impl Into<String>) -> RouteDeclaration<'_> {
        RouteDeclaration {
            rules: self,
            route: route.into(),
        }
    }

    /// Action-name override for a route, if one was declared.
    pub fn action_name_for(&self, route_id: &str) -> Option<&str> {
        self.details
            .get(route_id)
            .and_then(|detail| detail.action_name.as_deref())
    }

    /// Resolve the action name reported for a request: the declared override,
    /// else the route identifier itself, else "Not Found" for requests no
    /// route matched.
    pub fn resolve_action_name(&self, route_id: Option<&str>) -> String {
        match route_id {
            Some(route) => self
                .action_name_for(route)
                .unwrap_or(route)
                .to_string(),
            None => "Not Found".to_string(),
        }
    }

    /// Decide whether a request is tracked at all.
    ///
    /// Pure function of the configured rules and the request facts. The
    /// middleware evaluates it at request start and again at teardown; both
    /// evaluations see the same inputs and must agree.
    pub fn should_track(&self, route_id: Option<&str>, user_agent: Option<&str>) -> bool {
        if let Some(route) = route_id {
            if self.ignored_routes.contains(route) {
                return false;
            }
            if self.ignored_patterns.iter().any(|re| re.is_match(route)) {
                return false;
            }
        }
        if let Some(ua) = user_agent {
            if self.ignored_ua_patterns.iter().any(|re| re.is_match(ua)) {
                return false;
            }
            if self
                .ignored_ua_prefixes
                .iter()
                .any(|prefix| ua.starts_with(prefix.as_str()))
            {
                return false;
            }
        }
        true
    }
}

/// In-progress declaration for one route, returned by [`RouteRules::declare`].
pub struct RouteDeclaration<'a> {
    rules: &'a mut RouteRules,
    route: String,
}

impl RouteDeclaration<'_> {
    /// Override the action name reported for this route. The last
    /// declaration for a route wins.
    pub fn action_name(self, name: impl Into<String>) -> Self {
        let detail = self.rules.details.entry(self.route.clone()).or_default();
        detail.action_name = Some(name.into());
        self
    }

    /// Add this route to the exact ignore list.
    pub fn ignore(self) {
        self.rules.ignored_routes.insert(self.route);
    }
}
