//! # Path Router
//!
//! Maps an `(operation, path)` pair to a registered handler. Registration
//! rejects a second handler for the same pattern shape and operation. Routing
//! picks the most specific pattern matching the path (see
//! [`PathPattern::rank`]); that pattern owns the path, so if it does not
//! accept the operation the result is `MethodNotAllowed` even when a less
//! specific pattern would have.

pub mod pattern;

use std::collections::BTreeMap;
use std::fmt;

use crate::domain::Operation;
use crate::errors::{BackendError, BackendResult};

pub use pattern::{Captures, PathPattern};

/// Patterns sharing one shape, keyed by operation
struct RouteEntry<H> {
    shape: String,
    rank: Vec<u8>,
    operations: BTreeMap<Operation, (PathPattern, H)>,
}

/// Result of a successful route lookup
#[derive(Debug)]
pub struct Matched<'a, H> {
    pub handler: &'a H,
    pub captures: Captures,
    pub pattern: &'a PathPattern,
}

pub struct Router<H> {
    routes: Vec<RouteEntry<H>>,
}

impl<H> Default for Router<H> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<H> Router<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `operation` on `pattern`
    pub fn register(&mut self, pattern: &str, operation: Operation, handler: H) -> BackendResult<()> {
        let pattern = PathPattern::parse(pattern)?;
        let shape = pattern.shape();

        let index = match self.routes.iter().position(|r| r.shape == shape) {
            Some(index) => index,
            None => {
                self.routes.push(RouteEntry {
                    shape,
                    rank: pattern.rank(),
                    operations: BTreeMap::new(),
                });
                self.routes.len() - 1
            }
        };

        let entry = &mut self.routes[index];
        if entry.operations.contains_key(&operation) {
            return Err(BackendError::pattern_conflict(pattern.as_str(), operation));
        }
        entry.operations.insert(operation, (pattern, handler));
        Ok(())
    }

    /// Find the handler for `operation` on a normalized `path`
    pub fn route(&self, operation: Operation, path: &str) -> BackendResult<Matched<'_, H>> {
        let owner = self
            .routes
            .iter()
            .filter(|route| {
                route.operations.values().next().is_some_and(|(pattern, _)| pattern.matches(path).is_some())
            })
            .max_by(|a, b| a.rank.cmp(&b.rank))
            .ok_or_else(|| BackendError::no_route(path))?;

        let Some((pattern, handler)) = owner.operations.get(&operation) else {
            let allowed = owner.operations.keys().copied().collect();
            return Err(BackendError::method_not_allowed(path, operation, allowed));
        };
        let captures = pattern.matches(path).ok_or_else(|| BackendError::no_route(path))?;

        Ok(Matched { handler, captures, pattern })
    }

    /// Registered `(pattern, operation)` pairs, for startup logging
    pub fn registrations(&self) -> Vec<(String, Operation)> {
        self.routes
            .iter()
            .flat_map(|route| route.operations.iter().map(|(op, (pattern, _))| (pattern.to_string(), *op)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.routes.iter().map(|r| r.operations.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<H> fmt::Debug for Router<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").field("shapes", &self.routes.iter().map(|r| &r.shape).collect::<Vec<_>>()).finish()
    }
}
