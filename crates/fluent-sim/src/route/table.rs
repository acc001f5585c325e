//! Registered routes, newest first.

use super::Route;
use parking_lot::RwLock;

#[derive(Debug, Default)]
pub struct RouteTable {
    routes: RwLock<Vec<Route>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later registrations shadow earlier ones for the same request.
    pub fn register(&self, route: Route) {
        self.routes.write().insert(0, route);
    }

    /// First route (newest first) matching the request.
    pub fn find_match(&self, method: &str, path: &str, query: &[(String, String)]) -> Option<Route> {
        self.routes
            .read()
            .iter()
            .find(|route| route.matches(method, path, query))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.routes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.read().is_empty()
    }
}
