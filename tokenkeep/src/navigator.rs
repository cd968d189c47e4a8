/// Presentation-layer hook for session redirects.
pub trait Navigator: Send + Sync {
    /// Route currently shown, e.g. `/dashboard`.
    fn current_route(&self) -> String;

    fn navigate(&self, route: &str);
}

/// Navigate to `route` unless it is already current.
/// Returns whether a navigation happened.
pub(crate) fn navigate_once(navigator: &dyn Navigator, route: &str) -> bool {
    if navigator.current_route() == route {
        tracing::debug!(route, "Already on route, not navigating");
        return false;
    }
    tracing::info!(route, "Redirecting");
    navigator.navigate(route);
    true
}
