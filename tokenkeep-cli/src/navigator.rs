use std::sync::Mutex;

use tokenkeep::Navigator;

/// Terminal stand-in for the UI router: redirects are printed, not rendered.
pub struct ConsoleNavigator {
    current: Mutex<String>,
}

impl ConsoleNavigator {
    pub fn new() -> Self {
        Self {
            current: Mutex::new("/".to_string()),
        }
    }
}

impl Default for ConsoleNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator for ConsoleNavigator {
    fn current_route(&self) -> String {
        self.current
            .lock()
            .map(|route| route.clone())
            .unwrap_or_default()
    }

    fn navigate(&self, route: &str) {
        eprintln!("→ redirect to {}", route);
        if let Ok(mut current) = self.current.lock() {
            *current = route.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_current_route() {
        let navigator = ConsoleNavigator::new();
        assert_eq!(navigator.current_route(), "/");

        navigator.navigate("/login");
        assert_eq!(navigator.current_route(), "/login");
    }
}
