//! Route categories, resolved once when the table is built

use std::collections::HashMap;

use crate::router::BootTerminal;

/// Who may see a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteCategory {
    /// Marketing and browse pages, open to everyone.
    Public,
    /// Sign-in, sign-up and recovery pages.
    Auth,
    /// Signed-in pages used while setting up an account.
    Setup,
    /// Everything else. Requires a session.
    Protected,
}

impl RouteCategory {
    /// Routes a signed-out visitor may stay on.
    pub fn allows_signed_out(self) -> bool {
        matches!(self, RouteCategory::Public | RouteCategory::Auth)
    }

    /// Routes where a sign-in must not trigger a redirect.
    pub fn is_auth_adjacent(self) -> bool {
        matches!(self, RouteCategory::Auth | RouteCategory::Setup)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RouteRule {
    pattern: String,
    category: RouteCategory,
    owner: Option<BootTerminal>,
}

/// A path together with what the table knows about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub path: String,
    pub category: RouteCategory,
    /// The terminal this route belongs to, if any.
    pub owner: Option<BootTerminal>,
}

/// Maps paths to categories. Exact rules win over prefix rules, the longest
/// matching prefix wins, and unknown paths are protected.
#[derive(Debug, Clone)]
pub struct RouteTable {
    exact: HashMap<String, RouteRule>,
    prefixes: Vec<RouteRule>,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::default()
    }

    pub fn resolve(&self, path: &str) -> ResolvedRoute {
        let path = normalize(path);

        let rule = self.exact.get(&path).or_else(|| {
            // Sorted longest first.
            self.prefixes
                .iter()
                .find(|rule| segment_prefix(&path, &rule.pattern))
        });

        match rule {
            Some(rule) => ResolvedRoute {
                category: rule.category,
                owner: rule.owner,
                path,
            },
            None => ResolvedRoute {
                path,
                category: RouteCategory::Protected,
                owner: None,
            },
        }
    }

    pub fn category(&self, path: &str) -> RouteCategory {
        self.resolve(path).category
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        use BootTerminal::*;
        use RouteCategory::*;

        RouteTable::builder()
            .exact("/", Public)
            .exact("/about", Public)
            .exact("/pricing", Public)
            .exact("/contact", Public)
            .exact("/terms", Public)
            .exact("/privacy", Public)
            // The talent directory; its subpages are the dashboard.
            .exact("/talent", Public)
            .prefix("/gigs", Public)
            .prefix("/talent/profile", Public)
            .prefix("/login", Auth)
            .prefix("/signup", Auth)
            .prefix("/reset-password", Auth)
            .prefix("/update-password", Auth)
            .prefix("/verification-pending", Auth)
            .prefix("/auth", Auth)
            .prefix("/settings", Setup)
            .owned_prefix("/onboarding", Setup, Onboarding)
            .owned_prefix("/choose-role", Setup, ChooseRole)
            .owned_prefix("/talent", Protected, TalentDashboard)
            .owned_prefix("/client", Protected, ClientDashboard)
            .owned_prefix("/admin", Protected, AdminDashboard)
            .build()
    }
}

#[derive(Debug, Default)]
pub struct RouteTableBuilder {
    exact: Vec<RouteRule>,
    prefixes: Vec<RouteRule>,
}

impl RouteTableBuilder {
    pub fn exact(mut self, path: &str, category: RouteCategory) -> Self {
        self.exact.push(rule(path, category, None));
        self
    }

    /// Matches `path` and everything below it.
    pub fn prefix(mut self, path: &str, category: RouteCategory) -> Self {
        self.prefixes.push(rule(path, category, None));
        self
    }

    pub fn owned_prefix(mut self, path: &str, category: RouteCategory, owner: BootTerminal) -> Self {
        self.prefixes.push(rule(path, category, Some(owner)));
        self
    }

    pub fn build(self) -> RouteTable {
        let mut prefixes = self.prefixes;
        prefixes.sort_by(|a, b| b.pattern.len().cmp(&a.pattern.len()));
        RouteTable {
            exact: self
                .exact
                .into_iter()
                .map(|rule| (rule.pattern.clone(), rule))
                .collect(),
            prefixes,
        }
    }
}

fn rule(path: &str, category: RouteCategory, owner: Option<BootTerminal>) -> RouteRule {
    RouteRule {
        pattern: normalize(path),
        category,
        owner,
    }
}

fn segment_prefix(path: &str, prefix: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Strips the query, fragment and trailing slash.
pub fn normalize(path: &str) -> String {
    let end = path.find(&['?', '#'][..]).unwrap_or(path.len());
    let trimmed = path[..end].trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
