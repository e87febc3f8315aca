//! Role routing
//!
//! [`decide`] maps a [`BootState`] to the [`BootTerminal`] the user belongs
//! on. It is a pure function; navigation is left to the callers, which skip
//! it when the user is already there.

use std::fmt;

use log::debug;

use crate::navigation::Navigator;
use crate::profile::{AccountType, UserRole};
use crate::routes::{normalize, RouteTable};

/// Where a user lands once auth and role resolution are done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BootTerminal {
    TalentDashboard,
    ClientDashboard,
    AdminDashboard,
    Onboarding,
    ChooseRole,
    Login,
}

impl BootTerminal {
    pub const ALL: [BootTerminal; 6] = [
        BootTerminal::TalentDashboard,
        BootTerminal::ClientDashboard,
        BootTerminal::AdminDashboard,
        BootTerminal::Onboarding,
        BootTerminal::ChooseRole,
        BootTerminal::Login,
    ];

    pub fn path(self) -> &'static str {
        match self {
            BootTerminal::TalentDashboard => "/talent/dashboard",
            BootTerminal::ClientDashboard => "/client/dashboard",
            BootTerminal::AdminDashboard => "/admin/dashboard",
            BootTerminal::Onboarding => "/onboarding",
            BootTerminal::ChooseRole => "/choose-role",
            BootTerminal::Login => "/login",
        }
    }

}

impl fmt::Display for BootTerminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// The inputs of the routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootState {
    pub has_session: bool,
    /// Signed in, profile lookup still running.
    pub profile_pending: bool,
    /// Signed in, profile lookup gave up. The role is unknown, not unassigned.
    pub profile_unresolved: bool,
    pub role: Option<UserRole>,
    pub account_type: AccountType,
    pub profile_complete: bool,
}

impl BootState {
    pub fn signed_out() -> Self {
        Self {
            has_session: false,
            profile_pending: false,
            profile_unresolved: false,
            role: None,
            account_type: AccountType::Unassigned,
            profile_complete: false,
        }
    }

    fn role_unknown(&self) -> bool {
        self.has_session && (self.profile_pending || self.profile_unresolved)
    }
}

/// First match wins. `None` means the role is not known yet: the profile is
/// still loading, or its lookup failed and waits for a retry.
pub fn decide(state: &BootState) -> Option<BootTerminal> {
    if !state.has_session {
        return Some(BootTerminal::Login);
    }
    if state.role_unknown() {
        return None;
    }
    let terminal = match state.role {
        Some(UserRole::Admin) => BootTerminal::AdminDashboard,
        Some(UserRole::Client) if state.profile_complete => BootTerminal::ClientDashboard,
        Some(UserRole::Talent) if state.profile_complete => BootTerminal::TalentDashboard,
        Some(UserRole::Client) | Some(UserRole::Talent) => BootTerminal::Onboarding,
        None => BootTerminal::ChooseRole,
    };
    Some(terminal)
}

/// What a page should do about a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Wait,
    Redirect(String),
}

#[derive(Debug, Clone, Default)]
pub struct RoleRouter {
    table: RouteTable,
}

impl RoleRouter {
    pub fn new(table: RouteTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn decide(&self, state: &BootState) -> Option<BootTerminal> {
        decide(state)
    }

    /// The login route, remembering where the user wanted to go.
    pub fn login_target(&self, requested: &str) -> String {
        let requested = requested.trim();
        if requested.is_empty() || normalize(requested) == BootTerminal::Login.path() {
            return BootTerminal::Login.path().to_string();
        }
        format!(
            "{}?returnUrl={}",
            BootTerminal::Login.path(),
            urlencoding::encode(requested)
        )
    }

    pub fn is_at(&self, current: &str, terminal: BootTerminal) -> bool {
        normalize(current) == terminal.path()
    }

    /// Decides whether `requested` may render for `state`.
    pub fn gate(&self, requested: &str, state: &BootState) -> GateDecision {
        let route = self.table.resolve(requested);
        if route.category.allows_signed_out() {
            return GateDecision::Allow;
        }

        let terminal = match decide(state) {
            Some(terminal) => terminal,
            // The page renders its retry affordance.
            None if state.profile_unresolved => return GateDecision::Allow,
            None => return GateDecision::Wait,
        };

        if terminal == BootTerminal::Login {
            return GateDecision::Redirect(self.login_target(requested));
        }

        match route.owner {
            Some(owner) if owner != terminal => {
                debug!("{} belongs to {}, sending to {}", route.path, owner, terminal);
                GateDecision::Redirect(terminal.path().to_string())
            }
            _ => GateDecision::Allow,
        }
    }

    /// Pushes the terminal for `state` unless the navigator is already there.
    /// Returns the terminal, or `None` while the role is unknown.
    pub fn converge(&self, navigator: &dyn Navigator, state: &BootState) -> Option<BootTerminal> {
        let terminal = decide(state)?;
        let current = navigator.current_path();
        if self.is_at(&current, terminal) {
            debug!("Already at {}", terminal);
            return Some(terminal);
        }
        let target = if terminal == BootTerminal::Login {
            self.login_target(&current)
        } else {
            terminal.path().to_string()
        };
        navigator.push(&target);
        Some(terminal)
    }
}
