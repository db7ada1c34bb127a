use crate::{
    roles::RoleSet,
    route_table::{HOME_PATH, LOGIN_PATH, normalize_path},
    session::Session,
};

/// Redirect
///
/// A redirect verdict. `from` carries the originally requested location so the
/// login flow can send the user back after signing in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub to: String,
    pub from: Option<String>,
    /// Replace the current history entry instead of pushing a new one.
    pub replace: bool,
}

impl Redirect {
    pub fn to_login(from: &str) -> Self {
        Self {
            to: LOGIN_PATH.to_string(),
            from: Some(from.to_string()),
            replace: true,
        }
    }

    pub fn to_home() -> Self {
        Self {
            to: HOME_PATH.to_string(),
            from: None,
            replace: true,
        }
    }

    /// The target as a URL, with the carried path encoded as `?from=`.
    pub fn location(&self) -> String {
        match &self.from {
            Some(from) => format!("{}?from={}", self.to, urlencoding::encode(from)),
            None => self.to.clone(),
        }
    }
}

/// Decision
///
/// The outcome of guarding one navigation. Derived fresh every time, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The session is still resolving; show a neutral loading indicator.
    Pending,
    Allow,
    Redirect(Redirect),
}

impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn redirect(&self) -> Option<&Redirect> {
        match self {
            Decision::Redirect(redirect) => Some(redirect),
            _ => None,
        }
    }
}

/// evaluate
///
/// Guards a protected route. `required` is the route's role set; an empty set
/// admits any authenticated identity. Public routes must not be passed here.
///
/// The order of the checks matters: a resolving session is never redirected,
/// because the visitor may well be signed in already.
pub fn evaluate(session: &Session, required: RoleSet, current_path: &str) -> Decision {
    if session.is_resolving() {
        tracing::trace!(path = current_path, "session resolving; decision pending");
        return Decision::Pending;
    }

    let Some(identity) = session.identity() else {
        tracing::debug!(path = current_path, "no identity; redirecting to login");
        return Decision::Redirect(Redirect::to_login(current_path));
    };

    if !required.is_empty() && !required.contains(identity.role) {
        // Silent: the visitor lands on the dashboard without learning the page exists.
        tracing::debug!(
            path = current_path,
            role = %identity.role,
            user_id = %identity.id,
            "role not permitted; redirecting home"
        );
        return Decision::Redirect(Redirect::to_home());
    }

    Decision::Allow
}

/// return_target
///
/// Turns the `from` value carried through the login flow into a safe place to
/// land: only local absolute paths are honored, and never the login page itself.
pub fn return_target(from: Option<&str>) -> String {
    match from.map(str::trim) {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.chars().any(char::is_control)
                && !normalize_path(path).eq_ignore_ascii_case(LOGIN_PATH) =>
        {
            path.to_string()
        }
        _ => HOME_PATH.to_string(),
    }
}
