use smartmadrassa_gate::{
    RouteTable,
    guard::{self, Decision, Redirect},
    models::Identity,
    roles::{Role, RoleSet},
    route_table::{Access, LOGIN_PATH},
    session::Session,
    shell,
};
use uuid::Uuid;

fn signed_in(role: Role) -> Session {
    Session::authenticated(Identity {
        id: Uuid::new_v4(),
        name: "Test".to_string(),
        email: format!("{role}@school.test"),
        role,
        avatar: None,
        must_change_password: false,
    })
}

// --- Guard ---

#[test]
fn test_teacher_denied_administrative_route_goes_home() {
    let decision = guard::evaluate(&signed_in(Role::Teacher), RoleSet::ADMINISTRATIVE, "/users");
    assert_eq!(decision, Decision::Redirect(Redirect::to_home()));
}

#[test]
fn test_anonymous_on_authenticated_route_goes_to_login_with_from() {
    let decision = guard::evaluate(&Session::anonymous(), RoleSet::EMPTY, "/messages");

    let redirect = decision.redirect().expect("login redirect");
    assert_eq!(redirect.to, LOGIN_PATH);
    assert_eq!(redirect.from.as_deref(), Some("/messages"));
    assert!(redirect.replace);
}

#[test]
fn test_resolving_session_is_pending_never_redirected() {
    for required in [RoleSet::EMPTY, RoleSet::STAFF, RoleSet::ADMINISTRATIVE] {
        let decision = guard::evaluate(&Session::resolving(), required, "/grades");
        assert_eq!(decision, Decision::Pending);
    }
}

#[test]
fn test_empty_role_set_admits_every_role() {
    for role in Role::ALL {
        assert!(guard::evaluate(&signed_in(role), RoleSet::EMPTY, "/").is_allow());
    }
}

#[test]
fn test_membership_decides_every_role_and_set() {
    let sets = [
        RoleSet::STAFF,
        RoleSet::ADMINISTRATIVE,
        RoleSet::of(&[Role::Student]),
        RoleSet::of(&[Role::Student, Role::Parent, Role::Director, Role::Superadmin]),
    ];
    for set in sets {
        for role in Role::ALL {
            let decision = guard::evaluate(&signed_in(role), set, "/somewhere");
            if set.contains(role) {
                assert!(decision.is_allow(), "{role} should pass {set:?}");
            } else {
                assert_eq!(decision, Decision::Redirect(Redirect::to_home()), "{role} vs {set:?}");
            }
        }
    }
}

#[test]
fn test_from_path_keeps_query() {
    let decision = guard::evaluate(&Session::anonymous(), RoleSet::STAFF, "/grades?class=3B");
    let redirect = decision.redirect().unwrap();
    assert_eq!(redirect.from.as_deref(), Some("/grades?class=3B"));
    assert_eq!(redirect.location(), "/login?from=%2Fgrades%3Fclass%3D3B");
}

// --- Decisions over the school table ---

#[test]
fn test_director_on_unknown_path_goes_home() {
    let routes = RouteTable::school();
    let decision = shell::decide(&routes, "/nonexistent", &signed_in(Role::Director));
    assert_eq!(decision, Decision::Redirect(Redirect::to_home()));
}

#[test]
fn test_unknown_path_while_resolving_is_pending() {
    let routes = RouteTable::school();
    assert_eq!(
        shell::decide(&routes, "/nonexistent", &Session::resolving()),
        Decision::Pending
    );
}

#[test]
fn test_public_routes_allowed_in_every_session_state() {
    let routes = RouteTable::school();
    let mut sessions = vec![Session::resolving(), Session::anonymous()];
    sessions.extend(Role::ALL.map(signed_in));

    for session in &sessions {
        assert!(shell::decide(&routes, "/login", session).is_allow());
        assert!(shell::decide(&routes, "/setup", session).is_allow());
    }
}

#[test]
fn test_every_route_decision_matches_its_access_rule() {
    let routes = RouteTable::school();

    for entry in routes.entries() {
        for role in Role::ALL {
            let decision = shell::decide(&routes, entry.path, &signed_in(role));
            if entry.access.permits(role) {
                assert!(decision.is_allow(), "{role} should open {}", entry.path);
            } else {
                assert_eq!(
                    decision,
                    Decision::Redirect(Redirect::to_home()),
                    "{role} on {}",
                    entry.path
                );
            }
        }

        let anonymous = shell::decide(&routes, entry.path, &Session::anonymous());
        match entry.access {
            Access::Public => assert!(anonymous.is_allow()),
            _ => assert_eq!(anonymous.redirect().map(|r| r.to.as_str()), Some(LOGIN_PATH)),
        }
    }
}

#[test]
fn test_redirect_targets_are_reachable_by_the_redirected() {
    let routes = RouteTable::school();

    for entry in routes.entries() {
        for role in Role::ALL {
            if let Decision::Redirect(redirect) = shell::decide(&routes, entry.path, &signed_in(role)) {
                let landing = shell::decide(&routes, &redirect.to, &signed_in(role));
                assert!(landing.is_allow(), "{role} bounced from {} to {}", entry.path, redirect.to);
            }
        }
        if let Decision::Redirect(redirect) = shell::decide(&routes, entry.path, &Session::anonymous()) {
            assert!(shell::decide(&routes, &redirect.to, &Session::anonymous()).is_allow());
        }
    }
}

#[test]
fn test_school_policy_cases() {
    let routes = RouteTable::school();
    let allowed = |path: &str, role: Role| shell::decide(&routes, path, &signed_in(role)).is_allow();

    assert!(allowed("/grades", Role::Teacher));
    assert!(!allowed("/grades", Role::Student));
    assert!(!allowed("/attendance", Role::Parent));
    assert!(allowed("/bulletins/view", Role::Parent));
    assert!(!allowed("/bulletins/view", Role::Teacher));
    assert!(allowed("/admin/database", Role::Superadmin));
    assert!(!allowed("/admin/database", Role::Teacher));
    assert!(allowed("/settings", Role::Student));
    // Trailing slash and query do not change the match.
    assert!(allowed("/grades/?term=1", Role::Director));
    // Nor does case.
    assert!(allowed("/Grades", Role::Teacher));
    assert!(!allowed("/USERS", Role::Teacher));
}

#[test]
fn test_evaluate_is_idempotent() {
    let sessions = [Session::resolving(), Session::anonymous(), signed_in(Role::Parent)];
    for session in &sessions {
        for required in [RoleSet::EMPTY, RoleSet::STAFF] {
            let first = guard::evaluate(session, required, "/attendance");
            let second = guard::evaluate(session, required, "/attendance");
            assert_eq!(first, second);
        }
    }
}
