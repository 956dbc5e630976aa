//! Rendering a compiled statement with per-call bindings.

mod common;

use common::{ScriptedConnection, shared};
use mail_stats_db::prelude::*;

fn domain_auth_stmt() -> CompiledStatement {
    compile(
        "SELECT ref FROM domains WHERE name='$(domain)' AND auth='$(auth_type)'",
        StatementKind::SelectDomain.allow_set(),
    )
    .unwrap()
    .unwrap()
}

#[test]
fn skeleton_is_reproduced_with_escaped_values() {
    let stmt = domain_auth_stmt();
    let mut bindings = VarBindings::new();
    bindings.set(Variable::Domain, "example.com");
    bindings.set(Variable::AuthType, "dkim");
    let requested = VarSet::of(&[Variable::Domain, Variable::AuthType]);

    let mut conn = ScriptedConnection { state: shared() };
    let command = render(&stmt, &bindings, requested, &mut conn).unwrap();
    assert_eq!(
        command,
        "SELECT ref FROM domains WHERE name='example.com' AND auth='dkim'"
    );
}

#[test]
fn backend_special_characters_appear_only_escaped() {
    let stmt = domain_auth_stmt();
    let mut bindings = VarBindings::new();
    bindings.set(Variable::Domain, "o'brien.example");
    bindings.set(Variable::AuthType, "dkim");
    let requested = VarSet::of(&[Variable::Domain, Variable::AuthType]);

    let mut conn = ScriptedConnection { state: shared() };
    let command = render(&stmt, &bindings, requested, &mut conn).unwrap();
    assert_eq!(
        command,
        "SELECT ref FROM domains WHERE name='o''brien.example' AND auth='dkim'"
    );
}

#[test]
fn unrequested_or_empty_placeholders_render_as_empty_text() {
    let stmt = domain_auth_stmt();

    let mut bindings = VarBindings::new();
    bindings.set(Variable::Domain, "example.com");
    let requested = VarSet::of(&[Variable::Domain]);
    let mut conn = ScriptedConnection { state: shared() };
    let unrequested = render(&stmt, &bindings, requested, &mut conn).unwrap();
    assert_eq!(
        unrequested,
        "SELECT ref FROM domains WHERE name='example.com' AND auth=''"
    );

    bindings.set(Variable::AuthType, "");
    let requested = VarSet::of(&[Variable::Domain, Variable::AuthType]);
    let empty_bound = render(&stmt, &bindings, requested, &mut conn).unwrap();
    assert_eq!(unrequested, empty_bound);
}

#[test]
fn rendering_is_idempotent() {
    let stmt = domain_auth_stmt();
    let mut bindings = VarBindings::new();
    bindings.set(Variable::Domain, "a'b'c.example");
    bindings.set(Variable::AuthType, "author,spf,dkim");
    let requested = VarSet::of(&[Variable::Domain, Variable::AuthType]);

    let mut conn = ScriptedConnection { state: shared() };
    let first = render(&stmt, &bindings, requested, &mut conn).unwrap();
    let second = render(&stmt, &bindings, requested, &mut conn).unwrap();
    assert_eq!(first, second);
}

#[test]
fn repeated_placeholder_is_substituted_at_every_occurrence() {
    let stmt = compile(
        "INSERT INTO d(n, shadow) VALUES('$(domain)', '$(domain)')",
        StatementKind::SelectDomain.allow_set(),
    )
    .unwrap()
    .unwrap();
    let mut bindings = VarBindings::new();
    bindings.set(Variable::Domain, "x'y.example");

    let mut conn = ScriptedConnection { state: shared() };
    let command = render(
        &stmt,
        &bindings,
        VarSet::of(&[Variable::Domain]),
        &mut conn,
    )
    .unwrap();
    assert_eq!(
        command,
        "INSERT INTO d(n, shadow) VALUES('x''y.example', 'x''y.example')"
    );
}
