//! Command rendering.
//!
//! A compiled statement plus one call's bindings become final command text.
//! The output buffer is sized exactly once up front: the literal skeleton
//! plus, for every requested variable, twice its usage count times its raw
//! value length (the backend's escaping convention expands each byte to at
//! most two). That budget is then enforced while writing, so a misbehaving
//! escape implementation aborts the render instead of producing an
//! over-long command.

use tracing::{error, warn};

use crate::backend::Escape;
use crate::error::DbError;
use crate::template::CompiledStatement;
use crate::variables::{VarBindings, VarSet, Variable};

/// Render `stmt` with one call's bindings into final command text.
///
/// `requested` names the variables meaningful for this invocation. A
/// placeholder whose variable is not requested, or is bound to an empty
/// value, renders as empty text; that is never an error.
///
/// # Errors
///
/// Returns [`DbError::BufferExhausted`] when escaped or literal content
/// exceeds the precomputed budget, or [`DbError::Backend`] when the escape
/// operation itself fails. Both are logged here.
pub fn render<E: Escape + ?Sized>(
    stmt: &CompiledStatement,
    bindings: &VarBindings,
    requested: VarSet,
    escaper: &mut E,
) -> Result<String, DbError> {
    debug_assert!(
        requested.iter().all(|var| bindings.is_bound(var)),
        "requested variable without a binding"
    );

    let mut budget = stmt.literal_len();
    for var in requested.iter() {
        let uses = usize::from(stmt.uses(var));
        if uses > 0 {
            let raw_len = bindings.get(var).map_or(0, str::len);
            budget += 2 * uses * raw_len;
        }
    }

    let mut command = String::with_capacity(budget);
    let mut remaining = budget;
    let mut last_var: Option<Variable> = None;

    for part in stmt.parts() {
        if part.literal.len() > remaining {
            return Err(exhausted(last_var));
        }
        command.push_str(&part.literal);
        remaining -= part.literal.len();

        let Some(var) = part.var else { continue };
        if !requested.contains(var) {
            continue;
        }
        let Some(value) = bindings.get(var) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }

        let escaped = match escaper.escape(value) {
            Ok(escaped) => escaped,
            Err(err) => {
                warn!(variable = var.name(), %err, "value cannot be escaped for the command");
                return Err(err.into());
            }
        };
        if escaped.len() > remaining {
            return Err(exhausted(Some(var)));
        }
        command.push_str(&escaped);
        remaining -= escaped.len();
        last_var = Some(var);
    }

    Ok(command)
}

fn exhausted(variable: Option<Variable>) -> DbError {
    match variable {
        Some(var) => warn!(
            variable = var.name(),
            "escape space exhausted after $({})",
            var.name()
        ),
        // Nothing was expanded yet, so the arithmetic above is wrong, not
        // the data.
        None => error!("escape space exhausted before any variable; sizing bug"),
    }
    DbError::BufferExhausted {
        variable: variable.map(Variable::name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::template::compile;

    /// Doubles single quotes, like most SQL backends.
    struct QuoteEscaper;

    impl Escape for QuoteEscaper {
        fn escape(&mut self, raw: &str) -> Result<String, BackendError> {
            Ok(raw.replace('\'', "''"))
        }
    }

    /// Violates the at-most-2x convention.
    struct OverlongEscaper;

    impl Escape for OverlongEscaper {
        fn escape(&mut self, raw: &str) -> Result<String, BackendError> {
            Ok(raw.repeat(4))
        }
    }

    fn domain_auth_stmt() -> CompiledStatement {
        compile(
            "SELECT ref FROM domains WHERE name='$(domain)' AND auth='$(auth_type)'",
            VarSet::of(&[Variable::Domain, Variable::AuthType]),
        )
        .unwrap()
        .unwrap()
    }

    #[test]
    fn substitutes_in_source_order() {
        let stmt = domain_auth_stmt();
        let mut bindings = VarBindings::new();
        bindings.set(Variable::Domain, "example.com");
        bindings.set(Variable::AuthType, "dkim");
        let requested = VarSet::of(&[Variable::Domain, Variable::AuthType]);

        let command = render(&stmt, &bindings, requested, &mut QuoteEscaper).unwrap();
        assert_eq!(
            command,
            "SELECT ref FROM domains WHERE name='example.com' AND auth='dkim'"
        );
    }

    #[test]
    fn escapes_exactly_once() {
        let stmt = domain_auth_stmt();
        let mut bindings = VarBindings::new();
        bindings.set(Variable::Domain, "o'brien.example");
        bindings.set(Variable::AuthType, "dkim");
        let requested = VarSet::of(&[Variable::Domain, Variable::AuthType]);

        let command = render(&stmt, &bindings, requested, &mut QuoteEscaper).unwrap();
        assert!(command.contains("name='o''brien.example'"));
        assert!(!command.contains("''''"));
    }

    #[test]
    fn unrequested_and_empty_values_vanish() {
        let stmt = domain_auth_stmt();
        let mut bindings = VarBindings::new();
        bindings.set(Variable::Domain, "example.com");
        bindings.set(Variable::AuthType, "");
        let requested = VarSet::of(&[Variable::Domain, Variable::AuthType]);

        let command = render(&stmt, &bindings, requested, &mut QuoteEscaper).unwrap();
        assert!(command.ends_with("AND auth=''"));

        // Not requested at all: same rendering, no error.
        let only_domain = VarSet::of(&[Variable::Domain]);
        let mut domain_only = VarBindings::new();
        domain_only.set(Variable::Domain, "example.com");
        let command = render(&stmt, &domain_only, only_domain, &mut QuoteEscaper).unwrap();
        assert!(command.ends_with("AND auth=''"));
    }

    #[test]
    fn identical_inputs_render_identically() {
        let stmt = domain_auth_stmt();
        let mut bindings = VarBindings::new();
        bindings.set(Variable::Domain, "a'b");
        bindings.set(Variable::AuthType, "spf,dkim");
        let requested = VarSet::of(&[Variable::Domain, Variable::AuthType]);

        let first = render(&stmt, &bindings, requested, &mut QuoteEscaper).unwrap();
        let second = render(&stmt, &bindings, requested, &mut QuoteEscaper).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn overlong_escape_aborts_at_the_variable() {
        let stmt = compile("=$(domain)", VarSet::of(&[Variable::Domain]))
            .unwrap()
            .unwrap();
        let mut bindings = VarBindings::new();
        bindings.set(Variable::Domain, "abcdef");

        let err = render(
            &stmt,
            &bindings,
            VarSet::of(&[Variable::Domain]),
            &mut OverlongEscaper,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DbError::BufferExhausted {
                variable: Some("domain")
            }
        ));
    }

    #[test]
    fn overlong_escape_can_starve_a_later_literal() {
        // 4x expansion of a short value fits the remaining budget, but the
        // trailing literal no longer does; blame lands on the variable.
        let stmt = compile("a=$(domain) AND b", VarSet::of(&[Variable::Domain]))
            .unwrap()
            .unwrap();
        let mut bindings = VarBindings::new();
        bindings.set(Variable::Domain, "xyz");

        let err = render(
            &stmt,
            &bindings,
            VarSet::of(&[Variable::Domain]),
            &mut OverlongEscaper,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DbError::BufferExhausted {
                variable: Some("domain")
            }
        ));
    }
}
