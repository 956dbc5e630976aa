//! Template compilation.
//!
//! An operator-supplied template is scanned for `$(name)` placeholders and
//! turned into an ordered sequence of literal/variable parts, validated
//! against the allow-set of the statement kind it is configured for.
//! Compilation happens once at configuration time; the compiled form is
//! immutable afterwards.

use thiserror::Error;

use crate::variables::{VAR_SLOTS, VarSet, Variable};

mod scanner;

use scanner::{context, find_marker, scan_identifier};

/// Why a template was rejected. Any of these leaves the statement kind
/// unconfigured; none of them is fatal to the rest of the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompileError {
    /// Empty, unterminated, or containing bytes outside `[A-Za-z0-9_]`.
    #[error("malformed variable near: {near}")]
    Malformed { near: String },
    #[error("unknown variable $({name})")]
    UnknownVariable { name: String },
    #[error("variable $({name}) not allowed in this statement")]
    NotAllowed { name: String },
}

/// Per-variable `allowed` bit and bounded usage counter for one statement.
#[derive(Debug, Clone)]
pub(crate) struct VarUsage {
    slots: [Slot; VAR_SLOTS],
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    allowed: bool,
    uses: u8,
}

/// Usage counts saturate here; no template legitimately repeats a
/// placeholder more often.
const MAX_USES: u8 = 127;

impl VarUsage {
    fn allowing(allow: VarSet) -> VarUsage {
        let mut usage = VarUsage {
            slots: [Slot::default(); VAR_SLOTS],
        };
        for var in allow.iter() {
            usage.slots[var as usize].allowed = true;
        }
        usage
    }

    fn mark_used(&mut self, var: Variable) {
        let slot = &mut self.slots[var as usize];
        if slot.uses < MAX_USES {
            slot.uses += 1;
        }
    }

    pub(crate) fn is_allowed(&self, var: Variable) -> bool {
        self.slots[var as usize].allowed
    }

    pub(crate) fn uses(&self, var: Variable) -> u8 {
        self.slots[var as usize].uses
    }
}

/// A literal span followed by at most one placeholder. The final part of a
/// statement may carry no variable.
#[derive(Debug, Clone)]
pub(crate) struct Part {
    pub(crate) literal: String,
    pub(crate) var: Option<Variable>,
}

/// One compiled statement template.
#[derive(Debug, Clone)]
pub struct CompiledStatement {
    parts: Vec<Part>,
    usage: VarUsage,
    literal_len: usize,
}

impl CompiledStatement {
    pub(crate) fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// How many times `var` appears in this template.
    #[must_use]
    pub fn uses(&self, var: Variable) -> u8 {
        self.usage.uses(var)
    }

    #[must_use]
    pub fn is_allowed(&self, var: Variable) -> bool {
        self.usage.is_allowed(var)
    }

    /// Total byte length of the literal skeleton (placeholders excluded).
    #[must_use]
    pub fn literal_len(&self) -> usize {
        self.literal_len
    }
}

/// Compile one template against the allow-set of its statement kind.
///
/// `Ok(None)` means the template yields no parts at all (an empty string):
/// nothing is configured, which is not an error.
///
/// # Errors
///
/// Returns [`CompileError`] for a malformed placeholder, an identifier the
/// registry does not know, or one outside `allow`.
pub fn compile(template: &str, allow: VarSet) -> Result<Option<CompiledStatement>, CompileError> {
    let bytes = template.as_bytes();
    let mut parts = Vec::new();
    let mut usage = VarUsage::allowing(allow);
    let mut literal_len = 0usize;
    let mut pos = 0usize;

    while let Some(marker) = find_marker(bytes, pos) {
        let ident_start = marker + 2;
        let ident_end = scan_identifier(bytes, ident_start);
        if ident_end == ident_start || bytes.get(ident_end) != Some(&b')') {
            return Err(CompileError::Malformed {
                near: context(template, marker),
            });
        }

        let name = &template[ident_start..ident_end];
        let Some(var) = Variable::from_name(name) else {
            return Err(CompileError::UnknownVariable { name: name.into() });
        };
        if !allow.contains(var) {
            return Err(CompileError::NotAllowed { name: name.into() });
        }

        usage.mark_used(var);
        let literal = template[pos..marker].to_owned();
        literal_len += literal.len();
        parts.push(Part {
            literal,
            var: Some(var),
        });
        pos = ident_end + 1;
    }

    if pos < template.len() {
        let literal = template[pos..].to_owned();
        literal_len += literal.len();
        parts.push(Part { literal, var: None });
    }

    if parts.is_empty() {
        return Ok(None);
    }

    let compiled = CompiledStatement {
        parts,
        usage,
        literal_len,
    };
    debug_assert_eq!(
        compiled.parts.iter().map(|p| p.literal.len()).sum::<usize>(),
        compiled.literal_len
    );
    debug_assert!(
        compiled
            .parts
            .iter()
            .filter_map(|p| p.var)
            .all(|var| compiled.usage.is_allowed(var))
    );
    Ok(Some(compiled))
}
