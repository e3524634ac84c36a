//! The conditional-edge predicate algebra.
//!
//! Each variant answers one question: "given the value a producer just emitted, should
//! this edge fire?" `matches` is the only way to ask it — there is deliberately no
//! operator overloading here, so a predicate reads the same in code as it does in a log
//! line or a diagnostic.

use std::fmt;
use std::sync::Arc;

use crate::errors::log_predicate_failure;
use crate::payload::Payload;

/// A transform applied to a value before a subset/superset/emptyset comparison, e.g.
/// pulling a field out of a mapping or projecting a sequence down to its tags.
pub type PretransformFn = Arc<dyn Fn(&Payload) -> Result<Payload, PretransformError> + Send + Sync>;

#[derive(Debug, thiserror::Error)]
#[error("pretransform failed: {0}")]
pub struct PretransformError(pub String);

/// A condition attached to a conditional edge.
#[derive(Clone)]
pub enum Predicate {
    /// Matches when every element of `allowed` is present in the producer's value.
    Subset(Vec<Payload>),
    /// Matches when the producer's value contains every element of `required`, and
    /// possibly more.
    Superset(Vec<Payload>),
    /// Matches when the producer's value is an empty set (`Payload::is_empty_set`).
    Emptyset,
    /// Matches when the producer's value is a non-empty set.
    NonEmptyset,
    /// Applies `func` to the value first, then matches if the result equals `target`.
    PretransformSet(PretransformFn, Payload),
    /// Applies `func` to the value first, then matches if the result does *not* equal
    /// `target`. A failing `func` resolves to a match, mirroring `Subset`/`Superset`'s
    /// "absence looks like satisfaction" reading for a negated condition.
    NotPretransformSet(PretransformFn, Payload),
    /// Matches only when the producer's value equals `value` exactly.
    Literal(Payload),
}

impl Predicate {
    /// Evaluate this predicate against a value a producer just emitted.
    ///
    /// A failing `func` never propagates: `PretransformSet` logs and resolves to `false`,
    /// `NotPretransformSet` logs and resolves to `true` — the negated form treats an
    /// unevaluable condition as satisfied, matching the source behavior of logging and
    /// continuing rather than aborting the run over a single edge's condition.
    pub fn matches(&self, value: &Payload) -> bool {
        match self {
            Predicate::Subset(allowed) => {
                let elements = value.as_elements();
                elements.iter().all(|e| allowed.contains(e))
            }
            Predicate::Superset(required) => {
                let elements = value.as_elements();
                required.iter().all(|r| elements.contains(r))
            }
            Predicate::Emptyset => value.is_empty_set(),
            Predicate::NonEmptyset => !value.is_empty_set(),
            Predicate::PretransformSet(func, target) => match func(value) {
                Ok(transformed) => transformed == *target,
                Err(err) => {
                    log_predicate_failure("pretransform_set", &err);
                    false
                }
            },
            Predicate::NotPretransformSet(func, target) => match func(value) {
                Ok(transformed) => transformed != *target,
                Err(err) => {
                    log_predicate_failure("not_pretransform_set", &err);
                    true
                }
            },
            Predicate::Literal(expected) => value == expected,
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Subset(allowed) => f.debug_tuple("Subset").field(allowed).finish(),
            Predicate::Superset(required) => f.debug_tuple("Superset").field(required).finish(),
            Predicate::Emptyset => write!(f, "Emptyset"),
            Predicate::NonEmptyset => write!(f, "NonEmptyset"),
            Predicate::PretransformSet(_, target) => {
                f.debug_tuple("PretransformSet").field(&"<fn>").field(target).finish()
            }
            Predicate::NotPretransformSet(_, target) => {
                f.debug_tuple("NotPretransformSet").field(&"<fn>").field(target).finish()
            }
            Predicate::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
        }
    }
}

impl PartialEq for Predicate {
    /// Closures can't be compared, so two `Pretransform*` predicates are only ever
    /// considered equal when their functions share pointer identity *and* their targets
    /// match — in practice this means the conflict-detection path treats any two
    /// independently-built pretransform predicates as distinct, which is the conservative
    /// (and correct) choice.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Predicate::Subset(a), Predicate::Subset(b)) => a == b,
            (Predicate::Superset(a), Predicate::Superset(b)) => a == b,
            (Predicate::Emptyset, Predicate::Emptyset) => true,
            (Predicate::NonEmptyset, Predicate::NonEmptyset) => true,
            (Predicate::PretransformSet(a, at), Predicate::PretransformSet(b, bt)) => {
                Arc::ptr_eq(a, b) && at == bt
            }
            (Predicate::NotPretransformSet(a, at), Predicate::NotPretransformSet(b, bt)) => {
                Arc::ptr_eq(a, b) && at == bt
            }
            (Predicate::Literal(a), Predicate::Literal(b)) => a == b,
            _ => false,
        }
    }
}
