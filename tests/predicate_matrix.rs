//! The predicate-algebra truth table: every combinator checked against representative
//! values it's expected to accept and reject.

use weavedag::payload::Payload;
use weavedag::predicate::{Predicate, PretransformError};

fn seq(values: impl IntoIterator<Item = i64>) -> Payload {
    Payload::sequence(values.into_iter().map(Payload::from))
}

#[test]
fn subset_accepts_contained_elements_and_rejects_extras() {
    let predicate = Predicate::Subset(vec![
        Payload::from(1i64),
        Payload::from(2i64),
        Payload::from(3i64),
    ]);
    assert!(predicate.matches(&seq([1, 3])));
    assert!(!predicate.matches(&seq([1, 4])));
}

#[test]
fn superset_requires_every_required_element_present() {
    let predicate = Predicate::Superset(vec![Payload::text("a")]);
    assert!(predicate.matches(&Payload::sequence([Payload::text("a"), Payload::text("b")])));

    let predicate = Predicate::Superset(vec![Payload::text("a"), Payload::text("c")]);
    assert!(!predicate.matches(&Payload::sequence([Payload::text("a"), Payload::text("b")])));
}

#[test]
fn emptyset_accepts_empty_sequence_and_null_rejects_nonempty() {
    assert!(Predicate::Emptyset.matches(&Payload::sequence(Vec::new())));
    assert!(Predicate::Emptyset.matches(&Payload::Null));
    assert!(!Predicate::Emptyset.matches(&seq([1])));
}

#[test]
fn nonemptyset_is_the_exact_complement_of_emptyset() {
    assert!(Predicate::NonEmptyset.matches(&seq([1])));
    assert!(!Predicate::NonEmptyset.matches(&Payload::sequence(Vec::new())));
}

#[test]
fn pretransform_set_projects_length_then_compares_to_target() {
    // Pretransform mirrors the table's `len` combinator: project the value down to its
    // length and match only when that length equals the target, here zero.
    let len_predicate = Predicate::PretransformSet(
        std::sync::Arc::new(|value: &Payload| Ok(Payload::from(value.len() as i64))),
        Payload::from(0i64),
    );
    assert!(len_predicate.matches(&Payload::sequence(Vec::new())));
    assert!(!len_predicate.matches(&seq([1])));
}

#[test]
fn not_pretransform_set_is_the_negation_of_pretransform_set() {
    let len_not_predicate = Predicate::NotPretransformSet(
        std::sync::Arc::new(|value: &Payload| Ok(Payload::from(value.len() as i64))),
        Payload::from(0i64),
    );
    assert!(!len_not_predicate.matches(&Payload::sequence(Vec::new())));
    assert!(len_not_predicate.matches(&seq([1])));
}

#[test]
fn pretransform_failure_resolves_to_false_rather_than_panicking() {
    let failing = Predicate::PretransformSet(
        std::sync::Arc::new(|_: &Payload| Err(PretransformError("boom".to_string()))),
        Payload::from(0i64),
    );
    assert!(!failing.matches(&Payload::Null));
}

#[test]
fn not_pretransform_failure_resolves_to_true_rather_than_panicking() {
    let failing = Predicate::NotPretransformSet(
        std::sync::Arc::new(|_: &Payload| Err(PretransformError("boom".to_string()))),
        Payload::from(0i64),
    );
    assert!(failing.matches(&Payload::Null));
}

#[test]
fn literal_only_matches_exact_equality() {
    let predicate = Predicate::Literal(Payload::text("go"));
    assert!(predicate.matches(&Payload::text("go")));
    assert!(!predicate.matches(&Payload::text("stop")));
}
