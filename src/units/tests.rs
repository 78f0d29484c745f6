use super::*;
use crate::diagnostics::{Diagnostic, Guard, Severity};
use crate::tree::SourceTree;

fn check(source: &str) -> Vec<Diagnostic> {
    let tree = SourceTree::parse(source).unwrap();
    run(&tree, &UnitRegistry::default(), Severity::Warning)
}

#[test]
fn adding_length_to_time_is_flagged_once() {
    let diags = check("total = distance_m + time_s\n");
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].guard, Guard::Unit);
    assert_eq!(diags[0].severity, Severity::Warning);
    assert_eq!(diags[0].line, 1);
    assert!(diags[0].message.contains("[L]"), "message: {}", diags[0].message);
    assert!(diags[0].message.contains("[T]"), "message: {}", diags[0].message);
}

#[test]
fn dividing_length_by_time_is_clean_and_infers_velocity() {
    let source = "speed = distance_m / time_s\n";
    assert!(check(source).is_empty());

    let tree = SourceTree::parse(source).unwrap();
    let inferred = inferred_dimensions(&tree, &UnitRegistry::default());
    assert_eq!(inferred.get("speed"), Some(&Dimension::velocity()));
}

#[test]
fn unknown_operands_stay_silent() {
    // Neither side resolves to a dimension, so no diagnostic may fire.
    assert!(check("blob = foo + bar\n").is_empty());
}

#[test]
fn one_unknown_operand_stays_silent() {
    assert!(check("q = distance_m + mystery\n").is_empty());
}

#[test]
fn propagated_dimensions_reach_later_additions() {
    let source = "\
speed = distance_m / time_s
bad = speed + distance_m
";
    let diags = check(source);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].line, 2);
    assert!(diags[0].message.contains("[L T^-1]"));
}

#[test]
fn declared_annotation_beats_name_convention() {
    // The annotation pins `reading` to kelvin; adding seconds is an error.
    let source = "\
reading: \"K\" = sensor()
bad = reading + time_s
";
    let diags = check(source);
    assert_eq!(diags.len(), 1);
    assert!(diags[0].message.contains("Θ"));
}

#[test]
fn parameter_names_are_inferred() {
    let source = "\
def update(position_m, dt):
    return position_m + dt
";
    let diags = check(source);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].line, 2);
}

#[test]
fn name_value_mismatch_warns_on_assignment() {
    let diags = check("duration_s = distance_m\n");
    assert_eq!(diags.len(), 1);
    assert!(diags[0].message.contains("suggests dimension"));
}

#[test]
fn exponentiation_scales_by_constant() {
    let source = "\
area = distance_m ** 2
bad = area + distance_m
";
    let diags = check(source);
    assert_eq!(diags.len(), 1);
    assert!(diags[0].message.contains("[L^2]"));
}

#[test]
fn sqrt_produces_half_exponents() {
    let source = "root = sqrt(distance_m)\n";
    let tree = SourceTree::parse(source).unwrap();
    let inferred = inferred_dimensions(&tree, &UnitRegistry::default());
    assert_eq!(inferred.get("root"), Some(&Dimension::length().sqrt()));
}

#[test]
fn ml_names_resolve_dimensionless_and_mix_with_literals() {
    // predictions/labels are pinned dimensionless, so arithmetic among them
    // and bare numbers is clean.
    let source = "\
error = predictions - labels
scaled = error + 1
";
    assert!(check(source).is_empty());
}

#[test]
fn comparison_of_incompatible_dimensions_warns() {
    let diags = check("ok = distance_m < time_s\n");
    assert_eq!(diags.len(), 1);
    assert!(diags[0].message.contains("comparing"));
}

#[test]
fn augmented_accumulation_checks_dimensions() {
    let source = "\
total_m = distance_m
total_m += time_s
";
    let diags = check(source);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].line, 2);
}

#[test]
fn custom_units_take_priority() {
    let registry = UnitRegistry::new(
        vec![CustomUnit {
            name: "distance_m".to_string(),
            // Deliberately remap to time to prove custom wins over patterns
            dimension: Dimension::time(),
        }],
        &[],
    );
    let tree = SourceTree::parse("x = distance_m + time_s\n").unwrap();
    let diags = run(&tree, &registry, Severity::Warning);
    assert!(diags.is_empty());
}

#[test]
fn physical_constants_carry_dimensions() {
    let tree = SourceTree::parse("momentum = mass_kg * c\n").unwrap();
    let inferred = inferred_dimensions(&tree, &UnitRegistry::default());
    let expected = Dimension::mass().mul(Dimension::velocity());
    assert_eq!(inferred.get("momentum"), Some(&expected));
}
