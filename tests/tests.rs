//! End-to-end properties, exercised through the public API.

use diagmine::common::*;
use diagmine::data::{parse_seeds, CmdOracle};
use diagmine::refine::{mutation::Mutation, Refiner};

fn calc() -> Grammar {
    Grammar::of_str(
        r#"
        # toy calculator
        <start> ::= <f> "(" <n> ")"
        <f> ::= "sqrt" | "cos" | "tan"
        <n> ::= <d> | "-" <d>
        <d> ::= "1" | "2" | "7" | "9"
        "#,
    )
    .expect("the calculator grammar is well-formed")
}

/// Fails iff taking the square root of a negative number.
fn oracle() -> impl Fn(&str) -> Verdict {
    |text: &str| {
        if text.starts_with("sqrt(-") {
            Verdict::Failing
        } else {
            Verdict::Passing
        }
    }
}

#[test]
fn explains_the_calculator_failure() {
    let gram = calc();
    let seeds = parse_seeds(
        &gram,
        "\
fail sqrt(-1)
pass sqrt(2)
pass cos(2)
pass cos(-1)
",
    )
    .unwrap();
    let mut relevant = SymSet::new();
    relevant.insert(gram.sym_of("f").unwrap());
    relevant.insert(gram.sym_of("n").unwrap());

    let mut refiner = Refiner::new(gram.clone(), oracle()).with_relevant(relevant);
    let best = refiner.explain(seeds).unwrap();

    assert!(!best.is_empty());
    let top = &best[0];
    assert_eq!(top.precision(), 1.0);
    assert_eq!(top.recall(), 1.0);
    // The diagnosis constrains both the function and its argument.
    let rendered = top.cst().to_string_info(&gram).unwrap();
    assert!(rendered.contains("<f>"), "diagnosis was {}", rendered);
    assert!(rendered.contains("<n>"), "diagnosis was {}", rendered);
}

#[test]
fn mutation_finds_new_inputs_within_budget() {
    let gram = calc();
    let oracle = oracle();
    let profiler = Profiler::new();
    let seeds = vec![
        Input::new(gram.parse("sqrt(-1)").unwrap(), Verdict::Failing),
        Input::new(gram.parse("cos(2)").unwrap(), Verdict::Passing),
    ];
    let mut fuzzer = Mutation::new(&gram, &oracle, &seeds, &profiler);
    let labeled = fuzzer.run().unwrap();
    assert!(!labeled.is_empty());
    // Seeds are never re-labeled.
    for input in &labeled {
        for seed in &seeds {
            assert_ne!(input.tree.uid(), seed.tree.uid())
        }
    }
}

#[test]
fn command_oracles_label_through_exit_codes() {
    let gram = calc();
    let oracle = CmdOracle::new("grep -q 'sqrt(-'");
    // grep exits 0 on match; the failure convention is the other way around,
    // so flip the command.
    let oracle_flipped = CmdOracle::new("if grep -q 'sqrt(-'; then exit 1; else exit 0; fi");

    let failing = gram.parse("sqrt(-9)").unwrap();
    let passing = gram.parse("tan(7)").unwrap();
    assert_eq!(oracle.judge(&failing).unwrap(), Verdict::Passing);
    assert_eq!(oracle_flipped.judge(&failing).unwrap(), Verdict::Failing);
    assert_eq!(oracle_flipped.judge(&passing).unwrap(), Verdict::Passing);
}
