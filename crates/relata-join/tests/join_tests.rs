use std::ops::ControlFlow;
use std::sync::Arc;

use anyhow::Result;
use relata_join::{
    Arguments, Attribute, AttributeMapping, CallSite, ComputedConstraint, Constraint, FactIndex,
    FactPattern, Function, GenericJoin, JoinConfig, JoinError, Outcome, ProviderRegistry, Rows,
    Signature, Term, Value,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

/// `divisors(n)` -> `(divisor, quotient)` rows.
#[derive(Debug)]
struct Divisors {
    signature: Signature,
}

impl Divisors {
    fn new() -> Self {
        Self {
            signature: Signature::new(
                "divisors",
                AttributeMapping::named(&[Attribute::required("n")]),
                AttributeMapping::named(&[
                    Attribute::optional("divisor"),
                    Attribute::optional("quotient"),
                ]),
            ),
        }
    }
}

impl Function for Divisors {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn apply(&self, args: &Arguments<'_>, out: &mut Rows) -> relata_join::Result<Outcome> {
        let Some(n) = args.get("n")?.and_then(Value::as_index).filter(|n| *n > 0) else {
            return Ok(Outcome::Unrepresentable);
        };
        for d in (1..=n).filter(|d| n % d == 0) {
            out.push_row([Value::from(d), Value::from(n / d)]);
        }
        Ok(Outcome::Produced)
    }
}

fn edges() -> FactIndex {
    FactIndex::from_facts([
        ("a", "edge", "b"),
        ("b", "edge", "c"),
        ("c", "edge", "a"),
        ("a", "edge", "c"),
        ("c", "edge", "d"),
    ])
}

fn pattern(e: Term, a: &str, v: Term) -> Box<dyn Constraint> {
    Box::new(FactPattern::new(e, Term::constant(a), v))
}

#[test]
fn directed_triangles() -> Result<()> {
    init_tracing();
    let index = edges();
    let mut join = GenericJoin::new(
        vec![
            pattern(Term::var(0), "edge", Term::var(1)),
            pattern(Term::var(1), "edge", Term::var(2)),
            pattern(Term::var(2), "edge", Term::var(0)),
        ],
        3,
        JoinConfig::default(),
    )?;
    let rows = join.collect(&index)?;
    let rendered: Vec<String> = rows
        .iter()
        .map(|r| r.iter().map(ToString::to_string).collect::<String>())
        .collect();
    assert_eq!(rendered, vec!["abc", "bca", "cab"]);
    Ok(())
}

#[test]
fn computed_relation_joins_with_facts() -> Result<()> {
    init_tracing();
    let index = FactIndex::from_facts([
        (Value::from("box"), Value::from("size"), Value::from(6i64)),
        (Value::from("crate"), Value::from("size"), Value::from(7i64)),
        (Value::from("shelf"), Value::from("slots"), Value::from(3i64)),
    ]);
    let mut registry = ProviderRegistry::new();
    registry.register("divisors", Divisors::new())?;

    // ?v0 size ?v1, divisors(n: ?v1) -> divisor ?v2, ?v3 slots ?v2
    let divisors = registry.instantiate(
        "divisors",
        &CallSite::new()
            .arg("n", Term::var(1))
            .output("divisor", Term::var(2)),
    )?;
    let mut join = GenericJoin::new(
        vec![
            pattern(Term::var(0), "size", Term::var(1)),
            Box::new(divisors),
            pattern(Term::var(3), "slots", Term::var(2)),
        ],
        4,
        JoinConfig::default(),
    )?;
    let rows = join.collect(&index)?;
    assert_eq!(
        rows,
        vec![vec![
            Value::from("box"),
            Value::from(6i64),
            Value::from(3i64),
            Value::from("shelf"),
        ]]
    );
    Ok(())
}

#[test]
fn joint_outputs_bind_consecutive_variables() -> Result<()> {
    let divisors = ComputedConstraint::new(
        "divisors",
        Arc::new(Divisors::new()),
        &CallSite::new()
            .arg("n", Term::constant(12i64))
            .output("divisor", Term::var(0))
            .output("quotient", Term::var(1)),
    )?;
    let mut join = GenericJoin::new(vec![Box::new(divisors)], 2, JoinConfig::default())?;
    let index = FactIndex::new();

    let mut pairs = Vec::new();
    let stats = join.run(&index, |row| {
        pairs.push((row[0].as_index(), row[1].as_index()));
        ControlFlow::Continue(())
    })?;
    assert_eq!(stats.results, 6);
    assert_eq!(stats.proposals, 1);
    assert_eq!(pairs[0], (Some(1), Some(12)));
    assert_eq!(pairs[5], (Some(12), Some(1)));
    Ok(())
}

#[test]
fn unrepresentable_input_yields_no_results() -> Result<()> {
    let divisors = ComputedConstraint::new(
        "divisors",
        Arc::new(Divisors::new()),
        &CallSite::new()
            .arg("n", Term::constant("twelve"))
            .output("divisor", Term::var(0)),
    )?;
    let mut join = GenericJoin::new(vec![Box::new(divisors)], 1, JoinConfig::default())?;
    let stats = join.run(&FactIndex::new(), |_| ControlFlow::Continue(()))?;
    assert_eq!(stats.results, 0);
    assert_eq!(stats.abandoned, 1);
    Ok(())
}

#[test]
fn output_before_its_input_has_no_proposer() {
    // divisors(n: ?v1) -> ?v0 cannot fire in this order.
    let divisors = ComputedConstraint::new(
        "divisors",
        Arc::new(Divisors::new()),
        &CallSite::new()
            .arg("n", Term::var(1))
            .output("divisor", Term::var(0)),
    )
    .expect("call site resolves");
    let err = GenericJoin::new(
        vec![
            Box::new(divisors),
            pattern(Term::constant("box"), "size", Term::var(1)),
        ],
        2,
        JoinConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, JoinError::NoProposer { .. }));
}

#[test]
fn config_limit_from_json() -> Result<()> {
    let config = JoinConfig::from_json(r#"{ "limit": 2 }"#)?;
    let mut join = GenericJoin::new(
        vec![pattern(Term::var(0), "edge", Term::var(1))],
        2,
        config,
    )?;
    let stats = join.run(&edges(), |_| ControlFlow::Continue(()))?;
    assert_eq!(stats.results, 2);
    assert!(stats.truncated);

    let summary = serde_json::to_value(&stats)?;
    assert_eq!(summary["results"], 2);
    Ok(())
}
