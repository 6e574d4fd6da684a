use anyhow::Result;
use relata_join::{
    CallSite, ComputedConstraint, Constraint, FactIndex, GenericJoin, JoinConfig, JoinError,
    Prefix, ProviderRegistry, Term, Value, Variable,
};
use relata_providers::default_registry;

fn registry() -> ProviderRegistry {
    default_registry().expect("built-in names are unique")
}

fn rows(constraint: &mut ComputedConstraint, prefix: &Prefix) -> Result<Vec<Vec<Value>>> {
    Ok(constraint.resolve_proposal(prefix)?.to_vecs())
}

#[test]
fn every_builtin_is_registered_once() {
    let registry = registry();
    assert_eq!(registry.len(), 12);
    let names: Vec<&str> = registry.names().collect();
    assert_eq!(
        names,
        vec![
            "char-at", "concat", "convert", "find", "length", "lower", "replace", "split",
            "starts-with", "substring", "trim", "upper",
        ]
    );
    let mut again = registry.clone();
    assert!(matches!(
        relata_providers::register_string_providers(&mut again),
        Err(JoinError::DuplicateProvider(_))
    ));
}

#[test]
fn concat_proposes_and_tests() -> Result<()> {
    let registry = registry();
    let index = FactIndex::new();
    let mut concat = registry.instantiate(
        "concat",
        &CallSite::new()
            .positional(Term::constant("ab"))
            .positional(Term::constant("cd"))
            .positional_output(Term::var(0)),
    )?;
    let prefix = Prefix::new();
    assert_eq!(concat.propose(&index, Variable::new(0), &prefix)?.cardinality(), 1);
    assert_eq!(rows(&mut concat, &prefix)?, vec![vec![Value::from("abcd")]]);

    assert!(concat.test(&index, &Prefix::from_values([Value::from("abcd")]))?);
    assert!(!concat.test(&index, &Prefix::from_values([Value::from("abdc")]))?);
    Ok(())
}

#[test]
fn find_is_case_insensitive_by_default() -> Result<()> {
    let registry = registry();
    let index = FactIndex::new();
    let mut find = registry.instantiate(
        "find",
        &CallSite::new()
            .arg("text", Term::constant("banana"))
            .arg("subtext", Term::constant("an"))
            .arg("case-sensitive", Term::constant(false))
            .positional_output(Term::var(0)),
    )?;
    let prefix = Prefix::new();
    assert_eq!(find.propose(&index, Variable::new(0), &prefix)?.cardinality(), 2);
    assert_eq!(
        rows(&mut find, &prefix)?,
        vec![vec![Value::from(1i64)], vec![Value::from(3i64)]]
    );
    Ok(())
}

#[test]
fn split_modes() -> Result<()> {
    let registry = registry();
    let index = FactIndex::new();
    let prefix = Prefix::new();
    let input = || {
        CallSite::new()
            .arg("text", Term::constant("a,b,c"))
            .arg("by", Term::constant(","))
    };

    let mut both = registry.instantiate(
        "split",
        &input().output("token", Term::var(0)).output("index", Term::var(1)),
    )?;
    let proposal = both.propose(&index, Variable::new(0), &prefix)?;
    assert_eq!(proposal.providing(), &[Variable::new(0), Variable::new(1)]);
    assert_eq!(
        rows(&mut both, &prefix)?,
        vec![
            vec![Value::from("a"), Value::from(1i64)],
            vec![Value::from("b"), Value::from(2i64)],
            vec![Value::from("c"), Value::from(3i64)],
        ]
    );

    let mut index_only = registry.instantiate("split", &input().output("index", Term::var(0)))?;
    index_only.propose(&index, Variable::new(0), &prefix)?;
    assert_eq!(
        rows(&mut index_only, &prefix)?,
        vec![vec![Value::from(1i64)], vec![Value::from(2i64)], vec![Value::from(3i64)]]
    );
    Ok(())
}

#[test]
fn repeated_tokens_are_bound_once() -> Result<()> {
    let registry = registry();
    // split("a,a,b", ",") -> token ?v0
    let split = registry.instantiate(
        "split",
        &CallSite::new()
            .arg("text", Term::constant("a,a,b"))
            .arg("by", Term::constant(","))
            .output("token", Term::var(0)),
    )?;
    let mut join = GenericJoin::new(vec![Box::new(split)], 1, JoinConfig::default())?;
    assert_eq!(
        join.collect(&FactIndex::new())?,
        vec![vec![Value::from("a")], vec![Value::from("b")]]
    );
    Ok(())
}

#[test]
fn convert_failure_is_an_empty_proposal() -> Result<()> {
    let registry = registry();
    let index = FactIndex::new();
    let prefix = Prefix::new();
    let mut convert = registry.instantiate(
        "convert",
        &CallSite::new()
            .arg("value", Term::constant("abc"))
            .arg("to", Term::constant("number"))
            .output("converted", Term::var(0)),
    )?;
    assert_eq!(convert.propose(&index, Variable::new(0), &prefix)?.cardinality(), 0);
    assert!(matches!(
        convert.resolve_proposal(&prefix),
        Err(JoinError::ProtocolViolation { .. })
    ));
    Ok(())
}

#[test]
fn convert_test_compares_the_converted_value() -> Result<()> {
    let registry = registry();
    let index = FactIndex::new();
    let convert = registry.instantiate(
        "convert",
        &CallSite::new()
            .arg("value", Term::var(0))
            .arg("to", Term::constant("number"))
            .output("converted", Term::var(1)),
    )?;
    assert!(convert.test(&index, &Prefix::from_values([Value::from("7"), Value::from(7i64)]))?);
    assert!(!convert.test(&index, &Prefix::from_values([Value::from("7"), Value::from(8i64)]))?);
    assert!(!convert.test(&index, &Prefix::from_values([Value::from("x"), Value::from(0i64)]))?);
    Ok(())
}

#[test]
fn misnamed_attribute_is_a_fault() {
    let registry = registry();
    let err = registry
        .instantiate(
            "split",
            &CallSite::new()
                .arg("text", Term::constant("a"))
                .arg("sep", Term::constant(",")),
        )
        .unwrap_err();
    assert!(matches!(err, JoinError::UnknownAttribute { attribute, .. } if attribute == "sep"));
}
