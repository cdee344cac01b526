use std::collections::BTreeSet;

use expr::lex::SingleTokenError;
use expr::{CheckError, Environment, Expr, TokenKind, evaluate, parse, tokenize};

#[test]
fn numeric_literals_evaluate_to_themselves() {
    let literals = [
        "0", "7", "42", "3.5", "0.1", "10.", "123456789", "2.718281828", "0.000001",
    ];
    for literal in literals {
        let expected: f64 = literal.parse().unwrap();
        let value = parse(literal).unwrap().eval(&Environment::new()).unwrap();
        assert_eq!(value, expected, "literal {literal}");
    }
}

#[test]
fn documented_results() {
    let empty = Environment::new();
    let ab = Environment::from([("a", 2.0), ("b", 3.0)]);
    let x = Environment::from([("x", 0.0)]);

    assert_eq!(evaluate("2 + 3 * 4", &empty).unwrap(), 14.0);
    assert_eq!(evaluate("(2 + 3) * 4", &empty).unwrap(), 20.0);
    assert_eq!(evaluate("-a * b", &ab).unwrap(), -6.0);
    assert_eq!(evaluate("-a - b", &ab).unwrap(), -5.0);
    assert_eq!(evaluate("pow(2, 10)", &empty).unwrap(), 1024.0);
    assert_eq!(evaluate("sin(x)", &x).unwrap(), 0.0);
}

#[test]
fn check_failures() {
    let mut vars = BTreeSet::new();
    let err = parse("pow(2)").unwrap().check(&mut vars).unwrap_err();
    assert!(matches!(
        err,
        CheckError::Arity {
            found: 1,
            expected: 2,
            ..
        }
    ));

    let err = parse("foo(1)").unwrap().check(&mut vars).unwrap_err();
    assert!(matches!(err, CheckError::UnknownFunction { ref name } if name == "foo"));
}

#[test]
fn parse_failures() {
    assert_eq!(parse("(1 + 2").unwrap_err().to_string(), "missing )");
    assert!(parse("1 + )").is_err());
    assert!(
        parse("3 & 4")
            .unwrap_err()
            .downcast_ref::<SingleTokenError>()
            .is_some()
    );
}

#[test]
fn failures_never_panic() {
    let inputs = [
        "", ")", "(", ",", "1,2", "((", "-", "--", "pow(", "pow()", "pow(1,,2)", "1..2", ".5",
        "x y", "sin(", "1 + + 2", "€", "\u{0}", "12abc(", "a(b(c(d(",
    ];
    for input in inputs {
        let _ = tokenize(input).count();
        let _ = parse(input);
        let _ = evaluate(input, &Environment::new());
    }
}

#[test]
fn oversized_inputs_are_errors() {
    let inputs = [
        "(".repeat(10_000),
        format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000)),
        format!("{}1", "-".repeat(200_000)),
        vec!["x"; 5_000].join(" - "),
        format!("1{}", "0".repeat(400)),
    ];
    for input in &inputs {
        assert!(parse(input).is_err());
        assert!(evaluate(input, &Environment::from([("x", 1.0)])).is_err());
    }
}

#[test]
fn token_stream_terminates_once() {
    let tokens: Vec<_> = tokenize("pow(x, 2)").collect();
    let eofs = tokens
        .iter()
        .filter(|token| matches!(token, Ok(token) if token.kind == TokenKind::Eof))
        .count();
    assert_eq!(eofs, 1);
    assert!(matches!(tokens.last(), Some(Ok(token)) if token.kind == TokenKind::Eof));

    let tokens: Vec<_> = tokenize("1 + ; 2").collect();
    assert_eq!(tokens.len(), 3);
    assert!(tokens[2].is_err());
}

#[test]
fn printed_form_reparses_to_the_same_tree() {
    let inputs = [
        "2 + 3 * 4",
        "(2 + 3) * 4",
        "-a * b",
        "-a - b",
        "a - b - c",
        "a / (b / c)",
        "pow(sin(x) * 2, -y) / cos(z - 1)",
        "-(-(1))",
        "0.3 * x",
    ];
    for input in inputs {
        let expr = parse(input).unwrap();
        let printed = expr.to_string();
        assert_eq!(parse(&printed).unwrap(), expr, "{input} printed as {printed}");
    }
}

#[test]
fn evaluation_is_deterministic() {
    let expr = parse("pow(sin(x), 2) + pow(cos(x), 2) - x / 3").unwrap();
    let env = Environment::from([("x", 0.7)]);
    let first = expr.eval(&env).unwrap();
    let second = expr.eval(&env).unwrap();
    assert_eq!(first.to_bits(), second.to_bits());
}

#[test]
fn shared_tree_evaluates_concurrently() {
    let expr: Expr<'_> = parse("x * x + 1").unwrap();
    let results: Vec<f64> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let expr = &expr;
                scope.spawn(move || {
                    let mut vars = BTreeSet::new();
                    expr.check(&mut vars).unwrap();
                    expr.eval(&Environment::from([("x", i as f64)])).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(results, vec![1.0, 2.0, 5.0, 10.0]);
}
