use std::collections::{BTreeSet, HashMap};

use miette::{Diagnostic, Error};
use thiserror::Error;

use crate::{
    parse::{Expr, Op},
    system::Builtin,
};

#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum CheckError {
    #[error("unknown function call: {name}")]
    #[diagnostic(
        code(expr::check::unknown_function),
        help("the available functions are sin, cos and pow")
    )]
    UnknownFunction { name: String },

    #[error("call to {name} has {found} args, expected {expected}")]
    #[diagnostic(code(expr::check::arity))]
    Arity {
        name: String,
        found: usize,
        expected: usize,
    },
}

#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// A call that `check` would have rejected.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Unchecked(#[from] CheckError),

    #[error("missing var {name} in environment")]
    #[diagnostic(
        code(expr::eval::missing_variable),
        help("bind `{name}` before evaluating")
    )]
    MissingVariable { name: String },
}

/// Variable bindings supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    values: HashMap<String, f64>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn define(&mut self, name: impl Into<String>, value: f64) -> Option<f64> {
        self.values.insert(name.into(), value)
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Environment {
            values: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        }
    }
}

impl<K: Into<String>, const N: usize> From<[(K, f64); N]> for Environment {
    fn from(bindings: [(K, f64); N]) -> Self {
        bindings.into_iter().collect()
    }
}

impl<'de> Expr<'de> {
    /// Validates every call and collects the names of all referenced variables.
    ///
    /// Stops at the first invalid call, visiting arguments left to right.
    pub fn check(&self, vars: &mut BTreeSet<&'de str>) -> Result<(), CheckError> {
        match self {
            Expr::Literal(_) => Ok(()),
            Expr::Variable(name) => {
                vars.insert(*name);
                Ok(())
            }
            Expr::Negate(operand) => operand.check(vars),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.check(vars)?;
                rhs.check(vars)
            }
            Expr::Call {
                function,
                arguments,
            } => {
                Builtin::resolve(function, arguments.len())?;
                arguments
                    .iter()
                    .try_for_each(|argument| argument.check(vars))
            }
        }
    }

    /// Computes the value of the tree. Unbound variables read as `0.0`.
    ///
    /// Division follows IEEE-754, so dividing by zero yields an infinity or NaN.
    pub fn eval(&self, env: &Environment) -> Result<f64, EvalError> {
        Ok(match self {
            Expr::Literal(value) => *value,
            Expr::Variable(name) => env.get(name).unwrap_or(0.0),
            Expr::Negate(operand) => -operand.eval(env)?,
            Expr::Binary { op, lhs, rhs } => {
                let (lhs, rhs) = (lhs.eval(env)?, rhs.eval(env)?);
                match op {
                    Op::Add => lhs + rhs,
                    Op::Subtract => lhs - rhs,
                    Op::Multiply => lhs * rhs,
                    Op::Divide => lhs / rhs,
                }
            }
            Expr::Call {
                function,
                arguments,
            } => {
                let builtin = Builtin::resolve(function, arguments.len())?;
                let values = arguments
                    .iter()
                    .map(|argument| argument.eval(env))
                    .collect::<Result<Vec<_>, _>>()?;
                builtin.apply(&values)?
            }
        })
    }
}

/// Parses, checks and evaluates `input` in one go.
///
/// Unlike [`Expr::eval`], every variable the expression mentions must be bound in
/// `env`. To evaluate the same expression repeatedly, parse it once and call
/// [`Expr::eval`] instead.
pub fn evaluate(input: &str, env: &Environment) -> Result<f64, Error> {
    let expr = crate::parse(input)?;
    log::debug!("parsed {input:?} as {expr}");

    let mut vars = BTreeSet::new();
    expr.check(&mut vars)?;
    log::debug!("{expr} references {vars:?}");

    if let Some(name) = vars.iter().find(|name| !env.contains(name)) {
        return Err(EvalError::MissingVariable {
            name: name.to_string(),
        }
        .into());
    }

    Ok(expr.eval(env)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars_of(input: &str) -> Result<Vec<&str>, CheckError> {
        let expr = crate::parse(input).unwrap();
        let mut vars = BTreeSet::new();
        expr.check(&mut vars)?;
        Ok(vars.into_iter().collect())
    }

    #[test]
    fn precedence() {
        let env = Environment::new();
        assert_eq!(evaluate("2 + 3 * 4", &env).unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4", &env).unwrap(), 20.0);
        assert_eq!(evaluate("10 - 4 - 3", &env).unwrap(), 3.0);
        assert_eq!(evaluate("2 * 3 / 4", &env).unwrap(), 1.5);
    }

    #[test]
    fn unary_minus() {
        let env = Environment::from([("a", 2.0), ("b", 3.0)]);
        assert_eq!(evaluate("-a * b", &env).unwrap(), -6.0);
        assert_eq!(evaluate("-a - b", &env).unwrap(), -5.0);
        assert_eq!(evaluate("1 - -a * b", &env).unwrap(), 7.0);
    }

    #[test]
    fn builtins() {
        let env = Environment::from([("x", 0.0)]);
        assert_eq!(evaluate("pow(2, 10)", &env).unwrap(), 1024.0);
        assert_eq!(evaluate("sin(x)", &env).unwrap(), 0.0);
        assert_eq!(evaluate("cos(x) + pow(x, 0)", &env).unwrap(), 2.0);
    }

    #[test]
    fn division_is_not_trapped() {
        let env = Environment::new();
        assert_eq!(evaluate("1 / 0", &env).unwrap(), f64::INFINITY);
        assert_eq!(evaluate("-1 / 0", &env).unwrap(), f64::NEG_INFINITY);
        assert!(evaluate("0 / 0", &env).unwrap().is_nan());
    }

    #[test]
    fn check_collects_variables() {
        assert_eq!(
            vars_of("pow(x, y) + z * x - sin(w)").unwrap(),
            vec!["w", "x", "y", "z"]
        );
        assert!(vars_of("1 + 2").unwrap().is_empty());
    }

    #[test]
    fn check_rejects_bad_calls() {
        let err = vars_of("pow(2)").unwrap_err();
        assert_eq!(
            err,
            CheckError::Arity {
                name: "pow".to_string(),
                found: 1,
                expected: 2,
            }
        );
        assert_eq!(err.to_string(), "call to pow has 1 args, expected 2");

        let err = vars_of("foo(1)").unwrap_err();
        assert_eq!(err.to_string(), "unknown function call: foo");

        // nested calls are checked too
        assert!(vars_of("sin(cos(1, 2))").is_err());
    }

    #[test]
    fn check_stops_at_first_failure() {
        let expr = crate::parse("a + sin(b, c) + d").unwrap();
        let mut vars = BTreeSet::new();
        assert!(expr.check(&mut vars).is_err());
        assert!(vars.contains("a"));
        assert!(!vars.contains("b"));
        assert!(!vars.contains("d"));
    }

    #[test]
    fn eval_defaults_missing_variables() {
        let expr = crate::parse("a + 1").unwrap();
        assert_eq!(expr.eval(&Environment::new()), Ok(1.0));
    }

    #[test]
    fn eval_without_check_is_an_error() {
        let expr = crate::parse("foo(1) + 2").unwrap();
        assert_eq!(
            expr.eval(&Environment::new()),
            Err(EvalError::Unchecked(CheckError::UnknownFunction {
                name: "foo".to_string(),
            }))
        );
        let expr = crate::parse("sin(1, 2)").unwrap();
        assert!(matches!(
            expr.eval(&Environment::new()),
            Err(EvalError::Unchecked(CheckError::Arity { .. }))
        ));
    }

    #[test]
    fn evaluate_requires_bound_variables() {
        let err = evaluate("a + b", &Environment::from([("a", 1.0)])).unwrap_err();
        assert_eq!(err.to_string(), "missing var b in environment");
        assert!(matches!(
            err.downcast_ref::<EvalError>(),
            Some(EvalError::MissingVariable { .. })
        ));
        assert_eq!(
            evaluate("a + b", &Environment::from([("a", 1.0), ("b", 2.0)])).unwrap(),
            3.0
        );
    }

    #[test]
    fn evaluate_surfaces_check_errors() {
        let err = evaluate("pow(2)", &Environment::new()).unwrap_err();
        assert!(err.downcast_ref::<CheckError>().is_some());
    }

    #[test]
    fn environment_bindings() {
        let mut env: Environment = [("x", 1.0)].into_iter().collect();
        assert_eq!(env.get("x"), Some(1.0));
        assert_eq!(env.define("x", 2.0), Some(1.0));
        assert_eq!(env.define("y", 3.0), None);
        assert_eq!(env.get("x"), Some(2.0));
        assert!(env.contains("y"));
        assert!(!env.contains("z"));
    }
}
