use crate::eval::CheckError;

/// The fixed set of functions a call may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Sin,
    Cos,
    Pow,
}

const BUILTINS: [(&str, Builtin); 3] = [
    ("sin", Builtin::Sin),
    ("cos", Builtin::Cos),
    ("pow", Builtin::Pow),
];

impl Builtin {
    pub fn lookup(name: &str) -> Option<Self> {
        BUILTINS
            .iter()
            .find(|(builtin, _)| *builtin == name)
            .map(|&(_, builtin)| builtin)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Sin => "sin",
            Builtin::Cos => "cos",
            Builtin::Pow => "pow",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Builtin::Sin | Builtin::Cos => 1,
            Builtin::Pow => 2,
        }
    }

    /// Finds `name` and checks that it takes `found` arguments.
    pub fn resolve(name: &str, found: usize) -> Result<Self, CheckError> {
        let Some(builtin) = Self::lookup(name) else {
            return Err(CheckError::UnknownFunction {
                name: name.to_string(),
            });
        };
        if builtin.arity() != found {
            return Err(CheckError::Arity {
                name: name.to_string(),
                found,
                expected: builtin.arity(),
            });
        }
        Ok(builtin)
    }

    pub fn apply(self, input: &[f64]) -> Result<f64, CheckError> {
        match (self, input) {
            (Builtin::Sin, [n]) => Ok(n.sin()),
            (Builtin::Cos, [n]) => Ok(n.cos()),
            (Builtin::Pow, [base, exponent]) => Ok(base.powf(*exponent)),
            _ => Err(CheckError::Arity {
                name: self.name().to_string(),
                found: input.len(),
                expected: self.arity(),
            }),
        }
    }
}
