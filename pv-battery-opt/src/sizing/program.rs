//! Linear program assembled by the model builder.
//!
//! Variables live in a `good_lp` [`ProblemVariables`] and are additionally registered
//! by name and, for per-timestep sets, by timestep, so that constraints and solutions
//! can be addressed without holding on to the handles.

use std::fmt;

use good_lp::{Constraint, Expression, ProblemVariables, Variable, variable};
use indexmap::IndexMap;

use crate::error::SizingError;
use crate::general::config::OptimisationObjective;

/// Name of a variable, with a timestep for per-timestep sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariableKey {
    pub name: &'static str,
    pub timestep: Option<usize>,
}

impl VariableKey {
    pub const fn scalar(name: &'static str) -> Self {
        Self {
            name,
            timestep: None,
        }
    }

    pub const fn at(name: &'static str, timestep: usize) -> Self {
        Self {
            name,
            timestep: Some(timestep),
        }
    }
}

impl fmt::Display for VariableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.timestep {
            Some(t) => write!(f, "{}[{}]", self.name, t),
            None => f.write_str(self.name),
        }
    }
}

/// Linear objective, always minimised.
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    pub kind: OptimisationObjective,
    pub expression: Expression,
}

/// Variables, named constraints and at most one objective.
#[derive(Clone, Default)]
pub struct LinearProgram {
    problem: ProblemVariables,
    variables: IndexMap<VariableKey, Variable>,
    constraints: Vec<Constraint>,
    objective: Option<Objective>,
}

impl fmt::Debug for LinearProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinearProgram")
            .field("variables", &self.variables.len())
            .field("constraints", &self.constraints.len())
            .field("objective", &self.objective.as_ref().map(|o| o.kind))
            .finish()
    }
}

impl LinearProgram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a non-negative continuous variable. Declaring an existing key again
    /// returns the variable already registered under it.
    pub fn add_variable(&mut self, key: VariableKey) -> Variable {
        if let Some(&var) = self.variables.get(&key) {
            return var;
        }
        let var = self.problem.add(variable().min(0).name(key.to_string()));
        self.variables.insert(key, var);
        var
    }

    pub fn add_constraint(&mut self, name: impl Into<String>, constraint: Constraint) {
        self.constraints.push(constraint.set_name(name.into()));
    }

    /// Attaches the objective.
    ///
    /// Attaching the same objective again is a no-op. A different objective is never
    /// combined with the one already attached.
    pub fn set_objective(&mut self, objective: Objective) -> Result<(), SizingError> {
        match &self.objective {
            None => {
                self.objective = Some(objective);
                Ok(())
            }
            Some(existing) if *existing == objective => Ok(()),
            Some(existing) => Err(SizingError::config(format!(
                "model already minimises `{}`, cannot also attach `{}`",
                existing.kind, objective.kind
            ))),
        }
    }

    pub fn variable(&self, name: &'static str, timestep: Option<usize>) -> Option<Variable> {
        self.variables
            .get(&VariableKey { name, timestep })
            .copied()
    }

    pub fn key(&self, var: Variable) -> Option<&VariableKey> {
        self.variables
            .iter()
            .find(|&(_, &v)| v == var)
            .map(|(key, _)| key)
    }

    /// Registered variables in declaration order.
    pub fn variables(&self) -> impl Iterator<Item = (&VariableKey, Variable)> {
        self.variables.iter().map(|(key, &var)| (key, var))
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// The `good_lp` variable set, with the bounds and names of every variable.
    pub fn problem(&self) -> &ProblemVariables {
        &self.problem
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn constraint(&self, name: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.name() == Some(name))
    }

    pub fn objective(&self) -> Option<&Objective> {
        self.objective.as_ref()
    }
}

/// Coefficient of `var` in `expression`, 0 when absent.
#[cfg(test)]
pub(crate) fn coefficient(expression: &Expression, var: Variable) -> f64 {
    use good_lp::IntoAffineExpression;

    expression
        .linear_coefficients()
        .into_iter()
        .filter(|&(v, _)| v == var)
        .map(|(_, c)| c)
        .sum()
}
