use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use good_lp::{ResolutionError, Solution, Solver, SolverModel, Variable};

use crate::sizing::program::LinearProgram;

/// Values of every variable of an optimal solution.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub values: HashMap<Variable, f64>,
    pub objective_value: f64,
    pub solve_time: Duration,
}

impl Assignment {
    pub fn value(&self, var: Variable) -> Option<f64> {
        self.values.get(&var).copied()
    }
}

/// Outcome of one solver invocation, passed on unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    Optimal(Assignment),
    Infeasible,
    Unbounded,
    SolverFailure(String),
}

impl SolveOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            Self::Optimal(_) => "optimal",
            Self::Infeasible => "infeasible",
            Self::Unbounded => "unbounded",
            Self::SolverFailure(_) => "solver_failure",
        }
    }
}

/// An LP engine. Implementations solve the program once and never retry.
pub trait LpSolver {
    fn solve(&self, program: &LinearProgram) -> SolveOutcome;
}

/// LP engine used by [`GoodLpSolver`]. HiGHS and SCIP need the matching cargo feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverEngine {
    #[default]
    Clarabel,
    Highs,
    Scip,
}

impl fmt::Display for SolverEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Clarabel => "clarabel",
            Self::Highs => "highs",
            Self::Scip => "scip",
        })
    }
}

/// [`LpSolver`] backed by one of the `good_lp` engines.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoodLpSolver {
    pub engine: SolverEngine,
}

impl GoodLpSolver {
    pub fn new(engine: SolverEngine) -> Self {
        Self { engine }
    }
}

impl LpSolver for GoodLpSolver {
    fn solve(&self, program: &LinearProgram) -> SolveOutcome {
        match self.engine {
            SolverEngine::Clarabel => solve_with(program, good_lp::clarabel),
            #[cfg(feature = "highs")]
            SolverEngine::Highs => solve_with(program, good_lp::highs),
            #[cfg(feature = "scip")]
            SolverEngine::Scip => solve_with(program, good_lp::scip),
            #[allow(unreachable_patterns)]
            engine => SolveOutcome::SolverFailure(format!(
                "{engine} support is not compiled in, rebuild with `--features {engine}`"
            )),
        }
    }
}

/// Hands the program to `solver` and maps its result to a [`SolveOutcome`].
pub fn solve_with<S>(program: &LinearProgram, solver: S) -> SolveOutcome
where
    S: Solver,
    S::Model: SolverModel<Error = ResolutionError>,
{
    let Some(objective) = program.objective() else {
        return SolveOutcome::SolverFailure("model has no objective attached".to_string());
    };

    let mut model = program
        .problem()
        .clone()
        .minimise(objective.expression.clone())
        .using(solver);
    for constraint in program.constraints() {
        model.add_constraint(constraint.clone());
    }

    tracing::debug!(
        variables = program.num_variables(),
        constraints = program.constraints().len(),
        objective = %objective.kind,
        "Submitting model to solver"
    );

    let start_time = Instant::now();
    let result = model.solve();
    let solve_time = start_time.elapsed();
    tracing::info!("Solver time: {:.2}ms", solve_time.as_secs_f64() * 1000.0);

    match result {
        Ok(solution) => {
            let mut values = HashMap::with_capacity(program.num_variables());
            for (key, var) in program.variables() {
                let value = solution.value(var);
                if !value.is_finite() {
                    return SolveOutcome::SolverFailure(format!(
                        "solver returned a non-finite value for {key}"
                    ));
                }
                values.insert(var, value);
            }
            let objective_value = objective.expression.eval_with(&values);
            SolveOutcome::Optimal(Assignment {
                values,
                objective_value,
                solve_time,
            })
        }
        Err(ResolutionError::Infeasible) => SolveOutcome::Infeasible,
        Err(ResolutionError::Unbounded) => SolveOutcome::Unbounded,
        Err(e) => SolveOutcome::SolverFailure(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::general::config::OptimisationObjective;
    use crate::sizing::program::{Objective, VariableKey};
    use approx::assert_abs_diff_eq;
    use good_lp::{Expression, constraint};

    fn program_with_objective(
        build: impl FnOnce(&mut LinearProgram) -> Expression,
    ) -> LinearProgram {
        let mut program = LinearProgram::new();
        let expression = build(&mut program);
        program
            .set_objective(Objective {
                kind: OptimisationObjective::MinimiseBatteryCap,
                expression,
            })
            .unwrap();
        program
    }

    #[test]
    fn test_solves_small_program() {
        let mut handles = Vec::new();
        let program = program_with_objective(|p| {
            let x = p.add_variable(VariableKey::scalar("x"));
            let y = p.add_variable(VariableKey::scalar("y"));
            p.add_constraint("sum", constraint!(x + y >= 3.0));
            p.add_constraint("x_min", constraint!(x >= 1.0));
            handles.extend([x, y]);
            2.0 * x + y
        });

        let SolveOutcome::Optimal(assignment) = GoodLpSolver::default().solve(&program) else {
            panic!("expected an optimal solution");
        };
        assert_eq!(assignment.values.len(), 2);
        assert_abs_diff_eq!(assignment.value(handles[0]).unwrap(), 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(assignment.value(handles[1]).unwrap(), 2.0, epsilon = 1e-5);
        assert_abs_diff_eq!(assignment.objective_value, 4.0, epsilon = 1e-5);
    }

    #[test]
    fn test_reports_infeasible() {
        let program = program_with_objective(|p| {
            let x = p.add_variable(VariableKey::scalar("x"));
            p.add_constraint("upper", constraint!(x <= 1.0));
            p.add_constraint("lower", constraint!(x >= 2.0));
            x.into()
        });

        assert_eq!(GoodLpSolver::default().solve(&program), SolveOutcome::Infeasible);
    }

    #[test]
    fn test_solving_leaves_the_program_reusable() {
        let program = program_with_objective(|p| {
            let x = p.add_variable(VariableKey::scalar("x"));
            p.add_constraint("x_min", constraint!(x >= 1.5));
            x.into()
        });

        let first = GoodLpSolver::default().solve(&program);
        let second = GoodLpSolver::default().solve(&program);
        for outcome in [first, second] {
            let SolveOutcome::Optimal(assignment) = outcome else {
                panic!("expected an optimal solution");
            };
            assert_abs_diff_eq!(assignment.objective_value, 1.5, epsilon = 1e-5);
        }
        assert_eq!(program.constraints().len(), 1);
    }

    #[test]
    fn test_missing_objective_is_a_solver_failure() {
        let mut program = LinearProgram::new();
        program.add_variable(VariableKey::scalar("x"));

        let outcome = GoodLpSolver::default().solve(&program);
        assert!(matches!(outcome, SolveOutcome::SolverFailure(_)));
        assert_eq!(outcome.status(), "solver_failure");
    }

    #[cfg(not(feature = "highs"))]
    #[test]
    fn test_engine_without_its_feature_fails_cleanly() {
        let program = program_with_objective(|p| p.add_variable(VariableKey::scalar("x")).into());
        let outcome = GoodLpSolver::new(SolverEngine::Highs).solve(&program);
        let SolveOutcome::SolverFailure(reason) = outcome else {
            panic!("expected a solver failure");
        };
        assert!(reason.contains("--features highs"), "{reason}");
    }
}
