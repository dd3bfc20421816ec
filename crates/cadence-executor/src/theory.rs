//! Execution theory
//!
//! The executor participates in the solver's search as a propagation theory.
//! Every constraint it imposes at dispatch time is keyed to a guard literal:
//! the global execution guard ξ, and one private guard σ_ξ per atom, tied
//! together by the clause `¬σ ∨ ¬ξ ∨ σ_ξ`. When a guard becomes true on a
//! search branch, the stored bounds are re-asserted with the guard as
//! reason; when the branch is abandoned, the bounds vanish with it. Nothing
//! has to be undone by hand on backtrack.

use cadence_core::error::ExecutionError;
use cadence_core::solver::{
    expr, AtomId, AtomKind, ExprId, ExprShape, Lit, Propagation, Solver, SolverObserver,
    SolverOps, Theory, Truth,
};
use cadence_core::state::ExecutorState;
use cadence_core::time::InfRational;

use crate::adaptation::Bound;
use crate::executor::Engine;
use crate::timeline::relevant_predicates;

impl Theory for Engine {
    fn on_propagate(&mut self, ops: &mut dyn SolverOps, p: Lit) -> Propagation {
        if p == self.xi {
            // the execution guard holds: every adaptation whose private
            // guard is already true applies on this branch
            for (_, adaptation) in self.adaptations.iter() {
                if ops.lit_value(adaptation.sigma_xi) != Truth::True {
                    continue;
                }
                for (xpr, bound) in adaptation.bounds() {
                    let outcome = reassert(ops, *xpr, bound, adaptation.sigma_xi);
                    if !outcome.is_consistent() {
                        return outcome;
                    }
                }
            }
        } else if ops.var_value(p.var()) == Truth::True {
            // a private guard became true: its atom's bounds apply
            if let Some(atom) = self.adaptations.atom_for_var(p.var()) {
                if let Some(adaptation) = self.adaptations.get(atom) {
                    for (xpr, bound) in adaptation.bounds() {
                        let outcome = reassert(ops, *xpr, bound, p);
                        if !outcome.is_consistent() {
                            return outcome;
                        }
                    }
                }
            }
        }
        Propagation::Consistent
    }
}

impl SolverObserver for Engine {
    fn on_read(&mut self, ops: &mut dyn SolverOps) {
        self.relevant = relevant_predicates(&*ops);
    }

    fn on_started_solving(&mut self, _ops: &mut dyn SolverOps) {
        if self.state() != ExecutorState::Reasoning {
            self.set_state(ExecutorState::Adapting);
        }
    }

    fn on_solution_found(&mut self, slv: &mut dyn Solver) -> Result<(), ExecutionError> {
        let xi = self.xi;
        if slv.lit_value(xi) == Truth::Undefined {
            // the solution does not commit to executability; force it
            slv.take_decision(xi, &mut *self)?;
        }
        match slv.lit_value(xi) {
            Truth::False => {
                self.fail_state();
                return Err(ExecutionError::UnsatisfiableUnderExecution);
            }
            Truth::Undefined => {
                if !slv.solve(&mut *self)? {
                    self.fail_state();
                    return Err(ExecutionError::InconsistentProblem);
                }
            }
            Truth::True => {}
        }

        self.rebuild_timeline(&*slv);
        // atoms the new solution dropped are no longer executing
        self.retain_active_executing(&*slv);

        let next = if self.is_running() {
            ExecutorState::Executing
        } else {
            ExecutorState::Idle
        };
        self.set_state(next);
        Ok(())
    }

    fn on_inconsistent_problem(&mut self, _ops: &mut dyn SolverOps) {
        self.clear_timeline();
        self.fail_state();
    }

    fn on_flaw_created(&mut self, ops: &mut dyn SolverOps, atom: AtomId) {
        if self.adaptations.contains(atom) {
            return;
        }
        let sigma_xi_var = ops.new_sat_var();
        let sigma_xi = Lit::positive(sigma_xi_var);
        ops.bind(sigma_xi_var);
        self.adaptations.insert(atom, sigma_xi);

        // either the atom is inactive, or ξ is false, or the execution
        // bounds must be enforced
        let sigma = ops.atom_sigma(atom);
        let added = ops.new_clause(&[!sigma, !self.xi, sigma_xi]);
        debug_assert!(added);

        // no activity may start in the past
        let start_name = match ops.atom_kind(atom) {
            Some(AtomKind::Impulse) => expr::AT,
            Some(AtomKind::Interval) => expr::START,
            None => return,
        };
        if let Some(xpr) = ops.atom_expr(atom, start_name) {
            self.adaptations.raise_arith_lb(
                atom,
                xpr,
                InfRational::from(self.current_time()),
                InfRational::PosInf,
            );
        }
    }
}

/// Re-assert one stored bound under a reason literal that is true at the
/// time of the call, producing a conflict explanation if the solver already
/// committed to something incompatible.
fn reassert(ops: &mut dyn SolverOps, xpr: ExprId, bound: &Bound, reason: Lit) -> Propagation {
    match bound {
        Bound::Bool(value) => {
            let ExprShape::Bool { lit } = ops.expr_shape(xpr) else {
                return Propagation::Consistent;
            };
            let target = if *value == Truth::True { lit } else { !lit };
            match ops.lit_value(target) {
                Truth::Undefined => {
                    ops.record(&[target, !reason]);
                    Propagation::Consistent
                }
                Truth::True => Propagation::Consistent,
                Truth::False => Propagation::Conflict(vec![target, !reason]),
            }
        }
        Bound::Arith { lb, ub } => {
            if ops.is_constant(xpr) {
                return Propagation::Consistent;
            }
            match ops.expr_shape(xpr) {
                ExprShape::Arith { real: true } => {
                    let var = ops.lin_var(xpr);
                    if !ops.lin_set_lb(var, *lb, reason) || !ops.lin_set_ub(var, *ub, reason) {
                        Propagation::Conflict(ops.take_theory_conflict())
                    } else {
                        Propagation::Consistent
                    }
                }
                // the dispatcher rejects non-real arithmetic before storing
                _ => Propagation::Consistent,
            }
        }
        Bound::Enum(value) => {
            let ExprShape::Enum { var } = ops.expr_shape(xpr) else {
                return Propagation::Consistent;
            };
            let values = ops.ov_value(var);
            if values.len() > 1 {
                let allows = ops.ov_allows(var, *value);
                ops.record(&[allows, !reason]);
                Propagation::Consistent
            } else if values.first() == Some(value) {
                Propagation::Consistent
            } else {
                let allows = ops.ov_allows(var, *value);
                Propagation::Conflict(vec![allows, !reason])
            }
        }
    }
}
