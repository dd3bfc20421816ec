//! The solver interface consumed by the executor.
//!
//! The constraint solver is an external collaborator: a SAT core with an
//! attached linear-rational theory, an ordered-values theory, and a causal
//! search that produces atoms. The executor drives it exclusively through
//! these two traits.
//!
//! `SolverOps` is the re-entrant surface: every operation here is legal at
//! any time, including from inside a propagation callback. `Solver` adds the
//! control operations that may themselves re-enter the hosted plugin; each of
//! those takes the plugin explicitly, so the solver never has to hold a
//! reference back into the executor.

use super::ids::{
    ArithBounds, AtomId, AtomKind, ExprId, ExprShape, LinVar, OvVar, PredicateId, TypeId, ValueRef,
};
use super::lit::{Lit, Truth, Var};
use super::plugin::SolverPlugin;
use crate::error::ExecutionError;
use crate::time::InfRational;

/// Operations available to the executor at any point, including from inside
/// propagation callbacks.
pub trait SolverOps {
    // ---- SAT core ----

    /// Allocate a fresh boolean variable.
    fn new_sat_var(&mut self) -> Var;

    /// Add a clause; returns false if the clause is trivially inconsistent
    /// at root level.
    fn new_clause(&mut self, lits: &[Lit]) -> bool;

    /// Current assignment of a literal.
    fn lit_value(&self, l: Lit) -> Truth;

    /// Current assignment of a variable.
    fn var_value(&self, v: Var) -> Truth {
        self.lit_value(Lit::positive(v))
    }

    /// Whether the trail holds no open decision.
    fn root_level(&self) -> bool;

    // ---- theory plumbing ----

    /// Register a variable with the hosted plugin: assignments to it will be
    /// delivered through `Theory::on_propagate`.
    fn bind(&mut self, v: Var);

    /// Record a theory lemma, typically a forced implication discovered
    /// during propagation.
    fn record(&mut self, lits: &[Lit]);

    /// Drain the conflict the numeric theory produced on the last rejected
    /// bound, so it can be re-raised as this plugin's conflict.
    fn take_theory_conflict(&mut self) -> Vec<Lit>;

    // ---- atoms ----

    /// The activation literal of an atom; the atom is part of the current
    /// solution when this evaluates true.
    fn atom_sigma(&self, atom: AtomId) -> Lit;

    /// Temporal shape of an atom, if it belongs to a temporal predicate.
    fn atom_kind(&self, atom: AtomId) -> Option<AtomKind>;

    /// Look up a named expression of an atom.
    fn atom_expr(&self, atom: AtomId, name: &str) -> Option<ExprId>;

    /// All named expressions of an atom.
    fn atom_exprs(&self, atom: AtomId) -> Vec<(String, ExprId)>;

    // ---- predicates and types ----

    /// Predicates declared at the top-level scope.
    fn predicates(&self) -> Vec<PredicateId>;

    /// Temporal shape of a predicate, if any.
    fn predicate_kind(&self, pred: PredicateId) -> Option<AtomKind>;

    /// Every atom instantiated from a predicate.
    fn predicate_instances(&self, pred: PredicateId) -> Vec<AtomId>;

    /// Complex types declared at the top-level scope.
    fn types(&self) -> Vec<TypeId>;

    /// Complex types nested inside a type.
    fn type_members(&self, ty: TypeId) -> Vec<TypeId>;

    /// Predicates declared by a type.
    fn type_predicates(&self, ty: TypeId) -> Vec<PredicateId>;

    // ---- expressions ----

    /// What backs the expression.
    fn expr_shape(&self, expr: ExprId) -> ExprShape;

    /// Whether the expression reduces to a constant (no variables).
    fn is_constant(&self, expr: ExprId) -> bool;

    /// Current arithmetic value of an expression.
    fn arith_value(&self, expr: ExprId) -> InfRational;

    /// Current arithmetic bounds of an expression.
    fn arith_bounds(&self, expr: ExprId) -> ArithBounds;

    /// The plan horizon expression, if the problem declares one.
    fn horizon(&self) -> Option<ExprId>;

    // ---- linear-rational theory ----

    /// Intern (or reuse) the theory variable behind an expression's linear
    /// combination.
    fn lin_var(&mut self, expr: ExprId) -> LinVar;

    /// Current value of a theory variable.
    fn lin_value(&self, v: LinVar) -> InfRational;

    /// Tighten the lower bound under a reason literal; false on conflict,
    /// with the conflict retrievable through `take_theory_conflict`.
    fn lin_set_lb(&mut self, v: LinVar, lb: InfRational, reason: Lit) -> bool;

    /// Tighten the upper bound under a reason literal.
    fn lin_set_ub(&mut self, v: LinVar, ub: InfRational, reason: Lit) -> bool;

    /// Pin the variable to a value under a reason literal.
    fn lin_set(&mut self, v: LinVar, value: InfRational, reason: Lit) -> bool;

    // ---- ordered-values theory ----

    /// Remaining candidate values of an ordered-values variable.
    fn ov_value(&self, v: OvVar) -> Vec<ValueRef>;

    /// The literal stating that the variable may take the given value.
    fn ov_allows(&mut self, v: OvVar, value: ValueRef) -> Lit;
}

/// Control operations; these may re-enter the plugin passed to them.
pub trait Solver: SolverOps {
    /// Run unit propagation to fixpoint; false on conflict.
    fn propagate(&mut self, plugin: &mut dyn SolverPlugin) -> bool;

    /// Open a decision level and assert a literal; false if the decision was
    /// refuted and undone.
    fn take_decision(&mut self, l: Lit, plugin: &mut dyn SolverPlugin)
        -> Result<bool, ExecutionError>;

    /// Undo the most recent decision level.
    fn pop_level(&mut self, plugin: &mut dyn SolverPlugin);

    /// Search for a solution; `Ok(false)` means the problem is unsatisfiable
    /// (`on_inconsistent_problem` has fired), errors come from the plugin's
    /// own callbacks.
    fn solve(&mut self, plugin: &mut dyn SolverPlugin) -> Result<bool, ExecutionError>;

    /// Read additional requirements from a planning script.
    fn read_script(
        &mut self,
        script: &str,
        plugin: &mut dyn SolverPlugin,
    ) -> Result<(), ExecutionError>;

    /// Read additional requirements from script files.
    fn read_files(
        &mut self,
        files: &[String],
        plugin: &mut dyn SolverPlugin,
    ) -> Result<(), ExecutionError>;

    /// Analyze a conflict clause and backjump to a level where it can be
    /// resolved; false if the conflict is fatal at root level.
    fn analyze_and_backjump(&mut self, conflict: &[Lit], plugin: &mut dyn SolverPlugin) -> bool;
}
