//! The simulated solver.
//!
//! A deliberately small stand-in for the production constraint solver,
//! faithful where the executor can tell the difference: a trail-based SAT
//! assignment with decision levels and naive unit propagation, bound
//! variables routed to the hosted plugin, a linear-rational bound store with
//! reason literals and per-level undo, ordered-values variables that narrow
//! to an allowed candidate, and alternative groups standing in for causal
//! search. Activities schedule as early as their bounds allow.

use std::collections::{BTreeSet, HashMap};

use cadence_core::error::ExecutionError;
use cadence_core::solver::{
    ArithBounds, AtomId, AtomKind, ExprId, ExprShape, LinVar, Lit, OvVar, PredicateId,
    Propagation, Solver, SolverOps, SolverPlugin, Truth, TypeId, ValueRef, Var,
};
use cadence_core::time::{InfRational, Rational};

use crate::script::{self, Directive};

#[derive(Debug, Clone, Copy)]
enum ExprDef {
    /// Propositional parameter with the value the search prefers.
    Bool { lit: Lit, default: bool },
    /// Real-typed linear expression.
    Lin { var: LinVar },
    /// Constant rational; nothing to adapt.
    Const { value: Rational },
    /// Integer-typed expression, outside the linear-rational domain.
    Int { value: i64 },
    /// Ordered-values parameter.
    Enum { var: OvVar },
}

#[derive(Debug)]
struct AtomDef {
    name: String,
    pred: PredicateId,
    sigma: Var,
    exprs: Vec<(String, ExprId)>,
}

#[derive(Debug)]
struct PredDef {
    #[allow(dead_code)]
    name: String,
    kind: Option<AtomKind>,
    instances: Vec<AtomId>,
}

#[derive(Debug)]
struct TypeDef {
    #[allow(dead_code)]
    name: String,
    members: Vec<TypeId>,
    preds: Vec<PredicateId>,
}

#[derive(Debug, Clone, Copy)]
struct LinState {
    lb: InfRational,
    ub: InfRational,
}

#[derive(Debug)]
struct LinUndo {
    level: usize,
    var: usize,
    lb: InfRational,
    ub: InfRational,
}

#[derive(Debug)]
struct OvState {
    candidates: Vec<ValueRef>,
    allows: Vec<Lit>,
}

enum ClauseStatus {
    Satisfied,
    Open,
    Unit(Lit),
    Falsified,
}

/// In-memory reference solver.
#[derive(Debug)]
pub struct SimSolver {
    // SAT core
    values: Vec<Truth>,
    trail: Vec<Lit>,
    level_marks: Vec<usize>,
    qhead: usize,
    clauses: Vec<Vec<Lit>>,
    bound_vars: BTreeSet<Var>,
    last_conflict: Vec<Lit>,

    // linear-rational store
    lin: Vec<LinState>,
    lin_trail: Vec<LinUndo>,
    theory_conflict: Vec<Lit>,

    // ordered-values store
    ovs: Vec<OvState>,
    allow_index: HashMap<Var, (usize, usize)>,
    foreign_allows: HashMap<(OvVar, ValueRef), Lit>,

    // problem model
    exprs: Vec<ExprDef>,
    atoms: Vec<AtomDef>,
    preds: Vec<PredDef>,
    types: Vec<TypeDef>,
    top_types: Vec<TypeId>,
    top_preds: Vec<PredicateId>,
    default_impulse: Option<PredicateId>,
    default_interval: Option<PredicateId>,

    groups: Vec<Vec<AtomId>>,
    grouped: BTreeSet<AtomId>,
    pending_flaws: Vec<AtomId>,
    names: HashMap<String, AtomId>,

    horizon_var: LinVar,
    horizon_expr: ExprId,
    explicit_horizon: Option<Rational>,
}

impl SimSolver {
    pub fn new() -> Self {
        let zero = InfRational::from(0);
        let mut solver = Self {
            values: Vec::new(),
            trail: Vec::new(),
            level_marks: Vec::new(),
            qhead: 0,
            clauses: Vec::new(),
            bound_vars: BTreeSet::new(),
            last_conflict: Vec::new(),
            lin: Vec::new(),
            lin_trail: Vec::new(),
            theory_conflict: Vec::new(),
            ovs: Vec::new(),
            allow_index: HashMap::new(),
            foreign_allows: HashMap::new(),
            exprs: Vec::new(),
            atoms: Vec::new(),
            preds: Vec::new(),
            types: Vec::new(),
            top_types: Vec::new(),
            top_preds: Vec::new(),
            default_impulse: None,
            default_interval: None,
            groups: Vec::new(),
            grouped: BTreeSet::new(),
            pending_flaws: Vec::new(),
            names: HashMap::new(),
            horizon_var: LinVar(0),
            horizon_expr: ExprId(0),
            explicit_horizon: None,
        };
        solver.horizon_var = solver.new_lin(zero);
        solver.horizon_expr = solver.new_expr(ExprDef::Lin {
            var: solver.horizon_var,
        });
        solver
    }

    // ---- problem building ----

    pub fn add_type(&mut self, name: &str) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(TypeDef {
            name: name.to_string(),
            members: Vec::new(),
            preds: Vec::new(),
        });
        self.top_types.push(id);
        id
    }

    pub fn add_member_type(&mut self, parent: TypeId, name: &str) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(TypeDef {
            name: name.to_string(),
            members: Vec::new(),
            preds: Vec::new(),
        });
        self.types[parent.0 as usize].members.push(id);
        id
    }

    pub fn add_predicate(&mut self, name: &str, kind: AtomKind) -> PredicateId {
        let id = self.new_pred(name, Some(kind));
        self.top_preds.push(id);
        id
    }

    pub fn add_type_predicate(&mut self, ty: TypeId, name: &str, kind: AtomKind) -> PredicateId {
        let id = self.new_pred(name, Some(kind));
        self.types[ty.0 as usize].preds.push(id);
        id
    }

    /// An impulse atom under the built-in top-level impulse predicate.
    pub fn add_impulse(&mut self, name: &str, at: Rational) -> AtomId {
        let pred = self.impulse_pred();
        self.add_impulse_to(pred, name, at)
    }

    /// An impulse atom whose time point is a solver constant.
    pub fn add_impulse_fixed(&mut self, name: &str, at: Rational) -> AtomId {
        let pred = self.impulse_pred();
        let at_expr = self.new_expr(ExprDef::Const { value: at });
        self.new_atom(pred, name, vec![("at".to_string(), at_expr)])
    }

    pub fn add_impulse_to(&mut self, pred: PredicateId, name: &str, at: Rational) -> AtomId {
        debug_assert_eq!(self.preds[pred.0 as usize].kind, Some(AtomKind::Impulse));
        let var = self.new_lin(InfRational::from(at));
        let at_expr = self.new_expr(ExprDef::Lin { var });
        self.new_atom(pred, name, vec![("at".to_string(), at_expr)])
    }

    /// An interval atom under the built-in top-level interval predicate.
    pub fn add_interval(&mut self, name: &str, start: Rational, end: Rational) -> AtomId {
        let pred = self.interval_pred();
        self.add_interval_to(pred, name, start, end)
    }

    pub fn add_interval_to(
        &mut self,
        pred: PredicateId,
        name: &str,
        start: Rational,
        end: Rational,
    ) -> AtomId {
        debug_assert_eq!(self.preds[pred.0 as usize].kind, Some(AtomKind::Interval));
        let start_var = self.new_lin(InfRational::from(start));
        let end_var = self.new_lin(InfRational::from(end));
        let start_expr = self.new_expr(ExprDef::Lin { var: start_var });
        let end_expr = self.new_expr(ExprDef::Lin { var: end_var });
        let duration_expr = self.new_expr(ExprDef::Const { value: end - start });
        self.new_atom(
            pred,
            name,
            vec![
                ("start".to_string(), start_expr),
                ("end".to_string(), end_expr),
                ("duration".to_string(), duration_expr),
            ],
        )
    }

    /// A propositional parameter; the search assigns `default` when free.
    pub fn add_bool_param(&mut self, atom: AtomId, name: &str, default: bool) -> ExprId {
        let lit = Lit::positive(self.new_var());
        let expr = self.new_expr(ExprDef::Bool { lit, default });
        self.atoms[atom.0 as usize].exprs.push((name.to_string(), expr));
        expr
    }

    /// An ordered-values parameter over the given candidates; the search
    /// narrows it to the first still-allowed one.
    pub fn add_enum_param(&mut self, atom: AtomId, name: &str, candidates: &[u64]) -> ExprId {
        let ov = OvVar(self.ovs.len() as u32);
        let mut allows = Vec::with_capacity(candidates.len());
        for (idx, _) in candidates.iter().enumerate() {
            let var = self.new_var();
            self.allow_index.insert(var, (ov.0 as usize, idx));
            allows.push(Lit::positive(var));
        }
        self.ovs.push(OvState {
            candidates: candidates.iter().map(|c| ValueRef(*c)).collect(),
            allows,
        });
        let expr = self.new_expr(ExprDef::Enum { var: ov });
        self.atoms[atom.0 as usize].exprs.push((name.to_string(), expr));
        expr
    }

    /// An integer-typed parameter, outside the linear-rational domain.
    pub fn add_int_param(&mut self, atom: AtomId, name: &str, value: i64) -> ExprId {
        let expr = self.new_expr(ExprDef::Int { value });
        self.atoms[atom.0 as usize].exprs.push((name.to_string(), expr));
        expr
    }

    /// Declare the atoms mutually exclusive alternatives: the search keeps
    /// the first member not yet refuted.
    pub fn make_exclusive(&mut self, members: &[AtomId]) {
        self.groups.push(members.to_vec());
        self.grouped.extend(members.iter().copied());
    }

    pub fn set_horizon(&mut self, horizon: Rational) {
        self.explicit_horizon = Some(horizon);
    }

    pub fn atom_by_name(&self, name: &str) -> Option<AtomId> {
        self.names.get(name).copied()
    }

    pub fn atom_name(&self, atom: AtomId) -> Option<&str> {
        self.atoms.get(atom.0 as usize).map(|a| a.name.as_str())
    }

    /// The clause that stopped the last failed propagation.
    pub fn last_conflict(&self) -> &[Lit] {
        &self.last_conflict
    }

    // ---- internals ----

    fn impulse_pred(&mut self) -> PredicateId {
        if let Some(pred) = self.default_impulse {
            return pred;
        }
        let pred = self.add_predicate("impulse", AtomKind::Impulse);
        self.default_impulse = Some(pred);
        pred
    }

    fn interval_pred(&mut self) -> PredicateId {
        if let Some(pred) = self.default_interval {
            return pred;
        }
        let pred = self.add_predicate("interval", AtomKind::Interval);
        self.default_interval = Some(pred);
        pred
    }

    fn new_pred(&mut self, name: &str, kind: Option<AtomKind>) -> PredicateId {
        let id = PredicateId(self.preds.len() as u32);
        self.preds.push(PredDef {
            name: name.to_string(),
            kind,
            instances: Vec::new(),
        });
        id
    }

    fn new_atom(&mut self, pred: PredicateId, name: &str, exprs: Vec<(String, ExprId)>) -> AtomId {
        let id = AtomId(self.atoms.len() as u64);
        let sigma = self.new_var();
        self.atoms.push(AtomDef {
            name: name.to_string(),
            pred,
            sigma,
            exprs,
        });
        self.preds[pred.0 as usize].instances.push(id);
        self.names.insert(name.to_string(), id);
        self.pending_flaws.push(id);
        id
    }

    fn new_expr(&mut self, def: ExprDef) -> ExprId {
        let id = ExprId(self.exprs.len() as u64);
        self.exprs.push(def);
        id
    }

    fn new_lin(&mut self, lb: InfRational) -> LinVar {
        let id = LinVar(self.lin.len() as u32);
        self.lin.push(LinState {
            lb,
            ub: InfRational::PosInf,
        });
        id
    }

    fn new_var(&mut self) -> Var {
        let var = self.values.len() as Var;
        self.values.push(Truth::Undefined);
        var
    }

    fn current_level(&self) -> usize {
        self.level_marks.len()
    }

    fn enqueue(&mut self, lit: Lit) {
        debug_assert_eq!(self.lit_value(lit), Truth::Undefined);
        self.values[lit.var() as usize] = if lit.is_positive() {
            Truth::True
        } else {
            Truth::False
        };
        self.trail.push(lit);

        // an allowed candidate excludes its siblings
        if lit.is_positive() {
            if let Some((ov, chosen)) = self.allow_index.get(&lit.var()).copied() {
                let siblings: Vec<Lit> = self.ovs[ov]
                    .allows
                    .iter()
                    .enumerate()
                    .filter(|(idx, allow)| {
                        *idx != chosen && self.lit_value(**allow) == Truth::Undefined
                    })
                    .map(|(_, allow)| !*allow)
                    .collect();
                for sibling in siblings {
                    self.enqueue(sibling);
                }
            }
        }
    }

    fn clause_status(&self, ci: usize) -> ClauseStatus {
        let mut unit = None;
        let mut undefined = 0;
        for &lit in &self.clauses[ci] {
            match self.lit_value(lit) {
                Truth::True => return ClauseStatus::Satisfied,
                Truth::Undefined => {
                    undefined += 1;
                    unit = Some(lit);
                }
                Truth::False => {}
            }
        }
        match (undefined, unit) {
            (0, _) => ClauseStatus::Falsified,
            (1, Some(lit)) => ClauseStatus::Unit(lit),
            _ => ClauseStatus::Open,
        }
    }

    fn propagate_internal(&mut self, plugin: &mut dyn SolverPlugin) -> bool {
        loop {
            // route newly assigned bound variables to the plugin
            while self.qhead < self.trail.len() {
                let lit = self.trail[self.qhead];
                self.qhead += 1;
                if self.bound_vars.contains(&lit.var()) {
                    match plugin.on_propagate(self, lit) {
                        Propagation::Consistent => {}
                        Propagation::Conflict(conflict) => {
                            self.last_conflict = conflict;
                            return false;
                        }
                    }
                }
            }

            // naive unit scan over every clause
            let mut assigned = false;
            for ci in 0..self.clauses.len() {
                match self.clause_status(ci) {
                    ClauseStatus::Satisfied | ClauseStatus::Open => {}
                    ClauseStatus::Unit(lit) => {
                        self.enqueue(lit);
                        assigned = true;
                    }
                    ClauseStatus::Falsified => {
                        self.last_conflict = self.clauses[ci].clone();
                        return false;
                    }
                }
            }
            if !assigned && self.qhead >= self.trail.len() {
                return true;
            }
        }
    }

    fn push_level_internal(&mut self, plugin: &mut dyn SolverPlugin) {
        self.level_marks.push(self.trail.len());
        plugin.on_push();
    }

    fn pop_level_internal(&mut self, plugin: &mut dyn SolverPlugin) {
        let Some(mark) = self.level_marks.pop() else {
            return;
        };
        let popped_level = self.level_marks.len() + 1;
        while self.trail.len() > mark {
            if let Some(lit) = self.trail.pop() {
                self.values[lit.var() as usize] = Truth::Undefined;
            }
        }
        loop {
            let restorable = matches!(self.lin_trail.last(), Some(e) if e.level >= popped_level);
            if !restorable {
                break;
            }
            if let Some(entry) = self.lin_trail.pop() {
                self.lin[entry.var].lb = entry.lb;
                self.lin[entry.var].ub = entry.ub;
            }
        }
        self.qhead = self.trail.len();
        plugin.on_pop();
    }

    fn save_lin(&mut self, var: LinVar) {
        let level = self.current_level();
        if level == 0 {
            return;
        }
        let state = self.lin[var.0 as usize];
        self.lin_trail.push(LinUndo {
            level,
            var: var.0 as usize,
            lb: state.lb,
            ub: state.ub,
        });
    }

    /// Which atoms the next solution activates: every ungrouped atom plus,
    /// per alternative group, the first member not refuted at root.
    fn choose_active(&self) -> Option<Vec<bool>> {
        let mut active = vec![false; self.atoms.len()];
        for (idx, atom) in self.atoms.iter().enumerate() {
            if self.grouped.contains(&AtomId(idx as u64)) {
                continue;
            }
            if self.var_value(atom.sigma) == Truth::False {
                return None;
            }
            active[idx] = true;
        }
        for group in &self.groups {
            let pick = group
                .iter()
                .find(|a| self.var_value(self.atoms[a.0 as usize].sigma) != Truth::False)?;
            active[pick.0 as usize] = true;
        }
        Some(active)
    }

    fn refresh_horizon(&mut self) {
        let mut horizon = self
            .explicit_horizon
            .map(InfRational::from)
            .unwrap_or_else(|| InfRational::from(0));
        for atom in &self.atoms {
            if self.values[atom.sigma as usize] != Truth::True {
                continue;
            }
            let end_name = match self.preds[atom.pred.0 as usize].kind {
                Some(AtomKind::Impulse) => "at",
                Some(AtomKind::Interval) => "end",
                None => continue,
            };
            if let Some((_, expr)) = atom.exprs.iter().find(|(name, _)| name == end_name) {
                let end = self.arith_value(*expr);
                if end > horizon {
                    horizon = end;
                }
            }
        }
        let var = self.horizon_var.0 as usize;
        self.lin[var].lb = horizon;
        self.lin[var].ub = horizon;
    }

    fn apply(&mut self, directives: Vec<Directive>) -> Result<(), ExecutionError> {
        for directive in directives {
            match directive {
                Directive::Impulse { name, at } => {
                    if self.names.contains_key(&name) {
                        return Err(ExecutionError::InvalidScript(format!(
                            "duplicate atom '{name}'"
                        )));
                    }
                    self.add_impulse(&name, at);
                }
                Directive::Interval { name, start, end } => {
                    if self.names.contains_key(&name) {
                        return Err(ExecutionError::InvalidScript(format!(
                            "duplicate atom '{name}'"
                        )));
                    }
                    self.add_interval(&name, start, end);
                }
                Directive::Horizon(at) => self.set_horizon(at),
            }
        }
        Ok(())
    }
}

impl Default for SimSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SolverOps for SimSolver {
    fn new_sat_var(&mut self) -> Var {
        self.new_var()
    }

    fn new_clause(&mut self, lits: &[Lit]) -> bool {
        let consistent = !self.root_level()
            || lits
                .iter()
                .any(|lit| self.lit_value(*lit) != Truth::False);
        self.clauses.push(lits.to_vec());
        consistent
    }

    fn lit_value(&self, l: Lit) -> Truth {
        let value = self.values[l.var() as usize];
        if l.is_positive() {
            value
        } else {
            value.negated()
        }
    }

    fn root_level(&self) -> bool {
        self.level_marks.is_empty()
    }

    fn bind(&mut self, v: Var) {
        self.bound_vars.insert(v);
    }

    fn record(&mut self, lits: &[Lit]) {
        self.clauses.push(lits.to_vec());
    }

    fn take_theory_conflict(&mut self) -> Vec<Lit> {
        std::mem::take(&mut self.theory_conflict)
    }

    fn atom_sigma(&self, atom: AtomId) -> Lit {
        Lit::positive(self.atoms[atom.0 as usize].sigma)
    }

    fn atom_kind(&self, atom: AtomId) -> Option<AtomKind> {
        let pred = self.atoms[atom.0 as usize].pred;
        self.preds[pred.0 as usize].kind
    }

    fn atom_expr(&self, atom: AtomId, name: &str) -> Option<ExprId> {
        self.atoms[atom.0 as usize]
            .exprs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, expr)| *expr)
    }

    fn atom_exprs(&self, atom: AtomId) -> Vec<(String, ExprId)> {
        self.atoms[atom.0 as usize].exprs.clone()
    }

    fn predicates(&self) -> Vec<PredicateId> {
        self.top_preds.clone()
    }

    fn predicate_kind(&self, pred: PredicateId) -> Option<AtomKind> {
        self.preds[pred.0 as usize].kind
    }

    fn predicate_instances(&self, pred: PredicateId) -> Vec<AtomId> {
        self.preds[pred.0 as usize].instances.clone()
    }

    fn types(&self) -> Vec<TypeId> {
        self.top_types.clone()
    }

    fn type_members(&self, ty: TypeId) -> Vec<TypeId> {
        self.types[ty.0 as usize].members.clone()
    }

    fn type_predicates(&self, ty: TypeId) -> Vec<PredicateId> {
        self.types[ty.0 as usize].preds.clone()
    }

    fn expr_shape(&self, expr: ExprId) -> ExprShape {
        match self.exprs[expr.0 as usize] {
            ExprDef::Bool { lit, .. } => ExprShape::Bool { lit },
            ExprDef::Lin { .. } | ExprDef::Const { .. } => ExprShape::Arith { real: true },
            ExprDef::Int { .. } => ExprShape::Arith { real: false },
            ExprDef::Enum { var } => ExprShape::Enum { var },
        }
    }

    fn is_constant(&self, expr: ExprId) -> bool {
        matches!(self.exprs[expr.0 as usize], ExprDef::Const { .. })
    }

    fn arith_value(&self, expr: ExprId) -> InfRational {
        match self.exprs[expr.0 as usize] {
            ExprDef::Lin { var } => self.lin[var.0 as usize].lb,
            ExprDef::Const { value } => InfRational::from(value),
            ExprDef::Int { value } => InfRational::from(value),
            ExprDef::Bool { .. } | ExprDef::Enum { .. } => {
                debug_assert!(false, "expression is not arithmetic");
                InfRational::from(0)
            }
        }
    }

    fn arith_bounds(&self, expr: ExprId) -> ArithBounds {
        match self.exprs[expr.0 as usize] {
            ExprDef::Lin { var } => {
                let state = self.lin[var.0 as usize];
                (state.lb, state.ub)
            }
            _ => {
                let value = self.arith_value(expr);
                (value, value)
            }
        }
    }

    fn horizon(&self) -> Option<ExprId> {
        Some(self.horizon_expr)
    }

    fn lin_var(&mut self, expr: ExprId) -> LinVar {
        match self.exprs[expr.0 as usize] {
            ExprDef::Lin { var } => var,
            _ => {
                debug_assert!(false, "expression has no linear variable");
                LinVar(0)
            }
        }
    }

    fn lin_value(&self, v: LinVar) -> InfRational {
        self.lin[v.0 as usize].lb
    }

    fn lin_set_lb(&mut self, v: LinVar, lb: InfRational, reason: Lit) -> bool {
        let state = self.lin[v.0 as usize];
        if lb <= state.lb {
            return true;
        }
        if lb > state.ub {
            self.theory_conflict = vec![!reason];
            return false;
        }
        self.save_lin(v);
        self.lin[v.0 as usize].lb = lb;
        true
    }

    fn lin_set_ub(&mut self, v: LinVar, ub: InfRational, reason: Lit) -> bool {
        let state = self.lin[v.0 as usize];
        if ub >= state.ub {
            return true;
        }
        if ub < state.lb {
            self.theory_conflict = vec![!reason];
            return false;
        }
        self.save_lin(v);
        self.lin[v.0 as usize].ub = ub;
        true
    }

    fn lin_set(&mut self, v: LinVar, value: InfRational, reason: Lit) -> bool {
        self.lin_set_lb(v, value, reason) && self.lin_set_ub(v, value, reason)
    }

    fn ov_value(&self, v: OvVar) -> Vec<ValueRef> {
        let state = &self.ovs[v.0 as usize];
        let chosen: Vec<ValueRef> = state
            .candidates
            .iter()
            .zip(&state.allows)
            .filter(|(_, allow)| self.lit_value(**allow) == Truth::True)
            .map(|(value, _)| *value)
            .collect();
        if !chosen.is_empty() {
            return chosen;
        }
        state
            .candidates
            .iter()
            .zip(&state.allows)
            .filter(|(_, allow)| self.lit_value(**allow) != Truth::False)
            .map(|(value, _)| *value)
            .collect()
    }

    fn ov_allows(&mut self, v: OvVar, value: ValueRef) -> Lit {
        let state = &self.ovs[v.0 as usize];
        if let Some(idx) = state.candidates.iter().position(|c| *c == value) {
            return state.allows[idx];
        }
        // a value outside the domain is never allowed
        if let Some(lit) = self.foreign_allows.get(&(v, value)) {
            return *lit;
        }
        let lit = Lit::positive(self.new_var());
        self.clauses.push(vec![!lit]);
        self.foreign_allows.insert((v, value), lit);
        lit
    }
}

impl Solver for SimSolver {
    fn propagate(&mut self, plugin: &mut dyn SolverPlugin) -> bool {
        self.propagate_internal(plugin)
    }

    fn take_decision(
        &mut self,
        l: Lit,
        plugin: &mut dyn SolverPlugin,
    ) -> Result<bool, ExecutionError> {
        match self.lit_value(l) {
            Truth::True => return Ok(true),
            Truth::False => return Ok(false),
            Truth::Undefined => {}
        }
        self.push_level_internal(plugin);
        self.enqueue(l);
        if !self.propagate_internal(plugin) {
            // the decision refuted itself; pin the opposite below it
            self.pop_level_internal(plugin);
            self.clauses.push(vec![!l]);
            let _ = self.propagate_internal(plugin);
            return Ok(false);
        }
        Ok(true)
    }

    fn pop_level(&mut self, plugin: &mut dyn SolverPlugin) {
        self.pop_level_internal(plugin);
    }

    fn solve(&mut self, plugin: &mut dyn SolverPlugin) -> Result<bool, ExecutionError> {
        tracing::debug!(atoms = self.atoms.len(), "solving");
        plugin.on_started_solving(self);
        let pending = std::mem::take(&mut self.pending_flaws);
        for atom in pending {
            plugin.on_flaw_created(self, atom);
        }

        // search restarts from the root
        while !self.root_level() {
            self.pop_level_internal(plugin);
        }
        if !self.propagate_internal(plugin) {
            plugin.on_inconsistent_problem(self);
            return Ok(false);
        }
        let Some(active) = self.choose_active() else {
            plugin.on_inconsistent_problem(self);
            return Ok(false);
        };

        self.push_level_internal(plugin);
        let activations: Vec<Lit> = self
            .atoms
            .iter()
            .enumerate()
            .map(|(idx, atom)| {
                if active[idx] {
                    Lit::positive(atom.sigma)
                } else {
                    Lit::negative(atom.sigma)
                }
            })
            .collect();
        for lit in activations {
            if self.lit_value(lit) == Truth::Undefined {
                self.enqueue(lit);
            }
        }

        // give free parameters of active atoms their preferred values
        let mut defaults = Vec::new();
        let mut undecided = Vec::new();
        for (idx, atom) in self.atoms.iter().enumerate() {
            if !active[idx] {
                continue;
            }
            for (_, expr) in &atom.exprs {
                match self.exprs[expr.0 as usize] {
                    ExprDef::Bool { lit, default } => {
                        defaults.push(if default { lit } else { !lit });
                    }
                    ExprDef::Enum { var } => undecided.push(var),
                    _ => {}
                }
            }
        }
        for lit in defaults {
            if self.lit_value(lit) == Truth::Undefined {
                self.enqueue(lit);
            }
        }
        for var in undecided {
            let remaining = self.ov_value(var);
            if remaining.len() > 1 {
                let allow = self.ov_allows(var, remaining[0]);
                if self.lit_value(allow) == Truth::Undefined {
                    self.enqueue(allow);
                }
            }
        }

        if !self.propagate_internal(plugin) {
            plugin.on_inconsistent_problem(self);
            return Ok(false);
        }
        self.refresh_horizon();
        plugin.on_solution_found(self)?;
        Ok(true)
    }

    fn read_script(
        &mut self,
        script: &str,
        plugin: &mut dyn SolverPlugin,
    ) -> Result<(), ExecutionError> {
        let directives = script::parse(script)?;
        self.apply(directives)?;
        plugin.on_read(self);
        Ok(())
    }

    fn read_files(
        &mut self,
        files: &[String],
        plugin: &mut dyn SolverPlugin,
    ) -> Result<(), ExecutionError> {
        for path in files {
            let contents = std::fs::read_to_string(path)
                .map_err(|err| ExecutionError::InvalidScript(format!("{path}: {err}")))?;
            let directives = script::parse(&contents)?;
            self.apply(directives)?;
        }
        plugin.on_read(self);
        Ok(())
    }

    fn analyze_and_backjump(&mut self, conflict: &[Lit], plugin: &mut dyn SolverPlugin) -> bool {
        if self.root_level() {
            return false;
        }
        while !self.root_level() {
            self.pop_level_internal(plugin);
        }
        self.clauses.push(conflict.to_vec());
        self.propagate_internal(plugin)
    }
}
