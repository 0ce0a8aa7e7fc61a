//! ExprGraph: the ordered expression store.
//!
//! Expressions live in a growable list addressed by position; variables
//! are addressed by `ExprId`, which maps to the position of the
//! expression that declared it. Capture appends, optimization rewrites in
//! place, and nothing is ever removed or renumbered, so every id stays
//! valid for the graph's whole lifetime.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use super::{BlockMap, Expr, ExprId, ExprKind, GraphError, ReturnKind};

#[derive(Debug, Clone, Copy)]
struct Declaration {
    position: usize,
    return_kind: ReturnKind,
    /// Output bindings are sinks: never read, never reassigned.
    output: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ExprGraph {
    exprs: Vec<Expr>,
    /// Indexed by `ExprId`.
    declarations: Vec<Declaration>,
    /// `if`s still open during capture: (position, else seen).
    open_blocks: Vec<(usize, bool)>,
}

impl ExprGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id the next declaration will receive.
    pub fn next_id(&self) -> ExprId {
        ExprId(self.declarations.len() as u32)
    }

    // ── Capture ───────────────────────────────────────────────────

    /// Append a prebuilt expression after checking it against the graph.
    ///
    /// Arguments must name already declared ids. A new arithmetic
    /// expression must use `next_id()` as its lhs, except for assignments,
    /// which may also target an existing variable of the same return kind.
    pub fn push(&mut self, expr: Expr) -> Result<Option<ExprId>, GraphError> {
        let position = self.exprs.len();
        let kind = expr.kind();

        for &arg in expr.arguments() {
            match self.declarations.get(arg.index()) {
                None => {
                    return Err(GraphError::ForwardReference {
                        position,
                        kind,
                        id: arg,
                    })
                }
                Some(d) if d.output => {
                    return Err(GraphError::OutputBinding {
                        position,
                        kind,
                        id: arg,
                    })
                }
                Some(_) => {}
            }
        }

        let mut declaration = None;
        if let Some(lhs) = expr.lhs() {
            let next = self.next_id();
            if lhs == next {
                declaration = Some(Declaration {
                    position,
                    return_kind: expr.return_kind(),
                    output: kind == ExprKind::Output,
                });
            } else if lhs > next {
                return Err(GraphError::UndeclaredTarget {
                    position,
                    kind,
                    id: lhs,
                });
            } else if kind == ExprKind::Assignment {
                let target = self.declarations[lhs.index()];
                if target.output {
                    return Err(GraphError::OutputBinding {
                        position,
                        kind,
                        id: lhs,
                    });
                }
                let expected = target.return_kind;
                if expected != expr.return_kind() {
                    return Err(GraphError::ReturnKindMismatch {
                        position,
                        kind,
                        id: lhs,
                        expected,
                        found: expr.return_kind(),
                    });
                }
            } else {
                return Err(GraphError::DuplicateDestination {
                    position,
                    kind,
                    id: lhs,
                    expected: next,
                });
            }
        }

        match kind {
            ExprKind::If => {
                let condition = expr.arguments()[0];
                let found = self.declarations[condition.index()].return_kind;
                if found != ReturnKind::Boolean {
                    return Err(GraphError::NonBooleanCondition {
                        position,
                        condition,
                        found,
                    });
                }
                self.open_blocks.push((position, false));
            }
            ExprKind::Else => match self.open_blocks.last_mut() {
                None => return Err(GraphError::UnmatchedElse { position }),
                Some((open, true)) => {
                    return Err(GraphError::DuplicateElse {
                        position,
                        open: *open,
                    })
                }
                Some(block) => block.1 = true,
            },
            ExprKind::EndIf => {
                if self.open_blocks.pop().is_none() {
                    return Err(GraphError::UnmatchedEndIf { position });
                }
            }
            _ => {}
        }

        if let Some(declaration) = declaration {
            self.declarations.push(declaration);
        }
        let lhs = expr.lhs();
        self.exprs.push(expr);
        Ok(lhs)
    }

    /// Append a leaf declaration. Leaves have no arguments and take the
    /// next id, so they cannot violate any structural rule.
    fn push_leaf(&mut self, make: impl FnOnce(ExprId) -> Expr) -> ExprId {
        let id = self.next_id();
        let expr = make(id);
        self.declarations.push(Declaration {
            position: self.exprs.len(),
            return_kind: expr.return_kind(),
            output: false,
        });
        self.exprs.push(expr);
        id
    }

    fn declare(&mut self, make: impl FnOnce(ExprId) -> Expr) -> Result<ExprId, GraphError> {
        let id = self.next_id();
        self.push(make(id))?;
        Ok(id)
    }

    fn source_kind(&self, source: ExprId, kind: ExprKind) -> Result<ReturnKind, GraphError> {
        self.declared_return_kind(source)
            .ok_or(GraphError::ForwardReference {
                position: self.exprs.len(),
                kind,
                id: source,
            })
    }

    pub fn constant(&mut self, value: f64) -> ExprId {
        self.push_leaf(|id| Expr::constant(id, value))
    }

    pub fn input(&mut self, name: &str) -> ExprId {
        self.push_leaf(|id| Expr::input(id, name))
    }

    pub fn output(&mut self, source: ExprId, name: &str) -> Result<ExprId, GraphError> {
        self.declare(|id| Expr::output(id, source, name))
    }

    /// Copy `source` into a new variable.
    pub fn assign(&mut self, source: ExprId) -> Result<ExprId, GraphError> {
        let return_kind = self.source_kind(source, ExprKind::Assignment)?;
        self.declare(|id| Expr::assignment(id, source, return_kind))
    }

    /// Overwrite the existing variable `target` with `source`.
    pub fn reassign(&mut self, target: ExprId, source: ExprId) -> Result<(), GraphError> {
        let return_kind = self.source_kind(source, ExprKind::Assignment)?;
        if target >= self.next_id() {
            return Err(GraphError::UndeclaredTarget {
                position: self.exprs.len(),
                kind: ExprKind::Assignment,
                id: target,
            });
        }
        self.push(Expr::assignment(target, source, return_kind))?;
        Ok(())
    }

    pub fn binary(&mut self, op: &str, left: ExprId, right: ExprId) -> Result<ExprId, GraphError> {
        self.declare(|id| Expr::binary(id, op, left, right))
    }

    pub fn unary(&mut self, op: &str, operand: ExprId) -> Result<ExprId, GraphError> {
        self.declare(|id| Expr::unary(id, op, operand))
    }

    pub fn compare(&mut self, op: &str, left: ExprId, right: ExprId) -> Result<ExprId, GraphError> {
        self.declare(|id| Expr::compare(id, op, left, right))
    }

    pub fn not(&mut self, operand: ExprId) -> Result<ExprId, GraphError> {
        self.declare(|id| Expr::not(id, operand))
    }

    pub fn call(&mut self, name: &str, args: &[ExprId]) -> Result<ExprId, GraphError> {
        self.declare(|id| Expr::scalar_call(id, name, args.to_vec()))
    }

    pub fn logical_call(&mut self, name: &str, args: &[ExprId]) -> Result<ExprId, GraphError> {
        self.declare(|id| Expr::logical_call(id, name, args.to_vec()))
    }

    pub fn if_(&mut self, condition: ExprId) -> Result<(), GraphError> {
        self.push(Expr::if_open(condition)).map(|_| ())
    }

    pub fn else_(&mut self) -> Result<(), GraphError> {
        self.push(Expr::if_else()).map(|_| ())
    }

    pub fn endif(&mut self) -> Result<(), GraphError> {
        self.push(Expr::if_close()).map(|_| ())
    }

    pub fn comment(&mut self, text: &str) {
        self.exprs.push(Expr::comment(text));
    }

    /// Number of `if`s opened during capture and not yet closed.
    pub fn open_depth(&self) -> usize {
        self.open_blocks.len()
    }

    /// Check that capture is complete and recover the block structure.
    pub fn validate(&self) -> Result<BlockMap, GraphError> {
        if let Some(&(position, _)) = self.open_blocks.first() {
            return Err(GraphError::UnclosedIf { position });
        }
        BlockMap::build(&self.exprs)
    }

    // ── Lookup ────────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    /// Number of ids handed out so far.
    pub fn num_ids(&self) -> usize {
        self.declarations.len()
    }

    pub fn exprs(&self) -> &[Expr] {
        &self.exprs
    }

    pub fn expr_at(&self, pos: usize) -> &Expr {
        &self.exprs[pos]
    }

    pub(crate) fn expr_at_mut(&mut self, pos: usize) -> &mut Expr {
        &mut self.exprs[pos]
    }

    /// The expression that declared `id`. After dead-code elimination this
    /// may be a `Nop` occupying the same slot.
    pub fn get(&self, id: ExprId) -> Option<&Expr> {
        self.position_of(id).map(|pos| &self.exprs[pos])
    }

    pub fn position_of(&self, id: ExprId) -> Option<usize> {
        self.declarations.get(id.index()).map(|d| d.position)
    }

    pub fn declared_return_kind(&self, id: ExprId) -> Option<ReturnKind> {
        self.declarations.get(id.index()).map(|d| d.return_kind)
    }

    /// True if the expression at `pos` is the one that declared its lhs.
    /// False for reassignments and for expressions without lhs.
    pub fn is_declaration(&self, pos: usize) -> bool {
        self.exprs[pos]
            .lhs()
            .and_then(|id| self.position_of(id))
            .is_some_and(|declared| declared == pos)
    }

    /// Non-nop expressions with their positions, in order.
    pub fn live(&self) -> impl Iterator<Item = (usize, &Expr)> + '_ {
        self.exprs.iter().enumerate().filter(|(_, e)| !e.is_nop())
    }

    /// Ids written by at least one reassignment.
    pub fn mutable_ids(&self) -> HashSet<ExprId> {
        self.exprs
            .iter()
            .enumerate()
            .filter(|(pos, e)| e.kind() == ExprKind::Assignment && !self.is_declaration(*pos))
            .filter_map(|(_, e)| e.lhs())
            .collect()
    }

    /// Positions of every expression writing `id`: its declaration and any
    /// reassignments.
    pub fn writers(&self, id: ExprId) -> Vec<usize> {
        self.live()
            .filter(|(_, e)| e.lhs() == Some(id))
            .map(|(pos, _)| pos)
            .collect()
    }

    /// Positions of every expression reading `id`.
    pub fn dependents(&self, id: ExprId) -> Vec<usize> {
        self.live()
            .filter(|(_, e)| e.directly_depends_on(id))
            .map(|(pos, _)| pos)
            .collect()
    }

    /// Direct dependencies of `id`: the arguments of all its writers.
    pub fn dependencies(&self, id: ExprId) -> BTreeSet<ExprId> {
        self.writers(id)
            .into_iter()
            .flat_map(|pos| self.exprs[pos].arguments().iter().copied())
            .collect()
    }

    /// Every id reachable from `roots` through the dependency relation,
    /// roots included.
    pub fn transitive_dependencies(
        &self,
        roots: impl IntoIterator<Item = ExprId>,
    ) -> HashSet<ExprId> {
        let mut writers: HashMap<ExprId, Vec<usize>> = HashMap::new();
        for (pos, expr) in self.live() {
            if let Some(lhs) = expr.lhs() {
                writers.entry(lhs).or_default().push(pos);
            }
        }

        let mut closure = HashSet::new();
        let mut work: Vec<ExprId> = roots.into_iter().collect();
        while let Some(id) = work.pop() {
            if !closure.insert(id) {
                continue;
            }
            for &pos in writers.get(&id).into_iter().flatten() {
                work.extend(
                    self.exprs[pos]
                        .arguments()
                        .iter()
                        .filter(|arg| !closure.contains(*arg)),
                );
            }
        }
        closure
    }
}

impl fmt::Display for ExprGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut depth = 0usize;
        for (pos, expr) in self.exprs.iter().enumerate() {
            if matches!(expr.kind(), ExprKind::Else | ExprKind::EndIf) {
                depth = depth.saturating_sub(1);
            }
            writeln!(f, "{:>4}: {}{}", pos, "  ".repeat(depth), expr)?;
            if matches!(expr.kind(), ExprKind::If | ExprKind::Else) {
                depth += 1;
            }
        }
        Ok(())
    }
}
