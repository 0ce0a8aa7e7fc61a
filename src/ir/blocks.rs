//! Block structure recovered from a flat expression list.
//!
//! Expressions between an `if` and its `else` (or `endif`, when there is
//! no `else`) belong to the true branch; expressions between `else` and
//! `endif` belong to the false branch. Each branch is a scope; the markers
//! themselves belong to the enclosing scope.

use std::collections::HashMap;

use super::{Expr, ExprKind, GraphError};

/// One matched `if` / `else` / `endif` triple, as positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub open: usize,
    pub else_pos: Option<usize>,
    pub close: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Then,
    Else,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

impl ScopeId {
    pub const ROOT: ScopeId = ScopeId(0);

    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct Scope {
    parent: Option<ScopeId>,
    /// Block and branch this scope is the body of. `None` for the root.
    owner: Option<(usize, Branch)>,
    depth: usize,
}

#[derive(Debug, Clone)]
pub struct BlockMap {
    blocks: Vec<Block>,
    scopes: Vec<Scope>,
    scope_of: Vec<ScopeId>,
    marker_block: HashMap<usize, usize>,
}

impl BlockMap {
    /// Match every control marker in one linear scan.
    pub fn build(exprs: &[Expr]) -> Result<Self, GraphError> {
        let mut map = BlockMap {
            blocks: Vec::new(),
            scopes: vec![Scope {
                parent: None,
                owner: None,
                depth: 0,
            }],
            scope_of: Vec::with_capacity(exprs.len()),
            marker_block: HashMap::new(),
        };
        let mut open: Vec<usize> = Vec::new();
        let mut current = ScopeId::ROOT;

        for (pos, expr) in exprs.iter().enumerate() {
            match expr.kind() {
                ExprKind::If => {
                    map.scope_of.push(current);
                    let block = map.blocks.len();
                    map.blocks.push(Block {
                        open: pos,
                        else_pos: None,
                        close: pos,
                    });
                    map.marker_block.insert(pos, block);
                    open.push(block);
                    current = map.push_scope(current, block, Branch::Then);
                }
                ExprKind::Else => {
                    let Some(&block) = open.last() else {
                        return Err(GraphError::UnmatchedElse { position: pos });
                    };
                    if map.blocks[block].else_pos.is_some() {
                        return Err(GraphError::DuplicateElse {
                            position: pos,
                            open: map.blocks[block].open,
                        });
                    }
                    let outer = map.parent(current);
                    map.scope_of.push(outer);
                    map.blocks[block].else_pos = Some(pos);
                    map.marker_block.insert(pos, block);
                    current = map.push_scope(outer, block, Branch::Else);
                }
                ExprKind::EndIf => {
                    let Some(block) = open.pop() else {
                        return Err(GraphError::UnmatchedEndIf { position: pos });
                    };
                    let outer = map.parent(current);
                    map.scope_of.push(outer);
                    map.blocks[block].close = pos;
                    map.marker_block.insert(pos, block);
                    current = outer;
                }
                _ => map.scope_of.push(current),
            }
        }

        if let Some(&block) = open.last() {
            return Err(GraphError::UnclosedIf {
                position: map.blocks[block].open,
            });
        }
        Ok(map)
    }

    fn push_scope(&mut self, parent: ScopeId, block: usize, branch: Branch) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        let depth = self.scopes[parent.index()].depth + 1;
        self.scopes.push(Scope {
            parent: Some(parent),
            owner: Some((block, branch)),
            depth,
        });
        id
    }

    fn parent(&self, scope: ScopeId) -> ScopeId {
        self.scopes[scope.index()].parent.unwrap_or(ScopeId::ROOT)
    }

    /// All blocks, ordered by their `if` position.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// The block a control marker at `pos` belongs to.
    pub fn block_at_marker(&self, pos: usize) -> Option<&Block> {
        self.marker_block.get(&pos).map(|&b| &self.blocks[b])
    }

    /// The innermost block containing `pos`, markers included.
    pub fn containing_block(&self, pos: usize) -> Option<&Block> {
        if let Some(block) = self.block_at_marker(pos) {
            return Some(block);
        }
        self.branch_of(pos).map(|(block, _)| block)
    }

    /// The innermost branch `pos` executes in. `None` at the top level and
    /// for top-level markers.
    pub fn branch_of(&self, pos: usize) -> Option<(&Block, Branch)> {
        let scope = self.scope_of.get(pos)?;
        self.scopes[scope.index()]
            .owner
            .map(|(block, branch)| (&self.blocks[block], branch))
    }

    pub fn scope_of(&self, pos: usize) -> ScopeId {
        self.scope_of.get(pos).copied().unwrap_or(ScopeId::ROOT)
    }

    /// Nesting depth of `pos`: 0 at the top level.
    pub fn depth(&self, pos: usize) -> usize {
        self.scopes[self.scope_of(pos).index()].depth
    }

    /// True if a value defined in scope `def` can be read from scope `at`,
    /// i.e. `def` is `at` or one of its ancestors.
    pub fn is_visible(&self, def: ScopeId, at: ScopeId) -> bool {
        let mut scope = Some(at);
        while let Some(s) = scope {
            if s == def {
                return true;
            }
            scope = self.scopes[s.index()].parent;
        }
        false
    }
}
