use std::collections::HashMap;

use bitflags::bitflags;

use crate::ir::block::BasicBlock;
use crate::ir::inst::{InstKind, Instruction};
use crate::ir::metadata::MetadataNode;
use crate::ir::ty::{Signature, Type};
use crate::ir::value::{BlockId, Value, ValueId};

/// Linkage of a function. Only the two kinds spec.md's invariants care
/// about: a function is only ever transformed if it's `Internal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    Internal,
    External,
}

bitflags! {
    /// The slice of LLVM function attributes this system inspects or
    /// manipulates (function-merge strips the full set during cloning and
    /// restores it afterward; nothing else here reads individual bits, but
    /// a bitflags set is how the teacher models this kind of attribute
    /// collection and it generalizes past a single linkage enum).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FunctionAttrs: u32 {
        const NO_INLINE      = 0b0001;
        const OPTIMIZE_NONE  = 0b0010;
        const NO_RETURN      = 0b0100;
    }
}

/// Arena-owned body of a function: a monotonically-allocated instruction
/// table and the block-to-instruction-list layout over it. Passes hold
/// `ValueId`/`BlockId` handles into this arena rather than owning pointers,
/// per spec.md's arena-ownership design note.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub linkage: Linkage,
    pub sig: Signature,
    pub attrs: FunctionAttrs,
    /// Layout order of blocks; first entry is the entry block.
    pub block_order: Vec<BlockId>,
    blocks: HashMap<BlockId, BasicBlock>,
    insts: HashMap<ValueId, Instruction>,
    next_value: u32,
    next_block: u32,
    pub metadata: HashMap<&'static str, MetadataNode>,
}

impl Function {
    #[must_use]
    pub fn new(name: impl Into<String>, sig: Signature, linkage: Linkage) -> Self {
        Self {
            name: name.into(),
            linkage,
            sig,
            attrs: FunctionAttrs::empty(),
            block_order: Vec::new(),
            blocks: HashMap::new(),
            insts: HashMap::new(),
            next_value: 0,
            next_block: 0,
            metadata: HashMap::new(),
        }
    }

    #[must_use]
    pub fn is_internal(&self) -> bool {
        self.linkage == Linkage::Internal
    }

    #[must_use]
    pub fn is_definition(&self) -> bool {
        !self.block_order.is_empty()
    }

    #[must_use]
    pub fn entry_block(&self) -> Option<BlockId> {
        self.block_order.first().copied()
    }

    /// Creates a new, empty block and appends it at the end of the layout.
    pub fn append_block(&mut self, name: impl Into<Option<String>>) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        self.blocks.insert(id, BasicBlock::new(id, name));
        self.block_order.push(id);
        id
    }

    /// Inserts a new, empty block immediately before `before` in the layout.
    pub fn insert_block_before(&mut self, before: BlockId, name: impl Into<Option<String>>) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        self.blocks.insert(id, BasicBlock::new(id, name));
        let idx = self
            .block_order
            .iter()
            .position(|b| *b == before)
            .expect("before block must exist in this function");
        self.block_order.insert(idx, id);
        id
    }

    #[must_use]
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        self.blocks.get(&id).expect("unknown block id")
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        self.blocks.get_mut(&id).expect("unknown block id")
    }

    #[must_use]
    pub fn blocks_in_order(&self) -> impl Iterator<Item = &BasicBlock> {
        self.block_order.iter().map(move |id| self.block(*id))
    }

    /// Appends a fresh instruction at the end of `block` and returns its id.
    pub fn push_inst(&mut self, block: BlockId, ty: Type, kind: InstKind) -> ValueId {
        let id = ValueId(self.next_value);
        self.next_value += 1;
        self.insts.insert(id, Instruction { id, ty, kind });
        self.block_mut(block).push(id);
        id
    }

    /// Inserts a fresh instruction at `index` within `block`'s instruction
    /// list (used to splice logic before an existing terminator).
    pub fn insert_inst_at(&mut self, block: BlockId, index: usize, ty: Type, kind: InstKind) -> ValueId {
        let id = ValueId(self.next_value);
        self.next_value += 1;
        self.insts.insert(id, Instruction { id, ty, kind });
        self.block_mut(block).insts.insert(index, id);
        id
    }

    /// Allocates a `ValueId` without attaching an instruction yet. Used by
    /// `ir::clone` to pre-populate a value map before remapping operands,
    /// so forward references across cloned blocks (a `phi` incoming from a
    /// loop back-edge, say) resolve correctly.
    pub fn reserve_value(&mut self) -> ValueId {
        let id = ValueId(self.next_value);
        self.next_value += 1;
        id
    }

    /// Attaches the instruction body to a previously `reserve_value`d id
    /// and appends it to `block`.
    pub fn define_reserved(&mut self, id: ValueId, block: BlockId, ty: Type, kind: InstKind) {
        self.insts.insert(id, Instruction { id, ty, kind });
        self.block_mut(block).push(id);
    }

    #[must_use]
    pub fn inst(&self, id: ValueId) -> &Instruction {
        self.insts.get(&id).expect("unknown value id")
    }

    pub fn inst_mut(&mut self, id: ValueId) -> &mut Instruction {
        self.insts.get_mut(&id).expect("unknown value id")
    }

    /// Which block a given instruction id currently lives in, if any.
    #[must_use]
    pub fn block_of(&self, id: ValueId) -> Option<BlockId> {
        self.block_order
            .iter()
            .copied()
            .find(|b| self.block(*b).insts.contains(&id))
    }

    /// Removes an instruction from its block's instruction list and from
    /// the arena. Does not rewrite remaining uses; callers must do that
    /// first (or know there are none).
    pub fn remove_inst(&mut self, id: ValueId) {
        if let Some(block) = self.block_of(id) {
            self.block_mut(block).insts.retain(|&i| i != id);
        }
        self.insts.remove(&id);
    }

    /// Removes a block entirely from the layout and arena. Does not touch
    /// other blocks' terminators; callers are responsible for reachability.
    pub fn remove_block(&mut self, id: BlockId) {
        self.block_order.retain(|&b| b != id);
        if let Some(block) = self.blocks.remove(&id) {
            for inst_id in block.insts {
                self.insts.remove(&inst_id);
            }
        }
    }

    /// Replaces every use of `old` across the whole function body with
    /// `new`. Linear in instruction count; acceptable at pass-boundary
    /// granularity for the functions this system targets.
    pub fn replace_all_uses(&mut self, old: ValueId, new: &Value) {
        for block_id in self.block_order.clone() {
            for inst_id in self.block(block_id).insts.clone() {
                for operand in self.inst_mut(inst_id).kind.operands_mut() {
                    if *operand == Value::Inst(old) {
                        *operand = new.clone();
                    }
                }
            }
        }
    }

    /// Every instruction whose result is used from a block other than its
    /// defining block. Alloca instructions in the entry block are excluded
    /// per spec.md §4.5 step 10 (they're already globally live, no demotion
    /// needed).
    #[must_use]
    pub fn values_used_outside_their_block(&self) -> Vec<ValueId> {
        let entry = self.entry_block();
        let mut out = Vec::new();

        for &def_block in &self.block_order {
            for &def_id in &self.block(def_block).insts {
                if entry == Some(def_block) && matches!(self.inst(def_id).kind, InstKind::Alloca { .. }) {
                    continue;
                }

                let used_elsewhere = self.block_order.iter().any(|&use_block| {
                    if use_block == def_block {
                        return false;
                    }
                    self.block(use_block).insts.iter().any(|&use_id| {
                        self.inst(use_id)
                            .kind
                            .operands()
                            .iter()
                            .any(|op| **op == Value::Inst(def_id))
                    })
                });

                if used_elsewhere {
                    out.push(def_id);
                }
            }
        }

        out
    }

    #[must_use]
    pub fn phi_nodes(&self) -> Vec<ValueId> {
        self.block_order
            .iter()
            .flat_map(|&b| self.block(b).insts.clone())
            .filter(|&id| matches!(self.inst(id).kind, InstKind::Phi { .. }))
            .collect()
    }

    /// Every block's terminator still transfers control to a block that
    /// exists in the layout, and every non-entry block has at least one
    /// predecessor. Used by tests to check the well-formedness invariants
    /// spec.md §3/§8 require every transformation to preserve.
    #[must_use]
    pub fn verify(&self) -> Result<(), String> {
        for &block_id in &self.block_order {
            let block = self.block(block_id);
            let Some(term_id) = block.terminator_id() else {
                return Err(format!("{block_id} has no instructions"));
            };
            if !self.inst(term_id).is_terminator() {
                return Err(format!("{block_id} does not end in a terminator"));
            }
            for succ in self.inst(term_id).kind.successors() {
                if !self.block_order.contains(&succ) {
                    return Err(format!("{block_id} branches to missing {succ}"));
                }
            }
        }

        let entry = self.entry_block();
        for &block_id in &self.block_order {
            if Some(block_id) == entry {
                continue;
            }
            let has_pred = self.block_order.iter().any(|&other| {
                self.inst(self.block(other).terminator_id().expect("checked above"))
                    .kind
                    .successors()
                    .contains(&block_id)
            });
            if !has_pred {
                return Err(format!("{block_id} is unreachable"));
            }
        }

        Ok(())
    }
}
