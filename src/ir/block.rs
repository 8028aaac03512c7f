use crate::ir::value::{BlockId, ValueId};

/// An ordered list of instructions ending in exactly one terminator.
/// Instructions are referenced by id into the owning `Function`'s value
/// arena, so a block is cheap to reorder, clone, or splice.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: BlockId,
    pub name: Option<String>,
    pub insts: Vec<ValueId>,
}

impl BasicBlock {
    #[must_use]
    pub fn new(id: BlockId, name: impl Into<Option<String>>) -> Self {
        Self {
            id,
            name: name.into(),
            insts: Vec::new(),
        }
    }

    #[must_use]
    pub fn terminator_id(&self) -> Option<ValueId> {
        self.insts.last().copied()
    }

    pub fn push(&mut self, id: ValueId) {
        self.insts.push(id);
    }
}
