//! This module contains the implementation of the operand stack that is part
//! of every program state.

use std::hash::{Hash, Hasher};

use rpds::List;

use crate::{error::execution::Error, value::SymbolicValue};

/// The representation of the symbolic operand stack.
///
/// The stack is persistent: every operation returns a new stack that shares
/// its unchanged frames with the old one, so that states can be forked
/// without copying.
///
/// # Indexing
///
/// Indexing into this stack is zero-based, where frame 0 is the top stack
/// frame.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Stack {
    data: List<SymbolicValue>,
}

impl Stack {
    /// Creates a new stack without any items on it.
    #[must_use]
    pub fn new() -> Self {
        let data = List::new();
        Self { data }
    }

    /// Pushes the provided value onto the top of the stack.
    #[must_use]
    pub fn push(&self, value: SymbolicValue) -> Self {
        let data = self.data.push_front(value);
        Self { data }
    }

    /// Pops the top value from the stack.
    ///
    /// # Errors
    ///
    /// If the stack has no item to pop.
    pub fn pop(&self) -> Result<(Self, SymbolicValue), Error> {
        let value = self.read(0)?.clone();
        let data = self
            .data
            .drop_first()
            .ok_or(Error::NoSuchStackFrame { depth: 0 })?;
        Ok((Self { data }, value))
    }

    /// Pops the top `count` values from the stack.
    ///
    /// The values are returned in the order in which they were pushed, so the
    /// value that was on top of the stack comes last.
    ///
    /// # Errors
    ///
    /// If the stack holds fewer than `count` items.
    pub fn pop_many(&self, count: usize) -> Result<(Self, Vec<SymbolicValue>), Error> {
        if count > self.size() {
            return Err(Error::NoSuchStackFrame { depth: count - 1 });
        }

        let mut stack = self.clone();
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            let (rest, value) = stack.pop()?;
            values.push(value);
            stack = rest;
        }
        values.reverse();

        Ok((stack, values))
    }

    /// Reads from the stack frame at the provided `depth`.
    ///
    /// # Errors
    ///
    /// If `depth` does not exist in the stack.
    pub fn read(&self, depth: usize) -> Result<&SymbolicValue, Error> {
        self.data
            .iter()
            .nth(depth)
            .ok_or(Error::NoSuchStackFrame { depth })
    }

    /// Gets the current size of the stack.
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Checks if the stack is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Iterates over the stack from the top frame downwards.
    pub fn iter(&self) -> impl Iterator<Item = &SymbolicValue> {
        self.data.iter()
    }
}

impl Hash for Stack {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.size().hash(state);
        for value in self.iter() {
            value.hash(state);
        }
    }
}

#[cfg(test)]
mod test {
    use crate::{error::execution::Error, state::stack::Stack, value::SymbolicValue};

    /// Constructs a new stack with `item_count` fresh items pushed onto it.
    fn new_stack_with_items(item_count: usize) -> Stack {
        (0..item_count).fold(Stack::new(), |stack, _| stack.push(SymbolicValue::fresh()))
    }

    #[test]
    fn can_construct_new_stack() {
        let stack = Stack::new();
        assert_eq!(stack.size(), 0);
        assert!(stack.is_empty());
    }

    #[test]
    fn pushing_leaves_the_original_untouched() {
        let stack = new_stack_with_items(2);
        let pushed = stack.push(SymbolicValue::null());
        assert_eq!(stack.size(), 2);
        assert_eq!(pushed.size(), 3);
    }

    #[test]
    fn can_pop_item() -> anyhow::Result<()> {
        let value = SymbolicValue::fresh();
        let stack = new_stack_with_items(1).push(value.clone());
        let (rest, popped) = stack.pop()?;

        assert_eq!(popped, value);
        assert_eq!(rest.size(), 1);

        Ok(())
    }

    #[test]
    fn cannot_pop_item_when_empty() {
        let stack = Stack::default();
        assert_eq!(
            stack.pop().expect_err("Did not error when popping empty stack"),
            Error::NoSuchStackFrame { depth: 0 }
        );
    }

    #[test]
    fn pop_many_returns_values_in_push_order() -> anyhow::Result<()> {
        let first = SymbolicValue::fresh();
        let second = SymbolicValue::fresh();
        let stack = Stack::new().push(first.clone()).push(second.clone());
        let (rest, values) = stack.pop_many(2)?;

        assert!(rest.is_empty());
        assert_eq!(values, vec![first, second]);

        Ok(())
    }

    #[test]
    fn cannot_pop_more_than_is_present() {
        let stack = new_stack_with_items(2);
        stack
            .pop_many(3)
            .expect_err("Popped more items than the stack holds");
    }

    #[test]
    fn can_read_item_at_depth() -> anyhow::Result<()> {
        let stack = new_stack_with_items(10);
        stack.read(7)?;

        Ok(())
    }

    #[test]
    fn cannot_read_item_at_invalid_depth() {
        let stack = new_stack_with_items(10);
        stack
            .read(11)
            .expect_err("Read an item at a depth that doesn't exist");
    }
}
