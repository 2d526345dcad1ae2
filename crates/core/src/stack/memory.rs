use super::{FrameStack, StackError};

/// In-memory stack backed by a `Vec`
#[derive(Debug, Clone)]
pub struct MemoryStack<T> {
    items: Vec<T>,
}

impl<T> MemoryStack<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Whether `item` is currently anywhere on the stack
    ///
    /// Linear scan; only the build phase's cycle heuristic uses it.
    pub fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.items.contains(item)
    }
}

impl<T> Default for MemoryStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FrameStack<T> for MemoryStack<T> {
    fn push(&mut self, item: T) -> Result<(), StackError> {
        self.items.push(item);
        Ok(())
    }

    fn pop(&mut self) -> Result<T, StackError> {
        self.items.pop().ok_or(StackError::Empty)
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn clear(&mut self) -> Result<(), StackError> {
        self.items.clear();
        Ok(())
    }
}
