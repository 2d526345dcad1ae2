//! Explicit LIFO stacks that stand in for call-stack recursion
//!
//! Graph traversals in this crate never recurse. They push frames onto a
//! [`FrameStack`] and loop until it drains, so traversal depth is bounded by
//! memory (or disk) instead of the thread's native stack.
//!
//! Two interchangeable implementations exist:
//!
//! - [`MemoryStack`] keeps live values in a `Vec`.
//! - [`SpillStack`] serializes every frame into an anonymous scratch file and
//!   keeps only `(offset, length)` pairs in memory. The file is removed by
//!   the operating system as soon as the stack is dropped.
//!
//! Callers pick one through [`StackKind`] and only see the trait.

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub mod memory;
pub mod spill;

pub use memory::MemoryStack;
pub use spill::SpillStack;

/// Failure of a stack operation
#[derive(Debug, thiserror::Error)]
pub enum StackError {
    /// `pop` on a stack with no entries
    #[error("pop on an empty stack")]
    Empty,

    #[error("scratch file I/O failed")]
    Io(#[from] std::io::Error),

    #[error("frame could not be encoded or decoded")]
    Serialization(#[from] serde_json::Error),

    /// The scratch file returned fewer bytes than were recorded at push time
    #[error("scratch file returned {actual} bytes, expected {expected}")]
    ShortRead { expected: u64, actual: u64 },
}

/// LIFO frame store
pub trait FrameStack<T> {
    /// Push `item` on top of the stack
    fn push(&mut self, item: T) -> Result<(), StackError>;

    /// Remove and return the top item, or [`StackError::Empty`]
    fn pop(&mut self) -> Result<T, StackError>;

    fn is_empty(&self) -> bool;

    fn len(&self) -> usize;

    /// Drop every entry; the stack stays usable afterwards
    fn clear(&mut self) -> Result<(), StackError>;
}

/// Which [`FrameStack`] implementation a traversal should use
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StackKind {
    /// Frames stay in memory
    #[default]
    Memory,
    /// Frames spill to a scratch file, created in `scratch_dir` when given
    /// and in the system temporary directory otherwise
    Spill {
        #[serde(default)]
        scratch_dir: Option<PathBuf>,
    },
}

impl StackKind {
    /// Open an empty stack of this kind
    pub fn open<T>(&self) -> Result<Box<dyn FrameStack<T> + Send>, StackError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        match self {
            StackKind::Memory => Ok(Box::new(MemoryStack::new())),
            StackKind::Spill { scratch_dir: None } => Ok(Box::new(SpillStack::new()?)),
            StackKind::Spill {
                scratch_dir: Some(dir),
            } => Ok(Box::new(SpillStack::new_in(dir)?)),
        }
    }
}
