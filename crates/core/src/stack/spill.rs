use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{FrameStack, StackError};

/// Location of one serialized frame inside the scratch file
#[derive(Debug, Clone, Copy)]
struct Slot {
    offset: u64,
    len: u64,
}

/// Disk-backed stack
///
/// Each `push` appends the JSON encoding of the item to an anonymous scratch
/// file and records where it landed. `pop` reads the top record back. Space
/// of popped records is not reclaimed until [`FrameStack::clear`], which
/// truncates the file. The file has no name on disk and disappears when the
/// stack is dropped, on every exit path.
#[derive(Debug)]
pub struct SpillStack<T> {
    file: File,
    index: Vec<Slot>,
    end: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SpillStack<T> {
    /// Create a stack whose scratch file lives in the system temp directory
    pub fn new() -> Result<Self, StackError> {
        Ok(Self::with_file(tempfile::tempfile()?))
    }

    /// Create a stack whose scratch file lives in `dir`
    pub fn new_in(dir: &Path) -> Result<Self, StackError> {
        Ok(Self::with_file(tempfile::tempfile_in(dir)?))
    }

    fn with_file(file: File) -> Self {
        Self {
            file,
            index: Vec::new(),
            end: 0,
            _marker: PhantomData,
        }
    }

    /// Bytes written to the scratch file since creation or the last clear
    pub fn scratch_len(&self) -> u64 {
        self.end
    }
}

impl<T> FrameStack<T> for SpillStack<T>
where
    T: Serialize + DeserializeOwned,
{
    fn push(&mut self, item: T) -> Result<(), StackError> {
        let bytes = serde_json::to_vec(&item)?;
        let len = bytes.len() as u64;

        self.file.seek(SeekFrom::Start(self.end))?;
        self.file.write_all(&bytes)?;

        self.index.push(Slot {
            offset: self.end,
            len,
        });
        self.end += len;
        Ok(())
    }

    fn pop(&mut self) -> Result<T, StackError> {
        let slot = self.index.pop().ok_or(StackError::Empty)?;

        self.file.seek(SeekFrom::Start(slot.offset))?;
        let mut bytes = Vec::with_capacity(slot.len as usize);
        (&mut self.file).take(slot.len).read_to_end(&mut bytes)?;

        if bytes.len() as u64 != slot.len {
            return Err(StackError::ShortRead {
                expected: slot.len,
                actual: bytes.len() as u64,
            });
        }

        Ok(serde_json::from_slice(&bytes)?)
    }

    fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn clear(&mut self) -> Result<(), StackError> {
        self.index.clear();
        self.file.set_len(0)?;
        self.end = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        value: i32,
        desc: String,
        any: Option<i64>,
    }

    #[test]
    fn test_round_trips_structured_values() {
        let mut stack = SpillStack::new().unwrap();
        let first = Sample {
            value: 23,
            desc: "first".to_string(),
            any: Some(20),
        };
        let second = Sample {
            value: -1,
            desc: String::new(),
            any: None,
        };

        stack.push(first.clone()).unwrap();
        stack.push(second.clone()).unwrap();

        assert_eq!(stack.pop().unwrap(), second);
        assert_eq!(stack.pop().unwrap(), first);
        assert!(matches!(stack.pop(), Err(StackError::Empty)));
    }

    #[test]
    fn test_pop_does_not_reclaim_space() {
        let mut stack = SpillStack::new().unwrap();
        stack.push(vec![1u8, 2, 3]).unwrap();
        let written = stack.scratch_len();
        assert!(written > 0);

        stack.pop().unwrap();
        assert_eq!(stack.scratch_len(), written);

        // New frames go after the dead record
        stack.push(vec![4u8]).unwrap();
        assert!(stack.scratch_len() > written);
        assert_eq!(stack.pop().unwrap(), vec![4u8]);
    }

    #[test]
    fn test_clear_truncates_and_stays_usable() {
        let mut stack = SpillStack::new().unwrap();
        for i in 0..10u32 {
            stack.push(i).unwrap();
        }

        stack.clear().unwrap();
        assert!(stack.is_empty());
        assert_eq!(stack.scratch_len(), 0);

        stack.push(42u32).unwrap();
        assert_eq!(stack.pop().unwrap(), 42);
    }

    #[test]
    fn test_scratch_file_leaves_directory_clean() {
        let dir = tempfile::TempDir::new().unwrap();
        {
            let mut stack = SpillStack::new_in(dir.path()).unwrap();
            stack.push("frame".to_string()).unwrap();
        }

        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 0, "scratch file must not outlive the stack");
    }

    #[test]
    fn test_truncated_file_is_a_short_read() {
        let mut stack = SpillStack::new().unwrap();
        stack.push("a fairly long frame payload".to_string()).unwrap();

        // Simulate a scratch file that lost its tail
        stack.file.set_len(4).unwrap();

        match stack.pop() {
            Err(StackError::ShortRead { expected, actual }) => {
                assert_eq!(actual, 4);
                assert!(expected > actual);
            }
            other => panic!("Expected ShortRead, got {:?}", other),
        }
    }
}
