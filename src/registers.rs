//! The indexed register file. The accumulator is not part of it; it lives on the `Machine`.

use crate::bytecode::{RegisterIndex, Word};

/// Every register an 8-bit index can name.
pub const MAX_REGISTERS: usize = RegisterIndex::max_value() as usize + 1;

/**
  A fixed number of 32-bit registers, all zero when created. Indices past the end are not an
  error here; accessors return `None` and the machine decides what that means.
*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RegisterFile {
  cells: Vec<Word>,
}

impl RegisterFile {
  pub fn new(count: usize) -> RegisterFile {
    RegisterFile { cells: vec![0; count] }
  }

  pub fn len(&self) -> usize {
    self.cells.len()
  }

  pub fn is_empty(&self) -> bool {
    self.cells.is_empty()
  }

  pub fn contains(&self, index: RegisterIndex) -> bool {
    (index as usize) < self.cells.len()
  }

  pub fn get(&self, index: RegisterIndex) -> Option<Word> {
    self.cells.get(index as usize).copied()
  }

  /// Returns `None`, leaving the file untouched, if `index` is out of range.
  pub fn set(&mut self, index: RegisterIndex, value: Word) -> Option<()> {
    self.cells.get_mut(index as usize).map(|cell| *cell = value)
  }

  pub fn iter(&self) -> impl Iterator<Item = (RegisterIndex, Word)> + '_ {
    self.cells
        .iter()
        .enumerate()
        .map(|(index, value)| (index as RegisterIndex, *value))
  }
}

impl Default for RegisterFile {
  fn default() -> Self {
    RegisterFile::new(MAX_REGISTERS)
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn starts_zeroed(){
    let registers = RegisterFile::default();
    assert_eq!(registers.len(), 256);
    assert!(registers.iter().all(|(_, value)| value == 0));
    assert_eq!(registers.get(255), Some(0));
  }

  #[test]
  fn bounded_by_configured_size(){
    let mut registers = RegisterFile::new(4);
    assert!(registers.contains(3));
    assert!(!registers.contains(4));
    assert_eq!(registers.set(3, 9), Some(()));
    assert_eq!(registers.get(3), Some(9));
    assert_eq!(registers.set(4, 9), None);
    assert_eq!(registers.get(4), None);
    assert_eq!(registers.iter().map(|(_, value)| value).collect::<Vec<_>>(), vec![0, 0, 0, 9]);
  }
}
