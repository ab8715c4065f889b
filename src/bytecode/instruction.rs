use std::fmt::{Display, Formatter};
use std::ops::Deref;

use strum_macros::{Display as StrumDisplay, EnumIter, EnumString, IntoStaticStr};

use crate::isa::{AccumulatorAccess, Direction};

pub type Word = u32;
pub type Opcode = u8;
pub type RegisterIndex = u8;

/// The most operands any instruction takes (`bne v1, v2, imm`).
pub const MAX_OPERANDS: usize = 3;

/**
  The kinds of instruction the machine knows how to execute.

  The order of the variants is *not* the opcode order. Opcodes belong to the
  `InstructionSet`, which numbers definitions by the order they are declared in. The
  strum-derived text of a variant is its mnemonic, which is how a definition is matched
  to the semantics implemented here.
*/
#[derive(
  StrumDisplay, IntoStaticStr, EnumString, EnumIter,
  Clone,        Copy,          Eq, PartialEq,  Debug,  Hash
)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
  Mov,    // mov v1, v2
  Movi,   // movi v1, imm
  Ldai,   // ldai imm
  Lda,    // lda v1
  Sta,    // sta v1
  Add,    // add v1
  Dec,    // dec v1
  Bne,    // bne v1, v2, imm
  Print,  // print
}

impl Operation {
  pub fn mnemonic(&self) -> &'static str {
    (*self).into()
  }

  /**
    The operand kinds and directions the execution engine assumes for this operation, in
    encoding order. A definition whose format or operand list disagrees is rejected when the
    instruction set is built.
  */
  pub fn signature(&self) -> &'static [(FieldDescriptor, Direction)] {
    use FieldDescriptor::{Immediate, Register};

    match self {
      Operation::Mov   => &[(Register, Direction::Out), (Register, Direction::In)],
      Operation::Movi  => &[(Register, Direction::Out), (Immediate, Direction::In)],
      Operation::Ldai  => &[(Immediate, Direction::In)],
      Operation::Lda   => &[(Register, Direction::In)],
      Operation::Sta   => &[(Register, Direction::Out)],
      Operation::Add   => &[(Register, Direction::In)],
      Operation::Dec   => &[(Register, Direction::InOut)],
      Operation::Bne   => &[
        (Register, Direction::In),
        (Register, Direction::In),
        (Immediate, Direction::In)
      ],
      Operation::Print => &[],
    }
  }

  /// How the operation touches the accumulator.
  pub fn accumulator(&self) -> AccumulatorAccess {
    match self {
      Operation::Ldai | Operation::Lda  => AccumulatorAccess::Out,
      Operation::Sta  | Operation::Print => AccumulatorAccess::In,
      Operation::Add                     => AccumulatorAccess::InOut,
      _                                  => AccumulatorAccess::None,
    }
  }

  /// Whether the operation can redirect the program counter.
  pub fn is_branch(&self) -> bool {
    match self {
      Operation::Bne => true,
      _              => false
    }
  }
}

/// One field of an encoded instruction.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum FieldDescriptor {
  /// [OpCode:8]
  Opcode,
  /// [Register:8]
  Register,
  /// [Immediate:32], little-endian
  Immediate,
}

impl FieldDescriptor {
  /// Size of the field in bytes.
  pub fn size(&self) -> usize {
    match self {
      FieldDescriptor::Opcode    => 1,
      FieldDescriptor::Register  => 1,
      FieldDescriptor::Immediate => 4,
    }
  }

  pub fn bits(&self) -> u32 {
    (self.size() * 8) as u32
  }
}

/// A decoded operand value.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum Operand {
  Register(RegisterIndex),
  Immediate(Word),
}

impl Operand {
  pub fn value(&self) -> Word {
    match self {
      Operand::Register(index) => *index as Word,
      Operand::Immediate(value) => *value,
    }
  }

  pub fn descriptor(&self) -> FieldDescriptor {
    match self {
      Operand::Register(_)  => FieldDescriptor::Register,
      Operand::Immediate(_) => FieldDescriptor::Immediate,
    }
  }
}

impl Display for Operand {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Operand::Register(index)  => write!(f, "v{}", index),
      Operand::Immediate(value) => write!(f, "{}", value),
    }
  }
}

/**
  Operands of a decoded instruction, stored inline so that decoding does not allocate.
  Slots past `len` are always `Operand::Immediate(0)`, which keeps the derived comparisons
  meaningful.
*/
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub struct Operands {
  values: [Operand; MAX_OPERANDS],
  len: usize,
}

impl Operands {
  pub fn new() -> Operands {
    Operands {
      values: [Operand::Immediate(0); MAX_OPERANDS],
      len: 0,
    }
  }

  /// Panics if more than `MAX_OPERANDS` operands are pushed. Instruction set construction
  /// rejects any layout that would do so.
  pub fn push(&mut self, operand: Operand) {
    self.values[self.len] = operand;
    self.len += 1;
  }

  pub fn as_slice(&self) -> &[Operand] {
    &self.values[..self.len]
  }
}

impl Default for Operands {
  fn default() -> Self {
    Operands::new()
  }
}

impl Deref for Operands {
  type Target = [Operand];

  fn deref(&self) -> &[Operand] {
    self.as_slice()
  }
}

impl From<&[Operand]> for Operands {
  fn from(slice: &[Operand]) -> Self {
    let mut operands = Operands::new();
    for operand in slice {
      operands.push(*operand);
    }
    operands
  }
}

/// Holds the unencoded components of an instruction.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub struct Instruction {
  pub opcode: Opcode,
  pub operation: Operation,
  pub operands: Operands,
}

impl Instruction {
  /// Register operands in encoding order.
  pub fn registers(&self) -> impl Iterator<Item = RegisterIndex> + '_ {
    self.operands.iter().filter_map(|operand| match operand {
      Operand::Register(index) => Some(*index),
      _                        => None
    })
  }

  pub fn immediate(&self) -> Option<Word> {
    self.operands.iter().find_map(|operand| match operand {
      Operand::Immediate(value) => Some(*value),
      _                         => None
    })
  }
}

impl Display for Instruction {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self.operands.is_empty() {
      true  => write!(f, "{}", self.operation),
      false => write!(
        f,
        "{} {}",
        self.operation,
        self.operands
            .iter()
            .map(Operand::to_string)
            .collect::<Vec<String>>()
            .join(", ")
      )
    }
  }
}
