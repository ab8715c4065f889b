//! Error types for building the instruction set, encoding, decoding, and execution.
//!
//! Schema errors are fatal to startup. Encode errors are recoverable by the caller. Decode
//! errors and `Fault`s only ever end the machine that hit them.

use std::io;

use thiserror::Error;

use crate::bytecode::{FieldDescriptor, Opcode, Operation};
use crate::isa::{AccumulatorAccess, Direction};

/// A malformed or internally contradictory instruction-set description.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum SchemaError {
  #[error("`{0}` does not name a known operation")]
  UnknownMnemonic(String),

  #[error("mnemonic `{0}` is defined more than once")]
  DuplicateMnemonic(String),

  #[error("operation `{0}` has no definition")]
  MissingOperation(Operation),

  #[error("{0} definitions given, but opcodes are a single byte")]
  TooManyInstructions(usize),

  #[error("{mnemonic}: unrecognized format token `{format}`")]
  UnrecognizedFormat { mnemonic: String, format: String },

  #[error("{mnemonic}: field `{field}` cannot be {width} bits wide")]
  UnsupportedWidth { mnemonic: String, field: String, width: u32 },

  #[error("{mnemonic}: format has {fields} operand fields but {operands} operands are declared")]
  ArityMismatch { mnemonic: String, fields: usize, operands: usize },

  #[error("{mnemonic}: format field `{field}` does not match operand `{operand}` at position {position}")]
  OperandMismatch { mnemonic: String, position: usize, field: String, operand: String },

  #[error("{mnemonic}: immediate operand `{operand}` is declared {direction}")]
  WritableImmediate { mnemonic: String, operand: String, direction: Direction },

  #[error("{mnemonic}: operands do not match the signature of `{operation}`")]
  SignatureMismatch { mnemonic: String, operation: Operation },

  #[error("{mnemonic}: accumulator declared {declared} but the operation uses it as {expected}")]
  AccumulatorMismatch {
    mnemonic: String,
    declared: AccumulatorAccess,
    expected: AccumulatorAccess,
  },
}

/// The encoder was handed operands that do not fit the instruction's layout.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum EncodeError {
  #[error("{operation}: operand {position} is {value}, which does not fit in a {field:?} field")]
  OperandRange { operation: Operation, position: usize, field: FieldDescriptor, value: u32 },

  #[error("{operation} takes {expected} register operands but was given {given}")]
  RegisterCount { operation: Operation, expected: usize, given: usize },

  #[error("{operation} requires an immediate operand")]
  MissingImmediate { operation: Operation },

  #[error("{operation} takes no immediate operand")]
  UnexpectedImmediate { operation: Operation },

  #[error("no instruction to patch at offset {offset}: {source}")]
  Patch { offset: usize, source: DecodeError },
}

/// The byte stream does not yield a valid instruction at the given offset.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum DecodeError {
  #[error("no instruction at offset {pc}: program is {len} bytes long")]
  EndOfProgram { pc: usize, len: usize },

  #[error("unknown opcode {opcode:#04x} at offset {pc}")]
  UnknownOpcode { pc: usize, opcode: Opcode },

  #[error("{operation} at offset {pc} needs {needed} bytes but only {available} remain")]
  Truncated { pc: usize, operation: Operation, needed: usize, available: usize },
}

/// Why a machine stopped in the `Faulted` state.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum Fault {
  #[error(transparent)]
  Decode(#[from] DecodeError),

  #[error("register v{register} at offset {pc} is outside the {register_count}-register file")]
  RegisterOutOfRange { pc: usize, register: u8, register_count: usize },

  #[error("failed to write output at offset {pc}: {kind:?}")]
  Output { pc: usize, kind: io::ErrorKind },
}
