/*!
  This module is responsible for the encoding and decoding of binary instructions.

  Both directions are driven by the `Layout` each `InstructionEntry` carries, so neither
  side has its own idea of what an opcode means or how wide an instruction is.
*/
use std::convert::TryFrom;

use super::{FieldDescriptor, Instruction, Operand, Operands, Operation, Word};
use crate::error::{DecodeError, EncodeError};
use crate::isa::InstructionSet;

/// An encoded instruction: the opcode byte followed by its operand fields.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct EncodedInstruction(Vec<u8>);

impl EncodedInstruction {
  pub fn as_bytes(&self) -> &[u8] {
    &self.0
  }

  pub fn into_bytes(self) -> Vec<u8> {
    self.0
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl AsRef<[u8]> for EncodedInstruction {
  fn as_ref(&self) -> &[u8] {
    &self.0
  }
}

/// A decoded instruction and the offset just past it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Decoded {
  pub instruction : Instruction,
  pub next_pc     : usize,
}

/**
  Encodes `operation` with the given operands. Register operands fill the register fields in
  order and `immediate` fills the immediate field. Register values above 255 are rejected
  rather than truncated.
*/
pub fn encode(
  isa       : &InstructionSet,
  operation : Operation,
  registers : &[Word],
  immediate : Option<Word>
) -> Result<EncodedInstruction, EncodeError>
{
  let entry  = isa.by_operation(operation);
  let layout = entry.layout();

  if registers.len() != layout.register_count() {
    return Err(EncodeError::RegisterCount {
      operation,
      expected: layout.register_count(),
      given: registers.len()
    });
  }
  if immediate.is_some() && !layout.has_immediate() {
    return Err(EncodeError::UnexpectedImmediate { operation });
  }

  let mut bytes = Vec::with_capacity(layout.size());
  let mut registers = registers.iter().copied();
  bytes.push(entry.opcode());

  for (position, field) in layout.operand_fields().iter().enumerate() {
    match field {

      FieldDescriptor::Register => {
        let value = registers.next().ok_or(EncodeError::RegisterCount {
          operation,
          expected: layout.register_count(),
          given: position
        })?;
        let byte = u8::try_from(value).map_err(|_| EncodeError::OperandRange {
          operation,
          position,
          field: *field,
          value
        })?;
        bytes.push(byte);
      }

      FieldDescriptor::Immediate => {
        let value = immediate.ok_or(EncodeError::MissingImmediate { operation })?;
        bytes.extend_from_slice(&value.to_le_bytes());
      }

      FieldDescriptor::Opcode => unreachable!("Layouts only carry the opcode as their first field.")

    }
  }

  Ok(EncodedInstruction(bytes))
}

/// Re-encodes an unencoded instruction.
pub fn encode_instruction(
  isa         : &InstructionSet,
  instruction : &Instruction
) -> Result<EncodedInstruction, EncodeError>
{
  let registers: Vec<Word> = instruction.registers().map(Word::from).collect();
  encode(isa, instruction.operation, &registers, instruction.immediate())
}

/**
  Decodes the instruction starting at byte offset `pc`. Fails if there is no byte at `pc`,
  if that byte is not an opcode, or if fewer bytes remain than the instruction needs.
*/
pub fn try_decode_instruction(
  isa     : &InstructionSet,
  program : &[u8],
  pc      : usize
) -> Result<Decoded, DecodeError>
{
  let opcode = match program.get(pc) {
    Some(byte) => *byte,
    None => return Err(DecodeError::EndOfProgram { pc, len: program.len() })
  };

  let entry = match isa.by_opcode(opcode) {
    Some(entry) => entry,
    None => return Err(DecodeError::UnknownOpcode { pc, opcode })
  };

  let available = program.len() - pc;
  if available < entry.size() {
    return Err(DecodeError::Truncated {
      pc,
      operation: entry.operation(),
      needed: entry.size(),
      available
    });
  }

  let bytes = &program[pc..pc + entry.size()];
  let mut offset   = FieldDescriptor::Opcode.size();
  let mut operands = Operands::new();

  for field in entry.layout().operand_fields() {
    match field {

      FieldDescriptor::Register => {
        operands.push(Operand::Register(bytes[offset]));
      }

      FieldDescriptor::Immediate => {
        let word = [bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]];
        operands.push(Operand::Immediate(Word::from_le_bytes(word)));
      }

      FieldDescriptor::Opcode => unreachable!("Layouts only carry the opcode as their first field.")

    }
    offset += field.size();
  }

  Ok(Decoded {
    instruction: Instruction {
      opcode,
      operation: entry.operation(),
      operands
    },
    next_pc: pc + entry.size()
  })
}
