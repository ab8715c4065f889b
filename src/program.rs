//! Programs as byte sequences, a builder that assembles them through the encoder, and a
//! disassembly listing.

use prettytable::Table;

use crate::bytecode::{
  encode,
  try_decode_instruction,
  Decoded,
  Instruction,
  Operation,
  Word
};
use crate::error::{DecodeError, EncodeError};
use crate::isa::InstructionSet;
use crate::machine::TABLE_DISPLAY_FORMAT;

/// An ordered, byte-addressable sequence of encoded instructions.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Program {
  bytes: Vec<u8>,
}

impl Program {
  pub fn from_bytes(bytes: Vec<u8>) -> Program {
    Program { bytes }
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.bytes
  }

  pub fn into_bytes(self) -> Vec<u8> {
    self.bytes
  }

  pub fn len(&self) -> usize {
    self.bytes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bytes.is_empty()
  }

  pub fn decode_at(&self, isa: &InstructionSet, pc: usize) -> Result<Decoded, DecodeError> {
    try_decode_instruction(isa, &self.bytes, pc)
  }

  /// Decodes the program front to back, pairing each instruction with its offset.
  pub fn disassemble(&self, isa: &InstructionSet) -> Result<Vec<(usize, Instruction)>, DecodeError> {
    let mut instructions = vec![];
    let mut pc = 0;

    while pc < self.bytes.len() {
      let decoded = self.decode_at(isa, pc)?;
      instructions.push((pc, decoded.instruction));
      pc = decoded.next_pc;
    }

    Ok(instructions)
  }

  /// A table of offset, raw bytes, and instruction text for every instruction.
  pub fn listing(&self, isa: &InstructionSet) -> Result<Table, DecodeError> {
    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Offset", ubl->"Bytes", ubl->"Instruction"]);

    for (pc, instruction) in self.disassemble(isa)? {
      let size  = isa.by_opcode(instruction.opcode).map_or(1, |entry| entry.size());
      let bytes =
        self.bytes[pc..pc + size]
            .iter()
            .map(|byte| format!("{:02x}", byte))
            .collect::<Vec<String>>()
            .join(" ");
      table.add_row(row![r->pc, bytes, instruction]);
    }

    Ok(table)
  }
}

impl From<Vec<u8>> for Program {
  fn from(bytes: Vec<u8>) -> Self {
    Program::from_bytes(bytes)
  }
}

/**
  Assembles a program one instruction at a time. Branch targets are absolute byte offsets:
  `here` gives the offset of the next instruction for backward branches, and a forward branch
  can be emitted with a placeholder target and fixed up with `patch_immediate`.
*/
pub struct ProgramBuilder<'isa> {
  isa   : &'isa InstructionSet,
  bytes : Vec<u8>,
}

impl<'isa> ProgramBuilder<'isa> {
  pub fn new(isa: &'isa InstructionSet) -> ProgramBuilder<'isa> {
    ProgramBuilder { isa, bytes: vec![] }
  }

  /// Offset the next emitted instruction will start at.
  pub fn here(&self) -> usize {
    self.bytes.len()
  }

  /// Appends one instruction and returns the offset it starts at.
  pub fn emit(
    &mut self,
    operation : Operation,
    registers : &[Word],
    immediate : Option<Word>
  ) -> Result<usize, EncodeError>
  {
    let offset  = self.here();
    let encoded = encode(self.isa, operation, registers, immediate)?;
    self.bytes.extend_from_slice(encoded.as_bytes());
    Ok(offset)
  }

  /// Replaces the immediate of the instruction emitted at `offset`.
  pub fn patch_immediate(&mut self, offset: usize, value: Word) -> Result<(), EncodeError> {
    let decoded = match try_decode_instruction(self.isa, &self.bytes, offset) {
      Ok(decoded) => decoded,
      Err(source) => return Err(EncodeError::Patch { offset, source })
    };

    let instruction = decoded.instruction;
    let registers: Vec<Word> = instruction.registers().map(Word::from).collect();
    let encoded = encode(self.isa, instruction.operation, &registers, Some(value))?;

    self.bytes[offset..decoded.next_pc].copy_from_slice(encoded.as_bytes());
    Ok(())
  }

  pub fn build(self) -> Program {
    Program::from_bytes(self.bytes)
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn build_and_disassemble(){
    let isa = InstructionSet::standard().unwrap();
    let mut builder = ProgramBuilder::new(&isa);
    assert_eq!(builder.emit(Operation::Movi, &[0], Some(3)).unwrap(), 0);
    assert_eq!(builder.emit(Operation::Ldai, &[], Some(0)).unwrap(), 6);
    assert_eq!(builder.emit(Operation::Add, &[0], None).unwrap(), 11);
    assert_eq!(builder.emit(Operation::Print, &[], None).unwrap(), 13);
    let program = builder.build();

    assert_eq!(program.len(), 14);
    let text: Vec<(usize, String)> =
      program.disassemble(&isa)
             .unwrap()
             .into_iter()
             .map(|(pc, instruction)| (pc, instruction.to_string()))
             .collect();
    assert_eq!(
      text,
      vec![
        (0, "movi v0, 3".to_string()),
        (6, "ldai 0".to_string()),
        (11, "add v0".to_string()),
        (13, "print".to_string()),
      ]
    );
  }

  #[test]
  fn failed_emit_leaves_program_unchanged(){
    let isa = InstructionSet::standard().unwrap();
    let mut builder = ProgramBuilder::new(&isa);
    builder.emit(Operation::Print, &[], None).unwrap();
    assert!(builder.emit(Operation::Dec, &[300], None).is_err());
    assert_eq!(builder.here(), 1);
  }

  #[test]
  fn patch_forward_branch(){
    let isa = InstructionSet::standard().unwrap();
    let mut builder = ProgramBuilder::new(&isa);
    let branch = builder.emit(Operation::Bne, &[4, 5], Some(0)).unwrap();
    builder.emit(Operation::Print, &[], None).unwrap();
    let target = builder.here() as Word;
    builder.patch_immediate(branch, target).unwrap();

    let program = builder.build();
    assert_eq!(program.as_bytes(), &[7, 4, 5, 8, 0, 0, 0, 8]);
  }

  #[test]
  fn patch_without_immediate(){
    let isa = InstructionSet::standard().unwrap();
    let mut builder = ProgramBuilder::new(&isa);
    builder.emit(Operation::Dec, &[1], None).unwrap();
    assert_eq!(
      builder.patch_immediate(0, 9),
      Err(EncodeError::UnexpectedImmediate { operation: Operation::Dec })
    );
    assert_eq!(
      builder.patch_immediate(2, 9),
      Err(EncodeError::Patch { offset: 2, source: DecodeError::EndOfProgram { pc: 2, len: 2 } })
    );
  }

  #[test]
  fn disassemble_stops_at_bad_byte(){
    let isa = InstructionSet::standard().unwrap();
    let program = Program::from_bytes(vec![8, 0x99]);
    assert_eq!(
      program.disassemble(&isa),
      Err(DecodeError::UnknownOpcode { pc: 1, opcode: 0x99 })
    );
  }

  #[test]
  fn listing_shows_bytes(){
    let isa = InstructionSet::standard().unwrap();
    let program = Program::from_bytes(vec![3, 2, 8]);
    let text = program.listing(&isa).unwrap().to_string();
    assert!(text.contains("03 02"));
    assert!(text.contains("lda v2"));
    assert!(text.contains("print"));
  }
}
