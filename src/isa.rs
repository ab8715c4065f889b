/*!
  The instruction-set model: the declarative description of every instruction, and the
  immutable table built from it.

  Opcodes are assigned by the order definitions are declared in. The table built here is the
  only place opcodes come from; the encoder asks it for an operation's opcode and layout, and
  the decoder asks it what a leading byte means. Everything that can be wrong with a
  description is caught by `InstructionSet::build`, so nothing downstream has to check again.
*/

use std::collections::HashMap;
use std::str::FromStr;

use bimap::BiMap;
use string_cache::DefaultAtom;
use strum::IntoEnumIterator;
use strum_macros::Display as StrumDisplay;

use crate::bytecode::{resolve, Layout, Opcode, Operation};
use crate::error::SchemaError;

/// How an instruction uses an operand.
#[derive(StrumDisplay, Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum Direction {
  #[strum(serialize = "in")]
  In,
  #[strum(serialize = "out")]
  Out,
  #[strum(serialize = "inout")]
  InOut,
}

/// How an instruction uses the accumulator.
#[derive(StrumDisplay, Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum AccumulatorAccess {
  #[strum(serialize = "none")]
  None,
  #[strum(serialize = "in")]
  In,
  #[strum(serialize = "out")]
  Out,
  #[strum(serialize = "inout")]
  InOut,
}

impl AccumulatorAccess {
  pub fn reads(&self) -> bool {
    match self {
      AccumulatorAccess::In | AccumulatorAccess::InOut => true,
      _                                                => false
    }
  }

  pub fn writes(&self) -> bool {
    match self {
      AccumulatorAccess::Out | AccumulatorAccess::InOut => true,
      _                                                 => false
    }
  }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OperandDefinition {
  pub name      : DefaultAtom,
  pub direction : Direction,
  /// Width in bits.
  pub width     : u32,
}

impl OperandDefinition {
  pub fn new(name: &str, direction: Direction, width: u32) -> OperandDefinition {
    OperandDefinition {
      name: DefaultAtom::from(name),
      direction,
      width
    }
  }
}

/// One entry of an instruction-set description, as an external loader would produce it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstructionDefinition {
  pub mnemonic    : DefaultAtom,
  pub operands    : Vec<OperandDefinition>,
  pub accumulator : AccumulatorAccess,
  /// Layout token, see `bytecode::format`.
  pub format      : String,
  pub description : String,
}

impl InstructionDefinition {
  pub fn new(
    mnemonic    : &str,
    operands    : Vec<OperandDefinition>,
    accumulator : AccumulatorAccess,
    format      : &str,
    description : &str
  ) -> InstructionDefinition
  {
    InstructionDefinition {
      mnemonic: DefaultAtom::from(mnemonic),
      operands,
      accumulator,
      format: format.to_string(),
      description: description.to_string()
    }
  }
}

/// The nine instructions of the machine, in opcode order.
pub fn standard_definitions() -> Vec<InstructionDefinition> {
  use AccumulatorAccess as Acc;
  use Direction::{In, InOut, Out};

  let reg = |name: &str, direction: Direction| OperandDefinition::new(name, direction, 8);
  let imm = || OperandDefinition::new("imm", In, 32);

  vec![
    InstructionDefinition::new(
      "mov", vec![reg("v1", Out), reg("v2", In)], Acc::None, "opcode_v1_8_v2_8",
      "Copy register v2 into register v1."
    ),
    InstructionDefinition::new(
      "movi", vec![reg("v1", Out), imm()], Acc::None, "opcode_v1_8_imm_32",
      "Load an immediate into register v1."
    ),
    InstructionDefinition::new(
      "ldai", vec![imm()], Acc::Out, "opcode_imm_32",
      "Load an immediate into the accumulator."
    ),
    InstructionDefinition::new(
      "lda", vec![reg("v1", In)], Acc::Out, "opcode_v1_8",
      "Load register v1 into the accumulator."
    ),
    InstructionDefinition::new(
      "sta", vec![reg("v1", Out)], Acc::In, "opcode_v1_8",
      "Store the accumulator into register v1."
    ),
    InstructionDefinition::new(
      "add", vec![reg("v1", In)], Acc::InOut, "opcode_v1_8",
      "Add register v1 to the accumulator, wrapping at 2^32."
    ),
    InstructionDefinition::new(
      "dec", vec![reg("v1", InOut)], Acc::None, "opcode_v1_8",
      "Decrement register v1, wrapping at zero."
    ),
    InstructionDefinition::new(
      "bne", vec![reg("v1", In), reg("v2", In), imm()], Acc::None, "opcode_v1_8_v2_8_imm_32",
      "Jump to the absolute offset imm when v1 and v2 are equal."
    ),
    InstructionDefinition::new(
      "print", vec![], Acc::In, "opcode",
      "Write the accumulator to the output as an unsigned decimal line."
    ),
  ]
}

/// A definition together with everything derived from it at build time.
#[derive(Clone, Debug)]
pub struct InstructionEntry {
  opcode     : Opcode,
  operation  : Operation,
  layout     : Layout,
  definition : InstructionDefinition,
}

impl InstructionEntry {
  pub fn opcode(&self) -> Opcode {
    self.opcode
  }

  pub fn operation(&self) -> Operation {
    self.operation
  }

  pub fn layout(&self) -> &Layout {
    &self.layout
  }

  /// Encoded size in bytes.
  pub fn size(&self) -> usize {
    self.layout.size()
  }

  pub fn definition(&self) -> &InstructionDefinition {
    &self.definition
  }

  pub fn mnemonic(&self) -> &str {
    &self.definition.mnemonic
  }
}

/**
  The finished, immutable instruction table. It is `Send + Sync`, so one table can be
  shared by any number of machines running on any number of threads.
*/
#[derive(Clone, Debug)]
pub struct InstructionSet {
  /// Indexed by opcode.
  entries      : Vec<InstructionEntry>,
  /// Indexed by `Operation as usize`.
  by_operation : Vec<Opcode>,
  mnemonics    : HashMap<DefaultAtom, Opcode>,
}

impl InstructionSet {

  pub fn standard() -> Result<InstructionSet, SchemaError> {
    InstructionSet::build(standard_definitions())
  }

  pub fn build(definitions: Vec<InstructionDefinition>) -> Result<InstructionSet, SchemaError> {
    if definitions.len() > Opcode::max_value() as usize + 1 {
      return Err(SchemaError::TooManyInstructions(definitions.len()));
    }

    let mut mnemonics: BiMap<DefaultAtom, Opcode> = BiMap::new();
    let mut by_operation: Vec<Option<Opcode>> = vec![None; Operation::iter().count()];
    let mut entries = Vec::with_capacity(definitions.len());

    for (index, definition) in definitions.into_iter().enumerate() {
      let opcode = index as Opcode;

      let operation = match Operation::from_str(&definition.mnemonic) {
        Ok(operation) => operation,
        Err(_e) => return Err(SchemaError::UnknownMnemonic(definition.mnemonic.to_string()))
      };

      if mnemonics.insert_no_overwrite(definition.mnemonic.clone(), opcode).is_err() {
        return Err(SchemaError::DuplicateMnemonic(definition.mnemonic.to_string()));
      }

      let layout = resolve(&definition)?;
      check_signature(&definition, operation, &layout)?;

      by_operation[operation as usize] = Some(opcode);
      entries.push(InstructionEntry { opcode, operation, layout, definition });
    }

    let by_operation =
      Operation::iter()
        .map(|operation| by_operation[operation as usize].ok_or(SchemaError::MissingOperation(operation)))
        .collect::<Result<Vec<Opcode>, SchemaError>>()?;

    let mnemonics = mnemonics.iter().map(|(name, opcode)| (name.clone(), *opcode)).collect();

    Ok(InstructionSet { entries, by_operation, mnemonics })
  }

  pub fn by_opcode(&self, opcode: Opcode) -> Option<&InstructionEntry> {
    self.entries.get(opcode as usize)
  }

  pub fn by_mnemonic(&self, mnemonic: &str) -> Option<&InstructionEntry> {
    self.mnemonics
        .get(&DefaultAtom::from(mnemonic))
        .and_then(|opcode| self.by_opcode(*opcode))
  }

  /// Every operation has exactly one entry, so this cannot fail.
  pub fn by_operation(&self, operation: Operation) -> &InstructionEntry {
    &self.entries[self.by_operation[operation as usize] as usize]
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Entries in opcode order.
  pub fn iter(&self) -> impl Iterator<Item = &InstructionEntry> {
    self.entries.iter()
  }
}

/// Checks a resolved definition against the semantics the engine implements for `operation`.
fn check_signature(
  definition : &InstructionDefinition,
  operation  : Operation,
  layout     : &Layout
) -> Result<(), SchemaError>
{
  let declared =
    layout.operand_fields()
          .iter()
          .copied()
          .zip(definition.operands.iter().map(|operand| operand.direction));

  if operation.signature().len() != layout.operand_fields().len()
      || !operation.signature().iter().copied().eq(declared) {
    return Err(SchemaError::SignatureMismatch {
      mnemonic: definition.mnemonic.to_string(),
      operation
    });
  }

  if definition.accumulator != operation.accumulator() {
    return Err(SchemaError::AccumulatorMismatch {
      mnemonic: definition.mnemonic.to_string(),
      declared: definition.accumulator,
      expected: operation.accumulator()
    });
  }

  Ok(())
}


#[cfg(test)]
mod tests {
  use std::collections::HashSet;
  use std::sync::Arc;
  use std::thread;

  use super::*;

  #[test]
  fn standard_set_builds(){
    let isa = InstructionSet::standard().unwrap();
    assert_eq!(isa.len(), 9);
    let mnemonics: Vec<&str> = isa.iter().map(InstructionEntry::mnemonic).collect();
    assert_eq!(mnemonics, vec!["mov", "movi", "ldai", "lda", "sta", "add", "dec", "bne", "print"]);
  }

  #[test]
  fn opcodes_follow_declaration_order(){
    let isa = InstructionSet::standard().unwrap();
    for (index, entry) in isa.iter().enumerate() {
      assert_eq!(entry.opcode() as usize, index);
    }
    assert_eq!(isa.by_mnemonic("mov").unwrap().opcode(), 0);
    assert_eq!(isa.by_mnemonic("print").unwrap().opcode(), 8);
  }

  #[test]
  fn opcodes_and_mnemonics_are_a_bijection(){
    let isa = InstructionSet::standard().unwrap();
    let mut opcodes = HashSet::new();
    for entry in isa.iter() {
      assert!(opcodes.insert(entry.opcode()));
      let by_name = isa.by_mnemonic(entry.mnemonic()).unwrap();
      assert_eq!(by_name.opcode(), entry.opcode());
      assert_eq!(isa.by_opcode(entry.opcode()).unwrap().mnemonic(), entry.mnemonic());
      assert_eq!(isa.by_operation(entry.operation()).opcode(), entry.opcode());
    }
    assert!(isa.by_opcode(9).is_none());
    assert!(isa.by_opcode(0xFF).is_none());
    assert!(isa.by_mnemonic("halt").is_none());
  }

  #[test]
  fn sizes_are_fixed_per_instruction(){
    let isa = InstructionSet::standard().unwrap();
    let sizes: Vec<(&str, usize)> = isa.iter().map(|entry| (entry.mnemonic(), entry.size())).collect();
    assert_eq!(
      sizes,
      vec![
        ("mov", 3), ("movi", 6), ("ldai", 5), ("lda", 2), ("sta", 2),
        ("add", 2), ("dec", 2), ("bne", 7), ("print", 1)
      ]
    );
  }

  #[test]
  fn reordering_definitions_reassigns_opcodes(){
    let mut definitions = standard_definitions();
    definitions.reverse();
    let isa = InstructionSet::build(definitions).unwrap();
    assert_eq!(isa.by_operation(Operation::Print).opcode(), 0);
    assert_eq!(isa.by_operation(Operation::Mov).opcode(), 8);
  }

  #[test]
  fn duplicate_mnemonic(){
    let mut definitions = standard_definitions();
    definitions.push(definitions[2].clone());
    assert_eq!(
      InstructionSet::build(definitions).unwrap_err(),
      SchemaError::DuplicateMnemonic("ldai".to_string())
    );
  }

  #[test]
  fn unknown_mnemonic(){
    let mut definitions = standard_definitions();
    definitions[8].mnemonic = DefaultAtom::from("halt");
    assert_eq!(
      InstructionSet::build(definitions).unwrap_err(),
      SchemaError::UnknownMnemonic("halt".to_string())
    );
  }

  #[test]
  fn missing_operation(){
    let mut definitions = standard_definitions();
    definitions.remove(6);
    assert_eq!(
      InstructionSet::build(definitions).unwrap_err(),
      SchemaError::MissingOperation(Operation::Dec)
    );
  }

  #[test]
  fn bad_format_fails_at_build(){
    let mut definitions = standard_definitions();
    definitions[0].format = "opcode_v1_8_v2".to_string();
    assert!(matches!(
      InstructionSet::build(definitions),
      Err(SchemaError::UnrecognizedFormat { .. })
    ));
  }

  #[test]
  fn signature_mismatch(){
    let mut definitions = standard_definitions();
    // `lda` declared as writing its register.
    definitions[3].operands[0].direction = Direction::Out;
    assert_eq!(
      InstructionSet::build(definitions).unwrap_err(),
      SchemaError::SignatureMismatch { mnemonic: "lda".to_string(), operation: Operation::Lda }
    );
  }

  #[test]
  fn accumulator_mismatch(){
    let mut definitions = standard_definitions();
    definitions[5].accumulator = AccumulatorAccess::Out;
    assert_eq!(
      InstructionSet::build(definitions).unwrap_err(),
      SchemaError::AccumulatorMismatch {
        mnemonic: "add".to_string(),
        declared: AccumulatorAccess::Out,
        expected: AccumulatorAccess::InOut
      }
    );
  }

  #[test]
  fn too_many_instructions(){
    let definitions: Vec<InstructionDefinition> =
      standard_definitions().into_iter().cycle().take(257).collect();
    assert_eq!(
      InstructionSet::build(definitions).unwrap_err(),
      SchemaError::TooManyInstructions(257)
    );
  }

  #[test]
  fn shared_between_threads(){
    let isa = Arc::new(InstructionSet::standard().unwrap());
    let handles: Vec<_> = (0..4u8).map(|opcode| {
      let isa = Arc::clone(&isa);
      thread::spawn(move || isa.by_opcode(opcode).map(|entry| entry.mnemonic().to_string()))
    }).collect();
    let names: Vec<Option<String>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(
      names,
      vec![Some("mov".into()), Some("movi".into()), Some("ldai".into()), Some("lda".into())]
    );
  }
}
