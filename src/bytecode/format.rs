/*!
  Format tokens describe the binary layout of an instruction, field by field. A token such as
  `opcode_v1_8_v2_8_imm_32` reads as: the opcode byte, then operand `v1` in 8 bits, then
  operand `v2` in 8 bits, then operand `imm` in 32 bits. The grammar is

  ```text
    token := "opcode" ( "_" field )*
    field := name "_" width
    name  := "v" digits | "imm"
    width := digits
  ```

  Tokens are resolved once, while the instruction set is built, into a `Layout`. Every check
  against the definition's operand list happens here, so a `Layout` that exists is one the
  encoder and decoder can trust.
*/

use nom::{
  branch::alt,
  bytes::complete::tag,
  character::complete::{char as one_char, digit1},
  combinator::{all_consuming, map, map_res, recognize},
  multi::many0,
  sequence::{pair, preceded, separated_pair},
  IResult
};

use crate::bytecode::FieldDescriptor;
use crate::error::SchemaError;
use crate::isa::{Direction, InstructionDefinition};

/// A field as written in a format token, before it is checked against the operand list.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct FormatField<'a> {
  descriptor : FieldDescriptor,
  name       : &'a str,
  width      : u32
}

fn field_name(input: &str) -> IResult<&str, (FieldDescriptor, &str)> {
  alt((
    map(recognize(pair(one_char('v'), digit1)), |name| (FieldDescriptor::Register, name)),
    map(tag("imm"), |name| (FieldDescriptor::Immediate, name)),
  ))(input)
}

fn field_width(input: &str) -> IResult<&str, u32> {
  map_res(digit1, |width: &str| width.parse::<u32>())(input)
}

fn operand_field(input: &str) -> IResult<&str, FormatField<'_>> {
  map(
    separated_pair(field_name, one_char('_'), field_width),
    |((descriptor, name), width)| FormatField { descriptor, name, width }
  )(input)
}

fn format_token(input: &str) -> IResult<&str, Vec<FormatField<'_>>> {
  preceded(tag("opcode"), many0(preceded(one_char('_'), operand_field)))(input)
}

/// The resolved binary layout of one instruction. The first field is always the opcode.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Layout {
  fields: Vec<FieldDescriptor>,
  size: usize,
}

impl Layout {
  fn new(fields: Vec<FieldDescriptor>) -> Layout {
    let size = fields.iter().map(FieldDescriptor::size).sum();
    Layout { fields, size }
  }

  /// Every field, opcode first.
  pub fn fields(&self) -> &[FieldDescriptor] {
    &self.fields
  }

  /// The fields following the opcode.
  pub fn operand_fields(&self) -> &[FieldDescriptor] {
    &self.fields[1..]
  }

  /// Encoded size in bytes.
  pub fn size(&self) -> usize {
    self.size
  }

  pub fn register_count(&self) -> usize {
    self.operand_fields()
        .iter()
        .filter(|field| **field == FieldDescriptor::Register)
        .count()
  }

  pub fn has_immediate(&self) -> bool {
    self.operand_fields().contains(&FieldDescriptor::Immediate)
  }
}

/**
  Parses the definition's format token and checks it against the definition's operand list.
  Fields must agree with operands in number, order, name, and width, and immediates can only
  ever be read.
*/
pub fn resolve(definition: &InstructionDefinition) -> Result<Layout, SchemaError> {
  let mnemonic = definition.mnemonic.to_string();

  let parsed = match all_consuming(format_token)(definition.format.as_str()) {
    Ok((_rest, fields)) => fields,
    Err(_e) => {
      return Err(SchemaError::UnrecognizedFormat {
        mnemonic,
        format: definition.format.clone()
      });
    }
  };

  if let Some(field) = parsed.iter().find(|field| field.width != field.descriptor.bits()) {
    return Err(SchemaError::UnsupportedWidth {
      mnemonic,
      field: field.name.to_string(),
      width: field.width
    });
  }

  if parsed.len() != definition.operands.len() {
    return Err(SchemaError::ArityMismatch {
      mnemonic,
      fields: parsed.len(),
      operands: definition.operands.len()
    });
  }

  for (position, (field, operand)) in parsed.iter().zip(definition.operands.iter()).enumerate() {
    if field.name != &*operand.name || field.width != operand.width {
      return Err(SchemaError::OperandMismatch {
        mnemonic,
        position,
        field: format!("{}_{}", field.name, field.width),
        operand: format!("{}_{}", operand.name, operand.width)
      });
    }
    if field.descriptor == FieldDescriptor::Immediate && operand.direction != Direction::In {
      return Err(SchemaError::WritableImmediate {
        mnemonic,
        operand: operand.name.to_string(),
        direction: operand.direction
      });
    }
  }

  let mut fields = vec![FieldDescriptor::Opcode];
  fields.extend(parsed.iter().map(|field| field.descriptor));
  Ok(Layout::new(fields))
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::isa::{AccumulatorAccess, OperandDefinition};

  fn definition(format: &str, operands: Vec<OperandDefinition>) -> InstructionDefinition {
    InstructionDefinition::new("bne", operands, AccumulatorAccess::None, format, "test")
  }

  fn bne_operands() -> Vec<OperandDefinition> {
    vec![
      OperandDefinition::new("v1", Direction::In, 8),
      OperandDefinition::new("v2", Direction::In, 8),
      OperandDefinition::new("imm", Direction::In, 32),
    ]
  }

  #[test]
  fn parse_token(){
    let (rest, fields) = format_token("opcode_v1_8_imm_32").unwrap();
    assert_eq!(rest, "");
    assert_eq!(
      fields,
      vec![
        FormatField { descriptor: FieldDescriptor::Register,  name: "v1",  width: 8 },
        FormatField { descriptor: FieldDescriptor::Immediate, name: "imm", width: 32 },
      ]
    );
  }

  #[test]
  fn resolve_three_operands(){
    let layout = resolve(&definition("opcode_v1_8_v2_8_imm_32", bne_operands())).unwrap();
    assert_eq!(
      layout.fields(),
      &[
        FieldDescriptor::Opcode,
        FieldDescriptor::Register,
        FieldDescriptor::Register,
        FieldDescriptor::Immediate
      ]
    );
    assert_eq!(layout.size(), 7);
    assert_eq!(layout.register_count(), 2);
    assert!(layout.has_immediate());
  }

  #[test]
  fn resolve_bare_opcode(){
    let layout = resolve(&definition("opcode", vec![])).unwrap();
    assert_eq!(layout.fields(), &[FieldDescriptor::Opcode]);
    assert!(layout.operand_fields().is_empty());
    assert_eq!(layout.size(), 1);
  }

  #[test]
  fn unrecognized_grammar(){
    for token in &["", "op", "opcode_", "opcode_x1_8", "opcode_v1_8_", "opcode_v1", "opcodev1_8"] {
      let result = resolve(&definition(token, vec![]));
      assert!(
        matches!(result, Err(SchemaError::UnrecognizedFormat { .. })),
        "{:?} gave {:?}", token, result
      );
    }
  }

  #[test]
  fn unsupported_width(){
    let operands = vec![OperandDefinition::new("v1", Direction::In, 16)];
    assert_eq!(
      resolve(&definition("opcode_v1_16", operands)),
      Err(SchemaError::UnsupportedWidth {
        mnemonic: "bne".to_string(),
        field: "v1".to_string(),
        width: 16
      })
    );
  }

  #[test]
  fn arity_mismatch(){
    assert_eq!(
      resolve(&definition("opcode_v1_8_v2_8", bne_operands())),
      Err(SchemaError::ArityMismatch { mnemonic: "bne".to_string(), fields: 2, operands: 3 })
    );
  }

  #[test]
  fn operand_order_mismatch(){
    let result = resolve(&definition("opcode_v2_8_v1_8_imm_32", bne_operands()));
    assert!(matches!(result, Err(SchemaError::OperandMismatch { position: 0, .. })));
  }

  #[test]
  fn writable_immediate(){
    let operands = vec![OperandDefinition::new("imm", Direction::InOut, 32)];
    assert!(matches!(
      resolve(&definition("opcode_imm_32", operands)),
      Err(SchemaError::WritableImmediate { direction: Direction::InOut, .. })
    ));
  }
}
