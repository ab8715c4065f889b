/*!

  The VM uses 32 bit unsigned words and byte-addressed code. Every instruction starts with a
  one byte opcode followed by its operand fields, with no padding or alignment. The sizes of
  instruction components are as follows:

    Opcode:      8 bits
    Register:    8 bits
    Immediate:  32 bits, little-endian

  Which fields an instruction has, and in what order, is not written down here. It comes from
  the format token of the instruction's definition (see `format`), which is resolved once when
  the `InstructionSet` is built. The encoder and decoder in `binary` only ever walk those
  resolved layouts, so an instruction's size is fixed and known before any byte is read.

  Decoded instructions are kept as an `Operation` plus a small inline array of operands rather
  than as one enum variant per opcode with a data payload. The operation says what to do; the
  layout, not the variant, says what the operands look like.

*/

mod binary;
mod format;
mod instruction;

pub use binary::{encode, encode_instruction, try_decode_instruction, Decoded, EncodedInstruction};
pub use format::{resolve, Layout};
pub use instruction::{
  FieldDescriptor,
  Instruction,
  Opcode,
  Operand,
  Operands,
  Operation,
  RegisterIndex,
  Word,
  MAX_OPERANDS
};
