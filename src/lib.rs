/*!
  A small register machine whose instruction set is described declaratively. The description
  (`isa`) decides opcodes and binary layouts; the encoder and decoder (`bytecode`) follow it;
  the `machine` executes what the decoder hands it.
*/

#[macro_use] extern crate prettytable;
#[macro_use] extern crate lazy_static;
extern crate strum;
extern crate strum_macros;

pub mod analysis;
pub mod bytecode;
pub mod error;
pub mod isa;
pub mod machine;
pub mod program;
pub mod registers;

pub use error::{DecodeError, EncodeError, Fault, SchemaError};
pub use isa::{InstructionDefinition, InstructionSet};
pub use machine::{Machine, MachineConfig, RunState};
pub use program::{Program, ProgramBuilder};
