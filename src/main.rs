use std::io;

use regvm::analysis::basic_blocks;
use regvm::bytecode::{Operation, Word};
use regvm::{DecodeError, EncodeError, InstructionSet, Machine, Program, ProgramBuilder, RunState};

/**
  Sums 5 + 4 + 3 + 2 + 1, printing the running total.

  ```text
          movi v0, 5
          movi v1, 0
          ldai 0
    top:  bne  v0, v1, end
          add  v0
          print
          dec  v0
          bne  v1, v1, top
    end:
  ```
*/
fn running_sum(isa: &InstructionSet) -> Result<Program, EncodeError> {
  let mut builder = ProgramBuilder::new(isa);

  builder.emit(Operation::Movi, &[0], Some(5))?;
  builder.emit(Operation::Movi, &[1], Some(0))?;
  builder.emit(Operation::Ldai, &[], Some(0))?;
  let top  = builder.here() as Word;
  let exit = builder.emit(Operation::Bne, &[0, 1], Some(0))?;
  builder.emit(Operation::Add, &[0], None)?;
  builder.emit(Operation::Print, &[], None)?;
  builder.emit(Operation::Dec, &[0], None)?;
  builder.emit(Operation::Bne, &[1, 1], Some(top))?;
  let end = builder.here() as Word;
  builder.patch_immediate(exit, end)?;

  Ok(builder.build())
}

/// The listing of `program` followed by its basic blocks.
fn describe(isa: &InstructionSet, program: &Program) -> Result<String, DecodeError> {
  let table  = program.listing(isa)?;
  let blocks = basic_blocks(isa, program)?;
  Ok(format!("{}\nBasic blocks: {:?}\n", table, blocks))
}

fn main() {

  let isa = match InstructionSet::standard() {
    Ok(isa) => isa,
    Err(e) => {
      eprintln!("Error: {}", e);
      std::process::exit(1);
    }
  };

  let program = match running_sum(&isa) {
    Ok(program) => program,
    Err(e) => {
      eprintln!("Error: {}", e);
      std::process::exit(1);
    }
  };

  match describe(&isa, &program) {
    Ok(text) => println!("{}", text),
    Err(e) => {
      eprintln!("Error: {}", e);
      std::process::exit(1);
    }
  }

  let stdout = io::stdout();
  let mut machine = Machine::new(&isa, program, stdout.lock());
  let state = machine.run().clone();
  println!("{}", machine);

  if let RunState::Faulted(_) = state {
    std::process::exit(1);
  }
}
