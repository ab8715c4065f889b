//! The execution engine: a fetch-decode-execute loop over a byte-addressed program.
//!
//! A `Machine` owns its registers, accumulator, program counter, and output sink. The only
//! thing machines share is the `InstructionSet` they borrow, so any number of them can run
//! side by side.

use std::fmt::{Display, Formatter};
use std::io::Write;

use prettytable::{format as TableFormat, Table};

use crate::bytecode::{try_decode_instruction, Decoded, Operand, Operation, RegisterIndex, Word};
use crate::error::Fault;
use crate::isa::InstructionSet;
use crate::program::Program;
use crate::registers::{RegisterFile, MAX_REGISTERS};

/// Run-time configuration of a machine.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MachineConfig {
  /// Size of the register file. Register fields can name 256 registers; any index at or past
  /// this count faults.
  pub register_count: usize,
}

impl Default for MachineConfig {
  fn default() -> Self {
    MachineConfig { register_count: MAX_REGISTERS }
  }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RunState {
  Running,
  /// The program counter ran off the end of the program. This is the normal way to stop.
  Halted,
  Faulted(Fault),
}

impl RunState {
  pub fn is_running(&self) -> bool {
    *self == RunState::Running
  }

  /// Neither `Halted` nor `Faulted` ever resumes.
  pub fn is_terminal(&self) -> bool {
    !self.is_running()
  }
}

impl Display for RunState {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      RunState::Running       => write!(f, "Running"),
      RunState::Halted        => write!(f, "Halted"),
      RunState::Faulted(fault) => write!(f, "Faulted: {}", fault),
    }
  }
}

pub struct Machine<'isa, W: Write> {
  isa         : &'isa InstructionSet,
  program     : Program,
  registers   : RegisterFile,
  accumulator : Word,
  pc          : usize,
  state       : RunState,
  output      : W,
  steps       : u64,
  // For display only: the register written by the most recent instruction.
  last_write  : Option<RegisterIndex>,
}

impl<'isa, W: Write> Machine<'isa, W> {

  pub fn new(isa: &'isa InstructionSet, program: Program, output: W) -> Machine<'isa, W> {
    Machine::with_config(isa, program, output, MachineConfig::default())
  }

  pub fn with_config(
    isa     : &'isa InstructionSet,
    program : Program,
    output  : W,
    config  : MachineConfig
  ) -> Machine<'isa, W>
  {
    Machine {
      isa,
      program,
      registers   : RegisterFile::new(config.register_count),
      accumulator : 0,
      pc          : 0,
      state       : RunState::Running,
      output,
      steps       : 0,
      last_write  : None,
    }
  }

  // region Accessors

  pub fn pc(&self) -> usize {
    self.pc
  }

  pub fn accumulator(&self) -> Word {
    self.accumulator
  }

  pub fn register(&self, index: RegisterIndex) -> Option<Word> {
    self.registers.get(index)
  }

  pub fn registers(&self) -> &RegisterFile {
    &self.registers
  }

  pub fn state(&self) -> &RunState {
    &self.state
  }

  /// Number of instructions executed to completion.
  pub fn steps(&self) -> u64 {
    self.steps
  }

  pub fn program(&self) -> &Program {
    &self.program
  }

  pub fn output(&self) -> &W {
    &self.output
  }

  pub fn into_output(self) -> W {
    self.output
  }

  // endregion

  // region Execution

  /// Runs until the machine halts or faults.
  pub fn run(&mut self) -> &RunState {
    while self.state.is_running() {
      self.step();
    }
    &self.state
  }

  /// Runs at most `max_steps` steps. The machine may still be `Running` afterward.
  pub fn run_for(&mut self, max_steps: u64) -> &RunState {
    for _ in 0..max_steps {
      if self.state.is_terminal() {
        break;
      }
      self.step();
    }
    &self.state
  }

  /**
    Executes one instruction. A machine that has halted or faulted is left exactly as it is.

    Running off the end of the program halts. A decode failure or an out-of-range register
    faults, and a fault never changes registers, the accumulator, or the program counter.
  */
  pub fn step(&mut self) -> &RunState {
    if self.state.is_terminal() {
      return &self.state;
    }

    if self.pc >= self.program.len() {
      #[cfg(feature = "trace_computation")]
        println!("halt: offset {} is past the end of the program", self.pc);
      self.state = RunState::Halted;
      return &self.state;
    }

    let decoded = match try_decode_instruction(self.isa, self.program.as_bytes(), self.pc) {
      Ok(decoded) => decoded,
      Err(e)      => return self.fault(e.into())
    };

    #[cfg(feature = "trace_computation")] println!("{:>6}: {}", self.pc, decoded.instruction);

    match self.execute(&decoded) {
      Ok(next_pc) => {
        self.pc     = next_pc;
        self.steps += 1;
      }
      Err(fault) => return self.fault(fault)
    }

    #[cfg(feature = "trace_computation")] println!("{}", self);

    &self.state
  }

  fn fault(&mut self, fault: Fault) -> &RunState {
    #[cfg(feature = "trace_computation")] println!("fault: {}", fault);
    self.state = RunState::Faulted(fault);
    &self.state
  }

  /// Applies the semantics of one instruction and returns the next program counter. Every
  /// arm does all of its reads before its one write, so an `Err` leaves the state untouched.
  fn execute(&mut self, decoded: &Decoded) -> Result<usize, Fault> {
    let instruction = &decoded.instruction;
    let mut next_pc = decoded.next_pc;
    self.last_write = None;

    match (instruction.operation, instruction.operands.as_slice()) {

      (Operation::Mov, [Operand::Register(v1), Operand::Register(v2)]) => {
        let value = self.read(*v2)?;
        self.write(*v1, value)?;
      }

      (Operation::Movi, [Operand::Register(v1), Operand::Immediate(imm)]) => {
        self.write(*v1, *imm)?;
      }

      (Operation::Ldai, [Operand::Immediate(imm)]) => {
        self.accumulator = *imm;
      }

      (Operation::Lda, [Operand::Register(v1)]) => {
        self.accumulator = self.read(*v1)?;
      }

      (Operation::Sta, [Operand::Register(v1)]) => {
        self.write(*v1, self.accumulator)?;
      }

      (Operation::Add, [Operand::Register(v1)]) => {
        self.accumulator = self.accumulator.wrapping_add(self.read(*v1)?);
      }

      (Operation::Dec, [Operand::Register(v1)]) => {
        let value = self.read(*v1)?;
        self.write(*v1, value.wrapping_sub(1))?;
      }

      // Jumps when the registers are *equal*, despite the mnemonic.
      (Operation::Bne, [Operand::Register(v1), Operand::Register(v2), Operand::Immediate(target)]) => {
        if self.read(*v1)? == self.read(*v2)? {
          next_pc = *target as usize;
        }
      }

      (Operation::Print, []) => {
        if let Err(e) = writeln!(self.output, "{}", self.accumulator) {
          return Err(Fault::Output { pc: self.pc, kind: e.kind() });
        }
      }

      (operation, operands) => {
        unreachable!(
          "Instruction set construction admitted `{}` with operands {:?}.",
          operation,
          operands
        );
      }

    }

    Ok(next_pc)
  }

  fn read(&self, index: RegisterIndex) -> Result<Word, Fault> {
    self.registers.get(index).ok_or(Fault::RegisterOutOfRange {
      pc: self.pc,
      register: index,
      register_count: self.registers.len()
    })
  }

  fn write(&mut self, index: RegisterIndex, value: Word) -> Result<(), Fault> {
    match self.registers.set(index, value) {
      Some(()) => {
        self.last_write = Some(index);
        Ok(())
      }
      None => Err(Fault::RegisterOutOfRange {
        pc: self.pc,
        register: index,
        register_count: self.registers.len()
      })
    }
  }

  // endregion

}


lazy_static! {
  pub(crate) static ref TABLE_DISPLAY_FORMAT: TableFormat::TableFormat =
    TableFormat::FormatBuilder::new()
      .column_separator('│')
      .borders(' ')
      .separator(
        TableFormat::LinePosition::Title,
        TableFormat::LineSeparator::new('─', '┼', ' ', ' ')
      )
      .separator(
        TableFormat::LinePosition::Bottom,
        TableFormat::LineSeparator::new('─', '┴', ' ', ' ')
      )
      .padding(1, 1)
      .build();
}

impl<'isa, W: Write> Display for Machine<'isa, W> {
  // Zero registers are left out; there are usually 256 of them.
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Register", ubl->"Contents"]);
    table.add_row(row![r->"PC =", self.pc]);
    table.add_row(row![r->"ACC =", self.accumulator]);

    for (index, value) in self.registers.iter() {
      match Some(index) == self.last_write {

        true  => {
          table.add_row(row![r->format!("* --> v{} =", index), value]);
        }

        false if value != 0 => {
          table.add_row(row![r->format!("v{} =", index), value]);
        }

        false => {}

      }
    }

    write!(f, "State: {}\tSteps: {}\n{}", self.state, self.steps, table)
  }
}
