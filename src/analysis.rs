/*!
  Control-flow analysis over a decoded program.

  A *leader* is the first instruction of a basic block: the start of the program, the target
  of a branch, or the instruction following a branch. Offsets past the end of the program are
  not leaders; control reaching one simply halts. Neither are targets that land inside an
  instruction, so every block begins and ends on an instruction boundary.
*/

use std::collections::BTreeSet;
use std::ops::Range;

use crate::error::DecodeError;
use crate::isa::InstructionSet;
use crate::program::Program;

pub fn find_leaders(isa: &InstructionSet, program: &Program) -> Result<BTreeSet<usize>, DecodeError> {
  let mut leaders = BTreeSet::new();
  if program.is_empty() {
    return Ok(leaders);
  }
  leaders.insert(0);

  let instructions = program.disassemble(isa)?;
  let starts: BTreeSet<usize> = instructions.iter().map(|(pc, _)| *pc).collect();

  for (pc, instruction) in &instructions {
    if !instruction.operation.is_branch() {
      continue;
    }

    // Only targets on an instruction boundary start a block.
    if let Some(target) = instruction.immediate() {
      if starts.contains(&(target as usize)) {
        leaders.insert(target as usize);
      }
    }

    let next = pc + isa.by_opcode(instruction.opcode).map_or(1, |entry| entry.size());
    if starts.contains(&next) {
      leaders.insert(next);
    }
  }

  #[cfg(feature = "trace_computation")]
    println!("leaders: {:?}", leaders);

  Ok(leaders)
}

/// Splits the program into byte ranges, one per basic block, in program order.
pub fn basic_blocks(isa: &InstructionSet, program: &Program) -> Result<Vec<Range<usize>>, DecodeError> {
  let leaders: Vec<usize> = find_leaders(isa, program)?.into_iter().collect();

  let blocks =
    leaders.iter()
           .enumerate()
           .map(|(i, start)| {
             let end = leaders.get(i + 1).copied().unwrap_or_else(|| program.len());
             *start..end
           })
           .collect();

  Ok(blocks)
}
