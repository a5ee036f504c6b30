/*!
  Fixture programs used to exercise the encoder and the disassembler.

  Branch and return targets are byte offsets, so they depend on the encoded width of every
  instruction before the target. Programs are written with placeholder operands first and the
  targets are patched in afterward, by instruction index.
*/

use strum_macros::{Display as StrumDisplay, EnumIter, EnumString};

use crate::bytecode::{Instruction, IntOperand, Mnemonic, Operand};

#[derive(StrumDisplay, EnumString, EnumIter, Clone, Copy, Eq, PartialEq, Debug)]
#[strum(serialize_all = "kebab-case")]
pub enum Sample {
  /// `[PUSH 10, PUSH 20, ADD, PRINT, HALT]`
  Arithmetic,
  /// Builds a one element list, then counts down from 9 printing each value.
  ConsList,
  /// Recursive fibonacci of 10.
  Fib,
}

impl Sample {
  pub fn program(&self) -> Vec<Instruction> {
    match self {
      Sample::Arithmetic => arithmetic(),
      Sample::ConsList   => cons_list(),
      Sample::Fib        => fib(10)
    }
  }
}

/// The byte offset at which the instruction at `index` starts.
pub fn offset_of(program: &[Instruction], index: usize) -> IntOperand {
  program[..index].iter().map(Instruction::encoded_len).sum::<usize>() as IntOperand
}

/// Points the integer operand of `program[at]` at the instruction at index `target`.
fn patch_target(program: &mut Vec<Instruction>, at: usize, target: usize) {
  let offset = offset_of(program, target);
  program[at].operand = Operand::Int(offset);
}

pub fn arithmetic() -> Vec<Instruction> {
  vec![
    Instruction::int(Mnemonic::Push, 10),
    Instruction::int(Mnemonic::Push, 20),
    Instruction::nullary(Mnemonic::Add),
    Instruction::nullary(Mnemonic::Print),
    Instruction::nullary(Mnemonic::Halt),
  ]
}

pub fn cons_list() -> Vec<Instruction> {
  let mut program = vec![
    Instruction::nullary(Mnemonic::PushNil),   //  0
    Instruction::int(Mnemonic::Push, 10),      //  1
    Instruction::nullary(Mnemonic::Cons),      //  2
    Instruction::int(Mnemonic::Push, 9),       //  3
    Instruction::int(Mnemonic::Load, 0),       //  4  loop:
    Instruction::int(Mnemonic::Push, 0),       //  5
    Instruction::nullary(Mnemonic::Gt),        //  6
    Instruction::int(Mnemonic::Jneq, 0),       //  7  -> done
    Instruction::int(Mnemonic::Push, 0),       //  8
    Instruction::int(Mnemonic::Load, 0),       //  9
    Instruction::nullary(Mnemonic::Print),     // 10
    Instruction::int(Mnemonic::Jmp, 0),        // 11  -> loop
    Instruction::int(Mnemonic::Push, 100),     // 12  done:
    Instruction::nullary(Mnemonic::Print),     // 13
    Instruction::nullary(Mnemonic::Halt),      // 14
  ];
  patch_target(&mut program, 7, 12);
  patch_target(&mut program, 11, 4);
  program
}

pub fn fib(n: IntOperand) -> Vec<Instruction> {
  let mut program = vec![
    Instruction::int(Mnemonic::Push, n),       //  0
    Instruction::int(Mnemonic::Push, 0),       //  1  return address -> exit
    Instruction::int(Mnemonic::Jmp, 0),        //  2  -> fib
    Instruction::nullary(Mnemonic::Print),     //  3  exit:
    Instruction::nullary(Mnemonic::Halt),      //  4
    Instruction::int(Mnemonic::Load, 2),       //  5  fib:
    Instruction::int(Mnemonic::Push, 2),       //  6
    Instruction::nullary(Mnemonic::Lt),        //  7
    Instruction::int(Mnemonic::Jeq, 0),        //  8  -> base
    Instruction::int(Mnemonic::Load, 2),       //  9
    Instruction::int(Mnemonic::Push, 1),       // 10
    Instruction::nullary(Mnemonic::Sub),       // 11
    Instruction::int(Mnemonic::Push, 0),       // 12  return address -> second
    Instruction::int(Mnemonic::Jmp, 0),        // 13  -> fib
    Instruction::int(Mnemonic::Load, 3),       // 14  second:
    Instruction::int(Mnemonic::Push, 2),       // 15
    Instruction::nullary(Mnemonic::Sub),       // 16
    Instruction::int(Mnemonic::Push, 0),       // 17  return address -> sum
    Instruction::int(Mnemonic::Jmp, 0),        // 18  -> fib
    Instruction::nullary(Mnemonic::Add),       // 19  sum:
    Instruction::nullary(Mnemonic::Ret),       // 20
    Instruction::int(Mnemonic::Push, 1),       // 21  base:
    Instruction::nullary(Mnemonic::Ret),       // 22
  ];
  for (at, target) in &[(1, 3), (2, 5), (8, 21), (12, 14), (13, 5), (17, 19), (18, 5)] {
    patch_target(&mut program, *at, *target);
  }
  program
}
