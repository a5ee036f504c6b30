/*!
  Bytecode for a small stack based virtual machine: the instruction set tables, an encoder
  from instructions to a byte stream, a disassembler from a byte stream back to instructions,
  and the console listing of the result.
*/

pub mod bytecode;
pub mod listing;
pub mod samples;

pub use bytecode::{
  decode, decode_all, encode, parse_assembly, DecodeError, Decoder, EncodeError, Encoder,
  Instruction, Mnemonic, OpcodeTable, Operand, OperandShape, Record, Revision
};
pub use listing::{listing_table, render, Listing};
