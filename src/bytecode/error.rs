//! Errors of the opcode table, the encoder, and the decoder. Every error carries enough
//! context to locate the fault: the instruction index when encoding, the byte offset of the
//! faulting opcode when decoding.

use thiserror::Error;

use super::instruction::{IntOperand, Mnemonic, OperandShape};
use super::table::Revision;

/// A tag byte has no entry in the table revision it was looked up in.
#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
#[error("opcode {code} is not defined in the {revision} table")]
pub struct UnknownOpcode {
  pub code     : u8,
  pub revision : Revision,
}

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum EncodeError {
  #[error("instruction {index}: {mnemonic} has no opcode in the {revision} table")]
  NotInRevision {
    index    : usize,
    mnemonic : Mnemonic,
    revision : Revision,
  },

  #[error("instruction {index}: {mnemonic} takes a {expected} operand but was given {found}")]
  OperandShapeMismatch {
    index    : usize,
    mnemonic : Mnemonic,
    expected : OperandShape,
    found    : OperandShape,
  },

  #[error("instruction {index}: {mnemonic} operand {value} does not fit in 32 bits")]
  OperandOverflow {
    index    : usize,
    mnemonic : Mnemonic,
    value    : IntOperand,
  },

  #[error("instruction {index}: {mnemonic} string operand contains a zero byte")]
  EmbeddedNul {
    index    : usize,
    mnemonic : Mnemonic,
  },
}

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum DecodeError {
  #[error("offset {offset}: unknown opcode {code}")]
  UnknownOpcode {
    offset : usize,
    code   : u8,
  },

  #[error("offset {offset}: {mnemonic} expects a {shape} operand but the stream ends first")]
  TruncatedOperand {
    offset   : usize,
    mnemonic : Mnemonic,
    shape    : OperandShape,
  },

  #[error("offset {offset}: {mnemonic} operand {value} does not fit in 32 bits")]
  OperandOverflow {
    offset   : usize,
    mnemonic : Mnemonic,
    value    : IntOperand,
  },

  #[error("offset {offset}: {mnemonic} string operand is not valid UTF-8")]
  NonUtf8String {
    offset   : usize,
    mnemonic : Mnemonic,
  },
}

impl DecodeError {
  /// The byte offset of the instruction that could not be decoded.
  pub fn offset(&self) -> usize {
    match self {
      | DecodeError::UnknownOpcode    { offset, .. }
      | DecodeError::TruncatedOperand { offset, .. }
      | DecodeError::OperandOverflow  { offset, .. }
      | DecodeError::NonUtf8String    { offset, .. } => *offset
    }
  }
}
