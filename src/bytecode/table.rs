/*!
  Opcode tables. A table is the single source of truth for which byte a mnemonic is encoded
  as. Revisions of the instruction set disagree about numbering, so a table is always picked
  explicitly and handed to the encoder or decoder; nothing reads a process wide table.

  Both tables are built once, lazily, and live for the life of the program.
*/

use std::fmt::{Display, Formatter};

use bimap::BiMap;
use lazy_static::lazy_static;
use strum_macros::{Display as StrumDisplay, EnumIter, EnumString, IntoStaticStr};

use super::error::UnknownOpcode;
use super::instruction::{Mnemonic, OperandShape};

#[derive(
  StrumDisplay, IntoStaticStr, EnumString, EnumIter,
  Clone,        Copy,          Eq,         PartialEq, Debug, Hash
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Revision {
  /// The table the bytecode generator scripts were written against: `EQUAL` is 22, `EQ` is
  /// 70, and there is no `QUOTE`.
  Classic,
  /// The later runtime table: `EQ` takes over 22, `EQUAL` is gone, and `QUOTE` is 70.
  Runtime,
}

impl Default for Revision {
  fn default() -> Revision {
    Revision::Classic
  }
}

/// Opcodes common to every revision.
const SHARED_OPCODES: &[(Mnemonic, u8)] = &[
  (Mnemonic::Nop,        0),
  (Mnemonic::Add,        1),
  (Mnemonic::Sub,        2),
  (Mnemonic::Mul,        3),
  (Mnemonic::Div,        4),
  (Mnemonic::Add1,       5),
  (Mnemonic::Sub1,       6),
  (Mnemonic::Add2,       7),
  (Mnemonic::Sub2,       8),
  (Mnemonic::Print,     10),
  (Mnemonic::Push,      20),
  (Mnemonic::Pop,       21),
  (Mnemonic::Lt,        23),
  (Mnemonic::Lte,       24),
  (Mnemonic::Gt,        25),
  (Mnemonic::Gte,       26),
  (Mnemonic::Jeq,       30),
  (Mnemonic::Jneq,      31),
  (Mnemonic::Jmp,       32),
  (Mnemonic::Jeqb,      33),
  (Mnemonic::Jneqb,     34),
  (Mnemonic::Jmpb,      35),
  (Mnemonic::Load,      40),
  (Mnemonic::Ret,       41),
  (Mnemonic::Cons,      42),
  (Mnemonic::Car,       43),
  (Mnemonic::Cdr,       44),
  (Mnemonic::PushNil,   50),
  (Mnemonic::PushTrue,  51),
  (Mnemonic::PushFalse, 52),
  (Mnemonic::Set,       53),
  (Mnemonic::Ref,       54),
  (Mnemonic::Func,      55),
  (Mnemonic::Fund,      56),
  (Mnemonic::Funcs,     57),
  (Mnemonic::Srot,      58),
  (Mnemonic::Pushs,     60),
  (Mnemonic::PushSym,   61),
  (Mnemonic::Fundd,     62),
  (Mnemonic::Halt,     100),
];

const CLASSIC_OPCODES: &[(Mnemonic, u8)] = &[
  (Mnemonic::Equal, 22),
  (Mnemonic::Eq,    70),
];

const RUNTIME_OPCODES: &[(Mnemonic, u8)] = &[
  (Mnemonic::Eq,    22),
  (Mnemonic::Quote, 70),
];

lazy_static! {
  static ref CLASSIC_TABLE: OpcodeTable = OpcodeTable::build(Revision::Classic, CLASSIC_OPCODES);
  static ref RUNTIME_TABLE: OpcodeTable = OpcodeTable::build(Revision::Runtime, RUNTIME_OPCODES);
}

/// A bidirectional mapping between mnemonics and their opcode bytes for one revision.
#[derive(Debug)]
pub struct OpcodeTable {
  revision : Revision,
  codes    : BiMap<Mnemonic, u8>,
}

impl OpcodeTable {

  fn build(revision: Revision, extra: &[(Mnemonic, u8)]) -> OpcodeTable {
    let mut codes = BiMap::new();
    for (mnemonic, code) in SHARED_OPCODES.iter().chain(extra.iter()) {
      // The lists above are fixed; a collision is a mistake in them.
      let inserted = codes.insert_no_overwrite(*mnemonic, *code);
      debug_assert!(inserted.is_ok(), "{} assigns {} twice", revision, code);
    }
    OpcodeTable { revision, codes }
  }

  pub fn for_revision(revision: Revision) -> &'static OpcodeTable {
    match revision {
      Revision::Classic => &*CLASSIC_TABLE,
      Revision::Runtime => &*RUNTIME_TABLE
    }
  }

  pub fn revision(&self) -> Revision {
    self.revision
  }

  /// Resolves a tag byte to its mnemonic.
  pub fn mnemonic(&self, code: u8) -> Result<Mnemonic, UnknownOpcode> {
    self.codes
        .get_by_right(&code)
        .copied()
        .ok_or(UnknownOpcode { code, revision: self.revision })
  }

  /// The tag byte for a mnemonic, if this revision defines it.
  pub fn code(&self, mnemonic: Mnemonic) -> Option<u8> {
    self.codes.get_by_left(&mnemonic).copied()
  }

  /// Resolves a tag byte to the shape of the operand that follows it.
  pub fn shape(&self, code: u8) -> Result<OperandShape, UnknownOpcode> {
    self.mnemonic(code).map(|mnemonic| mnemonic.shape())
  }

  pub fn contains(&self, mnemonic: Mnemonic) -> bool {
    self.codes.contains_left(&mnemonic)
  }

  pub fn len(&self) -> usize {
    self.codes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.codes.is_empty()
  }

  /// All `(code, mnemonic)` entries in ascending code order.
  pub fn entries(&self) -> Vec<(u8, Mnemonic)> {
    let mut entries: Vec<(u8, Mnemonic)> =
      self.codes.iter().map(|(mnemonic, code)| (*code, *mnemonic)).collect();
    entries.sort_unstable();
    entries
  }

}

impl Display for OpcodeTable {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    writeln!(f, "{} table ({} opcodes)", self.revision, self.len())?;
    for (code, mnemonic) in self.entries() {
      writeln!(f, "{:>4}  {:<10}  {}", code, mnemonic.name(), mnemonic.shape())?;
    }
    Ok(())
  }
}
