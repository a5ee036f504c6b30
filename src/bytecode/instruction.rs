use std::borrow::Cow;
use std::fmt::{Display, Formatter};

use string_cache::DefaultAtom;
use strum_macros::{Display as StrumDisplay, EnumIter, EnumString, IntoStaticStr};

/// The width in bytes of one integer slot in the stream.
pub const INT_SLOT_WIDTH: usize = 8;

/// The type integer operands are carried in. Values are restricted to the signed 32 bit
/// payload range even though each occupies an `INT_SLOT_WIDTH` byte slot.
pub type IntOperand = i64;

/**
  Mnemonics of the virtual machine, the union over every table revision.

  Unlike a `#[repr(u8)]` opcode enum, a `Mnemonic` carries no numeric value. Two revisions
  disagree about the numbers (`EQUAL` and `EQ` both claim 22 in different tables), so the
  number a mnemonic is encoded as is only known through an `OpcodeTable`.
*/
#[derive(
  StrumDisplay, IntoStaticStr, EnumString, EnumIter,
  Clone,        Copy,          Eq,         PartialEq, Debug, Hash, Ord, PartialOrd
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum Mnemonic {
  // Arithmetic //
  Nop,
  Add,
  Sub,
  Mul,
  Div,
  #[strum(to_string = "ADD1")]
  Add1,
  #[strum(to_string = "SUB1")]
  Sub1,
  #[strum(to_string = "ADD2")]
  Add2,
  #[strum(to_string = "SUB2")]
  Sub2,
  Print,
  Push,            // PUSH n
  Pop,

  // Comparisons //
  Equal,
  Eq,
  Lt,
  Lte,
  Gt,
  Gte,

  // Branches, all targeting an absolute byte offset //
  Jeq,             // JEQ offset
  Jneq,            // JNEQ offset
  Jmp,             // JMP offset
  Jeqb,            // JEQB offset
  Jneqb,           // JNEQB offset
  Jmpb,            // JMPB offset

  Load,            // LOAD n
  Ret,

  // Lists //
  Cons,
  Car,
  Cdr,

  // Literals and environment //
  PushNil,
  PushTrue,
  PushFalse,
  Set,             // SET name
  Ref,             // REF name

  // Functions //
  Func,            // FUNC name
  Fund,            // FUND params, body
  Funcs,
  Srot,            // SROT n

  // Extensions //
  Pushs,           // PUSHS text
  PushSym,         // PUSH_SYM name
  Fundd,
  Quote,

  Halt,
}

/// The kind of data trailing an opcode byte.
#[derive(StrumDisplay, Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum OperandShape {
  None,
  Int32,
  Int32Pair,
  CString,
}

impl OperandShape {
  /// The number of operand bytes following the opcode byte, or `None` for the
  /// variable-length `CString` shape.
  pub fn fixed_width(&self) -> Option<usize> {
    match self {
      OperandShape::None      => Some(0),
      OperandShape::Int32     => Some(INT_SLOT_WIDTH),
      OperandShape::Int32Pair => Some(2 * INT_SLOT_WIDTH),
      OperandShape::CString   => None
    }
  }

  /// The smallest number of operand bytes the shape can occupy.
  pub fn min_width(&self) -> usize {
    // An empty string still needs its terminator.
    self.fixed_width().unwrap_or(1)
  }
}

impl Mnemonic {
  /// The operand shape is a property of the mnemonic and holds for every revision.
  pub fn shape(&self) -> OperandShape {
    match self {

      | Mnemonic::Push
      | Mnemonic::Load
      | Mnemonic::Srot
      | Mnemonic::Jeq
      | Mnemonic::Jneq
      | Mnemonic::Jmp
      | Mnemonic::Jeqb
      | Mnemonic::Jneqb
      | Mnemonic::Jmpb => OperandShape::Int32,

      Mnemonic::Fund => OperandShape::Int32Pair,

      | Mnemonic::Set
      | Mnemonic::Ref
      | Mnemonic::Func
      | Mnemonic::Pushs
      | Mnemonic::PushSym => OperandShape::CString,

      _ => OperandShape::None

    }
  }

  pub fn name(&self) -> &'static str {
    self.into()
  }
}

/// The unencoded operand of an instruction. Strings are interned.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Operand {
  None,
  Int(IntOperand),
  IntPair(IntOperand, IntOperand),
  Str(DefaultAtom),
}

impl Operand {
  /// The shape this operand value has, regardless of which mnemonic carries it.
  pub fn shape(&self) -> OperandShape {
    match self {
      Operand::None          => OperandShape::None,
      Operand::Int(_)        => OperandShape::Int32,
      Operand::IntPair(_, _) => OperandShape::Int32Pair,
      Operand::Str(_)        => OperandShape::CString
    }
  }
}

/// Holds the unencoded components of an instruction. The operand is not checked against
/// the mnemonic here; that is the encoder's job.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Instruction {
  pub mnemonic : Mnemonic,
  pub operand  : Operand,
}

impl Instruction {
  pub fn new(mnemonic: Mnemonic, operand: Operand) -> Instruction {
    Instruction { mnemonic, operand }
  }

  pub fn nullary(mnemonic: Mnemonic) -> Instruction {
    Instruction::new(mnemonic, Operand::None)
  }

  pub fn int(mnemonic: Mnemonic, value: IntOperand) -> Instruction {
    Instruction::new(mnemonic, Operand::Int(value))
  }

  pub fn int_pair(mnemonic: Mnemonic, first: IntOperand, second: IntOperand) -> Instruction {
    Instruction::new(mnemonic, Operand::IntPair(first, second))
  }

  pub fn string(mnemonic: Mnemonic, text: &str) -> Instruction {
    Instruction::new(mnemonic, Operand::Str(DefaultAtom::from(text)))
  }

  /// The number of bytes this instruction occupies once encoded, opcode byte included.
  pub fn encoded_len(&self) -> usize {
    1 + match &self.operand {
      Operand::None          => 0,
      Operand::Int(_)        => INT_SLOT_WIDTH,
      Operand::IntPair(_, _) => 2 * INT_SLOT_WIDTH,
      Operand::Str(text)     => text.len() + 1
    }
  }
}

/**
  The assembly form of a string operand. Text that reads back as a bare symbol is written as
  is; anything else is double quoted with `\\`, `\"`, `\n`, `\r` and `\t` escaped.
*/
pub fn string_literal(text: &str) -> Cow<'_, str> {
  let bare = text.chars().next().map_or(false, |c| !c.is_ascii_digit() && c != '-')
    && !text.chars().any(|c| c.is_whitespace() || ",;#\"\\".contains(c));
  if bare {
    return Cow::Borrowed(text);
  }

  let mut quoted = String::with_capacity(text.len() + 2);
  quoted.push('"');
  for c in text.chars() {
    match c {
      '\\' => quoted.push_str("\\\\"),
      '"'  => quoted.push_str("\\\""),
      '\n' => quoted.push_str("\\n"),
      '\r' => quoted.push_str("\\r"),
      '\t' => quoted.push_str("\\t"),
      _    => quoted.push(c)
    }
  }
  quoted.push('"');
  Cow::Owned(quoted)
}

impl Display for Instruction {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match &self.operand {

      Operand::None => {
        write!(f, "{}", self.mnemonic)
      }

      Operand::Int(value) => {
        write!(f, "{} {}", self.mnemonic, value)
      }

      Operand::IntPair(first, second) => {
        write!(f, "{} {}, {}", self.mnemonic, first, second)
      }

      Operand::Str(text) => {
        write!(f, "{} {}", self.mnemonic, string_literal(text))
      }

    }
  }
}


#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use strum::IntoEnumIterator;

  use super::*;

  #[test]
  fn mnemonic_names_match_the_listing_text() {
    assert_eq!(Mnemonic::PushNil.to_string(), "PUSH_NIL");
    assert_eq!(Mnemonic::PushSym.to_string(), "PUSH_SYM");
    assert_eq!(Mnemonic::Add1.to_string(), "ADD1");
    assert_eq!(Mnemonic::Jneqb.name(), "JNEQB");
    assert_eq!(Mnemonic::from_str("push_false"), Ok(Mnemonic::PushFalse));
    assert_eq!(Mnemonic::from_str("sub2"), Ok(Mnemonic::Sub2));
    assert!(Mnemonic::from_str("BOGUS").is_err());
  }

  #[test]
  fn every_mnemonic_parses_back_from_its_name() {
    for mnemonic in Mnemonic::iter() {
      assert_eq!(Mnemonic::from_str(mnemonic.name()), Ok(mnemonic));
    }
  }

  #[test]
  fn shapes() {
    assert_eq!(Mnemonic::Push.shape(), OperandShape::Int32);
    assert_eq!(Mnemonic::Jmpb.shape(), OperandShape::Int32);
    assert_eq!(Mnemonic::Fund.shape(), OperandShape::Int32Pair);
    assert_eq!(Mnemonic::Ref.shape(), OperandShape::CString);
    assert_eq!(Mnemonic::Halt.shape(), OperandShape::None);
    assert_eq!(Mnemonic::Fundd.shape(), OperandShape::None);

    assert_eq!(OperandShape::Int32.fixed_width(), Some(8));
    assert_eq!(OperandShape::Int32Pair.fixed_width(), Some(16));
    assert_eq!(OperandShape::CString.fixed_width(), None);
    assert_eq!(OperandShape::CString.min_width(), 1);
  }

  #[test]
  fn encoded_len_counts_the_terminator() {
    assert_eq!(Instruction::nullary(Mnemonic::Add).encoded_len(), 1);
    assert_eq!(Instruction::int(Mnemonic::Push, -1).encoded_len(), 9);
    assert_eq!(Instruction::int_pair(Mnemonic::Fund, 2, 40).encoded_len(), 17);
    assert_eq!(Instruction::string(Mnemonic::Set, "x").encoded_len(), 3);
  }

  #[test]
  fn display() {
    assert_eq!(Instruction::int(Mnemonic::Push, 10).to_string(), "PUSH 10");
    assert_eq!(Instruction::int_pair(Mnemonic::Fund, 1, 35).to_string(), "FUND 1, 35");
    assert_eq!(Instruction::string(Mnemonic::Set, "x").to_string(), "SET x");
    assert_eq!(Instruction::string(Mnemonic::Pushs, "a b").to_string(), "PUSHS \"a b\"");
    assert_eq!(Instruction::string(Mnemonic::Ref, "42").to_string(), "REF \"42\"");
    assert_eq!(Instruction::nullary(Mnemonic::PushTrue).to_string(), "PUSH_TRUE");
  }

  #[test]
  fn string_literal_escapes() {
    assert_eq!(string_literal("lambda"), "lambda");
    assert_eq!(string_literal(""), "\"\"");
    assert_eq!(string_literal("say \"hi\""), "\"say \\\"hi\\\"\"");
    assert_eq!(string_literal("two\nlines"), "\"two\\nlines\"");
    assert_eq!(string_literal("a\\b"), "\"a\\\\b\"");
    assert_eq!(string_literal("x "), "\"x \"");
  }
}
