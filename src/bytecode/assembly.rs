/*!
  The human readable textual form of bytecode is called assembly. This module leverages the
  `strum` derives of `Mnemonic` to read assembly back into instructions.

  One instruction per line:

    PUSH 10          ; comments start with `;` or `#`
    FUND 2, 35
    SET x
    PUSHS "two words"

  Mnemonics are case insensitive. String operands are bare symbols or double quoted; inside
  quotes `\\`, `\"`, `\n`, `\r` and `\t` are escapes.
*/

use std::borrow::Cow;
use std::str::FromStr;

use nom::{
  branch::alt,
  bytes::complete::{escaped_transform, is_not, tag, take_while1},
  character::complete::{char as one_char, digit1, one_of, space0, space1},
  combinator::{all_consuming, map, opt, recognize, rest, value},
  multi::separated_list1,
  sequence::{delimited, pair, preceded, terminated, tuple},
  IResult
};
use string_cache::DefaultAtom;
use thiserror::Error;

use super::instruction::{Instruction, IntOperand, Mnemonic, Operand, OperandShape};

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum AssemblyError {
  #[error("Error on line {line}: cannot parse `{text}`")]
  Syntax {
    line : usize,
    text : String,
  },

  #[error("Error on line {line}: {name} is not an operation")]
  UnknownMnemonic {
    line : usize,
    name : String,
  },

  #[error("Error on line {line}: {mnemonic} requires a {expected} operand")]
  WrongOperands {
    line     : usize,
    mnemonic : Mnemonic,
    expected : OperandShape,
  },

  #[error("Error on line {line}: {text} is not a representable integer")]
  BadInteger {
    line : usize,
    text : String,
  },
}

/// An operand as written, before the mnemonic tells us how to read it.
#[derive(Clone, Debug, Eq, PartialEq)]
enum OperandText<'a> {
  Int(&'a str),
  Text(Cow<'a, str>),
}

type ParsedLine<'a> = Option<(&'a str, Vec<OperandText<'a>>)>;

fn mnemonic_p(input: &str) -> IResult<&str, &str> {
  take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)
}

fn integer_p(input: &str) -> IResult<&str, OperandText> {
  map(recognize(pair(opt(one_char('-')), digit1)), OperandText::Int)(input)
}

fn escape_p(input: &str) -> IResult<&str, &str> {
  alt((
    value("\\", tag("\\")),
    value("\"",  tag("\"")),
    value("\n",  tag("n")),
    value("\r",  tag("r")),
    value("\t",  tag("t")),
  ))(input)
}

fn quoted_p(input: &str) -> IResult<&str, OperandText> {
  // `escaped_transform` rejects empty input, hence the `opt`.
  let body = map(
    opt(escaped_transform(is_not("\\\""), '\\', escape_p)),
    Option::unwrap_or_default
  );
  map(
    delimited(one_char('"'), body, one_char('"')),
    |text: String| OperandText::Text(Cow::Owned(text))
  )(input)
}

fn symbol_p(input: &str) -> IResult<&str, OperandText> {
  map(
    take_while1(|c: char| !c.is_whitespace() && !",;#\"".contains(c)),
    |text: &str| OperandText::Text(Cow::Borrowed(text))
  )(input)
}

fn operand_p(input: &str) -> IResult<&str, OperandText> {
  alt((integer_p, quoted_p, symbol_p))(input)
}

fn instruction_p(input: &str) -> IResult<&str, (&str, Vec<OperandText>)> {
  pair(
    mnemonic_p,
    map(
      opt(preceded(
        space1,
        separated_list1(delimited(space0, one_char(','), space0), operand_p)
      )),
      Option::unwrap_or_default
    )
  )(input)
}

fn line_p(input: &str) -> IResult<&str, ParsedLine> {
  all_consuming(
    terminated(
      preceded(space0, opt(instruction_p)),
      tuple((space0, opt(preceded(one_of(";#"), rest))))
    )
  )(input)
}

fn parse_integer(line: usize, text: &str) -> Result<IntOperand, AssemblyError> {
  text.parse::<IntOperand>()
      .map_err(|_| AssemblyError::BadInteger { line, text: text.to_string() })
}

fn build_instruction(line: usize, name: &str, operands: &[OperandText])
  -> Result<Instruction, AssemblyError>
{
  let mnemonic =
    Mnemonic::from_str(name)
      .map_err(|_| AssemblyError::UnknownMnemonic { line, name: name.to_string() })?;
  let expected = mnemonic.shape();

  let operand = match (expected, operands) {

    (OperandShape::None, []) => Operand::None,

    (OperandShape::Int32, [OperandText::Int(value)]) => {
      Operand::Int(parse_integer(line, value)?)
    }

    (OperandShape::Int32Pair, [OperandText::Int(first), OperandText::Int(second)]) => {
      Operand::IntPair(parse_integer(line, first)?, parse_integer(line, second)?)
    }

    (OperandShape::CString, [OperandText::Text(text)]) => {
      Operand::Str(DefaultAtom::from(&**text))
    }

    _ => {
      return Err(AssemblyError::WrongOperands { line, mnemonic, expected });
    }

  };

  Ok(Instruction::new(mnemonic, operand))
}

/// Parses assembly text into instructions, stopping at the first bad line. Line numbers in
/// errors count from 1.
pub fn parse_assembly(text: &str) -> Result<Vec<Instruction>, AssemblyError> {
  let mut instructions = vec![];

  for (index, source_line) in text.lines().enumerate() {
    let line = index + 1;
    let parsed =
      match line_p(source_line) {
        Ok((_rest, parsed)) => parsed,
        Err(_e) => {
          return Err(AssemblyError::Syntax { line, text: source_line.trim().to_string() });
        }
      };

    if let Some((name, operands)) = parsed {
      instructions.push(build_instruction(line, name, &operands)?);
    }
  }

  Ok(instructions)
}
