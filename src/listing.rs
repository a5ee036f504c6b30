//! Console rendering of decoded instructions, either as aligned text lines or as a table.

use std::fmt::{Display, Formatter};

use lazy_static::lazy_static;
use prettytable::{format as TableFormat, row, Table};

use crate::bytecode::{string_literal, DecodeError, Decoder, OpcodeTable, Operand, Record};

/// Mnemonic column width; the longest mnemonic is `PUSH_FALSE`.
const MNEMONIC_WIDTH: usize = 10;
const OPERAND_WIDTH: usize = 6;

lazy_static! {
  static ref TABLE_DISPLAY_FORMAT: TableFormat::TableFormat =
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

/// Operands in assembly syntax, each right-aligned to `width`.
fn operand_text(operand: &Operand, width: usize) -> String {
  match operand {
    Operand::None => String::new(),
    Operand::Int(value) => format!("{:>w$}", value, w = width),
    Operand::IntPair(first, second) => format!("{:>w$}, {:>w$}", first, second, w = width),
    Operand::Str(text) => format!("{:>w$}", string_literal(text), w = width),
  }
}

/**
  Renders one record as a listing line: the offset right-aligned, the mnemonic padded to a
  fixed column, then the operand right-aligned. Past the offset column the line is valid
  assembly.

  ```text
     0: PUSH           10
    18: ADD
    19: FUND            2,     35
  ```
*/
pub fn render(record: &Record) -> String {
  let line = format!(
    "{:>4}: {:<w$} {}",
    record.offset,
    record.mnemonic().name(),
    operand_text(record.operand(), OPERAND_WIDTH),
    w = MNEMONIC_WIDTH
  );
  match record.operand() {
    Operand::None => line.trim_end().to_string(),
    _             => line
  }
}

/// Builds a boxed table of records with offset, mnemonic, and operand columns.
pub fn listing_table(records: &[Record]) -> Table {
  let mut table = Table::new();

  table.set_format(*TABLE_DISPLAY_FORMAT);
  table.set_titles(row![ubr->"Offset", ubl->"Instruction", ubr->"Operand"]);

  for record in records {
    table.add_row(
      row![
        r->record.offset,
        record.mnemonic().name(),
        r->operand_text(record.operand(), 0)
      ]
    );
  }
  table
}

/// The disassembly of a whole stream. Decoding halts at the first fault; the records before
/// it are kept and nothing is guessed for the faulting instruction.
#[derive(Clone, Debug)]
pub struct Listing {
  pub records : Vec<Record>,
  pub fault   : Option<DecodeError>,
}

impl Listing {
  pub fn disassemble(table: &OpcodeTable, bytes: &[u8]) -> Listing {
    let mut records = vec![];
    let mut fault   = None;

    for result in Decoder::new(table, bytes) {
      match result {
        Ok(record) => records.push(record),
        Err(error) => fault = Some(error),
      }
    }

    Listing { records, fault }
  }

  pub fn is_complete(&self) -> bool {
    self.fault.is_none()
  }

  pub fn lines(&self) -> Vec<String> {
    self.records.iter().map(render).collect()
  }

  pub fn table(&self) -> Table {
    listing_table(&self.records)
  }
}

impl Display for Listing {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    for line in self.lines() {
      writeln!(f, "{}", line)?;
    }
    if let Some(error) = &self.fault {
      writeln!(f, "error: {}", error)?;
    }
    Ok(())
  }
}
