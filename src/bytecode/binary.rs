/*!
  This module is responsible for the encoding and decoding of binary instructions.

  An instruction is an opcode byte followed by the operand the opcode's shape calls for:

    None:       [OpCode:8]
    Int32:      [OpCode:8][Slot:64]
    Int32Pair:  [OpCode:8][Slot:64][Slot:64]
    CString:    [OpCode:8][Bytes:8*n][0x00]

  Slots are little-endian two's complement. Instructions follow one another with no padding,
  so the byte offset of an instruction is the sum of the widths of the instructions before it.
*/

use std::convert::{TryFrom, TryInto};
use std::iter::FusedIterator;

use string_cache::DefaultAtom;
use tracing::debug;

use super::error::{DecodeError, EncodeError};
use super::instruction::{
  Instruction, IntOperand, Mnemonic, Operand, OperandShape, INT_SLOT_WIDTH
};
use super::table::{OpcodeTable, Revision};

type Slot = [u8; INT_SLOT_WIDTH];

fn fits_payload(value: IntOperand) -> bool {
  i32::try_from(value).is_ok()
}

/// Writes instructions with the opcodes of one table revision.
#[derive(Clone, Copy, Debug)]
pub struct Encoder<'t> {
  table: &'t OpcodeTable,
}

impl<'t> Encoder<'t> {
  pub fn new(table: &'t OpcodeTable) -> Encoder<'t> {
    Encoder { table }
  }

  pub fn table(&self) -> &'t OpcodeTable {
    self.table
  }

  /// Encodes a program. Either every instruction is encoded or an error naming the first
  /// offending instruction is returned.
  pub fn encode(&self, instructions: &[Instruction]) -> Result<Vec<u8>, EncodeError> {
    let capacity = instructions.iter().map(Instruction::encoded_len).sum();
    let mut buffer = Vec::with_capacity(capacity);

    for (index, instruction) in instructions.iter().enumerate() {
      self.write(index, instruction, &mut buffer)?;
    }

    debug!(
      revision = %self.table.revision(),
      instructions = instructions.len(),
      bytes = buffer.len(),
      "encoded program"
    );
    Ok(buffer)
  }

  /**
    Appends a single instruction to `buffer`, returning the number of bytes written. On error
    nothing is appended, so `buffer` always ends on an instruction boundary.
  */
  pub fn encode_into(&self, instruction: &Instruction, buffer: &mut Vec<u8>)
    -> Result<usize, EncodeError>
  {
    self.write(0, instruction, buffer)
  }

  fn write(&self, index: usize, instruction: &Instruction, buffer: &mut Vec<u8>)
    -> Result<usize, EncodeError>
  {
    let code = self.check(index, instruction)?;
    let start = buffer.len();

    buffer.push(code);
    match &instruction.operand {

      Operand::None => {}

      Operand::Int(value) => {
        buffer.extend_from_slice(&value.to_le_bytes());
      }

      Operand::IntPair(first, second) => {
        buffer.extend_from_slice(&first.to_le_bytes());
        buffer.extend_from_slice(&second.to_le_bytes());
      }

      Operand::Str(text) => {
        buffer.extend_from_slice(text.as_bytes());
        buffer.push(0);
      }

    }

    Ok(buffer.len() - start)
  }

  /// Validates an instruction against the table without writing anything. Returns its
  /// opcode byte.
  fn check(&self, index: usize, instruction: &Instruction) -> Result<u8, EncodeError> {
    let mnemonic = instruction.mnemonic;
    let code =
      self.table
          .code(mnemonic)
          .ok_or(EncodeError::NotInRevision {
            index,
            mnemonic,
            revision: self.table.revision()
          })?;

    let expected = mnemonic.shape();
    let found    = instruction.operand.shape();
    if expected != found {
      return Err(EncodeError::OperandShapeMismatch { index, mnemonic, expected, found });
    }

    match &instruction.operand {

      Operand::Int(value) if !fits_payload(*value) => {
        Err(EncodeError::OperandOverflow { index, mnemonic, value: *value })
      }

      Operand::IntPair(first, second) if !fits_payload(*first) || !fits_payload(*second) => {
        let value = if fits_payload(*first) { *second } else { *first };
        Err(EncodeError::OperandOverflow { index, mnemonic, value })
      }

      Operand::Str(text) if text.as_bytes().contains(&0) => {
        Err(EncodeError::EmbeddedNul { index, mnemonic })
      }

      _ => Ok(code)

    }
  }
}

/// Encodes a program with the table of the given revision.
pub fn encode(revision: Revision, instructions: &[Instruction]) -> Result<Vec<u8>, EncodeError> {
  Encoder::new(OpcodeTable::for_revision(revision)).encode(instructions)
}


/// One decoded instruction and where it sits in the stream.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
  /// Byte offset of the opcode byte.
  pub offset      : usize,
  /// Total bytes consumed, opcode byte included.
  pub width       : usize,
  pub instruction : Instruction,
}

impl Record {
  pub fn mnemonic(&self) -> Mnemonic {
    self.instruction.mnemonic
  }

  pub fn operand(&self) -> &Operand {
    &self.instruction.operand
  }

  /// The offset of the instruction that follows this one.
  pub fn end(&self) -> usize {
    self.offset + self.width
  }
}

/**
  A single left to right pass over a byte stream, yielding one `Record` per instruction.

  The first error ends the pass: it is yielded once and the iterator is exhausted afterward.
  A record is never yielded for an instruction that could not be decoded in full.
*/
#[derive(Clone, Debug)]
pub struct Decoder<'t, 'b> {
  table   : &'t OpcodeTable,
  bytes   : &'b [u8],
  offset  : usize,
  records : usize,
  done    : bool,
}

impl<'t, 'b> Decoder<'t, 'b> {
  pub fn new(table: &'t OpcodeTable, bytes: &'b [u8]) -> Decoder<'t, 'b> {
    Decoder { table, bytes, offset: 0, records: 0, done: false }
  }

  /// The offset of the next instruction to be decoded.
  pub fn offset(&self) -> usize {
    self.offset
  }

  /// Decodes the remainder of the stream, stopping at the first error.
  pub fn collect_records(self) -> Result<Vec<Record>, DecodeError> {
    self.collect()
  }

  fn read_slot(&self, at: usize) -> Option<IntOperand> {
    let end = at.checked_add(INT_SLOT_WIDTH)?;
    let slot: Slot = self.bytes.get(at..end)?.try_into().ok()?;
    Some(IntOperand::from_le_bytes(slot))
  }

  fn read_int(&self, offset: usize, mnemonic: Mnemonic, at: usize)
    -> Result<IntOperand, DecodeError>
  {
    let value =
      self.read_slot(at)
          .ok_or(DecodeError::TruncatedOperand { offset, mnemonic, shape: mnemonic.shape() })?;

    match fits_payload(value) {
      true  => Ok(value),
      false => Err(DecodeError::OperandOverflow { offset, mnemonic, value })
    }
  }

  /// Scans for the `0x00` terminator. Returns the string and the bytes consumed including
  /// the terminator.
  fn read_string(&self, offset: usize, mnemonic: Mnemonic, at: usize)
    -> Result<(DefaultAtom, usize), DecodeError>
  {
    let rest = self.bytes.get(at..).unwrap_or(&[]);
    let length =
      rest.iter()
          .position(|byte| *byte == 0)
          .ok_or(DecodeError::TruncatedOperand { offset, mnemonic, shape: OperandShape::CString })?;

    let text =
      std::str::from_utf8(&rest[..length])
        .map_err(|_| DecodeError::NonUtf8String { offset, mnemonic })?;

    Ok((DefaultAtom::from(text), length + 1))
  }

  fn decode_at(&self, offset: usize) -> Result<Record, DecodeError> {
    let code = self.bytes[offset];
    let mnemonic =
      self.table
          .mnemonic(code)
          .map_err(|_| DecodeError::UnknownOpcode { offset, code })?;
    let at = offset + 1;

    let (operand, operand_width) = match mnemonic.shape() {

      OperandShape::None => (Operand::None, 0),

      OperandShape::Int32 => {
        let value = self.read_int(offset, mnemonic, at)?;
        (Operand::Int(value), INT_SLOT_WIDTH)
      }

      OperandShape::Int32Pair => {
        // Check both slots are present before reporting a range problem in the first.
        if self.bytes.len() - at < 2 * INT_SLOT_WIDTH {
          return Err(DecodeError::TruncatedOperand {
            offset,
            mnemonic,
            shape: OperandShape::Int32Pair
          });
        }
        let first  = self.read_int(offset, mnemonic, at)?;
        let second = self.read_int(offset, mnemonic, at + INT_SLOT_WIDTH)?;
        (Operand::IntPair(first, second), 2 * INT_SLOT_WIDTH)
      }

      OperandShape::CString => {
        let (text, consumed) = self.read_string(offset, mnemonic, at)?;
        (Operand::Str(text), consumed)
      }

    };

    Ok(Record {
      offset,
      width: 1 + operand_width,
      instruction: Instruction::new(mnemonic, operand)
    })
  }
}

impl<'t, 'b> Iterator for Decoder<'t, 'b> {
  type Item = Result<Record, DecodeError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.done {
      return None;
    }
    if self.offset >= self.bytes.len() {
      debug!(
        revision = %self.table.revision(),
        records = self.records,
        bytes = self.bytes.len(),
        "decoded program"
      );
      self.done = true;
      return None;
    }

    match self.decode_at(self.offset) {

      Ok(record) => {
        #[cfg(feature = "trace_decoding")]
        tracing::trace!(
          offset = record.offset,
          width = record.width,
          instruction = %record.instruction,
          "decoded"
        );
        self.offset = record.end();
        self.records += 1;
        Some(Ok(record))
      }

      Err(error) => {
        debug!(%error, records = self.records, "decoding stopped");
        self.done = true;
        Some(Err(error))
      }

    }
  }
}

impl<'t, 'b> FusedIterator for Decoder<'t, 'b> {}

/// Starts a fresh decoding pass over `bytes` with the table of the given revision.
pub fn decode(revision: Revision, bytes: &[u8]) -> Decoder<'static, '_> {
  Decoder::new(OpcodeTable::for_revision(revision), bytes)
}

/// Decodes a whole stream, or returns the first error.
pub fn decode_all(revision: Revision, bytes: &[u8]) -> Result<Vec<Record>, DecodeError> {
  decode(revision, bytes).collect_records()
}


#[cfg(test)]
mod tests {
  use super::*;

  fn program() -> Vec<Instruction> {
    vec![
      Instruction::int(Mnemonic::Push, 10),
      Instruction::int(Mnemonic::Push, 20),
      Instruction::nullary(Mnemonic::Add),
      Instruction::nullary(Mnemonic::Print),
      Instruction::nullary(Mnemonic::Halt),
    ]
  }

  #[test]
  fn end_to_end_offsets() {
    let bytes = encode(Revision::Classic, &program()).unwrap();
    let n = 1 + INT_SLOT_WIDTH;
    assert_eq!(bytes.len(), 2 * n + 3);

    let records = decode_all(Revision::Classic, &bytes).unwrap();
    let offsets: Vec<usize> = records.iter().map(|r| r.offset).collect();
    assert_eq!(offsets, vec![0, n, 2 * n, 2 * n + 1, 2 * n + 2]);

    let instructions: Vec<Instruction> = records.into_iter().map(|r| r.instruction).collect();
    assert_eq!(instructions, program());
  }

  #[test]
  fn integer_layout_is_little_endian_slots() {
    let bytes = encode(Revision::Classic, &[Instruction::int(Mnemonic::Push, -2)]).unwrap();
    assert_eq!(bytes, vec![20, 0xFE, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);

    let bytes = encode(Revision::Classic, &[Instruction::int_pair(Mnemonic::Fund, 2, 300)]).unwrap();
    assert_eq!(bytes.len(), 17);
    assert_eq!(bytes[0], 56);
    assert_eq!(&bytes[1..9], &[2, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(&bytes[9..17], &[44, 1, 0, 0, 0, 0, 0, 0]);
  }

  #[test]
  fn width_does_not_depend_on_magnitude() {
    for value in &[0, 1, -1, i32::MAX as i64, i32::MIN as i64] {
      let bytes = encode(Revision::Classic, &[Instruction::int(Mnemonic::Load, *value)]).unwrap();
      let records = decode_all(Revision::Classic, &bytes).unwrap();
      assert_eq!(records[0].width, 1 + INT_SLOT_WIDTH);
      assert_eq!(records[0].operand(), &Operand::Int(*value));
    }
  }

  #[test]
  fn string_terminator_is_consumed() {
    let bytes = encode(Revision::Classic, &[Instruction::string(Mnemonic::Set, "x")]).unwrap();
    assert_eq!(bytes, vec![53, b'x', 0]);

    let records = decode_all(Revision::Classic, &bytes).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].width, 3);
    assert_eq!(records[0].operand(), &Operand::Str(DefaultAtom::from("x")));
  }

  #[test]
  fn empty_string_operand() {
    let bytes = encode(Revision::Classic, &[Instruction::string(Mnemonic::Pushs, "")]).unwrap();
    assert_eq!(bytes, vec![60, 0]);
    let records = decode_all(Revision::Classic, &bytes).unwrap();
    assert_eq!(records[0].operand(), &Operand::Str(DefaultAtom::from("")));
  }

  #[test]
  fn unterminated_string_is_truncated() {
    let error = decode_all(Revision::Classic, &[53]).unwrap_err();
    assert_eq!(
      error,
      DecodeError::TruncatedOperand { offset: 0, mnemonic: Mnemonic::Set, shape: OperandShape::CString }
    );

    let error = decode_all(Revision::Classic, &[0, 54, b'a', b'b']).unwrap_err();
    assert_eq!(error.offset(), 1);
  }

  #[test]
  fn lone_fund_is_truncated_with_no_records() {
    let mut decoder = decode(Revision::Classic, &[56]);
    assert_eq!(
      decoder.next(),
      Some(Err(DecodeError::TruncatedOperand {
        offset: 0,
        mnemonic: Mnemonic::Fund,
        shape: OperandShape::Int32Pair
      }))
    );
    assert_eq!(decoder.next(), None);
  }

  #[test]
  fn partial_slot_is_truncated() {
    let mut bytes = encode(Revision::Classic, &[Instruction::nullary(Mnemonic::Nop)]).unwrap();
    bytes.extend_from_slice(&[20, 1, 0, 0]);

    let mut decoder = decode(Revision::Classic, &bytes);
    assert!(matches!(decoder.next(), Some(Ok(_))));
    assert_eq!(
      decoder.next(),
      Some(Err(DecodeError::TruncatedOperand {
        offset: 1,
        mnemonic: Mnemonic::Push,
        shape: OperandShape::Int32
      }))
    );
    assert_eq!(decoder.next(), None);
  }

  #[test]
  fn unknown_opcode_stops_the_pass() {
    let records: Vec<_> = decode(Revision::Classic, &[255, 0, 0]).collect();
    assert_eq!(records, vec![Err(DecodeError::UnknownOpcode { offset: 0, code: 255 })]);
  }

  #[test]
  fn revision_decides_the_meaning_of_a_byte() {
    let classic = decode_all(Revision::Classic, &[22, 70]).unwrap();
    let runtime = decode_all(Revision::Runtime, &[22, 70]).unwrap();
    assert_eq!(classic[0].mnemonic(), Mnemonic::Equal);
    assert_eq!(classic[1].mnemonic(), Mnemonic::Eq);
    assert_eq!(runtime[0].mnemonic(), Mnemonic::Eq);
    assert_eq!(runtime[1].mnemonic(), Mnemonic::Quote);
  }

  #[test]
  fn out_of_range_slot_is_rejected() {
    let mut bytes = vec![40];
    bytes.extend_from_slice(&(1i64 << 40).to_le_bytes());
    assert_eq!(
      decode_all(Revision::Classic, &bytes),
      Err(DecodeError::OperandOverflow { offset: 0, mnemonic: Mnemonic::Load, value: 1 << 40 })
    );
  }

  #[test]
  fn non_utf8_string_is_rejected() {
    assert_eq!(
      decode_all(Revision::Classic, &[55, 0xC3, 0x28, 0]),
      Err(DecodeError::NonUtf8String { offset: 0, mnemonic: Mnemonic::Func })
    );
  }

  #[test]
  fn shape_mismatch() {
    let error = encode(
      Revision::Classic,
      &[Instruction::nullary(Mnemonic::Nop), Instruction::string(Mnemonic::Push, "ten")]
    ).unwrap_err();
    assert_eq!(
      error,
      EncodeError::OperandShapeMismatch {
        index: 1,
        mnemonic: Mnemonic::Push,
        expected: OperandShape::Int32,
        found: OperandShape::CString
      }
    );
  }

  #[test]
  fn overflow_and_embedded_nul() {
    let error = encode(Revision::Classic, &[Instruction::int(Mnemonic::Push, 1 << 31)]).unwrap_err();
    assert_eq!(
      error,
      EncodeError::OperandOverflow { index: 0, mnemonic: Mnemonic::Push, value: 1 << 31 }
    );

    let error = encode(Revision::Classic, &[Instruction::int_pair(Mnemonic::Fund, 0, -(1 << 33))])
      .unwrap_err();
    assert_eq!(
      error,
      EncodeError::OperandOverflow { index: 0, mnemonic: Mnemonic::Fund, value: -(1 << 33) }
    );

    let error = encode(Revision::Classic, &[Instruction::string(Mnemonic::Ref, "a\0b")]).unwrap_err();
    assert_eq!(error, EncodeError::EmbeddedNul { index: 0, mnemonic: Mnemonic::Ref });
  }

  #[test]
  fn mnemonic_missing_from_revision() {
    let error = encode(Revision::Classic, &[Instruction::nullary(Mnemonic::Quote)]).unwrap_err();
    assert_eq!(
      error,
      EncodeError::NotInRevision { index: 0, mnemonic: Mnemonic::Quote, revision: Revision::Classic }
    );
  }

  #[test]
  fn encode_into_is_all_or_nothing() {
    let encoder = Encoder::new(OpcodeTable::for_revision(Revision::Classic));
    let mut buffer = vec![];

    assert_eq!(encoder.encode_into(&Instruction::int(Mnemonic::Push, 7), &mut buffer), Ok(9));
    assert!(encoder.encode_into(&Instruction::int(Mnemonic::Push, i64::MAX), &mut buffer).is_err());
    assert!(encoder.encode_into(&Instruction::nullary(Mnemonic::Fund), &mut buffer).is_err());
    assert_eq!(buffer.len(), 9);
  }

  #[test]
  fn decoding_restarts_from_the_beginning() {
    let bytes = encode(Revision::Runtime, &program()).unwrap();
    let first:  Vec<_> = decode(Revision::Runtime, &bytes).collect();
    let second: Vec<_> = decode(Revision::Runtime, &bytes).collect();
    assert_eq!(first, second);
    assert!(decode(Revision::Runtime, &[]).next().is_none());
  }

  /// Collects formatted events in memory.
  #[derive(Clone, Default)]
  struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

  impl std::io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
      self.0.lock().unwrap().extend_from_slice(buf);
      Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
      Ok(())
    }
  }

  impl Captured {
    fn text(&self) -> String {
      String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
  }

  fn logged_while(action: impl FnOnce()) -> String {
    let captured = Captured::default();
    let writer   = captured.clone();
    let subscriber = tracing_subscriber::fmt()
      .with_max_level(tracing::Level::DEBUG)
      .with_ansi(false)
      .with_writer(move || writer.clone())
      .finish();

    tracing::subscriber::with_default(subscriber, action);
    captured.text()
  }

  #[test]
  fn every_pass_logs_a_summary() {
    let bytes = encode(Revision::Classic, &program()).unwrap();

    let log = logged_while(|| {
      assert_eq!(decode_all(Revision::Classic, &bytes).unwrap().len(), 5);
    });
    assert!(log.contains("decoded program"), "{}", log);
    assert!(log.contains("records=5"), "{}", log);
    assert_eq!(log.matches("decoded program").count(), 1);

    let log = logged_while(|| {
      assert!(decode_all(Revision::Classic, &[255]).is_err());
    });
    assert!(log.contains("decoding stopped"), "{}", log);
    assert!(!log.contains("decoded program"), "{}", log);
  }
}
