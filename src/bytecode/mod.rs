/*!

  The VM is a stack machine whose programs are a flat byte stream: no header, no length
  prefix, no footer, no alignment. Each instruction is a single opcode byte followed by the
  operand its opcode calls for. The sizes of instruction components are as follows:

    Opcode:   8 bits
    Integer: 64 bits, little-endian, holding a signed 32 bit value
    String:  the raw bytes followed by a single 0x00

  Branches (`JMP`, `JEQ`, `JNEQ` and the `B` variants) and `FUND`'s body address name an
  absolute byte offset into the stream, not an instruction index.

  Which byte stands for which mnemonic depends on the revision of the opcode table, and the
  revisions disagree. Neither the encoder nor the decoder assume a table; each is handed one.
  The shape of an operand, on the other hand, is fixed per mnemonic.

*/

mod assembly;
mod binary;
mod error;
mod instruction;
mod table;

pub use assembly::{parse_assembly, AssemblyError};
pub use binary::{decode, decode_all, encode, Decoder, Encoder, Record};
pub use error::{DecodeError, EncodeError, UnknownOpcode};
pub use instruction::{
  string_literal, Instruction, IntOperand, Mnemonic, Operand, OperandShape, INT_SLOT_WIDTH
};
pub use table::{OpcodeTable, Revision};
