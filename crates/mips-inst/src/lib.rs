//! MIPS32 revision 1 decoded instruction records.
//!
//! The simulator's text segments hold these records rather than raw
//! words. A record keeps its architectural encoding alongside the decoded
//! fields so raw-word reads of text and the disassembler need no second
//! decode pass. Label references the assembler could not resolve ride on
//! the record as an [`ImmExpr`].

mod decode;
mod display;
mod inst;
mod op;

pub use decode::{decode, encode};
pub use inst::{COND_EQ, COND_IN, COND_LT, COND_UN, HalfSelect, ImmExpr, Instruction, Operands, SymbolRef};
pub use op::Op;
