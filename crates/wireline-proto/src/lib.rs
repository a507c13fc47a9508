//! Wire types and framing for the wireline chat protocol.
//!
//! The protocol exchanges one JSON object per record, each terminated by a
//! single `\n` byte. This crate is pure data: record shapes ([`WireMessage`],
//! [`ServerLimits`], [`Credentials`]) and the line codec
//! ([`encode_record`]/[`decode_record`]). No I/O, no runtime dependency;
//! transports live in `wireline-app`.

mod codec;
mod errors;
mod message;

pub use codec::{TERMINATOR, decode_record, encode_record};
pub use errors::CodecError;
pub use message::{
    Credentials, MessageType, ServerLimits, WireMessage, decode_time, directive, encode_time,
};
