//! Message kinds carried in the header's type tag.
//!
//! The numeric values are fixed by the server protocol. Tag `0` never
//! appears on the wire; the reassembler uses it to mean "no header buffered".

/// Sentinel for "no header currently buffered".
pub const NONE: u16 = 0;

/// Server wall-clock time.
pub const GET_TIME: u16 = 1;

/// Free storage on the server, in bytes.
pub const GET_SIZE: u16 = 2;

/// Aggregate server statistics.
pub const GET_STAT: u16 = 3;

/// Store a text value on the server; the reply echoes the stored text.
pub const SET_DATA: u16 = 4;

/// Clear the stored data.
pub const CLEAR_DATA: u16 = 5;

/// Returns a human-readable name for a type tag.
pub fn kind_name(tag: u16) -> &'static str {
    match tag {
        NONE => "NONE",
        GET_TIME => "GET_TIME",
        GET_SIZE => "GET_SIZE",
        GET_STAT => "GET_STAT",
        SET_DATA => "SET_DATA",
        CLEAR_DATA => "CLEAR_DATA",
        _ => "UNKNOWN",
    }
}

/// Returns true if the tag names one of the protocol's message kinds.
pub fn is_known(tag: u16) -> bool {
    (GET_TIME..=CLEAR_DATA).contains(&tag)
}
