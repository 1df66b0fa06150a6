use std::io::{ErrorKind, Read};

use log::warn;
use serde::{Deserialize, Serialize};

/// Size of one trace record: a 4 byte instruction address, a 1 byte type tag, and a 4 byte load
/// or store address, all little-endian
pub const RECORD_SIZE: usize = 9;

const INSTRUCTION_ADDRESS_OFFSET: usize = 0;
const TYPE_OFFSET: usize = 4;
const LOAD_STORE_ADDRESS_OFFSET: usize = 5;

/// What an instruction does to memory besides being fetched
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstructionType {
    Other,
    Load,
    Store,
}

impl From<u8> for InstructionType {
    fn from(tag: u8) -> Self {
        match tag {
            1 => InstructionType::Load,
            2 => InstructionType::Store,
            _ => InstructionType::Other,
        }
    }
}

/// One decoded instruction from a trace
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub instruction_address: u32,
    pub instruction_type: InstructionType,
    /// Only meaningful for loads and stores
    pub load_store_address: u32,
}

impl TraceRecord {
    /// Decodes a record from its binary form
    ///
    /// # Examples
    ///
    /// ```
    /// use memsyslib::trace::{InstructionType, TraceRecord};
    /// let record = TraceRecord::from_bytes(&[0x00, 0x10, 0x00, 0x00, 1, 0x40, 0x00, 0x00, 0x00]);
    /// assert_eq!(record.instruction_address, 0x1000);
    /// assert_eq!(record.instruction_type, InstructionType::Load);
    /// assert_eq!(record.load_store_address, 0x40);
    /// ```
    pub fn from_bytes(buf: &[u8; RECORD_SIZE]) -> Self {
        let tag = buf[TYPE_OFFSET];
        if tag > 2 {
            warn!("unknown instruction type tag {tag}, treating it as a non-memory instruction");
        }
        Self {
            instruction_address: read_u32(buf, INSTRUCTION_ADDRESS_OFFSET),
            instruction_type: InstructionType::from(tag),
            load_store_address: read_u32(buf, LOAD_STORE_ADDRESS_OFFSET),
        }
    }

    /// Encodes a record into its binary form, useful for generating traces
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        buf[INSTRUCTION_ADDRESS_OFFSET..TYPE_OFFSET].copy_from_slice(&self.instruction_address.to_le_bytes());
        buf[TYPE_OFFSET] = match self.instruction_type {
            InstructionType::Other => 0,
            InstructionType::Load => 1,
            InstructionType::Store => 2,
        };
        buf[LOAD_STORE_ADDRESS_OFFSET..].copy_from_slice(&self.load_store_address.to_le_bytes());
        buf
    }
}

fn read_u32(buf: &[u8; RECORD_SIZE], offset: usize) -> u32 {
    u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

/// Reads trace records from a byte stream until it ends
///
/// A trailing partial record is treated as the end of the stream rather than an error
pub struct TraceReader<R: Read> {
    reader: R,
    done: bool,
}

impl<R: Read> TraceReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, done: false }
    }

    fn read_record(&mut self) -> std::io::Result<Option<TraceRecord>> {
        let mut buf = [0u8; RECORD_SIZE];
        let mut filled = 0;
        while filled < RECORD_SIZE {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => {
                    if filled > 0 {
                        warn!("ignoring {filled} trailing bytes of a partial trace record");
                    }
                    return Ok(None);
                }
                Ok(read) => filled += read,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(Some(TraceRecord::from_bytes(&buf)))
    }
}

impl<R: Read> Iterator for TraceReader<R> {
    type Item = std::io::Result<TraceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let record = self.read_record();
        if !matches!(record, Ok(Some(_))) {
            self.done = true;
        }
        record.transpose()
    }
}
