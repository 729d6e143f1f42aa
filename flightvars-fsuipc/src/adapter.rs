use crate::offset::{Offset, OffsetLength, ValuedOffset};
use byteorder::{ByteOrder, LittleEndian};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("offset adapter IO failure: {0}")]
    Io(String),
}

/// Access into the simulator offset region.
///
/// Reads and writes are queued and executed in batches: `schedule_read`
/// and `schedule_write` only record the intent, `commit` performs every
/// queued write, then every queued read, clears both queues and returns
/// the values read.
pub trait OffsetAdapter: Send {
    fn schedule_read(&mut self, offset: Offset);

    fn schedule_write(&mut self, valued: ValuedOffset);

    fn commit(&mut self) -> Result<Vec<ValuedOffset>, AdapterError>;
}

/// An adapter over a plain 64 KiB byte array, for testing and for running
/// the server detached from a simulator. Multi-byte cells are stored
/// little endian regardless of the host byte order.
pub struct DummyOffsetAdapter {
    memory: Vec<u8>,
    reads: Vec<Offset>,
    writes: Vec<ValuedOffset>,
}

impl DummyOffsetAdapter {
    pub fn new() -> DummyOffsetAdapter {
        DummyOffsetAdapter {
            memory: vec![0; 0x10000],
            reads: Vec::new(),
            writes: Vec::new(),
        }
    }

    pub fn read_value(&self, offset: Offset) -> u32 {
        let addr = offset.address as usize;
        match offset.length {
            OffsetLength::Byte => self.memory[addr] as u32,
            OffsetLength::Word => LittleEndian::read_u16(&self.memory[addr..addr + 2]) as u32,
            OffsetLength::DWord => LittleEndian::read_u32(&self.memory[addr..addr + 4]),
        }
    }

    pub fn write_value(&mut self, offset: Offset, value: u32) {
        let addr = offset.address as usize;
        match offset.length {
            OffsetLength::Byte => self.memory[addr] = value as u8,
            OffsetLength::Word => {
                LittleEndian::write_u16(&mut self.memory[addr..addr + 2], value as u16)
            }
            OffsetLength::DWord => {
                LittleEndian::write_u32(&mut self.memory[addr..addr + 4], value)
            }
        }
    }
}

impl Default for DummyOffsetAdapter {
    fn default() -> DummyOffsetAdapter {
        DummyOffsetAdapter::new()
    }
}

impl OffsetAdapter for DummyOffsetAdapter {
    fn schedule_read(&mut self, offset: Offset) {
        self.reads.push(offset);
    }

    fn schedule_write(&mut self, valued: ValuedOffset) {
        self.writes.push(valued);
    }

    fn commit(&mut self) -> Result<Vec<ValuedOffset>, AdapterError> {
        let writes: Vec<ValuedOffset> = self.writes.drain(..).collect();
        for write in writes {
            self.write_value(write.offset, write.value);
        }
        let reads: Vec<Offset> = self.reads.drain(..).collect();
        Ok(reads
            .into_iter()
            .map(|offset| ValuedOffset::new(offset, self.read_value(offset)))
            .collect())
    }
}

// Lets a test or a binary keep a handle on the adapter it hands over to
// the offset domain.
impl<T: OffsetAdapter> OffsetAdapter for Arc<Mutex<T>> {
    fn schedule_read(&mut self, offset: Offset) {
        self.lock().unwrap().schedule_read(offset)
    }

    fn schedule_write(&mut self, valued: ValuedOffset) {
        self.lock().unwrap().schedule_write(valued)
    }

    fn commit(&mut self) -> Result<Vec<ValuedOffset>, AdapterError> {
        self.lock().unwrap().commit()
    }
}
