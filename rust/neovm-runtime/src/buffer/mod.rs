pub mod buffer;

pub use buffer::{Buffer, BufferId, BufferManager, BufferSlot, SlotIndex};
