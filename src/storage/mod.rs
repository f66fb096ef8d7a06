pub mod writer;

pub use writer::StorageWriter;
