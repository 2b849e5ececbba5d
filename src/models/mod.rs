pub mod classification;
pub mod file_entry;
pub mod operation;
