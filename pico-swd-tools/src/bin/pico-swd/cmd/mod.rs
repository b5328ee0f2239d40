pub mod flash;
pub mod info;
pub mod read;
pub mod reset;
pub mod write;
