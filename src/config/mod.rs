pub mod file;
pub mod level;
pub mod source;
