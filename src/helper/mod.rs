pub mod file_name;
pub mod log;
pub mod tempfile;
