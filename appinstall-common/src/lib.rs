pub mod archive;
pub mod bundle;
pub mod checksum;
pub mod error;
pub mod manifest;
