//! Registry implementations for listing tags and resolving digests

pub mod oci;

pub use oci::OciRegistry;
