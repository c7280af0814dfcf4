//! Capability traits for the storage and secrets surfaces the pipeline
//! depends on but does not itself implement: `BlobStore` for raw/reject
//! object storage, `ColumnStore` for the analytical warehouse the Canonical
//! Transformer writes through, and `SecretStore` for credential
//! resolution.
//!
//! Each trait ships one in-process reference implementation for tests and
//! local operation: `FsBlobStore`, `MemColumnStore`, `StaticSecretStore`.
//! Production deployments plug in their own (S3, Snowflake, a vault) behind
//! the same trait.

pub mod blob;
pub mod column;
pub mod fs_blob;
pub mod mem_column;
pub mod raw_codec;
pub mod secret;
pub mod static_secret;

pub use blob::{BlobMetadata, BlobStore, BlobStoreError, BlobStoreExt};
pub use column::{ColumnStore, ColumnStoreError};
pub use fs_blob::FsBlobStore;
pub use mem_column::MemColumnStore;
pub use raw_codec::{decode_records, encode_records, RawCodecError};
pub use secret::{SecretStore, SecretStoreError};
pub use static_secret::StaticSecretStore;
