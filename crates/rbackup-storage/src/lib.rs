pub mod factory;
pub mod local;
pub mod memory;
pub mod provider;
pub mod rclone;
pub mod rotate;
pub mod s3;
pub mod transfer;

pub use factory::create_backend;
pub use provider::StorageBackend;
pub use rotate::{RotationReport, rotate};
pub use transfer::{download, upload, upload_at};
