// State module
// On-disk locations for rendered artifacts and input hashing

pub mod storage;

pub use storage::{calculate_sha256, get_app_data_dir, get_render_dir, StorageError};
