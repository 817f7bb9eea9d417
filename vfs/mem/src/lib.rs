mod config;
mod fs;
mod handle;
mod inode;
mod node;

pub use config::MemFsConfig;
pub use fs::MemFs;
pub use handle::MemHandle;
pub use node::MemNode;
