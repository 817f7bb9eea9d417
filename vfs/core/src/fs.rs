use crate::ids::Device;
use crate::node::FsNode;
use std::sync::Arc;

/// A mounted filesystem instance.
pub trait Fs: Send + Sync + 'static {
    fn provider_name(&self) -> &'static str;

    /// Device id shared by every object of this instance.
    fn device(&self) -> Device;

    fn root(&self) -> Arc<dyn FsNode>;
}
