use std::time::Duration;

use crate::common::error::SlurmError;
use crate::common::node::NodeInfoResponse;

/// Anything that can report the current node inventory.
#[trait_variant::make(NodeSource: Send)]
pub trait UnsendNodeSource {
    /// Performs one lookup. `timeout` bounds the call on top of any limit the source applies
    /// itself.
    async fn get_nodes(&self, timeout: Option<Duration>) -> Result<NodeInfoResponse, SlurmError>;
}
