pub mod client;
pub mod node;
pub mod replication;
pub mod ring;
mod topology;

pub use client::ReplicationClient;
pub use node::Node;
pub use replication::{ReplicationMode, ReplicationPolicy};
pub use ring::HashRing;
