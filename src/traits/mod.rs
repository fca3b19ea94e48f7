pub mod node_source;
