// Async execution path for the transmitting node (tokio).

pub mod async_node;
