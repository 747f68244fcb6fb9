// Component B: receiving node
// Pulls frames off the link, decodes them back into batches and publishes them.

pub mod receiver;
pub mod publisher;
