// Protocol: reading codec, frame sizing and the batch that fills one radio frame.

pub mod reading;
pub mod layout;
pub mod batch;
pub mod error;
