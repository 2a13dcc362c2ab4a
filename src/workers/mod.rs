pub mod encoder;
pub mod queue;
pub mod transcoder;
pub mod watermark;
