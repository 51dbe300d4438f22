pub mod num;
pub mod sample;

pub use sample::{ParseSampleError, Sample, SampleRangeError};
