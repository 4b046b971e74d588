//! Frame-level sampling: ROI geometry and per-frame photometric reduction.

mod roi;
mod sampler;

pub use roi::RoiRect;
pub use sampler::{FrameSampler, RawFrameSample, SamplerConfig};
