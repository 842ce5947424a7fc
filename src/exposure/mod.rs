pub mod cache;
pub mod engine;

pub use cache::ExposureCache;
pub use engine::{
    ExposureEngine, ExposureEngineConfig, ExposureEngineHandle, ExposureFilter, ThresholdBreach,
    ThresholdScope,
};
