//! Pixel-wise change detection against a pre-event baseline
//!
//! - **baseline**: validated stack of co-registered pre-event acquisitions
//! - **score**: incidence-normalised t-statistic of the flood acquisition

mod baseline;
mod score;

pub use baseline::BaselineStack;
pub use score::{
    change_score, clip_quantile_bounds, clip_to_quantiles, incidence_weights, ChangeScore,
    ChangeScoreParams, ChangeScorer, MIN_BASELINE_MEMBERS,
};
