pub mod classifiers;
pub mod predictor;

pub use classifiers::{
    altman_z, ohlson_o, springate_s, zmijewski_x, ClassifierScore, DistressModel,
};
pub use predictor::{
    altman_tier, score, score_latest, score_periods, DistressHistory, DistressScore, DistressTier,
    DistressTrend, TierBasis,
};
