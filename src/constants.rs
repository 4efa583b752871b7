pub const DEFAULT_COST: f64 = 1.0;
pub const DEFAULT_TOLERANCE: f64 = 0.01;
pub const DEFAULT_SVR_EPSILON: f64 = 0.1;
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;
pub const DEFAULT_NUM_MODELS: usize = 10;
pub const DEFAULT_CALIBRATION_RATIO: f64 = 0.2;
pub const DEFAULT_FOLDS: usize = 10;
pub const DEFAULT_NCM_BETA: f64 = 0.01;
pub const DEFAULT_RESULT_COUNT: usize = 10;
/// Smallest normalizer used by the normalized regression measures.
pub const MIN_NORMALIZER: f64 = 1e-6;
/// Offset added before taking the log of absolute residuals.
pub const LOG_RESIDUAL_OFFSET: f64 = 1e-8;
/// Slack used when turning a confidence into a calibration rank.
pub const RANK_EPS: f64 = 1e-9;
pub const PLATT_MAX_ITERATIONS: usize = 100;
pub const PLATT_MIN_STEP: f64 = 1e-10;
pub const PLATT_SIGMA: f64 = 1e-12;
pub const PLATT_EPS: f64 = 1e-5;
pub const PROBABILITY_CLIP: f64 = 1e-15;
