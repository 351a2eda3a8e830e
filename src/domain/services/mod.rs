pub mod metrics;
pub mod pattern_detector;
pub mod risk_evaluator;
