pub mod daily_stats;
pub mod settings;
pub mod trade;
