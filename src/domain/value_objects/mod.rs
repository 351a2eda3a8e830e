pub mod pnl;
pub mod rr;
