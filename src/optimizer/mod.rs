pub mod histogram;
pub mod table_stats;

pub use histogram::{IntHistogram, StringHistogram};
pub use table_stats::{TableStats, IO_COST_PER_PAGE, NUM_HIST_BINS};
