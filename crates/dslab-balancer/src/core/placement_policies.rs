pub mod best_fit_threshold;
pub mod first_fit;
pub mod lowest_utilization;
pub mod round_robin;
