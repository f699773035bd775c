pub mod deal;
pub mod verdict;
