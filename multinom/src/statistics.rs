pub mod pmf;
pub mod sampler;
