mod levels;

pub use levels::{LodLevel, LodPolicy, RingLodPolicy};
