pub mod reassign;
pub mod transform;

pub use reassign::*;
pub use transform::*;
