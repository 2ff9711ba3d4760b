pub mod approval;
pub mod batch;
pub mod extraction;
pub mod imaging;
