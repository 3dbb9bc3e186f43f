pub mod cases;
pub mod sanctions;
