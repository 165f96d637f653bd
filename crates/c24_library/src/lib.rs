pub mod controls;
pub mod sim;
pub mod surface;
