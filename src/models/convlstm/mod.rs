pub mod cell;
pub mod encoder;
pub mod gate;
pub mod model;
