pub mod rides;
pub mod world;
