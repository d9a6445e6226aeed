pub mod cancel;
pub mod runner;
mod trial;
