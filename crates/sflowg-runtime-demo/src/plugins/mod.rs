pub mod greeter;
pub mod uuidgen;
