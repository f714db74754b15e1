//! Built-in vendor platform definitions.

pub mod cisco;
pub mod silverpeak;
