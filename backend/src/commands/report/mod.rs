pub mod aggregate;
pub mod publish;

pub use aggregate::*;
pub use publish::*;
