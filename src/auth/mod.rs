pub mod jwt;
pub mod middleware;
pub mod model;
pub mod pin;

pub use jwt::*;
pub use middleware::*;
pub use model::*;
pub use pin::*;

mod tests;
