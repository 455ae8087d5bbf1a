pub mod jwt;

pub use jwt::{validate_session, Session};
