pub mod password;
pub mod jwt;

pub use password::{hash_password, verify_password};
pub use jwt::{JwtService, TokenType, Claims};
