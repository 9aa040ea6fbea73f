//! mf-auth: bearer-token subject extraction. The core only consumes
//! tokens issued by an external Auth Provider — it never mints or refreshes
//! them.

pub mod bearer;
pub mod jwt;

pub use bearer::extract_bearer_token;
pub use jwt::{Claims, InsecureTestVerifier, JwtVerifier, TokenVerifier};
