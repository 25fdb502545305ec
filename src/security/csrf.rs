use rand::RngCore;

use crate::models::session::Session;
use crate::security::constant_time_eq;

/// Header carrying the token on AJAX requests.
pub const CSRF_HEADER: &str = "X-CSRF-Token";
pub const CSRF_FIELD: &str = "csrf_token";
pub const INVALID_TOKEN: &str = "Invalid security token";

/// 32 random bytes, hex encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// A missing or empty token never matches.
pub fn verify(session: &Session, submitted: Option<&str>) -> bool {
    match submitted {
        Some(token) if !token.is_empty() && !session.csrf_token.is_empty() => {
            constant_time_eq(token.as_bytes(), session.csrf_token.as_bytes())
        }
        _ => false,
    }
}

/// Token sent in the `X-CSRF-Token` header, if any.
pub struct CsrfHeader(pub Option<String>);

#[rocket::async_trait]
impl<'r> rocket::request::FromRequest<'r> for CsrfHeader {
    type Error = ();

    async fn from_request(
        request: &'r rocket::Request<'_>,
    ) -> rocket::request::Outcome<Self, Self::Error> {
        let token = request.headers().get_one(CSRF_HEADER).map(|t| t.to_string());
        rocket::request::Outcome::Success(CsrfHeader(token))
    }
}
