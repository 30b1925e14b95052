//! One-time codes, session tokens and the magic-link mail.

use rand::Rng;
use sha2::{Digest, Sha256};
use url::Url;

pub const CODE_LENGTH: usize = 6;
pub const CODE_TTL_MINUTES: i64 = 60;
/// Failed guesses for one email before all of its outstanding codes are voided.
pub const MAX_CODE_ATTEMPTS: i32 = 5;

/// Six random decimal digits.
pub fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// Codes are stored hashed; only the mail ever carries the plain value.
pub fn hash_code(email: &str, code: &str) -> String {
    let digest = Sha256::digest(format!("{}:{}", normalize_email(email), code).as_bytes());
    hex::encode(digest)
}

/// 32 random bytes, hex encoded.
pub fn generate_access_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    hex::encode(bytes)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_code_format(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.chars().all(|c| c.is_ascii_digit())
}

/// Link to the sign-in callback carrying the credentials and the final redirect target.
pub fn magic_link(public_url: &str, email: &str, code: &str, redirect_to: &str) -> Option<Url> {
    let mut link = Url::parse(public_url).ok()?.join("/api/v1/auth/callback").ok()?;
    link.query_pairs_mut()
        .append_pair("email", email)
        .append_pair("code", code)
        .append_pair("redirect_to", redirect_to);
    Some(link)
}

pub fn sign_in_mail_body(code: &str, link: Option<&Url>) -> String {
    let mut body = format!(
        "Your sign-in code is {code}.\n\nIt expires in {CODE_TTL_MINUTES} minutes and can be used once.\n"
    );
    if let Some(link) = link {
        body.push_str(&format!("\nOr open this link to sign in:\n{link}\n"));
    }
    body.push_str("\nIf you did not request this, you can ignore this email.\n");
    body
}
