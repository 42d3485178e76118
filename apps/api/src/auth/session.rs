//! Redis-backed sessions: opaque random token → user id, with TTL.

use rand::RngCore;
use redis::AsyncCommands;
use uuid::Uuid;

use crate::errors::AppError;

const SESSION_TTL_SECS: u64 = 60 * 60 * 24 * 30;
const TOKEN_BYTES: usize = 32;

fn session_key(token: &str) -> String {
    format!("session:{token}")
}

fn new_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Creates a session for the user and returns its token.
pub async fn create(client: &redis::Client, user_id: Uuid) -> Result<String, AppError> {
    let token = new_token();
    let mut con = client.get_multiplexed_async_connection().await?;
    let _: () = con
        .set_ex(session_key(&token), user_id.to_string(), SESSION_TTL_SECS)
        .await?;
    Ok(token)
}

/// Resolves a session token to a user id, if the session exists.
pub async fn user_id(client: &redis::Client, token: &str) -> Result<Option<Uuid>, AppError> {
    let mut con = client.get_multiplexed_async_connection().await?;
    let value: Option<String> = con.get(session_key(token)).await?;
    Ok(value.and_then(|v| Uuid::parse_str(&v).ok()))
}

/// Deletes a session. Deleting a nonexistent session is fine.
pub async fn destroy(client: &redis::Client, token: &str) -> Result<(), AppError> {
    let mut con = client.get_multiplexed_async_connection().await?;
    let _: () = con.del(session_key(token)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_unique_and_hex() {
        let a = new_token();
        let b = new_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_session_key_shape() {
        assert_eq!(session_key("abc"), "session:abc");
    }
}
