//! Minimal binary framing for the Hello request and session response
//! described in the external interfaces section: fixed-width UUIDs and
//! counters, length-prefixed opaque byte strings.

use crate::access::{AccessUsage, ResponseCode};
use crate::session::{HelloRequest, SuppressedBy};
use crate::utils::error::{Result, SessionError};
use chrono::{DateTime, Utc};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

const MAX_USER_TOKEN_LEN: u32 = 64 * 1024;
const MAX_MESSAGE_LEN: u32 = 4 * 1024;

pub async fn read_hello<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<HelloRequest> {
    let client_id = read_uuid(reader).await?;
    let token_id = read_uuid(reader).await?;

    let user_token_len = reader.read_u32().await?;
    if user_token_len > MAX_USER_TOKEN_LEN {
        return Err(SessionError::Config(format!(
            "user_token too large: {user_token_len} bytes"
        )));
    }
    let mut user_token = vec![0u8; user_token_len as usize];
    reader.read_exact(&mut user_token).await?;

    let mut encrypted_client_id = [0u8; 16];
    reader.read_exact(&mut encrypted_client_id).await?;

    Ok(HelloRequest {
        client_id,
        token_id,
        user_token,
        encrypted_client_id,
    })
}

async fn read_uuid<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Uuid> {
    let mut bytes = [0u8; 16];
    reader.read_exact(&mut bytes).await?;
    Ok(Uuid::from_bytes(bytes))
}

pub async fn write_success<W: AsyncWriteExt + Unpin>(writer: &mut W, session_id: u64) -> Result<()> {
    writer.write_u8(0).await?;
    writer.write_u64(session_id).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn write_failure<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    response_code: ResponseCode,
    usage: Option<AccessUsage>,
    suppressed_by: SuppressedBy,
    message: &str,
) -> Result<()> {
    writer.write_u8(1).await?;
    writer
        .write_u8(match response_code {
            ResponseCode::Ok => 0,
            ResponseCode::AccessError => 1,
            ResponseCode::SessionClosed => 2,
        })
        .await?;

    let usage = usage.unwrap_or_else(AccessUsage::unlimited);
    writer.write_u64(usage.used_traffic).await?;
    writer.write_u64(usage.max_traffic).await?;
    write_expiration(writer, usage.expiration_time).await?;

    writer
        .write_u8(match suppressed_by {
            SuppressedBy::None => 0,
            SuppressedBy::YourSelf => 1,
            SuppressedBy::Other => 2,
        })
        .await?;

    let message_bytes = message.as_bytes();
    let len = message_bytes.len().min(MAX_MESSAGE_LEN as usize) as u32;
    writer.write_u32(len).await?;
    writer.write_all(&message_bytes[..len as usize]).await?;
    writer.flush().await?;
    Ok(())
}

async fn write_expiration<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    expiration: Option<DateTime<Utc>>,
) -> Result<()> {
    match expiration {
        Some(ts) => {
            writer.write_u8(1).await?;
            writer.write_i64(ts.timestamp()).await?;
        }
        None => {
            writer.write_u8(0).await?;
        }
    }
    Ok(())
}
