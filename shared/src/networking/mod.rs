pub mod discovery;
pub mod error;
pub mod message;
pub mod result;
pub mod server;
pub mod worker;

use std::time::Duration;

use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use self::{error::NetworkingError, message::Message, result::NetworkingResult};

/// Largest frame accepted from a peer.
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

pub const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct RawMessage {
    pub message_length: u32,
    pub json_length: u32,
    pub json_message: String,
    pub data: Vec<u8>,
}

/// Writes one frame without flushing:
/// `u32 total | u32 json length | json | data`, lengths big-endian.
pub async fn write_frame<W>(stream: &mut W, json_message: &[u8], data: Option<&[u8]>) -> NetworkingResult<()>
where
    W: AsyncWrite + Unpin,
{
    let json_message_size = json_message.len() as u32;
    let data_size = match data {
        Some(data) => data.len() as u32,
        None => 0,
    };
    let total_message_size = json_message_size + data_size;
    if total_message_size > MAX_FRAME_SIZE {
        return Err(NetworkingError::FrameTooLarge {
            length: total_message_size,
            limit: MAX_FRAME_SIZE,
        });
    }

    let mut buffer = Vec::with_capacity(8 + total_message_size as usize);
    buffer.extend_from_slice(&total_message_size.to_be_bytes());
    buffer.extend_from_slice(&json_message_size.to_be_bytes());
    buffer.extend_from_slice(json_message);
    if let Some(data) = data {
        buffer.extend_from_slice(data);
    };

    Ok(stream.write_all(&buffer).await?)
}

pub async fn send_frame<W>(stream: &mut W, json_message: &[u8], data: Option<&[u8]>) -> NetworkingResult<()>
where
    W: AsyncWrite + Unpin,
{
    write_frame(stream, json_message, data).await?;
    Ok(stream.flush().await?)
}

pub async fn write_message<W>(stream: &mut W, message: &Message) -> NetworkingResult<()>
where
    W: AsyncWrite + Unpin,
{
    write_frame(stream, message.to_json()?.as_bytes(), None).await
}

pub async fn send_message<W>(stream: &mut W, message: &Message) -> NetworkingResult<()>
where
    W: AsyncWrite + Unpin,
{
    debug!("Sending {}", message.kind());
    send_frame(stream, message.to_json()?.as_bytes(), None).await
}

pub async fn read_message_length<R>(stream: &mut R) -> NetworkingResult<u32>
where
    R: AsyncRead + Unpin,
{
    let mut length_bytes = [0u8; 4];
    stream.read_exact(&mut length_bytes).await?;
    Ok(u32::from_be_bytes(length_bytes))
}

pub async fn read_json_message<R>(stream: &mut R, length: usize) -> NetworkingResult<String>
where
    R: AsyncRead + Unpin,
{
    let mut json_message = vec![0u8; length];
    stream.read_exact(&mut json_message).await?;
    Ok(String::from_utf8_lossy(&json_message).to_string())
}

pub async fn read_binary_data<R>(stream: &mut R, length: usize) -> NetworkingResult<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut data_message = vec![0u8; length];
    stream.read_exact(&mut data_message).await?;
    Ok(data_message)
}

/// Reads one frame, or `None` if the peer closed the stream cleanly on a
/// frame boundary.
pub async fn read_message_raw<R>(stream: &mut R) -> NetworkingResult<Option<RawMessage>>
where
    R: AsyncRead + Unpin,
{
    let mut length_bytes = [0u8; 4];
    if stream.read(&mut length_bytes[..1]).await? == 0 {
        return Ok(None);
    }
    stream.read_exact(&mut length_bytes[1..]).await?;
    let message_length = u32::from_be_bytes(length_bytes);
    if message_length > MAX_FRAME_SIZE {
        return Err(NetworkingError::FrameTooLarge {
            length: message_length,
            limit: MAX_FRAME_SIZE,
        });
    }

    let json_length = read_message_length(stream).await?;
    if json_length > message_length {
        return Err(NetworkingError::MalformedFrame {
            message_length,
            json_length,
        });
    }
    let json_message = read_json_message(stream, json_length as usize).await?;
    let data = read_binary_data(stream, (message_length - json_length) as usize).await?;

    Ok(Some(RawMessage {
        message_length,
        json_length,
        json_message,
        data,
    }))
}

pub async fn read_message<R>(stream: &mut R) -> NetworkingResult<Option<Message>>
where
    R: AsyncRead + Unpin,
{
    match read_message_raw(stream).await? {
        Some(raw) => Ok(Some(Message::from_json(&raw.json_message)?)),
        None => Ok(None),
    }
}

/// Reads the single reply of a unary call, mapping `Error` frames and early
/// close onto errors.
pub async fn read_reply<R>(stream: &mut R) -> NetworkingResult<Message>
where
    R: AsyncRead + Unpin,
{
    match read_message(stream).await? {
        Some(Message::Error(reason)) => Err(NetworkingError::Remote(reason)),
        Some(message) => Ok(message),
        None => Err(NetworkingError::ConnectionClosed),
    }
}

pub async fn expect_ack<R>(stream: &mut R) -> NetworkingResult<()>
where
    R: AsyncRead + Unpin,
{
    match read_reply(stream).await? {
        Message::Ack => Ok(()),
        other => Err(NetworkingError::UnexpectedMessage {
            expected: "Ack",
            received: other.kind().to_string(),
        }),
    }
}

pub async fn connect(addr: &str) -> NetworkingResult<TcpStream> {
    match tokio::time::timeout(DIAL_TIMEOUT, TcpStream::connect(addr)).await {
        Ok(stream) => Ok(stream?),
        Err(_) => Err(NetworkingError::Timeout(DIAL_TIMEOUT)),
    }
}

/// Opens a connection, sends `request` and waits for an `Ack`.
pub async fn call(addr: &str, request: &Message) -> NetworkingResult<()> {
    let mut stream = connect(addr).await?;
    send_message(&mut stream, request).await?;
    expect_ack(&mut stream).await
}
