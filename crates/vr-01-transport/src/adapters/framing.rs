//! Length-prefixed framing: a 4-byte big-endian length, then the body.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// A byte stream split into frame bodies.
pub type FrameStream<S> = Framed<S, LengthDelimitedCodec>;

/// Wrap a stream in the session framing. Frames over `max_frame_bytes`
/// surface as read errors.
pub fn framed<S>(stream: S, max_frame_bytes: usize) -> FrameStream<S>
where
    S: AsyncRead + AsyncWrite,
{
    let codec = LengthDelimitedCodec::builder()
        .length_field_length(4)
        .big_endian()
        .max_frame_length(max_frame_bytes)
        .new_codec();
    Framed::new(stream, codec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::{SinkExt, StreamExt};
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_length_prefix_is_big_endian() {
        let (client, mut server) = tokio::io::duplex(1024);
        let mut framed = framed(client, 1024);
        framed.send(Bytes::from_static(b"<x/>")).await.unwrap();

        let mut raw = [0u8; 8];
        server.read_exact(&mut raw).await.unwrap();
        assert_eq!(&raw[..4], &[0, 0, 0, 4]);
        assert_eq!(&raw[4..], b"<x/>");
    }

    #[tokio::test]
    async fn test_oversized_frame_is_an_error() {
        let (a, b) = tokio::io::duplex(4096);
        let mut writer = framed(a, 4096);
        let mut reader = framed(b, 16);
        writer.send(Bytes::from(vec![b'x'; 64])).await.unwrap();
        assert!(reader.next().await.unwrap().is_err());
    }
}
