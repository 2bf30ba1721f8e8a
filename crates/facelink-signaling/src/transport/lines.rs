use facelink_common::{Error, Result, SignalingMessage};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use super::MAX_MESSAGE_BYTES;

/// Newline-delimited JSON framing over any byte stream.
pub(crate) struct LineChannel<R, W> {
    reader: BufReader<R>,
    writer: W,
    line: String,
}

impl<R, W> LineChannel<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub(crate) fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
            line: String::new(),
        }
    }

    /// Next message, or `None` at end of stream. Blank lines are skipped.
    pub(crate) async fn read_message(&mut self) -> Result<Option<SignalingMessage>> {
        loop {
            self.line.clear();
            let read = (&mut self.reader)
                .take(MAX_MESSAGE_BYTES as u64 + 2)
                .read_line(&mut self.line)
                .await?;
            if read == 0 {
                return Ok(None);
            }
            if self.line.trim_end_matches(['\r', '\n']).len() > MAX_MESSAGE_BYTES {
                return Err(Error::protocol(format!(
                    "signaling message exceeds {MAX_MESSAGE_BYTES} bytes"
                )));
            }
            if self.line.trim().is_empty() {
                continue;
            }
            return SignalingMessage::from_json(&self.line).map(Some);
        }
    }

    pub(crate) async fn write_message(&mut self, message: &SignalingMessage) -> Result<()> {
        let mut text = message.to_json()?;
        text.push('\n');
        self.writer.write_all(text.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub(crate) async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await.map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facelink_common::SessionDescription;

    #[tokio::test]
    async fn test_round_trip_over_duplex() {
        let (a, b) = tokio::io::duplex(4096);
        let (ar, aw) = tokio::io::split(a);
        let (br, bw) = tokio::io::split(b);
        let mut left = LineChannel::new(ar, aw);
        let mut right = LineChannel::new(br, bw);

        let offer = SignalingMessage::from(SessionDescription::offer(
            "v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\n",
        ));
        left.write_message(&offer).await.unwrap();
        left.write_message(&SignalingMessage::Bye).await.unwrap();

        assert_eq!(right.read_message().await.unwrap(), Some(offer));
        assert_eq!(right.read_message().await.unwrap(), Some(SignalingMessage::Bye));

        left.shutdown().await.unwrap();
        assert_eq!(right.read_message().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_blank_lines_are_skipped_and_garbage_rejected() {
        let input: &[u8] = b"\n\n{\"type\":\"bye\"}\n{\"type\":\"hello\"}\n";
        let mut channel = LineChannel::new(input, tokio::io::sink());

        assert_eq!(channel.read_message().await.unwrap(), Some(SignalingMessage::Bye));
        let err = channel.read_message().await.unwrap_err();
        assert!(err.is_protocol());
    }

    #[tokio::test]
    async fn test_oversized_line_is_rejected() {
        let mut input = vec![b'x'; MAX_MESSAGE_BYTES + 10];
        input.push(b'\n');
        let mut channel = LineChannel::new(input.as_slice(), tokio::io::sink());
        assert!(channel.read_message().await.unwrap_err().is_protocol());
    }

    fn offer_line(total: usize, ending: &str) -> Vec<u8> {
        let envelope = r#"{"type":"offer","sdp":""}"#.len();
        let sdp = "x".repeat(total - envelope);
        let json = format!(r#"{{"type":"offer","sdp":"{sdp}"}}"#);
        assert_eq!(json.len(), total);
        format!("{json}{ending}").into_bytes()
    }

    #[tokio::test]
    async fn test_message_of_exactly_max_size_is_accepted() {
        for ending in ["\n", "\r\n"] {
            let input = offer_line(MAX_MESSAGE_BYTES, ending);
            let mut channel = LineChannel::new(input.as_slice(), tokio::io::sink());
            let message = channel.read_message().await.unwrap();
            assert!(matches!(message, Some(SignalingMessage::Description(_))));
        }
    }

    #[tokio::test]
    async fn test_one_byte_over_max_is_rejected() {
        let input = offer_line(MAX_MESSAGE_BYTES + 1, "\n");
        let mut channel = LineChannel::new(input.as_slice(), tokio::io::sink());
        assert!(channel.read_message().await.unwrap_err().is_protocol());
    }
}
