//! MJPEG video feed.
//!
//! `/video_feed` is a `multipart/x-mixed-replace` stream of JPEG parts.
//! [`MultipartFrames`] splits the byte stream into parts, [`decode_jpeg`]
//! turns each into an RGBA [`VideoFrame`], and [`VideoFeed`] ties the two
//! together, publishing the newest frame on a `watch` channel.

use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};
use futures::StreamExt;
use image::ImageFormat;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use iris_core::video::VideoFrame;

use crate::client::{FrameSource, VisionApi};

/// A partial part larger than this is assumed corrupt and discarded.
const MAX_BUFFERED: usize = 8 * 1024 * 1024;

const HEADER_END: &[u8] = b"\r\n\r\n";

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Incremental splitter for a multipart byte stream.
pub struct MultipartFrames {
    /// `--<boundary>`
    delimiter: Vec<u8>,
    /// `\r\n--<boundary>`, used to find the end of a part with no length.
    terminator: Vec<u8>,
    buf: BytesMut,
}

impl MultipartFrames {
    pub fn new(boundary: &str) -> Self {
        let delimiter = format!("--{boundary}").into_bytes();
        let mut terminator = b"\r\n".to_vec();
        terminator.extend_from_slice(&delimiter);
        Self {
            delimiter,
            terminator,
            buf: BytesMut::new(),
        }
    }

    /// Append a chunk of the response body.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
        if self.buf.len() > MAX_BUFFERED {
            tracing::warn!(
                buffered = self.buf.len(),
                "video part exceeds buffer limit, resyncing"
            );
            self.buf.clear();
        }
    }

    /// Pop the next complete, non-empty part body.
    pub fn next_frame(&mut self) -> Option<Bytes> {
        loop {
            let start = find(&self.buf, &self.delimiter)?;
            if start > 0 {
                self.buf.advance(start);
            }

            let header_end = find(&self.buf, HEADER_END)?;
            let headers = &self.buf[self.delimiter.len()..header_end];
            let content_length = content_length(headers);
            let body_start = header_end + HEADER_END.len();

            let body = match content_length {
                Some(len) => {
                    let Some(end) = body_start.checked_add(len).filter(|_| len <= MAX_BUFFERED)
                    else {
                        tracing::warn!(len, "video part length out of range, resyncing");
                        // Skip this delimiter; the next search lands on the following part.
                        self.buf.advance(self.delimiter.len());
                        continue;
                    };
                    if self.buf.len() < end {
                        return None;
                    }
                    self.buf.advance(body_start);
                    self.buf.split_to(len).freeze()
                }
                None => {
                    let end = body_start + find(&self.buf[body_start..], &self.terminator)?;
                    self.buf.advance(body_start);
                    let body = self.buf.split_to(end - body_start).freeze();
                    // Leave the buffer on the next delimiter.
                    self.buf.advance(2);
                    body
                }
            };

            if !body.is_empty() {
                return Some(body);
            }
        }
    }

    /// Pop the last part once the stream has ended. A part without a length
    /// runs to the end of the body; a length-delimited part that was cut
    /// short is dropped.
    pub fn finish(&mut self) -> Option<Bytes> {
        if let Some(body) = self.next_frame() {
            return Some(body);
        }
        let start = find(&self.buf, &self.delimiter)?;
        self.buf.advance(start);
        let header_end = find(&self.buf, HEADER_END)?;
        if content_length(&self.buf[self.delimiter.len()..header_end]).is_some() {
            self.buf.clear();
            return None;
        }
        self.buf.advance(header_end + HEADER_END.len());
        let mut body = std::mem::take(&mut self.buf).freeze();
        if body.ends_with(b"\r\n") {
            body.truncate(body.len() - 2);
        }
        (!body.is_empty()).then_some(body)
    }
}

fn content_length(headers: &[u8]) -> Option<usize> {
    let text = std::str::from_utf8(headers).ok()?;
    text.split("\r\n").find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

/// Decode one JPEG part, downscaling to at most `max_width` columns.
pub fn decode_jpeg(bytes: &[u8], max_width: u32) -> Result<VideoFrame, image::ImageError> {
    let mut img = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)?;
    if img.width() > max_width {
        img = img.thumbnail(max_width, img.height());
    }
    let rgba = img.to_rgba8();
    Ok(VideoFrame {
        width: rgba.width(),
        height: rgba.height(),
        rgba: rgba.into_raw(),
    })
}

/// Background reader for `/video_feed`.
pub struct VideoFeed<C: VisionApi> {
    client: Arc<C>,
    max_width: u32,
    frames: watch::Sender<Option<Arc<VideoFrame>>>,
}

impl<C: VisionApi> VideoFeed<C> {
    pub fn new(
        client: Arc<C>,
        max_width: u32,
        frames: watch::Sender<Option<Arc<VideoFrame>>>,
    ) -> Self {
        Self {
            client,
            max_width,
            frames,
        }
    }

    /// Open the stream and publish frames until it ends, fails, or `cancel`
    /// fires. The task does not reconnect; the caller decides when to start
    /// a new one.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    async fn run(self, cancel: CancellationToken) {
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            opened = self.client.video_feed() => opened,
        };
        let FrameSource {
            boundary,
            mut chunks,
        } = match opened {
            Ok(source) => source,
            Err(err) => {
                tracing::warn!(error = %err, "video feed unavailable");
                return;
            }
        };
        tracing::info!(%boundary, "video feed opened");

        let mut parts = MultipartFrames::new(&boundary);
        let mut received: u64 = 0;
        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                chunk = chunks.next() => chunk,
            };
            match chunk {
                Some(Ok(bytes)) => parts.push(&bytes),
                Some(Err(err)) => {
                    tracing::warn!(error = %err, "video feed interrupted");
                    break;
                }
                None => {
                    tracing::info!("video feed ended");
                    if let Some(jpeg) = parts.finish() {
                        if !self.publish(jpeg, &cancel).await {
                            return;
                        }
                        received += 1;
                    }
                    break;
                }
            }

            while let Some(jpeg) = parts.next_frame() {
                if !self.publish(jpeg, &cancel).await {
                    return;
                }
                received += 1;
            }
        }
        tracing::debug!(received, "video feed reader stopped");
    }

    /// Decode off the runtime and publish. Undecodable parts are skipped.
    /// Returns `false` once `cancel` has fired.
    async fn publish(&self, jpeg: Bytes, cancel: &CancellationToken) -> bool {
        let max_width = self.max_width;
        match tokio::task::spawn_blocking(move || decode_jpeg(&jpeg, max_width)).await {
            Ok(Ok(frame)) => {
                if cancel.is_cancelled() {
                    return false;
                }
                self.frames.send_replace(Some(Arc::new(frame)));
            }
            Ok(Err(err)) => tracing::debug!(error = %err, "skipping undecodable frame"),
            Err(err) => tracing::warn!(error = %err, "frame decoder panicked"),
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, VisionError};
    use crate::protocol::{ReadTextResult, StatusSnapshot};
    use async_trait::async_trait;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::Mutex;
    use std::time::Duration;

    fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 40, 40]));
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg)
            .unwrap();
        out
    }

    fn part(boundary: &str, body: &[u8], with_length: bool) -> Vec<u8> {
        let mut out = format!("--{boundary}\r\nContent-Type: image/jpeg\r\n").into_bytes();
        if with_length {
            out.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(body);
        out.extend_from_slice(b"\r\n");
        out
    }

    #[test]
    fn splits_parts_across_arbitrary_chunks() {
        let mut stream = part("frame", b"first", false);
        stream.extend(part("frame", b"second", false));
        stream.extend_from_slice(b"--frame\r\n");

        let mut parts = MultipartFrames::new("frame");
        let mut out = Vec::new();
        for chunk in stream.chunks(3) {
            parts.push(chunk);
            while let Some(frame) = parts.next_frame() {
                out.push(frame);
            }
        }
        assert_eq!(out, vec![Bytes::from_static(b"first"), Bytes::from_static(b"second")]);
    }

    #[test]
    fn last_part_waits_for_next_delimiter_without_length() {
        let mut parts = MultipartFrames::new("frame");
        parts.push(&part("frame", b"only", false));
        assert_eq!(parts.next_frame(), None);

        parts.push(b"--frame\r\n");
        assert_eq!(parts.next_frame(), Some(Bytes::from_static(b"only")));
    }

    #[test]
    fn content_length_covers_embedded_delimiters() {
        let body = b"ab\r\n--frame\r\ncd";
        let mut parts = MultipartFrames::new("frame");
        parts.push(&part("frame", body, true));
        assert_eq!(parts.next_frame().as_deref(), Some(&body[..]));
        assert_eq!(parts.next_frame(), None);
    }

    #[test]
    fn absurd_content_length_resyncs_on_next_part() {
        let mut parts = MultipartFrames::new("frame");
        parts.push(
            b"--frame\r\nContent-Type: image/jpeg\r\nContent-Length: 18446744073709551615\r\n\r\nabc\r\n",
        );
        assert_eq!(parts.next_frame(), None);

        parts.push(&part("frame", b"next", true));
        assert_eq!(parts.next_frame(), Some(Bytes::from_static(b"next")));
    }

    #[test]
    fn length_above_buffer_limit_is_skipped() {
        let mut stream = format!(
            "--frame\r\nContent-Length: {}\r\n\r\nxyz\r\n",
            MAX_BUFFERED + 1
        )
        .into_bytes();
        stream.extend(part("frame", b"kept", true));

        let mut parts = MultipartFrames::new("frame");
        parts.push(&stream);
        assert_eq!(parts.next_frame(), Some(Bytes::from_static(b"kept")));
    }

    #[test]
    fn finish_emits_trailing_part_without_length() {
        let mut stream = part("frame", b"first", false);
        stream.extend(part("frame", b"last", false));

        let mut parts = MultipartFrames::new("frame");
        parts.push(&stream);
        assert_eq!(parts.next_frame(), Some(Bytes::from_static(b"first")));
        assert_eq!(parts.next_frame(), None);
        assert_eq!(parts.finish(), Some(Bytes::from_static(b"last")));
        assert_eq!(parts.finish(), None);
    }

    #[test]
    fn finish_drops_truncated_length_part() {
        let mut parts = MultipartFrames::new("frame");
        parts.push(b"--frame\r\nContent-Length: 10\r\n\r\nshort");
        assert_eq!(parts.finish(), None);
    }

    #[test]
    fn drops_preamble_and_empty_parts() {
        let mut stream = b"preamble junk\r\n".to_vec();
        stream.extend(part("cam", b"", true));
        stream.extend(part("cam", b"real", true));

        let mut parts = MultipartFrames::new("cam");
        parts.push(&stream);
        assert_eq!(parts.next_frame(), Some(Bytes::from_static(b"real")));
    }

    #[test]
    fn oversized_part_is_discarded() {
        let mut parts = MultipartFrames::new("frame");
        parts.push(b"--frame\r\n\r\n");
        parts.push(&vec![0u8; MAX_BUFFERED]);
        assert_eq!(parts.next_frame(), None);

        // Nothing of the dropped part lingers in front of the next one.
        parts.push(&part("frame", b"fresh", true));
        assert_eq!(parts.next_frame(), Some(Bytes::from_static(b"fresh")));
    }

    #[test]
    fn header_parsing() {
        assert_eq!(content_length(b"\r\nContent-Type: image/jpeg\r\ncontent-length: 42"), Some(42));
        assert_eq!(content_length(b"\r\nContent-Length: lots"), None);
        assert_eq!(content_length(b"\r\nContent-Type: image/jpeg"), None);
    }

    #[test]
    fn decode_downscales_wide_frames() {
        let frame = decode_jpeg(&jpeg(64, 32), 16).unwrap();
        assert_eq!((frame.width, frame.height), (16, 8));
        assert!(frame.is_consistent());

        let frame = decode_jpeg(&jpeg(64, 32), 320).unwrap();
        assert_eq!((frame.width, frame.height), (64, 32));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_jpeg(b"not a jpeg", 320).is_err());
    }

    struct FakeFeed {
        body: Mutex<Option<Vec<Bytes>>>,
    }

    fn refused(endpoint: &'static str) -> VisionError {
        VisionError::Status {
            endpoint,
            status: reqwest::StatusCode::NOT_FOUND,
        }
    }

    #[async_trait]
    impl VisionApi for FakeFeed {
        async fn status(&self) -> Result<StatusSnapshot> {
            Err(refused("status"))
        }

        async fn read_text(&self) -> Result<ReadTextResult> {
            Err(refused("read_text"))
        }

        async fn video_feed(&self) -> Result<FrameSource> {
            let chunks = self
                .body
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| refused("video_feed"))?;
            Ok(FrameSource {
                boundary: "frame".to_string(),
                chunks: futures::stream::iter(chunks.into_iter().map(Ok)).boxed(),
            })
        }
    }

    #[tokio::test]
    async fn feed_publishes_decoded_frames() {
        let mut stream = part("frame", &jpeg(40, 20), true);
        stream.extend(part("frame", b"corrupt", true));
        stream.extend(part("frame", &jpeg(80, 40), true));
        let chunks = stream.chunks(512).map(Bytes::copy_from_slice).collect();
        let client = Arc::new(FakeFeed {
            body: Mutex::new(Some(chunks)),
        });

        let (tx, rx) = watch::channel(None);
        let handle = VideoFeed::new(client, 40, tx).spawn(CancellationToken::new());
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        let frame = rx.borrow().clone().unwrap();
        assert_eq!((frame.width, frame.height), (40, 20));
    }

    #[tokio::test]
    async fn feed_publishes_final_part_when_stream_ends() {
        let mut stream = part("frame", &jpeg(16, 16), false);
        stream.extend(part("frame", &jpeg(32, 16), false));
        let client = Arc::new(FakeFeed {
            body: Mutex::new(Some(vec![Bytes::from(stream)])),
        });

        let (tx, rx) = watch::channel(None);
        let handle = VideoFeed::new(client, 320, tx).spawn(CancellationToken::new());
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        let frame = rx.borrow().clone().unwrap();
        assert_eq!((frame.width, frame.height), (32, 16));
    }

    #[tokio::test]
    async fn cancelled_feed_publishes_nothing() {
        let client = Arc::new(FakeFeed {
            body: Mutex::new(Some(vec![Bytes::from(part("frame", &jpeg(8, 8), true))])),
        });
        let cancel = CancellationToken::new();
        cancel.cancel();

        let (tx, rx) = watch::channel(None);
        VideoFeed::new(client, 320, tx).spawn(cancel).await.unwrap();
        assert!(rx.borrow().is_none());
    }

    #[tokio::test]
    async fn unavailable_feed_ends_quietly() {
        let client = Arc::new(FakeFeed {
            body: Mutex::new(None),
        });
        let (tx, rx) = watch::channel(None);
        VideoFeed::new(client, 320, tx)
            .spawn(CancellationToken::new())
            .await
            .unwrap();
        assert!(rx.borrow().is_none());
    }
}
