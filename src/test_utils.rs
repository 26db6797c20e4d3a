//! Test utilities for the harvester
//!
//! Scripted HTTP transport, fixture images and a codec that always fails,
//! so unit tests never touch the network.

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::infrastructure::codec::{CodecError, ImageCodec, TextureFormat};
use crate::infrastructure::fetcher::FetchPolicy;
use crate::infrastructure::http_client::{HttpResponse, HttpTransport, TransportError};

/// One scripted answer for a URL
#[derive(Debug, Clone)]
pub enum Reply {
    Response { status: u16, body: Vec<u8> },
    Timeout,
    ConnectionError,
    /// Never answers; only the fetcher's own timeout ends it
    Hang,
}

impl Reply {
    pub fn ok(body: &[u8]) -> Self {
        Self::Response { status: 200, body: body.to_vec() }
    }

    pub fn status(status: u16) -> Self {
        Self::Response { status, body: Vec::new() }
    }

    pub fn timeout() -> Self {
        Self::Timeout
    }

    pub fn hang() -> Self {
        Self::Hang
    }

    pub fn connection_error() -> Self {
        Self::ConnectionError
    }
}

/// Transport answering from per-URL scripts
///
/// Replies are consumed in order and the last one repeats. URLs without a
/// script answer 404.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, Vec<Reply>>>,
    served: Mutex<HashMap<String, usize>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with(self: Arc<Self>, url: &str, replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), replies.into_iter().collect());
        self
    }

    /// Every requested URL, in request order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    fn next_reply(&self, url: &str) -> Reply {
        let scripts = self.scripts.lock().unwrap();
        let Some(replies) = scripts.get(url).filter(|r| !r.is_empty()) else {
            return Reply::status(404);
        };
        let mut served = self.served.lock().unwrap();
        let index = served.entry(url.to_string()).or_insert(0);
        let reply = replies[(*index).min(replies.len() - 1)].clone();
        *index += 1;
        reply
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, url: &str, _timeout: Duration) -> Result<HttpResponse, TransportError> {
        self.calls.lock().unwrap().push(url.to_string());
        match self.next_reply(url) {
            Reply::Response { status, body } => Ok(HttpResponse {
                status,
                body,
                final_url: url.to_string(),
            }),
            Reply::Timeout => Err(TransportError::Timeout),
            Reply::ConnectionError => Err(TransportError::Connection("connection reset".into())),
            Reply::Hang => std::future::pending().await,
        }
    }
}

/// Two attempts, no delays
pub fn fast_policy() -> FetchPolicy {
    FetchPolicy {
        max_retries: 2,
        base_delay: Duration::ZERO,
        request_delay: Duration::ZERO,
        timeout: Duration::from_secs(5),
        soft_404_marker: "<!DOCTYPE html>".to_string(),
    }
}

/// Solid-colour PNG
pub fn png_bytes(width: u32, height: u32, colour: [u8; 4]) -> Vec<u8> {
    let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(colour)));
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Codec that rejects every input
pub struct FailingCodec;

impl ImageCodec for FailingCodec {
    fn decode(&self, _bytes: &[u8]) -> Result<DynamicImage, CodecError> {
        Err(CodecError::Encode("unsupported input".into()))
    }

    fn trim(&self, image: DynamicImage, _percent: f32) -> DynamicImage {
        image
    }

    fn resize(&self, image: &DynamicImage, _width: u32, _height: u32) -> DynamicImage {
        image.clone()
    }

    fn composite(&self, back: DynamicImage, _front: &DynamicImage) -> DynamicImage {
        back
    }

    fn encode(&self, _image: &DynamicImage, _format: TextureFormat) -> Result<Vec<u8>, CodecError> {
        Err(CodecError::Encode("unsupported output".into()))
    }
}
