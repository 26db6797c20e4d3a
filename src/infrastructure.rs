//! Infrastructure layer: configuration, logging, HTTP, parsing, image codec
//! and the output tree.

pub mod codec;
pub mod config;
pub mod fetcher;
pub mod http_client;
pub mod logging;
pub mod output_writer;
pub mod parsing;

pub use codec::{CodecError, DdsCodec, ImageCodec, TextureFormat};
pub use config::{ConfigError, HarvestConfig};
pub use fetcher::{FetchOutcome, FetchPolicy, Fetched, Fetcher};
pub use http_client::{HttpResponse, HttpTransport, ReqwestTransport, TransportError};
pub use logging::{LoggingGuard, init_logging};
pub use output_writer::{MaterializeOutcome, OutputPath, OutputWriter};
pub use parsing::{PageParser, PesmasterParser};
