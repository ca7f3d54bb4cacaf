use std::io;

use async_trait::async_trait;
use vr_01_transport::BoxedStream;

/// Opens the byte stream an outbound session runs over.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, address: &str) -> io::Result<BoxedStream>;
}
