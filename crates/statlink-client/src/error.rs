use statlink_frame::PayloadError;

/// Errors that can occur in client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] statlink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] statlink_frame::FrameError),

    /// No matching reply arrived in time.
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The server closed the connection.
    #[error("server disconnected")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// A non-fatal inbound condition handed to an [`ErrorSink`](crate::ErrorSink).
///
/// None of these tear the connection down.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Reading from the stream failed.
    #[error("failed to read incoming stream: {0}")]
    Read(#[source] std::io::Error),

    /// A frame's payload did not match its type tag's shape; the frame was dropped.
    #[error("dropped type {type_tag} frame: {source}")]
    Payload {
        type_tag: u16,
        #[source]
        source: PayloadError,
    },
}
