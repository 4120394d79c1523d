use thiserror::Error;

/// Errors surfaced by the registry, the pixel-data views and the transcoder.
///
/// Nothing in this crate logs or swallows these; every failure reaches the
/// caller, and a failed transcode never leaves a half-written dataset behind.
#[derive(Error, Debug)]
pub enum Error {
    #[error("no codec registered for transfer syntax {name} ({uid})")]
    CodecNotFound { uid: String, name: String },

    #[error("codec for {uid} failed to {operation} pixel data: {source}")]
    CodecOperationFailed {
        uid: String,
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("cannot transcode from {from} to {to}: {reason}")]
    InvalidTranscodeRequest {
        from: String,
        to: String,
        reason: String,
    },

    #[error("invalid pixel data: {0}")]
    InvalidPixelData(String),

    #[error("unknown transfer syntax UID '{0}'")]
    UnknownTransferSyntax(String),

    #[error("pixel data view is {view} but the dataset declares {dataset}")]
    SyntaxMismatch { view: String, dataset: String },
}

pub type Result<T> = std::result::Result<T, Error>;
