use async_trait::async_trait;
use bytes::Bytes;
use snafu::OptionExt;
use tokio::io::AsyncReadExt;

use crate::error::{IngestError, InvalidUrlSnafu, ReadFailedSnafu, UnsupportedSchemeSnafu};

/// The set of URL schemes a contribution's body may be read from.
pub const SUPPORTED_SCHEMES: &[&str] = &["file", "http", "https"];

/// A chunked byte source over one contribution's URL. Mirrors the
/// bytes-in-chunks shape `repl_csv::CsvParser::parse` expects, so the
/// pipeline never has to hold a whole file in memory.
#[async_trait]
pub trait ContributionSource: Send {
    /// Returns the next chunk, or `None` once the source is exhausted.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, IngestError>;
}

/// Validates `url`'s scheme without opening it, the half of admission that
/// doesn't need network/filesystem access.
pub fn check_scheme(url: &str) -> Result<(), IngestError> {
    let parsed = url::Url::parse(url).map_err(|e| {
        InvalidUrlSnafu {
            url: url.to_string(),
            message: e.to_string(),
        }
        .build()
    })?;
    if !SUPPORTED_SCHEMES.contains(&parsed.scheme()) {
        return UnsupportedSchemeSnafu {
            scheme: parsed.scheme().to_string(),
        }
        .fail();
    }
    Ok(())
}

/// Opens `url`, dispatching on scheme. Scheme support is already checked by
/// [`check_scheme`] at admission time; this only fails on the actual I/O.
pub async fn open(url: &str) -> Result<Box<dyn ContributionSource>, IngestError> {
    let parsed = url::Url::parse(url).map_err(|e| {
        InvalidUrlSnafu {
            url: url.to_string(),
            message: e.to_string(),
        }
        .build()
    })?;
    match parsed.scheme() {
        "file" => {
            let path = parsed
                .to_file_path()
                .ok()
                .context(InvalidUrlSnafu { url: url.to_string(), message: "not a valid file path".to_string() })?;
            let file = tokio::fs::File::open(&path)
                .await
                .map_err(|e| ReadFailedSnafu { message: e.to_string() }.build())?;
            Ok(Box::new(FileSource { file }))
        }
        "http" | "https" => {
            let response = reqwest::get(url)
                .await
                .map_err(|e| ReadFailedSnafu { message: e.to_string() }.build())?;
            let response = response
                .error_for_status()
                .map_err(|e| ReadFailedSnafu { message: e.to_string() }.build())?;
            Ok(Box::new(HttpSource { response: Some(response) }))
        }
        scheme => UnsupportedSchemeSnafu { scheme: scheme.to_string() }.fail(),
    }
}

const CHUNK_SIZE: usize = 64 * 1024;

struct FileSource {
    file: tokio::fs::File,
}

#[async_trait]
impl ContributionSource for FileSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, IngestError> {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let n = self
            .file
            .read(&mut buf)
            .await
            .map_err(|e| ReadFailedSnafu { message: e.to_string() }.build())?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(Bytes::from(buf)))
    }
}

struct HttpSource {
    response: Option<reqwest::Response>,
}

#[async_trait]
impl ContributionSource for HttpSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, IngestError> {
        let Some(response) = &mut self.response else {
            return Ok(None);
        };
        match response
            .chunk()
            .await
            .map_err(|e| ReadFailedSnafu { message: e.to_string() }.build())?
        {
            Some(chunk) => Ok(Some(chunk)),
            None => {
                self.response = None;
                Ok(None)
            }
        }
    }
}
