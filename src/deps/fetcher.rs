//! Downloads distributable files while refusing oversized ones.

use crate::Result;
use crate::api::Pacer;
use core::fmt::{Display, Formatter, Result as FmtResult};
use core::time::Duration;
use futures_util::stream::TryStreamExt;
use ohno::{AppError, EnrichableExt};
use reqwest::header::CONTENT_LENGTH;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;

const LOG_TARGET: &str = "   fetcher";

const USER_AGENT: &str = concat!("modstats/", env!("CARGO_PKG_VERSION"));

/// Why a download did not produce a file.
#[derive(Debug)]
pub enum FetchError {
    /// The file is larger than allowed. Carries the size reported by the server, or the
    /// number of bytes seen before the transfer was cut off.
    TooLarge(u64),

    /// The `HEAD` request failed (timeout, connection error, non-success status).
    HeadFailed(AppError),

    /// The transfer itself failed, or its body could not be written out.
    TransferFailed(AppError),
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::TooLarge(size) => write!(f, "file is too large ({size} bytes)"),
            Self::HeadFailed(e) => write!(f, "HEAD request failed: {e}"),
            Self::TransferFailed(e) => write!(f, "transfer failed: {e}"),
        }
    }
}

/// Two-phase downloader: a `HEAD` request rejects files whose declared length is too large
/// before any body is transferred, then a `GET` streams the body to disk.
#[derive(Debug, Clone)]
pub struct BoundedFetcher {
    client: reqwest::Client,
    timeout: Duration,
    pacer: Arc<Pacer>,
}

impl BoundedFetcher {
    /// `timeout` bounds the `HEAD` request as a whole, and the connect phase and every read of the transfer.
    pub fn new(timeout: Duration, pacer: Arc<Pacer>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()?;

        Ok(Self { client, timeout, pacer })
    }

    /// Download `url` into `destination`, overwriting it, and return the number of bytes written.
    ///
    /// The size bound is enforced from the `HEAD` response's `Content-Length` when the server reports one,
    /// and again while streaming. The caller owns `destination` and must remove it.
    pub async fn fetch(&self, url: &str, max_bytes: u64, destination: &Path) -> Result<u64, FetchError> {
        if let Some(reported) = self.head_length(url).await?
            && reported > max_bytes
        {
            return Err(FetchError::TooLarge(reported));
        }

        let start = Instant::now();
        let written = self.transfer(url, max_bytes, destination).await?;
        log::debug!(target: LOG_TARGET, "Downloading <{url}> ({written} bytes) took {:.2}s", start.elapsed().as_secs_f64());

        Ok(written)
    }

    /// Ask for the headers only and return the declared length, if any.
    async fn head_length(&self, url: &str) -> Result<Option<u64>, FetchError> {
        self.pacer.wait().await;

        let response = self
            .client
            .head(url)
            .timeout(self.timeout)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| FetchError::HeadFailed(AppError::new(e)))?;

        // The length header is read directly: a HEAD response has no body to size.
        Ok(response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok()))
    }

    async fn transfer(&self, url: &str, max_bytes: u64, destination: &Path) -> Result<u64, FetchError> {
        self.pacer.wait().await;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| FetchError::TransferFailed(AppError::new(e)))?;

        if let Some(declared) = response.content_length()
            && declared > max_bytes
        {
            return Err(FetchError::TooLarge(declared));
        }

        let mut file = tokio::fs::File::create(destination).await.map_err(|e| {
            FetchError::TransferFailed(AppError::new(e).enrich(format!("could not create '{}'", destination.display())))
        })?;

        let mut stream = response.bytes_stream();
        let mut total_bytes: u64 = 0;

        while let Some(chunk) = stream
            .try_next()
            .await
            .map_err(|e| FetchError::TransferFailed(AppError::new(e).enrich("could not read response chunk")))?
        {
            total_bytes += chunk.len() as u64;
            if total_bytes > max_bytes {
                return Err(FetchError::TooLarge(total_bytes));
            }

            file.write_all(&chunk).await.map_err(|e| {
                FetchError::TransferFailed(AppError::new(e).enrich(format!("could not write to '{}'", destination.display())))
            })?;
        }

        file.flush().await.map_err(|e| {
            FetchError::TransferFailed(AppError::new(e).enrich(format!("could not flush '{}'", destination.display())))
        })?;

        Ok(total_bytes)
    }
}
