use crate::error::HttpstatError;
use crate::http::request::ExchangeRequest;
use futures::StreamExt;
use http::Method;
use http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, HeaderMap};
use http::response::Parts;
use http_body_util::{BodyExt, BodyStream};
use hyper::body::Incoming;
use indicatif::{ProgressBar, ProgressStyle};
use std::cmp::min;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// What happens to a response body once the headers are in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BodyTarget {
    #[default]
    Discard,
    File(PathBuf),
    /// Save under the name the server suggests, or the last path segment.
    RemoteName,
}

/// Consumes the body and returns a human readable disposition message.
///
/// Redirects and HEAD responses are left unread.
pub async fn consume_body(
    target: &BodyTarget,
    request: &ExchangeRequest,
    parts: &Parts,
    body: Incoming,
) -> Result<String, HttpstatError> {
    if parts.status.is_redirection() || request.method == Method::HEAD {
        return Ok(String::new());
    }

    let file_path = match target {
        BodyTarget::Discard => {
            discard(body).await;
            return Ok("Body discarded".to_string());
        }
        BodyTarget::File(path) => path.clone(),
        BodyTarget::RemoteName => remote_filename(&parts.headers, request)?,
    };

    let content_length = parts
        .headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok());
    save_with_progress(&file_path, content_length, body).await?;
    Ok("Body read".to_string())
}

async fn discard(mut body: Incoming) {
    while let Some(frame) = body.frame().await {
        if let Err(e) = frame {
            debug!("Error while discarding response body: {e}");
            break;
        }
    }
}

async fn save_with_progress(
    file_path: &Path,
    content_length: Option<u64>,
    body: Incoming,
) -> Result<(), HttpstatError> {
    let mut file = tokio::fs::File::create(file_path).await.map_err(|e| {
        HttpstatError::body_io(format!("unable to create file {}", file_path.display()), e)
    })?;

    let pb = match content_length {
        Some(total) => {
            let pb = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
            ) {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        }
        None => ProgressBar::new_spinner(),
    };

    let mut body_stream = BodyStream::new(body);
    let mut downloaded = 0;
    while let Some(chunk_result) = body_stream.next().await {
        let frame = chunk_result.map_err(|e| {
            HttpstatError::body_io("failed to read response body", std::io::Error::other(e))
        })?;
        let Ok(bytes) = frame.into_data() else {
            continue;
        };

        file.write_all(&bytes).await.map_err(|e| {
            HttpstatError::body_io(format!("failed to write {}", file_path.display()), e)
        })?;
        downloaded += bytes.len() as u64;
        match content_length {
            Some(total) => pb.set_position(min(downloaded, total)),
            None => pb.tick(),
        }
    }
    file.flush().await.map_err(|e| {
        HttpstatError::body_io(format!("failed to write {}", file_path.display()), e)
    })?;

    pb.finish_and_clear();
    debug!("Saved {downloaded} bytes to {}", file_path.display());
    Ok(())
}

/// Picks the file name for `-O`: the `Content-Disposition` attachment name,
/// otherwise the last segment of the request path.
pub fn remote_filename(
    headers: &HeaderMap,
    request: &ExchangeRequest,
) -> Result<PathBuf, HttpstatError> {
    if let Some(name) = headers
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(attachment_filename)
    {
        return Ok(PathBuf::from(name));
    }

    request
        .target
        .path()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(PathBuf::from)
        .ok_or(HttpstatError::NoRemoteFilename)
}

/// Extracts `filename` from `attachment; filename="report.pdf"`. Directory
/// components are dropped.
fn attachment_filename(disposition: &str) -> Option<String> {
    let mut parts = disposition.split(';');
    let kind = parts.next()?.trim();
    if !kind.eq_ignore_ascii_case("attachment") {
        return None;
    }

    parts.find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value)
            .replace("\\\"", "\"");
        Path::new(&value)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .filter(|name| !name.is_empty())
    })
}
