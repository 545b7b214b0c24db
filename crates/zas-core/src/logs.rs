//! Log tailing, change detection for live streaming, and combined export

use futures::Stream;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::{Duration, Instant, UNIX_EPOCH};
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use crate::error::Result;
use crate::paths::PluginPaths;

pub const DEFAULT_LINES: i64 = 400;
pub const MIN_LINES: usize = 50;
pub const MAX_LINES: usize = 2000;
pub const SUMMARY_MAX_BYTES: usize = 50_000;
pub const DEBUG_MAX_BYTES: usize = 500_000;
pub const MIN_MAX_BYTES: usize = 1024;

/// How long one streaming connection lives before the client must reconnect
pub const STREAM_DURATION: Duration = Duration::from_secs(55);
pub const STREAM_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub const EXPORT_FILENAME: &str = "zfs_autosnapshot_logs.txt";
const EXPORT_CHUNK_BYTES: usize = 64 * 1024;

/// Which log a request is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    /// Output of the latest run
    #[default]
    Summary,
    /// Accumulated worker output
    Debug,
}

impl LogKind {
    /// `debug` (any case, surrounding space ignored) selects the debug log;
    /// anything else falls back to the summary
    pub fn resolve(requested: Option<&str>) -> Self {
        match requested.map(|t| t.trim().to_lowercase()) {
            Some(t) if t == "debug" => Self::Debug,
            _ => Self::Summary,
        }
    }

    pub fn max_bytes(&self) -> usize {
        match self {
            Self::Summary => SUMMARY_MAX_BYTES,
            Self::Debug => DEBUG_MAX_BYTES,
        }
    }

    pub fn path<'a>(&self, paths: &'a PluginPaths) -> &'a Path {
        match self {
            Self::Summary => &paths.summary_log,
            Self::Debug => &paths.debug_log,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Debug => "debug",
        }
    }
}

/// Requested line count clamped to `[MIN_LINES, MAX_LINES]`.
///
/// Absent means the default; a value that is not an integer counts as zero.
pub fn clamp_lines(requested: Option<&str>) -> usize {
    let n = match requested {
        None => DEFAULT_LINES,
        Some(raw) => raw.trim().parse::<i64>().unwrap_or(0),
    };
    n.clamp(MIN_LINES as i64, MAX_LINES as i64) as usize
}

/// Snapshot of a log tail as served to the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPayload {
    pub ok: bool,
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub exists: bool,
    pub readable: bool,
    /// Unix seconds, `0` when missing
    pub mtime: i64,
    pub size: u64,
    pub truncated: bool,
    pub content: String,
}

impl LogPayload {
    fn empty(kind: LogKind) -> Self {
        Self {
            ok: true,
            kind,
            exists: false,
            readable: false,
            mtime: 0,
            size: 0,
            truncated: false,
            content: String::new(),
        }
    }

    /// Change-detection key for streaming: `mtime:size:len:md5(content)`
    pub fn fingerprint(&self) -> String {
        format!(
            "{}:{}:{}:{:x}",
            self.mtime,
            self.size,
            self.content.len(),
            md5::compute(self.content.as_bytes())
        )
    }
}

/// Last `lines` lines of `path`, bounded to `max_bytes`.
///
/// The text is the lines joined by `\n` plus a trailing `\n`. When it is
/// longer than the budget the oldest bytes are dropped, never splitting a
/// UTF-8 sequence, and the flag is set.
pub fn tail_file(path: &Path, lines: usize, max_bytes: usize) -> io::Result<(String, bool)> {
    let lines = lines.clamp(MIN_LINES, MAX_LINES);
    let max_bytes = max_bytes.max(MIN_MAX_BYTES);

    let mut file = File::open(path)?;
    let size = file.metadata()?.len();

    // Anything older than max_bytes + 2 can never survive the byte budget
    let window = (max_bytes as u64 + 2).min(size);
    let covers_start = window == size;
    file.seek(SeekFrom::Start(size - window))?;
    let mut buf = Vec::with_capacity(window as usize);
    file.take(window).read_to_end(&mut buf)?;

    let body = buf.strip_suffix(b"\n").unwrap_or(&buf);
    if body.is_empty() && covers_start {
        return Ok((String::new(), false));
    }

    let segments: Vec<&[u8]> = body.split(|b| *b == b'\n').collect();
    let keep = &segments[segments.len().saturating_sub(lines)..];

    let mut text = keep.join(&b'\n');
    text.push(b'\n');

    let mut truncated = false;
    if text.len() > max_bytes {
        let mut start = text.len() - max_bytes;
        while start < text.len() && (text[start] & 0xC0) == 0x80 {
            start += 1;
        }
        text.drain(..start);
        truncated = true;
    }

    Ok((String::from_utf8_lossy(&text).into_owned(), truncated))
}

/// Read the tail of one log. Missing or unreadable files are reported
/// through the payload flags, never as errors.
pub fn read_log(path: &Path, kind: LogKind, lines: usize) -> LogPayload {
    let mut payload = LogPayload::empty(kind);

    let meta = match fs::metadata(path) {
        Ok(meta) if meta.is_file() => meta,
        _ => return payload,
    };
    payload.exists = true;
    payload.size = meta.len();
    payload.mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    if File::open(path).is_err() {
        return payload;
    }
    payload.readable = true;

    match tail_file(path, lines, kind.max_bytes()) {
        Ok((content, truncated)) => {
            payload.content = content;
            payload.truncated = truncated;
        }
        Err(e) => debug!(path = %path.display(), error = %e, "Tail failed"),
    }
    payload
}

/// [`read_log`] on the blocking pool
pub async fn load_log(paths: &PluginPaths, kind: LogKind, lines: usize) -> LogPayload {
    let path = kind.path(paths).to_path_buf();
    match tokio::task::spawn_blocking(move || read_log(&path, kind, lines)).await {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Log read task failed");
            LogPayload::empty(kind)
        }
    }
}

/// One server-sent event of a log stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Payload(LogPayload),
    Ping { ts: i64 },
}

impl StreamEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Payload(_) => "payload",
            Self::Ping { .. } => "ping",
        }
    }

    pub fn data(&self) -> Result<String> {
        let data = match self {
            Self::Payload(payload) => serde_json::to_string(payload)?,
            Self::Ping { ts } => serde_json::to_string(&serde_json::json!({ "ts": ts }))?,
        };
        Ok(data)
    }
}

/// Per-connection streaming state
#[derive(Debug)]
pub struct LogStreamSession {
    pub kind: LogKind,
    pub lines: usize,
    started: Instant,
    duration: Duration,
    last_fingerprint: Option<String>,
}

impl LogStreamSession {
    pub fn new(kind: LogKind, lines: usize) -> Self {
        Self::with_duration(kind, lines, STREAM_DURATION)
    }

    pub fn with_duration(kind: LogKind, lines: usize, duration: Duration) -> Self {
        Self {
            kind,
            lines,
            started: Instant::now(),
            duration,
            last_fingerprint: None,
        }
    }

    /// Payload when the log changed since the previous poll, ping otherwise
    pub fn observe(&mut self, payload: LogPayload) -> StreamEvent {
        let fingerprint = payload.fingerprint();
        if self.last_fingerprint.as_deref() == Some(fingerprint.as_str()) {
            return StreamEvent::Ping {
                ts: chrono::Utc::now().timestamp(),
            };
        }
        self.last_fingerprint = Some(fingerprint);
        StreamEvent::Payload(payload)
    }

    pub fn expired(&self) -> bool {
        self.started.elapsed() >= self.duration
    }
}

fn export_header() -> String {
    format!(
        "ZFS Auto Snapshot Log Export\nGenerated: {} UTC\n\n",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S")
    )
}

/// Plain-text bundle of both logs for download, produced chunk by chunk so
/// a large debug log is never held in memory whole
pub fn export_stream(paths: &PluginPaths) -> impl Stream<Item = io::Result<Vec<u8>>> + Send + 'static {
    let sections = [
        ("Debug Log", paths.debug_log.clone()),
        ("Latest Run Summary", paths.summary_log.clone()),
    ];

    async_stream::stream! {
        yield Ok(export_header().into_bytes());

        for (index, (title, path)) in sections.into_iter().enumerate() {
            if index > 0 {
                yield Ok(b"\n".to_vec());
            }
            yield Ok(format!("===== {} ({}) =====\n", title, path.display()).into_bytes());

            let is_file = tokio::fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false);
            if !is_file {
                yield Ok(b"Log file is not present.\n".to_vec());
                continue;
            }
            let mut file = match tokio::fs::File::open(&path).await {
                Ok(file) => file,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Log not readable for export");
                    yield Ok(b"Log file exists but is not readable.\n".to_vec());
                    continue;
                }
            };

            let mut buf = vec![0u8; EXPORT_CHUNK_BYTES];
            let mut wrote_any = false;
            let mut failure = None;
            loop {
                match file.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        wrote_any = true;
                        yield Ok(buf[..n].to_vec());
                    }
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }
            if let Some(e) = failure {
                warn!(path = %path.display(), error = %e, "Log export read failed");
                yield Err(e);
                break;
            }
            if wrote_any {
                yield Ok(b"\n".to_vec());
            }
        }
    }
}
