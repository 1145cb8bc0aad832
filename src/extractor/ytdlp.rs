//! yt-dlp backed extractor
//!
//! Talks to the `yt-dlp` binary over its CLI: `-J` for metadata probing and a
//! machine-readable `--progress-template` line stream for downloads. Parsing
//! helpers are pure functions so they can be unit tested without the binary.

use std::path::Path;
use std::process::Stdio;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use super::{Extractor, ExtractorError, FetchUpdate, MediaFormat, MediaInfo};
use crate::config::ExtractorConfig;
use crate::humanize::{format_eta, format_rate};

/// Progress lines come out as `clipbox|<percent>|<speed>|<eta>|<filename>`,
/// with numeric speed (bytes/s) and eta (seconds) that we render ourselves.
const PROGRESS_TEMPLATE: &str =
    "download:clipbox|%(progress._percent_str)s|%(progress.speed)s|%(progress.eta)s|%(progress.filename)s";

/// How many trailing stderr lines to keep for error reporting.
const STDERR_TAIL_LINES: usize = 5;

pub struct YtDlpExtractor {
    config: ExtractorConfig,
}

impl YtDlpExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    fn output_template(&self) -> String {
        format!("{}/%(title)s.%(ext)s", self.config.downloads_dir.display())
    }

    fn spawn_error(err: std::io::Error, binary: &str) -> ExtractorError {
        if err.kind() == std::io::ErrorKind::NotFound {
            ExtractorError::Unavailable(format!("{} not found on PATH", binary))
        } else {
            ExtractorError::Unavailable(err.to_string())
        }
    }
}

#[async_trait::async_trait]
impl Extractor for YtDlpExtractor {
    async fn probe(&self, url: &str) -> Result<MediaInfo, ExtractorError> {
        debug!(url, "Probing media metadata");

        let output = Command::new(&self.config.binary)
            .args(["-J", "--no-download", url])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Self::spawn_error(e, &self.config.binary))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractorError::Failed(tail_lines(&stderr)));
        }

        parse_probe_output(&output.stdout, &self.config.allowed_exts)
    }

    async fn fetch(
        &self,
        url: &str,
        format_id: &str,
        updates: UnboundedSender<FetchUpdate>,
    ) -> Result<(), ExtractorError> {
        debug!(url, format_id, "Starting download");

        let outtmpl = self.output_template();
        let mut child = Command::new(&self.config.binary)
            .args([
                "-f",
                format_id,
                "-o",
                outtmpl.as_str(),
                "--newline",
                "--quiet",
                "--progress",
                "--progress-template",
                PROGRESS_TEMPLATE,
                url,
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Self::spawn_error(e, &self.config.binary))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExtractorError::Unavailable("stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExtractorError::Unavailable("stderr not captured".to_string()))?;

        // Drain stderr on its own task so a chatty engine cannot deadlock the
        // stdout loop on a full pipe.
        let stderr_task = tokio::spawn(async move {
            let mut tail: Vec<String> = Vec::new();
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.remove(0);
                }
                tail.push(line);
            }
            tail.join("; ")
        });

        // Reading line by line keeps this task yielding to the scheduler
        // between progress callbacks, so concurrent jobs stay live.
        let mut filename = String::new();
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if let Some(update) = parse_progress_line(&line) {
                        if let FetchUpdate::Progress { filename: name, .. } = &update {
                            if !name.is_empty() {
                                filename = name.clone();
                            }
                        }
                        let _ = updates.send(update);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed reading engine output");
                    break;
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| ExtractorError::Failed(e.to_string()))?;
        let stderr_tail = stderr_task.await.unwrap_or_default();

        if status.success() {
            let _ = updates.send(FetchUpdate::Finished { filename });
            Ok(())
        } else if stderr_tail.is_empty() {
            Err(ExtractorError::Failed(format!(
                "engine exited with {}",
                status
            )))
        } else {
            Err(ExtractorError::Failed(stderr_tail))
        }
    }
}

/// Raw `-J` output; only the fields we surface.
#[derive(Debug, Deserialize)]
struct RawInfo {
    title: Option<String>,
    thumbnail: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    format_id: String,
    resolution: Option<String>,
    format_note: Option<String>,
    ext: Option<String>,
    filesize: Option<u64>,
    vcodec: Option<String>,
}

fn parse_probe_output(stdout: &[u8], allowed_exts: &[String]) -> Result<MediaInfo, ExtractorError> {
    let raw: RawInfo =
        serde_json::from_slice(stdout).map_err(|e| ExtractorError::Metadata(e.to_string()))?;

    let formats = raw
        .formats
        .into_iter()
        .filter(|f| {
            f.ext
                .as_deref()
                .is_some_and(|ext| allowed_exts.iter().any(|allowed| allowed == ext))
        })
        .map(|f| {
            let resolution = match f.resolution {
                Some(res) => res,
                None if f.vcodec.as_deref() == Some("none") => "Audio Only".to_string(),
                None => "N/A".to_string(),
            };
            MediaFormat {
                format_id: f.format_id,
                resolution,
                note: f.format_note.unwrap_or_default(),
                ext: f.ext.unwrap_or_default(),
                filesize: f.filesize.unwrap_or(0),
            }
        })
        .collect();

    Ok(MediaInfo {
        title: raw.title,
        thumbnail: raw.thumbnail,
        duration: raw.duration,
        formats,
    })
}

/// Parses one templated progress line; returns `None` for anything else.
fn parse_progress_line(line: &str) -> Option<FetchUpdate> {
    let rest = line.trim().strip_prefix("clipbox|")?;
    let mut parts = rest.splitn(4, '|');

    let percent = parse_percent(parts.next()?);
    let speed = format_rate(parts.next()?.trim().parse::<f64>().ok());
    let eta = format_eta(parts.next()?.trim().parse::<u64>().ok());
    let filename = parts.next().unwrap_or_default().trim().to_string();

    Some(FetchUpdate::Progress {
        percent,
        speed,
        eta,
        filename,
    })
}

/// Percent strings arrive as e.g. `"  3.4%"`; anything unparseable degrades
/// to 0.0 and values are clamped to [0, 100].
fn parse_percent(raw: &str) -> f64 {
    raw.trim()
        .trim_end_matches('%')
        .parse::<f64>()
        .unwrap_or(0.0)
        .clamp(0.0, 100.0)
}

fn tail_lines(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .filter(|l| !l.trim().is_empty())
        .collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("; ")
}

/// Best-effort check that the configured binary exists in a directory.
/// Used by the health endpoint; never blocks on running the engine.
pub fn binary_on_path(binary: &str) -> bool {
    if binary.contains('/') {
        return Path::new(binary).exists();
    }
    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths).any(|dir| dir.join(binary).is_file())
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_percent() {
        assert_eq!(parse_percent("  3.4%"), 3.4);
        assert_eq!(parse_percent("100.0%"), 100.0);
        assert_eq!(parse_percent("NA"), 0.0);
        assert_eq!(parse_percent(""), 0.0);
        assert_eq!(parse_percent("150%"), 100.0);
        assert_eq!(parse_percent("-5%"), 0.0);
    }

    #[test]
    fn test_parse_progress_line() {
        let update =
            parse_progress_line("clipbox| 42.5%|1258291.2|31|downloads/My Clip.mp4").unwrap();
        assert_eq!(
            update,
            FetchUpdate::Progress {
                percent: 42.5,
                speed: "1.1MB/s".to_string(),
                eta: "00:31".to_string(),
                filename: "downloads/My Clip.mp4".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_progress_line_with_missing_fields() {
        // yt-dlp renders unavailable template fields as "NA".
        let update = parse_progress_line("clipbox|NA|NA|NA|").unwrap();
        assert_eq!(
            update,
            FetchUpdate::Progress {
                percent: 0.0,
                speed: "N/A".to_string(),
                eta: "N/A".to_string(),
                filename: String::new(),
            }
        );
    }

    #[test]
    fn test_parse_progress_line_ignores_other_output() {
        assert!(parse_progress_line("[download] Destination: a.mp4").is_none());
        assert!(parse_progress_line("").is_none());
        assert!(parse_progress_line("WARNING: unable to rate-limit").is_none());
    }

    #[test]
    fn test_parse_probe_output_filters_formats() {
        let json = r#"{
            "title": "Test Video",
            "thumbnail": "https://example.com/t.jpg",
            "duration": 212.0,
            "formats": [
                {"format_id": "18", "resolution": "640x360", "format_note": "360p",
                 "ext": "mp4", "filesize": 10485760, "vcodec": "avc1"},
                {"format_id": "140", "resolution": null, "format_note": "medium",
                 "ext": "m4a", "filesize": null, "vcodec": "none"},
                {"format_id": "sb0", "resolution": "48x27", "format_note": "storyboard",
                 "ext": "mhtml", "filesize": null, "vcodec": "none"}
            ]
        }"#;

        let allowed = vec!["mp4".to_string(), "m4a".to_string(), "webm".to_string()];
        let info = parse_probe_output(json.as_bytes(), &allowed).unwrap();

        assert_eq!(info.title.as_deref(), Some("Test Video"));
        assert_eq!(info.duration, Some(212.0));
        // The mhtml storyboard is filtered out by the allow-list.
        assert_eq!(info.formats.len(), 2);
        assert_eq!(info.formats[0].format_id, "18");
        assert_eq!(info.formats[0].filesize, 10_485_760);
        // Audio-only formats report "Audio Only" in place of a resolution.
        assert_eq!(info.formats[1].resolution, "Audio Only");
        assert_eq!(info.formats[1].filesize, 0);
    }

    #[test]
    fn test_parse_probe_output_rejects_garbage() {
        let allowed = vec!["mp4".to_string()];
        assert!(matches!(
            parse_probe_output(b"not json", &allowed),
            Err(ExtractorError::Metadata(_))
        ));
    }

    #[test]
    fn test_tail_lines_keeps_last_lines() {
        let stderr = "one\ntwo\n\nthree\nfour\nfive\nsix\nseven\n";
        assert_eq!(tail_lines(stderr), "three; four; five; six; seven");
        assert_eq!(tail_lines(""), "");
    }
}
