use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("empty source")]
    Empty,
    #[error("source not found: {0}")]
    NotFound(String),
    #[error("source must point to a file, not a directory: {0}")]
    IsDirectory(String),
    #[error("unsupported source scheme: {0}")]
    Unsupported(String),
    #[error("failed to read {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to fetch {location}: {source}")]
    Http {
        location: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Reads raw bytes for a location identifier.
pub trait SourceLoader {
    fn read_bytes(&self, location: &str) -> Result<Vec<u8>, SourceError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    File(PathBuf),
    Http(String),
    Unsupported(String),
}

/// Classifies a user-supplied source string.
pub fn parse_location(raw: &str) -> Result<Location, SourceError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(SourceError::Empty);
    }
    if let Some(path) = s.strip_prefix("file://") {
        return Ok(Location::File(PathBuf::from(path)));
    }
    if s.starts_with("http://") || s.starts_with("https://") {
        return Ok(Location::Http(s.to_string()));
    }
    if let Some((scheme, _)) = s.split_once("://") {
        if !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c)) {
            return Ok(Location::Unsupported(s.to_string()));
        }
    }
    Ok(Location::File(PathBuf::from(s)))
}

/// Loader for local files, `file://` URLs and HTTP(S).
#[derive(Debug, Clone)]
pub struct FileLoader {
    http_timeout: Duration,
}

impl FileLoader {
    pub fn new(http_timeout_ms: u64) -> Self {
        Self {
            http_timeout: Duration::from_millis(http_timeout_ms),
        }
    }

    fn read_file(&self, path: PathBuf) -> Result<Vec<u8>, SourceError> {
        let location = path.to_string_lossy().to_string();
        let meta = std::fs::metadata(&path).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => SourceError::NotFound(location.clone()),
            _ => SourceError::Io {
                location: location.clone(),
                source,
            },
        })?;
        if meta.is_dir() {
            return Err(SourceError::IsDirectory(location));
        }
        std::fs::read(&path).map_err(|source| SourceError::Io { location, source })
    }

    fn read_http(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        let http = |source| SourceError::Http {
            location: url.to_string(),
            source,
        };
        let client = reqwest::blocking::Client::builder()
            .timeout(self.http_timeout)
            .build()
            .map_err(http)?;
        let resp = client.get(url).send().map_err(http)?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(url.to_string()));
        }
        let resp = resp.error_for_status().map_err(http)?;
        Ok(resp.bytes().map_err(http)?.to_vec())
    }
}

impl SourceLoader for FileLoader {
    fn read_bytes(&self, location: &str) -> Result<Vec<u8>, SourceError> {
        info!(source = location, "reading source");
        match parse_location(location)? {
            Location::File(path) => self.read_file(path),
            Location::Http(url) => self.read_http(&url),
            Location::Unsupported(s) => Err(SourceError::Unsupported(s)),
        }
    }
}

/// Reads stdin to the end unless it is attached to a terminal.
pub fn read_stdin_if_piped() -> std::io::Result<Vec<u8>> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(vec![]);
    }
    info!("reading input from stdin");
    let mut buf = Vec::new();
    stdin.lock().read_to_end(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::{parse_location, FileLoader, Location, SourceError, SourceLoader};
    use std::path::PathBuf;

    #[test]
    fn classifies_locations() {
        assert_eq!(
            parse_location("policies.yaml").expect("path"),
            Location::File(PathBuf::from("policies.yaml"))
        );
        assert_eq!(
            parse_location("file:///etc/policies.yaml").expect("file url"),
            Location::File(PathBuf::from("/etc/policies.yaml"))
        );
        assert_eq!(
            parse_location("https://example.com/p.yaml").expect("http"),
            Location::Http("https://example.com/p.yaml".to_string())
        );
        assert!(matches!(
            parse_location("git+https://github.com/org/repo//p.yaml").expect("git"),
            Location::Unsupported(_)
        ));
        assert!(matches!(
            parse_location("s3://bucket/p.yaml").expect("s3"),
            Location::Unsupported(_)
        ));
    }

    #[test]
    fn empty_location_is_rejected() {
        assert!(matches!(parse_location("  "), Err(SourceError::Empty)));
    }

    #[test]
    fn reads_local_file() {
        let tmp = tempfile::TempDir::new().expect("temp dir");
        let path = tmp.path().join("p.yaml");
        std::fs::write(&path, b"kind: X\n").expect("write");
        let loader = FileLoader::new(1000);
        let bytes = loader
            .read_bytes(path.to_str().expect("utf8 path"))
            .expect("read");
        assert_eq!(bytes, b"kind: X\n");
    }

    #[test]
    fn missing_file_is_not_found() {
        let loader = FileLoader::new(1000);
        let err = loader.read_bytes("/nonexistent/p.yaml").unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
    }

    #[test]
    fn directory_is_rejected() {
        let tmp = tempfile::TempDir::new().expect("temp dir");
        let loader = FileLoader::new(1000);
        let err = loader
            .read_bytes(tmp.path().to_str().expect("utf8 path"))
            .unwrap_err();
        assert!(matches!(err, SourceError::IsDirectory(_)));
    }

    #[test]
    fn unsupported_scheme_is_reported() {
        let loader = FileLoader::new(1000);
        let err = loader.read_bytes("gs://bucket/p.yaml").unwrap_err();
        assert!(matches!(err, SourceError::Unsupported(_)));
    }
}
