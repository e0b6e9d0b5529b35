//! Access log normalization from CSV or JSONL lines to `LogRecord`

use serde::{Deserialize, Serialize};

/// What the aggregation pipeline consumes: one hit on a section at a second
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub section: String,
    pub timestamp: u64,
}

/// One access log line, with the column names of the CSV header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    #[serde(rename = "remotehost", default)]
    pub remote_host: String,
    #[serde(default)]
    pub rfc931: String,
    #[serde(rename = "authuser", default)]
    pub auth_user: String,
    pub date: u64,
    pub request: String,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub bytes: u64,
}

#[derive(Debug)]
pub enum ParseError {
    InvalidRequest(String),
    Csv(csv::Error),
    Json(serde_json::Error),
}

impl From<csv::Error> for ParseError {
    fn from(err: csv::Error) -> Self {
        ParseError::Csv(err)
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        ParseError::Json(err)
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::InvalidRequest(r) => write!(f, "no request path in '{}'", r),
            ParseError::Csv(e) => write!(f, "CSV error: {}", e),
            ParseError::Json(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for ParseError {}

impl AccessLogEntry {
    /// Parse a CSV line; `Ok(None)` for the header row
    ///
    /// Layout: `"remotehost","rfc931","authuser",date,"request",status,bytes`.
    /// Lines are parsed one at a time so follow mode can hand over each line
    /// as it is completed; columns map to fields by position.
    pub fn from_csv(line: &str) -> Result<Option<Self>, ParseError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_reader(line.as_bytes());

        let mut record = csv::StringRecord::new();
        if !reader.read_record(&mut record)? {
            return Ok(None);
        }
        if record.get(0) == Some("remotehost") {
            return Ok(None);
        }

        Ok(Some(record.deserialize(None)?))
    }

    /// Parse a JSONL line using the CSV column names as keys
    pub fn from_jsonl(line: &str) -> Result<Self, ParseError> {
        let entry: AccessLogEntry = serde_json::from_str(line)?;
        Ok(entry)
    }

    /// Section of the requested path (`GET /api/user HTTP/1.0` -> `/api`)
    pub fn section(&self) -> Option<String> {
        request_section(&self.request)
    }

    pub fn into_record(self) -> Result<LogRecord, ParseError> {
        let section = self
            .section()
            .ok_or_else(|| ParseError::InvalidRequest(self.request.clone()))?;
        Ok(LogRecord {
            section,
            timestamp: self.date,
        })
    }
}

impl LogRecord {
    /// Normalize one input line; `Ok(None)` for blank lines and CSV headers
    pub fn from_line(line: &str) -> Result<Option<Self>, ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let entry = if line.starts_with('{') {
            Some(AccessLogEntry::from_jsonl(line)?)
        } else {
            AccessLogEntry::from_csv(line)?
        };

        entry.map(AccessLogEntry::into_record).transpose()
    }
}

/// First path segment of a request line, query string stripped
pub fn request_section(request: &str) -> Option<String> {
    let mut parts = request.split_whitespace();
    let first = parts.next()?;
    let path = if first.starts_with('/') {
        first
    } else {
        parts.next()?
    };
    if !path.starts_with('/') {
        return None;
    }

    let path = match path.find(|c: char| c == '?' || c == '#') {
        Some(idx) => &path[..idx],
        None => path,
    };
    let end = path[1..].find('/').map(|idx| idx + 1).unwrap_or(path.len());
    Some(path[..end].to_string())
}
