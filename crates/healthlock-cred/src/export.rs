//! Compliance export of the audit trail.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::audit::AuditEntry;
use crate::error::{AccessError, AccessResult};

pub const CSV_HEADER: &str = "access_id,event_kind,timestamp,detail";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!("unknown export format: {}", other)),
        }
    }
}

/// One exported row. Timestamps are RFC 3339 in UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub access_id: String,
    pub event_kind: String,
    pub timestamp: String,
    pub detail: String,
}

impl From<&AuditEntry> for ExportRecord {
    fn from(entry: &AuditEntry) -> Self {
        Self {
            access_id: entry.event.access_id.to_string(),
            event_kind: entry.event.kind.as_str().to_string(),
            timestamp: entry.event.timestamp.to_rfc3339(),
            detail: entry.event.detail.clone(),
        }
    }
}

/// Quote a CSV field per RFC 4180 when it contains a separator, quote or
/// line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// CSV with a header row and CRLF line endings.
pub fn export_csv(entries: &[AuditEntry]) -> String {
    let mut out = String::with_capacity(CSV_HEADER.len() + 2 + entries.len() * 96);
    out.push_str(CSV_HEADER);
    out.push_str("\r\n");
    for entry in entries {
        let record = ExportRecord::from(entry);
        let row = [
            csv_field(&record.access_id),
            csv_field(&record.event_kind),
            csv_field(&record.timestamp),
            csv_field(&record.detail),
        ];
        out.push_str(&row.join(","));
        out.push_str("\r\n");
    }
    out
}

/// A JSON array of records, in log order.
pub fn export_json(entries: &[AuditEntry]) -> AccessResult<String> {
    let records: Vec<ExportRecord> = entries.iter().map(ExportRecord::from).collect();
    serde_json::to_string_pretty(&records)
        .map_err(|e| AccessError::Internal(format!("audit export serialization: {}", e)))
}

pub fn export(entries: &[AuditEntry], format: ExportFormat) -> AccessResult<String> {
    match format {
        ExportFormat::Csv => Ok(export_csv(entries)),
        ExportFormat::Json => export_json(entries),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLog;
    use healthlock_core::{AccessId, AuditEvent, AuditEventKind, AuditLogWriter, Timestamp};

    fn sample_log() -> (AuditLog, AccessId) {
        let log = AuditLog::new();
        let id = AccessId::generate();
        log.append(AuditEvent::new(
            id.clone(),
            AuditEventKind::Issued,
            Timestamp::from_seconds(1000),
            "role=doctor expires_at=4600",
        ))
        .unwrap();
        log.append(AuditEvent::new(
            id.clone(),
            AuditEventKind::Rejected,
            Timestamp::from_seconds(5000),
            "expired",
        ))
        .unwrap();
        (log, id)
    }

    #[test]
    fn test_csv_layout() {
        let (log, id) = sample_log();
        let csv = export_csv(&log.all_entries().unwrap());
        let lines: Vec<&str> = csv.split("\r\n").collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(
            lines[1],
            format!(
                "{},issued,1970-01-01T00:16:40+00:00,role=doctor expires_at=4600",
                id
            )
        );
        assert!(lines[2].ends_with(",expired"));
        // header, two rows, trailing empty after final CRLF
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_csv_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_csv_empty_log() {
        assert_eq!(export_csv(&[]), format!("{}\r\n", CSV_HEADER));
    }

    #[test]
    fn test_json_export() {
        let (log, id) = sample_log();
        let json = export_json(&log.all_entries().unwrap()).unwrap();
        let records: Vec<ExportRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].access_id, id.to_string());
        assert_eq!(records[0].event_kind, "issued");
        assert_eq!(records[1].detail, "expired");
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("xml".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::default(), ExportFormat::Csv);
    }
}
