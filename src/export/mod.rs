//! Export functionality for saving query results
//!
//! Serializes a set of stored events to RFC-4180-style delimited text,
//! either to a file or to any writer.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::store::StoredEvent;

/// Export configuration
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub delimiter: char,
    pub include_header: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            include_header: true,
        }
    }
}

/// Writes query results as delimited text.
pub struct CsvExporter {
    config: ExportConfig,
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self::new(ExportConfig::default())
    }
}

impl CsvExporter {
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    /// Export a result set to a file at `output_path`.
    pub fn export<P: AsRef<Path>>(&self, events: &[StoredEvent], output_path: P) -> Result<()> {
        let file = File::create(output_path.as_ref()).with_context(|| {
            format!("failed to create {}", output_path.as_ref().display())
        })?;
        let mut writer = BufWriter::new(file);
        self.export_to_writer(events, &mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Export to a writer (for streaming or custom outputs).
    pub fn export_to_writer<W: Write>(&self, events: &[StoredEvent], writer: &mut W) -> Result<()> {
        if self.config.include_header {
            self.write_row(
                writer,
                ["Filename", "Event", "Timestamp", "Extension", "Directory"],
            )?;
        }
        for stored in events {
            let event = &stored.event;
            self.write_row(
                writer,
                [
                    event.filename.as_str(),
                    event.kind.as_str(),
                    &event.timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
                    event.extension.as_str(),
                    &event.directory.to_string_lossy(),
                ],
            )?;
        }
        Ok(())
    }

    fn write_row<W: Write>(&self, writer: &mut W, fields: [&str; 5]) -> Result<()> {
        let mut first = true;
        for field in fields {
            if !first {
                write!(writer, "{}", self.config.delimiter)?;
            }
            write!(writer, "{}", self.escape(field))?;
            first = false;
        }
        writeln!(writer)?;
        Ok(())
    }

    /// Quotes a field when it contains the delimiter, a quote, or a line
    /// break; embedded quotes are doubled.
    fn escape(&self, field: &str) -> String {
        let needs_quoting = field.contains(self.config.delimiter)
            || field.contains('"')
            || field.contains('\n')
            || field.contains('\r');
        if needs_quoting {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventKind, MonitorEvent};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn stored(id: i64, filename: &str, directory: &str) -> StoredEvent {
        StoredEvent {
            id,
            event: MonitorEvent::new(filename, EventKind::Created, PathBuf::from(directory)),
        }
    }

    #[test]
    fn test_export_writes_header_and_rows() {
        let temp_dir = TempDir::new().unwrap();
        let output_path = temp_dir.path().join("report.csv");

        let exporter = CsvExporter::default();
        exporter
            .export(
                &[stored(1, "a.txt", "/watch"), stored(2, "b.log", "/watch/sub")],
                &output_path,
            )
            .unwrap();

        let content = fs::read_to_string(output_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Filename,Event,Timestamp,Extension,Directory");
        assert!(lines[1].starts_with("a.txt,CREATED,"));
        assert!(lines[2].ends_with("/watch/sub"));
    }

    #[test]
    fn test_fields_with_delimiter_are_quoted() {
        let mut buffer = Vec::new();
        let exporter = CsvExporter::default();
        exporter
            .export_to_writer(&[stored(1, "odd,name.txt", "/watch")], &mut buffer)
            .unwrap();

        let content = String::from_utf8(buffer).unwrap();
        assert!(content.contains("\"odd,name.txt\""));
    }

    #[test]
    fn test_embedded_quotes_are_doubled() {
        let mut buffer = Vec::new();
        let exporter = CsvExporter::default();
        exporter
            .export_to_writer(&[stored(1, "say \"hi\".txt", "/watch")], &mut buffer)
            .unwrap();

        let content = String::from_utf8(buffer).unwrap();
        assert!(content.contains("\"say \"\"hi\"\".txt\""));
    }

    #[test]
    fn test_header_can_be_disabled() {
        let mut buffer = Vec::new();
        let exporter = CsvExporter::new(ExportConfig {
            include_header: false,
            ..Default::default()
        });
        exporter
            .export_to_writer(&[stored(1, "a.txt", "/watch")], &mut buffer)
            .unwrap();

        let content = String::from_utf8(buffer).unwrap();
        assert!(!content.contains("Filename"));
        assert_eq!(content.lines().count(), 1);
    }
}
