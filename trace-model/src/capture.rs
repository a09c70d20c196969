//! Capture file formats: JSON lines for interoperability and a
//! length-prefixed rkyv frame format for compact captures.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use rkyv::util::AlignedVec;
use thiserror::Error;

use crate::TraceEvent;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed json event: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed binary frame: {0}")]
    Archive(#[from] rkyv::rancor::Error),

    #[error("frame length {0} exceeds maximum {1}")]
    FrameTooLarge(usize, usize),
}

/// Largest accepted binary frame. A single event is small; anything
/// beyond this is a corrupt length prefix.
const MAX_FRAME_LEN: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureFormat {
    JsonLines,
    Binary,
}

impl CaptureFormat {
    /// `.bin` captures are binary, everything else is treated as JSON
    /// lines.
    pub fn from_path(path: &Path) -> CaptureFormat {
        match path.extension().and_then(|e| e.to_str()) {
            Some("bin") => CaptureFormat::Binary,
            _ => CaptureFormat::JsonLines,
        }
    }
}

pub struct CaptureWriter<W: Write> {
    writer: W,
    format: CaptureFormat,
}

impl CaptureWriter<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self, CaptureError> {
        let format = CaptureFormat::from_path(path);
        let file = File::create(path)?;
        Ok(CaptureWriter {
            writer: BufWriter::new(file),
            format,
        })
    }
}

impl<W: Write> CaptureWriter<W> {
    pub fn new(writer: W, format: CaptureFormat) -> Self {
        CaptureWriter { writer, format }
    }

    pub fn write_event(&mut self, event: &TraceEvent) -> Result<(), CaptureError> {
        match self.format {
            CaptureFormat::JsonLines => {
                serde_json::to_writer(&mut self.writer, event)?;
                self.writer.write_all(b"\n")?;
            }
            CaptureFormat::Binary => {
                let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(event)?;
                let len = bytes.len() as u32;
                self.writer.write_all(&len.to_le_bytes())?;
                self.writer.write_all(&bytes)?;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), CaptureError> {
        self.writer.flush()?;
        Ok(())
    }
}

pub struct CaptureReader<R: BufRead> {
    reader: R,
    format: CaptureFormat,
    line: String,
}

impl CaptureReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, CaptureError> {
        let format = CaptureFormat::from_path(path);
        let file = File::open(path)?;
        Ok(CaptureReader::new(BufReader::new(file), format))
    }
}

impl<R: BufRead> CaptureReader<R> {
    pub fn new(reader: R, format: CaptureFormat) -> Self {
        CaptureReader {
            reader,
            format,
            line: String::new(),
        }
    }

    /// Reads the next event, or `None` at end of stream.
    pub fn read_event(&mut self) -> Result<Option<TraceEvent>, CaptureError> {
        match self.format {
            CaptureFormat::JsonLines => loop {
                self.line.clear();
                if self.reader.read_line(&mut self.line)? == 0 {
                    return Ok(None);
                }
                let trimmed = self.line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                return Ok(Some(serde_json::from_str(trimmed)?));
            },
            CaptureFormat::Binary => {
                let mut len_buf = [0u8; 4];
                match self.reader.read_exact(&mut len_buf) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
                    Err(e) => return Err(e.into()),
                }
                let len = u32::from_le_bytes(len_buf) as usize;
                if len > MAX_FRAME_LEN {
                    return Err(CaptureError::FrameTooLarge(len, MAX_FRAME_LEN));
                }
                let mut frame: AlignedVec = AlignedVec::with_capacity(len);
                frame.resize(len, 0);
                self.reader.read_exact(&mut frame)?;
                let event = rkyv::from_bytes::<TraceEvent, rkyv::rancor::Error>(&frame)?;
                Ok(Some(event))
            }
        }
    }
}

/// Reads a whole capture into memory, in recorded order.
pub fn read_capture(path: &Path) -> Result<Vec<TraceEvent>, CaptureError> {
    let mut reader = CaptureReader::open(path)?;
    let mut events = Vec::new();
    while let Some(event) = reader.read_event()? {
        events.push(event);
    }
    Ok(events)
}

pub fn write_capture(path: &Path, events: &[TraceEvent]) -> Result<(), CaptureError> {
    let mut writer = CaptureWriter::create(path)?;
    for event in events {
        writer.write_event(event)?;
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventId, EventKind};
    use rstest::*;
    use tempfile::TempDir;

    fn sample_events() -> Vec<TraceEvent> {
        vec![
            TraceEvent::new(
                0.0,
                10,
                10,
                EventKind::ProcessStart {
                    name: "app".to_string(),
                    command_line: "app --flag".to_string(),
                },
            ),
            TraceEvent::new(
                5.5,
                10,
                11,
                EventKind::Provider {
                    provider: "PerfLab".to_string(),
                    event: EventId::Numeric(1),
                },
            ),
            TraceEvent::new(9.0, 10, 10, EventKind::ProcessStop),
        ]
    }

    #[rstest]
    #[case::json("trace.jsonl")]
    #[case::binary("trace.bin")]
    fn capture_round_trip(#[case] file_name: &str) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(file_name);
        let events = sample_events();

        write_capture(&path, &events).unwrap();
        let back = read_capture(&path).unwrap();

        assert_eq!(back, events);
    }

    #[rstest]
    fn json_reader_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trace.jsonl");
        let events = sample_events();

        let mut content = String::new();
        for event in &events {
            content.push_str(&serde_json::to_string(event).unwrap());
            content.push_str("\n\n");
        }
        std::fs::write(&path, content).unwrap();

        assert_eq!(read_capture(&path).unwrap(), events);
    }

    #[rstest]
    fn binary_reader_rejects_corrupt_length() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trace.bin");
        std::fs::write(&path, u32::MAX.to_le_bytes()).unwrap();

        let err = read_capture(&path).unwrap_err();
        assert!(matches!(err, CaptureError::FrameTooLarge(_, _)));
    }

    #[rstest]
    fn missing_file_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let err = read_capture(&dir.path().join("absent.jsonl")).unwrap_err();
        assert!(matches!(err, CaptureError::Io(_)));
    }
}
