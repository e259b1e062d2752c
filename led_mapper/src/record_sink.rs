// THEORY:
// The `record_sink` module externalises the finished LED table. The persisted format
// is a plain CSV with header `LED_index,x,y`, one row per LED in ascending index
// order, unresolved LEDs written as `-1,-1`. Downstream tooling only understands
// that layout, so the status of each LED is opt-in as a fourth column.

use crate::error::MapperError;
use crate::pipeline::LedRecord;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Anything that can persist a finished, ordered table of LED records.
pub trait RowSink {
    fn write_records(&mut self, records: &[LedRecord]) -> Result<(), MapperError>;
}

/// Writes LED records as CSV.
pub struct CsvSink<W: Write> {
    writer: W,
    with_status: bool,
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W, with_status: bool) -> Self {
        Self {
            writer,
            with_status,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl CsvSink<BufWriter<File>> {
    /// Creates (or truncates) the CSV file at `path`, creating parent directories.
    pub fn create(path: impl AsRef<Path>, with_status: bool) -> Result<Self, MapperError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file), with_status))
    }
}

impl<W: Write> RowSink for CsvSink<W> {
    fn write_records(&mut self, records: &[LedRecord]) -> Result<(), MapperError> {
        if self.with_status {
            writeln!(self.writer, "LED_index,x,y,status")?;
        } else {
            writeln!(self.writer, "LED_index,x,y")?;
        }

        for record in records {
            if self.with_status {
                writeln!(
                    self.writer,
                    "{},{},{},{}",
                    record.led_index,
                    record.x,
                    record.y,
                    record.status.tag()
                )?;
            } else {
                writeln!(self.writer, "{},{},{}", record.led_index, record.x, record.y)?;
            }
        }

        self.writer.flush()?;
        Ok(())
    }
}
