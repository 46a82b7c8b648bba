//! Line-oriented binary-text export (MIF-style memory images)
//!
//! Each scalar becomes one 16-character binary word followed by `\n`, in the
//! order the values are supplied. There is no header: the consumer knows the
//! element count and layout from the tensor shape.

use std::fs::{self, File, Permissions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tempfile::{Builder, NamedTempFile};

use crate::error::{FixedPointError, Result};
use crate::fixed::{decode_binary16, Q44, RoundingMode};

/// Counts reported by a completed export
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Number of lines written
    pub lines: usize,
    /// Number of values that saturated at -8.0 or 7.9375
    pub clipped: usize,
}

/// Quantize and write values to any sink, one word per line
pub fn write_lines<W, I, V>(values: I, writer: W, mode: RoundingMode) -> Result<ExportSummary>
where
    W: Write,
    I: IntoIterator<Item = V>,
    V: Into<f64>,
{
    let mut writer = BufWriter::new(writer);
    let mut summary = ExportSummary::default();

    for value in values {
        let q = Q44::quantize_checked(value.into(), mode)?;
        writeln!(writer, "{}", q.value.to_binary16())?;
        summary.lines += 1;
        if q.clipped {
            summary.clipped += 1;
        }
    }

    writer.flush()?;
    Ok(summary)
}

/// Export values to `path` with the default rounding mode
pub fn export_lines<P, I, V>(values: I, path: P) -> Result<ExportSummary>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = V>,
    V: Into<f64>,
{
    export_lines_with(values, path, RoundingMode::default())
}

/// Create the staging file for `path` in `dir`.
///
/// A new file gets the mode a plain create would give it (0666 less the
/// umask) instead of tempfile's private 0600.
fn staging_file(dir: &Path) -> io::Result<NamedTempFile> {
    let mut builder = Builder::new();
    builder.prefix(".mif-");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(Permissions::from_mode(0o666));
    }
    builder.tempfile_in(dir)
}

/// Permissions of an existing destination, `None` if it does not exist yet
fn existing_permissions(path: &Path) -> io::Result<Option<Permissions>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(meta.permissions())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Export values to `path`, replacing any previous contents.
///
/// Lines are written to a temporary file next to `path` and renamed into
/// place once every value has been encoded and flushed. On error the
/// temporary file is removed and `path` is left as it was. An overwritten
/// file keeps its permissions.
pub fn export_lines_with<P, I, V>(values: I, path: P, mode: RoundingMode) -> Result<ExportSummary>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = V>,
    V: Into<f64>,
{
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let previous = existing_permissions(path)?;
    let mut tmp = staging_file(dir)?;
    let summary = write_lines(values, tmp.as_file_mut(), mode)?;
    if let Some(perms) = previous {
        tmp.as_file().set_permissions(perms)?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    Ok(summary)
}

/// Parse an export back into 16-bit codes
pub fn read_codes<R: BufRead>(reader: R) -> Result<Vec<i16>> {
    let mut codes = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        // Tolerate files that went through a CRLF conversion
        let word = line.strip_suffix('\r').unwrap_or(&line);
        let code = decode_binary16(word).map_err(|_| FixedPointError::MalformedLine {
            line: idx + 1,
            content: word.to_string(),
        })?;
        codes.push(code);
    }
    Ok(codes)
}

/// Read an export file from disk
pub fn read_lines<P: AsRef<Path>>(path: P) -> Result<Vec<i16>> {
    let file = File::open(path)?;
    read_codes(BufReader::new(file))
}
