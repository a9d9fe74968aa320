mod columnar;
mod ndjson;
mod span;

pub use columnar::export_columnar;
pub use ndjson::export_ndjson;
pub use span::{event_to_span, Span, SpanExporter, SpanStatus};

use std::path::{Path, PathBuf};

/// Writes to a temp sibling of `path` and renames into place on success; the
/// partial file is removed on any failure along the way. Shared by every
/// file-based exporter so a reader never observes a half-written export.
pub(crate) fn write_atomically<F>(path: &Path, write: F) -> crate::error::Result<()>
where
    F: FnOnce(&mut std::io::BufWriter<std::fs::File>) -> crate::error::Result<()>,
{
    let tmp_path = sibling_tmp_path(path);
    let file = std::fs::File::create(&tmp_path)?;
    let mut writer = std::io::BufWriter::new(file);

    match write(&mut writer).and_then(|_| {
        use std::io::Write;
        writer.flush().map_err(crate::error::Error::from)
    }) {
        Ok(()) => {
            drop(writer);
            std::fs::rename(&tmp_path, path)?;
            Ok(())
        }
        Err(err) => {
            let _ = std::fs::remove_file(&tmp_path);
            Err(err)
        }
    }
}

fn sibling_tmp_path(path: &Path) -> PathBuf {
    let file_name = path.file_name().and_then(|f| f.to_str()).unwrap_or("export");
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    parent.join(format!(".{}.tmp", file_name))
}
