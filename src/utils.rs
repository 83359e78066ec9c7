//! Utility functions

use std::io::BufRead;
use std::path::Path;

use crate::error::Result;

/// Format a byte count as a human-readable size ("1 KB", "3 MB", ...).
pub fn bytes_to_size(bytes: u64) -> String {
    const SIZES: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 Byte".to_string();
    }
    let i = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
    let i = i.min(SIZES.len() - 1);
    let value = (bytes as f64 / 1024f64.powi(i as i32)).round() as u64;
    format!("{} {}", value, SIZES[i])
}

/// Count the number of lines in a file.
pub fn count_file_lines(path: &Path) -> Result<usize> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    let mut count = 0;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf)?;
        if read == 0 {
            break;
        }
        count += 1;
    }
    Ok(count)
}

/// List locale directories directly under the output directory, sorted.
pub fn locale_dirs(out_dir: &Path) -> Result<Vec<String>> {
    let mut locales = Vec::new();
    for entry in std::fs::read_dir(out_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                locales.push(name.to_string());
            }
        }
    }
    locales.sort();
    Ok(locales)
}
