//! Locale bundling -- archive each locale directory and upload it
//!
//! Runs after the export pipeline has resolved. One zip archive per locale
//! (stored, not deflated -- the clips are already compressed audio), uploaded
//! to the out bucket under `<release_name>/<locale>.zip`.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::FileOptions;

use crate::error::{Error, Result};
use crate::storage::ClipStorage;
use crate::types::Event;
use crate::utils::{bytes_to_size, locale_dirs};

/// One bundled and uploaded locale.
#[derive(Clone, Debug)]
pub struct BundleInfo {
    /// Locale the bundle covers
    pub locale: String,
    /// Local path of the created archive
    pub archive: PathBuf,
    /// Uploaded archive size in bytes
    pub uploaded_bytes: u64,
}

/// Bundle every locale directory under `out_dir` and upload the archives.
///
/// Archives are written to `<out_dir>/<release_name>/<locale>.zip` and
/// uploaded under the same relative key. Emits [`Event::BundleUploaded`] per
/// locale on `event_tx`.
pub async fn bundle_and_upload(
    out_dir: &Path,
    release_name: &str,
    storage: &dyn ClipStorage,
    event_tx: &broadcast::Sender<Event>,
) -> Result<Vec<BundleInfo>> {
    let archive_dir = out_dir.join(release_name);
    tokio::fs::create_dir_all(&archive_dir).await?;

    let mut bundles = Vec::new();
    for locale in locale_dirs(out_dir)? {
        if locale == release_name {
            continue;
        }

        let locale_dir = out_dir.join(&locale);
        let archive = archive_dir.join(format!("{locale}.zip"));

        tracing::info!(locale, archive = %archive.display(), "bundling locale");
        let archive_for_task = archive.clone();
        tokio::task::spawn_blocking(move || zip_directory(&locale_dir, &archive_for_task))
            .await
            .map_err(|e| Error::Bundle(format!("bundling task panicked: {e}")))??;

        let key = format!("{release_name}/{locale}.zip");
        let uploaded_bytes = storage.put_object(&key, &archive).await?;
        tracing::info!(
            locale,
            key,
            size = %bytes_to_size(uploaded_bytes),
            "bundle uploaded"
        );
        event_tx
            .send(Event::BundleUploaded {
                locale: locale.clone(),
                bytes: uploaded_bytes,
            })
            .ok();

        bundles.push(BundleInfo {
            locale,
            archive,
            uploaded_bytes,
        });
    }

    Ok(bundles)
}

/// Zip `dir` recursively into `archive`, storing entries uncompressed.
/// Entry order is sorted by filename so identical inputs produce identical
/// archives.
fn zip_directory(dir: &Path, archive: &Path) -> Result<()> {
    let file = File::create(archive)?;
    let mut writer = zip::ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .large_file(true);

    let mut buf = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            Error::Bundle(format!("failed to walk '{}': {e}", dir.display()))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| Error::Bundle(format!("entry outside archive root: {e}")))?
            .to_string_lossy()
            .replace('\\', "/");

        writer
            .start_file(name.as_str(), options)
            .map_err(|e| Error::Bundle(format!("failed to add '{name}': {e}")))?;
        buf.clear();
        File::open(entry.path())?.read_to_end(&mut buf)?;
        writer.write_all(&buf)?;
    }

    writer
        .finish()
        .map_err(|e| Error::Bundle(format!("failed to finish archive: {e}")))?;
    Ok(())
}
