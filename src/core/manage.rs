use std::{
    fs::{self, File, OpenOptions},
    io::{Read, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, error, trace};

use crate::error::ModSyncError;

const CHUNK_SIZE: usize = 64 * 1024;

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

fn write_chunks<F>(
    reader: &mut impl Read,
    part: &Path,
    total: u64,
    cb: &mut F,
) -> Result<u64, ModSyncError>
where
    F: FnMut(u64, u64, u64),
{
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(part)?;
    let mut buffer = vec![0; CHUNK_SIZE];
    let mut downloaded: u64 = 0;
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        file.write_all(&buffer[..read])?;
        downloaded += read as u64;
        cb(read as u64, downloaded, total.max(downloaded));
    }
    file.flush()?;
    Ok(downloaded)
}

/// Stream a download to disk and report progress
/// # Params
/// * reader - the response body
/// * len - expected size, if the server sent one
/// * file_path - Full path to save file to
/// * cb - called after every chunk with `(delta, current, total)`
///
/// The data is written to `<file_path>.part` first and only moved into place
/// once the whole body has been read.
pub fn download_file_with_progress<F>(
    mut reader: impl Read,
    len: Option<u64>,
    file_path: impl AsRef<Path>,
    mut cb: F,
) -> Result<File, ModSyncError>
where
    F: FnMut(u64, u64, u64),
{
    let file_path = file_path.as_ref();
    let part = part_path(file_path);
    let total = len.unwrap_or(0);

    match write_chunks(&mut reader, &part, total, &mut cb) {
        Ok(downloaded) => {
            if let Some(expected) = len {
                if expected != downloaded {
                    if let Err(e) = fs::remove_file(&part) {
                        trace!("Unable to remove {}: {}", part.display(), e);
                    }
                    return Err(ModSyncError::MiscError(format!(
                        "Expected {expected} bytes for {} but got {downloaded}",
                        file_path.display()
                    )));
                }
            }
            fs::rename(&part, file_path)?;
            debug!("Finished download to {}", file_path.display());
            Ok(File::open(file_path)?)
        }
        Err(e) => {
            if let Err(e) = fs::remove_file(&part) {
                trace!("Unable to remove {}: {}", part.display(), e);
            }
            error!("Download to {} failed: {}", file_path.display(), e);
            Err(e)
        }
    }
}

/// Wrapper for calling `download_file_with_progress` without a progress callback
pub fn download_file(
    reader: impl Read,
    len: Option<u64>,
    file_path: impl AsRef<Path>,
) -> Result<File, ModSyncError> {
    download_file_with_progress(reader, len, file_path, |_, _, _| {})
}

/// Move a mod file into `backup_dir`, keeping its name
///
/// An older backup with the same name is replaced. Returns the new path.
pub fn backup_mod(
    path: impl AsRef<Path>,
    backup_dir: impl AsRef<Path>,
) -> Result<PathBuf, ModSyncError> {
    let path = path.as_ref();
    let backup_dir = backup_dir.as_ref();
    let name = path
        .file_name()
        .ok_or_else(|| ModSyncError::MissingFile(path.to_path_buf()))?;

    fs::create_dir_all(backup_dir)?;
    let target = backup_dir.join(name);
    if target.exists() {
        debug!("Replacing older backup {}", target.display());
        fs::remove_file(&target)?;
    }
    move_file(path, &target)?;
    debug!("Backed up {} to {}", path.display(), target.display());

    Ok(target)
}

/// Put a backed up file back where it came from
pub fn restore_mod(
    backup: impl AsRef<Path>,
    original: impl AsRef<Path>,
) -> Result<(), ModSyncError> {
    let (backup, original) = (backup.as_ref(), original.as_ref());
    move_file(backup, original)?;
    debug!("Restored {} from {}", original.display(), backup.display());
    Ok(())
}

/// Rename, falling back to copy + delete when the paths are on different filesystems
fn move_file(from: &Path, to: &Path) -> Result<(), ModSyncError> {
    if fs::rename(from, to).is_err() {
        trace!("Rename failed, copying {} instead", from.display());
        fs::copy(from, to)?;
        fs::remove_file(from)?;
    }
    Ok(())
}
