//! Object key derivation
//!
//! Keys have the fixed shape `YYYY/MM/DD/<keyspace>/<table>/<file>`. The date
//! is the UTC day of the upload, not of the snapshot. Restores strip the date
//! prefix and place the remainder under the restore root.
//!
//! Key segments are stored percent-encoded by `object_store`, so a file named
//! `a~b#1.db` is listed as `a%7Eb%231.db`. Listed keys are passed back to the
//! store as-is and only decoded to build local file names.

use crate::layout::BackupFile;
use crate::{BackupError, Result};
use chrono::NaiveDate;
use object_store::path::Path as ObjectPath;
use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};

/// chrono format of the date segment.
pub const DATE_FORMAT: &str = "%Y/%m/%d";

/// Length of `YYYY/MM/DD/`, the date segment plus its trailing separator.
pub const DATE_PREFIX_LEN: usize = "YYYY/MM/DD/".len();

/// Number of key segments taken by the date.
const DATE_SEGMENTS: usize = 3;

/// `YYYY/MM/DD/` for `date`.
#[must_use]
pub fn date_prefix(date: NaiveDate) -> String {
    format!("{}/", date.format(DATE_FORMAT))
}

/// Key under which `file` is stored when uploaded on `date`.
#[must_use]
pub fn upload_key(date: NaiveDate, file: &BackupFile) -> ObjectPath {
    let day = date.format(DATE_FORMAT).to_string();
    ObjectPath::from_iter(day.split('/').chain([
        file.keyspace.as_str(),
        file.table.as_str(),
        file.file_name.as_str(),
    ]))
}

/// Split a key into its date and the `keyspace/table/file` remainder.
pub fn split_key(key: &str) -> Result<(NaiveDate, &str)> {
    let invalid = || BackupError::InvalidObjectKey(key.to_string());

    if key.len() <= DATE_PREFIX_LEN || !key.is_char_boundary(DATE_PREFIX_LEN) {
        return Err(invalid());
    }
    let (prefix, rest) = key.split_at(DATE_PREFIX_LEN);
    let day = prefix.strip_suffix('/').ok_or_else(invalid)?;

    // chrono accepts unpadded fields, the key format does not
    let shape_ok = day
        .bytes()
        .enumerate()
        .all(|(i, b)| if i == 4 || i == 7 { b == b'/' } else { b.is_ascii_digit() });
    if !shape_ok {
        return Err(invalid());
    }
    let date = NaiveDate::parse_from_str(day, DATE_FORMAT).map_err(|_| invalid())?;
    Ok((date, rest))
}

/// The `keyspace/table/file` part of a key.
pub fn strip_date_prefix(key: &str) -> Result<&str> {
    split_key(key).map(|(_, rest)| rest)
}

/// Local destination of `key` under `restore_root`.
///
/// Each segment after the date is decoded back to the original file name.
/// Segments that decode to nothing, to `.` or `..`, or to something holding a
/// path separator are rejected so a key can never climb out of the root.
pub fn restore_path(restore_root: &Path, key: &ObjectPath) -> Result<PathBuf> {
    let invalid = || BackupError::InvalidObjectKey(key.to_string());
    _ = split_key(key.as_ref())?;

    let mut path = restore_root.to_path_buf();
    let mut depth = 0usize;
    for part in key.parts().skip(DATE_SEGMENTS) {
        let name = percent_decode_str(part.as_ref())
            .decode_utf8()
            .map_err(|_| invalid())?;
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(invalid());
        }
        path.push(name.as_ref());
        depth += 1;
    }
    if depth == 0 {
        return Err(invalid());
    }
    Ok(path)
}
