//! Selection of objects to restore
//!
//! A restore covers exactly one calendar day. Every object under that day's
//! prefix is a candidate; the keyspace filter is a plain string prefix on the
//! `keyspace/table/file` remainder, so `ks1` also selects `ks10/...`.

use crate::key::{DATE_FORMAT, strip_date_prefix};
use crate::{BackupError, Result};
use chrono::{DateTime, Days, NaiveDate, Utc};
use diagnostics::*;
use futures::TryStreamExt;
use object_store::ObjectStore;
use object_store::path::Path as ObjectPath;

/// The single day restored when asked for `days` days before `now`.
///
/// A `days` reaching past the calendar's start is a configuration error.
pub fn restore_date(now: DateTime<Utc>, days: u32) -> Result<NaiveDate> {
    now.date_naive()
        .checked_sub_days(Days::new(u64::from(days)))
        .ok_or_else(|| {
            BackupError::InvalidConfig(format!("cannot restore {days} days before {now}"))
        })
}

/// Whether a key remainder passes the keyspace filter.
#[must_use]
pub fn matches_keyspace(remainder: &str, keyspace: Option<&str>) -> bool {
    match keyspace {
        None => true,
        Some(prefix) => remainder.starts_with(prefix),
    }
}

/// Keys stored on `date`, narrowed by `keyspace`, in key order.
///
/// The listing follows continuation pages until the prefix is exhausted.
pub async fn list_restore_keys(
    store: &dyn ObjectStore,
    date: NaiveDate,
    keyspace: Option<&str>,
) -> Result<Vec<ObjectPath>> {
    let day = date.format(DATE_FORMAT).to_string();
    let prefix = ObjectPath::from(day.as_str());

    let listed: Vec<_> = store
        .list(Some(&prefix))
        .try_collect()
        .await
        .map_err(|e| BackupError::store(&day, e))?;

    let mut keys = Vec::new();
    for meta in listed {
        let key = meta.location;
        let remainder = match strip_date_prefix(key.as_ref()) {
            Ok(rest) => rest,
            Err(_) => {
                log_warn!("Ignoring object {key} with unexpected key shape", key: key.as_ref());
                continue;
            }
        };
        if matches_keyspace(remainder, keyspace) {
            keys.push(key);
        }
    }
    keys.sort();

    let count = keys.len() as u64;
    log_info!("Found {count} objects to restore for {day}", count: count, day: day.as_str());
    Ok(keys)
}
