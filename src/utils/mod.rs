use anyhow::{anyhow, Context, Result};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

/// Ensure directory exists
pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {:?}", path))?;
    }
    Ok(())
}

/// Worker pool size: the requested count, else every available core
pub fn worker_count(requested: Option<usize>) -> usize {
    requested.filter(|&n| n > 0).unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    })
}

/// Subject identifier encoded for use in a file name
///
/// Bytes outside `[A-Za-z0-9._-]` become `%XX`, so distinct identifiers
/// always map to distinct names.
pub fn file_safe(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for b in name.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

/// Run `f`, turning a panic into an error
pub fn catch_panic<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|panic| Err(anyhow!("panicked: {}", panic_message(&*panic))))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Format duration as human-readable string
pub fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else if secs < 3600.0 {
        format!("{:.1}m", secs / 60.0)
    } else {
        format!("{:.1}h", secs / 3600.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30.0), "30.0s");
        assert_eq!(format_duration(90.0), "1.5m");
        assert_eq!(format_duration(3600.0), "1.0h");
    }

    #[test]
    fn test_worker_count() {
        assert_eq!(worker_count(Some(3)), 3);
        assert!(worker_count(None) >= 1);
        assert!(worker_count(Some(0)) >= 1);
    }

    #[test]
    fn test_file_safe() {
        assert_eq!(file_safe("bird_07"), "bird_07");
        assert_eq!(file_safe("tag 3/a"), "tag%203%2Fa");
        assert_eq!(file_safe("50%"), "50%25");
    }

    #[test]
    fn test_file_safe_keeps_ids_distinct() {
        let ids = ["bird/1", "bird_1", "bird 1", "bird%2F1", "bird\\1"];
        let names: std::collections::HashSet<String> = ids.iter().map(|id| file_safe(id)).collect();
        assert_eq!(names.len(), ids.len());
    }

    #[test]
    fn test_catch_panic() {
        let ok: Result<u8> = catch_panic(|| Ok(3));
        assert_eq!(ok.unwrap(), 3);

        let err = catch_panic::<u8, _>(|| panic!("fold {} exploded", "B")).unwrap_err();
        assert!(err.to_string().contains("fold B exploded"));

        let err = catch_panic::<u8, _>(|| Err(anyhow!("plain failure"))).unwrap_err();
        assert_eq!(err.to_string(), "plain failure");
    }

    #[test]
    fn test_ensure_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let nested = dir.path().join("a/b");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
        ensure_dir(&nested).unwrap();
    }
}
