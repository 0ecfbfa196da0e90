//! Spool directory mail source.
//!
//! ```text
//! <spool>/unread/<name>.json   one RawEmail per file
//! <spool>/read/<name>.json     moved here by mark_read
//! ```

use anyhow::{Context, Result, bail};
use billmail_core::{MailSource, RawEmail};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

pub struct SpoolMailSource {
    root: PathBuf,
    /// id -> file, filled by fetch_unread
    seen: Mutex<HashMap<String, PathBuf>>,
}

impl SpoolMailSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            seen: Mutex::new(HashMap::new()),
        }
    }

    pub fn unread_dir(&self) -> PathBuf {
        self.root.join("unread")
    }

    pub fn read_dir(&self) -> PathBuf {
        self.root.join("read")
    }

    fn load(path: &Path) -> Result<RawEmail> {
        let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let mut email: RawEmail =
            serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
        if email.id.trim().is_empty() {
            email.id = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
        }
        Ok(email)
    }
}

impl MailSource for SpoolMailSource {
    fn fetch_unread(&self, filter: Option<&str>) -> Result<Vec<RawEmail>> {
        let dir = self.unread_dir();
        let entries = fs::read_dir(&dir).with_context(|| format!("open spool {}", dir.display()))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let filter = filter.map(str::to_lowercase).filter(|f| !f.is_empty());
        let mut seen = self
            .seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut emails = Vec::new();

        for path in paths {
            let email = match Self::load(&path) {
                Ok(email) => email,
                Err(e) => {
                    warn!("skipping spool file: {e:#}");
                    continue;
                }
            };
            if let Some(f) = &filter {
                if !email.sender.to_lowercase().contains(f.as_str()) {
                    debug!(id = %email.id, sender = %email.sender, "sender filtered out");
                    continue;
                }
            }
            seen.insert(email.id.clone(), path);
            emails.push(email);
        }
        Ok(emails)
    }

    fn mark_read(&self, id: &str) -> Result<()> {
        let known = self
            .seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(id);
        let src = known.unwrap_or_else(|| self.unread_dir().join(format!("{id}.json")));
        if !src.exists() {
            bail!("no unread spool file for {id}");
        }
        let Some(name) = src.file_name() else {
            bail!("bad spool path {}", src.display());
        };

        let read_dir = self.read_dir();
        fs::create_dir_all(&read_dir).with_context(|| format!("create {}", read_dir.display()))?;
        let dest = read_dir.join(name);
        fs::rename(&src, &dest)
            .with_context(|| format!("move {} -> {}", src.display(), dest.display()))?;
        debug!(id, dest = %dest.display(), "marked read");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_email(dir: &Path, file: &str, id: &str, sender: &str) {
        let email = RawEmail {
            id: id.to_string(),
            subject: "You sent a payment".to_string(),
            sender: sender.to_string(),
            body: "You sent $5.00 to ACME".to_string(),
        };
        fs::write(dir.join(file), serde_json::to_string(&email).unwrap()).unwrap();
    }

    fn spool() -> (tempfile::TempDir, SpoolMailSource) {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("unread")).unwrap();
        let source = SpoolMailSource::new(tmp.path());
        (tmp, source)
    }

    #[test]
    fn test_fetch_sorted_and_filtered() {
        let (tmp, source) = spool();
        let unread = tmp.path().join("unread");
        write_email(&unread, "b.json", "b", "Chase <no.reply@chase.com>");
        write_email(&unread, "a.json", "a", "CHASE alerts");
        write_email(&unread, "c.json", "c", "news@example.com");
        fs::write(unread.join("notes.txt"), "not an email").unwrap();

        let all = source.fetch_unread(None).unwrap();
        assert_eq!(all.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), vec!["a", "b", "c"]);

        let chase = source.fetch_unread(Some("chase")).unwrap();
        assert_eq!(chase.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_bad_file_skipped() {
        let (tmp, source) = spool();
        let unread = tmp.path().join("unread");
        fs::write(unread.join("0-broken.json"), "{not json").unwrap();
        write_email(&unread, "1-ok.json", "ok", "Chase");
        let emails = source.fetch_unread(None).unwrap();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].id, "ok");
    }

    #[test]
    fn test_id_defaults_to_file_stem() {
        let (tmp, source) = spool();
        fs::write(tmp.path().join("unread").join("msg-7.json"), r#"{"body": "hi"}"#).unwrap();
        let emails = source.fetch_unread(None).unwrap();
        assert_eq!(emails[0].id, "msg-7");
    }

    #[test]
    fn test_mark_read_moves_file() {
        let (tmp, source) = spool();
        write_email(&tmp.path().join("unread"), "x1.json", "id-1", "Chase");
        source.fetch_unread(None).unwrap();
        source.mark_read("id-1").unwrap();

        assert!(!tmp.path().join("unread").join("x1.json").exists());
        assert!(tmp.path().join("read").join("x1.json").exists());
        assert!(source.fetch_unread(None).unwrap().is_empty());
        assert!(source.mark_read("id-1").is_err());
    }

    #[test]
    fn test_fixture_spool() {
        let fixture = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .parent()
            .unwrap()
            .join("fixtures")
            .join("spool")
            .join("unread");
        let (tmp, source) = spool();
        for entry in fs::read_dir(&fixture).unwrap() {
            let path = entry.unwrap().path();
            fs::copy(&path, tmp.path().join("unread").join(path.file_name().unwrap())).unwrap();
        }

        let emails = source.fetch_unread(Some("Chase")).unwrap();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].id, "0001-chase-sent");
        assert!(emails[0].body.contains("$1,635.00"));
    }

    #[test]
    fn test_missing_unread_dir_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let source = SpoolMailSource::new(tmp.path().join("nope"));
        assert!(source.fetch_unread(None).is_err());
    }
}
