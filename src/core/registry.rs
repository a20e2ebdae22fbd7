//! # Instance Registry
//!
//! Flat-file store of every OpenVPN instance on the host.
//!
//! ## File Format
//!
//! ```text
//! # Created by ovpn-instances, DO NOT EDIT!
//! # Instance Name;Port;Protocol;Network
//! inst0;1194;udp;10.0.0.0
//! inst1;1195;tcp;10.0.1.0
//! ```
//!
//! One record per line, fields are positional and `;`-separated, surrounding
//! whitespace is trimmed on read. Lines starting with optional whitespace and
//! `#` are comments, blank lines are ignored.
//!
//! Entries are only ever appended. The file is re-read on every invocation.

use nix::fcntl::{Flock, FlockArg};
use regex::Regex;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::core::conflict::{find_conflicts, NetworkMatch};
use crate::domain::model::{Instance, Protocol};
use crate::utils::error::{OvpnError, Result};
use crate::utils::validation::validate_ipv4;

pub const DEFAULT_REGISTRY_PATH: &str = "/etc/openvpn/instances";

const HEADER: &str = "# Created by ovpn-instances, DO NOT EDIT!\n# Instance Name;Port;Protocol;Network\n";
const FIELD_COUNT: usize = 4;

static COMMENT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*#").expect("static regex"));

#[derive(Debug, Clone)]
pub struct Registry {
    path: PathBuf,
}

impl Registry {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the registry with its header if it does not exist yet.
    ///
    /// Returns `true` when this call wrote the header. A populated file is
    /// never touched.
    pub fn ensure_created(&self) -> Result<bool> {
        let (_locked, _content, created) = self.open_locked()?;
        Ok(created)
    }

    /// All instances in file order. A missing file means no instances.
    pub fn read_all(&self) -> Result<Vec<Instance>> {
        if !self.path.exists() {
            tracing::debug!("Registry {} does not exist yet", self.path.display());
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)?;
        let instances = parse_registry(&content)?;
        tracing::debug!(
            "Loaded {} instance(s) from {}",
            instances.len(),
            self.path.display()
        );
        Ok(instances)
    }

    /// Appends one record. Uniqueness is the caller's responsibility.
    pub fn append(&self, instance: &Instance) -> Result<()> {
        let (mut locked, _content, _created) = self.open_locked()?;
        locked.write_all(format_line(instance).as_bytes())?;
        locked.flush()?;
        tracing::info!("Appended {} to {}", instance.name, self.path.display());
        Ok(())
    }

    /// Re-reads the registry under an exclusive lock, re-checks the candidate
    /// and appends it only if it still conflicts with nothing.
    pub fn append_checked(&self, instance: &Instance, network_match: NetworkMatch) -> Result<()> {
        let (mut locked, content, _created) = self.open_locked()?;
        let current = parse_registry(&content)?;

        let conflicts = find_conflicts(instance, &current, network_match);
        if !conflicts.is_empty() {
            tracing::warn!(
                "{} conflicts with {} instance(s) written since it was configured",
                instance.name,
                conflicts.len()
            );
            return Err(OvpnError::Conflict {
                candidate: instance.clone(),
                conflicts,
            });
        }

        locked.write_all(format_line(instance).as_bytes())?;
        locked.flush()?;
        tracing::info!("Appended {} to {}", instance.name, self.path.display());
        Ok(())
    }

    /// Opens (creating if needed) the registry in append mode and takes the
    /// exclusive lock. The header is written only by the lock holder that finds
    /// the file empty, so a record appended by another process is never
    /// overwritten. Returns the lock, the content read under it, and whether
    /// the header was written.
    fn open_locked(&self) -> Result<(Flock<File>, String, bool)> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)?;
        tracing::debug!("Waiting for lock on {}", self.path.display());
        let mut locked = Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, errno)| {
            OvpnError::LockError {
                message: format!("flock on {} failed: {}", self.path.display(), errno),
            }
        })?;

        let mut content = String::new();
        locked.read_to_string(&mut content)?;
        if !content.is_empty() {
            return Ok((locked, content, false));
        }

        locked.write_all(HEADER.as_bytes())?;
        locked.flush()?;
        tracing::info!("Created instance registry {}", self.path.display());
        Ok((locked, HEADER.to_string(), true))
    }
}

pub fn format_line(instance: &Instance) -> String {
    format!(
        "{};{};{};{}\n",
        instance.name, instance.port, instance.protocol, instance.network
    )
}

pub fn is_skipped_line(line: &str) -> bool {
    line.trim().is_empty() || COMMENT_LINE.is_match(line)
}

/// Parses a whole registry file. Fails on the first malformed record.
pub fn parse_registry(content: &str) -> Result<Vec<Instance>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !is_skipped_line(line))
        .map(|(idx, line)| parse_line(idx + 1, line))
        .collect()
}

/// Parses one `name;port;protocol;network` record. `line_no` is 1-based.
pub fn parse_line(line_no: usize, line: &str) -> Result<Instance> {
    let malformed = |reason: String| OvpnError::MalformedRegistryLine {
        line: line_no,
        content: line.to_string(),
        reason,
    };

    let fields: Vec<&str> = line.split(';').map(str::trim).collect();
    if fields.len() < FIELD_COUNT {
        return Err(malformed(format!(
            "expected {} fields, found {}",
            FIELD_COUNT,
            fields.len()
        )));
    }
    if fields.len() > FIELD_COUNT {
        tracing::warn!(
            "Registry line {} has {} fields, ignoring everything after the network",
            line_no,
            fields.len()
        );
    }

    let name = fields[0];
    if name.is_empty() {
        return Err(malformed("empty instance name".to_string()));
    }
    let port = fields[1]
        .parse::<u16>()
        .map_err(|e| malformed(format!("invalid port '{}': {}", fields[1], e)))?;
    let protocol = fields[2]
        .parse::<Protocol>()
        .map_err(|reason| malformed(reason))?;
    let network = validate_ipv4("network", fields[3])
        .map_err(|_| malformed(format!("invalid network '{}'", fields[3])))?;

    Ok(Instance::new(name, port, protocol, network))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tempfile::tempdir;

    fn sample(name: &str, port: u16, c: u8) -> Instance {
        Instance::new(name, port, Protocol::Udp, Ipv4Addr::new(10, 0, c, 0))
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempdir().unwrap();
        let registry = Registry::new(dir.path().join("instances"));
        assert!(registry.read_all().unwrap().is_empty());
        assert!(!registry.path().exists());
    }

    #[test]
    fn test_ensure_created_writes_header_in_nested_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("etc/openvpn/instances");
        let registry = Registry::new(&path);

        assert!(registry.ensure_created().unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), HEADER);
        assert!(registry.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_ensure_created_is_idempotent() {
        let dir = tempdir().unwrap();
        let registry = Registry::new(dir.path().join("instances"));

        registry.ensure_created().unwrap();
        registry.append(&sample("inst0", 1194, 0)).unwrap();
        let before = fs::read_to_string(registry.path()).unwrap();

        assert!(!registry.ensure_created().unwrap());
        assert!(!registry.ensure_created().unwrap());
        assert_eq!(fs::read_to_string(registry.path()).unwrap(), before);
    }

    #[test]
    fn test_parse_trims_and_skips_comments() {
        let content = "# header\n\n   # indented comment\n inst0 ; 1194 ;udp; 10.0.0.0 \ninst1;1195;tcp;10.0.1.0\n";
        let instances = parse_registry(content).unwrap();
        assert_eq!(
            instances,
            vec![
                Instance::new("inst0", 1194, Protocol::Udp, Ipv4Addr::new(10, 0, 0, 0)),
                Instance::new("inst1", 1195, Protocol::Tcp, Ipv4Addr::new(10, 0, 1, 0)),
            ]
        );
    }

    #[test]
    fn test_parse_fails_on_short_line() {
        let err = parse_registry("# header\ninst0;1194;udp\n").unwrap_err();
        match err {
            OvpnError::MalformedRegistryLine { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_bad_fields() {
        assert!(parse_line(1, "inst0;port;udp;10.0.0.0").is_err());
        assert!(parse_line(1, "inst0;1194;icmp;10.0.0.0").is_err());
        assert!(parse_line(1, "inst0;1194;udp;10.0.0").is_err());
        assert!(parse_line(1, ";1194;udp;10.0.0.0").is_err());
    }

    #[test]
    fn test_parse_ignores_extra_fields() {
        let instance = parse_line(1, "inst0;1194;udp;10.0.0.0;extra").unwrap();
        assert_eq!(instance, sample("inst0", 1194, 0));
    }

    #[test]
    fn test_format_line() {
        assert_eq!(format_line(&sample("inst0", 1194, 0)), "inst0;1194;udp;10.0.0.0\n");
    }

    #[test]
    fn test_append_checked_rejects_conflict() {
        let dir = tempdir().unwrap();
        let registry = Registry::new(dir.path().join("instances"));
        registry.append(&sample("inst0", 1194, 0)).unwrap();

        let err = registry
            .append_checked(&sample("inst1", 1195, 0), NetworkMatch::Exact)
            .unwrap_err();
        assert!(matches!(err, OvpnError::Conflict { .. }));
        assert_eq!(registry.read_all().unwrap().len(), 1);

        registry
            .append_checked(&sample("inst1", 1195, 1), NetworkMatch::Exact)
            .unwrap();
        assert_eq!(registry.read_all().unwrap().len(), 2);
    }

    #[test]
    fn test_create_racing_append_keeps_record() {
        for _ in 0..200 {
            let dir = tempdir().unwrap();
            let path = dir.path().join("instances");
            let creator = Registry::new(&path);
            let writer = Registry::new(&path);
            let instance = sample("inst0", 1194, 0);

            let expected = instance.clone();
            let create = std::thread::spawn(move || creator.ensure_created().unwrap());
            let append = std::thread::spawn(move || {
                writer
                    .append_checked(&instance, NetworkMatch::Exact)
                    .unwrap()
            });
            create.join().unwrap();
            append.join().unwrap();

            let content = fs::read_to_string(&path).unwrap();
            assert!(content.starts_with(HEADER), "{:?}", content);
            assert_eq!(Registry::new(&path).read_all().unwrap(), vec![expected]);
        }
    }

    #[test]
    fn test_empty_file_gets_header() {
        let dir = tempdir().unwrap();
        let registry = Registry::new(dir.path().join("instances"));
        fs::write(registry.path(), "").unwrap();

        assert!(registry.ensure_created().unwrap());
        assert_eq!(fs::read_to_string(registry.path()).unwrap(), HEADER);
    }
}
