use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::Path;

/// Hash a file without loading it into memory; save files can be large.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Render `<hash>  <name>` lines in the order given.
pub fn format_checksum_file<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let mut out = String::new();
    for (name, hash) in entries {
        out.push_str(hash);
        out.push_str("  ");
        out.push_str(name);
        out.push('\n');
    }
    out
}

pub fn parse_checksum_file(content: &str) -> BTreeMap<String, String> {
    let mut checksums = BTreeMap::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut parts = line.split_whitespace();
        let hash = match parts.next() {
            Some(value) => value,
            None => continue,
        };
        let filename = match parts.next() {
            Some(value) => value,
            None => continue,
        };

        let filename = filename.trim_start_matches('*').trim_start_matches("./");
        if !filename.is_empty() {
            checksums.insert(filename.to_string(), hash.to_lowercase());
        }
    }

    checksums
}
