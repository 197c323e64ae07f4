use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

/// Leaf names probed when an address points at a directory.
const INDEX_LEAVES: [&str; 3] = ["index.rw", "index.html", "index.txt"];

/// The crawl loop's only window onto content. Implementations decide what an
/// address means; an `Err` marks the address failed and the crawl moves on.
pub trait ContentFetcher {
    fn fetch(&self, address: &str) -> Result<Vec<u8>>;
}

/// Serves a site tree from a local directory: `host/path/page.rw` maps onto
/// `root/host/path/page.rw`, with the conventional index leaves tried when
/// the path has no file of its own.
pub struct FsFetcher {
    root: PathBuf,
}

impl FsFetcher {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        FsFetcher { root: root.as_ref().to_path_buf() }
    }

    fn candidates(&self, address: &str) -> Result<Vec<PathBuf>> {
        let stripped = address.split_once("://").map_or(address, |(_, rest)| rest);
        let stripped = stripped.trim_matches('/');
        if stripped.split('/').any(|seg| seg == "..") {
            bail!("address escapes the site root: {address}");
        }
        let base = self.root.join(stripped);
        let mut candidates = vec![base.clone()];
        for leaf in INDEX_LEAVES {
            candidates.push(base.join(leaf));
        }
        Ok(candidates)
    }
}

impl ContentFetcher for FsFetcher {
    fn fetch(&self, address: &str) -> Result<Vec<u8>> {
        for path in self.candidates(address)? {
            if path.is_file() {
                return std::fs::read(&path).with_context(|| format!("read {}", path.display()));
            }
        }
        bail!("no content at {address}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn reads_a_leaf_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("site.rw/docs")).unwrap();
        fs::write(dir.path().join("site.rw/docs/page.rw"), b"hello").unwrap();
        let fetcher = FsFetcher::new(dir.path());
        assert_eq!(fetcher.fetch("site.rw/docs/page.rw").unwrap(), b"hello");
    }

    #[test]
    fn falls_back_to_directory_index() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("site.rw/docs")).unwrap();
        fs::write(dir.path().join("site.rw/docs/index.rw"), b"front").unwrap();
        let fetcher = FsFetcher::new(dir.path());
        assert_eq!(fetcher.fetch("site.rw/docs").unwrap(), b"front");
        assert_eq!(fetcher.fetch("site.rw/docs/").unwrap(), b"front");
    }

    #[test]
    fn missing_content_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FsFetcher::new(dir.path());
        assert!(fetcher.fetch("site.rw/nowhere.rw").is_err());
    }

    #[test]
    fn rejects_escaping_addresses() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FsFetcher::new(dir.path());
        assert!(fetcher.fetch("site.rw/../outside.rw").is_err());
    }
}
