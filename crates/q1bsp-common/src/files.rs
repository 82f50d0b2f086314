// files.rs — byte-buffer suppliers for the map loader
//
// The loader never opens files itself; it asks a `FileLoader` for the whole buffer.
// `FsContext` is the on-disk implementation: an ordered list of plain directories.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::common::{com_dprintf, com_printf};

/// Maximum bytes per read chunk (64k)
const MAX_READ: usize = 0x10000;

/// Something that can hand out whole files by name.
pub trait FileLoader {
    /// Returns the file contents, or `None` if the file does not exist or can't be read.
    fn load_file(&self, path: &str) -> Option<Vec<u8>>;
}

/// In-memory file table, keyed by path.
impl FileLoader for HashMap<String, Vec<u8>> {
    fn load_file(&self, path: &str) -> Option<Vec<u8>> {
        self.get(path).cloned()
    }
}

/// Result of opening a file through the search path.
pub struct FsOpenResult {
    pub file: File,
    pub length: u64,
    pub path: PathBuf,
}

/// Filesystem state: the directories searched for relative paths, highest priority first.
#[derive(Debug, Default)]
pub struct FsContext {
    pub search_paths: Vec<PathBuf>,
}

impl FsContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a directory to the search path. Later additions take priority.
    pub fn add_search_path<P: AsRef<Path>>(&mut self, dir: P) {
        let dir = dir.as_ref().to_path_buf();
        com_dprintf(&format!("Added search path {}\n", dir.display()));
        self.search_paths.insert(0, dir);
    }

    /// Returns the length of an open file.
    pub fn filelength(f: &mut File) -> io::Result<u64> {
        let pos = f.stream_position()?;
        let end = f.seek(SeekFrom::End(0))?;
        f.seek(SeekFrom::Start(pos))?;
        Ok(end)
    }

    /// Finds the file: the path as given first, then each search directory in turn.
    pub fn fopen_file(&self, filename: &str) -> Option<FsOpenResult> {
        let direct = PathBuf::from(filename);
        let candidates = std::iter::once(direct)
            .chain(self.search_paths.iter().map(|dir| dir.join(filename)));

        for path in candidates {
            if let Ok(mut f) = File::open(&path) {
                com_dprintf(&format!("FindFile: {}\n", path.display()));
                let length = Self::filelength(&mut f).unwrap_or(0);
                return Some(FsOpenResult { file: f, length, path });
            }
        }

        com_dprintf(&format!("FindFile: can't find {}\n", filename));
        None
    }

    /// Reads exactly `buf.len()` bytes from `f`, in blocks of at most 64k.
    pub fn fs_read(buf: &mut [u8], f: &mut File) -> io::Result<()> {
        let mut offset = 0usize;

        while offset < buf.len() {
            let block = std::cmp::min(buf.len() - offset, MAX_READ);
            match f.read(&mut buf[offset..offset + block]) {
                Ok(0) => {
                    return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "0 bytes read"));
                }
                Ok(n) => offset += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl FileLoader for FsContext {
    fn load_file(&self, path: &str) -> Option<Vec<u8>> {
        let result = self.fopen_file(path)?;
        let mut f = result.file;
        let len = usize::try_from(result.length).ok()?;

        let mut buf = vec![0u8; len];
        if let Err(e) = Self::fs_read(&mut buf, &mut f) {
            com_printf(&format!("FS_LoadFile: read error on {}: {}\n", result.path.display(), e));
            return None;
        }
        Some(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("q1bsp-files-{}-{}", tag, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_from_search_path() {
        let dir = scratch_dir("search");
        let mut f = File::create(dir.join("start.bsp")).unwrap();
        f.write_all(&[1, 2, 3, 4, 5]).unwrap();
        drop(f);

        let mut fs = FsContext::new();
        fs.add_search_path(&dir);
        assert_eq!(fs.load_file("start.bsp"), Some(vec![1, 2, 3, 4, 5]));
        assert_eq!(fs.load_file("missing.bsp"), None);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_later_search_path_wins() {
        let low = scratch_dir("low");
        let high = scratch_dir("high");
        std::fs::write(low.join("e1m1.bsp"), b"low").unwrap();
        std::fs::write(high.join("e1m1.bsp"), b"high").unwrap();

        let mut fs = FsContext::new();
        fs.add_search_path(&low);
        fs.add_search_path(&high);
        assert_eq!(fs.load_file("e1m1.bsp").as_deref(), Some(&b"high"[..]));

        std::fs::remove_dir_all(&low).ok();
        std::fs::remove_dir_all(&high).ok();
    }

    #[test]
    fn test_direct_path() {
        let dir = scratch_dir("direct");
        let path = dir.join("direct.bsp");
        std::fs::write(&path, vec![7u8; MAX_READ + 10]).unwrap();

        let fs = FsContext::new();
        let data = fs.load_file(path.to_str().unwrap()).unwrap();
        assert_eq!(data.len(), MAX_READ + 10);
        assert!(data.iter().all(|&b| b == 7));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_memory_loader() {
        let mut files = HashMap::new();
        files.insert("maps/test.bsp".to_string(), vec![9u8, 9]);
        assert_eq!(files.load_file("maps/test.bsp"), Some(vec![9, 9]));
        assert_eq!(files.load_file("maps/other.bsp"), None);
    }
}
