use crate::bundle::Bundle;
use crate::domain::constants::DOCUMENT_MARKER;
use flate2::{write::GzEncoder, Compression};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tar::{Builder, EntryType, Header};

/// Byte-addressable filesystem the bundle writers target.
pub trait Filesystem {
    fn create_dir_all(&mut self, path: &Path) -> io::Result<()>;
    fn write_file(&mut self, path: &Path, data: &[u8]) -> io::Result<()>;
}

/// In-memory filesystem used for archives and image layers.
#[derive(Debug, Clone, Default)]
pub struct MemFs {
    dirs: BTreeSet<PathBuf>,
    files: BTreeMap<PathBuf, Vec<u8>>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn read_file(&self, path: &Path) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    fn add_parents(&mut self, path: &Path) {
        let mut cur = path.parent();
        while let Some(p) = cur {
            if p.as_os_str().is_empty() {
                break;
            }
            self.dirs.insert(p.to_path_buf());
            cur = p.parent();
        }
    }
}

impl Filesystem for MemFs {
    fn create_dir_all(&mut self, path: &Path) -> io::Result<()> {
        if self.files.contains_key(path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} is a file", path.display()),
            ));
        }
        self.add_parents(path);
        self.dirs.insert(path.to_path_buf());
        Ok(())
    }

    fn write_file(&mut self, path: &Path, data: &[u8]) -> io::Result<()> {
        if self.dirs.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} is a directory", path.display()),
            ));
        }
        self.add_parents(path);
        self.files.insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }
}

/// Filesystem rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct DirFs {
    root: PathBuf,
}

impl DirFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Filesystem for DirFs {
    fn create_dir_all(&mut self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(self.root.join(path))
    }

    fn write_file(&mut self, path: &Path, data: &[u8]) -> io::Result<()> {
        let full = self.root.join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(full, data)
    }
}

/// Renders templates then constraints from their original bytes.
pub fn write_yaml(bundle: &Bundle) -> Vec<u8> {
    let raws = bundle
        .templates()
        .iter()
        .map(|t| t.raw())
        .chain(bundle.constraints().iter().map(|c| c.raw()));
    let mut out = Vec::new();
    for raw in raws {
        out.extend_from_slice(DOCUMENT_MARKER.as_bytes());
        out.push(b'\n');
        out.extend_from_slice(raw);
        if !raw.ends_with(b"\n") {
            out.push(b'\n');
        }
    }
    out
}

/// Writes the rendered bundle as `<base_dir>/<file_name>`, returning the path.
pub fn write_fs(
    bundle: &Bundle,
    fsys: &mut impl Filesystem,
    base_dir: &str,
    file_name: &str,
) -> io::Result<PathBuf> {
    let path = if base_dir.is_empty() {
        PathBuf::from(file_name)
    } else {
        fsys.create_dir_all(Path::new(base_dir))?;
        Path::new(base_dir).join(file_name)
    };
    fsys.write_file(&path, &write_yaml(bundle))?;
    Ok(path)
}

/// Tars the filesystem with fixed modes and zero mtimes.
pub fn archive(fsys: &MemFs) -> io::Result<Vec<u8>> {
    let mut builder = Builder::new(Vec::new());
    for dir in &fsys.dirs {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Directory);
        header.set_size(0);
        header.set_mode(0o755);
        header.set_mtime(0);
        header.set_cksum();
        builder.append_data(&mut header, dir, io::empty())?;
    }
    for (path, data) in &fsys.files {
        let mut header = Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_cksum();
        builder.append_data(&mut header, path, data.as_slice())?;
    }
    builder.into_inner()
}

pub fn compress(data: &[u8], w: impl Write) -> io::Result<()> {
    let mut encoder = GzEncoder::new(w, Compression::default());
    encoder.write_all(data)?;
    encoder.finish()?;
    Ok(())
}

/// Writes the bundle into a gzip-compressed tar stream.
pub fn write_compressed_archive(bundle: &Bundle, file_name: &str, w: impl Write) -> io::Result<()> {
    let mut fsys = MemFs::new();
    write_fs(bundle, &mut fsys, "", file_name)?;
    compress(&archive(&fsys)?, w)
}
