//! CPK file and directory structures.
//!
//! CPK stores a flat per-file `DirName`; the directory tree is assembled
//! by splitting those paths and de-duplicating intermediate nodes. The
//! capability surface is deliberately small: enumerate directories,
//! enumerate files, extract.

/// One file within a CPK archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpkFile {
    /// Relative directory path within the archive ('/' separated,
    /// "TOC"/"ITOC" rooted).
    pub directory: String,
    /// File name (synthetic `{row:05}.bin` for NULL-named rows).
    pub name: String,
    /// Absolute, alignment-rounded offset of the stored bytes.
    pub offset: u64,
    /// Stored size in bytes.
    pub size: u64,
    /// Decompressed size; differs from `size` for CRILAYLA-compressed
    /// members, but the signature sniff at `offset` is authoritative.
    pub extract_size: u64,
}

/// A directory node in the assembled tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpkDirectory {
    /// Directory name ("" for the archive root).
    pub name: String,
    /// Files directly in this directory.
    pub files: Vec<CpkFile>,
    /// Child directories.
    pub subdirectories: Vec<CpkDirectory>,
}

impl CpkDirectory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            files: Vec::new(),
            subdirectories: Vec::new(),
        }
    }

    /// Walk `path` (split on `/` or `\`), creating missing intermediate
    /// directories and reusing existing ones by name, and return the
    /// final node.
    pub fn descend(&mut self, path: &str) -> &mut CpkDirectory {
        let mut current = self;

        for segment in path.split(['/', '\\']).filter(|s| !s.is_empty()) {
            let index = match current
                .subdirectories
                .iter()
                .position(|d| d.name == segment)
            {
                Some(index) => index,
                None => {
                    current.subdirectories.push(CpkDirectory::new(segment));
                    current.subdirectories.len() - 1
                }
            };
            current = &mut current.subdirectories[index];
        }

        current
    }

    /// All files in this directory and its subtree.
    pub fn all_files(&self) -> Vec<&CpkFile> {
        let mut out: Vec<&CpkFile> = self.files.iter().collect();
        for sub in &self.subdirectories {
            out.extend(sub.all_files());
        }
        out
    }

    /// Total file count in this subtree.
    pub fn file_count(&self) -> usize {
        self.files.len()
            + self
                .subdirectories
                .iter()
                .map(CpkDirectory::file_count)
                .sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descend_creates_and_reuses() {
        let mut root = CpkDirectory::new("TOC");

        root.descend("voice/en");
        root.descend("voice\\jp");
        root.descend("voice/en");

        assert_eq!(root.subdirectories.len(), 1);
        let voice = &root.subdirectories[0];
        assert_eq!(voice.name, "voice");
        assert_eq!(voice.subdirectories.len(), 2);
        assert_eq!(voice.subdirectories[0].name, "en");
        assert_eq!(voice.subdirectories[1].name, "jp");
    }

    #[test]
    fn test_descend_empty_path_is_self() {
        let mut root = CpkDirectory::new("TOC");
        root.descend("").files.push(CpkFile {
            directory: "TOC".into(),
            name: "a.bin".into(),
            offset: 0,
            size: 0,
            extract_size: 0,
        });

        assert_eq!(root.files.len(), 1);
        assert_eq!(root.file_count(), 1);
    }
}
