//! The `include` directive
//!
//! An include path is resolved by trying, in order:
//!
//! 1. the path itself, if it is absolute;
//! 2. the path relative to the directory of the file containing the directive;
//! 3. the path relative to each configured include search path.
//!
//! Included documents must have the root element `Include`.
//! The root element is dropped and its content spliced into the including document.

use std::path::{Path, PathBuf};

use crate::error::{Error, Kind, Result};

/// Maximum number of nested includes.
pub const MAX_INCLUDE_DEPTH: usize = 1024;

/// Root element of included documents.
pub const INCLUDE_ROOT_ELEMENT: &str = "Include";

/// File system operations that the preprocessor may need to perform.
///
/// These operations are extracted to a trait so that they be mocked out in unit testing.
pub trait FileSystem {
    /// Read the entire contents of a file into a string.
    ///
    /// This is implemented by [std::fs::read_to_string].
    fn read_to_string(&self, path: &Path) -> std::io::Result<String>;

    /// Whether a file exists at the path.
    fn is_file(&self, path: &Path) -> bool;
}

/// Implementation of the file system trait the uses the real file system.
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> std::io::Result<String> {
        std::fs::read_to_string(path)
    }
    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Reads a file, converting failures into resource errors.
pub fn read(file_system: &dyn FileSystem, path: &Path) -> Result<String> {
    file_system.read_to_string(path).map_err(|err| {
        Error::new(
            Kind::Resource,
            format!("could not read from `{}`", path.display()),
        )
        .with_note(format!("underlying filesystem error: {err}"))
    })
}

/// Resolves an include path.
///
/// `current_dir` is the directory of the file containing the directive.
pub fn resolve(
    file_system: &dyn FileSystem,
    path: &str,
    current_dir: Option<&Path>,
    search_paths: &[PathBuf],
) -> Result<PathBuf> {
    let relative = Path::new(path);
    let mut candidates = vec![];
    if relative.is_absolute() {
        candidates.push(relative.to_path_buf());
    } else {
        if let Some(dir) = current_dir {
            candidates.push(dir.join(relative));
        }
        for search_path in search_paths {
            candidates.push(search_path.join(relative));
        }
    }
    if let Some(found) = candidates.iter().find(|c| file_system.is_file(c)) {
        return Ok(found.clone());
    }
    let mut err = Error::new(
        Kind::Resource,
        format!("could not find include file `{path}`"),
    );
    for candidate in &candidates {
        err = err.with_note(format!("tried `{}`", candidate.display()));
    }
    Err(err)
}

/// The files currently being processed.
#[derive(Debug, Default)]
pub struct Stack {
    root: Option<PathBuf>,
    includes: Vec<PathBuf>,
}

impl Stack {
    pub fn new(root: Option<PathBuf>) -> Stack {
        Stack {
            root,
            includes: vec![],
        }
    }

    /// The innermost file being processed.
    pub fn current(&self) -> Option<&Path> {
        self.includes.last().or(self.root.as_ref()).map(PathBuf::as_path)
    }

    /// Number of nested includes.
    pub fn depth(&self) -> usize {
        self.includes.len()
    }

    pub fn push(&mut self, path: PathBuf) -> Result<()> {
        if self.includes.len() >= MAX_INCLUDE_DEPTH {
            return Err(Error::new(
                Kind::Resource,
                format!("`{}` is included too deeply", path.display()),
            )
            .with_note(format!(
                "at most {MAX_INCLUDE_DEPTH} includes may be nested; check for recursive includes"
            )));
        }
        self.includes.push(path);
        Ok(())
    }

    pub fn pop(&mut self) {
        self.includes.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryFileSystem;

    fn file_system() -> InMemoryFileSystem {
        let mut fs = InMemoryFileSystem::new(Path::new("/work"));
        fs.add_string_file("src/local.xml", "<Include/>");
        fs.add_string_file("lib/shared.xml", "<Include/>");
        fs.add_string_file("lib/local.xml", "<Include/>");
        fs
    }

    #[test]
    fn resolve_relative_to_current_file_first() {
        let found = resolve(
            &file_system(),
            "local.xml",
            Some(Path::new("/work/src")),
            &[PathBuf::from("/work/lib")],
        )
        .unwrap();
        assert_eq!(found, PathBuf::from("/work/src/local.xml"));
    }

    #[test]
    fn resolve_search_paths() {
        let found = resolve(
            &file_system(),
            "shared.xml",
            Some(Path::new("/work/src")),
            &[PathBuf::from("/work/other"), PathBuf::from("/work/lib")],
        )
        .unwrap();
        assert_eq!(found, PathBuf::from("/work/lib/shared.xml"));
    }

    #[test]
    fn resolve_absolute() {
        let found = resolve(&file_system(), "/work/lib/shared.xml", None, &[]).unwrap();
        assert_eq!(found, PathBuf::from("/work/lib/shared.xml"));
    }

    #[test]
    fn not_found() {
        let err = resolve(
            &file_system(),
            "missing.xml",
            Some(Path::new("/work/src")),
            &[PathBuf::from("/work/lib")],
        )
        .unwrap_err();
        assert_eq!(err.kind(), Kind::Resource);
        assert_eq!(err.notes().len(), 2);
    }

    #[test]
    fn stack_depth_limit() {
        let mut stack = Stack::new(Some(PathBuf::from("/root.xml")));
        assert_eq!(stack.current(), Some(Path::new("/root.xml")));
        for i in 0..MAX_INCLUDE_DEPTH {
            stack.push(PathBuf::from(format!("/{i}.xml"))).unwrap();
        }
        assert_eq!(stack.current(), Some(Path::new("/1023.xml")));
        let err = stack.push(PathBuf::from("/one-too-many.xml")).unwrap_err();
        assert_eq!(err.kind(), Kind::Resource);
        stack.pop();
        assert_eq!(stack.depth(), MAX_INCLUDE_DEPTH - 1);
    }
}
