//! File-system modules
//!
//! Module names are `/`-separated paths without the `.wren` extension,
//! relative to the directory of the script being run. Imports starting with
//! `./` or `../` are relative to the importing module; anything else is
//! relative to the root.

use std::path::{Component, Path, PathBuf};

use wren_engine::VmOptions;

const EXTENSION: &str = "wren";

#[derive(Debug, Clone)]
pub struct ModuleLoader {
    root: PathBuf,
}

impl ModuleLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Canonical name for `name` imported from `importer`
    pub fn resolve(&self, importer: &str, name: &str) -> Option<String> {
        if name.is_empty() {
            return None;
        }
        let path = if name.starts_with("./") || name.starts_with("../") {
            Path::new(importer).parent().unwrap_or(Path::new("")).join(name)
        } else {
            PathBuf::from(name)
        };
        normalize(&path)
    }

    /// Source of the module called `name`
    pub fn load(&self, name: &str) -> Option<String> {
        let path = self.root.join(name).with_extension(EXTENSION);
        match std::fs::read_to_string(&path) {
            Ok(source) => {
                log::debug!("loaded module '{}' from {}", name, path.display());
                Some(source)
            }
            Err(error) => {
                log::debug!("cannot read {}: {}", path.display(), error);
                None
            }
        }
    }

    /// Point the VM's module hooks at this loader
    pub fn install(self, options: &mut VmOptions) {
        let resolver = self.clone();
        options.resolve_module = Some(Box::new(move |importer, name| resolver.resolve(importer, name)));
        options.load_module = Some(Box::new(move |name| self.load(name)));
    }
}

/// Module name for a script path: its file stem, relative to its directory
pub fn module_name_for(file: &Path) -> String {
    file.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "main".to_string())
}

/// Fold `.` and `..` away; `None` if the path climbs above the root
fn normalize(path: &Path) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_from_root() {
        let loader = ModuleLoader::new("/scripts");
        assert_eq!(loader.resolve("main", "util"), Some("util".to_string()));
        assert_eq!(loader.resolve("lib/a", "lib/b"), Some("lib/b".to_string()));
    }

    #[test]
    fn test_resolve_relative() {
        let loader = ModuleLoader::new("/scripts");
        assert_eq!(loader.resolve("lib/a", "./b"), Some("lib/b".to_string()));
        assert_eq!(loader.resolve("lib/deep/a", "../b"), Some("lib/b".to_string()));
        assert_eq!(loader.resolve("main", "./util"), Some("util".to_string()));
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let loader = ModuleLoader::new("/scripts");
        assert_eq!(loader.resolve("main", "../outside"), None);
        assert_eq!(loader.resolve("main", "/etc/passwd"), None);
        assert_eq!(loader.resolve("main", ""), None);
    }

    #[test]
    fn test_module_name_for() {
        assert_eq!(module_name_for(Path::new("dir/game.wren")), "game");
        assert_eq!(module_name_for(Path::new("script")), "script");
    }
}
