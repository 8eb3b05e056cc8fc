// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for external files that need to be
//! interacted with, and convert filesystem paths into the path segments that
//! the manifest tree is navigated by.

use std::{
    fs::read_dir,
    path::{Component, Path, PathBuf},
};
use tracing::debug;

/// File extension of manifest files.
pub const MANIFEST_EXTENSION: &str = "xcmanifest";

/// Name of project-local configuration file.
pub const LOCAL_CONFIG_FILE: &str = "xcsync.toml";

/// Determine default absolute path to the user configuration file.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/xcsync/config.toml`. Does
/// not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoConfigDir`] if configuration directory cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("xcsync").join("config.toml"))
        .ok_or(NoConfigDir)
}

/// Search for a manifest file from a directory upward.
///
/// Checks `start` and then each of its ancestors for a file carrying the
/// [`MANIFEST_EXTENSION`]. When a directory holds several manifests the first
/// one in lexical order wins.
pub fn find_manifest(start: impl AsRef<Path>) -> Option<PathBuf> {
    for dir in start.as_ref().ancestors() {
        let Ok(entries) = read_dir(dir) else {
            continue;
        };

        let mut found = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| {
                path.is_file()
                    && path.extension().is_some_and(|ext| ext == MANIFEST_EXTENSION)
            })
            .collect::<Vec<_>>();
        found.sort();

        if let Some(manifest) = found.into_iter().next() {
            debug!("found manifest {:?}", manifest.display());
            return Some(manifest);
        }
    }

    None
}

/// Split path into segments relative to a root directory.
///
/// Returns [`None`] if path does not live under root. The root itself yields
/// an empty listing.
pub fn segments(root: impl AsRef<Path>, path: impl AsRef<Path>) -> Option<Vec<String>> {
    let relative = path.as_ref().strip_prefix(root.as_ref()).ok()?;
    relative
        .components()
        .map(|component| match component {
            Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// Resolve `.` and `..` components of a path lexically.
///
/// Does not touch the filesystem, so symlinks are not followed. A `..` at the
/// root of an absolute path is dropped, while leading `..` components of a
/// relative path are kept.
pub fn normalize(path: impl AsRef<Path>) -> PathBuf {
    let mut normal = PathBuf::new();
    for component in path.as_ref().components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normal.components().next_back() {
                Some(Component::Normal(_)) => {
                    normal.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => normal.push(component),
            },
            _ => normal.push(component),
        }
    }

    normal
}

/// Render relative path with `/` separators regardless of platform.
pub fn to_slash(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Parse `/` separated relative path.
pub fn from_slash(path: &str) -> PathBuf {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

/// No way to determine user's configuration directory.
///
/// # See Also
///
/// - [`dirs::config_dir`](https://docs.rs/dirs/latest/dirs/fn.config_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's configuration directory")]
pub struct NoConfigDir;

/// Friendly result alias :3
pub type Result<T, E = NoConfigDir> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use simple_test_case::test_case;
    use std::{
        env::current_dir,
        fs::{create_dir_all, write},
    };

    #[test_case(
        "/p",
        "/p/App/Views/Row.swift",
        Some(vec!["App", "Views", "Row.swift"]);
        "nested file"
    )]
    #[test_case("/p", "/p", Some(vec![]); "root itself")]
    #[test_case("/p", "/q/Row.swift", None; "outside root")]
    #[test_case("/p", "/pp/Row.swift", None; "sibling prefix")]
    #[test]
    fn split_segments(root: &str, path: &str, expect: Option<Vec<&str>>) {
        let expect = expect.map(|segments| {
            segments
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        });
        pretty_assertions::assert_eq!(segments(root, path), expect);
    }

    #[test_case("/work/Demo/Sub/../Demo/App.swift", "/work/Demo/Demo/App.swift"; "parent dir")]
    #[test_case("/work/./Demo/./App.swift", "/work/Demo/App.swift"; "current dir")]
    #[test_case("/../work", "/work"; "parent of root")]
    #[test_case("../a/../b", "../b"; "leading parent kept")]
    #[test]
    fn normalize_lexically(path: &str, expect: &str) {
        pretty_assertions::assert_eq!(normalize(path), PathBuf::from(expect));
    }

    #[test]
    fn normalized_path_splits_into_segments() {
        let path = normalize("/work/Demo/Sub/../Demo/App.swift");
        assert_eq!(
            segments("/work/Demo", path),
            Some(vec!["Demo".to_string(), "App.swift".to_string()])
        );
    }

    #[test]
    fn slash_paths() {
        let path = from_slash("App/Views/Row.swift");
        assert_eq!(path, ["App", "Views", "Row.swift"].iter().collect::<PathBuf>());
        assert_eq!(to_slash(&path), "App/Views/Row.swift");
        assert_eq!(from_slash("App//Row.swift/"), from_slash("App/Row.swift"));
    }

    #[sealed_test]
    fn find_manifest_walks_upward() -> anyhow::Result<()> {
        let root = current_dir()?;
        let nested = root.join("App").join("Views");
        create_dir_all(&nested)?;
        write(root.join("notes.txt"), "")?;
        write(root.join("Demo.xcmanifest"), "")?;

        assert_eq!(find_manifest(&nested), Some(root.join("Demo.xcmanifest")));

        Ok(())
    }
}
