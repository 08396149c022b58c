// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! General support code for vmtest-runner.

use camino::{Utf8Path, Utf8PathBuf};
use std::borrow::Cow;
use tracing::debug;

/// Returns `path` made absolute against the current directory.
///
/// Binary paths are handed to processes running in the binary's own directory, and walked up to
/// the filesystem root, so relative paths (including bare file names) must not leak past the
/// library boundary. Returns `path` unchanged if the current directory can't be determined.
pub(crate) fn absolute_path(path: &Utf8Path) -> Cow<'_, Utf8Path> {
    if path.is_absolute() {
        return Cow::Borrowed(path);
    }

    match std::path::absolute(path).map(Utf8PathBuf::try_from) {
        Ok(Ok(absolute)) => Cow::Owned(absolute),
        Ok(Err(error)) => {
            debug!(%path, %error, "absolute path is not valid UTF-8");
            Cow::Borrowed(path)
        }
        Err(error) => {
            debug!(%path, %error, "failed to make path absolute");
            Cow::Borrowed(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn absolute_paths_are_borrowed() {
        let path = std::env::temp_dir().join("Contoso.Tests.dll");
        let path = Utf8PathBuf::try_from(path).unwrap();
        assert!(matches!(absolute_path(&path), Cow::Borrowed(p) if p == path.as_path()));
    }

    #[test]
    fn relative_paths_join_current_dir() {
        let cwd = Utf8PathBuf::try_from(std::env::current_dir().unwrap()).unwrap();

        assert_eq!(
            absolute_path(Utf8Path::new("Contoso.Tests.dll")).into_owned(),
            cwd.join("Contoso.Tests.dll")
        );
        assert_eq!(
            absolute_path(Utf8Path::new("bin/Debug/Contoso.Tests.dll")).into_owned(),
            cwd.join("bin/Debug/Contoso.Tests.dll")
        );
    }
}
