//! Location of unit binaries inside an extracted unit directory, and conversion between file
//! paths and `file:` URIs.

use std::{
    ffi::OsString,
    path::{MAIN_SEPARATOR, MAIN_SEPARATOR_STR, Path, PathBuf},
};

use crate::{Error, FmiVersion};

/// Platform folder under `binaries/` for the given `os` and `arch`, using the values of
/// [`std::env::consts::OS`] and [`std::env::consts::ARCH`].
pub fn platform_tag(version: FmiVersion, os: &str, arch: &str) -> Result<String, Error> {
    let unsupported = || Error::UnsupportedPlatform {
        os: os.to_owned(),
        arch: arch.to_owned(),
    };

    let (platform, system) = match os {
        "windows" => ("win", "windows"),
        "macos" => ("darwin", "darwin"),
        "linux" => ("linux", "linux"),
        _ => return Err(unsupported()),
    };

    let bits = match arch {
        "x86_64" | "aarch64" => "64",
        "x86" => "32",
        _ => return Err(unsupported()),
    };

    Ok(match version {
        FmiVersion::V1 | FmiVersion::V2 => format!("{platform}{bits}"),
        FmiVersion::V3 => format!("{arch}-{system}"),
    })
}

/// `<unit_directory>/binaries/<platform-tag>/<model_identifier><ext>` for the running platform
pub fn resolve_binary_path(
    unit_directory: &Path,
    model_identifier: &str,
    version: FmiVersion,
) -> Result<PathBuf, Error> {
    use std::env::consts::{ARCH, DLL_SUFFIX, OS};
    let tag = platform_tag(version, OS, ARCH)?;
    Ok(unit_directory
        .join("binaries")
        .join(tag)
        .join(format!("{model_identifier}{DLL_SUFFIX}")))
}

/// Convert a `file:///…` or `file:/…` URI into a path with a trailing separator.
pub fn uri_to_path(uri: &str) -> Result<PathBuf, Error> {
    if !uri.starts_with("file:/") {
        return Err(Error::InvalidUri(uri.to_owned()));
    }

    let path = url::Url::parse(uri)
        .ok()
        .and_then(|url| url.to_file_path().ok())
        .ok_or_else(|| Error::InvalidUri(uri.to_owned()))?;

    let mut path: OsString = path.into_os_string();
    if !path.to_string_lossy().ends_with(MAIN_SEPARATOR) {
        path.push(MAIN_SEPARATOR_STR);
    }
    Ok(PathBuf::from(path))
}

/// Convert a directory path into a `file:` URI with a trailing `/`.
pub fn path_to_uri(path: &Path) -> String {
    match url::Url::from_directory_path(path) {
        Ok(url) => url.into(),
        Err(()) => {
            let mut uri = format!("file://{}", path.display());
            if !uri.ends_with('/') {
                uri.push('/');
            }
            uri
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_tags() {
        assert_eq!(
            platform_tag(FmiVersion::V2, "linux", "x86_64").unwrap(),
            "linux64"
        );
        assert_eq!(
            platform_tag(FmiVersion::V1, "windows", "x86").unwrap(),
            "win32"
        );
        assert_eq!(
            platform_tag(FmiVersion::V2, "macos", "x86_64").unwrap(),
            "darwin64"
        );
        assert_eq!(
            platform_tag(FmiVersion::V3, "linux", "x86_64").unwrap(),
            "x86_64-linux"
        );
        assert_eq!(
            platform_tag(FmiVersion::V3, "macos", "aarch64").unwrap(),
            "aarch64-darwin"
        );
        assert_eq!(
            platform_tag(FmiVersion::V3, "windows", "x86").unwrap(),
            "x86-windows"
        );
    }

    #[test]
    fn test_unsupported_platform() {
        let err = platform_tag(FmiVersion::V2, "freebsd", "x86_64").unwrap_err();
        assert!(matches!(err, Error::UnsupportedPlatform { os, .. } if os == "freebsd"));
        assert!(platform_tag(FmiVersion::V3, "linux", "riscv64").is_err());
    }

    #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
    #[test]
    fn test_resolve_binary_path() {
        let path = resolve_binary_path(Path::new("/tmp/unit"), "Stair", FmiVersion::V2).unwrap();
        assert_eq!(path, Path::new("/tmp/unit/binaries/linux64/Stair.so"));

        let path = resolve_binary_path(Path::new("/tmp/unit/"), "Stair", FmiVersion::V3).unwrap();
        assert_eq!(path, Path::new("/tmp/unit/binaries/x86_64-linux/Stair.so"));
    }

    #[cfg(unix)]
    #[test]
    fn test_uri_to_path() {
        assert_eq!(
            uri_to_path("file:///tmp/resources").unwrap().as_os_str(),
            "/tmp/resources/"
        );
        assert_eq!(
            uri_to_path("file:/tmp/resources/").unwrap().as_os_str(),
            "/tmp/resources/"
        );
        assert_eq!(
            uri_to_path("file:///tmp/with%20space/").unwrap().as_os_str(),
            "/tmp/with space/"
        );
    }

    #[test]
    fn test_uri_to_path_rejects_other_schemes() {
        assert!(matches!(
            uri_to_path("http://example.com/resources"),
            Err(Error::InvalidUri(_))
        ));
        assert!(uri_to_path("/tmp/resources").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_path_to_uri() {
        assert_eq!(path_to_uri(Path::new("/tmp/unit")), "file:///tmp/unit/");
        assert_eq!(path_to_uri(Path::new("/tmp/unit/")), "file:///tmp/unit/");
        assert_eq!(
            uri_to_path(&path_to_uri(Path::new("/tmp/a b"))).unwrap().as_os_str(),
            "/tmp/a b/"
        );
    }

    #[test]
    fn test_resolve_in_extracted_unit() {
        let dir = tempfile::tempdir().unwrap();
        let unit_directory = dir.path().join("Stair");
        let binary = resolve_binary_path(&unit_directory, "Stair", FmiVersion::V3).unwrap();
        std::fs::create_dir_all(binary.parent().unwrap()).unwrap();
        std::fs::write(&binary, b"").unwrap();

        // The directory survives the trip through the URI handed to the unit
        let resources = uri_to_path(&path_to_uri(&unit_directory)).unwrap();
        assert!(resources.as_os_str().to_string_lossy().ends_with(MAIN_SEPARATOR));
        let binary_again = resolve_binary_path(&resources, "Stair", FmiVersion::V3).unwrap();
        assert_eq!(binary_again, binary);
        assert!(binary_again.is_file());
    }
}
