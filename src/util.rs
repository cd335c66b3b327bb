use std::path::{Component, Path, PathBuf};

pub(crate) fn urljoin(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

/// Appends `key=value` pairs, percent-encoding each value.
pub(crate) fn append_query(url: &str, params: &[(&str, &str)]) -> String {
    let mut out = url.to_string();
    let sep = if url.contains('?') { '&' } else { '?' };
    out.push(sep);
    let mut first = true;
    for (k, v) in params {
        if !first {
            out.push('&');
        }
        first = false;
        out.push_str(k);
        out.push('=');
        out.push_str(&urlencoding::encode(v));
    }
    out
}

/// Relative path of a staged file, or `None` if it would escape the output directory.
pub(crate) fn relative_file_path(filename: &str) -> Option<PathBuf> {
    let trimmed = filename.trim_start_matches('/');
    if trimmed.is_empty() {
        return None;
    }

    let mut out = PathBuf::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }

    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urljoin_handles_slashes() {
        assert_eq!(
            urljoin("http://jsoc.stanford.edu/", "/SUM1/export"),
            "http://jsoc.stanford.edu/SUM1/export"
        );
        assert_eq!(
            urljoin("http://jsoc.stanford.edu", "cgi-bin/ajax/jsoc_fetch"),
            "http://jsoc.stanford.edu/cgi-bin/ajax/jsoc_fetch"
        );
        assert_eq!(urljoin("http://a", "https://b/c"), "https://b/c");
    }

    #[test]
    fn test_append_query_encodes_values() {
        let url = append_query(
            "http://x/fetch",
            &[("op", "exp_status"), ("requestid", "JSOC 1|2")],
        );
        assert_eq!(url, "http://x/fetch?op=exp_status&requestid=JSOC%201%7C2");

        let url = append_query("http://x/fetch?a=1", &[("b", "2")]);
        assert_eq!(url, "http://x/fetch?a=1&b=2");
    }

    #[test]
    fn test_relative_file_path_keeps_subdirectories() {
        assert_eq!(
            relative_file_path("2024/01/a.fits"),
            Some(PathBuf::from("2024").join("01").join("a.fits"))
        );
        assert_eq!(relative_file_path("/a.fits"), Some(PathBuf::from("a.fits")));
        assert_eq!(relative_file_path("./a.fits"), Some(PathBuf::from("a.fits")));
    }

    #[test]
    fn test_relative_file_path_rejects_escapes() {
        assert_eq!(relative_file_path(""), None);
        assert_eq!(relative_file_path("/"), None);
        assert_eq!(relative_file_path("../etc/passwd"), None);
        assert_eq!(relative_file_path("a/../../b"), None);
    }
}
