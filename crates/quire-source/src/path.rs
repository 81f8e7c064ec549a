//! Logical path handling.
//!
//! Source paths are always `/`-separated and relative to a layer root,
//! regardless of platform.

/// Normalize a logical source path.
///
/// Drops empty and `.` segments and folds `..` into its parent. Returns
/// `None` when the path would climb above the root.
pub fn normalize(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();

    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }

    Some(parts.join("/"))
}

/// Join a relative reference onto the directory of `base`.
///
/// `join_relative("app/_toc.js", "../lib/_x")` yields `lib/_x`.
pub fn join_relative(base: &str, reference: &str) -> Option<String> {
    let dir = match base.rfind('/') {
        Some(pos) => &base[..pos],
        None => "",
    };

    if dir.is_empty() {
        normalize(reference)
    } else {
        normalize(&format!("{dir}/{reference}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_segments() {
        assert_eq!(normalize("scripts/./app/../lib/x.js").as_deref(), Some("scripts/lib/x.js"));
        assert_eq!(normalize("/images//logo.png").as_deref(), Some("images/logo.png"));
        assert_eq!(normalize("").as_deref(), Some(""));
    }

    #[test]
    fn rejects_escaping_root() {
        assert_eq!(normalize("../secret"), None);
        assert_eq!(normalize("a/../../b"), None);
    }

    #[test]
    fn joins_relative_to_parent_directory() {
        assert_eq!(join_relative("all.js", "./lib/_energize").as_deref(), Some("lib/_energize"));
        assert_eq!(join_relative("app/_toc.js", "../lib/_x").as_deref(), Some("lib/_x"));
        assert_eq!(join_relative("app/_toc.js", "_lang").as_deref(), Some("app/_lang"));
    }
}
