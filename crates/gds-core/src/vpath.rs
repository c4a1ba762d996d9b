//! Lexical virtual-path math.
//!
//! A virtual path is a string rooted at `~`. These helpers only rewrite
//! strings; resolving a path to a folder ID is the path resolver's job.
//! Canonical form: `~` or `~/name[/name]*`, no `.`/`..`/empty components.

/// The virtual root.
pub const HOME: &str = "~";

/// Rewrite user input into a `~`-rooted path without resolving it.
///
/// Absolute paths (`/a/b`) map onto the virtual root. Empty input means the
/// current directory.
pub fn rewrite_input(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed == "." {
        return ".".to_string();
    }
    if let Some(rest) = trimmed.strip_prefix('/') {
        if rest.is_empty() {
            return HOME.to_string();
        }
        return format!("~/{rest}");
    }
    trimmed.to_string()
}

/// Compute the canonical absolute form of `input` against the base `cwd`.
///
/// `..` above the root saturates at `~`. The result is idempotent:
/// `absolute(absolute(p, cwd), HOME) == absolute(p, cwd)`.
pub fn absolute(cwd: &str, input: &str) -> String {
    let input = rewrite_input(input);
    let (start, rest): (&str, &str) = if input == "." {
        (cwd, "")
    } else if input == HOME {
        (HOME, "")
    } else if let Some(rest) = input.strip_prefix("~/") {
        (HOME, rest)
    } else {
        (cwd, input.as_str())
    };

    let mut parts: Vec<&str> = if start == HOME {
        Vec::new()
    } else {
        start.trim_start_matches("~/").split('/').collect()
    };

    for comp in rest.split('/') {
        match comp {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name),
        }
    }

    join_components(&parts)
}

/// Assemble components back into canonical display form.
pub fn join_components(parts: &[&str]) -> String {
    if parts.is_empty() {
        HOME.to_string()
    } else {
        format!("~/{}", parts.join("/"))
    }
}

/// Append one component to a canonical path.
pub fn child(base: &str, name: &str) -> String {
    if base == HOME {
        format!("~/{name}")
    } else {
        format!("{base}/{name}")
    }
}

/// Split into (directory part, final component). `~` has no final component.
pub fn split(path: &str) -> (String, Option<String>) {
    if path == HOME {
        return (HOME.to_string(), None);
    }
    match path.rsplit_once('/') {
        Some((dir, name)) => {
            let dir = if dir.is_empty() || dir == "~" {
                HOME.to_string()
            } else {
                dir.to_string()
            };
            (dir, Some(name.to_string()))
        }
        None => (".".to_string(), Some(path.to_string())),
    }
}

/// The parent of a canonical path; `None` at the root.
pub fn parent(path: &str) -> Option<String> {
    if path == HOME {
        return None;
    }
    let comps: Vec<&str> = path.trim_start_matches("~/").split('/').collect();
    Some(join_components(&comps[..comps.len() - 1]))
}

/// Components of a canonical path, excluding the root marker.
pub fn components(path: &str) -> Vec<String> {
    if path == HOME {
        Vec::new()
    } else {
        path.trim_start_matches("~/")
            .split('/')
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Path of this virtual path relative to `~`, without a leading slash.
pub fn rel_to_root(path: &str) -> String {
    if path == HOME {
        String::new()
    } else {
        path.trim_start_matches("~/").to_string()
    }
}
