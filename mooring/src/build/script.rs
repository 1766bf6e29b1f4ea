//! Shell script run inside the build helper

/// Directory the repository is cloned into
pub const SOURCE_DIR: &str = "/workspace/source";

fn is_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c)
}

/// Quote `value` for a POSIX shell, leaving plain words untouched.
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty() && value.chars().all(is_safe) {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r#"'"'"'"#))
}

fn trace(line: &str) -> String {
    format!("echo {}", shell_quote(&format!("Running: {}", line)))
}

/// Render the helper script: clone, enter the context root, then run
/// `commands`, each preceded by a trace line.
pub fn render_build_script(
    git_repo: &str,
    git_branch: Option<&str>,
    context_root: Option<&str>,
    commands: &[String],
) -> String {
    let mut lines = vec![
        "set -e".to_string(),
        "echo '=== Starting build process ==='".to_string(),
        "echo '=== Cloning repository ==='".to_string(),
    ];

    let clone = match git_branch.filter(|b| !b.is_empty()) {
        Some(branch) => format!(
            "git clone -b {} {} {}",
            shell_quote(branch),
            shell_quote(git_repo),
            SOURCE_DIR
        ),
        None => format!("git clone {} {}", shell_quote(git_repo), SOURCE_DIR),
    };
    lines.push(trace(&clone));
    lines.push(clone);

    let context = context_root
        .map(|root| root.trim_matches('/'))
        .filter(|root| !root.is_empty() && *root != ".");
    let cd = match context {
        Some(root) => format!("cd {}", shell_quote(&format!("{}/{}", SOURCE_DIR, root))),
        None => format!("cd {}", SOURCE_DIR),
    };
    lines.push(trace(&cd));
    lines.push(cd);

    lines.push("echo '=== Executing build commands ==='".to_string());
    for command in commands {
        lines.push(trace(command));
        lines.push(command.clone());
    }

    let mut script = lines.join("\n");
    script.push('\n');
    script
}
