//! Pure construction of test, lint, and typecheck argument vectors.

use std::time::Duration;

use crate::core::types::{CommandSpec, PackageManagerKind, Toolchain};

/// Test command for a toolchain, with an optional test-name filter.
///
/// Node projects run `<pm> test [-t pattern]`; Python projects run
/// `pytest -q [-k pattern]`. A blank pattern is ignored.
pub fn test_command(toolchain: Toolchain, pattern: Option<&str>, timeout: Duration) -> CommandSpec {
    let pattern = pattern.filter(|p| !p.trim().is_empty());
    let mut args: Vec<String> = match toolchain {
        Toolchain::Node(pm) => vec![pm.program().to_string(), "test".to_string()],
        Toolchain::Python => vec!["pytest".to_string(), "-q".to_string()],
    };
    if let Some(pattern) = pattern {
        let flag = match toolchain {
            Toolchain::Node(_) => "-t",
            Toolchain::Python => "-k",
        };
        args.push(flag.to_string());
        args.push(pattern.to_string());
    }
    CommandSpec::new(args, timeout)
}

/// Lint the whole tree.
pub fn lint_command(toolchain: Toolchain, timeout: Duration) -> CommandSpec {
    let args: &[&str] = match toolchain {
        Toolchain::Node(PackageManagerKind::Pnpm) => &["pnpm", "exec", "eslint", "."],
        Toolchain::Node(PackageManagerKind::Yarn) => &["yarn", "eslint", "."],
        Toolchain::Node(PackageManagerKind::Npm) => &["npx", "eslint", "."],
        Toolchain::Python => &["ruff", "check", "."],
    };
    CommandSpec::new(args.iter().copied(), timeout)
}

/// Typecheck without emitting output.
///
/// For Python, `pyright` is used when `pyright_on_path` is set, else `mypy .`.
pub fn typecheck_command(
    toolchain: Toolchain,
    pyright_on_path: bool,
    timeout: Duration,
) -> CommandSpec {
    let args: &[&str] = match toolchain {
        Toolchain::Node(PackageManagerKind::Pnpm) => &["pnpm", "exec", "tsc", "-p", "."],
        Toolchain::Node(PackageManagerKind::Yarn) => &["yarn", "tsc", "-p", "."],
        Toolchain::Node(PackageManagerKind::Npm) => &["npx", "tsc", "-p", "."],
        Toolchain::Python if pyright_on_path => &["pyright"],
        Toolchain::Python => &["mypy", "."],
    };
    CommandSpec::new(args.iter().copied(), timeout)
}

/// `git apply --check <patch>` or `git apply <patch>`.
pub fn git_apply_command(patch_path: &str, check_only: bool, timeout: Duration) -> CommandSpec {
    let mut args = vec!["git", "apply"];
    if check_only {
        args.push("--check");
    }
    args.push(patch_path);
    CommandSpec::new(args, timeout)
}

/// Commit staged changes, skipping hooks.
pub fn git_commit_command(message: &str, timeout: Duration) -> CommandSpec {
    CommandSpec::new(["git", "commit", "-m", message, "--no-verify"], timeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Duration = Duration::from_secs(5);

    fn args(spec: &CommandSpec) -> Vec<&str> {
        spec.args().iter().map(String::as_str).collect()
    }

    #[test]
    fn node_test_uses_package_manager_entry_point() {
        for (pm, program) in [
            (PackageManagerKind::Pnpm, "pnpm"),
            (PackageManagerKind::Yarn, "yarn"),
            (PackageManagerKind::Npm, "npm"),
        ] {
            let spec = test_command(Toolchain::Node(pm), None, T);
            assert_eq!(args(&spec), vec![program, "test"]);
        }
    }

    #[test]
    fn node_test_appends_name_filter() {
        let spec = test_command(Toolchain::Node(PackageManagerKind::Npm), Some("login"), T);
        assert_eq!(args(&spec), vec!["npm", "test", "-t", "login"]);
        assert_eq!(spec.timeout(), T);
    }

    #[test]
    fn python_test_runs_quiet_pytest() {
        let spec = test_command(Toolchain::Python, None, T);
        assert_eq!(args(&spec), vec!["pytest", "-q"]);
        let spec = test_command(Toolchain::Python, Some("test_parse and not slow"), T);
        assert_eq!(
            args(&spec),
            vec!["pytest", "-q", "-k", "test_parse and not slow"]
        );
    }

    #[test]
    fn blank_pattern_is_ignored() {
        let spec = test_command(Toolchain::Python, Some("  "), T);
        assert_eq!(args(&spec), vec!["pytest", "-q"]);
    }

    #[test]
    fn lint_commands_per_toolchain() {
        assert_eq!(
            args(&lint_command(Toolchain::Node(PackageManagerKind::Pnpm), T)),
            vec!["pnpm", "exec", "eslint", "."]
        );
        assert_eq!(
            args(&lint_command(Toolchain::Node(PackageManagerKind::Yarn), T)),
            vec!["yarn", "eslint", "."]
        );
        assert_eq!(
            args(&lint_command(Toolchain::Node(PackageManagerKind::Npm), T)),
            vec!["npx", "eslint", "."]
        );
        assert_eq!(
            args(&lint_command(Toolchain::Python, T)),
            vec!["ruff", "check", "."]
        );
    }

    #[test]
    fn typecheck_commands_per_toolchain() {
        assert_eq!(
            args(&typecheck_command(
                Toolchain::Node(PackageManagerKind::Pnpm),
                false,
                T
            )),
            vec!["pnpm", "exec", "tsc", "-p", "."]
        );
        assert_eq!(
            args(&typecheck_command(
                Toolchain::Node(PackageManagerKind::Npm),
                true,
                T
            )),
            vec!["npx", "tsc", "-p", "."]
        );
        assert_eq!(
            args(&typecheck_command(Toolchain::Python, true, T)),
            vec!["pyright"]
        );
        assert_eq!(
            args(&typecheck_command(Toolchain::Python, false, T)),
            vec!["mypy", "."]
        );
    }

    #[test]
    fn git_commands_skip_hooks_and_check_patches() {
        assert_eq!(
            args(&git_apply_command("/p/.testops.patch", true, T)),
            vec!["git", "apply", "--check", "/p/.testops.patch"]
        );
        assert_eq!(
            args(&git_apply_command("/p/.testops.patch", false, T)),
            vec!["git", "apply", "/p/.testops.patch"]
        );
        assert_eq!(
            args(&git_commit_command("fix: flaky test", T)),
            vec!["git", "commit", "-m", "fix: flaky test", "--no-verify"]
        );
    }
}
