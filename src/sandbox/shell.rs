//! Shell-safe rendering of argument vectors.
//!
//! Exec prefixes are built unquoted for direct process spawning. When a
//! command has to cross a shell boundary (e.g. keys injected into a tmux
//! pane, which then passes through `sh -c` and `bash -c`), it is rendered
//! through [`shell_join_args`] exactly once at that boundary.

/// Join arguments into one POSIX-shell-safe string.
///
/// Arguments made only of `[A-Za-z0-9_.-/=:,]` pass through bare; anything
/// else is single-quoted with embedded `'` written as `'"'"'`.
#[must_use]
pub fn shell_join_args<S: AsRef<str>>(args: &[S]) -> String {
    args.iter()
        .map(|arg| shell_quote_arg(arg.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_quote_arg(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }
    if arg.chars().all(is_shell_safe) {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r#"'"'"'"#))
}

const fn is_shell_safe(c: char) -> bool {
    matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' | '/' | '=' | ':' | ',')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_join_args() {
        let cases: [(&[&str], &str); 7] = [
            (&["/usr/bin/docker", "--config=/root/.docker"], "/usr/bin/docker --config=/root/.docker"),
            (&["VAR=it's a value"], r#"'VAR=it'"'"'s a value'"#),
            (&["echo", "hello world"], "echo 'hello world'"),
            (&["-e", "PATH=$HOME/bin"], "-e 'PATH=$HOME/bin'"),
            (&["a;rm -rf /"], "'a;rm -rf /'"),
            (&[""], "''"),
            (&[], ""),
        ];
        for (args, want) in cases {
            assert_eq!(shell_join_args(args), want, "args={args:?}");
        }
    }

    #[test]
    fn test_shell_join_exec_prefix() {
        let args = ["docker", "exec", "-it", "-e", "MSG=a b", "agent-deck-x-a1b2c3d4"];
        assert_eq!(
            shell_join_args(&args),
            "docker exec -it -e 'MSG=a b' agent-deck-x-a1b2c3d4"
        );
    }
}
