use agent_deck_sandbox::{generate_name, is_managed_container, shell_join_args};
use proptest::prelude::*;

const PREFIX: &str = "agent-deck-";

/// Minimal POSIX word splitter covering what `shell_join_args` emits:
/// bare words, single-quoted runs and `"'"` pieces.
fn split_shell_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            ' ' => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            '\'' => {
                in_word = true;
                for q in chars.by_ref() {
                    if q == '\'' {
                        break;
                    }
                    current.push(q);
                }
            }
            '"' => {
                in_word = true;
                for q in chars.by_ref() {
                    if q == '"' {
                        break;
                    }
                    current.push(q);
                }
            }
            _ => {
                in_word = true;
                current.push(c);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

proptest! {
    /// Names only use Docker's alphabet and never start or end with `-` or `.`
    #[test]
    fn generated_names_are_valid(
        session_id in "[0-9a-f]{8,32}",
        title in "\\PC{0,60}",
    ) {
        let name = generate_name(&session_id, &title);

        prop_assert!(name.starts_with(PREFIX));
        prop_assert!(name.ends_with(&session_id[..8]));
        prop_assert!(name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')));
        prop_assert!(!name.ends_with(['-', '.']));
        prop_assert!(name.len() <= PREFIX.len() + 31 + 9, "too long: {}", name);
        prop_assert!(is_managed_container(&name));

        let title_part = &name[PREFIX.len()..];
        prop_assert!(!title_part.starts_with(['-', '.']), "bad start: {}", name);
    }

    /// Distinct session IDs never collide, whatever the titles
    #[test]
    fn session_suffix_keeps_names_unique(
        a in "[0-9a-f]{8}",
        b in "[0-9a-f]{8}",
        title in "[a-z ]{0,40}",
    ) {
        prop_assume!(a != b);
        prop_assert_ne!(generate_name(&a, &title), generate_name(&b, &title));
    }

    /// Arguments made of safe characters pass through untouched
    #[test]
    fn safe_args_are_not_quoted(args in prop::collection::vec("[A-Za-z0-9_./=:,-]{1,20}", 1..6)) {
        prop_assert_eq!(shell_join_args(&args), args.join(" "));
    }

    /// A shell splits the joined string back into the original arguments
    #[test]
    fn joined_args_split_back(args in prop::collection::vec("[ -~]{0,20}", 1..6)) {
        let joined = shell_join_args(&args);
        prop_assert_eq!(split_shell_words(&joined), args);
    }
}

#[test]
fn uuid_session_ids_produce_managed_names() {
    for _ in 0..16 {
        let id = uuid::Uuid::new_v4().to_string();
        let name = generate_name(&id, "Fix login bug!");
        assert_eq!(name, format!("agent-deck-Fix-login-bug-{}", &id[..8]));
    }
}

#[test]
fn single_quotes_are_escaped_once() {
    assert_eq!(
        shell_join_args(&["VAR=it's a value"]),
        r#"'VAR=it'"'"'s a value'"#
    );
    assert_eq!(
        shell_join_args(&["/usr/bin/docker", "--config=/root/.docker"]),
        "/usr/bin/docker --config=/root/.docker"
    );
}
