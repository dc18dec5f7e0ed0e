//! Split a multi-statement SQL script on top-level semicolons

/// Split `script` into trimmed, non-empty statements
///
/// Semicolons inside single- or double-quoted literals do not terminate a
/// statement. `--` line comments outside literals are dropped.
pub fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut chars = script.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\'' if !in_double => {
                in_single = !in_single;
                current.push(ch);
            }
            '"' if !in_single => {
                in_double = !in_double;
                current.push(ch);
            }
            '-' if !in_single && !in_double && chars.peek() == Some(&'-') => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        current.push('\n');
                        break;
                    }
                }
            }
            ';' if !in_single && !in_double => {
                push_statement(&mut statements, &current);
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    push_statement(&mut statements, &current);
    statements
}

fn push_statement(statements: &mut Vec<String>, raw: &str) {
    let sql = raw.trim();
    if !sql.is_empty() {
        statements.push(sql.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_on_semicolons() {
        let stmts = split_statements("CREATE TABLE a(x);\nCREATE TABLE b(y);\n");
        assert_eq!(stmts, vec!["CREATE TABLE a(x)", "CREATE TABLE b(y)"]);
    }

    #[test]
    fn test_semicolons_inside_literals_are_kept() {
        let stmts = split_statements(
            "INSERT INTO t VALUES ('a;b');INSERT INTO \"odd;name\" VALUES (\"c;d\");",
        );
        assert_eq!(
            stmts,
            vec![
                "INSERT INTO t VALUES ('a;b')",
                "INSERT INTO \"odd;name\" VALUES (\"c;d\")",
            ]
        );
    }

    #[test]
    fn test_escaped_quote_inside_single_quotes() {
        let stmts = split_statements("INSERT INTO t VALUES ('it''s; fine'); SELECT 1");
        assert_eq!(
            stmts,
            vec!["INSERT INTO t VALUES ('it''s; fine')", "SELECT 1"]
        );
    }

    #[test]
    fn test_comments_and_trailing_statement() {
        let stmts = split_statements("-- header; with 'quote\nSELECT 1;\n-- only a comment\nSELECT 2");
        assert_eq!(stmts, vec!["SELECT 1", "SELECT 2"]);
    }

    #[test]
    fn test_bundled_schema_splits_cleanly() {
        let stmts = split_statements(super::super::schema::SCHEMA_SQL);
        assert!(stmts.len() > 40);
        assert!(stmts.iter().all(|s| !s.starts_with("--")));
        assert!(stmts.iter().any(|s| s.starts_with("CREATE TABLE part (")));
    }
}
