//! Migration script files.
//!
//! A migration is one `NNN_name.sql` file in the migrations directory:
//!
//! ```sql
//! -- migrate:up
//! CREATE TABLE IF NOT EXISTS "puppy" (...);
//!
//! -- migrate:down
//! DROP TABLE IF EXISTS "puppy";
//! ```
//!
//! The migration's name is the file stem (`001_initial`). Text before the
//! first marker belongs to the up section.

const UP_MARKER: &str = "-- migrate:up";
const DOWN_MARKER: &str = "-- migrate:down";

/// Parsed contents of a migration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationScript {
    /// SQL applied by an upgrade.
    pub up: String,
    /// SQL applied by a downgrade.
    pub down: String,
}

impl MigrationScript {
    /// Builds a script from statement lists.
    #[must_use]
    pub fn from_statements(up: &[String], down: &[String]) -> Self {
        let join = |statements: &[String]| {
            statements
                .iter()
                .map(|s| format!("{};", s.trim_end_matches(';')))
                .collect::<Vec<_>>()
                .join("\n")
        };
        Self {
            up: join(up),
            down: join(down),
        }
    }

    /// Splits a file into its up and down sections.
    #[must_use]
    pub fn parse(source: &str) -> Self {
        let mut script = Self::default();
        let mut in_down = false;
        for line in source.lines() {
            match line.trim() {
                UP_MARKER => in_down = false,
                DOWN_MARKER => in_down = true,
                _ => {
                    let section = if in_down {
                        &mut script.down
                    } else {
                        &mut script.up
                    };
                    section.push_str(line);
                    section.push('\n');
                }
            }
        }
        script.up = script.up.trim().to_string();
        script.down = script.down.trim().to_string();
        script
    }

    /// Renders the file contents.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = format!("{UP_MARKER}\n");
        if !self.up.is_empty() {
            out.push_str(&format!("{}\n", self.up));
        }
        out.push_str(&format!("\n{DOWN_MARKER}\n"));
        if !self.down.is_empty() {
            out.push_str(&format!("{}\n", self.down));
        }
        out
    }

    /// Statements of the up section.
    #[must_use]
    pub fn up_statements(&self) -> Vec<String> {
        statements(&self.up)
    }

    /// Statements of the down section.
    #[must_use]
    pub fn down_statements(&self) -> Vec<String> {
        statements(&self.down)
    }
}

/// Splits SQL text on `;`, dropping `--` comments and empty statements.
///
/// Semicolons and `--` inside `'...'` literals or `"..."` identifiers are
/// part of the statement; a doubled quote (`''`) stays inside the literal.
#[must_use]
pub fn statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    if chars.peek() == Some(&q) {
                        current.push(q);
                        chars.next();
                    } else {
                        quote = None;
                    }
                }
            }
            None => match c {
                '-' if chars.peek() == Some(&'-') => {
                    for skipped in chars.by_ref() {
                        if skipped == '\n' {
                            current.push('\n');
                            break;
                        }
                    }
                }
                ';' => statements.push(std::mem::take(&mut current)),
                '\'' | '"' => {
                    quote = Some(c);
                    current.push(c);
                }
                _ => current.push(c),
            },
        }
    }
    statements.push(current);

    statements
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `NNN_name.sql`.
#[must_use]
pub fn file_name(number: u32, name: &str) -> String {
    format!("{number:03}_{name}.sql")
}

/// Splits a migration file name into its number and migration name
/// (the stem). Anything else returns `None`.
#[must_use]
pub fn parse_file_name(file_name: &str) -> Option<(u32, &str)> {
    let stem = file_name.strip_suffix(".sql")?;
    let (number, rest) = stem.split_once('_')?;
    if rest.is_empty() || number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((number.parse().ok()?, stem))
}

/// Migration names are lower-case words joined by `_`.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_sections() {
        let script = MigrationScript::parse(
            "-- migrate:up\nCREATE TABLE a (id INTEGER);\nCREATE TABLE b (id INTEGER);\n\n-- migrate:down\nDROP TABLE b;\nDROP TABLE a;\n",
        );
        assert_eq!(
            script.up_statements(),
            ["CREATE TABLE a (id INTEGER)", "CREATE TABLE b (id INTEGER)"]
        );
        assert_eq!(script.down_statements(), ["DROP TABLE b", "DROP TABLE a"]);
    }

    #[test]
    fn text_without_markers_is_up() {
        let script = MigrationScript::parse("CREATE TABLE a (id INTEGER);");
        assert_eq!(script.up_statements().len(), 1);
        assert!(script.down_statements().is_empty());
    }

    #[test]
    fn render_then_parse_keeps_statements() {
        let script = MigrationScript::from_statements(
            &["CREATE TABLE a (id INTEGER)".to_string()],
            &["DROP TABLE a".to_string()],
        );
        let reparsed = MigrationScript::parse(&script.render());
        assert_eq!(reparsed, script);

        let empty = MigrationScript::default().render();
        assert!(empty.contains(UP_MARKER) && empty.contains(DOWN_MARKER));
        assert!(MigrationScript::parse(&empty).up_statements().is_empty());
    }

    #[test]
    fn comments_and_blanks_are_not_statements() {
        assert_eq!(
            statements("-- nothing here\n;\n  ;\nSELECT 1;\n-- trailing"),
            ["SELECT 1"]
        );
    }

    #[test]
    fn quoted_semicolons_stay_in_their_statement() {
        let sql = "CREATE TABLE \"n;x\" (body VARCHAR(255) DEFAULT 'a;b', tag TEXT DEFAULT 'it''s; -- fine');\n\
                   -- comment; with a semicolon\n\
                   DROP TABLE old; -- trailing\n";
        assert_eq!(
            statements(sql),
            [
                "CREATE TABLE \"n;x\" (body VARCHAR(255) DEFAULT 'a;b', tag TEXT DEFAULT 'it''s; -- fine')",
                "DROP TABLE old"
            ]
        );

        let script = MigrationScript::from_statements(&statements(sql), &[]);
        assert_eq!(MigrationScript::parse(&script.render()).up_statements(), statements(sql));
    }

    #[test]
    fn file_names() {
        assert_eq!(file_name(7, "add_puppy"), "007_add_puppy.sql");
        assert_eq!(parse_file_name("007_add_puppy.sql"), Some((7, "007_add_puppy")));
        assert_eq!(parse_file_name("1234_big.sql"), Some((1234, "1234_big")));
        for bad in ["README.md", "add_puppy.sql", "007_.sql", "007.sql", "_x.sql"] {
            assert_eq!(parse_file_name(bad), None, "{bad}");
        }
    }

    #[test]
    fn names_are_validated() {
        assert!(is_valid_name("add_puppy_2"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("Add Puppy"));
        assert!(!is_valid_name("../escape"));
    }
}
