//! SQL 스크립트를 문장 단위로 분리
//!
//! 최상위 수준의 `;` 에서만 분리합니다. 문자열 리터럴, 따옴표 식별자,
//! 달러 인용(`$$`, `$tag$`), 라인/블록 주석 안의 `;` 는 무시합니다.
//! 닫히지 않은 인용이나 주석은 나머지 전체를 하나의 문장으로 취급하며
//! 실제 구문 오류는 서버가 보고합니다.

/// 분리된 SQL 문장
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlStatement {
    pub text: String,
    /// 문장 첫 토큰이 시작되는 줄 (1부터)
    pub line: usize,
}

/// SQL 스크립트를 문장 목록으로 분리
pub fn split_statements(sql: &str) -> Vec<SqlStatement> {
    let bytes = sql.as_bytes();
    let mut lines = LineCounter::default();
    let mut statements = Vec::new();
    let mut content_start: Option<usize> = None;
    let mut i = 0;

    let mut push = |start: usize, end: usize, lines: &mut LineCounter| {
        let text = sql[start..end].trim_end();
        if !text.is_empty() {
            statements.push(SqlStatement {
                text: text.to_string(),
                line: lines.line_at(sql, start),
            });
        }
    };

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = skip_line_comment(bytes, i);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = skip_block_comment(bytes, i);
                continue;
            }
            b';' => {
                if let Some(start) = content_start.take() {
                    push(start, i, &mut lines);
                }
                i += 1;
                continue;
            }
            _ if b.is_ascii_whitespace() => {
                i += 1;
                continue;
            }
            _ => {}
        }

        if content_start.is_none() {
            content_start = Some(i);
        }

        i = match b {
            b'\'' => skip_quoted(bytes, i, b'\'', is_escape_string(bytes, i)),
            b'"' => skip_quoted(bytes, i, b'"', false),
            b'$' => match dollar_tag_len(bytes, i) {
                Some(tag_len) => skip_dollar_quoted(bytes, i, tag_len),
                None => i + 1,
            },
            _ => i + 1,
        };
    }

    if let Some(start) = content_start {
        push(start, bytes.len(), &mut lines);
    }

    statements
}

/// 오프셋 -> 줄 번호 변환 (오프셋이 단조 증가한다고 가정)
#[derive(Default)]
struct LineCounter {
    offset: usize,
    line: usize,
}

impl LineCounter {
    fn line_at(&mut self, sql: &str, offset: usize) -> usize {
        if offset < self.offset {
            self.offset = 0;
            self.line = 0;
        }
        self.line += sql.as_bytes()[self.offset..offset]
            .iter()
            .filter(|&&b| b == b'\n')
            .count();
        self.offset = offset;
        self.line + 1
    }
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

/// E'...' 형태의 이스케이프 문자열인지 확인
fn is_escape_string(bytes: &[u8], quote: usize) -> bool {
    if quote == 0 || !matches!(bytes[quote - 1], b'E' | b'e') {
        return false;
    }
    quote < 2 || !is_ident_byte(bytes[quote - 2])
}

fn skip_line_comment(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |pos| start + pos)
}

/// 중첩 블록 주석 건너뛰기
fn skip_block_comment(bytes: &[u8], start: usize) -> usize {
    let mut depth = 0usize;
    let mut j = start;
    while j + 1 < bytes.len() {
        match (bytes[j], bytes[j + 1]) {
            (b'/', b'*') => {
                depth += 1;
                j += 2;
            }
            (b'*', b'/') => {
                depth -= 1;
                j += 2;
                if depth == 0 {
                    return j;
                }
            }
            _ => j += 1,
        }
    }
    bytes.len()
}

fn skip_quoted(bytes: &[u8], start: usize, quote: u8, backslash_escapes: bool) -> usize {
    let mut j = start + 1;
    while j < bytes.len() {
        let b = bytes[j];
        if backslash_escapes && b == b'\\' {
            j += 2;
            continue;
        }
        if b == quote {
            if bytes.get(j + 1) == Some(&quote) {
                j += 2;
                continue;
            }
            return j + 1;
        }
        j += 1;
    }
    bytes.len()
}

/// `$$` 또는 `$tag$` 의 길이 (위치 파라미터 `$1` 은 None)
fn dollar_tag_len(bytes: &[u8], start: usize) -> Option<usize> {
    if start > 0 && is_ident_byte(bytes[start - 1]) {
        return None;
    }
    let mut j = start + 1;
    match bytes.get(j) {
        Some(b'$') => return Some(2),
        Some(&b) if b.is_ascii_alphabetic() || b == b'_' || b >= 0x80 => j += 1,
        _ => return None,
    }
    while let Some(&b) = bytes.get(j) {
        if b == b'$' {
            return Some(j - start + 1);
        }
        if !is_ident_byte(b) {
            return None;
        }
        j += 1;
    }
    None
}

fn skip_dollar_quoted(bytes: &[u8], start: usize, tag_len: usize) -> usize {
    let tag = &bytes[start..start + tag_len];
    let body = start + tag_len;
    bytes[body..]
        .windows(tag_len)
        .position(|window| window == tag)
        .map_or(bytes.len(), |pos| body + pos + tag_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(sql: &str) -> Vec<String> {
        split_statements(sql).into_iter().map(|s| s.text).collect()
    }

    #[test]
    fn splits_simple_statements() {
        assert_eq!(
            texts("CREATE SCHEMA a; CREATE TABLE a.t (id int);\nSELECT 1"),
            vec!["CREATE SCHEMA a", "CREATE TABLE a.t (id int)", "SELECT 1"]
        );
    }

    #[test]
    fn ignores_semicolons_in_literals_and_identifiers() {
        let sql = "INSERT INTO t VALUES ('a;b', 'it''s; fine');\nSELECT \"odd;name\" FROM t;";
        assert_eq!(
            texts(sql),
            vec![
                "INSERT INTO t VALUES ('a;b', 'it''s; fine')",
                "SELECT \"odd;name\" FROM t"
            ]
        );
    }

    #[test]
    fn escape_strings_allow_backslash_quotes() {
        let sql = r"SELECT E'don\'t; split'; SELECT 2;";
        assert_eq!(texts(sql), vec![r"SELECT E'don\'t; split'", "SELECT 2"]);
    }

    #[test]
    fn keeps_dollar_quoted_function_bodies_whole() {
        let sql = "CREATE FUNCTION review_system.bump() RETURNS trigger AS $fn$\nBEGIN\n  UPDATE s SET n = n + 1;\n  RETURN NEW;\nEND;\n$fn$ LANGUAGE plpgsql;\nDO $$ BEGIN PERFORM 1; END $$;";
        let statements = texts(sql);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].ends_with("$fn$ LANGUAGE plpgsql"));
        assert_eq!(statements[1], "DO $$ BEGIN PERFORM 1; END $$");
    }

    #[test]
    fn positional_parameters_are_not_dollar_quotes() {
        let sql = "PREPARE p AS SELECT $1::int; EXECUTE p(1);";
        assert_eq!(texts(sql), vec!["PREPARE p AS SELECT $1::int", "EXECUTE p(1)"]);
    }

    #[test]
    fn skips_comments_and_comment_only_segments() {
        let sql = "-- header; not a statement\n/* outer /* nested; */ still; */\nSELECT 1; -- trailing\n;;\n/* only comment */";
        let statements = split_statements(sql);
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].text, "SELECT 1");
        assert_eq!(statements[0].line, 3);
    }

    #[test]
    fn reports_start_line_of_each_statement() {
        let sql = "\n\nSELECT 1;\n\n  SELECT\n  2;\nSELECT 3";
        let lines: Vec<usize> = split_statements(sql).iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![3, 5, 7]);
    }

    #[test]
    fn unterminated_quote_swallows_rest() {
        let sql = "SELECT 1; SELECT 'oops; SELECT 2;";
        assert_eq!(texts(sql), vec!["SELECT 1", "SELECT 'oops; SELECT 2;"]);
    }

    #[test]
    fn handles_multibyte_text() {
        let sql = "INSERT INTO r(content) VALUES ('좋은 게임;');\n-- 한글 주석\nSELECT '끝'";
        assert_eq!(
            texts(sql),
            vec!["INSERT INTO r(content) VALUES ('좋은 게임;')", "SELECT '끝'"]
        );
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(split_statements("").is_empty());
        assert!(split_statements("  \n ;  ; ").is_empty());
    }
}
