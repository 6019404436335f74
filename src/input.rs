//! Proxy list input
//!
//! Reads proxy addresses one per line from stdin or a file. Lines are
//! trimmed and blanks dropped; addresses are not validated here.

use crate::Result;
use anyhow::{bail, Context};
use std::borrow::Cow;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader, IsTerminal, Read};
use std::path::Path;
use tracing::debug;

/// Longest accepted input line
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Parse proxy addresses from a reader
///
/// Lines are read as raw bytes and decoded lossily, so a line that is not
/// UTF-8 becomes an address the resolver rejects on its own.
pub fn parse_reader<R: BufRead>(mut reader: R) -> Result<Vec<String>> {
    let mut proxies = Vec::new();
    let mut line = Vec::new();
    for number in 1usize.. {
        line.clear();
        let read = (&mut reader)
            .take(MAX_LINE_BYTES as u64 + 1)
            .read_until(b'\n', &mut line)?;
        if read == 0 {
            break;
        }
        if line.last() == Some(&b'\n') {
            line.pop();
        } else if line.len() > MAX_LINE_BYTES {
            bail!("line {} is longer than {} bytes", number, MAX_LINE_BYTES);
        }

        let decoded = String::from_utf8_lossy(&line);
        let trimmed = decoded.trim();
        if !trimmed.is_empty() {
            if matches!(decoded, Cow::Owned(_)) {
                debug!(line = number, "proxy line is not valid UTF-8");
            }
            proxies.push(trimmed.to_string());
        }
    }
    Ok(proxies)
}

/// Read proxies piped on stdin; empty when stdin is a terminal
pub fn read_stdin() -> Result<Vec<String>> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(Vec::new());
    }
    parse_reader(stdin.lock()).context("reading proxies from stdin")
}

/// Read proxies from a file
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    parse_reader(BufReader::new(file)).with_context(|| format!("reading {}", path.display()))
}

/// Drop repeated addresses, keeping first occurrences in order
pub fn unique(proxies: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(proxies.len());
    proxies
        .into_iter()
        .filter(|proxy| seen.insert(proxy.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_reader_trims_and_drops_blanks() {
        let content = r#"
192.168.1.1:8080
   socks4://192.168.1.2:1080

http://192.168.1.3:8080
"#;
        let proxies = parse_reader(Cursor::new(content)).unwrap();
        assert_eq!(
            proxies,
            vec![
                "192.168.1.1:8080",
                "socks4://192.168.1.2:1080",
                "http://192.168.1.3:8080"
            ]
        );
    }

    #[test]
    fn test_parse_reader_keeps_lines_around_invalid_utf8() {
        let input: &[u8] = b"1.1.1.1:1080\n\xff\xfe\n2.2.2.2:1080\n";
        let proxies = parse_reader(Cursor::new(input)).unwrap();
        assert_eq!(proxies.len(), 3);
        assert_eq!(proxies[0], "1.1.1.1:1080");
        assert_eq!(proxies[2], "2.2.2.2:1080");
        assert!(crate::proxy::SchemeResolver::resolve(&proxies[1]).is_err());
    }

    #[test]
    fn test_parse_reader_line_at_limit() {
        let mut content = "a".repeat(MAX_LINE_BYTES);
        content.push('\n');
        content.push_str("1.1.1.1:1080");
        let proxies = parse_reader(Cursor::new(content)).unwrap();
        assert_eq!(proxies.len(), 2);
        assert_eq!(proxies[1], "1.1.1.1:1080");
    }

    #[test]
    fn test_parse_reader_handles_crlf() {
        let proxies = parse_reader(Cursor::new("1.1.1.1:1080\r\n\r\n2.2.2.2:1080\r\n")).unwrap();
        assert_eq!(proxies, vec!["1.1.1.1:1080", "2.2.2.2:1080"]);
    }

    #[test]
    fn test_parse_reader_rejects_huge_line() {
        let huge = format!("1.1.1.1:1080\n{}\n", "a".repeat(MAX_LINE_BYTES + 1));
        let err = parse_reader(Cursor::new(huge)).unwrap_err();
        assert!(err.to_string().starts_with("line 2 is longer than"));
    }

    #[test]
    fn test_unique_keeps_first_order() {
        let proxies = vec![
            "b:1".to_string(),
            "a:1".to_string(),
            "b:1".to_string(),
            "c:1".to_string(),
            "a:1".to_string(),
        ];
        assert_eq!(unique(proxies), vec!["b:1", "a:1", "c:1"]);
    }

    #[test]
    fn test_read_file() {
        let path = std::env::temp_dir().join(format!("proxyra-input-{}.txt", std::process::id()));
        std::fs::write(&path, "1.1.1.1:1080\n\n  http://2.2.2.2:80 \n").unwrap();

        let proxies = read_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(proxies, vec!["1.1.1.1:1080", "http://2.2.2.2:80"]);
    }

    #[test]
    fn test_read_missing_file() {
        assert!(read_file("/nonexistent/proxyra/list.txt").is_err());
    }
}
