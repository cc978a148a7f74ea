use anyhow::Context;
use std::collections::HashSet;
use std::path::Path;

/// Load the symbol universe from a text file: one ticker per line, `#`
/// starts a comment. Order is preserved; duplicates keep their first
/// occurrence. Failure here is fatal — the universe is a precondition.
pub fn load_universe(path: &Path) -> anyhow::Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read universe file {}", path.display()))?;
    parse_universe(&text)
}

fn parse_universe(text: &str) -> anyhow::Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for line in text.lines() {
        let symbol = line.split('#').next().unwrap_or("").trim();
        if symbol.is_empty() {
            continue;
        }
        anyhow::ensure!(
            !symbol.contains(char::is_whitespace),
            "invalid universe line: {line:?}"
        );
        if seen.insert(symbol.to_string()) {
            out.push(symbol.to_string());
        }
    }

    anyhow::ensure!(!out.is_empty(), "universe file contains no symbols");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_symbols_skipping_comments_and_blanks() {
        let text = "# header\nAAPL\n\nMSFT # trailing note\n  BRK.B  \n";
        let universe = parse_universe(text).unwrap();
        assert_eq!(universe, vec!["AAPL", "MSFT", "BRK.B"]);
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let universe = parse_universe("AAPL\nMSFT\nAAPL\n").unwrap();
        assert_eq!(universe, vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn rejects_lines_with_embedded_whitespace() {
        assert!(parse_universe("AAPL MSFT\n").is_err());
    }

    #[test]
    fn rejects_an_empty_universe() {
        assert!(parse_universe("# only comments\n\n").is_err());
    }
}
