use std::sync::LazyLock;

use regex::Regex;

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})[ \t]+(.+?)(?:[ \t]+#+)?[ \t]*$").unwrap());
static FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[-*+][ \t]+)?\*\*([^*:\n]+?)(?::\*\*|\*\*:)[ \t]*(.*)$").unwrap()
});
static RULE_CELL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^:?-{2,}:?$").unwrap());

/// One classified markdown line. `classify_lines` yields exactly one block
/// per input line so indices line up with `str::lines()`.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading { level: u8, text: String },
    Field { key: String, value: String },
    TableRow(Vec<String>),
    TableRule,
    Fence,
    Code,
    Text(String),
    Empty,
}

impl Block {
    pub fn heading_level(&self) -> Option<u8> {
        match self {
            Block::Heading { level, .. } => Some(*level),
            _ => None,
        }
    }
}

pub fn classify_lines(markdown: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut in_fence = false;

    for raw in markdown.lines() {
        let line = raw.trim();

        // ── Code fences: nothing inside is structural ──
        if line.starts_with("```") || line.starts_with("~~~") {
            in_fence = !in_fence;
            blocks.push(Block::Fence);
            continue;
        }
        if in_fence {
            blocks.push(Block::Code);
            continue;
        }

        if line.is_empty() {
            blocks.push(Block::Empty);
            continue;
        }

        // ── Heading: ## text ──
        if let Some(caps) = HEADING_RE.captures(line) {
            blocks.push(Block::Heading {
                level: caps[1].len() as u8,
                text: caps[2].trim().to_string(),
            });
            continue;
        }

        // ── Table row: | a | b | ──
        if line.starts_with('|') {
            let cells = split_row(line);
            if !cells.is_empty() && cells.iter().all(|c| RULE_CELL_RE.is_match(c)) {
                blocks.push(Block::TableRule);
            } else {
                blocks.push(Block::TableRow(cells));
            }
            continue;
        }

        // ── Field: **Key**: value or **Key:** value ──
        if let Some(caps) = FIELD_RE.captures(line) {
            blocks.push(Block::Field {
                key: caps[1].trim().to_string(),
                value: caps[2].trim().to_string(),
            });
            continue;
        }

        blocks.push(Block::Text(line.to_string()));
    }

    blocks
}

fn split_row(line: &str) -> Vec<String> {
    let inner = line.trim_start_matches('|');
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(|c| c.trim().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading() {
        let blocks = classify_lines("## Findings (Interim)");
        assert!(matches!(&blocks[0], Block::Heading { level: 2, text } if text == "Findings (Interim)"));
    }

    #[test]
    fn closing_hashes_stripped() {
        let blocks = classify_lines("### Notes ###");
        assert!(matches!(&blocks[0], Block::Heading { level: 3, text } if text == "Notes"));
    }

    #[test]
    fn hash_without_space_is_text() {
        let blocks = classify_lines("#hashtag");
        assert!(matches!(&blocks[0], Block::Text(t) if t == "#hashtag"));
    }

    #[test]
    fn field_both_styles() {
        let blocks = classify_lines("**Status**: Draft\n**Generated:** 2025-01-02\n- **Authors**: A, B");
        assert!(matches!(&blocks[0], Block::Field { key, value } if key == "Status" && value == "Draft"));
        assert!(matches!(&blocks[1], Block::Field { key, value } if key == "Generated" && value == "2025-01-02"));
        assert!(matches!(&blocks[2], Block::Field { key, value } if key == "Authors" && value == "A, B"));
    }

    #[test]
    fn table_rows() {
        let blocks = classify_lines("| Strategy | Pass Rate |\n|---|:---:|\n| Single-shot | **86.6%** |");
        assert!(matches!(&blocks[0], Block::TableRow(c) if c == &vec!["Strategy".to_string(), "Pass Rate".to_string()]));
        assert_eq!(blocks[1], Block::TableRule);
        assert!(matches!(&blocks[2], Block::TableRow(c) if c[1] == "**86.6%**"));
    }

    #[test]
    fn fenced_heading_is_code() {
        let md = "```bash\n# not a heading\n```\n# Real";
        let blocks = classify_lines(md);
        assert_eq!(blocks[0], Block::Fence);
        assert_eq!(blocks[1], Block::Code);
        assert_eq!(blocks[2], Block::Fence);
        assert_eq!(blocks[3].heading_level(), Some(1));
    }

    #[test]
    fn one_block_per_line() {
        let md = "# T\n\ntext\n| a |\n```\nx\n```\n";
        assert_eq!(classify_lines(md).len(), md.lines().count());
    }

    #[test]
    fn empty_string() {
        assert!(classify_lines("").is_empty());
    }
}
