use super::{Block, SourceError};

/// Parse either a JSON array of blocks or JSON lines (one block per line).
pub fn parse_blocks(raw: &str) -> Result<Vec<Block>, SourceError> {
    if raw.trim_start().starts_with('[') {
        return serde_json::from_str(raw).map_err(|source| SourceError::Json {
            line: source.line(),
            source,
        });
    }

    let mut blocks = Vec::new();
    for (i, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let block = serde_json::from_str(line).map_err(|source| SourceError::Json { line: i + 1, source })?;
        blocks.push(block);
    }
    Ok(blocks)
}
