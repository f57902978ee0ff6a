//! Response parsing for LLM outputs.
//!
//! Extracts SQL from responses that may wrap it in markdown code fences.

const FENCE: &str = "```";

/// A fenced block: its info string (language tag) and body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CodeBlock<'a> {
    info: &'a str,
    body: &'a str,
}

/// Extracts the SQL body from an LLM response.
///
/// Prefers the first block fenced as ```` ```sql ````, then the first fenced
/// block of any kind, then the whole response. The result is trimmed.
pub fn extract_sql(response: &str) -> String {
    let blocks = code_blocks(response);

    if let Some(block) = blocks
        .iter()
        .find(|b| b.info.trim().eq_ignore_ascii_case("sql"))
    {
        return block.body.trim().to_string();
    }

    if let Some(block) = blocks.first() {
        let info = block.info.trim();
        if is_language_tag(info) {
            return block.body.trim().to_string();
        }
        // Text on the opening fence line is content, not a tag.
        return format!("{}\n{}", info, block.body).trim().to_string();
    }

    response.trim().to_string()
}

fn is_language_tag(info: &str) -> bool {
    info.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+'))
}

/// Splits out every fenced block. An unterminated final fence runs to the
/// end of the text.
fn code_blocks(text: &str) -> Vec<CodeBlock<'_>> {
    let mut blocks = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(FENCE) {
        let after = &rest[start + FENCE.len()..];

        let (info, body_start) = match after.find('\n') {
            Some(nl) => (&after[..nl], nl + 1),
            None => (after, after.len()),
        };

        // A fence closed on its own opening line: ```SELECT 1```
        if let Some(close) = info.find(FENCE) {
            blocks.push(CodeBlock {
                info: "",
                body: &info[..close],
            });
            rest = &after[close + FENCE.len()..];
            continue;
        }

        let body_text = &after[body_start..];
        match body_text.find(FENCE) {
            Some(end) => {
                blocks.push(CodeBlock {
                    info,
                    body: &body_text[..end],
                });
                rest = &body_text[end + FENCE.len()..];
            }
            None => {
                blocks.push(CodeBlock {
                    info,
                    body: body_text,
                });
                break;
            }
        }
    }

    blocks
}
