use crate::catalog::Procedure;

use super::error::MetadataError;
use super::types::{DocComment, GuardTag, HooksTag, MetadataMode, ParamTag, Tag};

/// Extracts `@param`, `@guard` and `@hooks` tags from the first `/** ... */`
/// comment of a procedure definition. Purely syntactic: sources, phases and
/// names are left unvalidated for the route compiler.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataExtractor {
    mode: MetadataMode,
}

struct Block {
    line: usize,
    text: String,
}

impl MetadataExtractor {
    pub fn new(mode: MetadataMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> MetadataMode {
        self.mode
    }

    pub fn extract(&self, procedure: &Procedure) -> Result<DocComment, MetadataError> {
        let text = procedure.definition.as_str();

        let Some(start) = text.find("/**") else {
            return Ok(DocComment::default());
        };
        let first_line = text[..start].matches('\n').count() + 1;
        let body_start = start + 3;

        let Some(len) = comment_end(&text[body_start..]) else {
            let err = MetadataError::Unterminated { line: first_line };
            return match self.mode {
                MetadataMode::Strict => Err(err),
                MetadataMode::Lenient => {
                    tracing::warn!("Ignoring metadata of '{}': {}", procedure.name, err);
                    Ok(DocComment::default())
                }
            };
        };

        let (summary, blocks) = split_blocks(&text[body_start..body_start + len], first_line);

        let mut doc = DocComment {
            summary,
            tags: Vec::with_capacity(blocks.len()),
        };

        for block in blocks {
            match parse_block(&block) {
                Ok(Some(tag)) => doc.tags.push(tag),
                Ok(None) => {}
                Err(err) => match self.mode {
                    MetadataMode::Strict => return Err(err),
                    MetadataMode::Lenient => {
                        tracing::warn!("Skipping tag in '{}': {}", procedure.name, err);
                    }
                },
            }
        }

        Ok(doc)
    }
}

/// Offset of the `*/` closing the comment. Inside builder parentheses a
/// terminator within a quoted string is skipped, so prose apostrophes never
/// open a quote. If nothing is found that way, the first `*/` closes it.
fn comment_end(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(_) if b == b'\\' => i += 1,
            Some(q) if b == q || b == b'\n' => quote = None,
            Some(_) => {}
            None => match b {
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                b'\'' | b'"' if depth > 0 => quote = Some(b),
                b'*' if bytes.get(i + 1) == Some(&b'/') => return Some(i),
                _ => {}
            },
        }
        i += 1;
    }

    body.find("*/")
}

/// Split the comment body into summary text and one block per `@tag`.
/// Continuation lines are appended to the open block with a newline.
fn split_blocks(body: &str, first_line: usize) -> (String, Vec<Block>) {
    let mut summary: Vec<&str> = Vec::new();
    let mut blocks: Vec<Block> = Vec::new();
    let mut current: Option<Block> = None;

    for (offset, raw) in body.lines().enumerate() {
        let line = strip_gutter(raw);

        if line.starts_with('@') {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            current = Some(Block {
                line: first_line + offset,
                text: line.to_string(),
            });
        } else if let Some(block) = current.as_mut() {
            if !line.is_empty() {
                block.text.push('\n');
                block.text.push_str(line);
            }
        } else if !line.is_empty() {
            summary.push(line);
        }
    }

    if let Some(block) = current {
        blocks.push(block);
    }

    (summary.join(" "), blocks)
}

fn strip_gutter(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed.strip_prefix('*').unwrap_or(trimmed).trim()
}

fn parse_block(block: &Block) -> Result<Option<Tag>, MetadataError> {
    let (tag, rest) = split_word(&block.text[1..]);
    match tag {
        "param" => parse_param(rest, block.line).map(|t| Some(Tag::Param(t))),
        "guard" => parse_guard(rest, block.line).map(|t| Some(Tag::Guard(t))),
        "hooks" | "hook" => parse_hooks(rest, block.line).map(|t| Some(Tag::Hooks(t))),
        other => {
            tracing::trace!("Ignoring unrelated doc tag @{}", other);
            Ok(None)
        }
    }
}

fn parse_param(rest: &str, line: usize) -> Result<ParamTag, MetadataError> {
    let malformed = |reason: &str| MetadataError::MalformedTag {
        tag: "param".to_string(),
        line,
        reason: reason.to_string(),
    };

    let after_brace = rest
        .trim_start()
        .strip_prefix('{')
        .ok_or_else(|| malformed("expected a {source} type"))?;
    let close = after_brace
        .find('}')
        .ok_or_else(|| malformed("unclosed {source} type"))?;

    let source = after_brace[..close].trim();
    if source.is_empty() {
        return Err(malformed("empty {source} type"));
    }

    let (name, description) = split_word(after_brace[close + 1..].trim_start());
    if name.is_empty() {
        return Err(malformed("missing parameter name"));
    }

    Ok(ParamTag {
        source: source.to_string(),
        name: name.to_string(),
        description: description.trim().to_string(),
        line,
    })
}

fn parse_guard(rest: &str, line: usize) -> Result<GuardTag, MetadataError> {
    let rest = rest.trim();
    let end = rest
        .find(|c: char| c.is_whitespace() || c == ',')
        .unwrap_or(rest.len());

    let name = &rest[..end];
    if name.is_empty() {
        return Err(MetadataError::MalformedTag {
            tag: "guard".to_string(),
            line,
            reason: "missing guard name".to_string(),
        });
    }

    let remainder = rest[end..].trim_start();
    let remainder = remainder.strip_prefix(',').unwrap_or(remainder);

    Ok(GuardTag {
        name: name.to_string(),
        args: split_list(remainder),
        line,
    })
}

fn parse_hooks(rest: &str, line: usize) -> Result<HooksTag, MetadataError> {
    let malformed = |reason: &str| MetadataError::MalformedTag {
        tag: "hooks".to_string(),
        line,
        reason: reason.to_string(),
    };

    let rest = rest.trim();
    let (phase, functions) = match rest.strip_prefix('{') {
        Some(after) => {
            let close = after
                .find('}')
                .ok_or_else(|| malformed("unclosed {phase}"))?;
            (after[..close].trim(), &after[close + 1..])
        }
        None => split_word(rest),
    };

    if phase.is_empty() {
        return Err(malformed("missing lifecycle phase"));
    }

    let functions = split_list(functions);
    if functions.is_empty() {
        return Err(malformed("no hook functions listed"));
    }

    Ok(HooksTag {
        phase: phase.to_string(),
        functions,
        line,
    })
}

fn split_word(s: &str) -> (&str, &str) {
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn procedure(definition: &str) -> Procedure {
        Procedure::new("api_get_test", definition, vec![])
    }

    const DEFINITION: &str = "BEGIN
  /**
   * Look up a user profile.
   *
   * @param {params} id Type.Integer({ minimum: 1 })
   * @param {querystring} include_posts<posts> Type.Optional(
   *   Type.Boolean()
   * )
   * @param {user} sub
   * @guard authenticated
   * @guard role admin, editor
   * @hooks onRequest log_request, no_store
   * @author someone
   */
  SELECT 1;
END";

    #[test]
    fn extracts_tags_in_order() {
        let doc = MetadataExtractor::default()
            .extract(&procedure(DEFINITION))
            .unwrap();

        assert_eq!(doc.summary, "Look up a user profile.");
        assert_eq!(doc.tags.len(), 6);

        let params: Vec<&ParamTag> = doc.params().collect();
        assert_eq!(params[0].source, "params");
        assert_eq!(params[0].name, "id");
        assert_eq!(params[0].description, "Type.Integer({ minimum: 1 })");
        assert_eq!(params[0].line, 5);

        assert_eq!(params[1].name, "include_posts<posts>");
        assert_eq!(params[1].description, "Type.Optional(\nType.Boolean()\n)");

        assert_eq!(params[2].source, "user");
        assert_eq!(params[2].description, "");

        let guards: Vec<&GuardTag> = doc.guards().collect();
        assert_eq!(guards[0].name, "authenticated");
        assert!(guards[0].args.is_empty());
        assert_eq!(guards[1].name, "role");
        assert_eq!(guards[1].args, vec!["admin", "editor"]);

        let hooks: Vec<&HooksTag> = doc.hooks().collect();
        assert_eq!(hooks[0].phase, "onRequest");
        assert_eq!(hooks[0].functions, vec!["log_request", "no_store"]);
    }

    #[test]
    fn accepts_braced_phase_and_comma_after_guard() {
        let doc = MetadataExtractor::default()
            .extract(&procedure(
                "/** @guard permission, posts:write\n * @hooks {preHandler} audit */",
            ))
            .unwrap();

        let guard = doc.guards().next().unwrap();
        assert_eq!(guard.name, "permission");
        assert_eq!(guard.args, vec!["posts:write"]);

        let hooks = doc.hooks().next().unwrap();
        assert_eq!(hooks.phase, "preHandler");
        assert_eq!(hooks.functions, vec!["audit"]);
    }

    #[test]
    fn terminator_inside_quoted_pattern_does_not_close_comment() {
        let doc = MetadataExtractor::new(MetadataMode::Strict)
            .extract(&procedure(
                "/**\n * @param {querystring} code Type.String({ pattern: '^a*/b' })\n * @guard authenticated\n */",
            ))
            .unwrap();

        let param = doc.params().next().unwrap();
        assert_eq!(param.description, "Type.String({ pattern: '^a*/b' })");
        assert_eq!(doc.guards().count(), 1);
    }

    #[test]
    fn apostrophe_in_summary_still_terminates() {
        let doc = MetadataExtractor::default()
            .extract(&procedure("/** Returns the user's profile */ SELECT '*/';"))
            .unwrap();
        assert_eq!(doc.summary, "Returns the user's profile");
    }

    #[test]
    fn missing_comment_is_empty_metadata() {
        let doc = MetadataExtractor::default()
            .extract(&procedure("BEGIN SELECT 1; END"))
            .unwrap();
        assert_eq!(doc, DocComment::default());
    }

    #[test]
    fn strict_mode_rejects_unterminated_comment() {
        let err = MetadataExtractor::new(MetadataMode::Strict)
            .extract(&procedure("BEGIN\n/** @param {body} x Type.String()\nEND"))
            .unwrap_err();
        assert_eq!(err, MetadataError::Unterminated { line: 2 });
    }

    #[test]
    fn lenient_mode_ignores_unterminated_comment() {
        let doc = MetadataExtractor::new(MetadataMode::Lenient)
            .extract(&procedure("/** @param {body} x Type.String()"))
            .unwrap();
        assert!(doc.tags.is_empty());
    }

    #[test]
    fn strict_mode_rejects_param_without_source() {
        let err = MetadataExtractor::default()
            .extract(&procedure("/** @param id Type.String() */"))
            .unwrap_err();
        assert!(matches!(err, MetadataError::MalformedTag { ref tag, .. } if tag == "param"));
    }

    #[test]
    fn lenient_mode_skips_malformed_tags_only() {
        let doc = MetadataExtractor::new(MetadataMode::Lenient)
            .extract(&procedure(
                "/**\n * @param id Type.String()\n * @hooks onSend\n * @guard authenticated\n */",
            ))
            .unwrap();
        assert_eq!(doc.tags.len(), 1);
        assert!(matches!(doc.tags[0], Tag::Guard(_)));
    }
}
