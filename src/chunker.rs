//! AST-driven chunk extraction.
//!
//! Parses a source file with the grammar registered for its extension, runs
//! the language's capture query, and turns every captured top-level
//! definition into a [`RawChunk`] with a synthesized header naming the file,
//! language, and symbol. Oversized chunks are split into overlapping
//! line windows so no chunk exceeds the embedding-friendly size bound.
//!
//! Parser, tree, and query objects live only for the duration of a single
//! [`Chunker::chunk`] call.

use streaming_iterator::StreamingIterator;
use tree_sitter::{Parser, Query, QueryCursor};

use crate::error::{Error, Result};
use crate::languages::Registry;

/// Largest enriched chunk, in bytes, stored as a single unit.
const MAX_CHUNK_BYTES: usize = 8192;
/// Window size, in source lines, for splitting oversized chunks.
const SPLIT_WINDOW_LINES: usize = 40;
/// Lines shared between consecutive split windows.
const SPLIT_OVERLAP_LINES: usize = 10;

/// A chunk extracted from a source file, before embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    /// Symbol name, or "" when the capture had no `@name`.
    pub name: String,
    /// Grammar node type of the outer capture (e.g. `function_declaration`).
    pub kind: String,
    /// 1-based inclusive start line in the original file.
    pub start_line: usize,
    /// 1-based inclusive end line in the original file.
    pub end_line: usize,
    /// Enriched content: header lines followed by the exact source lines.
    pub content: String,
}

struct Capture {
    name: String,
    kind: String,
    start_line: usize,
    end_line: usize,
    start_byte: usize,
    end_byte: usize,
}

/// Extracts semantic chunks from source files using tree-sitter.
pub struct Chunker<'r> {
    registry: &'r Registry,
}

impl<'r> Chunker<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Chunker { registry }
    }

    /// Parses the source and returns its semantic chunks in capture order.
    /// Files with no registered grammar yield an empty vec, not an error.
    pub fn chunk(&self, path: &str, src: &[u8]) -> Result<Vec<RawChunk>> {
        let Some((spec, lang)) = self.registry.lookup(path) else {
            return Ok(Vec::new());
        };

        let text = std::str::from_utf8(src).map_err(|e| Error::Parse {
            path: path.to_string(),
            message: format!("not valid UTF-8: {e}"),
        })?;

        let mut parser = Parser::new();
        parser
            .set_language(&spec.language)
            .map_err(|e| Error::Parse {
                path: path.to_string(),
                message: e.to_string(),
            })?;
        let tree = parser.parse(src, None).ok_or_else(|| Error::Parse {
            path: path.to_string(),
            message: "parser produced no tree".to_string(),
        })?;

        let query = Query::new(&spec.language, spec.query).map_err(|e| Error::Parse {
            path: path.to_string(),
            message: format!("compile query for {lang}: {e}"),
        })?;

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, tree.root_node(), src);
        let mut captures: Vec<Capture> = Vec::new();
        while let Some(m) = matches.next() {
            let mut chunk_node = None;
            let mut name = String::new();
            for cap in m.captures {
                match query.capture_names()[cap.index as usize] {
                    "chunk" => chunk_node = Some(cap.node),
                    "name" => name = cap.node.utf8_text(src).unwrap_or("").to_string(),
                    _ => {}
                }
            }
            let Some(node) = chunk_node else { continue };
            captures.push(Capture {
                name,
                kind: node.kind().to_string(),
                start_line: node.start_position().row + 1,
                end_line: node.end_position().row + 1,
                start_byte: node.start_byte(),
                end_byte: node.end_byte(),
            });
        }

        let captures = dedup(captures);

        let lines: Vec<&str> = text.split('\n').collect();
        let mut chunks = Vec::new();
        for cap in &captures {
            let content = enrich(
                path,
                lang,
                &cap.kind,
                &cap.name,
                &lines,
                cap.start_line,
                cap.end_line,
            );
            if content.len() > MAX_CHUNK_BYTES {
                chunks.extend(split_oversized(&content, &cap.name, &cap.kind, cap.start_line));
            } else {
                chunks.push(RawChunk {
                    name: cap.name.clone(),
                    kind: cap.kind.clone(),
                    start_line: cap.start_line,
                    end_line: cap.end_line,
                    content,
                });
            }
        }

        Ok(chunks)
    }
}

/// Removes captures fully contained in a larger capture, keeping the
/// outermost node (e.g. a decorated definition subsuming its inner
/// function). Adjacent non-overlapping captures are always kept.
fn dedup(mut caps: Vec<Capture>) -> Vec<Capture> {
    if caps.len() <= 1 {
        return caps;
    }
    // Start byte ascending, then larger span first so the outer node wins
    // ties at the same start.
    caps.sort_by(|a, b| {
        a.start_byte
            .cmp(&b.start_byte)
            .then_with(|| (b.end_byte - b.start_byte).cmp(&(a.end_byte - a.start_byte)))
    });

    let mut kept = Vec::with_capacity(caps.len());
    let mut last_end = 0usize;
    for cap in caps {
        if cap.start_byte >= last_end {
            last_end = last_end.max(cap.end_byte);
            kept.push(cap);
        }
    }
    kept
}

/// Builds the enriched content block: a three-line comment header followed
/// by the exact source lines `[start_line, end_line]`, joined by line feeds.
fn enrich(
    path: &str,
    lang: &str,
    kind: &str,
    name: &str,
    lines: &[&str],
    start_line: usize,
    end_line: usize,
) -> String {
    let mut out = String::new();
    out.push_str(&format!("// File: {path}\n"));
    out.push_str(&format!("// Language: {lang}\n"));
    if !name.is_empty() {
        out.push_str(&format!("// {kind}: {name}\n"));
    }
    let start = start_line.saturating_sub(1).min(lines.len());
    let end = end_line.min(lines.len());
    if start < end {
        out.push_str(&lines[start..end].join("\n"));
    }
    out
}

/// Splits an oversized enriched chunk into sliding line windows. Every
/// window inherits the outer chunk's name and kind; line ranges are
/// reconstructed from the original start line.
fn split_oversized(content: &str, name: &str, kind: &str, base_start_line: usize) -> Vec<RawChunk> {
    let lines: Vec<&str> = content.split('\n').collect();
    let mut chunks = Vec::new();
    let mut i = 0;
    loop {
        let end = (i + SPLIT_WINDOW_LINES).min(lines.len());
        chunks.push(RawChunk {
            name: name.to_string(),
            kind: kind.to_string(),
            start_line: base_start_line + i,
            end_line: base_start_line + end - 1,
            content: lines[i..end].join("\n"),
        });
        if end >= lines.len() {
            break;
        }
        i += SPLIT_WINDOW_LINES - SPLIT_OVERLAP_LINES;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(path: &str, src: &str) -> Vec<RawChunk> {
        let registry = Registry::builtin();
        Chunker::new(&registry).chunk(path, src.as_bytes()).unwrap()
    }

    #[test]
    fn go_function_and_type() {
        let src = "package m\nfunc Add(a, b int) int { return a + b }\ntype T struct{ X int }\n";
        let chunks = chunk("main.go", src);
        assert_eq!(chunks.len(), 2);

        assert_eq!(chunks[0].name, "Add");
        assert_eq!(chunks[0].kind, "function_declaration");
        assert_eq!(chunks[0].start_line, 2);
        assert_eq!(chunks[0].end_line, 2);

        assert_eq!(chunks[1].name, "T");
        assert_eq!(chunks[1].kind, "type_declaration");
        assert_eq!(chunks[1].start_line, 3);
    }

    #[test]
    fn enriched_header_names_file_language_and_symbol() {
        let src = "package m\nfunc Add(a, b int) int { return a + b }\n";
        let chunks = chunk("pkg/math.go", src);
        let content = &chunks[0].content;
        assert!(content.starts_with("// File: pkg/math.go\n// Language: go\n// function_declaration: Add\n"));
        assert!(content.ends_with("func Add(a, b int) int { return a + b }"));
        assert!(!content.ends_with('\n'));
    }

    #[test]
    fn python_decorated_definition_keeps_outer_capture() {
        let src = "@app.route('/')\ndef index():\n    return 'ok'\n";
        let chunks = chunk("app.py", src);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind, "decorated_definition");
        assert_eq!(chunks[0].name, "index");
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 3);
    }

    #[test]
    fn python_class_with_methods_keeps_class_only() {
        let src = "class C:\n    def a(self):\n        pass\n    def b(self):\n        pass\n";
        let chunks = chunk("c.py", src);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind, "class_definition");
        assert_eq!(chunks[0].name, "C");
    }

    #[test]
    fn adjacent_definitions_are_all_kept() {
        let src = "def a():\n    pass\n\ndef b():\n    pass\n\ndef c():\n    pass\n";
        let chunks = chunk("f.py", src);
        let names: Vec<&str> = chunks.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn typescript_interface_and_arrow_function() {
        let src = "interface Shape {\n  area(): number;\n}\nconst twice = (n: number) => n * 2;\n";
        let chunks = chunk("shapes.ts", src);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].kind, "interface_declaration");
        assert_eq!(chunks[0].name, "Shape");
        assert_eq!(chunks[1].name, "twice");
    }

    #[test]
    fn unknown_extension_yields_no_chunks() {
        let chunks = chunk("notes.txt", "just some prose\n");
        assert!(chunks.is_empty());
    }

    #[test]
    fn invalid_utf8_is_a_parse_error() {
        let registry = Registry::builtin();
        let err = Chunker::new(&registry)
            .chunk("bad.go", &[0x66, 0x6e, 0xff, 0xfe])
            .unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn oversized_function_splits_into_overlapping_windows() {
        // A python function whose enriched body far exceeds the size bound.
        let mut src = String::from("def big():\n");
        for i in 0..400 {
            src.push_str(&format!("    value_{i} = 'xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx'\n"));
        }
        let chunks = chunk("big.py", &src);
        assert!(chunks.len() >= 2, "expected a split, got {} chunk(s)", chunks.len());

        for c in &chunks {
            assert_eq!(c.name, "big");
            assert_eq!(c.kind, "function_definition");
            assert!(c.end_line - c.start_line + 1 <= SPLIT_WINDOW_LINES);
        }

        // Consecutive windows share exactly the overlap.
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].start_line + SPLIT_WINDOW_LINES - SPLIT_OVERLAP_LINES, pair[1].start_line);
            assert_eq!(pair[1].start_line + SPLIT_OVERLAP_LINES - 1, pair[0].end_line);

            let prev_tail: Vec<&str> = pair[0]
                .content
                .split('\n')
                .rev()
                .take(SPLIT_OVERLAP_LINES)
                .collect();
            let next_head: Vec<&str> = pair[1].content.split('\n').take(SPLIT_OVERLAP_LINES).collect();
            let prev_tail: Vec<&str> = prev_tail.into_iter().rev().collect();
            assert_eq!(prev_tail, next_head);
        }

        // Line ranges increase monotonically.
        for pair in chunks.windows(2) {
            assert!(pair[1].start_line > pair[0].start_line);
        }
    }

    #[test]
    fn split_windows_stay_within_line_budget() {
        let content = (0..100).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let parts = split_oversized(&content, "f", "function_definition", 10);
        assert_eq!(parts[0].start_line, 10);
        assert_eq!(parts[0].end_line, 49);
        assert_eq!(parts[1].start_line, 40);
        let last = parts.last().unwrap();
        assert_eq!(last.end_line, 10 + 100 - 1);
    }
}
