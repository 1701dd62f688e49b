//! Rowan-based lossless syntax tree types for Kiln.
//!
//! Defines the `KilnLanguage` marker type that connects [`SyntaxKind`] to
//! rowan's generic tree infrastructure, plus type aliases for convenience.

use crate::syntax_kind::SyntaxKind;

/// Marker type for Kiln's language in rowan's generic tree system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KilnLanguage {}

impl rowan::Language for KilnLanguage {
    type Kind = SyntaxKind;

    fn kind_from_raw(raw: rowan::SyntaxKind) -> Self::Kind {
        SyntaxKind::from_raw(raw.0)
    }

    fn kind_to_raw(kind: Self::Kind) -> rowan::SyntaxKind {
        rowan::SyntaxKind(kind as u16)
    }
}

/// A tree node (interior node with children).
pub type SyntaxNode = rowan::SyntaxNode<KilnLanguage>;

/// A tree token (leaf with text).
pub type SyntaxToken = rowan::SyntaxToken<KilnLanguage>;

/// Either a node or a token.
pub type SyntaxElement = rowan::SyntaxElement<KilnLanguage>;

/// Render a syntax tree as an indented debug listing, one element per line.
///
/// Trivia tokens are included so the listing shows the tree is lossless.
pub fn debug_tree(node: &SyntaxNode) -> String {
    let mut out = String::new();
    write_element(&mut out, rowan::NodeOrToken::Node(node.clone()), 0);
    out.truncate(out.trim_end().len());
    out
}

fn write_element(out: &mut String, element: SyntaxElement, depth: usize) {
    let indent = "  ".repeat(depth);
    let range = element.text_range();
    let (start, end): (u32, u32) = (range.start().into(), range.end().into());
    match element {
        rowan::NodeOrToken::Node(node) => {
            out.push_str(&format!("{indent}{:?}@{start}..{end}\n", node.kind()));
            for child in node.children_with_tokens() {
                write_element(out, child, depth + 1);
            }
        }
        rowan::NodeOrToken::Token(token) => {
            out.push_str(&format!(
                "{indent}{:?}@{start}..{end} {:?}\n",
                token.kind(),
                token.text()
            ));
        }
    }
}
