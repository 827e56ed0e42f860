use std::fmt;

use geo::Rect;

use crate::shape::SpatialRelation;

/// Marker appended to the token of a leaf cell when it is written out. It is
/// never part of a grid alphabet.
pub const LEAF_BYTE: char = '+';

/// One tile of a prefix grid.
///
/// The token is the path of branch symbols from the root, so its length is the
/// cell's level and every prefix of it names an ancestor.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    token: String,
    rect: Rect<f64>,
    leaf: bool,
    relation: Option<SpatialRelation>,
}

impl Cell {
    pub(crate) fn new(token: String, rect: Rect<f64>) -> Self {
        Self {
            token,
            rect,
            leaf: false,
            relation: None,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn level(&self) -> usize {
        self.token.len()
    }

    /// A leaf is fully resolved: the cover does not descend below it.
    pub fn is_leaf(&self) -> bool {
        self.leaf
    }

    pub(crate) fn set_leaf(&mut self) {
        self.leaf = true;
    }

    pub fn rect(&self) -> Rect<f64> {
        self.rect
    }

    /// Relation to the shape this cell was produced for. `None` for cells
    /// decoded from a token.
    pub fn relation(&self) -> Option<SpatialRelation> {
        self.relation
    }

    pub(crate) fn set_relation(&mut self, relation: SpatialRelation) {
        self.relation = Some(relation);
    }

    /// Token as it is indexed: leaves carry a trailing [`LEAF_BYTE`].
    pub fn token_string(&self) -> String {
        if self.leaf {
            let mut s = String::with_capacity(self.token.len() + 1);
            s.push_str(&self.token);
            s.push(LEAF_BYTE);
            s
        } else {
            self.token.clone()
        }
    }

    /// Whether `other` is this cell or lies inside it.
    pub fn is_prefix_of(&self, other: &Cell) -> bool {
        other.token.starts_with(&self.token)
    }

    pub fn parent_token(&self) -> Option<&str> {
        if self.token.is_empty() {
            None
        } else {
            Some(&self.token[..self.token.len() - 1])
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token)?;
        if self.leaf {
            write!(f, "{}", LEAF_BYTE)?;
        }
        Ok(())
    }
}

/// Splits a stored token into the bare token and its leaf flag.
pub fn split_leaf_marker(token: &str) -> (&str, bool) {
    match token.strip_suffix(LEAF_BYTE) {
        Some(bare) => (bare, true),
        None => (token, false),
    }
}
