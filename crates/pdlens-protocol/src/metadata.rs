//! Self-describing parse trees returned by the decoder
//!
//! A decoded report is a tree of [`MetadataNode`]s. Leaves carry scalar
//! values; inner nodes carry an ordered list of named children. Consumers
//! look children up by field name and never rely on their position.

/// Value held by a metadata node
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum MetadataValue {
    /// Ordered child nodes
    Children(Vec<MetadataNode>),
    /// Text value, usually with a unit suffix (e.g. "5.012V")
    Text(String),
    /// Plain number
    Number(f64),
    /// Flag
    Bool(bool),
    /// No value
    Null,
}

/// One node of a decoded parse tree
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetadataNode {
    /// Field name, if the node is named
    pub field: Option<String>,
    /// Inclusive bit range covered by this node
    pub bit_range: Option<(u32, u32)>,
    /// Raw bits/bytes backing this node, as rendered by the decoder
    pub raw: Option<String>,
    /// Node value
    pub value: MetadataValue,
}

impl MetadataNode {
    /// Create a named leaf with a text value
    pub fn text(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            bit_range: None,
            raw: None,
            value: MetadataValue::Text(value.into()),
        }
    }

    /// Create a named inner node
    pub fn branch(field: impl Into<String>, children: Vec<MetadataNode>) -> Self {
        Self {
            field: Some(field.into()),
            bit_range: None,
            raw: None,
            value: MetadataValue::Children(children),
        }
    }

    /// Create an unnamed root node
    pub fn root(children: Vec<MetadataNode>) -> Self {
        Self {
            field: None,
            bit_range: None,
            raw: None,
            value: MetadataValue::Children(children),
        }
    }

    /// Attach a bit range to this node
    pub fn with_bits(mut self, start: u32, end: u32) -> Self {
        self.bit_range = Some((start, end));
        self
    }

    /// Attach the raw rendering to this node
    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }

    /// Child nodes (empty for leaves)
    pub fn children(&self) -> &[MetadataNode] {
        match &self.value {
            MetadataValue::Children(children) => children,
            _ => &[],
        }
    }

    /// First direct child with the given field name
    pub fn child(&self, field: &str) -> Option<&MetadataNode> {
        self.children()
            .iter()
            .find(|node| node.field.as_deref() == Some(field))
    }

    /// First direct child matching any of the given field names, in order of preference
    pub fn child_any(&self, fields: &[&str]) -> Option<&MetadataNode> {
        fields.iter().find_map(|field| self.child(field))
    }

    /// Text value of this node, if it is a text leaf
    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            MetadataValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Text value of a direct child
    pub fn child_text(&self, field: &str) -> Option<&str> {
        self.child(field).and_then(MetadataNode::as_text)
    }

    /// Whether this node has children
    pub fn is_branch(&self) -> bool {
        matches!(self.value, MetadataValue::Children(_))
    }

    /// Number of bits covered, from the bit range
    pub fn bit_len(&self) -> u32 {
        self.bit_range
            .map(|(start, end)| end.saturating_sub(start) + 1)
            .unwrap_or(0)
    }

    /// Bit range as a label ("bit 3" or "bits 0-15")
    pub fn bit_range_label(&self) -> Option<String> {
        self.bit_range.map(|(start, end)| {
            if start == end {
                format!("bit {}", start)
            } else {
                format!("bits {}-{}", start, end)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> MetadataNode {
        MetadataNode::root(vec![
            MetadataNode::text("VBus", "5.012V"),
            MetadataNode::branch(
                "Message Header",
                vec![
                    MetadataNode::text("Message Type", "Accept").with_bits(0, 4),
                    MetadataNode::text("Port Data Role", "DFP").with_bits(5, 5),
                ],
            )
            .with_bits(0, 15),
        ])
    }

    #[test]
    fn test_child_lookup_by_name() {
        let tree = sample_tree();
        assert_eq!(tree.child_text("VBus"), Some("5.012V"));
        assert!(tree.child("Current").is_none());

        let header = tree.child("Message Header").unwrap();
        assert!(header.is_branch());
        assert_eq!(header.child_text("Message Type"), Some("Accept"));
    }

    #[test]
    fn test_child_any_prefers_first_name() {
        let node = MetadataNode::root(vec![
            MetadataNode::text("Cable Plug", "Cable"),
            MetadataNode::text("Port Power Role", "Source"),
        ]);
        let found = node.child_any(&["Port Power Role", "Cable Plug"]).unwrap();
        assert_eq!(found.as_text(), Some("Source"));
    }

    #[test]
    fn test_leaf_has_no_children() {
        let leaf = MetadataNode::text("Ah", "0.125Ah");
        assert!(leaf.children().is_empty());
        assert!(leaf.child("anything").is_none());
    }

    #[test]
    fn test_bit_range_helpers() {
        let tree = sample_tree();
        let header = tree.child("Message Header").unwrap();
        assert_eq!(header.bit_len(), 16);
        assert_eq!(header.bit_range_label().as_deref(), Some("bits 0-15"));

        let role = header.child("Port Data Role").unwrap();
        assert_eq!(role.bit_range_label().as_deref(), Some("bit 5"));
        assert_eq!(tree.bit_len(), 0);
    }
}
