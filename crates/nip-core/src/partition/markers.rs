//! Byte markers that delimit elements in a semi-structured document.

/// Literal byte sequences that open and close one element, plus the closing
/// marker of the document root. Matching is byte-exact and structure-blind,
/// so the markers must be unambiguous in the document at hand (the defaults
/// are for note dumps, where `<note` can only start an element).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocShape {
    pub element_open: Vec<u8>,
    pub element_close: Vec<u8>,
    pub root_close: Vec<u8>,
}

impl DocShape {
    pub fn new(element_open: &str, element_close: &str, root_close: &str) -> Self {
        Self {
            element_open: element_open.as_bytes().to_vec(),
            element_close: element_close.as_bytes().to_vec(),
            root_close: root_close.as_bytes().to_vec(),
        }
    }

    /// Rejects shapes the scanner cannot work with.
    pub fn validate(&self) -> Result<(), String> {
        if self.element_open.is_empty() || self.element_close.is_empty() {
            return Err("element markers must be non-empty".to_string());
        }
        if self.root_close.is_empty() {
            return Err("root close marker must be non-empty".to_string());
        }
        if self.element_open == self.element_close {
            return Err("element open and close markers must differ".to_string());
        }
        Ok(())
    }
}

impl Default for DocShape {
    fn default() -> Self {
        Self::new("<note", "</note>", "</osm-notes>")
    }
}
