/// Per-function named metadata slot. Under key `"annotation"`, its children
/// enumerate (in encounter order, duplicates allowed) the annotation
/// strings targeting that function — written by the harvester (C2), read
/// by every annotation-dispatching pass (C3).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataNode(pub Vec<String>);

impl MetadataNode {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, s: impl Into<String>) {
        self.0.push(s.into());
    }

    #[must_use]
    pub fn contains(&self, s: &str) -> bool {
        self.0.iter().any(|x| x == s)
    }
}
