/// Display title of one source article (unique within a split).
/// Example: `How to Plant a Tree_0`
pub type Title = String;
/// Lowercase SHA-1 hex digest of a title, used as the article file stem.
/// Example: `5c8c8e1e2d3b5f7b61c0b8f0a1e6d9f2c4a7b3e1`
pub type ContentKey = String;
/// Field name inside a serialized record payload.
/// Examples: `article`, `abstract`, `fact_descriptions`
pub type FieldName = String;
/// Whitespace-delimited token counted into the vocabulary.
/// Examples: `the`, `tree`, `.`
pub type Token = String;
/// Text of a single corpus table cell.
/// Example: `Dig a hole twice as wide as the root ball.`
pub type CellText = String;
