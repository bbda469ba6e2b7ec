//! Document model capabilities consumed by the capture engine
//!
//! The engine never walks a tree itself. A provider enumerates the
//! references that need capturing, answers whether a reference is in use,
//! applies rewrites and serializes the result.

use url::Url;

use crate::core::{ResourceCategory, ResourceRole};

/// Opaque handle of an element inside one document
pub type NodeId = usize;

/// Where inside its element a reference lives
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ReferenceLocation {
    /// A single URL in the named attribute
    Attribute(String),
    /// A candidate list (`srcset`) in the named attribute
    Srcset(String),
    /// Text of a `<style>` element
    StyleElement,
    /// A `style` attribute
    StyleAttribute,
    /// Inline content of a `<script>` element
    ScriptContent,
    /// Markup of an `<iframe srcdoc>`
    Srcdoc,
}

/// One discovered pointer inside a document
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceReference {
    pub node: NodeId,
    pub category: ResourceCategory,
    pub location: ReferenceLocation,
    /// Attribute value or element text as found in the document
    pub value: String,
}

impl ResourceReference {
    pub fn role(&self) -> ResourceRole {
        self.category.role()
    }

    /// Attribute name carrying the reference, if any
    pub fn attribute(&self) -> Option<&str> {
        match &self.location {
            ReferenceLocation::Attribute(name) | ReferenceLocation::Srcset(name) => Some(name),
            ReferenceLocation::StyleAttribute => Some("style"),
            ReferenceLocation::Srcdoc => Some("srcdoc"),
            ReferenceLocation::StyleElement | ReferenceLocation::ScriptContent => None,
        }
    }
}

/// Change applied to the construct holding a reference
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rewrite {
    /// Replace the attribute value or element text
    SetValue(String),
    /// Remove the referring construct
    Remove,
    /// Embed a captured document directly (frames in self-contained output)
    InlineDocument(String),
}

/// In-memory tree of one document
///
/// Implementations are single-threaded; the engine keeps every document on
/// the capturing thread.
pub trait DocumentModel {
    /// Address the document was loaded from
    fn url(&self) -> &Url;

    /// Base for resolving relative references (honours `<base href>`)
    fn base_url(&self) -> Url;

    fn title(&self) -> Option<String>;

    /// Every reference that needs capturing, in document order
    fn references(&self) -> Vec<ResourceReference>;

    /// Whether the reference is currently applied or rendered
    ///
    /// `candidate` selects one entry of a candidate list such as `srcset`.
    fn is_used(&self, reference: &ResourceReference, candidate: Option<&str>) -> bool;

    /// Whether at least one element matches `selector`
    ///
    /// Selectors the provider cannot evaluate count as matching.
    fn matches_selector(&self, selector: &str) -> bool;

    /// Bytes and media type of an ephemeral source (in-memory blob, canvas)
    fn ephemeral_content(&self, url: &str) -> Option<(Vec<u8>, String)>;

    /// Applies a rewrite; `audit_id` records the original value when set
    fn apply(&mut self, reference: &ResourceReference, rewrite: Rewrite, audit_id: Option<&str>);

    /// Drops constructs that stop making sense once the document is archived
    /// (`<base>`, charset declarations other than UTF-8)
    fn prepare_for_archive(&mut self);

    fn serialize(&self) -> Vec<u8>;
}

/// Builds document models from fetched bytes
pub trait DocumentParser: Send + Sync {
    fn parse(&self, bytes: &[u8], charset: &str, url: &Url) -> Box<dyn DocumentModel>;
}
