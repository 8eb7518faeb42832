//! Registry of property kinds that can carry cross-document references.
//!
//! The registry is the single place that knows how a reference-bearing
//! property is shaped in the XML. Everything else dispatches through it, so
//! adding a kind means adding one descriptor here.
//!
//! ```xml
//! <Property name="cells" type="Spreadsheet::PropertySheet" status="67108864">
//!     <Cells Count="4" xlink="1">
//!         <Cell address="B1" content="=Main#Spreadsheet.Value" alias="Value"/>
//!     </Cells>
//! </Property>
//! <Property name="ExpressionEngine" type="App::PropertyExpressionEngine" status="67108864">
//!     <ExpressionEngine count="2" xlink="1">
//!         <Expression path="Radius" expression="Main#Spreadsheet.Value"/>
//!     </ExpressionEngine>
//! </Property>
//! ```

/// Shape of a reference-bearing property kind in the XML.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindSpec {
    /// Attribute on an entry that defines a local alias, if the kind has one.
    pub alias_attribute: Option<&'static str>,
    /// Tag of one reference-carrying entry element.
    pub entry_tag: &'static str,
    /// Kind discriminant.
    pub kind: PropertyKind,
    /// Attribute holding an entry's location key.
    pub location_attribute: &'static str,
    /// Tag of the container nested inside the property element.
    pub nested_tag: &'static str,
    /// Property `name` attribute value this descriptor applies to.
    pub property_name: &'static str,
    /// Entry attributes that may hold reference expressions.
    pub reference_attributes: &'static [&'static str],
}

/// The closed set of reference-bearing property kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    /// Entries carry a location key and one expression attribute.
    Expression,
    /// Entries carry a location key, a content attribute, and an optional
    /// alias-definition attribute.
    Tabular,
}

/// All registered kinds.
pub static KINDS: [KindSpec; 2] = [
    KindSpec {
        alias_attribute: Some("alias"),
        entry_tag: "Cell",
        kind: PropertyKind::Tabular,
        location_attribute: "address",
        nested_tag: "Cells",
        property_name: "cells",
        reference_attributes: &["content"],
    },
    KindSpec {
        alias_attribute: None,
        entry_tag: "Expression",
        kind: PropertyKind::Expression,
        location_attribute: "path",
        nested_tag: "ExpressionEngine",
        property_name: "ExpressionEngine",
        reference_attributes: &["expression"],
    },
];

/// Descriptor whose container tag matches a link-table parent element.
pub fn spec_for_container(nested_tag: &str) -> Option<&'static KindSpec> {
    return KINDS.iter().find(|k| return k.nested_tag == nested_tag);
}

/// Descriptor for a property `name` attribute value, if the property kind
/// can carry references.
pub fn spec_for_property(property_name: &str) -> Option<&'static KindSpec> {
    return KINDS.iter().find(|k| return k.property_name == property_name);
}
