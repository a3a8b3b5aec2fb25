use super::definition::FlowDefinition;
use crate::error::FlowConversionError;

/// A trait for custom data models that can be converted into a nagare `FlowDefinition`.
///
/// This is the extension point that keeps nagare format-agnostic. By implementing
/// this trait on your own editor or storage structs, you provide a translation layer
/// that lets the compiler process your graph format.
///
/// # Example
///
/// ```rust,no_run
/// use nagare::prelude::*;
/// use nagare::error::FlowConversionError;
///
/// struct MyNode { id: String, kind: String }
/// struct MyLink { from: (String, String), to: (String, String) }
/// struct MyGraph { nodes: Vec<MyNode>, links: Vec<MyLink> }
///
/// impl IntoFlow for MyGraph {
///     fn into_flow(self) -> std::result::Result<FlowDefinition, FlowConversionError> {
///         let mut flow = FlowDefinition::new("main");
///         for node in self.nodes {
///             flow.nodes.push(FlowNodeDefinition::new(&node.id, &node.kind));
///         }
///         for link in self.links {
///             flow.edges.push(FlowEdgeDefinition::new(
///                 &link.from.0, &link.from.1, &link.to.0, &link.to.1,
///             ));
///         }
///         Ok(flow)
///     }
/// }
/// ```
pub trait IntoFlow {
    /// Consumes the object and converts it into a nagare flow.
    fn into_flow(self) -> Result<FlowDefinition, FlowConversionError>;
}

impl IntoFlow for FlowDefinition {
    fn into_flow(self) -> Result<FlowDefinition, FlowConversionError> {
        Ok(self)
    }
}
