//! Entity trait: identity without a command/event lifecycle.
//!
//! Reference data such as budget heads, scoring criteria and email templates
//! are plain entities edited in place.

pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}
