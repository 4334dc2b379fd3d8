//! Purchasing domain module (purchase orders and PO numbering).
//!
//! This crate contains business rules for purchase orders, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod order;
pub mod settings;

pub use order::{
    AddLine, Approve, CancelPurchaseOrder, ClosePurchaseOrder, CreatePurchaseOrder, GoodsReceived,
    OrderLine, PurchaseOrder, PurchaseOrderApproved, PurchaseOrderCommand, PurchaseOrderCreated,
    PurchaseOrderEvent, PurchaseOrderId, PurchaseOrderStatus, ReceiveGoods, RemoveLine,
};
pub use settings::{PoNumberAllocation, StandardPoSettings};
