pub mod allocation;
pub mod proration;
pub mod rag;
