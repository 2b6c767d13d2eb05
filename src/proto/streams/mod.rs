mod flow_control;
mod store;

pub use flow_control::FlowControl;
pub use store::Store;
