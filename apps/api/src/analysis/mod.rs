pub mod instructions;
pub mod listing;
pub mod pipeline;
pub mod preview;
pub mod service;
