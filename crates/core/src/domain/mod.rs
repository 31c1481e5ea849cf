pub mod knowledge;
pub mod memory;
pub mod reply;
pub mod session;
pub mod transfer;
