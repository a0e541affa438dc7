pub mod classify;
pub mod extract;
pub mod locator;
pub mod session;
pub mod timing;
