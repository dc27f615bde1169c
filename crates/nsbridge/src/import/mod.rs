//! Import interception
//!
//! - [`DottedName`]: a parsed dotted module name
//! - [`ImportCall`]: validated arguments of one import request
//! - [`RootModule`]: the module exposed under the reserved root name
//! - [`ImportDispatcher`]: the replacement import entry point

mod args;
mod dispatcher;
mod dotted;
mod root_module;

pub use args::ImportCall;
pub use dispatcher::ImportDispatcher;
pub use dotted::DottedName;
pub use root_module::RootModule;
