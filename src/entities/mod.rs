// Entity Models
//
// Typed records for the four logical collections plus the embedded
// expense line item. Fields a caller may omit are Options with
// skip_serializing_if, so a partial record round-trips as a partial
// document and the gateway's default-fill stays visible in storage.

pub mod driver;
pub mod expense;
pub mod settings;
pub mod trip;
pub mod unit;

pub use driver::Driver;
pub use expense::Expense;
pub use settings::Settings;
pub use trip::Trip;
pub use unit::Unit;
