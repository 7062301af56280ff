//! Application services: the operations the HTTP layer calls once the
//! caller has been authenticated and authorized.

pub mod checkout;
pub mod reports;

pub use checkout::CheckoutProcessor;
pub use reports::ReportService;
