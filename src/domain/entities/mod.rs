pub mod alert;
pub mod cart_checkout;
pub mod ledger;
pub mod overdue_registry;
pub mod parking_permit;

pub use alert::Alert;
pub use cart_checkout::{CartCheckout, CheckoutContact};
pub use ledger::{LedgerPolicy, ResourceLedger};
pub use overdue_registry::OverdueRegistry;
pub use parking_permit::ParkingPermit;
