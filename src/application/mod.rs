//! Application layer: the customer-facing ledger service and the background
//! reconciliation poller that settles pending orders against the accrual
//! service.

pub mod ledger;
pub mod poller;
