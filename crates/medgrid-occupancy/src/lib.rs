//! Ward occupancy for MedGrid.
//!
//! [`OccupancyManager`] is the single authority over bed/patient occupancy:
//! admission, discharge and transfer are each committed as one conditional
//! batch against the store, and every committed change is announced through a
//! [`medgrid_notifications::Publisher`]. [`WardService`] sets up departments
//! and beds; [`BillingService`] runs the bill status lifecycle.

pub mod billing;
pub mod error;
pub mod manager;
mod records;
pub mod requests;
pub mod ward;

pub use billing::BillingService;
pub use error::{OccupancyError, Result};
pub use manager::OccupancyManager;
pub use requests::{AdmitRequest, BedStatusUpdate, BillStatusUpdate, TransferRequest};
pub use ward::WardService;
