use medgrid_core::OccupancyEvent;

/// Outbound side of the notification channel as seen by state-changing code.
///
/// Publishing is fire-and-forget: it never blocks and never fails the caller.
/// The return value is the number of sessions the events were handed to.
pub trait Publisher: Send + Sync {
    fn publish(&self, hospital_id: &str, events: Vec<OccupancyEvent>) -> usize;
}
