//! Enrollment coordination for the Ridgeline biometric core.
//!
//! The [`EnrollmentCoordinator`] is the public face of the core: callers
//! start enrollments against addressed devices, observe progress through
//! handles and status queries, cancel cooperatively, and collect finalized
//! results. Each enrollment runs on its own driver task; enrollments on
//! distinct devices proceed in full parallel, while the claim registry
//! rejects a second enrollment against a device that is already in use.
//!
//! # Examples
//!
//! ```
//! use ridgeline_coordinator::EnrollmentCoordinator;
//! use ridgeline_core::{DeviceAddress, EnrollmentStatus, RequestId};
//! use ridgeline_transport::MockTransportFactory;
//!
//! #[tokio::main]
//! async fn main() -> ridgeline_core::Result<()> {
//!     let (factory, device) = MockTransportFactory::new();
//!     let coordinator = EnrollmentCoordinator::new(factory);
//!
//!     // Script a device that produces two good captures.
//!     device.queue_capture(vec![1, 2, 3], 90).await?;
//!     device.queue_capture(vec![4, 5, 6], 85).await?;
//!
//!     let request_id = RequestId::new("req-1")?;
//!     let mut handle = coordinator.start_enrollment(
//!         request_id.clone(),
//!         DeviceAddress::new("dev-0")?,
//!         2,
//!     )?;
//!
//!     assert_eq!(handle.wait_terminal().await, EnrollmentStatus::Complete);
//!
//!     let result = coordinator.get_result(&request_id)?;
//!     assert_eq!(result.sample_count, 2);
//!     Ok(())
//! }
//! ```

pub mod coordinator;
pub mod handle;

pub use coordinator::EnrollmentCoordinator;
pub use handle::EnrollmentHandle;

// The event and result types callers interact with live one layer down;
// re-export them so the coordinator crate is self-sufficient to depend on.
pub use ridgeline_enroll::{EnrollmentConfig, EnrollmentEvent, EnrollmentResult};
