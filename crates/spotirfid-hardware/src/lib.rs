//! Reader-chip abstraction layer for the SpotiRFID reader.
//!
//! This crate defines the boundary between the tag-protocol engine and the
//! board it runs on. The engine never touches SPI lines or GPIO directly; it
//! drives a [`PiccTransport`] (the contactless reader chip) and a
//! [`StatusIndicator`] (the board LED).
//!
//! # Design Philosophy
//!
//! - **Async-first**: All chip exchanges are asynchronous using native
//!   `async fn` in traits (Rust 1.90 + Edition 2024 RPITIT).
//! - **Primitive-level**: The transport exposes ISO 14443A primitives
//!   (request, select, authenticate, read, write, halt). Sequencing them
//!   correctly is the job of the session layer above.
//! - **Error-aware**: Every exchange returns [`Result<T>`][error::Result]
//!   with a [`TransportError`] describing what the chip reported.
//!
//! # Example
//!
//! ```no_run
//! use spotirfid_hardware::{PiccTransport, PiccType, RequestMode, Result};
//!
//! async fn card_type<T: PiccTransport>(chip: &mut T) -> Result<Option<PiccType>> {
//!     if !chip.request(RequestMode::Idle).await? {
//!         return Ok(None);
//!     }
//!     let selection = chip.select().await?;
//!     Ok(Some(PiccType::from_sak(selection.sak)))
//! }
//! ```
//!
//! # Mock Implementations
//!
//! The [`mock`] module provides a simulated chip with Ultralight and Classic
//! tags, fault injection and an operation log, plus a recording indicator.

pub mod error;
pub mod mock;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{Result, TransportError};
pub use traits::{PiccTransport, PiccType, RequestMode, Selection, StatusIndicator};
pub use types::ReaderInfo;
