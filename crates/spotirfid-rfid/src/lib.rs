//! Card session and payload storage for the SpotiRFID reader.
//!
//! This crate sits between the reader transport and the workflow:
//!
//! - [`CardSession`] detects, classifies and releases cards, and waits for
//!   them to leave the field.
//! - [`StorageLayout`] maps the logical payload onto each family's physical
//!   pages or blocks.
//! - [`StorageCodec`] reads, writes and wipes payloads through a session.
//!
//! # Example
//!
//! ```
//! use spotirfid_core::{SessionTiming, TagPayload};
//! use spotirfid_hardware::mock::{MockPicc, SimulatedTag};
//! use spotirfid_rfid::{CardSession, StorageCodec};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let (chip, handle) = MockPicc::new();
//!     let mut session = CardSession::new(chip, SessionTiming::default());
//!     session.init().await.unwrap();
//!     handle.present(SimulatedTag::classic_1k(vec![0x04, 0xA1, 0xB2, 0xC3]));
//!
//!     let card = session.detect_and_select().await.unwrap();
//!     let codec = StorageCodec::default();
//!     let value = TagPayload::new("spotify:album:999").unwrap();
//!
//!     codec.write(&mut session, card.family, &value).await.unwrap();
//!     assert_eq!(codec.read(&mut session, card.family).await, value);
//! }
//! ```

pub mod codec;
pub mod error;
pub mod layout;
pub mod session;

pub use codec::{RawRead, StorageCodec, decode, encode};
pub use error::{StorageFailure, WriteFailure};
pub use layout::{PhysicalUnit, StorageLayout};
pub use session::{ActiveCard, CardSession, RemovalOutcome};
