//! Mock reader chip with simulated tags.
//!
//! This module provides a simulated reader chip and field that can be
//! controlled programmatically for testing without physical hardware. Tags
//! keep their memory while outside the field, so a test can write, remove,
//! re-present and read back the same tag.
//!
//! The simulation follows the tag state model of ISO 14443A closely enough
//! for the session handshake to matter:
//!
//! ```text
//! present ─► Idle ──REQA/WUPA──► Ready ──select──► Active ──halt──► Halted
//!                                   ▲                                  │
//!                                   └───────────────WUPA───────────────┘
//! ```
//!
//! A request reaching a tag in Ready or Active goes unanswered and sends it
//! back to Idle, or to Halted if it was woken from there. Polling a tag with
//! repeated wake-ups therefore needs a select and halt between polls.
//!
//! Classic tags enforce authentication per block: access to block N is
//! granted only while the most recent successful authentication was for
//! block N.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use spotirfid_core::AuthKey;
use spotirfid_core::constants::{
    BLOCK_SIZE, BLOCKS_PER_SECTOR, LIGHTWEIGHT_BASE_PAGE, PAGE_SIZE, SAK_CLASSIC_1K,
    SAK_ULTRALIGHT,
};

use crate::{
    Result, TransportError,
    traits::{PiccTransport, RequestMode, Selection},
    types::ReaderInfo,
};

/// Page count of an NTAG213.
const ULTRALIGHT_PAGES: usize = 45;

/// Block count of a Classic 1K.
const CLASSIC_1K_BLOCKS: usize = 64;

/// Version register value reported by the mock chip.
const MOCK_FIRMWARE_VERSION: u8 = 0x92;

/// NAK code for an operation the tag refuses.
const NAK_INVALID_OPERATION: u8 = 0x4;

/// NAK code for an out-of-range argument.
const NAK_INVALID_ARGUMENT: u8 = 0x0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Ultralight,
    Classic,
}

/// A tag that can be placed in the mock reader's field.
///
/// # Examples
///
/// ```
/// use spotirfid_hardware::mock::SimulatedTag;
///
/// let tag = SimulatedTag::ultralight(vec![0x04, 0xA1, 0xB2, 0xC3]).with_user_data(b"hello");
/// assert_eq!(&tag.user_data()[..5], b"hello");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedTag {
    uid: Vec<u8>,
    sak: u8,
    kind: TagKind,
    memory: Vec<u8>,
    sector_keys: Vec<AuthKey>,
}

impl SimulatedTag {
    /// An NTAG213-sized Ultralight tag with blank user memory.
    pub fn ultralight(uid: Vec<u8>) -> Self {
        let mut memory = vec![0u8; ULTRALIGHT_PAGES * PAGE_SIZE];
        let uid_len = uid.len().min(2 * PAGE_SIZE);
        memory[..uid_len].copy_from_slice(&uid[..uid_len]);

        Self {
            uid,
            sak: SAK_ULTRALIGHT,
            kind: TagKind::Ultralight,
            memory,
            sector_keys: Vec::new(),
        }
    }

    /// A Classic 1K tag with factory keys and blank data blocks.
    pub fn classic_1k(uid: Vec<u8>) -> Self {
        let mut memory = vec![0u8; CLASSIC_1K_BLOCKS * BLOCK_SIZE];
        let uid_len = uid.len().min(BLOCK_SIZE);
        memory[..uid_len].copy_from_slice(&uid[..uid_len]);

        let sectors = CLASSIC_1K_BLOCKS / BLOCKS_PER_SECTOR as usize;
        for sector in 0..sectors {
            let trailer = (sector * BLOCKS_PER_SECTOR as usize + 3) * BLOCK_SIZE;
            memory[trailer..trailer + 6].copy_from_slice(AuthKey::DEFAULT.as_bytes());
            memory[trailer + 6..trailer + 10].copy_from_slice(&[0xFF, 0x07, 0x80, 0x69]);
            memory[trailer + 10..trailer + 16].copy_from_slice(AuthKey::DEFAULT.as_bytes());
        }

        Self {
            uid,
            sak: SAK_CLASSIC_1K,
            kind: TagKind::Classic,
            memory,
            sector_keys: vec![AuthKey::DEFAULT; sectors],
        }
    }

    /// Override the SAK reported on select (e.g. to simulate unsupported tags).
    pub fn with_sak(mut self, sak: u8) -> Self {
        self.sak = sak;
        self
    }

    /// Use `key` as key A for every sector.
    pub fn with_key(mut self, key: AuthKey) -> Self {
        for sector_key in &mut self.sector_keys {
            *sector_key = key;
        }
        self
    }

    /// Use `key` as key A for one sector.
    pub fn with_sector_key(mut self, sector: usize, key: AuthKey) -> Self {
        if let Some(sector_key) = self.sector_keys.get_mut(sector) {
            *sector_key = key;
        }
        self
    }

    /// Store raw bytes at the start of user memory (page 4 or block 4).
    pub fn with_user_data(mut self, bytes: &[u8]) -> Self {
        let start = self.user_offset();
        let end = (start + bytes.len()).min(self.memory.len());
        self.memory[start..end].copy_from_slice(&bytes[..end - start]);
        self
    }

    pub fn uid(&self) -> &[u8] {
        &self.uid
    }

    pub fn sak(&self) -> u8 {
        self.sak
    }

    /// Full memory image.
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// Memory from the first user page/block onwards.
    pub fn user_data(&self) -> &[u8] {
        &self.memory[self.user_offset()..]
    }

    fn user_offset(&self) -> usize {
        match self.kind {
            TagKind::Ultralight => LIGHTWEIGHT_BASE_PAGE as usize * PAGE_SIZE,
            TagKind::Classic => BLOCKS_PER_SECTOR as usize * BLOCK_SIZE,
        }
    }

    fn units(&self) -> usize {
        match self.kind {
            TagKind::Ultralight => self.memory.len() / PAGE_SIZE,
            TagKind::Classic => self.memory.len() / BLOCK_SIZE,
        }
    }

    fn is_sector_trailer(block: u8) -> bool {
        block % BLOCKS_PER_SECTOR == BLOCKS_PER_SECTOR - 1
    }

    fn sector_key(&self, block: u8) -> Option<&AuthKey> {
        self.sector_keys
            .get((block / BLOCKS_PER_SECTOR) as usize)
    }
}

/// Operation recorded by the mock chip, in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportOp {
    Init,
    Reset,
    Request(RequestMode),
    Select,
    Authenticate { block: u8 },
    Read { address: u8 },
    WriteBlock { address: u8 },
    WritePage { page: u8 },
    Halt,
    StopCrypto,
}

impl TransportOp {
    /// Whether this operation modifies tag memory.
    pub fn is_write(&self) -> bool {
        matches!(self, Self::WriteBlock { .. } | Self::WritePage { .. })
    }
}

/// Operation kinds that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOp {
    Authenticate,
    Read,
    Write,
}

/// A persistent failure injected for one operation at one address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub op: FaultOp,
    pub address: u8,
    pub error: TransportError,
}

impl Fault {
    /// Authentication of `block` times out.
    pub fn authenticate(block: u8) -> Self {
        Self {
            op: FaultOp::Authenticate,
            address: block,
            error: TransportError::Timeout,
        }
    }

    /// Reads at `address` time out.
    pub fn read(address: u8) -> Self {
        Self {
            op: FaultOp::Read,
            address,
            error: TransportError::Timeout,
        }
    }

    /// Writes at `address` (block or page) are NAKed.
    pub fn write(address: u8) -> Self {
        Self {
            op: FaultOp::Write,
            address,
            error: TransportError::nack(NAK_INVALID_OPERATION),
        }
    }

    /// Replace the error returned by this fault.
    pub fn with_error(mut self, error: TransportError) -> Self {
        self.error = error;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum TagState {
    #[default]
    Idle,
    Ready,
    Active,
    Halted,
}

#[derive(Debug, Default)]
struct Field {
    tag: Option<SimulatedTag>,
    state: TagState,
    /// The tag left HALT through a wake-up and returns there on a protocol error.
    woken: bool,
    authenticated_block: Option<u8>,
    initialized: bool,
    faults: Vec<Fault>,
    operations: Vec<TransportOp>,
}

impl Field {
    fn fault(&self, op: FaultOp, address: u8) -> Option<TransportError> {
        self.faults
            .iter()
            .find(|f| f.op == op && f.address == address)
            .map(|f| f.error.clone())
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(TransportError::NotInitialized)
        }
    }

    /// The selected tag, or a timeout if nothing is active.
    fn active_tag(&mut self) -> Result<&mut SimulatedTag> {
        if self.state != TagState::Active {
            return Err(TransportError::Timeout);
        }
        self.tag.as_mut().ok_or(TransportError::Timeout)
    }

    /// Unexpected command or failed authentication: back to IDLE, or to
    /// HALT for a tag that was woken from it.
    fn fall_back(&mut self) {
        self.state = if self.woken {
            TagState::Halted
        } else {
            TagState::Idle
        };
        self.authenticated_block = None;
    }
}

fn lock(field: &Mutex<Field>) -> MutexGuard<'_, Field> {
    field.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock reader chip for testing and development.
///
/// # Examples
///
/// ```
/// use spotirfid_hardware::mock::{MockPicc, SimulatedTag};
/// use spotirfid_hardware::{PiccTransport, RequestMode};
///
/// #[tokio::main]
/// async fn main() -> spotirfid_hardware::Result<()> {
///     let (mut chip, handle) = MockPicc::new();
///     chip.init().await?;
///
///     handle.present(SimulatedTag::ultralight(vec![0x04, 0xA1, 0xB2, 0xC3]));
///
///     assert!(chip.request(RequestMode::Idle).await?);
///     let selection = chip.select().await?;
///     assert_eq!(selection.uid, vec![0x04, 0xA1, 0xB2, 0xC3]);
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockPicc {
    field: Arc<Mutex<Field>>,
    name: String,
}

impl MockPicc {
    /// Create a new mock chip with the default name.
    ///
    /// Returns a tuple of (MockPicc, MockPiccHandle) where the handle
    /// controls the field: presenting and removing tags, injecting faults
    /// and inspecting the operation log.
    pub fn new() -> (Self, MockPiccHandle) {
        Self::with_name("Mock MFRC522".to_string())
    }

    /// Create a new mock chip with a custom name.
    pub fn with_name(name: String) -> (Self, MockPiccHandle) {
        let field = Arc::new(Mutex::new(Field::default()));
        let handle = MockPiccHandle {
            field: Arc::clone(&field),
        };
        (Self { field, name }, handle)
    }

    fn field(&self) -> MutexGuard<'_, Field> {
        lock(&self.field)
    }
}

impl Default for MockPicc {
    fn default() -> Self {
        Self::new().0
    }
}

impl PiccTransport for MockPicc {
    async fn init(&mut self) -> Result<()> {
        let mut field = self.field();
        field.operations.push(TransportOp::Init);
        field.initialized = true;
        Ok(())
    }

    async fn reset(&mut self) -> Result<()> {
        let mut field = self.field();
        field.operations.push(TransportOp::Reset);
        field.initialized = true;
        field.authenticated_block = None;
        Ok(())
    }

    async fn reader_info(&self) -> Result<ReaderInfo> {
        Ok(ReaderInfo::new(self.name.clone(), vec!["ISO14443A".to_string()])
            .with_firmware_version(MOCK_FIRMWARE_VERSION))
    }

    async fn request(&mut self, mode: RequestMode) -> Result<bool> {
        let mut field = self.field();
        field.operations.push(TransportOp::Request(mode));
        field.ensure_initialized()?;

        if field.tag.is_none() {
            return Ok(false);
        }

        let answered = match (mode, field.state) {
            (_, TagState::Idle) => {
                field.woken = false;
                true
            }
            (RequestMode::Wake, TagState::Halted) => {
                field.woken = true;
                true
            }
            (RequestMode::Idle, TagState::Halted) => false,
            // A request in READY or ACTIVE is not answered and sends the tag back.
            (_, TagState::Ready | TagState::Active) => {
                field.fall_back();
                false
            }
        };
        field.authenticated_block = None;
        if answered {
            field.state = TagState::Ready;
        }
        Ok(answered)
    }

    async fn select(&mut self) -> Result<Selection> {
        let mut field = self.field();
        field.operations.push(TransportOp::Select);
        field.ensure_initialized()?;

        if field.state != TagState::Ready {
            return Err(TransportError::Timeout);
        }
        let selection = match &field.tag {
            Some(tag) => Selection {
                uid: tag.uid.clone(),
                sak: tag.sak,
            },
            None => return Err(TransportError::Timeout),
        };
        field.state = TagState::Active;
        Ok(selection)
    }

    async fn authenticate(&mut self, block: u8, key: &AuthKey, uid: &[u8]) -> Result<()> {
        let mut field = self.field();
        field.operations.push(TransportOp::Authenticate { block });
        field.ensure_initialized()?;

        if let Some(error) = field.fault(FaultOp::Authenticate, block) {
            field.fall_back();
            return Err(error);
        }

        let tag = field.active_tag()?;
        let accepted = tag.kind == TagKind::Classic
            && (block as usize) < tag.units()
            && tag.uid.starts_with(uid)
            && tag.sector_key(block) == Some(key);

        if accepted {
            field.authenticated_block = Some(block);
            Ok(())
        } else {
            field.fall_back();
            Err(TransportError::Timeout)
        }
    }

    async fn read_block(&mut self, address: u8) -> Result<[u8; BLOCK_SIZE]> {
        let mut field = self.field();
        field.operations.push(TransportOp::Read { address });
        field.ensure_initialized()?;

        if let Some(error) = field.fault(FaultOp::Read, address) {
            return Err(error);
        }

        let authenticated = field.authenticated_block;
        let tag = field.active_tag()?;
        let mut out = [0u8; BLOCK_SIZE];
        match tag.kind {
            TagKind::Ultralight => {
                let pages = tag.units();
                if address as usize >= pages {
                    return Err(TransportError::nack(NAK_INVALID_ARGUMENT));
                }
                // Reads past the last page roll over to page 0.
                for (i, chunk) in out.chunks_mut(PAGE_SIZE).enumerate() {
                    let page = (address as usize + i) % pages;
                    let start = page * PAGE_SIZE;
                    chunk.copy_from_slice(&tag.memory[start..start + PAGE_SIZE]);
                }
            }
            TagKind::Classic => {
                if (address as usize) >= tag.units() || authenticated != Some(address) {
                    return Err(TransportError::nack(NAK_INVALID_OPERATION));
                }
                let start = address as usize * BLOCK_SIZE;
                out.copy_from_slice(&tag.memory[start..start + BLOCK_SIZE]);
            }
        }
        Ok(out)
    }

    async fn write_block(&mut self, address: u8, data: &[u8; BLOCK_SIZE]) -> Result<()> {
        let mut field = self.field();
        field.operations.push(TransportOp::WriteBlock { address });
        field.ensure_initialized()?;

        if let Some(error) = field.fault(FaultOp::Write, address) {
            return Err(error);
        }

        let authenticated = field.authenticated_block;
        let tag = field.active_tag()?;
        if tag.kind != TagKind::Classic {
            return Err(TransportError::unsupported("write_block"));
        }
        if address == 0
            || SimulatedTag::is_sector_trailer(address)
            || (address as usize) >= tag.units()
            || authenticated != Some(address)
        {
            return Err(TransportError::nack(NAK_INVALID_OPERATION));
        }

        let start = address as usize * BLOCK_SIZE;
        tag.memory[start..start + BLOCK_SIZE].copy_from_slice(data);
        Ok(())
    }

    async fn write_page(&mut self, page: u8, data: &[u8; PAGE_SIZE]) -> Result<()> {
        let mut field = self.field();
        field.operations.push(TransportOp::WritePage { page });
        field.ensure_initialized()?;

        if let Some(error) = field.fault(FaultOp::Write, page) {
            return Err(error);
        }

        let tag = field.active_tag()?;
        if tag.kind != TagKind::Ultralight {
            return Err(TransportError::unsupported("write_page"));
        }
        if page < LIGHTWEIGHT_BASE_PAGE || (page as usize) >= tag.units() {
            return Err(TransportError::nack(NAK_INVALID_ARGUMENT));
        }

        let start = page as usize * PAGE_SIZE;
        tag.memory[start..start + PAGE_SIZE].copy_from_slice(data);
        Ok(())
    }

    async fn halt(&mut self) -> Result<()> {
        let mut field = self.field();
        field.operations.push(TransportOp::Halt);
        field.ensure_initialized()?;

        // HLTA has no answer; a silent card counts as success.
        if field.state == TagState::Active {
            field.state = TagState::Halted;
        }
        field.authenticated_block = None;
        Ok(())
    }

    async fn stop_crypto(&mut self) -> Result<()> {
        let mut field = self.field();
        field.operations.push(TransportOp::StopCrypto);
        field.authenticated_block = None;
        Ok(())
    }
}

/// Handle for controlling a mock reader's field.
///
/// Clones share the same field, so a handle can be moved into a spawned
/// task that removes or re-presents a tag while the reader is polling.
#[derive(Debug, Clone)]
pub struct MockPiccHandle {
    field: Arc<Mutex<Field>>,
}

impl MockPiccHandle {
    /// Place a tag in the field. It starts in the IDLE state.
    ///
    /// Any tag already in the field is replaced.
    pub fn present(&self, tag: SimulatedTag) {
        let mut field = lock(&self.field);
        field.tag = Some(tag);
        field.state = TagState::Idle;
        field.woken = false;
        field.authenticated_block = None;
    }

    /// Take the tag out of the field, returning it with its memory.
    pub fn remove(&self) -> Option<SimulatedTag> {
        let mut field = lock(&self.field);
        field.state = TagState::Idle;
        field.woken = false;
        field.authenticated_block = None;
        field.tag.take()
    }

    /// Snapshot of the tag currently in the field.
    pub fn tag(&self) -> Option<SimulatedTag> {
        lock(&self.field).tag.clone()
    }

    pub fn is_card_in_field(&self) -> bool {
        lock(&self.field).tag.is_some()
    }

    /// Whether the tag in the field is halted.
    pub fn is_halted(&self) -> bool {
        lock(&self.field).state == TagState::Halted
    }

    pub fn inject_fault(&self, fault: Fault) {
        lock(&self.field).faults.push(fault);
    }

    pub fn clear_faults(&self) {
        lock(&self.field).faults.clear();
    }

    /// Operations issued to the chip so far.
    pub fn operations(&self) -> Vec<TransportOp> {
        lock(&self.field).operations.clone()
    }

    pub fn clear_operations(&self) {
        lock(&self.field).operations.clear();
    }

    /// Number of memory writes issued to the chip so far.
    pub fn write_count(&self) -> usize {
        lock(&self.field)
            .operations
            .iter()
            .filter(|op| op.is_write())
            .count()
    }
}
