#![allow(non_snake_case)]

use async_trait::async_trait;
use mockall::*;

use anchorage_core::*;

mock! {
    pub Ledger {
        pub fn _latest_time(&self) -> ChainResult<BlockPointer>;

        pub fn _read(&self, cursor: Option<Cursor>) -> ChainResult<ReadResult>;

        pub fn _get_range(&self, from_block: u64, to_block: u64) -> ChainResult<Vec<AnchorRecord>>;

        pub fn _first_valid_record(
            &self,
            candidates: Vec<AnchorRecord>,
        ) -> ChainResult<Option<AnchorRecord>>;

        pub fn _block_number_by_hash(&self, hash: H256) -> ChainResult<Option<u64>>;
    }
}

impl std::fmt::Debug for MockLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockLedger")
    }
}

#[async_trait]
impl LedgerReader for MockLedger {
    async fn latest_time(&self) -> ChainResult<BlockPointer> {
        self._latest_time()
    }

    async fn read(&self, cursor: Option<Cursor>) -> ChainResult<ReadResult> {
        self._read(cursor)
    }

    async fn get_range(
        &self,
        from_block: u64,
        to_block: u64,
        _opts: GetRangeOptions,
    ) -> ChainResult<Vec<AnchorRecord>> {
        self._get_range(from_block, to_block)
    }

    async fn first_valid_record(
        &self,
        candidates: &[AnchorRecord],
    ) -> ChainResult<Option<AnchorRecord>> {
        self._first_valid_record(candidates.to_vec())
    }

    async fn block_number_by_hash(&self, hash: H256) -> ChainResult<Option<u64>> {
        self._block_number_by_hash(hash)
    }
}

mock! {
    pub LogSource {
        pub fn _latest_block(&self) -> ChainResult<BlockPointer>;

        pub fn _block_hash(&self, height: u64) -> ChainResult<Option<H256>>;

        pub fn _block_timestamp(&self, height: u64) -> ChainResult<Option<u64>>;

        pub fn _block_number_by_hash(&self, hash: H256) -> ChainResult<Option<u64>>;

        pub fn _fetch_logs(&self, from_block: u64, to_block: u64) -> ChainResult<Vec<AnchorLog>>;

        pub fn _code_exists_at(&self, height: u64) -> ChainResult<bool>;
    }
}

impl std::fmt::Debug for MockLogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockLogSource")
    }
}

#[async_trait]
impl AnchorLogSource for MockLogSource {
    async fn latest_block(&self) -> ChainResult<BlockPointer> {
        self._latest_block()
    }

    async fn block_hash(&self, height: u64) -> ChainResult<Option<H256>> {
        self._block_hash(height)
    }

    async fn block_timestamp(&self, height: u64) -> ChainResult<Option<u64>> {
        self._block_timestamp(height)
    }

    async fn block_number_by_hash(&self, hash: H256) -> ChainResult<Option<u64>> {
        self._block_number_by_hash(hash)
    }

    async fn fetch_logs(
        &self,
        range: std::ops::RangeInclusive<u64>,
        _filter: Option<&LogFilter>,
    ) -> ChainResult<Vec<AnchorLog>> {
        self._fetch_logs(*range.start(), *range.end())
    }

    async fn code_exists_at(&self, height: u64) -> ChainResult<bool> {
        self._code_exists_at(height)
    }
}

mock! {
    pub Cas {
        pub fn _read(&self, uri: String, max_size_bytes: u64) -> eyre::Result<FetchResult>;

        pub fn _write(&self, content: Vec<u8>) -> eyre::Result<String>;
    }
}

impl std::fmt::Debug for MockCas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockCas")
    }
}

#[async_trait]
impl ContentAddressableStore for MockCas {
    async fn read(
        &self,
        uri: &str,
        max_size_bytes: u64,
        _timeout: std::time::Duration,
    ) -> eyre::Result<FetchResult> {
        self._read(uri.to_owned(), max_size_bytes)
    }

    async fn write(&self, content: &[u8]) -> eyre::Result<String> {
        self._write(content.to_vec())
    }
}

/// An event sink that records everything it is handed.
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    events: std::sync::Mutex<Vec<ObserverEvent>>,
}

impl RecordingEmitter {
    /// Everything emitted so far.
    pub fn events(&self) -> Vec<ObserverEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventEmitter for RecordingEmitter {
    fn emit(&self, event: ObserverEvent) {
        self.events.lock().unwrap().push(event);
    }
}
