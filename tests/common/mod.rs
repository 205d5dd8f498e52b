//! In-memory collaborators shared by the integration tests

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use solana_sdk::{
    account::Account,
    hash::Hash,
    program_option::COption,
    program_pack::Pack,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::Transaction,
};
use spl_token_2022::extension::{
    metadata_pointer::MetadataPointer, BaseStateWithExtensionsMut, ExtensionType, StateWithExtensionsMut,
};
use spl_token_2022::state::{Account as TokenAccount, AccountState, Mint};
use spl_token_metadata_interface::state::TokenMetadata;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use launchpad_gateway::services::blockchain::{ChainRpc, TransactionStatus};
use launchpad_gateway::services::features::FeeThresholds;
use launchpad_gateway::services::raydium::{CpmmFeeConfig, CpmmProgram, PoolConfigSource};
use launchpad_gateway::services::storage::{FileUpload, MetadataStore, StorageError};
use launchpad_gateway::services::wallet::{SigningRequest, WalletError, WalletSigner};
use launchpad_gateway::services::workflow::DriverSettings;
use launchpad_gateway::services::{Launchpad, LaunchpadSettings};

pub const LAST_VALID_BLOCK_HEIGHT: u64 = 100;
pub const SOL: u64 = 1_000_000_000;

/// Scriptable chain: accounts and balances are plain maps, statuses and send
/// errors are consumed in order.
#[derive(Default)]
pub struct MockChain {
    pub accounts: Mutex<HashMap<Pubkey, Account>>,
    pub balances: Mutex<HashMap<Pubkey, u64>>,
    /// Errors returned by the next sends, one per call
    pub send_errors: Mutex<VecDeque<String>>,
    /// Statuses returned by the next polls; `default_status` once empty
    pub statuses: Mutex<VecDeque<TransactionStatus>>,
    pub default_status: Mutex<Option<TransactionStatus>>,
    pub block_height: AtomicU64,
    pub sent: Mutex<Vec<Transaction>>,
    pub send_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub account_reads: AtomicUsize,
    pub fail_reads: Mutex<Option<String>>,
}

impl MockChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_balance(&self, pubkey: &Pubkey, lamports: u64) {
        self.balances.lock().unwrap().insert(*pubkey, lamports);
    }

    pub fn put_account(&self, pubkey: &Pubkey, account: Account) {
        self.accounts.lock().unwrap().insert(*pubkey, account);
    }

    pub fn script_statuses(&self, statuses: impl IntoIterator<Item = TransactionStatus>) {
        self.statuses.lock().unwrap().extend(statuses);
    }

    pub fn set_default_status(&self, status: TransactionStatus) {
        *self.default_status.lock().unwrap() = Some(status);
    }

    pub fn script_send_errors(&self, errors: impl IntoIterator<Item = &'static str>) {
        self.send_errors
            .lock()
            .unwrap()
            .extend(errors.into_iter().map(String::from));
    }

    pub fn sends(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    pub fn sent_transactions(&self) -> Vec<Transaction> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainRpc for MockChain {
    async fn latest_blockhash(&self) -> Result<(Hash, u64)> {
        Ok((Hash::new_unique(), LAST_VALID_BLOCK_HEIGHT))
    }

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.send_errors.lock().unwrap().pop_front() {
            return Err(anyhow!("{}", error));
        }
        self.sent.lock().unwrap().push(transaction.clone());
        Ok(transaction.signatures[0])
    }

    async fn signature_status(&self, _signature: &Signature) -> Result<TransactionStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.statuses.lock().unwrap().pop_front() {
            return Ok(status);
        }
        Ok(self
            .default_status
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(TransactionStatus::Confirmed(1)))
    }

    async fn block_height(&self) -> Result<u64> {
        Ok(self.block_height.load(Ordering::SeqCst))
    }

    async fn get_account(&self, pubkey: &Pubkey) -> Result<Option<Account>> {
        self.account_reads.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.fail_reads.lock().unwrap().clone() {
            return Err(anyhow!("{}", error));
        }
        Ok(self.accounts.lock().unwrap().get(pubkey).cloned())
    }

    async fn get_balance(&self, pubkey: &Pubkey) -> Result<u64> {
        Ok(self.balances.lock().unwrap().get(pubkey).copied().unwrap_or(0))
    }
}

/// Wallet answering each signing request from a script; approves once the script is empty.
pub struct MockWallet {
    pub keypair: Keypair,
    pub connected: bool,
    pub answers: Mutex<VecDeque<Result<(), WalletError>>>,
    pub requests: Mutex<Vec<SigningRequest>>,
}

impl MockWallet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            keypair: Keypair::new(),
            connected: true,
            answers: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn disconnected() -> Arc<Self> {
        Arc::new(Self {
            keypair: Keypair::new(),
            connected: false,
            answers: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn reject_next(&self) {
        self.answers
            .lock()
            .unwrap()
            .push_back(Err(WalletError::Rejected("User rejected the request.".to_string())));
    }

    pub fn signed_steps(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|request| request.step_name.clone())
            .collect()
    }
}

#[async_trait]
impl WalletSigner for MockWallet {
    fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn sign_transaction(
        &self,
        mut transaction: Transaction,
        request: &SigningRequest,
    ) -> Result<Transaction, WalletError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(answer) = self.answers.lock().unwrap().pop_front() {
            answer?;
        }
        let blockhash = transaction.message.recent_blockhash;
        transaction
            .try_partial_sign(&[&self.keypair], blockhash)
            .map_err(|e| WalletError::Signing(e.to_string()))?;
        Ok(transaction)
    }
}

/// Records uploads and hands out sequential content addresses
#[derive(Default)]
pub struct MockStore {
    pub files: Mutex<Vec<FileUpload>>,
    pub documents: Mutex<Vec<(String, serde_json::Value)>>,
    pub failures: Mutex<VecDeque<StorageError>>,
}

impl MockStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn uploads(&self) -> usize {
        self.files.lock().unwrap().len() + self.documents.lock().unwrap().len()
    }
}

#[async_trait]
impl MetadataStore for MockStore {
    async fn upload_file(&self, file: FileUpload) -> Result<String, StorageError> {
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        let mut files = self.files.lock().unwrap();
        files.push(file);
        Ok(format!("https://ipfs.test/ipfs/image-{}", files.len()))
    }

    async fn upload_json(&self, name: &str, content: &serde_json::Value) -> Result<String, StorageError> {
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        let mut documents = self.documents.lock().unwrap();
        documents.push((name.to_string(), content.clone()));
        Ok(format!("https://ipfs.test/ipfs/metadata-{}", documents.len()))
    }
}

pub struct StaticPoolConfigs(pub Vec<CpmmFeeConfig>);

#[async_trait]
impl PoolConfigSource for StaticPoolConfigs {
    async fn fee_configs(&self) -> Result<Vec<CpmmFeeConfig>> {
        Ok(self.0.clone())
    }
}

/// Serves its configs until switched off, then fails like an unreachable API
pub struct SwitchablePoolConfigs {
    pub configs: Vec<CpmmFeeConfig>,
    pub unavailable: AtomicBool,
}

impl SwitchablePoolConfigs {
    pub fn new(configs: Vec<CpmmFeeConfig>) -> Arc<Self> {
        Arc::new(Self {
            configs,
            unavailable: AtomicBool::new(false),
        })
    }

    pub fn go_offline(&self) {
        self.unavailable.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PoolConfigSource for SwitchablePoolConfigs {
    async fn fee_configs(&self) -> Result<Vec<CpmmFeeConfig>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(anyhow!("error sending request for url (https://api-v3.test/main/cpmm-config)"));
        }
        Ok(self.configs.clone())
    }
}

pub fn fee_config(create_pool_fee: u64) -> CpmmFeeConfig {
    CpmmFeeConfig {
        id: Pubkey::new_unique().to_string(),
        index: 0,
        protocol_fee_rate: 120_000,
        trade_fee_rate: 2_500,
        fund_fee_rate: 40_000,
        create_pool_fee,
    }
}

pub fn cpmm_program() -> CpmmProgram {
    CpmmProgram {
        program_id: Pubkey::new_unique(),
        fee_account: Pubkey::new_unique(),
    }
}

pub fn fast_settings() -> LaunchpadSettings {
    LaunchpadSettings {
        driver: DriverSettings {
            confirm_timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(5),
            compute_unit_price: 1_000,
        },
        thresholds: FeeThresholds {
            launch_min_balance: 50_000_000,
            fee_reserve: 10_000,
        },
        cpmm: cpmm_program(),
        ledger_ttl: Duration::from_secs(3600),
    }
}

pub struct Harness {
    pub chain: Arc<MockChain>,
    pub wallet: Arc<MockWallet>,
    pub store: Arc<MockStore>,
    pub cpmm: CpmmProgram,
    pub launchpad: Launchpad,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_wallet(MockWallet::new())
    }

    pub fn with_wallet(wallet: Arc<MockWallet>) -> Self {
        Self::build(wallet, Arc::new(StaticPoolConfigs(vec![fee_config(150_000_000)])))
    }

    pub fn with_pool_configs(pool_configs: Arc<dyn PoolConfigSource>) -> Self {
        Self::build(MockWallet::new(), pool_configs)
    }

    fn build(wallet: Arc<MockWallet>, pool_configs: Arc<dyn PoolConfigSource>) -> Self {
        let chain = MockChain::new();
        let store = MockStore::new();
        chain.set_balance(&wallet.pubkey(), 2 * SOL);
        let settings = fast_settings();
        let launchpad = Launchpad::new(
            chain.clone(),
            wallet.clone(),
            Some(store.clone() as Arc<dyn MetadataStore>),
            pool_configs,
            settings,
        );
        Self {
            chain,
            wallet,
            store,
            cpmm: settings.cpmm,
            launchpad,
        }
    }

    pub fn payer(&self) -> Pubkey {
        self.wallet.pubkey()
    }

    /// Token-2022 mint with metadata owned by the connected wallet
    pub fn add_token_2022_mint(&self, decimals: u8, uri: &str) -> Pubkey {
        let mint = Pubkey::new_unique();
        let payer = self.payer();
        self.chain.put_account(
            &mint,
            token_2022_mint_account(&mint, Some(payer), Some(payer), decimals, uri),
        );
        mint
    }

    /// Wallet's associated token account for `mint` holding `amount`
    pub fn fund_token_account(&self, mint: &Pubkey, program_id: &Pubkey, amount: u64) -> Pubkey {
        let owner = self.payer();
        let address =
            spl_associated_token_account::get_associated_token_address_with_program_id(&owner, mint, program_id);
        self.chain
            .put_account(&address, token_account(mint, &owner, amount, program_id));
        address
    }
}

pub fn token_2022_mint_account(
    mint: &Pubkey,
    mint_authority: Option<Pubkey>,
    update_authority: Option<Pubkey>,
    decimals: u8,
    uri: &str,
) -> Account {
    let metadata = TokenMetadata {
        update_authority: update_authority.try_into().unwrap(),
        mint: *mint,
        name: "Grid Token".to_string(),
        symbol: "GRID".to_string(),
        uri: uri.to_string(),
        additional_metadata: vec![],
    };

    let base_len =
        ExtensionType::try_calculate_account_len::<Mint>(&[ExtensionType::MetadataPointer]).unwrap();
    let mut data = vec![0u8; base_len + metadata.tlv_size_of().unwrap()];
    {
        let mut state = StateWithExtensionsMut::<Mint>::unpack_uninitialized(&mut data).unwrap();
        let pointer = state.init_extension::<MetadataPointer>(true).unwrap();
        pointer.authority = update_authority.try_into().unwrap();
        pointer.metadata_address = Some(*mint).try_into().unwrap();
        state.base = Mint {
            mint_authority: mint_authority.map(COption::Some).unwrap_or(COption::None),
            supply: 1_000_000_000_000,
            decimals,
            is_initialized: true,
            freeze_authority: COption::None,
        };
        state.pack_base();
        state.init_account_type().unwrap();
        state.init_variable_len_extension(&metadata, false).unwrap();
    }

    Account {
        lamports: 5_000_000,
        data,
        owner: spl_token_2022::id(),
        executable: false,
        rent_epoch: 0,
    }
}

pub fn classic_mint_account(mint_authority: Option<Pubkey>, decimals: u8) -> Account {
    let mut data = vec![0u8; Mint::LEN];
    Mint::pack(
        Mint {
            mint_authority: mint_authority.map(COption::Some).unwrap_or(COption::None),
            supply: 1_000_000,
            decimals,
            is_initialized: true,
            freeze_authority: COption::None,
        },
        &mut data,
    )
    .unwrap();
    Account {
        lamports: 1_461_600,
        data,
        owner: spl_token::id(),
        executable: false,
        rent_epoch: 0,
    }
}

pub fn token_account(mint: &Pubkey, owner: &Pubkey, amount: u64, program_id: &Pubkey) -> Account {
    let mut data = vec![0u8; TokenAccount::LEN];
    TokenAccount::pack(
        TokenAccount {
            mint: *mint,
            owner: *owner,
            amount,
            delegate: COption::None,
            state: AccountState::Initialized,
            is_native: COption::None,
            delegated_amount: 0,
            close_authority: COption::None,
        },
        &mut data,
    )
    .unwrap();
    Account {
        lamports: 2_039_280,
        data,
        owner: *program_id,
        executable: false,
        rent_epoch: 0,
    }
}

pub fn png_upload() -> FileUpload {
    FileUpload {
        bytes: vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a],
        file_name: "logo.png".to_string(),
        content_type: "image/png".to_string(),
    }
}
