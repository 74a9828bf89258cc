//! Chain access for the scripts: deployments, transactions, reads and block
//! polling. Everything that mutates state goes through the deployer account
//! and is awaited to a receipt before the next step runs.

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolCall;
use alloy::transports::http::{Client, Http};
use alloy::transports::Transport;
use anyhow::{Context, Result};
use std::marker::PhantomData;
use tokio::time::{sleep, Duration};
use tracing::{debug, info};
use url::Url;

use crate::error::ChainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deployment {
    pub address: Address,
    pub tx_hash: B256,
    pub block_number: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxOutcome {
    pub tx_hash: B256,
    pub block_number: u64,
}

#[allow(async_fn_in_trait)]
pub trait ChainClient {
    /// Account that signs every transaction.
    fn deployer(&self) -> Address;

    async fn deploy(&self, code: Bytes) -> Result<Deployment>;

    async fn transact(&self, to: Address, calldata: Bytes) -> Result<TxOutcome>;

    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes>;

    async fn block_number(&self) -> Result<u64>;
}

/// [`ChainClient`] over an alloy provider that signs with a local key.
pub struct RpcChain<P, T> {
    provider: P,
    deployer: Address,
    _transport: PhantomData<T>,
}

impl<P, T> RpcChain<P, T>
where
    T: Transport + Clone,
    P: Provider<T>,
{
    pub fn new(provider: P, deployer: Address) -> Self {
        Self {
            provider,
            deployer,
            _transport: PhantomData,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    async fn submit(&self, tx: TransactionRequest) -> Result<(B256, u64, Option<Address>)> {
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .context("failed to send transaction")?;
        let tx_hash = *pending.tx_hash();
        debug!(tx = %tx_hash, "⏳ Waiting for receipt");

        let receipt = pending
            .get_receipt()
            .await
            .with_context(|| format!("failed to fetch receipt for {tx_hash}"))?;
        if !receipt.status() {
            return Err(ChainError::Reverted { tx_hash }.into());
        }
        let block_number = receipt
            .block_number
            .ok_or(ChainError::MissingBlockNumber { tx_hash })?;
        Ok((tx_hash, block_number, receipt.contract_address))
    }
}

/// Connects to `rpc_url` with recommended fillers and `signer` as the wallet.
pub async fn connect(
    rpc_url: Url,
    signer: PrivateKeySigner,
) -> Result<RpcChain<impl Provider<Http<Client>> + Clone, Http<Client>>> {
    let deployer = signer.address();
    let provider = ProviderBuilder::new()
        .with_recommended_fillers()
        .wallet(EthereumWallet::from(signer))
        .on_http(rpc_url.clone());

    let chain_id = provider
        .get_chain_id()
        .await
        .with_context(|| format!("failed to reach RPC at {rpc_url}"))?;
    info!(chain_id, deployer = %deployer, "🔗 Connected");

    Ok(RpcChain::new(provider, deployer))
}

impl<P, T> ChainClient for RpcChain<P, T>
where
    T: Transport + Clone,
    P: Provider<T>,
{
    fn deployer(&self) -> Address {
        self.deployer
    }

    async fn deploy(&self, code: Bytes) -> Result<Deployment> {
        let tx = TransactionRequest::default().with_deploy_code(code);
        let (tx_hash, block_number, address) = self.submit(tx).await?;
        let address = address.ok_or(ChainError::MissingContractAddress { tx_hash })?;
        Ok(Deployment {
            address,
            tx_hash,
            block_number,
        })
    }

    async fn transact(&self, to: Address, calldata: Bytes) -> Result<TxOutcome> {
        let tx = TransactionRequest::default().with_to(to).with_input(calldata);
        let (tx_hash, block_number, _) = self.submit(tx).await?;
        Ok(TxOutcome {
            tx_hash,
            block_number,
        })
    }

    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes> {
        let tx = TransactionRequest::default().with_to(to).with_input(calldata);
        self.provider
            .call(&tx)
            .await
            .with_context(|| format!("eth_call to {to} failed"))
    }

    async fn block_number(&self) -> Result<u64> {
        self.provider
            .get_block_number()
            .await
            .context("failed to fetch block number")
    }
}

/// Typed read-only call.
pub async fn read<C, S>(chain: &C, to: Address, call: S) -> Result<S::Return>
where
    C: ChainClient,
    S: SolCall,
{
    let data = chain.call(to, call.abi_encode().into()).await?;
    S::abi_decode_returns(&data, true)
        .with_context(|| format!("failed to decode result of {}", S::SIGNATURE))
}

/// Typed state-changing call, awaited to a successful receipt.
pub async fn write<C, S>(chain: &C, to: Address, call: S) -> Result<TxOutcome>
where
    C: ChainClient,
    S: SolCall,
{
    chain
        .transact(to, call.abi_encode().into())
        .await
        .with_context(|| format!("{} on {to} failed", S::SIGNATURE))
}

/// Polls until the chain reaches `target`, returning the block number seen.
pub async fn wait_for_block<C: ChainClient>(chain: &C, target: u64, poll: Duration) -> Result<u64> {
    loop {
        let current = chain.block_number().await?;
        if current >= target {
            return Ok(current);
        }
        debug!(current, target, "⏳ Waiting for confirmations");
        sleep(poll).await;
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::sync::Mutex;

    /// In-memory chain: each deploy or transaction mines one block and every
    /// block number query advances the head by one.
    #[derive(Default)]
    pub struct FakeChain {
        pub state: Mutex<FakeState>,
    }

    #[derive(Default)]
    pub struct FakeState {
        pub head: u64,
        pub deployed: Vec<Bytes>,
        pub sent: Vec<(Address, Bytes)>,
        pub revert_next: bool,
        pub call_result: Bytes,
    }

    impl FakeChain {
        pub fn deployments(&self) -> usize {
            self.state.lock().unwrap().deployed.len()
        }

        pub fn sent(&self) -> Vec<(Address, Bytes)> {
            self.state.lock().unwrap().sent.clone()
        }

        pub fn head(&self) -> u64 {
            self.state.lock().unwrap().head
        }
    }

    fn hash(n: u64) -> B256 {
        B256::left_padding_from(&n.to_be_bytes())
    }

    impl ChainClient for FakeChain {
        fn deployer(&self) -> Address {
            Address::repeat_byte(0xde)
        }

        async fn deploy(&self, code: Bytes) -> Result<Deployment> {
            let mut state = self.state.lock().unwrap();
            state.head += 1;
            state.deployed.push(code);
            let n = state.deployed.len() as u8;
            Ok(Deployment {
                address: Address::repeat_byte(n),
                tx_hash: hash(state.head),
                block_number: state.head,
            })
        }

        async fn transact(&self, to: Address, calldata: Bytes) -> Result<TxOutcome> {
            let mut state = self.state.lock().unwrap();
            state.head += 1;
            let tx_hash = hash(state.head);
            if std::mem::take(&mut state.revert_next) {
                return Err(ChainError::Reverted { tx_hash }.into());
            }
            state.sent.push((to, calldata));
            Ok(TxOutcome {
                tx_hash,
                block_number: state.head,
            })
        }

        async fn call(&self, _to: Address, _calldata: Bytes) -> Result<Bytes> {
            Ok(self.state.lock().unwrap().call_result.clone())
        }

        async fn block_number(&self) -> Result<u64> {
            let mut state = self.state.lock().unwrap();
            state.head += 1;
            Ok(state.head)
        }
    }

    #[tokio::test]
    async fn test_wait_for_block_polls_until_target() {
        let chain = FakeChain::default();
        let seen = wait_for_block(&chain, 4, Duration::ZERO).await.unwrap();
        assert_eq!(seen, 4);
        assert_eq!(chain.head(), 4);
    }

    #[tokio::test]
    async fn test_reverted_transaction_carries_hash() {
        let chain = FakeChain::default();
        chain.state.lock().unwrap().revert_next = true;
        let err = chain
            .transact(Address::ZERO, Bytes::new())
            .await
            .unwrap_err();
        let reverted = err.downcast_ref::<ChainError>().unwrap();
        assert!(matches!(reverted, ChainError::Reverted { tx_hash } if *tx_hash == hash(1)));
    }
}
