//! Chain client seam: transaction submission and confirmation tracking.
//!
//! The orchestrator issues exactly two kinds of requests — construct a new
//! component, or call a method on a deployed one — and then waits for the
//! network to accept the effect irreversibly. Everything network-facing goes
//! through the [`ChainClient`] trait so orchestration logic stays testable
//! against an in-memory chain.

use std::future::Future;
use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

/// Default timeout for a single RPC request.
const RPC_TIMEOUT: Duration = Duration::from_secs(5);

/// Default interval between confirmation polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("failed to reach the node: {0}")]
    Transport(String),

    #[error("node rejected `{method}`: {message}")]
    Rpc { method: String, message: String },

    #[error("unexpected `{method}` response: {detail}")]
    Protocol { method: String, detail: String },
}

/// What the network currently knows about a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    /// The node has no record of the hash. A previously submitted
    /// transaction in this state was dropped and is safe to resubmit.
    Unknown,
    /// Known to the node but not yet included in a block.
    InFlight,
    /// Included and executed successfully.
    Confirmed(TxConfirmation),
    /// Included, but execution failed.
    Reverted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxConfirmation {
    pub block_number: u64,
    /// Depth of the inclusion block below the chain head, inclusive.
    pub confirmations: u64,
    /// Address of the created contract, for deployment transactions.
    pub contract_address: Option<Address>,
}

pub trait ChainClient: Send + Sync {
    /// Submit a contract-creation transaction, returning its hash.
    fn submit_deployment(
        &self,
        from: Address,
        init_code: Bytes,
    ) -> impl Future<Output = Result<B256, ChainError>> + Send;

    /// Submit a method call on a deployed contract, returning its hash.
    fn submit_call(
        &self,
        from: Address,
        to: Address,
        calldata: Bytes,
    ) -> impl Future<Output = Result<B256, ChainError>> + Send;

    /// Report what the network currently knows about a transaction.
    fn transaction_status(
        &self,
        tx_hash: B256,
    ) -> impl Future<Output = Result<TxStatus, ChainError>> + Send;
}

/// Bounds on the wait for irreversible confirmation.
#[derive(Debug, Clone)]
pub struct ConfirmationPolicy {
    /// Blocks on top of the inclusion block before the effect counts as
    /// irreversible.
    pub confirmations: u64,
    /// Upper bound on status polls before giving up on a submission.
    pub max_polls: u32,
    /// Pause between polls.
    pub poll_interval: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            confirmations: 2,
            max_polls: 60,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Terminal outcome of a bounded confirmation wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxWait {
    Confirmed(TxConfirmation),
    Reverted,
    TimedOut { polls: u32 },
}

/// Poll a transaction until it is irreversibly confirmed, reverted, or the
/// bounded wait is exhausted.
///
/// Transient query failures count as failed polls and are retried, so a
/// flaky node cannot make the wait unbounded.
pub async fn await_confirmation<C: ChainClient>(
    chain: &C,
    tx_hash: B256,
    policy: &ConfirmationPolicy,
) -> TxWait {
    for poll in 1..=policy.max_polls {
        match chain.transaction_status(tx_hash).await {
            Ok(TxStatus::Confirmed(confirmation))
                if confirmation.confirmations >= policy.confirmations =>
            {
                return TxWait::Confirmed(confirmation);
            }
            Ok(TxStatus::Reverted) => return TxWait::Reverted,
            Ok(status) => {
                tracing::trace!(tx = %tx_hash, status = ?status, poll, "Awaiting confirmation...");
            }
            Err(e) => {
                tracing::trace!(tx = %tx_hash, error = %e, poll, "Status poll failed, retrying...");
            }
        }
        tokio::time::sleep(policy.poll_interval).await;
    }
    TxWait::TimedOut {
        polls: policy.max_polls,
    }
}

/// Wait out a submission and map the outcome into step-level errors.
///
/// A timeout leaves the step pending for the next run to re-check; a revert
/// is terminal for the step. The caller owns the matching ledger transition.
pub(crate) async fn settle<C: ChainClient>(
    chain: &C,
    tx_hash: B256,
    policy: &ConfirmationPolicy,
) -> Result<TxConfirmation, crate::error::StepError> {
    use crate::error::StepError;

    match await_confirmation(chain, tx_hash, policy).await {
        TxWait::Confirmed(confirmation) => Ok(confirmation),
        TxWait::Reverted => Err(StepError::Reverted { tx_hash }),
        TxWait::TimedOut { polls } => Err(StepError::ConfirmationTimeout { tx_hash, polls }),
    }
}

/// JSON-RPC implementation of [`ChainClient`].
///
/// Requests are signed by the node: the deploying identity is an unlocked
/// account on the endpoint, and submissions go out as `eth_sendTransaction`.
#[derive(Debug, Clone)]
pub struct HttpChain {
    client: reqwest::Client,
    endpoint: Url,
}

/// Receipt fields the orchestrator cares about.
#[derive(Debug, Deserialize)]
struct RawReceipt {
    status: Option<String>,
    #[serde(rename = "blockNumber")]
    block_number: Option<String>,
    #[serde(rename = "contractAddress")]
    contract_address: Option<Address>,
}

impl HttpChain {
    pub fn new(endpoint: Url) -> Result<Self, ChainError> {
        let client = reqwest::Client::builder()
            .timeout(RPC_TIMEOUT)
            .build()
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Make a JSON-RPC call and deserialize the result.
    async fn rpc<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, ChainError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&serde_json::json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
                "id": 1
            }))
            .send()
            .await
            .map_err(|e| ChainError::Transport(format!("failed to send {method}: {e}")))?;

        let body: Value = response.json().await.map_err(|e| ChainError::Protocol {
            method: method.to_string(),
            detail: format!("body is not JSON: {e}"),
        })?;

        if let Some(error) = body.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
                .to_string();
            return Err(ChainError::Rpc {
                method: method.to_string(),
                message,
            });
        }

        let result = body.get("result").ok_or_else(|| ChainError::Protocol {
            method: method.to_string(),
            detail: "no result in response".to_string(),
        })?;

        serde_json::from_value(result.clone()).map_err(|e| ChainError::Protocol {
            method: method.to_string(),
            detail: format!("failed to deserialize result: {e}"),
        })
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        let raw: String = self.rpc("eth_blockNumber", vec![]).await?;
        parse_hex_u64("eth_blockNumber", &raw)
    }
}

/// Parse a `0x`-prefixed hex quantity.
fn parse_hex_u64(method: &str, raw: &str) -> Result<u64, ChainError> {
    u64::from_str_radix(raw.trim_start_matches("0x"), 16).map_err(|e| ChainError::Protocol {
        method: method.to_string(),
        detail: format!("bad hex quantity `{raw}`: {e}"),
    })
}

impl ChainClient for HttpChain {
    async fn submit_deployment(&self, from: Address, init_code: Bytes) -> Result<B256, ChainError> {
        self.rpc(
            "eth_sendTransaction",
            vec![serde_json::json!({
                "from": from,
                "data": init_code,
            })],
        )
        .await
    }

    async fn submit_call(
        &self,
        from: Address,
        to: Address,
        calldata: Bytes,
    ) -> Result<B256, ChainError> {
        self.rpc(
            "eth_sendTransaction",
            vec![serde_json::json!({
                "from": from,
                "to": to,
                "data": calldata,
            })],
        )
        .await
    }

    async fn transaction_status(&self, tx_hash: B256) -> Result<TxStatus, ChainError> {
        let receipt: Option<RawReceipt> = self
            .rpc(
                "eth_getTransactionReceipt",
                vec![serde_json::json!(tx_hash)],
            )
            .await?;

        if let Some(receipt) = receipt {
            if receipt.status.as_deref() == Some("0x0") {
                return Ok(TxStatus::Reverted);
            }
            let block_number = match receipt.block_number.as_deref() {
                Some(raw) => parse_hex_u64("eth_getTransactionReceipt", raw)?,
                // A receipt without a block number is still in flight on
                // some nodes.
                None => return Ok(TxStatus::InFlight),
            };
            let head = self.block_number().await?;
            return Ok(TxStatus::Confirmed(TxConfirmation {
                block_number,
                confirmations: head.saturating_sub(block_number) + 1,
                contract_address: receipt.contract_address,
            }));
        }

        let known: Option<Value> = self
            .rpc(
                "eth_getTransactionByHash",
                vec![serde_json::json!(tx_hash)],
            )
            .await?;
        Ok(match known {
            Some(_) => TxStatus::InFlight,
            None => TxStatus::Unknown,
        })
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scriptable in-memory chain for orchestration tests.

    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    use super::*;

    /// What the mock does with the next submission. Submissions beyond the
    /// script confirm immediately.
    #[derive(Debug, Clone)]
    pub enum Script {
        /// Accept and confirm, minting an address for deployments.
        Confirm,
        /// Accept; the transaction executes and reverts.
        Revert,
        /// Reject at submission time, before inclusion.
        Reject(&'static str),
        /// Accept and never produce a receipt.
        Stall,
    }

    /// One recorded submission attempt.
    #[derive(Debug, Clone)]
    pub struct Submission {
        pub from: Address,
        /// `None` for contract creations.
        pub to: Option<Address>,
        pub data: Bytes,
        pub tx_hash: Option<B256>,
    }

    #[derive(Default)]
    struct State {
        scripts: VecDeque<Script>,
        submissions: Vec<Submission>,
        txs: HashMap<B256, TxStatus>,
        minted: u64,
    }

    #[derive(Clone, Default)]
    pub struct MockChain {
        state: Arc<Mutex<State>>,
    }

    impl MockChain {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue outcomes for upcoming submissions, in order.
        pub fn script(&self, outcomes: impl IntoIterator<Item = Script>) {
            self.state.lock().unwrap().scripts.extend(outcomes);
        }

        pub fn submissions(&self) -> Vec<Submission> {
            self.state.lock().unwrap().submissions.clone()
        }

        /// Flip a known transaction to confirmed, as if the network caught
        /// up while the orchestrator was away.
        pub fn confirm_tx(&self, tx_hash: B256, contract_address: Option<Address>) {
            self.state.lock().unwrap().txs.insert(
                tx_hash,
                TxStatus::Confirmed(TxConfirmation {
                    block_number: 1,
                    confirmations: u64::MAX,
                    contract_address,
                }),
            );
        }

        /// Drop a known transaction, as if it fell out of the mempool.
        pub fn drop_tx(&self, tx_hash: B256) {
            self.state.lock().unwrap().txs.remove(&tx_hash);
        }

        fn submit(&self, from: Address, to: Option<Address>, data: Bytes) -> Result<B256, ChainError> {
            let mut state = self.state.lock().unwrap();
            let script = state.scripts.pop_front().unwrap_or(Script::Confirm);

            if let Script::Reject(message) = script {
                state.submissions.push(Submission {
                    from,
                    to,
                    data,
                    tx_hash: None,
                });
                return Err(ChainError::Rpc {
                    method: "eth_sendTransaction".to_string(),
                    message: message.to_string(),
                });
            }

            state.minted += 1;
            let tx_hash = B256::with_last_byte(state.minted as u8);
            let status = match script {
                Script::Confirm => TxStatus::Confirmed(TxConfirmation {
                    block_number: state.minted,
                    confirmations: u64::MAX,
                    contract_address: to.is_none().then(|| {
                        Address::with_last_byte(0xA0 + state.minted as u8)
                    }),
                }),
                Script::Revert => TxStatus::Reverted,
                Script::Stall => TxStatus::InFlight,
                Script::Reject(_) => unreachable!(),
            };
            state.txs.insert(tx_hash, status);
            state.submissions.push(Submission {
                from,
                to,
                data,
                tx_hash: Some(tx_hash),
            });
            Ok(tx_hash)
        }
    }

    impl ChainClient for MockChain {
        async fn submit_deployment(
            &self,
            from: Address,
            init_code: Bytes,
        ) -> Result<B256, ChainError> {
            self.submit(from, None, init_code)
        }

        async fn submit_call(
            &self,
            from: Address,
            to: Address,
            calldata: Bytes,
        ) -> Result<B256, ChainError> {
            self.submit(from, Some(to), calldata)
        }

        async fn transaction_status(&self, tx_hash: B256) -> Result<TxStatus, ChainError> {
            Ok(self
                .state
                .lock()
                .unwrap()
                .txs
                .get(&tx_hash)
                .cloned()
                .unwrap_or(TxStatus::Unknown))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{MockChain, Script};
    use super::*;

    fn fast_policy() -> ConfirmationPolicy {
        ConfirmationPolicy {
            confirmations: 1,
            max_polls: 3,
            poll_interval: Duration::ZERO,
        }
    }

    #[test]
    fn test_parse_hex_u64() {
        assert_eq!(parse_hex_u64("m", "0x10").unwrap(), 16);
        assert_eq!(parse_hex_u64("m", "0x0").unwrap(), 0);
        assert!(parse_hex_u64("m", "0xzz").is_err());
    }

    #[tokio::test]
    async fn test_await_confirmation_confirms() {
        let chain = MockChain::new();
        let tx = chain
            .submit_deployment(Address::with_last_byte(1), Bytes::from(vec![0x60]))
            .await
            .unwrap();

        let outcome = await_confirmation(&chain, tx, &fast_policy()).await;
        assert!(matches!(outcome, TxWait::Confirmed(c) if c.contract_address.is_some()));
    }

    #[tokio::test]
    async fn test_await_confirmation_reports_revert() {
        let chain = MockChain::new();
        chain.script([Script::Revert]);
        let tx = chain
            .submit_deployment(Address::with_last_byte(1), Bytes::from(vec![0x60]))
            .await
            .unwrap();

        assert_eq!(
            await_confirmation(&chain, tx, &fast_policy()).await,
            TxWait::Reverted
        );
    }

    #[tokio::test]
    async fn test_await_confirmation_bounded() {
        let chain = MockChain::new();
        chain.script([Script::Stall]);
        let tx = chain
            .submit_deployment(Address::with_last_byte(1), Bytes::from(vec![0x60]))
            .await
            .unwrap();

        assert_eq!(
            await_confirmation(&chain, tx, &fast_policy()).await,
            TxWait::TimedOut { polls: 3 }
        );
    }
}
