//! Planner: `prepareCollect`, `prepareSend` (unified send/bridge/batch-send),
//! and `prepareSwapDeposit`. Produces an [`Operation`] plus its ordered
//! [`Step`]s from a validated user intent and current on-chain/gateway
//! balances.

use alloy_primitives::U256;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use xchain_calls::CallRequest;
use xchain_chains as chains;
use xchain_gateway::GatewayClient;
use xchain_math::{
    apply_fee_bps, effective_swap_slippage_bps, fee_bps_from_percent_str, gross_deposit_amount,
    net_burn_amount, Usdc6, BATCH_FEE_PERCENT, CROSS_CHAIN_FEE_PERCENT,
};
use xchain_store::{
    BurnParams, Operation, OperationType, SignRequest, Step, StepParams, StepStatus, StepType,
    SwapParams, TransferParams,
};
use xchain_swap::{QuoteRequest, SwapRouterClient};

use crate::error::EngineError;

pub struct PlannerDeps<'a> {
    pub gateway: &'a dyn GatewayClient,
    pub swap: &'a dyn SwapRouterClient,
    /// Address of the server-held delegate key, authorized (or to be
    /// authorized) to sign burn intents on the user's behalf.
    pub delegate_address: String,
}

/// An Operation plus its ordered Steps, ready to persist.
#[derive(Debug)]
pub struct Plan {
    pub operation: Operation,
    pub steps: Vec<Step>,
}

fn validate_gateway_capable(chain: &str) -> Result<(), EngineError> {
    if chains::is_gateway_capable(chain) {
        Ok(())
    } else {
        Err(EngineError::BadRequest(format!("chain not gateway-capable: {chain}")))
    }
}

struct StepBuilder {
    steps: Vec<Step>,
    sign_requests: Vec<SignRequest>,
}

impl StepBuilder {
    fn new() -> Self {
        Self { steps: Vec::new(), sign_requests: Vec::new() }
    }

    fn next_index(&self) -> u32 {
        self.steps.len() as u32
    }

    fn push_client_step(
        &mut self,
        operation_id: &str,
        chain: &str,
        step_type: StepType,
        calls: Vec<CallRequest>,
        params: StepParams,
        description: impl Into<String>,
    ) -> String {
        let step = Step::new(operation_id, self.next_index(), chain, step_type, StepStatus::AwaitingSignature, calls.clone(), params);
        let step_id = step.id.clone();
        self.sign_requests.push(SignRequest {
            step_id: step_id.clone(),
            chain: chain.to_string(),
            step_type,
            calls,
            description: description.into(),
            server_side: false,
            pending_mint: false,
        });
        self.steps.push(step);
        step_id
    }

    fn push_server_step(
        &mut self,
        operation_id: &str,
        chain: &str,
        step_type: StepType,
        params: StepParams,
    ) -> String {
        let step = Step::new(operation_id, self.next_index(), chain, step_type, StepStatus::Pending, Vec::new(), params);
        let step_id = step.id.clone();
        self.steps.push(step);
        step_id
    }

    fn push_skipped(&mut self, operation_id: &str, chain: &str, step_type: StepType, params: StepParams) {
        let step = Step::new(operation_id, self.next_index(), chain, step_type, StepStatus::Skipped, Vec::new(), params);
        self.steps.push(step);
    }
}

fn deposit_calls(
    chain: &str,
    wallet: &str,
    delegate: &str,
    delegate_needed: bool,
    amount_minor: U256,
) -> Vec<CallRequest> {
    let info = chains::get(chain).expect("chain validated gateway-capable");
    let mut calls = Vec::new();
    if delegate_needed {
        calls.push(xchain_calls::add_delegate(info.gateway_wallet_address, delegate));
    }
    calls.push(xchain_calls::erc20_approve(info.usdc_address, info.gateway_wallet_address, amount_minor));
    calls.push(xchain_calls::gateway_deposit(info.gateway_wallet_address, info.usdc_address, amount_minor));
    let _ = wallet;
    calls
}

// ---------------------------------------------------------------------
// prepareCollect
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectInput {
    pub sources: Vec<String>,
    pub destination_chain: Option<String>,
}

pub async fn prepare_collect(
    input: CollectInput,
    user_id: &str,
    user_wallet: &str,
    deps: &PlannerDeps<'_>,
) -> Result<Plan, EngineError> {
    for chain in &input.sources {
        validate_gateway_capable(chain)?;
    }
    let destination = input.destination_chain.unwrap_or_else(|| chains::HUB_CHAIN.to_string());
    validate_gateway_capable(&destination)?;

    let balances = join_all(
        input
            .sources
            .iter()
            .map(|chain| async move { deps.gateway.get_on_chain_balance(chain, user_wallet).await.unwrap_or(U256::ZERO) }),
    )
    .await;

    let mut sources: Vec<(String, U256)> = input
        .sources
        .iter()
        .cloned()
        .zip(balances)
        .filter(|(_, balance)| !balance.is_zero())
        .collect();
    sources.sort_by(|a, b| a.0.cmp(&b.0));

    if sources.is_empty() {
        return Err(EngineError::BadRequest(
            "No on-chain USDC balance found on specified chains".to_string(),
        ));
    }

    let authorizations = join_all(sources.iter().map(|(chain, _)| async move {
        deps.gateway
            .is_delegate_authorized(chain, user_wallet, &deps.delegate_address)
            .await
            .unwrap_or(false)
    }))
    .await;

    let mut total_burn = U256::ZERO;
    let mut per_source = Vec::new();
    for ((chain, deposit_amount), authorized) in sources.iter().cloned().zip(authorizations) {
        let burn_amount = net_burn_amount(deposit_amount);
        total_burn = total_burn.saturating_add(burn_amount);
        per_source.push((chain, deposit_amount, burn_amount, authorized));
    }

    let fee_bps = fee_bps_from_percent_str(BATCH_FEE_PERCENT)?;
    let fee_amount = apply_fee_bps(total_burn, fee_bps);

    let operation_id = uuid::Uuid::new_v4().to_string();
    let mut builder = StepBuilder::new();

    for (chain, deposit_amount, _burn_amount, authorized) in &per_source {
        let calls = deposit_calls(chain, user_wallet, &deps.delegate_address, !authorized, *deposit_amount);
        builder.push_client_step(
            &operation_id,
            chain,
            StepType::ApproveAndDeposit,
            calls,
            StepParams::Empty,
            format!("Deposit {} USDC into the gateway on {chain}", Usdc6::from_minor(*deposit_amount)),
        );
    }
    for (chain, _deposit_amount, burn_amount, _authorized) in &per_source {
        builder.push_server_step(
            &operation_id,
            chain,
            StepType::BurnIntent,
            StepParams::Burn(BurnParams {
                source_chain: chain.clone(),
                destination_chain: destination.clone(),
                amount: Usdc6::from_minor(*burn_amount),
                depositor: user_wallet.to_string(),
                recipient: user_wallet.to_string(),
            }),
        );
    }
    builder.push_server_step(&operation_id, &destination, StepType::Mint, StepParams::Empty);

    let summary = serde_json::json!({
        "perSource": per_source.iter().map(|(chain, deposit, burn, _)| serde_json::json!({
            "chain": chain,
            "depositAmount": Usdc6::from_minor(*deposit).to_decimal_string(),
            "burnAmount": Usdc6::from_minor(*burn).to_decimal_string(),
        })).collect::<Vec<_>>(),
        "totalBurn": Usdc6::from_minor(total_burn).to_decimal_string(),
        "fee": Usdc6::from_minor(fee_amount).to_decimal_string(),
        "estimatedTime": "15-20 minutes",
    });

    let params = serde_json::json!({
        "sources": per_source.iter().map(|(c, _, _, _)| c.clone()).collect::<Vec<_>>(),
        "destinationChain": destination,
    });

    let mut operation = Operation::new(
        user_id,
        OperationType::Collect,
        params,
        summary,
        Usdc6::from_minor(fee_amount),
        BATCH_FEE_PERCENT,
    );
    operation.id = operation_id;
    operation.sign_requests = builder.sign_requests;

    Ok(Plan { operation, steps: builder.steps })
}

// ---------------------------------------------------------------------
// prepareSend (unified send / bridge / batch-send)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientInput {
    pub chain: String,
    pub amount: Usdc6,
    pub address: Option<String>,
    pub output_token: Option<String>,
    pub output_token_decimals: Option<u8>,
    pub slippage_bps: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendInput {
    pub recipients: Vec<RecipientInput>,
    pub source_chain: Option<String>,
}

pub async fn prepare_send(
    input: SendInput,
    user_id: &str,
    user_wallet: &str,
    deps: &PlannerDeps<'_>,
) -> Result<Plan, EngineError> {
    if input.recipients.is_empty() {
        return Err(EngineError::BadRequest("recipient list must not be empty".to_string()));
    }
    let source_chain = input.source_chain.clone().unwrap_or_else(|| chains::HUB_CHAIN.to_string());
    validate_gateway_capable(&source_chain)?;
    for r in &input.recipients {
        validate_gateway_capable(&r.chain)?;
    }

    let operation_type = if input.recipients.len() > 1 {
        OperationType::BatchSend
    } else if input.recipients[0].address.is_none() {
        OperationType::Bridge
    } else {
        OperationType::Send
    };

    let all_internal = input
        .recipients
        .iter()
        .all(|r| source_chain == chains::HUB_CHAIN && r.chain == chains::HUB_CHAIN);

    let fee_percent = if all_internal {
        "0"
    } else {
        match operation_type {
            OperationType::Send => CROSS_CHAIN_FEE_PERCENT,
            _ => BATCH_FEE_PERCENT,
        }
    };

    let cross_chain_total: U256 = input
        .recipients
        .iter()
        .filter(|r| !(source_chain == chains::HUB_CHAIN && r.chain == chains::HUB_CHAIN))
        .map(|r| r.amount.minor())
        .fold(U256::ZERO, |acc, v| acc.saturating_add(v));

    let mut needs_deposit = false;
    let mut deposit_amount = U256::ZERO;
    if !cross_chain_total.is_zero() {
        let required = gross_deposit_amount(cross_chain_total);
        let deposited_balances = deps.gateway.get_balance(user_wallet).await?;
        let deposited = deposited_balances
            .iter()
            .find(|b| b.chain == source_chain)
            .map(|b| b.balance_minor)
            .unwrap_or(U256::ZERO);
        if deposited < required {
            let on_chain = deps.gateway.get_on_chain_balance(&source_chain, user_wallet).await.unwrap_or(U256::ZERO);
            if on_chain.saturating_add(deposited) < required {
                let max_sendable = net_burn_amount(on_chain.saturating_add(deposited));
                return Err(EngineError::BadRequest(format!(
                    "insufficient funds: maximum sendable is {}",
                    Usdc6::from_minor(max_sendable)
                )));
            }
            deposit_amount = on_chain.min(required.saturating_sub(deposited));
            needs_deposit = true;
        }
    }

    // Only burn-intent signing needs the delegate; an all-internal send never
    // touches the gateway wallet at all.
    let delegate_needed = !all_internal
        && !deps
            .gateway
            .is_delegate_authorized(&source_chain, user_wallet, &deps.delegate_address)
            .await
            .unwrap_or(false);

    let operation_id = uuid::Uuid::new_v4().to_string();
    let mut builder = StepBuilder::new();

    if needs_deposit {
        let calls = deposit_calls(&source_chain, user_wallet, &deps.delegate_address, delegate_needed, deposit_amount);
        builder.push_client_step(
            &operation_id,
            &source_chain,
            StepType::ApproveAndDeposit,
            calls,
            StepParams::Empty,
            format!("Deposit {} USDC into the gateway on {source_chain}", Usdc6::from_minor(deposit_amount)),
        );
    } else if delegate_needed {
        let info = chains::get(&source_chain).expect("validated gateway-capable");
        let calls = vec![xchain_calls::add_delegate(info.gateway_wallet_address, &deps.delegate_address)];
        builder.push_client_step(
            &operation_id,
            &source_chain,
            StepType::AddDelegate,
            calls,
            StepParams::Empty,
            "Authorize the delegate signer".to_string(),
        );
    }

    let mut swap_estimates = Vec::new();

    for recipient in &input.recipients {
        let is_internal = source_chain == chains::HUB_CHAIN && recipient.chain == chains::HUB_CHAIN;
        let recipient_address = recipient.address.clone().unwrap_or_else(|| user_wallet.to_string());

        if is_internal {
            builder.push_client_step(
                &operation_id,
                chains::HUB_CHAIN,
                StepType::Transfer,
                Vec::new(),
                StepParams::Transfer(TransferParams {
                    chain: chains::HUB_CHAIN.to_string(),
                    amount: recipient.amount,
                    recipient: recipient_address.clone(),
                }),
                format!("Transfer {} USDC to {recipient_address}", recipient.amount),
            );
            continue;
        }

        match &recipient.output_token {
            None => {
                builder.push_server_step(
                    &operation_id,
                    &source_chain,
                    StepType::BurnIntent,
                    StepParams::Burn(BurnParams {
                        source_chain: source_chain.clone(),
                        destination_chain: recipient.chain.clone(),
                        amount: recipient.amount,
                        depositor: user_wallet.to_string(),
                        recipient: recipient_address.clone(),
                    }),
                );
                builder.push_server_step(&operation_id, &recipient.chain, StepType::Mint, StepParams::Empty);
            }
            Some(output_token) => {
                let slippage_bps = effective_swap_slippage_bps(recipient.amount.minor(), recipient.slippage_bps);
                let quote_request = QuoteRequest {
                    from_chain: recipient.chain.clone(),
                    to_chain: recipient.chain.clone(),
                    from_token: chains::get(&recipient.chain).map(|c| c.usdc_address.to_string()).unwrap_or_default(),
                    to_token: output_token.clone(),
                    from_amount_minor: recipient.amount.minor(),
                    from_address: user_wallet.to_string(),
                    to_address: Some(recipient_address.clone()),
                    slippage_bps,
                };
                let quote = deps.swap.get_quote(&quote_request).await?;
                swap_estimates.push(serde_json::json!({
                    "chain": recipient.chain,
                    "toAmountMin": quote.estimate.to_amount_min_minor.to_string(),
                }));

                let same_chain_after_optimization = input.recipients.len() == 1
                    && source_chain == recipient.chain
                    && deps
                        .gateway
                        .get_on_chain_balance(&recipient.chain, user_wallet)
                        .await
                        .map(|balance| balance >= recipient.amount.minor())
                        .unwrap_or(false);

                if same_chain_after_optimization {
                    let usdc_address = chains::get(&recipient.chain).map(|c| c.usdc_address).unwrap_or_default();
                    let calls = deps.swap.build_swap_calls(&quote, usdc_address, recipient.amount.minor());
                    builder.push_client_step(
                        &operation_id,
                        &recipient.chain,
                        StepType::LifiSwap,
                        calls,
                        StepParams::Swap(SwapParams {
                            output_token: output_token.clone(),
                            output_token_decimals: recipient.output_token_decimals.unwrap_or(18),
                            slippage_bps,
                            recipient_address: recipient_address.clone(),
                            usdc_amount: recipient.amount,
                        }),
                        format!("Swap {} USDC into {output_token}", recipient.amount),
                    );
                    builder.push_skipped(
                        &operation_id,
                        &source_chain,
                        StepType::BurnIntent,
                        StepParams::Burn(BurnParams {
                            source_chain: source_chain.clone(),
                            destination_chain: recipient.chain.clone(),
                            amount: recipient.amount,
                            depositor: user_wallet.to_string(),
                            recipient: recipient_address.clone(),
                        }),
                    );
                    builder.push_skipped(&operation_id, &recipient.chain, StepType::Mint, StepParams::Empty);
                } else {
                    builder.push_server_step(
                        &operation_id,
                        &source_chain,
                        StepType::BurnIntent,
                        StepParams::Burn(BurnParams {
                            source_chain: source_chain.clone(),
                            destination_chain: recipient.chain.clone(),
                            amount: recipient.amount,
                            depositor: user_wallet.to_string(),
                            recipient: user_wallet.to_string(),
                        }),
                    );
                    builder.push_server_step(&operation_id, &recipient.chain, StepType::Mint, StepParams::Empty);
                    builder.push_server_step(
                        &operation_id,
                        &recipient.chain,
                        StepType::LifiSwap,
                        StepParams::Swap(SwapParams {
                            output_token: output_token.clone(),
                            output_token_decimals: recipient.output_token_decimals.unwrap_or(18),
                            slippage_bps,
                            recipient_address,
                            usdc_amount: recipient.amount,
                        }),
                    );
                }
            }
        }
    }

    let total_amount = input
        .recipients
        .iter()
        .fold(U256::ZERO, |acc, r| acc.saturating_add(r.amount.minor()));

    let summary = serde_json::json!({
        "totalAmount": total_amount.to_string(),
        "feePercent": fee_percent,
        "swapEstimates": swap_estimates,
        "estimatedTime": if all_internal { "instant" } else { "15-20 minutes" },
    });

    let fee_bps = fee_bps_from_percent_str(fee_percent)?;
    let fee_amount = apply_fee_bps(total_amount, fee_bps);

    let mut operation = Operation::new(
        user_id,
        operation_type,
        serde_json::to_value(&input).unwrap_or_default(),
        summary,
        Usdc6::from_minor(fee_amount),
        fee_percent,
    );
    operation.id = operation_id;
    operation.sign_requests = builder.sign_requests;
    if builder.steps.iter().all(|s| s.status.is_terminal()) {
        operation.status = xchain_store::OperationStatus::Processing;
    }

    Ok(Plan { operation, steps: builder.steps })
}

// ---------------------------------------------------------------------
// prepareSwapDeposit
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapDepositInput {
    pub source_chain: String,
    pub source_token: String,
    pub amount: Usdc6,
    pub token_decimals: Option<u8>,
    pub slippage_bps: Option<u32>,
}

pub async fn prepare_swap_deposit(
    input: SwapDepositInput,
    user_id: &str,
    user_wallet: &str,
    deps: &PlannerDeps<'_>,
) -> Result<Plan, EngineError> {
    let info = chains::get(&input.source_chain)
        .ok_or_else(|| EngineError::BadRequest(format!("unknown chain: {}", input.source_chain)))?;
    if !info.supports_smart_account || !info.is_gateway_capable() {
        return Err(EngineError::BadRequest(format!(
            "{} does not support the smart-account + gateway flow",
            input.source_chain
        )));
    }

    let slippage_bps = effective_swap_slippage_bps(input.amount.minor(), input.slippage_bps);
    let quote_request = QuoteRequest {
        from_chain: input.source_chain.clone(),
        to_chain: input.source_chain.clone(),
        from_token: input.source_token.clone(),
        to_token: info.usdc_address.to_string(),
        from_amount_minor: input.amount.minor(),
        from_address: user_wallet.to_string(),
        to_address: None,
        slippage_bps,
    };
    let quote = deps.swap.get_quote(&quote_request).await?;
    let deposit_amount = quote.estimate.to_amount_min_minor;

    let delegate_needed = !deps
        .gateway
        .is_delegate_authorized(&input.source_chain, user_wallet, &deps.delegate_address)
        .await
        .unwrap_or(false);

    // build_swap_calls prepends the source-token approve (skipped for the
    // native placeholder); the gateway approve/deposit pair is appended
    // afterward, since it spends a different token (USDC) on a different
    // spender (the gateway wallet, not the swap router).
    let swap_calls = deps.swap.build_swap_calls(&quote, &input.source_token, input.amount.minor());
    let mut calls = xchain_calls::swap_then_deposit(
        swap_calls,
        xchain_calls::erc20_approve(info.usdc_address, info.gateway_wallet_address, deposit_amount),
        xchain_calls::gateway_deposit(info.gateway_wallet_address, info.usdc_address, deposit_amount),
    );
    if delegate_needed {
        calls.insert(0, xchain_calls::add_delegate(info.gateway_wallet_address, &deps.delegate_address));
    }

    let operation_id = uuid::Uuid::new_v4().to_string();
    let mut builder = StepBuilder::new();
    builder.push_client_step(
        &operation_id,
        &input.source_chain,
        StepType::LifiSwap,
        calls,
        StepParams::Empty,
        format!("Swap {} into USDC and deposit into the gateway", input.amount),
    );

    if !info.is_hub {
        let burn_amount = net_burn_amount(deposit_amount);
        builder.push_server_step(
            &operation_id,
            &input.source_chain,
            StepType::BurnIntent,
            StepParams::Burn(BurnParams {
                source_chain: input.source_chain.clone(),
                destination_chain: chains::HUB_CHAIN.to_string(),
                amount: Usdc6::from_minor(burn_amount),
                depositor: user_wallet.to_string(),
                recipient: user_wallet.to_string(),
            }),
        );
        builder.push_server_step(&operation_id, chains::HUB_CHAIN, StepType::Mint, StepParams::Empty);
    }

    let summary = serde_json::json!({
        "depositAmount": Usdc6::from_minor(deposit_amount).to_decimal_string(),
        "estimatedTime": "15-20 minutes",
    });

    let mut operation = Operation::new(
        user_id,
        OperationType::SwapDeposit,
        serde_json::to_value(&input).unwrap_or_default(),
        summary,
        Usdc6::ZERO,
        "0",
    );
    operation.id = operation_id;
    operation.sign_requests = builder.sign_requests;

    Ok(Plan { operation, steps: builder.steps })
}
