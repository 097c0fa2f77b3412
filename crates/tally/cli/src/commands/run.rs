//! `tally run`: replay a scenario through genesis, prologue, body and epilogue.

use std::path::Path;

use serde::Serialize;
use tally_account::{
    destroy_signer_cap, AccountView, Ledger, LedgerError, LedgerResult, MintCapability, Signer,
};
use tally_txn::{LifecycleConfig, TransactionLifecycle, TransactionParams, TransactionSession};
use tally_types::{AccountAddress, AuthKeyScheme, Blake3AuthScheme, Stc};
use tracing::{info, warn};

use crate::error::{CliError, CliResult};
use crate::output::{print_json, OutputFormat};
use crate::scenario::{decode_hex, Action, Directory, Scenario, TransactionSpec};

/// Outcome of one scenario transaction.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Body ran and the transaction settled.
    Executed,
    /// Body failed and was rolled back; gas was still charged.
    Aborted,
    /// Prologue or epilogue refused the transaction; nothing changed.
    Rejected,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionReport {
    pub index: usize,
    pub sender: AccountAddress,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u64>,
    pub fee: u128,
    pub sequence_number: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NamedAccount {
    pub name: Option<String>,
    #[serde(flatten)]
    pub view: AccountView,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub transactions: Vec<TransactionReport>,
    pub accounts: Vec<NamedAccount>,
    pub fee_pool: u128,
    pub events: usize,
}

pub fn execute(scenario_path: &Path, config_path: Option<&Path>, format: OutputFormat) -> CliResult<()> {
    let scenario = Scenario::load(scenario_path)?;
    let config = match config_path {
        Some(path) => LifecycleConfig::load(path)?,
        None => scenario.lifecycle.clone().unwrap_or_default(),
    };
    let report = replay(&scenario, config)?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => print_text(&report),
    }
    Ok(())
}

/// Run `scenario` against a fresh in-memory ledger.
pub fn replay(scenario: &Scenario, config: LifecycleConfig) -> CliResult<RunReport> {
    let lifecycle = TransactionLifecycle::new(config, Blake3AuthScheme);
    let directory = Directory::build(&scenario.accounts, lifecycle.scheme())?;
    let mut ledger = Ledger::in_memory();
    let runtime = ledger.runtime_signer()?;

    genesis(&mut ledger, &runtime, scenario, &directory)?;

    let mut transactions = Vec::with_capacity(scenario.transactions.len());
    for (index, spec) in scenario.transactions.iter().enumerate() {
        let report = run_transaction(&lifecycle, &mut ledger, &runtime, &directory, index, spec)?;
        transactions.push(report);
    }

    let accounts = ledger
        .account_views()
        .into_iter()
        .map(|view| NamedAccount {
            name: directory.name_of(view.address).map(str::to_owned),
            view,
        })
        .collect();

    Ok(RunReport {
        transactions,
        accounts,
        fee_pool: ledger.fee_pool_balance::<Stc>(),
        events: ledger.events().len(),
    })
}

fn genesis(ledger: &mut Ledger, runtime: &Signer, scenario: &Scenario, directory: &Directory) -> CliResult<()> {
    let runtime_account = ledger.create_genesis_account(runtime, AccountAddress::RUNTIME)?;
    ledger.do_accept_token::<Stc>(&runtime_account)?;
    let mint = MintCapability::<Stc>::issue(runtime)?;

    for spec in &scenario.accounts {
        let address = directory.resolve(&spec.name)?;
        ledger.create_account_with_address::<Stc>(address)?;
        ledger.deposit(address, mint.mint(u128::from(spec.balance))?)?;
        if !spec.auto_accept {
            let owner = ledger.transaction_signer(runtime, address)?;
            ledger.set_auto_accept_token(&owner, false)?;
        }
        info!(name = %spec.name, address = %address, balance = spec.balance, "Genesis account");
    }
    Ok(())
}

fn run_transaction(
    lifecycle: &TransactionLifecycle,
    ledger: &mut Ledger,
    runtime: &Signer,
    directory: &Directory,
    index: usize,
    spec: &TransactionSpec,
) -> CliResult<TransactionReport> {
    let sender = directory.resolve(&spec.sender)?;
    let preimage = match &spec.preimage {
        Some(hex) => decode_hex(hex)?,
        None => directory
            .preimage(&spec.sender)
            .map(<[u8]>::to_vec)
            .unwrap_or_default(),
    };
    let sequence_number = match spec.sequence_number {
        Some(n) => n,
        None => ledger.sequence_number(sender).unwrap_or(0),
    };
    if spec.gas_used > spec.max_gas_units {
        return Err(CliError::Scenario(format!(
            "transaction {index}: gas_used {} exceeds max_gas_units {}",
            spec.gas_used, spec.max_gas_units
        )));
    }
    let params = TransactionParams {
        sender,
        sequence_number,
        auth_key_preimage: preimage,
        gas_price: spec.gas_price,
        max_gas_units: spec.max_gas_units,
    };
    let action = resolve_action(&spec.action, directory, lifecycle.scheme())?;

    let rejected = |e: LedgerError| -> CliResult<TransactionReport> {
        if e.is_fatal() {
            return Err(e.into());
        }
        warn!(index, sender = %sender, error = %e, "Transaction rejected");
        Ok(TransactionReport {
            index,
            sender,
            status: Status::Rejected,
            error: Some(e.to_string()),
            error_code: Some(e.code()),
            fee: 0,
            sequence_number: None,
        })
    };

    let session = match TransactionSession::<_, _, Stc>::begin(lifecycle, ledger, runtime, params) {
        Ok(session) => session,
        Err(e) => return rejected(e),
    };
    let gas_units_remaining = spec.max_gas_units - spec.gas_used;
    let receipt = match session.execute(gas_units_remaining, |ledger, signer| apply(ledger, signer, &action)) {
        Ok(receipt) => receipt,
        Err(e) => return rejected(e),
    };

    let (status, error) = match &receipt.output {
        Ok(()) => (Status::Executed, None),
        Err(e) if e.is_fatal() => return Err(e.clone().into()),
        Err(e) => (Status::Aborted, Some(e)),
    };
    Ok(TransactionReport {
        index,
        sender,
        status,
        error: error.map(ToString::to_string),
        error_code: error.map(LedgerError::code),
        fee: receipt.settlement.fee,
        sequence_number: Some(receipt.settlement.sequence_number),
    })
}

/// An [`Action`] with names resolved and hex decoded.
enum Body {
    Transfer {
        to: AccountAddress,
        amount: u128,
        memo: Vec<u8>,
    },
    SetAutoAccept(bool),
    RotateKey(Vec<u8>),
    DelegateSigner,
    Noop,
}

fn resolve_action(action: &Action, directory: &Directory, scheme: &dyn AuthKeyScheme) -> CliResult<Body> {
    Ok(match action {
        Action::Transfer { to, amount, memo } => Body::Transfer {
            to: directory.resolve(to)?,
            amount: u128::from(*amount),
            memo: memo.as_deref().map(str::as_bytes).map(<[u8]>::to_vec).unwrap_or_default(),
        },
        Action::SetAutoAccept { enable } => Body::SetAutoAccept(*enable),
        Action::RotateKey { preimage } => {
            let key = scheme.hash_preimage(&decode_hex(preimage)?);
            Body::RotateKey(key.as_bytes().to_vec())
        }
        Action::DelegateSigner => Body::DelegateSigner,
        Action::Noop => Body::Noop,
    })
}

fn apply(ledger: &mut Ledger, signer: &Signer, body: &Body) -> LedgerResult<()> {
    match body {
        Body::Transfer { to, amount, memo } => {
            ledger.pay_from_with_metadata::<Stc>(signer, *to, *amount, memo.clone())
        }
        Body::SetAutoAccept(enable) => ledger.set_auto_accept_token(signer, *enable),
        Body::RotateKey(key) => ledger.rotate_authentication_key(signer, key),
        Body::DelegateSigner => {
            let cap = ledger.remove_signer_capability(signer)?;
            destroy_signer_cap(cap);
            Ok(())
        }
        Body::Noop => Ok(()),
    }
}

fn print_text(report: &RunReport) {
    println!("Transactions");
    for txn in &report.transactions {
        let status = match txn.status {
            Status::Executed => "executed",
            Status::Aborted => "aborted",
            Status::Rejected => "rejected",
        };
        print!("  #{:<3} {:<10} sender={} fee={}", txn.index, status, txn.sender, txn.fee);
        if let Some(seq) = txn.sequence_number {
            print!(" seq={seq}");
        }
        if let (Some(code), Some(error)) = (txn.error_code, &txn.error) {
            print!(" error[{code}]={error}");
        }
        println!();
    }

    println!();
    println!("Accounts");
    for account in &report.accounts {
        let view = &account.view;
        let name = account.name.as_deref().unwrap_or("-");
        println!(
            "  {:<8} {} seq={} key={}{}",
            name,
            view.address,
            view.sequence_number,
            view.authentication_key,
            if view.signer_delegated { " (delegated)" } else { "" }
        );
        for balance in &view.balances {
            println!("           {} = {}", balance.token, balance.amount);
        }
    }

    println!();
    println!("Fee pool: {}", report.fee_pool);
    println!("Events:   {}", report.events);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(text: &str) -> Scenario {
        toml::from_str(text).unwrap()
    }

    #[test]
    fn fee_scenario_settles() {
        let s = scenario(
            r#"
            [[accounts]]
            name = "alice"
            preimage = "a11ce0"
            balance = 20000

            [[accounts]]
            name = "bob"
            preimage = "b0b0"

            [[transactions]]
            sender = "alice"
            gas_price = 10
            max_gas_units = 1000
            gas_used = 200
            action = { kind = "transfer", to = "bob", amount = 500 }
            "#,
        );
        let report = replay(&s, LifecycleConfig::default()).unwrap();
        let txn = &report.transactions[0];
        assert!(matches!(txn.status, Status::Executed));
        assert_eq!(txn.fee, 2_000);
        assert_eq!(txn.sequence_number, Some(1));
        assert_eq!(report.fee_pool, 2_000);

        let alice = report
            .accounts
            .iter()
            .find(|a| a.name.as_deref() == Some("alice"))
            .unwrap();
        assert_eq!(alice.view.balances[0].amount, 17_500);
        assert!(!alice.view.authentication_key.is_zero());
    }

    #[test]
    fn replay_and_bad_bodies() {
        let s = scenario(
            r#"
            [[accounts]]
            name = "alice"
            preimage = "a11ce0"
            balance = 100

            [[transactions]]
            sender = "alice"
            action = { kind = "transfer", to = "0x404", amount = 5 }

            [[transactions]]
            sender = "alice"
            sequence_number = 0
            action = { kind = "noop" }

            [[transactions]]
            sender = "alice"
            action = { kind = "delegate_signer" }

            [[transactions]]
            sender = "alice"
            action = { kind = "noop" }
            "#,
        );
        let report = replay(&s, LifecycleConfig::default()).unwrap();
        let statuses: Vec<_> = report
            .transactions
            .iter()
            .map(|t| format!("{:?}", t.status))
            .collect();
        assert_eq!(statuses, ["Aborted", "Rejected", "Executed", "Rejected"]);
        assert_eq!(report.transactions[0].error_code, Some(1));
        assert_eq!(report.transactions[3].error_code, Some(3));
    }
}
