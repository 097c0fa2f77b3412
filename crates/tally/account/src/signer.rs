use tally_types::AccountAddress;

/// Proof that the holder may act as `address`.
///
/// Only the ledger mints signers: the runtime signer once per ledger
/// ([`Ledger::runtime_signer`]), a sender signer per transaction
/// ([`Ledger::transaction_signer`]), and a delegate signer per exercised
/// [`SignerCapability`]. Signers are passed by reference and never cloned.
///
/// [`Ledger::runtime_signer`]: crate::Ledger::runtime_signer
/// [`Ledger::transaction_signer`]: crate::Ledger::transaction_signer
/// [`SignerCapability`]: crate::SignerCapability
#[derive(Debug, PartialEq, Eq)]
pub struct Signer {
    address: AccountAddress,
    runtime: bool,
    issued_in: Option<u64>,
}

impl Signer {
    /// Signer used inside the crate; never leaves an operation.
    pub(crate) fn new(address: AccountAddress) -> Self {
        Self::issued(address, None)
    }

    pub(crate) fn issued(address: AccountAddress, issued_in: Option<u64>) -> Self {
        Self {
            address,
            runtime: false,
            issued_in,
        }
    }

    pub(crate) fn runtime(issued_in: Option<u64>) -> Self {
        Self {
            address: AccountAddress::RUNTIME,
            runtime: true,
            issued_in,
        }
    }

    pub fn address(&self) -> AccountAddress {
        self.address
    }

    /// Whether this is the privileged runtime identity.
    pub fn is_runtime(&self) -> bool {
        self.runtime
    }

    pub(crate) fn issued_in(&self) -> Option<u64> {
        self.issued_in
    }
}
