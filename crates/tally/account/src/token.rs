use std::fmt;
use std::marker::PhantomData;

use tally_types::{TokenCode, TokenType};
use tracing::debug;

use crate::error::{LedgerError, LedgerResult};
use crate::signer::Signer;

/// A linear amount of token `T` in flight between balance stores.
///
/// Only the ledger creates non-zero tokens (by withdrawal or through a
/// [`MintCapability`]). Not `Clone`; a non-zero token is consumed by
/// depositing it, merging it, or paying it as a fee. Dropping one burns its
/// value, which hosts only do on the abort path of a transaction.
///
/// A token withdrawn inside an atomic section carries that section, and so
/// does anything merged with it or split from it.
#[must_use = "dropping a token burns its value"]
pub struct Token<T: TokenType> {
    value: u128,
    issued_in: Vec<u64>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: TokenType> Token<T> {
    pub(crate) fn new(value: u128) -> Self {
        Self::issued(value, None)
    }

    pub(crate) fn issued(value: u128, issued_in: Option<u64>) -> Self {
        Self {
            value,
            issued_in: issued_in.into_iter().collect(),
            _marker: PhantomData,
        }
    }

    pub fn zero() -> Self {
        Self::new(0)
    }

    pub fn value(&self) -> u128 {
        self.value
    }

    pub fn token_code(&self) -> TokenCode {
        T::token_code()
    }

    /// Absorb `other`, failing with `AmountOverflow` past `T::MAX_AMOUNT`.
    ///
    /// On failure `other` is handed back untouched.
    pub fn merge(&mut self, other: Token<T>) -> Result<(), (LedgerError, Token<T>)> {
        match self.value.checked_add(other.value) {
            Some(sum) if sum <= T::MAX_AMOUNT => {
                self.value = sum;
                self.issued_in.extend(other.issued_in);
                self.issued_in.sort_unstable();
                self.issued_in.dedup();
                Ok(())
            }
            _ => {
                let err = LedgerError::AmountOverflow {
                    token: T::token_code(),
                    current: self.value,
                    amount: other.value,
                    max: T::MAX_AMOUNT,
                };
                Err((err, other))
            }
        }
    }

    /// Split `amount` off into a new token.
    pub fn split(&mut self, amount: u128) -> LedgerResult<Token<T>> {
        if amount > self.value {
            return Err(LedgerError::InvariantViolation(format!(
                "cannot split {} from a token of {} {}",
                amount,
                self.value,
                T::token_code()
            )));
        }
        self.value -= amount;
        Ok(Self {
            value: amount,
            issued_in: self.issued_in.clone(),
            _marker: PhantomData,
        })
    }

    /// Consume a zero-value token.
    pub fn destroy_zero(self) -> LedgerResult<()> {
        if self.value != 0 {
            return Err(LedgerError::InvariantViolation(format!(
                "destroy_zero called on {} {}",
                self.value,
                T::token_code()
            )));
        }
        Ok(())
    }

    pub(crate) fn issued_in(&self) -> &[u64] {
        &self.issued_in
    }

    pub(crate) fn into_value(self) -> u128 {
        self.value
    }
}

impl<T: TokenType> fmt::Debug for Token<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("token", &T::token_code().to_string())
            .field("value", &self.value)
            .finish()
    }
}

/// Right to mint new `T` tokens; the seam to the token registry.
///
/// Only the token's issuer can obtain one.
pub struct MintCapability<T: TokenType> {
    _marker: PhantomData<fn() -> T>,
}

impl<T: TokenType> MintCapability<T> {
    pub fn issue(issuer: &Signer) -> LedgerResult<Self> {
        if issuer.address() != T::ISSUER {
            return Err(LedgerError::NotAuthorized {
                expected: T::ISSUER,
                actual: issuer.address(),
            });
        }
        Ok(Self {
            _marker: PhantomData,
        })
    }

    pub fn mint(&self, amount: u128) -> LedgerResult<Token<T>> {
        if amount > T::MAX_AMOUNT {
            return Err(LedgerError::AmountOverflow {
                token: T::token_code(),
                current: 0,
                amount,
                max: T::MAX_AMOUNT,
            });
        }
        debug!(token = %T::token_code(), amount, "Tokens minted");
        Ok(Token::new(amount))
    }
}

impl<T: TokenType> fmt::Debug for MintCapability<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MintCapability")
            .field("token", &T::token_code().to_string())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_types::{AccountAddress, Stc};

    struct Capped;

    impl TokenType for Capped {
        const ISSUER: AccountAddress = AccountAddress::RUNTIME;
        const MODULE: &'static str = "Capped";
        const NAME: &'static str = "CAP";
        const MAX_AMOUNT: u128 = 100;
    }

    fn mint<T: TokenType>(amount: u128) -> Token<T> {
        MintCapability::<T>::issue(&Signer::runtime(None))
            .unwrap()
            .mint(amount)
            .unwrap()
    }

    #[test]
    fn only_issuer_gets_mint_capability() {
        let stranger = Signer::new("0xbad".parse().unwrap());
        assert!(matches!(
            MintCapability::<Stc>::issue(&stranger),
            Err(LedgerError::NotAuthorized { .. })
        ));
    }

    #[test]
    fn merge_and_split() {
        let mut a = mint::<Stc>(30);
        a.merge(mint::<Stc>(12)).unwrap();
        assert_eq!(a.value(), 42);
        let b = a.split(40).unwrap();
        assert_eq!(a.value(), 2);
        assert_eq!(b.value(), 40);
        assert!(a.split(3).is_err());
    }

    #[test]
    fn merge_respects_token_maximum() {
        let mut a = mint::<Capped>(60);
        let (err, returned) = a.merge(mint::<Capped>(50)).unwrap_err();
        assert!(matches!(err, LedgerError::AmountOverflow { max: 100, .. }));
        assert_eq!(returned.value(), 50);
        assert_eq!(a.value(), 60);
    }

    #[test]
    fn mint_respects_token_maximum() {
        let cap = MintCapability::<Capped>::issue(&Signer::runtime(None)).unwrap();
        assert!(cap.mint(101).is_err());
    }

    #[test]
    fn destroy_zero_rejects_value() {
        Token::<Stc>::zero().destroy_zero().unwrap();
        assert!(mint::<Stc>(1).destroy_zero().is_err());
    }
}
