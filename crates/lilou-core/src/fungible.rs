use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{FungibleError, InvariantViolation};
use crate::event::{EventLog, FungibleEvent};
use crate::identity::{Address, Amount};

/// Display metadata, fixed when the ledger is created.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoinMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl Default for CoinMetadata {
    fn default() -> Self {
        Self {
            name: "Lilou Coin".into(),
            symbol: "LLC".into(),
            decimals: 2,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AllowanceEntry {
    pub owner: Address,
    pub spender: Address,
    pub amount: Amount,
}

/// Canonical view of the ledger state, ordered by address.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FungibleSnapshot {
    pub metadata: CoinMetadata,
    pub total_supply: Amount,
    pub balances: BTreeMap<Address, Amount>,
    pub allowances: Vec<AllowanceEntry>,
}

/// Balance and allowance bookkeeping for a single fungible token.
///
/// `total_supply` always equals the sum of `balances`. Zero balances and
/// zero allowances are not stored, so an address never seen and an address
/// emptied out look the same.
#[derive(Clone, Debug, Default)]
pub struct FungibleLedger {
    metadata: CoinMetadata,
    total_supply: Amount,
    balances: BTreeMap<Address, Amount>,
    allowances: BTreeMap<(Address, Address), Amount>,
    events: EventLog<FungibleEvent>,
}

impl FungibleLedger {
    pub fn new(metadata: CoinMetadata) -> Self {
        Self {
            metadata,
            ..Self::default()
        }
    }

    pub fn metadata(&self) -> &CoinMetadata {
        &self.metadata
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn symbol(&self) -> &str {
        &self.metadata.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.metadata.decimals
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or_default()
    }

    /// Remaining amount `spender` may move out of `owner`'s balance.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn events(&self) -> &[FungibleEvent] {
        self.events.as_slice()
    }

    pub fn drain_events(&mut self) -> Vec<FungibleEvent> {
        self.events.drain()
    }

    /// Set the allowance of `spender` over `caller`'s balance.
    ///
    /// The new amount replaces the previous one; approving zero revokes.
    pub fn approve(
        &mut self,
        caller: Address,
        spender: Address,
        amount: Amount,
    ) -> Result<(), FungibleError> {
        if caller.is_null() {
            return Err(FungibleError::InvalidApprover { approver: caller });
        }
        if spender.is_null() {
            return Err(FungibleError::InvalidSpender { spender });
        }
        self.set_allowance(caller, spender, amount);
        self.events.push(FungibleEvent::Approval {
            owner: caller,
            spender,
            amount,
        });
        Ok(())
    }

    pub fn transfer(
        &mut self,
        caller: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), FungibleError> {
        if caller.is_null() {
            return Err(FungibleError::InvalidSender { sender: caller });
        }
        if to.is_null() {
            return Err(FungibleError::InvalidReceiver { receiver: to });
        }
        self.ensure_funds(&caller, amount)?;
        self.move_balance(caller, to, amount);
        self.events.push(FungibleEvent::Transfer {
            from: caller,
            to,
            amount,
        });
        Ok(())
    }

    /// Move `amount` from `from` to `to` on behalf of `caller`.
    ///
    /// When `caller` is `from` the allowance is not consulted: an owner
    /// moving its own funds needs no delegation. Otherwise the allowance is
    /// reduced by exactly `amount` together with the balance move.
    pub fn transfer_from(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), FungibleError> {
        if from.is_null() {
            return Err(FungibleError::InvalidSender { sender: from });
        }
        if to.is_null() {
            return Err(FungibleError::InvalidReceiver { receiver: to });
        }
        let delegated = caller != from;
        let allowance = self.allowance(&from, &caller);
        if delegated && allowance < amount {
            return Err(FungibleError::NotAllowed {
                spender: caller,
                owner: from,
                allowance,
                requested: amount,
            });
        }
        self.ensure_funds(&from, amount)?;

        if delegated {
            self.set_allowance(from, caller, allowance - amount);
        }
        self.move_balance(from, to, amount);
        self.events.push(FungibleEvent::Transfer { from, to, amount });
        Ok(())
    }

    /// Create `amount` new units in `to`'s balance.
    ///
    /// Privileged: whoever exposes this decides who may call it.
    pub fn mint(&mut self, to: Address, amount: Amount) -> Result<(), FungibleError> {
        if to.is_null() {
            return Err(FungibleError::InvalidReceiver { receiver: to });
        }
        let total_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(FungibleError::SupplyOverflow { requested: amount })?;
        // Bounded by the supply check above.
        let balance = self.balance_of(&to) + amount;

        self.total_supply = total_supply;
        self.store_balance(to, balance);
        self.events.push(FungibleEvent::Transfer {
            from: Address::NULL,
            to,
            amount,
        });
        Ok(())
    }

    /// Destroy `amount` units held by `from`.
    pub fn burn(&mut self, from: Address, amount: Amount) -> Result<(), FungibleError> {
        if from.is_null() {
            return Err(FungibleError::InvalidSender { sender: from });
        }
        let balance = self.balance_of(&from);
        if balance < amount {
            return Err(FungibleError::InsufficientBalance {
                sender: from,
                balance,
                requested: amount,
            });
        }

        self.store_balance(from, balance - amount);
        self.total_supply -= amount;
        self.events.push(FungibleEvent::Transfer {
            from,
            to: Address::NULL,
            amount,
        });
        Ok(())
    }

    pub fn snapshot(&self) -> FungibleSnapshot {
        FungibleSnapshot {
            metadata: self.metadata.clone(),
            total_supply: self.total_supply,
            balances: self.balances.clone(),
            allowances: self
                .allowances
                .iter()
                .map(|(&(owner, spender), &amount)| AllowanceEntry {
                    owner,
                    spender,
                    amount,
                })
                .collect(),
        }
    }

    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut sum: Amount = 0;
        for (address, balance) in &self.balances {
            if address.is_null() {
                return Err(InvariantViolation::NullEntry { role: "holder" });
            }
            if *balance == 0 {
                return Err(InvariantViolation::ZeroEntry { address: *address });
            }
            sum = sum
                .checked_add(*balance)
                .ok_or(InvariantViolation::SupplyMismatch {
                    total_supply: self.total_supply,
                    sum: Amount::MAX,
                })?;
        }
        if sum != self.total_supply {
            return Err(InvariantViolation::SupplyMismatch {
                total_supply: self.total_supply,
                sum,
            });
        }
        for ((owner, spender), amount) in &self.allowances {
            if owner.is_null() || spender.is_null() {
                return Err(InvariantViolation::NullEntry { role: "allowance party" });
            }
            if *amount == 0 {
                return Err(InvariantViolation::ZeroEntry { address: *owner });
            }
        }
        Ok(())
    }

    fn ensure_funds(&self, sender: &Address, amount: Amount) -> Result<(), FungibleError> {
        let balance = self.balance_of(sender);
        if balance < amount {
            return Err(FungibleError::InsufficientFunds {
                sender: *sender,
                balance,
                requested: amount,
            });
        }
        Ok(())
    }

    // Caller has checked that `from` holds at least `amount`.
    fn move_balance(&mut self, from: Address, to: Address, amount: Amount) {
        let remaining = self.balance_of(&from) - amount;
        self.store_balance(from, remaining);
        // Cannot overflow: both balances are bounded by the total supply.
        let credited = self.balance_of(&to) + amount;
        self.store_balance(to, credited);
    }

    fn store_balance(&mut self, account: Address, balance: Amount) {
        if balance == 0 {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, balance);
        }
    }

    fn set_allowance(&mut self, owner: Address, spender: Address, amount: Amount) {
        if amount == 0 {
            self.allowances.remove(&(owner, spender));
        } else {
            self.allowances.insert((owner, spender), amount);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const A: Address = Address::repeat_byte(0xa1);
    const B: Address = Address::repeat_byte(0xb2);
    const C: Address = Address::repeat_byte(0xc3);

    fn ledger_with(holder: Address, amount: Amount) -> FungibleLedger {
        let mut ledger = FungibleLedger::new(CoinMetadata::default());
        ledger.mint(holder, amount).unwrap();
        ledger.drain_events();
        ledger
    }

    #[test]
    fn metadata_is_exposed() {
        let ledger = FungibleLedger::new(CoinMetadata::default());
        assert_eq!(ledger.name(), "Lilou Coin");
        assert_eq!(ledger.symbol(), "LLC");
        assert_eq!(ledger.decimals(), 2);
        assert_eq!(ledger.total_supply(), 0);
    }

    #[test]
    fn unknown_accounts_read_as_zero() {
        let ledger = ledger_with(A, 10);
        assert_eq!(ledger.balance_of(&B), 0);
        assert_eq!(ledger.allowance(&A, &B), 0);
        assert_eq!(ledger.allowance(&Address::NULL, &B), 0);
        assert_eq!(ledger.allowance(&A, &Address::NULL), 0);
    }

    #[test]
    fn delegated_spend_drains_allowance() {
        let mut ledger = FungibleLedger::new(CoinMetadata::default());

        ledger.mint(A, 100).unwrap();
        assert_eq!(ledger.total_supply(), 100);
        assert_eq!(ledger.balance_of(&A), 100);

        ledger.approve(A, B, 40).unwrap();
        ledger.transfer_from(B, A, C, 40).unwrap();
        assert_eq!(ledger.balance_of(&A), 60);
        assert_eq!(ledger.balance_of(&C), 40);
        assert_eq!(ledger.allowance(&A, &B), 0);

        let err = ledger.transfer_from(B, A, C, 1).unwrap_err();
        assert_eq!(
            err,
            FungibleError::NotAllowed {
                spender: B,
                owner: A,
                allowance: 0,
                requested: 1,
            }
        );

        assert_eq!(
            ledger.events(),
            &[
                FungibleEvent::Transfer {
                    from: Address::NULL,
                    to: A,
                    amount: 100
                },
                FungibleEvent::Approval {
                    owner: A,
                    spender: B,
                    amount: 40
                },
                FungibleEvent::Transfer {
                    from: A,
                    to: C,
                    amount: 40
                },
            ]
        );
    }

    #[test]
    fn partial_spend_decrements_allowance() {
        let mut ledger = ledger_with(A, 1_000_00);
        ledger.approve(A, B, 1_000_00).unwrap();
        ledger.transfer_from(B, A, B, 500_00).unwrap();
        assert_eq!(ledger.allowance(&A, &B), 500_00);
    }

    #[test]
    fn approve_overwrites_previous_allowance() {
        let mut ledger = ledger_with(A, 10);
        ledger.approve(A, B, 1_000_00).unwrap();
        ledger.approve(A, B, 1_000_00).unwrap();
        assert_eq!(ledger.allowance(&A, &B), 1_000_00);

        ledger.approve(A, B, 2_000_00).unwrap();
        assert_eq!(ledger.allowance(&A, &B), 2_000_00);

        ledger.approve(A, B, 0).unwrap();
        assert_eq!(ledger.allowance(&A, &B), 0);
        assert_eq!(ledger.events().len(), 4);
    }

    #[test]
    fn approve_rejects_null_parties() {
        let mut ledger = ledger_with(A, 10);
        assert_eq!(
            ledger.approve(A, Address::NULL, 5),
            Err(FungibleError::InvalidSpender {
                spender: Address::NULL
            })
        );
        assert_eq!(
            ledger.approve(Address::NULL, B, 5),
            Err(FungibleError::InvalidApprover {
                approver: Address::NULL
            })
        );
        assert!(ledger.events().is_empty());
    }

    #[test]
    fn transfer_of_full_balance_succeeds() {
        let mut ledger = ledger_with(A, 250);
        ledger.transfer(A, B, 250).unwrap();
        assert_eq!(ledger.balance_of(&A), 0);
        assert_eq!(ledger.balance_of(&B), 250);
        assert_eq!(ledger.total_supply(), 250);
        assert_eq!(
            ledger.events(),
            &[FungibleEvent::Transfer {
                from: A,
                to: B,
                amount: 250
            }]
        );
    }

    #[test]
    fn transfer_beyond_balance_reports_prior_balance() {
        let mut ledger = ledger_with(A, 250);
        let err = ledger.transfer(A, B, 251).unwrap_err();
        assert_eq!(
            err,
            FungibleError::InsufficientFunds {
                sender: A,
                balance: 250,
                requested: 251,
            }
        );
        assert_eq!(ledger.balance_of(&A), 250);
        assert_eq!(ledger.balance_of(&B), 0);
    }

    #[test]
    fn transfer_rejects_null_endpoints() {
        let mut ledger = ledger_with(A, 250);
        assert_eq!(
            ledger.transfer(A, Address::NULL, 1),
            Err(FungibleError::InvalidReceiver {
                receiver: Address::NULL
            })
        );
        assert_eq!(
            ledger.transfer(Address::NULL, B, 1),
            Err(FungibleError::InvalidSender {
                sender: Address::NULL
            })
        );
    }

    #[test]
    fn owner_transfer_from_skips_allowance() {
        let mut ledger = ledger_with(A, 100);
        assert_eq!(ledger.allowance(&A, &A), 0);
        ledger.transfer_from(A, A, B, 30).unwrap();
        assert_eq!(ledger.balance_of(&A), 70);
        assert_eq!(ledger.balance_of(&B), 30);
        assert_eq!(ledger.allowance(&A, &A), 0);
    }

    #[test]
    fn transfer_from_checks_allowance_before_funds() {
        let mut ledger = ledger_with(A, 100);
        ledger.approve(A, C, 500_00).unwrap();
        let err = ledger.transfer_from(C, A, C, 1_000_00).unwrap_err();
        assert_eq!(
            err,
            FungibleError::NotAllowed {
                spender: C,
                owner: A,
                allowance: 500_00,
                requested: 1_000_00,
            }
        );
    }

    #[test]
    fn transfer_from_with_allowance_but_no_funds_fails_without_side_effects() {
        let mut ledger = ledger_with(A, 100);
        ledger.approve(B, C, 1_000_00).unwrap();
        let err = ledger.transfer_from(C, B, C, 1_000_00).unwrap_err();
        assert_eq!(
            err,
            FungibleError::InsufficientFunds {
                sender: B,
                balance: 0,
                requested: 1_000_00,
            }
        );
        assert_eq!(ledger.allowance(&B, &C), 1_000_00);
    }

    #[test]
    fn transfer_from_rejects_null_endpoints() {
        let mut ledger = ledger_with(A, 100);
        assert_eq!(
            ledger.transfer_from(B, Address::NULL, C, 1),
            Err(FungibleError::InvalidSender {
                sender: Address::NULL
            })
        );
        assert_eq!(
            ledger.transfer_from(B, A, Address::NULL, 1),
            Err(FungibleError::InvalidReceiver {
                receiver: Address::NULL
            })
        );
    }

    #[test]
    fn mint_and_burn_move_supply() {
        let mut ledger = ledger_with(A, 100);
        ledger.mint(B, 100).unwrap();
        assert_eq!(ledger.total_supply(), 200);

        ledger.burn(A, 100).unwrap();
        assert_eq!(ledger.balance_of(&A), 0);
        assert_eq!(ledger.total_supply(), 100);
        assert_eq!(
            ledger.events().last(),
            Some(&FungibleEvent::Transfer {
                from: A,
                to: Address::NULL,
                amount: 100
            })
        );
        ledger.check_invariants().unwrap();
    }

    #[test]
    fn mint_and_burn_reject_null_address() {
        let mut ledger = ledger_with(A, 100);
        assert_eq!(
            ledger.mint(Address::NULL, 100),
            Err(FungibleError::InvalidReceiver {
                receiver: Address::NULL
            })
        );
        assert_eq!(
            ledger.burn(Address::NULL, 100),
            Err(FungibleError::InvalidSender {
                sender: Address::NULL
            })
        );
    }

    #[test]
    fn burn_beyond_balance_is_rejected() {
        let mut ledger = ledger_with(A, 100);
        assert_eq!(
            ledger.burn(B, 100),
            Err(FungibleError::InsufficientBalance {
                sender: B,
                balance: 0,
                requested: 100,
            })
        );
        assert_eq!(ledger.total_supply(), 100);
    }

    #[test]
    fn mint_overflow_is_rejected() {
        let mut ledger = ledger_with(A, Amount::MAX);
        assert_eq!(
            ledger.mint(B, 1),
            Err(FungibleError::SupplyOverflow { requested: 1 })
        );
        assert_eq!(ledger.balance_of(&B), 0);
        ledger.check_invariants().unwrap();
    }

    #[test]
    fn snapshot_prunes_zero_entries() {
        let mut ledger = ledger_with(A, 10);
        ledger.approve(A, B, 3).unwrap();
        ledger.transfer(A, C, 10).unwrap();
        ledger.approve(A, B, 0).unwrap();
        let snapshot = ledger.snapshot();
        assert_eq!(snapshot.balances.len(), 1);
        assert_eq!(snapshot.balances[&C], 10);
        assert!(snapshot.allowances.is_empty());
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: FungibleSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn random_sequences_conserve_supply() {
        let accounts: Vec<Address> = (1..=6).map(Address::repeat_byte).collect();
        let mut rng = StdRng::seed_from_u64(0x1110_u64);
        let mut ledger = FungibleLedger::new(CoinMetadata::default());

        for _ in 0..2_000 {
            let a = accounts[rng.gen_range(0..accounts.len())];
            let b = accounts[rng.gen_range(0..accounts.len())];
            let c = accounts[rng.gen_range(0..accounts.len())];
            let amount: Amount = rng.gen_range(0..500);
            let before = ledger.clone();
            let outcome = match rng.gen_range(0..5) {
                0 => ledger.mint(a, amount),
                1 => ledger.burn(a, amount),
                2 => ledger.transfer(a, b, amount),
                3 => ledger.approve(a, b, amount),
                _ => ledger.transfer_from(a, b, c, amount),
            };
            if outcome.is_err() {
                assert_eq!(ledger.snapshot(), before.snapshot());
                assert_eq!(ledger.events().len(), before.events().len());
            }
            ledger.check_invariants().unwrap();
            let sum: Amount = accounts.iter().map(|acc| ledger.balance_of(acc)).sum();
            assert_eq!(sum, ledger.total_supply());
        }
    }
}
