use lilou_core::{Address, Amount, TokenId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::ledger::{Call, ChainState, HostError, Operation};

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct SimulationReport {
    pub seed: u64,
    pub steps: usize,
    pub accepted: usize,
    pub rejected: usize,
    #[serde(serialize_with = "crate::ledger::hex_root::serialize")]
    pub state_root: [u8; 32],
}

/// Drives random calls from a fixed pool of identities against `state`,
/// checking both ledgers after every step.
pub struct Simulator {
    rng: StdRng,
    seed: u64,
    identities: Vec<Address>,
    token_space: u64,
}

impl Simulator {
    pub fn new(seed: u64, state: &ChainState) -> Self {
        let deployment = state.deployment();
        let mut identities: Vec<Address> = deployment.minters.clone();
        identities.extend(deployment.allocations.iter().map(|a| a.holder));
        identities.extend(deployment.nfts.iter().map(|t| t.owner));
        identities.extend((0xe0..0xe4).map(Address::repeat_byte));
        // Null shows up too, so rejection paths get exercised.
        identities.push(Address::NULL);
        identities.sort();
        identities.dedup();

        let token_space = deployment
            .nfts
            .iter()
            .map(|t| t.token_id.0)
            .max()
            .unwrap_or(0)
            .saturating_add(8);
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
            identities,
            token_space,
        }
    }

    pub fn run(
        &mut self,
        state: &mut ChainState,
        steps: usize,
    ) -> Result<SimulationReport, HostError> {
        let mut accepted = 0usize;
        for _ in 0..steps {
            let call = self.next_call(state);
            if state.execute(&call).is_accepted() {
                accepted += 1;
            }
            state.check_invariants()?;
        }
        Ok(SimulationReport {
            seed: self.seed,
            steps,
            accepted,
            rejected: steps - accepted,
            state_root: state.state_root(),
        })
    }

    fn pick(&mut self) -> Address {
        *self
            .identities
            .choose(&mut self.rng)
            .unwrap_or(&Address::NULL)
    }

    fn token(&mut self, state: &ChainState) -> TokenId {
        // Favour existing tokens so transfers have something to move.
        let existing: Vec<TokenId> = state
            .collection()
            .snapshot()
            .tokens
            .iter()
            .map(|t| t.token_id)
            .collect();
        let reuse = self.rng.gen_bool(0.7);
        match existing.choose(&mut self.rng) {
            Some(id) if reuse => *id,
            _ => TokenId(self.rng.gen_range(0..self.token_space)),
        }
    }

    fn amount(&mut self, state: &ChainState, holder: &Address) -> Amount {
        let balance = state.coin().balance_of(holder);
        if balance > 0 && self.rng.gen_bool(0.8) {
            self.rng.gen_range(0..=balance)
        } else {
            self.rng.gen_range(0..1_000_00)
        }
    }

    fn next_call(&mut self, state: &ChainState) -> Call {
        let caller = self.pick();
        let op = match self.rng.gen_range(0..10) {
            0 => Operation::Transfer {
                to: self.pick(),
                amount: self.amount(state, &caller),
            },
            1 => {
                let from = self.pick();
                Operation::TransferFrom {
                    from,
                    to: self.pick(),
                    amount: self.amount(state, &from),
                }
            }
            2 => Operation::Approve {
                spender: self.pick(),
                amount: self.amount(state, &caller),
            },
            3 => Operation::Mint {
                to: self.pick(),
                amount: self.rng.gen_range(0..1_000_00),
            },
            4 => {
                let from = self.pick();
                Operation::Burn {
                    from,
                    amount: self.amount(state, &from),
                }
            }
            5 => Operation::NftApprove {
                spender: self.pick(),
                token_id: self.token(state),
            },
            6 => Operation::SetApprovalForAll {
                operator: self.pick(),
                approved: self.rng.gen_bool(0.6),
            },
            7 => Operation::NftMint {
                to: self.pick(),
                token_id: self.token(state),
            },
            8 => Operation::NftBurn {
                token_id: self.token(state),
            },
            _ => {
                let token_id = self.token(state);
                let honest = self.rng.gen_bool(0.8);
                let from = match state.collection().owner_of(&token_id) {
                    Ok(owner) if honest => owner,
                    _ => self.pick(),
                };
                Operation::NftTransferFrom {
                    from,
                    to: self.pick(),
                    token_id,
                }
            }
        };
        Call { caller, op }
    }
}
